//! Collision file reader.

use tracing::{debug, warn};

use crate::binary::Source;
use crate::collision::layout::{Channel, GroupRecord, Header};
use crate::collision::{FormatVersion, Triangle, Vertex, check_vertex_indices};
use crate::error::{ColError, ColResult};

/// The header and group table of a collision file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionSummary {
    pub header: Header,
    pub groups: Vec<GroupRecord>,
}

impl CollisionSummary {
    pub fn triangle_count(&self) -> usize {
        self.groups
            .iter()
            .map(|group| usize::from(group.triangle_count))
            .sum()
    }
}

/// Read only the header and group table, starting at the source's current
/// position.
pub fn inspect<S: Source + ?Sized>(source: &mut S, version: FormatVersion) -> ColResult<CollisionSummary> {
    let base = source.tell()?;
    read_tables(source, version, base)
}

fn read_tables<S: Source + ?Sized>(
    source: &mut S,
    version: FormatVersion,
    base: u64,
) -> ColResult<CollisionSummary> {
    let layout = version.layout();
    let header = layout.read_header(source)?;
    debug!("collision header: {header:?}");

    source.seek_to(base + u64::from(header.group_offset))?;
    let groups = layout.read_groups(source, header.group_count)?;

    for (i, group) in groups.iter().enumerate() {
        if group.has_parameter && group.parameter_offset == 0 {
            return Err(ColError::format(format!(
                "group {i} declares a parameter section at offset 0"
            )));
        }
        if !group.has_parameter && group.parameter_offset != 0 {
            warn!(
                "group {i} has no parameters but a parameter offset of 0x{:X}; ignoring it",
                group.parameter_offset
            );
        }
    }

    Ok(CollisionSummary { header, groups })
}

/// Read a collision file starting at the source's current position.
///
/// Triangles are returned group by group in table order, and in section order
/// within each group.
pub fn unpack<S: Source + ?Sized>(
    source: &mut S,
    version: FormatVersion,
) -> ColResult<(Vec<Vertex>, Vec<Triangle>)> {
    let base = source.tell()?;
    let CollisionSummary { header, groups } = read_tables(source, version, base)?;

    source.seek_to(base + u64::from(header.vertex_offset))?;
    let vertices = version.layout().read_vertices(source, header.vertex_count)?;

    // A triangle only exists once its index triple has been read, so the
    // buckets never grow past what the source actually holds.
    let mut buckets: Vec<Vec<Triangle>> = vec![Vec::new(); groups.len()];
    for (group, triangles) in groups.iter().zip(buckets.iter_mut()) {
        source.seek_to(base + u64::from(group.vertex_index_offset))?;
        for _ in 0..group.triangle_count {
            let mut triangle = Triangle {
                vertex_indices: [0; 3],
                col_type: group.col_type,
                terrain_type: 0,
                unknown: 0,
                parameter: None,
            };
            Channel::VertexIndices.read(source, &mut triangle)?;
            triangles.push(triangle);
        }
    }

    for channel in [Channel::Terrain, Channel::Unknown, Channel::Parameter] {
        for (group, triangles) in groups.iter().zip(buckets.iter_mut()) {
            if !channel.present_in(group) {
                continue;
            }
            source.seek_to(base + u64::from(channel.offset(group)))?;
            for triangle in triangles.iter_mut() {
                channel.read(source, triangle)?;
            }
        }
    }

    let triangles: Vec<Triangle> = buckets.into_iter().flatten().collect();
    check_vertex_indices(vertices.len(), &triangles)?;

    debug!(
        "read {} vertices and {} triangles from {} groups",
        vertices.len(),
        triangles.len(),
        groups.len()
    );
    Ok((vertices, triangles))
}
