//! Collision file writer.
//!
//! The group table sits before the data it points at, so it is written as a
//! zeroed placeholder first and rewritten once every section offset is known.
//! The sink therefore has to support seeking back.

use itertools::Itertools;
use tracing::{debug, trace, warn};

use crate::binary::Sink;
use crate::collision::layout::{Channel, GroupRecord, Header, Layout, as_offset};
use crate::collision::{FormatVersion, GroupKey, Triangle, Vertex, check_vertex_indices};
use crate::error::{ColError, ColResult};

/// Triangles that will be stored together under one group record.
#[derive(Debug)]
pub(crate) struct Group<'a> {
    pub key: GroupKey,
    pub triangles: Vec<&'a Triangle>,
}

/// Bucket triangles by key, first fit.
///
/// Groups are created in the order their key is first seen and are never
/// reordered, which keeps the output byte-for-byte stable for a given input
/// order.
pub(crate) fn group_triangles(triangles: &[Triangle]) -> ColResult<Vec<Group<'_>>> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for triangle in triangles {
        let key = triangle.group_key();
        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.triangles.push(triangle),
            None => groups.push(Group {
                key,
                triangles: vec![triangle],
            }),
        }
    }

    if let Some(group) = groups.iter().find(|group| group.triangles.len() > u16::MAX as usize) {
        return Err(ColError::format(format!(
            "{} triangles share collision type 0x{:04X}, but a group holds at most {}",
            group.triangles.len(),
            group.key.col_type,
            u16::MAX
        )));
    }

    Ok(groups)
}

fn warn_degenerate(triangles: &[Triangle]) {
    for (i, triangle) in triangles.iter().enumerate() {
        if !triangle.vertex_indices.iter().all_unique() {
            warn!(
                "triangle {i} is degenerate: vertex indices {:?}",
                triangle.vertex_indices
            );
        }
    }
}

/// Write a collision file starting at the sink's current position.
///
/// Offsets are stored relative to that starting position, so for a fresh file
/// they are absolute. On success the sink is left just past the last section.
pub fn pack<S: Sink + ?Sized>(
    sink: &mut S,
    vertices: &[Vertex],
    triangles: &[Triangle],
    version: FormatVersion,
) -> ColResult<()> {
    check_vertex_indices(vertices.len(), triangles)?;
    warn_degenerate(triangles);
    let groups = group_triangles(triangles)?;
    let layout = version.layout();

    let base = sink.tell()?;
    let header = plan_header(layout, vertices.len(), groups.len())?;
    debug!(
        "packing {} vertices and {} triangles into {} groups ({:?})",
        vertices.len(),
        triangles.len(),
        groups.len(),
        version
    );

    layout.write_header(sink, &header)?;
    let table_len = layout.group_size()? as usize * groups.len();
    sink.write_bytes(&vec![0; table_len])?;

    for vertex in vertices {
        layout.write_vertex(sink, vertex)?;
    }

    let mut records: Vec<GroupRecord> = groups
        .iter()
        .map(|group| GroupRecord {
            col_type: group.key.col_type,
            triangle_count: group.triangles.len() as u16,
            has_parameter: group.key.has_parameter,
            ..Default::default()
        })
        .collect();

    for channel in Channel::ALL {
        for (group, record) in groups.iter().zip(records.iter_mut()) {
            if !channel.present_in(record) {
                continue;
            }
            let offset = as_offset(sink.tell()? - base)?;
            trace!(
                "group 0x{:04X}: {channel:?} section at 0x{offset:X} ({} bytes)",
                record.col_type,
                channel.stride() * group.triangles.len()
            );
            channel.set_offset(record, offset);
            for triangle in &group.triangles {
                channel.write(sink, triangle)?;
            }
        }
    }

    let end = sink.tell()?;
    as_offset(end - base)?;

    sink.seek_to(base + u64::from(header.group_offset))?;
    for record in &records {
        layout.write_group(sink, record)?;
    }
    sink.seek_to(end)?;

    Ok(())
}

fn plan_header(layout: &Layout, vertex_count: usize, group_count: usize) -> ColResult<Header> {
    let too_many = |what: &str, count: usize| {
        ColError::format(format!("{count} {what} do not fit in a collision file"))
    };
    let vertex_count = u32::try_from(vertex_count).map_err(|_| too_many("vertices", vertex_count))?;
    let group_count = u32::try_from(group_count).map_err(|_| too_many("groups", group_count))?;

    let group_offset = layout.header_size()?;
    let vertex_offset = u64::from(group_offset) + u64::from(layout.group_size()?) * u64::from(group_count);
    Ok(Header {
        vertex_count,
        vertex_offset: as_offset(vertex_offset)?,
        group_count,
        group_offset,
    })
}
