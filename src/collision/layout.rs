//! On-disk records of a collision file and the section channels.
//!
//! All records are described with [`StructDef`]s so their sizes come from the
//! declared fields rather than being hardcoded at each use:
//!
//! ```text
//! Header      { u32 vertex_count, u32 vertex_offset, u32 group_count, u32 group_offset }
//! GroupRecord { key (u8 + u8 or u16), u16 triangle_count, pad[1] = 00, bool has_parameter,
//!               pad[2] = FF, u32 vertex_index_offset, u32 terrain_offset,
//!               u32 unknown_offset, u32 parameter_offset }
//! Vertex      { f32 x, f32 y, f32 z }
//! ```

use std::sync::LazyLock;

use winnow::binary::Endianness;

use crate::binary::{Primitive, Record, Sink, Source, StructDef, Value};
use crate::collision::{FormatVersion, Triangle, Vertex};
use crate::error::{ColError, ColResult};

pub const HEADER_SIZE: usize = 16;
pub const GROUP_RECORD_SIZE: usize = 24;
pub const VERTEX_SIZE: usize = 12;

/// Collision files are always big-endian.
pub const ENDIAN: Endianness = Endianness::Big;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub vertex_count: u32,
    pub vertex_offset: u32,
    pub group_count: u32,
    pub group_offset: u32,
}

/// One entry of the group table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupRecord {
    pub col_type: u16,
    pub triangle_count: u16,
    pub has_parameter: bool,
    pub vertex_index_offset: u32,
    pub terrain_offset: u32,
    pub unknown_offset: u32,
    /// 0 when `has_parameter` is false.
    pub parameter_offset: u32,
}

/// Struct descriptors for one [`FormatVersion`].
#[derive(Debug)]
pub struct Layout {
    pub version: FormatVersion,
    pub header: StructDef,
    pub group: StructDef,
    pub vertex: StructDef,
}

static SPLIT: LazyLock<Layout> = LazyLock::new(|| Layout::new(FormatVersion::Split));
static WIDE: LazyLock<Layout> = LazyLock::new(|| Layout::new(FormatVersion::Wide));

impl FormatVersion {
    pub fn layout(self) -> &'static Layout {
        match self {
            FormatVersion::Split => &*SPLIT,
            FormatVersion::Wide => &*WIDE,
        }
    }
}

impl Layout {
    fn new(version: FormatVersion) -> Self {
        let header = StructDef::builder("Header", ENDIAN)
            .field("vertex_count", Primitive::U32)
            .field("vertex_offset", Primitive::U32)
            .field("group_count", Primitive::U32)
            .field("group_offset", Primitive::U32)
            .build();

        let group = StructDef::builder("Group", ENDIAN);
        let group = match version {
            FormatVersion::Split => group
                .field("col_class", Primitive::U8)
                .field("col_subclass", Primitive::U8),
            FormatVersion::Wide => group.field("col_type", Primitive::U16),
        };
        let group = group
            .field("triangle_count", Primitive::U16)
            .padding_with(1, 0x00)
            .field("has_parameter", Primitive::Bool)
            .padding(2)
            .field("vertex_index_offset", Primitive::U32)
            .field("terrain_offset", Primitive::U32)
            .field("unknown_offset", Primitive::U32)
            .field("parameter_offset", Primitive::U32)
            .build();

        let vertex = StructDef::builder("Vertex", ENDIAN)
            .field("x", Primitive::F32)
            .field("y", Primitive::F32)
            .field("z", Primitive::F32)
            .build();

        Layout {
            version,
            header,
            group,
            vertex,
        }
    }

    pub fn header_size(&self) -> ColResult<u32> {
        as_offset(self.header.fixed_size()? as u64)
    }

    pub fn group_size(&self) -> ColResult<u32> {
        as_offset(self.group.fixed_size()? as u64)
    }

    pub fn write_header<S: Sink + ?Sized>(&self, sink: &mut S, header: &Header) -> ColResult<()> {
        let record = Record::default()
            .with("vertex_count", header.vertex_count)
            .with("vertex_offset", header.vertex_offset)
            .with("group_count", header.group_count)
            .with("group_offset", header.group_offset);
        self.header.pack(sink, &record)
    }

    pub fn read_header<S: Source + ?Sized>(&self, source: &mut S) -> ColResult<Header> {
        let record = self.header.unpack(source)?;
        Ok(Header {
            vertex_count: record.u32("vertex_count")?,
            vertex_offset: record.u32("vertex_offset")?,
            group_count: record.u32("group_count")?,
            group_offset: record.u32("group_offset")?,
        })
    }

    pub fn write_group<S: Sink + ?Sized>(&self, sink: &mut S, group: &GroupRecord) -> ColResult<()> {
        let [class, subclass] = group.col_type.to_be_bytes();
        let record = match self.version {
            FormatVersion::Split => Record::default()
                .with("col_class", class)
                .with("col_subclass", subclass),
            FormatVersion::Wide => Record::default().with("col_type", group.col_type),
        };
        let record = record
            .with("triangle_count", group.triangle_count)
            .with("has_parameter", group.has_parameter)
            .with("vertex_index_offset", group.vertex_index_offset)
            .with("terrain_offset", group.terrain_offset)
            .with("unknown_offset", group.unknown_offset)
            .with("parameter_offset", group.parameter_offset);
        self.group.pack(sink, &record)
    }

    /// Read `count` group records. A table cut short fails as a whole.
    pub fn read_groups<S: Source + ?Sized>(
        &self,
        source: &mut S,
        count: u32,
    ) -> ColResult<Vec<GroupRecord>> {
        self.group
            .unpack_table(source, count as usize)?
            .iter()
            .map(|record| self.group_from_record(record))
            .collect()
    }

    fn group_from_record(&self, record: &Record) -> ColResult<GroupRecord> {
        let col_type = match self.version {
            FormatVersion::Split => {
                u16::from_be_bytes([record.u8("col_class")?, record.u8("col_subclass")?])
            }
            FormatVersion::Wide => record.u16("col_type")?,
        };
        Ok(GroupRecord {
            col_type,
            triangle_count: record.u16("triangle_count")?,
            has_parameter: record.bool("has_parameter")?,
            vertex_index_offset: record.u32("vertex_index_offset")?,
            terrain_offset: record.u32("terrain_offset")?,
            unknown_offset: record.u32("unknown_offset")?,
            parameter_offset: record.u32("parameter_offset")?,
        })
    }

    pub fn write_vertex<S: Sink + ?Sized>(&self, sink: &mut S, vertex: &Vertex) -> ColResult<()> {
        let record = Record::default()
            .with("x", vertex.x)
            .with("y", vertex.y)
            .with("z", vertex.z);
        self.vertex.pack(sink, &record)
    }

    pub fn read_vertices<S: Source + ?Sized>(
        &self,
        source: &mut S,
        count: u32,
    ) -> ColResult<Vec<Vertex>> {
        self.vertex
            .unpack_table(source, count as usize)?
            .iter()
            .map(|record| {
                Ok(Vertex {
                    x: record.f32("x")?,
                    y: record.f32("y")?,
                    z: record.f32("z")?,
                })
            })
            .collect()
    }
}

/// Narrow a stream offset to the 32-bit field it is stored in.
pub(crate) fn as_offset(offset: u64) -> ColResult<u32> {
    u32::try_from(offset)
        .map_err(|_| ColError::format(format!("offset 0x{offset:X} does not fit in 32 bits")))
}

/// Per-triangle attribute channels, each stored as its own section per group.
/// Sections are written channel by channel in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    VertexIndices,
    Terrain,
    Unknown,
    Parameter,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::VertexIndices,
        Channel::Terrain,
        Channel::Unknown,
        Channel::Parameter,
    ];

    /// Whether `group` stores this channel at all.
    pub fn present_in(self, group: &GroupRecord) -> bool {
        self != Channel::Parameter || group.has_parameter
    }

    pub fn offset(self, group: &GroupRecord) -> u32 {
        match self {
            Channel::VertexIndices => group.vertex_index_offset,
            Channel::Terrain => group.terrain_offset,
            Channel::Unknown => group.unknown_offset,
            Channel::Parameter => group.parameter_offset,
        }
    }

    pub fn set_offset(self, group: &mut GroupRecord, offset: u32) {
        match self {
            Channel::VertexIndices => group.vertex_index_offset = offset,
            Channel::Terrain => group.terrain_offset = offset,
            Channel::Unknown => group.unknown_offset = offset,
            Channel::Parameter => group.parameter_offset = offset,
        }
    }

    /// Bytes one triangle occupies in this channel's section.
    pub fn stride(self) -> usize {
        match self {
            Channel::VertexIndices => 3 * Primitive::U16.size(),
            Channel::Terrain | Channel::Unknown => Primitive::U8.size(),
            Channel::Parameter => Primitive::U16.size(),
        }
    }

    pub fn write<S: Sink + ?Sized>(self, sink: &mut S, triangle: &Triangle) -> ColResult<()> {
        match self {
            Channel::VertexIndices => {
                for index in triangle.vertex_indices {
                    Primitive::U16.pack(sink, ENDIAN, &Value::U16(index))?;
                }
                Ok(())
            }
            Channel::Terrain => Primitive::U8.pack(sink, ENDIAN, &Value::U8(triangle.terrain_type)),
            Channel::Unknown => Primitive::U8.pack(sink, ENDIAN, &Value::U8(triangle.unknown)),
            Channel::Parameter => {
                let parameter = triangle.parameter.ok_or_else(|| {
                    ColError::format("triangle without a parameter in a parameter group")
                })?;
                Primitive::U16.pack(sink, ENDIAN, &Value::U16(parameter))
            }
        }
    }

    pub fn read<S: Source + ?Sized>(self, source: &mut S, triangle: &mut Triangle) -> ColResult<()> {
        match self {
            Channel::VertexIndices => {
                for slot in &mut triangle.vertex_indices {
                    *slot = read_u16(source)?;
                }
            }
            Channel::Terrain => triangle.terrain_type = read_u8(source)?,
            Channel::Unknown => triangle.unknown = read_u8(source)?,
            Channel::Parameter => triangle.parameter = Some(read_u16(source)?),
        }
        Ok(())
    }
}

fn read_u8<S: Source + ?Sized>(source: &mut S) -> ColResult<u8> {
    let value = Primitive::U8.unpack(source, ENDIAN)?;
    value
        .as_u8()
        .ok_or_else(|| ColError::format(format!("expected u8, got {}", value.kind())))
}

fn read_u16<S: Source + ?Sized>(source: &mut S) -> ColResult<u16> {
    let value = Primitive::U16.unpack(source, ENDIAN)?;
    value
        .as_u16()
        .ok_or_else(|| ColError::format(format!("expected u16, got {}", value.kind())))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::binary::Positioned;

    #[test]
    fn record_sizes_are_constant() {
        for version in [FormatVersion::Split, FormatVersion::Wide] {
            let layout = version.layout();
            assert_eq!(layout.header.size(), Some(HEADER_SIZE));
            assert_eq!(layout.group.size(), Some(GROUP_RECORD_SIZE));
            assert_eq!(layout.vertex.size(), Some(VERTEX_SIZE));
        }
    }

    #[test]
    fn group_record_bytes() {
        let group = GroupRecord {
            col_type: 0x8001,
            triangle_count: 2,
            has_parameter: true,
            vertex_index_offset: 0x10,
            terrain_offset: 0x20,
            unknown_offset: 0x30,
            parameter_offset: 0x40,
        };
        let mut cursor = Cursor::new(Vec::new());
        FormatVersion::Split
            .layout()
            .write_group(&mut cursor, &group)
            .unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(
            bytes,
            [
                0x80, 0x01, 0, 2, 0x00, 1, 0xFF, 0xFF, 0, 0, 0, 0x10, 0, 0, 0, 0x20, 0, 0, 0,
                0x30, 0, 0, 0, 0x40
            ]
        );
    }

    #[test]
    fn versions_share_bytes_but_not_fields() {
        let group = GroupRecord {
            col_type: 0x0C07,
            triangle_count: 1,
            ..Default::default()
        };
        let mut split = Cursor::new(Vec::new());
        let mut wide = Cursor::new(Vec::new());
        FormatVersion::Split.layout().write_group(&mut split, &group).unwrap();
        FormatVersion::Wide.layout().write_group(&mut wide, &group).unwrap();
        assert_eq!(split.get_ref(), wide.get_ref());

        assert!(FormatVersion::Split.layout().group.field_names().any(|n| n == "col_class"));
        assert!(FormatVersion::Wide.layout().group.field_names().any(|n| n == "col_type"));

        wide.seek_to(0).unwrap();
        let read = FormatVersion::Wide.layout().read_groups(&mut wide, 1).unwrap();
        assert_eq!(read, [group]);
    }

    #[test]
    fn offset_overflow() {
        assert_eq!(as_offset(16).unwrap(), 16);
        assert!(matches!(
            as_offset(u64::from(u32::MAX) + 1),
            Err(ColError::Format { .. })
        ));
    }
}
