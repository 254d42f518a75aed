//! Grouped mesh collision (`.col`) files.
//!
//! A collision file stores a flat vertex list and a triangle list. On disk the
//! triangles are bucketed into groups that share a collision type and whether
//! they carry a parameter value. Each group then points at four separately
//! placed sections (vertex indices, terrain types, unknown bytes, parameters)
//! instead of storing interleaved per-triangle records:
//!
//! ```text
//! Header | group table | vertices | indices (all groups) | terrain (all groups)
//!        | unknown (all groups) | parameters (groups that have them)
//! ```
//!
//! Offsets in the header and group table are absolute from the first byte of
//! the file. An offset of 0 for the parameter section means the group has none.

use std::io::Cursor;

use bon::Builder;

pub use layout::{
    Channel, GROUP_RECORD_SIZE, GroupRecord, HEADER_SIZE, Header, Layout, VERTEX_SIZE,
};
pub use reader::{CollisionSummary, inspect, unpack};
pub use writer::pack;

use crate::error::{ColError, ColResult};

pub mod layout;
#[cfg(feature = "json")]
pub mod mesh;
pub mod reader;
pub mod writer;

/// Collision type given to triangles that do not set one (class 128, subclass 0).
pub const DEFAULT_COL_TYPE: u16 = 0x8000;

/// How the leading group key is split into fields.
///
/// Both variants occupy the same two bytes and share one section layout. Files
/// carry no marker for which one they use, so callers must pick it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "bin", derive(clap::ValueEnum))]
pub enum FormatVersion {
    /// Two `u8` key fields (class, subclass).
    #[default]
    Split,
    /// One `u16` collision type.
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vertex {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Convert from a Z-up editor frame to the game's Y-up frame.
    pub fn from_z_up(x: f32, y: f32, z: f32) -> Self {
        Self::new(x, z, -y)
    }
}

/// One collision triangle.
///
/// `col_type` is shared by every triangle in a group; `terrain_type` and
/// `unknown` are stored per triangle. An absent `parameter` is distinct from a
/// parameter of zero and lands the triangle in a different group.
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Triangle {
    pub vertex_indices: [u16; 3],
    #[builder(default = DEFAULT_COL_TYPE)]
    #[cfg_attr(feature = "serde", serde(default = "default_col_type"))]
    pub col_type: u16,
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    pub terrain_type: u8,
    #[builder(default)]
    #[cfg_attr(feature = "serde", serde(default))]
    pub unknown: u8,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parameter: Option<u16>,
}

#[cfg(feature = "serde")]
fn default_col_type() -> u16 {
    DEFAULT_COL_TYPE
}

impl Triangle {
    /// A triangle with the default attributes.
    pub fn new(vertex_indices: [u16; 3]) -> Self {
        Triangle::builder().vertex_indices(vertex_indices).build()
    }

    pub fn has_parameter(&self) -> bool {
        self.parameter.is_some()
    }

    /// High byte of the collision type, the first key field of a
    /// [`FormatVersion::Split`] group.
    pub fn col_class(&self) -> u8 {
        self.col_type.to_be_bytes()[0]
    }

    /// Low byte of the collision type.
    pub fn col_subclass(&self) -> u8 {
        self.col_type.to_be_bytes()[1]
    }

    pub(crate) fn group_key(&self) -> GroupKey {
        GroupKey {
            col_type: self.col_type,
            has_parameter: self.has_parameter(),
        }
    }
}

/// The attributes that decide which group a triangle is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GroupKey {
    pub col_type: u16,
    pub has_parameter: bool,
}

/// Reject triangles that point past the end of the vertex list.
pub(crate) fn check_vertex_indices(vertex_count: usize, triangles: &[Triangle]) -> ColResult<()> {
    for (i, triangle) in triangles.iter().enumerate() {
        if let Some(&index) = triangle
            .vertex_indices
            .iter()
            .find(|&&index| usize::from(index) >= vertex_count)
        {
            return Err(ColError::VertexIndex {
                triangle: i,
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}

/// Serialize a mesh into a complete collision file.
pub fn export_collision(
    vertices: &[Vertex],
    triangles: &[Triangle],
    version: FormatVersion,
) -> ColResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    pack(&mut cursor, vertices, triangles, version)?;
    Ok(cursor.into_inner())
}

/// Parse a complete collision file. Triangles come back group by group, in
/// group-table order.
pub fn import_collision(
    bytes: &[u8],
    version: FormatVersion,
) -> ColResult<(Vec<Vertex>, Vec<Triangle>)> {
    unpack(&mut Cursor::new(bytes), version)
}
