//! JSON interchange for meshes handed to or received from external tools.

use serde::{Deserialize, Serialize};

use crate::collision::{FormatVersion, Triangle, Vertex, export_collision, import_collision};
use crate::error::ColResult;

/// A plain vertex + triangle list, as exchanged with editors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn from_json(data: &[u8]) -> ColResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_json(&self) -> ColResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_collision(bytes: &[u8], version: FormatVersion) -> ColResult<Self> {
        let (vertices, triangles) = import_collision(bytes, version)?;
        Ok(Mesh {
            vertices,
            triangles,
        })
    }

    pub fn to_collision(&self, version: FormatVersion) -> ColResult<Vec<u8>> {
        export_collision(&self.vertices, &self.triangles, version)
    }

    /// Reinterpret every vertex from a Z-up frame into the game's Y-up frame.
    pub fn convert_z_up(&mut self) {
        for vertex in &mut self.vertices {
            *vertex = Vertex::from_z_up(vertex.x, vertex.y, vertex.z);
        }
    }
}
