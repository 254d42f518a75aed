/// Generic fixed-layout binary codecs (primitives, struct layouts, streams)
pub mod binary;
/// Reading and writing grouped mesh collision files
pub mod collision;
/// Error definitions
pub mod error;

pub use collision::{
    FormatVersion, Triangle, Vertex, export_collision, import_collision,
};
pub use error::{ColError, ColResult};
