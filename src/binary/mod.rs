//! Generic fixed-layout binary codecs.

/// Primitive field codecs and the dynamic value model
pub mod primitive;
/// Seekable byte streams the codecs read from and write to
pub mod stream;
/// Ordered struct layouts with padding
pub mod structure;

pub use primitive::{FieldType, Primitive, Value};
pub use stream::{Positioned, Sink, Source};
pub use structure::{Record, StructDef, align};
pub use winnow::binary::Endianness;
