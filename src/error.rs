use std::io;

use thiserror::Error;

/// Everything that can go wrong while packing or unpacking collision data.
///
/// All failures are fatal for the call that produced them; no partial results
/// are ever returned alongside an error.
#[derive(Error, Debug)]
pub enum ColError {
    /// A value did not fit its declared layout on pack, or the bytes did not
    /// describe a well-formed structure on unpack.
    #[error("Format error: {detail}")]
    Format { detail: String },
    #[error("Unexpected end of stream at 0x{offset:X} (needed {needed} more bytes)")]
    EndOfStream { offset: u64, needed: usize },
    #[error("Triangle {triangle} references vertex {index}, but only {vertex_count} vertices exist")]
    VertexIndex {
        triangle: usize,
        index: u16,
        vertex_count: usize,
    },
    #[cfg(feature = "json")]
    #[error("Error serializing or deserializing json: {err}")]
    SerdeJson {
        #[from]
        err: serde_json::Error,
    },
    #[error("IO error")]
    Io(#[from] io::Error),
}

impl ColError {
    pub fn format(detail: impl Into<String>) -> Self {
        ColError::Format {
            detail: detail.into(),
        }
    }
}

impl From<winnow::error::ErrMode<winnow::error::ContextError>> for ColError {
    fn from(e: winnow::error::ErrMode<winnow::error::ContextError>) -> Self {
        ColError::Format {
            detail: format!("{e}"),
        }
    }
}

pub type ColResult<T> = Result<T, ColError>;
