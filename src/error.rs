use thiserror::Error;

/// The crate-wide error type. Every fallible operation in `opi` returns one
/// of these variants; nothing panics on a malformed store or filesystem.
#[derive(Debug, Error)]
pub enum OpiError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("decode error: field {field:?} of {object} is malformed")]
    Decode { field: &'static str, object: &'static str },

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("codec mismatch: {0}")]
    CodecMismatch(String),
}

pub type Result<T> = std::result::Result<T, OpiError>;
