//! Pluggable byte-to-byte transform applied to object bodies before they
//! reach storage — typically compression. A store picks one codec and uses
//! it for every object; mixing codecs within a store produces
//! [`CodecError::Mismatch`] on decode.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("compression error: {0}")]
    Compression(String),
    #[error("decompression error: {0}")]
    Decompression(String),
    #[error("codec mismatch: bytes were not produced by the paired encoder")]
    Mismatch,
}

/// Runtime codec discriminant. Stored alongside a backend's configuration,
/// never negotiated per-object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    None,
    Zstd,
}

impl CodecId {
    pub fn name(self) -> &'static str {
        match self {
            CodecId::None => "none",
            CodecId::Zstd => "zstd",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(CodecId::None),
            "zstd" => Some(CodecId::Zstd),
            _ => None,
        }
    }
}

pub trait Codec: Send + Sync {
    fn id(&self) -> CodecId;
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn id(&self) -> CodecId {
        CodecId::None
    }
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }
}

pub struct ZstdCodec {
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        ZstdCodec { level: 3 }
    }
}

impl Codec for ZstdCodec {
    fn id(&self) -> CodecId {
        CodecId::Zstd
    }
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(data, self.level).map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(data).map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

/// Resolve a [`CodecId`] to a concrete codec instance.
pub fn get_codec(id: CodecId) -> Box<dyn Codec> {
    match id {
        CodecId::None => Box::new(NoneCodec),
        CodecId::Zstd => Box::new(ZstdCodec::default()),
    }
}
