//! Wires together [`Storage`], [`Codec`], and [`WritePool`] into the single
//! handle the slicer, snapshot, and restore engines all share.

use std::sync::Arc;

use crate::codec::{get_codec, Codec, CodecId};
use crate::digest::{address_of, Address};
use crate::error::{OpiError, Result};
use crate::storage::Storage;
use crate::writepool::WritePool;

/// Tunable knobs for constructing an [`Engine`] — see `Config` in the
/// crate's configuration surface. The slicer's own constants are not part
/// of this surface; they are frozen.
pub struct EngineConfig {
    pub codec: CodecId,
    pub max_writers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { codec: CodecId::Zstd, max_writers: crate::writepool::DEFAULT_MAX_WRITERS }
    }
}

/// Binds a storage backend, a codec, and a bounded write pool together.
/// Every object an archive or restore touches flows through this handle.
pub struct Engine {
    storage: Arc<dyn Storage>,
    codec: Arc<dyn Codec>,
    pool: WritePool,
}

impl Engine {
    pub fn new(storage: Arc<dyn Storage>, config: EngineConfig) -> Self {
        let codec: Arc<dyn Codec> = Arc::from(get_codec(config.codec));
        let pool = WritePool::new(Arc::clone(&storage), config.max_writers);
        Engine { storage, codec, pool }
    }

    /// Compute the address of `body`, encode it, and hand it to the write
    /// pool. Returns the address immediately — the write itself may still
    /// be in flight; call [`Engine::drain`] before relying on durability.
    pub fn save(&self, body: &[u8]) -> Result<Address> {
        let addr = address_of(body);
        let encoded = self
            .codec
            .encode(body)
            .map_err(|e| OpiError::CodecMismatch(e.to_string()))?;
        self.pool.submit(addr.clone(), encoded);
        Ok(addr)
    }

    /// Fetch and decode an object body by address.
    pub fn fetch(&self, addr: &str) -> Result<Vec<u8>> {
        let raw = self.storage.get(addr)?;
        self.codec
            .decode(&raw)
            .map_err(|e| OpiError::CodecMismatch(e.to_string()))
    }

    /// Write the single non-content-addressed pointer record `name -> addr`,
    /// codec-encoded the same way every other object body is, per the
    /// "object bodies on the wire" contract.
    /// Only meaningful once [`Engine::drain`] has returned without error.
    pub fn set_pointer(&self, name: &str, addr: &Address) -> Result<()> {
        let encoded = self
            .codec
            .encode(addr.as_bytes())
            .map_err(|e| OpiError::CodecMismatch(e.to_string()))?;
        self.storage.set(name, &encoded)
    }

    /// Resolve a pointer record to the commit address it names.
    pub fn get_pointer(&self, name: &str) -> Result<Address> {
        let raw = self.storage.get(name)?;
        let decoded = self
            .codec
            .decode(&raw)
            .map_err(|e| OpiError::CodecMismatch(e.to_string()))?;
        String::from_utf8(decoded).map_err(|_| {
            OpiError::Decode { field: "pointer", object: "PointerRecord" }
        })
    }

    /// Block until every in-flight write has completed, surfacing the first
    /// background failure, if any.
    pub fn drain(&self) -> Result<()> {
        self.pool.drain()
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}
