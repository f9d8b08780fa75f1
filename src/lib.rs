//! # opi — content-addressed, deduplicating filesystem snapshots
//!
//! Guarantees:
//! - Every stored object is named by the SHA-512 digest of its canonical,
//!   pre-codec body — two snapshots that share content share addresses.
//! - File content is split into variable-length chunks by a rolling-hash
//!   boundary detector, not fixed offsets, so a prefix insert/delete only
//!   perturbs chunking locally.
//! - Objects are immutable once written; a snapshot name resolves through
//!   exactly one non-content-addressed pointer record to a commit.
//! - `Storage` and `Codec` are pluggable; the engine never assumes a
//!   concrete backend.

pub mod bencode;
pub mod codec;
pub mod digest;
pub mod engine;
pub mod error;
pub mod object;
pub mod restore;
pub mod rolling;
pub mod slicer;
pub mod snapshot;
pub mod storage;
pub mod writepool;

pub use codec::{Codec, CodecId};
pub use digest::{address_of, Address};
pub use engine::{Engine, EngineConfig};
pub use error::{OpiError, Result};
pub use object::{Chunk, Commit, Dir, DirEntry, FileType, MetaType, SuperChunk, SuperChunkChild, Symlink};
pub use restore::restore;
pub use snapshot::archive;
pub use storage::{FsStorage, MemoryStorage, Storage};
