//! The key/value contract every backend must satisfy, plus two reference
//! implementations (in-memory, single-directory-file) sufficient to
//! exercise and demonstrate the engine. Neither is a production backend —
//! see the crate-level docs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{OpiError, Result};

/// Key/value contract the archive and restore engines depend on. `Hit` is an
/// advisory touch (e.g. for an LRU or GC pass) that both reference backends
/// treat as a no-op.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Vec<u8>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
    fn del(&self, key: &str) -> Result<()>;
    fn hit(&self, key: &str) -> Result<()>;
    fn close(&self) -> Result<()>;
}

/// In-memory backend behind a mutex-guarded map. Used by tests and for
/// embedding `opi` inside a longer-lived process without touching disk.
#[derive(Default)]
pub struct MemoryStorage {
    map: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let map = self.map.lock().expect("memory storage lock poisoned");
        map.get(key).cloned().ok_or_else(|| OpiError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut map = self.map.lock().expect("memory storage lock poisoned");
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn del(&self, key: &str) -> Result<()> {
        let mut map = self.map.lock().expect("memory storage lock poisoned");
        map.remove(key);
        Ok(())
    }

    fn hit(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// One file per key, named by the key's own text (keys are already
/// hex-address-shaped or simple snapshot names, so no extra encoding is
/// needed). Used as the CLI's default backend.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(FsStorage { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl Storage for FsStorage {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        match fs::read(self.path_for(key)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OpiError::NotFound(key.to_string()))
            }
            Err(e) => Err(OpiError::Io(e)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn del(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OpiError::Io(e)),
        }
    }

    fn hit(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    // (nothing else; directory listing for the CLI's `list` subcommand reads
    // `root` directly rather than going through the Storage trait)
}

impl FsStorage {
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if !name.ends_with(".tmp") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
