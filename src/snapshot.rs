//! The archive engine: walks a filesystem subtree, slicing regular files
//! and wrapping directories/symlinks into objects, then commits the result
//! under a named pointer record.

use std::fs;
use std::io::BufReader;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::digest::Address;
use crate::engine::Engine;
use crate::error::{OpiError, Result};
use crate::object::{Commit, Dir, DirEntry, FileType, Symlink};
use crate::slicer::{slice_until, top_mask};

fn host_identifier() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// Recursively snapshot `path` (a directory) into a [`Dir`] object, return
/// its address. Entries are sorted lexicographically by name so repeated
/// archives of an unchanged tree produce byte-identical Dir bodies.
#[instrument(skip(engine), fields(path = %path.display()))]
fn snapshot_dir(engine: &Engine, path: &Path) -> Result<Address> {
    let mut names: Vec<std::ffi::OsString> = fs::read_dir(path)?
        .map(|e| e.map(|e| e.file_name()))
        .collect::<std::io::Result<_>>()?;
    names.sort_by(|a, b| a.as_encoded_bytes().cmp(b.as_encoded_bytes()));

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let child_path = path.join(&name);
        if let Some(entry) = build_entry(engine, &child_path, name.as_encoded_bytes().to_vec())? {
            entries.push(entry);
        }
    }

    let dir = Dir { entries };
    engine.save(&dir.to_bytes())
}

fn build_entry(engine: &Engine, path: &Path, name: Vec<u8>) -> Result<Option<DirEntry>> {
    let meta = fs::symlink_metadata(path)?;
    let mode = meta.mode() & 0o7777;
    let ft = meta.file_type();

    if ft.is_dir() {
        let addr = snapshot_dir(engine, path)?;
        return Ok(Some(DirEntry { file_type: FileType::Dir, mode, name, xattr: Vec::new(), addr }));
    }
    if ft.is_symlink() {
        let target = fs::read_link(path)?;
        let symlink = Symlink { target: target.as_os_str().as_encoded_bytes().to_vec() };
        let addr = engine.save(&symlink.to_bytes())?;
        return Ok(Some(DirEntry { file_type: FileType::Symlink, mode, name, xattr: Vec::new(), addr }));
    }
    if ft.is_file() {
        let file = fs::File::open(path)?;
        let mut reader = BufReader::new(file);
        let result = slice_until(engine, &mut reader, top_mask())?;
        let file_type = FileType::from_meta(result.meta_type);
        return Ok(Some(DirEntry { file_type, mode, name, xattr: Vec::new(), addr: result.addr }));
    }

    warn!(path = %path.display(), "skipping unsupported file type");
    Ok(None)
}

/// Archive `path` (must be a directory) and record it under `name`.
/// Returns the address of the resulting commit object.
///
/// The pointer record is only written once the write pool has drained
/// without error, so a failed archive never leaves a dereferenceable
/// partial snapshot behind.
#[instrument(skip(engine), fields(path = %path.display(), name))]
pub fn archive(engine: &Engine, path: &Path, name: &str) -> Result<Address> {
    let meta = fs::symlink_metadata(path)?;
    if !meta.file_type().is_dir() {
        return Err(OpiError::Invariant(format!("archive root {} is not a directory", path.display())));
    }

    let tree = snapshot_dir(engine, path)?;
    let host = host_identifier();
    let commit = Commit {
        date: Commit::format_date(Utc::now()),
        tree,
        host: host.clone(),
        replica: host,
        parents: Vec::new(),
    };
    let commit_addr = engine.save(&commit.to_bytes())?;

    engine.drain()?;
    engine.set_pointer(name, &commit_addr)?;
    info!(name, commit = %commit_addr, "archive complete");
    Ok(commit_addr)
}
