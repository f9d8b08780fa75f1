//! The restore engine: the mirror image of [`crate::snapshot`]. Walks a
//! commit's tree and materializes directories, symlinks, and files under a
//! destination path.

use std::ffi::OsStr;
use std::fs::{self, Permissions};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

use tracing::instrument;

use crate::digest::Address;
use crate::engine::Engine;
use crate::error::{OpiError, Result};
use crate::object::{Chunk, Commit, Dir, FileType, MetaType, SuperChunk, Symlink};

/// Resolve `name` to its commit and rebuild the tree it names under `dest`.
/// `dest` must already exist and be an empty (or at least non-conflicting)
/// directory.
#[instrument(skip(engine), fields(name, dest = %dest.display()))]
pub fn restore(engine: &Engine, name: &str, dest: &Path) -> Result<()> {
    let commit_addr = engine.get_pointer(name)?;
    let commit = Commit::from_bytes(&engine.fetch(&commit_addr)?)?;
    rebuild(engine, &commit.tree, dest)
}

fn rebuild(engine: &Engine, addr: &Address, dest: &Path) -> Result<()> {
    let meta = fs::metadata(dest).map_err(OpiError::Io)?;
    if !meta.is_dir() {
        return Err(OpiError::Invariant(format!("restore destination {} is not a directory", dest.display())));
    }

    let dir = Dir::from_bytes(&engine.fetch(addr)?)?;
    for entry in &dir.entries {
        let name = OsStr::from_bytes(&entry.name);
        let target = dest.join(name);
        if target.symlink_metadata().is_ok() {
            return Err(OpiError::Invariant(format!("{} already exists", target.display())));
        }

        match entry.file_type {
            FileType::Dir => {
                fs::create_dir(&target)?;
                rebuild(engine, &entry.addr, &target)?;
            }
            FileType::Symlink => {
                let link = Symlink::from_bytes(&engine.fetch(&entry.addr)?);
                symlink(OsStr::from_bytes(&link.target), &target)?;
            }
            FileType::FileChunk => {
                write_chunk(engine, &entry.addr, &target)?;
            }
            FileType::FileSuperChunk => {
                let mut file = fs::File::create(&target)?;
                glue(engine, &entry.addr, &mut file)?;
            }
        }

        if !matches!(entry.file_type, FileType::Symlink) {
            fs::set_permissions(&target, Permissions::from_mode(entry.mode))?;
        }
    }
    Ok(())
}

fn write_chunk(engine: &Engine, addr: &Address, target: &Path) -> Result<()> {
    let chunk = Chunk::from_bytes(&engine.fetch(addr)?);
    fs::write(target, chunk.data)?;
    Ok(())
}

/// Reconstruct the bytes of a [`SuperChunk`] subtree into `writer`, in
/// ascending offset order (the order children are listed in, per the
/// slicer's own invariant).
fn glue<W: Write>(engine: &Engine, addr: &Address, writer: &mut W) -> Result<()> {
    let super_chunk = SuperChunk::from_bytes(&engine.fetch(addr)?)?;
    for child in &super_chunk.children {
        match child.meta_type {
            MetaType::Chunk => {
                let chunk = Chunk::from_bytes(&engine.fetch(&child.addr)?);
                writer.write_all(&chunk.data)?;
            }
            MetaType::SuperChunk => {
                glue(engine, &child.addr, writer)?;
            }
        }
    }
    Ok(())
}
