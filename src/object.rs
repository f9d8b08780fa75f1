//! The five object kinds addressed and stored by `opi`: [`Chunk`],
//! [`SuperChunk`], [`Dir`], [`Symlink`], [`Commit`]. Each has a canonical
//! byte encoding (`crate::bencode`) used to compute its address
//! (`crate::digest`) and to persist it to storage.
//!
//! The untyped bencode [`bencode::Value`] never crosses this module's
//! boundary — callers only ever see the typed structs below.

use crate::bencode::{self, Value};
use crate::digest::Address;
use crate::error::OpiError;

const COMMIT_DATE_FORMAT: &str = "%a %b %e %H:%M:%S UTC %Y";

/// What a [`SuperChunk`] child or [`DirEntry`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaType {
    Chunk,
    SuperChunk,
}

impl MetaType {
    fn to_byte(self) -> u8 {
        match self {
            MetaType::Chunk => b'C',
            MetaType::SuperChunk => b'S',
        }
    }

    fn from_byte(b: u8, field: &'static str, object: &'static str) -> Result<Self, OpiError> {
        match b {
            b'C' => Ok(MetaType::Chunk),
            b'S' => Ok(MetaType::SuperChunk),
            _ => Err(OpiError::Decode { field, object }),
        }
    }
}

/// What a [`DirEntry`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Dir,
    Symlink,
    FileChunk,
    FileSuperChunk,
}

impl FileType {
    fn to_byte(self) -> u8 {
        match self {
            FileType::Dir => b'd',
            FileType::Symlink => b'l',
            FileType::FileChunk => b'C',
            FileType::FileSuperChunk => b'S',
        }
    }

    fn from_byte(b: u8, field: &'static str, object: &'static str) -> Result<Self, OpiError> {
        match b {
            b'd' => Ok(FileType::Dir),
            b'l' => Ok(FileType::Symlink),
            b'C' => Ok(FileType::FileChunk),
            b'S' => Ok(FileType::FileSuperChunk),
            _ => Err(OpiError::Decode { field, object }),
        }
    }

    pub fn from_meta(m: MetaType) -> Self {
        match m {
            MetaType::Chunk => FileType::FileChunk,
            MetaType::SuperChunk => FileType::FileSuperChunk,
        }
    }
}

/// A leaf object: an opaque slice of file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Chunk { data: data.to_vec() }
    }
}

/// One child of a [`SuperChunk`]: where it starts in the reconstructed
/// stream, whether it is itself a chunk or a nested superchunk, and its
/// address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperChunkChild {
    pub offset: u64,
    pub meta_type: MetaType,
    pub addr: Address,
}

/// An interior tree node grouping two or more children in ascending offset
/// order. A single-child superchunk is never constructed — see the slicer's
/// collapse rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SuperChunk {
    pub children: Vec<SuperChunkChild>,
}

impl SuperChunk {
    const OBJ: &'static str = "SuperChunk";

    pub fn to_bytes(&self) -> Vec<u8> {
        let list = Value::List(
            self.children
                .iter()
                .map(|c| {
                    Value::List(vec![
                        Value::Int(c.offset as i64),
                        Value::Int(c.meta_type.to_byte() as i64),
                        Value::Bytes(c.addr.as_bytes().to_vec()),
                    ])
                })
                .collect(),
        );
        bencode::encode(&list)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, OpiError> {
        let v = bencode::decode_exact(data, "children", Self::OBJ)?;
        let items = v.as_list("children", Self::OBJ)?;
        let mut children = Vec::with_capacity(items.len());
        for item in items {
            let triple = item.as_list("child", Self::OBJ)?;
            if triple.len() != 3 {
                return Err(OpiError::Decode { field: "child", object: Self::OBJ });
            }
            let offset = triple[0].as_int("offset", Self::OBJ)? as u64;
            let meta_byte = triple[1].as_int("meta_type", Self::OBJ)? as u8;
            let meta_type = MetaType::from_byte(meta_byte, "meta_type", Self::OBJ)?;
            let addr_bytes = triple[2].as_bytes("addr", Self::OBJ)?;
            let addr = String::from_utf8(addr_bytes.to_vec())
                .map_err(|_| OpiError::Decode { field: "addr", object: Self::OBJ })?;
            children.push(SuperChunkChild { offset, meta_type, addr });
        }
        Ok(SuperChunk { children })
    }
}

/// One entry in a [`Dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub file_type: FileType,
    pub mode: u32,
    pub name: Vec<u8>,
    pub xattr: Vec<u8>,
    pub addr: Address,
}

/// A directory snapshot: its entries in the order they must be replayed on
/// restore (lexicographic by name, fixed at archive time).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dir {
    pub entries: Vec<DirEntry>,
}

impl Dir {
    const OBJ: &'static str = "Dir";

    pub fn to_bytes(&self) -> Vec<u8> {
        let list = Value::List(
            self.entries
                .iter()
                .map(|e| {
                    Value::List(vec![
                        Value::Int(e.file_type.to_byte() as i64),
                        Value::Int(e.mode as i64),
                        Value::Bytes(e.name.clone()),
                        Value::Bytes(e.xattr.clone()),
                        Value::Bytes(e.addr.as_bytes().to_vec()),
                    ])
                })
                .collect(),
        );
        bencode::encode(&list)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, OpiError> {
        let v = bencode::decode_exact(data, "entries", Self::OBJ)?;
        let items = v.as_list("entries", Self::OBJ)?;
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let fields = item.as_list("entry", Self::OBJ)?;
            if fields.len() != 5 {
                return Err(OpiError::Decode { field: "entry", object: Self::OBJ });
            }
            let file_type = FileType::from_byte(
                fields[0].as_int("file_type", Self::OBJ)? as u8,
                "file_type",
                Self::OBJ,
            )?;
            let mode = fields[1].as_int("mode", Self::OBJ)? as u32;
            let name = fields[2].as_bytes("name", Self::OBJ)?.to_vec();
            let xattr = fields[3].as_bytes("xattr", Self::OBJ)?.to_vec();
            let addr_bytes = fields[4].as_bytes("addr", Self::OBJ)?;
            let addr = String::from_utf8(addr_bytes.to_vec())
                .map_err(|_| OpiError::Decode { field: "addr", object: Self::OBJ })?;
            entries.push(DirEntry { file_type, mode, name, xattr, addr });
        }
        Ok(Dir { entries })
    }
}

/// A symbolic link's target, stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symlink {
    pub target: Vec<u8>,
}

impl Symlink {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.target.clone()
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Symlink { target: data.to_vec() }
    }
}

/// A named, timestamped pointer to a snapshot's root [`Dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub date: String,
    pub tree: Address,
    pub host: String,
    pub replica: String,
    pub parents: Vec<Address>,
}

impl Commit {
    const OBJ: &'static str = "Commit";

    pub fn format_date(dt: chrono::DateTime<chrono::Utc>) -> String {
        dt.format(COMMIT_DATE_FORMAT).to_string()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let list = Value::List(vec![
            Value::Bytes(self.date.clone().into_bytes()),
            Value::Bytes(self.tree.as_bytes().to_vec()),
            Value::Bytes(self.host.clone().into_bytes()),
            Value::Bytes(self.replica.clone().into_bytes()),
            Value::List(self.parents.iter().map(|p| Value::Bytes(p.as_bytes().to_vec())).collect()),
        ]);
        bencode::encode(&list)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, OpiError> {
        let v = bencode::decode_exact(data, "commit", Self::OBJ)?;
        let fields = v.as_list("commit", Self::OBJ)?;
        if fields.len() != 5 {
            return Err(OpiError::Decode { field: "commit", object: Self::OBJ });
        }
        let to_string = |b: &[u8]| {
            String::from_utf8(b.to_vec()).map_err(|_| OpiError::Decode { field: "utf8", object: Self::OBJ })
        };
        let date = to_string(fields[0].as_bytes("date", Self::OBJ)?)?;
        let tree = to_string(fields[1].as_bytes("tree", Self::OBJ)?)?;
        let host = to_string(fields[2].as_bytes("host", Self::OBJ)?)?;
        let replica = to_string(fields[3].as_bytes("replica", Self::OBJ)?)?;
        let parent_items = fields[4].as_list("parents", Self::OBJ)?;
        let mut parents = Vec::with_capacity(parent_items.len());
        for p in parent_items {
            parents.push(to_string(p.as_bytes("parent", Self::OBJ)?)?);
        }
        Ok(Commit { date, tree, host, replica, parents })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_roundtrip() {
        let c = Chunk { data: b"hello world".to_vec() };
        assert_eq!(Chunk::from_bytes(&c.to_bytes()), c);
    }

    #[test]
    fn superchunk_roundtrip() {
        let s = SuperChunk {
            children: vec![
                SuperChunkChild { offset: 0, meta_type: MetaType::Chunk, addr: "aa".into() },
                SuperChunkChild { offset: 10, meta_type: MetaType::SuperChunk, addr: "bb".into() },
            ],
        };
        assert_eq!(SuperChunk::from_bytes(&s.to_bytes()).unwrap(), s);
    }

    #[test]
    fn dir_roundtrip() {
        let d = Dir {
            entries: vec![DirEntry {
                file_type: FileType::FileChunk,
                mode: 0o644,
                name: b"f".to_vec(),
                xattr: vec![],
                addr: "deadbeef".into(),
            }],
        };
        assert_eq!(Dir::from_bytes(&d.to_bytes()).unwrap(), d);
    }

    #[test]
    fn symlink_roundtrip() {
        let s = Symlink { target: b"../target".to_vec() };
        assert_eq!(Symlink::from_bytes(&s.to_bytes()), s);
    }

    #[test]
    fn commit_roundtrip() {
        let c = Commit {
            date: "Tue Jul 28 00:00:00 UTC 2026".into(),
            tree: "aa".into(),
            host: "host1".into(),
            replica: "host1".into(),
            parents: vec!["bb".into(), "cc".into()],
        };
        assert_eq!(Commit::from_bytes(&c.to_bytes()).unwrap(), c);
    }

    #[test]
    fn superchunk_rejects_malformed_child() {
        let v = Value::List(vec![Value::List(vec![Value::Int(0), Value::Int(b'C' as i64)])]);
        let bytes = bencode::encode(&v);
        assert!(SuperChunk::from_bytes(&bytes).is_err());
    }
}
