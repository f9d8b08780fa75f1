//! Content-defined chunking: splits a byte stream into a balanced tree of
//! [`Chunk`](crate::object::Chunk) and [`SuperChunk`](crate::object::SuperChunk)
//! objects, with boundaries chosen by a rolling hash rather than fixed
//! offsets, so inserting or deleting bytes only perturbs chunking locally.
//!
//! The constants below are frozen: they are part of the content-addressing
//! contract, and changing them changes every address a given input
//! produces. They are deliberately not part of [`crate::engine::EngineConfig`].

use std::io::Read;

use tracing::trace;

use crate::digest::Address;
use crate::engine::Engine;
use crate::error::Result;
use crate::object::{MetaType, SuperChunk, SuperChunkChild};
use crate::rolling::RollingHash;

pub const CHUNK_BITS: u32 = 13;
pub const FANOUT: u32 = 4;
pub const WINDOW_SIZE: usize = 128;
pub const HASH_BITS: u32 = 32;
/// `2^(CHUNK_BITS+3)`, matching the original reference's formula.
pub const MAX_CHUNK_SIZE: usize = 1 << (CHUNK_BITS + 3);
pub const CHUNK_MASK: u32 = mask_for_bits(CHUNK_BITS);

const fn mask_for_bits(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

fn top_level() -> u32 {
    let mut level = 0u32;
    loop {
        let next = level + 1;
        if CHUNK_BITS + next * FANOUT > HASH_BITS {
            break;
        }
        level = next;
    }
    level
}

/// The mask at the top of the tree: slicing at this mask never terminates on
/// a hash match, only on end-of-stream, guaranteeing exactly one root object
/// per sliced stream regardless of its size.
pub fn top_mask() -> u32 {
    mask_for_bits(CHUNK_BITS + top_level() * FANOUT)
}

/// Outcome of slicing (a sub-tree of) a stream: how many bytes it covers,
/// where it was stored, and the rolling hash state at the point slicing
/// stopped (used by the caller to decide whether ITS boundary fired too).
pub struct SliceResult {
    pub len: u64,
    pub addr: Address,
    pub meta_type: MetaType,
    pub rollsum: u32,
    pub eof: bool,
}

fn read_byte<R: Read + ?Sized>(stream: &mut R) -> Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        return match stream.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => Err(e.into()),
        };
    }
}

/// Slice `stream` at `mask`. Called at the top with [`top_mask`]; recurses
/// down to `CHUNK_MASK` where leaf [`Chunk`](crate::object::Chunk)s are cut.
pub fn slice_until<R: Read + ?Sized>(engine: &Engine, stream: &mut R, mask: u32) -> Result<SliceResult> {
    if mask > CHUNK_MASK {
        slice_superchunk(engine, stream, mask)
    } else {
        slice_chunk(engine, stream)
    }
}

fn slice_superchunk<R: Read + ?Sized>(engine: &Engine, stream: &mut R, mask: u32) -> Result<SliceResult> {
    let top = top_mask();
    let mut children: Vec<SuperChunkChild> = Vec::new();
    let mut offset: u64 = 0;
    let mut last_roll = 0u32;
    let mut last_eof = false;

    loop {
        let child = slice_until(engine, stream, mask >> FANOUT)?;
        children.push(SuperChunkChild { offset, meta_type: child.meta_type, addr: child.addr });
        offset += child.len;
        last_roll = child.rollsum;
        last_eof = child.eof;

        if (last_roll & mask == mask && mask < top) || last_eof {
            break;
        }
    }

    if children.len() == 1 {
        let only = children.into_iter().next().expect("checked len == 1");
        return Ok(SliceResult {
            len: offset,
            addr: only.addr,
            meta_type: only.meta_type,
            rollsum: last_roll,
            eof: last_eof,
        });
    }

    let super_chunk = SuperChunk { children };
    let body = super_chunk.to_bytes();
    let addr = engine.save(&body)?;
    trace!(addr = %addr, children = super_chunk.children.len(), "wrote superchunk");
    Ok(SliceResult { len: offset, addr, meta_type: MetaType::SuperChunk, rollsum: last_roll, eof: last_eof })
}

fn slice_chunk<R: Read + ?Sized>(engine: &Engine, stream: &mut R) -> Result<SliceResult> {
    let mut buf = Vec::with_capacity(MAX_CHUNK_SIZE);
    let mut window = vec![0u8; WINDOW_SIZE];
    let mut filled = 0usize;
    while filled < WINDOW_SIZE {
        match read_byte(stream)? {
            Some(b) => {
                window[filled] = b;
                filled += 1;
            }
            None => break,
        }
    }
    buf.extend_from_slice(&window[..filled]);

    if filled < WINDOW_SIZE {
        let addr = engine.save(&buf)?;
        return Ok(SliceResult { len: buf.len() as u64, addr, meta_type: MetaType::Chunk, rollsum: 0, eof: true });
    }

    let mut roll = RollingHash::new(WINDOW_SIZE);
    roll.write(&window);
    let mut sum = roll.sum();
    let mut eof = false;

    loop {
        if sum & CHUNK_MASK == CHUNK_MASK || buf.len() >= MAX_CHUNK_SIZE {
            break;
        }
        match read_byte(stream)? {
            Some(b) => {
                buf.push(b);
                roll.roll(b);
                sum = roll.sum();
            }
            None => {
                eof = true;
                break;
            }
        }
    }

    let addr = engine.save(&buf)?;
    trace!(addr = %addr, len = buf.len(), "wrote chunk");
    Ok(SliceResult { len: buf.len() as u64, addr, meta_type: MetaType::Chunk, rollsum: sum, eof })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineConfig};
    use crate::storage::MemoryStorage;
    use std::io::Cursor;
    use std::sync::Arc;

    fn fresh_engine() -> Engine {
        Engine::new(Arc::new(MemoryStorage::new()), EngineConfig::default())
    }

    #[test]
    fn top_mask_matches_reference_constants() {
        // chunkBits=13, fanout=4, B=32 -> level 4, 29 trailing one bits.
        assert_eq!(top_mask(), 0x1FFF_FFFF);
    }

    #[test]
    fn empty_stream_yields_empty_chunk() {
        let engine = fresh_engine();
        let mut stream = Cursor::new(Vec::<u8>::new());
        let result = slice_until(&engine, &mut stream, top_mask()).unwrap();
        engine.drain().unwrap();
        assert!(matches!(result.meta_type, MetaType::Chunk));
        let body = engine.fetch(&result.addr).unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn small_stream_is_single_chunk() {
        let engine = fresh_engine();
        let mut stream = Cursor::new(b"hello".to_vec());
        let result = slice_until(&engine, &mut stream, top_mask()).unwrap();
        engine.drain().unwrap();
        assert!(matches!(result.meta_type, MetaType::Chunk));
        assert_eq!(engine.fetch(&result.addr).unwrap(), b"hello");
    }

    #[test]
    fn slicing_is_deterministic() {
        let data: Vec<u8> = (0u32..500_000).map(|i| (i * 2654435761u32 >> 24) as u8).collect();
        let engine1 = fresh_engine();
        let mut s1 = Cursor::new(data.clone());
        let r1 = slice_until(&engine1, &mut s1, top_mask()).unwrap();
        engine1.drain().unwrap();

        let engine2 = fresh_engine();
        let mut s2 = Cursor::new(data);
        let r2 = slice_until(&engine2, &mut s2, top_mask()).unwrap();
        engine2.drain().unwrap();

        assert_eq!(r1.addr, r2.addr);
    }

    #[test]
    fn large_stream_builds_superchunk_tree_with_no_singleton_nodes() {
        let data: Vec<u8> = (0u32..2_000_000).map(|i| (i * 2654435761u32 >> 24) as u8).collect();
        let engine = fresh_engine();
        let mut stream = Cursor::new(data.clone());
        let result = slice_until(&engine, &mut stream, top_mask()).unwrap();
        engine.drain().unwrap();

        assert!(matches!(result.meta_type, MetaType::SuperChunk));

        fn check(engine: &Engine, addr: &str, expect_min_children: usize) -> u64 {
            let body = engine.fetch(addr).unwrap();
            match SuperChunk::from_bytes(&body) {
                Ok(sc) => {
                    assert!(sc.children.len() >= expect_min_children, "no singleton superchunks");
                    let mut prev_offset: i64 = -1;
                    let mut total = 0u64;
                    for child in &sc.children {
                        assert!((child.offset as i64) > prev_offset);
                        prev_offset = child.offset as i64;
                        total += match child.meta_type {
                            MetaType::Chunk => engine.fetch(&child.addr).unwrap().len() as u64,
                            MetaType::SuperChunk => check(engine, &child.addr, 2),
                        };
                    }
                    total
                }
                Err(_) => engine.fetch(addr).unwrap().len() as u64,
            }
        }

        let total = check(&engine, &result.addr, 2);
        assert_eq!(total, data.len() as u64);
    }
}
