use std::fs;
use std::os::unix::fs::symlink;
use std::sync::Arc;

use opi::{archive, restore, Commit, Dir, Engine, EngineConfig, FileType, FsStorage, MetaType, SuperChunk};
use tempfile::tempdir;

fn random_bytes(n: usize, seed: u32) -> Vec<u8> {
    (0..n as u32).map(|i| ((i.wrapping_add(seed)).wrapping_mul(2654435761) >> 24) as u8).collect()
}

fn leaf_addrs(engine: &Engine, addr: &str, out: &mut Vec<String>) {
    match engine.fetch(addr).ok().and_then(|b| SuperChunk::from_bytes(&b).ok()) {
        Some(sc) => {
            for child in &sc.children {
                match child.meta_type {
                    MetaType::Chunk => out.push(child.addr.clone()),
                    MetaType::SuperChunk => leaf_addrs(engine, &child.addr, out),
                }
            }
        }
        None => out.push(addr.to_string()),
    }
}

#[test]
fn archive_restore_roundtrip_over_fs_storage() {
    let src = tempdir().unwrap();
    fs::create_dir_all(src.path().join("a/b")).unwrap();
    fs::write(src.path().join("a/b/small.txt"), b"hello world").unwrap();
    fs::write(src.path().join("a/empty.txt"), b"").unwrap();
    symlink("../nowhere", src.path().join("a/dangling")).unwrap();
    fs::write(src.path().join("top.bin"), random_bytes(64 * 1024, 7)).unwrap();

    let store_dir = tempdir().unwrap();
    let storage = Arc::new(FsStorage::open(store_dir.path()).unwrap());
    let engine = Engine::new(storage, EngineConfig::default());

    archive(&engine, src.path(), "nightly").unwrap();

    let dst = tempdir().unwrap();
    restore(&engine, "nightly", dst.path()).unwrap();

    assert_eq!(fs::read(dst.path().join("a/b/small.txt")).unwrap(), b"hello world");
    assert_eq!(fs::read(dst.path().join("a/empty.txt")).unwrap(), b"");
    assert_eq!(fs::read_link(dst.path().join("a/dangling")).unwrap().as_os_str(), "../nowhere");
    assert_eq!(fs::read(dst.path().join("top.bin")).unwrap(), random_bytes(64 * 1024, 7));
}

#[test]
fn two_archives_of_identical_tree_share_tree_address() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("f"), b"stable content").unwrap();

    let engine = Engine::new(Arc::new(opi::MemoryStorage::new()), EngineConfig::default());
    let c1 = archive(&engine, src.path(), "snap-a").unwrap();
    let c2 = archive(&engine, src.path(), "snap-b").unwrap();

    let commit1 = Commit::from_bytes(&engine.fetch(&c1).unwrap()).unwrap();
    let commit2 = Commit::from_bytes(&engine.fetch(&c2).unwrap()).unwrap();
    assert_eq!(commit1.tree, commit2.tree);
}

#[test]
fn inserting_a_prefix_byte_preserves_most_leaf_chunks() {
    let base: Vec<u8> = random_bytes(1024 * 1024, 42);

    let src1 = tempdir().unwrap();
    fs::write(src1.path().join("f"), &base).unwrap();
    let engine = Engine::new(Arc::new(opi::MemoryStorage::new()), EngineConfig::default());
    archive(&engine, src1.path(), "before").unwrap();

    let mut shifted = vec![b'X'];
    shifted.extend_from_slice(&base);
    let src2 = tempdir().unwrap();
    fs::write(src2.path().join("f"), &shifted).unwrap();
    archive(&engine, src2.path(), "after").unwrap();

    let tree_addr = |name: &str| {
        let commit_addr = engine.get_pointer(name).unwrap();
        Commit::from_bytes(&engine.fetch(&commit_addr).unwrap()).unwrap().tree
    };
    let file_addr = |tree: &str| {
        let dir = Dir::from_bytes(&engine.fetch(tree).unwrap()).unwrap();
        assert!(matches!(dir.entries[0].file_type, FileType::FileSuperChunk));
        dir.entries[0].addr.clone()
    };

    let root_before = file_addr(&tree_addr("before"));
    let root_after = file_addr(&tree_addr("after"));

    let mut before_leaves = Vec::new();
    leaf_addrs(&engine, &root_before, &mut before_leaves);
    let mut after_leaves = Vec::new();
    leaf_addrs(&engine, &root_after, &mut after_leaves);

    let before_set: std::collections::HashSet<_> = before_leaves.iter().collect();
    let shared = after_leaves.iter().filter(|a| before_set.contains(a)).count();

    let expected_min = (before_leaves.len() / (8 * 1024 / 64)).saturating_sub(2).max(1);
    assert!(
        shared >= expected_min,
        "expected at least {expected_min} shared leaf chunks after a prefix insert, got {shared}"
    );
}
