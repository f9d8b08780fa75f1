//! Object addressing: every stored object is named by the lowercase-hex
//! SHA-512 digest of its canonical, pre-codec serialized body.

use sha2::{Digest, Sha512};

/// A content address: lowercase hex of a SHA-512 digest.
pub type Address = String;

/// Digest `body` and return its address. This is the only place in the
/// crate that computes an address — callers never hand-roll hex encoding.
pub fn address_of(body: &[u8]) -> Address {
    let mut hasher = Sha512::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_stable() {
        let a = address_of(b"");
        let b = address_of(b"");
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
    }

    #[test]
    fn distinct_bodies_distinct_addresses() {
        assert_ne!(address_of(b"a"), address_of(b"b"));
    }
}
