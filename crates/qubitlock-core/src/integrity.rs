//! Chunked SHA-256 integrity tree over stored ciphertext
//!
//! The root is computed by hashing fixed-size chunks and reducing the hex digests
//! pairwise, level by level, until one remains. An odd trailing digest is paired
//! with itself. The same function runs on the write and read paths, so any change
//! to the stored bytes changes the root.

use sha2::{Digest, Sha256};

/// Leaf chunk size in bytes. The final chunk may be shorter.
pub const CHUNK_SIZE: usize = 1024;

/// Length of a root rendered as lowercase hex
pub const ROOT_HEX_LEN: usize = 64;

/// SHA-256 of `data` as lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex digest of every `CHUNK_SIZE` chunk, in order
pub fn leaf_hashes(data: &[u8]) -> Vec<String> {
    data.chunks(CHUNK_SIZE).map(sha256_hex).collect()
}

fn parent_hash(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

/// Reduce one level: adjacent pairs left to right, odd tail paired with itself.
fn next_level(level: &[String]) -> Vec<String> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => parent_hash(left, right),
            [single] => parent_hash(single, single),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Compute the integrity root of `data`.
///
/// Returns an empty string for empty input. A single-chunk input's root is that
/// chunk's own digest.
pub fn compute_root(data: &[u8]) -> String {
    let mut level = leaf_hashes(data);
    while level.len() > 1 {
        level = next_level(&level);
    }
    level.pop().unwrap_or_default()
}

/// True if `data` hashes to `expected`.
pub fn verify_root(data: &[u8], expected: &str) -> bool {
    compute_root(data) == expected
}

/// True if `s` looks like a root produced by [`compute_root`] for non-empty input.
pub fn is_valid_root(s: &str) -> bool {
    s.len() == ROOT_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
