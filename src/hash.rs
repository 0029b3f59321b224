//! Content hashing for entries and chain-index mapping.
//!
//! Goals:
//! - BLAKE3-256 as the content address: stable across platforms, and the hex
//!   form returned by `store()` is the only key a caller ever sees.
//! - Keep the hash -> chain-head mapping explicit and invariant: the chain
//!   index is the little-endian u32 of the first four hash bytes modulo the
//!   index length, so the same file always resolves the same way.

use byteorder::{ByteOrder, LittleEndian};

use crate::consts::HASH_LEN;

/// BLAKE3-256 of a payload. This is the identity of an entry.
#[inline]
pub fn content_hash(data: &[u8]) -> [u8; HASH_LEN] {
    *blake3::hash(data).as_bytes()
}

/// Chain index for a hash given the head-table length (`size >> 4`).
#[inline]
pub fn chain_index(hash: &[u8; HASH_LEN], index_len: u32) -> u32 {
    debug_assert!(index_len > 0, "index_len must be > 0");
    LittleEndian::read_u32(&hash[0..4]) % index_len
}
