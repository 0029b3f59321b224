//! Centralized options for opening a store.
//!
//! Goals:
//! - Single place for the open() inputs (primary path, heap size, mirror and
//!   overlay lists) instead of scattering positional arguments.
//! - Keep the host handshake honest: the canonical packed form for mirror
//!   lists (a decimal count followed by NUL-delimited filenames in a single
//!   buffer) has an explicit codec here.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use crate::consts::MIN_HEAP_BYTES;

/// Open-time options for a store.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Primary backing file (opened read/write, grown to `size`).
    pub storage_file: PathBuf,
    /// Heap capacity in bytes; positive multiple of 64, at least 1024.
    pub size: u64,
    /// Write-mirrors, replicated on every mutation (opened read/write).
    pub copies: Vec<PathBuf>,
    /// Read-only overlays, scanned in order after a primary miss.
    pub rocopies: Vec<PathBuf>,
}

impl StoreOptions {
    pub fn new<P: Into<PathBuf>>(storage_file: P, size: u64) -> Self {
        Self {
            storage_file: storage_file.into(),
            size,
            copies: Vec::new(),
            rocopies: Vec::new(),
        }
    }

    /// Fluent setters (builder-style).

    pub fn with_copy<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.copies.push(path.into());
        self
    }

    pub fn with_rocopy<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.rocopies.push(path.into());
        self
    }

    pub fn with_copies(mut self, paths: Vec<PathBuf>) -> Self {
        self.copies = paths;
        self
    }

    pub fn with_rocopies(mut self, paths: Vec<PathBuf>) -> Self {
        self.rocopies = paths;
        self
    }
}

/// Validate a requested heap size: positive multiple of 64,
/// and big enough for a non-empty index table (16 blocks).
pub fn validate_heap_size(size: u64) -> Result<()> {
    if size == 0 || size % 64 != 0 || size < MIN_HEAP_BYTES {
        return Err(anyhow!(
            "heap size must be a positive multiple of 64, at least {} bytes; got {}",
            MIN_HEAP_BYTES,
            size
        ));
    }
    Ok(())
}

/// Parse the canonical packed list of filenames: a decimal count, then that
/// many NUL-delimited names. Unparseable buffers yield an empty list
/// (a hostile host cannot fail an open); excess names are ignored.
pub fn parse_name_list(buf: &[u8]) -> Vec<PathBuf> {
    let mut parts = buf.split(|&b| b == 0);
    let count = parts
        .next()
        .and_then(|head| std::str::from_utf8(head).ok())
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut out = Vec::with_capacity(count);
    for part in parts {
        if out.len() == count {
            break;
        }
        if part.is_empty() {
            continue;
        }
        match std::str::from_utf8(part) {
            Ok(s) => out.push(PathBuf::from(s)),
            Err(_) => continue,
        }
    }
    out
}

/// Encode a list of paths into the canonical packed form.
pub fn encode_name_list(paths: &[&Path]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(paths.len().to_string().as_bytes());
    out.push(0);
    for p in paths {
        out.extend_from_slice(p.to_string_lossy().as_bytes());
        out.push(0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_validation() {
        assert!(validate_heap_size(0).is_err());
        assert!(validate_heap_size(100).is_err());
        assert!(validate_heap_size(512).is_err());
        assert!(validate_heap_size(1024).is_ok());
        assert!(validate_heap_size(1 << 20).is_ok());
    }

    #[test]
    fn name_list_roundtrip() {
        let paths = [Path::new("/tmp/a.db"), Path::new("/tmp/b.db")];
        let packed = encode_name_list(&paths);
        let parsed = parse_name_list(&packed);
        assert_eq!(parsed, vec![PathBuf::from("/tmp/a.db"), PathBuf::from("/tmp/b.db")]);
    }

    #[test]
    fn name_list_respects_count_prefix() {
        let packed = b"1\0/tmp/a.db\0/tmp/b.db\0";
        let parsed = parse_name_list(packed);
        assert_eq!(parsed, vec![PathBuf::from("/tmp/a.db")]);
    }

    #[test]
    fn name_list_tolerates_garbage() {
        assert!(parse_name_list(b"").is_empty());
        assert!(parse_name_list(b"not-a-number\0/tmp/a.db\0").is_empty());
        assert!(parse_name_list(b"3\0").is_empty());
    }

    #[test]
    fn builder_accumulates() {
        let opts = StoreOptions::new("/tmp/p.db", 1 << 20)
            .with_copy("/tmp/m1.db")
            .with_copy("/tmp/m2.db")
            .with_rocopy("/tmp/ro.db");
        assert_eq!(opts.copies.len(), 2);
        assert_eq!(opts.rocopies.len(), 1);
        assert_eq!(opts.size, 1 << 20);
    }
}
