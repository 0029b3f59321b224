//! Lightweight global metrics for instadb.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Insert (записи, dedup-попадания, байты до/после сжатия)
//! - Chunker (array-записи и их чанки)
//! - Mirrors (реплицированные записи)
//! - Fetch (hits/misses, попадания в оверлеи, dereference, пересборки)

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Insert -----
static INSERT_ENTRIES: AtomicU64 = AtomicU64::new(0);
static INSERT_DEDUP_HITS: AtomicU64 = AtomicU64::new(0);
static INSERT_BYTES_RAW: AtomicU64 = AtomicU64::new(0);
static INSERT_BYTES_STORED: AtomicU64 = AtomicU64::new(0);

// ----- Chunker -----
static ARRAYS_CREATED: AtomicU64 = AtomicU64::new(0);
static ARRAY_CHUNKS: AtomicU64 = AtomicU64::new(0);

// ----- Mirrors -----
static MIRROR_ENTRY_COPIES: AtomicU64 = AtomicU64::new(0);

// ----- Fetch -----
static FETCH_HITS: AtomicU64 = AtomicU64::new(0);
static FETCH_MISSES: AtomicU64 = AtomicU64::new(0);
static FETCH_OVERLAY_HITS: AtomicU64 = AtomicU64::new(0);
static FETCH_DEREFS: AtomicU64 = AtomicU64::new(0);
static ARRAY_REASSEMBLIES: AtomicU64 = AtomicU64::new(0);
static ARRAY_RECOMPRESSIONS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub insert_entries: u64,
    pub insert_dedup_hits: u64,
    pub insert_bytes_raw: u64,
    pub insert_bytes_stored: u64,

    pub arrays_created: u64,
    pub array_chunks: u64,

    pub mirror_entry_copies: u64,

    pub fetch_hits: u64,
    pub fetch_misses: u64,
    pub fetch_overlay_hits: u64,
    pub fetch_derefs: u64,
    pub array_reassemblies: u64,
    pub array_recompressions: u64,
}

impl MetricsSnapshot {
    /// Доля вставок, закрытых дедупликацией.
    pub fn dedup_ratio(&self) -> f64 {
        let total = self.insert_entries + self.insert_dedup_hits;
        if total == 0 {
            0.0
        } else {
            self.insert_dedup_hits as f64 / total as f64
        }
    }

    /// Байты после сжатия / байты до сжатия (меньше — лучше).
    pub fn compression_ratio(&self) -> f64 {
        if self.insert_bytes_raw == 0 {
            0.0
        } else {
            self.insert_bytes_stored as f64 / self.insert_bytes_raw as f64
        }
    }

    pub fn fetch_hit_ratio(&self) -> f64 {
        let total = self.fetch_hits + self.fetch_misses;
        if total == 0 {
            0.0
        } else {
            self.fetch_hits as f64 / total as f64
        }
    }
}

// ----- Recorders (Insert) -----
pub fn record_insert(raw_len: usize, stored_len: usize) {
    INSERT_ENTRIES.fetch_add(1, Ordering::Relaxed);
    INSERT_BYTES_RAW.fetch_add(raw_len as u64, Ordering::Relaxed);
    INSERT_BYTES_STORED.fetch_add(stored_len as u64, Ordering::Relaxed);
}

pub fn record_dedup_hit() {
    INSERT_DEDUP_HITS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Chunker) -----
pub fn record_array_created(chunks: u64) {
    ARRAYS_CREATED.fetch_add(1, Ordering::Relaxed);
    ARRAY_CHUNKS.fetch_add(chunks, Ordering::Relaxed);
}

// ----- Recorders (Mirrors) -----
pub fn record_mirror_copies(mirrors: u64) {
    MIRROR_ENTRY_COPIES.fetch_add(mirrors, Ordering::Relaxed);
}

// ----- Recorders (Fetch) -----
pub fn record_fetch_hit(overlay: bool) {
    FETCH_HITS.fetch_add(1, Ordering::Relaxed);
    if overlay {
        FETCH_OVERLAY_HITS.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_fetch_miss() {
    FETCH_MISSES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_fetch_deref() {
    FETCH_DEREFS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_array_reassembly(recompressed: bool) {
    ARRAY_REASSEMBLIES.fetch_add(1, Ordering::Relaxed);
    if recompressed {
        ARRAY_RECOMPRESSIONS.fetch_add(1, Ordering::Relaxed);
    }
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        insert_entries: INSERT_ENTRIES.load(Ordering::Relaxed),
        insert_dedup_hits: INSERT_DEDUP_HITS.load(Ordering::Relaxed),
        insert_bytes_raw: INSERT_BYTES_RAW.load(Ordering::Relaxed),
        insert_bytes_stored: INSERT_BYTES_STORED.load(Ordering::Relaxed),

        arrays_created: ARRAYS_CREATED.load(Ordering::Relaxed),
        array_chunks: ARRAY_CHUNKS.load(Ordering::Relaxed),

        mirror_entry_copies: MIRROR_ENTRY_COPIES.load(Ordering::Relaxed),

        fetch_hits: FETCH_HITS.load(Ordering::Relaxed),
        fetch_misses: FETCH_MISSES.load(Ordering::Relaxed),
        fetch_overlay_hits: FETCH_OVERLAY_HITS.load(Ordering::Relaxed),
        fetch_derefs: FETCH_DEREFS.load(Ordering::Relaxed),
        array_reassemblies: ARRAY_REASSEMBLIES.load(Ordering::Relaxed),
        array_recompressions: ARRAY_RECOMPRESSIONS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    INSERT_ENTRIES.store(0, Ordering::Relaxed);
    INSERT_DEDUP_HITS.store(0, Ordering::Relaxed);
    INSERT_BYTES_RAW.store(0, Ordering::Relaxed);
    INSERT_BYTES_STORED.store(0, Ordering::Relaxed);

    ARRAYS_CREATED.store(0, Ordering::Relaxed);
    ARRAY_CHUNKS.store(0, Ordering::Relaxed);

    MIRROR_ENTRY_COPIES.store(0, Ordering::Relaxed);

    FETCH_HITS.store(0, Ordering::Relaxed);
    FETCH_MISSES.store(0, Ordering::Relaxed);
    FETCH_OVERLAY_HITS.store(0, Ordering::Relaxed);
    FETCH_DEREFS.store(0, Ordering::Relaxed);
    ARRAY_REASSEMBLIES.store(0, Ordering::Relaxed);
    ARRAY_RECOMPRESSIONS.store(0, Ordering::Relaxed);
}
