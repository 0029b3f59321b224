//! Общие константы формата (heap header, entries, chunk arrays).

// -------- Heap --------
pub const DB_MAGIC: &[u8; 8] = b"InstaDB\0";

/// Блок — единица адресации кучи (64 байта). Bucket 0 зарезервирован как null.
pub const BLOCK_SHIFT: u32 = 6;
pub const BLOCK_SIZE: usize = 1 << BLOCK_SHIFT;

/// index_len = size_blocks >> INDEX_SHIFT (число голов хэш-цепочек).
pub const INDEX_SHIFT: u32 = 4;

// Формат заголовка кучи (LE):
// [magic8 "InstaDB\0"][size u32][used u32][buckets u32 x (size >> 4)]
pub const HDR_OFF_MAGIC: usize = 0;
pub const HDR_OFF_SIZE: usize = 8;
pub const HDR_OFF_USED: usize = 12;
pub const HDR_INDEX_OFF: usize = 16;
pub const HDR_FIXED_SIZE: usize = 16;

/// Минимальный размер кучи: 16 блоков => хотя бы одна голова индекса.
pub const MIN_HEAP_BYTES: u64 = (BLOCK_SIZE as u64) << INDEX_SHIFT;

// -------- Entries --------
pub const ENTRY_MAGIC: &[u8; 8] = b"DbEntry\0";
pub const ENTRY_ARRAY_MAGIC: &[u8; 8] = b"DbEntAr\0";

/// Потолок несжатого payload одной записи (и размер чанка).
pub const ENTRY_MAX_SIZE_SHIFT: u32 = 12;
pub const ENTRY_MAX_SIZE_BYTES: usize = 1 << ENTRY_MAX_SIZE_SHIFT;

// Формат заголовка записи (LE):
// [magic8][hash 32][next u32][size u16][len u16][val u32][data ...]
pub const ENT_OFF_MAGIC: usize = 0;
pub const ENT_OFF_HASH: usize = 8;
pub const ENT_OFF_NEXT: usize = 40;
pub const ENT_OFF_SIZE: usize = 44;
pub const ENT_OFF_LEN: usize = 46;
pub const ENT_OFF_VAL: usize = 48;
pub const ENTRY_HDR_SIZE: usize = 52;

// -------- Chunk arrays --------
// Payload array-записи до сжатия (LE):
// [data_length u32][array_length u32][buckets u32 x array_length]
pub const ARR_OFF_DATA_LEN: usize = 0;
pub const ARR_OFF_ARRAY_LEN: usize = 4;
pub const ARR_HDR_SIZE: usize = 8;

/// 8 + 4*N <= 4096 => не более 1022 чанков на один array entry (~4 MiB).
pub const MAX_ARRAY_CHUNKS: usize = (ENTRY_MAX_SIZE_BYTES - ARR_HDR_SIZE) / 4;

// -------- Hash --------
pub const HASH_LEN: usize = 32;
pub const HEX_HASH_LEN: usize = HASH_LEN * 2;

// -------- Compression --------
/// Максимальный уровень zlib у flate2.
pub const COMPRESSION_LEVEL: u32 = 9;
