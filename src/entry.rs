//! entry — wire-кодеки заголовка записи и chunk-array payload.
//!
//! Запись (52 байта заголовка + данные, LE):
//! [magic8 "DbEntry\0"|"DbEntAr\0"][hash 32][next u32][size u16][len u16][val u32][data ...]
//!
//! Chunk array (payload array-записи до сжатия, LE):
//! [data_length u32][array_length u32][buckets u32 x array_length]

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    ARR_HDR_SIZE, ARR_OFF_ARRAY_LEN, ARR_OFF_DATA_LEN, ENTRY_ARRAY_MAGIC, ENTRY_HDR_SIZE,
    ENTRY_MAGIC, ENT_OFF_HASH, ENT_OFF_LEN, ENT_OFF_MAGIC, ENT_OFF_NEXT, ENT_OFF_SIZE,
    ENT_OFF_VAL, HASH_LEN, MAX_ARRAY_CHUNKS,
};

/// Дискриминант записи — 8-байтовый magic в заголовке.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Лист: data = сжатый payload.
    Leaf,
    /// Массив: data = сжатая таблица чанков (ChunkArray).
    Array,
}

impl EntryKind {
    pub fn magic(self) -> &'static [u8; 8] {
        match self {
            EntryKind::Leaf => ENTRY_MAGIC,
            EntryKind::Array => ENTRY_ARRAY_MAGIC,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Leaf => write!(f, "leaf"),
            EntryKind::Array => write!(f, "array"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub kind: EntryKind,
    pub hash: [u8; HASH_LEN],
    /// Следующая запись в цепочке этого индекса, 0 = конец.
    pub next: u32,
    /// Длина сжатого payload в байтах.
    pub size: u16,
    /// Длина несжатого payload (<= 4096).
    pub len: u16,
    /// Bucket ассоциированной value-записи, 0 = нет.
    pub val: u32,
}

/// Прочитать заголовок записи. Несовпадение magic => повреждение.
pub fn entry_header_read(buf: &[u8]) -> Result<EntryHeader> {
    if buf.len() < ENTRY_HDR_SIZE {
        return Err(anyhow!(
            "entry header truncated: {} < {} bytes",
            buf.len(),
            ENTRY_HDR_SIZE
        ));
    }
    let magic = &buf[ENT_OFF_MAGIC..ENT_OFF_MAGIC + 8];
    let kind = if magic == ENTRY_MAGIC {
        EntryKind::Leaf
    } else if magic == ENTRY_ARRAY_MAGIC {
        EntryKind::Array
    } else {
        return Err(anyhow!("entry magic mismatch: heap corrupted"));
    };
    let mut hash = [0u8; HASH_LEN];
    hash.copy_from_slice(&buf[ENT_OFF_HASH..ENT_OFF_HASH + HASH_LEN]);
    Ok(EntryHeader {
        kind,
        hash,
        next: LittleEndian::read_u32(&buf[ENT_OFF_NEXT..ENT_OFF_NEXT + 4]),
        size: LittleEndian::read_u16(&buf[ENT_OFF_SIZE..ENT_OFF_SIZE + 2]),
        len: LittleEndian::read_u16(&buf[ENT_OFF_LEN..ENT_OFF_LEN + 2]),
        val: LittleEndian::read_u32(&buf[ENT_OFF_VAL..ENT_OFF_VAL + 4]),
    })
}

/// Записать заголовок записи в начало `buf`.
pub fn entry_header_write(buf: &mut [u8], h: &EntryHeader) -> Result<()> {
    if buf.len() < ENTRY_HDR_SIZE {
        return Err(anyhow!(
            "entry header buffer too small: {} < {}",
            buf.len(),
            ENTRY_HDR_SIZE
        ));
    }
    buf[ENT_OFF_MAGIC..ENT_OFF_MAGIC + 8].copy_from_slice(h.kind.magic());
    buf[ENT_OFF_HASH..ENT_OFF_HASH + HASH_LEN].copy_from_slice(&h.hash);
    LittleEndian::write_u32(&mut buf[ENT_OFF_NEXT..ENT_OFF_NEXT + 4], h.next);
    LittleEndian::write_u16(&mut buf[ENT_OFF_SIZE..ENT_OFF_SIZE + 2], h.size);
    LittleEndian::write_u16(&mut buf[ENT_OFF_LEN..ENT_OFF_LEN + 2], h.len);
    LittleEndian::write_u32(&mut buf[ENT_OFF_VAL..ENT_OFF_VAL + 4], h.val);
    Ok(())
}

/// Таблица чанков оверсайз-буфера.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkArray {
    /// Полная длина исходного (несжатого) буфера.
    pub data_length: u32,
    /// Bucket каждой leaf-записи с одним чанком (<= 4096 байт).
    pub buckets: Vec<u32>,
}

impl ChunkArray {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; ARR_HDR_SIZE + self.buckets.len() * 4];
        LittleEndian::write_u32(&mut out[ARR_OFF_DATA_LEN..ARR_OFF_DATA_LEN + 4], self.data_length);
        LittleEndian::write_u32(
            &mut out[ARR_OFF_ARRAY_LEN..ARR_OFF_ARRAY_LEN + 4],
            self.buckets.len() as u32,
        );
        for (i, b) in self.buckets.iter().enumerate() {
            LittleEndian::write_u32(&mut out[ARR_HDR_SIZE + i * 4..ARR_HDR_SIZE + i * 4 + 4], *b);
        }
        out
    }

    /// Распарсить распакованный payload array-записи.
    /// Недостаточная длина => invalid entry array.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ARR_HDR_SIZE {
            return Err(anyhow!("invalid entry array: payload shorter than header"));
        }
        let data_length = LittleEndian::read_u32(&buf[ARR_OFF_DATA_LEN..ARR_OFF_DATA_LEN + 4]);
        let array_length =
            LittleEndian::read_u32(&buf[ARR_OFF_ARRAY_LEN..ARR_OFF_ARRAY_LEN + 4]) as usize;
        if array_length > MAX_ARRAY_CHUNKS {
            return Err(anyhow!(
                "invalid entry array: {} chunks exceeds limit {}",
                array_length,
                MAX_ARRAY_CHUNKS
            ));
        }
        if buf.len() < ARR_HDR_SIZE + array_length * 4 {
            return Err(anyhow!(
                "invalid entry array: table truncated ({} buckets, {} bytes)",
                array_length,
                buf.len()
            ));
        }
        let mut buckets = Vec::with_capacity(array_length);
        for i in 0..array_length {
            buckets.push(LittleEndian::read_u32(
                &buf[ARR_HDR_SIZE + i * 4..ARR_HDR_SIZE + i * 4 + 4],
            ));
        }
        Ok(Self {
            data_length,
            buckets,
        })
    }
}
