//! store/core — структура Store, базовые геттеры и интроспекция записей.

use anyhow::{anyhow, Result};
use std::sync::Mutex;

use crate::codec::Codec;
use crate::consts::ENTRY_HDR_SIZE;
use crate::entry::{ChunkArray, EntryKind};
use crate::heap::Heap;
use crate::index::{find_by_hash, read_entry_header};
use crate::util::hex_decode_hash;

/// Открытое хранилище: первичная куча + зеркала записи + read-оверлеи.
///
/// Контракт однопоточности: операции не берут внутренних блокировок,
/// кроме Mutex на паре компрессор/декомпрессор; вызовы сериализует хост.
pub struct Store {
    // дочерние мапы должны освобождаться раньше первичной (порядок полей)
    pub(crate) overlays: Vec<Heap>,
    pub(crate) mirrors: Vec<Heap>,
    pub(crate) primary: Heap,
    pub(crate) codec: Mutex<Codec>,
}

/// Интроспекция одной записи (CLI `entry`, тесты).
#[derive(Debug, Clone)]
pub struct EntryStat {
    pub bucket: u32,
    pub kind: EntryKind,
    /// Сжатый размер payload в байтах.
    pub compressed_size: u16,
    /// Несжатая длина payload (для array — длина таблицы чанков).
    pub uncompressed_len: u16,
    /// Bucket ассоциированной value-записи, 0 = нет.
    pub value_bucket: u32,
    /// Для array-записей: число чанков.
    pub chunk_count: Option<u32>,
    /// Для array-записей: полная длина исходного буфера.
    pub data_length: Option<u32>,
}

impl Store {
    /// Ёмкость первичной кучи в блоках.
    pub fn size_blocks(&self) -> u32 {
        self.primary.size()
    }

    /// Занятых блоков в первичной куче (включая заголовок).
    pub fn used_blocks(&self) -> u32 {
        self.primary.used()
    }

    /// Число голов хэш-индекса.
    pub fn index_len(&self) -> u32 {
        self.primary.index_len()
    }

    /// Блоков в заголовке первичной кучи.
    pub fn header_blocks(&self) -> u32 {
        self.primary.header_blocks()
    }

    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_readonly(&self) -> bool {
        self.primary.is_readonly()
    }

    /// Первичная куча и оверлеи в порядке обхода чтения.
    pub(crate) fn read_order(&self) -> impl Iterator<Item = &Heap> {
        std::iter::once(&self.primary).chain(self.overlays.iter())
    }

    /// Описание записи по hex-хэшу, без извлечения payload.
    /// Ok(None) — хэш не найден ни в первичной куче, ни в оверлеях.
    pub fn stat(&self, hex: &str) -> Result<Option<EntryStat>> {
        let hash = hex_decode_hash(hex)?;
        for heap in self.read_order() {
            let Some(bucket) = find_by_hash(heap, &hash)? else {
                continue;
            };
            let h = read_entry_header(heap, bucket)?;
            let (chunk_count, data_length) = match h.kind {
                EntryKind::Leaf => (None, None),
                EntryKind::Array => {
                    let comp =
                        heap.entry_slice(bucket, ENTRY_HDR_SIZE + h.size as usize)?;
                    let mut scratch = vec![0u8; h.len as usize];
                    let n = {
                        let mut codec = self
                            .codec
                            .lock()
                            .map_err(|_| anyhow!("codec mutex poisoned"))?;
                        codec.decompress_into(&comp[ENTRY_HDR_SIZE..], &mut scratch)?
                    };
                    let arr = ChunkArray::decode(&scratch[..n])?;
                    (Some(arr.buckets.len() as u32), Some(arr.data_length))
                }
            };
            return Ok(Some(EntryStat {
                bucket,
                kind: h.kind,
                compressed_size: h.size,
                uncompressed_len: h.len,
                value_bucket: h.val,
                chunk_count,
                data_length,
            }));
        }
        Ok(None)
    }
}
