//! store/fetch — путь чтения: обход оверлеев, цепочек и пересборка массивов.
//!
//! Порядок обхода: первичная куча, затем read-оверлеи в порядке открытия.
//! Для leaf-записи при decompress=false возвращается zero-copy срез сжатых
//! байт (живёт, пока живо хранилище). Для array-записи при decompress=false
//! пересобранный буфер СЖИМАЕТСЯ ЗАНОВО: wire-форма массива — это всегда
//! свежий zlib-поток поверх полной пересборки, а не хранимые байты.
//!
//! Защита от чрезмерной аллокации: ENV IDB_MAX_FETCH_BYTES (usize,
//! по умолчанию 1 GiB) — лимит на заявленную длину пересборки массива.

use anyhow::{anyhow, Result};
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::consts::{ARR_HDR_SIZE, ENTRY_HDR_SIZE};
use crate::entry::{ChunkArray, EntryHeader, EntryKind};
use crate::heap::Heap;
use crate::index::{find_by_hash, read_entry_header};
use crate::metrics;
use crate::store::Store;
use crate::util::hex_decode_hash;

/// Максимально допустимая заявленная длина array-записи (байт).
/// Настраивается через ENV IDB_MAX_FETCH_BYTES. По умолчанию 1 GiB.
fn max_fetch_bytes() -> usize {
    static MAX: OnceLock<usize> = OnceLock::new();
    *MAX.get_or_init(|| {
        std::env::var("IDB_MAX_FETCH_BYTES")
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(1usize << 30)
    })
}

impl Store {
    /// Извлечь запись по 64-символьному hex-хэшу (регистронезависимо).
    ///
    /// - `decompress=true`  — вернуть исходные (распакованные) байты;
    /// - `decompress=false` — вернуть сжатую wire-форму: для leaf это
    ///   zero-copy срез хранимых байт, для array — свежесжатая пересборка;
    /// - `dereference=true` — вместо найденной записи вернуть её
    ///   ассоциированную value-запись; val == 0 => Ok(None).
    pub fn fetch(
        &self,
        hex: &str,
        decompress: bool,
        dereference: bool,
    ) -> Result<Option<Cow<'_, [u8]>>> {
        let hash = hex_decode_hash(hex)?;

        for (i, heap) in self.read_order().enumerate() {
            let Some(mut bucket) = find_by_hash(heap, &hash)? else {
                continue;
            };
            let mut header = read_entry_header(heap, bucket)?;

            if dereference {
                if header.val == 0 {
                    metrics::record_fetch_miss();
                    return Ok(None);
                }
                heap.check_entry_bucket(header.val)?;
                bucket = header.val;
                header = read_entry_header(heap, bucket)?;
                metrics::record_fetch_deref();
            }

            metrics::record_fetch_hit(i > 0);
            return match header.kind {
                EntryKind::Array => self
                    .fetch_array(heap, bucket, &header, decompress)
                    .map(|v| Some(Cow::Owned(v))),
                EntryKind::Leaf => {
                    if decompress {
                        let raw =
                            heap.entry_slice(bucket, ENTRY_HDR_SIZE + header.size as usize)?;
                        let mut out = vec![0u8; header.len as usize];
                        let n = {
                            let mut codec = self
                                .codec
                                .lock()
                                .map_err(|_| anyhow!("codec mutex poisoned"))?;
                            codec.decompress_into(&raw[ENTRY_HDR_SIZE..], &mut out)?
                        };
                        if n != header.len as usize {
                            return Err(anyhow!(
                                "entry corrupted: decompressed {} bytes, header says {}",
                                n,
                                header.len
                            ));
                        }
                        Ok(Some(Cow::Owned(out)))
                    } else {
                        let raw =
                            heap.entry_slice(bucket, ENTRY_HDR_SIZE + header.size as usize)?;
                        Ok(Some(Cow::Borrowed(&raw[ENTRY_HDR_SIZE..])))
                    }
                }
            };
        }

        metrics::record_fetch_miss();
        Ok(None)
    }

    /// Пересобрать array-запись: распаковать таблицу чанков, затем каждый
    /// чанк в свой слот выходного буфера.
    fn fetch_array(
        &self,
        heap: &Heap,
        bucket: u32,
        header: &EntryHeader,
        decompress: bool,
    ) -> Result<Vec<u8>> {
        let mut codec = self
            .codec
            .lock()
            .map_err(|_| anyhow!("codec mutex poisoned"))?;

        // таблица чанков
        let raw = heap.entry_slice(bucket, ENTRY_HDR_SIZE + header.size as usize)?;
        let mut scratch = vec![0u8; header.len as usize];
        let n = codec.decompress_into(&raw[ENTRY_HDR_SIZE..], &mut scratch)?;
        if n < ARR_HDR_SIZE {
            return Err(anyhow!(
                "invalid entry array: payload {} bytes, header needs {}",
                n,
                ARR_HDR_SIZE
            ));
        }
        let arr = ChunkArray::decode(&scratch[..n])?;

        let data_length = arr.data_length as usize;
        let max = max_fetch_bytes();
        if data_length > max {
            return Err(anyhow!(
                "array data_length {} exceeds limit {} (set IDB_MAX_FETCH_BYTES to override)",
                data_length,
                max
            ));
        }

        let mut out = vec![0u8; data_length];
        let mut filled = 0usize;
        for &cb in &arr.buckets {
            heap.check_entry_bucket(cb)?;
            let ch = read_entry_header(heap, cb)?;
            let clen = ch.len as usize;
            if filled + clen > data_length {
                return Err(anyhow!(
                    "invalid entry array: chunk at bucket {} overruns declared length {}",
                    cb,
                    data_length
                ));
            }
            let craw = heap.entry_slice(cb, ENTRY_HDR_SIZE + ch.size as usize)?;
            let m = codec.decompress_into(&craw[ENTRY_HDR_SIZE..], &mut out[filled..filled + clen])?;
            if m != clen {
                return Err(anyhow!(
                    "entry corrupted: chunk at bucket {} decompressed {} bytes, header says {}",
                    cb,
                    m,
                    clen
                ));
            }
            filled += clen;
        }
        if filled != data_length {
            return Err(anyhow!(
                "invalid entry array: reassembled {} bytes, declared {}",
                filled,
                data_length
            ));
        }

        metrics::record_array_reassembly(!decompress);
        if decompress {
            Ok(out)
        } else {
            // восстановить сжатую wire-форму целиком
            codec.compress_vec(&out)
        }
    }
}
