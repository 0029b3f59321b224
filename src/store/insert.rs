//! store/insert — путь записи: дедуп, сжатие, аллокация хвоста, линковка.
//!
//! Порядок публикации новой записи:
//! 1) payload сжимается прямо в data-область будущей записи первичной кучи;
//! 2) сформированные байты (заголовок + данные) копируются в каждое зеркало;
//! 3) для первичной кучи и каждого зеркала: next <- голова цепочки,
//!    голова <- bucket, used += need.
//! Линковка — последний шаг: упавшая вставка оставляет лишь «бесхозные»
//! байты в [used, used+need), которые перезапишет следующая успешная.

use anyhow::{anyhow, Result};

use crate::codec::zlib_bound;
use crate::consts::{
    BLOCK_SHIFT, ENTRY_ARRAY_MAGIC, ENTRY_HDR_SIZE, ENTRY_MAX_SIZE_BYTES, ENTRY_MAX_SIZE_SHIFT,
    HASH_LEN, MAX_ARRAY_CHUNKS,
};
use crate::entry::{entry_header_write, ChunkArray, EntryHeader, EntryKind};
use crate::hash::{chain_index, content_hash};
use crate::heap::Heap;
use crate::index::{find_by_hash, read_entry_header};
use crate::metrics;
use crate::store::Store;
use crate::util::hex_encode;

impl Store {
    /// Сохранить буфер; вернуть lowercase-hex BLAKE3-256 его содержимого.
    /// Пустой буфер не сохраняется (Ok(None)).
    pub fn store(&mut self, data: &[u8]) -> Result<Option<String>> {
        if data.is_empty() {
            return Ok(None);
        }
        let bucket = self.insert_buffer(data)?;
        let h = read_entry_header(&self.primary, bucket)?;
        Ok(Some(hex_encode(&h.hash)))
    }

    /// Вставить буфер произвольного размера: до 4096 байт — одной записью,
    /// больше — чанками по 4096 плюс array-запись с таблицей чанков.
    /// Хэш array-записи — BLAKE3 полного исходного буфера.
    pub(crate) fn insert_buffer(&mut self, data: &[u8]) -> Result<u32> {
        if data.len() <= ENTRY_MAX_SIZE_BYTES {
            return self.insert_chunk(data);
        }

        let hash = content_hash(data);
        if let Some(found) = find_by_hash(&self.primary, &hash)? {
            metrics::record_dedup_hit();
            return Ok(found);
        }

        let n_chunks = ((data.len() - 1) >> ENTRY_MAX_SIZE_SHIFT) + 1;
        if n_chunks > MAX_ARRAY_CHUNKS {
            return Err(anyhow!(
                "buffer of {} bytes needs {} chunks, limit is {} (~4 MiB per array entry)",
                data.len(),
                n_chunks,
                MAX_ARRAY_CHUNKS
            ));
        }

        let mut arr = ChunkArray {
            data_length: data.len() as u32,
            buckets: Vec::with_capacity(n_chunks),
        };
        for chunk in data.chunks(ENTRY_MAX_SIZE_BYTES) {
            arr.buckets.push(self.insert_chunk(chunk)?);
        }

        let payload = arr.encode();
        let arr_bucket = self.insert_entry(&payload, &hash)?;

        // Перештамповать magic на "DbEntAr" везде, где запись легла.
        for heap in std::iter::once(&mut self.primary).chain(self.mirrors.iter_mut()) {
            heap.write_entry_magic(arr_bucket, ENTRY_ARRAY_MAGIC)?;
        }

        metrics::record_array_created(n_chunks as u64);
        Ok(arr_bucket)
    }

    /// Вставить один чанк (<= 4096 байт) под его собственным хэшем.
    pub(crate) fn insert_chunk(&mut self, data: &[u8]) -> Result<u32> {
        let hash = content_hash(data);
        self.insert_entry(data, &hash)
    }

    /// Вставить leaf-запись с заданным хэшем (для array-записей хэш
    /// принадлежит исходному буферу, не payload). Возвращает bucket.
    fn insert_entry(&mut self, data: &[u8], hash: &[u8; HASH_LEN]) -> Result<u32> {
        if data.len() > ENTRY_MAX_SIZE_BYTES {
            return Err(anyhow!(
                "entry payload {} exceeds {} bytes",
                data.len(),
                ENTRY_MAX_SIZE_BYTES
            ));
        }

        // дедуп: ищем только в первичной куче
        if let Some(found) = find_by_hash(&self.primary, hash)? {
            metrics::record_dedup_hit();
            return Ok(found);
        }

        let size = self.primary.size();
        let used = self.primary.used();
        if used >= size {
            return Err(anyhow!("store is full: {} of {} blocks used", used, size));
        }

        let bucket = used;
        let avail = ((((size - used) as u64) << BLOCK_SHIFT) as usize) - ENTRY_HDR_SIZE;
        let bound = zlib_bound(data.len());
        if avail < bound {
            return Err(anyhow!(
                "store is too full: {} bytes of tail room, {} required",
                avail,
                bound
            ));
        }

        // сжать прямо в data-область будущей записи первичной кучи
        let entry_off = Heap::bucket_to_offset(bucket) as usize;
        let csize = {
            let mut codec = self
                .codec
                .lock()
                .map_err(|_| anyhow!("codec mutex poisoned"))?;
            let map = self.primary.data_mut()?;
            let dst = &mut map[entry_off + ENTRY_HDR_SIZE..entry_off + ENTRY_HDR_SIZE + avail];
            codec.compress_into(data, dst)?
        };
        if csize == 0 {
            return Err(anyhow!("store is too full: compressed entry does not fit"));
        }

        let header = EntryHeader {
            kind: EntryKind::Leaf,
            hash: *hash,
            next: 0,
            size: csize as u16,
            len: data.len() as u16,
            val: 0,
        };
        entry_header_write(
            self.primary.entry_slice_mut(bucket, ENTRY_HDR_SIZE)?,
            &header,
        )?;

        let total = ENTRY_HDR_SIZE + csize;
        let need = (((total - 1) >> BLOCK_SHIFT) + 1) as u32;

        // payload во все зеркала до того, как хоть одна куча его опубликует
        {
            let src = self.primary.entry_slice(bucket, total)?;
            for m in self.mirrors.iter_mut() {
                m.entry_slice_mut(bucket, total)?.copy_from_slice(src);
            }
        }
        if !self.mirrors.is_empty() {
            metrics::record_mirror_copies(self.mirrors.len() as u64);
        }

        // публикация per-heap: next, голова цепочки, used
        let ci = chain_index(hash, self.primary.index_len());
        for heap in std::iter::once(&mut self.primary).chain(self.mirrors.iter_mut()) {
            let head = heap.bucket_head(ci);
            heap.write_entry_next(bucket, head)?;
            heap.set_bucket_head(ci, bucket)?;
            heap.set_used(used + need)?;
        }

        metrics::record_insert(data.len(), total);
        Ok(bucket)
    }
}
