//! index — открытое хэширование с цепочками поверх кучи.
//!
//! Головы цепочек лежат в заголовке кучи (size >> 4 штук). Новые записи
//! вставляются в голову (LIFO); поиск идёт по `next` до совпадения хэша
//! или нуля. Любой адрес вне [H, used) в цепочке — повреждение таблицы.

use anyhow::{anyhow, Result};

use crate::consts::{ENTRY_HDR_SIZE, HASH_LEN};
use crate::entry::{entry_header_read, EntryHeader};
use crate::hash::chain_index;
use crate::heap::Heap;

/// Найти bucket записи с данным хэшем в одной куче.
/// Ok(None) — нет в этой куче; ошибки — повреждённая цепочка.
pub fn find_by_hash(heap: &Heap, hash: &[u8; HASH_LEN]) -> Result<Option<u32>> {
    let ci = chain_index(hash, heap.index_len());
    let mut bucket = heap.bucket_head(ci);
    // цепочка длиннее числа занятых блоков возможна только при цикле
    let mut guard = heap.used() as u64 + 1;

    while bucket != 0 {
        guard -= 1;
        if guard == 0 {
            return Err(anyhow!(
                "hash table corrupted: chain loop detected at {}",
                heap.path().display()
            ));
        }
        heap.check_entry_bucket(bucket)?;
        let h = read_entry_header(heap, bucket)?;
        if &h.hash == hash {
            return Ok(Some(bucket));
        }
        bucket = h.next;
    }
    Ok(None)
}

/// Прочитать заголовок записи по bucket (с проверкой границ).
pub fn read_entry_header(heap: &Heap, bucket: u32) -> Result<EntryHeader> {
    entry_header_read(heap.entry_slice(bucket, ENTRY_HDR_SIZE)?)
}
