//! heap — файл, спроецированный в память как куча 64-байтовых блоков.
//!
//! Раскладка (LE):
//! [magic8 "InstaDB\0"][size u32][used u32][buckets u32 x (size >> 4)][entries ...]
//!
//! - size/used — в блоках; used включает сами заголовочные блоки.
//! - Таблица голов индекса начинается с байта 16 и целиком лежит
//!   в первых H блоках, H = ceil((16 + 4*index_len) / 64).
//! - Арифметика bucket <-> offset и все чтения/записи идут через
//!   проверяемые срезы; сырой указательной магии нет.
//!
//! Инициализация при первом открытии на запись: файл при необходимости
//! растёт до запрошенного размера, при size == 0 штампуется size = len/64,
//! при used < H — magic и used = H.

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use fs2::FileExt;
use log::debug;
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::consts::{
    BLOCK_SHIFT, DB_MAGIC, ENT_OFF_MAGIC, ENT_OFF_NEXT, ENT_OFF_VAL, HDR_FIXED_SIZE,
    HDR_INDEX_OFF, HDR_OFF_SIZE, HDR_OFF_USED, INDEX_SHIFT, MIN_HEAP_BYTES,
};

enum HeapMap {
    Ro(Mmap),
    Rw(MmapMut),
}

pub struct Heap {
    path: PathBuf,
    /// Держит advisory-лок для RW-куч; снимается в Drop.
    file: File,
    map: HeapMap,
    map_len: usize,
}

impl Heap {
    /// Открыть кучу на запись: создать/дорастить файл до `size_bytes`,
    /// замапить shared и проинициализировать заголовок, если его нет.
    pub fn open_rw(path: &Path, size_bytes: u64) -> Result<Self> {
        if size_bytes < MIN_HEAP_BYTES || size_bytes % 64 != 0 {
            return Err(anyhow!(
                "heap size must be a multiple of 64 and at least {} bytes, got {}",
                MIN_HEAP_BYTES,
                size_bytes
            ));
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open heap {}", path.display()))?;
        file.try_lock_exclusive()
            .with_context(|| format!("lock heap {} (another writer?)", path.display()))?;

        let flen = file
            .metadata()
            .with_context(|| format!("stat heap {}", path.display()))?
            .len();
        if flen < size_bytes {
            file.set_len(size_bytes)
                .with_context(|| format!("grow heap {} to {}", path.display(), size_bytes))?;
        }
        let map_len = std::cmp::max(flen, size_bytes) as usize;

        let map = unsafe {
            MmapOptions::new()
                .len(map_len)
                .map_mut(&file)
                .with_context(|| format!("mmap heap {}", path.display()))?
        };

        let mut heap = Self {
            path: path.to_path_buf(),
            file,
            map: HeapMap::Rw(map),
            map_len,
        };
        heap.init_header(size_bytes)?;
        heap.validate_header()?;
        Ok(heap)
    }

    /// Открыть кучу только на чтение (оверлеи, status). Файл должен быть
    /// уже проинициализирован.
    pub fn open_ro(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("open heap {}", path.display()))?;
        let flen = file
            .metadata()
            .with_context(|| format!("stat heap {}", path.display()))?
            .len();
        if flen < HDR_FIXED_SIZE as u64 {
            return Err(anyhow!(
                "heap {} too short for a header ({} bytes)",
                path.display(),
                flen
            ));
        }
        let map = unsafe {
            MmapOptions::new()
                .map(&file)
                .with_context(|| format!("mmap heap {}", path.display()))?
        };
        let heap = Self {
            path: path.to_path_buf(),
            file,
            map: HeapMap::Ro(map),
            map_len: flen as usize,
        };
        if &heap.data()[0..8] != DB_MAGIC {
            return Err(anyhow!("bad heap magic at {}", path.display()));
        }
        heap.validate_header()?;
        Ok(heap)
    }

    fn init_header(&mut self, size_bytes: u64) -> Result<()> {
        if self.size() == 0 {
            let blocks = (size_bytes >> BLOCK_SHIFT) as u32;
            self.set_size(blocks)?;
            debug!(
                "heap {}: stamped size={} blocks",
                self.path.display(),
                blocks
            );
        }
        let index_len = self.size() >> INDEX_SHIFT;
        if index_len == 0 {
            return Err(anyhow!(
                "heap {} too small: empty index table",
                self.path.display()
            ));
        }
        let header_blocks = self.header_blocks();
        if self.used() < header_blocks {
            self.data_mut()?[0..8].copy_from_slice(DB_MAGIC);
            self.set_used(header_blocks)?;
            debug!(
                "heap {}: initialized header ({} blocks, index_len={})",
                self.path.display(),
                header_blocks,
                index_len
            );
        } else if &self.data()[0..8] != DB_MAGIC {
            return Err(anyhow!("bad heap magic at {}", self.path.display()));
        }
        Ok(())
    }

    fn validate_header(&self) -> Result<()> {
        let size = self.size();
        if (size as u64) << BLOCK_SHIFT > self.map_len as u64 {
            return Err(anyhow!(
                "heap {} corrupted: size field {} blocks exceeds mapped {} bytes",
                self.path.display(),
                size,
                self.map_len
            ));
        }
        if size >> INDEX_SHIFT == 0 {
            return Err(anyhow!(
                "heap {} corrupted: empty index table",
                self.path.display()
            ));
        }
        let used = self.used();
        if used < self.header_blocks() || used > size {
            return Err(anyhow!(
                "heap {} corrupted: used={} outside [{}, {}]",
                self.path.display(),
                used,
                self.header_blocks(),
                size
            ));
        }
        Ok(())
    }

    // ----------------- представления -----------------

    #[inline]
    pub fn data(&self) -> &[u8] {
        match &self.map {
            HeapMap::Ro(m) => &m[..],
            HeapMap::Rw(m) => &m[..],
        }
    }

    #[inline]
    pub fn data_mut(&mut self) -> Result<&mut [u8]> {
        match &mut self.map {
            HeapMap::Rw(m) => Ok(&mut m[..]),
            HeapMap::Ro(_) => Err(anyhow!("heap {} is read-only", self.path.display())),
        }
    }

    #[inline]
    pub fn is_readonly(&self) -> bool {
        matches!(self.map, HeapMap::Ro(_))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Сбросить грязные страницы на диск (best-effort).
    pub fn flush(&self) -> Result<()> {
        if let HeapMap::Rw(m) = &self.map {
            m.flush()?;
        }
        Ok(())
    }

    // ----------------- заголовок -----------------

    /// Ёмкость кучи в блоках.
    #[inline]
    pub fn size(&self) -> u32 {
        LittleEndian::read_u32(&self.data()[HDR_OFF_SIZE..HDR_OFF_SIZE + 4])
    }

    fn set_size(&mut self, blocks: u32) -> Result<()> {
        let buf = self.data_mut()?;
        LittleEndian::write_u32(&mut buf[HDR_OFF_SIZE..HDR_OFF_SIZE + 4], blocks);
        Ok(())
    }

    /// Занятых блоков (включая заголовочные).
    #[inline]
    pub fn used(&self) -> u32 {
        LittleEndian::read_u32(&self.data()[HDR_OFF_USED..HDR_OFF_USED + 4])
    }

    pub(crate) fn set_used(&mut self, blocks: u32) -> Result<()> {
        let buf = self.data_mut()?;
        LittleEndian::write_u32(&mut buf[HDR_OFF_USED..HDR_OFF_USED + 4], blocks);
        Ok(())
    }

    /// Число голов хэш-цепочек: size >> 4. Инвариант формата.
    #[inline]
    pub fn index_len(&self) -> u32 {
        self.size() >> INDEX_SHIFT
    }

    /// Сколько блоков занимает заголовок (fixed + таблица индекса).
    #[inline]
    pub fn header_blocks(&self) -> u32 {
        let bytes = HDR_FIXED_SIZE + (self.index_len() as usize) * 4;
        (((bytes - 1) >> BLOCK_SHIFT) + 1) as u32
    }

    /// Голова цепочки `i` (0 = пустая).
    pub fn bucket_head(&self, i: u32) -> u32 {
        debug_assert!(i < self.index_len());
        let off = HDR_INDEX_OFF + (i as usize) * 4;
        LittleEndian::read_u32(&self.data()[off..off + 4])
    }

    pub(crate) fn set_bucket_head(&mut self, i: u32, bucket: u32) -> Result<()> {
        debug_assert!(i < self.index_len());
        let off = HDR_INDEX_OFF + (i as usize) * 4;
        let buf = self.data_mut()?;
        LittleEndian::write_u32(&mut buf[off..off + 4], bucket);
        Ok(())
    }

    // ----------------- bucket <-> offset -----------------

    #[inline]
    pub fn bucket_to_offset(bucket: u32) -> u64 {
        (bucket as u64) << BLOCK_SHIFT
    }

    /// Проверить, что bucket указывает внутрь области записей: [H, used).
    pub fn check_entry_bucket(&self, bucket: u32) -> Result<()> {
        let lo = self.header_blocks();
        let hi = self.used();
        if bucket < lo || bucket >= hi {
            return Err(anyhow!(
                "hash table corrupted: bucket {} outside [{}, {}) at {}",
                bucket,
                lo,
                hi,
                self.path.display()
            ));
        }
        Ok(())
    }

    /// Срез `nbytes` от начала блока `bucket` с проверкой границ мапы.
    pub fn entry_slice(&self, bucket: u32, nbytes: usize) -> Result<&[u8]> {
        let off = Self::bucket_to_offset(bucket);
        let end = off + nbytes as u64;
        if end > self.map_len as u64 {
            return Err(anyhow!(
                "heap corrupted: entry at bucket {} runs past the mapping ({} > {})",
                bucket,
                end,
                self.map_len
            ));
        }
        let off = off as usize;
        Ok(&self.data()[off..off + nbytes])
    }

    pub fn entry_slice_mut(&mut self, bucket: u32, nbytes: usize) -> Result<&mut [u8]> {
        let off = Self::bucket_to_offset(bucket);
        let end = off + nbytes as u64;
        if end > self.map_len as u64 {
            return Err(anyhow!(
                "heap corrupted: entry at bucket {} runs past the mapping ({} > {})",
                bucket,
                end,
                self.map_len
            ));
        }
        let off = off as usize;
        Ok(&mut self.data_mut()?[off..off + nbytes])
    }

    // ----------------- точечные записи в заголовок entry -----------------

    pub(crate) fn write_entry_next(&mut self, bucket: u32, next: u32) -> Result<()> {
        let s = self.entry_slice_mut(bucket, ENT_OFF_NEXT + 4)?;
        LittleEndian::write_u32(&mut s[ENT_OFF_NEXT..ENT_OFF_NEXT + 4], next);
        Ok(())
    }

    pub(crate) fn write_entry_val(&mut self, bucket: u32, val: u32) -> Result<()> {
        let s = self.entry_slice_mut(bucket, ENT_OFF_VAL + 4)?;
        LittleEndian::write_u32(&mut s[ENT_OFF_VAL..ENT_OFF_VAL + 4], val);
        Ok(())
    }

    pub(crate) fn write_entry_magic(&mut self, bucket: u32, magic: &[u8; 8]) -> Result<()> {
        let s = self.entry_slice_mut(bucket, ENT_OFF_MAGIC + 8)?;
        s[ENT_OFF_MAGIC..ENT_OFF_MAGIC + 8].copy_from_slice(magic);
        Ok(())
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        if !self.is_readonly() {
            let _ = self.flush();
            let _ = self.file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_path(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("instadb-{}-{}-{}.db", prefix, pid, t))
    }

    #[test]
    fn fresh_heap_gets_initialized() {
        let path = unique_path("heap-init");
        let heap = Heap::open_rw(&path, 1 << 20).unwrap();
        assert_eq!(&heap.data()[0..8], DB_MAGIC);
        assert_eq!(heap.size(), (1 << 20) / 64);
        assert_eq!(heap.index_len(), heap.size() >> 4);
        // заголовок: 16 + 4*1024 = 4112 байт => 65 блоков
        assert_eq!(heap.header_blocks(), 65);
        assert_eq!(heap.used(), 65);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn reopen_keeps_header() {
        let path = unique_path("heap-reopen");
        {
            let mut heap = Heap::open_rw(&path, 1 << 16).unwrap();
            let used = heap.used();
            heap.set_used(used + 3).unwrap();
            heap.set_bucket_head(0, used).unwrap();
        }
        let heap = Heap::open_rw(&path, 1 << 16).unwrap();
        assert_eq!(heap.used(), heap.header_blocks() + 3);
        assert_eq!(heap.bucket_head(0), heap.header_blocks());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_ro_rejects_uninitialized_file() {
        let path = unique_path("heap-ro");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        assert!(Heap::open_ro(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_bad_size() {
        let path = unique_path("heap-badsize");
        assert!(Heap::open_rw(&path, 100).is_err());
        assert!(Heap::open_rw(&path, 512).is_err()); // меньше 16 блоков
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn entry_bucket_bounds() {
        let path = unique_path("heap-bounds");
        let mut heap = Heap::open_rw(&path, 1 << 16).unwrap();
        let h = heap.header_blocks();
        heap.set_used(h + 2).unwrap();
        assert!(heap.check_entry_bucket(h).is_ok());
        assert!(heap.check_entry_bucket(h + 1).is_ok());
        assert!(heap.check_entry_bucket(h + 2).is_err());
        assert!(heap.check_entry_bucket(0).is_err());
        assert!(heap.check_entry_bucket(h - 1).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
