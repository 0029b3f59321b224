//! store/open — открытие хранилища: первичная куча, зеркала, оверлеи.
//!
//! Политика зеркал/оверлеев: не открывшееся зеркало или оверлей
//! пропускается с warn — первичная куча остаётся авторитетной.
//! Зеркало с заголовком, расходящимся с первичным (size или used),
//! отвергается; молчаливого «ремонта» нет.

use anyhow::Result;
use log::{info, warn};
use std::sync::Mutex;

use crate::codec::Codec;
use crate::config::{validate_heap_size, StoreOptions};
use crate::heap::Heap;
use crate::store::Store;

impl Store {
    /// Открыть хранилище на запись: первичный файл растёт до opts.size,
    /// зеркала открываются read/write на тот же размер, оверлеи — read-only.
    pub fn open(opts: &StoreOptions) -> Result<Store> {
        validate_heap_size(opts.size)?;

        let primary = Heap::open_rw(&opts.storage_file, opts.size)?;

        let mut mirrors = Vec::with_capacity(opts.copies.len());
        for path in &opts.copies {
            match Heap::open_rw(path, opts.size) {
                Ok(h) => {
                    if h.size() != primary.size() || h.used() != primary.used() {
                        warn!(
                            "mirror {} diverges from primary (size {}/{}, used {}/{}); skipped",
                            path.display(),
                            h.size(),
                            primary.size(),
                            h.used(),
                            primary.used()
                        );
                        continue;
                    }
                    mirrors.push(h);
                }
                Err(e) => warn!("mirror {}: {:#}; skipped", path.display(), e),
            }
        }

        let overlays = open_overlays(opts);

        info!(
            "store {} opened rw: {} blocks ({} used), {} mirror(s), {} overlay(s)",
            opts.storage_file.display(),
            primary.size(),
            primary.used(),
            mirrors.len(),
            overlays.len()
        );

        Ok(Store {
            overlays,
            mirrors,
            primary,
            codec: Mutex::new(Codec::new()),
        })
    }

    /// Открыть хранилище только на чтение: fetch/stat работают,
    /// store/associate вернут ошибку. Списки copies игнорируются.
    pub fn open_ro(opts: &StoreOptions) -> Result<Store> {
        let primary = Heap::open_ro(&opts.storage_file)?;
        let overlays = open_overlays(opts);

        info!(
            "store {} opened ro: {} blocks ({} used), {} overlay(s)",
            opts.storage_file.display(),
            primary.size(),
            primary.used(),
            overlays.len()
        );

        Ok(Store {
            overlays,
            mirrors: Vec::new(),
            primary,
            codec: Mutex::new(Codec::new()),
        })
    }
}

fn open_overlays(opts: &StoreOptions) -> Vec<Heap> {
    let mut overlays = Vec::with_capacity(opts.rocopies.len());
    for path in &opts.rocopies {
        match Heap::open_ro(path) {
            Ok(h) => overlays.push(h),
            Err(e) => warn!("overlay {}: {:#}; skipped", path.display(), e),
        }
    }
    overlays
}
