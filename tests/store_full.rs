use anyhow::Result;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::path::PathBuf;

use instadb::config::StoreOptions;
use instadb::store::Store;

fn unique_path(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("instadb-{}-{}-{}.db", prefix, pid, t))
}

#[test]
fn tiny_heap_rejects_big_accepts_small() -> Result<()> {
    // куча на 64 блока
    let path = unique_path("full-tiny");
    let mut store = Store::open(&StoreOptions::new(&path, 4096))?;
    assert_eq!(store.size_blocks(), 64);

    // несжимаемый буфер, которому не хватает хвоста
    let mut rng = StdRng::seed_from_u64(99);
    let mut big = vec![0u8; 4000];
    rng.fill_bytes(&mut big);
    let used_before = store.used_blocks();
    let err = store.store(&big).unwrap_err();
    assert!(
        err.to_string().contains("full"),
        "expected store-full, got: {}",
        err
    );
    assert_eq!(store.used_blocks(), used_before, "failed insert must not allocate");

    // повторная попытка с маленьким буфером — успех, заголовок цел
    let hex = store.store(b"hi")?.unwrap();
    assert_eq!(store.fetch(&hex, true, false)?.unwrap().as_ref(), b"hi");
    assert_eq!(store.size_blocks(), 64);

    drop(store);
    let _ = std::fs::remove_file(&path);
    Ok(())
}

#[test]
fn filling_up_keeps_heap_usable() -> Result<()> {
    let path = unique_path("full-fill");
    let mut store = Store::open(&StoreOptions::new(&path, 8192))?; // 128 блоков
    let mut rng = StdRng::seed_from_u64(123);

    // набиваем кучу несжимаемыми записями до отказа
    let mut stored = Vec::new();
    let mut full_hit = false;
    for _ in 0..64 {
        let mut payload = vec![0u8; 3000];
        rng.fill_bytes(&mut payload);
        let used_before = store.used_blocks();
        match store.store(&payload) {
            Ok(Some(hex)) => stored.push((hex, payload)),
            Ok(None) => unreachable!("payload is non-empty"),
            Err(e) => {
                assert!(e.to_string().contains("full"), "unexpected error: {}", e);
                assert_eq!(store.used_blocks(), used_before, "used must not move on failure");
                full_hit = true;
                break;
            }
        }
    }
    assert!(full_hit, "128-block heap must fill up");
    assert!(!stored.is_empty(), "at least one insert must have succeeded");
    assert!(store.used_blocks() <= store.size_blocks());

    // всё, что легло до отказа, читается
    for (hex, payload) in &stored {
        let got = store.fetch(hex, true, false)?.expect("stored entry must survive");
        assert_eq!(got.as_ref(), payload.as_slice());
    }

    // дедуп работает и в полной куче
    let (hex0, payload0) = &stored[0];
    assert_eq!(store.store(payload0)?.unwrap(), *hex0);

    drop(store);
    let _ = std::fs::remove_file(&path);
    Ok(())
}

#[test]
fn failed_chunked_insert_leaves_no_entry() -> Result<()> {
    let path = unique_path("full-chunked");
    let mut store = Store::open(&StoreOptions::new(&path, 8192))?; // 128 блоков
    let mut rng = StdRng::seed_from_u64(7);

    // 20 KiB случайных данных: чанки не влезут, вставка обязана упасть
    let mut payload = vec![0u8; 20_000];
    rng.fill_bytes(&mut payload);
    let err = store.store(&payload).unwrap_err();
    assert!(err.to_string().contains("full"), "unexpected error: {}", err);

    // хэш целого буфера не должен резолвиться
    let hex = instadb::util::hex_encode(&instadb::hash::content_hash(&payload));
    assert!(store.fetch(&hex, true, false)?.is_none());

    // куча остаётся рабочей
    let hex_ok = store.store(b"small survivor")?.unwrap();
    assert_eq!(
        store.fetch(&hex_ok, true, false)?.unwrap().as_ref(),
        b"small survivor"
    );

    drop(store);
    let _ = std::fs::remove_file(&path);
    Ok(())
}
