use anyhow::Result;
use std::path::PathBuf;

use instadb::config::StoreOptions;
use instadb::hash::content_hash;
use instadb::store::Store;
use instadb::util::hex_encode;

fn unique_path(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("instadb-{}-{}-{}.db", prefix, pid, t))
}

#[test]
fn dedup_small_payload() -> Result<()> {
    let path = unique_path("dedup-small");
    let mut store = Store::open(&StoreOptions::new(&path, 1 << 20))?;

    let h1 = store.store(b"hello")?.unwrap();
    let used_after_first = store.used_blocks();

    // повторный store того же буфера: тот же hex, used не растёт
    let h2 = store.store(b"hello")?.unwrap();
    assert_eq!(h1, h2, "identical payloads must share one entry");
    assert_eq!(
        store.used_blocks(),
        used_after_first,
        "second store must not allocate"
    );

    // другой буфер обязан аллоцировать
    let h3 = store.store(b"hello2")?.unwrap();
    assert_ne!(h1, h3);
    assert!(store.used_blocks() > used_after_first);

    drop(store);
    let _ = std::fs::remove_file(&path);
    Ok(())
}

#[test]
fn dedup_large_payload() -> Result<()> {
    let path = unique_path("dedup-large");
    let mut store = Store::open(&StoreOptions::new(&path, 1 << 20))?;

    let big = vec![0x5Au8; 20_000];
    let h1 = store.store(&big)?.unwrap();
    let used_after_first = store.used_blocks();

    let h2 = store.store(&big)?.unwrap();
    assert_eq!(h1, h2);
    assert_eq!(
        store.used_blocks(),
        used_after_first,
        "chunked payload must dedup on the full-buffer hash"
    );

    drop(store);
    let _ = std::fs::remove_file(&path);
    Ok(())
}

#[test]
fn store_returns_blake3_of_payload() -> Result<()> {
    let path = unique_path("dedup-hashid");
    let mut store = Store::open(&StoreOptions::new(&path, 1 << 20))?;

    // малый и большой буферы: hex всегда blake3 исходных байт
    for payload in [
        b"tiny".to_vec(),
        vec![7u8; 4096],
        vec![42u8; 10_000],
        (0..50_000u32).flat_map(|x| x.to_le_bytes()).collect::<Vec<u8>>(),
    ] {
        let hex = store.store(&payload)?.unwrap();
        assert_eq!(
            hex,
            hex_encode(&content_hash(&payload)),
            "store must address by blake3 of the original buffer"
        );
    }

    drop(store);
    let _ = std::fs::remove_file(&path);
    Ok(())
}

#[test]
fn shared_chunks_dedup_across_buffers() -> Result<()> {
    let path = unique_path("dedup-chunks");
    let mut store = Store::open(&StoreOptions::new(&path, 1 << 20))?;

    // два разных больших буфера из одинаковых 4 KiB-чанков:
    // вторая вставка добавляет только таблицу чанков
    let a = vec![0xAAu8; 8192];
    let b = vec![0xAAu8; 12288];

    store.store(&a)?.unwrap();
    let used_mid = store.used_blocks();
    store.store(&b)?.unwrap();
    let delta = store.used_blocks() - used_mid;

    // таблица чанков b сжимается в один-два блока
    assert!(
        delta <= 2,
        "identical chunks must be shared, got {} new blocks",
        delta
    );

    drop(store);
    let _ = std::fs::remove_file(&path);
    Ok(())
}
