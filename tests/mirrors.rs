use anyhow::Result;
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

/// Сравнить два файла на первых used*64 байтах.
fn assert_same_prefix(a: &PathBuf, b: &PathBuf, used_blocks: u32) {
    let bytes_a = std::fs::read(a).unwrap();
    let bytes_b = std::fs::read(b).unwrap();
    let n = (used_blocks as usize) * 64;
    assert!(bytes_a.len() >= n && bytes_b.len() >= n);
    assert_eq!(
        &bytes_a[..n],
        &bytes_b[..n],
        "primary and mirror must be byte-identical over the used prefix"
    );
}

#[test]
fn mirror_stays_in_lockstep() -> Result<()> {
    let primary = unique_path("mir-a");
    let mirror = unique_path("mir-b");

    let used;
    {
        let opts = StoreOptions::new(&primary, 1 << 20).with_copy(&mirror);
        let mut store = Store::open(&opts)?;
        assert_eq!(store.mirror_count(), 1);

        // одиночный байт, малые и чанкованные записи, ассоциация
        store.store(b"x")?.unwrap();
        store.store(b"second value")?.unwrap();
        store.store(&vec![0xC3u8; 10_000])?.unwrap();
        assert!(store.associate(b"user", b"alice")?);

        used = store.used_blocks();
    }

    assert_same_prefix(&primary, &mirror, used);

    let _ = std::fs::remove_file(&primary);
    let _ = std::fs::remove_file(&mirror);
    Ok(())
}

#[test]
fn mirror_survives_dedup_and_growth() -> Result<()> {
    let primary = unique_path("mir2-a");
    let mirror = unique_path("mir2-b");

    let used;
    {
        let opts = StoreOptions::new(&primary, 1 << 20).with_copy(&mirror);
        let mut store = Store::open(&opts)?;
        for i in 0..50u32 {
            store.store(format!("value-{}", i).as_bytes())?.unwrap();
        }
        // дедуп-повторы не должны разводить кучи
        for i in 0..50u32 {
            store.store(format!("value-{}", i % 10).as_bytes())?.unwrap();
        }
        used = store.used_blocks();
    }

    assert_same_prefix(&primary, &mirror, used);

    let _ = std::fs::remove_file(&primary);
    let _ = std::fs::remove_file(&mirror);
    Ok(())
}

#[test]
fn diverged_mirror_is_rejected() -> Result<()> {
    let primary = unique_path("mir3-a");
    let mirror = unique_path("mir3-b");

    // первичная куча получает данные
    {
        let mut store = Store::open(&StoreOptions::new(&primary, 1 << 20))?;
        store.store(b"primary only")?.unwrap();
    }
    // зеркало живёт своей жизнью
    {
        let mut store = Store::open(&StoreOptions::new(&mirror, 1 << 20))?;
        store.store(b"mirror only data that differs")?.unwrap();
        store.store(b"and one more")?.unwrap();
    }

    // used расходится => зеркало отвергнуто, первичная куча авторитетна
    let opts = StoreOptions::new(&primary, 1 << 20).with_copy(&mirror);
    let mut store = Store::open(&opts)?;
    assert_eq!(store.mirror_count(), 0, "diverged mirror must be skipped");
    store.store(b"still writable")?.unwrap();

    drop(store);
    let _ = std::fs::remove_file(&primary);
    let _ = std::fs::remove_file(&mirror);
    Ok(())
}

#[test]
fn missing_mirror_path_is_skipped() -> Result<()> {
    let primary = unique_path("mir4-a");
    let bad = PathBuf::from("/nonexistent-dir-instadb/mirror.db");

    let opts = StoreOptions::new(&primary, 1 << 20).with_copy(&bad);
    let mut store = Store::open(&opts)?;
    assert_eq!(store.mirror_count(), 0);
    store.store(b"works without the mirror")?.unwrap();

    drop(store);
    let _ = std::fs::remove_file(&primary);
    Ok(())
}
