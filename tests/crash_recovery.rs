//! Durability and recovery: close/reopen round-trips, tolerance of orphan
//! pages left by a crash between the data fsync and the master-page update,
//! and rejection of files that fail validation.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

use burrowdb::{config::PAGE_SIZE, Database, PutMode, StoreError};

#[test]
fn reopen_sees_exactly_the_last_committed_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("durable.db");

    {
        let db = Database::open(&path).unwrap();
        let mut tx = db.begin_write();
        for i in 0..300 {
            tx.put(
                format!("key{i:04}").as_bytes(),
                format!("val{i:04}").as_bytes(),
                PutMode::Upsert,
            )
            .unwrap();
        }
        tx.commit().unwrap();
        db.set(b"late", b"addition").unwrap();
        assert_eq!(db.stats().unwrap().version, 2);
    }

    let db = Database::open(&path).unwrap();
    assert_eq!(db.stats().unwrap().version, 2);
    assert_eq!(db.get(b"late").unwrap(), Some(b"addition".to_vec()));
    for i in 0..300 {
        assert_eq!(
            db.get(format!("key{i:04}").as_bytes()).unwrap(),
            Some(format!("val{i:04}").into_bytes())
        );
    }

    let tx = db.begin_read();
    let mut iter = tx.seek_le(b"").unwrap();
    let mut count = 0;
    while iter.deref().unwrap().is_some() {
        count += 1;
        iter.next().unwrap();
    }
    assert_eq!(count, 302, "sentinel + 300 keys + one late key");
}

#[test]
fn orphan_pages_from_an_interrupted_commit_are_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crashy.db");

    {
        let db = Database::open(&path).unwrap();
        let mut tx = db.begin_write();
        tx.put(b"survivor", b"v1", PutMode::Upsert).unwrap();
        tx.put(b"victim", b"gone", PutMode::Upsert).unwrap();
        tx.commit().unwrap();
    }
    let committed_size = std::fs::metadata(&path).unwrap().len();

    // Simulate a crash after phase 1 of a later commit: its data pages
    // reached the file but the master page still names the old version.
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        let orphan = vec![0xdbu8; PAGE_SIZE];
        for _ in 0..8 {
            file.write_all(&orphan).unwrap();
        }
        file.sync_all().unwrap();
    }

    let db = Database::open(&path).unwrap();
    assert_eq!(db.stats().unwrap().version, 1, "old version must win");
    assert_eq!(db.get(b"survivor").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(db.get(b"victim").unwrap(), Some(b"gone".to_vec()));

    let size = std::fs::metadata(&path).unwrap().len();
    assert!(size > committed_size, "orphan pages remain in the file");

    // the database stays fully usable; new commits simply append past the
    // orphans or recycle properly freed pages
    db.set(b"after", b"crash").unwrap();
    assert_eq!(db.get(b"after").unwrap(), Some(b"crash".to_vec()));
}

#[test]
fn freed_pages_survive_reopen_and_are_recycled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recycle.db");

    {
        let db = Database::open(&path).unwrap();
        let mut tx = db.begin_write();
        let val = vec![0x42u8; 2500];
        for i in 0..120 {
            tx.put(format!("k{i:03}").as_bytes(), &val, PutMode::Upsert)
                .unwrap();
        }
        tx.commit().unwrap();

        let mut tx = db.begin_write();
        for i in 0..120 {
            tx.del(format!("k{i:03}").as_bytes()).unwrap();
        }
        tx.commit().unwrap();
        assert!(db.stats().unwrap().free_pages > 0);
    }

    let db = Database::open(&path).unwrap();
    let stats = db.stats().unwrap();
    assert!(stats.free_pages > 0, "free list must survive reopen");
    assert_eq!(
        stats.page_used,
        1 + stats.reachable_pages + stats.free_pages as u64 + stats.free_chain_pages as u64
    );

    // a fresh write reuses the reloaded free pages instead of growing
    let size_before = std::fs::metadata(&path).unwrap().len();
    db.set(b"fresh", b"write").unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), size_before);
    assert_eq!(db.get(b"fresh").unwrap(), Some(b"write".to_vec()));
}

#[test]
fn open_rejects_a_file_with_a_foreign_signature() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.db");
    std::fs::write(&path, vec![0x5cu8; PAGE_SIZE]).unwrap();

    let err = Database::open(&path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::CorruptFile { .. })
    ));
}

#[test]
fn open_rejects_a_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.db");
    {
        let db = Database::open(&path).unwrap();
        db.set(b"k", b"v").unwrap();
    }
    {
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        let len = file.metadata().unwrap().len();
        file.set_len(len - 100).unwrap();
    }

    let err = Database::open(&path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::CorruptFile { .. })
    ));
}

#[test]
fn open_rejects_a_master_page_pointing_outside_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dangling.db");
    {
        let db = Database::open(&path).unwrap();
        db.set(b"k", b"v").unwrap();
    }
    {
        // corrupt the root pointer to reference a page beyond the file
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(16)).unwrap();
        file.write_all(&u64::MAX.to_le_bytes()).unwrap();
        file.sync_all().unwrap();
    }

    let err = Database::open(&path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::CorruptFile { .. })
    ));
}
