//! End-to-end scenarios over a real filesystem.
//!
//! Two engine instances over the same base directory stand in for two
//! processes: they share the on-disk state but not the handle table.

#![cfg(unix)]

use std::path::Path;

use spoolq::{
    AccessMode, AccessType, EngineConfig, QueueEngine, QueueError, QueueFlags, SeekTarget, UnixVfs,
};
use tempfile::TempDir;

fn engine_at(base: &Path) -> QueueEngine<UnixVfs> {
    QueueEngine::new(UnixVfs::new(), EngineConfig::new(base)).unwrap()
}

fn payload_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    names
}

#[test]
fn create_enqueue_getlength_dequeue_destroy() {
    let tmp = TempDir::new().unwrap();
    let eng = engine_at(tmp.path());

    eng.create("q", 4, 64, QueueFlags::RANDOM_ACCESS).unwrap();
    let h = eng
        .open("q", AccessType::ReadWrite, AccessMode::BinaryPacked)
        .unwrap();

    eng.enqueue(h, b"hello").unwrap();
    assert_eq!(eng.get_length(h).unwrap(), 1);

    let mut buf = [0u8; 64];
    let n = eng.dequeue(h, &mut buf).unwrap();
    assert_eq!(n, 5);
    assert_eq!(&buf[..n], b"hello");

    eng.close(h).unwrap();
    eng.destroy("q").unwrap();
    assert!(!tmp.path().join("q").exists());
}

#[test]
fn overflow_eviction_drops_oldest_payload() {
    let tmp = TempDir::new().unwrap();
    let eng = engine_at(tmp.path());

    eng.create("q", 3, 64, QueueFlags::empty()).unwrap();
    let h = eng
        .open("q", AccessType::ReadWrite, AccessMode::BinaryPacked)
        .unwrap();

    for payload in [b"a".as_slice(), b"b", b"c", b"d"] {
        eng.enqueue(h, payload).unwrap();
    }

    assert_eq!(eng.get_length(h).unwrap(), 3);
    // Exactly three payload files; the first entry's file is gone.
    assert_eq!(payload_files(&tmp.path().join("q")).len(), 3);

    let mut buf = [0u8; 8];
    for expected in [b"b", b"c", b"d"] {
        let n = eng.dequeue(h, &mut buf).unwrap();
        assert_eq!(&buf[..n], expected);
    }

    eng.close(h).unwrap();
}

#[test]
fn seek_random_access_walk() {
    let tmp = TempDir::new().unwrap();
    let eng = engine_at(tmp.path());

    eng.create("q", 8, 64, QueueFlags::RANDOM_ACCESS).unwrap();
    let w = eng
        .open("q", AccessType::ReadWrite, AccessMode::BinaryPacked)
        .unwrap();
    for payload in [b"x".as_slice(), b"y", b"z"] {
        eng.enqueue(w, payload).unwrap();
    }
    eng.close(w).unwrap();

    let r = eng
        .open("q", AccessType::ReadOnly, AccessMode::BinaryPacked)
        .unwrap();
    let mut buf = [0u8; 8];

    eng.seek(r, SeekTarget::Head).unwrap();
    let n = eng.get_entry(r, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"x");
    let n = eng.get_entry(r, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"y");
    let n = eng.get_entry(r, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"z");
    // The cursor stays on the tail instead of walking past it.
    let n = eng.get_entry(r, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"z");

    eng.seek(r, SeekTarget::Position(1)).unwrap();
    let n = eng.get_entry(r, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"y");

    eng.close(r).unwrap();
}

#[test]
fn seek_rejected_without_random_access() {
    let tmp = TempDir::new().unwrap();
    let eng = engine_at(tmp.path());

    eng.create("q", 4, 64, QueueFlags::empty()).unwrap();
    let r = eng
        .open("q", AccessType::ReadOnly, AccessMode::BinaryPacked)
        .unwrap();
    assert!(matches!(
        eng.seek(r, SeekTarget::Head),
        Err(QueueError::NotSeekable)
    ));
    eng.close(r).unwrap();
}

#[test]
fn cross_process_busy_until_writer_closes() {
    let tmp = TempDir::new().unwrap();
    let a = engine_at(tmp.path());
    let b = engine_at(tmp.path());

    a.create("q", 4, 64, QueueFlags::empty()).unwrap();
    let ha = a
        .open("q", AccessType::ReadWrite, AccessMode::BinaryPacked)
        .unwrap();

    let denied = b.open("q", AccessType::ReadOnly, AccessMode::BinaryPacked);
    match denied {
        Err(ref e @ QueueError::QueueBusy { .. }) => assert!(e.is_transient()),
        other => panic!("expected busy, got {other:?}"),
    }

    a.close(ha).unwrap();
    let hb = b
        .open("q", AccessType::ReadOnly, AccessMode::BinaryPacked)
        .unwrap();
    b.close(hb).unwrap();
}

#[test]
fn read_only_sharing_counts_in_lock_file() {
    let tmp = TempDir::new().unwrap();
    let a = engine_at(tmp.path());
    let b = engine_at(tmp.path());

    a.create("q", 4, 64, QueueFlags::empty()).unwrap();
    let rolock = tmp.path().join("q").join(".rolock");

    let ha = a
        .open("q", AccessType::ReadOnly, AccessMode::BinaryPacked)
        .unwrap();
    assert_eq!(std::fs::read(&rolock).unwrap(), vec![1]);

    let hb = b
        .open("q", AccessType::ReadOnly, AccessMode::BinaryPacked)
        .unwrap();
    assert_eq!(std::fs::read(&rolock).unwrap(), vec![2]);

    a.close(ha).unwrap();
    assert_eq!(std::fs::read(&rolock).unwrap(), vec![1]);

    b.close(hb).unwrap();
    assert!(!rolock.exists());
}

#[test]
fn destroy_absent_queue_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let eng = engine_at(tmp.path());
    eng.destroy("never-created").unwrap();
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn open_close_leaves_no_lock_file() {
    let tmp = TempDir::new().unwrap();
    let eng = engine_at(tmp.path());

    for access in [
        AccessType::ReadOnly,
        AccessType::WriteOnly,
        AccessType::ReadWrite,
    ] {
        eng.create("q", 4, 64, QueueFlags::empty()).unwrap();
        let h = eng.open("q", access, AccessMode::BinaryPacked).unwrap();
        eng.close(h).unwrap();
        for lock in [".rolock", ".wolock", ".rwlock"] {
            assert!(
                !tmp.path().join("q").join(lock).exists(),
                "{lock} left behind after {access} close"
            );
        }
        eng.destroy("q").unwrap();
    }
}

#[test]
fn drain_restores_payload_free_directory() {
    let tmp = TempDir::new().unwrap();
    let eng = engine_at(tmp.path());

    eng.create("q", 5, 64, QueueFlags::empty()).unwrap();
    let h = eng
        .open("q", AccessType::ReadWrite, AccessMode::BinaryPacked)
        .unwrap();

    let entries: Vec<Vec<u8>> = (0u8..5).map(|i| vec![i; (i + 1) as usize]).collect();
    for entry in &entries {
        eng.enqueue(h, entry).unwrap();
    }

    let mut buf = [0u8; 8];
    for expected in &entries {
        let n = eng.dequeue(h, &mut buf).unwrap();
        assert_eq!(&buf[..n], expected.as_slice());
    }

    assert!(payload_files(&tmp.path().join("q")).is_empty());
    eng.close(h).unwrap();
}

#[test]
fn reopen_with_matching_params_is_the_same_handle() {
    let tmp = TempDir::new().unwrap();
    let eng = engine_at(tmp.path());

    eng.create("q", 4, 64, QueueFlags::empty()).unwrap();
    let first = eng
        .open("q", AccessType::ReadOnly, AccessMode::Unpacked)
        .unwrap();
    let second = eng
        .open("q", AccessType::ReadOnly, AccessMode::Unpacked)
        .unwrap();
    assert_eq!(first, second);
    // No second reader was counted.
    assert_eq!(
        std::fs::read(tmp.path().join("q").join(".rolock")).unwrap(),
        vec![1]
    );
    eng.close(first).unwrap();
}

#[test]
fn state_survives_engine_restart() {
    let tmp = TempDir::new().unwrap();
    {
        let eng = engine_at(tmp.path());
        eng.create("q", 4, 64, QueueFlags::empty()).unwrap();
        let h = eng
            .open("q", AccessType::ReadWrite, AccessMode::BinaryPacked)
            .unwrap();
        eng.enqueue(h, b"persisted").unwrap();
        eng.close(h).unwrap();
    }

    // A fresh engine (process restart) sees the same queue contents.
    let eng = engine_at(tmp.path());
    let h = eng
        .open("q", AccessType::ReadWrite, AccessMode::BinaryPacked)
        .unwrap();
    assert_eq!(eng.get_length(h).unwrap(), 1);
    let mut buf = [0u8; 64];
    let n = eng.dequeue(h, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"persisted");
    eng.close(h).unwrap();
}
