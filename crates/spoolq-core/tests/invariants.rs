//! Property tests: the structural invariants of the on-disk state hold
//! after every operation of any random operation sequence.

use std::collections::BTreeSet;
use std::path::Path;

use proptest::prelude::*;
use spoolq_core::layout::{read_header, read_lut, reference_name};
use spoolq_core::lock::{RO_LOCK, RW_LOCK, WO_LOCK};
use spoolq_core::{EngineConfig, QueueEngine};
use spoolq_types::limits::LUT_ENTRY_SIZE;
use spoolq_types::{AccessMode, AccessType, QueueFlags, SeekTarget};
use spoolq_vfs::{MemoryVfs, Vfs};

#[derive(Debug, Clone)]
enum Op {
    Enqueue(Vec<u8>),
    Dequeue,
    Seek(u8),
    GetEntry,
    GetLength,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 1..16).prop_map(Op::Enqueue),
        Just(Op::Dequeue),
        (0u8..8).prop_map(Op::Seek),
        Just(Op::GetEntry),
        Just(Op::GetLength),
    ]
}

/// Check the universal invariants of one queue directory.
fn check_invariants(
    vfs: &MemoryVfs,
    dir: &Path,
    last_reference_count: &mut u16,
) -> Result<(), TestCaseError> {
    let hdr = read_header(vfs, dir).expect("header must stay readable");
    let lut = read_lut(vfs, dir, hdr.max_entries).expect("LUT must stay readable");

    // Live-slot count matches the header.
    prop_assert_eq!(lut.live_count(), hdr.num_of_entries as usize);

    // Live slots form a contiguous ring run starting at the head.
    let mut expected_live = BTreeSet::new();
    for k in 0..hdr.num_of_entries {
        let pos =
            ((u16::from(hdr.head_lut_offs) + u16::from(k)) % u16::from(hdr.max_entries)) as u8;
        expected_live.insert(pos);
    }
    for i in 0..hdr.max_entries {
        prop_assert_eq!(
            lut.slot(i).is_some(),
            expected_live.contains(&i),
            "slot {} live-ness diverges from the ring run",
            i
        );
    }

    // Tail sits at the end of the run; an empty ring keeps head, tail,
    // and the read cursor together.
    if hdr.num_of_entries > 0 {
        let expected_tail = ((u16::from(hdr.head_lut_offs) + u16::from(hdr.num_of_entries) - 1)
            % u16::from(hdr.max_entries)) as u8;
        prop_assert_eq!(hdr.tail_lut_offs, expected_tail);
        prop_assert!(
            expected_live.contains(&hdr.seek_lut_offs),
            "read cursor {} left the live range",
            hdr.seek_lut_offs
        );
    } else {
        prop_assert_eq!(hdr.head_lut_offs, hdr.tail_lut_offs);
        prop_assert_eq!(hdr.seek_lut_offs, hdr.head_lut_offs);
    }

    // Payload files and live slots are in bijection.
    let live_names: BTreeSet<String> = lut
        .live_references()
        .map(|r| reference_name(&r).expect("live slots hold digit references"))
        .collect();
    let on_disk: BTreeSet<String> = vfs
        .list_dir(dir)
        .expect("queue dir must stay listable")
        .into_iter()
        .filter(|n| n.len() == LUT_ENTRY_SIZE && n.bytes().all(|b| b.is_ascii_digit()))
        .collect();
    prop_assert_eq!(&live_names, &on_disk);

    // The reference counter never runs backwards.
    prop_assert!(hdr.reference_count >= *last_reference_count);
    *last_reference_count = hdr.reference_count;

    // At most one lock file.
    let locks = [RO_LOCK, WO_LOCK, RW_LOCK]
        .iter()
        .filter(|n| vfs.exists(&dir.join(n)).expect("lock probe"))
        .count();
    prop_assert!(locks <= 1);

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn invariants_hold_after_every_operation(
        max_entries in 1u8..6,
        ops in proptest::collection::vec(arb_op(), 1..40),
    ) {
        let vfs = MemoryVfs::new();
        let eng = QueueEngine::new(vfs.clone(), EngineConfig::new("/queues")).unwrap();
        eng.create("q", max_entries, 64, QueueFlags::RANDOM_ACCESS).unwrap();
        let h = eng
            .open("q", AccessType::ReadWrite, AccessMode::BinaryPacked)
            .unwrap();

        let dir = Path::new("/queues/q");
        let mut last_reference_count = 0u16;
        let mut buf = [0u8; 32];

        check_invariants(&vfs, dir, &mut last_reference_count)?;
        for op in ops {
            // Status errors (empty queue, out-of-range seek) are part of
            // the contract; the disk must stay consistent either way.
            let _ = match op {
                Op::Enqueue(data) => eng.enqueue(h, &data),
                Op::Dequeue => eng.dequeue(h, &mut buf).map(|_| ()),
                Op::Seek(p) => eng.seek(h, SeekTarget::Position(p)),
                Op::GetEntry => eng.get_entry(h, &mut buf).map(|_| ()),
                Op::GetLength => eng.get_length(h).map(|_| ()),
            };
            check_invariants(&vfs, dir, &mut last_reference_count)?;
        }
    }

    /// Dequeue order equals enqueue order for any fill level within
    /// capacity, and draining leaves no payload files.
    #[test]
    fn fifo_order_preserved(
        max_entries in 4u8..8,
        fill in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..16), 1..5),
    ) {
        let vfs = MemoryVfs::new();
        let eng = QueueEngine::new(vfs.clone(), EngineConfig::new("/queues")).unwrap();
        eng.create("q", max_entries, 64, QueueFlags::empty()).unwrap();
        let h = eng
            .open("q", AccessType::ReadWrite, AccessMode::BinaryPacked)
            .unwrap();

        for entry in &fill {
            eng.enqueue(h, entry).unwrap();
        }
        let mut buf = [0u8; 32];
        for expected in &fill {
            let n = eng.dequeue(h, &mut buf).unwrap();
            prop_assert_eq!(&buf[..n], expected.as_slice());
        }

        let leftovers = vfs
            .list_dir(Path::new("/queues/q"))
            .unwrap()
            .into_iter()
            .filter(|n| !n.starts_with('.'))
            .count();
        prop_assert_eq!(leftovers, 0);
    }
}
