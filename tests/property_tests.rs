//! Property-based tests for the transaction protocol.
//!
//! The properties mirror the ring's contract: any segmentation of a byte
//! string round-trips intact, failed transactions leave no trace, and the
//! occupancy stays within `[0, capacity - 1]` under every operation mix.

use proptest::prelude::*;
use std::sync::atomic::Ordering;
use txring_rs::{HeapRing, TxRing};

fn occupancy(ring: &HeapRing) -> u64 {
    let head = ring.indices().head.load(Ordering::Relaxed);
    let tail = ring.indices().tail.load(Ordering::Relaxed);
    tail.wrapping_sub(head).wrapping_add(ring.capacity()) & (ring.capacity() - 1)
}

/// Splits `data` into non-empty pieces whose sizes cycle through `cuts`.
fn segments<'a>(data: &'a [u8], cuts: &[usize]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    let mut offset = 0;
    let mut i = 0;
    while offset < data.len() {
        let len = cuts[i % cuts.len()].clamp(1, data.len() - offset);
        pieces.push(&data[offset..offset + len]);
        offset += len;
        i += 1;
    }
    pieces
}

proptest! {
    /// A byte string written in any segmentation and read back in any other
    /// segmentation is reconstructed byte-for-byte.
    #[test]
    fn round_trip_any_segmentation(
        data in prop::collection::vec(any::<u8>(), 0..=255),
        write_cuts in prop::collection::vec(1usize..48, 1..8),
        read_cuts in prop::collection::vec(1usize..48, 1..8),
    ) {
        let ring = HeapRing::with_capacity(256);

        let mut tx = ring.begin_write();
        for piece in segments(&data, &write_cuts) {
            prop_assert!(tx.write_bytes(piece));
        }
        drop(tx);

        let mut out = vec![0u8; data.len()];
        let mut rx = ring.begin_read();
        {
            let mut offset = 0;
            let mut i = 0;
            while offset < out.len() {
                let len = read_cuts[i % read_cuts.len()].clamp(1, out.len() - offset);
                prop_assert!(rx.read_bytes(&mut out[offset..offset + len]));
                offset += len;
                i += 1;
            }
        }
        drop(rx);

        prop_assert_eq!(out, data);
        prop_assert_eq!(occupancy(&ring), 0);
    }

    /// Piece sums straddling multiples of the capacity still reconstruct the
    /// stream: every round shifts the wrap point of a small ring.
    #[test]
    fn wrap_straddle_reconstructs(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..=63), 1..32),
    ) {
        let ring = HeapRing::with_capacity(64);

        for chunk in &chunks {
            let mut tx = ring.begin_write();
            prop_assert!(tx.write_bytes(chunk));
            drop(tx);

            let mut out = vec![0u8; chunk.len()];
            let mut rx = ring.begin_read();
            prop_assert!(rx.read_bytes(&mut out));
            drop(rx);

            prop_assert_eq!(&out, chunk);
        }
    }

    /// Open-fail-close cycles are idempotent: the ring state is bit-identical
    /// before and after any number of oversized attempts.
    #[test]
    fn failed_transactions_leave_no_trace(
        prefill in 0u64..=63,
        attempts in 1usize..16,
    ) {
        let ring = HeapRing::with_capacity(64);

        let mut tx = ring.begin_write();
        prop_assert!(tx.write_bytes(&vec![0x5A; prefill as usize]));
        drop(tx);

        let head_before = ring.indices().head.load(Ordering::Relaxed);
        let tail_before = ring.indices().tail.load(Ordering::Relaxed);

        let oversized = vec![0xFF; (63 - prefill + 1) as usize];
        for _ in 0..attempts {
            let mut tx = ring.begin_write();
            prop_assert!(!tx.write_bytes(&oversized));
            drop(tx);
        }

        prop_assert_eq!(ring.indices().head.load(Ordering::Relaxed), head_before);
        prop_assert_eq!(ring.indices().tail.load(Ordering::Relaxed), tail_before);

        // The exact remaining space is still writable.
        let mut tx = ring.begin_write();
        prop_assert!(tx.write_bytes(&vec![0xA5; (63 - prefill) as usize]));
        drop(tx);
    }

    /// Occupancy stays in `[0, capacity - 1]` across any operation mix, and
    /// successful operations move it by exactly the piece size.
    #[test]
    fn occupancy_is_bounded(
        ops in prop::collection::vec((any::<bool>(), 1usize..80), 1..64),
    ) {
        let ring = HeapRing::with_capacity(64);
        let usable = ring.usable_capacity();

        for (is_write, size) in ops {
            let before = occupancy(&ring);
            if is_write {
                let mut tx = ring.begin_write();
                let ok = tx.write_bytes(&vec![1u8; size]);
                drop(tx);
                let expected = if ok { before + size as u64 } else { before };
                prop_assert_eq!(occupancy(&ring), expected);
            } else {
                let mut out = vec![0u8; size];
                let mut rx = ring.begin_read();
                let ok = rx.read_bytes(&mut out);
                drop(rx);
                let expected = if ok { before - size as u64 } else { before };
                prop_assert_eq!(occupancy(&ring), expected);
            }
            prop_assert!(occupancy(&ring) <= usable);
        }
    }

    /// Committed reads are always a prefix of committed writes, independent
    /// of how transactions batch the pieces.
    #[test]
    fn reads_are_a_prefix_of_writes(
        records in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..24), 1..16),
        drain in prop::collection::vec(1usize..24, 1..16),
    ) {
        let ring = HeapRing::with_capacity(256);
        let mut written = Vec::new();
        let mut read_back = Vec::new();

        for (i, record) in records.iter().enumerate() {
            let mut tx = ring.begin_write();
            if tx.write_bytes(record) {
                written.extend_from_slice(record);
            }
            drop(tx);

            // Interleave partial drains.
            let want = drain[i % drain.len()].min(written.len() - read_back.len());
            if want > 0 {
                let mut out = vec![0u8; want];
                let mut rx = ring.begin_read();
                if rx.read_bytes(&mut out) {
                    read_back.extend_from_slice(&out);
                }
                drop(rx);
            }
        }

        prop_assert!(read_back.len() <= written.len());
        prop_assert_eq!(&written[..read_back.len()], &read_back[..]);
    }
}
