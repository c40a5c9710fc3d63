//! Transfer jobs: stream a buffer through a ring and account for it.
//!
//! The wire format is one record per transaction: a `u64` length followed by
//! that many payload bytes, with a zero-length record as the end-of-stream
//! marker. A failed transaction publishes nothing, so a record is always
//! retried whole; the re-attempt counters below are the backpressure measure
//! the demos report.

use crate::{Backoff, PayloadHash, Verification};
use rand::Rng;
use std::time::{Duration, Instant};
use txring_rs::TxRing;

/// Space one record of `chunk` payload bytes needs inside the ring.
fn record_size(chunk: usize) -> u64 {
    chunk as u64 + std::mem::size_of::<u64>() as u64
}

/// What a finished job measured.
#[derive(Debug, Clone)]
pub struct JobStats {
    /// Payload bytes moved (excluding the length prefixes).
    pub total_bytes: u64,
    /// Transactions that failed and were retried.
    pub attempts: u64,
    /// Time from the first record to the last, terminator excluded.
    pub elapsed: Duration,
    /// Hex digest of the payload stream, when verification was on.
    pub digest: Option<String>,
}

/// Streams `data` through the ring in records of random size within
/// `[min_chunk, max_chunk]`, then sends the zero-length terminator.
///
/// # Panics
///
/// Panics if the chunk bounds are empty or a maximal record cannot fit the
/// ring at all (that transfer could never finish).
pub fn transmit_buffer<Q: TxRing>(
    ring: &Q,
    data: &[u8],
    min_chunk: usize,
    max_chunk: usize,
    verification: Verification,
) -> JobStats {
    assert!(min_chunk >= 1 && min_chunk <= max_chunk);
    assert!(
        record_size(max_chunk) <= ring.usable_capacity(),
        "a {}-byte record can never fit a ring of {} usable bytes",
        record_size(max_chunk),
        ring.usable_capacity()
    );

    let mut rng = rand::thread_rng();
    let mut hash = PayloadHash::new(verification);
    let backoff = Backoff::new();
    let mut attempts = 0u64;
    let mut sent = 0usize;

    let started = Instant::now();
    while sent < data.len() {
        let chunk = rng.gen_range(min_chunk..=max_chunk).min(data.len() - sent);
        let piece = &data[sent..sent + chunk];

        let mut tx = ring.begin_write();
        if tx.write(&(chunk as u64)) && tx.write_bytes(piece) {
            drop(tx);
            hash.update(piece);
            sent += chunk;
            backoff.reset();
        } else {
            drop(tx);
            attempts += 1;
            backoff.snooze();
        }
    }
    let elapsed = started.elapsed();

    // End-of-stream marker; the ring may be full of unread records, so this
    // retries like any other record.
    backoff.reset();
    loop {
        let mut tx = ring.begin_write();
        if tx.write(&0u64) {
            break;
        }
        drop(tx);
        backoff.snooze();
    }

    JobStats {
        total_bytes: sent as u64,
        attempts,
        elapsed,
        digest: hash.finish(),
    }
}

/// Drains records until the zero-length terminator arrives.
///
/// # Panics
///
/// Panics if a record announces more than `max_chunk` payload bytes; the two
/// sides agree on the bound up front.
pub fn receive_buffer<Q: TxRing>(
    ring: &Q,
    max_chunk: usize,
    verification: Verification,
) -> JobStats {
    let mut buf = vec![0u8; max_chunk];
    let mut hash = PayloadHash::new(verification);
    let backoff = Backoff::new();
    let mut attempts = 0u64;
    let mut total = 0u64;

    let started = Instant::now();
    loop {
        let mut rx = ring.begin_read();
        let len = match rx.read::<u64>() {
            Some(len) => len,
            None => {
                drop(rx);
                attempts += 1;
                backoff.snooze();
                continue;
            }
        };

        if len == 0 {
            // Committing the read consumes the terminator.
            drop(rx);
            break;
        }

        assert!(
            len as usize <= max_chunk,
            "record of {} bytes exceeds the agreed {}-byte chunk bound",
            len,
            max_chunk
        );

        let out = &mut buf[..len as usize];
        if rx.read_bytes(out) {
            drop(rx);
            hash.update(out);
            total += len;
            backoff.reset();
        } else {
            // Length arrived but the payload has not: the invalidated
            // transaction left the whole record in place for the retry.
            drop(rx);
            attempts += 1;
            backoff.snooze();
        }
    }

    JobStats {
        total_bytes: total,
        attempts,
        elapsed: started.elapsed(),
        digest: hash.finish(),
    }
}

/// Pins the calling thread to a core. Returns `false` when the platform or
/// the core id does not cooperate.
pub fn pin_to_core(core: usize) -> bool {
    core_affinity::set_for_current(core_affinity::CoreId { id: core })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use txring_rs::HeapRing;

    #[test]
    fn transfer_round_trip_with_checksum() {
        let ring = HeapRing::with_capacity(4096);
        let data: Vec<u8> = (0..64 * 1024).map(|i| (i % 157) as u8).collect();

        let (tx_stats, rx_stats) = thread::scope(|scope| {
            let producer = scope.spawn(|| {
                transmit_buffer(&ring, &data, 16, 512, Verification::Checksum)
            });
            let consumer =
                scope.spawn(|| receive_buffer(&ring, 512, Verification::Checksum));
            (producer.join().unwrap(), consumer.join().unwrap())
        });

        assert_eq!(tx_stats.total_bytes, data.len() as u64);
        assert_eq!(rx_stats.total_bytes, data.len() as u64);
        assert_eq!(tx_stats.digest, rx_stats.digest);
        assert!(tx_stats.digest.is_some());
    }

    #[test]
    fn terminator_alone_moves_no_payload() {
        let ring = HeapRing::with_capacity(1024);

        let (tx_stats, rx_stats) = thread::scope(|scope| {
            let producer =
                scope.spawn(|| transmit_buffer(&ring, &[], 1, 64, Verification::None));
            let consumer = scope.spawn(|| receive_buffer(&ring, 64, Verification::None));
            (producer.join().unwrap(), consumer.join().unwrap())
        });

        assert_eq!(tx_stats.total_bytes, 0);
        assert_eq!(rx_stats.total_bytes, 0);
        assert_eq!(rx_stats.digest, None);
    }

    #[test]
    #[should_panic]
    fn oversized_chunk_bound_is_refused() {
        let ring = HeapRing::with_capacity(64);
        transmit_buffer(&ring, &[0u8; 16], 1, 64, Verification::None);
    }
}
