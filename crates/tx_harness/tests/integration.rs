use rand::RngCore;
use std::path::PathBuf;
use std::thread;
use tx_harness::{receive_buffer, transmit_buffer, SharedMemory, Verification};
use txring_rs::{ShmRing, TxRing};

fn random_data(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

fn scratch_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "txring-harness-test-{}-{}",
        tag,
        std::process::id()
    ))
}

#[test]
fn heap_ring_transfer_verifies_with_checksum() {
    let ring = txring_rs::HeapRing::with_capacity(16 * 1024);
    let data = random_data(4 * 1024 * 1024);

    let (sent, received) = thread::scope(|scope| {
        let producer =
            scope.spawn(|| transmit_buffer(&ring, &data, 147, 8 * 1024, Verification::Checksum));
        let consumer = scope.spawn(|| receive_buffer(&ring, 8 * 1024, Verification::Checksum));
        (producer.join().unwrap(), consumer.join().unwrap())
    });

    assert_eq!(sent.total_bytes, data.len() as u64);
    assert_eq!(received.total_bytes, data.len() as u64);
    assert!(sent.digest.is_some());
    assert_eq!(sent.digest, received.digest);
}

#[test]
fn heap_ring_transfer_verifies_with_sha256() {
    let ring = txring_rs::HeapRing::with_capacity(4 * 1024);
    let data = random_data(1024 * 1024);

    let (sent, received) = thread::scope(|scope| {
        let producer =
            scope.spawn(|| transmit_buffer(&ring, &data, 16, 1024, Verification::Sha256));
        let consumer = scope.spawn(|| receive_buffer(&ring, 1024, Verification::Sha256));
        (producer.join().unwrap(), consumer.join().unwrap())
    });

    assert_eq!(sent.digest, received.digest);
    assert_eq!(received.total_bytes, data.len() as u64);
}

#[test]
fn shared_memory_transfer_between_two_attachments() {
    let path = scratch_path("transfer");
    let data = random_data(512 * 1024);

    let mut created = SharedMemory::create(&path, 8 * 1024).unwrap();
    let mut opened = SharedMemory::open(&path).unwrap();

    let (sent, received) = thread::scope(|scope| {
        let producer = {
            let (ptr, len) = created.region();
            let data = &data;
            // Safety: the mapping outlives the scope; one producer, one
            // consumer.
            let ring = unsafe { ShmRing::from_region(ptr, len) };
            assert!(ring.is_valid());
            scope.spawn(move || transmit_buffer(&ring, data, 64, 2048, Verification::Checksum))
        };

        let consumer = {
            let (ptr, len) = opened.region();
            let ring = unsafe { ShmRing::from_region(ptr, len) };
            assert!(ring.is_valid());
            scope.spawn(move || receive_buffer(&ring, 2048, Verification::Checksum))
        };

        (producer.join().unwrap(), consumer.join().unwrap())
    });

    assert_eq!(sent.total_bytes, data.len() as u64);
    assert_eq!(received.total_bytes, data.len() as u64);
    assert_eq!(sent.digest, received.digest);

    drop(opened);
    drop(created);
    assert!(!path.exists());
}

#[test]
fn attachment_observes_state_left_by_the_creator() {
    let path = scratch_path("persist");
    let mut created = SharedMemory::create(&path, 256).unwrap();

    {
        let (ptr, len) = created.region();
        let ring = unsafe { ShmRing::from_region(ptr, len) };
        let mut tx = ring.begin_write();
        assert!(tx.write(&0xC0FFEEu32));
        drop(tx);
    }

    // A later attachment in the same process sees the committed record.
    let mut opened = SharedMemory::open(&path).unwrap();
    {
        let (ptr, len) = opened.region();
        let ring = unsafe { ShmRing::from_region(ptr, len) };
        let mut rx = ring.begin_read();
        assert_eq!(rx.read::<u32>(), Some(0xC0FFEE));
    }
}
