//! Shared-memory demo, producing half.
//!
//! Creates the mapping, constructs the ring over it, publishes a start
//! timestamp as the first record, then streams a random buffer. Run the
//! `consumer` binary against the same path from another terminal.
//!
//! ```bash
//! cargo run -p tx_harness --bin producer --release
//! cargo run -p tx_harness --bin producer --release -- --verify sha256
//! ```

use clap::Parser;
use rand::RngCore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};
use tx_harness::{
    format_duration, format_size, format_throughput, transmit_buffer, Backoff, SharedMemory,
    Verification,
};
use txring_rs::{ShmRing, TxRing};

#[derive(Parser)]
#[command(name = "producer", about = "Stream a random buffer into a shared-memory ring")]
struct Args {
    /// Backing file of the mapping; the consumer must use the same path
    #[arg(long)]
    path: Option<PathBuf>,

    /// Payload bytes to stream through the ring
    #[arg(long, default_value_t = 256 * 1024 * 1024)]
    sample_size: u64,

    /// Ring capacity in bytes (a power of two)
    #[arg(long, default_value_t = 16 * 1024)]
    ring_size: u64,

    /// Smallest record payload
    #[arg(long, default_value_t = 147)]
    min_chunk: usize,

    /// Largest record payload
    #[arg(long, default_value_t = 8 * 1024)]
    max_chunk: usize,

    /// Digest maintained over the stream
    #[arg(long, value_enum, default_value = "checksum")]
    verify: Verification,
}

fn default_path() -> PathBuf {
    std::env::temp_dir().join("txring-demo.shm")
}

fn main() -> ExitCode {
    let args = Args::parse();
    let path = args.path.clone().unwrap_or_else(default_path);

    let mut shm = match SharedMemory::create(&path, args.ring_size) {
        Ok(shm) => shm,
        Err(err) => {
            eprintln!("error: cannot create mapping at {}: {}", path.display(), err);
            return ExitCode::FAILURE;
        }
    };
    println!("== Mapping created at {}", path.display());

    let (region, region_len) = shm.region();
    // Safety: the mapping is zeroed, cache-line aligned and lives until shm
    // drops at the end of main; this process is the only producer.
    let ring = unsafe { ShmRing::from_region(region, region_len) };
    if !ring.is_valid() {
        eprintln!("error: ring rejected the region (size must be a power of two)");
        return ExitCode::FAILURE;
    }

    println!("== Generating {} of random data...", format_size(args.sample_size));
    let mut data = vec![0u8; args.sample_size as usize];
    rand::thread_rng().fill_bytes(&mut data);

    // First record: the start timestamp, so the consumer can report the
    // cross-process handshake latency.
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let backoff = Backoff::new();
    loop {
        let mut tx = ring.begin_write();
        if tx.write(&now) {
            break;
        }
        drop(tx);
        backoff.snooze();
    }

    println!("== Running...\n");
    let stats = transmit_buffer(&ring, &data, args.min_chunk, args.max_chunk, args.verify);

    if let Some(digest) = &stats.digest {
        println!("producer digest : {}", digest);
    }
    println!("\n== Stats...\n");
    println!("          data sample size: {}", format_size(stats.total_bytes));
    println!("             ring capacity: {}", format_size(ring.capacity()));
    println!("            max chunk size: {}", format_size(args.max_chunk as u64));
    println!();
    println!("         producer duration: {}", format_duration(stats.elapsed));
    println!(
        "       producer throughput: {}",
        format_throughput(stats.total_bytes, stats.elapsed)
    );
    println!("       # write re-attempts: {}", stats.attempts);
    println!();

    ExitCode::SUCCESS
}
