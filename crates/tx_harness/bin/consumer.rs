//! Shared-memory demo, consuming half.
//!
//! Waits for the producer's mapping to appear, attaches a ring over it,
//! reads the start-timestamp record, then drains the stream and reports the
//! digest. Start before or after the producer, same path.
//!
//! ```bash
//! cargo run -p tx_harness --bin consumer --release
//! cargo run -p tx_harness --bin consumer --release -- --verify sha256
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tx_harness::{
    format_duration, format_size, format_throughput, receive_buffer, Backoff, SharedMemory,
    Verification,
};
use txring_rs::{ShmRing, TxRing};

#[derive(Parser)]
#[command(name = "consumer", about = "Drain a shared-memory ring and verify the stream")]
struct Args {
    /// Backing file of the mapping; must match the producer
    #[arg(long)]
    path: Option<PathBuf>,

    /// Largest record payload the producer was configured with
    #[arg(long, default_value_t = 8 * 1024)]
    max_chunk: usize,

    /// Digest maintained over the stream
    #[arg(long, value_enum, default_value = "checksum")]
    verify: Verification,

    /// Seconds to wait for the producer's mapping to appear
    #[arg(long, default_value_t = 10)]
    wait_secs: u64,
}

fn default_path() -> PathBuf {
    std::env::temp_dir().join("txring-demo.shm")
}

fn main() -> ExitCode {
    let args = Args::parse();
    let path = args.path.clone().unwrap_or_else(default_path);

    println!("== Waiting for the mapping at {}...", path.display());
    let deadline = Instant::now() + Duration::from_secs(args.wait_secs);
    let mut shm = loop {
        match SharedMemory::open(&path) {
            Ok(shm) => break shm,
            Err(err) => {
                if Instant::now() >= deadline {
                    eprintln!("error: could not open the mapping: {}", err);
                    return ExitCode::FAILURE;
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    };

    let (region, region_len) = shm.region();
    // Safety: the producer created and zeroed the mapping; this process is
    // the only consumer and shm outlives the ring.
    let ring = unsafe { ShmRing::from_region(region, region_len) };
    if !ring.is_valid() {
        eprintln!("error: ring rejected the region (size must be a power of two)");
        return ExitCode::FAILURE;
    }

    // First record is the producer's start timestamp.
    println!("== Waiting for the start timestamp...");
    let backoff = Backoff::new();
    let sent_at = loop {
        let mut rx = ring.begin_read();
        match rx.read::<u64>() {
            Some(timestamp) => break timestamp,
            None => {
                drop(rx);
                backoff.snooze();
            }
        }
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    println!(
        "== Handshake received ({} after the producer stamped it)",
        format_duration(Duration::from_nanos(now.saturating_sub(sent_at)))
    );

    println!("== Running...\n");
    let stats = receive_buffer(&ring, args.max_chunk, args.verify);

    if let Some(digest) = &stats.digest {
        println!("consumer digest : {}", digest);
    }
    println!("\n== Stats...\n");
    println!("          data sample size: {}", format_size(stats.total_bytes));
    println!("             ring capacity: {}", format_size(ring.capacity()));
    println!("            max chunk size: {}", format_size(args.max_chunk as u64));
    println!();
    println!("         consumer duration: {}", format_duration(stats.elapsed));
    println!(
        "       consumer throughput: {}",
        format_throughput(stats.total_bytes, stats.elapsed)
    );
    println!("        # read re-attempts: {}", stats.attempts);
    println!();

    ExitCode::SUCCESS
}
