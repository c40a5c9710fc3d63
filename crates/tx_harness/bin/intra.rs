//! Producer and consumer threads streaming one buffer through a single
//! in-process ring, with optional end-to-end digest verification.
//!
//! ```bash
//! cargo run -p tx_harness --bin intra --release
//! cargo run -p tx_harness --bin intra --release -- --verify sha256 --sample-size 1073741824
//! cargo run -p tx_harness --bin intra --release -- --producer-core 2 --consumer-core 3
//! ```

use clap::Parser;
use rand::RngCore;
use std::process::ExitCode;
use std::thread;
use tx_harness::{
    format_duration, format_size, format_throughput, pin_to_core, receive_buffer,
    transmit_buffer, Verification,
};
use txring_rs::{HeapRing, TxRing};

#[derive(Parser)]
#[command(name = "intra", about = "Stream a random buffer between two threads over one ring")]
struct Args {
    /// Payload bytes to stream through the ring
    #[arg(long, default_value_t = 256 * 1024 * 1024)]
    sample_size: u64,

    /// Requested ring capacity in bytes (rounded up to a power of two)
    #[arg(long, default_value_t = 16 * 1024)]
    ring_size: u64,

    /// Smallest record payload
    #[arg(long, default_value_t = 147)]
    min_chunk: usize,

    /// Largest record payload
    #[arg(long, default_value_t = 8 * 1024)]
    max_chunk: usize,

    /// Digest maintained by both sides
    #[arg(long, value_enum, default_value = "checksum")]
    verify: Verification,

    /// Pin the producer thread to this core
    #[arg(long)]
    producer_core: Option<usize>,

    /// Pin the consumer thread to this core
    #[arg(long)]
    consumer_core: Option<usize>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let ring = HeapRing::with_capacity(args.ring_size);
    if !ring.is_valid() {
        eprintln!("error: ring size {} is not usable", args.ring_size);
        return ExitCode::FAILURE;
    }

    println!("== Generating {} of random data...", format_size(args.sample_size));
    let mut data = vec![0u8; args.sample_size as usize];
    rand::thread_rng().fill_bytes(&mut data);

    println!("== Running...\n");
    let (producer, consumer) = thread::scope(|scope| {
        let producer = {
            let ring = &ring;
            let data = &data;
            scope.spawn(move || {
                if let Some(core) = args.producer_core {
                    pin_to_core(core);
                }
                transmit_buffer(ring, data, args.min_chunk, args.max_chunk, args.verify)
            })
        };

        let consumer = {
            let ring = &ring;
            scope.spawn(move || {
                if let Some(core) = args.consumer_core {
                    pin_to_core(core);
                }
                receive_buffer(ring, args.max_chunk, args.verify)
            })
        };

        (producer.join().unwrap(), consumer.join().unwrap())
    });

    if let (Some(sent), Some(received)) = (&producer.digest, &consumer.digest) {
        println!("producer digest : {}", sent);
        println!("consumer digest : {}", received);
    }

    println!("\n== Stats...\n");
    println!("          data sample size: {}", format_size(args.sample_size));
    println!("                 ring size: {}", format_size(ring.capacity()));
    println!("            max chunk size: {}", format_size(args.max_chunk as u64));
    println!();
    println!("         producer duration: {}", format_duration(producer.elapsed));
    println!(
        "       producer throughput: {}",
        format_throughput(producer.total_bytes, producer.elapsed)
    );
    println!("         consumer duration: {}", format_duration(consumer.elapsed));
    println!(
        "       consumer throughput: {}",
        format_throughput(consumer.total_bytes, consumer.elapsed)
    );
    println!("       # write re-attempts: {}", producer.attempts);
    println!("        # read re-attempts: {}", consumer.attempts);
    println!();

    let bytes_match = consumer.total_bytes == args.sample_size;
    let digests_match = producer.digest == consumer.digest;
    if !bytes_match || !digests_match {
        eprintln!("error: transfer verification failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
