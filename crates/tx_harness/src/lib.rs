//! Test and demo harness for `txring-rs`.
//!
//! Everything the ring itself deliberately does not do lives here:
//!
//! - [`SharedMemory`]: a named, file-backed mapping giving two processes the
//!   zeroed, cache-line-aligned region the inter-process ring adopts
//! - [`transmit_buffer`] / [`receive_buffer`]: jobs that stream a buffer
//!   through any ring in length-prefixed records and measure throughput and
//!   backpressure
//! - [`PayloadHash`]: rolling CRC32/SHA-256 digests proving the stream
//!   arrived intact end to end
//! - [`Backoff`] (crossbeam's): retry pacing, since a ring transaction never
//!   waits
//!
//! The `intra` binary runs producer and consumer threads over one in-process
//! ring; `producer` and `consumer` are the two halves of the shared-memory
//! demo, started in either order in separate terminals.

mod fmt;
mod jobs;
mod shm;
mod verify;

// Retry pacing between failed transactions; the ring never waits, so the
// jobs decide how hard to hammer it.
pub use crossbeam_utils::Backoff;

pub use fmt::{format_duration, format_size, format_throughput};
pub use jobs::{pin_to_core, receive_buffer, transmit_buffer, JobStats};
pub use shm::{SharedMemory, ShmError};
pub use verify::{PayloadHash, Verification};
