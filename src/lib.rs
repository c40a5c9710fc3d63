//! txring-rs - Transactional Lock-Free SPSC Byte Ring
//!
//! A single-producer single-consumer byte ring with an all-or-nothing
//! transaction API, usable between two threads or, over a shared-memory
//! region, between two processes.
//!
//! # Key Features
//!
//! - Wait-free: no operation ever blocks, sleeps or spins; "no space" and
//!   "no data" are ordinary return values
//! - Transactional: pieces staged through one [`WriteTx`] or [`ReadTx`]
//!   become visible (or are consumed) all at once on drop, or not at all
//! - Cache-line-isolated indices plus transaction-local cached views of the
//!   peer index, so the hot path generates no cross-core traffic
//! - Two deployment modes behind one trait: [`HeapRing`] owns its storage,
//!   [`ShmRing`] adopts a caller-mapped region with a bit-exact layout
//!
//! # Example
//!
//! ```
//! use txring_rs::{write_all, HeapRing, TxRing};
//!
//! let ring = HeapRing::with_capacity(16 * 1024);
//!
//! // Producer side: either both pieces land, or neither does.
//! let mut tx = ring.begin_write();
//! if !write_all!(tx, 0xFEEDu64, "hello") {
//!     // backpressure: retry later with a fresh transaction
//! }
//! drop(tx);
//!
//! // Consumer side.
//! let mut rx = ring.begin_read();
//! if let Some(tag) = rx.read::<u64>() {
//!     let mut text = [0u8; 5];
//!     assert!(rx.read_bytes(&mut text));
//!     assert_eq!(tag, 0xFEED);
//!     assert_eq!(&text, b"hello");
//! }
//! drop(rx);
//! ```
//!
//! Exactly one producer and one consumer are supported per ring; the memory
//! ordering protocol (documented in `ring.rs`) is built on that contract.

mod heap_ring;
mod invariants;
mod reader;
mod ring;
mod shm_ring;
mod writer;

pub use heap_ring::HeapRing;
pub use reader::{ReadTuple, ReadTx};
pub use ring::{CacheAligned, IndexPair, TxRing, CACHE_LINE_SIZE};
pub use shm_ring::{region_len, ShmRing, REGION_HEADER_SIZE};
pub use writer::{CharArray, CharUnit, Piece, WriteTx};

// Typed pieces are plain-old-data; re-exported so callers can derive it for
// their own record types.
pub use bytemuck::Pod;
