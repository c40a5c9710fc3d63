use crate::{ReadTx, WriteTx};
use std::sync::atomic::AtomicU64;

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// Every ring kind in this crate is driven by the same two-counter SPSC
// protocol. The counters count bytes, wrap by bitmask, and are the only state
// shared between the producer and the consumer:
//
// - `tail`: written only by the producer, read by both sides
// - `head`: written only by the consumer, read by both sides
//
// ## Transaction protocol
//
// **Producer (write transaction):**
// 1. On open, load `tail` with Relaxed (only the producer writes tail)
// 2. On open, load `head` with Relaxed into a local cache (stale is fine)
// 3. Stage bytes into the buffer; on shortfall, reload `head` with Acquire
// 4. On drop of a non-invalidated transaction, store `tail` with Release
//
// **Consumer (read transaction):**
// 1. On open, load `head` with Relaxed (only the consumer writes head)
// 2. On open, load `tail` with Relaxed into a local cache
// 3. Copy bytes out; on shortfall, reload `tail` with Acquire
// 4. On drop of a non-invalidated transaction, store `head` with Release
//
// The Release store of an index synchronizes with the peer's Acquire load of
// the same index, so every payload byte staged before the store is visible to
// the peer once it observes the new index value. That pairing is the entire
// correctness argument; no fences, no locks, no waiting.
//
// ## Cache-line isolation
//
// `head` and `tail` each sit on their own cache line so that publishing one
// never invalidates the line holding the other. Transactions additionally copy
// the storage pointer, the capacity, their own index and a cached view of the
// peer index into locals at open time, so the hot path touches no shared line
// at all until a shortfall forces a resync.
//
// ## Empty vs full
//
// One byte of the buffer is deliberately never used: `head == tail` means
// empty, and occupancy `(tail - head + capacity) & (capacity - 1)` tops out
// at `capacity - 1`. That is why the externally advertised capacity is one
// less than the internal power-of-two size.
//
// =============================================================================

/// Cache line size used for index isolation and storage alignment.
///
/// Fixed at 64 bytes: that is the coherence granule on x86-64 and most
/// AArch64 parts, and the inter-process region layout is bit-exact at this
/// value (`head` at offset 0, `tail` at offset 64, storage at offset 128).
/// Changing it changes the on-memory format shared between processes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Wrapper that pads its contents to a full cache line.
///
/// Keeps `head` and `tail` from ever sharing a line, so a Release store to
/// one index never steals the line the peer side is reading.
#[repr(C, align(64))]
pub struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    pub const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// The shared state of a ring: one byte counter per side, each on its own
/// cache line.
///
/// For the inter-process ring this struct is placed verbatim at the head of
/// the shared region, so its layout is part of the wire contract:
///
/// | offset | size | contents |
/// |--------|------|----------|
/// | 0      | 8    | `head`, little-endian u64 |
/// | 8      | 56   | padding |
/// | 64     | 8    | `tail`, little-endian u64 |
/// | 72     | 56   | padding |
#[repr(C)]
pub struct IndexPair {
    /// Byte count consumed, advanced only by the consumer.
    pub head: CacheAligned<AtomicU64>,
    /// Byte count produced, advanced only by the producer.
    pub tail: CacheAligned<AtomicU64>,
}

impl IndexPair {
    pub const fn new() -> Self {
        Self {
            head: CacheAligned::new(AtomicU64::new(0)),
            tail: CacheAligned::new(AtomicU64::new(0)),
        }
    }
}

impl Default for IndexPair {
    fn default() -> Self {
        Self::new()
    }
}

// The inter-process layout depends on these two facts.
const _: () = {
    use std::mem::{align_of, size_of};

    assert!(size_of::<IndexPair>() == 2 * CACHE_LINE_SIZE);
    assert!(align_of::<IndexPair>() == CACHE_LINE_SIZE);
};

/// Capability surface consumed by [`WriteTx`] and [`ReadTx`].
///
/// Both ring kinds ([`HeapRing`](crate::HeapRing) over owned memory,
/// [`ShmRing`](crate::ShmRing) over a borrowed region) expose the same four
/// capabilities; the transaction types are generic over them and contain the
/// whole protocol.
///
/// # Single producer, single consumer
///
/// At most one write transaction and one read transaction may be live on a
/// ring at any instant, each driven by exactly one thread (or process). The
/// protocol does not detect violations of this contract.
pub trait TxRing {
    /// Base pointer of the ring byte storage. Null iff the ring is invalid.
    fn storage(&self) -> *mut u8;

    /// Internal capacity in bytes: a power of two, or 0 for an invalid ring.
    fn capacity(&self) -> u64;

    /// The shared head/tail pair.
    fn indices(&self) -> &IndexPair;

    /// Whether construction succeeded. An invalid ring is inert: every
    /// transaction opened on it is born invalidated and publishes nothing.
    #[inline]
    fn is_valid(&self) -> bool {
        !self.storage().is_null()
    }

    /// Bytes the ring can actually hold: `capacity - 1` (one byte separates
    /// the empty and full states), or 0 for an invalid ring.
    #[inline]
    fn usable_capacity(&self) -> u64 {
        self.capacity().saturating_sub(1)
    }

    /// Opens a write transaction against this ring.
    #[inline]
    fn begin_write(&self) -> WriteTx<'_, Self>
    where
        Self: Sized,
    {
        WriteTx::new(self)
    }

    /// Opens a read transaction against this ring.
    #[inline]
    fn begin_read(&self) -> ReadTx<'_, Self>
    where
        Self: Sized,
    {
        ReadTx::new(self)
    }
}

/// Index pair that invalid rings point their capability at, so trait methods
/// stay callable without ever dereferencing the failed region. Nothing stores
/// through it: an invalid ring only produces invalidated transactions, and
/// those publish nothing.
pub(crate) static INERT_INDICES: IndexPair = IndexPair::new();
