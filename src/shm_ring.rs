use crate::ring::INERT_INDICES;
use crate::{IndexPair, TxRing, CACHE_LINE_SIZE};
use std::mem::size_of;

/// Bytes at the start of a shared region occupied by the [`IndexPair`]:
/// two cache lines.
pub const REGION_HEADER_SIZE: u64 = size_of::<IndexPair>() as u64;

/// Total region length needed for a ring of the given internal capacity.
pub const fn region_len(capacity: u64) -> u64 {
    REGION_HEADER_SIZE + capacity
}

/// Inter-process ring: adopts a caller-supplied region, owns nothing.
///
/// The region layout is bit-exact: the [`IndexPair`] occupies the first two
/// cache lines (`head` at offset 0, `tail` at offset 64, both little-endian
/// u64), and the remaining `region_len - 128` bytes are the ring storage.
/// Both processes construct a `ShmRing` over the same mapping; whichever
/// attaches first observes zeroed indices because the region is contracted to
/// arrive zeroed.
///
/// Construction never fails loudly. A misaligned or mis-sized region yields
/// an invalid ring ([`TxRing::is_valid`] is `false`) on which every
/// transaction is born invalidated.
///
/// The mapping's lifetime is the caller's concern: dropping the ring unmaps
/// and frees nothing.
pub struct ShmRing {
    indices: *const IndexPair,
    storage: *mut u8,
    capacity: u64,
}

// Safety: same argument as HeapRing; the region is shared under the
// one-producer/one-consumer contract and all shared state is atomic.
unsafe impl Send for ShmRing {}
unsafe impl Sync for ShmRing {}

impl ShmRing {
    /// Adopts `region_len` bytes at `region`.
    ///
    /// Yields an invalid ring unless `region` is cache-line aligned and
    /// `region_len - 128` is a power of two of at least one cache line.
    ///
    /// # Safety
    ///
    /// The caller must guarantee, for the whole lifetime of the ring:
    ///
    /// - `region` points to `region_len` readable and writable bytes
    /// - the region arrived zero-initialized (or already holds the live
    ///   state of this ring, when re-attaching)
    /// - across all address spaces, at most one process produces into and at
    ///   most one process consumes from the region
    pub unsafe fn from_region(region: *mut u8, region_len: u64) -> Self {
        if region.is_null()
            || region as usize % CACHE_LINE_SIZE != 0
            || region_len <= REGION_HEADER_SIZE
        {
            return Self::invalid();
        }

        let capacity = region_len - REGION_HEADER_SIZE;
        if !capacity.is_power_of_two() || capacity < CACHE_LINE_SIZE as u64 {
            return Self::invalid();
        }

        // IndexPair is two whole cache lines, so the storage that follows it
        // inherits the region's alignment.
        Self {
            indices: region as *const IndexPair,
            storage: region.add(REGION_HEADER_SIZE as usize),
            capacity,
        }
    }

    fn invalid() -> Self {
        Self {
            indices: &INERT_INDICES,
            storage: std::ptr::null_mut(),
            capacity: 0,
        }
    }
}

impl TxRing for ShmRing {
    #[inline]
    fn storage(&self) -> *mut u8 {
        self.storage
    }

    #[inline]
    fn capacity(&self) -> u64 {
        self.capacity
    }

    #[inline]
    fn indices(&self) -> &IndexPair {
        // Safety: either the region head (valid for the ring's lifetime per
        // the `from_region` contract) or the inert static.
        unsafe { &*self.indices }
    }
}
