use crate::invariants::debug_assert_ring_capacity;
use crate::{IndexPair, TxRing, CACHE_LINE_SIZE};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr;

/// Intra-process ring: owns a cache-line-aligned allocation and its own
/// embedded [`IndexPair`].
///
/// The requested capacity is rounded up to the next power of two; anything
/// below one cache line yields a permanently invalid ring rather than an
/// error (see [`TxRing::is_valid`]). One byte of the internal capacity is
/// reserved to tell empty from full, so the ring holds
/// [`usable_capacity`](TxRing::usable_capacity) bytes.
///
/// # Example
///
/// ```
/// use txring_rs::{HeapRing, TxRing};
///
/// let ring = HeapRing::with_capacity(4096);
/// assert!(ring.is_valid());
/// assert_eq!(ring.usable_capacity(), 4095);
///
/// let mut tx = ring.begin_write();
/// assert!(tx.write(&42u64));
/// drop(tx); // commit: the consumer side can now read the eight bytes
/// ```
pub struct HeapRing {
    indices: IndexPair,
    storage: *mut u8,
    capacity: u64,
}

// Safety: the storage is only touched through the transaction protocol, which
// permits one producer and one consumer; the indices are atomics. See the
// protocol notes in `ring.rs`.
unsafe impl Send for HeapRing {}
unsafe impl Sync for HeapRing {}

impl HeapRing {
    /// Creates a ring holding at least `requested` bytes (rounded up to the
    /// next power of two). A request below [`CACHE_LINE_SIZE`] or an
    /// allocation failure yields an invalid ring.
    pub fn with_capacity(requested: u64) -> Self {
        if requested < CACHE_LINE_SIZE as u64 {
            return Self::invalid();
        }

        let capacity = match requested.checked_next_power_of_two() {
            Some(capacity) => capacity,
            None => return Self::invalid(),
        };

        let layout = match Layout::from_size_align(capacity as usize, CACHE_LINE_SIZE) {
            Ok(layout) => layout,
            Err(_) => return Self::invalid(),
        };

        // Zeroed so the consumer-side copies never observe uninitialized
        // memory, whatever the caller does.
        // Safety: layout has non-zero size (capacity >= 64).
        let storage = unsafe { alloc_zeroed(layout) };
        if storage.is_null() {
            return Self::invalid();
        }

        debug_assert_ring_capacity!(capacity);

        Self {
            indices: IndexPair::new(),
            storage,
            capacity,
        }
    }

    fn invalid() -> Self {
        Self {
            indices: IndexPair::new(),
            storage: ptr::null_mut(),
            capacity: 0,
        }
    }
}

impl TxRing for HeapRing {
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
        &self.indices
    }
}

impl Drop for HeapRing {
    fn drop(&mut self) {
        if !self.storage.is_null() {
            // Safety: same size and alignment the constructor allocated with.
            unsafe {
                let layout =
                    Layout::from_size_align_unchecked(self.capacity as usize, CACHE_LINE_SIZE);
                dealloc(self.storage, layout);
            }
        }
    }
}
