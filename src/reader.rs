use crate::invariants::{debug_assert_masked_index, debug_assert_piece_fits};
use crate::TxRing;
use bytemuck::Pod;
use std::ptr;
use std::sync::atomic::Ordering;

/// Scoped read transaction, the mirror of [`WriteTx`](crate::WriteTx).
///
/// Pieces are copied out against a snapshot of the producer's `tail`; the
/// consumer's `head` only moves locally until the transaction is dropped
/// without having been invalidated. A shortfall (not enough committed data
/// even after an Acquire resync) invalidates the transaction, and since the
/// local head is simply thrown away, the unread bytes stay in the ring for
/// the next attempt. Reading is non-destructive until commit.
///
/// # Example
///
/// ```
/// use txring_rs::{HeapRing, TxRing};
///
/// let ring = HeapRing::with_capacity(256);
///
/// let mut tx = ring.begin_write();
/// tx.write(&7u32);
/// tx.write(&9u64);
/// drop(tx);
///
/// let mut rx = ring.begin_read();
/// if let Some((a, b)) = rx.read_tuple::<(u32, u64)>() {
///     assert_eq!((a, b), (7, 9));
/// }
/// drop(rx); // commit: the bytes are now consumed
/// ```
pub struct ReadTx<'a, Q: TxRing> {
    ring: &'a Q,
    storage: *mut u8,
    capacity: u64,
    head: u64,
    cached_tail: u64,
    invalidated: bool,
}

impl<'a, Q: TxRing> ReadTx<'a, Q> {
    /// Opens a transaction; prefer [`TxRing::begin_read`].
    pub fn new(ring: &'a Q) -> Self {
        if !ring.is_valid() {
            return Self {
                ring,
                storage: ptr::null_mut(),
                capacity: 0,
                head: 0,
                cached_tail: 0,
                invalidated: true,
            };
        }

        let indices = ring.indices();
        Self {
            ring,
            storage: ring.storage(),
            capacity: ring.capacity(),
            // Relaxed: head is only ever written by the consumer, i.e. us.
            head: indices.head.load(Ordering::Relaxed),
            // Relaxed: optimistic stale view; resynced on demand.
            cached_tail: indices.tail.load(Ordering::Relaxed),
            invalidated: false,
        }
    }

    /// Copies one raw piece out of the ring. Returns `false` and invalidates
    /// the transaction if that much data is not committed even after
    /// resyncing the producer's index.
    ///
    /// An empty piece succeeds without touching memory or moving any index.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> bool {
        if self.invalidated {
            return false;
        }

        let size = out.len() as u64;
        if size == 0 {
            return true;
        }

        let capacity = self.capacity;
        let mask = capacity - 1;
        let available =
            |cached_tail: u64, head: u64| cached_tail.wrapping_sub(head).wrapping_add(capacity) & mask;

        let mut readable = available(self.cached_tail, self.head);
        if size > readable {
            // Slow path: resync the producer's index. Acquire pairs with the
            // producer's Release store on its commit, making every byte it
            // staged visible before we copy.
            self.cached_tail = self.ring.indices().tail.load(Ordering::Acquire);
            readable = available(self.cached_tail, self.head);
            if size > readable {
                self.invalidated = true;
                return false;
            }
        }

        debug_assert_piece_fits!(size, readable);

        // SAFETY: copying out of the ring is sound because:
        // 1. head < capacity (both counters are kept masked)
        // 2. the availability check above guarantees the `size` bytes from
        //    head (mod capacity) lie inside the committed [head, tail) range
        // 3. the producer does not overwrite bytes before our published head,
        //    and our own head is not published until drop
        unsafe {
            if self.head + size > self.capacity {
                let first = (self.capacity - self.head) as usize;
                ptr::copy_nonoverlapping(
                    self.storage.add(self.head as usize),
                    out.as_mut_ptr(),
                    first,
                );
                ptr::copy_nonoverlapping(
                    self.storage,
                    out.as_mut_ptr().add(first),
                    out.len() - first,
                );
            } else {
                ptr::copy_nonoverlapping(
                    self.storage.add(self.head as usize),
                    out.as_mut_ptr(),
                    out.len(),
                );
            }
        }

        self.head = (self.head + size) & mask;
        debug_assert_masked_index!("head", self.head, self.capacity);
        true
    }

    /// Reads one fixed-size value, bit-for-bit. `None` invalidates the
    /// transaction, leaving the ring bytes unconsumed.
    pub fn read<T: Pod>(&mut self) -> Option<T> {
        let mut value = T::zeroed();
        if self.read_bytes(bytemuck::bytes_of_mut(&mut value)) {
            Some(value)
        } else {
            None
        }
    }

    /// Reads a tuple of fixed-size values, fields in declared order. Any
    /// failing field invalidates the transaction and yields `None`; the
    /// fields already copied stay local and are discarded with the
    /// transaction.
    #[inline]
    pub fn read_tuple<T: ReadTuple>(&mut self) -> Option<T> {
        T::read_from(self)
    }

    /// Marks the transaction as discarded: every further read fails and the
    /// drop publishes nothing, so all bytes remain for the next transaction.
    #[inline]
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// `true` while no piece has failed and [`invalidate`](Self::invalidate)
    /// has not been called.
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.invalidated
    }
}

impl<Q: TxRing> Drop for ReadTx<'_, Q> {
    fn drop(&mut self) {
        if !self.invalidated {
            // Release publishes the consumed range back to the producer's
            // next Acquire load of head.
            self.ring.indices().head.store(self.head, Ordering::Release);
        }
    }
}

/// Tuples readable with [`ReadTx::read_tuple`]; implemented for arities 1
/// through 8 of [`Pod`] element types.
pub trait ReadTuple: Sized {
    fn read_from<Q: TxRing>(tx: &mut ReadTx<'_, Q>) -> Option<Self>;
}

macro_rules! impl_read_tuple {
    ($($field:ident),+) => {
        impl<$($field: Pod),+> ReadTuple for ($($field,)+) {
            fn read_from<Q: TxRing>(tx: &mut ReadTx<'_, Q>) -> Option<Self> {
                Some(($(tx.read::<$field>()?,)+))
            }
        }
    };
}

impl_read_tuple!(A);
impl_read_tuple!(A, B);
impl_read_tuple!(A, B, C);
impl_read_tuple!(A, B, C, D);
impl_read_tuple!(A, B, C, D, E);
impl_read_tuple!(A, B, C, D, E, F);
impl_read_tuple!(A, B, C, D, E, F, G);
impl_read_tuple!(A, B, C, D, E, F, G, H);
