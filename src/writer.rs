use crate::invariants::{debug_assert_masked_index, debug_assert_piece_fits};
use crate::TxRing;
use bytemuck::{NoUninit, Pod};
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::atomic::Ordering;

/// Scoped write transaction.
///
/// Opened with [`TxRing::begin_write`]. Every `write*` call stages one piece;
/// the whole transaction commits when the value is dropped, at which point the
/// consumer can observe all staged bytes at once. A piece that does not fit
/// invalidates the transaction: subsequent writes short-circuit, the drop
/// publishes nothing, and the consumer never sees any of the staged bytes.
/// That failed-and-discarded outcome is the backpressure signal; the caller
/// retries by opening a fresh transaction.
///
/// On open the transaction snapshots the storage pointer, the capacity, the
/// producer-owned `tail` and an optimistic view of the consumer's `head` into
/// locals, so the staging loop causes no cross-core traffic until a piece
/// fails to fit against the stale view and forces an Acquire resync.
///
/// # Example
///
/// ```
/// use txring_rs::{HeapRing, TxRing};
///
/// let ring = HeapRing::with_capacity(256);
///
/// let mut tx = ring.begin_write();
/// if tx.write(&0x2au64) && tx.write("payload") {
///     drop(tx); // both pieces become visible together
/// } // a failed piece would have made the drop publish nothing
/// ```
pub struct WriteTx<'a, Q: TxRing> {
    ring: &'a Q,
    storage: *mut u8,
    capacity: u64,
    tail: u64,
    cached_head: u64,
    invalidated: bool,
}

impl<'a, Q: TxRing> WriteTx<'a, Q> {
    /// Opens a transaction; prefer [`TxRing::begin_write`].
    pub fn new(ring: &'a Q) -> Self {
        if !ring.is_valid() {
            return Self {
                ring,
                storage: ptr::null_mut(),
                capacity: 0,
                tail: 0,
                cached_head: 0,
                invalidated: true,
            };
        }

        let indices = ring.indices();
        Self {
            ring,
            storage: ring.storage(),
            capacity: ring.capacity(),
            // Relaxed: tail is only ever written by the producer, i.e. us.
            tail: indices.tail.load(Ordering::Relaxed),
            // Relaxed: optimistic stale view; resynced on demand.
            cached_head: indices.head.load(Ordering::Relaxed),
            invalidated: false,
        }
    }

    /// Stages one raw piece. Returns `false` and invalidates the transaction
    /// if the piece does not fit even after resyncing the consumer's index.
    ///
    /// An empty piece succeeds without touching memory or moving any index.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> bool {
        if self.invalidated {
            return false;
        }

        let size = bytes.len() as u64;
        if size == 0 {
            return true;
        }

        let capacity = self.capacity;
        let mask = capacity - 1;
        let available = |cached_head: u64, tail: u64| {
            cached_head
                .wrapping_sub(tail)
                .wrapping_sub(1)
                .wrapping_add(capacity)
                & mask
        };

        let mut free = available(self.cached_head, self.tail);
        if size > free {
            // Slow path: resync the consumer's index. Acquire pairs with the
            // consumer's Release store on its commit.
            self.cached_head = self.ring.indices().head.load(Ordering::Acquire);
            free = available(self.cached_head, self.tail);
            if size > free {
                self.invalidated = true;
                return false;
            }
        }

        debug_assert_piece_fits!(size, free);

        // SAFETY: copying into the ring is sound because:
        // 1. tail < capacity (both counters are kept masked)
        // 2. the availability check above guarantees the `size` bytes from
        //    tail (mod capacity) are outside the [head, tail) occupied range
        // 3. the consumer does not touch bytes past its published head, and
        //    our own tail is not published until drop
        unsafe {
            if self.tail + size > self.capacity {
                let first = (self.capacity - self.tail) as usize;
                ptr::copy_nonoverlapping(
                    bytes.as_ptr(),
                    self.storage.add(self.tail as usize),
                    first,
                );
                ptr::copy_nonoverlapping(
                    bytes.as_ptr().add(first),
                    self.storage,
                    bytes.len() - first,
                );
            } else {
                ptr::copy_nonoverlapping(
                    bytes.as_ptr(),
                    self.storage.add(self.tail as usize),
                    bytes.len(),
                );
            }
        }

        self.tail = (self.tail + size) & mask;
        debug_assert_masked_index!("tail", self.tail, self.capacity);
        true
    }

    /// Stages one typed piece. See [`Piece`] for what can be written.
    #[inline]
    pub fn write<P: Piece + ?Sized>(&mut self, piece: &P) -> bool {
        piece.write_into(self)
    }

    /// Marks the transaction as discarded: every further write fails and the
    /// drop publishes nothing.
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

impl<Q: TxRing> Drop for WriteTx<'_, Q> {
    fn drop(&mut self) {
        if !self.invalidated {
            // Release publishes every staged byte to the consumer's next
            // Acquire load of tail.
            self.ring.indices().tail.store(self.tail, Ordering::Release);
        }
    }
}

/// A value a write transaction can stage as one piece.
///
/// Implemented for:
///
/// - every integer and float primitive, copied bit-for-bit
/// - `[T; N]` and `[T]` of [`Pod`] elements, all `N` elements copied
/// - [`CharArray`]: a fixed array of character units, copied with the
///   trailing terminator dropped
/// - `str` / `String`: the UTF-8 bytes, no terminator of any kind
/// - `CStr` / `CString`: the bytes with the trailing NUL dropped; an empty
///   C string stages nothing and succeeds
/// - references to any of the above
pub trait Piece {
    fn write_into<Q: TxRing>(&self, tx: &mut WriteTx<'_, Q>) -> bool;
}

macro_rules! impl_piece_for_primitives {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Piece for $ty {
                #[inline]
                fn write_into<Q: TxRing>(&self, tx: &mut WriteTx<'_, Q>) -> bool {
                    tx.write_bytes(bytemuck::bytes_of(self))
                }
            }
        )+
    };
}

impl_piece_for_primitives!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64
);

impl<T: Pod, const N: usize> Piece for [T; N] {
    #[inline]
    fn write_into<Q: TxRing>(&self, tx: &mut WriteTx<'_, Q>) -> bool {
        tx.write_bytes(bytemuck::cast_slice(self.as_slice()))
    }
}

impl<T: Pod> Piece for [T] {
    #[inline]
    fn write_into<Q: TxRing>(&self, tx: &mut WriteTx<'_, Q>) -> bool {
        tx.write_bytes(bytemuck::cast_slice(self))
    }
}

/// Element types whose fixed arrays end in a terminator unit, the way C
/// string literals carry a NUL: narrow characters (`u8`, `i8` covering both
/// `c_char` signednesses), wide units (`u16`, `u32`) and `char`.
pub trait CharUnit: NoUninit {}

impl CharUnit for u8 {}
impl CharUnit for i8 {}
impl CharUnit for u16 {}
impl CharUnit for u32 {}
impl CharUnit for char {}

/// Fixed-size character array piece: copies `N - 1` units, dropping the
/// trailing terminator whatever its value. Arrays of zero or one unit stage
/// nothing and succeed trivially.
///
/// This is the terminated-literal counterpart of the plain `[T; N]` piece,
/// which copies all `N` elements:
///
/// ```
/// use txring_rs::{CharArray, HeapRing, TxRing};
///
/// let ring = HeapRing::with_capacity(256);
/// let mut tx = ring.begin_write();
/// assert!(tx.write(&CharArray(b"label\0"))); // stages five bytes, not six
/// ```
pub struct CharArray<'a, T: CharUnit, const N: usize>(pub &'a [T; N]);

impl<T: CharUnit, const N: usize> Piece for CharArray<'_, T, N> {
    #[inline]
    fn write_into<Q: TxRing>(&self, tx: &mut WriteTx<'_, Q>) -> bool {
        let units = N.saturating_sub(1);
        tx.write_bytes(bytemuck::cast_slice(&self.0[..units]))
    }
}

impl Piece for str {
    #[inline]
    fn write_into<Q: TxRing>(&self, tx: &mut WriteTx<'_, Q>) -> bool {
        tx.write_bytes(self.as_bytes())
    }
}

impl Piece for String {
    #[inline]
    fn write_into<Q: TxRing>(&self, tx: &mut WriteTx<'_, Q>) -> bool {
        tx.write_bytes(self.as_bytes())
    }
}

impl Piece for CStr {
    #[inline]
    fn write_into<Q: TxRing>(&self, tx: &mut WriteTx<'_, Q>) -> bool {
        // to_bytes excludes the trailing NUL.
        tx.write_bytes(self.to_bytes())
    }
}

impl Piece for CString {
    #[inline]
    fn write_into<Q: TxRing>(&self, tx: &mut WriteTx<'_, Q>) -> bool {
        tx.write_bytes(self.to_bytes())
    }
}

impl<P: Piece + ?Sized> Piece for &P {
    #[inline]
    fn write_into<Q: TxRing>(&self, tx: &mut WriteTx<'_, Q>) -> bool {
        (**self).write_into(tx)
    }
}

/// Stages several pieces through one transaction, strictly left to right,
/// short-circuiting on the first failure.
///
/// Pieces staged before the failure stay local to the transaction and are
/// discarded with it; the consumer never observes a partial sequence.
///
/// ```
/// use txring_rs::{write_all, HeapRing, TxRing};
///
/// let ring = HeapRing::with_capacity(256);
/// let mut tx = ring.begin_write();
/// let ok = write_all!(tx, 42u64, [0xDEu8, 0xAD, 0xBE, 0xEF], "trailer");
/// assert!(ok);
/// ```
#[macro_export]
macro_rules! write_all {
    ($tx:expr, $($piece:expr),+ $(,)?) => {{
        let tx = &mut $tx;
        true $(&& tx.write(&$piece))+
    }};
}

#[cfg(test)]
mod tests {
    use crate::{CharArray, HeapRing, TxRing};
    use std::ffi::CString;
    use std::sync::atomic::Ordering;

    #[test]
    fn commit_publishes_tail_once() {
        let ring = HeapRing::with_capacity(128);

        let mut tx = ring.begin_write();
        assert!(tx.write_bytes(&[1, 2, 3]));
        assert!(tx.write_bytes(&[4, 5]));
        // Nothing visible before the drop.
        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 0);
        drop(tx);

        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn failed_piece_discards_the_whole_transaction() {
        let ring = HeapRing::with_capacity(64);

        let mut tx = ring.begin_write();
        assert!(tx.write_bytes(&[0u8; 10]));
        assert!(!tx.write_bytes(&[0u8; 60]));
        assert!(!tx.is_valid());
        // Short-circuit: even a fitting piece is refused now.
        assert!(!tx.write_bytes(&[0u8; 1]));
        drop(tx);

        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn explicit_invalidate_publishes_nothing() {
        let ring = HeapRing::with_capacity(128);

        let mut tx = ring.begin_write();
        assert!(tx.write_bytes(&[0u8; 8]));
        tx.invalidate();
        drop(tx);

        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn zero_length_piece_succeeds_without_moving_anything() {
        let ring = HeapRing::with_capacity(64);

        let mut tx = ring.begin_write();
        assert!(tx.write_bytes(&[]));
        assert!(tx.write(""));
        drop(tx);

        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn char_array_piece_drops_the_trailing_unit() {
        let ring = HeapRing::with_capacity(64);

        let mut tx = ring.begin_write();
        assert!(tx.write(&CharArray(b"abc\0")));
        drop(tx);

        // Three bytes staged, the NUL dropped.
        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn char_array_of_zero_or_one_units_succeeds_with_nothing_staged() {
        let ring = HeapRing::with_capacity(64);

        let mut tx = ring.begin_write();
        assert!(tx.write(&CharArray(&[0u8])));
        assert!(tx.write(&CharArray::<u8, 0>(&[])));
        assert!(tx.is_valid());
        drop(tx);

        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn wide_char_array_trims_one_unit_not_one_byte() {
        let ring = HeapRing::with_capacity(64);

        let mut tx = ring.begin_write();
        assert!(tx.write(&CharArray(&['h', 'i', '\0'])));
        drop(tx);

        // Two four-byte chars survive the trim.
        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn plain_byte_array_keeps_all_elements() {
        let ring = HeapRing::with_capacity(64);

        let mut tx = ring.begin_write();
        assert!(tx.write(&[0x61u8, 0x62, 0x63, 0x00]));
        drop(tx);

        // Not a character array: all four bytes, terminator included.
        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn char_array_composes_with_write_all() {
        let ring = HeapRing::with_capacity(64);

        let mut tx = ring.begin_write();
        assert!(write_all!(tx, 5u16, CharArray(b"id\0")));
        drop(tx);

        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn cstr_piece_drops_the_trailing_nul() {
        let ring = HeapRing::with_capacity(64);

        let text = CString::new("abc").unwrap();
        let mut tx = ring.begin_write();
        assert!(tx.write(text.as_c_str()));
        drop(tx);

        // Three bytes, not four.
        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn empty_cstr_succeeds_trivially() {
        let ring = HeapRing::with_capacity(64);

        let empty = CString::new("").unwrap();
        let mut tx = ring.begin_write();
        assert!(tx.write(empty.as_c_str()));
        drop(tx);

        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn write_all_short_circuits() {
        let ring = HeapRing::with_capacity(64);

        let mut tx = ring.begin_write();
        // 8 + 60 bytes cannot fit in 63: the array must fail and the trailer
        // must never be attempted.
        assert!(!write_all!(tx, 1u64, [0u8; 60], 2u64));
        assert!(!tx.is_valid());
        drop(tx);

        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn transactions_on_an_invalid_ring_are_born_invalidated() {
        let ring = HeapRing::with_capacity(1);
        assert!(!ring.is_valid());

        let mut tx = ring.begin_write();
        assert!(!tx.is_valid());
        assert!(!tx.write_bytes(&[1]));
    }

    #[test]
    fn oversized_piece_invalidates_even_on_an_empty_ring() {
        let ring = HeapRing::with_capacity(64);

        let mut tx = ring.begin_write();
        assert!(!tx.write_bytes(&[0u8; 64]));
        assert!(!tx.is_valid());
    }

    #[test]
    fn exactly_usable_capacity_fits() {
        let ring = HeapRing::with_capacity(64);

        let mut tx = ring.begin_write();
        assert!(tx.write_bytes(&[0xA5u8; 63]));
        drop(tx);

        assert_eq!(ring.indices().tail.load(Ordering::Relaxed), 63);
    }
}
