//! Heap region growth primitive (spec §6 "Grow primitive (consumed)").
//!
//! This is the narrow external interface the allocator is built on top of:
//! something `sbrk`-shaped that hands back a fresh, contiguous extension of
//! the heap. Designing or bootstrapping that primitive is out of scope
//! (spec §1); the allocator only ever consumes it through this trait.

use core::ptr::NonNull;

/// Extends a contiguous, monotonically growing heap region.
///
/// # Safety
/// Implementors must return a region that is valid for reads and writes for
/// its entire lifetime once returned, contiguous with (immediately
/// following) any region returned by a prior successful call, and
/// **8-byte aligned** on the very first call (spec §4.1/§6: the allocator
/// relies on this to keep every payload pointer 8-byte aligned, and neither
/// pads nor checks for it itself). Every later call is automatically
/// 8-byte aligned as a consequence of the first, since all block sizes are
/// multiples of 8.
pub trait GrowHeap {
    /// Extends the heap by exactly `bytes` more bytes.
    ///
    /// Returns the address of the first newly added byte, or `None` if the
    /// primitive refused (covers both a null return and the common POSIX
    /// `(void*)-1` failure sentinel, per spec §9).
    unsafe fn grow(&mut self, bytes: usize) -> Option<NonNull<u8>>;
}

/// Host-side [`GrowHeap`] backed by a pre-reserved `Vec<u64>`, used to drive
/// the allocator under `cargo test` without a real `sbrk`.
///
/// The arena's backing storage must never move for the lifetime of the
/// allocator built on top of it (the allocator stores absolute addresses),
/// so capacity is reserved once up front; growth beyond that capacity
/// returns `None` rather than letting the `Vec` reallocate. Backing the
/// arena with `u64` elements rather than `u8` is what makes `arena`'s base
/// address satisfy [`GrowHeap`]'s 8-byte-alignment requirement: `Vec<u8>`
/// has no alignment guarantee stronger than 1 and would only pass P6
/// incidentally, by however the host allocator happens to over-align small
/// requests.
#[cfg(any(test, feature = "std"))]
pub struct VecGrower {
    arena: std::vec::Vec<u64>,
}

#[cfg(any(test, feature = "std"))]
impl VecGrower {
    /// Reserves `capacity` bytes (rounded up to a whole number of words) of
    /// stable-address, 8-byte-aligned arena space up front.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: std::vec::Vec::with_capacity((capacity + 7) / 8),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl GrowHeap for VecGrower {
    unsafe fn grow(&mut self, bytes: usize) -> Option<NonNull<u8>> {
        debug_assert_eq!(bytes % 8, 0, "the allocator only ever grows by 8-byte multiples");
        let words = bytes / 8;
        let start_words = self.arena.len();
        if start_words + words > self.arena.capacity() {
            return None;
        }
        self.arena.resize(start_words + words, 0);
        let base = unsafe { self.arena.as_mut_ptr().add(start_words) }.cast::<u8>();
        NonNull::new(base)
    }
}
