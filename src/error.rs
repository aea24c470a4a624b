//! Allocator error type (spec §7).
//!
//! The public `allocate`/`free`/`reallocate` surface never returns this:
//! every failure there is a nullable pointer, per spec. [`AllocError`] exists
//! for the handful of places that *can* usefully report a failure kind:
//! [`crate::Allocator::init`] and host-side test/diagnostic code.

/// Failure kinds the allocator can distinguish (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The growth primitive refused to extend the heap.
    #[error("heap growth primitive refused to extend the heap")]
    OutOfMemory,
}
