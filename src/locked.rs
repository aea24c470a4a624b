//! `GlobalAlloc`-compatible wrapper (spec §5 "added only at the edge").
//!
//! A single-threaded core ([`Allocator`]) guarded by a `spin::Mutex`, the
//! same shape as a bootloader's `LockedBuddyAllocator<N>`, so it can back a
//! `#[global_allocator]`.

use crate::alloc::Allocator;
use crate::config::MIN_HEAP_ALIGN;
use crate::diag::CheckReport;
use crate::error::AllocError;
use crate::region::GrowHeap;
use core::alloc::{GlobalAlloc, Layout};
use spin::Mutex;

/// A [`Allocator`] guarded by a spinlock, suitable for `#[global_allocator]`.
pub struct LockedAllocator<G: GrowHeap> {
    inner: Mutex<Allocator<G>>,
}

impl<G: GrowHeap> LockedAllocator<G> {
    /// Builds a locked allocator over `grower`. Does not acquire any memory
    /// yet; call [`Self::init`] once before the first allocation.
    pub const fn new(grower: G) -> Self {
        Self {
            inner: Mutex::new(Allocator::new(grower)),
        }
    }

    /// Acquires the first block of the heap (spec §4.1, §6).
    pub fn init(&self) -> Result<(), AllocError> {
        self.inner.lock().init()
    }

    /// Diagnostic heap/free-list walk (spec §6 "check()").
    pub fn check(&self) -> CheckReport {
        self.inner.lock().check()
    }
}

unsafe impl<G: GrowHeap + Send> GlobalAlloc for LockedAllocator<G> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > MIN_HEAP_ALIGN {
            // Non-goal (spec §1): no support for alignment stricter than 8 bytes.
            return core::ptr::null_mut();
        }
        self.inner.lock().allocate(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.inner.lock().free(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > MIN_HEAP_ALIGN {
            return core::ptr::null_mut();
        }
        self.inner.lock().reallocate(ptr, new_size)
    }
}
