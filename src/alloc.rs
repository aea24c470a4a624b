//! Allocation policy (spec §4.2-4.5, §4.7): the public `allocate`/`free`/
//! `reallocate` operations and their internal split/coalesce/search helpers.
//!
//! [`Allocator`] holds the process-wide state (§9): `first_block`,
//! `end_heap`, the class table. It is an explicit context object rather
//! than globals, so it is constructible and testable in isolation (see
//! DESIGN.md).

use crate::block;
use crate::class::{self, Class};
use crate::config::{align8, mbs, COALESCE_THRESHOLD, FOOTER, HEADER};
use crate::diag::CheckReport;
use crate::error::AllocError;
use crate::freelist::{Policy, Table};
use crate::region::GrowHeap;
use core::ptr::NonNull;

/// A segregated-fits allocator over one contiguous, monotonically growing
/// heap region (spec §1-§4).
///
/// Single-threaded by design (spec §5): wrap in [`crate::LockedAllocator`]
/// for use as a `#[global_allocator]`.
pub struct Allocator<G: GrowHeap> {
    grower: G,
    table: Table,
    first_block: Option<NonNull<u8>>,
    /// Payload pointer of the rightmost block in the heap (spec I7).
    end_heap: Option<NonNull<u8>>,
    /// Address one past the last byte of the heap.
    heap_limit: Option<NonNull<u8>>,
    policy: Policy,
}

// Safety: every access to the raw pointers held here happens either through
// `&mut self` on a single thread, or while the enclosing `spin::Mutex` in
// `LockedAllocator` is held.
unsafe impl<G: GrowHeap + Send> Send for Allocator<G> {}

impl<G: GrowHeap> Allocator<G> {
    /// Builds an (uninitialized) allocator over `grower`, using the default
    /// search policy (`first-fit` Cargo feature, best-fit otherwise).
    pub const fn new(grower: G) -> Self {
        Self::with_policy(grower, Policy::DEFAULT)
    }

    /// Builds an (uninitialized) allocator with an explicit search policy,
    /// overriding the `first-fit` feature default. Mainly useful for
    /// exercising both policies from the same test binary (spec §8 "Policy
    /// observability").
    pub const fn with_policy(grower: G, policy: Policy) -> Self {
        Self {
            grower,
            table: Table::new(),
            first_block: None,
            end_heap: None,
            heap_limit: None,
            policy,
        }
    }

    /// Acquires the first block of the heap (spec §4.1).
    ///
    /// Must be called exactly once before any other operation; subsequent
    /// calls are undefined (spec §6).
    pub fn init(&mut self) -> Result<(), AllocError> {
        let size = mbs();
        let base = unsafe { self.grower.grow(size) }.ok_or(AllocError::OutOfMemory)?;
        debug_assert_eq!(
            base.as_ptr() as usize % crate::config::MIN_HEAP_ALIGN,
            0,
            "GrowHeap::grow must return an 8-byte-aligned base (see region::GrowHeap safety docs)"
        );
        unsafe { block::set_header(base, size, false) };
        self.first_block = Some(base);
        self.end_heap = Some(unsafe { block::payload_of(base) });
        self.heap_limit = Some(unsafe { NonNull::new_unchecked(base.as_ptr().add(size)) });
        unsafe { self.table.push(class::of(size), base) };
        log::debug!("sfalloc: initialized with a {size}-byte first block");
        Ok(())
    }

    /// Allocates at least `size` bytes, returning an 8-byte-aligned pointer
    /// or null (spec §4.2).
    pub fn allocate(&mut self, size: usize) -> *mut u8 {
        if size == 0 {
            log::trace!("sfalloc: allocate(0) rejected");
            return core::ptr::null_mut();
        }

        let newsize = newsize_for(size);
        let start_class = class::of(newsize);

        for index in start_class.index()..crate::config::CLASSES {
            let class = class::from_index(index);
            let Some(header) = (unsafe { self.table.search(class, newsize, self.policy) })
            else {
                continue;
            };

            let block_size = unsafe { block::size_of_block(header) };
            let result_header = if block_size - newsize <= mbs() {
                unsafe { self.table.remove(class, header) };
                unsafe { block::set_header(header, block_size, true) };
                header
            } else {
                unsafe { self.split(header, newsize) }
            };

            let payload = unsafe { block::payload_of(result_header) };
            log::trace!("sfalloc: allocate({size}) -> {:p}", payload.as_ptr());
            return payload.as_ptr();
        }

        match unsafe { self.grow_and_allocate(newsize) } {
            Some(payload) => {
                log::debug!("sfalloc: allocate({size}) grew the heap -> {:p}", payload.as_ptr());
                payload.as_ptr()
            }
            None => {
                log::warn!("sfalloc: allocate({size}) failed, heap growth refused");
                core::ptr::null_mut()
            }
        }
    }

    /// Releases a block previously returned by [`Self::allocate`] or
    /// [`Self::reallocate`] (spec §4.3). `ptr` may be null, which is a no-op.
    pub fn free(&mut self, ptr: *mut u8) {
        let Some(payload) = NonNull::new(ptr) else {
            return;
        };
        let header = unsafe { block::header_of(payload) };
        let size = unsafe { block::size_of_block(header) };
        unsafe { block::set_header(header, size, false) };

        let (final_header, final_size) = if size > COALESCE_THRESHOLD {
            let merged = unsafe { self.coalesce(header) };
            let merged_size = unsafe { block::size_of_block(merged) };
            (merged, merged_size)
        } else {
            (header, size)
        };

        let class = class::of(final_size);
        unsafe { self.table.push(class, final_header) };
        log::trace!("sfalloc: free({ptr:p}) -> class {}", class.index());
    }

    /// Resizes a previously allocated block, preserving
    /// `min(old_payload, size)` bytes when a move occurs (spec §4.7).
    pub fn reallocate(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        let Some(payload) = NonNull::new(ptr) else {
            return if size > 0 {
                self.allocate(size)
            } else {
                core::ptr::null_mut()
            };
        };

        if size == 0 {
            self.free(ptr);
            // Dangling by design: matches source behavior (spec §9 open question).
            return ptr;
        }

        let header = unsafe { block::header_of(payload) };
        let old = unsafe { block::size_of_block(header) };
        let newsize = newsize_for(size);

        if newsize == old {
            return ptr;
        }

        if newsize > old {
            let diff = newsize - old;
            if let Some(absorbed) = unsafe { self.try_grow_in_place(header, diff) } {
                let final_size = old + absorbed;
                unsafe { block::set_header(header, final_size, true) };
                log::debug!("sfalloc: reallocate grew {ptr:p} in place to {final_size} bytes");
                return ptr;
            }

            let new_ptr = self.allocate(size);
            if new_ptr.is_null() {
                return core::ptr::null_mut();
            }
            let copy_len = old - HEADER - FOOTER;
            unsafe { core::ptr::copy_nonoverlapping(ptr, new_ptr, copy_len) };
            self.free(ptr);
            return new_ptr;
        }

        // Shrink.
        if old - newsize <= mbs() {
            return ptr;
        }
        unsafe { self.split(header, newsize) };
        ptr
    }

    /// Diagnostic heap/free-list walk (spec §6 "check()").
    pub fn check(&self) -> CheckReport {
        crate::diag::check(self)
    }

    pub(crate) fn first_block(&self) -> Option<NonNull<u8>> {
        self.first_block
    }

    pub(crate) fn end_heap(&self) -> Option<NonNull<u8>> {
        self.end_heap
    }

    pub(crate) fn heap_limit(&self) -> Option<NonNull<u8>> {
        self.heap_limit
    }

    pub(crate) fn table(&self) -> &Table {
        &self.table
    }

    /// Splits a block at `header` (free or allocated) into an allocated
    /// prefix of `newsize` bytes and a free remainder (spec §4.5).
    ///
    /// # Safety
    /// `header.size - newsize > mbs()`, and `newsize` is `mbs()`-or-larger
    /// and 8-byte aligned.
    unsafe fn split(&mut self, header: NonNull<u8>, newsize: usize) -> NonNull<u8> {
        let old_size = unsafe { block::size_of_block(header) };
        if !unsafe { block::is_allocated(header) } {
            let old_class = class::of(old_size);
            unsafe { self.table.remove(old_class, header) };
        }
        let was_heap_end = self.end_heap == Some(unsafe { block::payload_of(header) });

        unsafe { block::set_header(header, newsize, true) };
        let sibling = unsafe { NonNull::new_unchecked(header.as_ptr().add(newsize)) };
        let sibling_size = old_size - newsize;
        unsafe { block::set_header(sibling, sibling_size, false) };

        let sibling_class = class::of(sibling_size);
        unsafe { self.table.push(sibling_class, sibling) };

        if was_heap_end {
            self.end_heap = Some(unsafe { block::payload_of(sibling) });
        }

        header
    }

    /// Merges `header` with contiguous free neighbors individually larger
    /// than [`COALESCE_THRESHOLD`], in both directions (spec §4.4).
    ///
    /// # Safety
    /// `header` must be a free block not currently present in any free list
    /// (the caller just cleared its allocated bit and has not pushed it yet).
    unsafe fn coalesce(&mut self, header: NonNull<u8>) -> NonNull<u8> {
        let heap_limit = self.heap_limit.expect("allocator not initialized");
        let first_block = self.first_block.expect("allocator not initialized");

        let mut right_edge = header;
        loop {
            let Some(neighbor) = (unsafe { block::right(right_edge, heap_limit) }) else {
                break;
            };
            if unsafe { block::is_allocated(neighbor) } {
                break;
            }
            let neighbor_size = unsafe { block::size_of_block(neighbor) };
            if neighbor_size <= COALESCE_THRESHOLD {
                break;
            }
            let neighbor_class = class::of(neighbor_size);
            unsafe { self.table.remove(neighbor_class, neighbor) };
            right_edge = neighbor;
        }
        let merged_was_heap_end = self.end_heap == Some(unsafe { block::payload_of(right_edge) });

        let mut left_edge = header;
        loop {
            let Some(neighbor) = (unsafe { block::left(left_edge, first_block) }) else {
                break;
            };
            if unsafe { block::is_allocated(neighbor) } {
                break;
            }
            let neighbor_size = unsafe { block::size_of_block(neighbor) };
            if neighbor_size <= COALESCE_THRESHOLD {
                break;
            }
            let neighbor_class = class::of(neighbor_size);
            unsafe { self.table.remove(neighbor_class, neighbor) };
            left_edge = neighbor;
        }

        let right_end = right_edge.as_ptr() as usize + unsafe { block::size_of_block(right_edge) };
        let merged_size = right_end - left_edge.as_ptr() as usize;
        unsafe { block::set_header(left_edge, merged_size, false) };

        if merged_was_heap_end {
            self.end_heap = Some(unsafe { block::payload_of(left_edge) });
        }

        left_edge
    }

    /// Simulated-then-real right coalesce for an in-place grow (spec §4.7
    /// "Grow"). Returns the number of bytes absorbed from whole free
    /// neighbors, or `None` if the run of free neighbors to the right isn't
    /// long enough to cover `diff`.
    ///
    /// # Safety
    /// `header` must be a currently allocated block.
    unsafe fn try_grow_in_place(&mut self, header: NonNull<u8>, diff: usize) -> Option<usize> {
        let heap_limit = self.heap_limit?;

        // Simulated walk: verify the run exists before mutating anything, so a
        // failed grow leaves no visible trace (spec §7).
        let mut probe = header;
        let mut projected = 0usize;
        while projected < diff {
            let neighbor = unsafe { block::right(probe, heap_limit) }?;
            if unsafe { block::is_allocated(neighbor) } {
                return None;
            }
            projected += unsafe { block::size_of_block(neighbor) };
            probe = neighbor;
        }

        // Real walk: absorb whole neighbors, never splitting the last one.
        let mut current = header;
        let mut absorbed = 0usize;
        let mut last_was_heap_end = false;
        while absorbed < diff {
            let neighbor = unsafe { block::right(current, heap_limit) }
                .expect("validated by the simulated walk above");
            let neighbor_size = unsafe { block::size_of_block(neighbor) };
            let neighbor_class = class::of(neighbor_size);
            unsafe { self.table.remove(neighbor_class, neighbor) };
            last_was_heap_end = self.end_heap == Some(unsafe { block::payload_of(neighbor) });
            absorbed += neighbor_size;
            current = neighbor;
        }

        if last_was_heap_end {
            self.end_heap = Some(unsafe { block::payload_of(header) });
        }

        Some(absorbed)
    }

    /// Full miss path (spec §4.2 last bullet): grows the heap by exactly
    /// `newsize` bytes and carves a single new allocated block there.
    unsafe fn grow_and_allocate(&mut self, newsize: usize) -> Option<NonNull<u8>> {
        let base = unsafe { self.grower.grow(newsize) }?;
        unsafe { block::set_header(base, newsize, true) };
        let payload = unsafe { block::payload_of(base) };
        self.end_heap = Some(payload);
        self.heap_limit = Some(unsafe { NonNull::new_unchecked(base.as_ptr().add(newsize)) });
        Some(payload)
    }
}

/// `newsize = max(MBS, align8(size + HEADER + FOOTER))` (spec §4.2, §4.7).
fn newsize_for(size: usize) -> usize {
    core::cmp::max(mbs(), align8(size + HEADER + FOOTER))
}
