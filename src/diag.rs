//! Diagnostic heap walk (spec §6 "check()").
//!
//! Scans the heap address-order from `first_block` to `end_heap` and every
//! free list, reporting (via the `log` crate) any block present in a free
//! list but not marked free, and any two address-adjacent free blocks whose
//! sizes both exceed [`crate::config::COALESCE_THRESHOLD`] (a violation of
//! spec invariant I6). Purely diagnostic: never mutates allocator state.

use crate::alloc::Allocator;
use crate::block;
use crate::class::{self, Class};
use crate::config::{CLASSES, COALESCE_THRESHOLD};
use crate::region::GrowHeap;

/// Summary of a [`Allocator::check`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckReport {
    /// Blocks found in a free list whose header claims they are allocated.
    pub free_list_corruption: usize,
    /// Address-adjacent pairs of large (> 255 B) free blocks (I6 violations).
    pub adjacent_large_free_pairs: usize,
}

impl CheckReport {
    /// Whether the scan found no violations at all.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.free_list_corruption == 0 && self.adjacent_large_free_pairs == 0
    }
}

pub(crate) fn check<G: GrowHeap>(allocator: &Allocator<G>) -> CheckReport {
    let mut report = CheckReport::default();

    for index in 0..CLASSES {
        let class = class::from_index(index);
        check_free_list(allocator, class, &mut report);
    }

    check_adjacency(allocator, &mut report);

    if report.is_clean() {
        log::trace!("sfalloc: check() found no violations");
    } else {
        log::warn!(
            "sfalloc: check() found {} corrupt free-list entries, {} adjacent large free pairs",
            report.free_list_corruption,
            report.adjacent_large_free_pairs
        );
    }

    report
}

fn check_free_list<G: GrowHeap>(allocator: &Allocator<G>, class: Class, report: &mut CheckReport) {
    for header in unsafe { allocator.table().iter(class) } {
        if unsafe { block::is_allocated(header) } {
            report.free_list_corruption += 1;
            log::warn!(
                "sfalloc: check(): block {:p} is on free list {} but marked allocated",
                header.as_ptr(),
                class.index()
            );
        }
    }
}

fn check_adjacency<G: GrowHeap>(allocator: &Allocator<G>, report: &mut CheckReport) {
    let (Some(first), Some(heap_limit)) = (allocator.first_block(), allocator.heap_limit())
    else {
        return;
    };

    let mut current = first;
    loop {
        let size = unsafe { block::size_of_block(current) };
        let allocated = unsafe { block::is_allocated(current) };

        if !allocated && size > COALESCE_THRESHOLD {
            if let Some(next) = unsafe { block::right(current, heap_limit) } {
                let next_allocated = unsafe { block::is_allocated(next) };
                let next_size = unsafe { block::size_of_block(next) };
                if !next_allocated && next_size > COALESCE_THRESHOLD {
                    report.adjacent_large_free_pairs += 1;
                    log::warn!(
                        "sfalloc: check(): adjacent large free blocks at {:p} and {:p}",
                        current.as_ptr(),
                        next.as_ptr()
                    );
                }
            }
        }

        match unsafe { block::right(current, heap_limit) } {
            Some(next) => current = next,
            None => break,
        }
    }
}
