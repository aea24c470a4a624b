//! Segregated-fits general purpose heap allocator.
//!
//! Implements the classical three-operation allocator interface
//! (`allocate`, `free`, `reallocate`) over a single contiguous,
//! monotonically growing heap obtained from an external `sbrk`-style
//! primitive ([`GrowHeap`]). Built `#![no_std]` so it can back a
//! `#[global_allocator]` in kernel code; the `std` feature additionally
//! exposes a `Vec`-backed test double for host-side development.
//!
//! The hard engineering lives in the free-block index: a segregated-fits
//! table keyed by size class (`class`, internal), boundary-tagged
//! in-place block metadata (`block`, internal), class-sized coalescing,
//! and an in-place grow path for `reallocate`. See `DESIGN.md` in the
//! repository root for how each piece is grounded.
//!
//! # Example
//!
//! Requires the `std` feature for [`region::VecGrower`]; a kernel embedding
//! this crate provides its own [`region::GrowHeap`] implementation instead.
//!
//! ```ignore
//! use sfalloc::{Allocator, region::VecGrower};
//!
//! let mut allocator = Allocator::new(VecGrower::with_capacity(1 << 20));
//! allocator.init().expect("grow primitive must succeed for a fresh arena");
//!
//! let ptr = allocator.allocate(64);
//! assert!(!ptr.is_null());
//! assert_eq!(ptr as usize % 8, 0);
//! allocator.free(ptr);
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

mod alloc;
mod block;
mod class;
mod config;
mod diag;
mod error;
mod freelist;
mod locked;
pub mod region;

pub use alloc::Allocator;
pub use diag::CheckReport;
pub use error::AllocError;
pub use freelist::Policy;
pub use locked::LockedAllocator;

#[cfg(test)]
mod tests;
