//! Compile-time constants shared across the allocator.

use core::mem::size_of;

/// Number of segregated size classes.
pub const CLASSES: usize = 20;

/// Classes up to and including this index are never coalesced on free.
/// Covers classes 0-2 (sizes up to 256 B): small free blocks are cheap
/// enough to reissue that merging them isn't worth the extra work.
pub const LIMIT_COALESCE: u8 = 2;

/// Machine word size, used for header, footer and free-list link slots.
pub const WORD: usize = size_of::<usize>();

/// Header size in bytes: one machine word.
pub const HEADER: usize = WORD;

/// Footer size in bytes: one machine word.
pub const FOOTER: usize = WORD;

/// Size of a single free-list link (prev or next) stored in a free block's payload.
pub const LINK: usize = WORD;

/// Round `n` up to the next multiple of 8.
#[inline]
#[must_use]
pub const fn align8(n: usize) -> usize {
    (n + 7) & !7
}

/// Minimum block size: header + footer + two links, 8-byte aligned.
///
/// 32 bytes on 64-bit targets, 16 bytes on 32-bit targets.
#[inline]
#[must_use]
pub const fn mbs() -> usize {
    align8(HEADER + FOOTER + 2 * LINK)
}

/// The largest size, in bytes, still covered by a class at or below
/// `class`. Free blocks individually larger than this are always
/// coalesced; used as a direct numeric gate (`size > 255`) everywhere a
/// coalescing decision is made, rather than a recomputed-class comparison.
#[must_use]
pub const fn get_max_dim(class: u8) -> usize {
    (1usize << (class as u32 + 6)) - 1
}

/// Numeric coalescing threshold derived from [`LIMIT_COALESCE`]: 255 bytes.
pub const COALESCE_THRESHOLD: usize = get_max_dim(LIMIT_COALESCE);

/// Minimum heap alignment requested from the growth primitive so that the first
/// payload byte after a header is always 8-byte aligned.
pub const MIN_HEAP_ALIGN: usize = 8;
