//! Block header/footer codec and boundary-tag navigation.
//!
//! This is the only module allowed to perform raw pointer arithmetic on heap
//! memory. Everything above this module operates on [`NonNull<u8>`] handles
//! to a block's *header* address and calls these typed accessors instead of
//! computing offsets itself.
//!
//! Packed header/footer word layout: `size | allocated_bit`. Every block
//! size is a multiple of 8, so bit 0 of `size` is always zero and doubles
//! as the allocated flag with no extra storage.

use crate::config::{FOOTER, HEADER};
use core::ptr::NonNull;

const ALLOC_BIT: usize = 1;

#[inline]
unsafe fn read_word(addr: NonNull<u8>) -> usize {
    unsafe { addr.as_ptr().cast::<usize>().read() }
}

#[inline]
unsafe fn write_word(addr: NonNull<u8>, value: usize) {
    unsafe { addr.as_ptr().cast::<usize>().write(value) }
}

#[inline]
const fn pack(size: usize, allocated: bool) -> usize {
    size | (allocated as usize * ALLOC_BIT)
}

#[inline]
const fn unpack_size(word: usize) -> usize {
    word & !ALLOC_BIT
}

#[inline]
const fn unpack_allocated(word: usize) -> bool {
    word & ALLOC_BIT != 0
}

/// Reads the packed header word of the block at `header`.
///
/// # Safety
/// `header` must point at the header of a live block within the heap.
#[inline]
pub unsafe fn size_of_block(header: NonNull<u8>) -> usize {
    unpack_size(unsafe { read_word(header) })
}

/// Reads the allocated bit of the block at `header`.
///
/// # Safety
/// `header` must point at the header of a live block within the heap.
#[inline]
pub unsafe fn is_allocated(header: NonNull<u8>) -> bool {
    unpack_allocated(unsafe { read_word(header) })
}

/// Address of the footer word, given a header and the block's total size.
///
/// # Safety
/// `header` must point at a block of exactly `size` bytes within the heap.
#[inline]
pub unsafe fn footer_of(header: NonNull<u8>, size: usize) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(header.as_ptr().add(size - FOOTER)) }
}

/// Writes `size`/`allocated` into both the header and footer of the block:
/// the two always carry equal packed values.
///
/// # Safety
/// `header` must point at the start of a block with room for `size` bytes
/// within heap bounds; `size` must be a multiple of 8 and at least
/// [`crate::config::mbs`].
pub unsafe fn set_header(header: NonNull<u8>, size: usize, allocated: bool) {
    let word = pack(size, allocated);
    unsafe {
        write_word(header, word);
        write_word(footer_of(header, size), word);
    }
}

/// The user-visible payload pointer for a block, given its header.
///
/// # Safety
/// `header` must point at the header of a live block.
#[inline]
pub unsafe fn payload_of(header: NonNull<u8>) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(header.as_ptr().add(HEADER)) }
}

/// The block header, given a previously issued payload pointer.
///
/// # Safety
/// `payload` must be a pointer previously returned by [`payload_of`] for some
/// live block.
#[inline]
pub unsafe fn header_of(payload: NonNull<u8>) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(payload.as_ptr().sub(HEADER)) }
}

/// The right (higher-address) neighbor of `header`, or `None` if `header` is
/// the rightmost block in the heap (its end equals `heap_limit`).
///
/// # Safety
/// `header` must be a live block; `heap_limit` must be the address one past
/// the last byte of the heap.
pub unsafe fn right(header: NonNull<u8>, heap_limit: NonNull<u8>) -> Option<NonNull<u8>> {
    let size = unsafe { size_of_block(header) };
    let next = unsafe { header.as_ptr().add(size) };
    if (next as usize) >= (heap_limit.as_ptr() as usize) {
        None
    } else {
        Some(unsafe { NonNull::new_unchecked(next) })
    }
}

/// The left (lower-address) neighbor of `header`, found via the boundary tag
/// immediately preceding it, or `None` if `header` is `first_block`.
///
/// # Safety
/// `header` must be a live block other than possibly `first_block`; if it is
/// not `first_block`, the word immediately preceding it must be the footer
/// of a live block (the heap is a gap-free sequence of blocks).
pub unsafe fn left(header: NonNull<u8>, first_block: NonNull<u8>) -> Option<NonNull<u8>> {
    if header == first_block {
        return None;
    }
    let left_footer = unsafe { NonNull::new_unchecked(header.as_ptr().sub(FOOTER)) };
    let left_size = unpack_size(unsafe { read_word(left_footer) });
    Some(unsafe { NonNull::new_unchecked(header.as_ptr().sub(left_size)) })
}

/// Pointers to the `prev` and `next` free-list link slots stored in the first
/// two words of a free block's payload.
///
/// # Safety
/// `header` must point at a block whose payload is at least `2 * LINK` bytes
/// (guaranteed for any block `>= mbs()`), and the block must currently be
/// free (the slots alias user payload for allocated blocks).
pub unsafe fn links_of(header: NonNull<u8>) -> (NonNull<usize>, NonNull<usize>) {
    let payload = unsafe { payload_of(header) };
    let prev = payload.as_ptr().cast::<usize>();
    let next = unsafe { prev.add(1) };
    unsafe { (NonNull::new_unchecked(prev), NonNull::new_unchecked(next)) }
}
