//! Owned heap allocations shared by the heap-backed strategies.

use core::{alloc::Layout, ptr::NonNull};

/// A heap allocation, identified by its start address alone.
///
/// The layout is not stored: whoever owns the block must pass the layout it
/// was allocated with to [`HeapBlock::release`]. Zero-sized layouts do not
/// allocate and use an aligned dangling address instead.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub(crate) struct HeapBlock {
    /// Start of the allocation
    ptr: NonNull<u8>,
}

const _: () = assert!(core::mem::size_of::<HeapBlock>() == core::mem::size_of::<usize>());

impl HeapBlock {
    /// Allocates a block for `layout`, aborting through
    /// [`alloc::alloc::handle_alloc_error`] if the allocator fails.
    pub(crate) fn allocate(layout: Layout) -> Self {
        if layout.size() == 0 {
            let dangling = core::ptr::without_provenance_mut::<u8>(layout.align());
            // SAFETY: `layout.align()` is a power of two and therefore non-zero.
            let ptr = unsafe { NonNull::new_unchecked(dangling) };
            return Self { ptr };
        }

        // SAFETY: `layout` has a non-zero size, checked above.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            alloc::alloc::handle_alloc_error(layout)
        };
        Self { ptr }
    }

    /// Returns the start of the block.
    #[inline]
    pub(crate) fn ptr(self) -> NonNull<u8> {
        self.ptr
    }

    /// Returns the block to the allocator.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The block was created by [`HeapBlock::allocate`] with `layout` and
    ///    has not been released before.
    /// 2. Neither this copy nor any other copy of the block is used again.
    pub(crate) unsafe fn release(self, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        // SAFETY:
        // 1. The pointer was returned by `alloc` with this exact layout,
        //    guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe {
            alloc::alloc::dealloc(self.ptr.as_ptr(), layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_block_alignment() {
        let layout = Layout::from_size_align(3, 32).expect("valid layout");

        let block = HeapBlock::allocate(layout);
        assert_eq!(block.ptr().as_ptr() as usize % 32, 0);
        // SAFETY: Allocated above with `layout` and not used afterwards.
        unsafe { block.release(layout) };
    }

    #[test]
    fn test_heap_block_zero_sized() {
        #[repr(align(16))]
        struct Empty;

        let block = HeapBlock::allocate(Layout::new::<Empty>());
        assert_eq!(block.ptr().as_ptr() as usize, 16);
        // SAFETY: Allocated above with the same layout and not used afterwards.
        unsafe { block.release(Layout::new::<Empty>()) };
    }
}
