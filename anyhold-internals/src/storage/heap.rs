//! Heap-backed storage.

use core::{alloc::Layout, ptr::NonNull};

use super::{Storage, block::HeapBlock};

/// Storage that places every payload in its own heap allocation.
///
/// Swapping two [`HeapStorage`] instances only exchanges their pointers, so
/// containers built on it never have to relocate payloads during a swap.
#[derive(Default)]
#[allow(missing_copy_implementations)] // unique owner of its block; `Copy` would double-free
pub struct HeapStorage {
    /// The current allocation, `None` when empty
    block: Option<HeapBlock>,
}

impl HeapStorage {
    /// Creates an empty [`HeapStorage`].
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { block: None }
    }
}

// SAFETY:
// 1. `block` is `None` exactly when empty, and `Default` produces `None`.
// 2. `HeapBlock::allocate` returns a block aligned and sized for the layout,
//    and both getters return its start. The address does not depend on the
//    location of `self`.
// 3. `HeapBlock::allocate` diverges when the allocator fails.
// 4. `free` only deallocates, and `try_swap` only exchanges the blocks.
// 5. `try_swap` always exchanges the complete state, which is the block
//    alone.
unsafe impl Storage for HeapStorage {
    const CAN_ALWAYS_SWAP: bool = true;

    #[inline]
    fn can_hold(_layout: Layout) -> bool {
        true
    }

    fn allocate(&mut self, layout: Layout) {
        debug_assert!(self.block.is_none(), "allocate called on occupied storage");
        self.block = Some(HeapBlock::allocate(layout));
    }

    unsafe fn free(&mut self, layout: Layout) {
        if let Some(block) = self.block.take() {
            // SAFETY:
            // 1. The block came from `HeapBlock::allocate` in `allocate`, called
            //    with `layout` as guaranteed by the caller
            // 2. It was taken out of `self.block`, so no copy remains
            unsafe {
                block.release(layout);
            }
        }
    }

    #[inline]
    fn get(&self) -> Option<NonNull<u8>> {
        self.block.map(HeapBlock::ptr)
    }

    #[inline]
    fn get_mut(&mut self) -> Option<NonNull<u8>> {
        self.block.map(HeapBlock::ptr)
    }

    #[inline]
    fn try_swap(&mut self, other: &mut Self) -> bool {
        core::mem::swap(&mut self.block, &mut other.block);
        true
    }
}

// SAFETY: The storage owns its block exclusively and never reads or writes the
// payload bytes. Whether the payload may cross threads is decided by the
// container holding the storage.
unsafe impl Send for HeapStorage {}

// SAFETY: A shared `HeapStorage` only hands out the block address.
unsafe impl Sync for HeapStorage {}

impl core::fmt::Debug for HeapStorage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.block {
            Some(block) => f.debug_tuple("HeapStorage").field(&block.ptr()).finish(),
            None => f.write_str("HeapStorage(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_storage_lifecycle() {
        let mut storage = HeapStorage::new();
        assert!(storage.get().is_none());

        storage.allocate(Layout::new::<[u64; 16]>());
        let ptr = storage.get().expect("allocated");
        assert_eq!(storage.get_mut(), Some(ptr));
        assert_eq!(ptr.as_ptr() as usize % core::mem::align_of::<u64>(), 0);

        // SAFETY: Same layout as `allocate` above.
        unsafe { storage.free(Layout::new::<[u64; 16]>()) };
        assert!(storage.get().is_none());

        // Idempotent
        // SAFETY: The storage is empty.
        unsafe { storage.free(Layout::new::<[u64; 16]>()) };
        assert!(storage.get().is_none());
    }

    #[test]
    fn test_heap_storage_try_swap() {
        let mut a = HeapStorage::new();
        let mut b = HeapStorage::new();
        a.allocate(Layout::new::<u32>());
        let a_ptr = a.get();

        assert!(HeapStorage::CAN_ALWAYS_SWAP);
        assert!(a.try_swap(&mut b));
        assert!(a.get().is_none());
        assert_eq!(b.get(), a_ptr);

        // SAFETY: `b` now owns the block allocated by `a` for a `u32`.
        unsafe { b.free(Layout::new::<u32>()) };
    }

    #[test]
    fn test_heap_storage_holds_anything() {
        let wide = Layout::from_size_align(1, 128).expect("valid layout");

        assert!(HeapStorage::can_hold(wide));
        assert!(HeapStorage::can_hold(Layout::new::<[u8; 4096]>()));

        let mut storage = HeapStorage::new();
        storage.allocate(wide);
        let ptr = storage.get().expect("allocated");
        assert_eq!(ptr.as_ptr() as usize % 128, 0);
        // SAFETY: Same layout as `allocate` above.
        unsafe { storage.free(wide) };
    }

    #[test]
    fn test_heap_storage_is_one_pointer() {
        assert_eq!(
            core::mem::size_of::<HeapStorage>(),
            core::mem::size_of::<usize>()
        );
    }
}
