//! Small-buffer storage with heap fallback.

use core::{alloc::Layout, cell::UnsafeCell, mem::MaybeUninit, ptr::NonNull};

use super::{Storage, block::HeapBlock, fits_inline};

/// Default inline capacity of [`SmallStorage`]: two machine words minus one
/// byte.
pub const DEFAULT_SMALL_CAPACITY: usize = 2 * core::mem::size_of::<usize>() - 1;

/// Which part of a [`SmallStorage`] currently holds the payload.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum SmallState {
    /// No payload
    Empty,
    /// The payload lives in the inline buffer
    Local,
    /// The payload lives in a heap allocation owned by the storage
    Heap,
}

/// The inline bytes and the heap block share the same memory.
///
/// Both fields are byte arrays, so the union is byte-aligned and exactly as
/// large as its larger field. [`SmallStorage`] supplies the word alignment.
#[repr(C)]
union Slot<const N: usize> {
    /// Inline payload bytes, valid in [`SmallState::Local`]
    local: [MaybeUninit<u8>; N],
    /// Bytes of a [`HeapBlock`], valid in [`SmallState::Heap`]
    heap: BlockBytes,
}

/// The bytes of a [`HeapBlock`], without its alignment.
type BlockBytes = [MaybeUninit<u8>; core::mem::size_of::<HeapBlock>()];

/// Storage that keeps small payloads inline and moves larger ones to the
/// heap.
///
/// A payload is stored inline when its size is at most
/// [`SmallStorage::LOCAL_CAPACITY`] and its alignment at most that of a
/// machine word. The inline buffer is never smaller than one word, even
/// when `N` is.
///
/// The state tag sits right after the buffer, so with the default capacity
/// of two words minus one byte the whole storage takes two words.
///
/// Swapping by reference is only possible when both instances hold their
/// payloads on the heap; containers relocate values in every other case.
#[repr(C)]
pub struct SmallStorage<const N: usize = { DEFAULT_SMALL_CAPACITY }> {
    /// Zero-sized field raising the alignment of `slot` to a word
    _align: [usize; 0],
    /// Inline bytes or the heap block, depending on `state`
    slot: UnsafeCell<Slot<N>>,
    /// Which field of `slot` is in use
    state: SmallState,
}

impl<const N: usize> SmallStorage<N> {
    /// Number of bytes a payload may occupy and still be stored inline.
    pub const LOCAL_CAPACITY: usize = if N < core::mem::size_of::<usize>() {
        core::mem::size_of::<usize>()
    } else {
        N
    };

    /// Creates an empty [`SmallStorage`].
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _align: [],
            slot: UnsafeCell::new(Slot {
                local: [MaybeUninit::uninit(); N],
            }),
            state: SmallState::Empty,
        }
    }

    /// Returns where the payload currently lives.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SmallState {
        self.state
    }

    /// Returns whether the payload is stored inline.
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.state == SmallState::Local
    }

    /// Returns whether the payload is stored on the heap.
    #[inline]
    #[must_use]
    pub fn is_heap(&self) -> bool {
        self.state == SmallState::Heap
    }

    /// Start of the inline bytes.
    ///
    /// The slot is word-aligned and at least [`Self::LOCAL_CAPACITY`] bytes
    /// long.
    #[inline]
    fn local_ptr(&self) -> NonNull<u8> {
        NonNull::from(&self.slot).cast::<u8>()
    }

    /// Reads the heap block.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `self.state` is [`SmallState::Heap`].
    #[inline]
    unsafe fn heap_block(&self) -> HeapBlock {
        debug_assert_eq!(self.state, SmallState::Heap);
        let slot: *const Slot<N> = self.slot.get();
        // SAFETY: The pointer comes from the `UnsafeCell` owned by `self` and no
        // mutable access to it exists while `&self` is held.
        let slot: &Slot<N> = unsafe { &*slot };
        // SAFETY:
        // 1. In heap state the `heap` field was the last one written, guaranteed
        //    by the caller
        let bytes = unsafe { slot.heap };
        // SAFETY: The bytes were produced from a `HeapBlock` by `allocate`, so they
        // form a valid, non-null pointer with its provenance intact.
        unsafe { core::mem::transmute::<BlockBytes, HeapBlock>(bytes) }
    }
}

impl<const N: usize> Default for SmallStorage<N> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY:
// 1. `state` is `Empty` exactly when empty, and `new` starts there.
// 2. In local state the address is the start of the word-aligned slot, and
//    `allocate` only chooses local state when the layout fits
//    `LOCAL_CAPACITY` bytes of word alignment, which the slot always covers.
//    In heap state the address is the start of a block allocated for the
//    layout, independent of the location of `self`.
// 3. `HeapBlock::allocate` diverges when the allocator fails.
// 4. `free` only deallocates the block, and `try_swap` only exchanges blocks.
// 5. `try_swap` exchanges both blocks, and both states are `Heap` before and
//    after. Otherwise it returns `false` without changes.
unsafe impl<const N: usize> Storage for SmallStorage<N> {
    const CAN_ALWAYS_SWAP: bool = false;

    #[inline]
    fn can_hold(_layout: Layout) -> bool {
        true
    }

    fn allocate(&mut self, layout: Layout) {
        debug_assert_eq!(
            self.state,
            SmallState::Empty,
            "allocate called on occupied storage"
        );
        if fits_inline(layout, Self::LOCAL_CAPACITY, core::mem::align_of::<usize>()) {
            self.state = SmallState::Local;
        } else {
            trace_event!(
                size = layout.size(),
                align = layout.align(),
                capacity = Self::LOCAL_CAPACITY,
                "payload spills to the heap"
            );
            let block = HeapBlock::allocate(layout);
            // SAFETY: Both types have the same size, and every byte pattern is a
            // valid `MaybeUninit<u8>`.
            let bytes = unsafe { core::mem::transmute::<HeapBlock, BlockBytes>(block) };
            *self.slot.get_mut() = Slot { heap: bytes };
            self.state = SmallState::Heap;
        }
    }

    unsafe fn free(&mut self, layout: Layout) {
        if self.state == SmallState::Heap {
            // SAFETY:
            // 1. The state is `Heap`
            let block = unsafe { self.heap_block() };
            // SAFETY:
            // 1. The block came from `HeapBlock::allocate` in `allocate`, called
            //    with `layout` as guaranteed by the caller
            // 2. The state is reset below, so the stored copy is never read again
            unsafe {
                block.release(layout);
            }
        }
        self.state = SmallState::Empty;
    }

    fn get(&self) -> Option<NonNull<u8>> {
        match self.state {
            SmallState::Empty => None,
            SmallState::Local => Some(self.local_ptr()),
            SmallState::Heap => {
                // SAFETY:
                // 1. The state is `Heap`
                let block = unsafe { self.heap_block() };
                Some(block.ptr())
            }
        }
    }

    #[inline]
    fn get_mut(&mut self) -> Option<NonNull<u8>> {
        self.get()
    }

    fn try_swap(&mut self, other: &mut Self) -> bool {
        if self.state == SmallState::Heap && other.state == SmallState::Heap {
            core::mem::swap(self.slot.get_mut(), other.slot.get_mut());
            true
        } else {
            false
        }
    }
}

// SAFETY: The storage owns its heap block exclusively and never reads or writes
// the payload bytes. Whether the payload may cross threads is decided by the
// container holding the storage.
unsafe impl<const N: usize> Send for SmallStorage<N> {}

// SAFETY: A shared `SmallStorage` only hands out the payload address.
unsafe impl<const N: usize> Sync for SmallStorage<N> {}

impl<const N: usize> core::fmt::Debug for SmallStorage<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SmallStorage")
            .field("capacity", &Self::LOCAL_CAPACITY)
            .field("state", &self.state)
            .finish()
    }
}
