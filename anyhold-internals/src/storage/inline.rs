//! Fixed-capacity storage inside the container.

use core::{alloc::Layout, cell::UnsafeCell, mem::MaybeUninit, ptr::NonNull};

use super::{INLINE_ALIGN, Storage, fits_inline};

/// Byte buffer aligned to [`INLINE_ALIGN`].
///
/// The bytes live in an [`UnsafeCell`] so that payloads with interior
/// mutability can be mutated through shared references to the container.
#[repr(C, align(16))]
struct InlineBuffer<const N: usize> {
    /// The payload bytes
    bytes: UnsafeCell<[MaybeUninit<u8>; N]>,
}

const _: () = assert!(core::mem::align_of::<InlineBuffer<0>>() == INLINE_ALIGN);

impl<const N: usize> InlineBuffer<N> {
    /// Creates an uninitialized buffer.
    #[inline]
    const fn new() -> Self {
        Self {
            bytes: UnsafeCell::new([MaybeUninit::uninit(); N]),
        }
    }

    /// Returns the start of the buffer, valid for reads and writes of `N`
    /// bytes.
    #[inline]
    fn as_ptr(&self) -> NonNull<u8> {
        NonNull::from(&self.bytes).cast::<u8>()
    }
}

/// Storage with a fixed inline buffer of `N` bytes.
///
/// No heap memory is ever used. The buffer is aligned to [`INLINE_ALIGN`]
/// bytes, so any payload of at most `N` bytes fits unless it carries an
/// explicit `#[repr(align)]` above that. Allocating a payload that does not
/// fit violates the precondition of [`Storage::allocate`] and panics. Use
/// [`Storage::can_hold`] to check beforehand.
///
/// Swapping is never possible by reference: the payload lives inside the
/// storage, so containers relocate values instead.
pub struct InlineStorage<const N: usize> {
    /// The payload bytes
    buffer: InlineBuffer<N>,
    /// Whether the buffer currently holds a payload
    occupied: bool,
}

impl<const N: usize> InlineStorage<N> {
    /// Number of bytes available to a payload.
    pub const CAPACITY: usize = N;

    /// Creates an empty [`InlineStorage`].
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: InlineBuffer::new(),
            occupied: false,
        }
    }
}

impl<const N: usize> Default for InlineStorage<N> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY:
// 1. `occupied` is `false` exactly when empty, and `new` sets it to `false`.
// 2. `allocate` only succeeds when the layout fits the `N`-byte buffer
//    aligned to `INLINE_ALIGN`, and both getters return its start. The address moves with the
//    storage, which the trait permits.
// 3. `allocate` asserts the layout fits before marking the storage occupied.
// 4. `free` only clears the flag, and `try_swap` does nothing.
// 5. `try_swap` always fails and leaves both unchanged.
unsafe impl<const N: usize> Storage for InlineStorage<N> {
    const CAN_ALWAYS_SWAP: bool = false;

    #[inline]
    fn can_hold(layout: Layout) -> bool {
        fits_inline(layout, N, INLINE_ALIGN)
    }

    fn allocate(&mut self, layout: Layout) {
        debug_assert!(!self.occupied, "allocate called on occupied storage");
        assert!(
            Self::can_hold(layout),
            "payload of {} bytes with alignment {} does not fit in an inline buffer of {} bytes",
            layout.size(),
            layout.align(),
            N,
        );
        self.occupied = true;
    }

    #[inline]
    unsafe fn free(&mut self, _layout: Layout) {
        self.occupied = false;
    }

    #[inline]
    fn get(&self) -> Option<NonNull<u8>> {
        self.occupied.then(|| self.buffer.as_ptr())
    }

    #[inline]
    fn get_mut(&mut self) -> Option<NonNull<u8>> {
        self.occupied.then(|| self.buffer.as_ptr())
    }

    #[inline]
    fn try_swap(&mut self, _other: &mut Self) -> bool {
        false
    }
}

// SAFETY: The storage never reads or writes the payload bytes itself, and a
// shared `InlineStorage` only hands out the buffer address. Whether the
// payload may be shared across threads is decided by the container holding
// the storage.
unsafe impl<const N: usize> Sync for InlineStorage<N> {}

impl<const N: usize> core::fmt::Debug for InlineStorage<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InlineStorage")
            .field("capacity", &N)
            .field("occupied", &self.occupied)
            .finish()
    }
}
