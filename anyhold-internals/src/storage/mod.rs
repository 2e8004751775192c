//! Raw memory strategies for type-erased payloads.
//!
//! A [`Storage`] only hands out raw memory. It never constructs, copies or
//! drops a payload; that protocol belongs to [`RawAny`](crate::RawAny),
//! which knows the payload's [`OperationTable`](crate::OperationTable).
//!
//! Three strategies are provided:
//!
//! - [`HeapStorage`]: one heap allocation sized to the payload. Swapping is
//!   always a pointer exchange.
//! - [`InlineStorage`]: a fixed buffer of `N` bytes inside the container,
//!   aligned to [`INLINE_ALIGN`]. Payloads that do not fit are a
//!   precondition violation.
//! - [`SmallStorage`]: a word-aligned buffer of at least one machine word
//!   inside the container, falling back to a heap allocation for larger
//!   payloads.
//!
//! Strategies are selected through a generic parameter, so none of these
//! calls go through dynamic dispatch.
//!
//! A storage does not remember the layout it was allocated with. The owner
//! passes it back to [`Storage::free`], which keeps a heap-backed storage at
//! a single pointer. For the same reason storages do not free themselves on
//! drop: dropping an occupied storage leaks its memory.

use core::{alloc::Layout, ptr::NonNull};

mod block;
mod heap;
mod inline;
mod small;

pub use self::{
    heap::HeapStorage,
    inline::InlineStorage,
    small::{DEFAULT_SMALL_CAPACITY, SmallState, SmallStorage},
};

/// Alignment of the [`InlineStorage`] buffer.
pub const INLINE_ALIGN: usize = 16;

/// Raw memory provider embedded in a container.
///
/// # Safety
///
/// Implementors must guarantee:
///
/// 1. [`Storage::get`] returns `None` if and only if the storage is empty. A
///    default-constructed storage is empty.
/// 2. After [`Storage::allocate`] returns for a layout, [`Storage::get`] and
///    [`Storage::get_mut`] return the same address, aligned to
///    `layout.align()` and valid for reads and writes of `layout.size()`
///    bytes. The address stays valid until [`Storage::free`] or a
///    successful [`Storage::try_swap`] is called, or the storage itself is
///    moved.
/// 3. [`Storage::allocate`] panics instead of returning if it cannot honor
///    point 2 for the requested layout.
/// 4. [`Storage::free`] and [`Storage::try_swap`] never read, write or drop
///    the bytes at the payload address.
/// 5. A successful [`Storage::try_swap`] exchanges the complete state of the
///    two instances. An unsuccessful one leaves both unchanged. After a
///    successful swap each instance must be freed with the layout the other
///    one was allocated with.
pub unsafe trait Storage: Default {
    /// Whether [`Storage::try_swap`] succeeds for every pair of instances.
    const CAN_ALWAYS_SWAP: bool;

    /// Returns whether [`Storage::allocate`] can satisfy `layout`.
    fn can_hold(layout: Layout) -> bool;

    /// Prepares memory for a payload with the given layout.
    ///
    /// The storage must be empty. Panics if the layout cannot be held.
    fn allocate(&mut self, layout: Layout);

    /// Releases any owned memory and leaves the storage empty.
    ///
    /// The payload must already have been dropped or moved out. Calling this
    /// on an empty storage does nothing.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. If the storage is occupied, `layout` is the layout passed to the
    ///    [`Storage::allocate`] call that occupied it.
    unsafe fn free(&mut self, layout: Layout);

    /// Returns the payload address, or `None` if empty.
    ///
    /// The address may be used for writes only if the payload type permits
    /// mutation through a shared reference.
    fn get(&self) -> Option<NonNull<u8>>;

    /// Returns the payload address for reads and writes, or `None` if empty.
    fn get_mut(&mut self) -> Option<NonNull<u8>>;

    /// Exchanges the contents of two storages by reference only.
    ///
    /// Returns `false`, changing nothing, if the payloads would have to be
    /// relocated instead.
    fn try_swap(&mut self, other: &mut Self) -> bool;
}

/// Returns whether `layout` fits in a buffer of `capacity` bytes aligned to
/// `align`.
#[inline]
pub(crate) const fn fits_inline(layout: Layout, capacity: usize, align: usize) -> bool {
    layout.size() <= capacity && layout.align() <= align
}
