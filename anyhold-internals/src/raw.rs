//! The type-erased container.
//!
//! This module encapsulates the `operations` field of [`RawAny`], ensuring it
//! is only visible within this module. This visibility restriction guarantees
//! the safety invariant: **whenever `operations` is set, the storage holds
//! exactly one live value of the type the table describes**.
//!
//! # Safety Invariant
//!
//! `operations` is only set right after a value of the table's type has been
//! written to the storage address, and it is cleared before the value is
//! dropped or relocated. The storage may briefly be occupied while
//! `operations` is `None`; every path that leaves it so frees the storage
//! before returning or unwinding.
//!
//! # Relocation
//!
//! Moving a payload out of a container is a bitwise relocation through the
//! table's move operations. Afterwards the source storage is freed without
//! running the destructor, since the value now lives elsewhere.
//!
//! # Freeing
//!
//! Storages do not remember their layout. Every storage is freed with the
//! layout of the table recorded for it, or, while no table is recorded yet,
//! with the layout held by a [`FreeGuard`].

use core::{alloc::Layout, marker::PhantomData, ptr::NonNull};

use crate::{operations::OperationTable, storage::Storage, type_info::TypeInfo};

/// A container holding at most one value of any type, with memory provided
/// by the storage strategy `S`.
///
/// The concrete type of the value is only known through the
/// [`OperationTable`] recorded when it was emplaced. [`RawAny`] is neither
/// [`Send`] nor [`Sync`] because it cannot know whether its payload is.
pub struct RawAny<S: Storage> {
    /// Raw memory for the payload
    storage: S,
    /// Table describing the payload
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists, outside of the methods of this module:
    ///
    /// 1. If `Some`, the storage address holds a live value of the type the
    ///    table was created for.
    /// 2. If `None`, the storage is empty.
    operations: Option<&'static OperationTable>,
    /// The payload may be neither `Send` nor `Sync`
    _not_thread_safe: PhantomData<*mut ()>,
}

impl<S: Storage> RawAny<S> {
    /// Creates an empty container.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: S::default(),
            operations: None,
            _not_thread_safe: PhantomData,
        }
    }

    /// Returns the storage strategy instance.
    #[inline]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the operation table of the current payload.
    #[inline]
    pub fn operations(&self) -> Option<&'static OperationTable> {
        self.operations
    }

    /// Returns the [`TypeInfo`] of the current payload.
    #[inline]
    pub fn type_info(&self) -> Option<TypeInfo> {
        self.operations.map(OperationTable::type_info)
    }

    /// Returns whether the container holds a value.
    #[inline]
    pub fn has_value(&self) -> bool {
        self.storage.get().is_some()
    }

    /// Returns whether the container holds a value of type `T`.
    #[inline]
    pub fn has_type<T: 'static>(&self) -> bool {
        self.operations
            .is_some_and(|operations| operations.type_info().is::<T>())
    }

    /// Returns the address of the payload.
    #[inline]
    pub fn data_ptr(&self) -> Option<NonNull<u8>> {
        self.storage.get()
    }

    /// Address of freshly allocated storage.
    fn allocated_ptr(&mut self) -> NonNull<u8> {
        match self.storage.get_mut() {
            Some(ptr) => ptr,
            None => unreachable!("storage returned no address after allocate"),
        }
    }

    /// Replaces the current payload with `value`.
    ///
    /// Panics without changing anything but the old payload if the storage
    /// cannot hold a `T`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `operations` is a table created for the type `T`.
    pub unsafe fn emplace<T: 'static>(
        &mut self,
        value: T,
        operations: &'static OperationTable,
    ) -> &mut T {
        debug_assert!(operations.type_info().is::<T>());

        self.reset();
        self.storage.allocate(Layout::new::<T>());
        let ptr = self.allocated_ptr().cast::<T>();
        // SAFETY: The storage was allocated for the layout of `T` just above.
        unsafe {
            ptr.write(value);
        }
        // 1. The storage holds a live `T`, and `operations` describes `T` as
        //    guaranteed by the caller
        self.operations = Some(operations);

        // SAFETY: The pointer holds the `T` written above and is uniquely borrowed
        // through `&mut self` for the returned lifetime.
        unsafe { ptr.cast::<T>().as_mut() }
    }

    /// Replaces the current payload with a value created by the table's
    /// default-construct slot.
    ///
    /// Returns `false`, leaving the container empty, if the slot is absent.
    /// Panics if the storage cannot hold the table's layout.
    pub fn emplace_default_from(&mut self, operations: &'static OperationTable) -> bool {
        self.reset();
        self.storage.allocate(operations.layout());
        // SAFETY:
        // 1. The storage was just allocated with the table's layout
        let mut guard = unsafe { FreeGuard::new(&mut self.storage, operations.layout()) };
        let ptr = guard.allocated_ptr();

        // SAFETY: The storage was allocated for the table's layout and holds no
        // live value.
        let constructed = unsafe { operations.default_construct(ptr) };
        if constructed {
            guard.defuse();
            // 1. The default-construct slot wrote a value of the table's type
            self.operations = Some(operations);
        }
        constructed
    }

    /// Drops the payload, if any, and frees the storage.
    pub fn reset(&mut self) {
        // 2. Without a table the storage is already empty
        let Some(operations) = self.operations.take() else {
            return;
        };
        // SAFETY:
        // 1. The storage holds a value of the table's type, so it was allocated
        //    with the table's layout
        let guard = unsafe { FreeGuard::new(&mut self.storage, operations.layout()) };
        if let Some(ptr) = guard.storage.get_mut() {
            // SAFETY: `operations` was `Some`, so the storage holds a live value of
            // its type. `operations` has been cleared, so it is not used again.
            unsafe {
                operations.destruct(ptr);
            }
        }
        // `guard` frees the storage here, or while unwinding from a panicking
        // destructor.
    }

    /// Returns a reference to the payload as `T` without checking its type.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The container holds a value.
    /// 2. The value is of type `T`.
    #[inline]
    pub unsafe fn value_unchecked<T: 'static>(&self) -> &T {
        debug_assert!(self.has_value());
        debug_assert!(self.has_type::<T>());
        // SAFETY:
        // 1. Guaranteed by the caller
        let ptr = unsafe { self.storage.get().unwrap_unchecked() };
        // SAFETY:
        // 2. Guaranteed by the caller, and shared access matches `&self`
        unsafe { ptr.cast::<T>().as_ref() }
    }

    /// Returns a mutable reference to the payload as `T` without checking its
    /// type.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The container holds a value.
    /// 2. The value is of type `T`.
    #[inline]
    pub unsafe fn value_unchecked_mut<T: 'static>(&mut self) -> &mut T {
        debug_assert!(self.has_value());
        debug_assert!(self.has_type::<T>());
        // SAFETY:
        // 1. Guaranteed by the caller
        let ptr = unsafe { self.storage.get_mut().unwrap_unchecked() };
        // SAFETY:
        // 2. Guaranteed by the caller, and unique access matches `&mut self`
        unsafe { ptr.cast::<T>().as_mut() }
    }

    /// Returns a reference to the payload if it is of type `T`.
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if self.has_type::<T>() {
            // SAFETY:
            // 1. `has_type` implies `operations` is set, so the storage is occupied
            // 2. Checked by `has_type`
            Some(unsafe { self.value_unchecked::<T>() })
        } else {
            None
        }
    }

    /// Returns a mutable reference to the payload if it is of type `T`.
    #[inline]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if self.has_type::<T>() {
            // SAFETY:
            // 1. `has_type` implies `operations` is set, so the storage is occupied
            // 2. Checked by `has_type`
            Some(unsafe { self.value_unchecked_mut::<T>() })
        } else {
            None
        }
    }

    /// Moves the payload out if it is of type `T`, leaving the container
    /// empty.
    pub fn take<T: 'static>(&mut self) -> Option<T> {
        if !self.has_type::<T>() {
            return None;
        }
        let ptr = self.allocated_ptr().cast::<T>();
        // SAFETY: `has_type` guarantees a live `T` at the address. It is treated as
        // moved-out by clearing `operations` and freeing the storage below.
        let value = unsafe { ptr.read() };
        self.forget_payload();
        Some(value)
    }

    /// Assigns `value` to the payload.
    ///
    /// If the container already holds a `T`, the payload is overwritten in
    /// place without touching the storage. Otherwise this is
    /// [`RawAny::emplace`].
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `operations` is a table created for the type `T`.
    pub unsafe fn assign<T: 'static>(&mut self, value: T, operations: &'static OperationTable) {
        if let Some(current) = self.downcast_mut::<T>() {
            *current = value;
        } else {
            // SAFETY:
            // 1. Guaranteed by the caller
            unsafe {
                self.emplace(value, operations);
            }
        }
    }

    /// Assigns a clone of `value` to the payload.
    ///
    /// If the container already holds a `T`, the payload is updated in place
    /// with [`Clone::clone_from`]. Otherwise this is [`RawAny::emplace`] of a
    /// clone.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `operations` is a table created for the type `T`.
    pub unsafe fn assign_cloned<T: Clone + 'static>(
        &mut self,
        value: &T,
        operations: &'static OperationTable,
    ) {
        if let Some(current) = self.downcast_mut::<T>() {
            current.clone_from(value);
        } else {
            // SAFETY:
            // 1. Guaranteed by the caller
            unsafe {
                self.emplace(value.clone(), operations);
            }
        }
    }

    /// Makes this container hold a copy of the payload of `other`.
    ///
    /// When both hold the same type the payload is copy-assigned in place.
    /// Otherwise the current payload is reset and, if `other` holds a value,
    /// it is copy-constructed into fresh storage.
    ///
    /// If the payload type lacks the needed copy slot the operation is
    /// silently skipped: an in-place copy leaves this container unchanged,
    /// a fresh copy leaves it empty.
    pub fn copy_from<S2: Storage>(&mut self, other: &RawAny<S2>) {
        if let (Some(dest_operations), Some(src_operations)) = (self.operations, other.operations)
            && dest_operations.type_info() == src_operations.type_info()
            && let (Some(dest), Some(src)) = (self.storage.get_mut(), other.storage.get())
        {
            // SAFETY: Both containers hold a live value of the same type, and they
            // are distinct objects since `self` is borrowed mutably.
            unsafe {
                src_operations.copy_assign(dest, src);
            }
            return;
        }

        self.reset();
        let (Some(src_operations), Some(src)) = (other.operations, other.storage.get()) else {
            return;
        };

        self.storage.allocate(src_operations.layout());
        // SAFETY:
        // 1. The storage was just allocated with the table's layout
        let mut guard = unsafe { FreeGuard::new(&mut self.storage, src_operations.layout()) };
        let dest = guard.allocated_ptr();
        // SAFETY: `src` holds a live value of the table's type, and `dest` was
        // just allocated for the same layout inside a different container.
        let copied = unsafe { src_operations.copy_construct(dest, src) };
        if copied {
            guard.defuse();
            // 1. The copy-construct slot wrote a value of the table's type
            self.operations = Some(src_operations);
        }
    }

    /// Moves the payload of `other` into this container, leaving `other`
    /// empty.
    ///
    /// When both hold the same type the payload is move-assigned in place.
    /// Otherwise the current payload is reset and, if `other` holds a value,
    /// it is relocated into fresh storage.
    pub fn move_from<S2: Storage>(&mut self, other: &mut RawAny<S2>) {
        if let (Some(dest_operations), Some(src_operations)) = (self.operations, other.operations)
            && dest_operations.type_info() == src_operations.type_info()
            && let (Some(dest), Some(src)) = (self.storage.get_mut(), other.storage.get_mut())
        {
            // Cleared first: if dropping the old payload panics, `other` must not
            // drop the relocated value again.
            other.operations = None;
            // SAFETY:
            // 1. The source storage holds a value of the table's type, so it was
            //    allocated with the table's layout
            let _guard = unsafe { FreeGuard::new(&mut other.storage, src_operations.layout()) };
            // SAFETY: Both containers hold a live value of the same type and are
            // distinct objects. The source is treated as moved-out from here on,
            // and `_guard` frees its storage without dropping it.
            unsafe {
                src_operations.move_assign(dest, src);
            }
            return;
        }

        self.reset();
        self.relocate_from(other);
    }

    /// Relocates the payload of `other`, if any, into this empty container.
    fn relocate_from<S2: Storage>(&mut self, other: &mut RawAny<S2>) {
        debug_assert!(!self.has_value());
        let (Some(operations), Some(src)) = (other.operations, other.storage.get_mut()) else {
            return;
        };

        self.storage.allocate(operations.layout());
        let dest = self.allocated_ptr();
        // SAFETY: `src` holds a live value of the table's type, and `dest` was just
        // allocated for the same layout inside a different container. The source
        // is forgotten right after, so it is never read or dropped again.
        unsafe {
            operations.move_construct(dest, src);
        }
        // 1. The storage now holds the relocated value
        self.operations = Some(operations);
        other.forget_payload();
    }

    /// Frees the storage without dropping the payload, which must have been
    /// relocated already.
    fn forget_payload(&mut self) {
        if let Some(operations) = self.operations.take() {
            // SAFETY:
            // 1. The storage held a value of the table's type, so it was allocated
            //    with the table's layout
            unsafe {
                self.storage.free(operations.layout());
            }
        }
    }

    /// Exchanges the payloads of two containers.
    ///
    /// The storages are first asked to swap by reference. If they cannot, the
    /// payloads are relocated: into the empty side if only one container
    /// holds a value, or through a temporary container if both do.
    pub fn swap(&mut self, other: &mut Self) {
        if self.storage.try_swap(&mut other.storage) {
            core::mem::swap(&mut self.operations, &mut other.operations);
            return;
        }

        trace_event!(
            storage = core::any::type_name::<S>(),
            "storage cannot swap by reference, relocating payloads"
        );
        match (self.has_value(), other.has_value()) {
            (false, false) => {}
            (false, true) => self.relocate_from(other),
            (true, false) => other.relocate_from(self),
            (true, true) => {
                let mut temp = Self::new();
                temp.relocate_from(self);
                self.relocate_from(other);
                other.relocate_from(&mut temp);
            }
        }
    }
}

impl<S: Storage> Default for RawAny<S> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage> Drop for RawAny<S> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<S: Storage + core::fmt::Debug> core::fmt::Debug for RawAny<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawAny")
            .field("type_info", &self.type_info())
            .field("storage", &self.storage)
            .finish()
    }
}

/// Frees a storage when dropped unless defused.
///
/// Covers the window between allocating storage and recording the operation
/// table, during which a panicking payload operation would otherwise leave
/// the storage occupied without a table.
struct FreeGuard<'a, S: Storage> {
    /// The storage to free
    storage: &'a mut S,
    /// The layout `storage` was allocated with
    layout: Layout,
}

impl<'a, S: Storage> FreeGuard<'a, S> {
    /// Guards `storage`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `storage` is empty or was allocated with `layout`, and stays so
    ///    until the guard is dropped or defused.
    #[inline]
    unsafe fn new(storage: &'a mut S, layout: Layout) -> Self {
        Self { storage, layout }
    }

    /// Address of the guarded, allocated storage.
    fn allocated_ptr(&mut self) -> NonNull<u8> {
        match self.storage.get_mut() {
            Some(ptr) => ptr,
            None => unreachable!("storage returned no address after allocate"),
        }
    }

    /// Keeps the storage allocated.
    #[inline]
    fn defuse(self) {
        core::mem::forget(self);
    }
}

impl<S: Storage> Drop for FreeGuard<'_, S> {
    fn drop(&mut self) {
        // SAFETY:
        // 1. Guaranteed by the caller of `FreeGuard::new`
        unsafe {
            self.storage.free(self.layout);
        }
    }
}
