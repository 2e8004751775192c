//! Per-type operation tables for type-erased payloads.
//!
//! An [`OperationTable`] stores the function pointers needed to default
//! construct, destroy, copy and move a value whose concrete type has been
//! erased. Tables are built once per payload type and capability flavor as
//! `&'static` references, so every container holding a `T` points to the
//! same table instead of carrying its own dispatch data.
//!
//! # Capability flavors
//!
//! Rust cannot ask at runtime whether a type implements [`Clone`] or
//! [`Default`]. Instead, the bound is checked when the table is created:
//!
//! | Constructor                               | default | copy  |
//! |-------------------------------------------|---------|-------|
//! | [`OperationTable::of`]                    | absent  | absent|
//! | [`OperationTable::of_cloneable`]          | absent  | set   |
//! | [`OperationTable::of_default`]            | set     | absent|
//! | [`OperationTable::of_cloneable_default`]  | set     | set   |
//!
//! Destruct, move-construct and move-assign are always present since every
//! Rust type can be relocated bitwise.
//!
//! # Absent slots
//!
//! Invoking an absent slot is a silent no-op. The wrappers return whether
//! the operation ran so that callers can keep track of which addresses hold
//! live values, but no error is raised. Containers rely on this to degrade
//! quietly when a payload that cannot be copied is reached through a
//! container that otherwise supports copying.
//!
//! # Safety Invariant
//!
//! The function pointers in a table are always instantiated with the same
//! type `T` as the table's `layout` and `type_info`. This is guaranteed by
//! keeping the fields private to this module and only creating tables via
//! the constructors below.

use core::{alloc::Layout, ptr::NonNull};

use crate::type_info::TypeInfo;

/// Operation taking a single payload address.
type UnaryOp = unsafe fn(NonNull<u8>);

/// Operation taking a destination and a source payload address.
type BinaryOp = unsafe fn(NonNull<u8>, NonNull<u8>);

/// Table of type-erased operations for a single payload type.
///
/// # Safety Invariant
///
/// All function pointers stored in this table were instantiated with the
/// payload type `T` that was used to create it, and `layout` is
/// `Layout::new::<T>()`.
#[derive(Clone, Copy)]
pub struct OperationTable {
    /// Layout of the payload type
    layout: Layout,
    /// Gets the [`TypeInfo`] of the payload type
    type_info: fn() -> TypeInfo,
    /// Writes `T::default()` to an uninitialized address, if supported
    default_construct: Option<UnaryOp>,
    /// Drops the value at an address in place
    destruct: UnaryOp,
    /// Clones the source into an uninitialized destination, if supported
    copy_construct: Option<BinaryOp>,
    /// Clones the source into an initialized destination, if supported
    copy_assign: Option<BinaryOp>,
    /// Relocates the source into an uninitialized destination
    move_construct: BinaryOp,
    /// Relocates the source into an initialized destination
    move_assign: BinaryOp,
}

impl OperationTable {
    /// Creates the table for `T` with destruct and move operations only.
    ///
    /// Calling this repeatedly for the same `T` returns the same `'static`
    /// reference.
    #[must_use]
    pub const fn of<T: 'static>() -> &'static Self {
        const { &Self::base::<T>() }
    }

    /// Creates the table for `T` with copy operations present.
    #[must_use]
    pub const fn of_cloneable<T: Clone + 'static>() -> &'static Self {
        const {
            &Self {
                copy_construct: Some(copy_construct::<T>),
                copy_assign: Some(copy_assign::<T>),
                ..Self::base::<T>()
            }
        }
    }

    /// Creates the table for `T` with default construction present.
    #[must_use]
    pub const fn of_default<T: Default + 'static>() -> &'static Self {
        const {
            &Self {
                default_construct: Some(default_construct::<T>),
                ..Self::base::<T>()
            }
        }
    }

    /// Creates the table for `T` with every slot present.
    #[must_use]
    pub const fn of_cloneable_default<T: Clone + Default + 'static>() -> &'static Self {
        const {
            &Self {
                default_construct: Some(default_construct::<T>),
                copy_construct: Some(copy_construct::<T>),
                copy_assign: Some(copy_assign::<T>),
                ..Self::base::<T>()
            }
        }
    }

    /// The slots every type supports.
    const fn base<T: 'static>() -> Self {
        Self {
            layout: Layout::new::<T>(),
            type_info: TypeInfo::of::<T>,
            default_construct: None,
            destruct: destruct::<T>,
            copy_construct: None,
            copy_assign: None,
            move_construct: move_construct::<T>,
            move_assign: move_assign::<T>,
        }
    }

    /// Returns the layout of the payload type.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Returns the size in bytes of the payload type.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Returns the [`TypeInfo`] of the payload type.
    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        (self.type_info)()
    }

    /// Returns whether the default-construct slot is present.
    #[inline]
    #[must_use]
    pub fn can_default_construct(&self) -> bool {
        self.default_construct.is_some()
    }

    /// Returns whether the copy-construct slot is present.
    #[inline]
    #[must_use]
    pub fn can_copy_construct(&self) -> bool {
        self.copy_construct.is_some()
    }

    /// Returns whether the copy-assign slot is present.
    #[inline]
    #[must_use]
    pub fn can_copy_assign(&self) -> bool {
        self.copy_assign.is_some()
    }

    /// Writes a default value to `dest`. Returns `false` without touching
    /// `dest` if the slot is absent.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `dest` is valid for writes of [`Self::layout`] and properly
    ///    aligned.
    /// 2. `dest` does not hold a live value, or the caller accepts that it
    ///    is overwritten without being dropped.
    #[inline]
    pub unsafe fn default_construct(&self, dest: NonNull<u8>) -> bool {
        let Some(default_construct) = self.default_construct else {
            trace_event!(type_name = self.type_info().name(), "default-construct slot absent");
            return false;
        };
        // SAFETY: The slot was instantiated with the payload type of this table.
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe {
            default_construct(dest);
        }
        true
    }

    /// Drops the value at `ptr` in place.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `ptr` points to a live value of the payload type of this table.
    /// 2. The value is not used again after this call, except to be
    ///    overwritten.
    #[inline]
    pub unsafe fn destruct(&self, ptr: NonNull<u8>) {
        // SAFETY: `self.destruct` points to `destruct::<T>` below, whose
        // requirements are upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe {
            (self.destruct)(ptr);
        }
    }

    /// Clones the value at `src` into the uninitialized `dest`. Returns
    /// `false` without touching `dest` if the slot is absent.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `src` points to a live value of the payload type of this table.
    /// 2. `dest` is valid for writes of [`Self::layout`], properly aligned,
    ///    and does not overlap `src`.
    #[inline]
    pub unsafe fn copy_construct(&self, dest: NonNull<u8>, src: NonNull<u8>) -> bool {
        let Some(copy_construct) = self.copy_construct else {
            trace_event!(type_name = self.type_info().name(), "copy-construct slot absent");
            return false;
        };
        // SAFETY: The slot was instantiated with the payload type of this table.
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe {
            copy_construct(dest, src);
        }
        true
    }

    /// Clones the value at `src` into the live value at `dest`. Returns
    /// `false` and leaves `dest` unchanged if the slot is absent.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. Both `src` and `dest` point to live values of the payload type of
    ///    this table.
    /// 2. `dest` is not aliased for the duration of the call, and does not
    ///    overlap `src`.
    #[inline]
    pub unsafe fn copy_assign(&self, dest: NonNull<u8>, src: NonNull<u8>) -> bool {
        let Some(copy_assign) = self.copy_assign else {
            trace_event!(type_name = self.type_info().name(), "copy-assign slot absent");
            return false;
        };
        // SAFETY: The slot was instantiated with the payload type of this table.
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe {
            copy_assign(dest, src);
        }
        true
    }

    /// Relocates the value at `src` into the uninitialized `dest`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `src` points to a live value of the payload type of this table.
    /// 2. `dest` is valid for writes of [`Self::layout`], properly aligned,
    ///    and does not overlap `src`.
    /// 3. The value at `src` is treated as moved-out afterwards: it must not
    ///    be read or dropped again.
    #[inline]
    pub unsafe fn move_construct(&self, dest: NonNull<u8>, src: NonNull<u8>) {
        // SAFETY: `self.move_construct` points to `move_construct::<T>` below,
        // whose requirements are upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. Guaranteed by the caller
        unsafe {
            (self.move_construct)(dest, src);
        }
    }

    /// Drops the live value at `dest` and relocates the value at `src` into
    /// its place.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. Both `src` and `dest` point to live values of the payload type of
    ///    this table.
    /// 2. `dest` is not aliased for the duration of the call, and does not
    ///    overlap `src`.
    /// 3. The value at `src` is treated as moved-out afterwards: it must not
    ///    be read or dropped again.
    #[inline]
    pub unsafe fn move_assign(&self, dest: NonNull<u8>, src: NonNull<u8>) {
        // SAFETY: `self.move_assign` points to `move_assign::<T>` below, whose
        // requirements are upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. Guaranteed by the caller
        unsafe {
            (self.move_assign)(dest, src);
        }
    }
}

impl core::fmt::Debug for OperationTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OperationTable")
            .field("type_info", &self.type_info())
            .field("size", &self.layout.size())
            .field("align", &self.layout.align())
            .field("default_construct", &self.can_default_construct())
            .field("copy_construct", &self.can_copy_construct())
            .field("copy_assign", &self.can_copy_assign())
            .finish()
    }
}

/// Writes `T::default()` to `dest`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `dest` is valid for writes of `T` and properly aligned.
unsafe fn default_construct<T: Default>(dest: NonNull<u8>) {
    let value = T::default();
    // SAFETY:
    // 1. Guaranteed by the caller
    unsafe {
        dest.cast::<T>().write(value);
    }
}

/// Drops the `T` at `ptr` in place.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `ptr` points to a live `T` that is not used again.
unsafe fn destruct<T>(ptr: NonNull<u8>) {
    // SAFETY:
    // 1. Guaranteed by the caller
    unsafe {
        ptr.cast::<T>().drop_in_place();
    }
}

/// Writes a clone of the `T` at `src` to `dest`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `src` points to a live `T`.
/// 2. `dest` is valid for writes of `T`, properly aligned and disjoint from
///    `src`.
unsafe fn copy_construct<T: Clone>(dest: NonNull<u8>, src: NonNull<u8>) {
    // SAFETY:
    // 1. Guaranteed by the caller
    let src: &T = unsafe { src.cast::<T>().as_ref() };
    let value = src.clone();
    // SAFETY:
    // 2. Guaranteed by the caller
    unsafe {
        dest.cast::<T>().write(value);
    }
}

/// Clones the `T` at `src` into the `T` at `dest` with [`Clone::clone_from`].
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `src` and `dest` point to live, disjoint values of type `T`.
/// 2. `dest` is not aliased for the duration of the call.
unsafe fn copy_assign<T: Clone>(dest: NonNull<u8>, src: NonNull<u8>) {
    // SAFETY:
    // 1. Guaranteed by the caller
    let src: &T = unsafe { src.cast::<T>().as_ref() };
    // SAFETY:
    // 1. Guaranteed by the caller
    // 2. Guaranteed by the caller
    let dest: &mut T = unsafe { dest.cast::<T>().as_mut() };
    dest.clone_from(src);
}

/// Moves the `T` at `src` into the uninitialized `dest`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `src` points to a live `T` that is treated as moved-out afterwards.
/// 2. `dest` is valid for writes of `T`, properly aligned and disjoint from
///    `src`.
unsafe fn move_construct<T>(dest: NonNull<u8>, src: NonNull<u8>) {
    // SAFETY:
    // 1. Guaranteed by the caller
    let value: T = unsafe { src.cast::<T>().read() };
    // SAFETY:
    // 2. Guaranteed by the caller
    unsafe {
        dest.cast::<T>().write(value);
    }
}

/// Moves the `T` at `src` over the live `T` at `dest`, dropping the latter.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `src` points to a live `T` that is treated as moved-out afterwards.
/// 2. `dest` points to a live `T`, disjoint from `src` and not aliased for
///    the duration of the call.
unsafe fn move_assign<T>(dest: NonNull<u8>, src: NonNull<u8>) {
    // SAFETY:
    // 1. Guaranteed by the caller
    let value: T = unsafe { src.cast::<T>().read() };
    // SAFETY:
    // 2. Guaranteed by the caller
    let dest: &mut T = unsafe { dest.cast::<T>().as_mut() };
    *dest = value;
}

#[cfg(test)]
mod tests {
    use alloc::{string::String, vec::Vec};
    use core::{cell::Cell, mem::MaybeUninit};

    use super::*;

    #[derive(Default)]
    struct NotClone(#[allow(dead_code)] u64);

    #[test]
    fn test_operation_table_is_shared() {
        let a = OperationTable::of::<i32>();
        let b = OperationTable::of::<i32>();
        assert!(core::ptr::eq(a, b));

        let a = OperationTable::of_cloneable::<String>();
        let b = OperationTable::of_cloneable::<String>();
        assert!(core::ptr::eq(a, b));

        // Different flavors describe the same type consistently.
        let plain = OperationTable::of::<String>();
        let full = OperationTable::of_cloneable_default::<String>();
        assert_eq!(plain.type_info(), full.type_info());
        assert_eq!(plain.layout(), full.layout());
    }

    #[test]
    fn test_operation_table_slots() {
        let plain = OperationTable::of::<NotClone>();
        assert!(!plain.can_default_construct());
        assert!(!plain.can_copy_construct());
        assert!(!plain.can_copy_assign());

        let default = OperationTable::of_default::<NotClone>();
        assert!(default.can_default_construct());
        assert!(!default.can_copy_construct());

        let cloneable = OperationTable::of_cloneable::<String>();
        assert!(!cloneable.can_default_construct());
        assert!(cloneable.can_copy_construct());
        assert!(cloneable.can_copy_assign());

        let full = OperationTable::of_cloneable_default::<String>();
        assert!(full.can_default_construct());
        assert!(full.can_copy_construct());
        assert!(full.can_copy_assign());
    }

    #[test]
    fn test_operation_table_layout() {
        let table = OperationTable::of::<[u64; 3]>();
        assert_eq!(table.size(), 24);
        assert_eq!(table.layout(), Layout::new::<[u64; 3]>());
        assert_eq!(table.type_info(), TypeInfo::of::<[u64; 3]>());
    }

    #[test]
    fn test_operation_table_copy_and_move() {
        let table = OperationTable::of_cloneable_default::<Vec<u32>>();

        let mut src = MaybeUninit::new(alloc::vec![1, 2, 3]);
        let mut dest = MaybeUninit::<Vec<u32>>::uninit();
        let src_ptr = NonNull::from(&mut src).cast::<u8>();
        let dest_ptr = NonNull::from(&mut dest).cast::<u8>();

        // SAFETY: `src` is live, `dest` is uninitialized and both have the layout
        // of `Vec<u32>`.
        let copied = unsafe { table.copy_construct(dest_ptr, src_ptr) };
        assert!(copied);
        // SAFETY: Initialized by the copy above.
        assert_eq!(unsafe { dest.assume_init_ref() }, &[1, 2, 3]);

        // SAFETY: `dest` is live, `src` is live and will not be used again.
        unsafe { table.move_assign(dest_ptr, src_ptr) };
        // SAFETY: Initialized by the move above.
        let moved = unsafe { dest.assume_init_read() };
        assert_eq!(moved, [1, 2, 3]);

        let mut default = MaybeUninit::<Vec<u32>>::uninit();
        // SAFETY: `default` is uninitialized and has the layout of `Vec<u32>`.
        let constructed =
            unsafe { table.default_construct(NonNull::from(&mut default).cast::<u8>()) };
        assert!(constructed);
        // SAFETY: Initialized by the default construction above.
        assert!(unsafe { default.assume_init_read() }.is_empty());
    }

    #[test]
    fn test_operation_table_absent_slots_are_noops() {
        let table = OperationTable::of::<NotClone>();

        let mut src = MaybeUninit::new(NotClone(7));
        let mut dest = MaybeUninit::<NotClone>::uninit();
        let src_ptr = NonNull::from(&mut src).cast::<u8>();
        let dest_ptr = NonNull::from(&mut dest).cast::<u8>();

        // SAFETY: `src` is live and `dest` is writable.
        assert!(!unsafe { table.copy_construct(dest_ptr, src_ptr) });
        // SAFETY: Same as above, the absent slot does not touch either pointer.
        assert!(!unsafe { table.copy_assign(dest_ptr, src_ptr) });
        // SAFETY: `dest` is writable.
        assert!(!unsafe { table.default_construct(dest_ptr) });

        // SAFETY: `src` is live and not used afterwards.
        unsafe { table.destruct(src_ptr) };
    }

    #[test]
    fn test_operation_table_destruct_runs_drop() {
        struct Flag<'a>(&'a Cell<usize>);
        impl Drop for Flag<'_> {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        // `Flag` borrows a local, so use a leaked counter to satisfy `'static`.
        let drops: &'static Cell<usize> =
            alloc::boxed::Box::leak(alloc::boxed::Box::new(Cell::new(0)));
        let table = OperationTable::of::<Flag<'static>>();
        let mut slot = MaybeUninit::new(Flag(drops));

        // SAFETY: `slot` holds a live `Flag` which is not used afterwards.
        unsafe { table.destruct(NonNull::from(&mut slot).cast::<u8>()) };
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_send_sync() {
        static_assertions::assert_impl_all!(OperationTable: Send, Sync);
    }
}
