use core::{alloc::Layout, any::type_name};

use anyhold_internals::{
    HeapStorage, InlineStorage, OperationTable, RawAny, SmallStorage, Storage,
    type_info::TypeInfo,
};

use crate::{
    error::{CapacityError, TypeMismatch},
    markers::{
        Admits, CopyAndMove, CopyPolicy, CopySupport, Copyable, Local, MoveOnly, Movable,
        NoCopyOrMove, PayloadFor, SendSync, Swappable, TransferableTo, Weakest,
    },
};

/// Limits field access to the [`AnyValue`] struct, so that its safety
/// invariants can only be broken inside this module.
mod limit_field_access {
    use core::marker::PhantomData;

    use anyhold_internals::{RawAny, SmallStorage, Storage};

    use crate::markers::{CopyAndMove, SendSync};

    /// A container holding at most one value of any type.
    ///
    /// The concrete type of the value is chosen when it is emplaced and can be
    /// queried and recovered later through [`has_type`](AnyValue::has_type),
    /// [`downcast_ref`](AnyValue::downcast_ref) and friends.
    ///
    /// # Type Parameters
    ///
    /// [`AnyValue`] has three type parameters that control its behavior:
    ///
    /// - **Storage (`S`)**: Where the payload lives
    ///   - [`SmallStorage`]: Inline for small payloads, heap otherwise
    ///     (default)
    ///   - [`HeapStorage`](anyhold_internals::HeapStorage): Always on the heap
    ///   - [`InlineStorage<N>`](anyhold_internals::InlineStorage): Always
    ///     inline, in `N` bytes
    /// - **Policy (`P`)**: Which payload transfers the container supports
    ///   - [`CopyAndMove`]: Copy and move, payloads must be [`Clone`]
    ///     (default)
    ///   - [`MoveOnly`](crate::markers::MoveOnly): Move only
    ///   - [`NoCopyOrMove`](crate::markers::NoCopyOrMove): Neither
    /// - **Thread Safety (`T`)**: Whether the container can cross threads
    ///   - [`SendSync`]: Only `Send + Sync` payloads (default)
    ///   - [`Local`](crate::markers::Local): Any `'static` payload
    ///
    /// The aliases [`HeapAny`](crate::HeapAny),
    /// [`InlineAny`](crate::InlineAny) and [`SmallAny`](crate::SmallAny) fix
    /// the storage, and [`CopyableAny`](crate::CopyableAny),
    /// [`MovableAny`](crate::MovableAny) and
    /// [`NonMovableAny`](crate::NonMovableAny) fix the policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::AnyValue;
    ///
    /// let mut value: AnyValue = AnyValue::new();
    /// assert!(!value.has_value());
    ///
    /// value.emplace(5i32);
    /// assert!(value.has_type::<i32>());
    /// assert_eq!(value.downcast_ref::<i32>(), Some(&5));
    /// assert_eq!(value.downcast_ref::<u8>(), None);
    ///
    /// value.emplace(String::from("text"));
    /// assert_eq!(value.value::<String>(), "text");
    /// ```
    ///
    /// # Unsupported payload operations
    ///
    /// A payload can end up in a copyable container without the copy
    /// operations, for instance when it was moved in from a
    /// [`MoveOnly`](crate::markers::MoveOnly) container. Copying such a
    /// container silently does nothing: a fresh copy leaves the destination
    /// empty, and an in-place copy over a value of the same type leaves the
    /// destination unchanged.
    #[repr(transparent)]
    pub struct AnyValue<S: Storage = SmallStorage, P = CopyAndMove, T = SendSync> {
        /// # Safety
        ///
        /// The following safety invariants are guaranteed to be upheld as long
        /// as this struct exists:
        ///
        /// 1. If `T = SendSync`: The payload, if any, is `Send + Sync`.
        raw: RawAny<S>,
        /// The capability policy
        _policy: PhantomData<P>,
        /// The thread-safety marker
        _thread_safety: PhantomData<T>,
    }

    impl<S: Storage, P, T> AnyValue<S, P, T> {
        /// Creates an [`AnyValue`] from a [`RawAny`].
        ///
        /// # Safety
        ///
        /// The caller must ensure:
        ///
        /// 1. If `T = SendSync`: The payload, if any, is `Send + Sync`.
        #[must_use]
        pub(crate) unsafe fn from_raw(raw: RawAny<S>) -> Self {
            // SAFETY: We must uphold the safety invariants of the raw field:
            // 1. Guaranteed by the caller
            Self {
                raw,
                _policy: PhantomData,
                _thread_safety: PhantomData,
            }
        }

        /// Consumes the [`AnyValue`] and returns the inner [`RawAny`].
        #[must_use]
        pub(crate) fn into_raw(self) -> RawAny<S> {
            // SAFETY: We are destroying `self`, so we no longer need to uphold
            // any safety invariants.
            self.raw
        }

        /// Returns the inner [`RawAny`].
        #[inline]
        pub(crate) fn as_raw(&self) -> &RawAny<S> {
            &self.raw
        }

        /// Returns the inner [`RawAny`] mutably.
        ///
        /// # Safety
        ///
        /// The caller must ensure:
        ///
        /// 1. If `T = SendSync`: No payload that is not `Send + Sync` is placed
        ///    in the container through this reference.
        #[inline]
        pub(crate) unsafe fn as_raw_mut(&mut self) -> &mut RawAny<S> {
            // SAFETY: We must uphold the safety invariants of the raw field:
            // 1. Guaranteed by the caller
            &mut self.raw
        }
    }
}

pub use limit_field_access::AnyValue;

/// A container whose payload always lives on the heap.
///
/// Swapping two of these only exchanges pointers, so they can be swapped
/// under every policy.
pub type HeapAny<P = CopyAndMove, T = SendSync> = AnyValue<HeapStorage, P, T>;

/// A container whose payload always lives in an inline buffer of `N` bytes.
///
/// The buffer is aligned to [`INLINE_ALIGN`](crate::INLINE_ALIGN) bytes, so
/// every payload of at most `N` bytes fits, `u128` included, unless its type
/// raises its alignment above that with `#[repr(align)]`.
///
/// Emplacing a value that does not fit panics, see
/// [`AnyValue::try_emplace`] for a fallible alternative.
pub type InlineAny<const N: usize, P = CopyAndMove, T = SendSync> =
    AnyValue<InlineStorage<N>, P, T>;

/// A container that keeps small payloads inline and larger ones on the heap.
pub type SmallAny<P = CopyAndMove, T = SendSync> = AnyValue<SmallStorage, P, T>;

/// A container supporting copy and move.
pub type CopyableAny<S = SmallStorage, T = SendSync> = AnyValue<S, CopyAndMove, T>;

/// A container supporting move but not copy.
pub type MovableAny<S = SmallStorage, T = SendSync> = AnyValue<S, MoveOnly, T>;

/// A container supporting neither copy nor move.
pub type NonMovableAny<S = SmallStorage, T = SendSync> = AnyValue<S, NoCopyOrMove, T>;

impl<S: Storage, P, T> AnyValue<S, P, T> {
    /// Creates an empty container.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::HeapAny;
    ///
    /// let value: HeapAny = HeapAny::new();
    /// assert!(!value.has_value());
    /// assert!(value.type_info().is_none());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        // SAFETY:
        // 1. The container is empty
        unsafe { Self::from_raw(RawAny::new()) }
    }

    /// Creates a container holding `value`.
    ///
    /// Panics if the storage cannot hold an `X`.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::MovableAny;
    ///
    /// struct Handle(u32);
    ///
    /// let value: MovableAny = MovableAny::with_value(Handle(3));
    /// assert_eq!(value.value::<Handle>().0, 3);
    /// ```
    #[track_caller]
    #[must_use]
    pub fn with_value<X>(value: X) -> Self
    where
        P: Movable + Admits<X>,
        X: PayloadFor<T>,
    {
        let mut this = Self::new();
        this.emplace(value);
        this
    }

    /// Creates a container holding `value`, recording its copy operations.
    ///
    /// Unlike [`with_value`](Self::with_value), this records the copyable
    /// table of `X` under every policy, so the payload can still be copied
    /// after it has been moved into a copyable container.
    ///
    /// Panics if the storage cannot hold an `X`.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::{CopyableAny, MovableAny};
    ///
    /// let mut source: MovableAny = MovableAny::with_cloneable(5i32);
    /// let target: CopyableAny = CopyableAny::moved_from(&mut source);
    /// assert_eq!(target.clone().value::<i32>(), &5);
    /// ```
    #[track_caller]
    #[must_use]
    pub fn with_cloneable<X>(value: X) -> Self
    where
        P: Movable,
        X: Clone + PayloadFor<T>,
    {
        let mut this = Self::new();
        this.emplace_cloneable(value);
        this
    }

    /// Creates a container holding a clone of `value`.
    ///
    /// Panics if the storage cannot hold an `X`.
    #[track_caller]
    #[must_use]
    pub fn with_clone_of<X>(value: &X) -> Self
    where
        P: Copyable + Admits<X>,
        X: Clone + PayloadFor<T>,
    {
        Self::with_value(value.clone())
    }

    /// Creates a container holding a copy of the payload of `other`.
    ///
    /// `other` may use any storage, and any policy and thread-safety marker
    /// compatible with this container. Both policies must support copying.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::{HeapAny, InlineAny};
    ///
    /// let source: InlineAny<32> = InlineAny::with_value(String::from("copy me"));
    /// let copy: HeapAny = HeapAny::copied_from(&source);
    /// assert_eq!(copy.downcast_ref::<String>(), source.downcast_ref::<String>());
    /// ```
    #[must_use]
    pub fn copied_from<S2: Storage, P2: CopyPolicy, T2>(other: &AnyValue<S2, P2, T2>) -> Self
    where
        P: Weakest<P2, Output: Copyable>,
        T2: TransferableTo<T>,
    {
        let mut this = Self::new();
        this.copy_from(other);
        this
    }

    /// Creates a container holding the payload of `other`, leaving `other`
    /// empty.
    ///
    /// `other` may use any storage, and any policy and thread-safety marker
    /// compatible with this container. Both policies must support moving.
    #[must_use]
    pub fn moved_from<S2: Storage, P2: CopyPolicy, T2>(other: &mut AnyValue<S2, P2, T2>) -> Self
    where
        P: Weakest<P2, Output: Movable>,
        T2: TransferableTo<T>,
    {
        let mut this = Self::new();
        this.move_from(other);
        this
    }

    /// Returns whether the container holds a value.
    #[inline]
    pub fn has_value(&self) -> bool {
        self.as_raw().has_value()
    }

    /// Returns whether the container holds a value of type `X`.
    #[inline]
    pub fn has_type<X: 'static>(&self) -> bool {
        self.as_raw().has_type::<X>()
    }

    /// Returns the [`TypeInfo`] of the payload, or `None` if empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::{SmallAny, TypeInfo};
    ///
    /// let value: SmallAny = SmallAny::with_value(1.5f64);
    /// assert_eq!(value.type_info(), Some(TypeInfo::of::<f64>()));
    /// assert_eq!(value.type_info().map(|info| info.name()), Some("f64"));
    /// ```
    #[inline]
    pub fn type_info(&self) -> Option<TypeInfo> {
        self.as_raw().type_info()
    }

    /// Returns the operation table recorded for the payload.
    #[inline]
    pub fn operations(&self) -> Option<&'static OperationTable> {
        self.as_raw().operations()
    }

    /// Returns the storage strategy instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::SmallAny;
    ///
    /// let small: SmallAny = SmallAny::with_value(1u8);
    /// assert!(small.storage().is_local());
    ///
    /// let large: SmallAny = SmallAny::with_value([0u64; 8]);
    /// assert!(large.storage().is_heap());
    /// ```
    #[inline]
    pub fn storage(&self) -> &S {
        self.as_raw().storage()
    }

    /// Returns the support level of this container's policy.
    #[inline]
    pub fn copy_support(&self) -> CopySupport
    where
        P: CopyPolicy,
    {
        P::SUPPORT
    }

    /// Drops the payload, if any. Idempotent.
    pub fn reset(&mut self) {
        // SAFETY:
        // 1. No payload is placed in the container
        let raw = unsafe { self.as_raw_mut() };
        raw.reset();
    }

    /// Replaces the payload with `value` and returns a reference to it.
    ///
    /// Panics if the storage cannot hold an `X`; the old payload has been
    /// dropped by then and the container is left empty.
    ///
    /// The table recorded for `X` is the one the policy admits: under
    /// [`MoveOnly`] and [`NoCopyOrMove`] it has no copy operations, even if
    /// `X` is [`Clone`]. Copying the payload after moving it into a
    /// [`CopyAndMove`] container then leaves the copy empty. Use
    /// [`emplace_cloneable`](Self::emplace_cloneable) to keep it copyable.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::NonMovableAny;
    ///
    /// let mut value: NonMovableAny = NonMovableAny::new();
    /// let counter = value.emplace(0u32);
    /// *counter += 2;
    /// assert_eq!(value.value::<u32>(), &2);
    /// ```
    #[track_caller]
    pub fn emplace<X>(&mut self, value: X) -> &mut X
    where
        P: Admits<X>,
        X: PayloadFor<T>,
    {
        // SAFETY:
        // 1. `X: PayloadFor<T>`, so `X` is `Send + Sync` if `T = SendSync`
        let raw = unsafe { self.as_raw_mut() };
        // SAFETY:
        // 1. `Admits::table` returns a table created for `X`
        unsafe { raw.emplace(value, <P as Admits<X>>::table()) }
    }

    /// Replaces the payload with `value`, recording its copy operations,
    /// and returns a reference to it.
    ///
    /// Available under every policy. The payload stays copyable wherever it
    /// is moved to later.
    ///
    /// Panics if the storage cannot hold an `X`.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::NonMovableAny;
    ///
    /// let mut value: NonMovableAny = NonMovableAny::new();
    /// value.emplace_cloneable(String::from("kept"));
    /// assert!(value.operations().is_some_and(|table| table.can_copy_construct()));
    /// ```
    #[track_caller]
    pub fn emplace_cloneable<X>(&mut self, value: X) -> &mut X
    where
        X: Clone + PayloadFor<T>,
    {
        // SAFETY:
        // 1. `X: PayloadFor<T>`, so `X` is `Send + Sync` if `T = SendSync`
        let raw = unsafe { self.as_raw_mut() };
        // SAFETY:
        // 1. The table is created for `X`
        unsafe { raw.emplace(value, OperationTable::of_cloneable::<X>()) }
    }

    /// Replaces the payload with `X::default()` and returns a reference to
    /// it.
    #[track_caller]
    pub fn emplace_default<X>(&mut self) -> &mut X
    where
        P: Admits<X>,
        X: Default + PayloadFor<T>,
    {
        self.emplace(X::default())
    }

    /// Replaces the payload with `value` if the storage can hold it.
    ///
    /// On failure the value is handed back inside the error and the
    /// container is left untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::InlineAny;
    ///
    /// let mut value: InlineAny<8> = InlineAny::with_value(1u8);
    /// assert!(value.try_emplace(2u64).is_ok());
    ///
    /// let error = value.try_emplace([1u64; 4]).unwrap_err();
    /// assert_eq!(error.into_inner(), [1u64; 4]);
    /// assert_eq!(value.downcast_ref::<u64>(), Some(&2));
    /// ```
    pub fn try_emplace<X>(&mut self, value: X) -> Result<&mut X, CapacityError<X>>
    where
        P: Admits<X>,
        X: PayloadFor<T>,
    {
        if S::can_hold(Layout::new::<X>()) {
            Ok(self.emplace(value))
        } else {
            Err(CapacityError::new(value))
        }
    }

    /// Assigns `value` to the payload.
    ///
    /// If the container already holds an `X`, it is overwritten in place
    /// without touching the storage. Otherwise this is
    /// [`emplace`](Self::emplace).
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::SmallAny;
    ///
    /// let mut value: SmallAny = SmallAny::new();
    /// value.assign(5i32);
    /// value.reset();
    /// value.assign(7i32);
    /// assert_eq!(value.value::<i32>(), &7);
    /// ```
    #[track_caller]
    pub fn assign<X>(&mut self, value: X)
    where
        P: Movable + Admits<X>,
        X: PayloadFor<T>,
    {
        // SAFETY:
        // 1. `X: PayloadFor<T>`, so `X` is `Send + Sync` if `T = SendSync`
        let raw = unsafe { self.as_raw_mut() };
        // SAFETY:
        // 1. `Admits::table` returns a table created for `X`
        unsafe { raw.assign(value, <P as Admits<X>>::table()) }
    }

    /// Assigns `value` to the payload, recording its copy operations if it
    /// has to be emplaced.
    ///
    /// This is [`assign`](Self::assign) with the table of
    /// [`emplace_cloneable`](Self::emplace_cloneable).
    #[track_caller]
    pub fn assign_cloneable<X>(&mut self, value: X)
    where
        P: Movable,
        X: Clone + PayloadFor<T>,
    {
        // SAFETY:
        // 1. `X: PayloadFor<T>`, so `X` is `Send + Sync` if `T = SendSync`
        let raw = unsafe { self.as_raw_mut() };
        // SAFETY:
        // 1. The table is created for `X`
        unsafe { raw.assign(value, OperationTable::of_cloneable::<X>()) }
    }

    /// Assigns a clone of `value` to the payload.
    ///
    /// If the container already holds an `X`, it is updated in place with
    /// [`Clone::clone_from`]. Otherwise a clone is emplaced.
    #[track_caller]
    pub fn assign_cloned<X>(&mut self, value: &X)
    where
        P: Copyable + Admits<X>,
        X: Clone + PayloadFor<T>,
    {
        // SAFETY:
        // 1. `X: PayloadFor<T>`, so `X` is `Send + Sync` if `T = SendSync`
        let raw = unsafe { self.as_raw_mut() };
        // SAFETY:
        // 1. `Admits::table` returns a table created for `X`
        unsafe { raw.assign_cloned(value, <P as Admits<X>>::table()) }
    }

    /// Makes this container hold a copy of the payload of `other`.
    ///
    /// When both hold the same type, the payload is updated in place with
    /// [`Clone::clone_from`]. Otherwise the current payload is dropped and a
    /// clone of the other payload is created in fresh storage. Copying an
    /// empty container empties this one.
    ///
    /// Panics if this container's storage cannot hold the other payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::{HeapAny, SmallAny};
    ///
    /// let source: HeapAny = HeapAny::with_value(vec![1, 2, 3]);
    /// let mut target: SmallAny = SmallAny::with_value('x');
    /// target.copy_from(&source);
    /// assert_eq!(target.value::<Vec<i32>>(), &[1, 2, 3]);
    /// assert!(source.has_value());
    /// ```
    #[track_caller]
    pub fn copy_from<S2: Storage, P2: CopyPolicy, T2>(&mut self, other: &AnyValue<S2, P2, T2>)
    where
        P: Weakest<P2, Output: Copyable>,
        T2: TransferableTo<T>,
    {
        // SAFETY:
        // 1. `T2: TransferableTo<T>`, so if `T = SendSync` then `T2 = SendSync`,
        //    and the copied payload is `Send + Sync`
        let raw = unsafe { self.as_raw_mut() };
        raw.copy_from(other.as_raw());
    }

    /// Moves the payload of `other` into this container, leaving `other`
    /// empty.
    ///
    /// Panics if this container's storage cannot hold the other payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::{InlineAny, MovableAny, markers::MoveOnly};
    ///
    /// let mut source: InlineAny<32, MoveOnly> = InlineAny::with_value(String::from("moving"));
    /// let mut target: MovableAny = MovableAny::new();
    /// target.move_from(&mut source);
    /// assert!(!source.has_value());
    /// assert_eq!(target.value::<String>(), "moving");
    /// ```
    #[track_caller]
    pub fn move_from<S2: Storage, P2: CopyPolicy, T2>(&mut self, other: &mut AnyValue<S2, P2, T2>)
    where
        P: Weakest<P2, Output: Movable>,
        T2: TransferableTo<T>,
    {
        // SAFETY:
        // 1. `T2: TransferableTo<T>`, so if `T = SendSync` then `T2 = SendSync`,
        //    and the moved payload is `Send + Sync`
        let raw = unsafe { self.as_raw_mut() };
        // SAFETY:
        // 1. Only removes the payload of `other`
        let other_raw = unsafe { other.as_raw_mut() };
        raw.move_from(other_raw);
    }

    /// Exchanges the payloads of two containers.
    ///
    /// Storages that can swap by reference exchange their contents directly;
    /// otherwise the payloads are relocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::SmallAny;
    ///
    /// let mut a: SmallAny = SmallAny::with_value(1u8);
    /// let mut b: SmallAny = SmallAny::with_value(String::from("b"));
    /// a.swap(&mut b);
    /// assert!(a.has_type::<String>());
    /// assert_eq!(b.value::<u8>(), &1);
    /// ```
    pub fn swap(&mut self, other: &mut Self)
    where
        P: Swappable<S>,
    {
        // SAFETY:
        // 1. Both containers have the same thread-safety marker
        let raw = unsafe { self.as_raw_mut() };
        // SAFETY:
        // 1. Both containers have the same thread-safety marker
        let other_raw = unsafe { other.as_raw_mut() };
        raw.swap(other_raw);
    }

    /// Returns a reference to the payload as `X`.
    ///
    /// Panics if the container is empty or holds another type. Use
    /// [`downcast_ref`](Self::downcast_ref) for a non-panicking variant.
    #[track_caller]
    pub fn value<X: 'static>(&self) -> &X {
        match self.downcast_ref::<X>() {
            Some(value) => value,
            None => self.wrong_type::<X>(),
        }
    }

    /// Returns a mutable reference to the payload as `X`.
    ///
    /// Panics if the container is empty or holds another type. Use
    /// [`downcast_mut`](Self::downcast_mut) for a non-panicking variant.
    #[track_caller]
    pub fn value_mut<X: 'static>(&mut self) -> &mut X {
        if !self.has_type::<X>() {
            self.wrong_type::<X>();
        }
        // SAFETY:
        // 1. The payload was checked to be an `X` just above
        unsafe { self.value_unchecked_mut::<X>() }
    }

    /// Panics with a message describing a failed typed access.
    #[cold]
    #[track_caller]
    fn wrong_type<X: 'static>(&self) -> ! {
        match self.type_info() {
            Some(found) => panic!(
                "container holds a value of type {found}, not {}",
                type_name::<X>()
            ),
            None => panic!(
                "container is empty, expected a value of type {}",
                type_name::<X>()
            ),
        }
    }

    /// Returns a reference to the payload as `X` without checking its type.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The container holds a value of type `X`.
    #[inline]
    pub unsafe fn value_unchecked<X: 'static>(&self) -> &X {
        // SAFETY:
        // 1. Guaranteed by the caller
        unsafe { self.as_raw().value_unchecked::<X>() }
    }

    /// Returns a mutable reference to the payload as `X` without checking
    /// its type.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The container holds a value of type `X`.
    #[inline]
    pub unsafe fn value_unchecked_mut<X: 'static>(&mut self) -> &mut X {
        // SAFETY:
        // 1. The payload keeps its type, so no new payload is placed
        let raw = unsafe { self.as_raw_mut() };
        // SAFETY:
        // 1. Guaranteed by the caller
        unsafe { raw.value_unchecked_mut::<X>() }
    }

    /// Returns a reference to the payload if it is of type `X`.
    #[inline]
    pub fn downcast_ref<X: 'static>(&self) -> Option<&X> {
        self.as_raw().downcast_ref::<X>()
    }

    /// Returns a mutable reference to the payload if it is of type `X`.
    #[inline]
    pub fn downcast_mut<X: 'static>(&mut self) -> Option<&mut X> {
        // SAFETY:
        // 1. The payload keeps its type, so no new payload is placed
        let raw = unsafe { self.as_raw_mut() };
        raw.downcast_mut::<X>()
    }

    /// Moves the payload out if it is of type `X`, leaving the container
    /// empty.
    ///
    /// If the payload has another type, or the container is empty, nothing
    /// changes and the error describes what was found.
    pub fn take<X: 'static>(&mut self) -> Result<X, TypeMismatch>
    where
        P: Movable,
    {
        let found = self.type_info();
        // SAFETY:
        // 1. No payload is placed in the container
        let raw = unsafe { self.as_raw_mut() };
        raw.take::<X>()
            .ok_or_else(|| TypeMismatch::new(TypeInfo::of::<X>(), found))
    }

    /// Converts this container into one that is not `Send + Sync`.
    #[must_use]
    pub fn into_local(self) -> AnyValue<S, P, Local> {
        let raw = self.into_raw();
        // SAFETY:
        // 1. `T = Local`, so there is nothing to uphold
        unsafe { AnyValue::from_raw(raw) }
    }
}

impl<S: Storage, P> AnyValue<S, P, Local> {
    /// Replaces the payload with a default value created through `table`.
    ///
    /// This is how containers are filled from tables found in the
    /// [`registry`](crate::registry), without naming the type statically.
    /// Returns `false`, leaving the container empty, if the table has no
    /// default-construct operation.
    ///
    /// Panics if the storage cannot hold the table's type.
    ///
    /// # Examples
    ///
    /// ```
    /// use anyhold::{OperationTable, SmallAny, markers::{CopyAndMove, Local}};
    ///
    /// let mut value: SmallAny<CopyAndMove, Local> = SmallAny::new();
    /// assert!(value.emplace_default_from(OperationTable::of_cloneable_default::<String>()));
    /// assert_eq!(value.value::<String>(), "");
    ///
    /// assert!(!value.emplace_default_from(OperationTable::of::<u8>()));
    /// assert!(!value.has_value());
    /// ```
    #[track_caller]
    pub fn emplace_default_from(&mut self, table: &'static OperationTable) -> bool {
        // SAFETY:
        // 1. `T = Local`, so there is nothing to uphold
        let raw = unsafe { self.as_raw_mut() };
        raw.emplace_default_from(table)
    }
}

impl<S: Storage, P, T> Default for AnyValue<S, P, T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage, T> Clone for AnyValue<S, CopyAndMove, T> {
    fn clone(&self) -> Self {
        let mut raw = RawAny::new();
        raw.copy_from(self.as_raw());
        // SAFETY:
        // 1. The payload is a copy of the payload of `self`, which has the same
        //    thread-safety marker
        unsafe { Self::from_raw(raw) }
    }

    fn clone_from(&mut self, source: &Self) {
        // SAFETY:
        // 1. The payload is a copy of the payload of `source`, which has the
        //    same thread-safety marker
        let raw = unsafe { self.as_raw_mut() };
        raw.copy_from(source.as_raw());
    }
}

impl<S: Storage + core::fmt::Debug, P, T> core::fmt::Debug for AnyValue<S, P, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AnyValue")
            .field("type", &self.type_info().map(|info| info.name()))
            .field("storage", self.storage())
            .finish()
    }
}

// SAFETY: The payload of a `SendSync` container is `Send + Sync`, guaranteed
// by the safety invariant of the raw field. The storage and policy are sent
// along with it and are `Send` by the bounds.
unsafe impl<S: Storage + Send, P: Send> Send for AnyValue<S, P, SendSync> {}

// SAFETY: The payload of a `SendSync` container is `Send + Sync`, guaranteed
// by the safety invariant of the raw field. A shared container only hands out
// shared references to the payload, and the storage and policy are `Sync` by
// the bounds.
unsafe impl<S: Storage + Sync, P: Sync> Sync for AnyValue<S, P, SendSync> {}

#[cfg(test)]
mod tests {
    use alloc::{format, rc::Rc, string::String, vec::Vec};

    use super::*;

    #[test]
    fn test_send_sync() {
        static_assertions::assert_impl_all!(AnyValue: Send, Sync);
        static_assertions::assert_impl_all!(HeapAny<MoveOnly>: Send, Sync);
        static_assertions::assert_impl_all!(InlineAny<16, NoCopyOrMove>: Send, Sync);
        static_assertions::assert_not_impl_any!(SmallAny<CopyAndMove, Local>: Send, Sync);
        static_assertions::assert_not_impl_any!(HeapAny<MoveOnly, Local>: Send, Sync);
    }

    #[test]
    fn test_clone_only_for_copyable() {
        static_assertions::assert_impl_all!(CopyableAny: Clone);
        static_assertions::assert_impl_all!(CopyableAny<HeapStorage, Local>: Clone);
        static_assertions::assert_not_impl_any!(MovableAny: Clone);
        static_assertions::assert_not_impl_any!(NonMovableAny: Clone);
    }

    #[test]
    fn test_scenario_all_storages() {
        fn run<S: Storage>() {
            let mut value = AnyValue::<S, CopyAndMove, SendSync>::new();
            value.assign(5i32);
            assert_eq!(value.value::<i32>(), &5);
            value.reset();
            assert!(!value.has_value());
            assert!(value.downcast_ref::<i32>().is_none());
            value.assign(7i32);
            assert!(value.has_type::<i32>());
            assert_eq!(value.value::<i32>(), &7);
        }

        run::<HeapStorage>();
        run::<InlineStorage<4>>();
        run::<SmallStorage>();
    }

    #[test]
    fn test_clone_and_clone_from() {
        let original: SmallAny = SmallAny::with_value(String::from("one"));
        let copy = original.clone();
        assert_eq!(copy.value::<String>(), "one");

        let mut target: SmallAny = SmallAny::with_value(3u8);
        target.clone_from(&original);
        assert_eq!(target.value::<String>(), "one");

        let empty: SmallAny = SmallAny::new();
        target.clone_from(&empty);
        assert!(!target.has_value());
    }

    #[test]
    fn test_moved_from_empties_source() {
        let mut source: InlineAny<32> = InlineAny::with_value(Vec::from([1u8, 2]));
        let target: HeapAny<MoveOnly> = HeapAny::moved_from(&mut source);
        assert!(!source.has_value());
        assert_eq!(target.value::<Vec<u8>>(), &[1, 2]);
    }

    #[test]
    fn test_move_only_payload_in_copyable_container() {
        struct NotClone(u8);

        let mut source: MovableAny = MovableAny::with_value(NotClone(4));
        let mut target: CopyableAny = CopyableAny::new();
        target.move_from(&mut source);
        assert_eq!(target.value::<NotClone>().0, 4);

        // The payload has no copy operations, so copying degrades silently.
        let copy = target.clone();
        assert!(!copy.has_value());
        let mut other: CopyableAny = CopyableAny::with_value(1u8);
        other.copy_from(&target);
        assert!(!other.has_value());
    }

    #[test]
    fn test_cloneable_payload_stays_copyable_across_policies() {
        let mut source: MovableAny = MovableAny::with_cloneable(5i32);
        let mut target: CopyableAny = CopyableAny::new();
        target.move_from(&mut source);
        assert!(!source.has_value());

        let copy = target.clone();
        assert_eq!(copy.value::<i32>(), &5);
        let mut other: CopyableAny<HeapStorage> = CopyableAny::with_value(String::new());
        other.copy_from(&target);
        assert_eq!(other.value::<i32>(), &5);

        let mut pinned: NonMovableAny<HeapStorage> = NonMovableAny::new();
        pinned.emplace_cloneable(8i32);
        let mut movable: MovableAny = MovableAny::new();
        movable.assign_cloneable(9i32);
        movable.assign_cloneable(10i32);
        assert_eq!(movable.value::<i32>(), &10);
        let tables = [pinned.operations(), movable.operations(), copy.operations()];
        assert!(
            tables
                .iter()
                .all(|table| table.is_some_and(OperationTable::can_copy_construct))
        );
    }

    #[test]
    fn test_plain_emplace_records_move_only_table() {
        let mut source: MovableAny = MovableAny::with_value(5i32);
        assert!(
            !source
                .operations()
                .is_some_and(OperationTable::can_copy_construct)
        );
        let target: CopyableAny = CopyableAny::moved_from(&mut source);
        assert!(!target.clone().has_value());
    }

    #[test]
    fn test_inline_holds_sixteen_byte_aligned() {
        let value: InlineAny<16> = InlineAny::with_value(u128::MAX);
        assert_eq!(value.value::<u128>(), &u128::MAX);
    }

    #[test]
    fn test_default_container_is_three_words() {
        let word = core::mem::size_of::<usize>();
        assert_eq!(core::mem::size_of::<SmallAny>(), 3 * word);
        assert_eq!(core::mem::size_of::<HeapAny>(), 2 * word);
    }

    #[test]
    fn test_local_payloads() {
        let shared = Rc::new(5u8);
        let mut value: SmallAny<CopyAndMove, Local> = SmallAny::with_clone_of(&shared);
        assert_eq!(Rc::strong_count(&shared), 2);

        let copy = value.clone();
        assert_eq!(Rc::strong_count(&shared), 3);
        drop(copy);
        value.reset();
        assert_eq!(Rc::strong_count(&shared), 1);
    }

    #[test]
    fn test_send_sync_into_local() {
        let mut sendable: SmallAny = SmallAny::with_value(9u16);
        let mut local: SmallAny<CopyAndMove, Local> = SmallAny::new();
        local.copy_from(&sendable);
        local.move_from(&mut sendable);
        assert!(!sendable.has_value());

        let converted: SmallAny<CopyAndMove, Local> =
            SmallAny::<CopyAndMove, SendSync>::with_value(1u32).into_local();
        assert_eq!(converted.value::<u32>(), &1);
        assert_eq!(local.value::<u16>(), &9);
    }

    #[test]
    fn test_take() {
        let mut value: SmallAny = SmallAny::with_value(String::from("owned"));
        let error = value.take::<u8>().unwrap_err();
        assert_eq!(error.expected(), TypeInfo::of::<u8>());
        assert_eq!(error.found(), Some(TypeInfo::of::<String>()));
        assert_eq!(value.take::<String>().as_deref(), Ok("owned"));
        assert_eq!(value.take::<String>().unwrap_err().found(), None);
    }

    #[test]
    fn test_try_emplace_leaves_container_untouched() {
        let mut value: InlineAny<8> = InlineAny::with_value(2u32);
        let error = value.try_emplace([0u8; 9]).unwrap_err();
        assert_eq!(error.size(), 9);
        assert_eq!(value.value::<u32>(), &2);
    }

    #[test]
    fn test_copy_support() {
        let copyable: CopyableAny<HeapStorage> = CopyableAny::new();
        let movable: MovableAny<HeapStorage> = MovableAny::new();
        let pinned: NonMovableAny<HeapStorage> = NonMovableAny::new();
        assert_eq!(copyable.copy_support(), CopySupport::CopyAndMove);
        assert_eq!(movable.copy_support(), CopySupport::Move);
        assert_eq!(pinned.copy_support(), CopySupport::None);
    }

    #[test]
    fn test_non_movable_heap_swap() {
        let mut a: HeapAny<NoCopyOrMove> = HeapAny::new();
        let mut b: HeapAny<NoCopyOrMove> = HeapAny::new();
        a.emplace(1u8);
        b.emplace_default::<String>();
        a.swap(&mut b);
        assert!(a.has_type::<String>());
        assert_eq!(b.value::<u8>(), &1);
    }

    #[test]
    fn test_debug() {
        let value: HeapAny = HeapAny::with_value(1u8);
        let debug = format!("{value:?}");
        assert!(debug.starts_with("AnyValue { type: Some(\"u8\")"));
    }

    #[test]
    #[should_panic(expected = "container is empty, expected a value of type u32")]
    fn test_value_on_empty_panics() {
        let value: SmallAny = SmallAny::new();
        let _ = value.value::<u32>();
    }

    #[test]
    #[should_panic(expected = "container holds a value of type u8, not u32")]
    fn test_value_on_wrong_type_panics() {
        let mut value: SmallAny = SmallAny::with_value(1u8);
        let _ = value.value_mut::<u32>();
    }

    #[test]
    #[should_panic(expected = "does not fit in an inline buffer of 4 bytes")]
    fn test_inline_overflow_panics() {
        let mut value: InlineAny<4> = InlineAny::new();
        value.emplace(1u64);
    }
}
