//! Marker types and traits for capability policies and thread safety.
//!
//! This module provides the type-level markers that appear as the second and
//! third generic parameters of [`AnyValue<S, P, T>`](crate::AnyValue). They
//! decide at compile time which operations a container offers and which
//! payloads it accepts.
//!
//! # Design Philosophy
//!
//! The constraints encoded by these markers are enforced by trait bounds on
//! the container's methods. A `MoveOnly` container has no `copy_from`, a
//! `NoCopyOrMove` container cannot adopt a value moved out of another one,
//! and an `AnyValue<_, _, SendSync>` can never hold a value that is not
//! `Send + Sync`. There is no runtime check for any of this.
//!
//! # Capability Policies
//!
//! The policy marker `P` controls which value-level transfers a container
//! supports. The policies are ordered by strength:
//!
//! - [`NoCopyOrMove`]: values are emplaced and dropped in place. Transfers
//!   between containers are unavailable.
//! - [`MoveOnly`]: values can additionally be moved in and out of the
//!   container, and containers can move-assign from one another.
//! - [`CopyAndMove`]: values must be [`Clone`], and containers can also be
//!   copied and cloned.
//!
//! An operation between two containers is available only when the weaker of
//! the two policies permits it. This is computed by [`Weakest`]:
//!
//! ```
//! use anyhold::{
//!     HeapAny, SmallAny,
//!     markers::{CopyAndMove, MoveOnly},
//! };
//!
//! let source: SmallAny<CopyAndMove> = SmallAny::with_value(7u32);
//! let mut target: HeapAny<MoveOnly> = HeapAny::new();
//!
//! // MoveOnly is the weaker policy, so moving is allowed...
//! let mut source = source;
//! target.move_from(&mut source);
//! assert_eq!(target.downcast_ref::<u32>(), Some(&7));
//! ```
//!
//! ```compile_fail
//! use anyhold::{HeapAny, SmallAny, markers::{CopyAndMove, MoveOnly}};
//!
//! let source: SmallAny<CopyAndMove> = SmallAny::with_value(7u32);
//! let mut target: HeapAny<MoveOnly> = HeapAny::new();
//!
//! // ...but copying is not, because MoveOnly cannot copy.
//! target.copy_from(&source);
//! ```
//!
//! A [`NoCopyOrMove`] payload stays where it was emplaced. It cannot be
//! moved into or out of the container:
//!
//! ```compile_fail
//! use anyhold::{MovableAny, NonMovableAny};
//!
//! let mut source: MovableAny = MovableAny::with_value(1u8);
//! let mut target: NonMovableAny = NonMovableAny::new();
//! target.move_from(&mut source);
//! ```
//!
//! ```compile_fail
//! use anyhold::{MovableAny, NonMovableAny};
//!
//! let mut source: NonMovableAny = NonMovableAny::new();
//! source.emplace(1u8);
//! let target: MovableAny = MovableAny::moved_from(&mut source);
//! ```
//!
//! ```compile_fail
//! use anyhold::NonMovableAny;
//!
//! let mut value: NonMovableAny = NonMovableAny::new();
//! value.emplace(1u8);
//! let taken = value.take::<u8>();
//! ```
//!
//! Swapping is allowed only when the storage swaps by reference, as
//! [`HeapStorage`] always does:
//!
//! ```
//! use anyhold::{HeapAny, markers::NoCopyOrMove};
//!
//! let mut a: HeapAny<NoCopyOrMove> = HeapAny::new();
//! let mut b: HeapAny<NoCopyOrMove> = HeapAny::new();
//! a.emplace(1u8);
//! a.swap(&mut b);
//! assert_eq!(b.value::<u8>(), &1);
//! ```
//!
//! ```compile_fail
//! use anyhold::{InlineAny, markers::NoCopyOrMove};
//!
//! // Inline payloads would have to be relocated.
//! let mut a: InlineAny<8, NoCopyOrMove> = InlineAny::new();
//! let mut b: InlineAny<8, NoCopyOrMove> = InlineAny::new();
//! a.swap(&mut b);
//! ```
//!
//! Whatever the policy, the container itself is an ordinary Rust value and
//! can always be moved as a whole. The policy only governs transfers of the
//! payload between containers.
//!
//! # Thread Safety Markers
//!
//! The marker `T` controls whether the container can cross thread
//! boundaries:
//!
//! - [`SendSync`]: only `Send + Sync` payloads are accepted, and the
//!   container is `Send + Sync` itself.
//! - [`Local`]: any `'static` payload is accepted, and the container is
//!   neither `Send` nor `Sync`.
//!
//! ```
//! use std::rc::Rc;
//!
//! use anyhold::{SmallAny, markers::{CopyAndMove, Local}};
//!
//! let shared: Rc<str> = Rc::from("not thread-safe");
//! let local: SmallAny<CopyAndMove, Local> = SmallAny::with_value(shared);
//! assert!(local.has_type::<Rc<str>>());
//! ```
//!
//! ```compile_fail
//! use std::rc::Rc;
//!
//! use anyhold::SmallAny;
//!
//! // The default thread-safety marker is SendSync, which rejects Rc.
//! let shared: Rc<str> = Rc::from("not thread-safe");
//! let value: SmallAny = SmallAny::with_value(shared);
//! ```

use anyhold_internals::{HeapStorage, OperationTable, Storage};

/// How much of the copy/move protocol a policy supports.
///
/// Ordered from weakest to strongest, so the minimum of two policies is
/// [`Ord::min`] of their support levels.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum CopySupport {
    /// Neither copying nor moving
    None,
    /// Moving only
    Move,
    /// Copying and moving
    CopyAndMove,
}

/// Policy marker: the payload stays where it was emplaced.
///
/// Containers with this policy can emplace, reset and inspect values, but
/// cannot take part in copy or move transfers. [`AnyValue::swap`] is still
/// available on [`HeapStorage`], which swaps by exchanging pointers.
///
/// [`AnyValue::swap`]: crate::AnyValue::swap
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct NoCopyOrMove;

/// Policy marker: payloads can be moved but not copied.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct MoveOnly;

/// Policy marker: payloads can be copied and moved.
///
/// Every value stored in such a container must implement [`Clone`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct CopyAndMove;

/// Marker type indicating that a container and its payload are
/// `Send + Sync`.
///
/// This is the default thread-safety marker.
///
/// ```
/// use std::thread;
///
/// use anyhold::SmallAny;
///
/// let value: SmallAny = SmallAny::with_value(String::from("shared"));
/// thread::spawn(move || {
///     assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("shared"));
/// })
/// .join()
/// .unwrap();
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct SendSync;

/// Marker type indicating that a container may hold data that is not `Send`
/// or `Sync`.
///
/// Use `Local` for payloads such as `Rc<T>`, `Cell<T>` or raw pointers.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Local;

mod sealed_policy {
    use super::*;

    pub trait Sealed: 'static {}

    impl Sealed for NoCopyOrMove {}
    impl Sealed for MoveOnly {}
    impl Sealed for CopyAndMove {}
}

/// Marker trait implemented by the three capability policies.
///
/// This trait is sealed and cannot be implemented outside of this crate.
pub trait CopyPolicy: sealed_policy::Sealed + Copy + Default {
    /// The support level of this policy.
    const SUPPORT: CopySupport;
}

impl CopyPolicy for NoCopyOrMove {
    const SUPPORT: CopySupport = CopySupport::None;
}

impl CopyPolicy for MoveOnly {
    const SUPPORT: CopySupport = CopySupport::Move;
}

impl CopyPolicy for CopyAndMove {
    const SUPPORT: CopySupport = CopySupport::CopyAndMove;
}

/// Policies that permit moving payloads between containers.
pub trait Movable: CopyPolicy {}

impl Movable for MoveOnly {}
impl Movable for CopyAndMove {}

/// Policies that permit copying payloads between containers.
pub trait Copyable: Movable {}

impl Copyable for CopyAndMove {}

/// Type-level minimum of two policies.
///
/// `<P as Weakest<Q>>::Output` is whichever of `P` and `Q` supports less.
/// Cross-container operations require the output to be [`Movable`] or
/// [`Copyable`], so a transfer is only possible when both sides allow it.
pub trait Weakest<Other: CopyPolicy>: CopyPolicy {
    /// The weaker of `Self` and `Other`.
    type Output: CopyPolicy;
}

macro_rules! weakest {
    ($($left:ident, $right:ident => $output:ident;)*) => {
        $(
            impl Weakest<$right> for $left {
                type Output = $output;
            }
        )*
    };
}

weakest! {
    NoCopyOrMove, NoCopyOrMove => NoCopyOrMove;
    NoCopyOrMove, MoveOnly => NoCopyOrMove;
    NoCopyOrMove, CopyAndMove => NoCopyOrMove;
    MoveOnly, NoCopyOrMove => NoCopyOrMove;
    MoveOnly, MoveOnly => MoveOnly;
    MoveOnly, CopyAndMove => MoveOnly;
    CopyAndMove, NoCopyOrMove => NoCopyOrMove;
    CopyAndMove, MoveOnly => MoveOnly;
    CopyAndMove, CopyAndMove => CopyAndMove;
}

/// Policies that admit payloads of type `X`, and the operation table flavor
/// they use for it.
///
/// Every policy admits every `'static` type, except [`CopyAndMove`] which
/// requires `X: Clone` so that its containers can be copied.
///
/// [`NoCopyOrMove`] and [`MoveOnly`] record a table without copy operations,
/// whether or not `X` is [`Clone`]. The `*_cloneable` methods of
/// [`AnyValue`](crate::AnyValue) record the copyable table instead.
pub trait Admits<X: 'static>: CopyPolicy {
    /// The operation table recorded for payloads of type `X`.
    fn table() -> &'static OperationTable;
}

impl<X: 'static> Admits<X> for NoCopyOrMove {
    #[inline]
    fn table() -> &'static OperationTable {
        OperationTable::of::<X>()
    }
}

impl<X: 'static> Admits<X> for MoveOnly {
    #[inline]
    fn table() -> &'static OperationTable {
        OperationTable::of::<X>()
    }
}

impl<X: Clone + 'static> Admits<X> for CopyAndMove {
    #[inline]
    fn table() -> &'static OperationTable {
        OperationTable::of_cloneable::<X>()
    }
}

/// Policies under which containers with storage `S` can be swapped.
///
/// Swapping is possible when the storage always swaps by reference, or when
/// the policy permits relocating payloads.
pub trait Swappable<S: Storage>: CopyPolicy {}

impl<S: Storage> Swappable<S> for MoveOnly {}
impl<S: Storage> Swappable<S> for CopyAndMove {}
impl Swappable<HeapStorage> for NoCopyOrMove {}

/// Marker trait combining payload and thread-safety requirements.
///
/// - For `T = Local`: implemented for all `'static` types.
/// - For `T = SendSync`: implemented only for `'static` types that are also
///   `Send + Sync`.
pub trait PayloadFor<T>: 'static {}

impl<X: 'static> PayloadFor<Local> for X {}
impl<X: Send + Sync + 'static> PayloadFor<SendSync> for X {}

/// Thread-safety markers whose containers can hand their payloads to
/// containers marked `Dest`.
///
/// A `SendSync` payload can go anywhere, while a `Local` payload can only go
/// to another `Local` container.
pub trait TransferableTo<Dest>: 'static {}

impl TransferableTo<SendSync> for SendSync {}
impl TransferableTo<Local> for SendSync {}
impl TransferableTo<Local> for Local {}

#[cfg(test)]
mod tests {
    use super::*;

    type Min<A, B> = <A as Weakest<B>>::Output;

    #[test]
    fn test_support_order() {
        assert!(CopySupport::None < CopySupport::Move);
        assert!(CopySupport::Move < CopySupport::CopyAndMove);
        assert_eq!(
            NoCopyOrMove::SUPPORT.min(CopyAndMove::SUPPORT),
            CopySupport::None
        );
    }

    #[test]
    fn test_weakest_matches_support_minimum() {
        fn check<A: Weakest<B>, B: CopyPolicy>() {
            assert_eq!(
                <Min<A, B> as CopyPolicy>::SUPPORT,
                A::SUPPORT.min(B::SUPPORT)
            );
        }

        check::<NoCopyOrMove, NoCopyOrMove>();
        check::<NoCopyOrMove, MoveOnly>();
        check::<NoCopyOrMove, CopyAndMove>();
        check::<MoveOnly, NoCopyOrMove>();
        check::<MoveOnly, MoveOnly>();
        check::<MoveOnly, CopyAndMove>();
        check::<CopyAndMove, NoCopyOrMove>();
        check::<CopyAndMove, MoveOnly>();
        check::<CopyAndMove, CopyAndMove>();
    }

    #[test]
    fn test_policy_traits() {
        static_assertions::assert_impl_all!(MoveOnly: Movable);
        static_assertions::assert_impl_all!(CopyAndMove: Movable, Copyable);
        static_assertions::assert_not_impl_any!(NoCopyOrMove: Movable, Copyable);
        static_assertions::assert_not_impl_any!(MoveOnly: Copyable);

        static_assertions::assert_impl_all!(NoCopyOrMove: Swappable<HeapStorage>);
        static_assertions::assert_not_impl_any!(
            NoCopyOrMove: Swappable<anyhold_internals::SmallStorage>
        );
        static_assertions::assert_not_impl_any!(
            NoCopyOrMove: Swappable<anyhold_internals::InlineStorage<8>>
        );
        static_assertions::assert_impl_all!(
            MoveOnly: Swappable<anyhold_internals::InlineStorage<8>>
        );
    }

    #[test]
    fn test_admits() {
        struct NotClone;

        static_assertions::assert_impl_all!(NoCopyOrMove: Admits<NotClone>);
        static_assertions::assert_impl_all!(MoveOnly: Admits<NotClone>);
        static_assertions::assert_not_impl_any!(CopyAndMove: Admits<NotClone>);
        static_assertions::assert_impl_all!(CopyAndMove: Admits<u32>);

        assert!(<CopyAndMove as Admits<u32>>::table().can_copy_construct());
        assert!(!<MoveOnly as Admits<u32>>::table().can_copy_construct());
    }

    #[test]
    fn test_thread_safety_markers() {
        static_assertions::assert_impl_all!(u32: PayloadFor<SendSync>, PayloadFor<Local>);
        static_assertions::assert_impl_all!(alloc::rc::Rc<u32>: PayloadFor<Local>);
        static_assertions::assert_not_impl_any!(alloc::rc::Rc<u32>: PayloadFor<SendSync>);
        static_assertions::assert_not_impl_any!(Local: TransferableTo<SendSync>);
    }
}
