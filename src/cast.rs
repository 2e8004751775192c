//! Typed access through free functions.
//!
//! [`any_cast`] and [`any_cast_mut`] work on anything implementing
//! [`AnyLike`]: every [`AnyValue`] regardless of its storage, policy or
//! thread-safety marker, and the raw [`RawAny`] container. This is handy in
//! generic code that should not care which flavor of container it was given.
//!
//! ```
//! use anyhold::{HeapAny, InlineAny, any_cast, any_cast_mut};
//!
//! let heap: HeapAny = HeapAny::with_value(1u16);
//! let mut inline: InlineAny<8> = InlineAny::with_value(2u16);
//!
//! assert_eq!(any_cast::<u16, _>(&heap), Some(&1));
//! assert_eq!(any_cast::<u32, _>(&heap), None);
//!
//! *any_cast_mut::<u16, _>(&mut inline).unwrap() += 1;
//! assert_eq!(any_cast::<u16, _>(&inline), Some(&3));
//! ```

use anyhold_internals::{RawAny, Storage, type_info::TypeInfo};

use crate::AnyValue;

/// Containers that hold at most one value of a dynamically known type.
pub trait AnyLike {
    /// Returns the [`TypeInfo`] of the held value, or `None` if empty.
    fn held_type(&self) -> Option<TypeInfo>;

    /// Returns a reference to the held value if it is of type `X`.
    fn get_ref<X: 'static>(&self) -> Option<&X>;

    /// Returns a mutable reference to the held value if it is of type `X`.
    fn get_mut<X: 'static>(&mut self) -> Option<&mut X>;
}

impl<S: Storage, P, T> AnyLike for AnyValue<S, P, T> {
    #[inline]
    fn held_type(&self) -> Option<TypeInfo> {
        self.type_info()
    }

    #[inline]
    fn get_ref<X: 'static>(&self) -> Option<&X> {
        self.downcast_ref::<X>()
    }

    #[inline]
    fn get_mut<X: 'static>(&mut self) -> Option<&mut X> {
        self.downcast_mut::<X>()
    }
}

impl<S: Storage> AnyLike for RawAny<S> {
    #[inline]
    fn held_type(&self) -> Option<TypeInfo> {
        self.type_info()
    }

    #[inline]
    fn get_ref<X: 'static>(&self) -> Option<&X> {
        self.downcast_ref::<X>()
    }

    #[inline]
    fn get_mut<X: 'static>(&mut self) -> Option<&mut X> {
        self.downcast_mut::<X>()
    }
}

/// Returns a reference to the value held by `container` if it is of type
/// `X`.
///
/// Never fails: an empty container or a type mismatch yields `None`.
#[inline]
pub fn any_cast<X: 'static, A: AnyLike + ?Sized>(container: &A) -> Option<&X> {
    container.get_ref::<X>()
}

/// Returns a mutable reference to the value held by `container` if it is of
/// type `X`.
#[inline]
pub fn any_cast_mut<X: 'static, A: AnyLike + ?Sized>(container: &mut A) -> Option<&mut X> {
    container.get_mut::<X>()
}
