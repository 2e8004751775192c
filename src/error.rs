//! Recoverable errors returned by fallible container operations.
//!
//! Most misuse of a container is a programmer error and panics, see
//! [`AnyValue::value`](crate::AnyValue::value). The types here cover the
//! cases where a caller can reasonably react at runtime: asking for a payload
//! of the wrong type, or trying to place a value in a storage too small to
//! hold it.

use core::fmt;

use anyhold_internals::type_info::TypeInfo;

/// The container did not hold a value of the requested type.
///
/// Returned by [`AnyValue::take`](crate::AnyValue::take).
///
/// # Examples
///
/// ```
/// use anyhold::SmallAny;
///
/// let mut value: SmallAny = SmallAny::with_value(1u8);
/// let error = value.take::<u32>().unwrap_err();
/// assert_eq!(error.expected().name(), "u32");
/// assert_eq!(error.found().map(|info| info.name()), Some("u8"));
/// assert_eq!(error.to_string(), "expected a value of type u32, found u8");
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct TypeMismatch {
    /// The requested type
    expected: TypeInfo,
    /// The type actually held, if any
    found: Option<TypeInfo>,
}

impl TypeMismatch {
    /// Creates a [`TypeMismatch`].
    #[inline]
    #[must_use]
    pub fn new(expected: TypeInfo, found: Option<TypeInfo>) -> Self {
        Self { expected, found }
    }

    /// The requested type.
    #[inline]
    #[must_use]
    pub fn expected(&self) -> TypeInfo {
        self.expected
    }

    /// The type held by the container, or `None` if it was empty.
    #[inline]
    #[must_use]
    pub fn found(&self) -> Option<TypeInfo> {
        self.found
    }
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.found {
            Some(found) => write!(
                f,
                "expected a value of type {}, found {}",
                self.expected, found
            ),
            None => write!(
                f,
                "expected a value of type {}, found an empty container",
                self.expected
            ),
        }
    }
}

impl core::error::Error for TypeMismatch {}

/// The storage cannot hold a value of type `X`.
///
/// Returned by [`AnyValue::try_emplace`](crate::AnyValue::try_emplace). The
/// rejected value is handed back and can be recovered with
/// [`CapacityError::into_inner`].
///
/// # Examples
///
/// ```
/// use anyhold::InlineAny;
///
/// let mut value: InlineAny<4> = InlineAny::new();
/// let error = value.try_emplace([0u8; 16]).unwrap_err();
/// assert_eq!(error.size(), 16);
/// assert_eq!(error.into_inner(), [0u8; 16]);
/// assert!(!value.has_value());
/// ```
pub struct CapacityError<X> {
    /// The value that did not fit
    value: X,
}

impl<X> CapacityError<X> {
    /// Creates a [`CapacityError`] carrying the rejected value.
    #[inline]
    #[must_use]
    pub fn new(value: X) -> Self {
        Self { value }
    }

    /// Size in bytes of the rejected value.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        core::mem::size_of::<X>()
    }

    /// Alignment in bytes of the rejected value.
    #[inline]
    #[must_use]
    pub fn align(&self) -> usize {
        core::mem::align_of::<X>()
    }

    /// Returns the rejected value.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> X {
        self.value
    }
}

impl<X> fmt::Debug for CapacityError<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapacityError")
            .field("type", &core::any::type_name::<X>())
            .field("size", &self.size())
            .field("align", &self.align())
            .finish_non_exhaustive()
    }
}

impl<X> fmt::Display for CapacityError<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a value of type {} ({} bytes, alignment {}) does not fit in the storage",
            core::any::type_name::<X>(),
            self.size(),
            self.align()
        )
    }
}

impl<X> core::error::Error for CapacityError<X> {}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn test_type_mismatch_display() {
        let empty = TypeMismatch::new(TypeInfo::of::<u16>(), None);
        assert_eq!(
            empty.to_string(),
            "expected a value of type u16, found an empty container"
        );
        assert_eq!(empty.expected(), TypeInfo::of::<u16>());
        assert!(empty.found().is_none());
    }

    #[test]
    fn test_capacity_error() {
        let error = CapacityError::new([7u32; 2]);
        assert_eq!(error.size(), 8);
        assert_eq!(error.align(), 4);
        assert_eq!(
            error.to_string(),
            "a value of type [u32; 2] (8 bytes, alignment 4) does not fit in the storage"
        );
        assert_eq!(error.into_inner(), [7, 7]);
    }

    #[test]
    fn test_error_trait() {
        static_assertions::assert_impl_all!(TypeMismatch: core::error::Error, Send, Sync, Copy);
        static_assertions::assert_impl_all!(CapacityError<u8>: core::error::Error);
    }
}
