//! Runtime identity of a concrete payload type.
//!
//! [`TypeInfo`] pairs the compiler-provided [`TypeId`] with the textual
//! [`core::any::type_name`] of a type. Equality is decided by the [`TypeId`],
//! which is guaranteed unique per type within one program. The textual name
//! is not: two versions of the same crate produce identical names for
//! distinct types. Ordering and hashing are derived from the name, with the
//! [`TypeId`] breaking ties so that ordering stays consistent with equality.

use core::{
    any::TypeId,
    cmp::Ordering,
    hash::{Hash, Hasher},
};

/// Comparable, hashable identity of a concrete type.
///
/// Obtained through [`TypeInfo::of`]. Two values compare equal if and only
/// if they were created for the same type.
///
/// # Examples
///
/// ```
/// use anyhold_internals::TypeInfo;
///
/// let a = TypeInfo::of::<u32>();
/// let b = TypeInfo::of::<u32>();
/// let c = TypeInfo::of::<i64>();
///
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// assert_eq!(a.hash_code(), b.hash_code());
/// assert_eq!(a.name(), "u32");
/// ```
#[derive(Clone, Copy)]
pub struct TypeInfo {
    /// Unique identity of the type
    type_id: TypeId,
    /// Name of the type as reported by [`core::any::type_name`]
    name: &'static str,
}

impl TypeInfo {
    /// Returns the [`TypeInfo`] describing `T`.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// Returns the textual name of the type.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the [`TypeId`] of the type.
    #[inline]
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns whether this identity describes `T`.
    #[inline]
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Returns a hash of the type name.
    ///
    /// The value is stable for the lifetime of the process and equal for
    /// equal [`TypeInfo`] values.
    #[must_use]
    pub fn hash_code(&self) -> u64 {
        let mut hasher = rustc_hash::FxHasher::default();
        hasher.write(self.name.as_bytes());
        hasher.finish()
    }

    /// Returns whether `self` sorts strictly before `other`.
    ///
    /// This is the same order as the [`Ord`] implementation, usable as a
    /// sort or dictionary key.
    #[inline]
    #[must_use]
    pub fn before(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Less
    }
}

impl PartialEq for TypeInfo {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeInfo {}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(other.name)
            .then_with(|| self.type_id.cmp(&other.type_id))
    }
}

impl PartialOrd for TypeInfo {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl core::fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("TypeInfo").field(&self.name).finish()
    }
}

impl core::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name)
    }
}
