#[cfg(feature = "std")]
use std::sync as impl_;

#[cfg(not(feature = "std"))]
use spin as impl_;

/// Read-write lock around the registry map.
///
/// Backed by [`std::sync::RwLock`] with the `std` feature and by
/// [`spin::RwLock`] otherwise. The value starts out as `None` so that the
/// lock can be created in a `static`.
#[repr(transparent)]
pub(crate) struct TableLock<T: 'static + Send + Sync>(impl_::RwLock<Option<T>>);

/// Shared access to the contents of a [`TableLock`].
#[repr(transparent)]
pub(crate) struct TableLockReadGuard<T: 'static + Send + Sync>(
    impl_::RwLockReadGuard<'static, Option<T>>,
);

/// Exclusive access to the contents of a [`TableLock`].
#[repr(transparent)]
pub(crate) struct TableLockWriteGuard<T: 'static + Send + Sync>(
    impl_::RwLockWriteGuard<'static, Option<T>>,
);

impl<T: 'static + Send + Sync> TableLock<T> {
    /// Creates an empty lock.
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self(impl_::RwLock::new(None))
    }

    /// Acquires shared access.
    #[inline]
    pub(crate) fn read(&'static self) -> TableLockReadGuard<T> {
        #[cfg(not(feature = "std"))]
        let guard = self.0.read();

        // Writers never run user code while holding the lock, so a poisoned
        // lock still holds a consistent map.
        #[cfg(feature = "std")]
        let guard = self.0.read().unwrap_or_else(std::sync::PoisonError::into_inner);

        TableLockReadGuard(guard)
    }

    /// Acquires exclusive access.
    #[inline]
    pub(crate) fn write(&'static self) -> TableLockWriteGuard<T> {
        #[cfg(not(feature = "std"))]
        let guard = self.0.write();

        #[cfg(feature = "std")]
        let guard = self
            .0
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        TableLockWriteGuard(guard)
    }
}

impl<T: 'static + Send + Sync> TableLockReadGuard<T> {
    /// Returns the contents, or `None` if nothing was ever stored.
    #[inline]
    pub(crate) fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }
}

impl<T: 'static + Send + Sync> TableLockWriteGuard<T> {
    /// Returns the contents for modification.
    #[inline]
    pub(crate) fn get(&mut self) -> &mut Option<T> {
        &mut self.0
    }
}
