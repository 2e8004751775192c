//! Optional event emission.
//!
//! Events are only compiled in with the `tracing` feature. Without it the
//! macro expands to nothing and its arguments are never evaluated.

/// Emits a `tracing::trace!` event when the `tracing` feature is enabled.
macro_rules! trace_event {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        {
            ::tracing::trace!($($arg)+);
        }
    };
}
