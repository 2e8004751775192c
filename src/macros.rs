/// Emits a `tracing::debug!` event when the `tracing` feature is enabled.
///
/// Without the feature the macro expands to nothing and its arguments are
/// never evaluated.
macro_rules! debug_event {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        {
            ::tracing::debug!($($arg)+);
        }
    };
}
