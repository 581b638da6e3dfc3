//! Logging macros that forward to `tracing` when the `tracing` feature is enabled
//! and expand to nothing otherwise. Brought into scope with `#[macro_use]`.

#[cfg(feature = "tracing")]
macro_rules! trace {
    ($($tt:tt)*) => { ::tracing::trace!($($tt)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! debug {
    ($($tt:tt)*) => { ::tracing::debug!($($tt)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! warn {
    ($($tt:tt)*) => { ::tracing::warn!($($tt)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! error {
    ($($tt:tt)*) => { ::tracing::error!($($tt)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! error {
    ($($tt:tt)*) => {};
}
