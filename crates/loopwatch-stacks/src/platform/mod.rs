//! Platform-specific capture backends.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::capture;

#[cfg(not(unix))]
mod fallback;
#[cfg(not(unix))]
pub(crate) use fallback::capture;
