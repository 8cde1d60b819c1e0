use std::time::Duration;
use thiserror::Error;

/// Errors raised while configuring filters or building responses.
///
/// Per-request body failures are reported as [`std::io::Error`] instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A filter duration was shorter than one whole second.
    #[error("{filter} duration must be at least one second, got {duration:?}")]
    InvalidDuration {
        /// Name of the filter being configured.
        filter: &'static str,
        /// The rejected duration.
        duration: Duration,
    },
    /// A redirect target that cannot be sent as a `Location` header.
    #[error("invalid redirect location: {0:?}")]
    InvalidLocation(String),
}

/// Convenience alias for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
