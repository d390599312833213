//! Error types for cache construction and cached calls.

use thiserror::Error;

/// Errors raised by the cache layer itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache was configured with a value it cannot honour.
    ///
    /// Only produced while building a cache, never during a call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The call arguments cannot be turned into a cache key.
    ///
    /// The cache is left untouched when this is returned.
    #[error("unhashable key: {0}")]
    UnhashableKey(String),
}

/// Error returned from a cached call.
///
/// Failures of the wrapped computation are passed through unchanged in
/// [`CallError::Computation`] and are never stored in the cache.
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// The arguments could not be keyed.
    #[error(transparent)]
    Key(#[from] CacheError),

    /// The wrapped computation failed.
    #[error("computation failed: {0}")]
    Computation(E),
}

impl<E> CallError<E> {
    /// Returns the computation's own error, if that is what failed.
    pub fn into_computation(self) -> Option<E> {
        match self {
            CallError::Computation(err) => Some(err),
            CallError::Key(_) => None,
        }
    }

    /// Returns true if the call failed before the computation ran.
    pub fn is_key_error(&self) -> bool {
        matches!(self, CallError::Key(_))
    }
}

/// Convenience result type for cache construction.
pub type Result<T> = core::result::Result<T, CacheError>;
