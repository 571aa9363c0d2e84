//! # Port errors
//!
//! Failures reported by adapters behind the domain ports. Services translate
//! these into their own error types; none of them leak to HTTP bodies.

use thiserror::Error;

/// Errors returned by storage adapters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed post, group or comment does not exist.
    #[error("record not found")]
    NotFound,

    /// Increment addressed an index past the end of the options.
    #[error("poll option out of range")]
    OptionOutOfRange,

    /// Increment attempted at or after the poll's expiry instant.
    #[error("poll closed")]
    Expired,

    /// The voter is already in the poll's voted-by set.
    #[error("voter already recorded")]
    AlreadyVoted,

    /// Optimistic contention. Nothing was committed; safe to retry.
    #[error("write conflict")]
    Conflict,

    /// The store did not answer in time. The write may or may not have landed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The query shape is not supported by the backend (e.g. missing index).
    #[error("query unsupported: {0}")]
    QueryUnsupported(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors returned by identity verifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    Expired,
}
