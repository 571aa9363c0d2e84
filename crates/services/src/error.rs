use domains::StoreError;
use thiserror::Error;

/// Errors from the post, comment and group use cases.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    /// Carries the user-facing message, e.g. "Post not found".
    #[error("{0}")]
    NotFound(&'static str),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(&'static str),

    /// `action` completes the sentence "Failed to ...".
    #[error("Failed to {action}")]
    Store {
        action: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn store(action: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { action, source }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
