//! Common result and error types for spibench.

/// Result type for fallible internal operations.
///
/// `Err` signals a bug in spibench itself, never a user input problem. User
/// errors are reported through each crate's own error enum.
pub type SpibenchResult<T> = Result<T, InternalError>;

/// An internal error indicating a broken invariant inside spibench.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the broken invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
