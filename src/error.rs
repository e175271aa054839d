//! Crate-wide error and result types.

use crate::calculator::ValidationError;

/// Result alias that carries the crate [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A practice-parameter constraint was violated before any computation ran.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The audio backend failed to come up or to schedule a tone.
    #[error("audio backend: {0}")]
    Backend(String),
}

impl Error {
    /// Creates a backend error from any displayable message.
    pub fn backend<T: Into<String>>(msg: T) -> Self {
        Self::Backend(msg.into())
    }
}
