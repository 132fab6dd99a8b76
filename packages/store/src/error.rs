//! Error taxonomy shared by every store and backend adapter.

use thiserror::Error;

/// Failure raised by a diary operation.
///
/// Every variant carries a human-readable message suitable for a toast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiaryError {
    /// Rejected on the client before any remote call was made.
    #[error("{0}")]
    Validation(String),
    /// Credentials rejected, or no session where one is required.
    #[error("{0}")]
    Auth(String),
    /// The backend query or mutation failed.
    #[error("{0}")]
    Remote(String),
    /// The resource does not exist or does not belong to the current identity.
    #[error("{0}")]
    NotFound(String),
    /// Another operation on the same resource has not finished yet.
    #[error("{0}")]
    InProgress(String),
}

impl DiaryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// The message without the variant tag.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::Auth(m)
            | Self::Remote(m)
            | Self::NotFound(m)
            | Self::InProgress(m) => m,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DiaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_bare_message() {
        let err = DiaryError::auth("Invalid login credentials");
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert_eq!(err.message(), "Invalid login credentials");
    }
}
