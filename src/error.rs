//! Error types for token acquisition.

use thiserror::Error;

/// Errors produced while acquiring, caching, or persisting credentials.
///
/// The first three variants classify the outcome of
/// [`TokenManager::get`](crate::TokenManager::get); the rest are reported by
/// the collaborators the manager drives and end up wrapped in one of them.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Automatic login is disabled and no valid cached token exists.
    #[error("failed to get Chainguard token: {0}")]
    Unauthenticated(String),

    /// Every applicable acquisition strategy failed.
    #[error("failed to get Chainguard token: {0}")]
    AcquisitionFailed(String),

    /// A token was acquired but could not be written to the store.
    #[error("failed to get Chainguard token: {0}")]
    PersistenceFailed(String),

    /// The credential store could not be read.
    #[error("Token store error: {0}")]
    Store(String),

    /// The token exchange service rejected or failed a request.
    #[error("Token exchange error: {0}")]
    Exchange(String),

    /// The browser login flow failed.
    #[error("Login error: {0}")]
    Login(String),

    /// An operation did not finish within its time bound.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The login configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl TokenError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthenticated(msg) => msg,
            Self::AcquisitionFailed(msg) => msg,
            Self::PersistenceFailed(msg) => msg,
            Self::Store(msg) => msg,
            Self::Exchange(msg) => msg,
            Self::Login(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::Io(_err) => "I/O error (see Debug output)",
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
        }
    }

    /// Whether automatic login was refused by policy.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated(_))
    }

    /// Whether authentication succeeded but the result could not be stored.
    ///
    /// A retry may succeed without new user interaction.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::PersistenceFailed(_))
    }
}

impl From<tonic::Status> for TokenError {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::DeadlineExceeded => Self::DeadlineExceeded(status.message().to_string()),
            code => Self::Exchange(format!("{:?}: {}", code, status.message())),
        }
    }
}

impl From<TokenError> for tonic::Status {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Unauthenticated(msg) => tonic::Status::unauthenticated(msg),
            TokenError::AcquisitionFailed(msg) => tonic::Status::unauthenticated(msg),
            TokenError::PersistenceFailed(msg) => tonic::Status::unavailable(msg),
            TokenError::Store(msg) => tonic::Status::unavailable(msg),
            TokenError::Exchange(msg) => tonic::Status::unauthenticated(msg),
            TokenError::Login(msg) => tonic::Status::unauthenticated(msg),
            TokenError::DeadlineExceeded(msg) => tonic::Status::deadline_exceeded(msg),
            TokenError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            TokenError::Io(err) => tonic::Status::internal(format!("I/O error: {}", err)),
            TokenError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            TokenError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TokenError::Unauthenticated("automatic login is disabled".to_string());
        assert_eq!(
            format!("{}", err),
            "failed to get Chainguard token: automatic login is disabled"
        );

        let err = TokenError::PersistenceFailed("saving access token: disk full".to_string());
        assert_eq!(
            format!("{}", err),
            "failed to get Chainguard token: saving access token: disk full"
        );

        let err = TokenError::Exchange("Unauthenticated: bad token".to_string());
        assert_eq!(format!("{}", err), "Token exchange error: Unauthenticated: bad token");
    }

    #[test]
    fn test_error_classification() {
        assert!(TokenError::Unauthenticated("x".to_string()).is_unauthenticated());
        assert!(!TokenError::AcquisitionFailed("x".to_string()).is_unauthenticated());
        assert!(TokenError::PersistenceFailed("x".to_string()).is_persistence_failure());
        assert!(!TokenError::Store("x".to_string()).is_persistence_failure());
    }

    #[test]
    fn test_error_to_status() {
        let status: tonic::Status = TokenError::Unauthenticated("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);

        let status: tonic::Status = TokenError::AcquisitionFailed("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);

        let status: tonic::Status = TokenError::PersistenceFailed("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::Unavailable);

        let status: tonic::Status = TokenError::DeadlineExceeded("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);

        let status: tonic::Status = TokenError::Configuration("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);
    }

    #[test]
    fn test_status_to_error() {
        let err: TokenError = tonic::Status::permission_denied("no access").into();
        assert!(matches!(err, TokenError::Exchange(_)));
        assert_eq!(err.message(), "PermissionDenied: no access");

        let err: TokenError = tonic::Status::deadline_exceeded("slow").into();
        assert!(matches!(err, TokenError::DeadlineExceeded(_)));
    }

    #[test]
    fn test_message_method() {
        let err = TokenError::Login("callback closed".to_string());
        assert_eq!(err.message(), "callback closed");

        let err = TokenError::Io(std::io::Error::other("boom"));
        assert_eq!(err.message(), "I/O error (see Debug output)");
    }
}
