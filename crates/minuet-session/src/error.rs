//! Session error types.

use crate::codes::ApiErrorCode;
use thiserror::Error;

/// Session error type.
///
/// Clonable by design: refresh results are fanned out to every caller
/// awaiting the same in-flight refresh, so the error must be shareable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The backend (or the transport on its behalf) reported an error code.
    #[error("{message} [{}]", .code.as_str())]
    Api {
        code: ApiErrorCode,
        /// HTTP status, when the error came from a response.
        status: Option<u16>,
        message: String,
    },

    /// Response body could not be decoded into the expected shape.
    #[error("Response decode error: {0}")]
    Decode(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid auth state transition
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No session (or no refresh token) to operate on
    #[error("Not logged in")]
    NotLoggedIn,
}

impl SessionError {
    /// Build an API error without an HTTP status.
    pub fn api(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            status: None,
            message: message.into(),
        }
    }

    /// The backend error code, when there is one.
    pub fn code(&self) -> Option<ApiErrorCode> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this error is transient and the operation can be
    /// retried by a generic retry policy.
    pub fn is_retryable(&self) -> bool {
        self.code().is_some_and(|c| c.is_retryable())
    }

    /// Returns true if this error can never be cured by refreshing.
    pub fn is_hard_logout(&self) -> bool {
        self.code().is_some_and(|c| c.is_hard_logout())
    }
}

impl From<minuet_storage::StorageError> for SessionError {
    fn from(e: minuet_storage::StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;

/// User-facing classification of a failed login, distinguishing "wrong
/// credentials" from "cannot reach server" from "unexpected error".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    InvalidCredentials,
    NetworkUnavailable,
    Unexpected,
}

impl LoginFailure {
    /// Classify a login error.
    pub fn classify(error: &SessionError) -> Self {
        match error.code() {
            Some(ApiErrorCode::InvalidCredentials) => Self::InvalidCredentials,
            Some(ApiErrorCode::NetworkError) | Some(ApiErrorCode::TimeoutError) => {
                Self::NetworkUnavailable
            }
            _ => Self::Unexpected,
        }
    }

    /// Message suitable for a field-adjacent inline display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "The email or password you entered is incorrect.",
            Self::NetworkUnavailable => "Could not reach the server. Check your connection.",
            Self::Unexpected => "An unexpected error occurred. Try again.",
        }
    }
}
