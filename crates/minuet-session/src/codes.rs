//! Backend error codes and their user-facing descriptors.

use serde::{Deserialize, Serialize};

/// Error codes reported by the backend (or synthesized by the transport).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    InvalidCredentials,
    TokenExpired,
    TokenBlacklisted,
    InsufficientPermissions,
    UserInactive,
    TokenMissing,
    RefreshTokenInvalid,
    ValidationError,
    RateLimited,
    ServiceUnavailable,
    DatabaseError,
    NetworkError,
    TimeoutError,
    Unknown,
}

impl ApiErrorCode {
    /// Parse a wire code. Unrecognized codes map to `Unknown`.
    pub fn from_wire(code: &str) -> Self {
        match code {
            "INVALID_CREDENTIALS" => Self::InvalidCredentials,
            "TOKEN_EXPIRED" => Self::TokenExpired,
            "TOKEN_BLACKLISTED" => Self::TokenBlacklisted,
            "INSUFFICIENT_PERMISSIONS" => Self::InsufficientPermissions,
            "USER_INACTIVE" => Self::UserInactive,
            "TOKEN_MISSING" => Self::TokenMissing,
            "REFRESH_TOKEN_INVALID" => Self::RefreshTokenInvalid,
            "VALIDATION_ERROR" => Self::ValidationError,
            "RATE_LIMITED" => Self::RateLimited,
            "SERVICE_UNAVAILABLE" => Self::ServiceUnavailable,
            "DATABASE_ERROR" => Self::DatabaseError,
            "NETWORK_ERROR" => Self::NetworkError,
            "TIMEOUT_ERROR" => Self::TimeoutError,
            _ => Self::Unknown,
        }
    }

    /// The wire representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenBlacklisted => "TOKEN_BLACKLISTED",
            Self::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            Self::UserInactive => "USER_INACTIVE",
            Self::TokenMissing => "TOKEN_MISSING",
            Self::RefreshTokenInvalid => "REFRESH_TOKEN_INVALID",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Codes the session can never recover from by refreshing; only a new
    /// login helps. Applied to refresh-call failures and to resource-call
    /// failures that no fresh access token would cure.
    pub fn is_hard_logout(&self) -> bool {
        matches!(
            self,
            Self::TokenExpired
                | Self::TokenBlacklisted
                | Self::TokenMissing
                | Self::RefreshTokenInvalid
                | Self::UserInactive
        )
    }

    /// Codes that a fresh access token cures on a resource request. These
    /// trigger the refresh-and-retry-once path instead of an immediate
    /// logout.
    pub fn is_refresh_curable(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::TokenMissing)
    }

    /// Codes usable by generic retry policies elsewhere.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable | Self::DatabaseError | Self::NetworkError | Self::TimeoutError
        )
    }

    /// The user-facing descriptor for this code.
    pub fn describe(&self) -> ErrorDescriptor {
        match self {
            Self::InvalidCredentials => ErrorDescriptor {
                code: self.as_str(),
                title: "Sign-in failed",
                message: "The email or password you entered is incorrect.",
                action: ErrorAction::Dismiss,
            },
            Self::TokenExpired => ErrorDescriptor {
                code: self.as_str(),
                title: "Session expired",
                message: "Your session has expired. Please sign in again.",
                action: ErrorAction::Relogin,
            },
            Self::TokenBlacklisted => ErrorDescriptor {
                code: self.as_str(),
                title: "Session revoked",
                message: "Your session is no longer valid. Please sign in again.",
                action: ErrorAction::Relogin,
            },
            Self::InsufficientPermissions => ErrorDescriptor {
                code: self.as_str(),
                title: "Not allowed",
                message: "You don't have permission to perform this action.",
                action: ErrorAction::Dismiss,
            },
            Self::UserInactive => ErrorDescriptor {
                code: self.as_str(),
                title: "Account inactive",
                message: "Your account has been deactivated. Contact an administrator.",
                action: ErrorAction::Relogin,
            },
            Self::TokenMissing => ErrorDescriptor {
                code: self.as_str(),
                title: "Not signed in",
                message: "No session credentials were found. Please sign in.",
                action: ErrorAction::Relogin,
            },
            Self::RefreshTokenInvalid => ErrorDescriptor {
                code: self.as_str(),
                title: "Session expired",
                message: "Your session could not be renewed. Please sign in again.",
                action: ErrorAction::Relogin,
            },
            Self::ValidationError => ErrorDescriptor {
                code: self.as_str(),
                title: "Invalid request",
                message: "The submitted data is invalid. Check the form and try again.",
                action: ErrorAction::Dismiss,
            },
            Self::RateLimited => ErrorDescriptor {
                code: self.as_str(),
                title: "Too many requests",
                message: "You're going too fast. Wait a moment and try again.",
                action: ErrorAction::Retry,
            },
            Self::ServiceUnavailable => ErrorDescriptor {
                code: self.as_str(),
                title: "Service unavailable",
                message: "The server is temporarily unavailable. Try again shortly.",
                action: ErrorAction::Retry,
            },
            Self::DatabaseError => ErrorDescriptor {
                code: self.as_str(),
                title: "Server error",
                message: "A storage error occurred on the server. Try again shortly.",
                action: ErrorAction::Retry,
            },
            Self::NetworkError => ErrorDescriptor {
                code: self.as_str(),
                title: "Connection problem",
                message: "Could not reach the server. Check your connection.",
                action: ErrorAction::Retry,
            },
            Self::TimeoutError => ErrorDescriptor {
                code: self.as_str(),
                title: "Request timed out",
                message: "The server took too long to respond. Try again.",
                action: ErrorAction::Retry,
            },
            Self::Unknown => ErrorDescriptor {
                code: self.as_str(),
                title: "Unexpected error",
                message: "Something went wrong. Try again, or contact support.",
                action: ErrorAction::Dismiss,
            },
        }
    }
}

/// What the UI should offer the user for a given error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    /// Route to the login entry point.
    Relogin,
    /// Offer a retry affordance.
    Retry,
    /// Show and dismiss; the calling page owns any follow-up.
    Dismiss,
}

/// User-facing descriptor for an error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorDescriptor {
    pub code: &'static str,
    pub title: &'static str,
    pub message: &'static str,
    pub action: ErrorAction,
}
