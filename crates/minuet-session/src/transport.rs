//! Wire-level transport to the backend REST API.
//!
//! `AuthTransport` is the seam the rest of the crate talks through; the
//! reqwest-backed `HttpTransport` is the production implementation. Tests
//! script the trait directly.

use crate::codes::ApiErrorCode;
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request body for `POST /auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub credential: &'a str,
    pub password: &'a str,
}

/// Response body of the login and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token expiry as epoch seconds, when the backend sends it.
    #[serde(default)]
    pub exp: Option<i64>,
}

/// A connection entry in the `/auth/me` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub connected_at: Option<String>,
}

/// Response body of `GET /auth/me` (backend-owned shape).
#[derive(Debug, Clone, Deserialize)]
pub struct MeResponse {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub active_connection: Option<ConnectionInfo>,
    #[serde(default)]
    pub last_connections: Vec<ConnectionInfo>,
}

/// Error envelope the backend wraps failures in.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

/// Transport seam for all backend calls the session core makes.
#[async_trait]
pub trait AuthTransport: Send + Sync {
    /// `POST /auth/login`
    async fn login(&self, credential: &str, password: &str) -> SessionResult<TokenResponse>;

    /// `POST /auth/refresh`
    async fn refresh(&self, refresh_token: &str) -> SessionResult<TokenResponse>;

    /// `GET /auth/me`
    async fn fetch_me(&self, access_token: &str) -> SessionResult<MeResponse>;

    /// Any other backend endpoint, with optional bearer and JSON body.
    async fn request_json(
        &self,
        method: reqwest::Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> SessionResult<serde_json::Value>;
}

/// Map a failed response into a `SessionError`.
///
/// Prefers the structured `{"error": {code, message}}` envelope; falls back
/// to a status-based mapping when the body carries no envelope.
/// `fallback_401` differs by call site: a bare 401 means "wrong credentials"
/// on login but "token expired" on resource calls.
pub(crate) fn parse_error(status: u16, body: &str, fallback_401: ApiErrorCode) -> SessionError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        let code = ApiErrorCode::from_wire(&envelope.error.code);
        let message = envelope
            .error
            .message
            .unwrap_or_else(|| code.describe().message.to_string());
        return SessionError::Api {
            code,
            status: Some(status),
            message,
        };
    }

    let code = match status {
        401 => fallback_401,
        403 => ApiErrorCode::InsufficientPermissions,
        400 | 422 => ApiErrorCode::ValidationError,
        429 => ApiErrorCode::RateLimited,
        503 => ApiErrorCode::ServiceUnavailable,
        _ => ApiErrorCode::Unknown,
    };
    SessionError::Api {
        code,
        status: Some(status),
        message: code.describe().message.to_string(),
    }
}

/// Map a reqwest transport failure into a `SessionError`.
pub(crate) fn map_transport_error(e: reqwest::Error) -> SessionError {
    let code = if e.is_timeout() {
        ApiErrorCode::TimeoutError
    } else {
        ApiErrorCode::NetworkError
    };
    SessionError::Api {
        code,
        status: None,
        message: e.to_string(),
    }
}

/// reqwest-backed transport against the configured API base URL.
pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
    verbose: bool,
}

impl HttpTransport {
    /// Create a transport for the given base URL (e.g. `https://api.example.com`).
    pub fn new(api_url: impl Into<String>, verbose: bool) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            verbose,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        fallback_401: ApiErrorCode,
    ) -> SessionResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = parse_error(status.as_u16(), &body, fallback_401);
            if self.verbose {
                tracing::debug!(status = %status, error = %err, "request failed");
            }
            return Err(err);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SessionError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AuthTransport for HttpTransport {
    async fn login(&self, credential: &str, password: &str) -> SessionResult<TokenResponse> {
        if self.verbose {
            tracing::debug!("POST /auth/login");
        }
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest {
                credential,
                password,
            })
            .send()
            .await
            .map_err(map_transport_error)?;

        self.read_json(response, ApiErrorCode::InvalidCredentials)
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> SessionResult<TokenResponse> {
        if self.verbose {
            tracing::debug!("POST /auth/refresh");
        }
        let response = self
            .client
            .post(self.url("/auth/refresh"))
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(map_transport_error)?;

        self.read_json(response, ApiErrorCode::RefreshTokenInvalid)
            .await
    }

    async fn fetch_me(&self, access_token: &str) -> SessionResult<MeResponse> {
        if self.verbose {
            tracing::debug!("GET /auth/me");
        }
        let response = self
            .client
            .get(self.url("/auth/me"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_transport_error)?;

        self.read_json(response, ApiErrorCode::TokenExpired).await
    }

    async fn request_json(
        &self,
        method: reqwest::Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> SessionResult<serde_json::Value> {
        if self.verbose {
            tracing::debug!(method = %method, path, has_bearer = bearer.is_some(), "request");
        }
        let mut builder = self.client.request(method, self.url(path));
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = builder.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(
                status.as_u16(),
                &text,
                ApiErrorCode::TokenExpired,
            ));
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(serde_json::Value::Null);
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| SessionError::Decode(e.to_string()))
    }
}
