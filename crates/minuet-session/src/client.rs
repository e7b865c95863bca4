//! Authenticated API client: bearer attachment, refresh, single retry.

use crate::codes::ApiErrorCode;
use crate::error::{SessionError, SessionResult};
use crate::refresh::RefreshCoordinator;
use crate::session::SessionStore;
use crate::transport::AuthTransport;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A user-visible failure notification (the toast analog).
///
/// Observability only: emitting a notice never blocks or alters the
/// retry/logout decision.
#[derive(Debug, Clone)]
pub struct Notice {
    pub code: ApiErrorCode,
    pub title: String,
    pub message: String,
}

/// Callback type for failure notices.
pub type NoticeCallback = Box<dyn Fn(Notice) + Send + Sync>;

/// The single point through which all backend calls flow.
///
/// Every outgoing request carries the current access token when one exists.
/// An auth failure that a fresh access token can cure triggers one shared
/// refresh and exactly one retry; an unrecoverable auth failure logs the
/// session out and propagates. Authorization, validation, and domain errors
/// pass through unchanged to the calling page.
pub struct ApiClient {
    session: Arc<SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
    transport: Arc<dyn AuthTransport>,
    notices: Mutex<Option<NoticeCallback>>,
}

impl ApiClient {
    /// Create a new client.
    pub fn new(
        session: Arc<SessionStore>,
        coordinator: Arc<RefreshCoordinator>,
        transport: Arc<dyn AuthTransport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            coordinator,
            transport,
            notices: Mutex::new(None),
        })
    }

    /// Set a callback for user-visible failure notices.
    pub fn set_notice_callback(&self, callback: NoticeCallback) {
        let mut cb = self.notices.lock().unwrap();
        *cb = Some(callback);
    }

    /// Perform a request with bearer attachment and the single-retry policy.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> SessionResult<serde_json::Value> {
        let bearer = self.session.vault().access_token()?;
        let first = self
            .transport
            .request_json(method.clone(), path, bearer.as_deref(), body.clone())
            .await;

        let err = match first {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        let Some(code) = err.code() else {
            return Err(err);
        };

        if code.is_refresh_curable() && self.session.vault().refresh_token()?.is_some() {
            debug!(path, code = code.as_str(), "auth failure, refreshing and retrying once");
            match self.coordinator.refresh_now().await {
                Ok(pair) => {
                    // Exactly one retry. A second auth failure surfaces to
                    // the caller rather than triggering another refresh.
                    self.transport
                        .request_json(method, path, Some(&pair.access_token), body)
                        .await
                        .map_err(|e| self.noted(e))
                }
                // Hard refresh failures already forced a logout inside the
                // coordinator; transient ones stay retryable for the caller.
                Err(refresh_err) => Err(self.noted(refresh_err)),
            }
        } else if code.is_hard_logout() {
            // Includes an expired/missing token with no refresh token to
            // cure it: only a new login recovers the session.
            self.session.logout(code.as_str());
            Err(self.noted(err))
        } else {
            Err(self.noted(err))
        }
    }

    /// GET returning raw JSON.
    pub async fn get(&self, path: &str) -> SessionResult<serde_json::Value> {
        self.request(Method::GET, path, None).await
    }

    /// GET decoded into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> SessionResult<T> {
        let value = self.get(path).await?;
        serde_json::from_value(value).map_err(|e| SessionError::Decode(e.to_string()))
    }

    /// POST with a JSON body, returning raw JSON.
    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> SessionResult<serde_json::Value> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// PUT with a JSON body, returning raw JSON.
    pub async fn put(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> SessionResult<serde_json::Value> {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// DELETE returning raw JSON.
    pub async fn delete(&self, path: &str) -> SessionResult<serde_json::Value> {
        self.request(Method::DELETE, path, None).await
    }

    /// Emit a notice for user-visible failure categories and return the
    /// error unchanged.
    fn noted(&self, err: SessionError) -> SessionError {
        if let Some(code) = err.code() {
            let user_visible =
                code.is_hard_logout() || code.is_retryable() || code == ApiErrorCode::RateLimited;
            if user_visible {
                let descriptor = code.describe();
                let message = match &err {
                    SessionError::Api { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                let cb = self.notices.lock().unwrap();
                if let Some(callback) = cb.as_ref() {
                    callback(Notice {
                        code,
                        title: descriptor.title.to_string(),
                        message,
                    });
                }
            }
        }
        err
    }
}
