//! Refresh coordinator: at most one in-flight token refresh system-wide.

use crate::error::{SessionError, SessionResult};
use crate::session::SessionStore;
use crate::transport::AuthTransport;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use minuet_storage::TokenPair;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

type SharedRefresh = Shared<BoxFuture<'static, SessionResult<TokenPair>>>;

/// Ensures at most one real refresh HTTP call exists at any time.
///
/// Callers that arrive while a refresh is pending share the same future and
/// observe the same eventual result — no duplicate network call. The
/// in-flight marker is cleared inside the refresh task *before* the result
/// is released to waiters, so a caller resuming after a refresh can
/// immediately start a new one without reading a stale marker.
pub struct RefreshCoordinator {
    session: Arc<SessionStore>,
    transport: Arc<dyn AuthTransport>,
    pending: Mutex<Option<SharedRefresh>>,
}

impl RefreshCoordinator {
    /// Create a new coordinator.
    pub fn new(session: Arc<SessionStore>, transport: Arc<dyn AuthTransport>) -> Arc<Self> {
        Arc::new(Self {
            session,
            transport,
            pending: Mutex::new(None),
        })
    }

    /// Whether a refresh call is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.pending.lock().unwrap().is_some()
    }

    /// Obtain a fresh token pair, joining the in-flight refresh if one
    /// exists and starting one otherwise.
    pub async fn refresh_now(self: &Arc<Self>) -> SessionResult<TokenPair> {
        let shared = {
            let mut pending = self.pending.lock().unwrap();
            match pending.as_ref() {
                Some(inflight) => {
                    debug!("joining in-flight refresh");
                    inflight.clone()
                }
                None => {
                    let this = Arc::clone(self);
                    let fut: BoxFuture<'static, SessionResult<TokenPair>> =
                        async move { this.run_refresh().await }.boxed();
                    let shared = fut.shared();
                    *pending = Some(shared.clone());
                    // Drive the refresh to completion even if every waiter
                    // is dropped mid-flight.
                    tokio::spawn(shared.clone());
                    shared
                }
            }
        };
        shared.await
    }

    async fn run_refresh(self: Arc<Self>) -> SessionResult<TokenPair> {
        let result = self.perform_refresh().await;

        // Clear the marker before any waiter sees the result.
        *self.pending.lock().unwrap() = None;

        match &result {
            Ok(pair) => {
                info!(expires_at = ?pair.expires_at, "token refresh succeeded");
            }
            Err(e) if e.is_hard_logout() => {
                // The session can never recover from this; every waiter gets
                // the error and the logged-out end state. logout is
                // idempotent, so racing callers are harmless.
                warn!(error = %e, "refresh rejected, forcing logout");
                let reason = e
                    .code()
                    .map(|c| c.as_str())
                    .unwrap_or("refresh-rejected");
                self.session.logout(reason);
            }
            Err(e) => {
                warn!(error = %e, "refresh failed (transient)");
            }
        }

        result
    }

    async fn perform_refresh(&self) -> SessionResult<TokenPair> {
        let started_epoch = self.session.epoch();

        let Some(refresh_token) = self.session.vault().refresh_token()? else {
            return Err(SessionError::NotLoggedIn);
        };

        let resp = self.transport.refresh(&refresh_token).await?;

        // Keep the old refresh token when the backend doesn't rotate it.
        let rotated = resp.refresh_token.or(Some(refresh_token));
        let pair = TokenPair::from_wire(resp.access_token, rotated, resp.exp);

        if !self.session.complete_refresh(&pair, started_epoch)? {
            // A logout won the race; the new pair must not resurrect the
            // session.
            return Err(SessionError::NotLoggedIn);
        }

        Ok(pair)
    }
}
