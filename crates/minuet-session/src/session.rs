//! Session store: owns the auth state machine over the persisted token pair.

use crate::auth_fsm::{
    AuthState, AuthStateCallback, AuthStateChangedPayload, SessionMachine, SessionMachineInput,
};
use crate::error::{SessionError, SessionResult};
use crate::transport::AuthTransport;
use chrono::{DateTime, Utc};
use minuet_storage::{TokenPair, TokenVault};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Snapshot of authentication state for hosts and status reporting.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub authenticated: bool,
    pub is_loading: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub state: AuthState,
}

/// Owner of the authentication state machine.
///
/// `is_authenticated` is owned exclusively by this type; no other component
/// mutates it. Credential reads and writes go through the vault it wraps —
/// the single source of truth for the token pair.
pub struct SessionStore {
    vault: Arc<TokenVault>,
    transport: Arc<dyn AuthTransport>,
    fsm: Mutex<SessionMachine>,
    /// True only while an explicit login call is in flight.
    is_loading: AtomicBool,
    /// Bumped on every logout. Refresh results carry the epoch they started
    /// under and are discarded on mismatch, so a logout always wins over an
    /// in-flight refresh.
    epoch: AtomicU64,
    state_callback: Mutex<Option<AuthStateCallback>>,
    /// Internal hooks run on every logout path (forced, hard failure, or
    /// user initiated): profile clearing, scheduler cancellation.
    logout_hooks: Mutex<Vec<Box<dyn Fn(&str) + Send + Sync>>>,
}

impl SessionStore {
    /// Create a new session store.
    pub fn new(vault: Arc<TokenVault>, transport: Arc<dyn AuthTransport>) -> Self {
        Self {
            vault,
            transport,
            fsm: Mutex::new(SessionMachine::new()),
            is_loading: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            state_callback: Mutex::new(None),
            logout_hooks: Mutex::new(Vec::new()),
        }
    }

    /// Register a hook invoked on every logout.
    pub(crate) fn add_logout_hook(&self, hook: Box<dyn Fn(&str) + Send + Sync>) {
        self.logout_hooks.lock().unwrap().push(hook);
    }

    /// Set a callback to be notified of auth state changes.
    pub fn set_state_callback(&self, callback: AuthStateCallback) {
        let mut cb = self.state_callback.lock().unwrap();
        *cb = Some(callback);
    }

    /// The vault this store owns.
    pub fn vault(&self) -> &Arc<TokenVault> {
        &self.vault
    }

    /// Current auth state.
    pub fn state(&self) -> AuthState {
        let fsm = self.fsm.lock().unwrap();
        AuthState::from(fsm.state())
    }

    /// Whether the session is authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Whether an explicit login call is in flight.
    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::SeqCst)
    }

    /// The current session epoch (see `complete_refresh`).
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Transition the FSM and notify the callback if the state changed.
    fn transition(
        &self,
        input: &SessionMachineInput,
        reason: Option<&str>,
    ) -> SessionResult<AuthState> {
        let mut fsm = self.fsm.lock().unwrap();
        let old_state = AuthState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            SessionError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(?old_state, ?new_state, reason, "auth state transition");
            self.notify_state_change(new_state, reason);
        }

        Ok(new_state)
    }

    fn notify_state_change(&self, state: AuthState, reason: Option<&str>) {
        let cb = self.state_callback.lock().unwrap();
        if let Some(callback) = cb.as_ref() {
            callback(AuthStateChangedPayload {
                state,
                reason: reason.map(String::from),
            });
        }
    }

    /// Restore a persisted session on startup.
    ///
    /// A stored pair that is still usable (not expired, or expired but
    /// refreshable, or with unknown expiry) flips the machine to LoggedIn.
    /// A stored pair that is both expired and unrefreshable is cleared.
    /// Returns true when a session was restored.
    pub fn restore(&self) -> bool {
        let pair = match self.vault.get() {
            Ok(Some(pair)) => pair,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "could not read persisted session");
                return false;
            }
        };

        let expired = pair
            .remaining_secs(Utc::now())
            .is_some_and(|remaining| remaining <= 0);
        if expired && pair.refresh_token.is_none() {
            info!("persisted session expired with no refresh token, clearing");
            let _ = self.vault.clear();
            return false;
        }

        match self.transition(&SessionMachineInput::SessionRestored, None) {
            Ok(_) => {
                info!(expires_at = ?pair.expires_at, "session restored from storage");
                true
            }
            Err(_) => false,
        }
    }

    /// Login with a credential (email/username) and password.
    ///
    /// On success the vault holds the new pair and the state is LoggedIn.
    /// `is_loading` is true for exactly the duration of the backend call.
    pub async fn login(&self, credential: &str, password: &str) -> SessionResult<TokenPair> {
        self.transition(&SessionMachineInput::LoginAttempt, None)?;
        self.is_loading.store(true, Ordering::SeqCst);

        let result = self.transport.login(credential, password).await;
        self.is_loading.store(false, Ordering::SeqCst);

        match result {
            Ok(resp) => {
                let pair =
                    TokenPair::from_wire(resp.access_token, resp.refresh_token, resp.exp);
                self.vault.set(&pair)?;
                self.transition(&SessionMachineInput::LoginSucceeded, None)?;
                info!(expires_at = ?pair.expires_at, "login successful");
                Ok(pair)
            }
            Err(e) => {
                warn!(error = %e, "login failed");
                let _ = self.transition(&SessionMachineInput::LoginFailed, None);
                Err(e)
            }
        }
    }

    /// Logout: clear the vault and flip to LoggedOut.
    ///
    /// Idempotent — calling logout when already logged out is a no-op and
    /// never errors. The epoch bump invalidates any refresh still in
    /// flight.
    pub fn logout(&self, reason: &str) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.vault.clear() {
            warn!(error = %e, "failed to clear vault on logout");
        }
        let _ = self.transition(&SessionMachineInput::LogoutRequested, Some(reason));

        let hooks = self.logout_hooks.lock().unwrap();
        for hook in hooks.iter() {
            hook(reason);
        }
        info!(reason, "logged out");
    }

    /// Apply a successful refresh result.
    ///
    /// Internal transition invoked by the refresh coordinator. Does not
    /// touch `is_loading` and is invisible to the state machine. Returns
    /// false (without writing) when the session was logged out after the
    /// refresh started — a stale refresh must not re-populate the vault.
    pub fn complete_refresh(&self, pair: &TokenPair, started_epoch: u64) -> SessionResult<bool> {
        if self.epoch() != started_epoch || !self.is_authenticated() {
            debug!("discarding refresh result from a logged-out epoch");
            return Ok(false);
        }
        self.vault.set(pair)?;
        debug!(expires_at = ?pair.expires_at, "refresh applied");
        Ok(true)
    }

    /// Current status snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        let state = self.state();
        let expires_at = self
            .vault
            .get()
            .ok()
            .flatten()
            .and_then(|pair| pair.expires_at);
        AuthSnapshot {
            authenticated: state.is_authenticated(),
            is_loading: self.is_loading(),
            expires_at,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::ApiErrorCode;
    use crate::test_support::{memory_vault, token_with_exp, FakeTransport};
    use std::sync::atomic::AtomicUsize;

    fn store_with(transport: FakeTransport) -> SessionStore {
        SessionStore::new(memory_vault(), Arc::new(transport))
    }

    #[tokio::test]
    async fn test_login_success_flips_state_and_writes_vault() {
        let transport = FakeTransport::new();
        transport.push_login_ok(token_with_exp(3600), Some("rt-1"));
        let store = store_with(transport);

        assert!(!store.is_authenticated());
        let pair = store.login("ada@example.com", "pw").await.unwrap();

        assert!(store.is_authenticated());
        assert!(!store.is_loading());
        assert!(pair.expires_at.is_some());
        assert_eq!(
            store.vault().refresh_token().unwrap(),
            Some("rt-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_login_failure_returns_to_logged_out() {
        let transport = FakeTransport::new();
        transport.push_login_err(ApiErrorCode::InvalidCredentials, "bad credentials");
        let store = store_with(transport);

        let err = store.login("ada@example.com", "nope").await.unwrap_err();
        assert_eq!(err.code(), Some(ApiErrorCode::InvalidCredentials));
        assert!(!store.is_authenticated());
        assert!(!store.is_loading());
        assert!(!store.vault().has_session().unwrap());
    }

    #[tokio::test]
    async fn test_login_while_logged_in_is_invalid() {
        let transport = FakeTransport::new();
        transport.push_login_ok(token_with_exp(3600), Some("rt-1"));
        let store = store_with(transport);

        store.login("ada@example.com", "pw").await.unwrap();
        let err = store.login("ada@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidStateTransition(_)));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let transport = FakeTransport::new();
        transport.push_login_ok(token_with_exp(3600), Some("rt-1"));
        let store = store_with(transport);

        store.login("ada@example.com", "pw").await.unwrap();
        store.logout("user");
        let epoch_after_first = store.epoch();

        // Second logout: same end state, no panic, no error.
        store.logout("user");
        assert!(!store.is_authenticated());
        assert!(!store.vault().has_session().unwrap());
        assert!(store.epoch() > epoch_after_first);
    }

    #[tokio::test]
    async fn test_complete_refresh_discarded_after_logout() {
        let transport = FakeTransport::new();
        transport.push_login_ok(token_with_exp(3600), Some("rt-1"));
        let store = store_with(transport);

        store.login("ada@example.com", "pw").await.unwrap();
        let started_epoch = store.epoch();
        store.logout("user");

        let stale = TokenPair::from_wire(token_with_exp(3600), Some("rt-2".into()), None);
        let applied = store.complete_refresh(&stale, started_epoch).unwrap();

        assert!(!applied);
        assert!(!store.vault().has_session().unwrap());
    }

    #[tokio::test]
    async fn test_complete_refresh_applies_in_same_epoch() {
        let transport = FakeTransport::new();
        transport.push_login_ok(token_with_exp(60), Some("rt-1"));
        let store = store_with(transport);

        store.login("ada@example.com", "pw").await.unwrap();
        let fresh = TokenPair::from_wire(token_with_exp(3600), Some("rt-2".into()), None);
        let applied = store.complete_refresh(&fresh, store.epoch()).unwrap();

        assert!(applied);
        assert_eq!(
            store.vault().refresh_token().unwrap(),
            Some("rt-2".to_string())
        );
    }

    #[tokio::test]
    async fn test_restore_with_valid_persisted_session() {
        let vault = memory_vault();
        vault
            .set(&TokenPair::from_wire(
                token_with_exp(3600),
                Some("rt-1".into()),
                None,
            ))
            .unwrap();
        let store = SessionStore::new(vault, Arc::new(FakeTransport::new()));

        assert!(store.restore());
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_expired_without_refresh_token_clears() {
        let vault = memory_vault();
        vault
            .set(&TokenPair::from_wire(token_with_exp(-60), None, None))
            .unwrap();
        let store = SessionStore::new(vault, Arc::new(FakeTransport::new()));

        assert!(!store.restore());
        assert!(!store.is_authenticated());
        assert!(!store.vault().has_session().unwrap());
    }

    #[tokio::test]
    async fn test_restore_expired_with_refresh_token_restores() {
        // An expired access token with a refresh token is still a session:
        // the first request will refresh it.
        let vault = memory_vault();
        vault
            .set(&TokenPair::from_wire(
                token_with_exp(-60),
                Some("rt-1".into()),
                None,
            ))
            .unwrap();
        let store = SessionStore::new(vault, Arc::new(FakeTransport::new()));

        assert!(store.restore());
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_with_nothing_persisted() {
        let store = SessionStore::new(memory_vault(), Arc::new(FakeTransport::new()));
        assert!(!store.restore());
    }

    #[tokio::test]
    async fn test_state_callback_fires_on_changes_only() {
        let transport = FakeTransport::new();
        transport.push_login_ok(token_with_exp(3600), Some("rt-1"));
        let store = store_with(transport);

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let calls = calls.clone();
            let seen = seen.clone();
            store.set_state_callback(Box::new(move |payload| {
                calls.fetch_add(1, Ordering::SeqCst);
                seen.lock().unwrap().push(payload.state);
            }));
        }

        store.login("ada@example.com", "pw").await.unwrap();
        store.logout("user");
        store.logout("user"); // no state change, no callback

        assert_eq!(calls.load(Ordering::SeqCst), 3); // LoggingIn, LoggedIn, LoggedOut
        assert_eq!(
            *seen.lock().unwrap(),
            vec![AuthState::LoggingIn, AuthState::LoggedIn, AuthState::LoggedOut]
        );
    }

    #[tokio::test]
    async fn test_snapshot_reports_expiry() {
        let transport = FakeTransport::new();
        transport.push_login_ok(token_with_exp(3600), Some("rt-1"));
        let store = store_with(transport);

        store.login("ada@example.com", "pw").await.unwrap();
        let snap = store.snapshot();
        assert!(snap.authenticated);
        assert!(!snap.is_loading);
        assert!(snap.expires_at.is_some());
        assert_eq!(snap.state, AuthState::LoggedIn);
    }
}
