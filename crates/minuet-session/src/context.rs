//! Session context: the constructed, injectable aggregate of the core.
//!
//! Hosts build one `SessionContext` and reach every session component
//! through it, instead of through module-level singletons. The context
//! also owns the cross-component orchestration: login triggers the
//! one-time profile fetch, logout clears the profile and disposes the
//! auto-refresher.

use crate::auto_refresh::{spawn_auto_refresher, AutoRefreshHandle, RefreshSchedule};
use crate::client::ApiClient;
use crate::error::SessionResult;
use crate::expiry_warning::{ExpiryWarning, WarningCallback, WarningPolicy};
use crate::profile::ProfileStore;
use crate::refresh::RefreshCoordinator;
use crate::session::{AuthSnapshot, SessionStore};
use crate::transport::{AuthTransport, HttpTransport};
use minuet_core::Config;
use minuet_storage::{SecureStorage, TokenVault};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// The session core, fully wired.
pub struct SessionContext {
    pub vault: Arc<TokenVault>,
    pub session: Arc<SessionStore>,
    pub coordinator: Arc<RefreshCoordinator>,
    pub client: Arc<ApiClient>,
    pub profile: Arc<ProfileStore>,
    auto_refresh: Mutex<Option<AutoRefreshHandle>>,
}

impl SessionContext {
    /// Build a context from configuration and a storage backend, using the
    /// HTTP transport against the configured API base URL.
    pub fn new(config: &Config, storage: Arc<dyn SecureStorage>) -> SessionResult<Arc<Self>> {
        // Validate the URL up front so a bad config fails at construction.
        config
            .api_url()
            .map_err(|e| crate::error::SessionError::Config(e.to_string()))?;
        let transport: Arc<dyn AuthTransport> = Arc::new(HttpTransport::new(
            config.api_url.clone(),
            config.verbose_auth_log,
        ));
        Ok(Self::with_transport(transport, storage))
    }

    /// Build a context over an explicit transport (the test seam).
    pub fn with_transport(
        transport: Arc<dyn AuthTransport>,
        storage: Arc<dyn SecureStorage>,
    ) -> Arc<Self> {
        let vault = Arc::new(TokenVault::new(storage.clone()));
        let session = Arc::new(SessionStore::new(vault.clone(), transport.clone()));
        let coordinator = RefreshCoordinator::new(session.clone(), transport.clone());
        let client = ApiClient::new(session.clone(), coordinator.clone(), transport.clone());
        let profile = Arc::new(ProfileStore::new(transport, vault.clone(), storage));

        let context = Arc::new(Self {
            vault,
            session,
            coordinator,
            client,
            profile,
            auto_refresh: Mutex::new(None),
        });

        // Every logout path — user initiated, forced by the expiry
        // countdown, or a hard refresh rejection deep in the coordinator —
        // must clear the profile and stop the auto-refresher.
        let weak = Arc::downgrade(&context);
        context.session.add_logout_hook(Box::new(move |_reason| {
            if let Some(context) = weak.upgrade() {
                context.profile.clear_session();
                if let Some(handle) = context.auto_refresh.lock().unwrap().take() {
                    handle.dispose();
                }
            }
        }));

        context
    }

    /// Restore a persisted session on startup. Returns true when one was
    /// restored.
    pub fn restore(&self) -> bool {
        self.session.restore()
    }

    /// Login and trigger the one-time session profile fetch.
    pub async fn login(&self, credential: &str, password: &str) -> SessionResult<AuthSnapshot> {
        self.session.login(credential, password).await?;

        // The session is valid either way; the profile can be refetched on
        // demand.
        if let Err(e) = self.profile.load_from_api(false).await {
            warn!(error = %e, "profile fetch after login failed");
        }

        Ok(self.session.snapshot())
    }

    /// Logout: clear credentials and profile, stop the auto-refresher.
    /// Idempotent. The same cleanup runs for every other logout path via
    /// the session's logout hook.
    pub fn logout(&self, reason: &str) {
        self.session.logout(reason);
    }

    /// Current status snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.session.snapshot()
    }

    /// Start (or restart) the proactive auto-refresher.
    pub fn spawn_auto_refresh(&self, schedule: RefreshSchedule) {
        let handle = spawn_auto_refresher(self.coordinator.clone(), self.vault.clone(), schedule);
        let mut slot = self.auto_refresh.lock().unwrap();
        if let Some(old) = slot.replace(handle) {
            old.dispose();
        }
    }

    /// Nudge the auto-refresher to re-evaluate (focus / online events).
    pub fn wake_auto_refresh(&self) {
        if let Some(handle) = self.auto_refresh.lock().unwrap().as_ref() {
            handle.wake();
        }
    }

    /// Spawn an expiry-warning controller bound to this context.
    pub fn spawn_expiry_warning(
        &self,
        policy: WarningPolicy,
        callback: WarningCallback,
    ) -> Arc<ExpiryWarning> {
        ExpiryWarning::spawn(
            self.session.clone(),
            self.coordinator.clone(),
            policy,
            callback,
        )
    }
}
