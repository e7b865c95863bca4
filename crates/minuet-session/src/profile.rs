//! Session profile store: the cached `/auth/me` identity.

use crate::error::{SessionError, SessionResult};
use crate::transport::{AuthTransport, ConnectionInfo, MeResponse};
use chrono::{DateTime, Utc};
use minuet_storage::{SecureStorage, StorageKeys, TokenVault};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Default cache window for the session profile.
const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// The authenticated user's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUser {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Roles and permissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileAuthz {
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// Current and recent connections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConnections {
    #[serde(default)]
    pub active: Option<ConnectionInfo>,
    #[serde(default)]
    pub last: Vec<ConnectionInfo>,
}

/// Fetch metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileMeta {
    pub fetched_at: DateTime<Utc>,
}

/// Normalized session profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProfile {
    pub user: ProfileUser,
    pub authz: ProfileAuthz,
    pub connections: ProfileConnections,
    pub meta: ProfileMeta,
}

#[derive(Default)]
struct ProfileState {
    data: Option<SessionProfile>,
    load_error: Option<String>,
    in_flight: bool,
}

/// TTL-cached store for the session profile.
///
/// Fetched once per session window; duplicate concurrent loads coalesce
/// into one call; failures keep the previous data (stale-but-available
/// over empty).
pub struct ProfileStore {
    transport: Arc<dyn AuthTransport>,
    vault: Arc<TokenVault>,
    storage: Arc<dyn SecureStorage>,
    state: Mutex<ProfileState>,
    cache_ttl_secs: i64,
}

impl ProfileStore {
    /// Create a store, warm-starting from the persisted profile document.
    pub fn new(
        transport: Arc<dyn AuthTransport>,
        vault: Arc<TokenVault>,
        storage: Arc<dyn SecureStorage>,
    ) -> Self {
        Self::with_cache_ttl(transport, vault, storage, DEFAULT_CACHE_TTL_SECS)
    }

    /// Create a store with a custom cache TTL.
    pub fn with_cache_ttl(
        transport: Arc<dyn AuthTransport>,
        vault: Arc<TokenVault>,
        storage: Arc<dyn SecureStorage>,
        cache_ttl_secs: i64,
    ) -> Self {
        let data = match storage.get(StorageKeys::SESSION_PROFILE) {
            Ok(Some(json)) => match serde_json::from_str::<SessionProfile>(&json) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(error = %e, "persisted profile malformed, ignoring");
                    None
                }
            },
            _ => None,
        };

        Self {
            transport,
            vault,
            storage,
            state: Mutex::new(ProfileState {
                data,
                ..Default::default()
            }),
            cache_ttl_secs,
        }
    }

    /// Load the profile from `/auth/me`.
    ///
    /// No-op when a load is already in flight, or when the cache is still
    /// fresh and `force_refresh` is false.
    pub async fn load_from_api(&self, force_refresh: bool) -> SessionResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.in_flight {
                debug!("profile load already in flight");
                return Ok(());
            }
            if !force_refresh {
                if let Some(profile) = &state.data {
                    let age = Utc::now()
                        .signed_duration_since(profile.meta.fetched_at)
                        .num_seconds();
                    if age < self.cache_ttl_secs {
                        debug!(age_secs = age, "profile cache fresh");
                        return Ok(());
                    }
                }
            }
            state.in_flight = true;
        }

        let token = match self.vault.access_token() {
            Ok(Some(token)) => token,
            _ => {
                self.state.lock().unwrap().in_flight = false;
                return Err(SessionError::NotLoggedIn);
            }
        };

        let result = self.transport.fetch_me(&token).await;

        let mut state = self.state.lock().unwrap();
        state.in_flight = false;
        match result {
            Ok(me) => {
                let profile = normalize(me, Utc::now());
                if let Ok(json) = serde_json::to_string(&profile) {
                    // Best-effort: a failed write only costs the warm start.
                    let _ = self.storage.set(StorageKeys::SESSION_PROFILE, &json);
                }
                debug!(user_id = %profile.user.user_id, "session profile loaded");
                state.data = Some(profile);
                state.load_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "profile load failed, keeping previous data");
                state.load_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// The cached profile, if any.
    pub fn profile(&self) -> Option<SessionProfile> {
        self.state.lock().unwrap().data.clone()
    }

    /// The last load error, if the most recent load failed.
    pub fn load_error(&self) -> Option<String> {
        self.state.lock().unwrap().load_error.clone()
    }

    /// Whether a load is currently in flight.
    pub fn is_loading(&self) -> bool {
        self.state.lock().unwrap().in_flight
    }

    /// Reset to the empty shape; called on logout.
    pub fn clear_session(&self) {
        let mut state = self.state.lock().unwrap();
        *state = ProfileState::default();
        let _ = self.storage.delete(StorageKeys::SESSION_PROFILE);
    }
}

/// Normalize the backend's `/auth/me` shape.
fn normalize(me: MeResponse, fetched_at: DateTime<Utc>) -> SessionProfile {
    SessionProfile {
        user: ProfileUser {
            user_id: me.user_id,
            username: me.username,
            full_name: me.full_name,
            email: me.email,
        },
        authz: ProfileAuthz {
            roles: me.roles,
            permissions: me.permissions,
        },
        connections: ProfileConnections {
            active: me.active_connection,
            last: me.last_connections,
        },
        meta: ProfileMeta { fetched_at },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::ApiErrorCode;
    use crate::test_support::{memory_storage, token_with_exp, FakeTransport};
    use minuet_storage::TokenPair;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Fixture {
        store: ProfileStore,
        transport: Arc<FakeTransport>,
        storage: Arc<crate::test_support::MemoryStorage>,
    }

    fn fixture_with_ttl(ttl_secs: i64) -> Fixture {
        let transport = Arc::new(FakeTransport::new());
        let storage = memory_storage();
        let vault = Arc::new(TokenVault::new(storage.clone()));
        vault
            .set(&TokenPair::from_wire(
                token_with_exp(3600),
                Some("rt-1".into()),
                None,
            ))
            .unwrap();
        let store =
            ProfileStore::with_cache_ttl(transport.clone(), vault, storage.clone(), ttl_secs);
        Fixture {
            store,
            transport,
            storage,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_ttl(300)
    }

    #[tokio::test]
    async fn test_load_normalizes_me_shape() {
        let fx = fixture();
        fx.store.load_from_api(false).await.unwrap();

        let profile = fx.store.profile().unwrap();
        assert_eq!(profile.user.user_id, "user-1");
        assert_eq!(profile.user.username, "ada");
        assert_eq!(profile.authz.roles, vec!["admin".to_string()]);
        assert_eq!(profile.authz.permissions, vec!["minutes:write".to_string()]);
        assert!(fx.store.load_error().is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        // Two loads inside the TTL window issue one network call.
        let fx = fixture();
        fx.store.load_from_api(false).await.unwrap();
        fx.store.load_from_api(false).await.unwrap();

        assert_eq!(fx.transport.me_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let fx = fixture();
        fx.store.load_from_api(false).await.unwrap();
        fx.store.load_from_api(true).await.unwrap();

        assert_eq!(fx.transport.me_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let fx = fixture_with_ttl(0);
        fx.store.load_from_api(false).await.unwrap();
        fx.store.load_from_api(false).await.unwrap();

        assert_eq!(fx.transport.me_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_coalesce() {
        let fx = fixture();
        fx.transport.set_me_delay(Duration::from_millis(50));

        let (a, b) = tokio::join!(fx.store.load_from_api(false), fx.store.load_from_api(false));
        a.unwrap();
        b.unwrap();

        assert_eq!(fx.transport.me_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_stale_data() {
        let fx = fixture();
        fx.store.load_from_api(false).await.unwrap();
        fx.transport
            .push_me_err(ApiErrorCode::ServiceUnavailable, "down");

        let err = fx.store.load_from_api(true).await.unwrap_err();
        assert_eq!(err.code(), Some(ApiErrorCode::ServiceUnavailable));

        // Stale-but-available over empty.
        assert!(fx.store.profile().is_some());
        assert!(fx.store.load_error().is_some());
    }

    #[tokio::test]
    async fn test_clear_session_resets_everything() {
        let fx = fixture();
        fx.store.load_from_api(false).await.unwrap();

        fx.store.clear_session();
        assert!(fx.store.profile().is_none());
        assert!(fx.store.load_error().is_none());
        assert_eq!(
            fx.storage
                .get(minuet_storage::StorageKeys::SESSION_PROFILE)
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_warm_start_from_persisted_profile() {
        let fx = fixture();
        fx.store.load_from_api(false).await.unwrap();

        // A second store over the same storage sees the profile without a
        // network call.
        let vault = Arc::new(TokenVault::new(fx.storage.clone()));
        let reopened =
            ProfileStore::new(fx.transport.clone(), vault, fx.storage.clone());
        assert!(reopened.profile().is_some());
        assert_eq!(fx.transport.me_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_without_session_errors() {
        let transport = Arc::new(FakeTransport::new());
        let storage = memory_storage();
        let vault = Arc::new(TokenVault::new(storage.clone()));
        let store = ProfileStore::new(transport.clone(), vault, storage);

        let err = store.load_from_api(false).await.unwrap_err();
        assert_eq!(err, SessionError::NotLoggedIn);
        assert_eq!(transport.me_calls.load(Ordering::SeqCst), 0);
        assert!(!store.is_loading());
    }
}
