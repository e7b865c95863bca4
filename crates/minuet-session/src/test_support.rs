//! Shared test doubles for the session crate.

use crate::codes::ApiErrorCode;
use crate::error::{SessionError, SessionResult};
use crate::transport::{AuthTransport, MeResponse, TokenResponse};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use minuet_storage::{SecureStorage, StorageResult, TokenVault};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory storage for testing.
pub(crate) struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub(crate) fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl SecureStorage for MemoryStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().unwrap().remove(key).is_some())
    }
}

/// A vault over fresh in-memory storage.
pub(crate) fn memory_vault() -> Arc<TokenVault> {
    Arc::new(TokenVault::new(Arc::new(MemoryStorage::new())))
}

/// Fresh in-memory storage.
pub(crate) fn memory_storage() -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::new())
}

/// Build an unsigned JWT whose `exp` claim is `offset_secs` from now.
///
/// Each call embeds a unique `jti` so two tokens minted in the same second
/// never collide as opaque strings (real JWTs are never byte-identical
/// across issuance); only the `exp` claim is ever decoded, so the extra
/// claim is inert.
pub(crate) fn token_with_exp(offset_secs: i64) -> String {
    static JTI: AtomicU64 = AtomicU64::new(0);
    let jti = JTI.fetch_add(1, Ordering::SeqCst);
    let exp = chrono::Utc::now().timestamp() + offset_secs;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"jti":{jti}}}"#).as_bytes());
    format!("{header}.{body}.sig")
}

/// Scripted transport double.
///
/// Login/refresh/me results are queues consumed per call; resource requests
/// succeed when the bearer is in the valid-token set and fail with
/// TOKEN_EXPIRED otherwise, unless a scripted result is queued.
pub(crate) struct FakeTransport {
    login_results: Mutex<VecDeque<SessionResult<TokenResponse>>>,
    refresh_results: Mutex<VecDeque<SessionResult<TokenResponse>>>,
    me_results: Mutex<VecDeque<SessionResult<MeResponse>>>,
    request_results: Mutex<VecDeque<SessionResult<serde_json::Value>>>,
    valid_tokens: Mutex<HashSet<String>>,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub request_calls: AtomicUsize,
    refresh_delay_ms: AtomicU64,
    me_delay_ms: AtomicU64,
    pub last_bearer: Mutex<Option<String>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self {
            login_results: Mutex::new(VecDeque::new()),
            refresh_results: Mutex::new(VecDeque::new()),
            me_results: Mutex::new(VecDeque::new()),
            request_results: Mutex::new(VecDeque::new()),
            valid_tokens: Mutex::new(HashSet::new()),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            request_calls: AtomicUsize::new(0),
            refresh_delay_ms: AtomicU64::new(0),
            me_delay_ms: AtomicU64::new(0),
            last_bearer: Mutex::new(None),
        }
    }

    pub(crate) fn push_login_ok(&self, access_token: String, refresh_token: Option<&str>) {
        self.valid_tokens.lock().unwrap().insert(access_token.clone());
        self.login_results
            .lock()
            .unwrap()
            .push_back(Ok(TokenResponse {
                access_token,
                refresh_token: refresh_token.map(String::from),
                exp: None,
            }));
    }

    pub(crate) fn push_login_err(&self, code: ApiErrorCode, message: &str) {
        self.login_results
            .lock()
            .unwrap()
            .push_back(Err(SessionError::api(code, message)));
    }

    pub(crate) fn push_refresh_ok(&self, access_token: String, refresh_token: Option<&str>) {
        self.valid_tokens.lock().unwrap().insert(access_token.clone());
        self.refresh_results
            .lock()
            .unwrap()
            .push_back(Ok(TokenResponse {
                access_token,
                refresh_token: refresh_token.map(String::from),
                exp: None,
            }));
    }

    pub(crate) fn push_refresh_err(&self, code: ApiErrorCode, message: &str) {
        self.refresh_results
            .lock()
            .unwrap()
            .push_back(Err(SessionError::api(code, message)));
    }

    pub(crate) fn push_me_err(&self, code: ApiErrorCode, message: &str) {
        self.me_results
            .lock()
            .unwrap()
            .push_back(Err(SessionError::api(code, message)));
    }

    pub(crate) fn push_request_ok(&self, value: serde_json::Value) {
        self.request_results.lock().unwrap().push_back(Ok(value));
    }

    pub(crate) fn push_request_err(&self, code: ApiErrorCode, message: &str) {
        self.request_results
            .lock()
            .unwrap()
            .push_back(Err(SessionError::api(code, message)));
    }

    pub(crate) fn invalidate_token(&self, token: &str) {
        self.valid_tokens.lock().unwrap().remove(token);
    }

    /// Make refresh calls take (virtual) time, so concurrent callers can
    /// pile onto one in-flight refresh in paused-clock tests.
    pub(crate) fn set_refresh_delay(&self, delay: Duration) {
        self.refresh_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make `/auth/me` calls take (virtual) time.
    pub(crate) fn set_me_delay(&self, delay: Duration) {
        self.me_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn default_me() -> MeResponse {
        MeResponse {
            user_id: "user-1".to_string(),
            username: "ada".to_string(),
            full_name: Some("Ada Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            roles: vec!["admin".to_string()],
            permissions: vec!["minutes:write".to_string()],
            active_connection: None,
            last_connections: Vec::new(),
        }
    }
}

#[async_trait]
impl AuthTransport for FakeTransport {
    async fn login(&self, _credential: &str, _password: &str) -> SessionResult<TokenResponse> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(SessionError::api(ApiErrorCode::Unknown, "unscripted login"))
            })
    }

    async fn refresh(&self, _refresh_token: &str) -> SessionResult<TokenResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.refresh_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.refresh_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(SessionError::api(ApiErrorCode::Unknown, "unscripted refresh"))
            })
    }

    async fn fetch_me(&self, access_token: &str) -> SessionResult<MeResponse> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_bearer.lock().unwrap() = Some(access_token.to_string());
        let delay = self.me_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.me_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::default_me()))
    }

    async fn request_json(
        &self,
        _method: reqwest::Method,
        _path: &str,
        bearer: Option<&str>,
        _body: Option<serde_json::Value>,
    ) -> SessionResult<serde_json::Value> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_bearer.lock().unwrap() = bearer.map(String::from);

        if let Some(scripted) = self.request_results.lock().unwrap().pop_front() {
            return scripted;
        }

        match bearer {
            Some(token) if self.valid_tokens.lock().unwrap().contains(token) => {
                Ok(serde_json::json!({ "ok": true }))
            }
            Some(_) => Err(SessionError::Api {
                code: ApiErrorCode::TokenExpired,
                status: Some(401),
                message: "token expired".to_string(),
            }),
            None => Err(SessionError::Api {
                code: ApiErrorCode::TokenMissing,
                status: Some(401),
                message: "no token".to_string(),
            }),
        }
    }
}
