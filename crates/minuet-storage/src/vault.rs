//! Token vault: the single source of truth for the session token pair.

use crate::{decode_exp, SecureStorage, StorageKeys, StorageResult};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The current access/refresh token pair with its cached expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPair {
    /// Short-lived bearer credential.
    pub access_token: String,
    /// Longer-lived credential used solely to obtain a new access token.
    pub refresh_token: Option<String>,
    /// Cached expiry of `access_token`. `None` means the expiry is unknown
    /// (the token carried no readable claim and the server sent none).
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenPair {
    /// Build a pair from a wire response, recomputing the cached expiry.
    ///
    /// The embedded `exp` claim wins; the server-provided epoch is the
    /// fallback. No readable expiry from either source leaves `expires_at`
    /// unset (the explicit unknown-expiry case).
    pub fn from_wire(
        access_token: String,
        refresh_token: Option<String>,
        server_exp: Option<i64>,
    ) -> Self {
        let exp = decode_exp(&access_token).or(server_exp);
        let expires_at = exp.and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// Seconds until expiry at `now`; `None` when the expiry is unknown.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at
            .map(|at| at.signed_duration_since(now).num_seconds())
    }
}

/// Persisted shape of the token document (token pair + auth flag).
#[derive(Debug, Serialize, Deserialize)]
struct SessionTokensDoc {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Expiry as RFC 3339, if known.
    #[serde(default)]
    expires_at: Option<String>,
    authenticated: bool,
}

/// Durable store for the session token pair.
///
/// All credential reads in the runtime flow through this type; no component
/// reaches into the persisted document directly.
pub struct TokenVault {
    storage: Arc<dyn SecureStorage>,
}

impl TokenVault {
    /// Create a vault over the given storage backend.
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Read the current token pair.
    ///
    /// A missing or malformed document reads as "no session".
    pub fn get(&self) -> StorageResult<Option<TokenPair>> {
        let Some(json) = self.storage.get(StorageKeys::SESSION_TOKENS)? else {
            return Ok(None);
        };
        let doc: SessionTokensDoc = match serde_json::from_str(&json) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %e, "session token document malformed, treating as no session");
                return Ok(None);
            }
        };

        let expires_at = doc
            .expires_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Some(TokenPair {
            access_token: doc.access_token,
            refresh_token: doc.refresh_token,
            expires_at,
        }))
    }

    /// Overwrite the stored token pair.
    pub fn set(&self, pair: &TokenPair) -> StorageResult<()> {
        let doc = SessionTokensDoc {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            expires_at: pair.expires_at.map(|dt| dt.to_rfc3339()),
            authenticated: true,
        };
        let json = serde_json::to_string(&doc)
            .map_err(|e| crate::StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::SESSION_TOKENS, &json)
    }

    /// Remove the stored token pair. Idempotent.
    pub fn clear(&self) -> StorageResult<()> {
        let _ = self.storage.delete(StorageKeys::SESSION_TOKENS);
        Ok(())
    }

    /// Whether a token pair is stored at all.
    pub fn has_session(&self) -> StorageResult<bool> {
        Ok(self.get()?.is_some())
    }

    /// The current access token, if any.
    pub fn access_token(&self) -> StorageResult<Option<String>> {
        Ok(self.get()?.map(|p| p.access_token))
    }

    /// The current refresh token, if any.
    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        Ok(self.get()?.and_then(|p| p.refresh_token))
    }

    /// Whether the stored access token is expired (with `skew_secs` slack).
    ///
    /// No stored pair reads as expired. An unknown expiry reads as NOT
    /// expired: the token is sent as-is and the server's verdict drives the
    /// refresh path (fail open to revalidation, not to a dead session).
    pub fn is_expired(&self, skew_secs: i64) -> StorageResult<bool> {
        match self.get()? {
            Some(pair) => match pair.remaining_secs(Utc::now()) {
                Some(remaining) => Ok(remaining < skew_secs),
                None => Ok(false),
            },
            None => Ok(true),
        }
    }

    /// Seconds until the stored token expires; `None` when unknown or absent.
    pub fn remaining_secs(&self) -> StorageResult<Option<i64>> {
        Ok(self.get()?.and_then(|p| p.remaining_secs(Utc::now())))
    }
}
