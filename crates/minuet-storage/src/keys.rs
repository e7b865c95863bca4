//! Storage key constants.

/// Storage keys used by the client runtime.
///
/// Each key maps to one persisted JSON document. Consumers must tolerate a
/// missing or malformed document by falling back to the empty state.
pub struct StorageKeys;

impl StorageKeys {
    /// Session token pair + auth flag (JSON)
    pub const SESSION_TOKENS: &'static str = "session_tokens";

    /// Cached session profile from /auth/me (JSON)
    pub const SESSION_PROFILE: &'static str = "session_profile";

    /// UI preferences (theme, sidebar) — written by hosts, not the core
    pub const UI_PREFERENCES: &'static str = "ui_preferences";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys_unique() {
        let keys = [
            StorageKeys::SESSION_TOKENS,
            StorageKeys::SESSION_PROFILE,
            StorageKeys::UI_PREFERENCES,
        ];
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len(), "Storage keys must be unique");
        assert!(keys.iter().all(|k| !k.is_empty()));
    }
}
