//! Durable client-side storage for the Minuet runtime.
//!
//! This crate provides:
//! - The `SecureStorage` trait abstracting the persistence backend
//! - A file-backed JSON store with atomic writes (the default backend)
//! - Storage key constants for the persisted session documents
//! - `TokenVault`, the single source of truth for the session token pair

mod file_store;
mod jwt;
mod keys;
mod traits;
mod vault;

pub use file_store::FileStore;
pub use jwt::decode_exp;
pub use keys::StorageKeys;
pub use traits::SecureStorage;
pub use vault::{TokenPair, TokenVault};

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
