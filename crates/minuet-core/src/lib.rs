//! Shared configuration, paths, and logging for the Minuet client runtime.
//!
//! This crate provides:
//! - Configuration loading (config file + environment overrides)
//! - File system path management (`~/.minuet`)
//! - Logging initialization via `tracing-subscriber`
//! - The core error type shared by the above

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_API_URL, DEFAULT_LOG_LEVEL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
