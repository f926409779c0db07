//! Discograph: a bulk music-catalog synchronizer
//!
//! This crate crawls a music-metadata REST API (paginated collections,
//! singleton lookups, batch lookups) under multi-tier rate limits and
//! incrementally populates a SQLite store with partially-known entities
//! until every entity reaches a complete state.

pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod ratelimit;
pub mod storage;
pub mod sync;

use thiserror::Error;

/// Main error type for Discograph operations
#[derive(Debug, Error)]
pub enum DiscographError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Rate limiter state error: {0}")]
    RateState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Failure taxonomy for a single upstream fetch
///
/// `RateLimited` and `TransientTransport` are retried inside the fetcher;
/// the remaining variants surface to the caller on the first occurrence.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Rate limited by upstream (retry after {retry_after}s)")]
    RateLimited { retry_after: u64 },

    #[error("Transient transport error: {0}")]
    TransientTransport(String),

    #[error("Permanent HTTP error: status {status}")]
    PermanentHttp { status: u16 },

    #[error("Malformed response body: {0}")]
    MalformedResponse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Unauthenticated(#[from] AuthError),
}

/// Token acquisition errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("IO error reading token: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Discograph operations
pub type Result<T> = std::result::Result<T, DiscographError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use catalog::EntityKind;
pub use config::Config;
pub use ratelimit::RateLimiter;
pub use sync::{SyncPhase, SyncScheduler};
