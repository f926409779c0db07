//! Configuration loading and validation
//!
//! Discograph is configured from a single TOML file covering the upstream
//! provider endpoints, scheduler behavior, rate-limit window caps, token
//! credentials, and output paths.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{
    AuthConfig, Config, OutputConfig, ProviderConfig, RateLimitConfig, SyncConfig,
};
pub use validation::validate;
