use serde::Deserialize;

/// Main configuration structure for Discograph
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub output: OutputConfig,
}

/// Upstream API endpoints and fetch policy
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the metadata API (no trailing slash)
    #[serde(rename = "api-base-url")]
    pub api_base_url: String,

    /// Base URL of the secondary enrichment source (no trailing slash)
    #[serde(rename = "enrichment-base-url", default)]
    pub enrichment_base_url: Option<String>,

    /// Page size for paginated endpoints
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Maximum retry attempts for rate-limited or transient failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,
}

/// Scheduler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Whether the ArtistAlbums backfill phase runs at all
    #[serde(rename = "backfill-albums", default)]
    pub backfill_albums: bool,

    /// Whether an exhausted backfill queue is required for convergence
    #[serde(rename = "backfill-in-convergence", default = "default_true")]
    pub backfill_in_convergence: bool,

    /// Worker pool size for the genre/area enrichment pass
    #[serde(rename = "enrichment-workers", default = "default_enrichment_workers")]
    pub enrichment_workers: u32,
}

/// Sliding-window request caps
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests in any 30-second window
    #[serde(rename = "max-per-30-sec", default = "default_max_halfmin")]
    pub max_per_halfmin: u32,

    /// Maximum requests in any 1-hour window
    #[serde(rename = "max-per-hour", default = "default_max_hourly")]
    pub max_per_hour: u32,

    /// Maximum requests in any 1-day window
    #[serde(rename = "max-per-day", default = "default_max_daily")]
    pub max_per_day: u32,
}

/// Token endpoint and credential file locations
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// OAuth token endpoint used for refresh grants
    #[serde(rename = "token-url")]
    pub token_url: String,

    /// Application client ID
    #[serde(rename = "client-id")]
    pub client_id: String,

    /// Application client secret
    #[serde(rename = "client-secret")]
    pub client_secret: String,

    /// File holding the cached access token
    #[serde(rename = "access-token-path")]
    pub access_token_path: String,

    /// File holding the long-lived refresh token
    #[serde(rename = "refresh-token-path")]
    pub refresh_token_path: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the persisted rate-limiter state file
    #[serde(rename = "rate-state-path")]
    pub rate_state_path: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backfill_albums: false,
            backfill_in_convergence: true,
            enrichment_workers: default_enrichment_workers(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_halfmin: default_max_halfmin(),
            max_per_hour: default_max_hourly(),
            max_per_day: default_max_daily(),
        }
    }
}

fn default_page_size() -> u32 {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_enrichment_workers() -> u32 {
    5
}

fn default_max_halfmin() -> u32 {
    40
}

fn default_max_hourly() -> u32 {
    2500
}

fn default_max_daily() -> u32 {
    4500
}
