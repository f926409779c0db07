use crate::config::types::{
    AuthConfig, Config, OutputConfig, ProviderConfig, RateLimitConfig, SyncConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_provider_config(&config.provider)?;
    validate_sync_config(&config.sync)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_auth_config(&config.auth)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates provider endpoints and fetch policy
fn validate_provider_config(config: &ProviderConfig) -> Result<(), ConfigError> {
    validate_base_url("api-base-url", &config.api_base_url)?;

    if let Some(enrichment) = &config.enrichment_base_url {
        validate_base_url("enrichment-base-url", enrichment)?;
    }

    if config.page_size < 1 || config.page_size > 50 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 50, got {}",
            config.page_size
        )));
    }

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates scheduler configuration
fn validate_sync_config(config: &SyncConfig) -> Result<(), ConfigError> {
    if config.enrichment_workers < 1 || config.enrichment_workers > 20 {
        return Err(ConfigError::Validation(format!(
            "enrichment-workers must be between 1 and 20, got {}",
            config.enrichment_workers
        )));
    }

    Ok(())
}

/// Validates window caps
///
/// The caps must be ordered: a tighter short window than long window is the
/// expected shape, and a zero cap would deadlock the limiter.
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.max_per_halfmin < 1 {
        return Err(ConfigError::Validation(
            "max-per-30-sec must be >= 1".to_string(),
        ));
    }

    if config.max_per_hour < config.max_per_halfmin {
        return Err(ConfigError::Validation(format!(
            "max-per-hour ({}) must be >= max-per-30-sec ({})",
            config.max_per_hour, config.max_per_halfmin
        )));
    }

    if config.max_per_day < config.max_per_hour {
        return Err(ConfigError::Validation(format!(
            "max-per-day ({}) must be >= max-per-hour ({})",
            config.max_per_day, config.max_per_hour
        )));
    }

    Ok(())
}

/// Validates token endpoint and credential paths
fn validate_auth_config(config: &AuthConfig) -> Result<(), ConfigError> {
    validate_base_url("token-url", &config.token_url)?;

    if config.client_id.is_empty() {
        return Err(ConfigError::Validation(
            "client-id cannot be empty".to_string(),
        ));
    }

    if config.access_token_path.is_empty() || config.refresh_token_path.is_empty() {
        return Err(ConfigError::Validation(
            "token paths cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.rate_state_path.is_empty() {
        return Err(ConfigError::Validation(
            "rate-state-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_base_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must be http or https, got '{}'",
            field,
            url.scheme()
        )));
    }

    if value.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "{} must not end with a trailing slash",
            field
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            provider: ProviderConfig {
                api_base_url: "https://api.example.com/v1".to_string(),
                enrichment_base_url: Some("https://enrich.example.com/ws".to_string()),
                page_size: 50,
                max_retries: 3,
            },
            sync: SyncConfig::default(),
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig {
                token_url: "https://accounts.example.com/api/token".to_string(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                access_token_path: "./temp/access_token".to_string(),
                refresh_token_path: "./temp/refresh_token".to_string(),
            },
            output: OutputConfig {
                database_path: "./db/catalog.sqlite".to_string(),
                rate_state_path: "./db/request_log.json".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_rejects_trailing_slash_base_url() {
        let mut config = valid_config();
        config.provider.api_base_url = "https://api.example.com/v1/".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let mut config = valid_config();
        config.provider.api_base_url = "ftp://api.example.com".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_rejects_oversize_page() {
        let mut config = valid_config();
        config.provider.page_size = 100;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_window_caps() {
        let mut config = valid_config();
        config.rate_limit.max_per_hour = 10;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let mut config = valid_config();
        config.sync.enrichment_workers = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_database_path() {
        let mut config = valid_config();
        config.output.database_path = String::new();
        assert!(validate(&config).is_err());
    }
}
