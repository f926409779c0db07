//! Access-token acquisition
//!
//! The crawler never performs the interactive authorization-code dance;
//! it consumes tokens already persisted on disk and refreshes the access
//! token through the provider's token endpoint when the cached one nears
//! its TTL. Provider tokens expire at 3600 s; refreshing at 3540 s avoids
//! a 401 race at the boundary.

use crate::config::AuthConfig;
use crate::AuthError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

/// Seconds after which a cached access token is considered stale
const TOKEN_REFRESH_AGE_SECS: u64 = 3540;

/// Supplies a bearer token for authenticated API calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a valid access token, refreshing transparently if needed
    async fn get_access_token(&self) -> Result<String, AuthError>;
}

/// A fixed token, for tests and short-lived tooling
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_access_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    fetched_at: SystemTime,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.fetched_at
            .elapsed()
            .map(|age| age < Duration::from_secs(TOKEN_REFRESH_AGE_SECS))
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// File-backed token provider with transparent refresh
///
/// The access token file doubles as the cache across process restarts:
/// its modification time tells how old the token is.
pub struct FileTokenProvider {
    config: AuthConfig,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl FileTokenProvider {
    pub fn new(config: AuthConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            cached: Mutex::new(None),
        }
    }

    /// Reads the persisted access token if it is still fresh
    fn read_persisted(&self) -> Option<CachedToken> {
        let meta = std::fs::metadata(&self.config.access_token_path).ok()?;
        let fetched_at = meta.modified().ok()?;
        let token = std::fs::read_to_string(&self.config.access_token_path).ok()?;
        let token = token.trim().to_string();
        if token.is_empty() {
            return None;
        }

        let cached = CachedToken { token, fetched_at };
        cached.is_fresh().then_some(cached)
    }

    /// Exchanges the refresh token for a new access token
    async fn refresh(&self) -> Result<CachedToken, AuthError> {
        let refresh_token = std::fs::read_to_string(&self.config.refresh_token_path)
            .map_err(|_| AuthError::MissingRefreshToken)?;
        let refresh_token = refresh_token.trim().to_string();
        if refresh_token.is_empty() {
            return Err(AuthError::MissingRefreshToken);
        }

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::RefreshFailed(format!(
                "token endpoint returned status {}",
                status.as_u16()
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("invalid token response: {}", e)))?;

        self.persist(&tokens)?;

        Ok(CachedToken {
            token: tokens.access_token,
            fetched_at: SystemTime::now(),
        })
    }

    fn persist(&self, tokens: &TokenResponse) -> Result<(), AuthError> {
        if let Some(parent) = std::path::Path::new(&self.config.access_token_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config.access_token_path, &tokens.access_token)?;

        // The provider may rotate the refresh token on use
        if let Some(refresh) = &tokens.refresh_token {
            std::fs::write(&self.config.refresh_token_path, refresh)?;
        }

        Ok(())
    }
}

#[async_trait]
impl TokenProvider for FileTokenProvider {
    async fn get_access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh() {
                return Ok(token.token.clone());
            }
        }

        if let Some(token) = self.read_persisted() {
            let value = token.token.clone();
            *cached = Some(token);
            return Ok(value);
        }

        tracing::debug!("Access token stale or missing, refreshing");
        let token = self.refresh().await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }
}
