//! Persisted rate-limiter state
//!
//! The limiter's request history must survive process restarts: a window
//! spanning the restart would otherwise be forgotten and burst through a
//! provider limit. The state is a small JSON record written at shutdown
//! (and periodically) and read back at startup.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// Snapshot of the limiter's request history
///
/// Timestamps are epoch seconds so the record stays meaningful across
/// process lifetimes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimiterState {
    pub total_requests: u64,
    #[serde(default)]
    pub halfmin: VecDeque<f64>,
    #[serde(default)]
    pub hourly: VecDeque<f64>,
    #[serde(default)]
    pub daily: VecDeque<f64>,
}

impl RateLimiterState {
    /// Loads persisted state, falling back to a fresh record
    ///
    /// A missing or unreadable file is not an error: the limiter starts
    /// conservative either way, and a corrupt record is worth less than a
    /// clean start.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                tracing::info!("No rate-limiter state at {}, starting fresh", path.display());
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    "Failed to decode rate-limiter state at {}: {}, starting fresh",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Writes the state to disk as JSON
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(self).map_err(std::io::Error::other)?;
        std::fs::write(path, content)
    }
}
