//! Batch entity resolution
//!
//! Resolves a bounded list of entity IDs in a single upstream request.
//! Batch size limits are validated before any network call; chunking
//! beyond the limit is the caller's responsibility.

use crate::catalog::{AlbumPayload, ArtistPayload, EntityKind, TrackPayload};
use crate::client::Fetcher;
use crate::{FetchError, FetchResult};
use serde::de::DeserializeOwned;

/// Resolves ID batches against the kind-specific batch endpoints
pub struct BatchResolver<'a> {
    fetcher: &'a Fetcher,
    base_url: &'a str,
}

impl<'a> BatchResolver<'a> {
    pub fn new(fetcher: &'a Fetcher, base_url: &'a str) -> Self {
        Self { fetcher, base_url }
    }

    /// Fetches one batch of raw payloads for the given kind
    ///
    /// Fails fast with a validation error when `ids` exceeds the kind's
    /// batch limit. An empty `ids` yields an empty result without touching
    /// the network. IDs unknown upstream come back as `null` entries and
    /// are dropped; the corresponding rows simply stay incomplete.
    pub async fn resolve_raw(
        &self,
        kind: EntityKind,
        ids: &[String],
    ) -> FetchResult<Vec<serde_json::Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        if ids.len() > kind.batch_limit() {
            return Err(FetchError::Validation(format!(
                "batch of {} {}s exceeds the limit of {}",
                ids.len(),
                kind,
                kind.batch_limit()
            )));
        }

        let url = format!("{}/{}?ids={}", self.base_url, kind.plural(), ids.join(","));
        let body = self.fetcher.get_json(&url).await?;

        let payloads = body
            .get(kind.plural())
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                FetchError::MalformedResponse(format!(
                    "batch response missing '{}' array",
                    kind.plural()
                ))
            })?;

        Ok(payloads
            .iter()
            .filter(|v| !v.is_null())
            .cloned()
            .collect())
    }

    pub async fn resolve_tracks(&self, ids: &[String]) -> FetchResult<Vec<TrackPayload>> {
        self.resolve_typed(EntityKind::Track, ids).await
    }

    pub async fn resolve_albums(&self, ids: &[String]) -> FetchResult<Vec<AlbumPayload>> {
        self.resolve_typed(EntityKind::Album, ids).await
    }

    pub async fn resolve_artists(&self, ids: &[String]) -> FetchResult<Vec<ArtistPayload>> {
        self.resolve_typed(EntityKind::Artist, ids).await
    }

    async fn resolve_typed<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        ids: &[String],
    ) -> FetchResult<Vec<T>> {
        let raw = self.resolve_raw(kind, ids).await?;
        raw.into_iter()
            .map(|v| {
                serde_json::from_value(v).map_err(|e| {
                    FetchError::MalformedResponse(format!("invalid {} payload: {}", kind, e))
                })
            })
            .collect()
    }
}
