//! Run wiring and lifecycle
//!
//! The coordinator owns everything a sync run needs: it opens the store,
//! restores persisted rate-limiter state, builds the HTTP stack, seeds an
//! empty catalog from the user's saved tracks, drives the scheduler, runs
//! the enrichment pass once the catalog has converged, and flushes limiter
//! state back to disk on the way out.

use crate::auth::{FileTokenProvider, TokenProvider};
use crate::catalog::{EntityKind, SavedTrackItem, TrackPayload};
use crate::client::{build_http_client, Fetcher, PaginatedCollector};
use crate::config::Config;
use crate::ratelimit::{RateLimiter, RateLimiterState};
use crate::storage::{CatalogStore, SqliteStore};
use crate::sync::{run_enrichment, SyncOutcome, SyncPhase, SyncScheduler};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Wires config, store, limiter and client into a complete sync run
pub struct Coordinator {
    config: Config,
    stop: Arc<AtomicBool>,
}

impl Coordinator {
    pub fn new(config: Config, stop: Arc<AtomicBool>) -> Self {
        Self { config, stop }
    }

    /// Executes one full sync run starting at the given phase
    ///
    /// Limiter state is flushed even when the run ends early on the stop
    /// flag; the store itself needs no flush, every batch was committed.
    pub async fn run(&self, start_phase: SyncPhase) -> crate::Result<SyncOutcome> {
        let mut store = SqliteStore::new(Path::new(&self.config.output.database_path))?;

        let rate_state_path = Path::new(&self.config.output.rate_state_path).to_path_buf();
        let state = RateLimiterState::load(&rate_state_path);
        tracing::info!(
            "Resuming rate-limiter state: {} lifetime requests, {} in the last day",
            state.total_requests,
            state.daily.len()
        );
        let limiter = Arc::new(RateLimiter::with_state(&self.config.rate_limit, state));

        let client = build_http_client()?;
        let tokens: Arc<dyn TokenProvider> = Arc::new(FileTokenProvider::new(
            self.config.auth.clone(),
            client.clone(),
        ));
        let fetcher = Fetcher::new(
            client,
            limiter.clone(),
            tokens,
            self.config.provider.max_retries,
        );

        if store.count_rows(EntityKind::Track)? == 0 {
            let seeded = self.seed(&mut store, &fetcher).await?;
            if seeded == 0 {
                // Without a seed the scheduler would report the empty
                // catalog as converged; that silence hides a broken walk
                tracing::warn!(
                    "Seed walk produced no tracks; nothing to synchronize, rerun to retry"
                );
                limiter.snapshot().save(&rate_state_path)?;
                return Ok(SyncOutcome::default());
            }
        }

        let outcome = SyncScheduler::new(
            &mut store,
            &fetcher,
            &self.config,
            self.stop.clone(),
            start_phase,
        )
        .run()
        .await?;

        if outcome.converged && !self.stop.load(Ordering::Relaxed) {
            if let Some(enrichment_base) = &self.config.provider.enrichment_base_url {
                run_enrichment(
                    &mut store,
                    &fetcher,
                    enrichment_base,
                    self.config.sync.enrichment_workers,
                    self.stop.clone(),
                )
                .await?;
            }
        }

        limiter.snapshot().save(&rate_state_path)?;
        tracing::info!(
            "Sync run finished: {} cycles, {} batches, converged: {}",
            outcome.cycles,
            outcome.batches,
            outcome.converged
        );

        Ok(outcome)
    }

    /// Seeds an empty catalog from the user's saved-tracks collection,
    /// returning the number of tracks seeded
    ///
    /// Truncation is acceptable here: whatever the walk missed is simply
    /// absent from the seed, and later runs re-seed only if the table is
    /// still empty.
    async fn seed(&self, store: &mut SqliteStore, fetcher: &Fetcher) -> crate::Result<usize> {
        let endpoint = format!("{}/me/tracks", self.config.provider.api_base_url);
        tracing::info!("Track table empty, seeding from {}", endpoint);

        let collector = PaginatedCollector::new(fetcher, self.config.provider.page_size);
        let saved: Vec<SavedTrackItem> = collector.collect(&endpoint).await;
        let tracks: Vec<TrackPayload> = saved.into_iter().map(|item| item.track).collect();

        // Saved-track items carry full track payloads; the seed is upserted
        // in batch-sized slices to keep transactions bounded
        for chunk in tracks.chunks(EntityKind::Track.batch_limit()) {
            store.upsert_tracks(chunk)?;
        }

        tracing::info!("Seeded {} saved tracks", tracks.len());
        Ok(tracks.len())
    }
}
