//! Phase-based sync scheduling
//!
//! The scheduler cycles through the entity phases, each phase draining its
//! incomplete frontier one batch at a time. Completing a batch of one kind
//! typically discovers stubs of the next kind, so the cycle repeats until a
//! full pass finds nothing left to fetch.

use crate::catalog::{EntityKind, SimplifiedAlbum};
use crate::client::{BatchResolver, Fetcher, PaginatedCollector};
use crate::config::Config;
use crate::storage::CatalogStore;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Artists sampled per album-backfill batch
const BACKFILL_BATCH_SIZE: u32 = 10;

/// Batches between progress log lines
const PROGRESS_INTERVAL: u64 = 10;

/// The phases of one sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Resolve incomplete tracks via the batch track endpoint
    Tracks,
    /// Resolve incomplete albums via the batch album endpoint
    Albums,
    /// Resolve incomplete artists via the batch artist endpoint
    Artists,
    /// Walk the discographies of named artists, stubbing their albums
    ArtistAlbums,
    /// Terminal state: a full cycle found nothing left to fetch
    Converged,
}

impl SyncPhase {
    /// The phases of one cycle, in execution order
    pub fn cycle() -> [SyncPhase; 4] {
        [
            SyncPhase::Tracks,
            SyncPhase::Albums,
            SyncPhase::Artists,
            SyncPhase::ArtistAlbums,
        ]
    }

    fn position(&self) -> usize {
        match self {
            SyncPhase::Tracks => 0,
            SyncPhase::Albums => 1,
            SyncPhase::Artists => 2,
            SyncPhase::ArtistAlbums => 3,
            SyncPhase::Converged => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Tracks => "tracks",
            SyncPhase::Albums => "albums",
            SyncPhase::Artists => "artists",
            SyncPhase::ArtistAlbums => "artist-albums",
            SyncPhase::Converged => "converged",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tracks" => Ok(SyncPhase::Tracks),
            "albums" => Ok(SyncPhase::Albums),
            "artists" => Ok(SyncPhase::Artists),
            "artist-albums" => Ok(SyncPhase::ArtistAlbums),
            other => Err(format!(
                "unknown phase '{}' (expected tracks, albums, artists or artist-albums)",
                other
            )),
        }
    }
}

/// Summary of a completed scheduler run
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub cycles: u64,
    pub batches: u64,
    pub converged: bool,
}

/// Drives phases over a store and fetcher until convergence or stop
pub struct SyncScheduler<'a, S: CatalogStore> {
    store: &'a mut S,
    fetcher: &'a Fetcher,
    config: &'a Config,
    stop: Arc<AtomicBool>,
    start_phase: SyncPhase,
    batches: u64,
    /// IDs the upstream returned `null` for; their rows stay incomplete
    /// and sampling must not pick them again this run
    unresolvable: HashMap<EntityKind, HashSet<String>>,
}

impl<'a, S: CatalogStore> SyncScheduler<'a, S> {
    pub fn new(
        store: &'a mut S,
        fetcher: &'a Fetcher,
        config: &'a Config,
        stop: Arc<AtomicBool>,
        start_phase: SyncPhase,
    ) -> Self {
        Self {
            store,
            fetcher,
            config,
            stop,
            start_phase,
            batches: 0,
            unresolvable: HashMap::new(),
        }
    }

    /// Runs sync cycles until convergence or the stop flag is raised
    ///
    /// A batch-level fetch failure skips to the next phase; the sampled IDs
    /// stay incomplete and are retried in a later cycle. Storage errors
    /// abort the run.
    pub async fn run(&mut self) -> crate::Result<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        let mut first_cycle = true;

        loop {
            outcome.cycles += 1;
            tracing::debug!("Starting sync cycle {}", outcome.cycles);

            // The first cycle may start mid-way; only a full cycle counts
            // for the no-progress check below
            let skip_before = if first_cycle {
                self.start_phase.position()
            } else {
                0
            };
            let batches_before = self.batches;

            for phase in SyncPhase::cycle() {
                if phase.position() < skip_before {
                    continue;
                }
                if phase == SyncPhase::ArtistAlbums && !self.config.sync.backfill_albums {
                    continue;
                }
                if self.stopped() {
                    break;
                }

                self.run_phase(phase).await?;
            }
            first_cycle = false;
            outcome.batches = self.batches;

            if self.stopped() {
                tracing::info!("Stop requested, ending sync after {} batches", self.batches);
                return Ok(outcome);
            }

            if self.converged()? {
                tracing::info!(
                    "Catalog converged after {} cycles ({} batches)",
                    outcome.cycles,
                    self.batches
                );
                outcome.converged = true;
                return Ok(outcome);
            }

            // A full cycle that completed nothing cannot converge by
            // looping again: every remaining row is unresolvable or its
            // batch keeps failing. Stop; a rerun retries them fresh.
            if skip_before == 0 && self.batches == batches_before {
                tracing::warn!(
                    "No progress in a full cycle, stopping; incomplete rows remain \
                     ({} tracks, {} albums, {} artists)",
                    self.store.count_incomplete(EntityKind::Track)?,
                    self.store.count_incomplete(EntityKind::Album)?,
                    self.store.count_incomplete(EntityKind::Artist)?,
                );
                return Ok(outcome);
            }
        }
    }

    /// Drains one phase until its sample comes back empty or a batch fails
    async fn run_phase(&mut self, phase: SyncPhase) -> crate::Result<()> {
        tracing::debug!("Entering phase {}", phase);

        loop {
            if self.stopped() {
                return Ok(());
            }

            let progressed = match phase {
                SyncPhase::Tracks => self.run_batch(EntityKind::Track).await?,
                SyncPhase::Albums => self.run_batch(EntityKind::Album).await?,
                SyncPhase::Artists => self.run_batch(EntityKind::Artist).await?,
                SyncPhase::ArtistAlbums => self.run_backfill_batch().await?,
                SyncPhase::Converged => false,
            };

            if !progressed {
                return Ok(());
            }

            self.batches += 1;
            if self.batches % PROGRESS_INTERVAL == 0 {
                self.log_progress()?;
            }
        }
    }

    /// Fetches and persists one batch of a kind
    ///
    /// Returns whether the phase made progress and should continue. A
    /// batch that persists nothing is no progress: IDs the upstream does
    /// not know come back as dropped `null` entries, and resampling them
    /// would refetch the same rows forever.
    async fn run_batch(&mut self, kind: EntityKind) -> crate::Result<bool> {
        let ids = self.sample_resolvable(kind)?;
        if ids.is_empty() {
            return Ok(false);
        }

        let resolver = BatchResolver::new(self.fetcher, &self.config.provider.api_base_url);
        let persisted: Vec<String> = match kind {
            EntityKind::Track => match resolver.resolve_tracks(&ids).await {
                Ok(tracks) => {
                    self.store.upsert_tracks(&tracks)?;
                    tracks.into_iter().map(|t| t.id).collect()
                }
                Err(e) => return Ok(self.note_batch_failure(kind, &e)),
            },
            EntityKind::Album => match resolver.resolve_albums(&ids).await {
                Ok(albums) => {
                    self.store.upsert_albums(&albums)?;
                    albums.into_iter().map(|a| a.id).collect()
                }
                Err(e) => return Ok(self.note_batch_failure(kind, &e)),
            },
            EntityKind::Artist => match resolver.resolve_artists(&ids).await {
                Ok(artists) => {
                    self.store.upsert_artists(&artists)?;
                    artists.into_iter().map(|a| a.id).collect()
                }
                Err(e) => return Ok(self.note_batch_failure(kind, &e)),
            },
        };

        self.note_unresolved(kind, &ids, &persisted);
        Ok(!persisted.is_empty())
    }

    /// Samples incomplete IDs, skipping those already found unresolvable
    fn sample_resolvable(&self, kind: EntityKind) -> crate::Result<Vec<String>> {
        let skip = self.unresolvable.get(&kind);
        let ids = self
            .store
            .sample_incomplete(kind, kind.batch_limit() as u32)?
            .into_iter()
            .filter(|id| skip.map_or(true, |set| !set.contains(id)))
            .collect();
        Ok(ids)
    }

    /// Remembers sampled IDs the upstream answered without a payload for
    fn note_unresolved(&mut self, kind: EntityKind, requested: &[String], persisted: &[String]) {
        let resolved: HashSet<&str> = persisted.iter().map(String::as_str).collect();
        let unknown: Vec<&String> = requested
            .iter()
            .filter(|id| !resolved.contains(id.as_str()))
            .collect();
        if unknown.is_empty() {
            return;
        }

        tracing::warn!(
            "{} {} IDs unknown upstream, their rows stay incomplete",
            unknown.len(),
            kind
        );
        let set = self.unresolvable.entry(kind).or_default();
        for id in unknown {
            set.insert(id.clone());
        }
    }

    fn note_batch_failure(&self, kind: EntityKind, error: &crate::FetchError) -> bool {
        tracing::warn!(
            "Batch of {}s failed, leaving IDs for a later cycle: {}",
            kind,
            error
        );
        false
    }

    /// Walks the discographies of one batch of backfill candidates
    ///
    /// An artist whose walk fails stays unmarked and is resampled later; a
    /// batch where every walk failed ends the phase so the cycle can move on.
    async fn run_backfill_batch(&mut self) -> crate::Result<bool> {
        let artists = self.store.sample_artists_pending_albums(BACKFILL_BATCH_SIZE)?;
        if artists.is_empty() {
            return Ok(false);
        }

        let collector = PaginatedCollector::new(self.fetcher, self.config.provider.page_size);
        let mut walked = 0usize;

        for artist_id in &artists {
            if self.stopped() {
                break;
            }

            let endpoint = format!(
                "{}/artists/{}/albums",
                self.config.provider.api_base_url, artist_id
            );
            match collector.try_collect::<SimplifiedAlbum>(&endpoint).await {
                Ok(albums) => {
                    let ids: Vec<String> = albums.into_iter().map(|a| a.id).collect();
                    self.store.insert_stubs(EntityKind::Album, &ids)?;
                    self.store.mark_albums_retrieved(artist_id)?;
                    walked += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Album walk for artist {} failed, will resample: {}",
                        artist_id,
                        e
                    );
                }
            }
        }

        Ok(walked > 0)
    }

    /// Checks whether a completed cycle left nothing to fetch
    fn converged(&self) -> crate::Result<bool> {
        convergence_reached(&*self.store, self.config)
    }

    fn log_progress(&self) -> crate::Result<()> {
        tracing::info!(
            "Progress after {} batches: {} tracks, {} albums, {} artists incomplete ({} requests)",
            self.batches,
            self.store.count_incomplete(EntityKind::Track)?,
            self.store.count_incomplete(EntityKind::Album)?,
            self.store.count_incomplete(EntityKind::Artist)?,
            self.fetcher.limiter().total_requests(),
        );
        Ok(())
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// True when every incomplete count is zero and, if the backfill phase
/// participates in convergence, every named artist has been walked
pub fn convergence_reached<S: CatalogStore>(store: &S, config: &Config) -> crate::Result<bool> {
    for kind in [EntityKind::Track, EntityKind::Album, EntityKind::Artist] {
        if store.count_incomplete(kind)? > 0 {
            return Ok(false);
        }
    }

    if config.sync.backfill_albums
        && config.sync.backfill_in_convergence
        && store.count_artists_pending_albums()? > 0
    {
        return Ok(false);
    }

    Ok(true)
}
