//! Genre and area enrichment
//!
//! A separate pass over the converged catalog: named artists lacking genre
//! or area rows are looked up against a secondary metadata source, a fixed
//! pool of workers fetching concurrently while sharing the one rate
//! limiter. Persistence stays sequential on the caller's store handle.

use crate::catalog::EnrichmentPayload;
use crate::client::Fetcher;
use crate::storage::CatalogStore;
use crate::{FetchError, FetchResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Artists sampled per enrichment round
const ENRICH_SAMPLE_SIZE: u32 = 50;

/// Builds the per-artist lookup URL on the secondary source
///
/// The artist name goes through proper query encoding; names with spaces,
/// ampersands or non-ASCII are common.
fn enrichment_url(base_url: &str, name: &str) -> FetchResult<String> {
    let mut url = Url::parse(&format!("{}/artist-info", base_url))
        .map_err(|e| FetchError::Validation(format!("bad enrichment base URL: {}", e)))?;
    url.query_pairs_mut().append_pair("name", name);
    Ok(url.into())
}

/// Enriches pending artists until the queue is drained or stop is raised
///
/// Returns the number of artists enriched. Artists whose lookup fails (or
/// yields nothing to persist) are remembered for the session so a round
/// cannot resample them forever; they are retried on the next run.
pub async fn run_enrichment<S: CatalogStore>(
    store: &mut S,
    fetcher: &Fetcher,
    base_url: &str,
    workers: u32,
    stop: Arc<AtomicBool>,
) -> crate::Result<u64> {
    let semaphore = Arc::new(Semaphore::new(workers as usize));
    let mut attempted: HashSet<String> = HashSet::new();
    let mut enriched = 0u64;

    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        // Widen the sample past already-attempted artists so a cluster of
        // failures at the top of the popularity order cannot end the pass
        // while unattempted artists remain
        let sample_limit = ENRICH_SAMPLE_SIZE + attempted.len() as u32;
        let candidates: Vec<(String, String)> = store
            .sample_artists_pending_enrichment(sample_limit)?
            .into_iter()
            .filter(|(id, _)| !attempted.contains(id))
            .take(ENRICH_SAMPLE_SIZE as usize)
            .collect();
        if candidates.is_empty() {
            break;
        }

        let mut pool: JoinSet<(String, FetchResult<EnrichmentPayload>)> = JoinSet::new();
        for (artist_id, name) in candidates {
            let semaphore = semaphore.clone();
            let fetcher = fetcher.clone();
            let url = enrichment_url(base_url, &name);

            pool.spawn(async move {
                let url = match url {
                    Ok(url) => url,
                    Err(e) => return (artist_id, Err(e)),
                };
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            artist_id,
                            Err(FetchError::TransientTransport(
                                "enrichment pool closed".to_string(),
                            )),
                        )
                    }
                };

                let result = fetcher.get_json(&url).await.and_then(|raw| {
                    serde_json::from_value(raw).map_err(|e| {
                        FetchError::MalformedResponse(format!("enrichment payload: {}", e))
                    })
                });
                (artist_id, result)
            });
        }

        while let Some(joined) = pool.join_next().await {
            let (artist_id, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!("Enrichment worker panicked: {}", e);
                    continue;
                }
            };
            attempted.insert(artist_id.clone());

            match result {
                Ok(payload) => {
                    store.upsert_artist_enrichment(&artist_id, &payload)?;
                    enriched += 1;
                }
                Err(e) => {
                    tracing::warn!("Enrichment lookup for artist {} failed: {}", artist_id, e);
                }
            }
        }
    }

    tracing::info!("Enriched {} artists", enriched);
    Ok(enriched)
}
