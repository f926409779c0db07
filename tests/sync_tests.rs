//! Integration tests for the synchronizer
//!
//! These tests use wiremock to stand in for the upstream metadata API and
//! drive the client, scheduler and coordinator end-to-end against it.

use discograph::auth::StaticTokenProvider;
use discograph::catalog::SavedTrackItem;
use discograph::client::{build_http_client, BatchResolver, Fetcher, PaginatedCollector};
use discograph::config::{Config, RateLimitConfig};
use discograph::storage::{CatalogStore, SqliteStore};
use discograph::sync::{run_enrichment, Coordinator, SyncScheduler};
use discograph::{EntityKind, FetchError, RateLimiter, SyncPhase};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn test_fetcher(max_retries: u32) -> Fetcher {
    Fetcher::new(
        build_http_client().expect("Failed to build client"),
        Arc::new(RateLimiter::new(&RateLimitConfig::default())),
        Arc::new(StaticTokenProvider::new("test-token")),
        max_retries,
    )
}

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, db_path: &str, state_dir: &std::path::Path) -> Config {
    toml::from_str(&format!(
        r#"
        [provider]
        api-base-url = "{base}"

        [auth]
        token-url = "{base}/token"
        client-id = "client"
        client-secret = "secret"
        access-token-path = "{dir}/access_token"
        refresh-token-path = "{dir}/refresh_token"

        [output]
        database-path = "{db}"
        rate-state-path = "{dir}/request_log.json"
        "#,
        base = base_url,
        db = db_path,
        dir = state_dir.display(),
    ))
    .expect("Failed to build test config")
}

fn saved_track_json(index: u64) -> serde_json::Value {
    serde_json::json!({
        "track": {
            "id": format!("t{}", index),
            "name": format!("Track {}", index),
            "album": {"id": format!("al{}", index % 4)},
            "artists": [{"id": format!("ar{}", index % 6)}],
            "duration_ms": 200_000,
            "popularity": 40,
            "explicit": false,
            "track_number": 1
        }
    })
}

/// Answers batch endpoints by fabricating a complete payload per requested ID
///
/// Track `t{i}` belongs to album `al{i % 4}` and artist `ar{i % 6}`; album
/// `al{j}` is credited to artist `ar{j}`. The fabricated catalog is closed:
/// every reference points at an entity the mock can also resolve. IDs
/// prefixed `x` are unknown to the catalog and answered with `null`, the
/// way the upstream reports IDs it cannot resolve.
struct BatchResponder {
    kind: EntityKind,
}

impl BatchResponder {
    fn index(id: &str) -> u64 {
        id.trim_start_matches(|c: char| c.is_alphabetic())
            .parse()
            .unwrap_or(0)
    }

    fn payload(&self, id: &str) -> serde_json::Value {
        if id.starts_with('x') {
            return serde_json::Value::Null;
        }
        let index = Self::index(id);
        match self.kind {
            EntityKind::Track => serde_json::json!({
                "id": id,
                "name": format!("Track {}", index),
                "album": {"id": format!("al{}", index % 4)},
                "artists": [{"id": format!("ar{}", index % 6)}],
                "duration_ms": 200_000,
                "popularity": 40,
                "explicit": false,
                "track_number": 1
            }),
            EntityKind::Album => serde_json::json!({
                "id": id,
                "name": format!("Album {}", index),
                "release_date": "2001",
                "total_tracks": 10,
                "artists": [{"id": format!("ar{}", index)}]
            }),
            EntityKind::Artist => serde_json::json!({
                "id": id,
                "name": format!("Artist {}", index),
                "popularity": 30,
                "followers": {"total": 500},
                "genres": []
            }),
        }
    }
}

impl Respond for BatchResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let ids: Vec<String> = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "ids")
            .map(|(_, value)| value.split(',').map(str::to_string).collect())
            .unwrap_or_default();

        let payloads: Vec<serde_json::Value> =
            ids.iter().map(|id| self.payload(id)).collect();
        ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({ (self.kind.plural()): payloads }))
    }
}

/// Mounts the three batch endpoints backed by `BatchResponder`
async fn mount_batch_endpoints(server: &MockServer) {
    for kind in [EntityKind::Track, EntityKind::Album, EntityKind::Artist] {
        Mock::given(method("GET"))
            .and(path(format!("/{}", kind.plural())))
            .respond_with(BatchResponder { kind })
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_pagination_collects_all_pages() {
    let mock_server = MockServer::start().await;

    // 130 items over 3 pages of 50
    for offset in [0u64, 50, 100] {
        let count = std::cmp::min(50, 130 - offset);
        let items: Vec<serde_json::Value> =
            (offset..offset + count).map(saved_track_json).collect();
        Mock::given(method("GET"))
            .and(path("/me/tracks"))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 130,
                "items": items
            })))
            .mount(&mock_server)
            .await;
    }

    let fetcher = test_fetcher(3);
    let collector = PaginatedCollector::new(&fetcher, 50);
    let items: Vec<SavedTrackItem> = collector
        .collect(&format!("{}/me/tracks", mock_server.uri()))
        .await;

    assert_eq!(items.len(), 130);
    assert_eq!(items[0].track.id, "t0");
    assert_eq!(items[129].track.id, "t129");
    assert_eq!(fetcher.limiter().total_requests(), 3);
}

#[tokio::test]
async fn test_retry_after_honored_then_fails_typed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tracks"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .mount(&mock_server)
        .await;

    // Two attempts: one backoff sleep of the full Retry-After hint
    let fetcher = test_fetcher(2);
    let started = Instant::now();
    let result = fetcher
        .get_json(&format!("{}/tracks?ids=t1", mock_server.uri()))
        .await;
    let elapsed = started.elapsed();

    assert!(
        matches!(result, Err(FetchError::RateLimited { retry_after: 1 })),
        "expected typed rate-limit failure, got {:?}",
        result
    );
    assert!(
        elapsed >= Duration::from_secs(1),
        "expected at least the 1s Retry-After sleep, elapsed {:?}",
        elapsed
    );
    assert_eq!(fetcher.limiter().total_requests(), 2);
}

#[tokio::test]
async fn test_rate_limited_request_recovers() {
    let mock_server = MockServer::start().await;

    // First hit is throttled, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/artists"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artists"))
        .respond_with(BatchResponder {
            kind: EntityKind::Artist,
        })
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(3);
    let base_url = mock_server.uri();
    let resolver = BatchResolver::new(&fetcher, &base_url);
    let artists = resolver
        .resolve_artists(&["ar1".to_string()])
        .await
        .expect("Retry should recover");

    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].name, "Artist 1");
}

#[tokio::test]
async fn test_full_track_batch_resolves() {
    let mock_server = MockServer::start().await;
    mount_batch_endpoints(&mock_server).await;

    let fetcher = test_fetcher(3);
    let base_url = mock_server.uri();
    let resolver = BatchResolver::new(&fetcher, &base_url);

    let ids: Vec<String> = (0..50).map(|i| format!("t{}", i)).collect();
    let tracks = resolver
        .resolve_tracks(&ids)
        .await
        .expect("Batch of 50 tracks should resolve");

    assert_eq!(tracks.len(), 50);
    assert_eq!(fetcher.limiter().total_requests(), 1);
}

#[tokio::test]
async fn test_permanent_error_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/albums"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(3);
    let result = fetcher
        .get_json(&format!("{}/albums?ids=al1", mock_server.uri()))
        .await;

    assert!(matches!(
        result,
        Err(FetchError::PermanentHttp { status: 500 })
    ));
    assert_eq!(fetcher.limiter().total_requests(), 1);
}

#[tokio::test]
async fn test_scheduler_converges_from_stub_seed() {
    let mock_server = MockServer::start().await;
    mount_batch_endpoints(&mock_server).await;

    // 10 stub tracks referencing 4 distinct albums and 6 distinct artists
    let mut store = SqliteStore::new_in_memory().expect("Failed to open store");
    let seed: Vec<String> = (0..10).map(|i| format!("t{}", i)).collect();
    store
        .insert_stubs(EntityKind::Track, &seed)
        .expect("Failed to seed stubs");

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), ":memory:", dir.path());
    let fetcher = test_fetcher(3);
    let stop = Arc::new(AtomicBool::new(false));

    let outcome =
        SyncScheduler::new(&mut store, &fetcher, &config, stop, SyncPhase::Tracks)
            .run()
            .await
            .expect("Scheduler run failed");

    assert!(outcome.converged, "Expected convergence, got {:?}", outcome);

    for kind in [EntityKind::Track, EntityKind::Album, EntityKind::Artist] {
        assert_eq!(
            store.count_incomplete(kind).expect("count failed"),
            0,
            "{}s should be complete",
            kind
        );
    }
    assert_eq!(store.count_rows(EntityKind::Track).unwrap(), 10);
    assert_eq!(store.count_rows(EntityKind::Album).unwrap(), 4);
    assert_eq!(store.count_rows(EntityKind::Artist).unwrap(), 6);
    assert_eq!(store.count_relations("track_artists").unwrap(), 10);
    assert_eq!(store.count_relations("album_artists").unwrap(), 4);

    let album = store.get_album("al2").unwrap().expect("album missing");
    assert_eq!(album.name.as_deref(), Some("Album 2"));
    assert_eq!(album.release_date.as_deref(), Some("2001-01-01"));
}

#[tokio::test]
async fn test_unknown_ids_do_not_stall_the_scheduler() {
    let mock_server = MockServer::start().await;
    mount_batch_endpoints(&mock_server).await;

    // One resolvable stub and one the upstream answers with null
    let mut store = SqliteStore::new_in_memory().expect("Failed to open store");
    store
        .insert_stubs(
            EntityKind::Track,
            &["t0".to_string(), "x1".to_string()],
        )
        .expect("Failed to seed stubs");

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), ":memory:", dir.path());
    let fetcher = test_fetcher(3);
    let stop = Arc::new(AtomicBool::new(false));

    // The run must terminate: the unknown ID is left incomplete rather
    // than resampled and refetched forever
    let outcome = tokio::time::timeout(
        Duration::from_secs(30),
        SyncScheduler::new(&mut store, &fetcher, &config, stop, SyncPhase::Tracks).run(),
    )
    .await
    .expect("Scheduler stalled on an unresolvable ID")
    .expect("Scheduler run failed");

    assert!(!outcome.converged);
    let resolved = store.get_track("t0").unwrap().expect("track missing");
    assert_eq!(resolved.name.as_deref(), Some("Track 0"));
    let unknown = store.get_track("x1").unwrap().expect("stub missing");
    assert!(unknown.name.is_none());
    assert_eq!(store.count_incomplete(EntityKind::Track).unwrap(), 1);
}

#[tokio::test]
async fn test_pagination_follows_next_when_total_absent() {
    let mock_server = MockServer::start().await;

    // Cursor-style endpoint: no total, a next link until the last page
    let first: Vec<serde_json::Value> = (0..50).map(saved_track_json).collect();
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": first,
            "next": "cursor-2"
        })))
        .mount(&mock_server)
        .await;
    let second: Vec<serde_json::Value> = (50..60).map(saved_track_json).collect();
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .and(query_param("offset", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": second
        })))
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(3);
    let collector = PaginatedCollector::new(&fetcher, 50);
    let items: Vec<SavedTrackItem> = collector
        .collect(&format!("{}/me/tracks", mock_server.uri()))
        .await;

    assert_eq!(items.len(), 60);
    assert_eq!(items[59].track.id, "t59");
    assert_eq!(fetcher.limiter().total_requests(), 2);
}

/// Enrichment lookups fail for artists named `Fail *`, succeed otherwise
struct EnrichmentResponder;

impl Respond for EnrichmentResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let name = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "name")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();

        if name.starts_with("Fail") {
            ResponseTemplate::new(404)
        } else {
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "area": {"name": "Norway", "type": "Country"},
                "genres": ["jazz"]
            }))
        }
    }
}

#[tokio::test]
async fn test_enrichment_reaches_past_failed_cluster() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/artist-info"))
        .respond_with(EnrichmentResponder)
        .mount(&mock_server)
        .await;

    // 50 failing artists outrank the 5 enrichable ones, so a sample that
    // never looks past the failures would end the pass early
    let mut store = SqliteStore::new_in_memory().expect("Failed to open store");
    let mut artists: Vec<discograph::catalog::ArtistPayload> = Vec::new();
    for i in 0..50 {
        artists.push(
            serde_json::from_value(serde_json::json!({
                "id": format!("f{}", i),
                "name": format!("Fail {}", i),
                "popularity": 1000 - i
            }))
            .unwrap(),
        );
    }
    for i in 0..5 {
        artists.push(
            serde_json::from_value(serde_json::json!({
                "id": format!("ok{}", i),
                "name": format!("Good {}", i),
                "popularity": 10
            }))
            .unwrap(),
        );
    }
    store.upsert_artists(&artists).expect("Failed to seed artists");

    let limiter = RateLimiter::new(&RateLimitConfig {
        max_per_halfmin: 10_000,
        max_per_hour: 10_000,
        max_per_day: 20_000,
    });
    let fetcher = Fetcher::new(
        build_http_client().expect("Failed to build client"),
        Arc::new(limiter),
        Arc::new(StaticTokenProvider::new("test-token")),
        3,
    );
    let stop = Arc::new(AtomicBool::new(false));

    let enriched = run_enrichment(&mut store, &fetcher, &mock_server.uri(), 5, stop)
        .await
        .expect("Enrichment run failed");

    assert_eq!(enriched, 5);
    let artist = store.get_artist("ok0").unwrap().expect("artist missing");
    assert!(artist.area_id.is_some());

    // Only the failed cluster is still pending
    let pending = store.sample_artists_pending_enrichment(100).unwrap();
    assert_eq!(pending.len(), 50);
    assert!(pending.iter().all(|(id, _)| id.starts_with('f')));
}

#[tokio::test]
async fn test_empty_seed_is_not_reported_converged() {
    let mock_server = MockServer::start().await;

    // The seed walk fails outright; the catalog stays empty
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("catalog.db");
    let config = create_test_config(
        &mock_server.uri(),
        &db_path.to_string_lossy(),
        dir.path(),
    );
    std::fs::write(dir.path().join("access_token"), "seeded-token").unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let outcome = Coordinator::new(config, stop)
        .run(SyncPhase::Tracks)
        .await
        .expect("Coordinator run failed");

    assert!(!outcome.converged, "an empty catalog is not a synchronized one");
    let store = SqliteStore::new(&db_path).expect("Failed to reopen store");
    assert_eq!(store.count_rows(EntityKind::Track).unwrap(), 0);
    // Limiter state still flushed on the early exit
    assert!(dir.path().join("request_log.json").exists());
}

#[tokio::test]
async fn test_coordinator_seeds_and_converges() {
    let mock_server = MockServer::start().await;
    mount_batch_endpoints(&mock_server).await;

    // Saved-tracks collection: the seed for an empty catalog
    let items: Vec<serde_json::Value> = (0..2).map(saved_track_json).collect();
    Mock::given(method("GET"))
        .and(path("/me/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 2,
            "items": items
        })))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("catalog.db");
    let config = create_test_config(
        &mock_server.uri(),
        &db_path.to_string_lossy(),
        dir.path(),
    );

    // A fresh access token on disk keeps the provider off the token endpoint
    std::fs::write(dir.path().join("access_token"), "seeded-token").unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let outcome = Coordinator::new(config, stop)
        .run(SyncPhase::Tracks)
        .await
        .expect("Coordinator run failed");
    assert!(outcome.converged);

    let store = SqliteStore::new(&db_path).expect("Failed to reopen store");
    assert_eq!(store.count_rows(EntityKind::Track).unwrap(), 2);
    assert_eq!(store.count_incomplete(EntityKind::Track).unwrap(), 0);
    assert_eq!(store.count_incomplete(EntityKind::Album).unwrap(), 0);
    assert_eq!(store.count_incomplete(EntityKind::Artist).unwrap(), 0);

    // Limiter state was flushed on the way out
    assert!(dir.path().join("request_log.json").exists());
}
