//! Discograph main entry point
//!
//! This is the command-line interface for the Discograph catalog
//! synchronizer.

use clap::Parser;
use discograph::config::load_config_with_hash;
use discograph::sync::Coordinator;
use discograph::SyncPhase;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Discograph: a bulk music-catalog synchronizer
///
/// Discograph crawls a music-metadata API under its rate limits and
/// converges a local SQLite catalog: every track, album and artist that
/// is referenced anywhere eventually gets its full payload.
#[derive(Parser, Debug)]
#[command(name = "discograph")]
#[command(version = "1.0.0")]
#[command(about = "A bulk music-catalog synchronizer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Phase to start the first cycle at (tracks, albums, artists, artist-albums)
    #[arg(long, default_value = "tracks", value_name = "PHASE")]
    start_phase: SyncPhase,

    /// Enable the album-backfill phase regardless of the config file
    #[arg(long)]
    backfill: bool,

    /// Show catalog statistics and exit
    #[arg(long, conflicts_with = "reset")]
    stats: bool,

    /// Drop and recreate the database schema, then exit
    #[arg(long, conflicts_with = "stats")]
    reset: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, _config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.backfill {
        config.sync.backfill_albums = true;
    }

    if cli.stats {
        handle_stats(&config)?;
    } else if cli.reset {
        handle_reset(&config)?;
    } else {
        handle_sync(config, cli.start_phase).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("discograph=info,warn"),
            1 => EnvFilter::new("discograph=debug,info"),
            2 => EnvFilter::new("discograph=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows catalog statistics from the database
fn handle_stats(config: &discograph::Config) -> Result<(), Box<dyn std::error::Error>> {
    use discograph::storage::{CatalogStore, SqliteStore};
    use discograph::EntityKind;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let store = SqliteStore::new(Path::new(&config.output.database_path))?;

    for kind in [EntityKind::Track, EntityKind::Album, EntityKind::Artist] {
        let total = store.count_rows(kind)?;
        let incomplete = store.count_incomplete(kind)?;
        println!(
            "{:>8}s: {:>8} total, {:>8} incomplete",
            kind, total, incomplete
        );
    }
    println!(
        "Artists pending album backfill: {}",
        store.count_artists_pending_albums()?
    );
    for relation in ["track_artists", "album_artists", "artist_genres"] {
        println!("{:>14}: {:>8} rows", relation, store.count_relations(relation)?);
    }

    Ok(())
}

/// Handles the --reset mode: drops and recreates the schema
fn handle_reset(config: &discograph::Config) -> Result<(), Box<dyn std::error::Error>> {
    use discograph::storage::{CatalogStore, SqliteStore};
    use std::path::Path;

    println!("Resetting database: {}", config.output.database_path);

    let mut store = SqliteStore::new(Path::new(&config.output.database_path))?;
    store.reset()?;

    println!("✓ Schema dropped and recreated");
    Ok(())
}

/// Handles the main sync operation
async fn handle_sync(
    config: discograph::Config,
    start_phase: SyncPhase,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Starting sync at phase {} (backfill: {}, enrichment: {})",
        start_phase,
        config.sync.backfill_albums,
        config.provider.enrichment_base_url.is_some()
    );

    // Ctrl-C raises the stop flag; the scheduler finishes the in-flight
    // batch and the coordinator flushes limiter state before exiting
    let stop = Arc::new(AtomicBool::new(false));
    let stop_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current batch");
            stop_signal.store(true, Ordering::Relaxed);
        }
    });

    let coordinator = Coordinator::new(config, stop);
    match coordinator.run(start_phase).await {
        Ok(outcome) if outcome.converged => {
            tracing::info!("Catalog is fully synchronized");
            Ok(())
        }
        Ok(_) => {
            tracing::info!("Sync stopped before convergence; rerun to continue");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Sync failed: {}", e);
            Err(e.into())
        }
    }
}
