//! Sync orchestration
//!
//! The scheduler is the convergence engine: it cycles the entity phases,
//! draining each incomplete frontier batch by batch until a full pass finds
//! nothing left. The coordinator wires a run together end to end, and the
//! enrichment pass decorates the converged catalog with genre and area data
//! from a secondary source.

mod coordinator;
mod enrich;
mod scheduler;

pub use coordinator::Coordinator;
pub use enrich::run_enrichment;
pub use scheduler::{convergence_reached, SyncOutcome, SyncPhase, SyncScheduler};
