//! Upstream API access
//!
//! This module contains the network-facing layers of the synchronizer:
//! - Single-request fetching with retry and backoff policy
//! - Offset/limit pagination over collection endpoints
//! - Batch resolution of bounded ID lists
//!
//! Every request path goes through the shared `RateLimiter` before
//! touching the network.

mod batch;
mod fetcher;
mod pagination;

pub use batch::BatchResolver;
pub use fetcher::{build_http_client, Fetcher};
pub use pagination::PaginatedCollector;
