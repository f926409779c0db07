//! Request rate limiting
//!
//! This module gates every outbound API call through three sliding time
//! windows with persisted history, so a process restart does not forget
//! recent requests and burst through a provider limit.

mod limiter;
mod state;

pub use limiter::{RateLimiter, Window};
pub use state::RateLimiterState;
