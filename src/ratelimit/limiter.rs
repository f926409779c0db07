//! Multi-window rate limiter
//!
//! Every outbound request is gated through three sliding windows (30 s,
//! 1 h, 1 d), each with a configured request cap, plus an adaptive base
//! delay derived from recent response latencies. The window arithmetic is
//! pure (it takes an explicit `now`) so tests can drive it with a
//! simulated clock; the async `acquire` wrapper supplies wall-clock time
//! and performs the actual sleeps.

use crate::config::RateLimitConfig;
use crate::ratelimit::state::RateLimiterState;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Minimum delay between consecutive requests, in seconds
const MIN_BASE_WAIT_SECS: f64 = 0.1;

/// Multiplier applied to the average recent latency for the base delay
const LATENCY_FACTOR: f64 = 1.5;

/// Number of recent response latencies used for the adaptive base delay
const LATENCY_SAMPLES: usize = 10;

/// Safety margin after a short-window wait, in seconds
const SHORT_SAFETY_SECS: f64 = 1.0;

/// Safety margin after an hour/day-window wait, in seconds
const LONG_SAFETY_SECS: f64 = 300.0;

/// One sliding window: a FIFO of request timestamps with a cap
#[derive(Debug)]
pub struct Window {
    /// Window duration in seconds
    duration: f64,
    /// Extra sleep added when the window is at its cap
    safety: f64,
    /// Maximum number of requests inside the window
    cap: usize,
    /// Request timestamps (epoch seconds), oldest first
    stamps: VecDeque<f64>,
}

impl Window {
    pub fn new(duration: f64, safety: f64, cap: usize) -> Self {
        Self {
            duration,
            safety,
            cap,
            stamps: VecDeque::new(),
        }
    }

    pub fn with_stamps(duration: f64, safety: f64, cap: usize, stamps: VecDeque<f64>) -> Self {
        Self {
            duration,
            safety,
            cap,
            stamps,
        }
    }

    /// Drops timestamps older than the window duration
    pub fn evict(&mut self, now: f64) {
        while let Some(&oldest) = self.stamps.front() {
            if now - oldest > self.duration {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Seconds to wait before the window has room, or None if it has room now
    ///
    /// The wait is the time until the oldest entry ages out, plus the
    /// window's safety margin.
    pub fn required_wait(&self, now: f64) -> Option<f64> {
        if self.stamps.len() < self.cap {
            return None;
        }
        let oldest = *self.stamps.front()?;
        let remaining = (self.duration - (now - oldest)).max(0.0);
        Some(remaining + self.safety)
    }

    pub fn record(&mut self, now: f64) {
        self.stamps.push_back(now);
    }

    pub fn occupancy(&self) -> usize {
        self.stamps.len()
    }

    pub fn stamps(&self) -> &VecDeque<f64> {
        &self.stamps
    }
}

/// Mutable limiter internals, guarded by one mutex
///
/// The evict-check-record sequence is a single critical section so that
/// concurrent callers sharing one limiter cannot interleave and overshoot
/// a cap.
#[derive(Debug)]
struct Inner {
    total_requests: u64,
    halfmin: Window,
    hourly: Window,
    daily: Window,
    latencies: VecDeque<f64>,
}

impl Inner {
    fn evict_all(&mut self, now: f64) {
        self.halfmin.evict(now);
        self.hourly.evict(now);
        self.daily.evict(now);
    }

    /// First over-cap window's wait, checked short-to-long
    fn required_wait(&self, now: f64) -> Option<f64> {
        self.halfmin
            .required_wait(now)
            .or_else(|| self.hourly.required_wait(now))
            .or_else(|| self.daily.required_wait(now))
    }

    fn record(&mut self, now: f64) {
        self.halfmin.record(now);
        self.hourly.record(now);
        self.daily.record(now);
        self.total_requests += 1;
    }

    /// Base delay before each request: at least 100 ms, stretched to
    /// 1.5x the average of the last 10 observed response latencies
    fn base_wait(&self) -> f64 {
        if self.latencies.is_empty() {
            return MIN_BASE_WAIT_SECS;
        }
        let avg = self.latencies.iter().sum::<f64>() / self.latencies.len() as f64;
        (avg * LATENCY_FACTOR).max(MIN_BASE_WAIT_SECS)
    }
}

/// Gate for outbound requests across three sliding time windows
///
/// Shared between call sites as `Arc<RateLimiter>`; all mutation goes
/// through `acquire` and `record_latency`.
pub struct RateLimiter {
    inner: Mutex<Inner>,
}

impl RateLimiter {
    /// Creates a limiter with empty windows
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_state(config, RateLimiterState::default())
    }

    /// Creates a limiter seeded from persisted request history
    pub fn with_state(config: &RateLimitConfig, state: RateLimiterState) -> Self {
        let inner = Inner {
            total_requests: state.total_requests,
            halfmin: Window::with_stamps(
                30.0,
                SHORT_SAFETY_SECS,
                config.max_per_halfmin as usize,
                state.halfmin,
            ),
            hourly: Window::with_stamps(
                3600.0,
                LONG_SAFETY_SECS,
                config.max_per_hour as usize,
                state.hourly,
            ),
            daily: Window::with_stamps(
                86400.0,
                LONG_SAFETY_SECS,
                config.max_per_day as usize,
                state.daily,
            ),
            latencies: VecDeque::new(),
        };

        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Blocks until it is safe to issue one more request, then records it
    ///
    /// Sleeps the adaptive base delay first, then re-checks the windows
    /// until all have room. The check-and-record step runs under the lock;
    /// sleeps happen with the lock released.
    pub async fn acquire(&self) {
        let base = {
            let mut inner = self.lock();
            inner.evict_all(epoch_now());
            inner.base_wait()
        };
        tokio::time::sleep(Duration::from_secs_f64(base)).await;

        loop {
            let wait = {
                let mut inner = self.lock();
                let now = epoch_now();
                inner.evict_all(now);
                match inner.required_wait(now) {
                    None => {
                        inner.record(now);
                        if inner.total_requests % 100 == 0 {
                            tracing::debug!(
                                "Rate limiter: {} total requests, windows {}/{}/{}",
                                inner.total_requests,
                                inner.halfmin.occupancy(),
                                inner.hourly.occupancy(),
                                inner.daily.occupancy()
                            );
                        }
                        return;
                    }
                    Some(secs) => secs,
                }
            };

            if wait > 60.0 {
                tracing::info!("Window cap reached, waiting {:.1} minutes", wait / 60.0);
            } else {
                tracing::debug!("Window cap reached, waiting {:.1} seconds", wait);
            }
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        }
    }

    /// Feeds one observed response latency into the adaptive base delay
    pub fn record_latency(&self, latency: Duration) {
        let mut inner = self.lock();
        if inner.latencies.len() == LATENCY_SAMPLES {
            inner.latencies.pop_front();
        }
        inner.latencies.push_back(latency.as_secs_f64());
    }

    /// Snapshot of the current request history for persistence
    pub fn snapshot(&self) -> RateLimiterState {
        let inner = self.lock();
        RateLimiterState {
            total_requests: inner.total_requests,
            halfmin: inner.halfmin.stamps().clone(),
            hourly: inner.hourly.stamps().clone(),
            daily: inner.daily.stamps().clone(),
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.lock().total_requests
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("rate limiter lock poisoned")
    }
}

/// Current wall-clock time as epoch seconds
fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
