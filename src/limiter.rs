//! Sliding-window rate limiting for outbound commands.
//!
//! The server enforces its limits over a moving interval, not a bucket
//! that resets at fixed boundaries, so the client mirrors that: an action
//! is admitted iff fewer than `limit` actions were admitted within the
//! trailing `window`.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// A sliding-window rate limiter.
///
/// Holds the timestamps of admitted actions; entries older than `window`
/// age out lazily on each [`check`](RateLimiter::check). After any call
/// to `check`, at most `limit` timestamps remain.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    /// Create a limiter admitting at most `limit` actions per `window`.
    pub fn new(limit: usize, window: Duration) -> Self {
        RateLimiter {
            limit,
            window,
            timestamps: VecDeque::new(),
        }
    }

    /// Decide whether an action at `now` is admitted, recording it if so.
    ///
    /// Denial does not mutate the window.
    pub fn check(&mut self, now: Instant) -> bool {
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        if self.timestamps.len() < self.limit {
            self.timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Admitted actions still inside the window (as of the last `check`).
    pub fn in_flight(&self) -> usize {
        self.timestamps.len()
    }
}
