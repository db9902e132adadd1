//! Per-bot sliding-window rate limiting, keyed by endpoint.
//!
//! The limiter blocks (awaits) rather than dropping: a caller that would
//! exceed the window sleeps until the oldest sample ages out. Cancellation
//! is honored at the sleep; a cancelled waiter consumes no slot.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::Endpoint;

/// Per-endpoint request ceilings over a one-minute window.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub buys_per_min: usize,
    pub histories_per_min: usize,
    pub polls_per_min: usize,
    pub proposals_per_min: usize,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            buys_per_min: 2,
            histories_per_min: 5,
            polls_per_min: 10,
            proposals_per_min: 4,
        }
    }
}

impl RateLimits {
    fn cap(&self, endpoint: Endpoint) -> Option<usize> {
        match endpoint {
            Endpoint::Buy => Some(self.buys_per_min),
            Endpoint::TicksHistory => Some(self.histories_per_min),
            Endpoint::PollContract => Some(self.polls_per_min),
            Endpoint::Proposal => Some(self.proposals_per_min),
            Endpoint::Authorize | Endpoint::Subscribe | Endpoint::Ping => None,
        }
    }
}

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window limiter for one bot.
pub struct SlidingWindowLimiter {
    limits: RateLimits,
    window: Duration,
    samples: Mutex<HashMap<Endpoint, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            window: WINDOW,
            samples: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a slot is available for `endpoint`, then take it.
    pub async fn acquire(&self, endpoint: Endpoint) {
        let Some(cap) = self.limits.cap(endpoint) else {
            return;
        };
        loop {
            let wait = {
                let mut samples = self.samples.lock();
                let queue = samples.entry(endpoint).or_default();
                let now = Instant::now();
                while queue
                    .front()
                    .is_some_and(|&t| now.duration_since(t) >= self.window)
                {
                    queue.pop_front();
                }
                if queue.len() < cap {
                    queue.push_back(now);
                    None
                } else {
                    // Sleep until the oldest sample leaves the window.
                    queue.front().map(|&t| t + self.window - now)
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Samples currently inside the window for `endpoint`.
    #[must_use]
    pub fn in_window(&self, endpoint: Endpoint) -> usize {
        let now = Instant::now();
        self.samples
            .lock()
            .get(&endpoint)
            .map_or(0, |q| {
                q.iter()
                    .filter(|&&t| now.duration_since(t) < self.window)
                    .count()
            })
    }
}
