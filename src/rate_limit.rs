//! Per-client fixed 60-second window rate limiter (`spec.md` §4.2).
//!
//! State is process-local, matching the redesign note in §9: the source
//! keeps its bucket map in process memory too, and swapping the backend for
//! shared storage (for horizontal scaling) is explicitly out of scope here.
//! Each client's bucket is guarded by its own lock so unrelated clients never
//! contend with each other.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

struct Bucket {
    window_start: DateTime<Utc>,
    count: u32,
    limit: u32,
}

pub struct RateLimitOutcome {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_epoch_ms: i64,
}

#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Mutex<Bucket>>,
}

const WINDOW_SECONDS: i64 = 60;

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// `spec.md` §4.2 step 3-5: look up or create the bucket for
    /// `client_id`, roll the window if it has elapsed, then either admit or
    /// deny. `limit` is the client's configured `rate_limit`.
    pub fn check(&self, client_id: &str, limit: u32) -> RateLimitOutcome {
        let now = Utc::now();
        let entry = self
            .buckets
            .entry(client_id.to_string())
            .or_insert_with(|| {
                Mutex::new(Bucket {
                    window_start: now,
                    count: 0,
                    limit,
                })
            });

        let mut bucket = entry.lock().expect("rate limiter bucket mutex poisoned");
        bucket.limit = limit;

        if now.signed_duration_since(bucket.window_start).num_seconds() >= WINDOW_SECONDS {
            bucket.window_start = now;
            bucket.count = 0;
        }

        let reset_epoch_ms = (bucket.window_start.timestamp_millis())
            + WINDOW_SECONDS * 1000;

        if bucket.count >= bucket.limit {
            return RateLimitOutcome {
                allowed: false,
                limit: bucket.limit,
                remaining: 0,
                reset_epoch_ms,
            };
        }

        bucket.count += 1;
        RateLimitOutcome {
            allowed: true,
            limit: bucket.limit,
            remaining: bucket.limit - bucket.count,
            reset_epoch_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_requests_under_the_limit() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            let outcome = limiter.check("client-a", 5);
            assert!(outcome.allowed);
        }
    }

    #[test]
    fn denies_the_request_at_the_limit() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("client-b", 5).allowed);
        }
        let sixth = limiter.check("client-b", 5);
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);
    }

    #[test]
    fn tracks_separate_clients_independently() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("client-c", 5).allowed);
        }
        assert!(limiter.check("client-d", 5).allowed);
    }
}
