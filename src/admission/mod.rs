//! Per-client admission control.
//!
//! Each client identifier owns an independent token bucket. Buckets are created lazily on
//! the first request and dropped by [`AdmissionController::evict_idle`] once they have
//! been quiet for long enough.

pub mod middleware;

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};

pub use middleware::RateLimitMiddleware;

#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant, capacity: f64, refill_per_sec: f64) {
        // saturating: an observation older than last_refill adds nothing
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * refill_per_sec).min(capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    fn admit(&mut self, now: Instant, capacity: f64, refill_per_sec: f64) -> bool {
        self.refill(now, capacity, refill_per_sec);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Decides whether a request from a given client may proceed.
///
/// The registry is a sharded concurrent map. A call holds the shard lock of its own
/// bucket only for the duration of the refill arithmetic, so calls for one client are
/// serialized while calls for other clients proceed.
#[derive(Debug)]
pub struct AdmissionController {
    capacity: f64,
    refill_per_sec: f64,
    buckets: DashMap<String, TokenBucket>,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    /// `capacity` is the burst size, `refill_per_sec` the sustained rate.
    /// A capacity below one would deny everyone forever and is raised to one.
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: f64::from(capacity.max(1)),
            refill_per_sec: refill_per_sec.max(0.0),
            buckets: DashMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    pub fn refill_per_sec(&self) -> f64 {
        self.refill_per_sec
    }

    /// Takes one token from `client_id`'s bucket if one is available.
    pub fn allow(&self, client_id: &str) -> bool {
        let now = self.clock.now();

        let admitted = if let Some(mut bucket) = self.buckets.get_mut(client_id) {
            bucket.admit(now, self.capacity, self.refill_per_sec)
        } else {
            self.buckets
                .entry(client_id.to_owned())
                .or_insert_with(|| TokenBucket::full(self.capacity, now))
                .admit(now, self.capacity, self.refill_per_sec)
        };

        if !admitted {
            log::debug!("admission denied for client {}", client_id);
        }
        admitted
    }

    /// Tokens `client_id` could spend right now, or `None` for an unknown client.
    /// Does not consume anything.
    pub fn available_tokens(&self, client_id: &str) -> Option<f64> {
        let now = self.clock.now();
        self.buckets.get(client_id).map(|bucket| {
            let mut projected = *bucket;
            projected.refill(now, self.capacity, self.refill_per_sec);
            projected.tokens
        })
    }

    /// Time an empty bucket needs to refill completely. Unbounded when nothing refills.
    pub fn full_refill(&self) -> Duration {
        if self.refill_per_sec > 0.0 {
            Duration::try_from_secs_f64(self.capacity / self.refill_per_sec)
                .unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        }
    }

    /// Drops buckets that have not been touched for at least `idle`.
    ///
    /// A dropped client starts again with a full bucket, so `idle` is raised to
    /// [`full_refill`](Self::full_refill): only buckets that are already full go.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let idle = idle.max(self.full_refill());
        let now = self.clock.now();
        let mut evicted = 0;
        self.buckets.retain(|_, bucket| {
            let keep = now.saturating_duration_since(bucket.last_refill) < idle;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::thread;

    fn controller(capacity: u32, rate: f64) -> (AdmissionController, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let controller = AdmissionController::new(capacity, rate).with_clock(clock.clone());
        (controller, clock)
    }

    #[test]
    fn test_burst_then_refill() {
        let (limiter, clock) = controller(4, 2.0);

        for _ in 0..4 {
            assert!(limiter.allow("1.2.3.4"));
        }
        assert!(!limiter.allow("1.2.3.4"));

        clock.advance(Duration::from_millis(500));
        assert!(limiter.allow("1.2.3.4"));
        assert!(!limiter.allow("1.2.3.4"));
    }

    #[test]
    fn test_clients_do_not_share_buckets() {
        let (limiter, _clock) = controller(2, 1.0);

        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));

        assert!(limiter.allow("10.0.0.2"));
        assert_eq!(limiter.available_tokens("10.0.0.2"), Some(1.0));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_sustained_rate_below_refill_is_never_denied() {
        let (limiter, clock) = controller(3, 10.0);

        for _ in 0..3 {
            assert!(limiter.allow("client"));
        }
        // one request every 150ms against a 100ms refill interval
        for _ in 0..100 {
            clock.advance(Duration::from_millis(150));
            assert!(limiter.allow("client"));
        }
    }

    #[test]
    fn test_tokens_never_exceed_capacity() {
        let (limiter, clock) = controller(5, 100.0);

        assert!(limiter.allow("client"));
        clock.advance(Duration::from_secs(3600));

        assert_eq!(limiter.available_tokens("client"), Some(5.0));
        for _ in 0..5 {
            assert!(limiter.allow("client"));
        }
        assert!(!limiter.allow("client"));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let (limiter, _clock) = controller(0, 1.0);
        assert_eq!(limiter.capacity(), 1);
        assert!(limiter.allow("client"));
        assert!(!limiter.allow("client"));
    }

    #[test]
    fn test_concurrent_callers_never_overdraw() {
        let (limiter, _clock) = controller(10, 0.0);
        let limiter = Arc::new(limiter);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..50).filter(|_| limiter.allow("shared")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 10);
        assert_eq!(limiter.available_tokens("shared"), Some(0.0));
    }

    #[test]
    fn test_short_idle_never_hands_back_an_early_burst() {
        let (limiter, clock) = controller(10, 1.0);
        for _ in 0..10 {
            assert!(limiter.allow("drained"));
        }

        clock.advance(Duration::from_secs(5));
        assert_eq!(limiter.evict_idle(Duration::from_secs(1)), 0);
        assert_eq!(limiter.available_tokens("drained"), Some(5.0));

        clock.advance(Duration::from_secs(5));
        assert_eq!(limiter.evict_idle(Duration::from_secs(1)), 1);
    }

    #[test]
    fn test_without_refill_buckets_are_kept() {
        let (limiter, clock) = controller(1, 0.0);
        assert!(limiter.allow("client"));

        clock.advance(Duration::from_secs(86_400));
        assert_eq!(limiter.evict_idle(Duration::from_secs(1)), 0);
        assert!(!limiter.allow("client"));
    }

    #[test]
    fn test_evict_idle_drops_only_quiet_buckets() {
        let (limiter, clock) = controller(2, 1.0);

        limiter.allow("quiet");
        clock.advance(Duration::from_secs(600));
        limiter.allow("busy");

        assert_eq!(limiter.evict_idle(Duration::from_secs(300)), 1);
        assert_eq!(limiter.available_tokens("quiet"), None);
        assert!(limiter.available_tokens("busy").is_some());
    }
}
