//! Per-key request throttling.
//!
//! Fixed-window with reset-on-first-request: one record per key; a request
//! inside the window increments the count, the first request after the
//! window boundary restarts it. This deliberately permits brief bursts
//! around a boundary instead of keeping a sliding log; callers relying on a
//! hard ceiling must size thresholds accordingly.
//!
//! The store is process-local. Under horizontal scaling each instance
//! enforces its own budget; the `RateLimitStore` trait is the seam where a
//! shared backing counter can be substituted without call-site changes.

use axum::http::{HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// How long an untouched record survives before the sweeper drops it.
pub const IDLE_PURGE_AFTER: Duration = Duration::from_secs(60 * 60);
/// How often the background sweeper runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub const AUTH_WINDOW: Duration = Duration::from_secs(60);
pub const API_WINDOW: Duration = Duration::from_secs(60);
pub const SENSITIVE_WINDOW: Duration = Duration::from_secs(15 * 60);

/// A named throttling policy. Distinct policies use distinct key prefixes,
/// so one subject can be under several budgets at once.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitPolicy {
    #[must_use]
    pub const fn new(name: &'static str, window: Duration, max_requests: u32) -> Self {
        Self {
            name,
            window,
            max_requests,
        }
    }

    /// Build the store key for a subject (an IP, a user id).
    #[must_use]
    pub fn key(&self, subject: &str) -> String {
        format!("{}:{}", self.name, subject)
    }
}

/// Outcome of one check, with everything needed for response metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// Seconds until the window resets, rounded up, at least one.
    #[must_use]
    pub fn retry_after_seconds(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            (secs + 1).max(1)
        } else {
            secs.max(1)
        }
    }

    /// `X-RateLimit-*` response headers for this decision.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let reset_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|now| now.as_secs() + self.retry_after_seconds())
            .unwrap_or_default();
        if let Ok(value) = HeaderValue::from_str(&self.limit.to_string()) {
            headers.insert("x-ratelimit-limit", value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.remaining.to_string()) {
            headers.insert("x-ratelimit-remaining", value);
        }
        if let Ok(value) = HeaderValue::from_str(&reset_epoch.to_string()) {
            headers.insert("x-ratelimit-reset", value);
        }
        headers
    }
}

/// Counter backend. The in-memory implementation below is the default; a
/// shared store (e.g. a database table) can implement this to make limits
/// global across instances.
pub trait RateLimitStore: Send + Sync {
    /// Record one request against `key` and decide whether it is allowed.
    fn check(&self, key: &str, policy: &RateLimitPolicy) -> RateLimitDecision;

    /// Drop records idle for longer than `idle_for`.
    fn purge_idle(&self, idle_for: Duration);
}

struct WindowRecord {
    window_start: Instant,
    count: u32,
    last_seen: Instant,
}

/// Process-local fixed-window store.
#[derive(Default)]
pub struct MemoryRateLimitStore {
    entries: Mutex<HashMap<String, WindowRecord>>,
}

impl MemoryRateLimitStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Check-and-increment happens under one lock so concurrent requests can
    // never interleave a read with a stale write.
    fn check_at(&self, key: &str, policy: &RateLimitPolicy, now: Instant) -> RateLimitDecision {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let record = entries
            .entry(key.to_string())
            .and_modify(|record| {
                if now.duration_since(record.window_start) < policy.window {
                    record.count = record.count.saturating_add(1);
                } else {
                    record.window_start = now;
                    record.count = 1;
                }
                record.last_seen = now;
            })
            .or_insert(WindowRecord {
                window_start: now,
                count: 1,
                last_seen: now,
            });

        let elapsed = now.duration_since(record.window_start);
        RateLimitDecision {
            allowed: record.count <= policy.max_requests,
            limit: policy.max_requests,
            remaining: policy.max_requests.saturating_sub(record.count),
            reset_after: policy.window.saturating_sub(elapsed),
        }
    }

    fn purge_idle_at(&self, idle_for: Duration, now: Instant) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = entries.len();
        entries.retain(|_, record| now.duration_since(record.last_seen) < idle_for);
        let purged = before - entries.len();
        if purged > 0 {
            debug!("Purged {purged} idle rate-limit records");
        }
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn check(&self, key: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        self.check_at(key, policy, Instant::now())
    }

    fn purge_idle(&self, idle_for: Duration) {
        self.purge_idle_at(idle_for, Instant::now());
    }
}

/// Spawn the background sweep purging idle records. Runs on its own timer
/// and never holds the map lock across an await point, so request-path
/// checks are not blocked.
pub fn spawn_sweeper(store: Arc<dyn RateLimitStore>, every: Duration, idle_for: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            store.purge_idle(idle_for);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TEST_POLICY: RateLimitPolicy =
        RateLimitPolicy::new("test", Duration::from_millis(1000), 5);

    #[test]
    fn window_counts_down_then_denies() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();

        for expected_remaining in [4, 3, 2, 1, 0] {
            let decision = store.check_at("test:1.2.3.4", &TEST_POLICY, start);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.limit, 5);
        }

        let denied = store.check_at("test:1.2.3.4", &TEST_POLICY, start);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
    }

    #[test]
    fn window_resets_after_elapse() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();

        for _ in 0..6 {
            store.check_at("test:key", &TEST_POLICY, start);
        }
        assert!(!store.check_at("test:key", &TEST_POLICY, start).allowed);

        let later = start + Duration::from_millis(1000);
        let decision = store.check_at("test:key", &TEST_POLICY, later);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }

    #[test]
    fn keys_are_isolated() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();

        for _ in 0..6 {
            store.check_at("test:a", &TEST_POLICY, start);
        }
        assert!(!store.check_at("test:a", &TEST_POLICY, start).allowed);
        assert!(store.check_at("test:b", &TEST_POLICY, start).allowed);
    }

    #[test]
    fn reset_after_shrinks_within_window() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();

        let first = store.check_at("test:key", &TEST_POLICY, start);
        assert_eq!(first.reset_after, Duration::from_millis(1000));

        let mid = store.check_at("test:key", &TEST_POLICY, start + Duration::from_millis(400));
        assert_eq!(mid.reset_after, Duration::from_millis(600));
    }

    #[test]
    fn concurrent_checks_admit_exactly_the_limit() {
        let store = Arc::new(MemoryRateLimitStore::new());
        let allowed = AtomicU32::new(0);
        let start = Instant::now();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..4 {
                        if store.check_at("test:shared", &TEST_POLICY, start).allowed {
                            allowed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(allowed.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn purge_drops_only_idle_records() {
        let store = MemoryRateLimitStore::new();
        let start = Instant::now();

        store.check_at("test:old", &TEST_POLICY, start);
        let fresh_at = start + Duration::from_secs(59 * 60);
        store.check_at("test:fresh", &TEST_POLICY, fresh_at);

        store.purge_idle_at(IDLE_PURGE_AFTER, start + Duration::from_secs(61 * 60));

        let entries = store.entries.lock().expect("lock");
        assert!(!entries.contains_key("test:old"));
        assert!(entries.contains_key("test:fresh"));
    }

    #[test]
    fn retry_after_rounds_up() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset_after: Duration::from_millis(1400),
        };
        assert_eq!(decision.retry_after_seconds(), 2);

        let zero = RateLimitDecision {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset_after: Duration::ZERO,
        };
        assert_eq!(zero.retry_after_seconds(), 1);
    }

    #[test]
    fn decision_headers_expose_metadata() {
        let decision = RateLimitDecision {
            allowed: true,
            limit: 5,
            remaining: 3,
            reset_after: Duration::from_secs(30),
        };
        let headers = decision.headers();
        assert_eq!(
            headers
                .get("x-ratelimit-limit")
                .and_then(|v| v.to_str().ok()),
            Some("5")
        );
        assert_eq!(
            headers
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok()),
            Some("3")
        );
        assert!(headers.contains_key("x-ratelimit-reset"));
    }

    #[test]
    fn policy_key_uses_name_prefix() {
        let policy = RateLimitPolicy::new("auth", AUTH_WINDOW, 10);
        assert_eq!(policy.key("1.2.3.4"), "auth:1.2.3.4");
    }
}
