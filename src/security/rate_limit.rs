//! Tiered token-bucket rate limiting.
//!
//! Every caller gets one bucket per tier class: the role tier by default, or
//! an endpoint class (uploads, auth, messaging) when the path matches one —
//! the endpoint class replaces the role tier for that call site rather than
//! stacking on top of it. Buckets refill greedily: tokens trickle in
//! proportional to elapsed wall-clock time, capped at capacity.
//!
//! # Design Decisions
//! - DashMap entry API makes bucket creation idempotent and refill+consume
//!   atomic per key; concurrent callers cannot both take the last token
//! - Tier table swaps as a whole (arc-swap) so reloads are never torn
//! - Buckets record last touch and are purged after an idle cutoff, bounding
//!   the registry's memory
//! - All time-dependent paths take an explicit `Instant` so tests drive a
//!   synthetic clock

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::http::error::PipelineError;
use crate::http::server::AppState;
use crate::security::ownership::Identity;
use crate::security::permissions::Role;

/// All buckets share a one-minute window; tiers differ only in capacity.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Requests-per-minute capacities, per role and per endpoint class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RateTiers {
    pub anonymous: u32,
    pub user: u32,
    pub shop_admin: u32,
    pub admin: u32,
    pub uploads: u32,
    pub auth: u32,
    pub messaging: u32,
}

impl Default for RateTiers {
    fn default() -> Self {
        Self {
            anonymous: 10,
            user: 60,
            shop_admin: 100,
            admin: 500,
            uploads: 5,
            auth: 5,
            messaging: 30,
        }
    }
}

/// Which capacity tier a bucket belongs to. Endpoint classes are keyed
/// separately from role buckets so the same caller can hold both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierClass {
    Role(Role),
    Uploads,
    Auth,
    Messaging,
}

impl TierClass {
    pub fn limit(&self, tiers: &RateTiers) -> u32 {
        match self {
            TierClass::Role(Role::Anonymous) => tiers.anonymous,
            TierClass::Role(Role::User) => tiers.user,
            TierClass::Role(Role::ShopAdmin) => tiers.shop_admin,
            TierClass::Role(Role::Admin) => tiers.admin,
            TierClass::Uploads => tiers.uploads,
            TierClass::Auth => tiers.auth,
            TierClass::Messaging => tiers.messaging,
        }
    }
}

/// Map a path to its endpoint class, if any. Endpoint classes take precedence
/// over the caller's role tier.
pub fn classify_endpoint(path: &str) -> Option<TierClass> {
    if path.contains("/uploads") {
        Some(TierClass::Uploads)
    } else if path.contains("/auth") {
        Some(TierClass::Auth)
    } else if path.contains("/messages") {
        Some(TierClass::Messaging)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub identity: String,
    pub class: TierClass,
}

/// Single-key rate-limit primitive.
///
/// Invariant: `0 <= tokens <= capacity`. Tokens only grow through refill
/// (monotonic with time) and only shrink by exactly 1 on a successful acquire.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    last_touch: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: now,
            last_touch: now,
        }
    }

    fn refill(&mut self, capacity: u32, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let rate = capacity as f64 / WINDOW.as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity as f64);
        self.last_refill = now;
    }

    fn try_acquire(&mut self, capacity: u32, now: Instant) -> bool {
        self.refill(capacity, now);
        self.last_touch = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently available. Refills but never consumes.
    fn available(&mut self, capacity: u32, now: Instant) -> u32 {
        self.refill(capacity, now);
        self.tokens.floor() as u32
    }
}

/// Outcome of a rate-limit check, carried to the response headers.
#[derive(Debug, Clone, Copy)]
pub struct LimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
}

/// Process-wide bucket registry. Buckets are created lazily on first touch
/// and swept when idle.
pub struct RateLimitRegistry {
    buckets: DashMap<BucketKey, TokenBucket>,
    tiers: ArcSwap<RateTiers>,
}

impl RateLimitRegistry {
    pub fn new(tiers: RateTiers) -> Self {
        Self {
            buckets: DashMap::new(),
            tiers: ArcSwap::from_pointee(tiers),
        }
    }

    /// Atomically replace the tier table (config reload).
    pub fn reload_tiers(&self, tiers: RateTiers) {
        self.tiers.store(Arc::new(tiers));
    }

    /// Consume one token for this caller on this path.
    pub fn check(&self, identity_id: &str, role: Role, path: &str) -> LimitDecision {
        self.check_at(identity_id, role, path, Instant::now())
    }

    /// Clock-injected variant of [`check`](Self::check).
    pub fn check_at(&self, identity_id: &str, role: Role, path: &str, now: Instant) -> LimitDecision {
        let tiers = self.tiers.load();
        let class = classify_endpoint(path).unwrap_or(TierClass::Role(role));
        let limit = class.limit(&tiers);
        let key = BucketKey {
            identity: identity_id.to_string(),
            class,
        };

        // Entry holds the shard lock for the whole refill+consume, so the
        // check is atomic per key and first-touch creation is idempotent.
        let mut bucket = self
            .buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(limit, now));
        let allowed = bucket.try_acquire(limit, now);
        let remaining = bucket.tokens.floor() as u32;

        LimitDecision {
            allowed,
            limit,
            remaining,
        }
    }

    /// Remaining-token estimate without consuming anything.
    pub fn remaining(&self, identity_id: &str, role: Role, path: &str) -> u32 {
        self.remaining_at(identity_id, role, path, Instant::now())
    }

    pub fn remaining_at(&self, identity_id: &str, role: Role, path: &str, now: Instant) -> u32 {
        let tiers = self.tiers.load();
        let class = classify_endpoint(path).unwrap_or(TierClass::Role(role));
        let limit = class.limit(&tiers);
        match self.buckets.get_mut(&BucketKey {
            identity: identity_id.to_string(),
            class,
        }) {
            Some(mut bucket) => bucket.available(limit, now),
            None => limit,
        }
    }

    /// Drop every bucket belonging to one caller (operational/test hook).
    pub fn clear(&self, identity_id: &str) {
        self.buckets.retain(|k, _| k.identity != identity_id);
    }

    pub fn clear_all(&self) {
        self.buckets.clear();
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Evict buckets untouched for longer than `max_idle`.
    pub fn purge_idle(&self, max_idle: Duration) {
        self.purge_idle_at(max_idle, Instant::now());
    }

    pub fn purge_idle_at(&self, max_idle: Duration, now: Instant) {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.last_touch) <= max_idle);
        // Concurrent inserts during the retain can make the map grow; the
        // count is best-effort and must not underflow.
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.buckets.len(), "purged idle rate-limit buckets");
        }
        metrics::gauge!("doorman_rate_limit_buckets").set(self.buckets.len() as f64);
    }
}

/// Pipeline stage: consume a token for the resolved identity, reject with 429
/// when the bucket is empty, and stamp X-RateLimit-* headers on admitted
/// responses.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, PipelineError> {
    let security = &state.security;
    let path = req.uri().path();

    if !security.rate_limit_enabled || security.is_excluded_path(path) {
        return Ok(next.run(req).await);
    }

    let (id, role) = match req.extensions().get::<Identity>() {
        Some(identity) => (identity.id.clone(), identity.role),
        // Identity attachment runs ahead of this stage; a missing extension
        // means direct router misuse, treated as anonymous.
        None => ("anonymous:unknown".to_string(), Role::Anonymous),
    };

    let decision = security.rate_limiter.check(&id, role, path);
    if !decision.allowed {
        tracing::warn!(caller = %id, role = %role, path, limit = decision.limit, "rate limit exceeded");
        metrics::counter!("doorman_rejected_total", "stage" => "rate_limit").increment(1);
        return Err(PipelineError::RateLimited {
            limit: decision.limit,
        });
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RateLimitRegistry {
        RateLimitRegistry::new(RateTiers::default())
    }

    #[test]
    fn test_capacity_then_exhaustion() {
        let reg = registry();
        let now = Instant::now();
        for i in 0..10 {
            assert!(reg.check_at("anonymous:1.2.3.4", Role::Anonymous, "/api/shops", now).allowed, "request {}", i);
        }
        assert!(!reg.check_at("anonymous:1.2.3.4", Role::Anonymous, "/api/shops", now).allowed);
    }

    #[test]
    fn test_greedy_refill_is_proportional() {
        let reg = registry();
        let now = Instant::now();
        // Drain the anonymous bucket (capacity 10)
        for _ in 0..10 {
            assert!(reg.check_at("a", Role::Anonymous, "/x", now).allowed);
        }
        assert!(!reg.check_at("a", Role::Anonymous, "/x", now).allowed);

        // Half a window restores roughly half the capacity
        let later = now + Duration::from_secs(30);
        let remaining = reg.remaining_at("a", Role::Anonymous, "/x", later);
        assert!((4..=5).contains(&remaining), "got {}", remaining);

        // A full window restores full capacity, never more
        let full = now + WINDOW + Duration::from_secs(30);
        assert_eq!(reg.remaining_at("a", Role::Anonymous, "/x", full), 10);
    }

    #[test]
    fn test_partial_wait_grants_partial_tokens() {
        let reg = registry();
        let now = Instant::now();
        for _ in 0..10 {
            reg.check_at("a", Role::Anonymous, "/x", now);
        }
        // 6 seconds at 10/min refills one token
        let later = now + Duration::from_secs(6);
        assert!(reg.check_at("a", Role::Anonymous, "/x", later).allowed);
        assert!(!reg.check_at("a", Role::Anonymous, "/x", later).allowed);
    }

    #[test]
    fn test_role_tiers() {
        let reg = registry();
        let now = Instant::now();
        for (role, limit) in [
            (Role::Anonymous, 10),
            (Role::User, 60),
            (Role::ShopAdmin, 100),
            (Role::Admin, 500),
        ] {
            let d = reg.check_at(role.as_str(), role, "/api/shops", now);
            assert_eq!(d.limit, limit);
        }
    }

    #[test]
    fn test_endpoint_class_overrides_role() {
        let reg = registry();
        let now = Instant::now();
        // Admin would get 500/min, but the uploads class caps at 5
        let d = reg.check_at("1", Role::Admin, "/api/uploads", now);
        assert_eq!(d.limit, 5);
        for _ in 0..4 {
            assert!(reg.check_at("1", Role::Admin, "/api/uploads", now).allowed);
        }
        assert!(!reg.check_at("1", Role::Admin, "/api/uploads", now).allowed);

        // The role bucket is untouched; other paths still flow
        assert!(reg.check_at("1", Role::Admin, "/api/shops", now).allowed);
    }

    #[test]
    fn test_endpoint_classification() {
        assert_eq!(classify_endpoint("/api/uploads"), Some(TierClass::Uploads));
        assert_eq!(classify_endpoint("/api/auth/signin"), Some(TierClass::Auth));
        assert_eq!(classify_endpoint("/api/messages/send"), Some(TierClass::Messaging));
        assert_eq!(classify_endpoint("/api/shops"), None);
    }

    #[test]
    fn test_remaining_never_consumes() {
        let reg = registry();
        let now = Instant::now();
        reg.check_at("a", Role::User, "/x", now);
        let r1 = reg.remaining_at("a", Role::User, "/x", now);
        let r2 = reg.remaining_at("a", Role::User, "/x", now);
        assert_eq!(r1, r2);
        assert_eq!(r1, 59);
    }

    #[test]
    fn test_separate_keys_are_independent() {
        let reg = registry();
        let now = Instant::now();
        for _ in 0..10 {
            reg.check_at("a", Role::Anonymous, "/x", now);
        }
        assert!(!reg.check_at("a", Role::Anonymous, "/x", now).allowed);
        assert!(reg.check_at("b", Role::Anonymous, "/x", now).allowed);
    }

    #[test]
    fn test_concurrent_callers_never_exceed_capacity() {
        let reg = Arc::new(registry());
        let now = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = Arc::clone(&reg);
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0u32;
                for _ in 0..25 {
                    if reg.check_at("shared", Role::User, "/api/shops", now).allowed {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }
        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // 8 threads x 25 calls = 200 attempts against capacity 60
        assert_eq!(total, 60);
    }

    #[test]
    fn test_idle_purge() {
        let reg = registry();
        let now = Instant::now();
        reg.check_at("a", Role::User, "/x", now);
        reg.check_at("b", Role::User, "/x", now + Duration::from_secs(600));
        assert_eq!(reg.bucket_count(), 2);

        reg.purge_idle_at(Duration::from_secs(300), now + Duration::from_secs(700));
        assert_eq!(reg.bucket_count(), 1);

        // The purged caller starts over with a fresh bucket
        assert!(reg.check_at("a", Role::User, "/x", now + Duration::from_secs(700)).allowed);
    }

    #[test]
    fn test_purge_runs_safely_alongside_inserts() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let reg = Arc::new(registry());
        let now = Instant::now();
        let stop = Arc::new(AtomicBool::new(false));

        let inserter = {
            let reg = Arc::clone(&reg);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut i = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    reg.check_at(&i.to_string(), Role::User, "/x", now);
                    i += 1;
                }
            })
        };

        // Everything is stale relative to this clock reading, so each sweep
        // races the inserter over the whole map
        for _ in 0..1_000 {
            reg.purge_idle_at(Duration::ZERO, now + Duration::from_secs(1));
        }

        stop.store(true, Ordering::Relaxed);
        inserter.join().unwrap();
    }

    #[test]
    fn test_clear_hooks() {
        let reg = registry();
        let now = Instant::now();
        reg.check_at("a", Role::User, "/x", now);
        reg.check_at("a", Role::User, "/api/uploads", now);
        reg.check_at("b", Role::User, "/x", now);
        assert_eq!(reg.bucket_count(), 3);

        reg.clear("a");
        assert_eq!(reg.bucket_count(), 1);
        reg.clear_all();
        assert_eq!(reg.bucket_count(), 0);
    }

    #[test]
    fn test_tier_reload_swaps_whole_table() {
        let reg = registry();
        let now = Instant::now();
        assert_eq!(reg.check_at("a", Role::User, "/x", now).limit, 60);

        reg.reload_tiers(RateTiers {
            user: 2,
            ..RateTiers::default()
        });
        assert_eq!(reg.check_at("b", Role::User, "/x", now).limit, 2);
    }
}
