//! Server-side rate limiter: engine, store and blocklist together.

use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use super::blocklist::Blocklist;
use super::clock::{Clock, SystemClock};
use super::decision::Decision;
use super::engine::Engine;
use super::policy::Policy;
use super::state::RateState;
use super::store::{EntryGuard, Store};
use super::sweeper::Sweeper;

/// The authoritative rate limiter, keyed by caller identity.
///
/// Cloning is cheap and every clone shares the same store, so a limiter can
/// be handed to spawned tasks directly.
#[derive(Clone)]
pub struct RateLimiter {
    engine: Arc<Engine>,
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

/// Exclusive hold on one identity for a check, the gated action, and the
/// record that follows it.
///
/// Two requests from the same identity cannot both pass `check` before one
/// of them has recorded, because the second waits in [`RateLimiter::acquire`].
/// A permit owns its limiter handle, so it can move into a spawned task that
/// outlives the request that acquired it.
pub struct Permit {
    limiter: RateLimiter,
    entry: EntryGuard,
}

impl RateLimiter {
    /// Create a limiter without a blocklist, reading the system clock.
    pub fn new(policy: Policy) -> Self {
        Self::from_engine(Engine::new(policy))
    }

    /// Create a limiter that denies blocklisted identities outright.
    pub fn with_blocklist(policy: Policy, blocklist: Arc<Blocklist>) -> Self {
        Self::from_engine(Engine::with_blocklist(policy, blocklist))
    }

    fn from_engine(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
            store: Arc::new(Store::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &Policy {
        self.engine.policy()
    }

    pub fn blocklist(&self) -> Option<&Arc<Blocklist>> {
        self.engine.blocklist()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Take the per-identity lock for a check-then-record unit.
    pub async fn acquire(&self, identity: &str) -> Permit {
        let entry = self.store.lock(identity).await;
        Permit {
            limiter: self.clone(),
            entry,
        }
    }

    /// One-shot check at the current time.
    pub async fn check(&self, identity: &str) -> Decision {
        self.acquire(identity).await.check()
    }

    /// One-shot check at an explicit time.
    pub async fn check_at(&self, identity: &str, now: u64) -> Decision {
        self.acquire(identity).await.check_at(now)
    }

    /// Record an accepted event at the current time.
    pub async fn record(&self, identity: &str) {
        self.acquire(identity).await.record();
    }

    /// Record an accepted event at an explicit time.
    pub async fn record_at(&self, identity: &str, now: u64) {
        self.acquire(identity).await.record_at(now);
    }

    /// Build a sweeper over this limiter's store.
    pub fn sweeper(&self, interval: Duration) -> Sweeper {
        Sweeper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.policy().window_ms,
            interval,
        )
    }

    /// Copy of an identity's state, if it is tracked.
    pub async fn snapshot(&self, identity: &str) -> Option<RateState> {
        self.store.snapshot(identity).await
    }

    /// Number of identities currently tracked.
    pub fn identity_count(&self) -> usize {
        self.store.len()
    }
}

impl Permit {
    pub fn identity(&self) -> &str {
        self.entry.identity()
    }

    /// Evaluate the held identity at the current time.
    pub fn check(&mut self) -> Decision {
        let now = self.limiter.clock.now_ms();
        self.check_at(now)
    }

    pub fn check_at(&mut self, now: u64) -> Decision {
        trace!(identity = %self.entry.identity(), now, "Checking rate limit");
        let identity = self.entry.identity().to_string();
        self.limiter.engine.check(&identity, &mut self.entry, now)
    }

    /// Commit an accepted event at the current time.
    pub fn record(&mut self) {
        let now = self.limiter.clock.now_ms();
        self.record_at(now);
    }

    pub fn record_at(&mut self, now: u64) {
        trace!(identity = %self.entry.identity(), now, "Recording accepted event");
        self.limiter.engine.record(&mut self.entry, now);
    }
}
