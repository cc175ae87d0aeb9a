//! The rate limit decision engine.
//!
//! [`Engine::check`] classifies one request against one identity's
//! [`RateState`]. Rules are evaluated in a fixed order and the first match
//! wins:
//!
//! 1. blocklist (only when the engine was built with one)
//! 2. active ban, lazily dropping an expired one
//! 3. prune the window log
//! 4. cooldown since the last accepted event
//! 5. window cap, escalating to a ban once the threshold is reached
//!
//! `check` never appends to the accepted log; only [`Engine::record`] does,
//! and callers invoke it once the gated action has succeeded.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::blocklist::Blocklist;
use super::decision::{Decision, DenyReason, BLOCKLIST_RETRY_AFTER};
use super::policy::Policy;
use super::state::{BanRecord, RateState};

/// A rate limit engine for one policy.
#[derive(Debug, Clone)]
pub struct Engine {
    policy: Policy,
    blocklist: Option<Arc<Blocklist>>,
}

impl Engine {
    /// Create an engine without a blocklist.
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            blocklist: None,
        }
    }

    /// Create an engine that consults a permanent blocklist first.
    pub fn with_blocklist(policy: Policy, blocklist: Arc<Blocklist>) -> Self {
        Self {
            policy,
            blocklist: Some(blocklist),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn blocklist(&self) -> Option<&Arc<Blocklist>> {
        self.blocklist.as_ref()
    }

    /// Evaluate a request from `identity` at `now`.
    ///
    /// Besides pruning, the only mutations are ban bookkeeping: dropping an
    /// expired ban, remembering a cap breach toward the ban threshold, and
    /// creating or extending a ban.
    pub fn check(&self, identity: &str, state: &mut RateState, now: u64) -> Decision {
        if let Some(blocklist) = &self.blocklist {
            if blocklist.contains(identity) {
                debug!(identity = %identity, "Identity is blocklisted");
                return Decision::denied(DenyReason::Blocklisted, BLOCKLIST_RETRY_AFTER);
            }
        }

        if let Some(ban) = state.active_ban(now) {
            let retry_after = Duration::from_millis(ban.until - now);
            debug!(identity = %identity, ?retry_after, strikes = ban.strikes, "Identity is banned");
            return Decision::denied(DenyReason::Banned, retry_after);
        }
        if state.expire_ban(now) {
            debug!(identity = %identity, "Ban expired");
        }

        state.prune(now, self.policy.window_ms);

        if let Some(last) = state.last_accepted() {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.policy.cooldown_ms {
                let retry_after = Duration::from_millis(self.policy.cooldown_ms - elapsed);
                debug!(identity = %identity, ?retry_after, "Identity is in cooldown");
                return Decision::denied(DenyReason::Cooldown, retry_after);
            }
        }

        if state.accepted.len() >= self.policy.max_per_window {
            if let Some(ban_policy) = self.policy.ban {
                let tally = state.accepted.len() + state.denied.len();
                if tally >= ban_policy.threshold {
                    return self.escalate(identity, state, now, ban_policy.duration_ms);
                }
                state.denied.push(now);
            }

            // The log is non-empty here since max_per_window is at least one.
            let oldest = state.oldest_accepted().unwrap_or(now);
            let remaining = self.policy.window_ms - now.saturating_sub(oldest);
            let retry_after = Duration::from_millis(remaining.max(1));
            debug!(
                identity = %identity,
                count = state.accepted.len(),
                denied = state.denied.len(),
                ?retry_after,
                "Window cap reached"
            );
            return Decision::denied(DenyReason::Capped, retry_after);
        }

        Decision::allowed()
    }

    /// Commit an accepted event for the identity.
    pub fn record(&self, state: &mut RateState, now: u64) {
        state.push_accepted(now);
    }

    /// Create or extend the identity's ban and clear its logs.
    ///
    /// `check` drops an expired ban before it can get here, so strikes reset
    /// when a ban lapses and a ban reached through `check` always starts at
    /// one strike. Extending a still-active record keeps its `until` from
    /// moving backwards and adds a strike.
    fn escalate(&self, identity: &str, state: &mut RateState, now: u64, duration_ms: u64) -> Decision {
        let proposed = now.saturating_add(duration_ms);
        let ban = match state.ban {
            Some(existing) => BanRecord {
                until: existing.until.max(proposed),
                strikes: existing.strikes.saturating_add(1),
            },
            None => BanRecord {
                until: proposed,
                strikes: 1,
            },
        };
        state.ban = Some(ban);
        state.accepted.clear();
        state.denied.clear();

        info!(
            identity = %identity,
            strikes = ban.strikes,
            until = %format_epoch_ms(ban.until),
            "Ban threshold reached, identity banned"
        );

        Decision::denied(DenyReason::Banned, Duration::from_millis(duration_ms))
    }
}

fn format_epoch_ms(ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}
