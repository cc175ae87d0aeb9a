//! Per-identity rate limit state.

use serde::{Deserialize, Serialize};

/// A temporary ban on one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    /// Epoch milliseconds at which the ban lifts
    pub until: u64,
    /// Number of escalations since the record was created
    pub strikes: u32,
}

impl BanRecord {
    /// Whether the ban still applies at `now`.
    pub fn is_active(&self, now: u64) -> bool {
        self.until > now
    }
}

/// Mutable rate limit state for one identity.
///
/// `accepted` is the sliding window log of recorded events, in arrival
/// order. `denied` holds the cap breaches that count toward a ban; it stays
/// empty unless ban escalation is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateState {
    #[serde(default)]
    pub accepted: Vec<u64>,
    #[serde(default)]
    pub denied: Vec<u64>,
    #[serde(default)]
    pub ban: Option<BanRecord>,
}

impl RateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every event older than the window ending at `now`.
    ///
    /// Afterwards every retained entry satisfies `now - entry < window_ms`.
    /// Denied attempts only count against a full log, so they are dropped
    /// once the accepted log has drained.
    pub fn prune(&mut self, now: u64, window_ms: u64) {
        let in_window = |t: &u64| now.saturating_sub(*t) < window_ms;
        self.accepted.retain(in_window);
        if self.accepted.is_empty() {
            self.denied.clear();
        } else {
            self.denied.retain(in_window);
        }
    }

    /// Remove the ban if it has expired. Returns `true` if one was removed.
    pub fn expire_ban(&mut self, now: u64) -> bool {
        match self.ban {
            Some(ban) if !ban.is_active(now) => {
                self.ban = None;
                true
            }
            _ => false,
        }
    }

    /// The active ban at `now`, if any.
    pub fn active_ban(&self, now: u64) -> Option<BanRecord> {
        self.ban.filter(|ban| ban.is_active(now))
    }

    /// Most recent accepted event.
    pub fn last_accepted(&self) -> Option<u64> {
        self.accepted.last().copied()
    }

    /// Oldest accepted event still in the log.
    pub fn oldest_accepted(&self) -> Option<u64> {
        self.accepted.first().copied()
    }

    /// Append an accepted event.
    pub fn push_accepted(&mut self, now: u64) {
        self.accepted.push(now);
    }

    /// Whether nothing about this identity needs remembering at `now`.
    ///
    /// Prunes as a side effect, the same way a check would.
    pub fn is_exhausted(&mut self, now: u64, window_ms: u64) -> bool {
        self.prune(now, window_ms);
        self.accepted.is_empty() && self.ban.map_or(true, |ban| !ban.is_active(now))
    }
}
