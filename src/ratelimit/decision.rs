//! The engine's output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Retry hint reported for permanently blocked identities (24 h).
pub const BLOCKLIST_RETRY_AFTER: Duration = Duration::from_secs(86_400);

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Not denied
    None,
    /// Too soon after the previous accepted submission
    Cooldown,
    /// Window quota exhausted
    Capped,
    /// Temporarily banned after repeated cap breaches
    Banned,
    /// Permanently blocked
    Blocklisted,
}

impl DenyReason {
    /// Human readable message for a "too many requests" response.
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::None => "Allowed",
            DenyReason::Cooldown => "Please wait before sending again",
            DenyReason::Capped => "Hourly message limit reached, try again later",
            DenyReason::Banned => "Spam detected, temporarily blocked",
            DenyReason::Blocklisted => "Sender is blocked",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::None => "none",
            DenyReason::Cooldown => "cooldown",
            DenyReason::Capped => "capped",
            DenyReason::Banned => "banned",
            DenyReason::Blocklisted => "blocklisted",
        };
        f.write_str(s)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    reason: DenyReason,
    retry_after: Duration,
}

impl Decision {
    /// An allowed decision.
    pub fn allowed() -> Self {
        Self {
            reason: DenyReason::None,
            retry_after: Duration::ZERO,
        }
    }

    /// A denial with a retry hint.
    pub fn denied(reason: DenyReason, retry_after: Duration) -> Self {
        debug_assert!(reason != DenyReason::None);
        Self {
            reason,
            retry_after,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.reason == DenyReason::None
    }

    pub fn reason(&self) -> DenyReason {
        self.reason
    }

    /// Time until the request could succeed.
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    /// Retry hint in whole seconds, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        let millis = self.retry_after.as_millis() as u64;
        millis.div_ceil(1000)
    }
}
