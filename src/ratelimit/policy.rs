//! Engine configuration.
//!
//! A [`Policy`] is immutable once an engine is built. The server and the
//! client mirror run the same engine with different policies.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default cooldown between accepted submissions on the server (30 s).
const DEFAULT_COOLDOWN_MS: u64 = 30 * 1000;
/// Default sliding window length (1 h).
const DEFAULT_WINDOW_MS: u64 = 60 * 60 * 1000;
/// Default cap of accepted submissions per window.
const DEFAULT_MAX_PER_WINDOW: usize = 5;
/// Default number of accepted-or-attempted events that triggers a ban.
const DEFAULT_BAN_THRESHOLD: usize = 15;
/// Default ban length (24 h).
const DEFAULT_BAN_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

/// Rate limit policy for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Minimum gap between two accepted events, in milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Sliding window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum accepted events within one window
    #[serde(default = "default_max_per_window")]
    pub max_per_window: usize,

    /// Optional ban escalation; `None` disables bans entirely
    #[serde(default = "default_ban")]
    pub ban: Option<BanPolicy>,
}

/// Escalating temporary ban settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanPolicy {
    /// Accepted plus denied-at-cap events within one window that trigger a ban
    pub threshold: usize,
    /// Ban length in milliseconds
    pub duration_ms: u64,
}

fn default_cooldown_ms() -> u64 {
    DEFAULT_COOLDOWN_MS
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

fn default_max_per_window() -> usize {
    DEFAULT_MAX_PER_WINDOW
}

fn default_ban() -> Option<BanPolicy> {
    Some(BanPolicy {
        threshold: DEFAULT_BAN_THRESHOLD,
        duration_ms: DEFAULT_BAN_DURATION_MS,
    })
}

impl Default for Policy {
    /// The server-side policy: 5 per hour, 30 s apart, 24 h ban at 15.
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            window_ms: default_window_ms(),
            max_per_window: default_max_per_window(),
            ban: default_ban(),
        }
    }
}

impl Policy {
    /// The policy the browser-side mirror runs with.
    ///
    /// A longer cooldown than the server, and a ban as soon as the cap is hit.
    pub fn client_default() -> Self {
        Self {
            cooldown_ms: 60 * 1000,
            window_ms: DEFAULT_WINDOW_MS,
            max_per_window: DEFAULT_MAX_PER_WINDOW,
            ban: Some(BanPolicy {
                threshold: DEFAULT_MAX_PER_WINDOW,
                duration_ms: DEFAULT_BAN_DURATION_MS,
            }),
        }
    }

    /// Same policy with ban escalation removed.
    pub fn without_ban(mut self) -> Self {
        self.ban = None;
        self
    }

    /// Get the cooldown duration.
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Get the window duration.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Check the policy for settings that would make the engine misbehave.
    pub fn validate(&self) -> Result<(), String> {
        if self.window_ms == 0 {
            return Err("window_ms must be greater than zero".to_string());
        }
        if self.max_per_window == 0 {
            return Err("max_per_window must be greater than zero".to_string());
        }
        if let Some(ban) = &self.ban {
            if ban.threshold < self.max_per_window {
                return Err(format!(
                    "ban threshold ({}) must not be below max_per_window ({})",
                    ban.threshold, self.max_per_window
                ));
            }
            if ban.duration_ms == 0 {
                return Err("ban duration_ms must be greater than zero".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_server_limits() {
        let policy = Policy::default();
        assert_eq!(policy.cooldown(), Duration::from_secs(30));
        assert_eq!(policy.window(), Duration::from_secs(3600));
        assert_eq!(policy.max_per_window, 5);
        assert_eq!(
            policy.ban,
            Some(BanPolicy {
                threshold: 15,
                duration_ms: 86_400_000
            })
        );
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_client_policy_bans_at_cap() {
        let policy = Policy::client_default();
        assert_eq!(policy.ban.map(|b| b.threshold), Some(policy.max_per_window));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_threshold_below_cap() {
        let mut policy = Policy::default();
        policy.ban = Some(BanPolicy {
            threshold: 2,
            duration_ms: 1000,
        });
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let policy = Policy {
            window_ms: 0,
            ..Policy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let policy: Policy = serde_yaml::from_str("max_per_window: 3\nban: null\n").unwrap();
        assert_eq!(policy.max_per_window, 3);
        assert_eq!(policy.cooldown_ms, 30_000);
        assert!(policy.ban.is_none());
    }
}
