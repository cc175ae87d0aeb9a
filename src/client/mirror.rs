//! Client-side mirror of the rate limit engine.
//!
//! Runs the same [`Engine`] as the server against state kept in client-local
//! storage, so the form can refuse a submission the server would reject
//! without a round trip. The state is fully under the user's control; this
//! is a convenience, never a security boundary.

use tracing::warn;

use super::storage::KeyValueStorage;
use crate::error::{FormguardError, Result};
use crate::ratelimit::{BanRecord, Decision, Engine, Policy, RateState};

/// Storage key holding the accepted-event log (JSON array of epoch ms).
pub const LOG_KEY: &str = "_ux_rl";
/// Storage key holding the ban record (`{"until":..,"strikes":..}`).
pub const BAN_KEY: &str = "_ux_ban";
/// Storage key holding cap breaches counted toward a ban.
pub const DENIED_KEY: &str = "_ux_rl_denied";
/// The single identity a client mirror evaluates.
pub const LOCAL_IDENTITY: &str = "local";

/// Rate limit engine bound to one client's local storage.
pub struct ClientMirror<S: KeyValueStorage> {
    engine: Engine,
    storage: S,
}

impl<S: KeyValueStorage> ClientMirror<S> {
    pub fn new(policy: Policy, storage: S) -> Self {
        Self {
            engine: Engine::new(policy),
            storage,
        }
    }

    pub fn policy(&self) -> &Policy {
        self.engine.policy()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Evaluate a submission at `now`, persisting any state change.
    ///
    /// A failed write is logged and the decision still returned.
    pub fn check(&mut self, now: u64) -> Decision {
        let before = self.load();
        let mut state = before.clone();
        let decision = self.engine.check(LOCAL_IDENTITY, &mut state, now);

        if state != before {
            if let Err(e) = self.save(&state) {
                warn!(error = %e, "Failed to persist client rate limit state");
            }
        }
        decision
    }

    /// Evaluate at `now` without persisting anything.
    pub fn peek(&self, now: u64) -> Decision {
        let mut state = self.load();
        self.engine.check(LOCAL_IDENTITY, &mut state, now)
    }

    /// Commit a successful submission.
    pub fn record(&mut self, now: u64) -> Result<()> {
        let mut state = self.load();
        state.prune(now, self.engine.policy().window_ms);
        self.engine.record(&mut state, now);
        self.save(&state)
    }

    /// Read the persisted state. Anything unparsable reads as empty.
    pub fn load(&self) -> RateState {
        RateState {
            accepted: self.read_json(LOG_KEY).unwrap_or_default(),
            denied: self.read_json(DENIED_KEY).unwrap_or_default(),
            ban: self.read_json::<Option<BanRecord>>(BAN_KEY).flatten(),
        }
    }

    fn save(&mut self, state: &RateState) -> Result<()> {
        self.storage.set(LOG_KEY, to_json(&state.accepted)?)?;

        match &state.ban {
            Some(ban) => self.storage.set(BAN_KEY, to_json(ban)?)?,
            None => self.storage.remove(BAN_KEY)?,
        }

        if self.engine.policy().ban.is_some() && !state.denied.is_empty() {
            self.storage.set(DENIED_KEY, to_json(&state.denied)?)?;
        } else {
            self.storage.remove(DENIED_KEY)?;
        }
        Ok(())
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.storage.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring corrupt client rate limit state");
                None
            }
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| FormguardError::Storage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::MemoryStorage;
    use crate::ratelimit::DenyReason;

    const SEC: u64 = 1000;

    fn mirror() -> ClientMirror<MemoryStorage> {
        ClientMirror::new(Policy::client_default(), MemoryStorage::new())
    }

    #[test]
    fn test_record_persists_log() {
        let mut mirror = mirror();
        assert!(mirror.check(0).is_allowed());
        mirror.record(0).unwrap();

        assert_eq!(mirror.storage().get(LOG_KEY).as_deref(), Some("[0]"));
        assert_eq!(mirror.check(10 * SEC).reason(), DenyReason::Cooldown);
    }

    #[test]
    fn test_cap_breach_persists_ban_and_clears_log() {
        let mut mirror = mirror();
        for i in 0..5 {
            let now = i * 60 * SEC;
            assert!(mirror.check(now).is_allowed());
            mirror.record(now).unwrap();
        }

        let decision = mirror.check(300 * SEC);
        assert_eq!(decision.reason(), DenyReason::Banned);
        assert_eq!(mirror.storage().get(LOG_KEY).as_deref(), Some("[]"));

        let ban: BanRecord = serde_json::from_str(&mirror.storage().get(BAN_KEY).unwrap()).unwrap();
        assert_eq!(ban.strikes, 1);
        assert_eq!(ban.until, 300 * SEC + 86_400 * SEC);

        assert_eq!(mirror.check(301 * SEC).reason(), DenyReason::Banned);
    }

    #[test]
    fn test_expired_ban_is_removed_from_storage() {
        let mut storage = MemoryStorage::new();
        storage
            .set(BAN_KEY, r#"{"until":5000,"strikes":2}"#.to_string())
            .unwrap();
        let mut mirror = ClientMirror::new(Policy::client_default(), storage);

        assert_eq!(mirror.check(4999).reason(), DenyReason::Banned);
        assert!(mirror.check(5000).is_allowed());
        assert!(mirror.storage().get(BAN_KEY).is_none());
    }

    #[test]
    fn test_corrupt_state_fails_open() {
        let mut storage = MemoryStorage::new();
        storage.set(LOG_KEY, "not json".to_string()).unwrap();
        storage.set(BAN_KEY, "{\"until\":".to_string()).unwrap();
        let mut mirror = ClientMirror::new(Policy::client_default(), storage);

        assert_eq!(mirror.load(), RateState::default());
        assert!(mirror.check(0).is_allowed());

        // A record rebuilds the log from scratch.
        mirror.record(0).unwrap();
        assert_eq!(mirror.storage().get(LOG_KEY).as_deref(), Some("[0]"));
    }

    #[test]
    fn test_peek_does_not_persist() {
        let mut storage = MemoryStorage::new();
        storage.set(LOG_KEY, "[0,60000,120000,180000,240000]".to_string()).unwrap();
        let mirror = ClientMirror::new(Policy::client_default(), storage);

        // A real check here would escalate to a ban.
        assert_eq!(mirror.peek(300 * SEC).reason(), DenyReason::Banned);
        assert!(mirror.storage().get(BAN_KEY).is_none());
        assert_eq!(mirror.load().accepted.len(), 5);
    }

    #[test]
    fn test_mirror_without_ban_caps() {
        let mut mirror = ClientMirror::new(Policy::client_default().without_ban(), MemoryStorage::new());
        for i in 0..5 {
            mirror.record(i * 60 * SEC).unwrap();
        }

        let decision = mirror.check(300 * SEC);
        assert_eq!(decision.reason(), DenyReason::Capped);
        assert!(mirror.storage().get(BAN_KEY).is_none());
        assert!(mirror.storage().get(DENIED_KEY).is_none());
    }
}
