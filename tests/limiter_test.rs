//! End-to-end behaviour of the server limiter, sweeper and client mirror.

use std::sync::Arc;
use std::time::Duration;

use formguard::client::{
    ClientMirror, FileStorage, KeyValueStorage, MemoryStorage, BAN_KEY, LOG_KEY,
};
use formguard::ratelimit::{
    BanPolicy, BanRecord, Clock, DenyReason, ManualClock, Policy, RateLimiter,
};

const SEC: u64 = 1000;
const HOUR: u64 = 3600 * SEC;

fn hourly_policy() -> Policy {
    Policy {
        cooldown_ms: 30 * SEC,
        window_ms: HOUR,
        max_per_window: 5,
        ban: Some(BanPolicy {
            threshold: 15,
            duration_ms: 24 * HOUR,
        }),
    }
}

async fn accept(limiter: &RateLimiter, identity: &str, now: u64) {
    let mut permit = limiter.acquire(identity).await;
    let decision = permit.check_at(now);
    assert!(decision.is_allowed(), "expected allowed at {}: {:?}", now, decision);
    permit.record_at(now);
}

#[tokio::test]
async fn test_cooldown_then_capped_example() {
    let limiter = RateLimiter::new(hourly_policy());
    for t in [0, 40 * SEC, 80 * SEC, 120 * SEC, 160 * SEC] {
        accept(&limiter, "A", t).await;
    }

    let decision = limiter.check_at("A", 170 * SEC).await;
    assert_eq!(decision.reason(), DenyReason::Cooldown);

    let decision = limiter.check_at("A", 200 * SEC).await;
    assert_eq!(decision.reason(), DenyReason::Capped);
}

#[tokio::test]
async fn test_repeated_cap_breaches_escalate_to_ban() {
    let limiter = RateLimiter::new(hourly_policy());
    for t in [0, 40 * SEC, 80 * SEC, 120 * SEC, 160 * SEC] {
        accept(&limiter, "A", t).await;
    }

    let mut now = 200 * SEC;
    let mut decision = limiter.check_at("A", now).await;
    while decision.reason() == DenyReason::Capped {
        now += SEC;
        decision = limiter.check_at("A", now).await;
    }

    assert_eq!(decision.reason(), DenyReason::Banned);
    assert_eq!(decision.retry_after_secs(), 86_400);
    // 5 accepted plus 10 denied attempts reach the threshold.
    assert_eq!(now, 210 * SEC);

    let state = limiter.snapshot("A").await.unwrap();
    assert!(state.accepted.is_empty());
    assert_eq!(state.ban.map(|b| b.strikes), Some(1));

    let later = limiter.check_at("A", now + SEC).await;
    assert_eq!(later.reason(), DenyReason::Banned);

    // At the end of the ban the identity starts over.
    let after = limiter.check_at("A", now + 24 * HOUR).await;
    assert!(after.is_allowed());
}

#[tokio::test]
async fn test_accepted_events_never_exceed_cap_in_any_window() {
    let policy = Policy {
        cooldown_ms: 20 * SEC,
        window_ms: 10 * 60 * SEC,
        max_per_window: 4,
        ban: None,
    };
    let limiter = RateLimiter::new(policy.clone());

    // Deterministic pseudo-random arrival gaps between 1 and 60 seconds.
    let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
    let mut now = 0;
    let mut accepted = Vec::new();
    for _ in 0..2000 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        now += SEC * (1 + (seed >> 33) % 60);

        let mut permit = limiter.acquire("A").await;
        if permit.check_at(now).is_allowed() {
            permit.record_at(now);
            accepted.push(now);
        }
    }

    assert!(!accepted.is_empty());
    for (i, &start) in accepted.iter().enumerate() {
        let in_window = accepted[i..]
            .iter()
            .take_while(|&&t| t - start < policy.window_ms)
            .count();
        assert!(in_window <= policy.max_per_window, "window at {} holds {}", start, in_window);
    }
    for pair in accepted.windows(2) {
        assert!(pair[1] - pair[0] >= policy.cooldown_ms);
    }
}

#[tokio::test]
async fn test_check_without_record_is_stable() {
    let limiter = RateLimiter::new(hourly_policy().without_ban());
    accept(&limiter, "A", 0).await;

    for now in [10 * SEC, 40 * SEC] {
        let first = limiter.check_at("A", now).await;
        for _ in 0..10 {
            assert_eq!(limiter.check_at("A", now).await, first);
        }
    }
}

#[tokio::test]
async fn test_sweeper_keeps_live_and_banned_identities() {
    let clock = Arc::new(ManualClock::new(0));
    let limiter = RateLimiter::new(hourly_policy()).with_clock(clock.clone());

    accept(&limiter, "recent", 0).await;
    let _ = limiter.check_at("checked-only", 0).await;
    {
        let mut permit = limiter.acquire("banned").await;
        for i in 0..5 {
            permit.record_at(i * 40 * SEC);
        }
        let mut now = 200 * SEC;
        while permit.check_at(now).reason() != DenyReason::Banned {
            now += SEC;
        }
    }

    let sweeper = limiter.sweeper(Duration::from_secs(300));
    clock.set(30 * 60 * SEC);
    let report = sweeper.sweep_once(clock.now_ms());
    assert_eq!(report.evicted, 1);
    assert!(limiter.snapshot("recent").await.is_some());
    assert!(limiter.snapshot("banned").await.is_some());
    assert!(limiter.snapshot("checked-only").await.is_none());

    // The accepted event ages out; the ban does not lapse for a day.
    clock.set(2 * HOUR);
    sweeper.sweep_once(clock.now_ms());
    assert!(limiter.snapshot("recent").await.is_none());
    assert!(limiter.snapshot("banned").await.is_some());

    clock.set(25 * HOUR);
    sweeper.sweep_once(clock.now_ms());
    assert_eq!(limiter.identity_count(), 0);
}

#[tokio::test]
async fn test_sweeper_evicts_identity_left_with_only_denied_attempts() {
    let limiter = RateLimiter::new(hourly_policy());
    for t in [0, 40 * SEC, 80 * SEC, 120 * SEC, 160 * SEC] {
        accept(&limiter, "A", t).await;
    }
    let decision = limiter.check_at("A", 1_000 * SEC).await;
    assert_eq!(decision.reason(), DenyReason::Capped);
    assert_eq!(limiter.snapshot("A").await.unwrap().denied, vec![1_000 * SEC]);

    // Every accepted event has left the window; the attempt alone is not enough.
    let report = limiter
        .sweeper(Duration::from_secs(300))
        .sweep_once(160 * SEC + HOUR);
    assert_eq!(report.evicted, 1);
    assert!(limiter.snapshot("A").await.is_none());
}

#[tokio::test]
async fn test_held_permit_survives_sweep() {
    let limiter = RateLimiter::new(hourly_policy());
    let mut permit = limiter.acquire("in-flight").await;
    assert!(permit.check_at(0).is_allowed());

    let report = limiter.sweeper(Duration::from_secs(60)).sweep_once(0);
    assert_eq!(report.skipped_busy, 1);

    permit.record_at(0);
    drop(permit);
    assert_eq!(limiter.snapshot("in-flight").await.unwrap().accepted, vec![0]);
}

#[test]
fn test_client_mirror_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local-storage.json");

    {
        let mut mirror = ClientMirror::new(Policy::client_default(), FileStorage::open(&path));
        assert!(mirror.check(0).is_allowed());
        mirror.record(0).unwrap();
    }

    let mut mirror = ClientMirror::new(Policy::client_default(), FileStorage::open(&path));
    assert_eq!(mirror.check(30 * SEC).reason(), DenyReason::Cooldown);
    assert!(mirror.check(60 * SEC).is_allowed());
}

#[test]
fn test_client_mirror_matches_server_decisions() {
    let policy = Policy::client_default();
    let mut mirror = ClientMirror::new(policy.clone(), MemoryStorage::new());
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let limiter = RateLimiter::new(policy);

    for step in 0..12u64 {
        let now = step * 45 * SEC;
        let client = mirror.check(now);
        let server = runtime.block_on(limiter.check_at("local", now));
        assert_eq!(client, server, "diverged at {}", now);

        if client.is_allowed() {
            mirror.record(now).unwrap();
            runtime.block_on(limiter.record_at("local", now));
        }
    }

    let ban: BanRecord = serde_json::from_str(&mirror.storage().get(BAN_KEY).unwrap()).unwrap();
    assert_eq!(ban.strikes, 1);
    assert_eq!(mirror.storage().get(LOG_KEY).as_deref(), Some("[]"));
}
