//! Once-a-second re-evaluation driving the submit button label.

use std::fmt;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::mirror::ClientMirror;
use super::storage::KeyValueStorage;
use crate::ratelimit::{Clock, DenyReason};

/// Interval between countdown ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// What the submit button should show while the client is held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownLabel {
    /// Seconds until the next submission could succeed
    Seconds(u64),
    /// Banned or blocked; no point counting down
    Blocked,
}

impl fmt::Display for CountdownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountdownLabel::Seconds(secs) => write!(f, "{}s", secs),
            CountdownLabel::Blocked => f.write_str("BLOCKED"),
        }
    }
}

/// How a countdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    /// The client may submit again
    Ready,
    /// The client is banned; the countdown gave up
    Blocked,
}

/// Receives countdown updates.
pub trait CountdownObserver {
    fn on_tick(&mut self, label: CountdownLabel);
    fn on_ready(&mut self);
}

/// Re-check the mirror every second until submissions are allowed again.
///
/// Only read-only checks are made. Stops at the first `Allowed` decision
/// (after calling `on_ready`) or at a ban (after one `Blocked` tick).
pub async fn run_countdown<S, O>(
    mirror: &ClientMirror<S>,
    clock: &dyn Clock,
    observer: &mut O,
) -> CountdownOutcome
where
    S: KeyValueStorage,
    O: CountdownObserver + ?Sized,
{
    let mut ticker = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let decision = mirror.peek(clock.now_ms());

        match decision.reason() {
            DenyReason::None => {
                debug!("Countdown finished, submissions allowed");
                observer.on_ready();
                return CountdownOutcome::Ready;
            }
            DenyReason::Banned | DenyReason::Blocklisted => {
                observer.on_tick(CountdownLabel::Blocked);
                return CountdownOutcome::Blocked;
            }
            DenyReason::Cooldown | DenyReason::Capped => {
                observer.on_tick(CountdownLabel::Seconds(decision.retry_after_secs()));
            }
        }
    }
}
