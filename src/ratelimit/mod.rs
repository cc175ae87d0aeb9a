//! Rate limiting, ban escalation and state management.

mod blocklist;
mod clock;
mod decision;
mod engine;
mod limiter;
mod policy;
mod state;
mod store;
mod sweeper;

pub use blocklist::Blocklist;
pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{Decision, DenyReason, BLOCKLIST_RETRY_AFTER};
pub use engine::Engine;
pub use limiter::{Permit, RateLimiter};
pub use policy::{BanPolicy, Policy};
pub use state::{BanRecord, RateState};
pub use store::{EntryGuard, Store, SweepReport};
pub use sweeper::{Sweeper, SweeperHandle, DEFAULT_SWEEP_INTERVAL};
