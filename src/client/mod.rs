//! Advisory client-side rate limiting.
//!
//! The server limiter is authoritative; this module only spares users a
//! round trip that would be refused anyway and drives a countdown label.

mod countdown;
mod mirror;
mod storage;

pub use countdown::{run_countdown, CountdownLabel, CountdownObserver, CountdownOutcome, TICK_INTERVAL};
pub use mirror::{ClientMirror, BAN_KEY, DENIED_KEY, LOCAL_IDENTITY, LOG_KEY};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
