//! Reference clock: the single "now" of a pipeline invocation.
//!
//! RULE: "now" is captured once at the start of a computation and
//! passed down. Nothing below the pipeline calls Utc::now() itself,
//! so all recency values of one run are mutually comparable.

use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceClock {
    /// Wall-clock time.
    System,
    /// A pinned instant (tests, replays).
    Fixed(DateTime<Utc>),
}

impl ReferenceClock {
    /// Pin the clock to a Unix timestamp in seconds.
    /// Out-of-range values fall back to the epoch.
    pub fn fixed_at(unix_seconds: i64) -> Self {
        let at = Utc
            .timestamp_opt(unix_seconds, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self::Fixed(at)
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Fixed(at) => *at,
        }
    }
}

impl Default for ReferenceClock {
    fn default() -> Self {
        Self::System
    }
}
