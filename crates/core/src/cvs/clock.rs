//! Keeps commit timestamps in a repository strictly increasing.
//!
//! CVS stamps commits with one-second resolution and offers no way to pass a
//! timestamp in, so two commits in the same second cannot be ordered by a
//! converter. The clock waits, only as long as needed, until the wall clock
//! has left the second in which the previous write finished.

use std::cell::Cell;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

/// Extra margin past the second boundary, to absorb clock jitter.
const BOUNDARY_SLACK: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
pub struct CommitClock {
    last: Cell<Option<i64>>,
}

impl CommitClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Second (Unix time) in which the last recorded write finished.
    pub fn last(&self) -> Option<i64> {
        self.last.get()
    }

    /// Block until the current second is later than the last recorded one.
    /// Returns how long it slept.
    pub fn wait_for_fresh_second(&self) -> Duration {
        let Some(last) = self.last.get() else {
            return Duration::ZERO;
        };
        let mut waited = Duration::ZERO;
        loop {
            let now = Utc::now();
            if now.timestamp() > last {
                if !waited.is_zero() {
                    debug!(waited_ms = waited.as_millis() as u64, "waited for a fresh commit second");
                }
                return waited;
            }
            let into_second = Duration::from_nanos(u64::from(now.timestamp_subsec_nanos()));
            let pause = Duration::from_secs(1)
                .saturating_sub(into_second)
                .max(Duration::from_millis(1))
                + BOUNDARY_SLACK;
            std::thread::sleep(pause);
            waited += pause;
        }
    }

    /// Note that a write has just finished.
    pub fn record(&self) {
        let now = Utc::now().timestamp();
        self.last.set(Some(self.last.get().map_or(now, |l| l.max(now))));
    }
}
