//! Per-stage time budget measurement for the update cycle.
//!
//! An update call has two measured stages: draining the queue and
//! ticking anti-cheat. Each is compared against the same budget on its
//! own; either one going over marks the whole call as overtime.

use std::time::{Duration, Instant};

use tracing::{debug, trace};
use worldgate_protocol::AccountId;

/// Measures consecutive stages against a fixed budget.
#[derive(Debug)]
pub(crate) struct StageTimer {
    budget: Duration,
    account: AccountId,
    stage_start: Instant,
    overtime: bool,
}

impl StageTimer {
    /// Starts timing the first stage now.
    pub(crate) fn start(budget: Duration, account: AccountId) -> Self {
        Self {
            budget,
            account,
            stage_start: Instant::now(),
            overtime: false,
        }
    }

    /// Ends the current stage and starts the next one.
    ///
    /// Returns the stage's elapsed time.
    pub(crate) fn lap(&mut self, stage: &'static str) -> Duration {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.stage_start);
        self.stage_start = now;

        if elapsed > self.budget {
            self.overtime = true;
            debug!(
                account = %self.account,
                stage,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.budget.as_secs_f64() * 1000.0,
                "session stage exceeded budget"
            );
        } else {
            trace!(
                account = %self.account,
                stage,
                elapsed_us = elapsed.as_micros() as u64,
                "session stage"
            );
        }
        elapsed
    }

    /// `true` if any finished stage went over budget.
    pub(crate) fn overtime(&self) -> bool {
        self.overtime
    }
}
