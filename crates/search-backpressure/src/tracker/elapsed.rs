// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Stateless (besides the clock) tracker: flags tasks that have run
//! longer than the configured elapsed-time threshold.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{ElapsedTimeStats, ResourceUsageTracker, TrackerStats, Verdict};
use crate::error::TrackerError;
use crate::settings::Settings;
use crate::task::TaskHandle;

#[derive(Default)]
pub struct ElapsedTimeTracker {
    cancellations: AtomicU64,
}

impl ElapsedTimeTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceUsageTracker for ElapsedTimeTracker {
    fn name(&self) -> &'static str {
        "elapsed_time_tracker"
    }

    fn update(&self, _task: &dyn TaskHandle) -> Result<(), TrackerError> {
        Ok(())
    }

    fn cancellation_reason(
        &self,
        task: &dyn TaskHandle,
        settings: &Settings,
        now_ns: i64,
    ) -> Result<Option<Verdict>, TrackerError> {
        let elapsed = now_ns - task.start_ns();
        if elapsed >= settings.search_task_elapsed_time_threshold_ns() {
            Ok(Some(Verdict {
                tracker_name: self.name(),
                message: "elapsed time exceeded".to_string(),
                score: 1,
            }))
        } else {
            Ok(None)
        }
    }

    fn current_stats(&self, active_tasks: &[Arc<dyn TaskHandle>], now_ns: i64) -> TrackerStats {
        let elapsed = |t: &Arc<dyn TaskHandle>| now_ns - t.start_ns();
        let max = active_tasks.iter().map(elapsed).max().unwrap_or(0);
        let avg = if active_tasks.is_empty() {
            0.0
        } else {
            active_tasks.iter().map(elapsed).sum::<i64>() as f64 / active_tasks.len() as f64
        };
        TrackerStats::ElapsedTime(ElapsedTimeStats { current_max: max, current_avg: avg })
    }

    fn cancellations_count(&self) -> u64 {
        self.cancellations.load(Ordering::Relaxed)
    }

    fn increment_cancellations(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    struct StubTask {
        start_ns: i64,
    }

    impl TaskHandle for StubTask {
        fn id(&self) -> u64 {
            1
        }
        fn action(&self) -> &str {
            "query"
        }
        fn kind(&self) -> TaskKind {
            TaskKind::SearchShardTask
        }
        fn cpu_ns(&self) -> i64 {
            0
        }
        fn heap_bytes(&self) -> i64 {
            0
        }
        fn start_ns(&self) -> i64 {
            self.start_ns
        }
        fn cancelled(&self) -> bool {
            false
        }
        fn cancel(&self, _reason: &str) -> Result<(), crate::error::CancelError> {
            Ok(())
        }
    }

    #[test]
    fn verdict_iff_elapsed_over_threshold() {
        let settings = Settings::with_defaults(1_000_000_000).unwrap();
        let tracker = ElapsedTimeTracker::new();
        let threshold = settings.search_task_elapsed_time_threshold_ns();

        let fresh = StubTask { start_ns: 0 };
        assert!(tracker.cancellation_reason(&fresh, &settings, threshold - 1).unwrap().is_none());
        let stale = StubTask { start_ns: 0 };
        assert!(tracker.cancellation_reason(&stale, &settings, threshold).unwrap().is_some());
    }
}
