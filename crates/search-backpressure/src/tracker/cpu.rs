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

//! Stateless tracker: flags tasks whose cumulative CPU time has crossed
//! the configured threshold.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{CpuStats, ResourceUsageTracker, TrackerStats, Verdict};
use crate::error::TrackerError;
use crate::settings::Settings;
use crate::task::TaskHandle;

#[derive(Default)]
pub struct CpuUsageTracker {
    cancellations: AtomicU64,
}

impl CpuUsageTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceUsageTracker for CpuUsageTracker {
    fn name(&self) -> &'static str {
        "cpu_usage_tracker"
    }

    fn update(&self, _task: &dyn TaskHandle) -> Result<(), TrackerError> {
        // Stateless; nothing to learn from a completion.
        Ok(())
    }

    fn cancellation_reason(
        &self,
        task: &dyn TaskHandle,
        settings: &Settings,
        _now_ns: i64,
    ) -> Result<Option<Verdict>, TrackerError> {
        if task.cpu_ns() >= settings.search_task_cpu_time_threshold_ns() {
            Ok(Some(Verdict {
                tracker_name: self.name(),
                message: "cpu usage exceeded".to_string(),
                score: 1,
            }))
        } else {
            Ok(None)
        }
    }

    fn current_stats(&self, active_tasks: &[Arc<dyn TaskHandle>], _now_ns: i64) -> TrackerStats {
        let max = active_tasks.iter().map(|t| t.cpu_ns()).max().unwrap_or(0);
        let avg = if active_tasks.is_empty() {
            0.0
        } else {
            active_tasks.iter().map(|t| t.cpu_ns()).sum::<i64>() as f64 / active_tasks.len() as f64
        };
        TrackerStats::Cpu(CpuStats { current_max: max, current_avg: avg })
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
    use crate::settings::Settings;
    use crate::task::TaskKind;

    struct StubTask {
        cpu_ns: i64,
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
            self.cpu_ns
        }
        fn heap_bytes(&self) -> i64 {
            0
        }
        fn start_ns(&self) -> i64 {
            0
        }
        fn cancelled(&self) -> bool {
            false
        }
        fn cancel(&self, _reason: &str) -> Result<(), crate::error::CancelError> {
            Ok(())
        }
    }

    #[test]
    fn verdict_iff_over_threshold() {
        let settings = Settings::with_defaults(1_000_000_000).unwrap();
        let tracker = CpuUsageTracker::new();

        let under = StubTask { cpu_ns: settings.search_task_cpu_time_threshold_ns() - 1 };
        assert!(tracker.cancellation_reason(&under, &settings, 0).unwrap().is_none());

        let over = StubTask { cpu_ns: settings.search_task_cpu_time_threshold_ns() };
        let verdict = tracker.cancellation_reason(&over, &settings, 0).unwrap().unwrap();
        assert_eq!(verdict.score, 1);
    }
}
