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

//! Stateful tracker: owns a moving average of completed tasks' heap usage
//! and flags tasks whose heap footprint is an outlier relative to it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{HeapStats, ResourceUsageTracker, TrackerStats, Verdict};
use crate::error::TrackerError;
use crate::moving_average::MovingAverage;
use crate::settings::Settings;
use crate::task::TaskHandle;

pub struct HeapUsageTracker {
    moving_avg: MovingAverage,
    cancellations: AtomicU64,
}

impl HeapUsageTracker {
    /// `window` is the number of completed-task heap samples the rolling
    /// average is computed over.
    pub fn new(window: usize) -> Option<Self> {
        Some(Self { moving_avg: MovingAverage::new(window)?, cancellations: AtomicU64::new(0) })
    }
}

impl ResourceUsageTracker for HeapUsageTracker {
    fn name(&self) -> &'static str {
        "heap_usage_tracker"
    }

    fn update(&self, task: &dyn TaskHandle) -> Result<(), TrackerError> {
        self.moving_avg.record(task.heap_bytes());
        Ok(())
    }

    fn cancellation_reason(
        &self,
        task: &dyn TaskHandle,
        settings: &Settings,
        _now_ns: i64,
    ) -> Result<Option<Verdict>, TrackerError> {
        if !self.moving_avg.ready() {
            return Ok(None);
        }

        let task_heap = task.heap_bytes();
        let avg = self.moving_avg.average();
        let allowed = avg * settings.search_task_heap_usage_variance();

        if (task_heap as f64) < settings.per_task_heap_floor_bytes() as f64 || (task_heap as f64) < allowed {
            return Ok(None);
        }

        let score = ((task_heap as f64) / avg).floor().max(1.0) as u32;
        Ok(Some(Verdict {
            tracker_name: self.name(),
            message: "heap usage exceeded".to_string(),
            score,
        }))
    }

    fn current_stats(&self, active_tasks: &[Arc<dyn TaskHandle>], _now_ns: i64) -> TrackerStats {
        let max = active_tasks.iter().map(|t| t.heap_bytes()).max().unwrap_or(0);
        let avg = if active_tasks.is_empty() {
            0.0
        } else {
            active_tasks.iter().map(|t| t.heap_bytes()).sum::<i64>() as f64 / active_tasks.len() as f64
        };
        TrackerStats::Heap(HeapStats { current_max: max, current_avg: avg, rolling_avg: self.moving_avg.average() })
    }

    fn cancellations_count(&self) -> u64 {
        self.cancellations.load(Ordering::Relaxed)
    }

    fn increment_cancellations(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }
}
