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

//! Per-task resource trackers: a minimal shared contract plus three
//! concrete trackers (CPU, heap, elapsed time).
//!
//! Deliberately avoids deep inheritance with nullable factory points and a
//! universal `map<string, double>` for stats: the contract is a small
//! trait, and each tracker's stats are their own value type combined into
//! one sum type.

mod cpu;
mod elapsed;
mod heap;

pub use cpu::CpuUsageTracker;
pub use elapsed::ElapsedTimeTracker;
pub use heap::HeapUsageTracker;

use std::sync::Arc;

use crate::error::TrackerError;
use crate::settings::Settings;
use crate::task::TaskHandle;

/// One tracker's per-task decision. Score is additive across trackers on
/// the same task.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub tracker_name: &'static str,
    pub message: String,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CpuStats {
    pub current_max: i64,
    pub current_avg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HeapStats {
    pub current_max: i64,
    pub current_avg: f64,
    pub rolling_avg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ElapsedTimeStats {
    pub current_max: i64,
    pub current_avg: f64,
}

/// Per-tracker stats, modeled as a sum over the three concrete kinds
/// rather than a generic string-keyed map.
#[derive(Debug, Clone, Copy)]
pub enum TrackerStats {
    Cpu(CpuStats),
    Heap(HeapStats),
    ElapsedTime(ElapsedTimeStats),
}

/// The shared contract every resource tracker implements.
pub trait ResourceUsageTracker: Send + Sync {
    /// A stable, unique name used in `cancellation_breakup` stats.
    fn name(&self) -> &'static str;

    /// Called on every non-cancelled task completion. May be a no-op.
    fn update(&self, task: &dyn TaskHandle) -> Result<(), TrackerError>;

    /// Produces a verdict for this task, or `None` if this tracker has no
    /// opinion. `now_ns` is the current wall-clock reading, needed by the
    /// elapsed-time tracker.
    fn cancellation_reason(
        &self,
        task: &dyn TaskHandle,
        settings: &Settings,
        now_ns: i64,
    ) -> Result<Option<Verdict>, TrackerError>;

    /// Aggregate stats over the currently active task set.
    fn current_stats(&self, active_tasks: &[Arc<dyn TaskHandle>], now_ns: i64) -> TrackerStats;

    /// Monotonic count of cancellations this tracker has contributed to.
    fn cancellations_count(&self) -> u64;

    /// Called once per contributing tracker when a task is actually
    /// cancelled.
    fn increment_cancellations(&self);
}
