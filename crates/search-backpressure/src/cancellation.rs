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

//! Bundles every tracker's verdict for one task into a single cancellation
//! candidate, ranked by total score.

use std::sync::Arc;

use crate::error::CancelError;
use crate::task::TaskHandle;
use crate::tracker::{ResourceUsageTracker, Verdict};

/// A snapshot taken at the moment a task is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CancelledTaskStats {
    pub heap_usage_bytes: i64,
    pub cpu_usage_nanos: i64,
    pub elapsed_time_nanos: i64,
}

/// One task plus every verdict that was raised against it this tick.
pub struct TaskCancellation {
    pub task: Arc<dyn TaskHandle>,
    pub verdicts: Vec<Verdict>,
}

impl TaskCancellation {
    pub fn total_score(&self) -> u32 {
        self.verdicts.iter().map(|v| v.score).sum()
    }

    /// A task is only a cancellation candidate if it isn't already
    /// cancelled and at least one tracker has an opinion on it.
    pub fn is_eligible(&self) -> bool {
        !self.task.cancelled() && !self.verdicts.is_empty()
    }

    /// Fires the cancellation: joins verdict messages into the reason
    /// string, signals the task, credits every contributing tracker, and
    /// returns a snapshot of the task's stats at cancellation time.
    pub fn cancel(
        &self,
        trackers: &[Arc<dyn ResourceUsageTracker>],
        now_ns: i64,
    ) -> Result<CancelledTaskStats, CancelError> {
        let joined = self.verdicts.iter().map(|v| v.message.as_str()).collect::<Vec<_>>().join(", ");
        let reason = format!("resource consumption exceeded [{joined}]");
        self.task.cancel(&reason)?;

        for verdict in &self.verdicts {
            if let Some(tracker) = trackers.iter().find(|t| t.name() == verdict.tracker_name) {
                tracker.increment_cancellations();
            }
        }

        Ok(CancelledTaskStats {
            heap_usage_bytes: self.task.heap_bytes(),
            cpu_usage_nanos: self.task.cpu_ns(),
            elapsed_time_nanos: now_ns - self.task.start_ns(),
        })
    }
}

/// Sorts cancellation candidates by descending total score, breaking ties
/// stably on ascending task id.
pub fn rank(mut candidates: Vec<TaskCancellation>) -> Vec<TaskCancellation> {
    candidates.sort_by(|a, b| b.total_score().cmp(&a.total_score()).then(a.task.id().cmp(&b.task.id())));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    struct StubTask {
        id: u64,
        cancelled: bool,
    }

    impl TaskHandle for StubTask {
        fn id(&self) -> u64 {
            self.id
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
            0
        }
        fn cancelled(&self) -> bool {
            self.cancelled
        }
        fn cancel(&self, _reason: &str) -> Result<(), CancelError> {
            Ok(())
        }
    }

    fn verdict(score: u32) -> Verdict {
        Verdict { tracker_name: "cpu_usage_tracker", message: "cpu usage exceeded".into(), score }
    }

    #[test]
    fn eligible_requires_uncancelled_and_at_least_one_verdict() {
        let plain = TaskCancellation { task: Arc::new(StubTask { id: 1, cancelled: false }), verdicts: vec![] };
        assert!(!plain.is_eligible());

        let cancelled =
            TaskCancellation { task: Arc::new(StubTask { id: 2, cancelled: true }), verdicts: vec![verdict(1)] };
        assert!(!cancelled.is_eligible());

        let eligible =
            TaskCancellation { task: Arc::new(StubTask { id: 3, cancelled: false }), verdicts: vec![verdict(1)] };
        assert!(eligible.is_eligible());
    }

    #[test]
    fn ranking_is_descending_by_score_then_stable_by_id() {
        let a = TaskCancellation {
            task: Arc::new(StubTask { id: 2, cancelled: false }),
            verdicts: vec![verdict(1)],
        };
        let b = TaskCancellation {
            task: Arc::new(StubTask { id: 1, cancelled: false }),
            verdicts: vec![verdict(1), verdict(1)],
        };
        let c = TaskCancellation {
            task: Arc::new(StubTask { id: 3, cancelled: false }),
            verdicts: vec![verdict(1)],
        };

        let ranked = rank(vec![a, b, c]);
        assert_eq!(ranked[0].task.id(), 1); // score 2
        assert_eq!(ranked[1].task.id(), 2); // score 1, lower id first
        assert_eq!(ranked[2].task.id(), 3);
    }
}
