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

//! The periodic control loop: duress detection, task scan, ranked
//! cancellation plan, rate-limited firing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancellation::{rank, CancelledTaskStats, TaskCancellation};
use crate::registry::TaskRegistry;
use crate::scheduler::{ScheduledHandle, Scheduler};
use crate::sensors::ResourceSensors;
use crate::settings::{LimitPolicy, Settings};
use crate::stats::{
    CancellationStats, CurrentStats, SearchBackpressureStats, SearchShardTaskCancellationStats,
    SearchShardTaskCurrentStats,
};
use crate::streak::Streak;
use crate::task::{TaskHandle, TaskKind};
use crate::token_bucket::TokenBucket;
use crate::tracker::{CpuStats, ElapsedTimeStats, HeapStats, ResourceUsageTracker, TrackerStats};

/// Owns every piece of the controller's runtime state: the two duress
/// streaks, counters, the tracker list, both token
/// buckets, and the settings handle. Trackers own their own internal
/// state (moving averages, per-tracker cancellation counts); tasks are
/// never owned, only observed through `Arc<dyn TaskHandle>`.
pub struct BackpressureController {
    settings: Arc<Settings>,
    sensors: Arc<dyn ResourceSensors>,
    registry: Arc<dyn TaskRegistry>,
    clock_ns: Arc<dyn Fn() -> i64 + Send + Sync>,
    trackers: Vec<Arc<dyn ResourceUsageTracker>>,

    cpu_streak: Streak,
    heap_streak: Streak,

    completions: Arc<AtomicU64>,
    cancellations: AtomicU64,
    limit_reached: AtomicU64,
    last_cancelled: Mutex<Option<CancelledTaskStats>>,

    time_bucket: TokenBucket,
    completion_bucket: TokenBucket,

    scheduled: Mutex<Option<Box<dyn ScheduledHandle>>>,
}

impl BackpressureController {
    /// Builds a controller over the given collaborators. `clock_ns` feeds
    /// both the elapsed-time tracker and the wall-time token bucket, so a
    /// single injected clock keeps them consistent in tests.
    pub fn new(
        settings: Arc<Settings>,
        sensors: Arc<dyn ResourceSensors>,
        registry: Arc<dyn TaskRegistry>,
        trackers: Vec<Arc<dyn ResourceUsageTracker>>,
        clock_ns: Arc<dyn Fn() -> i64 + Send + Sync>,
    ) -> Arc<Self> {
        let completions = Arc::new(AtomicU64::new(0));

        let time_bucket = TokenBucket::new(
            settings.static_settings.cancellation_rate,
            settings.static_settings.cancellation_burst,
            clock_ns.clone(),
        )
        .expect("cancellation_rate/cancellation_burst validated at settings construction");

        let completion_clock: Arc<dyn Fn() -> i64 + Send + Sync> = {
            let completions = completions.clone();
            Arc::new(move || completions.load(Ordering::SeqCst) as i64)
        };
        let completion_bucket = TokenBucket::new(
            settings.static_settings.cancellation_ratio,
            settings.static_settings.cancellation_burst,
            completion_clock,
        )
        .expect("cancellation_ratio/cancellation_burst validated at settings construction");

        Arc::new(Self {
            settings,
            sensors,
            registry,
            clock_ns,
            trackers,
            cpu_streak: Streak::new(),
            heap_streak: Streak::new(),
            completions,
            cancellations: AtomicU64::new(0),
            limit_reached: AtomicU64::new(0),
            last_cancelled: Mutex::new(None),
            time_bucket,
            completion_bucket,
            scheduled: Mutex::new(None),
        })
    }

    /// Registers `tick` with the given scheduler at the configured
    /// interval. Replaces any previously scheduled tick.
    pub fn start(self: &Arc<Self>, scheduler: &dyn Scheduler) {
        let controller = self.clone();
        let handle = scheduler.schedule_fixed_delay(
            self.settings.static_settings.interval,
            Arc::new(move || controller.tick()),
        );
        *self.scheduled.lock() = Some(handle);
    }

    /// Cancels the scheduled tick. Idempotent; an in-flight tick completes.
    pub fn shutdown(&self) {
        if let Some(handle) = self.scheduled.lock().take() {
            handle.cancel();
        }
    }

    /// Invoked by the execution engine for every completed task.
    pub fn on_task_completed(&self, task: &dyn TaskHandle) {
        if task.kind() != TaskKind::SearchShardTask {
            return;
        }
        if !task.cancelled() {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
        for tracker in &self.trackers {
            if let Err(error) = tracker.update(task) {
                tracing::warn!(tracker = tracker.name(), task_id = task.id(), %error, "tracker update failed");
            }
        }
    }

    /// The periodic control loop. Every failure inside a tick is
    /// contained within the tick; the schedule itself is never disrupted.
    #[tracing::instrument(skip(self))]
    pub fn tick(&self) {
        if !self.settings.enabled() {
            return;
        }
        if !self.node_in_duress() {
            return;
        }

        let tasks = self.registry.live_tasks();
        if let Err(error) = self.registry.refresh_stats(&tasks) {
            tracing::warn!(%error, "task stats refresh failed; proceeding with stale stats");
        }

        let now_ns = (self.clock_ns)();
        let total_heap: i64 = tasks.iter().map(|t| t.heap_bytes()).sum();
        let search_heap_bytes = self.settings.search_heap_bytes();
        if total_heap < search_heap_bytes {
            tracing::debug!(total_heap, search_heap_bytes, "heap pressure is not search-driven");
            return;
        }

        let candidates: Vec<TaskCancellation> = tasks
            .into_iter()
            .map(|task| {
                let verdicts = self
                    .trackers
                    .iter()
                    .filter_map(|tracker| match tracker.cancellation_reason(task.as_ref(), &self.settings, now_ns) {
                        Ok(verdict) => verdict,
                        Err(error) => {
                            tracing::warn!(
                                tracker = tracker.name(),
                                task_id = task.id(),
                                %error,
                                "tracker raised while computing a verdict; skipping"
                            );
                            None
                        }
                    })
                    .collect();
                TaskCancellation { task, verdicts }
            })
            .filter(|candidate| candidate.is_eligible())
            .collect();

        let plan = rank(candidates);

        for candidate in &plan {
            tracing::info!(
                task_id = candidate.task.id(),
                action = candidate.task.action(),
                score = candidate.total_score(),
                "cancellation intent"
            );

            if !self.settings.enforced() {
                continue;
            }

            let ok_time = self.time_bucket.request();
            let ok_ratio = self.completion_bucket.request();
            let exhausted = match self.settings.static_settings.limit_policy {
                LimitPolicy::BothExhausted => !ok_time && !ok_ratio,
                LimitPolicy::EitherExhausted => !ok_time || !ok_ratio,
            };
            if exhausted {
                self.limit_reached.fetch_add(1, Ordering::SeqCst);
                metrics::counter!("search_backpressure_cancellation_limit_reached_count", 1);
                break;
            }

            match candidate.cancel(&self.trackers, now_ns) {
                Ok(cancelled_stats) => {
                    *self.last_cancelled.lock() = Some(cancelled_stats);
                    self.cancellations.fetch_add(1, Ordering::SeqCst);
                    metrics::counter!("search_backpressure_cancellation_count", 1);
                }
                Err(error) => {
                    tracing::warn!(task_id = candidate.task.id(), %error, "task cancel failed");
                }
            }
        }
    }

    /// Reads both sensors, updates both streaks, and reports whether
    /// either streak has reached the configured consecutive-breach count.
    fn node_in_duress(&self) -> bool {
        let cpu_breach = match self.sensors.cpu_load() {
            Ok(load) => load >= self.settings.cpu_threshold(),
            Err(error) => {
                tracing::debug!(%error, "cpu sensor unavailable; treating as not breached");
                false
            }
        };
        let heap_breach = match self.sensors.heap_used_fraction() {
            Ok(fraction) => fraction >= self.settings.heap_threshold(),
            Err(error) => {
                tracing::debug!(%error, "heap sensor unavailable; treating as not breached");
                false
            }
        };

        let cpu_run = self.cpu_streak.record(cpu_breach);
        let heap_run = self.heap_streak.record(heap_breach);
        let n = self.settings.num_consecutive_breaches();

        let in_duress = cpu_run >= n || heap_run >= n;
        metrics::gauge!("search_backpressure_cpu_breach_streak", cpu_run as f64);
        metrics::gauge!("search_backpressure_heap_breach_streak", heap_run as f64);
        in_duress
    }

    /// A point-in-time snapshot; has no side effects and does not mutate
    /// any counter. Calling it repeatedly is always safe.
    pub fn stats(&self) -> SearchBackpressureStats {
        let now_ns = (self.clock_ns)();
        let tasks = self.registry.live_tasks();

        let mut cpu_stats = CpuStats { current_max: 0, current_avg: 0.0 };
        let mut heap_stats = HeapStats { current_max: 0, current_avg: 0.0, rolling_avg: 0.0 };
        let mut elapsed_stats = ElapsedTimeStats { current_max: 0, current_avg: 0.0 };
        let mut cancellation_breakup = HashMap::new();

        for tracker in &self.trackers {
            match tracker.current_stats(&tasks, now_ns) {
                TrackerStats::Cpu(stats) => cpu_stats = stats,
                TrackerStats::Heap(stats) => heap_stats = stats,
                TrackerStats::ElapsedTime(stats) => elapsed_stats = stats,
            }
            cancellation_breakup.insert(tracker.name().to_string(), tracker.cancellations_count());
        }

        SearchBackpressureStats {
            current_stats: CurrentStats {
                search_shard_task: SearchShardTaskCurrentStats {
                    cpu_usage_tracker: cpu_stats,
                    heap_usage_tracker: heap_stats,
                    elapsed_time_tracker: elapsed_stats,
                },
            },
            cancellation_stats: CancellationStats {
                search_shard_task: SearchShardTaskCancellationStats {
                    cancellation_count: self.cancellations.load(Ordering::SeqCst),
                    cancellation_breakup,
                    cancellation_limit_reached_count: self.limit_reached.load(Ordering::SeqCst),
                    last_cancelled_task: *self.last_cancelled.lock(),
                },
            },
            enabled: self.settings.enabled(),
            enforced: self.settings.enforced(),
        }
    }
}
