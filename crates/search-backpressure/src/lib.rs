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

//! A node-local search backpressure controller.
//!
//! Monitors CPU and heap pressure on a single node and, when the node is
//! under sustained duress, cancels in-flight search shard tasks that are
//! disproportionately responsible for that pressure. Decides whether to
//! act (the duress detector), which tasks to stop (per-task resource
//! trackers and ranking), and how many to stop per unit of time (a
//! dual-bucket rate limiter).
//!
//! The task execution engine, the scheduler, the settings transport and
//! the stats wire format are all external collaborators; this crate
//! defines the traits it consumes them through (`TaskHandle`,
//! `TaskRegistry`, `Scheduler`, `ResourceSensors`) and ships minimal
//! usable defaults (`InMemoryTaskRegistry`, `TokioScheduler`) so it can be
//! exercised standalone.

pub mod cancellation;
pub mod config;
pub mod controller;
pub mod error;
pub mod moving_average;
pub mod registry;
pub mod scheduler;
pub mod sensors;
pub mod settings;
pub mod stats;
pub mod streak;
pub mod task;
pub mod token_bucket;
pub mod tracker;

pub use cancellation::{CancelledTaskStats, TaskCancellation};
pub use config::ConfigLoader;
pub use controller::BackpressureController;
pub use registry::{InMemoryTaskRegistry, TaskRegistry};
pub use scheduler::{ScheduledHandle, Scheduler, TokioScheduler};
pub use sensors::ResourceSensors;
pub use settings::{DynamicValues, LimitPolicy, Settings, StaticSettings};
pub use stats::SearchBackpressureStats;
pub use task::{TaskHandle, TaskKind};
pub use tracker::{CpuUsageTracker, ElapsedTimeTracker, HeapUsageTracker, ResourceUsageTracker};
