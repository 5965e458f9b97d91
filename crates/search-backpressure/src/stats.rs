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

//! The observability snapshot, with a stable field layout so a consumer
//! can serialize this shape into whatever wire format it already uses.
//!
//! A host nests this under its own `search_backpressure` key; the fields
//! below are everything that sits underneath it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cancellation::CancelledTaskStats;
use crate::tracker::{CpuStats, ElapsedTimeStats, HeapStats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchShardTaskCurrentStats {
    pub cpu_usage_tracker: CpuStats,
    pub heap_usage_tracker: HeapStats,
    pub elapsed_time_tracker: ElapsedTimeStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentStats {
    pub search_shard_task: SearchShardTaskCurrentStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchShardTaskCancellationStats {
    pub cancellation_count: u64,
    pub cancellation_breakup: HashMap<String, u64>,
    pub cancellation_limit_reached_count: u64,
    pub last_cancelled_task: Option<CancelledTaskStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationStats {
    pub search_shard_task: SearchShardTaskCancellationStats,
}

/// The full stats snapshot. `stats()` is idempotent with no side effects:
/// producing one never mutates any counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBackpressureStats {
    pub current_stats: CurrentStats,
    pub cancellation_stats: CancellationStats,
    pub enabled: bool,
    pub enforced: bool,
}
