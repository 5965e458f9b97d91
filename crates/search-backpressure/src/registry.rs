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

//! The task registry contract this controller consumes, plus a minimal
//! in-memory implementation for standalone use and tests.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::RefreshError;
use crate::task::TaskHandle;

/// Enumerates live cancellable tasks and refreshes their resource stats.
///
/// Owned by the execution engine in production; this crate only calls
/// into it.
pub trait TaskRegistry: Send + Sync {
    /// All currently live tasks, keyed by id.
    fn live_tasks(&self) -> Vec<Arc<dyn TaskHandle>>;

    /// Best-effort refresh of resource stats for the given tasks. Failure
    /// is non-fatal to the calling tick.
    fn refresh_stats(&self, tasks: &[Arc<dyn TaskHandle>]) -> Result<(), RefreshError>;
}

/// A `DashMap`-backed registry, useful for a host with no external task
/// engine wired in yet, and for exercising the controller end-to-end in
/// tests. Mirrors the `DashMap<String, Arc<RwLock<TokenBucket>>>` shape
/// this workspace already uses for concurrently-mutated id -> state maps.
#[derive(Default)]
pub struct InMemoryTaskRegistry {
    tasks: DashMap<u64, Arc<dyn TaskHandle>>,
}

impl InMemoryTaskRegistry {
    pub fn new() -> Self {
        Self { tasks: DashMap::new() }
    }

    /// Registers a task so it becomes visible to `live_tasks`.
    pub fn insert(&self, task: Arc<dyn TaskHandle>) {
        self.tasks.insert(task.id(), task);
    }

    /// Removes a task, e.g. once it has completed.
    pub fn remove(&self, id: u64) {
        self.tasks.remove(&id);
    }
}

impl TaskRegistry for InMemoryTaskRegistry {
    fn live_tasks(&self) -> Vec<Arc<dyn TaskHandle>> {
        self.tasks.iter().map(|entry| entry.value().clone()).collect()
    }

    fn refresh_stats(&self, _tasks: &[Arc<dyn TaskHandle>]) -> Result<(), RefreshError> {
        // Stats on a `TaskHandle` are read live through its accessors; an
        // in-memory registry has nothing external to pull from.
        Ok(())
    }
}
