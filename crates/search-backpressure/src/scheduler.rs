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

//! The scheduling capability this controller consumes, plus a `tokio`
//! adapter for standalone use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A handle to a scheduled repeating callback. `cancel` is idempotent.
pub trait ScheduledHandle: Send + Sync {
    fn cancel(&self);
}

/// Fires a callback on a fixed cadence. Owned by the host process,
/// consumed here as a collaborator.
pub trait Scheduler: Send + Sync {
    fn schedule_fixed_delay(
        &self,
        interval: Duration,
        callback: Arc<dyn Fn() + Send + Sync>,
    ) -> Box<dyn ScheduledHandle>;
}

struct TokioHandle {
    cancelled: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl ScheduledHandle for TokioHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

/// Drives `schedule_fixed_delay` with `tokio::time::interval`, the same
/// periodic-loop shape `RateLimiter::cleanup_task` uses for its own
/// background sweep.
#[derive(Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_fixed_delay(
        &self,
        interval: Duration,
        callback: Arc<dyn Fn() + Send + Sync>,
    ) -> Box<dyn ScheduledHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let loop_cancelled = cancelled.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if loop_cancelled.load(Ordering::SeqCst) {
                    break;
                }
                callback();
            }
        });
        Box::new(TokioHandle { cancelled, task })
    }
}
