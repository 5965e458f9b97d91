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

//! Test doubles shared by the end-to-end scenario tests: a manual clock
//! and hand-written fakes for every collaborator trait the controller
//! consumes. No mocking framework; same style the corpus itself tests
//! `RateLimiter`/`CircuitBreaker` with.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use search_backpressure::error::{CancelError, RefreshError, SensorError};
use search_backpressure::{ResourceSensors, TaskHandle, TaskKind, TaskRegistry};

/// Installs a `tracing` subscriber so `controller.tick()`'s log output is
/// visible with `cargo test -- --nocapture`. Idempotent across tests in
/// the same binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// A clock whose reading only moves when the test tells it to.
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Arc::new(AtomicI64::new(0)) }
    }

    pub fn handle(&self) -> Arc<dyn Fn() -> i64 + Send + Sync> {
        let now = self.now.clone();
        Arc::new(move || now.load(Ordering::SeqCst))
    }

    pub fn advance(&self, ns: i64) {
        self.now.fetch_add(ns, Ordering::SeqCst);
    }

    pub fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A task the test controls directly: cpu/heap readings are mutable after
/// construction, cancellation is observable, and failure can be injected.
pub struct FakeTask {
    id: u64,
    kind: TaskKind,
    cpu_ns: AtomicI64,
    heap_bytes: AtomicI64,
    start_ns: i64,
    cancelled: AtomicBool,
    fail_cancel: AtomicBool,
    last_reason: Mutex<Option<String>>,
}

impl FakeTask {
    pub fn search_shard(id: u64, cpu_ns: i64, heap_bytes: i64, start_ns: i64) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind: TaskKind::SearchShardTask,
            cpu_ns: AtomicI64::new(cpu_ns),
            heap_bytes: AtomicI64::new(heap_bytes),
            start_ns,
            cancelled: AtomicBool::new(false),
            fail_cancel: AtomicBool::new(false),
            last_reason: Mutex::new(None),
        })
    }

    pub fn set_heap_bytes(&self, value: i64) {
        self.heap_bytes.store(value, Ordering::SeqCst);
    }

    pub fn set_fail_cancel(&self, fail: bool) {
        self.fail_cancel.store(fail, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel_reason(&self) -> Option<String> {
        self.last_reason.lock().unwrap().clone()
    }
}

impl TaskHandle for FakeTask {
    fn id(&self) -> u64 {
        self.id
    }

    fn action(&self) -> &str {
        "query"
    }

    fn kind(&self) -> TaskKind {
        self.kind
    }

    fn cpu_ns(&self) -> i64 {
        self.cpu_ns.load(Ordering::SeqCst)
    }

    fn heap_bytes(&self) -> i64 {
        self.heap_bytes.load(Ordering::SeqCst)
    }

    fn start_ns(&self) -> i64 {
        self.start_ns
    }

    fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self, reason: &str) -> Result<(), CancelError> {
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(CancelError::Failed { task_id: self.id, reason: "injected failure".into() });
        }
        self.cancelled.store(true, Ordering::SeqCst);
        *self.last_reason.lock().unwrap() = Some(reason.to_string());
        Ok(())
    }
}

/// Node-wide sensor readings the test drives directly, with an optional
/// injected failure for error-containment coverage.
pub struct FakeSensors {
    cpu_load: AtomicU64,
    heap_fraction: AtomicU64,
    fail_cpu: AtomicBool,
    fail_heap: AtomicBool,
}

impl FakeSensors {
    pub fn new(cpu_load: f64, heap_fraction: f64) -> Arc<Self> {
        Arc::new(Self {
            cpu_load: AtomicU64::new(cpu_load.to_bits()),
            heap_fraction: AtomicU64::new(heap_fraction.to_bits()),
            fail_cpu: AtomicBool::new(false),
            fail_heap: AtomicBool::new(false),
        })
    }

    pub fn set_cpu_load(&self, value: f64) {
        self.cpu_load.store(value.to_bits(), Ordering::SeqCst);
    }

    pub fn set_heap_fraction(&self, value: f64) {
        self.heap_fraction.store(value.to_bits(), Ordering::SeqCst);
    }

    pub fn set_fail_cpu(&self, fail: bool) {
        self.fail_cpu.store(fail, Ordering::SeqCst);
    }
}

impl ResourceSensors for FakeSensors {
    fn cpu_load(&self) -> Result<f64, SensorError> {
        if self.fail_cpu.load(Ordering::SeqCst) {
            return Err(SensorError::Unavailable("injected failure".into()));
        }
        Ok(f64::from_bits(self.cpu_load.load(Ordering::SeqCst)))
    }

    fn heap_used_fraction(&self) -> Result<f64, SensorError> {
        if self.fail_heap.load(Ordering::SeqCst) {
            return Err(SensorError::Unavailable("injected failure".into()));
        }
        Ok(f64::from_bits(self.heap_fraction.load(Ordering::SeqCst)))
    }
}

/// An in-test task registry; the controller only ever sees the
/// `TaskRegistry` trait.
pub struct FakeTaskRegistry {
    tasks: Mutex<Vec<Arc<FakeTask>>>,
    fail_refresh: AtomicBool,
}

impl FakeTaskRegistry {
    pub fn new(tasks: Vec<Arc<FakeTask>>) -> Arc<Self> {
        Arc::new(Self { tasks: Mutex::new(tasks), fail_refresh: AtomicBool::new(false) })
    }

    pub fn set_fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }
}

impl TaskRegistry for FakeTaskRegistry {
    fn live_tasks(&self) -> Vec<Arc<dyn TaskHandle>> {
        self.tasks.lock().unwrap().iter().map(|t| t.clone() as Arc<dyn TaskHandle>).collect()
    }

    fn refresh_stats(&self, _tasks: &[Arc<dyn TaskHandle>]) -> Result<(), RefreshError> {
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(RefreshError::Failed("injected failure".into()));
        }
        Ok(())
    }
}
