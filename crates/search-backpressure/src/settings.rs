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

//! The settings surface under `search_backpressure.*`, split into static
//! fields (immutable after construction) and dynamic fields (atomic
//! cells, replaceable at runtime with listener notification).

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::SettingsError;

/// Which token-bucket exhaustion policy stops cancellation for the tick.
///
/// `BothExhausted` (the default) only stops once both the wall-time and
/// the completion-ratio bucket are dry; `EitherExhausted` is exposed as
/// an explicit opt-in for a host that wants the stricter AND-style
/// policy instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPolicy {
    BothExhausted,
    EitherExhausted,
}

/// Fields that never change after construction.
#[derive(Debug, Clone)]
pub struct StaticSettings {
    pub interval: Duration,
    pub cancellation_ratio: f64,
    /// Tokens per nanosecond.
    pub cancellation_rate: f64,
    pub cancellation_burst: f64,
    pub limit_policy: LimitPolicy,
    /// The process's maximum heap size, exposed as a startup constant so
    /// the `*_heap_usage_threshold` fractions can be converted to bytes.
    pub max_heap_bytes: i64,
}

fn validate_static(s: &StaticSettings) -> Result<(), SettingsError> {
    if s.interval.as_millis() < 1 {
        return Err(SettingsError::MustBeAtLeastOne { field: "interval", value: s.interval.as_millis() as i64 });
    }
    // The completion-counted token bucket's clock only advances on
    // completions, so its rate (this field) must be strictly positive for
    // the bucket to ever refill, in addition to the nominal `0..=1` unit
    // fraction check below.
    require_unit_fraction("cancellation_ratio", s.cancellation_ratio)?;
    require_positive("cancellation_ratio", s.cancellation_ratio)?;
    require_positive("cancellation_rate", s.cancellation_rate)?;
    require_positive("cancellation_burst", s.cancellation_burst)?;
    Ok(())
}

fn require_unit_fraction(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SettingsError::NotAUnitFraction { field, value: value.to_string() });
    }
    Ok(())
}

fn require_non_negative(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if value < 0.0 {
        return Err(SettingsError::MustBeNonNegative { field, value: value.to_string() });
    }
    Ok(())
}

fn require_positive(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if value <= 0.0 {
        return Err(SettingsError::MustBePositive { field, value: value.to_string() });
    }
    Ok(())
}

/// A plain-value snapshot of the dynamic knobs, used both to construct the
/// atomic cells and to hand to change listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicValues {
    pub enabled: bool,
    pub enforced: bool,
    pub num_consecutive_breaches: usize,
    pub cpu_threshold: f64,
    pub heap_threshold: f64,
    pub search_heap_usage_threshold: f64,
    pub search_task_heap_usage_threshold: f64,
    pub search_task_heap_usage_variance: f64,
    pub search_task_cpu_time_threshold_ns: i64,
    pub search_task_elapsed_time_threshold_ns: i64,
}

impl Default for DynamicValues {
    fn default() -> Self {
        Self {
            enabled: true,
            enforced: true,
            num_consecutive_breaches: 3,
            cpu_threshold: 0.9,
            heap_threshold: 0.7,
            search_heap_usage_threshold: 0.05,
            search_task_heap_usage_threshold: 0.005,
            search_task_heap_usage_variance: 2.0,
            search_task_cpu_time_threshold_ns: Duration::from_millis(15).as_nanos() as i64,
            search_task_elapsed_time_threshold_ns: Duration::from_millis(30_000).as_nanos() as i64,
        }
    }
}

fn validate_dynamic(v: &DynamicValues) -> Result<(), SettingsError> {
    if v.num_consecutive_breaches < 1 {
        return Err(SettingsError::MustBeAtLeastOne {
            field: "node_duress.num_consecutive_breaches",
            value: v.num_consecutive_breaches as i64,
        });
    }
    require_unit_fraction("node_duress.cpu_threshold", v.cpu_threshold)?;
    require_unit_fraction("node_duress.heap_threshold", v.heap_threshold)?;
    require_unit_fraction("search_heap_usage_threshold", v.search_heap_usage_threshold)?;
    require_unit_fraction("search_task_heap_usage_threshold", v.search_task_heap_usage_threshold)?;
    require_non_negative("search_task_heap_usage_variance", v.search_task_heap_usage_variance)?;
    if v.search_task_cpu_time_threshold_ns < 0 {
        return Err(SettingsError::MustBeNonNegative {
            field: "search_task_cpu_time_threshold",
            value: v.search_task_cpu_time_threshold_ns.to_string(),
        });
    }
    if v.search_task_elapsed_time_threshold_ns < 0 {
        return Err(SettingsError::MustBeNonNegative {
            field: "search_task_elapsed_time_threshold",
            value: v.search_task_elapsed_time_threshold_ns.to_string(),
        });
    }
    Ok(())
}

/// Atomic cells for the dynamic knobs. Reads are wait-free; writes go
/// through `Settings::apply`, which is the single settings owner.
struct DynamicCells {
    enabled: AtomicBool,
    enforced: AtomicBool,
    num_consecutive_breaches: AtomicUsize,
    cpu_threshold: AtomicU64,
    heap_threshold: AtomicU64,
    search_heap_usage_threshold: AtomicU64,
    search_task_heap_usage_threshold: AtomicU64,
    search_task_heap_usage_variance: AtomicU64,
    search_task_cpu_time_threshold_ns: AtomicI64,
    search_task_elapsed_time_threshold_ns: AtomicI64,
}

impl DynamicCells {
    fn new(v: DynamicValues) -> Self {
        Self {
            enabled: AtomicBool::new(v.enabled),
            enforced: AtomicBool::new(v.enforced),
            num_consecutive_breaches: AtomicUsize::new(v.num_consecutive_breaches),
            cpu_threshold: AtomicU64::new(v.cpu_threshold.to_bits()),
            heap_threshold: AtomicU64::new(v.heap_threshold.to_bits()),
            search_heap_usage_threshold: AtomicU64::new(v.search_heap_usage_threshold.to_bits()),
            search_task_heap_usage_threshold: AtomicU64::new(v.search_task_heap_usage_threshold.to_bits()),
            search_task_heap_usage_variance: AtomicU64::new(v.search_task_heap_usage_variance.to_bits()),
            search_task_cpu_time_threshold_ns: AtomicI64::new(v.search_task_cpu_time_threshold_ns),
            search_task_elapsed_time_threshold_ns: AtomicI64::new(v.search_task_elapsed_time_threshold_ns),
        }
    }

    fn store(&self, v: DynamicValues) {
        self.enabled.store(v.enabled, Ordering::SeqCst);
        self.enforced.store(v.enforced, Ordering::SeqCst);
        self.num_consecutive_breaches.store(v.num_consecutive_breaches, Ordering::SeqCst);
        self.cpu_threshold.store(v.cpu_threshold.to_bits(), Ordering::SeqCst);
        self.heap_threshold.store(v.heap_threshold.to_bits(), Ordering::SeqCst);
        self.search_heap_usage_threshold.store(v.search_heap_usage_threshold.to_bits(), Ordering::SeqCst);
        self.search_task_heap_usage_threshold.store(v.search_task_heap_usage_threshold.to_bits(), Ordering::SeqCst);
        self.search_task_heap_usage_variance.store(v.search_task_heap_usage_variance.to_bits(), Ordering::SeqCst);
        self.search_task_cpu_time_threshold_ns.store(v.search_task_cpu_time_threshold_ns, Ordering::SeqCst);
        self.search_task_elapsed_time_threshold_ns.store(v.search_task_elapsed_time_threshold_ns, Ordering::SeqCst);
    }

    fn snapshot(&self) -> DynamicValues {
        DynamicValues {
            enabled: self.enabled.load(Ordering::SeqCst),
            enforced: self.enforced.load(Ordering::SeqCst),
            num_consecutive_breaches: self.num_consecutive_breaches.load(Ordering::SeqCst),
            cpu_threshold: f64::from_bits(self.cpu_threshold.load(Ordering::SeqCst)),
            heap_threshold: f64::from_bits(self.heap_threshold.load(Ordering::SeqCst)),
            search_heap_usage_threshold: f64::from_bits(self.search_heap_usage_threshold.load(Ordering::SeqCst)),
            search_task_heap_usage_threshold: f64::from_bits(
                self.search_task_heap_usage_threshold.load(Ordering::SeqCst),
            ),
            search_task_heap_usage_variance: f64::from_bits(
                self.search_task_heap_usage_variance.load(Ordering::SeqCst),
            ),
            search_task_cpu_time_threshold_ns: self.search_task_cpu_time_threshold_ns.load(Ordering::SeqCst),
            search_task_elapsed_time_threshold_ns: self
                .search_task_elapsed_time_threshold_ns
                .load(Ordering::SeqCst),
        }
    }
}

type ChangeListener = Box<dyn Fn(DynamicValues) + Send + Sync>;

/// The full settings object: static fields plus atomically-readable
/// dynamic fields, with listener fan-out on dynamic updates.
pub struct Settings {
    pub static_settings: StaticSettings,
    dynamic: DynamicCells,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl Settings {
    /// Builds a settings object, validating every field. Rejected
    /// settings never reach the controller.
    pub fn build(static_settings: StaticSettings, dynamic: DynamicValues) -> Result<Arc<Self>, SettingsError> {
        validate_static(&static_settings)?;
        validate_dynamic(&dynamic)?;
        Ok(Arc::new(Self {
            static_settings,
            dynamic: DynamicCells::new(dynamic),
            listeners: Mutex::new(Vec::new()),
        }))
    }

    /// Convenience constructor using the standard defaults.
    pub fn with_defaults(max_heap_bytes: i64) -> Result<Arc<Self>, SettingsError> {
        Self::build(
            StaticSettings {
                interval: Duration::from_millis(1000),
                cancellation_ratio: 0.1,
                cancellation_rate: 3e-9,
                cancellation_burst: 10.0,
                limit_policy: LimitPolicy::BothExhausted,
                max_heap_bytes,
            },
            DynamicValues::default(),
        )
    }

    /// Atomically replaces the dynamic knobs and fans out to listeners.
    /// Rejects the update (leaving current values untouched) if invalid.
    pub fn apply(&self, update: DynamicValues) -> Result<(), SettingsError> {
        validate_dynamic(&update)?;
        self.dynamic.store(update);
        for listener in self.listeners.lock().iter() {
            listener(update);
        }
        Ok(())
    }

    /// Registers a callback invoked on every successful `apply`.
    pub fn on_change(&self, listener: impl Fn(DynamicValues) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }

    pub fn enabled(&self) -> bool {
        self.dynamic.enabled.load(Ordering::SeqCst)
    }

    pub fn enforced(&self) -> bool {
        self.dynamic.enforced.load(Ordering::SeqCst)
    }

    pub fn num_consecutive_breaches(&self) -> usize {
        self.dynamic.num_consecutive_breaches.load(Ordering::SeqCst)
    }

    pub fn cpu_threshold(&self) -> f64 {
        f64::from_bits(self.dynamic.cpu_threshold.load(Ordering::SeqCst))
    }

    pub fn heap_threshold(&self) -> f64 {
        f64::from_bits(self.dynamic.heap_threshold.load(Ordering::SeqCst))
    }

    pub fn search_task_cpu_time_threshold_ns(&self) -> i64 {
        self.dynamic.search_task_cpu_time_threshold_ns.load(Ordering::SeqCst)
    }

    pub fn search_task_elapsed_time_threshold_ns(&self) -> i64 {
        self.dynamic.search_task_elapsed_time_threshold_ns.load(Ordering::SeqCst)
    }

    pub fn search_task_heap_usage_variance(&self) -> f64 {
        f64::from_bits(self.dynamic.search_task_heap_usage_variance.load(Ordering::SeqCst))
    }

    /// Absolute heap-byte threshold for "search-driven" node heap pressure,
    /// converted from the configured fraction.
    pub fn search_heap_bytes(&self) -> i64 {
        let fraction = f64::from_bits(self.dynamic.search_heap_usage_threshold.load(Ordering::SeqCst));
        (self.static_settings.max_heap_bytes as f64 * fraction) as i64
    }

    /// Absolute per-task heap floor below which the heap tracker never
    /// issues a verdict.
    pub fn per_task_heap_floor_bytes(&self) -> i64 {
        let fraction = f64::from_bits(self.dynamic.search_task_heap_usage_threshold.load(Ordering::SeqCst));
        (self.static_settings.max_heap_bytes as f64 * fraction) as i64
    }

    pub fn snapshot_dynamic(&self) -> DynamicValues {
        self.dynamic.snapshot()
    }
}
