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

//! Layered loading of [`Settings`] from defaults, environment variables,
//! and an in-process override map, mirroring how `RuntimeConfig::from_env`
//! builds its config: start from `Default`, then let each recognized
//! variable punch through if present and parseable, warning (not failing)
//! on a variable that's set but unparseable.
//!
//! The settings transport itself (a live feed from a cluster-wide config
//! service, say) is an external collaborator per the crate's scope; this
//! module only covers the standalone default path of reading `SEARCH_BACKPRESSURE_*`
//! environment variables at startup.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::SettingsError;
use crate::settings::{DynamicValues, LimitPolicy, Settings, StaticSettings};
use std::sync::Arc;

/// Precedence, lowest to highest: compiled-in defaults, then
/// `SEARCH_BACKPRESSURE_*` environment variables, then `overrides` (meant
/// for tests and for hosts that already have their own parsed config and
/// just want to punch specific values through without setting env vars).
pub struct ConfigLoader {
    overrides: HashMap<&'static str, String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { overrides: HashMap::new() }
    }

    /// Sets an in-process override, taking precedence over any environment
    /// variable of the same name.
    pub fn with_override(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.overrides.insert(key, value.into());
        self
    }

    fn read(&self, env_key: &'static str) -> Option<String> {
        self.overrides.get(env_key).cloned().or_else(|| std::env::var(env_key).ok())
    }

    fn read_parsed<T: std::str::FromStr>(&self, env_key: &'static str, field: &'static str) -> Option<T> {
        let raw = self.read(env_key)?;
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(field, raw, "ignoring unparseable search-backpressure setting");
                None
            }
        }
    }

    /// Builds a validated [`Settings`], applying env/override layers on
    /// top of the documented defaults. `max_heap_bytes` must come from the
    /// host process (it has no sensible compiled-in default) but can
    /// itself be punched through `SEARCH_BACKPRESSURE_MAX_HEAP_BYTES`.
    pub fn load(&self, max_heap_bytes: i64) -> Result<Arc<Settings>, SettingsError> {
        let max_heap_bytes =
            self.read_parsed("SEARCH_BACKPRESSURE_MAX_HEAP_BYTES", "max_heap_bytes").unwrap_or(max_heap_bytes);

        let mut static_settings = StaticSettings {
            interval: Duration::from_millis(1000),
            cancellation_ratio: 0.1,
            cancellation_rate: 3e-9,
            cancellation_burst: 10.0,
            limit_policy: LimitPolicy::BothExhausted,
            max_heap_bytes,
        };
        if let Some(ms) = self.read_parsed::<u64>("SEARCH_BACKPRESSURE_INTERVAL_MS", "interval") {
            static_settings.interval = Duration::from_millis(ms);
        }
        if let Some(v) = self.read_parsed("SEARCH_BACKPRESSURE_CANCELLATION_RATIO", "cancellation_ratio") {
            static_settings.cancellation_ratio = v;
        }
        if let Some(v) = self.read_parsed("SEARCH_BACKPRESSURE_CANCELLATION_RATE", "cancellation_rate") {
            static_settings.cancellation_rate = v;
        }
        if let Some(v) = self.read_parsed("SEARCH_BACKPRESSURE_CANCELLATION_BURST", "cancellation_burst") {
            static_settings.cancellation_burst = v;
        }
        if let Some(policy) = self.read("SEARCH_BACKPRESSURE_LIMIT_POLICY") {
            static_settings.limit_policy = match policy.as_str() {
                "either_exhausted" => LimitPolicy::EitherExhausted,
                "both_exhausted" => LimitPolicy::BothExhausted,
                other => {
                    tracing::warn!(value = other, "ignoring unrecognized SEARCH_BACKPRESSURE_LIMIT_POLICY");
                    static_settings.limit_policy
                }
            };
        }

        let mut dynamic = DynamicValues::default();
        if let Some(v) = self.read_parsed("SEARCH_BACKPRESSURE_ENABLED", "enabled") {
            dynamic.enabled = v;
        }
        if let Some(v) = self.read_parsed("SEARCH_BACKPRESSURE_ENFORCED", "enforced") {
            dynamic.enforced = v;
        }
        if let Some(v) = self
            .read_parsed("SEARCH_BACKPRESSURE_NUM_CONSECUTIVE_BREACHES", "node_duress.num_consecutive_breaches")
        {
            dynamic.num_consecutive_breaches = v;
        }
        if let Some(v) = self.read_parsed("SEARCH_BACKPRESSURE_CPU_THRESHOLD", "node_duress.cpu_threshold") {
            dynamic.cpu_threshold = v;
        }
        if let Some(v) = self.read_parsed("SEARCH_BACKPRESSURE_HEAP_THRESHOLD", "node_duress.heap_threshold") {
            dynamic.heap_threshold = v;
        }
        if let Some(v) = self
            .read_parsed("SEARCH_BACKPRESSURE_SEARCH_HEAP_USAGE_THRESHOLD", "search_heap_usage_threshold")
        {
            dynamic.search_heap_usage_threshold = v;
        }
        if let Some(v) = self.read_parsed(
            "SEARCH_BACKPRESSURE_TASK_HEAP_USAGE_THRESHOLD",
            "search_task_heap_usage_threshold",
        ) {
            dynamic.search_task_heap_usage_threshold = v;
        }
        if let Some(v) = self
            .read_parsed("SEARCH_BACKPRESSURE_TASK_HEAP_USAGE_VARIANCE", "search_task_heap_usage_variance")
        {
            dynamic.search_task_heap_usage_variance = v;
        }
        if let Some(ms) =
            self.read_parsed::<u64>("SEARCH_BACKPRESSURE_TASK_CPU_TIME_THRESHOLD_MS", "search_task_cpu_time_threshold")
        {
            dynamic.search_task_cpu_time_threshold_ns = Duration::from_millis(ms).as_nanos() as i64;
        }
        if let Some(ms) = self.read_parsed::<u64>(
            "SEARCH_BACKPRESSURE_TASK_ELAPSED_TIME_THRESHOLD_MS",
            "search_task_elapsed_time_threshold",
        ) {
            dynamic.search_task_elapsed_time_threshold_ns = Duration::from_millis(ms).as_nanos() as i64;
        }

        Settings::build(static_settings, dynamic)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_with_no_overrides_match_settings_defaults() {
        let settings = ConfigLoader::new().load(1_000_000_000).unwrap();
        assert_eq!(settings.static_settings.cancellation_ratio, 0.1);
        assert!(settings.enabled());
        assert_eq!(settings.num_consecutive_breaches(), 3);
    }

    #[test]
    fn overrides_take_precedence_over_defaults() {
        let settings = ConfigLoader::new()
            .with_override("SEARCH_BACKPRESSURE_ENABLED", "false")
            .with_override("SEARCH_BACKPRESSURE_CPU_THRESHOLD", "0.5")
            .with_override("SEARCH_BACKPRESSURE_NUM_CONSECUTIVE_BREACHES", "5")
            .load(1_000_000_000)
            .unwrap();

        assert!(!settings.enabled());
        assert_eq!(settings.cpu_threshold(), 0.5);
        assert_eq!(settings.num_consecutive_breaches(), 5);
    }

    #[test]
    fn unparseable_override_is_ignored_and_default_is_kept() {
        let settings =
            ConfigLoader::new().with_override("SEARCH_BACKPRESSURE_CPU_THRESHOLD", "not-a-number").load(1).unwrap();
        assert_eq!(settings.cpu_threshold(), 0.9);
    }

    #[test]
    fn invalid_layered_value_still_fails_settings_validation() {
        let result = ConfigLoader::new()
            .with_override("SEARCH_BACKPRESSURE_CPU_THRESHOLD", "1.5")
            .load(1_000_000_000);
        assert!(result.is_err());
    }
}
