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

//! Node-wide resource sensors the duress detector reads every tick.
//!
//! Injected rather than read from process-wide statics, so tests can
//! supply deterministic values.

use crate::error::SensorError;

/// Reads node-level CPU load and heap usage fractions.
pub trait ResourceSensors: Send + Sync {
    /// Fraction of CPU capacity currently in use, in `0.0..=1.0`.
    fn cpu_load(&self) -> Result<f64, SensorError>;

    /// Fraction of the process's maximum heap currently used, in `0.0..=1.0`.
    fn heap_used_fraction(&self) -> Result<f64, SensorError>;
}
