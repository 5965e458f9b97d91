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

//! Error taxonomy for the search backpressure controller.
//!
//! Every error type here corresponds to one of the failure classes in the
//! controller's error handling design: sensor unavailability, stats refresh
//! failure, a tracker raising during verdict computation, a failed task
//! cancellation, and invalid settings. None of these abort the control
//! loop; each is contained at its call site and logged.

use thiserror::Error;

/// A CPU or heap sensor could not produce a reading for this tick.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("resource sensor unavailable: {0}")]
    Unavailable(String),
}

/// The task registry failed to refresh resource stats for the live task set.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("task stats refresh failed: {0}")]
    Failed(String),
}

/// A tracker raised while computing a verdict or applying a completion update.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker '{tracker}' failed: {reason}")]
    Failed { tracker: &'static str, reason: String },
}

/// `TaskHandle::cancel` failed to signal the underlying task.
#[derive(Debug, Error)]
pub enum CancelError {
    #[error("failed to cancel task {task_id}: {reason}")]
    Failed { task_id: u64, reason: String },
}

/// A `Settings` value was rejected during construction (range checks).
///
/// Configuration-invalid settings are rejected here, before the controller
/// ever sees them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{field} must be >= 1, got {value}")]
    MustBeAtLeastOne { field: &'static str, value: i64 },

    #[error("{field} must be in 0..=1, got {value}")]
    NotAUnitFraction { field: &'static str, value: String },

    #[error("{field} must be >= 0, got {value}")]
    MustBeNonNegative { field: &'static str, value: String },

    #[error("{field} must be > 0, got {value}")]
    MustBePositive { field: &'static str, value: String },
}
