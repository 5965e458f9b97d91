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

//! Fixed-window rolling average over `i64` observations.

use parking_lot::Mutex;

struct RingState {
    slots: Vec<i64>,
    count: u64,
    sum: i64,
}

/// A fixed-window moving average. Panics are never used for bad input at
/// call sites; construction is the only place that can fail (window size).
pub struct MovingAverage {
    window: usize,
    state: Mutex<RingState>,
}

impl MovingAverage {
    /// Builds a moving average over the last `window` observations.
    ///
    /// Returns `None` if `window == 0`, matching the invariant that window
    /// size must be positive.
    pub fn new(window: usize) -> Option<Self> {
        if window == 0 {
            return None;
        }
        Some(Self {
            window,
            state: Mutex::new(RingState { slots: vec![0; window], count: 0, sum: 0 }),
        })
    }

    /// Records a new observation, overwriting the oldest slot in the window,
    /// and returns the resulting average.
    pub fn record(&self, value: i64) -> f64 {
        let mut state = self.state.lock();
        let slot = (state.count % self.window as u64) as usize;
        let old = state.slots[slot];
        state.slots[slot] = value;
        state.sum += value - old;
        state.count += 1;
        let divisor = state.count.min(self.window as u64);
        state.sum as f64 / divisor as f64
    }

    /// Current average without recording a new observation.
    pub fn average(&self) -> f64 {
        let state = self.state.lock();
        if state.count == 0 {
            return 0.0;
        }
        let divisor = state.count.min(self.window as u64);
        state.sum as f64 / divisor as f64
    }

    /// True once at least `window` observations have been recorded.
    pub fn ready(&self) -> bool {
        self.state.lock().count >= self.window as u64
    }
}
