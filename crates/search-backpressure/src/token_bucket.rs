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

//! A token bucket rate limiter parameterized by an arbitrary monotonic clock.
//!
//! Two instances of this type are used by the controller: one clocked by
//! wall-time nanoseconds, the other by a completion counter. The clock is a
//! constructor argument rather than `Instant::now()` so both can share the
//! same implementation.

use std::sync::Arc;

use parking_lot::Mutex;

struct BucketState {
    tokens: f64,
    last_refill: i64,
}

/// Rate limiter over an injected clock. `rate` is tokens per clock unit,
/// `burst` is the maximum number of tokens the bucket can hold.
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    clock: Arc<dyn Fn() -> i64 + Send + Sync>,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Builds a bucket starting full (`tokens == burst`).
    ///
    /// Returns `None` if `rate <= 0.0` or `burst <= 0.0`.
    pub fn new(rate: f64, burst: f64, clock: Arc<dyn Fn() -> i64 + Send + Sync>) -> Option<Self> {
        if rate <= 0.0 || burst <= 0.0 {
            return None;
        }
        let last_refill = clock();
        Some(Self { rate, burst, clock, state: Mutex::new(BucketState { tokens: burst, last_refill }) })
    }

    /// Refills based on elapsed clock units since the last refill, then
    /// attempts to deduct one token. Returns `false` without mutating
    /// `tokens` if fewer than one token is available.
    pub fn request(&self) -> bool {
        let now = (self.clock)();
        let mut state = self.state.lock();
        self.refill_locked(&mut state, now);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Current token count after a refill, without consuming a token.
    pub fn tokens(&self) -> f64 {
        let now = (self.clock)();
        let mut state = self.state.lock();
        self.refill_locked(&mut state, now);
        state.tokens
    }

    fn refill_locked(&self, state: &mut BucketState, now: i64) {
        let elapsed = (now - state.last_refill) as f64;
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
            state.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn manual_clock() -> (Arc<dyn Fn() -> i64 + Send + Sync>, Arc<AtomicI64>) {
        let now = Arc::new(AtomicI64::new(0));
        let read = now.clone();
        (Arc::new(move || read.load(Ordering::SeqCst)), now)
    }

    #[test]
    fn rejects_nonpositive_rate_or_burst() {
        let (clock, _) = manual_clock();
        assert!(TokenBucket::new(0.0, 10.0, clock.clone()).is_none());
        assert!(TokenBucket::new(1.0, 0.0, clock).is_none());
    }

    #[test]
    fn starts_full_and_drains() {
        let (clock, _) = manual_clock();
        let bucket = TokenBucket::new(1.0, 3.0, clock).unwrap();
        assert!(bucket.request());
        assert!(bucket.request());
        assert!(bucket.request());
        assert!(!bucket.request());
    }

    #[test]
    fn refill_clamped_at_burst() {
        let (clock, now) = manual_clock();
        let bucket = TokenBucket::new(1.0, 5.0, clock).unwrap();
        for _ in 0..5 {
            bucket.request();
        }
        now.store(1_000_000, Ordering::SeqCst);
        assert_eq!(bucket.tokens(), 5.0);
    }

    #[test]
    fn failed_request_does_not_mutate_tokens() {
        let (clock, _) = manual_clock();
        let bucket = TokenBucket::new(0.001, 1.0, clock).unwrap();
        assert!(bucket.request());
        let before = bucket.tokens();
        assert!(!bucket.request());
        assert_eq!(bucket.tokens(), before);
    }
}
