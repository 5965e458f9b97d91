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

//! Benchmarks the two hot paths every tick exercises per cancellation
//! candidate: an uncontended `request()` and a `tokens()` read.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use search_backpressure::token_bucket::TokenBucket;

fn advancing_clock() -> (Arc<dyn Fn() -> i64 + Send + Sync>, Arc<AtomicI64>) {
    let now = Arc::new(AtomicI64::new(0));
    let reader = now.clone();
    (Arc::new(move || reader.load(Ordering::SeqCst)), now)
}

fn bench_request(c: &mut Criterion) {
    let (clock, now) = advancing_clock();
    let bucket = TokenBucket::new(1.0, 1_000.0, clock).unwrap();

    let mut group = c.benchmark_group("token_bucket");
    group.bench_function("request", |b| {
        b.iter(|| {
            now.fetch_add(1, Ordering::SeqCst);
            black_box(bucket.request())
        })
    });
    group.bench_function("tokens", |b| b.iter(|| black_box(bucket.tokens())));
    group.finish();
}

criterion_group!(token_bucket_benches, bench_request);
criterion_main!(token_bucket_benches);
