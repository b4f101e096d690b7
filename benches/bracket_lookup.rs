// SPDX-License-Identifier: MPL-2.0
//! Benchmarks for frame buffer insertion and bracket lookup.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use framewell::{DecodedFrame, FrameCache};

const FPS: f64 = 30.0;

fn filled_cache(frames: i64) -> FrameCache {
    let mut cache = FrameCache::new();
    for n in 0..frames {
        #[allow(clippy::cast_precision_loss)]
        cache.insert(DecodedFrame::new(16, 16, n, n as f64 / FPS, true));
    }
    cache
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert_1000_frames", |b| {
        b.iter(|| black_box(filled_cache(1000)));
    });
}

fn bench_bracket(c: &mut Criterion) {
    let mut cache = filled_cache(1000);

    c.bench_function("bracket_hit", |b| {
        let mut n = 0u64;
        b.iter(|| {
            #[allow(clippy::cast_precision_loss)]
            let pts = (n % 999) as f64 / FPS + 0.4 / FPS;
            n += 1;
            black_box(cache.bracket(black_box(pts), FPS))
        });
    });

    c.bench_function("bracket_miss", |b| {
        b.iter(|| black_box(cache.bracket(black_box(500.0), FPS)));
    });
}

fn bench_expand(c: &mut Criterion) {
    c.bench_function("expand_320x240", |b| {
        b.iter_batched(
            || DecodedFrame::new(320, 240, 0, 0.0, true),
            |frame| {
                frame.expand();
                black_box(frame)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_insert, bench_bracket, bench_expand);
criterion_main!(benches);
