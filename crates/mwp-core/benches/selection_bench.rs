//! Criterion benchmarks for the per-tick decision helpers.
//!
//! Every control loop runs `nearest_detection` on each positive frame and
//! expands every intent it issues, so both sit on the hot path of every
//! window.
//!
//! Run with:
//! ```bash
//! cargo bench --package mwp-core --bench selection_bench
//! ```

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mwp_core::{
    nearest_detection, Detection, HidKeyCode, InjectionIntent, IntentAction, MouseButton, Point,
    Rect, WindowId,
};

// ── Fixture builders ──────────────────────────────────────────────────────────

/// Spreads `n` detections on a grid across a 1920×1080 client area.
fn build_detections(n: usize) -> Vec<Detection> {
    (0..n)
        .map(|i| {
            let x = ((i * 97) % 1900) as i32;
            let y = ((i * 53) % 1060) as i32;
            Detection::new(format!("item-{i}"), 0.9, Rect::new(x, y, 20, 20))
        })
        .collect()
}

fn bench_nearest_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest_detection");
    for n in [1usize, 8, 64, 512] {
        let detections = build_detections(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &detections, |b, ds| {
            b.iter(|| nearest_detection(black_box(ds), black_box(Point::new(960, 540))))
        });
    }
    group.finish();
}

fn bench_intent_expansion(c: &mut Criterion) {
    c.bench_function("intent_steps_modified_hold_click", |b| {
        b.iter(|| {
            let intent = InjectionIntent::new(
                WindowId(0x1234),
                IntentAction::Click { button: MouseButton::Left, at: Point::new(400, 300) },
            )
            .with_modifier(HidKeyCode::ControlLeft)
            .with_hold(Duration::from_millis(500));
            black_box(intent.steps())
        })
    });
}

criterion_group!(benches, bench_nearest_detection, bench_intent_expansion);
criterion_main!(benches);
