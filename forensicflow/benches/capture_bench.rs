//! Benchmarks for poll policy arithmetic and idempotency key derivation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use forensicflow::core::CaptureStage;
use forensicflow::pipeline::{idempotency_key, PollPolicy};
use forensicflow::utils::validate_resource_id;

fn policy_benchmark(c: &mut Criterion) {
    let policy = PollPolicy::new();
    c.bench_function("poll_policy_total_budget", |b| {
        b.iter(|| black_box(&policy).total_budget())
    });
    c.bench_function("poll_policy_delay", |b| {
        b.iter(|| black_box(&policy).delay(black_box(12)))
    });
}

fn key_benchmark(c: &mut Criterion) {
    c.bench_function("idempotency_key", |b| {
        b.iter(|| {
            idempotency_key(
                black_box("inc-42"),
                black_box("snap-0123456789abcdef0"),
                CaptureStage::CopySnapshot,
            )
        })
    });
    c.bench_function("validate_resource_id", |b| {
        b.iter(|| validate_resource_id("volume_id", "vol", black_box("vol-0123456789abcdef0")))
    });
}

criterion_group!(benches, policy_benchmark, key_benchmark);
criterion_main!(benches);
