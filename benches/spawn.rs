#![allow(unused)]
extern crate vmspawn;

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use vmspawn::prelude::*;

/// Benchmark the full spawn-to-finished cycle of a no-op thread.
///
/// Measures validation, allocation, context construction, OS thread
/// creation, the interpreter loop around a trivial entry frame, and join.
fn bench_spawn_noop(c: &mut Criterion) {
    let instance = Instance::new();
    let mut ctx = ThreadContext::new(instance).expect("pool reservation");
    ctx.set_cur_frame(Some(FrameHandle::root("bench-main")));

    let thread_ty = thread_type("Thread");
    let noop = native_code("noop", |_ctx| Ok(Value::Unit));

    let mut group = c.benchmark_group("spawn");
    group.bench_function("spawn_join_noop", |b| {
        b.iter(|| {
            let thread = spawn(black_box(&ctx), &noop, &thread_ty).unwrap();
            let handle = thread.as_thread().unwrap().take_os_handle().unwrap();
            handle.join().unwrap();
            black_box(thread)
        });
    });
    group.finish();
}

/// Benchmark the spawner-side cost alone: validation through thread
/// creation. The spawned no-op threads are never joined; they detach and
/// finish on their own while only the spawning path is timed.
fn bench_spawn_only(c: &mut Criterion) {
    let instance = Instance::new();
    let mut ctx = ThreadContext::new(instance).expect("pool reservation");
    ctx.set_cur_frame(Some(FrameHandle::root("bench-main")));

    let thread_ty = thread_type("Thread");
    let noop = native_code("noop", |_ctx| Ok(Value::Unit));

    let mut group = c.benchmark_group("spawn");
    group.bench_function("spawn_only_noop", |b| {
        b.iter_batched(
            || (),
            |()| black_box(spawn(&ctx, &noop, &thread_ty).unwrap()),
            criterion::BatchSize::PerIteration,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_spawn_noop, bench_spawn_only);
criterion_main!(benches);
