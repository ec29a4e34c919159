//! Benchmarks for marshalling native values in and out of the runtime.
//!
//! - Allocation: native containers copied into the runtime
//! - Conversion: runtime containers read back into native ones
//! - Calls: argument tuple construction plus native function dispatch
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

use std::collections::HashMap;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use dynwrap::prelude::*;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

/// Initialize puffin profiler.
#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

/// Call at the end of each benchmark iteration to flush profiling data.
#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

fn sample_map(len: usize) -> HashMap<String, Vec<(i64, f64)>> {
    (0..len)
        .map(|i| {
            let row = (0..8).map(|j| (j as i64, j as f64 * 0.5)).collect();
            (format!("key{i}"), row)
        })
        .collect()
}

fn allocation_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let rt = Runtime::new();
    let mut group = c.benchmark_group("allocate");

    for len in [16usize, 256, 4096] {
        let ints: Vec<i64> = (0..len as i64).collect();
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("vec_i64", len), &ints, |b, ints| {
            b.iter(|| black_box(allocate(&rt, ints)));
        });
    }

    let map = sample_map(64);
    group.bench_function("nested_map_64", |b| {
        b.iter(|| {
            let handle = allocate(&rt, black_box(&map));
            end_profiling_frame();
            handle
        });
    });

    let bytes = ByteBuf::from(vec![0u8; 64 * 1024]);
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("bytes_64k", |b| {
        b.iter(|| black_box(allocate(&rt, &bytes)));
    });

    group.finish();
}

fn conversion_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new();
    let mut group = c.benchmark_group("convert");

    for len in [16usize, 256, 4096] {
        let list = Object::from_value(&rt, &(0..len as i64).collect::<Vec<_>>());
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("vec_i64", len), &list, |b, list| {
            b.iter(|| black_box(list.extract::<Vec<i64>>()));
        });
    }

    let map = Object::from_value(&rt, &sample_map(64));
    group.bench_function("nested_map_64", |b| {
        b.iter(|| black_box(map.extract::<HashMap<String, Vec<(i64, f64)>>>()));
    });

    group.finish();
}

fn call_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new();
    rt.install_module(Module::new("bench").function("add", |ctx| {
        let a: i64 = ctx.arg_as(0)?;
        let b: i64 = ctx.arg_as(1)?;
        ctx.ret(&(a + b))
    }));
    let module = Object::from_script(&rt, "bench").unwrap();
    let add = module.get_attr("add").unwrap();

    let mut group = c.benchmark_group("call");

    group.bench_function("call_function_by_name", |b| {
        b.iter(|| black_box(module.call_function("add", (1i64, 2i64)).unwrap()));
    });

    group.bench_function("call_bound", |b| {
        b.iter(|| black_box(add.call((1i64, 2i64)).unwrap()));
    });

    let shared = Object::from_value(&rt, &5i64);
    group.bench_function("call_with_shared_arg", |b| {
        b.iter(|| {
            let args = Args::new()
                .with(Arg::shared(&shared))
                .with(Arg::value(7i64));
            black_box(add.call(args).unwrap())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    allocation_benchmarks,
    conversion_benchmarks,
    call_benchmarks
);
criterion_main!(benches);
