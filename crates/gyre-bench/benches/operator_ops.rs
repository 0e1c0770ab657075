//! Criterion micro-benchmarks for the differential operators.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gyre_bench::{reference_codec, reference_mesh};
use gyre_core::CellLoc;
use gyre_mesh::DiffMethod;
use gyre_ops::{DerivConfig, Derivs};
use std::sync::Arc;

fn setup() -> (Derivs, gyre_core::Field, gyre_core::Field) {
    let mesh = reference_mesh();
    let (codec, arena) = reference_codec(Arc::clone(&mesh));
    let n = codec.registry().id_of("n").unwrap();
    let p = codec.registry().id_of("p").unwrap();
    let ops = Derivs::new(mesh, &DerivConfig::default()).unwrap();
    let f = arena.var(n).unwrap().clone();
    let g = arena.var(p).unwrap().clone();
    (ops, f, g)
}

/// Benchmark: first derivative in x with the default method.
fn bench_ddx(c: &mut Criterion) {
    let (ops, f, _) = setup();
    c.bench_function("ddx_reference", |b| {
        b.iter(|| black_box(ops.ddx(&f, ()).unwrap()));
    });
}

/// Benchmark: first derivative in x onto the staggered x-low location.
fn bench_ddx_staggered(c: &mut Criterion) {
    let (ops, f, _) = setup();
    c.bench_function("ddx_staggered_c4", |b| {
        b.iter(|| black_box(ops.ddx(&f, (CellLoc::XLow, DiffMethod::C4)).unwrap()));
    });
}

/// Benchmark: second derivatives in x and y.
fn bench_second(c: &mut Criterion) {
    let (ops, f, _) = setup();
    c.bench_function("d2dx2_plus_d2dy2", |b| {
        b.iter(|| {
            let lap = ops.d2dx2(&f, ()).unwrap().add(&ops.d2dy2(&f, ()).unwrap()).unwrap();
            black_box(lap);
        });
    });
}

/// Benchmark: z derivative across all planes.
fn bench_ddz(c: &mut Criterion) {
    let (ops, f, _) = setup();
    c.bench_function("ddz_reference", |b| {
        b.iter(|| black_box(ops.ddz(&f, ()).unwrap()));
    });
}

/// Benchmark: upwind advection `v d/dx f`.
fn bench_vddx(c: &mut Criterion) {
    let (ops, f, v) = setup();
    c.bench_function("vddx_upwind", |b| {
        b.iter(|| black_box(ops.vddx(&v, &f, ()).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_ddx,
    bench_ddx_staggered,
    bench_second,
    bench_ddz,
    bench_vddx
);
criterion_main!(benches);
