//! Criterion micro-benchmarks for the state-vector codec.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gyre_bench::{reference_codec, reference_mesh, stress_mesh};
use gyre_codec::VarStorage;

/// Benchmark: SAVE on the reference mesh.
fn bench_save_reference(c: &mut Criterion) {
    let (codec, mut arena) = reference_codec(reference_mesh());
    let mut out = vec![0.0; codec.local_len()];

    c.bench_function("codec_save_reference", |b| {
        b.iter(|| {
            codec.save(&mut arena, &mut out).unwrap();
            black_box(&out);
        });
    });
}

/// Benchmark: LOAD on the reference mesh.
fn bench_load_reference(c: &mut Criterion) {
    let (codec, mut arena) = reference_codec(reference_mesh());
    let mut u = vec![0.0; codec.local_len()];
    codec.save(&mut arena, &mut u).unwrap();

    c.bench_function("codec_load_reference", |b| {
        b.iter(|| {
            codec.load(&mut arena, &u).unwrap();
            black_box(&arena);
        });
    });
}

/// Benchmark: SAVE_DERIVS with every derivative already at its location.
fn bench_save_derivs_reference(c: &mut Criterion) {
    let (codec, mut arena) = reference_codec(reference_mesh());
    let registry = codec.registry().clone();
    for d in registry.iter() {
        match arena.storage(d.id).unwrap().clone() {
            VarStorage::Scalar(f) => arena.set_ddt(d.id, f).unwrap(),
            VarStorage::Vector(v) => arena.set_ddt_vector(d.id, v).unwrap(),
        }
    }
    let mut out = vec![0.0; codec.local_len()];

    c.bench_function("codec_save_derivs_reference", |b| {
        b.iter(|| {
            codec.save_derivs(&mut arena, &mut out).unwrap();
            black_box(&out);
        });
    });
}

/// Benchmark: LOAD on the stress mesh (~262K points per 3D slot).
fn bench_load_stress(c: &mut Criterion) {
    let (codec, mut arena) = reference_codec(stress_mesh());
    let mut u = vec![0.0; codec.local_len()];
    codec.save(&mut arena, &mut u).unwrap();

    c.bench_function("codec_load_stress", |b| {
        b.iter(|| {
            codec.load(&mut arena, &u).unwrap();
            black_box(&arena);
        });
    });
}

criterion_group!(
    benches,
    bench_save_reference,
    bench_load_reference,
    bench_save_derivs_reference,
    bench_load_stress
);
criterion_main!(benches);
