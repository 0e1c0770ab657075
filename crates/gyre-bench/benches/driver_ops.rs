//! Criterion benchmarks for residual evaluation through the driver.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gyre_bench::{reference_codec, reference_mesh};
use gyre_ops::{DerivConfig, Derivs};
use gyre_solver::{Driver, JacobianSetup, JacobianStrategy, SolverConfig, SparsityPattern, SspRk3};
use gyre_test_utils::DecayModel;
use std::sync::Arc;

fn driver(nout: u64) -> Driver<DecayModel> {
    let mesh = reference_mesh();
    let (codec, arena) = reference_codec(Arc::clone(&mesh));
    let ops = Derivs::new(mesh, &DerivConfig::default()).unwrap();
    let config = SolverConfig {
        nout,
        output_interval: 0.01,
        initial_step: Some(0.01),
        ..SolverConfig::default()
    };
    let mut d = Driver::new(codec, ops, DecayModel::new(1.0), Box::new(SspRk3::new()), config)
        .unwrap();
    *d.arena_mut() = arena;
    d
}

/// Benchmark: ten RK3 steps (30 residual calls) on the reference profile.
fn bench_run_ten_steps(c: &mut Criterion) {
    c.bench_function("driver_run_10_steps", |b| {
        b.iter_batched(
            || {
                let mut d = driver(10);
                d.init().unwrap();
                d
            },
            |mut d| {
                let outcome = d.run().unwrap();
                black_box(outcome);
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

/// Benchmark: greedy distance-2 coloring of the stencil pattern.
fn bench_stencil_coloring(c: &mut Criterion) {
    let mesh = reference_mesh();
    let (codec, _) = reference_codec(mesh);
    c.bench_function("stencil_pattern_coloring", |b| {
        b.iter(|| {
            let pattern = SparsityPattern::stencil(codec.layout(), 2);
            let setup = JacobianSetup::colored(pattern, JacobianStrategy::Stencil);
            black_box(setup.coloring.ncolors());
        });
    });
}

criterion_group!(benches, bench_run_ten_steps, bench_stencil_coloring);
criterion_main!(benches);
