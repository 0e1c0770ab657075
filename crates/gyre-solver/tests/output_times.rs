//! Integration test: output times are hit exactly under irregular steps.
//!
//! A synthetic integrator proposes uneven step sizes; the driver's
//! pre-step hook must clamp them so that every output time `kT` is
//! reached exactly (the same floating-point value the clock computes),
//! the iteration count advances once per output, and the monitor sees
//! `(kT, k, N)`.

use std::sync::{Arc, Mutex};

use gyre_codec::{RegistryBuilder, StateCodec};
use gyre_core::CellLoc;
use gyre_ops::{DerivConfig, Derivs};
use gyre_solver::{Driver, MonitorAction, OutputClock, SolverConfig};
use gyre_test_utils::{mesh, DecayModel, IrregularStepper};
use proptest::prelude::*;

type Seen = Arc<Mutex<Vec<(f64, u64, u64)>>>;

fn driver(steps: Vec<f64>, nout: u64, interval: f64) -> (Driver<DecayModel>, Seen) {
    let mesh = mesh(2, 2, 1);
    let registry = RegistryBuilder::new()
        .scalar_3d("n", CellLoc::Centre)
        .build()
        .unwrap();
    let codec = StateCodec::new(registry, Arc::clone(&mesh));
    let ops = Derivs::new(mesh, &DerivConfig::default()).unwrap();
    let config = SolverConfig {
        nout,
        output_interval: interval,
        ..SolverConfig::default()
    };
    let stepper = Box::new(IrregularStepper::new(steps));
    let mut d = Driver::new(codec, ops, DecayModel::new(0.5), stepper, config).unwrap();
    let n = d.codec().registry().id_of("n").unwrap();
    d.arena_mut().var_mut(n).unwrap().fill(1.0);
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    d.set_monitor(move |t, it, nout| {
        sink.lock().unwrap().push((t, it, nout));
        MonitorAction::Continue
    });
    (d, seen)
}

proptest! {
    #[test]
    fn every_output_time_is_hit_exactly(
        steps in prop::collection::vec(0.01f64..0.5, 1..6),
        nout in 1u64..6,
        interval in 0.05f64..0.5,
    ) {
        let (mut d, seen) = driver(steps, nout, interval);
        d.init().unwrap();
        let outcome = d.run().unwrap();

        prop_assert!(!outcome.stopped);
        prop_assert_eq!(outcome.iteration, nout);
        prop_assert_eq!(outcome.time, OutputClock::nth_output(0.0, interval, nout));

        let seen = seen.lock().unwrap().clone();
        prop_assert_eq!(seen.len() as u64, nout);
        for (k, &(t, it, n)) in seen.iter().enumerate() {
            let k = k as u64 + 1;
            prop_assert_eq!(t, OutputClock::nth_output(0.0, interval, k));
            prop_assert_eq!(it, k);
            prop_assert_eq!(n, nout);
        }
    }
}

#[test]
fn flagged_steps_end_on_output_times() {
    let mesh = mesh(2, 2, 1);
    let registry = RegistryBuilder::new()
        .scalar_2d("p")
        .build()
        .unwrap();
    let codec = StateCodec::new(registry, Arc::clone(&mesh));
    let ops = Derivs::new(mesh, &DerivConfig::default()).unwrap();
    let stepper = IrregularStepper::new(vec![0.07, 0.013, 0.21]);
    let log = stepper.log();
    let config = SolverConfig {
        nout: 3,
        output_interval: 0.1,
        ..SolverConfig::default()
    };
    let mut d = Driver::new(codec, ops, DecayModel::new(1.0), Box::new(stepper), config).unwrap();
    let p = d.codec().registry().id_of("p").unwrap();
    d.arena_mut().var_mut(p).unwrap().fill(2.0);
    d.init().unwrap();
    d.run().unwrap();

    let log = log.lock().unwrap();
    let outputs: Vec<f64> = log.iter().filter(|r| r.output).map(|r| r.end).collect();
    assert_eq!(
        outputs,
        [0.1, 0.1 + 0.1, 0.1 + 0.1 + 0.1],
        "clamped steps must end on the accumulated output times"
    );
    // Steps chain without gaps.
    for w in log.windows(2) {
        assert_eq!(w[0].end, w[1].start);
    }
    // Unclamped steps keep their proposed size.
    assert!((log[0].end - 0.07).abs() < 1e-15);
}

#[test]
fn monitor_can_stop_the_run() {
    let (mut d, seen) = driver(vec![0.03], 5, 0.1);
    let stop_at = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stop_at);
    d.set_monitor(move |t, it, _| {
        sink.lock().unwrap().push(t);
        if it == 2 {
            MonitorAction::Stop
        } else {
            MonitorAction::Continue
        }
    });
    d.init().unwrap();
    let outcome = d.run().unwrap();
    assert!(outcome.stopped);
    assert_eq!(outcome.iteration, 2);
    assert_eq!(outcome.time, 0.1 + 0.1);
    assert_eq!(stop_at.lock().unwrap().len(), 2);
    // The replaced monitor never ran.
    assert!(seen.lock().unwrap().is_empty());
}
