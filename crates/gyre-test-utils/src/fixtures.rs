//! Reusable mesh, field and model fixtures.
//!
//! - [`mesh`] builds a small single-rank mesh with two guard cells.
//! - [`random_field`] fills a field from a seeded ChaCha stream.
//! - [`DecayModel`] sets `d/dt f = -rate * f` for every variable.
//! - [`FailingModel`] fails deterministically after N calls.

use gyre_core::{CellLoc, Dims, Field};
use gyre_mesh::{Mesh, StructuredMesh};
use gyre_solver::{Model, RhsContext, RhsFault};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// A single-rank `nx` by `ny` interior with `nz` planes, two guards each
/// side and open y boundaries.
pub fn mesh(nx: usize, ny: usize, nz: usize) -> Arc<dyn Mesh> {
    Arc::new(
        StructuredMesh::builder()
            .interior(nx, ny)
            .planes(nz)
            .guards(2, 2)
            .build()
            .expect("fixture mesh is valid"),
    )
}

/// A field shaped for `mesh` with values uniform in `[-0.5, 0.5)`.
pub fn random_field(mesh: &dyn Mesh, dims: Dims, loc: CellLoc, seed: u64) -> Field {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let nz = if dims == Dims::Three { mesh.local_nz() } else { 1 };
    Field::from_fn(dims, mesh.local_nx(), mesh.local_ny(), nz, loc, |_, _, _| {
        (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64 - 0.5
    })
}

/// Exponential decay of every registered variable at `rate`.
#[derive(Clone, Debug)]
pub struct DecayModel {
    pub rate: f64,
}

impl DecayModel {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl Model for DecayModel {
    fn rhs(&mut self, _t: f64, ctx: &mut RhsContext<'_>) -> Result<(), RhsFault> {
        let ids: Vec<_> = ctx.registry().iter().map(|d| (d.id, d.kind)).collect();
        for (id, kind) in ids {
            if kind.is_vector() {
                let mut v = ctx.vector(id)?.clone();
                for c in v.components_mut() {
                    *c = c.scale(-self.rate)?;
                }
                ctx.set_ddt_vector(id, v)?;
            } else {
                let ddt = ctx.var(id)?.scale(-self.rate)?;
                ctx.set_ddt(id, ddt)?;
            }
        }
        Ok(())
    }
}

/// Delegates to [`DecayModel`] for `ok_calls` calls, then fails every
/// call with `code`.
#[derive(Clone, Debug)]
pub struct FailingModel {
    pub ok_calls: usize,
    pub code: i32,
    calls: usize,
    inner: DecayModel,
}

impl FailingModel {
    pub fn new(ok_calls: usize, code: i32) -> Self {
        Self {
            ok_calls,
            code,
            calls: 0,
            inner: DecayModel::new(1.0),
        }
    }

    /// Number of times `rhs` has been invoked.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Model for FailingModel {
    fn rhs(&mut self, t: f64, ctx: &mut RhsContext<'_>) -> Result<(), RhsFault> {
        self.calls += 1;
        if self.calls > self.ok_calls {
            return Err(RhsFault::failed(
                self.code,
                format!("failing after {} calls", self.ok_calls),
            ));
        }
        self.inner.rhs(t, ctx)
    }
}
