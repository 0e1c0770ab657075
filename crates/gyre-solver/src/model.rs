//! The physics-model callback and the view it receives.
//!
//! A [`Model`] is called once per residual evaluation with the current
//! time and an [`RhsContext`]. The context exposes the unpacked state,
//! the operator library and the mesh; the model must store a time
//! derivative for every registered variable through
//! [`RhsContext::set_ddt`] / [`RhsContext::set_ddt_vector`].

use gyre_codec::{CodecError, StateArena, VariableRegistry};
use gyre_core::{Field, FieldError, VarId, VectorField};
use gyre_mesh::Mesh;
use gyre_ops::{Derivs, OperatorError};
use std::error::Error;
use std::fmt;

// ── RhsFault ───────────────────────────────────────────────────────

/// Why a residual evaluation could not produce derivatives.
///
/// Any fault aborts the integrator's in-progress step; the state vector
/// keeps its last committed value.
#[derive(Clone, Debug, PartialEq)]
pub enum RhsFault {
    /// The model reported a failure.
    Failed {
        /// Nonzero model-specific code.
        code: i32,
        /// Human-readable reason.
        reason: String,
    },
    /// Unpacking the state or packing derivatives failed.
    Codec(CodecError),
    /// A differential operator failed.
    Operator(OperatorError),
}

impl RhsFault {
    /// A model failure with `code` and `reason`.
    pub fn failed(code: i32, reason: impl Into<String>) -> Self {
        Self::Failed {
            code,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RhsFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { code, reason } => write!(f, "model failed (code {code}): {reason}"),
            Self::Codec(e) => write!(f, "state codec: {e}"),
            Self::Operator(e) => write!(f, "operator: {e}"),
        }
    }
}

impl Error for RhsFault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Codec(e) => Some(e),
            Self::Operator(e) => Some(e),
            Self::Failed { .. } => None,
        }
    }
}

impl From<CodecError> for RhsFault {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

impl From<OperatorError> for RhsFault {
    fn from(e: OperatorError) -> Self {
        Self::Operator(e)
    }
}

impl From<FieldError> for RhsFault {
    fn from(e: FieldError) -> Self {
        Self::Codec(CodecError::Field(e))
    }
}

// ── RhsContext ─────────────────────────────────────────────────────

/// What a model sees during one residual evaluation.
pub struct RhsContext<'a> {
    arena: &'a mut StateArena,
    registry: &'a VariableRegistry,
    ops: &'a Derivs,
}

impl<'a> RhsContext<'a> {
    pub(crate) fn new(
        arena: &'a mut StateArena,
        registry: &'a VariableRegistry,
        ops: &'a Derivs,
    ) -> Self {
        Self {
            arena,
            registry,
            ops,
        }
    }

    /// Identifier of the variable called `name`.
    pub fn id(&self, name: &str) -> Result<VarId, RhsFault> {
        Ok(self.registry.id_of(name)?)
    }

    /// Current value of a scalar variable.
    pub fn var(&self, id: VarId) -> Result<&Field, RhsFault> {
        Ok(self.arena.var(id)?)
    }

    /// Current value of a vector variable.
    pub fn vector(&self, id: VarId) -> Result<&VectorField, RhsFault> {
        Ok(self.arena.vector(id)?)
    }

    /// Store the time derivative of a scalar variable.
    pub fn set_ddt(&mut self, id: VarId, ddt: Field) -> Result<(), RhsFault> {
        Ok(self.arena.set_ddt(id, ddt)?)
    }

    /// Store the time derivative of a vector variable.
    pub fn set_ddt_vector(&mut self, id: VarId, ddt: VectorField) -> Result<(), RhsFault> {
        Ok(self.arena.set_ddt_vector(id, ddt)?)
    }

    /// The operator library.
    pub fn ops(&self) -> &Derivs {
        self.ops
    }

    /// The local mesh block.
    pub fn mesh(&self) -> &dyn Mesh {
        self.ops.mesh()
    }

    /// The registered variables.
    pub fn registry(&self) -> &VariableRegistry {
        self.registry
    }
}

// ── Model ──────────────────────────────────────────────────────────

/// A physics model: computes every variable's time derivative at `t`.
///
/// Implemented for any `FnMut(f64, &mut RhsContext) -> Result<(), RhsFault>`.
pub trait Model: Send {
    /// Evaluate the right-hand side at time `t`.
    fn rhs(&mut self, t: f64, ctx: &mut RhsContext<'_>) -> Result<(), RhsFault>;
}

impl<F> Model for F
where
    F: FnMut(f64, &mut RhsContext<'_>) -> Result<(), RhsFault> + Send,
{
    fn rhs(&mut self, t: f64, ctx: &mut RhsContext<'_>) -> Result<(), RhsFault> {
        self(t, ctx)
    }
}

// ── Monitor ────────────────────────────────────────────────────────

/// What the driver should do after an output time is reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MonitorAction {
    /// Keep integrating.
    #[default]
    Continue,
    /// Return from `run` after the current step.
    Stop,
}

/// Output callback, invoked as `(simtime, iteration, nout)` each time an
/// output time is crossed.
pub type Monitor = Box<dyn FnMut(f64, u64, u64) -> MonitorAction + Send>;

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_codec::{RegistryBuilder, StateCodec};
    use gyre_core::{CellLoc, Dims};
    use gyre_mesh::StructuredMesh;
    use gyre_ops::DerivConfig;
    use std::sync::Arc;

    fn setup() -> (StateCodec, Derivs) {
        let mesh: Arc<dyn Mesh> = Arc::new(
            StructuredMesh::builder()
                .interior(3, 3)
                .planes(2)
                .guards(2, 2)
                .build()
                .unwrap(),
        );
        let reg = RegistryBuilder::new()
            .scalar_3d("n", CellLoc::Centre)
            .build()
            .unwrap();
        let ops = Derivs::new(Arc::clone(&mesh), &DerivConfig::default()).unwrap();
        (StateCodec::new(reg, mesh), ops)
    }

    #[test]
    fn closure_models_store_derivatives() {
        let (codec, ops) = setup();
        let mut arena = codec.arena();
        let u = vec![1.0; codec.local_len()];
        codec.load(&mut arena, &u).unwrap();
        let mut model = |_t: f64, ctx: &mut RhsContext<'_>| -> Result<(), RhsFault> {
            let n = ctx.id("n")?;
            let ddt = ctx.var(n)?.scale(-2.0)?;
            ctx.set_ddt(n, ddt)
        };
        let mut ctx = RhsContext::new(&mut arena, codec.registry(), &ops);
        model.rhs(0.0, &mut ctx).unwrap();
        let n = codec.registry().id_of("n").unwrap();
        assert_eq!(arena.ddt(n).unwrap().get(2, 2, 0).unwrap(), -2.0);
    }

    #[test]
    fn wrong_shape_is_a_codec_fault() {
        let (codec, ops) = setup();
        let mut arena = codec.arena();
        let mut ctx = RhsContext::new(&mut arena, codec.registry(), &ops);
        let n = ctx.id("n").unwrap();
        let bad = Field::zeros(Dims::Two, 5, 5, 1, CellLoc::Centre);
        assert!(matches!(ctx.set_ddt(n, bad), Err(RhsFault::Codec(_))));
        assert!(matches!(ctx.id("T"), Err(RhsFault::Codec(_))));
    }

    #[test]
    fn fault_display_carries_code() {
        let f = RhsFault::failed(3, "negative density");
        assert_eq!(f.to_string(), "model failed (code 3): negative density");
    }
}
