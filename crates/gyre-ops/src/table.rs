//! Strategy table: per-family methods and location rules, resolved once.
//!
//! [`DerivTable::build`] turns a [`DerivConfig`] into a lookup keyed by
//! operator family and axis. For every supported method it records how
//! each (input location, output location) pair is handled, so operator
//! calls never branch on configuration.

use crate::error::OperatorError;
use gyre_core::{Axis, CellLoc};
use gyre_mesh::{DiffMethod, Mesh, MeshError};
use indexmap::IndexMap;
use std::fmt;

/// A family of derivative operators sharing stencils and defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpFamily {
    /// First derivatives (`DDX`, `DDY`, `DDZ`).
    First,
    /// Second derivatives (`D2DX2`, ...).
    Second,
    /// Fourth derivatives (`D4DX4`, ...).
    Fourth,
    /// Advective `v * df/dx` (`VDDX`, ...).
    Upwind,
    /// Flux-conserving `d(v f)/dx` (`FDDX`, ...).
    Flux,
}

impl OpFamily {
    /// All families in table order.
    pub const ALL: [OpFamily; 5] = [
        OpFamily::First,
        OpFamily::Second,
        OpFamily::Fourth,
        OpFamily::Upwind,
        OpFamily::Flux,
    ];

    /// Whether the family has a stencil for `method`.
    pub fn supports(self, method: DiffMethod) -> bool {
        use DiffMethod::*;
        match self {
            Self::First | Self::Second => matches!(method, C2 | C4),
            Self::Fourth => method == C2,
            Self::Upwind => true,
            Self::Flux => matches!(method, C2 | U1),
        }
    }

    /// Guard cells the family's `method` stencil reaches.
    pub fn width(self, method: DiffMethod) -> usize {
        match self {
            Self::Fourth => 2,
            _ => method.width(),
        }
    }
}

impl fmt::Display for OpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Fourth => "fourth",
            Self::Upwind => "upwind",
            Self::Flux => "flux",
        };
        f.write_str(s)
    }
}

/// Operator family plus axis: the unit the table is keyed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpKey {
    /// Operator family.
    pub family: OpFamily,
    /// Axis of differentiation.
    pub axis: Axis,
}

impl OpKey {
    /// Construct a key.
    pub fn new(family: OpFamily, axis: Axis) -> Self {
        Self { family, axis }
    }
}

impl fmt::Display for OpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.family, self.axis)
    }
}

/// How an operator maps its input location to a requested output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocRule {
    /// Output at the input location.
    Same,
    /// A staggered stencil produces the output location directly.
    Staggered,
    /// Compute at the input location, then interpolate.
    Interpolate,
    /// Not allowed under the configured policy.
    Reject,
}

/// What an operator call should do, after table lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Call the mesh stencil with the requested output location.
    Direct,
    /// Call the stencil at the input location, then interpolate.
    Interpolate,
}

/// Differencing configuration for every operator family.
///
/// Family defaults apply to all three axes; `overrides` replaces the
/// method for a single family and axis.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivConfig {
    /// First derivative method. Default C2.
    pub first: DiffMethod,
    /// Second derivative method. Default C2.
    pub second: DiffMethod,
    /// Fourth derivative method. Default C2.
    pub fourth: DiffMethod,
    /// Advection method. Default U1.
    pub upwind: DiffMethod,
    /// Flux method. Default C2.
    pub flux: DiffMethod,
    /// Per-axis replacements.
    pub overrides: IndexMap<OpKey, DiffMethod>,
    /// Reject location changes that would need interpolation.
    pub strict_locations: bool,
}

impl Default for DerivConfig {
    fn default() -> Self {
        Self {
            first: DiffMethod::C2,
            second: DiffMethod::C2,
            fourth: DiffMethod::C2,
            upwind: DiffMethod::U1,
            flux: DiffMethod::C2,
            overrides: IndexMap::new(),
            strict_locations: false,
        }
    }
}

impl DerivConfig {
    /// Use `method` for one family along one axis.
    pub fn with_method(mut self, family: OpFamily, axis: Axis, method: DiffMethod) -> Self {
        self.overrides.insert(OpKey::new(family, axis), method);
        self
    }

    /// Require exact or staggered location matches.
    pub fn strict(mut self) -> Self {
        self.strict_locations = true;
        self
    }

    /// The configured method for `key`.
    pub fn method_for(&self, key: OpKey) -> DiffMethod {
        if let Some(&m) = self.overrides.get(&key) {
            return m;
        }
        match key.family {
            OpFamily::First => self.first,
            OpFamily::Second => self.second,
            OpFamily::Fourth => self.fourth,
            OpFamily::Upwind => self.upwind,
            OpFamily::Flux => self.flux,
        }
    }
}

type RuleGrid = [[LocRule; 4]; 4];

#[derive(Clone, Debug)]
struct Entry {
    default: DiffMethod,
    rules: IndexMap<DiffMethod, RuleGrid>,
}

/// Resolved operator strategies.
#[derive(Clone, Debug)]
pub struct DerivTable {
    entries: IndexMap<OpKey, Entry>,
}

impl DerivTable {
    /// Validate `config` against `mesh` and precompute every rule.
    ///
    /// Fails if a configured default is not a stencil the family has, or
    /// if its stencil is wider than the mesh guard cells along x or y.
    pub fn build(config: &DerivConfig, mesh: &dyn Mesh) -> Result<Self, OperatorError> {
        let (mxg, myg) = mesh.guards();
        let mut entries = IndexMap::new();
        for family in OpFamily::ALL {
            for axis in Axis::ALL {
                let key = OpKey::new(family, axis);
                let default = config.method_for(key);
                if !family.supports(default) {
                    return Err(OperatorError::UnsupportedMethod {
                        key,
                        method: default,
                    });
                }
                let available = match axis {
                    Axis::X => mxg,
                    Axis::Y => myg,
                    Axis::Z => usize::MAX,
                };
                let needed = family.width(default);
                if needed > available {
                    return Err(MeshError::InsufficientGuards {
                        axis,
                        needed,
                        available,
                    }
                    .into());
                }
                let rules = DiffMethod::ALL
                    .into_iter()
                    .filter(|&m| family.supports(m))
                    .map(|m| (m, rule_grid(key, m, config.strict_locations)))
                    .collect();
                entries.insert(key, Entry { default, rules });
            }
        }
        Ok(Self { entries })
    }

    /// The configured method for `key`.
    pub fn default_method(&self, key: OpKey) -> DiffMethod {
        self.entries
            .get(&key)
            .map_or(DiffMethod::C2, |e| e.default)
    }

    /// The rule for one combination, if `method` is supported.
    pub fn rule(
        &self,
        key: OpKey,
        method: DiffMethod,
        from: CellLoc,
        to: CellLoc,
    ) -> Option<LocRule> {
        self.entries
            .get(&key)
            .and_then(|e| e.rules.get(&method))
            .map(|grid| grid[from.index()][to.index()])
    }

    /// Pick the method and route for a call.
    pub fn resolve(
        &self,
        key: OpKey,
        method: Option<DiffMethod>,
        from: CellLoc,
        to: CellLoc,
    ) -> Result<(DiffMethod, Route), OperatorError> {
        let method = method.unwrap_or_else(|| self.default_method(key));
        match self.rule(key, method, from, to) {
            None => Err(OperatorError::UnsupportedMethod { key, method }),
            Some(LocRule::Reject) => Err(OperatorError::LocationMismatch { key, from, to }),
            Some(LocRule::Interpolate) => Ok((method, Route::Interpolate)),
            Some(LocRule::Same | LocRule::Staggered) => Ok((method, Route::Direct)),
        }
    }
}

fn rule_grid(key: OpKey, method: DiffMethod, strict: bool) -> RuleGrid {
    let mut grid = [[LocRule::Reject; 4]; 4];
    for from in CellLoc::ALL {
        for to in CellLoc::ALL {
            grid[from.index()][to.index()] = loc_rule(key, method, from, to, strict);
        }
    }
    grid
}

fn loc_rule(key: OpKey, method: DiffMethod, from: CellLoc, to: CellLoc, strict: bool) -> LocRule {
    if from == to {
        return LocRule::Same;
    }
    let low = key.axis.low_loc();
    let staggered_pair =
        (from == CellLoc::Centre && to == low) || (from == low && to == CellLoc::Centre);
    let central = matches!(method, DiffMethod::C2 | DiffMethod::C4);
    if key.family == OpFamily::First && staggered_pair && central {
        LocRule::Staggered
    } else if strict {
        LocRule::Reject
    } else {
        LocRule::Interpolate
    }
}
