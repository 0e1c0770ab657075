//! Index-space finite-difference stencils.
//!
//! Every kernel reads its input through a *tap*: `f(k)` is the value `k`
//! cells along the axis from the output point. Results are in index
//! units; callers divide by the grid spacing. Kernels are selected once
//! per call by method and staggering, so unsupported combinations are
//! rejected before any point is visited.

use gyre_core::{Axis, Field};
use std::fmt;

/// Value `k` cells away from the output point along the stencil axis.
pub type Tap<'a> = &'a dyn Fn(isize) -> f64;

/// A first, second, or fourth derivative kernel.
pub type Kernel = fn(Tap<'_>) -> f64;

/// An advection kernel: `v * df/di` at one point.
pub type UpwindKernel = fn(f64, Tap<'_>) -> f64;

/// A flux-form kernel: `d(v f)/di` at one point.
pub type FluxKernel = fn(Tap<'_>, Tap<'_>) -> f64;

/// Differencing method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiffMethod {
    /// Second-order central.
    C2,
    /// Fourth-order central.
    C4,
    /// First-order upwind.
    U1,
    /// Second-order upwind.
    U2,
}

impl DiffMethod {
    /// All methods, in table order.
    pub const ALL: [DiffMethod; 4] = [
        DiffMethod::C2,
        DiffMethod::C4,
        DiffMethod::U1,
        DiffMethod::U2,
    ];

    /// Number of cells the widest kernel of this method reaches.
    pub fn width(self) -> usize {
        match self {
            Self::C2 | Self::U1 => 1,
            Self::C4 | Self::U2 => 2,
        }
    }
}

impl fmt::Display for DiffMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::C2 => "C2",
            Self::C4 => "C4",
            Self::U1 => "U1",
            Self::U2 => "U2",
        };
        f.write_str(s)
    }
}

/// How the output of a first derivative sits relative to its input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stagger {
    /// Output at the input location.
    None,
    /// Centre input, lower-face output.
    ToLow,
    /// Lower-face input, centre output.
    ToCentre,
}

/// Tap into `f` along `axis` through the point `(x, y, z)`.
///
/// Offsets along x and y must stay inside the block; z wraps
/// periodically. `vals` must be `f`'s storage.
pub(crate) fn line<'a>(
    f: &'a Field,
    vals: &'a [f64],
    axis: Axis,
    x: usize,
    y: usize,
    z: usize,
) -> impl Fn(isize) -> f64 + 'a {
    let nz = f.shape().2 as isize;
    move |k| {
        let i = match axis {
            Axis::X => f.index((x as isize + k) as usize, y, z),
            Axis::Y => f.index(x, (y as isize + k) as usize, z),
            Axis::Z => f.index(x, y, (z as isize + k).rem_euclid(nz) as usize),
        };
        vals[i]
    }
}

// ── First derivative ────────────────────────────────────────────

fn c2_first(f: Tap<'_>) -> f64 {
    0.5 * (f(1) - f(-1))
}

fn c4_first(f: Tap<'_>) -> f64 {
    (8.0 * (f(1) - f(-1)) - (f(2) - f(-2))) / 12.0
}

fn c2_to_low(f: Tap<'_>) -> f64 {
    f(0) - f(-1)
}

fn c4_to_low(f: Tap<'_>) -> f64 {
    (27.0 * (f(0) - f(-1)) - (f(1) - f(-2))) / 24.0
}

fn c2_to_centre(f: Tap<'_>) -> f64 {
    f(1) - f(0)
}

fn c4_to_centre(f: Tap<'_>) -> f64 {
    (27.0 * (f(1) - f(0)) - (f(2) - f(-1))) / 24.0
}

/// First derivative kernel for `method` and `stagger`.
pub fn first(method: DiffMethod, stagger: Stagger) -> Option<Kernel> {
    match (method, stagger) {
        (DiffMethod::C2, Stagger::None) => Some(c2_first as Kernel),
        (DiffMethod::C4, Stagger::None) => Some(c4_first as Kernel),
        (DiffMethod::C2, Stagger::ToLow) => Some(c2_to_low as Kernel),
        (DiffMethod::C4, Stagger::ToLow) => Some(c4_to_low as Kernel),
        (DiffMethod::C2, Stagger::ToCentre) => Some(c2_to_centre as Kernel),
        (DiffMethod::C4, Stagger::ToCentre) => Some(c4_to_centre as Kernel),
        _ => None,
    }
}

// ── Second and fourth derivatives ───────────────────────────────

fn c2_second(f: Tap<'_>) -> f64 {
    f(1) - 2.0 * f(0) + f(-1)
}

fn c4_second(f: Tap<'_>) -> f64 {
    (-f(2) + 16.0 * f(1) - 30.0 * f(0) + 16.0 * f(-1) - f(-2)) / 12.0
}

fn c2_fourth(f: Tap<'_>) -> f64 {
    f(2) - 4.0 * f(1) + 6.0 * f(0) - 4.0 * f(-1) + f(-2)
}

/// Second derivative kernel.
pub fn second(method: DiffMethod) -> Option<Kernel> {
    match method {
        DiffMethod::C2 => Some(c2_second as Kernel),
        DiffMethod::C4 => Some(c4_second as Kernel),
        _ => None,
    }
}

/// Fourth derivative kernel. Only the five-point form exists.
pub fn fourth(method: DiffMethod) -> Option<Kernel> {
    match method {
        DiffMethod::C2 => Some(c2_fourth as Kernel),
        _ => None,
    }
}

// ── Advection ───────────────────────────────────────────────────

fn u1_upwind(v: f64, f: Tap<'_>) -> f64 {
    if v >= 0.0 {
        v * (f(0) - f(-1))
    } else {
        v * (f(1) - f(0))
    }
}

fn u2_upwind(v: f64, f: Tap<'_>) -> f64 {
    if v >= 0.0 {
        v * (1.5 * f(0) - 2.0 * f(-1) + 0.5 * f(-2))
    } else {
        v * (-1.5 * f(0) + 2.0 * f(1) - 0.5 * f(2))
    }
}

fn c2_upwind(v: f64, f: Tap<'_>) -> f64 {
    v * c2_first(f)
}

fn c4_upwind(v: f64, f: Tap<'_>) -> f64 {
    v * c4_first(f)
}

/// Advection kernel `v * df/di`.
pub fn upwind(method: DiffMethod) -> UpwindKernel {
    match method {
        DiffMethod::U1 => u1_upwind as UpwindKernel,
        DiffMethod::U2 => u2_upwind,
        DiffMethod::C2 => c2_upwind,
        DiffMethod::C4 => c4_upwind,
    }
}

// ── Flux form ───────────────────────────────────────────────────

fn c2_flux(v: Tap<'_>, f: Tap<'_>) -> f64 {
    0.5 * (v(1) * f(1) - v(-1) * f(-1))
}

fn u1_flux(v: Tap<'_>, f: Tap<'_>) -> f64 {
    let vp = 0.5 * (v(0) + v(1));
    let vm = 0.5 * (v(-1) + v(0));
    let up = if vp >= 0.0 { vp * f(0) } else { vp * f(1) };
    let down = if vm >= 0.0 { vm * f(-1) } else { vm * f(0) };
    up - down
}

/// Flux-conserving kernel `d(v f)/di`.
pub fn flux(method: DiffMethod) -> Option<FluxKernel> {
    match method {
        DiffMethod::C2 => Some(c2_flux as FluxKernel),
        DiffMethod::U1 => Some(u1_flux as FluxKernel),
        _ => None,
    }
}

// ── Interpolation ───────────────────────────────────────────────

/// Fourth-order value at the lower face from centre taps.
pub fn interp_to_low(f: Tap<'_>) -> f64 {
    (9.0 * (f(-1) + f(0)) - (f(-2) + f(1))) / 16.0
}

/// Fourth-order value at the centre from lower-face taps.
pub fn interp_to_centre(f: Tap<'_>) -> f64 {
    (9.0 * (f(0) + f(1)) - (f(-1) + f(2))) / 16.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn poly(c: [f64; 5], origin: f64) -> impl Fn(isize) -> f64 {
        move |k| {
            let x = origin + k as f64;
            c[0] + c[1] * x + c[2] * x * x + c[3] * x.powi(3) + c[4] * x.powi(4)
        }
    }

    #[test]
    fn c2_first_exact_for_quadratic() {
        let f = poly([1.0, 2.0, 3.0, 0.0, 0.0], 2.0);
        let d = first(DiffMethod::C2, Stagger::None).unwrap()(&f);
        assert!((d - (2.0 + 6.0 * 2.0)).abs() < 1e-12);
    }

    #[test]
    fn c4_first_exact_for_quartic() {
        let f = poly([0.5, -1.0, 0.25, 2.0, -0.5], 1.0);
        let d = first(DiffMethod::C4, Stagger::None).unwrap()(&f);
        let exact = -1.0 + 0.5 * 1.0 + 6.0 * 1.0 - 2.0 * 1.0;
        assert!((d - exact).abs() < 1e-10, "{d} vs {exact}");
    }

    #[test]
    fn staggered_first_lands_on_faces() {
        let f = poly([0.0, 0.0, 1.0, 0.0, 0.0], 3.0);
        // d(x^2)/dx at x = 2.5 is 5.
        let to_low = first(DiffMethod::C2, Stagger::ToLow).unwrap()(&f);
        assert!((to_low - 5.0).abs() < 1e-12);
        let to_low4 = first(DiffMethod::C4, Stagger::ToLow).unwrap()(&f);
        assert!((to_low4 - 5.0).abs() < 1e-12);
        // Lower-face taps: f(0) sits at 2.5, f(1) at 3.5; centre is 3.
        let g = poly([0.0, 0.0, 1.0, 0.0, 0.0], 2.5);
        let to_centre = first(DiffMethod::C4, Stagger::ToCentre).unwrap()(&g);
        assert!((to_centre - 6.0).abs() < 1e-12);
    }

    #[test]
    fn upwind_not_valid_for_first() {
        assert!(first(DiffMethod::U1, Stagger::None).is_none());
        assert!(first(DiffMethod::U2, Stagger::ToLow).is_none());
    }

    #[test]
    fn second_and_fourth_on_quartic() {
        let f = poly([0.0, 0.0, 0.0, 0.0, 1.0], 0.0);
        assert!((second(DiffMethod::C4).unwrap()(&f) - 0.0).abs() < 1e-12);
        assert!((fourth(DiffMethod::C2).unwrap()(&f) - 24.0).abs() < 1e-12);
        let q = poly([0.0, 0.0, 1.0, 0.0, 0.0], 7.0);
        assert!((second(DiffMethod::C2).unwrap()(&q) - 2.0).abs() < 1e-12);
        assert!(fourth(DiffMethod::C4).is_none());
    }

    #[test]
    fn upwind_picks_side_by_sign() {
        let f = |k: isize| if k < 0 { 0.0 } else { 1.0 };
        assert_eq!(upwind(DiffMethod::U1)(2.0, &f), 2.0);
        assert_eq!(upwind(DiffMethod::U1)(-2.0, &f), 0.0);
    }

    #[test]
    fn u1_flux_conserves_for_uniform_state() {
        let v = |_: isize| 1.5;
        let f = |_: isize| 4.0;
        assert_eq!(flux(DiffMethod::U1).unwrap()(&v, &f), 0.0);
        assert!(flux(DiffMethod::U2).is_none());
    }

    #[test]
    fn interpolation_exact_for_cubic() {
        let f = poly([1.0, 1.0, 1.0, 1.0, 0.0], 4.0);
        let exact = poly([1.0, 1.0, 1.0, 1.0, 0.0], 3.5)(0);
        assert!((interp_to_low(&f) - exact).abs() < 1e-12);
        let g = poly([1.0, 1.0, 1.0, 1.0, 0.0], 3.5);
        let centre = poly([1.0, 1.0, 1.0, 1.0, 0.0], 4.0)(0);
        assert!((interp_to_centre(&g) - centre).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn central_kernels_exact_on_low_order_polynomials(
            c in prop::array::uniform4(-2.0f64..2.0),
            origin in -3.0f64..3.0,
        ) {
            let f = poly([c[0], c[1], c[2], c[3], 0.0], origin);
            let x = origin;
            let d1 = c[1] + 2.0 * c[2] * x + 3.0 * c[3] * x * x;
            let d2 = 2.0 * c[2] + 6.0 * c[3] * x;
            let c4 = first(DiffMethod::C4, Stagger::None).unwrap()(&f);
            prop_assert!((c4 - d1).abs() < 1e-9, "{} vs {}", c4, d1);
            let s4 = second(DiffMethod::C4).unwrap()(&f);
            prop_assert!((s4 - d2).abs() < 1e-9, "{} vs {}", s4, d2);
        }
    }
}
