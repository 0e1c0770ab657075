//! Interpolation between staggered cell locations.

use crate::error::MeshError;
use crate::stencil::{interp_to_centre, interp_to_low, line, Kernel, Stagger};
use gyre_core::{Axis, CellLoc, Field};

/// Move `f` to cell location `to`.
///
/// A shift between two face locations goes through the centre. Points
/// whose four-point stencil would leave the block along x or y keep
/// their input value; z wraps. Axisymmetric fields are unchanged by a
/// z shift apart from the location tag.
pub(crate) fn interpolate(f: &Field, to: CellLoc) -> Result<Field, MeshError> {
    f.values()?;
    let from = f.loc();
    if from == to {
        return Ok(f.clone());
    }
    let mut out = f.clone();
    if let Some(axis) = from.staggered_axis() {
        out = shift(&out, axis, Stagger::ToCentre)?;
    }
    if let Some(axis) = to.staggered_axis() {
        out = shift(&out, axis, Stagger::ToLow)?;
    }
    Ok(out.with_loc(to))
}

fn shift(f: &Field, axis: Axis, dir: Stagger) -> Result<Field, MeshError> {
    if axis == Axis::Z && !f.is_3d() {
        return Ok(f.clone());
    }
    let (nx, ny, nz) = f.shape();
    let vals = f.values()?;
    let (kernel, below, above) = match dir {
        Stagger::ToLow => (interp_to_low as Kernel, 2, 1),
        _ => (interp_to_centre as Kernel, 1, 2),
    };
    let n = match axis {
        Axis::X => nx,
        Axis::Y => ny,
        Axis::Z => nz,
    };
    let mut out = f.clone();
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                let i = match axis {
                    Axis::X => x,
                    Axis::Y => y,
                    Axis::Z => z,
                };
                if axis != Axis::Z && (i < below || i + above >= n) {
                    continue;
                }
                let tap = line(f, vals, axis, x, y, z);
                out.set(x, y, z, kernel(&tap))?;
            }
        }
    }
    Ok(out)
}
