//! Optional operator arguments: output location and method.

use gyre_core::CellLoc;
use gyre_mesh::DiffMethod;

/// Optional overrides for a single operator call.
///
/// Every operator takes `impl Into<DerivArgs>`, so callers may pass
/// `()`, a [`CellLoc`], a [`DiffMethod`], or either ordering of the
/// pair. Both orderings produce the same arguments.
///
/// # Examples
///
/// ```
/// use gyre_core::CellLoc;
/// use gyre_mesh::DiffMethod;
/// use gyre_ops::DerivArgs;
///
/// let a: DerivArgs = (CellLoc::XLow, DiffMethod::C4).into();
/// let b: DerivArgs = (DiffMethod::C4, CellLoc::XLow).into();
/// assert_eq!(a, b);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DerivArgs {
    /// Output location; defaults to the input's location.
    pub outloc: Option<CellLoc>,
    /// Differencing method; defaults to the table's method for the family.
    pub method: Option<DiffMethod>,
}

impl DerivArgs {
    /// Only an output location.
    pub fn at(loc: CellLoc) -> Self {
        Self {
            outloc: Some(loc),
            method: None,
        }
    }

    /// Only a method.
    pub fn using(method: DiffMethod) -> Self {
        Self {
            outloc: None,
            method: Some(method),
        }
    }

    /// Drop the method override, keeping the location.
    pub(crate) fn location_only(self) -> Self {
        Self {
            outloc: self.outloc,
            method: None,
        }
    }
}

impl From<()> for DerivArgs {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl From<CellLoc> for DerivArgs {
    fn from(loc: CellLoc) -> Self {
        Self::at(loc)
    }
}

impl From<DiffMethod> for DerivArgs {
    fn from(method: DiffMethod) -> Self {
        Self::using(method)
    }
}

impl From<(CellLoc, DiffMethod)> for DerivArgs {
    fn from((loc, method): (CellLoc, DiffMethod)) -> Self {
        Self {
            outloc: Some(loc),
            method: Some(method),
        }
    }
}

impl From<(DiffMethod, CellLoc)> for DerivArgs {
    fn from((method, loc): (DiffMethod, CellLoc)) -> Self {
        (loc, method).into()
    }
}
