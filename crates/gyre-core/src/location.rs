//! Staggered-grid cell locations, axes and field dimensionality.

use std::fmt;

/// Where on a staggered grid a field's values are defined.
///
/// `Centre` values sit at cell centres; the `*Low` variants sit on the
/// lower face of the cell along one axis, half a cell below the centre.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellLoc {
    /// Cell centre.
    #[default]
    Centre,
    /// Lower face in X.
    XLow,
    /// Lower face in Y.
    YLow,
    /// Lower face in Z.
    ZLow,
}

impl CellLoc {
    /// All locations, in table order.
    pub const ALL: [CellLoc; 4] = [CellLoc::Centre, CellLoc::XLow, CellLoc::YLow, CellLoc::ZLow];

    /// The axis along which this location is shifted, if any.
    pub fn staggered_axis(self) -> Option<Axis> {
        match self {
            Self::Centre => None,
            Self::XLow => Some(Axis::X),
            Self::YLow => Some(Axis::Y),
            Self::ZLow => Some(Axis::Z),
        }
    }

    /// Dense index in `0..4`, matching [`CellLoc::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CellLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Centre => "CENTRE",
            Self::XLow => "XLOW",
            Self::YLow => "YLOW",
            Self::ZLow => "ZLOW",
        };
        f.write_str(s)
    }
}

/// A mesh axis. X is radial, Y is along the field, Z is the periodic
/// toroidal direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    /// Radial axis, decomposed across ranks.
    X,
    /// Parallel axis.
    Y,
    /// Toroidal axis, always periodic.
    Z,
}

impl Axis {
    /// All axes in order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// The face location shifted along this axis.
    pub fn low_loc(self) -> CellLoc {
        match self {
            Self::X => CellLoc::XLow,
            Self::Y => CellLoc::YLow,
            Self::Z => CellLoc::ZLow,
        }
    }

    /// Dense index in `0..3`.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        };
        f.write_str(s)
    }
}

/// Field dimensionality: axisymmetric (x, y) or full (x, y, z).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dims {
    /// Independent of z.
    Two,
    /// Varies in all three axes.
    Three,
}

impl Dims {
    /// The larger of two dimensionalities.
    pub fn max(self, other: Dims) -> Dims {
        if self == Dims::Three || other == Dims::Three {
            Dims::Three
        } else {
            Dims::Two
        }
    }
}
