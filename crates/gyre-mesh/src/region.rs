//! Boundary-region descriptions.

/// An inclusive range of local x indices owning a y-boundary region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct XRange {
    /// First x index.
    pub xs: usize,
    /// Last x index, inclusive.
    pub xe: usize,
}

impl XRange {
    /// Construct an inclusive range.
    pub fn new(xs: usize, xe: usize) -> Self {
        Self { xs, xe }
    }

    /// Iterate the x indices in ascending order.
    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.xs..=self.xe
    }

    /// Number of x indices covered.
    pub fn len(&self) -> usize {
        self.xe + 1 - self.xs
    }

    /// Always false; an `XRange` covers at least one index.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Topology of the y axis.
///
/// With [`Periodic`](Self::Periodic) the y guard cells are copies of the
/// opposite end and carry no state of their own. With
/// [`Open`](Self::Open) they are boundary cells: the lower and upper
/// y-boundary regions are evolved like any other point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum YTopology {
    /// Guard cells wrap around.
    Periodic,
    /// Guard cells are boundary points.
    #[default]
    Open,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive() {
        let r = XRange::new(2, 5);
        assert_eq!(r.len(), 4);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![2, 3, 4, 5]);
    }
}
