//! Jacobian sparsity, column coloring and finite-difference probing.
//!
//! A [`SparsityPattern`] is a compressed-row boolean matrix over the
//! local state vector. Columns that never share a row can be perturbed
//! together; [`Coloring::greedy`] groups them so a full Jacobian costs
//! one residual evaluation per color instead of one per column.

use crate::model::RhsFault;
use gyre_codec::StateLayout;
use std::sync::Arc;

// ── SparsityPattern ────────────────────────────────────────────────

/// Compressed-row nonzero structure of a square matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparsityPattern {
    n: usize,
    row_ptr: Vec<usize>,
    cols: Vec<usize>,
}

impl SparsityPattern {
    /// Build from per-row column lists. Columns are sorted and
    /// deduplicated; out-of-range columns are dropped.
    pub fn from_rows(n: usize, rows: Vec<Vec<usize>>) -> Self {
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut cols = Vec::new();
        row_ptr.push(0);
        for mut r in rows.into_iter().take(n) {
            r.retain(|&c| c < n);
            r.sort_unstable();
            r.dedup();
            cols.extend(r);
            row_ptr.push(cols.len());
        }
        while row_ptr.len() < n + 1 {
            row_ptr.push(cols.len());
        }
        Self { n, row_ptr, cols }
    }

    /// Build from raw CSR arrays, checking their consistency.
    pub fn from_csr(n: usize, row_ptr: Vec<usize>, cols: Vec<usize>) -> Option<Self> {
        let well_formed = row_ptr.len() == n + 1
            && row_ptr.first() == Some(&0)
            && row_ptr.last() == Some(&cols.len())
            && row_ptr.windows(2).all(|w| w[0] <= w[1])
            && row_ptr
                .windows(2)
                .all(|w| cols[w[0]..w[1]].windows(2).all(|c| c[0] < c[1]))
            && cols.iter().all(|&c| c < n);
        well_formed.then_some(Self { n, row_ptr, cols })
    }

    /// Every entry is a nonzero.
    pub fn dense(n: usize) -> Self {
        Self::from_rows(n, (0..n).map(|_| (0..n).collect()).collect())
    }

    /// Nonzeros implied by the finite-difference stencils.
    ///
    /// Every value at a point couples to every value at the same point
    /// (all slots, all planes, since z operators act along whole
    /// columns) and at the evolved points of the `(2 * radius + 1)`
    /// square box around it, which covers the mixed x-y derivative. When
    /// y is periodic, box rows past either end of the interior wrap.
    pub fn stencil(layout: &StateLayout, radius: usize) -> Self {
        let pp = layout.per_point();
        let r = radius as isize;
        let wrap = |y: isize| -> Option<usize> {
            match layout.y_wrap() {
                Some((ys, ye)) => {
                    let (ys, span) = (ys as isize, (ye + 1 - ys) as isize);
                    let wrapped = ys + (y - ys).rem_euclid(span);
                    usize::try_from(wrapped).ok()
                }
                None => usize::try_from(y).ok(),
            }
        };
        let mut point_rows: Vec<Vec<usize>> = Vec::with_capacity(layout.num_points());
        for (x, y) in layout.points() {
            let mut neighbours = vec![];
            for dx in -r..=r {
                let Ok(cx) = usize::try_from(x as isize + dx) else {
                    continue;
                };
                for dy in -r..=r {
                    let Some(cy) = wrap(y as isize + dy) else {
                        continue;
                    };
                    if let Some(p) = layout.point_index(cx, cy) {
                        neighbours.push(p);
                    }
                }
            }
            neighbours.sort_unstable();
            neighbours.dedup();
            point_rows.push(neighbours);
        }
        let mut rows = Vec::with_capacity(layout.local_len());
        for neighbours in &point_rows {
            let cols: Vec<usize> = neighbours
                .iter()
                .flat_map(|&p| p * pp..(p + 1) * pp)
                .collect();
            for _ in 0..pp {
                rows.push(cols.clone());
            }
        }
        Self::from_rows(layout.local_len(), rows)
    }

    /// Matrix order.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of stored nonzeros.
    pub fn nnz(&self) -> usize {
        self.cols.len()
    }

    /// Sorted column indices of row `i`.
    pub fn row(&self, i: usize) -> &[usize] {
        &self.cols[self.row_ptr[i]..self.row_ptr[i + 1]]
    }

    /// Whether `(i, j)` is a stored nonzero.
    pub fn contains(&self, i: usize, j: usize) -> bool {
        i < self.n && self.row(i).binary_search(&j).is_ok()
    }

    /// Row offsets, length `n + 1`.
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// Column indices, length `nnz`.
    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    /// Rows holding a nonzero in each column.
    pub fn column_rows(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.n];
        for i in 0..self.n {
            for &j in self.row(i) {
                out[j].push(i);
            }
        }
        out
    }
}

// ── Coloring ───────────────────────────────────────────────────────

/// Assignment of columns to structurally orthogonal groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coloring {
    colors: Vec<usize>,
    ncolors: usize,
}

impl Coloring {
    /// Greedy distance-2 coloring in column order: each column takes the
    /// smallest color not used by any column sharing a row with it.
    pub fn greedy(pattern: &SparsityPattern) -> Self {
        let n = pattern.n();
        let by_col = pattern.column_rows();
        let mut colors = vec![usize::MAX; n];
        // stamp[c] == j + 1 marks color c as taken for column j.
        let mut stamp: Vec<usize> = Vec::new();
        let mut ncolors = 0;
        for j in 0..n {
            for &i in &by_col[j] {
                for &k in pattern.row(i) {
                    let c = colors[k];
                    if c != usize::MAX {
                        stamp[c] = j + 1;
                    }
                }
            }
            let c = (0..ncolors).find(|&c| stamp[c] != j + 1).unwrap_or(ncolors);
            if c == ncolors {
                ncolors += 1;
                stamp.push(0);
            }
            colors[j] = c;
        }
        Self { colors, ncolors }
    }

    /// Build from explicit colors; the color count is one past the largest.
    pub fn from_colors(colors: Vec<usize>) -> Self {
        let ncolors = colors.iter().max().map_or(0, |&m| m + 1);
        Self { colors, ncolors }
    }

    /// Color of each column.
    pub fn colors(&self) -> &[usize] {
        &self.colors
    }

    /// Number of colors.
    pub fn ncolors(&self) -> usize {
        self.ncolors
    }

    /// Columns of each color, in column order.
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.ncolors];
        for (j, &c) in self.colors.iter().enumerate() {
            out[c].push(j);
        }
        out
    }

    /// Whether no two columns of one color share a row of `pattern`.
    pub fn is_valid_for(&self, pattern: &SparsityPattern) -> bool {
        if self.colors.len() != pattern.n() {
            return false;
        }
        (0..pattern.n()).all(|i| {
            let mut seen = vec![false; self.ncolors];
            pattern.row(i).iter().all(|&j| {
                let c = self.colors[j];
                !std::mem::replace(&mut seen[c], true)
            })
        })
    }
}

// ── SparseMatrix ───────────────────────────────────────────────────

/// Values stored on a shared [`SparsityPattern`].
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix {
    pattern: Arc<SparsityPattern>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// A zero matrix on `pattern`.
    pub fn zeros(pattern: Arc<SparsityPattern>) -> Self {
        let values = vec![0.0; pattern.nnz()];
        Self { pattern, values }
    }

    /// The structure.
    pub fn pattern(&self) -> &SparsityPattern {
        &self.pattern
    }

    /// Entry `(i, j)`; zero when outside the pattern.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.offset(i, j).map_or(0.0, |k| self.values[k])
    }

    /// Set entry `(i, j)`. Returns `false` when it is outside the pattern.
    pub fn set(&mut self, i: usize, j: usize, v: f64) -> bool {
        match self.offset(i, j) {
            Some(k) => {
                self.values[k] = v;
                true
            }
            None => false,
        }
    }

    /// Stored values in CSR order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Zero every stored value.
    pub fn clear(&mut self) {
        self.values.fill(0.0);
    }

    fn offset(&self, i: usize, j: usize) -> Option<usize> {
        if i >= self.pattern.n() {
            return None;
        }
        let start = self.pattern.row_ptr()[i];
        self.pattern.row(i).binary_search(&j).ok().map(|k| start + k)
    }
}

// ── JacobianSetup ──────────────────────────────────────────────────

/// How the Jacobian structure was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JacobianStrategy {
    /// Read from a cached structure file.
    Loaded,
    /// Derived from a dense finite-difference probe at init.
    SlowProbe,
    /// Derived from the differencing stencils.
    Stencil,
}

/// Structure handed to the integrator for Jacobian evaluations.
#[derive(Clone, Debug)]
pub struct JacobianSetup {
    /// Nonzero structure.
    pub pattern: Arc<SparsityPattern>,
    /// Column groups for colored probing.
    pub coloring: Coloring,
    /// Where the structure came from.
    pub strategy: JacobianStrategy,
}

impl JacobianSetup {
    /// Pair `pattern` with its greedy coloring.
    pub fn colored(pattern: SparsityPattern, strategy: JacobianStrategy) -> Self {
        let coloring = Coloring::greedy(&pattern);
        Self {
            pattern: Arc::new(pattern),
            coloring,
            strategy,
        }
    }

    /// A zero matrix on this structure.
    pub fn matrix(&self) -> SparseMatrix {
        SparseMatrix::zeros(Arc::clone(&self.pattern))
    }
}

// ── Finite-difference probing ──────────────────────────────────────

/// Perturbation for column `j`: `sqrt(eps) * max(|u_j|, 1)`.
#[inline]
pub fn fd_increment(u: f64) -> f64 {
    f64::EPSILON.sqrt() * u.abs().max(1.0)
}

/// Fill `jac` by forward differences, perturbing each column group of
/// `groups` together. `f0` is the residual at `u`.
///
/// `u` is restored before returning, also on error.
pub fn probe(
    residual: &mut dyn FnMut(&[f64], &mut [f64]) -> Result<(), RhsFault>,
    u: &mut [f64],
    f0: &[f64],
    groups: &[Vec<usize>],
    jac: &mut SparseMatrix,
) -> Result<(), RhsFault> {
    let by_col = jac.pattern().column_rows();
    let mut f1 = vec![0.0; u.len()];
    let mut saved = Vec::new();
    for group in groups {
        saved.clear();
        for &j in group {
            let h = fd_increment(u[j]);
            saved.push((j, u[j], h));
            u[j] += h;
        }
        let result = residual(u, &mut f1);
        for &(j, orig, _) in &saved {
            u[j] = orig;
        }
        result?;
        for &(j, orig, h) in &saved {
            // Use the increment actually represented in floating point.
            let step = (orig + h) - orig;
            for &i in &by_col[j] {
                jac.set(i, j, (f1[i] - f0[i]) / step);
            }
        }
    }
    Ok(())
}

/// Each column alone, for dense probing.
pub fn singleton_groups(n: usize) -> Vec<Vec<usize>> {
    (0..n).map(|j| vec![j]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_codec::RegistryBuilder;
    use gyre_core::CellLoc;
    use gyre_mesh::{StructuredMesh, YTopology};
    use proptest::prelude::*;

    fn tridiagonal(n: usize) -> SparsityPattern {
        SparsityPattern::from_rows(
            n,
            (0..n)
                .map(|i| (i.saturating_sub(1)..=(i + 1).min(n - 1)).collect())
                .collect(),
        )
    }

    #[test]
    fn tridiagonal_needs_three_colors() {
        let p = tridiagonal(10);
        let c = Coloring::greedy(&p);
        assert_eq!(c.ncolors(), 3);
        assert!(c.is_valid_for(&p));
        assert_eq!(&c.colors()[..4], &[0, 1, 2, 0]);
    }

    #[test]
    fn dense_needs_one_color_per_column() {
        let p = SparsityPattern::dense(5);
        assert_eq!(p.nnz(), 25);
        assert_eq!(Coloring::greedy(&p).ncolors(), 5);
    }

    #[test]
    fn from_csr_rejects_inconsistent_arrays() {
        assert!(SparsityPattern::from_csr(2, vec![0, 1, 2], vec![0, 1]).is_some());
        assert!(SparsityPattern::from_csr(2, vec![0, 1, 3], vec![0, 1]).is_none());
        assert!(SparsityPattern::from_csr(2, vec![0, 2, 2], vec![1, 0]).is_none());
        assert!(SparsityPattern::from_csr(2, vec![0, 1, 2], vec![0, 2]).is_none());
    }

    #[test]
    fn stencil_pattern_couples_neighbour_points() {
        let mesh = StructuredMesh::builder()
            .interior(4, 4)
            .planes(2)
            .guards(1, 1)
            .build()
            .unwrap();
        let reg = RegistryBuilder::new()
            .scalar_3d("n", CellLoc::Centre)
            .build()
            .unwrap();
        let layout = StateLayout::build(&reg, &mesh);
        let p = SparsityPattern::stencil(&layout, 1);
        let pp = layout.per_point();
        let at = |x, y| layout.point_index(x, y).unwrap() * pp;
        // Same point, other plane.
        assert!(p.contains(at(2, 2), at(2, 2) + 1));
        assert!(p.contains(at(2, 2), at(3, 2)));
        assert!(p.contains(at(2, 2), at(2, 1)));
        // Diagonal neighbours, reached by the mixed x-y derivative.
        assert!(p.contains(at(2, 2), at(3, 3)));
        assert!(p.contains(at(2, 2), at(1, 3)));
        assert!(!p.contains(at(2, 2), at(4, 2)));
        assert!(!p.contains(at(2, 2), at(4, 4)));
        let c = Coloring::greedy(&p);
        assert!(c.is_valid_for(&p));
        assert!(c.ncolors() < p.n());
    }

    #[test]
    fn stencil_pattern_wraps_periodic_y() {
        let mesh = StructuredMesh::builder()
            .interior(4, 4)
            .guards(1, 1)
            .y_topology(YTopology::Periodic)
            .build()
            .unwrap();
        let reg = RegistryBuilder::new().scalar_2d("p").build().unwrap();
        let layout = StateLayout::build(&reg, &mesh);
        assert_eq!(layout.y_wrap(), Some((1, 4)));
        let p = SparsityPattern::stencil(&layout, 1);
        let at = |x, y| layout.point_index(x, y).unwrap();
        // y = ystart sees y = yend through the lower guard row.
        assert!(p.contains(at(2, 1), at(2, 4)));
        assert!(p.contains(at(2, 1), at(3, 4)));
        assert!(p.contains(at(2, 4), at(1, 1)));
        assert!(!p.contains(at(2, 1), at(2, 3)));
    }

    #[test]
    fn probe_recovers_linear_map() {
        // f(u) = A u with A tridiagonal [1, -2, 1].
        let n = 6;
        let p = Arc::new(tridiagonal(n));
        let mut residual = |u: &[f64], f: &mut [f64]| -> Result<(), RhsFault> {
            for i in 0..u.len() {
                let l = if i > 0 { u[i - 1] } else { 0.0 };
                let r = if i + 1 < u.len() { u[i + 1] } else { 0.0 };
                f[i] = l - 2.0 * u[i] + r;
            }
            Ok(())
        };
        let mut u: Vec<f64> = (0..n).map(|i| i as f64 * 0.3).collect();
        let mut f0 = vec![0.0; n];
        residual(&u, &mut f0).unwrap();
        let groups = Coloring::greedy(&p).groups();
        let mut jac = SparseMatrix::zeros(Arc::clone(&p));
        probe(&mut residual, &mut u, &f0, &groups, &mut jac).unwrap();
        for i in 0..n {
            assert!((jac.get(i, i) + 2.0).abs() < 1e-6);
            if i + 1 < n {
                assert!((jac.get(i, i + 1) - 1.0).abs() < 1e-6);
                assert!((jac.get(i + 1, i) - 1.0).abs() < 1e-6);
            }
        }
        assert_eq!(u[3], 0.3 * 3.0);
    }

    #[test]
    fn probe_restores_state_on_fault() {
        let p = Arc::new(SparsityPattern::dense(3));
        let mut residual =
            |_: &[f64], _: &mut [f64]| -> Result<(), RhsFault> { Err(RhsFault::failed(1, "x")) };
        let mut u = vec![1.0, 2.0, 3.0];
        let mut jac = SparseMatrix::zeros(p);
        let err = probe(&mut residual, &mut u, &[0.0; 3], &singleton_groups(3), &mut jac);
        assert!(err.is_err());
        assert_eq!(u, [1.0, 2.0, 3.0]);
    }

    proptest! {
        #[test]
        fn greedy_coloring_is_always_valid(
            rows in prop::collection::vec(prop::collection::vec(0usize..12, 0..5), 12),
        ) {
            let p = SparsityPattern::from_rows(12, rows);
            let c = Coloring::greedy(&p);
            prop_assert!(c.is_valid_for(&p));
            prop_assert_eq!(c.colors().len(), 12);
        }
    }
}
