//! Dense MNA linear system and stamp primitives.

use nalgebra::{DMatrix, DVector};

use crate::node::NodeId;

/// The MNA working set: `A * x = z`.
///
/// Rows `[0, num_nodes)` are KCL equations for node voltages; rows
/// `[num_nodes, num_nodes + num_branches)` are branch equations for
/// voltage-source-like elements. Dense storage is deliberate: targeted
/// circuits stay below ~100 unknowns with heavy fill, and the direct
/// solver's pivot-on-failure contract needs plain indexed access.
///
/// The accumulator is rebuilt from zero at every Newton iteration; all stamp
/// operations are additive.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    matrix: DMatrix<f64>,
    rhs: DVector<f64>,
    num_nodes: usize,
    num_branches: usize,
}

impl MnaSystem {
    /// Create a zeroed system for the given node and branch counts.
    pub fn new(num_nodes: usize, num_branches: usize) -> Self {
        let n = num_nodes + num_branches;
        Self {
            matrix: DMatrix::zeros(n, n),
            rhs: DVector::zeros(n),
            num_nodes,
            num_branches,
        }
    }

    /// Total unknown count (nodes + branches).
    pub fn size(&self) -> usize {
        self.num_nodes + self.num_branches
    }

    /// Number of node-voltage unknowns.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of branch-current unknowns.
    pub fn num_branches(&self) -> usize {
        self.num_branches
    }

    /// Adopt new dimensions, zeroing the accumulator. Reallocates only when
    /// the total size actually changes.
    pub fn resize(&mut self, num_nodes: usize, num_branches: usize) {
        let n = num_nodes + num_branches;
        if self.matrix.nrows() != n {
            self.matrix = DMatrix::zeros(n, n);
            self.rhs = DVector::zeros(n);
        } else {
            self.clear();
        }
        self.num_nodes = num_nodes;
        self.num_branches = num_branches;
    }

    /// Zero the accumulator in place. No reallocation.
    pub fn clear(&mut self) {
        self.matrix.fill(0.0);
        self.rhs.fill(0.0);
    }

    /// Add to matrix entry `A[r, c]`.
    pub fn add(&mut self, r: usize, c: usize, value: f64) {
        self.matrix[(r, c)] += value;
    }

    /// Add to RHS entry `z[r]`.
    pub fn add_rhs(&mut self, r: usize, value: f64) {
        self.rhs[r] += value;
    }

    /// Stamp a conductance `g` between nodes `a` and `b`.
    ///
    /// `+g` on the diagonals, `-g` on the off-diagonals; ground rows and
    /// columns are skipped.
    pub fn stamp_conductance(&mut self, a: NodeId, b: NodeId, g: f64) {
        if let Some(i) = a.index() {
            self.matrix[(i, i)] += g;
        }
        if let Some(j) = b.index() {
            self.matrix[(j, j)] += g;
        }
        if let (Some(i), Some(j)) = (a.index(), b.index()) {
            self.matrix[(i, j)] -= g;
            self.matrix[(j, i)] -= g;
        }
    }

    /// Stamp a current `i` injected from `a` to `b`.
    ///
    /// KCL convention: the row equation is `A*x - z = 0` with current
    /// leaving the node on the `A*x` side, so injection out of `a` lands as
    /// `-i` on `z[a]` and `+i` on `z[b]`.
    pub fn stamp_current(&mut self, a: NodeId, b: NodeId, i: f64) {
        if let Some(r) = a.index() {
            self.rhs[r] -= i;
        }
        if let Some(r) = b.index() {
            self.rhs[r] += i;
        }
    }

    /// Compute the residual `r = A*x - z`.
    pub fn residual(&self, x: &DVector<f64>) -> DVector<f64> {
        &self.matrix * x - &self.rhs
    }

    /// Euclidean norm of the residual at `x`.
    pub fn residual_norm(&self, x: &DVector<f64>) -> f64 {
        self.residual(x).norm()
    }

    /// The coefficient matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// The RHS vector.
    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_system_size() {
        let sys = MnaSystem::new(3, 2);
        assert_eq!(sys.size(), 5);
        assert_eq!(sys.num_nodes(), 3);
        assert_eq!(sys.num_branches(), 2);
    }

    #[test]
    fn test_stamp_conductance() {
        let mut sys = MnaSystem::new(2, 0);
        sys.stamp_conductance(NodeId::from_index(0), NodeId::from_index(1), 1.0);

        assert_eq!(sys.matrix()[(0, 0)], 1.0);
        assert_eq!(sys.matrix()[(1, 1)], 1.0);
        assert_eq!(sys.matrix()[(0, 1)], -1.0);
        assert_eq!(sys.matrix()[(1, 0)], -1.0);
    }

    #[test]
    fn test_stamp_conductance_to_ground() {
        let mut sys = MnaSystem::new(2, 0);
        sys.stamp_conductance(NodeId::from_index(0), NodeId::GROUND, 2.0);

        assert_eq!(sys.matrix()[(0, 0)], 2.0);
        assert_eq!(sys.matrix()[(1, 1)], 0.0);
    }

    #[test]
    fn test_stamp_current_sign_convention() {
        let mut sys = MnaSystem::new(2, 0);
        // 1 mA injected from node 0 into node 1.
        sys.stamp_current(NodeId::from_index(0), NodeId::from_index(1), 1e-3);

        assert_eq!(sys.rhs()[0], -1e-3);
        assert_eq!(sys.rhs()[1], 1e-3);
    }

    #[test]
    fn test_resize_rezeroes() {
        let mut sys = MnaSystem::new(1, 0);
        sys.add(0, 0, 3.0);

        sys.resize(2, 1);
        assert_eq!(sys.size(), 3);
        assert_eq!(sys.matrix()[(0, 0)], 0.0);

        // Same total size, different split: zeroed in place.
        sys.add(2, 2, 1.0);
        sys.resize(3, 0);
        assert_eq!(sys.num_nodes(), 3);
        assert_eq!(sys.matrix()[(2, 2)], 0.0);
    }

    #[test]
    fn test_clear_keeps_dimensions() {
        let mut sys = MnaSystem::new(2, 1);
        sys.add(0, 0, 5.0);
        sys.add_rhs(2, 1.0);
        sys.clear();

        assert_eq!(sys.size(), 3);
        assert_eq!(sys.matrix()[(0, 0)], 0.0);
        assert_eq!(sys.rhs()[2], 0.0);
    }

    #[test]
    fn test_residual() {
        let mut sys = MnaSystem::new(1, 0);
        sys.add(0, 0, 2.0);
        sys.add_rhs(0, 1.0);

        let x = DVector::from_vec(vec![3.0]);
        let r = sys.residual(&x);
        assert_eq!(r[0], 5.0);
        assert_eq!(sys.residual_norm(&x), 5.0);
    }
}
