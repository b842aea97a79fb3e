//! Direct dense solver: Gaussian elimination with partial pivoting.
//!
//! Deliberately hand-rolled instead of delegating to a library LU: the DC
//! engine needs to know *which row* lost its pivot so it can regularise the
//! diagonal and retry, and that information does not survive a generic
//! factorisation API.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Pivots below this magnitude count as zero.
const PIVOT_FLOOR: f64 = 1e-18;

/// Reusable Gaussian elimination workspace.
///
/// Keeps the factor scratch between calls so the per-iteration Newton
/// solves do not reallocate.
#[derive(Debug, Clone)]
pub struct GaussianSolver {
    lu: DMatrix<f64>,
    rhs: DVector<f64>,
}

impl GaussianSolver {
    /// Create a workspace for `n` unknowns.
    pub fn new(n: usize) -> Self {
        Self {
            lu: DMatrix::zeros(n, n),
            rhs: DVector::zeros(n),
        }
    }

    /// Solve `a * x = b`, writing the solution into `x`.
    ///
    /// Returns [`Error::SingularPivot`] with the failing row if no usable
    /// pivot exists; `a` and `b` are left untouched either way.
    pub fn solve(&mut self, a: &DMatrix<f64>, b: &DVector<f64>, x: &mut DVector<f64>) -> Result<()> {
        let n = a.nrows();
        if a.ncols() != n || b.len() != n {
            return Err(Error::DimensionMismatch {
                rows: a.nrows(),
                cols: a.ncols(),
                rhs_len: b.len(),
            });
        }
        if x.len() != n {
            *x = DVector::zeros(n);
        }
        if n == 0 {
            return Ok(());
        }

        self.lu.copy_from(a);
        self.rhs.copy_from(b);

        // Forward elimination with row pivoting.
        for k in 0..n {
            let mut pivot = k;
            let mut max_abs = self.lu[(k, k)].abs();
            for i in (k + 1)..n {
                let v = self.lu[(i, k)].abs();
                if v > max_abs {
                    max_abs = v;
                    pivot = i;
                }
            }

            if max_abs < PIVOT_FLOOR {
                return Err(Error::SingularPivot { row: k });
            }

            if pivot != k {
                self.lu.swap_rows(k, pivot);
                self.rhs.swap_rows(k, pivot);
            }

            let akk = self.lu[(k, k)];
            for i in (k + 1)..n {
                let factor = self.lu[(i, k)] / akk;
                if factor == 0.0 {
                    continue;
                }
                self.lu[(i, k)] = 0.0;
                for j in (k + 1)..n {
                    let akj = self.lu[(k, j)];
                    self.lu[(i, j)] -= factor * akj;
                }
                let bk = self.rhs[k];
                self.rhs[i] -= factor * bk;
            }
        }

        // Back substitution.
        for i in (0..n).rev() {
            let mut sum = self.rhs[i];
            for j in (i + 1)..n {
                sum -= self.lu[(i, j)] * x[j];
            }
            x[i] = sum / self.lu[(i, i)];
        }

        Ok(())
    }
}

/// One-shot convenience wrapper around [`GaussianSolver`].
pub fn solve_dense(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    let mut x = DVector::zeros(b.len());
    GaussianSolver::new(a.nrows()).solve(a, b, &mut x)?;
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_solve_2x2() {
        // 2x + y = 5, x + 3y = 6 -> x = 1.8, y = 1.4
        let a = dmatrix![2.0, 1.0; 1.0, 3.0];
        let b = dvector![5.0, 6.0];

        let x = solve_dense(&a, &b).unwrap();
        assert_abs_diff_eq!(x[0], 1.8, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 1.4, epsilon = 1e-12);
    }

    #[test]
    fn test_pivoting_handles_zero_diagonal() {
        // Leading zero forces a row swap.
        let a = dmatrix![0.0, 1.0; 1.0, 0.0];
        let b = dvector![2.0, 3.0];

        let x = solve_dense(&a, &b).unwrap();
        assert_abs_diff_eq!(x[0], 3.0);
        assert_abs_diff_eq!(x[1], 2.0);
    }

    #[test]
    fn test_singular_reports_pivot_row() {
        // Row 2 = 2 * row 1: elimination dies at the second pivot.
        let a = dmatrix![1.0, 2.0; 2.0, 4.0];
        let b = dvector![1.0, 2.0];

        match solve_dense(&a, &b) {
            Err(Error::SingularPivot { row }) => assert_eq!(row, 1),
            other => panic!("expected singular pivot, got {other:?}"),
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = dmatrix![1.0, 2.0; 3.0, 4.0];
        let b = dvector![1.0, 2.0, 3.0];
        assert!(matches!(
            solve_dense(&a, &b),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_inputs_left_untouched() {
        let a = dmatrix![4.0, 1.0; 1.0, 3.0];
        let b = dvector![1.0, 2.0];
        let (a0, b0) = (a.clone(), b.clone());

        let mut solver = GaussianSolver::new(2);
        let mut x = DVector::zeros(2);
        solver.solve(&a, &b, &mut x).unwrap();

        assert_eq!(a, a0);
        assert_eq!(b, b0);
    }

    #[test]
    fn test_workspace_reuse() {
        let mut solver = GaussianSolver::new(2);
        let mut x = DVector::zeros(2);

        let a = dmatrix![2.0, 0.0; 0.0, 4.0];
        solver.solve(&a, &dvector![2.0, 4.0], &mut x).unwrap();
        assert_abs_diff_eq!(x[0], 1.0);

        solver.solve(&a, &dvector![4.0, 8.0], &mut x).unwrap();
        assert_abs_diff_eq!(x[0], 2.0);
        assert_abs_diff_eq!(x[1], 2.0);
    }
}
