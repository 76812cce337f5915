//! Power-method eigensolver.
//!
//! Finds the dominant eigenvector of a symmetric matrix by repeated
//! multiplication and normalisation, starting from the matrix's first column.
//! The start vector is deterministic, so the result depends only on the input.

use crate::helpers::NUMERICAL_EPS;
use log::warn;
use nalgebra::{DMatrix, DVector};

/// Outcome of a power-method run.
#[derive(Debug, Clone)]
pub struct PowerIteration {
    /// Unit-norm approximation of the dominant eigenvector
    /// (the zero vector for the zero matrix).
    pub vector: DVector<f64>,
    /// Number of matrix-vector products performed.
    pub iterations: usize,
    /// Whether successive iterates came within `tol` of each other.
    pub converged: bool,
}

/// Start vector: the first column, or the largest-norm column when the
/// first one is negligible next to it (a zero-variance leading feature).
/// `None` for the zero matrix.
fn start_vector(mat: &DMatrix<f64>) -> Option<DVector<f64>> {
    let (best, best_norm) = mat
        .column_iter()
        .map(|col| col.norm())
        .enumerate()
        .fold((0, 0.0), |acc, (j, norm)| if norm > acc.1 { (j, norm) } else { acc });
    if best_norm == 0.0 || !best_norm.is_finite() {
        return None;
    }
    let first = mat.column(0);
    let col = if first.norm() > NUMERICAL_EPS * best_norm {
        first
    } else {
        mat.column(best)
    };
    let norm = col.norm();
    Some(col.into_owned() / norm)
}

/// Run the power method on `mat`.
///
/// Iterates `v ← M v / ‖M v‖` until `‖v - v_prev‖ ≤ tol` or `max_iter`
/// products have been taken. Hitting the cap is not an error: the last
/// iterate is returned with `converged == false`. Eigenvalues of equal
/// magnitude and opposite sign make the iterates oscillate, in which case
/// the cap is what ends the loop.
///
/// The zero matrix yields the zero vector with `converged == true`. If a
/// non-zero matrix maps the current iterate to zero, the iterate is
/// returned with `converged == false`.
pub fn power_iteration(mat: &DMatrix<f64>, tol: f64, max_iter: usize) -> PowerIteration {
    let n = mat.nrows();
    let mut v = match start_vector(mat) {
        Some(v) => v,
        None => {
            return PowerIteration {
                vector: DVector::zeros(n),
                iterations: 0,
                converged: true,
            }
        }
    };

    let mut iterations = 0;
    let mut converged = false;
    while iterations < max_iter {
        let mut next = mat * &v;
        let norm = next.norm();
        iterations += 1;
        if norm == 0.0 || !norm.is_finite() {
            break;
        }
        next /= norm;
        let delta = (&next - &v).norm();
        v = next;
        if delta <= tol {
            converged = true;
            break;
        }
    }

    PowerIteration {
        vector: v,
        iterations,
        converged,
    }
}

/// Dominant eigenvector of a symmetric matrix via the power method.
///
/// Non-convergence within `max_iter` iterations is logged and the last
/// iterate returned.
pub fn dominant_eigenvector(mat: &DMatrix<f64>, tol: f64, max_iter: usize) -> DVector<f64> {
    let result = power_iteration(mat, tol, max_iter);
    if !result.converged {
        warn!(
            "power method stopped after {} iterations without reaching tol={:e}",
            result.iterations, tol
        );
    }
    result.vector
}
