//! Roughness penalties for FPLS weight functions.
//!
//! A [`Regularization`] turns a weight space (a grid or a basis) into a
//! symmetric positive-semidefinite penalty matrix `R`. The block adapter adds
//! `R` to the weights Gram matrix before the Cholesky whitening step, so
//! larger penalties produce smoother weight functions.

use crate::basis::{difference_matrix, Basis};
use crate::error::FplsError;
use crate::helpers::{is_strictly_increasing, simpsons_weights};
use nalgebra::DMatrix;
use std::fmt::Debug;

/// The space a penalty is evaluated on.
#[derive(Debug, Clone, Copy)]
pub enum PenaltyDomain<'a> {
    /// Weights are vectors of values on these grid points.
    Grid(&'a [f64]),
    /// Weights are coefficient vectors in this basis.
    Basis(&'a Basis),
}

impl PenaltyDomain<'_> {
    /// Dimension of the weight space.
    pub fn dim(&self) -> usize {
        match self {
            PenaltyDomain::Grid(points) => points.len(),
            PenaltyDomain::Basis(basis) => basis.n_basis(),
        }
    }
}

/// A quadratic roughness penalty on weight functions.
pub trait Regularization: Debug + Send + Sync {
    /// Penalty matrix for `domain`, `dim x dim`, symmetric PSD.
    fn penalty_matrix(&self, domain: PenaltyDomain<'_>) -> Result<DMatrix<f64>, FplsError>;
}

/// `λ ∫ (Dʳ f)²`: squared L2 norm of the `derivative_order`-th derivative.
///
/// Order 0 penalises the L2 norm itself (ridge-like shrinkage).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct L2Regularization {
    pub derivative_order: usize,
    pub lambda: f64,
}

impl L2Regularization {
    pub fn new(derivative_order: usize, lambda: f64) -> Self {
        Self {
            derivative_order,
            lambda,
        }
    }
}

impl Default for L2Regularization {
    fn default() -> Self {
        Self::new(2, 1.0)
    }
}

/// `λ ΔᵗΔ` with `Δ` the order-`order` difference operator on the
/// coefficient (or grid value) index, as in P-splines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferencePenalty {
    pub order: usize,
    pub lambda: f64,
}

impl DifferencePenalty {
    pub fn new(order: usize, lambda: f64) -> Self {
        Self { order, lambda }
    }
}

fn check_lambda(lambda: f64) -> Result<(), FplsError> {
    if !(lambda.is_finite() && lambda >= 0.0) {
        return Err(FplsError::Configuration(format!(
            "regularization parameter must be finite and non-negative, got {lambda}"
        )));
    }
    Ok(())
}

/// One-step finite-difference derivative operator on a grid.
///
/// Forward difference at the left boundary, backward at the right, central
/// in the interior; `m x m`.
pub fn derivative_operator(argvals: &[f64]) -> DMatrix<f64> {
    let m = argvals.len();
    let mut d = DMatrix::zeros(m, m);
    if m < 2 {
        return d;
    }

    let h0 = argvals[1] - argvals[0];
    d[(0, 0)] = -1.0 / h0;
    d[(0, 1)] = 1.0 / h0;

    for j in 1..(m - 1) {
        let h = argvals[j + 1] - argvals[j - 1];
        d[(j, j - 1)] = -1.0 / h;
        d[(j, j + 1)] = 1.0 / h;
    }

    let hn = argvals[m - 1] - argvals[m - 2];
    d[(m - 1, m - 2)] = -1.0 / hn;
    d[(m - 1, m - 1)] = 1.0 / hn;
    d
}

impl Regularization for L2Regularization {
    fn penalty_matrix(&self, domain: PenaltyDomain<'_>) -> Result<DMatrix<f64>, FplsError> {
        check_lambda(self.lambda)?;
        let penalty = match domain {
            PenaltyDomain::Basis(basis) => basis.derivative_gram_matrix(self.derivative_order),
            PenaltyDomain::Grid(points) => {
                if !is_strictly_increasing(points) {
                    return Err(FplsError::Configuration(
                        "grid points must be finite and strictly increasing".to_string(),
                    ));
                }
                let m = points.len();
                let step = derivative_operator(points);
                let mut op = DMatrix::identity(m, m);
                for _ in 0..self.derivative_order {
                    op = &step * op;
                }
                let mut weighted = op.clone();
                for (i, &w) in simpsons_weights(points).iter().enumerate() {
                    weighted.row_mut(i).scale_mut(w);
                }
                let p = op.transpose() * weighted;
                (&p + p.transpose()) * 0.5
            }
        };
        Ok(penalty * self.lambda)
    }
}

impl Regularization for DifferencePenalty {
    fn penalty_matrix(&self, domain: PenaltyDomain<'_>) -> Result<DMatrix<f64>, FplsError> {
        check_lambda(self.lambda)?;
        let dim = domain.dim();
        let delta = difference_matrix(dim, self.order);
        Ok(delta.transpose() * delta * self.lambda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::linspace;
    use nalgebra::DVector;

    fn min_eigenvalue(m: &DMatrix<f64>) -> f64 {
        m.clone()
            .symmetric_eigen()
            .eigenvalues
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn test_l2_order_zero_on_grid_is_weighted_identity() {
        let grid = linspace(0.0, 1.0, 5);
        let p = L2Regularization::new(0, 2.0)
            .penalty_matrix(PenaltyDomain::Grid(&grid))
            .unwrap();
        let w = simpsons_weights(&grid);
        for i in 0..5 {
            for j in 0..5 {
                let expected = if i == j { 2.0 * w[i] } else { 0.0 };
                assert!((p[(i, j)] - expected).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn test_l2_grid_first_derivative_penalty() {
        // first-derivative penalty: constants have zero energy and a line
        // is differentiated exactly, one-sided rows included
        let grid = linspace(0.0, 1.0, 21);
        let p = L2Regularization::new(1, 1.0)
            .penalty_matrix(PenaltyDomain::Grid(&grid))
            .unwrap();
        let constant = DVector::from_element(21, 3.0);
        assert!((&p * &constant).norm() < 1e-9);

        let line = DVector::from_iterator(21, grid.iter().map(|&t| 2.0 * t));
        // ∫ (f')² = 4 for f = 2t on [0, 1]
        let energy = line.dot(&(&p * &line));
        assert!((energy - 4.0).abs() < 1e-9);
        assert!(min_eigenvalue(&p) > -1e-9);
    }

    #[test]
    fn test_l2_basis_penalty() {
        let basis = Basis::monomial((0.0, 1.0), 3).unwrap();
        let p = L2Regularization::new(2, 0.5)
            .penalty_matrix(PenaltyDomain::Basis(&basis))
            .unwrap();
        // only t² has a non-zero second derivative: ∫ 2·2 = 4, times λ
        assert!((p[(2, 2)] - 2.0).abs() < 1e-10);
        assert!(p[(0, 0)].abs() < 1e-14 && p[(1, 1)].abs() < 1e-14);
    }

    #[test]
    fn test_difference_penalty() {
        let basis = Basis::bspline((0.0, 1.0), 6, 4).unwrap();
        let p = DifferencePenalty::new(2, 1.5)
            .penalty_matrix(PenaltyDomain::Basis(&basis))
            .unwrap();
        assert_eq!(p.shape(), (6, 6));
        // constants and linear sequences are unpenalised
        let linear = DVector::from_iterator(6, (0..6).map(|i| i as f64));
        assert!((&p * linear).norm() < 1e-12);
        assert!(min_eigenvalue(&p) > -1e-12);

        let grid = linspace(0.0, 1.0, 4);
        let pg = DifferencePenalty::new(1, 1.0)
            .penalty_matrix(PenaltyDomain::Grid(&grid))
            .unwrap();
        assert_eq!(pg.shape(), (4, 4));
    }

    #[test]
    fn test_negative_lambda_rejected() {
        let grid = linspace(0.0, 1.0, 4);
        let err = L2Regularization::new(1, -1.0)
            .penalty_matrix(PenaltyDomain::Grid(&grid))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_derivative_operator_exact_for_lines() {
        let grid = vec![0.0, 0.1, 0.3, 0.6, 1.0];
        let d = derivative_operator(&grid);
        let f = DVector::from_iterator(5, grid.iter().map(|&t| 3.0 * t - 1.0));
        let df = d * f;
        assert!(df.iter().all(|&v| (v - 3.0).abs() < 1e-12));
    }
}
