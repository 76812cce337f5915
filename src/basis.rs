//! Functional bases for basis-expansion data and FPLS weight functions.
//!
//! A [`Basis`] knows how to evaluate its functions (and their derivatives) on
//! a grid and how to integrate products of them, which yields the Gram and
//! cross inner-product matrices consumed by the block adapter.

use crate::error::FplsError;
use crate::helpers::{linspace, simpsons_weights, NUMERICAL_EPS, QUADRATURE_POINTS};
use crate::iter_maybe_parallel;
use nalgebra::DMatrix;
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use std::f64::consts::PI;

/// A finite family of functions on a closed interval.
#[derive(Debug, Clone, PartialEq)]
pub enum Basis {
    /// B-splines with uniformly spaced knots.
    ///
    /// `order` is degree + 1 (4 = cubic). Knots continue past both ends of
    /// the domain with the same spacing, so every function is non-zero on it.
    BSpline {
        domain: (f64, f64),
        n_basis: usize,
        order: usize,
    },
    /// Constant followed by `sin`/`cos` pairs of increasing frequency.
    Fourier {
        domain: (f64, f64),
        n_basis: usize,
        period: f64,
    },
    /// `1, t, t², …`
    Monomial { domain: (f64, f64), n_basis: usize },
}

fn check_domain(domain: (f64, f64)) -> Result<(), FplsError> {
    let (a, b) = domain;
    if !a.is_finite() || !b.is_finite() || a >= b {
        return Err(FplsError::Configuration(format!(
            "basis domain ({a}, {b}) must be finite with start < end"
        )));
    }
    Ok(())
}

impl Basis {
    /// B-spline basis with `n_basis` functions of the given `order`.
    pub fn bspline(domain: (f64, f64), n_basis: usize, order: usize) -> Result<Self, FplsError> {
        check_domain(domain)?;
        if order == 0 {
            return Err(FplsError::Configuration(
                "B-spline order must be at least 1".to_string(),
            ));
        }
        if n_basis < order {
            return Err(FplsError::Configuration(format!(
                "B-spline basis needs at least order={order} functions, got {n_basis}"
            )));
        }
        Ok(Basis::BSpline {
            domain,
            n_basis,
            order,
        })
    }

    /// Fourier basis whose period is the domain length.
    pub fn fourier(domain: (f64, f64), n_basis: usize) -> Result<Self, FplsError> {
        check_domain(domain)?;
        Self::fourier_with_period(domain, n_basis, domain.1 - domain.0)
    }

    /// Fourier basis with an explicit period.
    pub fn fourier_with_period(
        domain: (f64, f64),
        n_basis: usize,
        period: f64,
    ) -> Result<Self, FplsError> {
        check_domain(domain)?;
        if n_basis == 0 {
            return Err(FplsError::Configuration(
                "Fourier basis needs at least one function".to_string(),
            ));
        }
        if !(period.is_finite() && period > 0.0) {
            return Err(FplsError::Configuration(format!(
                "Fourier period must be positive, got {period}"
            )));
        }
        Ok(Basis::Fourier {
            domain,
            n_basis,
            period,
        })
    }

    /// Monomial basis `1, t, …, t^(n_basis-1)`.
    pub fn monomial(domain: (f64, f64), n_basis: usize) -> Result<Self, FplsError> {
        check_domain(domain)?;
        if n_basis == 0 {
            return Err(FplsError::Configuration(
                "monomial basis needs at least one function".to_string(),
            ));
        }
        Ok(Basis::Monomial { domain, n_basis })
    }

    /// Re-run the constructor checks on a basis that may have been built
    /// from its variant fields directly.
    pub fn validate(&self) -> Result<(), FplsError> {
        match *self {
            Basis::BSpline {
                domain,
                n_basis,
                order,
            } => Self::bspline(domain, n_basis, order).map(|_| ()),
            Basis::Fourier {
                domain,
                n_basis,
                period,
            } => Self::fourier_with_period(domain, n_basis, period).map(|_| ()),
            Basis::Monomial { domain, n_basis } => Self::monomial(domain, n_basis).map(|_| ()),
        }
    }

    /// Number of functions in the basis.
    pub fn n_basis(&self) -> usize {
        match *self {
            Basis::BSpline { n_basis, .. }
            | Basis::Fourier { n_basis, .. }
            | Basis::Monomial { n_basis, .. } => n_basis,
        }
    }

    /// Interval the basis is defined on.
    pub fn domain(&self) -> (f64, f64) {
        match *self {
            Basis::BSpline { domain, .. }
            | Basis::Fourier { domain, .. }
            | Basis::Monomial { domain, .. } => domain,
        }
    }

    /// Evaluate every basis function at every point of `t`.
    ///
    /// Returns a `t.len() x n_basis` matrix.
    pub fn evaluate(&self, t: &[f64]) -> DMatrix<f64> {
        self.evaluate_derivative(t, 0)
    }

    /// Evaluate the `deriv`-th derivative of every basis function on `t`.
    pub fn evaluate_derivative(&self, t: &[f64], deriv: usize) -> DMatrix<f64> {
        let nbasis = self.n_basis();
        let rows: Vec<Vec<f64>> = match self {
            Basis::BSpline {
                domain,
                n_basis,
                order,
            } => {
                let knots = bspline_knots(*domain, *n_basis, *order);
                iter_maybe_parallel!(0..t.len())
                    .map(|i| bspline_derivative(&knots, *order, t[i], deriv, *n_basis))
                    .collect()
            }
            Basis::Fourier {
                domain, period, ..
            } => iter_maybe_parallel!(0..t.len())
                .map(|i| fourier_row(t[i] - domain.0, nbasis, *period, deriv))
                .collect(),
            Basis::Monomial { .. } => iter_maybe_parallel!(0..t.len())
                .map(|i| monomial_row(t[i], nbasis, deriv))
                .collect(),
        };

        DMatrix::from_fn(t.len(), nbasis, |i, j| rows[i][j])
    }

    /// Gram matrix `G_ij = ∫ φ_i φ_j`.
    pub fn gram_matrix(&self) -> DMatrix<f64> {
        self.derivative_gram_matrix(0)
    }

    /// Gram matrix of the `deriv`-th derivatives, `∫ Dʳφ_i Dʳφ_j`.
    pub fn derivative_gram_matrix(&self, deriv: usize) -> DMatrix<f64> {
        let (grid, weights) = quadrature_rule(self.domain());
        let values = self.evaluate_derivative(&grid, deriv);
        let gram = weighted_cross_product(&values, &values, &weights);
        (&gram + gram.transpose()) * 0.5
    }

    /// Cross inner-product matrix `M_ij = ∫ φ_i ψ_j` with `ψ` from `other`.
    ///
    /// Both bases must share the same domain.
    pub fn inner_product_matrix(&self, other: &Basis) -> Result<DMatrix<f64>, FplsError> {
        let (a1, b1) = self.domain();
        let (a2, b2) = other.domain();
        let scale = (b1 - a1).abs().max(1.0);
        if (a1 - a2).abs() > NUMERICAL_EPS * scale || (b1 - b2).abs() > NUMERICAL_EPS * scale {
            return Err(FplsError::Configuration(format!(
                "basis domains differ: ({a1}, {b1}) vs ({a2}, {b2})"
            )));
        }
        if self == other {
            return Ok(self.gram_matrix());
        }
        let (grid, weights) = quadrature_rule(self.domain());
        Ok(weighted_cross_product(
            &self.evaluate(&grid),
            &other.evaluate(&grid),
            &weights,
        ))
    }
}

/// Fine Simpson quadrature grid over `domain`.
fn quadrature_rule(domain: (f64, f64)) -> (Vec<f64>, Vec<f64>) {
    let grid = linspace(domain.0, domain.1, QUADRATURE_POINTS);
    let weights = simpsons_weights(&grid);
    (grid, weights)
}

/// `Aᵗ diag(w) B` for evaluation matrices sharing the same grid rows.
fn weighted_cross_product(a: &DMatrix<f64>, b: &DMatrix<f64>, weights: &[f64]) -> DMatrix<f64> {
    let mut wb = b.clone();
    for (i, &w) in weights.iter().enumerate() {
        wb.row_mut(i).scale_mut(w);
    }
    a.transpose() * wb
}

/// Knot vector for a uniform B-spline basis: `n_basis + order` knots, the
/// domain split into `n_basis - order + 1` equal intervals and the spacing
/// continued `order - 1` knots past each end.
pub fn bspline_knots(domain: (f64, f64), n_basis: usize, order: usize) -> Vec<f64> {
    let (a, b) = domain;
    let intervals = n_basis + 1 - order;
    let dt = (b - a) / intervals as f64;
    (0..n_basis + order)
        .map(|i| a + (i as f64 - (order - 1) as f64) * dt)
        .collect()
}

/// Cox-de Boor evaluation of all B-splines of `order` at `t`.
///
/// Intervals are half-open except the last one inside the domain
/// (index `n_basis - 1`), which is closed so the right endpoint is covered.
fn bspline_values(knots: &[f64], order: usize, t: f64, n_basis: usize) -> Vec<f64> {
    let last_interval = n_basis - 1;
    let mut b = vec![0.0; knots.len() - 1];
    for j in 0..(knots.len() - 1) {
        let in_interval = if j == last_interval {
            t >= knots[j] && t <= knots[j + 1]
        } else {
            t >= knots[j] && t < knots[j + 1]
        };
        if in_interval {
            b[j] = 1.0;
            break;
        }
    }

    for k in 2..=order {
        let mut b_new = vec![0.0; knots.len() - k];
        for j in 0..(knots.len() - k) {
            let d1 = knots[j + k - 1] - knots[j];
            let d2 = knots[j + k] - knots[j + 1];

            let left = if d1.abs() > NUMERICAL_EPS {
                (t - knots[j]) / d1 * b[j]
            } else {
                0.0
            };
            let right = if d2.abs() > NUMERICAL_EPS {
                (knots[j + k] - t) / d2 * b[j + 1]
            } else {
                0.0
            };
            b_new[j] = left + right;
        }
        b = b_new;
    }
    b
}

/// `deriv`-th derivative of all B-splines of `order` at `t`, by the
/// standard recursion on lower-order splines over the same knots.
fn bspline_derivative(knots: &[f64], order: usize, t: f64, deriv: usize, n_basis: usize) -> Vec<f64> {
    let count = knots.len() - order;
    if deriv == 0 {
        return bspline_values(knots, order, t, n_basis);
    }
    if order == 1 {
        return vec![0.0; count];
    }

    let lower = bspline_derivative(knots, order - 1, t, deriv - 1, n_basis);
    let k = order as f64 - 1.0;
    (0..count)
        .map(|j| {
            let d1 = knots[j + order - 1] - knots[j];
            let d2 = knots[j + order] - knots[j + 1];
            let left = if d1.abs() > NUMERICAL_EPS { lower[j] / d1 } else { 0.0 };
            let right = if d2.abs() > NUMERICAL_EPS {
                lower[j + 1] / d2
            } else {
                0.0
            };
            k * (left - right)
        })
        .collect()
}

/// Fourier functions (or their derivatives) at offset `x` from the domain start.
fn fourier_row(x: f64, nbasis: usize, period: f64, deriv: usize) -> Vec<f64> {
    let mut row = vec![0.0; nbasis];
    row[0] = if deriv == 0 { 1.0 } else { 0.0 };

    // d^r/dx^r sin(ωx) = ω^r sin(ωx + rπ/2), likewise for cos
    let shift = deriv as f64 * PI / 2.0;
    let mut k = 1;
    let mut freq = 1;
    while k < nbasis {
        let omega = 2.0 * PI * freq as f64 / period;
        let scale = omega.powi(deriv as i32);
        row[k] = scale * (omega * x + shift).sin();
        k += 1;
        if k < nbasis {
            row[k] = scale * (omega * x + shift).cos();
            k += 1;
        }
        freq += 1;
    }
    row
}

fn monomial_row(t: f64, nbasis: usize, deriv: usize) -> Vec<f64> {
    (0..nbasis)
        .map(|p| {
            if p < deriv {
                return 0.0;
            }
            let falling: f64 = ((p - deriv + 1)..=p).map(|f| f as f64).product();
            falling * t.powi((p - deriv) as i32)
        })
        .collect()
}

/// Finite-difference operator of the given order for P-spline penalties.
///
/// Returns an `(n - order) x n` matrix; order 0 is the identity.
pub fn difference_matrix(n: usize, order: usize) -> DMatrix<f64> {
    if order == 0 {
        return DMatrix::identity(n, n);
    }
    if n <= order {
        return DMatrix::zeros(0, n);
    }

    let mut result = DMatrix::identity(n, n);
    for _ in 0..order {
        let rows = result.nrows() - 1;
        let cols = result.ncols();
        let mut d_next = DMatrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                d_next[(i, j)] = result[(i + 1, j)] - result[(i, j)];
            }
        }
        result = d_next;
    }
    result
}
