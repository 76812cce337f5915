//! NIPALS component extraction over two blocks.
//!
//! Each step solves for a pair of weight functions `(w, c)` that maximise
//! the covariance between the blocks in their own inner products, computes
//! scores and loadings, and deflates both working matrices by the rank-one
//! part just explained.

use crate::block::Block;
use crate::eigen::dominant_eigenvector;
use crate::error::FplsError;
use crate::helpers::INV_EPS;
use crate::linalg::{center_columns, gram_norm};
use log::trace;
use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::str::FromStr;

/// How the Y block is deflated after each component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeflationMode {
    /// Deflate Y by its own scores `u` (symmetric, dimension reduction).
    #[default]
    Canonical,
    /// Deflate Y by the X scores `t` (X predicts Y).
    Regression,
}

impl FromStr for DeflationMode {
    type Err = FplsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "canonical" | "can" => Ok(DeflationMode::Canonical),
            "regression" | "reg" => Ok(DeflationMode::Regression),
            other => Err(FplsError::Configuration(format!(
                "unknown deflation mode '{other}', expected 'canonical' or 'regression'"
            ))),
        }
    }
}

impl fmt::Display for DeflationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeflationMode::Canonical => f.write_str("canonical"),
            DeflationMode::Regression => f.write_str("regression"),
        }
    }
}

/// Inner-product structure of one block as seen by the weight solver.
#[derive(Debug, Clone, Copy)]
pub struct BlockGeometry<'a> {
    /// Gram matrix of the weight space.
    pub g_weights: &'a DMatrix<f64>,
    /// Data/weights inner products.
    pub g_data_weights: &'a DMatrix<f64>,
    /// Inverse lower Cholesky factor of the penalty matrix.
    pub l_inv: &'a DMatrix<f64>,
}

/// Weight vectors for one component.
#[derive(Debug, Clone)]
pub struct WeightPair {
    pub w: DVector<f64>,
    pub c: DVector<f64>,
}

/// Solve for the X and Y weights of the next component.
///
/// Both data matrices are whitened (`X G_xw L⁻ᵗ`), the dominant left
/// singular direction of the whitened cross-covariance is found with the
/// power method, and the results are mapped back and normalised so that
/// `wᵗ G_ww w = 1` and `cᵗ G_cc c = 1`.
pub fn solve_weights(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    x_geom: &BlockGeometry<'_>,
    y_geom: &BlockGeometry<'_>,
    tol: f64,
    max_iter: usize,
) -> WeightPair {
    let x_white = x * x_geom.g_data_weights * x_geom.l_inv.transpose();
    let y_white = y * y_geom.g_data_weights * y_geom.l_inv.transpose();

    let s = x_white.transpose() * &y_white;
    let w_white = dominant_eigenvector(&(&s * s.transpose()), tol, max_iter);
    let c_white = y_white.transpose() * (&x_white * &w_white);

    let w = normalize_in_gram(x_geom.l_inv.transpose() * w_white, x_geom.g_weights);
    let c = normalize_in_gram(y_geom.l_inv.transpose() * c_white, y_geom.g_weights);
    WeightPair { w, c }
}

fn normalize_in_gram(v: DVector<f64>, gram: &DMatrix<f64>) -> DVector<f64> {
    let norm = gram_norm(&v, gram);
    v / (norm + INV_EPS)
}

/// Options for [`run_nipals`].
#[derive(Debug, Clone, Copy)]
pub struct NipalsOptions {
    pub n_components: usize,
    pub tol: f64,
    pub max_iter: usize,
    pub deflation_mode: DeflationMode,
}

/// Matrices produced by NIPALS; column `k` belongs to component `k`.
#[derive(Debug, Clone)]
pub struct NipalsResult {
    /// `n_weights_x x k`
    pub x_weights: DMatrix<f64>,
    /// `n_weights_y x k`
    pub y_weights: DMatrix<f64>,
    /// `n_samples x k`
    pub x_scores: DMatrix<f64>,
    /// `n_samples x k`
    pub y_scores: DMatrix<f64>,
    /// `n_features_x x k`
    pub x_loadings: DMatrix<f64>,
    /// `n_features_y x k`
    pub y_loadings: DMatrix<f64>,
}

/// Extract `n_components` components from a pair of blocks.
///
/// Always runs exactly `n_components` steps. Requesting more components
/// than the data supports gives numerically degenerate trailing components
/// rather than an error.
pub fn run_nipals(
    x_block: &Block,
    y_block: &Block,
    options: &NipalsOptions,
) -> Result<NipalsResult, FplsError> {
    let n = x_block.n_samples();
    if y_block.n_samples() != n {
        return Err(FplsError::SampleCountMismatch {
            x_samples: n,
            y_samples: y_block.n_samples(),
        });
    }

    let mut x = center_columns(x_block.data_matrix());
    let mut y = center_columns(y_block.data_matrix());

    let l_x_inv = x_block.cholesky_inv_penalty_matrix()?;
    let l_y_inv = y_block.cholesky_inv_penalty_matrix()?;
    let x_geom = BlockGeometry {
        g_weights: x_block.g_weights(),
        g_data_weights: x_block.g_data_weights(),
        l_inv: &l_x_inv,
    };
    let y_geom = BlockGeometry {
        g_weights: y_block.g_weights(),
        g_data_weights: y_block.g_data_weights(),
        l_inv: &l_y_inv,
    };

    let k = options.n_components;
    let mut result = NipalsResult {
        x_weights: DMatrix::zeros(x_block.n_weights(), k),
        y_weights: DMatrix::zeros(y_block.n_weights(), k),
        x_scores: DMatrix::zeros(n, k),
        y_scores: DMatrix::zeros(n, k),
        x_loadings: DMatrix::zeros(x_block.n_features(), k),
        y_loadings: DMatrix::zeros(y_block.n_features(), k),
    };

    for comp in 0..k {
        let WeightPair { w, c } =
            solve_weights(&x, &y, &x_geom, &y_geom, options.tol, options.max_iter);

        let t = &x * (x_geom.g_data_weights * &w);
        let u = &y * (y_geom.g_data_weights * &c);

        let t_ss = t.dot(&t);
        let p = x.transpose() * &t / (t_ss + INV_EPS);

        let y_projection = match options.deflation_mode {
            DeflationMode::Regression => &t,
            DeflationMode::Canonical => &u,
        };
        let q = y.transpose() * y_projection / (y_projection.dot(y_projection) + INV_EPS);

        x -= &t * p.transpose();
        y -= y_projection * q.transpose();

        trace!(
            "component {}: |t|^2={:.6e}, |u|^2={:.6e}, residual |X|={:.6e}, |Y|={:.6e}",
            comp,
            t_ss,
            u.dot(&u),
            x.norm(),
            y.norm()
        );

        result.x_weights.set_column(comp, &w);
        result.y_weights.set_column(comp, &c);
        result.x_scores.set_column(comp, &t);
        result.y_scores.set_column(comp, &u);
        result.x_loadings.set_column(comp, &p);
        result.y_loadings.set_column(comp, &q);
    }

    Ok(result)
}
