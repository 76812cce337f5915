//! Dense linear-algebra primitives used by the FPLS solver.
//!
//! Thin wrappers over nalgebra's Cholesky and SVD that report failures as
//! [`FplsError`] instead of `Option`.

use crate::error::FplsError;
use nalgebra::{Cholesky, DMatrix, DVector, SVD};

/// Relative cutoff for singular values in [`pseudo_inverse`].
pub const PINV_RCOND: f64 = 1e-15;

/// Inverse of the lower Cholesky factor `L` of `penalty = L Lᵗ`.
///
/// `block` names the block in the error when `penalty` is not positive
/// definite.
pub fn cholesky_inv_lower(penalty: &DMatrix<f64>, block: &str) -> Result<DMatrix<f64>, FplsError> {
    if !penalty.is_square() {
        return Err(FplsError::DimensionMismatch {
            what: "penalty matrix columns",
            expected: penalty.nrows(),
            found: penalty.ncols(),
        });
    }
    if penalty.iter().any(|v| !v.is_finite()) {
        return Err(FplsError::Numerical(format!(
            "penalty matrix of block {block} contains non-finite values"
        )));
    }

    let n = penalty.nrows();
    let chol = Cholesky::new(penalty.clone()).ok_or_else(|| FplsError::NotPositiveDefinite {
        block: block.to_string(),
    })?;

    chol.l()
        .solve_lower_triangular(&DMatrix::identity(n, n))
        .ok_or_else(|| FplsError::NotPositiveDefinite {
            block: block.to_string(),
        })
}

/// Moore-Penrose pseudo-inverse via SVD.
///
/// Singular values below `PINV_RCOND * max_sv` are treated as zero.
pub fn pseudo_inverse(mat: &DMatrix<f64>) -> Result<DMatrix<f64>, FplsError> {
    let (m, n) = mat.shape();
    if m == 0 || n == 0 {
        return Ok(DMatrix::zeros(n, m));
    }

    let svd = SVD::new(mat.clone(), true, true);
    let max_sv = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    let eps = PINV_RCOND * max_sv;

    let u = svd
        .u
        .as_ref()
        .ok_or_else(|| FplsError::Numerical("SVD did not produce U".to_string()))?;
    let v_t = svd
        .v_t
        .as_ref()
        .ok_or_else(|| FplsError::Numerical("SVD did not produce V^T".to_string()))?;

    let s_inv = DVector::from_iterator(
        svd.singular_values.len(),
        svd.singular_values
            .iter()
            .map(|&s| if s > eps { 1.0 / s } else { 0.0 }),
    );

    Ok(v_t.transpose() * DMatrix::from_diagonal(&s_inv) * u.transpose())
}

/// Norm of `v` induced by the Gram matrix `g`: `sqrt(vᵗ G v)`.
pub fn gram_norm(v: &DVector<f64>, g: &DMatrix<f64>) -> f64 {
    v.dot(&(g * v)).max(0.0).sqrt()
}

/// Subtract the column means from every column of `mat`.
pub fn center_columns(mat: &DMatrix<f64>) -> DMatrix<f64> {
    let n = mat.nrows();
    if n == 0 {
        return mat.clone();
    }
    let mut out = mat.clone();
    for mut col in out.column_iter_mut() {
        let mean = col.sum() / n as f64;
        col.add_scalar_mut(-mean);
    }
    out
}
