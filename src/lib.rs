//! # fdars-fpls
//!
//! Functional Partial Least Squares (FPLS) in Rust.
//!
//! This crate extracts paired latent components from two data blocks, X and
//! Y, by NIPALS deflation. Each block may be:
//! - Multivariate: an `n x p` numeric matrix (or a single column)
//! - Grid: functions sampled on a shared grid, integrated with quadrature weights
//! - Basis: functions expanded in a B-spline, Fourier or monomial basis
//!
//! Inner products of each representation enter through Gram matrices, and
//! optional roughness penalties are folded in through Cholesky whitening, so
//! the same engine handles all three kinds.
//!
//! ## Data Layout
//!
//! Data matrices are column-major [`FdMatrix`] values with one row per
//! sample: `data[(i, j)]` is sample `i` at feature, grid point or basis
//! coefficient `j`. Fitted weights, rotations and loadings have one column
//! per component.

#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod parallel;

pub mod basis;
pub mod block;
pub mod eigen;
pub mod error;
pub mod fdata;
pub mod fpls;
pub mod helpers;
pub mod linalg;
pub mod matrix;
pub mod nipals;
pub mod regularization;

// Re-export commonly used items
pub use helpers::{
    simpsons_weights, DEFAULT_CONVERGENCE_TOL, DEFAULT_MAX_ITER, DEFAULT_N_COMPONENTS, INV_EPS,
    NUMERICAL_EPS,
};

pub use basis::Basis;
pub use block::{Block, BlockConfig};
pub use error::FplsError;
pub use fdata::{BlockData, BlockKind, FdataBasis, FdataGrid};
pub use fpls::{Fpls, FplsBuilder, FplsConfig};
pub use matrix::FdMatrix;
pub use nipals::DeflationMode;
pub use regularization::{DifferencePenalty, L2Regularization, PenaltyDomain, Regularization};
