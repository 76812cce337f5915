//! Data representations accepted by FPLS blocks.
//!
//! A block is either a plain multivariate matrix, functions sampled on a
//! shared grid ([`FdataGrid`]), or functions expanded in a [`Basis`]
//! ([`FdataBasis`]). [`BlockData`] is the tagged union over the three.

use crate::basis::Basis;
use crate::error::FplsError;
use crate::helpers::{is_strictly_increasing, NUMERICAL_EPS};
use crate::matrix::FdMatrix;
use std::fmt;

/// Functional data sampled on a common grid.
///
/// Row `i` of the data matrix holds sample `i` at every grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct FdataGrid {
    data: FdMatrix,
    grid_points: Vec<f64>,
}

impl FdataGrid {
    /// Build from an `n x m` matrix and `m` strictly increasing grid points.
    pub fn new(data: FdMatrix, grid_points: Vec<f64>) -> Result<Self, FplsError> {
        if data.ncols() != grid_points.len() {
            return Err(FplsError::DimensionMismatch {
                what: "grid points",
                expected: data.ncols(),
                found: grid_points.len(),
            });
        }
        if !is_strictly_increasing(&grid_points) {
            return Err(FplsError::Configuration(
                "grid points must be finite and strictly increasing".to_string(),
            ));
        }
        Ok(Self { data, grid_points })
    }

    /// Sample values, `n_samples x n_points`.
    pub fn data_matrix(&self) -> &FdMatrix {
        &self.data
    }

    pub fn grid_points(&self) -> &[f64] {
        &self.grid_points
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_points(&self) -> usize {
        self.grid_points.len()
    }

    /// Pointwise mean function as a single-sample object.
    pub fn mean(&self) -> FdataGrid {
        let means = self.data.column_means();
        Self {
            data: FdMatrix::from_column_major(means, 1, self.n_points())
                .unwrap_or_else(|| FdMatrix::zeros(1, self.n_points())),
            grid_points: self.grid_points.clone(),
        }
    }

    /// Whether `other` lies on the same grid (up to rounding).
    pub fn same_grid(&self, other: &[f64]) -> bool {
        self.grid_points.len() == other.len()
            && self
                .grid_points
                .iter()
                .zip(other)
                .all(|(a, b)| (a - b).abs() <= NUMERICAL_EPS * a.abs().max(1.0))
    }
}

/// Functional data expanded in a basis: row `i` of the coefficient
/// matrix holds the coefficients of sample `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct FdataBasis {
    coefficients: FdMatrix,
    basis: Basis,
}

impl FdataBasis {
    /// Build from an `n x n_basis` coefficient matrix.
    pub fn new(coefficients: FdMatrix, basis: Basis) -> Result<Self, FplsError> {
        basis.validate()?;
        if coefficients.ncols() != basis.n_basis() {
            return Err(FplsError::DimensionMismatch {
                what: "basis coefficients",
                expected: basis.n_basis(),
                found: coefficients.ncols(),
            });
        }
        Ok(Self {
            coefficients,
            basis,
        })
    }

    pub fn coefficients(&self) -> &FdMatrix {
        &self.coefficients
    }

    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    pub fn n_samples(&self) -> usize {
        self.coefficients.nrows()
    }

    /// Mean function; in a fixed basis this is the mean coefficient vector.
    pub fn mean(&self) -> FdataBasis {
        let means = self.coefficients.column_means();
        Self {
            coefficients: FdMatrix::from_column_major(means, 1, self.basis.n_basis())
                .unwrap_or_else(|| FdMatrix::zeros(1, self.basis.n_basis())),
            basis: self.basis.clone(),
        }
    }

    /// Evaluate every sample on `grid_points`.
    pub fn to_grid(&self, grid_points: &[f64]) -> Result<FdataGrid, FplsError> {
        let phi = self.basis.evaluate(grid_points);
        let values = self.coefficients.to_dmatrix() * phi.transpose();
        FdataGrid::new(FdMatrix::from(values), grid_points.to_vec())
    }
}

/// Representation kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Multivariate,
    Grid,
    Basis,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockKind::Multivariate => "multivariate",
            BlockKind::Grid => "grid",
            BlockKind::Basis => "basis",
        };
        f.write_str(name)
    }
}

/// Data for one FPLS block (X or Y).
#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    /// `n_samples x n_features` matrix.
    Multivariate(FdMatrix),
    Grid(FdataGrid),
    Basis(FdataBasis),
}

impl BlockData {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockData::Multivariate(_) => BlockKind::Multivariate,
            BlockData::Grid(_) => BlockKind::Grid,
            BlockData::Basis(_) => BlockKind::Basis,
        }
    }

    pub fn n_samples(&self) -> usize {
        match self {
            BlockData::Multivariate(m) => m.nrows(),
            BlockData::Grid(g) => g.n_samples(),
            BlockData::Basis(b) => b.n_samples(),
        }
    }

    /// The numeric matrix the block operates on: raw features, grid
    /// values or basis coefficients.
    pub fn values(&self) -> &FdMatrix {
        match self {
            BlockData::Multivariate(m) => m,
            BlockData::Grid(g) => g.data_matrix(),
            BlockData::Basis(b) => b.coefficients(),
        }
    }

    pub fn as_multivariate(&self) -> Option<&FdMatrix> {
        match self {
            BlockData::Multivariate(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_grid(&self) -> Option<&FdataGrid> {
        match self {
            BlockData::Grid(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_basis(&self) -> Option<&FdataBasis> {
        match self {
            BlockData::Basis(b) => Some(b),
            _ => None,
        }
    }
}

impl From<FdMatrix> for BlockData {
    fn from(m: FdMatrix) -> Self {
        BlockData::Multivariate(m)
    }
}

/// A 1-D vector is one feature observed on every sample.
impl From<Vec<f64>> for BlockData {
    fn from(v: Vec<f64>) -> Self {
        BlockData::Multivariate(FdMatrix::from_column(v))
    }
}

impl From<FdataGrid> for BlockData {
    fn from(g: FdataGrid) -> Self {
        BlockData::Grid(g)
    }
}

impl From<FdataBasis> for BlockData {
    fn from(b: FdataBasis) -> Self {
        BlockData::Basis(b)
    }
}
