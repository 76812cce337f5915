//! Column-major matrix type for functional data and FPLS results.
//!
//! [`FdMatrix`] carries its dimensions alongside a flat column-major buffer.
//! Rows are samples; columns are features, grid points or basis coefficients
//! depending on the block representation. Result matrices (weights, scores,
//! loadings, rotations) use the same type with components as columns.

use crate::iter_maybe_parallel;
use nalgebra::DMatrix;
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;

/// Column-major matrix: element `(row, col)` is at index `row + col * nrows`.
///
/// # Examples
///
/// ```
/// use fdars_fpls::matrix::FdMatrix;
///
/// let mat = FdMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
/// assert_eq!(mat.shape(), (3, 2));
/// assert_eq!(mat[(1, 0)], 3.0);
/// assert_eq!(mat.column(1), &[2.0, 4.0, 6.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FdMatrix {
    data: Vec<f64>,
    nrows: usize,
    ncols: usize,
}

impl FdMatrix {
    /// Create from flat column-major data.
    ///
    /// Returns `None` if `data.len() != nrows * ncols`.
    pub fn from_column_major(data: Vec<f64>, nrows: usize, ncols: usize) -> Option<Self> {
        if data.len() != nrows * ncols {
            return None;
        }
        Some(Self { data, nrows, ncols })
    }

    /// Create from a slice of equally long rows.
    ///
    /// Returns `None` if the rows are ragged.
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != ncols) {
            return None;
        }
        let mut mat = Self::zeros(nrows, ncols);
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                mat[(i, j)] = v;
            }
        }
        Some(mat)
    }

    /// Promote a vector of observations to an `n x 1` matrix.
    pub fn from_column(values: Vec<f64>) -> Self {
        let nrows = values.len();
        Self {
            data: values,
            nrows,
            ncols: 1,
        }
    }

    /// Create a zero-filled matrix.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            data: vec![0.0; nrows * ncols],
            nrows,
            ncols,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Dimensions as `(nrows, ncols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Whether the matrix holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Contiguous column slice.
    ///
    /// # Panics
    /// Panics if `col >= ncols`.
    #[inline]
    pub fn column(&self, col: usize) -> &[f64] {
        let start = col * self.nrows;
        &self.data[start..start + self.nrows]
    }

    /// Copy of a single row. Rows are strided in column-major layout.
    pub fn row(&self, row: usize) -> Vec<f64> {
        (0..self.ncols)
            .map(|j| self.data[row + j * self.nrows])
            .collect()
    }

    /// Flat column-major view.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Per-column averages.
    pub fn column_means(&self) -> Vec<f64> {
        let n = self.nrows;
        if n == 0 {
            return vec![0.0; self.ncols];
        }
        iter_maybe_parallel!(0..self.ncols)
            .map(|j| self.column(j).iter().sum::<f64>() / n as f64)
            .collect()
    }

    /// Subtract `values[j]` from every entry of column `j`.
    pub fn sub_row_vector(&self, values: &[f64]) -> Self {
        debug_assert_eq!(values.len(), self.ncols);
        let mut out = self.clone();
        for (j, &v) in values.iter().enumerate() {
            let start = j * self.nrows;
            for x in &mut out.data[start..start + self.nrows] {
                *x -= v;
            }
        }
        out
    }

    /// Add `values[j]` to every entry of column `j`.
    pub fn add_row_vector(&self, values: &[f64]) -> Self {
        let negated: Vec<f64> = values.iter().map(|v| -v).collect();
        self.sub_row_vector(&negated)
    }

    /// Maximum absolute elementwise difference, or `None` on shape mismatch.
    pub fn max_abs_diff(&self, other: &FdMatrix) -> Option<f64> {
        if self.shape() != other.shape() {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max),
        )
    }

    /// Copy into a nalgebra `DMatrix<f64>` (same column-major layout).
    pub fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_column_slice(self.nrows, self.ncols, &self.data)
    }

    /// Create from a nalgebra `DMatrix<f64>`.
    pub fn from_dmatrix(mat: &DMatrix<f64>) -> Self {
        let (nrows, ncols) = mat.shape();
        Self {
            data: mat.as_slice().to_vec(),
            nrows,
            ncols,
        }
    }

    /// Element at `(row, col)` with bounds checking.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.nrows && col < self.ncols {
            Some(self.data[row + col * self.nrows])
        } else {
            None
        }
    }
}

impl std::ops::Index<(usize, usize)> for FdMatrix {
    type Output = f64;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        debug_assert!(
            row < self.nrows && col < self.ncols,
            "FdMatrix index ({}, {}) out of bounds for {}x{} matrix",
            row,
            col,
            self.nrows,
            self.ncols
        );
        &self.data[row + col * self.nrows]
    }
}

impl std::ops::IndexMut<(usize, usize)> for FdMatrix {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        debug_assert!(
            row < self.nrows && col < self.ncols,
            "FdMatrix index ({}, {}) out of bounds for {}x{} matrix",
            row,
            col,
            self.nrows,
            self.ncols
        );
        &mut self.data[row + col * self.nrows]
    }
}

impl From<DMatrix<f64>> for FdMatrix {
    fn from(mat: DMatrix<f64>) -> Self {
        Self::from_dmatrix(&mat)
    }
}

impl std::fmt::Display for FdMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FdMatrix({}x{})", self.nrows, self.ncols)
    }
}
