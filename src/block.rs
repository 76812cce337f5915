//! Block adapter: one FPLS block (X or Y) reduced to plain matrices.
//!
//! Whatever the representation of the input (multivariate, grid or basis),
//! a [`Block`] exposes the same numeric contract to the NIPALS engine:
//!
//! - `data_matrix`: centered `n_samples x n_features` values
//! - `G_weights`: Gram matrix of the weight space
//! - `G_data_weights`: inner products between data and weight spaces
//! - `regularization_matrix`: roughness penalty on the weight space
//!
//! After fitting, the block also carries its rotations and loadings and can
//! project new data of the same kind or reconstruct data from components.

use crate::basis::Basis;
use crate::error::FplsError;
use crate::fdata::{BlockData, BlockKind, FdataBasis, FdataGrid};
use crate::helpers::simpsons_weights;
use crate::linalg::{center_columns, cholesky_inv_lower};
use crate::matrix::FdMatrix;
use crate::regularization::{PenaltyDomain, Regularization};
use log::debug;
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

/// Per-block options.
///
/// Which options apply depends on the representation of the block data:
///
/// | option                | multivariate | grid | basis |
/// |-----------------------|--------------|------|-------|
/// | `integration_weights` | no           | yes  | no    |
/// | `regularization`      | no           | yes  | yes   |
/// | `weights_basis`       | no           | no   | yes   |
///
/// Supplying an option to a block that does not accept it is a
/// configuration error.
#[derive(Debug, Clone, Default)]
pub struct BlockConfig {
    /// Quadrature weights for grid data; Simpson's rule when absent.
    pub integration_weights: Option<Vec<f64>>,
    /// Penalty on the roughness of the weight functions.
    pub regularization: Option<Arc<dyn Regularization>>,
    /// Basis for the weight functions of basis data; the data basis when absent.
    pub weights_basis: Option<Basis>,
}

/// Representation-specific layout of a block.
#[derive(Debug, Clone)]
enum Layout {
    Multivariate,
    Grid { grid_points: Vec<f64> },
    Basis { basis: Basis, weights_basis: Basis },
}

/// Rotations and loadings attached once NIPALS has finished.
#[derive(Debug, Clone)]
struct Projection {
    rotations: DMatrix<f64>,
    loadings: DMatrix<f64>,
}

/// One block of an FPLS model.
#[derive(Debug, Clone)]
pub struct Block {
    label: String,
    n_components: usize,
    layout: Layout,
    mean: Vec<f64>,
    data_matrix: DMatrix<f64>,
    g_weights: DMatrix<f64>,
    g_data_weights: DMatrix<f64>,
    regularization_matrix: DMatrix<f64>,
    projection: Option<Projection>,
}

fn reject_option(present: bool, option: &str, kind: BlockKind) -> Result<(), FplsError> {
    if present {
        return Err(FplsError::Configuration(format!(
            "{option} is not supported for {kind} blocks"
        )));
    }
    Ok(())
}

impl Block {
    /// Build a block from training data.
    ///
    /// The data is centered once here. The number of components is recorded
    /// for naming and shape checks; the block does not run NIPALS itself.
    pub fn new(
        data: &BlockData,
        n_components: usize,
        label: &str,
        config: &BlockConfig,
    ) -> Result<Self, FplsError> {
        let values = data.values();
        if values.nrows() == 0 || values.ncols() == 0 {
            return Err(FplsError::Configuration(format!(
                "block {label} is empty ({} samples, {} features)",
                values.nrows(),
                values.ncols()
            )));
        }
        if values.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(FplsError::Configuration(format!(
                "block {label} contains non-finite values"
            )));
        }

        let mean = values.column_means();
        let data_matrix = center_columns(&values.to_dmatrix());
        let kind = data.kind();

        let (layout, g_weights, g_data_weights, regularization_matrix) = match data {
            BlockData::Multivariate(m) => {
                reject_option(config.integration_weights.is_some(), "integration_weights", kind)?;
                reject_option(config.regularization.is_some(), "regularization", kind)?;
                reject_option(config.weights_basis.is_some(), "weights_basis", kind)?;
                let p = m.ncols();
                (
                    Layout::Multivariate,
                    DMatrix::identity(p, p),
                    DMatrix::identity(p, p),
                    DMatrix::zeros(p, p),
                )
            }
            BlockData::Grid(fd) => {
                reject_option(config.weights_basis.is_some(), "weights_basis", kind)?;
                let grid_points = fd.grid_points().to_vec();
                let m = grid_points.len();
                let weights = match &config.integration_weights {
                    Some(w) => {
                        if w.len() != m {
                            return Err(FplsError::DimensionMismatch {
                                what: "integration weights",
                                expected: m,
                                found: w.len(),
                            });
                        }
                        if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
                            return Err(FplsError::Configuration(
                                "integration weights must be finite and non-negative".to_string(),
                            ));
                        }
                        w.clone()
                    }
                    None => simpsons_weights(&grid_points),
                };
                let integration = DMatrix::from_diagonal(&DVector::from_vec(weights));
                let regularization_matrix = match &config.regularization {
                    Some(reg) => reg.penalty_matrix(PenaltyDomain::Grid(&grid_points))?,
                    None => DMatrix::zeros(m, m),
                };
                (
                    Layout::Grid { grid_points },
                    integration.clone(),
                    integration,
                    regularization_matrix,
                )
            }
            BlockData::Basis(fd) => {
                reject_option(config.integration_weights.is_some(), "integration_weights", kind)?;
                let basis = fd.basis().clone();
                let weights_basis = config.weights_basis.clone().unwrap_or_else(|| basis.clone());
                weights_basis.validate()?;
                let g_data_weights = basis.inner_product_matrix(&weights_basis)?;
                let g_weights = weights_basis.gram_matrix();
                let q = weights_basis.n_basis();
                let regularization_matrix = match &config.regularization {
                    Some(reg) => reg.penalty_matrix(PenaltyDomain::Basis(&weights_basis))?,
                    None => DMatrix::zeros(q, q),
                };
                (
                    Layout::Basis {
                        basis,
                        weights_basis,
                    },
                    g_weights,
                    g_data_weights,
                    regularization_matrix,
                )
            }
        };

        if regularization_matrix.shape() != g_weights.shape() {
            return Err(FplsError::DimensionMismatch {
                what: "regularization matrix",
                expected: g_weights.nrows(),
                found: regularization_matrix.nrows(),
            });
        }

        debug!(
            "block {label}: {kind} data, {} samples, {} features, {} weight coordinates",
            data_matrix.nrows(),
            data_matrix.ncols(),
            g_weights.nrows()
        );

        Ok(Self {
            label: label.to_string(),
            n_components,
            layout,
            mean,
            data_matrix,
            g_weights,
            g_data_weights,
            regularization_matrix,
            projection: None,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn kind(&self) -> BlockKind {
        match self.layout {
            Layout::Multivariate => BlockKind::Multivariate,
            Layout::Grid { .. } => BlockKind::Grid,
            Layout::Basis { .. } => BlockKind::Basis,
        }
    }

    pub fn n_samples(&self) -> usize {
        self.data_matrix.nrows()
    }

    /// Number of data coordinates (features, grid points or basis coefficients).
    pub fn n_features(&self) -> usize {
        self.data_matrix.ncols()
    }

    /// Number of weight coordinates; differs from `n_features` only when
    /// a basis block uses a separate weights basis.
    pub fn n_weights(&self) -> usize {
        self.g_weights.nrows()
    }

    /// Centered training data, `n_samples x n_features`.
    pub fn data_matrix(&self) -> &DMatrix<f64> {
        &self.data_matrix
    }

    /// Per-coordinate training mean.
    pub fn mean_values(&self) -> &[f64] {
        &self.mean
    }

    /// Training mean in the block's own representation (one sample).
    pub fn mean(&self) -> Result<BlockData, FplsError> {
        let row = FdMatrix::from_column_major(self.mean.clone(), 1, self.mean.len())
            .ok_or_else(|| FplsError::Numerical("mean has inconsistent length".to_string()))?;
        self.wrap_data_space(row)
    }

    /// Gram matrix of the weight space.
    pub fn g_weights(&self) -> &DMatrix<f64> {
        &self.g_weights
    }

    /// Inner products between data and weight coordinates,
    /// `n_features x n_weights`.
    pub fn g_data_weights(&self) -> &DMatrix<f64> {
        &self.g_data_weights
    }

    pub fn regularization_matrix(&self) -> &DMatrix<f64> {
        &self.regularization_matrix
    }

    /// `G_weights + regularization_matrix`.
    pub fn penalty_matrix(&self) -> DMatrix<f64> {
        &self.g_weights + &self.regularization_matrix
    }

    /// Inverse of the lower Cholesky factor of [`Block::penalty_matrix`].
    pub fn cholesky_inv_penalty_matrix(&self) -> Result<DMatrix<f64>, FplsError> {
        cholesky_inv_lower(&self.penalty_matrix(), &self.label)
    }

    /// Attach the NIPALS results: rotations (`n_weights x k`) and
    /// loadings (`n_features x k`).
    pub fn set_nipals_results(
        &mut self,
        rotations: DMatrix<f64>,
        loadings: DMatrix<f64>,
    ) -> Result<(), FplsError> {
        if rotations.nrows() != self.n_weights() {
            return Err(FplsError::DimensionMismatch {
                what: "rotation rows",
                expected: self.n_weights(),
                found: rotations.nrows(),
            });
        }
        if loadings.nrows() != self.n_features() {
            return Err(FplsError::DimensionMismatch {
                what: "loading rows",
                expected: self.n_features(),
                found: loadings.nrows(),
            });
        }
        if rotations.ncols() != loadings.ncols() {
            return Err(FplsError::DimensionMismatch {
                what: "loading columns",
                expected: rotations.ncols(),
                found: loadings.ncols(),
            });
        }
        self.projection = Some(Projection {
            rotations,
            loadings,
        });
        Ok(())
    }

    fn projection(&self) -> Result<&Projection, FplsError> {
        self.projection.as_ref().ok_or(FplsError::NotFitted)
    }

    pub fn rotations_matrix(&self) -> Result<&DMatrix<f64>, FplsError> {
        Ok(&self.projection()?.rotations)
    }

    pub fn loadings_matrix(&self) -> Result<&DMatrix<f64>, FplsError> {
        Ok(&self.projection()?.loadings)
    }

    /// Rotations as one sample per component, in the weight space.
    pub fn rotations(&self) -> Result<BlockData, FplsError> {
        let rows = FdMatrix::from_dmatrix(&self.projection()?.rotations.transpose());
        match &self.layout {
            Layout::Basis { weights_basis, .. } => {
                Ok(FdataBasis::new(rows, weights_basis.clone())?.into())
            }
            _ => self.wrap_data_space(rows),
        }
    }

    /// Loadings as one sample per component, in the data space.
    pub fn loadings(&self) -> Result<BlockData, FplsError> {
        let rows = FdMatrix::from_dmatrix(&self.projection()?.loadings.transpose());
        self.wrap_data_space(rows)
    }

    /// Wrap `rows` (`k x n_features`) in the training representation.
    fn wrap_data_space(&self, rows: FdMatrix) -> Result<BlockData, FplsError> {
        Ok(match &self.layout {
            Layout::Multivariate => BlockData::Multivariate(rows),
            Layout::Grid { grid_points } => FdataGrid::new(rows, grid_points.clone())?.into(),
            Layout::Basis { basis, .. } => FdataBasis::new(rows, basis.clone())?.into(),
        })
    }

    /// Check that `data` can be projected with this block.
    fn check_compatible(&self, data: &BlockData) -> Result<(), FplsError> {
        let found = data.kind();
        if found != self.kind() {
            return Err(FplsError::UnsupportedDataType {
                expected: self.kind(),
                found,
            });
        }
        let n_cols = data.values().ncols();
        if n_cols != self.n_features() {
            let what = match self.layout {
                Layout::Multivariate => "features",
                Layout::Grid { .. } => "grid points",
                Layout::Basis { .. } => "basis coefficients",
            };
            return Err(FplsError::DimensionMismatch {
                what,
                expected: self.n_features(),
                found: n_cols,
            });
        }
        match (&self.layout, data) {
            (Layout::Grid { grid_points }, BlockData::Grid(fd)) => {
                if !fd.same_grid(grid_points) {
                    return Err(FplsError::Configuration(format!(
                        "block {}: grid points differ from the training grid",
                        self.label
                    )));
                }
            }
            (Layout::Basis { basis, .. }, BlockData::Basis(fd)) => {
                if fd.basis() != basis {
                    return Err(FplsError::Configuration(format!(
                        "block {}: basis differs from the training basis",
                        self.label
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Project same-kind data onto the components: `(data - mean) G R`.
    ///
    /// Returns `n_samples x n_components` scores.
    pub fn transform(&self, data: &BlockData) -> Result<FdMatrix, FplsError> {
        let projection = self.projection()?;
        self.check_compatible(data)?;

        let centered = data.values().sub_row_vector(&self.mean).to_dmatrix();
        let scores = match self.layout {
            // identity inner product
            Layout::Multivariate => centered * &projection.rotations,
            _ => centered * &self.g_data_weights * &projection.rotations,
        };
        Ok(FdMatrix::from(scores))
    }

    /// Reconstruct data from component scores: `components Pᵗ + mean`,
    /// in the training representation.
    pub fn inverse_transform(&self, components: &FdMatrix) -> Result<BlockData, FplsError> {
        let projection = self.projection()?;
        let k = projection.loadings.ncols();
        if components.ncols() != k {
            return Err(FplsError::DimensionMismatch {
                what: "components",
                expected: k,
                found: components.ncols(),
            });
        }
        let reconstructed = components.to_dmatrix() * projection.loadings.transpose();
        let values = FdMatrix::from(reconstructed).add_row_vector(&self.mean);
        self.wrap_data_space(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::linspace;
    use crate::regularization::{DifferencePenalty, L2Regularization};

    fn multivariate() -> BlockData {
        FdMatrix::from_rows(&[
            vec![1.0, 2.0, 0.5],
            vec![3.0, 0.0, 1.5],
            vec![2.0, 4.0, -1.0],
            vec![0.0, 2.0, 3.0],
        ])
        .unwrap()
        .into()
    }

    fn grid_data() -> BlockData {
        let grid = linspace(0.0, 1.0, 5);
        let rows: Vec<Vec<f64>> = (0..4)
            .map(|i| grid.iter().map(|&t| (i as f64 + 1.0) * t + t * t).collect())
            .collect();
        FdataGrid::new(FdMatrix::from_rows(&rows).unwrap(), grid)
            .unwrap()
            .into()
    }

    fn basis_data() -> BlockData {
        let basis = Basis::bspline((0.0, 1.0), 6, 4).unwrap();
        let coefs = FdMatrix::from_rows(&[
            vec![1.0, 0.5, 0.2, 0.0, -0.3, 0.1],
            vec![0.2, 0.1, 0.8, 1.2, 0.4, 0.0],
            vec![-0.5, 0.3, 0.3, 0.1, 0.9, 1.1],
        ])
        .unwrap();
        FdataBasis::new(coefs, basis).unwrap().into()
    }

    #[test]
    fn test_multivariate_block() {
        let block = Block::new(&multivariate(), 2, "X", &BlockConfig::default()).unwrap();
        assert_eq!(block.kind(), BlockKind::Multivariate);
        assert_eq!(block.g_weights(), &DMatrix::identity(3, 3));
        assert_eq!(block.g_data_weights(), &DMatrix::identity(3, 3));
        assert_eq!(block.regularization_matrix(), &DMatrix::zeros(3, 3));
        assert_eq!(block.mean_values(), &[1.5, 2.0, 1.0]);
        for col in block.data_matrix().column_iter() {
            assert!(col.sum().abs() < 1e-12);
        }
    }

    #[test]
    fn test_one_dimensional_vector_is_a_column() {
        let data: BlockData = vec![1.0, 2.0, 6.0].into();
        let block = Block::new(&data, 1, "Y", &BlockConfig::default()).unwrap();
        assert_eq!(block.n_features(), 1);
        assert_eq!(block.mean_values(), &[3.0]);
    }

    #[test]
    fn test_grid_block_default_weights() {
        let data = grid_data();
        let block = Block::new(&data, 2, "X", &BlockConfig::default()).unwrap();
        let w = simpsons_weights(&linspace(0.0, 1.0, 5));
        for i in 0..5 {
            assert!((block.g_weights()[(i, i)] - w[i]).abs() < 1e-15);
        }
        assert_eq!(block.g_weights(), block.g_data_weights());
        assert!(block.cholesky_inv_penalty_matrix().is_ok());
    }

    #[test]
    fn test_grid_block_custom_weights_and_regularization() {
        let config = BlockConfig {
            integration_weights: Some(vec![1.0; 5]),
            regularization: Some(Arc::new(L2Regularization::new(2, 0.1))),
            weights_basis: None,
        };
        let block = Block::new(&grid_data(), 2, "X", &config).unwrap();
        assert_eq!(block.g_weights(), &DMatrix::identity(5, 5));
        assert!(block.regularization_matrix().abs().max() > 0.0);
        let penalty = block.penalty_matrix();
        assert!((&penalty - block.g_weights() - block.regularization_matrix()).abs().max() < 1e-15);

        let short = BlockConfig {
            integration_weights: Some(vec![1.0; 4]),
            ..BlockConfig::default()
        };
        let err = Block::new(&grid_data(), 2, "X", &short).unwrap_err();
        assert!(matches!(err, FplsError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_basis_block_with_weights_basis() {
        let weights_basis = Basis::fourier((0.0, 1.0), 3).unwrap();
        let config = BlockConfig {
            weights_basis: Some(weights_basis.clone()),
            regularization: Some(Arc::new(DifferencePenalty::new(1, 0.5))),
            ..BlockConfig::default()
        };
        let block = Block::new(&basis_data(), 2, "X", &config).unwrap();
        assert_eq!(block.n_features(), 6);
        assert_eq!(block.n_weights(), 3);
        assert_eq!(block.g_data_weights().shape(), (6, 3));
        assert_eq!(block.g_weights().shape(), (3, 3));
        assert_eq!(block.regularization_matrix().shape(), (3, 3));
        assert!((block.g_weights() - weights_basis.gram_matrix()).abs().max() < 1e-12);
    }

    #[test]
    fn test_basis_block_defaults_to_own_basis() {
        let data = basis_data();
        let block = Block::new(&data, 2, "Y", &BlockConfig::default()).unwrap();
        let gram = data.as_basis().unwrap().basis().gram_matrix();
        assert!((block.g_weights() - &gram).abs().max() < 1e-12);
        assert!((block.g_data_weights() - &gram).abs().max() < 1e-12);
    }

    #[test]
    fn test_unsupported_option_combinations() {
        let weights = BlockConfig {
            integration_weights: Some(vec![1.0; 3]),
            ..BlockConfig::default()
        };
        assert!(Block::new(&multivariate(), 1, "X", &weights)
            .unwrap_err()
            .is_configuration());
        assert!(Block::new(&basis_data(), 1, "X", &weights)
            .unwrap_err()
            .is_configuration());

        let basis = BlockConfig {
            weights_basis: Some(Basis::monomial((0.0, 1.0), 2).unwrap()),
            ..BlockConfig::default()
        };
        assert!(Block::new(&grid_data(), 1, "X", &basis)
            .unwrap_err()
            .is_configuration());

        let reg = BlockConfig {
            regularization: Some(Arc::new(L2Regularization::default())),
            ..BlockConfig::default()
        };
        assert!(Block::new(&multivariate(), 1, "X", &reg)
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_empty_fourier_weights_basis_rejected() {
        let config = BlockConfig {
            weights_basis: Some(Basis::Fourier {
                domain: (0.0, 1.0),
                n_basis: 0,
                period: 1.0,
            }),
            ..BlockConfig::default()
        };
        assert!(Block::new(&basis_data(), 1, "X", &config)
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_not_positive_definite_penalty() {
        // a zero integration weight makes the Gram matrix singular
        let config = BlockConfig {
            integration_weights: Some(vec![1.0, 0.0, 1.0, 1.0, 1.0]),
            ..BlockConfig::default()
        };
        let block = Block::new(&grid_data(), 1, "X", &config).unwrap();
        let err = block.cholesky_inv_penalty_matrix().unwrap_err();
        assert_eq!(
            err,
            FplsError::NotPositiveDefinite {
                block: "X".to_string()
            }
        );
    }

    #[test]
    fn test_projection_requires_results() {
        let data = multivariate();
        let mut block = Block::new(&data, 1, "X", &BlockConfig::default()).unwrap();
        assert_eq!(block.transform(&data).unwrap_err(), FplsError::NotFitted);
        assert_eq!(block.rotations().unwrap_err(), FplsError::NotFitted);

        let rotations = DMatrix::from_column_slice(3, 1, &[1.0, 0.0, 0.0]);
        let loadings = DMatrix::from_column_slice(3, 1, &[1.0, 0.0, 0.0]);
        block.set_nipals_results(rotations, loadings).unwrap();

        let scores = block.transform(&data).unwrap();
        assert_eq!(scores.shape(), (4, 1));
        assert_eq!(scores.column(0), &[-0.5, 1.5, 0.5, -1.5]);

        let back = block.inverse_transform(&scores).unwrap();
        let back = back.as_multivariate().unwrap();
        // only the first feature survives; others collapse to the mean
        assert_eq!(back.column(0), &[1.0, 3.0, 2.0, 0.0]);
        assert_eq!(back.column(1), &[2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_transform_checks_input() {
        let data = grid_data();
        let mut block = Block::new(&data, 1, "X", &BlockConfig::default()).unwrap();
        block
            .set_nipals_results(DMatrix::zeros(5, 1), DMatrix::zeros(5, 1))
            .unwrap();

        let err = block.transform(&multivariate()).unwrap_err();
        assert_eq!(
            err,
            FplsError::UnsupportedDataType {
                expected: BlockKind::Grid,
                found: BlockKind::Multivariate
            }
        );

        let shifted = FdataGrid::new(FdMatrix::zeros(2, 5), linspace(0.0, 2.0, 5)).unwrap();
        assert!(block.transform(&shifted.into()).unwrap_err().is_configuration());

        let err = block.inverse_transform(&FdMatrix::zeros(2, 3)).unwrap_err();
        assert!(matches!(err, FplsError::DimensionMismatch { what: "components", .. }));
    }

    #[test]
    fn test_typed_rotations_and_loadings() {
        let weights_basis = Basis::monomial((0.0, 1.0), 2).unwrap();
        let config = BlockConfig {
            weights_basis: Some(weights_basis.clone()),
            ..BlockConfig::default()
        };
        let mut block = Block::new(&basis_data(), 2, "X", &config).unwrap();
        block
            .set_nipals_results(DMatrix::zeros(2, 2), DMatrix::zeros(6, 2))
            .unwrap();

        let rotations = block.rotations().unwrap();
        let rotations = rotations.as_basis().unwrap();
        assert_eq!(rotations.basis(), &weights_basis);
        assert_eq!(rotations.n_samples(), 2);

        let loadings = block.loadings().unwrap();
        assert_eq!(loadings.as_basis().unwrap().basis().n_basis(), 6);

        let err = block
            .set_nipals_results(DMatrix::zeros(6, 2), DMatrix::zeros(6, 2))
            .unwrap_err();
        assert!(matches!(err, FplsError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_mean_in_training_representation() {
        let block = Block::new(&grid_data(), 1, "X", &BlockConfig::default()).unwrap();
        let mean = block.mean().unwrap();
        let mean = mean.as_grid().unwrap();
        assert_eq!(mean.n_samples(), 1);
        assert_eq!(mean.grid_points(), &linspace(0.0, 1.0, 5)[..]);
    }
}
