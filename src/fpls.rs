//! Functional Partial Least Squares estimator.
//!
//! [`Fpls`] pairs two blocks, X and Y, each of which may be multivariate,
//! sampled on a grid or expanded in a basis, and extracts latent components
//! that maximise the covariance between them.
//!
//! ```
//! use fdars_fpls::{BlockData, DeflationMode, Fpls, FdMatrix};
//!
//! let x = FdMatrix::from_rows(&[
//!     vec![1.0, 0.2, 3.1],
//!     vec![2.0, 1.1, 0.4],
//!     vec![0.5, 2.3, 1.7],
//!     vec![3.2, 0.9, 2.2],
//!     vec![1.4, 1.8, 0.3],
//! ])
//! .unwrap();
//! let y = vec![0.3, 1.2, 0.8, 2.1, 0.9];
//!
//! let mut fpls = Fpls::builder()
//!     .n_components(2)
//!     .deflation_mode(DeflationMode::Regression)
//!     .build();
//! fpls.fit(&BlockData::from(x.clone()), &BlockData::from(y)).unwrap();
//!
//! let scores = fpls.transform_x(&BlockData::from(x)).unwrap();
//! assert_eq!(scores.shape(), (5, 2));
//! ```

use crate::basis::Basis;
use crate::block::{Block, BlockConfig};
use crate::error::FplsError;
use crate::fdata::BlockData;
use crate::helpers::{DEFAULT_CONVERGENCE_TOL, DEFAULT_MAX_ITER, DEFAULT_N_COMPONENTS};
use crate::linalg::pseudo_inverse;
use crate::matrix::FdMatrix;
use crate::nipals::{run_nipals, DeflationMode, NipalsOptions};
use crate::regularization::Regularization;
use log::{debug, warn};
use nalgebra::DMatrix;
use std::sync::Arc;

/// Estimator configuration.
#[derive(Debug, Clone)]
pub struct FplsConfig {
    /// Number of components to extract (default: 5)
    pub n_components: usize,
    /// Power-method convergence tolerance (default: 1e-6)
    pub tol: f64,
    /// Power-method iteration cap (default: 500)
    pub max_iter: usize,
    /// Y deflation rule (default: canonical)
    pub deflation_mode: DeflationMode,
    /// Options for the X block
    pub x_block: BlockConfig,
    /// Options for the Y block
    pub y_block: BlockConfig,
}

impl Default for FplsConfig {
    fn default() -> Self {
        Self {
            n_components: DEFAULT_N_COMPONENTS,
            tol: DEFAULT_CONVERGENCE_TOL,
            max_iter: DEFAULT_MAX_ITER,
            deflation_mode: DeflationMode::default(),
            x_block: BlockConfig::default(),
            y_block: BlockConfig::default(),
        }
    }
}

impl FplsConfig {
    /// Check scalar parameters. Block-specific options are checked when
    /// the blocks are built, since they depend on the data representation.
    pub fn validate(&self) -> Result<(), FplsError> {
        if self.n_components == 0 {
            return Err(FplsError::Configuration(
                "n_components must be at least 1".to_string(),
            ));
        }
        if !(self.tol.is_finite() && self.tol >= 0.0) {
            return Err(FplsError::Configuration(format!(
                "tol must be finite and non-negative, got {}",
                self.tol
            )));
        }
        if self.max_iter == 0 {
            return Err(FplsError::Configuration(
                "max_iter must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Chained construction of an [`Fpls`] estimator.
#[derive(Debug, Clone, Default)]
pub struct FplsBuilder {
    config: FplsConfig,
}

impl FplsBuilder {
    pub fn n_components(mut self, n_components: usize) -> Self {
        self.config.n_components = n_components;
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.config.tol = tol;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    pub fn deflation_mode(mut self, mode: DeflationMode) -> Self {
        self.config.deflation_mode = mode;
        self
    }

    pub fn regularization_x(mut self, regularization: Arc<dyn Regularization>) -> Self {
        self.config.x_block.regularization = Some(regularization);
        self
    }

    pub fn regularization_y(mut self, regularization: Arc<dyn Regularization>) -> Self {
        self.config.y_block.regularization = Some(regularization);
        self
    }

    /// Basis for the X weight functions (basis blocks only).
    pub fn component_basis_x(mut self, basis: Basis) -> Self {
        self.config.x_block.weights_basis = Some(basis);
        self
    }

    /// Basis for the Y weight functions (basis blocks only).
    pub fn component_basis_y(mut self, basis: Basis) -> Self {
        self.config.y_block.weights_basis = Some(basis);
        self
    }

    /// Quadrature weights for the X grid (grid blocks only).
    pub fn integration_weights_x(mut self, weights: Vec<f64>) -> Self {
        self.config.x_block.integration_weights = Some(weights);
        self
    }

    /// Quadrature weights for the Y grid (grid blocks only).
    pub fn integration_weights_y(mut self, weights: Vec<f64>) -> Self {
        self.config.y_block.integration_weights = Some(weights);
        self
    }

    pub fn build(self) -> Fpls {
        Fpls::new(self.config)
    }
}

/// Everything produced by a successful fit.
#[derive(Debug, Clone)]
struct FittedModel {
    x_block: Block,
    y_block: Block,
    x_weights: DMatrix<f64>,
    y_weights: DMatrix<f64>,
    x_scores: DMatrix<f64>,
    y_scores: DMatrix<f64>,
}

/// Functional PLS estimator.
#[derive(Debug, Clone, Default)]
pub struct Fpls {
    config: FplsConfig,
    fitted: Option<FittedModel>,
}

/// `W pinv(Pᵗ G W)`: weights corrected for deflation so that centered data
/// can be projected in one step.
fn rotations(
    block: &Block,
    weights: &DMatrix<f64>,
    loadings: &DMatrix<f64>,
) -> Result<DMatrix<f64>, FplsError> {
    let inner = loadings.transpose() * block.g_data_weights() * weights;
    Ok(weights * pseudo_inverse(&inner)?)
}

impl Fpls {
    pub fn new(config: FplsConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn builder() -> FplsBuilder {
        FplsBuilder::default()
    }

    pub fn config(&self) -> &FplsConfig {
        &self.config
    }

    pub fn n_components(&self) -> usize {
        self.config.n_components
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fit the model to paired blocks.
    ///
    /// Any previous fit is discarded first, so a failed call leaves the
    /// estimator unfitted.
    pub fn fit(&mut self, x: &BlockData, y: &BlockData) -> Result<&mut Self, FplsError> {
        self.fitted = None;
        self.config.validate()?;

        if x.n_samples() != y.n_samples() {
            return Err(FplsError::SampleCountMismatch {
                x_samples: x.n_samples(),
                y_samples: y.n_samples(),
            });
        }

        let k = self.config.n_components;
        let mut x_block = Block::new(x, k, "X", &self.config.x_block)?;
        let mut y_block = Block::new(y, k, "Y", &self.config.y_block)?;

        debug!(
            "fitting FPLS: X {} {}x{}, Y {} {}x{}, {} components, {} deflation",
            x_block.kind(),
            x_block.n_samples(),
            x_block.n_features(),
            y_block.kind(),
            y_block.n_samples(),
            y_block.n_features(),
            k,
            self.config.deflation_mode
        );
        let rank_bound = x_block.n_samples().min(x_block.n_features());
        if k > rank_bound {
            warn!(
                "n_components={} exceeds min(n_samples, n_features)={}; trailing components will be degenerate",
                k, rank_bound
            );
        }

        let options = NipalsOptions {
            n_components: k,
            tol: self.config.tol,
            max_iter: self.config.max_iter,
            deflation_mode: self.config.deflation_mode,
        };
        let result = run_nipals(&x_block, &y_block, &options)?;

        let x_rotations = rotations(&x_block, &result.x_weights, &result.x_loadings)?;
        let y_rotations = rotations(&y_block, &result.y_weights, &result.y_loadings)?;
        x_block.set_nipals_results(x_rotations, result.x_loadings)?;
        y_block.set_nipals_results(y_rotations, result.y_loadings)?;

        self.fitted = Some(FittedModel {
            x_block,
            y_block,
            x_weights: result.x_weights,
            y_weights: result.y_weights,
            x_scores: result.x_scores,
            y_scores: result.y_scores,
        });
        Ok(self)
    }

    fn model(&self) -> Result<&FittedModel, FplsError> {
        self.fitted.as_ref().ok_or(FplsError::NotFitted)
    }

    /// Project new data onto the fitted components.
    ///
    /// Returns the X scores, and the Y scores when `y` is given.
    pub fn transform(
        &self,
        x: &BlockData,
        y: Option<&BlockData>,
    ) -> Result<(FdMatrix, Option<FdMatrix>), FplsError> {
        let model = self.model()?;
        let x_scores = model.x_block.transform(x)?;
        let y_scores = y.map(|y| model.y_block.transform(y)).transpose()?;
        Ok((x_scores, y_scores))
    }

    pub fn transform_x(&self, x: &BlockData) -> Result<FdMatrix, FplsError> {
        self.model()?.x_block.transform(x)
    }

    pub fn transform_y(&self, y: &BlockData) -> Result<FdMatrix, FplsError> {
        self.model()?.y_block.transform(y)
    }

    /// Map component scores back to data, in the representation each
    /// block was trained on.
    pub fn inverse_transform(
        &self,
        x_components: &FdMatrix,
        y_components: Option<&FdMatrix>,
    ) -> Result<(BlockData, Option<BlockData>), FplsError> {
        let model = self.model()?;
        let x = model.x_block.inverse_transform(x_components)?;
        let y = y_components
            .map(|c| model.y_block.inverse_transform(c))
            .transpose()?;
        Ok((x, y))
    }

    pub fn inverse_transform_x(&self, components: &FdMatrix) -> Result<BlockData, FplsError> {
        self.model()?.x_block.inverse_transform(components)
    }

    pub fn inverse_transform_y(&self, components: &FdMatrix) -> Result<BlockData, FplsError> {
        self.model()?.y_block.inverse_transform(components)
    }

    /// Fitted X block.
    pub fn x_block(&self) -> Result<&Block, FplsError> {
        Ok(&self.model()?.x_block)
    }

    /// Fitted Y block.
    pub fn y_block(&self) -> Result<&Block, FplsError> {
        Ok(&self.model()?.y_block)
    }

    pub fn x_weights(&self) -> Result<FdMatrix, FplsError> {
        Ok(FdMatrix::from_dmatrix(&self.model()?.x_weights))
    }

    pub fn y_weights(&self) -> Result<FdMatrix, FplsError> {
        Ok(FdMatrix::from_dmatrix(&self.model()?.y_weights))
    }

    pub fn x_scores(&self) -> Result<FdMatrix, FplsError> {
        Ok(FdMatrix::from_dmatrix(&self.model()?.x_scores))
    }

    pub fn y_scores(&self) -> Result<FdMatrix, FplsError> {
        Ok(FdMatrix::from_dmatrix(&self.model()?.y_scores))
    }

    pub fn x_loadings_matrix(&self) -> Result<FdMatrix, FplsError> {
        Ok(FdMatrix::from_dmatrix(self.model()?.x_block.loadings_matrix()?))
    }

    pub fn y_loadings_matrix(&self) -> Result<FdMatrix, FplsError> {
        Ok(FdMatrix::from_dmatrix(self.model()?.y_block.loadings_matrix()?))
    }

    pub fn x_rotations_matrix(&self) -> Result<FdMatrix, FplsError> {
        Ok(FdMatrix::from_dmatrix(self.model()?.x_block.rotations_matrix()?))
    }

    pub fn y_rotations_matrix(&self) -> Result<FdMatrix, FplsError> {
        Ok(FdMatrix::from_dmatrix(self.model()?.y_block.rotations_matrix()?))
    }

    /// X rotations, one sample per component, in the X weight space.
    pub fn x_rotations(&self) -> Result<BlockData, FplsError> {
        self.model()?.x_block.rotations()
    }

    pub fn y_rotations(&self) -> Result<BlockData, FplsError> {
        self.model()?.y_block.rotations()
    }

    /// X loadings, one sample per component, in the X data space.
    pub fn x_loadings(&self) -> Result<BlockData, FplsError> {
        self.model()?.x_block.loadings()
    }

    pub fn y_loadings(&self) -> Result<BlockData, FplsError> {
        self.model()?.y_block.loadings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdata::{BlockKind, FdataGrid};
    use crate::helpers::linspace;
    use rand::distributions::Uniform;
    use rand::prelude::*;

    fn uniform_values(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = Uniform::new_inclusive(-1.0, 1.0);
        (0..n).map(|_| rng.sample(dist)).collect()
    }

    fn random_matrix(n: usize, m: usize, seed: u64) -> FdMatrix {
        FdMatrix::from_column_major(uniform_values(n * m, seed), n, m).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = FplsConfig::default();
        assert_eq!(config.n_components, 5);
        assert_eq!(config.tol, 1e-6);
        assert_eq!(config.max_iter, 500);
        assert_eq!(config.deflation_mode, DeflationMode::Canonical);
        assert!(config.x_block.regularization.is_none());
    }

    #[test]
    fn test_builder_sets_fields() {
        let fpls = Fpls::builder()
            .n_components(3)
            .tol(1e-8)
            .max_iter(50)
            .deflation_mode(DeflationMode::Regression)
            .integration_weights_y(vec![1.0; 4])
            .build();
        let config = fpls.config();
        assert_eq!(config.n_components, 3);
        assert_eq!(config.tol, 1e-8);
        assert_eq!(config.max_iter, 50);
        assert_eq!(config.deflation_mode, DeflationMode::Regression);
        assert_eq!(config.y_block.integration_weights.as_deref(), Some(&[1.0; 4][..]));
        assert!(!fpls.is_fitted());
    }

    #[test]
    fn test_invalid_parameters() {
        let x: BlockData = random_matrix(6, 2, 1).into();
        let y: BlockData = random_matrix(6, 1, 2).into();

        let mut fpls = Fpls::builder().n_components(0).build();
        assert!(fpls.fit(&x, &y).unwrap_err().is_configuration());

        let mut fpls = Fpls::builder().tol(f64::NAN).build();
        assert!(fpls.fit(&x, &y).unwrap_err().is_configuration());

        let mut fpls = Fpls::builder().max_iter(0).build();
        assert!(fpls.fit(&x, &y).unwrap_err().is_configuration());
    }

    #[test]
    fn test_not_fitted() {
        let fpls = Fpls::default();
        let x: BlockData = random_matrix(3, 2, 1).into();
        assert_eq!(fpls.transform_x(&x).unwrap_err(), FplsError::NotFitted);
        assert_eq!(
            fpls.inverse_transform(&FdMatrix::zeros(1, 5), None).unwrap_err(),
            FplsError::NotFitted
        );
        assert_eq!(fpls.x_scores().unwrap_err(), FplsError::NotFitted);
        assert_eq!(fpls.y_loadings().unwrap_err(), FplsError::NotFitted);
    }

    #[test]
    fn test_failed_fit_clears_state() {
        let x: BlockData = random_matrix(10, 3, 1).into();
        let y: BlockData = random_matrix(10, 1, 2).into();
        let mut fpls = Fpls::builder().n_components(2).build();
        fpls.fit(&x, &y).unwrap();
        assert!(fpls.is_fitted());

        let short: BlockData = random_matrix(4, 1, 3).into();
        let err = fpls.fit(&x, &short).unwrap_err();
        assert_eq!(
            err,
            FplsError::SampleCountMismatch {
                x_samples: 10,
                y_samples: 4
            }
        );
        assert!(!fpls.is_fitted());
        assert_eq!(fpls.transform_x(&x).unwrap_err(), FplsError::NotFitted);
    }

    #[test]
    fn test_fitted_shapes() {
        let x: BlockData = random_matrix(25, 4, 7).into();
        let y: BlockData = random_matrix(25, 3, 8).into();
        let mut fpls = Fpls::builder().n_components(2).build();
        fpls.fit(&x, &y).unwrap();

        assert_eq!(fpls.x_weights().unwrap().shape(), (4, 2));
        assert_eq!(fpls.y_weights().unwrap().shape(), (3, 2));
        assert_eq!(fpls.x_scores().unwrap().shape(), (25, 2));
        assert_eq!(fpls.y_scores().unwrap().shape(), (25, 2));
        assert_eq!(fpls.x_loadings_matrix().unwrap().shape(), (4, 2));
        assert_eq!(fpls.y_rotations_matrix().unwrap().shape(), (3, 2));

        let loadings = fpls.x_loadings().unwrap();
        assert_eq!(loadings.kind(), BlockKind::Multivariate);
        assert_eq!(loadings.values().shape(), (2, 4));
    }

    #[test]
    fn test_transform_pair_and_inverse_pair() {
        let grid = linspace(0.0, 1.0, 6);
        let x: BlockData = FdataGrid::new(random_matrix(20, 6, 4), grid).unwrap().into();
        let y: BlockData = random_matrix(20, 2, 5).into();
        let mut fpls = Fpls::builder().n_components(2).build();
        fpls.fit(&x, &y).unwrap();

        let (xs, ys) = fpls.transform(&x, Some(&y)).unwrap();
        let ys = ys.unwrap();
        assert_eq!(xs.shape(), (20, 2));
        assert_eq!(ys.shape(), (20, 2));

        let (xr, yr) = fpls.inverse_transform(&xs, Some(&ys)).unwrap();
        assert_eq!(xr.kind(), BlockKind::Grid);
        assert_eq!(yr.unwrap().kind(), BlockKind::Multivariate);

        let (_, none) = fpls.transform(&x, None).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_transform_rejects_other_kind() {
        let grid = linspace(0.0, 1.0, 5);
        let x: BlockData = FdataGrid::new(random_matrix(12, 5, 4), grid).unwrap().into();
        let y: BlockData = random_matrix(12, 1, 5).into();
        let mut fpls = Fpls::builder()
            .n_components(1)
            .deflation_mode(DeflationMode::Regression)
            .build();
        fpls.fit(&x, &y).unwrap();

        let err = fpls.transform_x(&random_matrix(3, 5, 1).into()).unwrap_err();
        assert_eq!(
            err,
            FplsError::UnsupportedDataType {
                expected: BlockKind::Grid,
                found: BlockKind::Multivariate
            }
        );
    }
}
