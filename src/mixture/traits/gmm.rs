//! Gaussian Mixture Model trait and model types.

use crate::mixture::error::{MixtureError, MixtureResult};
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Covariance parameterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CovarianceType {
    /// Each component has its own full covariance [k, d, d].
    #[default]
    Full,
    /// All components share one covariance [d, d].
    Tied,
    /// Diagonal covariance [k, d].
    Diagonal,
    /// Scalar variance per component [k].
    Spherical,
}

impl CovarianceType {
    /// Lower-case name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Tied => "tied",
            Self::Diagonal => "diag",
            Self::Spherical => "spherical",
        }
    }

    /// Shape of covariances, precisions and precision-Cholesky factors.
    pub fn parameter_shape(self, n_components: usize, n_features: usize) -> Vec<usize> {
        match self {
            Self::Full => vec![n_components, n_features, n_features],
            Self::Tied => vec![n_features, n_features],
            Self::Diagonal => vec![n_components, n_features],
            Self::Spherical => vec![n_components],
        }
    }

    /// Number of free covariance parameters.
    pub fn n_covariance_parameters(self, n_components: usize, n_features: usize) -> usize {
        let (k, d) = (n_components, n_features);
        match self {
            Self::Full => k * d * (d + 1) / 2,
            Self::Tied => d * (d + 1) / 2,
            Self::Diagonal => k * d,
            Self::Spherical => k,
        }
    }
}

/// Covariance-shaped tensor tagged with its parameterization.
///
/// Used for covariances, precisions and precision-Cholesky factors alike.
#[derive(Debug, Clone)]
pub enum CovarianceTensor<R: Runtime> {
    /// [k, d, d]
    Full(Tensor<R>),
    /// [d, d]
    Tied(Tensor<R>),
    /// [k, d]
    Diagonal(Tensor<R>),
    /// [k]
    Spherical(Tensor<R>),
}

impl<R: Runtime> CovarianceTensor<R> {
    /// Tag `tensor` with `covariance_type`.
    pub fn new(covariance_type: CovarianceType, tensor: Tensor<R>) -> Self {
        match covariance_type {
            CovarianceType::Full => Self::Full(tensor),
            CovarianceType::Tied => Self::Tied(tensor),
            CovarianceType::Diagonal => Self::Diagonal(tensor),
            CovarianceType::Spherical => Self::Spherical(tensor),
        }
    }

    pub fn covariance_type(&self) -> CovarianceType {
        match self {
            Self::Full(_) => CovarianceType::Full,
            Self::Tied(_) => CovarianceType::Tied,
            Self::Diagonal(_) => CovarianceType::Diagonal,
            Self::Spherical(_) => CovarianceType::Spherical,
        }
    }

    pub fn tensor(&self) -> &Tensor<R> {
        match self {
            Self::Full(t) | Self::Tied(t) | Self::Diagonal(t) | Self::Spherical(t) => t,
        }
    }

    pub fn into_tensor(self) -> Tensor<R> {
        match self {
            Self::Full(t) | Self::Tied(t) | Self::Diagonal(t) | Self::Spherical(t) => t,
        }
    }
}

/// Initialization method for the responsibilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GmmInit {
    /// One Lloyd k-means run seeded with k-means++; labels become one-hot
    /// responsibilities.
    #[default]
    KMeans,
    /// k-means++ seeds only; each seed point is fully assigned to its component.
    KMeansPlusPlus,
    /// Uniform random responsibilities, normalized per row.
    Random,
    /// Distinct random samples, each fully assigned to one component.
    RandomFromData,
}

impl GmmInit {
    /// Whether the strategy only draws random numbers (no k-means machinery).
    pub fn is_random(self) -> bool {
        matches!(self, Self::Random | Self::RandomFromData)
    }
}

/// Options for Gaussian Mixture Model.
#[derive(Debug, Clone)]
pub struct GmmOptions<R: Runtime> {
    /// Number of mixture components.
    pub n_components: usize,
    /// Covariance type.
    pub covariance_type: CovarianceType,
    /// Convergence tolerance on the lower bound.
    pub tol: f64,
    /// Non-negative regularization added to covariance diagonals.
    pub reg_covar: f64,
    /// Maximum EM iterations per initialization.
    pub max_iter: usize,
    /// Number of initializations; the best lower bound wins.
    pub n_init: usize,
    /// Responsibility initialization.
    pub init: GmmInit,
    /// User-provided weights [k].
    pub weights_init: Option<Tensor<R>>,
    /// User-provided means [k, d].
    pub means_init: Option<Tensor<R>>,
    /// User-provided precisions, shaped per `covariance_type`.
    pub precisions_init: Option<Tensor<R>>,
    /// Restrict initialization to the purely random strategies.
    pub strict_numeric_mode: bool,
}

impl<R: Runtime> Default for GmmOptions<R> {
    fn default() -> Self {
        Self {
            n_components: 1,
            covariance_type: CovarianceType::Full,
            tol: 1e-3,
            reg_covar: 1e-6,
            max_iter: 100,
            n_init: 1,
            init: GmmInit::KMeans,
            weights_init: None,
            means_init: None,
            precisions_init: None,
            strict_numeric_mode: false,
        }
    }
}

impl<R: Runtime> GmmOptions<R> {
    /// True when weights, means and precisions are all supplied.
    pub fn has_full_initialization(&self) -> bool {
        self.weights_init.is_some() && self.means_init.is_some() && self.precisions_init.is_some()
    }
}

/// Where a model is in its fitting lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FitState {
    /// Parameters set, no EM iteration run.
    Initialized,
    /// The lower bound changed by less than `tol`.
    Converged,
    /// `max_iter` iterations ran without convergence.
    MaxIterReached,
}

/// Output of the M-step estimator.
#[derive(Debug, Clone)]
pub struct GaussianParameters<R: Runtime> {
    /// Effective component counts [k] (never exactly zero).
    pub nk: Tensor<R>,
    /// Component means [k, d].
    pub means: Tensor<R>,
    /// Covariances shaped per covariance type.
    pub covariances: CovarianceTensor<R>,
}

/// Snapshot of a model's parameters, also accepted by
/// [`GmmAlgorithms::gmm_set_parameters`].
#[derive(Debug, Clone)]
pub struct GmmParameters<R: Runtime> {
    pub weights: Tensor<R>,
    pub means: Tensor<R>,
    pub covariances: CovarianceTensor<R>,
    pub precisions_cholesky: CovarianceTensor<R>,
}

/// Gaussian Mixture Model state.
#[derive(Debug, Clone)]
pub struct GmmModel<R: Runtime> {
    /// Mixture weights [k] (sum = 1).
    pub weights: Tensor<R>,
    /// Component means [k, d].
    pub means: Tensor<R>,
    /// Covariances; `None` when initialized from precisions and no M-step ran yet.
    pub covariances: Option<CovarianceTensor<R>>,
    /// Upper-triangular Cholesky factors of the precisions.
    pub precisions_cholesky: CovarianceTensor<R>,
    /// Lifecycle state.
    pub state: FitState,
    /// Number of EM iterations run.
    pub n_iter: usize,
    /// Lower bound of the best run.
    pub lower_bound: f64,
}

impl<R: Runtime> GmmModel<R> {
    pub fn covariance_type(&self) -> CovarianceType {
        self.precisions_cholesky.covariance_type()
    }

    pub fn n_components(&self) -> usize {
        self.weights.shape()[0]
    }

    pub fn n_features(&self) -> usize {
        self.means.shape()[1]
    }

    pub fn converged(&self) -> bool {
        self.state == FitState::Converged
    }

    /// Number of free parameters: covariances, means and `k - 1` weights.
    pub fn n_parameters(&self) -> usize {
        let k = self.n_components();
        let d = self.n_features();
        self.covariance_type().n_covariance_parameters(k, d) + k * d + k - 1
    }

    /// Snapshot of the current parameters.
    ///
    /// Fails when the model was initialized from precisions and no M-step
    /// has produced covariances yet.
    pub fn parameters(&self) -> MixtureResult<GmmParameters<R>> {
        let covariances =
            self.covariances
                .clone()
                .ok_or_else(|| MixtureError::InvalidArgument {
                    arg: "covariances",
                    reason: "covariances are not available before the first M-step".to_string(),
                })?;
        Ok(GmmParameters {
            weights: self.weights.clone(),
            means: self.means.clone(),
            covariances,
            precisions_cholesky: self.precisions_cholesky.clone(),
        })
    }
}

/// Result of an E-step.
#[derive(Debug, Clone)]
pub struct EStep<R: Runtime> {
    /// Mean over samples of the per-sample log normalizer.
    pub log_prob_norm: f64,
    /// Log-responsibilities [n, k].
    pub log_resp: Tensor<R>,
}

/// Gaussian Mixture Model algorithms.
pub trait GmmAlgorithms<R: Runtime> {
    /// Fit a mixture to data [n, d] by EM.
    fn gmm_fit(&self, data: &Tensor<R>, options: &GmmOptions<R>) -> MixtureResult<GmmModel<R>>;

    /// Initialize a model from user parameters and/or responsibilities [n, k].
    ///
    /// When `resp` is `None` the responsibilities are derived with `options.init`.
    fn gmm_initialize(
        &self,
        data: &Tensor<R>,
        resp: Option<&Tensor<R>>,
        options: &GmmOptions<R>,
    ) -> MixtureResult<GmmModel<R>>;

    /// E-step: mean log normalizer and log-responsibilities.
    fn gmm_e_step(&self, model: &GmmModel<R>, data: &Tensor<R>) -> MixtureResult<EStep<R>>;

    /// M-step: replace weights, means, covariances and precision factors.
    fn gmm_m_step(
        &self,
        model: &mut GmmModel<R>,
        data: &Tensor<R>,
        log_resp: &Tensor<R>,
        reg_covar: f64,
    ) -> MixtureResult<()>;

    /// Estimate `nk`, means and covariances from responsibilities [n, k].
    fn gmm_estimate_parameters(
        &self,
        data: &Tensor<R>,
        resp: &Tensor<R>,
        reg_covar: f64,
        covariance_type: CovarianceType,
    ) -> MixtureResult<GaussianParameters<R>>;

    /// Precision-Cholesky factors from covariances.
    fn gmm_precision_cholesky(
        &self,
        covariances: &CovarianceTensor<R>,
    ) -> MixtureResult<CovarianceTensor<R>>;

    /// Precision-Cholesky factors from precisions.
    fn gmm_precision_cholesky_from_precisions(
        &self,
        precisions: &CovarianceTensor<R>,
    ) -> MixtureResult<CovarianceTensor<R>>;

    /// Per-sample, per-component Gaussian log density [n, k].
    fn gmm_log_gaussian_prob(
        &self,
        data: &Tensor<R>,
        means: &Tensor<R>,
        precisions_cholesky: &CovarianceTensor<R>,
    ) -> MixtureResult<Tensor<R>>;

    /// Most likely component per sample [n] (I64).
    fn gmm_predict(&self, model: &GmmModel<R>, data: &Tensor<R>) -> MixtureResult<Tensor<R>>;

    /// Posterior component probabilities [n, k].
    fn gmm_predict_proba(&self, model: &GmmModel<R>, data: &Tensor<R>)
    -> MixtureResult<Tensor<R>>;

    /// Per-sample log-likelihood [n].
    fn gmm_score_samples(&self, model: &GmmModel<R>, data: &Tensor<R>)
    -> MixtureResult<Tensor<R>>;

    /// Mean per-sample log-likelihood.
    fn gmm_score(&self, model: &GmmModel<R>, data: &Tensor<R>) -> MixtureResult<f64>;

    /// Akaike information criterion on `data`.
    fn gmm_aic(&self, model: &GmmModel<R>, data: &Tensor<R>) -> MixtureResult<f64>;

    /// Bayesian information criterion on `data`.
    fn gmm_bic(&self, model: &GmmModel<R>, data: &Tensor<R>) -> MixtureResult<f64>;

    /// Build a model from explicit parameters.
    ///
    /// Weights and means are validated against the covariances, and the
    /// precision factors are recomputed from the covariances. A supplied
    /// factor that disagrees with them is rejected.
    fn gmm_set_parameters(&self, parameters: GmmParameters<R>) -> MixtureResult<GmmModel<R>>;

    /// Precisions rebuilt from the stored Cholesky factors.
    fn gmm_precisions(&self, model: &GmmModel<R>) -> MixtureResult<CovarianceTensor<R>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use numr::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_parameter_shapes() {
        assert_eq!(CovarianceType::Full.parameter_shape(3, 2), vec![3, 2, 2]);
        assert_eq!(CovarianceType::Tied.parameter_shape(3, 2), vec![2, 2]);
        assert_eq!(CovarianceType::Diagonal.parameter_shape(3, 2), vec![3, 2]);
        assert_eq!(CovarianceType::Spherical.parameter_shape(3, 2), vec![3]);
    }

    #[test]
    fn test_n_parameters() {
        let device = CpuDevice::new();
        let (k, d) = (3, 4);
        let expected = [
            (CovarianceType::Full, k * d * (d + 1) / 2),
            (CovarianceType::Tied, d * (d + 1) / 2),
            (CovarianceType::Diagonal, k * d),
            (CovarianceType::Spherical, k),
        ];
        for (cov_type, cov_params) in expected {
            let shape = cov_type.parameter_shape(k, d);
            let numel: usize = shape.iter().product();
            let ones = Tensor::<CpuRuntime>::from_slice(&vec![1.0f64; numel], &shape, &device);
            let model = GmmModel {
                weights: Tensor::<CpuRuntime>::from_slice(&[1.0f64 / 3.0; 3], &[k], &device),
                means: Tensor::<CpuRuntime>::from_slice(&vec![0.0f64; k * d], &[k, d], &device),
                covariances: None,
                precisions_cholesky: CovarianceTensor::new(cov_type, ones),
                state: FitState::Initialized,
                n_iter: 0,
                lower_bound: f64::NEG_INFINITY,
            };
            assert_eq!(model.n_parameters(), cov_params + k * d + k - 1);
            assert!(model.parameters().is_err());
        }
    }

    #[test]
    fn test_random_inits() {
        assert!(GmmInit::Random.is_random());
        assert!(GmmInit::RandomFromData.is_random());
        assert!(!GmmInit::KMeans.is_random());
        assert!(!GmmInit::KMeansPlusPlus.is_random());
    }
}
