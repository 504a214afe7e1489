//! mixr - Gaussian mixture estimation on numr tensors
//!
//! mixr fits Gaussian Mixture Models by Expectation-Maximization and scores
//! them with numerically stable log-likelihoods. Built on numr's tensor
//! primitives, every algorithm is generic over numr's `Runtime`; the CPU
//! client implements the public trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        mixr                              │
//! │  (EM driver, M-step estimator, precision Cholesky,      │
//! │   log densities, AIC/BIC)                                │
//! └──────────────────────────┬──────────────────────────────┘
//!                            │ uses
//! ┌──────────────────────────▼──────────────────────────────┐
//! │                       numr                               │
//! │      (tensors, matmul, reductions, eigendecomposition)   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`mixture`] - Gaussian mixtures with full, tied, diagonal and spherical
//!   covariances
//!
//! # Covariance types
//!
//! | Type | Covariance shape | Precision-Cholesky shape |
//! |------|------------------|--------------------------|
//! | `Full` | `[k, d, d]` | `[k, d, d]` upper triangular |
//! | `Tied` | `[d, d]` | `[d, d]` upper triangular |
//! | `Diagonal` | `[k, d]` | `[k, d]` |
//! | `Spherical` | `[k]` | `[k]` |
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | `Serialize`/`Deserialize` for `CovarianceType`, `GmmInit` and `FitState` |
//!
//! # Example
//!
//! ```ignore
//! use mixr::{CovarianceType, GmmAlgorithms, GmmOptions};
//! use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
//! use numr::tensor::Tensor;
//!
//! let device = CpuDevice::new();
//! let client = CpuClient::new(device.clone());
//!
//! let data = Tensor::<CpuRuntime>::from_slice(&samples, &[n, d], &device);
//! let options = GmmOptions {
//!     n_components: 3,
//!     covariance_type: CovarianceType::Diagonal,
//!     ..Default::default()
//! };
//! let model = client.gmm_fit(&data, &options)?;
//! let labels = client.gmm_predict(&model, &data)?;
//! let bic = client.gmm_bic(&model, &data)?;
//! ```

pub mod mixture;

// Re-export main types for convenience
pub use mixture::{
    CovarianceTensor, CovarianceType, EStep, FitState, GaussianParameters, GmmAlgorithms,
    GmmInit, GmmModel, GmmOptions, GmmParameters, MixtureError, MixtureResult,
};

// Re-export numr types that users will commonly need
pub use numr::dtype::DType;
pub use numr::runtime::{Runtime, RuntimeClient};
pub use numr::tensor::Tensor;
