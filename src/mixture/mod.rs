//! Gaussian mixture models.
//!
//! EM estimation with full, tied, diagonal and spherical covariances. Log
//! densities are evaluated through Cholesky factors of the precision
//! matrices, and fitted models expose AIC/BIC for model selection.

mod cpu;
pub mod error;
pub mod impl_generic;
pub mod traits;
mod validation;

pub use error::{MixtureError, MixtureResult};
pub use traits::gmm::{
    CovarianceTensor, CovarianceType, EStep, FitState, GaussianParameters, GmmAlgorithms,
    GmmInit, GmmModel, GmmOptions, GmmParameters,
};
pub use validation::*;
