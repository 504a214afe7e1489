//! Error types for Gaussian mixture estimation.

use numr::dtype::DType;
use std::fmt;

/// Result type for mixture operations.
pub type MixtureResult<T> = Result<T, MixtureError>;

/// Errors that can occur while validating, fitting or scoring a mixture.
#[derive(Debug, Clone)]
pub enum MixtureError {
    /// A supplied tensor does not have the shape implied by
    /// `n_components`, `n_features` and the covariance type.
    ShapeMismatch {
        parameter: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Values outside their admissible range (weights outside [0, 1],
    /// weights not normalized, non-positive precisions).
    InvalidRange { parameter: String, message: String },

    /// A precision matrix is not symmetric or has a non-positive eigenvalue.
    NotPositiveDefinite { parameter: String },

    /// Cholesky factorization of an estimated covariance failed.
    IllConditionedCovariance { message: String },

    /// The requested initialization cannot run under the configured numeric mode.
    UnsupportedConfiguration { message: String },

    /// Invalid argument (empty data, bad component count, negative regularization, ...).
    InvalidArgument { arg: &'static str, reason: String },

    /// Tensor dtype is not F32 or F64.
    UnsupportedDType { dtype: DType, op: &'static str },

    /// Error from underlying numr operation.
    NumrError(String),
}

impl MixtureError {
    /// Build the ill-conditioned covariance error for data of the given dtype.
    ///
    /// The message lists the remedies available to the caller; for `F32`
    /// inputs it also suggests switching to `F64`.
    pub fn ill_conditioned(dtype: DType) -> Self {
        let mut message = String::from(
            "Fitting the mixture model failed because some components have \
             ill-defined empirical covariance (for instance caused by singleton \
             or collapsed samples). Try to decrease the number of components, \
             increase reg_covar, or scale the input data.",
        );
        if dtype == DType::F32 {
            message.push_str(
                " The numerical accuracy can also be improved by passing F64 \
                 data instead of F32.",
            );
        }
        Self::IllConditionedCovariance { message }
    }
}

impl fmt::Display for MixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch {
                parameter,
                expected,
                got,
            } => {
                write!(
                    f,
                    "The parameter '{}' should have the shape of {:?}, but got {:?}",
                    parameter, expected, got
                )
            }
            Self::InvalidRange { parameter, message } => {
                write!(f, "Invalid range for '{}': {}", parameter, message)
            }
            Self::NotPositiveDefinite { parameter } => {
                write!(f, "'{}' should be symmetric, positive-definite", parameter)
            }
            Self::IllConditionedCovariance { message } => write!(f, "{}", message),
            Self::UnsupportedConfiguration { message } => {
                write!(f, "Unsupported configuration: {}", message)
            }
            Self::InvalidArgument { arg, reason } => {
                write!(f, "Invalid argument '{}': {}", arg, reason)
            }
            Self::UnsupportedDType { dtype, op } => {
                write!(f, "{} does not support dtype {:?}", op, dtype)
            }
            Self::NumrError(msg) => write!(f, "numr error: {}", msg),
        }
    }
}

impl std::error::Error for MixtureError {}

impl From<numr::error::Error> for MixtureError {
    fn from(err: numr::error::Error) -> Self {
        Self::NumrError(err.to_string())
    }
}
