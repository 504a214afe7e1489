//! Validation helpers for mixture parameters.

use crate::mixture::error::{MixtureError, MixtureResult};
use crate::mixture::impl_generic::helpers::tensor_to_f64;
use crate::mixture::traits::gmm::{CovarianceTensor, CovarianceType};
use numr::algorithm::linalg::LinearAlgebraAlgorithms;
use numr::dtype::DType;
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Validate tensor dtype (must be F32 or F64).
pub fn validate_float_dtype(dtype: DType, op: &'static str) -> MixtureResult<()> {
    match dtype {
        DType::F32 | DType::F64 => Ok(()),
        _ => Err(MixtureError::UnsupportedDType { dtype, op }),
    }
}

/// Validate that data is 2D [n, d] with at least one sample and one feature.
pub fn validate_data_2d(shape: &[usize], op: &'static str) -> MixtureResult<()> {
    if shape.len() != 2 {
        return Err(MixtureError::InvalidArgument {
            arg: "data",
            reason: format!("{op} requires 2D data [n, d], got {}-D", shape.len()),
        });
    }
    if shape[0] == 0 || shape[1] == 0 {
        return Err(MixtureError::InvalidArgument {
            arg: "data",
            reason: format!("{op} requires non-empty data, got shape {shape:?}"),
        });
    }
    Ok(())
}

/// Validate n_components against the number of samples.
pub fn validate_n_components(
    n_components: usize,
    n_samples: usize,
    op: &'static str,
) -> MixtureResult<()> {
    if n_components == 0 {
        return Err(MixtureError::InvalidArgument {
            arg: "n_components",
            reason: format!("{op} requires n_components > 0"),
        });
    }
    if n_components > n_samples {
        return Err(MixtureError::InvalidArgument {
            arg: "n_components",
            reason: format!(
                "{op}: n_components={n_components} exceeds number of samples {n_samples}"
            ),
        });
    }
    Ok(())
}

/// Validate a non-negative, finite parameter (reg_covar, tol).
pub fn validate_non_negative(value: f64, arg: &'static str, op: &'static str) -> MixtureResult<()> {
    if value < 0.0 || !value.is_finite() {
        return Err(MixtureError::InvalidArgument {
            arg,
            reason: format!("{op} requires finite {arg} >= 0, got {value}"),
        });
    }
    Ok(())
}

/// Check that a tensor has exactly the expected shape.
pub fn check_shape<R: Runtime<DType = DType>>(
    tensor: &Tensor<R>,
    expected: &[usize],
    parameter: &str,
) -> MixtureResult<()> {
    if tensor.shape() != expected {
        return Err(MixtureError::ShapeMismatch {
            parameter: parameter.to_string(),
            expected: expected.to_vec(),
            got: tensor.shape().to_vec(),
        });
    }
    Ok(())
}

/// Check that a tagged covariance-like tensor has the rank its type
/// requires and square trailing matrices for full and tied types.
///
/// The expected shape is read off the tensor's own outer dimensions, so
/// `[2, 3]` tagged tied is reported against `[3, 3]`.
pub fn check_covariance_layout<R: Runtime<DType = DType>>(
    tensor: &CovarianceTensor<R>,
    parameter: &str,
) -> MixtureResult<()> {
    let shape = tensor.tensor().shape();
    let first = shape.first().copied().unwrap_or(0);
    let last = shape.last().copied().unwrap_or(0);
    let expected = match tensor.covariance_type() {
        CovarianceType::Full => vec![first, last, last],
        CovarianceType::Tied => vec![last, last],
        CovarianceType::Diagonal => vec![first, last],
        CovarianceType::Spherical => vec![first],
    };
    check_shape(tensor.tensor(), &expected, parameter)
}

/// Absolute tolerance on `|1 - Σw|` for the given dtype.
pub fn weights_tolerance(dtype: DType) -> f64 {
    match dtype {
        DType::F32 => 1e-6,
        _ => 1e-8,
    }
}

/// Check user-provided mixture weights: shape `[k]`, values in `[0, 1]`,
/// summing to one within [`weights_tolerance`].
pub fn check_weights<R: Runtime<DType = DType>>(
    weights: &Tensor<R>,
    n_components: usize,
) -> MixtureResult<&Tensor<R>> {
    validate_float_dtype(weights.dtype(), "check_weights")?;
    check_shape(weights, &[n_components], "weights")?;

    let values = tensor_to_f64(weights)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min < 0.0 || max > 1.0 || values.iter().any(|v| v.is_nan()) {
        return Err(MixtureError::InvalidRange {
            parameter: "weights".to_string(),
            message: format!("should be in the range [0, 1], got min {min}, max {max}"),
        });
    }

    let total: f64 = values.iter().sum();
    let atol = weights_tolerance(weights.dtype());
    if (1.0 - total).abs() > atol {
        return Err(MixtureError::InvalidRange {
            parameter: "weights".to_string(),
            message: format!("should be normalized, but sum to {total}"),
        });
    }
    Ok(weights)
}

/// Check user-provided means: shape `[k, d]`.
pub fn check_means<R: Runtime<DType = DType>>(
    means: &Tensor<R>,
    n_components: usize,
    n_features: usize,
) -> MixtureResult<&Tensor<R>> {
    validate_float_dtype(means.dtype(), "check_means")?;
    check_shape(means, &[n_components, n_features], "means")?;
    Ok(means)
}

/// Check user-provided precisions for the given covariance type.
///
/// Diagonal and spherical precisions must be strictly positive. Full and tied
/// precision matrices must be symmetric and have only positive eigenvalues.
pub fn check_precisions<'a, R, C>(
    client: &C,
    precisions: &'a Tensor<R>,
    covariance_type: CovarianceType,
    n_components: usize,
    n_features: usize,
) -> MixtureResult<&'a Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: LinearAlgebraAlgorithms<R> + RuntimeClient<R>,
{
    validate_float_dtype(precisions.dtype(), "check_precisions")?;
    let parameter = format!("{} precision", covariance_type.name());
    check_shape(
        precisions,
        &covariance_type.parameter_shape(n_components, n_features),
        &parameter,
    )?;

    match covariance_type {
        CovarianceType::Diagonal | CovarianceType::Spherical => {
            let values = tensor_to_f64(precisions)?;
            if values.iter().any(|&v| v <= 0.0 || v.is_nan()) {
                return Err(MixtureError::InvalidRange {
                    parameter,
                    message: "should be positive".to_string(),
                });
            }
        }
        CovarianceType::Tied => {
            check_precision_matrix(client, precisions, n_features, &parameter)?;
        }
        CovarianceType::Full => {
            let d = n_features;
            for j in 0..n_components {
                let matrix = precisions.narrow(0, j, 1)?.contiguous().reshape(&[d, d])?;
                check_precision_matrix(client, &matrix, d, &parameter)?;
            }
        }
    }
    Ok(precisions)
}

/// Symmetric, positive-definite check of one `[d, d]` precision matrix.
fn check_precision_matrix<R, C>(
    client: &C,
    matrix: &Tensor<R>,
    d: usize,
    parameter: &str,
) -> MixtureResult<()>
where
    R: Runtime<DType = DType>,
    C: LinearAlgebraAlgorithms<R> + RuntimeClient<R>,
{
    let values = tensor_to_f64(matrix)?;
    let symmetric = (0..d).all(|i| {
        (0..d).all(|j| {
            let a = values[i * d + j];
            let at = values[j * d + i];
            (a - at).abs() <= 1e-8 + 1e-5 * at.abs()
        })
    });
    if !symmetric {
        return Err(MixtureError::NotPositiveDefinite {
            parameter: parameter.to_string(),
        });
    }

    let eig = client.eig_decompose_symmetric(matrix)?;
    let eigenvalues = tensor_to_f64(&eig.eigenvalues)?;
    if eigenvalues.iter().any(|&v| v <= 0.0 || v.is_nan()) {
        return Err(MixtureError::NotPositiveDefinite {
            parameter: parameter.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

    fn setup() -> (CpuClient, CpuDevice) {
        let device = CpuDevice::new();
        let client = CpuClient::new(device.clone());
        (client, device)
    }

    #[test]
    fn test_validate_float_dtype() {
        assert!(validate_float_dtype(DType::F32, "test").is_ok());
        assert!(validate_float_dtype(DType::F64, "test").is_ok());
        assert!(validate_float_dtype(DType::I32, "test").is_err());
    }

    #[test]
    fn test_validate_data_2d() {
        assert!(validate_data_2d(&[10, 3], "test").is_ok());
        assert!(validate_data_2d(&[10], "test").is_err());
        assert!(validate_data_2d(&[0, 3], "test").is_err());
        assert!(validate_data_2d(&[3, 0], "test").is_err());
    }

    #[test]
    fn test_validate_n_components() {
        assert!(validate_n_components(3, 100, "test").is_ok());
        assert!(validate_n_components(0, 100, "test").is_err());
        assert!(validate_n_components(101, 100, "test").is_err());
    }

    #[test]
    fn test_validate_non_negative() {
        assert!(validate_non_negative(0.0, "reg_covar", "test").is_ok());
        assert!(validate_non_negative(1e-6, "reg_covar", "test").is_ok());
        assert!(validate_non_negative(-1e-6, "reg_covar", "test").is_err());
        assert!(validate_non_negative(f64::NAN, "tol", "test").is_err());
    }

    #[test]
    fn test_check_weights() {
        let (_client, device) = setup();

        let w = Tensor::<CpuRuntime>::from_slice(&[0.25f64, 0.75], &[2], &device);
        assert!(check_weights(&w, 2).is_ok());

        let w = Tensor::<CpuRuntime>::from_slice(&[1.2f64, -0.2], &[2], &device);
        assert!(matches!(
            check_weights(&w, 2),
            Err(MixtureError::InvalidRange { .. })
        ));

        let w = Tensor::<CpuRuntime>::from_slice(&[0.5f64, 0.4], &[2], &device);
        assert!(matches!(
            check_weights(&w, 2),
            Err(MixtureError::InvalidRange { .. })
        ));

        let w = Tensor::<CpuRuntime>::from_slice(&[0.5f64, 0.25, 0.25], &[3], &device);
        assert!(matches!(
            check_weights(&w, 2),
            Err(MixtureError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_check_means_shape() {
        let (_client, device) = setup();
        let m = Tensor::<CpuRuntime>::from_slice(&[0.0f64; 6], &[2, 3], &device);
        assert!(check_means(&m, 2, 3).is_ok());
        let err = check_means(&m, 3, 2).unwrap_err();
        assert!(err.to_string().contains("means"));
        assert!(err.to_string().contains("[3, 2]"));
    }

    #[test]
    fn test_check_precisions_diag() {
        let (client, device) = setup();
        let p = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 2.0, 0.5, 4.0], &[2, 2], &device);
        assert!(check_precisions(&client, &p, CovarianceType::Diagonal, 2, 2).is_ok());

        let p = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 0.0], &[2], &device);
        assert!(matches!(
            check_precisions(&client, &p, CovarianceType::Spherical, 2, 3),
            Err(MixtureError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_check_precisions_tied() {
        let (client, device) = setup();
        let spd = Tensor::<CpuRuntime>::from_slice(&[2.0f64, 0.5, 0.5, 1.0], &[2, 2], &device);
        assert!(check_precisions(&client, &spd, CovarianceType::Tied, 3, 2).is_ok());

        let asym = Tensor::<CpuRuntime>::from_slice(&[2.0f64, 0.5, 0.0, 1.0], &[2, 2], &device);
        assert!(matches!(
            check_precisions(&client, &asym, CovarianceType::Tied, 3, 2),
            Err(MixtureError::NotPositiveDefinite { .. })
        ));

        let indefinite =
            Tensor::<CpuRuntime>::from_slice(&[1.0f64, 2.0, 2.0, 1.0], &[2, 2], &device);
        assert!(matches!(
            check_precisions(&client, &indefinite, CovarianceType::Tied, 3, 2),
            Err(MixtureError::NotPositiveDefinite { .. })
        ));
    }

    #[test]
    fn test_check_precisions_full_wrong_shape() {
        let (client, device) = setup();
        let p = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 0.0, 0.0, 1.0], &[2, 2], &device);
        let err = check_precisions(&client, &p, CovarianceType::Full, 2, 2).unwrap_err();
        match err {
            MixtureError::ShapeMismatch { expected, .. } => assert_eq!(expected, vec![2, 2, 2]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_check_covariance_layout() {
        let (_client, device) = setup();
        let square = Tensor::<CpuRuntime>::from_slice(&[1.0f64; 8], &[2, 2, 2], &device);
        assert!(check_covariance_layout(&CovarianceTensor::Full(square), "covariances").is_ok());

        let wide = Tensor::<CpuRuntime>::from_slice(&[1.0f64; 6], &[2, 3], &device);
        match check_covariance_layout(&CovarianceTensor::Tied(wide.clone()), "covariances") {
            Err(MixtureError::ShapeMismatch { expected, got, .. }) => {
                assert_eq!(expected, vec![3, 3]);
                assert_eq!(got, vec![2, 3]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(check_covariance_layout(&CovarianceTensor::Diagonal(wide.clone()), "c").is_ok());
        assert!(check_covariance_layout(&CovarianceTensor::Spherical(wide), "c").is_err());
    }
}
