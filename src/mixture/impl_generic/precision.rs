//! Precision-Cholesky engine.
//!
//! Scoring never inverts a covariance explicitly: each model stores the
//! upper-triangular `U` with `U·Uᵀ = Σ⁻¹` (or its elementwise analogue for
//! diagonal and spherical models) and the log density is evaluated through it.

use numr::dtype::DType;
use super::gmm::MixtureClient;
use super::helpers::tensor_to_f64;
use super::linalg::{inverse_cholesky_factor, upper_cholesky_of_precision};
use crate::mixture::error::{MixtureError, MixtureResult};
use crate::mixture::traits::gmm::CovarianceTensor;
use crate::mixture::validation::check_covariance_layout;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Apply `factor` to every `[d, d]` matrix of a `[k, d, d]` or `[d, d]` tensor.
///
/// `factor` returns `None` to signal a matrix that cannot be factorized; the
/// whole map then yields `None`.
fn map_square_matrices<R, C, F>(
    client: &C,
    tensor: &Tensor<R>,
    mut factor: F,
) -> MixtureResult<Option<Tensor<R>>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
    F: FnMut(&Tensor<R>) -> MixtureResult<Option<Tensor<R>>>,
{
    if tensor.shape().len() == 2 {
        return factor(tensor);
    }
    let k = tensor.shape()[0];
    let d = tensor.shape()[1];
    let mut slices = Vec::with_capacity(k);
    for j in 0..k {
        let matrix = tensor.narrow(0, j, 1)?.contiguous().reshape(&[d, d])?;
        match factor(&matrix)? {
            Some(out) => slices.push(out.unsqueeze(0)?),
            None => return Ok(None),
        }
    }
    let refs: Vec<&Tensor<R>> = slices.iter().collect();
    Ok(Some(client.cat(&refs, 0)?))
}

fn has_non_positive<R: Runtime<DType = DType>>(tensor: &Tensor<R>) -> MixtureResult<bool> {
    Ok(tensor_to_f64(tensor)?.iter().any(|&v| v <= 0.0 || v.is_nan()))
}

/// Cholesky factors of the precisions, computed from covariances.
///
/// Fails with [`MixtureError::IllConditionedCovariance`] when a covariance
/// is not positive definite (or, for diagonal/spherical, not positive).
pub fn compute_precision_cholesky_impl<R, C>(
    client: &C,
    covariances: &CovarianceTensor<R>,
) -> MixtureResult<CovarianceTensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    check_covariance_layout(covariances, "covariances")?;
    let cov = covariances.tensor();
    let dtype = cov.dtype();

    let factors = match covariances {
        CovarianceTensor::Full(_) | CovarianceTensor::Tied(_) => {
            map_square_matrices(client, cov, |matrix| inverse_cholesky_factor(client, matrix))?
                .ok_or_else(|| MixtureError::ill_conditioned(dtype))?
        }
        CovarianceTensor::Diagonal(_) | CovarianceTensor::Spherical(_) => {
            if has_non_positive(cov)? {
                return Err(MixtureError::ill_conditioned(dtype));
            }
            client.pow_scalar(cov, -0.5)?
        }
    };
    Ok(CovarianceTensor::new(covariances.covariance_type(), factors))
}

/// Cholesky factors computed directly from precisions.
///
/// Full and tied matrices use the reversed-order factorization
/// `U = J·chol(J·P·J)·J`, which is upper triangular with `U·Uᵀ = P`.
pub fn compute_precision_cholesky_from_precisions_impl<R, C>(
    client: &C,
    precisions: &CovarianceTensor<R>,
) -> MixtureResult<CovarianceTensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let cov_type = precisions.covariance_type();
    let parameter = format!("{} precision", cov_type.name());
    check_covariance_layout(precisions, &parameter)?;
    let prec = precisions.tensor();

    let factors = match precisions {
        CovarianceTensor::Full(_) | CovarianceTensor::Tied(_) => {
            map_square_matrices(client, prec, |matrix| {
                upper_cholesky_of_precision(client, matrix)
            })?
            .ok_or(MixtureError::NotPositiveDefinite { parameter })?
        }
        CovarianceTensor::Diagonal(_) | CovarianceTensor::Spherical(_) => {
            if has_non_positive(prec)? {
                return Err(MixtureError::InvalidRange {
                    parameter,
                    message: "should be positive".to_string(),
                });
            }
            client.sqrt(prec)?
        }
    };
    Ok(CovarianceTensor::new(cov_type, factors))
}

/// Precisions rebuilt from their Cholesky factors: `U·Uᵀ`, or `U²`
/// elementwise for diagonal and spherical models.
pub fn precisions_from_cholesky_impl<R, C>(
    client: &C,
    precisions_cholesky: &CovarianceTensor<R>,
) -> MixtureResult<CovarianceTensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    check_covariance_layout(precisions_cholesky, "precisions_cholesky")?;
    let u = precisions_cholesky.tensor();
    let precisions = match precisions_cholesky {
        CovarianceTensor::Full(_) => {
            let k = u.shape()[0];
            let d = u.shape()[1];
            let mut slices = Vec::with_capacity(k);
            for j in 0..k {
                let u_j = u.narrow(0, j, 1)?.contiguous().reshape(&[d, d])?;
                let p_j = client.matmul(&u_j, &u_j.transpose(0, 1)?)?;
                slices.push(p_j.unsqueeze(0)?);
            }
            let refs: Vec<&Tensor<R>> = slices.iter().collect();
            client.cat(&refs, 0)?
        }
        CovarianceTensor::Tied(_) => client.matmul(u, &u.transpose(0, 1)?)?,
        CovarianceTensor::Diagonal(_) | CovarianceTensor::Spherical(_) => client.mul(u, u)?,
    };
    Ok(CovarianceTensor::new(
        precisions_cholesky.covariance_type(),
        precisions,
    ))
}
