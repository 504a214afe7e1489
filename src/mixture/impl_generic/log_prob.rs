//! Gaussian log densities evaluated through precision-Cholesky factors.

use numr::dtype::DType;
use super::gmm::MixtureClient;
use super::helpers::index_tensor;
use crate::mixture::error::MixtureResult;
use crate::mixture::traits::gmm::CovarianceTensor;
use crate::mixture::validation::{check_shape, validate_data_2d, validate_float_dtype};
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Log-determinant of the precision-Cholesky factor, per component.
///
/// Returns `[k]`, or `[1]` for tied factors (shared by all components).
pub fn log_det_cholesky_impl<R, C>(
    client: &C,
    precisions_cholesky: &CovarianceTensor<R>,
    n_features: usize,
) -> MixtureResult<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let d = n_features;
    let u = precisions_cholesky.tensor();
    let diagonal: Vec<usize> = (0..d).map(|i| i * (d + 1)).collect();
    let diag_idx = index_tensor::<R>(&diagonal, u.device());

    let log_det = match precisions_cholesky {
        CovarianceTensor::Full(_) => {
            let k = u.shape()[0];
            let flat = u.contiguous().reshape(&[k, d * d])?;
            let diag = client.index_select(&flat, 1, &diag_idx)?; // [k, d]
            client.sum(&client.log(&diag)?, &[1], false)?
        }
        CovarianceTensor::Tied(_) => {
            let flat = u.contiguous().reshape(&[d * d])?;
            let diag = client.index_select(&flat, 0, &diag_idx)?; // [d]
            client.sum(&client.log(&diag)?, &[0], true)?
        }
        CovarianceTensor::Diagonal(_) => client.sum(&client.log(u)?, &[1], false)?,
        CovarianceTensor::Spherical(_) => client.mul_scalar(&client.log(u)?, d as f64)?,
    };
    Ok(log_det)
}

/// Log density of every sample under every component, `[n, k]`.
///
/// `-0.5·(d·ln 2π + ‖(x − μ)·U‖²) + log|U|`, with closed forms of the
/// quadratic term for diagonal and spherical factors.
pub fn log_gaussian_prob_impl<R, C>(
    client: &C,
    data: &Tensor<R>,
    means: &Tensor<R>,
    precisions_cholesky: &CovarianceTensor<R>,
) -> MixtureResult<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    validate_float_dtype(data.dtype(), "log_gaussian_prob")?;
    validate_data_2d(data.shape(), "log_gaussian_prob")?;
    let n = data.shape()[0];
    let d = data.shape()[1];
    let k = means.shape().first().copied().unwrap_or(0);
    check_shape(means, &[k, d], "means")?;
    check_shape(
        precisions_cholesky.tensor(),
        &precisions_cholesky
            .covariance_type()
            .parameter_shape(k, d),
        "precisions_cholesky",
    )?;

    let u = precisions_cholesky.tensor();
    let quadratic = match precisions_cholesky {
        CovarianceTensor::Full(_) | CovarianceTensor::Tied(_) => {
            let tied = matches!(precisions_cholesky, CovarianceTensor::Tied(_));
            let mut slices = Vec::with_capacity(k);
            for j in 0..k {
                let u_j = if tied {
                    u.clone()
                } else {
                    u.narrow(0, j, 1)?.contiguous().reshape(&[d, d])?
                };
                let mean_j = means.narrow(0, j, 1)?; // [1, d]
                let xu = client.matmul(data, &u_j)?; // [n, d]
                let mu = client.matmul(&mean_j, &u_j)?; // [1, d]
                let y = client.sub(&xu, &mu.broadcast_to(&[n, d])?)?;
                let sq = client.sum(&client.mul(&y, &y)?, &[1], true)?; // [n, 1]
                slices.push(sq);
            }
            let refs: Vec<&Tensor<R>> = slices.iter().collect();
            client.cat(&refs, 1)?
        }
        CovarianceTensor::Diagonal(_) => {
            let p = client.mul(u, u)?; // [k, d]
            let means_sq = client.sum(&client.mul(&client.mul(means, means)?, &p)?, &[1], false)?;
            let cross = client.matmul(data, &client.mul(means, &p)?.transpose(0, 1)?)?; // [n, k]
            let x_sq = client.matmul(&client.mul(data, data)?, &p.transpose(0, 1)?)?; // [n, k]
            let q = client.sub(&x_sq, &client.mul_scalar(&cross, 2.0)?)?;
            client.add(&q, &means_sq.unsqueeze(0)?.broadcast_to(&[n, k])?)?
        }
        CovarianceTensor::Spherical(_) => {
            let p = client.mul(u, u)?; // [k]
            let p_nk = p.unsqueeze(0)?.broadcast_to(&[n, k])?;
            let means_sq = client.mul(&client.sum(&client.mul(means, means)?, &[1], false)?, &p)?;
            let cross = client.mul(&client.matmul(data, &means.transpose(0, 1)?)?, &p_nk)?;
            let x_sq = client.sum(&client.mul(data, data)?, &[1], true)?; // [n, 1]
            let x_sq = client.mul(&x_sq.broadcast_to(&[n, k])?, &p_nk)?;
            let q = client.sub(&x_sq, &client.mul_scalar(&cross, 2.0)?)?;
            client.add(&q, &means_sq.unsqueeze(0)?.broadcast_to(&[n, k])?)?
        }
    };

    let log_det = log_det_cholesky_impl(client, precisions_cholesky, d)?;
    let log_2pi = (2.0 * std::f64::consts::PI).ln();
    let scaled = client.mul_scalar(&client.add_scalar(&quadratic, d as f64 * log_2pi)?, -0.5)?;
    Ok(client.add(&scaled, &log_det.unsqueeze(0)?.broadcast_to(&[n, k])?)?)
}
