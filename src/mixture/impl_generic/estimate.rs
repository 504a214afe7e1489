//! M-step estimator: effective counts, means and covariances from
//! responsibilities.

use numr::dtype::DType;
use super::gmm::MixtureClient;
use super::helpers::{machine_epsilon, scalar_value};
use super::linalg::add_to_diagonal;
use crate::mixture::error::{MixtureError, MixtureResult};
use crate::mixture::traits::gmm::{CovarianceTensor, CovarianceType, GaussianParameters};
use crate::mixture::validation::{validate_data_2d, validate_float_dtype, validate_non_negative};
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Estimate `nk`, means and covariances for the given covariance type.
///
/// `nk[j] = Σ_i resp[i, j] + 10·eps`, so components that received no
/// responsibility still produce finite means and covariances.
pub fn estimate_gaussian_parameters_impl<R, C>(
    client: &C,
    data: &Tensor<R>,
    resp: &Tensor<R>,
    reg_covar: f64,
    covariance_type: CovarianceType,
) -> MixtureResult<GaussianParameters<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    validate_float_dtype(data.dtype(), "estimate_gaussian_parameters")?;
    validate_data_2d(data.shape(), "estimate_gaussian_parameters")?;
    validate_non_negative(reg_covar, "reg_covar", "estimate_gaussian_parameters")?;

    let n = data.shape()[0];
    let d = data.shape()[1];
    if resp.shape().len() != 2 || resp.shape()[1] == 0 {
        return Err(MixtureError::InvalidArgument {
            arg: "resp",
            reason: format!("resp must be [n, k] with k > 0, got {:?}", resp.shape()),
        });
    }
    if resp.shape()[0] != n {
        return Err(MixtureError::ShapeMismatch {
            parameter: "resp".to_string(),
            expected: vec![n, resp.shape()[1]],
            got: resp.shape().to_vec(),
        });
    }
    if resp.dtype() != data.dtype() {
        return Err(MixtureError::InvalidArgument {
            arg: "resp",
            reason: format!(
                "resp dtype {:?} does not match data dtype {:?}",
                resp.dtype(),
                data.dtype()
            ),
        });
    }
    let k = resp.shape()[1];

    let eps = machine_epsilon(data.dtype());
    let nk = client.add_scalar(&client.sum(resp, &[0], false)?, 10.0 * eps)?; // [k]
    let nk_kd = nk.unsqueeze(1)?.broadcast_to(&[k, d])?;

    let resp_t = resp.transpose(0, 1)?; // [k, n]
    let means = client.div(&client.matmul(&resp_t, data)?, &nk_kd)?; // [k, d]

    let covariances = match covariance_type {
        CovarianceType::Full => {
            let mut cov_slices = Vec::with_capacity(k);
            for j in 0..k {
                let mean_j = means.narrow(0, j, 1)?; // [1, d]
                let diff = client.sub(data, &mean_j.broadcast_to(&[n, d])?)?; // [n, d]
                let resp_j = resp.narrow(1, j, 1)?; // [n, 1]
                let weighted = client.mul(&diff, &resp_j.broadcast_to(&[n, d])?)?;
                let cov_j = client.matmul(&weighted.transpose(0, 1)?, &diff)?; // [d, d]
                let nk_j = nk.narrow(0, j, 1)?.broadcast_to(&[d, d])?;
                let cov_j = add_to_diagonal(client, &client.div(&cov_j, &nk_j)?, reg_covar)?;
                cov_slices.push(cov_j.unsqueeze(0)?);
            }
            let refs: Vec<&Tensor<R>> = cov_slices.iter().collect();
            CovarianceTensor::Full(client.cat(&refs, 0)?)
        }
        CovarianceType::Tied => {
            let avg_x2 = client.matmul(&data.transpose(0, 1)?, data)?; // [d, d]
            let weighted_means = client.mul(&means, &nk_kd)?; // [k, d]
            let avg_means2 = client.matmul(&weighted_means.transpose(0, 1)?, &means)?; // [d, d]
            let total = scalar_value(&client.sum(&nk, &[0], false)?)?;
            let cov = client.div_scalar(&client.sub(&avg_x2, &avg_means2)?, total)?;
            CovarianceTensor::Tied(add_to_diagonal(client, &cov, reg_covar)?)
        }
        CovarianceType::Diagonal | CovarianceType::Spherical => {
            let x2 = client.mul(data, data)?;
            let avg_x2 = client.div(&client.matmul(&resp_t, &x2)?, &nk_kd)?; // [k, d]
            let avg_means2 = client.mul(&means, &means)?;
            let diag = client.add_scalar(&client.sub(&avg_x2, &avg_means2)?, reg_covar)?;
            if covariance_type == CovarianceType::Diagonal {
                CovarianceTensor::Diagonal(diag)
            } else {
                CovarianceTensor::Spherical(client.mean(&diag, &[1], false)?)
            }
        }
    };

    Ok(GaussianParameters {
        nk,
        means,
        covariances,
    })
}
