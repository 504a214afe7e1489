//! Model lifecycle: initialization, E/M steps, prediction and scoring.

use numr::dtype::DType;
use super::estimate::estimate_gaussian_parameters_impl;
use super::gmm::{MixtureClient, validate_options};
use super::helpers::{log_sum_exp_rows, scalar_value, tensor_to_f64};
use super::init::initial_responsibilities;
use super::log_prob::log_gaussian_prob_impl;
use super::precision::{
    compute_precision_cholesky_from_precisions_impl, compute_precision_cholesky_impl,
    precisions_from_cholesky_impl,
};
use crate::mixture::error::{MixtureError, MixtureResult};
use crate::mixture::traits::gmm::{
    CovarianceTensor, EStep, FitState, GmmModel, GmmOptions, GmmParameters,
};
use crate::mixture::validation::{check_means, check_precisions, check_shape, check_weights};
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Initialize a model from user parameters and/or responsibilities.
///
/// With `weights_init`, `means_init` and `precisions_init` all set, no
/// responsibilities are used. Otherwise parameters are estimated from `resp`
/// (or from `options.init` when `resp` is `None`) and any user-supplied
/// parameter overrides its estimate.
pub fn initialize_impl<R, C>(
    client: &C,
    data: &Tensor<R>,
    resp: Option<&Tensor<R>>,
    options: &GmmOptions<R>,
) -> MixtureResult<GmmModel<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    validate_options(data, options, "gmm_initialize")?;

    let n = data.shape()[0];
    let d = data.shape()[1];
    let k = options.n_components;
    let cov_type = options.covariance_type;

    let weights_init = options
        .weights_init
        .as_ref()
        .map(|w| check_weights(w, k))
        .transpose()?;
    let means_init = options
        .means_init
        .as_ref()
        .map(|m| check_means(m, k, d))
        .transpose()?;
    let precisions_init = options
        .precisions_init
        .as_ref()
        .map(|p| check_precisions(client, p, cov_type, k, d))
        .transpose()?;

    if let (Some(weights), Some(means), Some(precisions)) =
        (weights_init, means_init, precisions_init)
    {
        if resp.is_some() {
            return Err(MixtureError::InvalidArgument {
                arg: "resp",
                reason: "responsibilities cannot be combined with a full user initialization"
                    .to_string(),
            });
        }
        let precisions = CovarianceTensor::new(cov_type, precisions.clone());
        return Ok(GmmModel {
            weights: weights.clone(),
            means: means.clone(),
            covariances: None,
            precisions_cholesky: compute_precision_cholesky_from_precisions_impl(
                client,
                &precisions,
            )?,
            state: FitState::Initialized,
            n_iter: 0,
            lower_bound: f64::NEG_INFINITY,
        });
    }

    let resp = match resp {
        Some(r) => {
            check_shape(r, &[n, k], "resp")?;
            r.clone()
        }
        None => initial_responsibilities(client, data, k, options.init)?,
    };

    let params =
        estimate_gaussian_parameters_impl(client, data, &resp, options.reg_covar, cov_type)?;
    let total = scalar_value(&client.sum(&params.nk, &[0], false)?)?;
    let weights = match weights_init {
        Some(w) => w.clone(),
        None => client.div_scalar(&params.nk, total)?,
    };
    let means = means_init.cloned().unwrap_or(params.means);

    let (covariances, precisions_cholesky) = match precisions_init {
        Some(p) => {
            let precisions = CovarianceTensor::new(cov_type, p.clone());
            (
                None,
                compute_precision_cholesky_from_precisions_impl(client, &precisions)?,
            )
        }
        None => {
            let factors = compute_precision_cholesky_impl(client, &params.covariances)?;
            (Some(params.covariances), factors)
        }
    };

    Ok(GmmModel {
        weights,
        means,
        covariances,
        precisions_cholesky,
        state: FitState::Initialized,
        n_iter: 0,
        lower_bound: f64::NEG_INFINITY,
    })
}

/// Model built from explicit parameters.
///
/// `k` and `d` are read from `means`; weights must be a valid probability
/// vector and the covariances must factorize. The stored precision factors
/// are always the ones recomputed from the covariances.
pub fn set_parameters_impl<R, C>(
    client: &C,
    parameters: GmmParameters<R>,
) -> MixtureResult<GmmModel<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let GmmParameters {
        weights,
        means,
        covariances,
        precisions_cholesky,
    } = parameters;
    let cov_type = covariances.covariance_type();
    if precisions_cholesky.covariance_type() != cov_type {
        return Err(MixtureError::InvalidArgument {
            arg: "precisions_cholesky",
            reason: format!(
                "covariance type {} does not match covariances of type {}",
                precisions_cholesky.covariance_type().name(),
                cov_type.name()
            ),
        });
    }
    if means.shape().len() != 2 {
        return Err(MixtureError::InvalidArgument {
            arg: "means",
            reason: format!("means must be 2D [k, d], got {}-D", means.shape().len()),
        });
    }
    let k = means.shape()[0];
    let d = means.shape()[1];
    check_means(&means, k, d)?;
    check_weights(&weights, k)?;
    let param_shape = cov_type.parameter_shape(k, d);
    check_shape(covariances.tensor(), &param_shape, "covariances")?;
    check_shape(
        precisions_cholesky.tensor(),
        &param_shape,
        "precisions_cholesky",
    )?;
    let dtype = means.dtype();
    if [&weights, covariances.tensor(), precisions_cholesky.tensor()]
        .iter()
        .any(|t| t.dtype() != dtype)
    {
        return Err(MixtureError::InvalidArgument {
            arg: "parameters",
            reason: format!("all parameters must share the dtype of means ({dtype:?})"),
        });
    }

    let factors = compute_precision_cholesky_impl(client, &covariances)?;
    if !factors_agree(&factors, &precisions_cholesky)? {
        return Err(MixtureError::InvalidArgument {
            arg: "precisions_cholesky",
            reason: "does not match the Cholesky factor of the inverse covariances".to_string(),
        });
    }

    Ok(GmmModel {
        weights,
        means,
        covariances: Some(covariances),
        precisions_cholesky: factors,
        state: FitState::Initialized,
        n_iter: 0,
        lower_bound: f64::NEG_INFINITY,
    })
}

fn factors_agree<R: Runtime<DType = DType>>(
    computed: &CovarianceTensor<R>,
    supplied: &CovarianceTensor<R>,
) -> MixtureResult<bool> {
    let computed = tensor_to_f64(computed.tensor())?;
    let supplied = tensor_to_f64(supplied.tensor())?;
    Ok(computed
        .iter()
        .zip(supplied.iter())
        .all(|(c, s)| (c - s).abs() <= 1e-6 + 1e-4 * c.abs()))
}

/// `log p(x | j) + log w_j`, `[n, k]`.
fn weighted_log_prob<R, C>(
    client: &C,
    model: &GmmModel<R>,
    data: &Tensor<R>,
) -> MixtureResult<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let log_prob = log_gaussian_prob_impl(client, data, &model.means, &model.precisions_cholesky)?;
    let shape = log_prob.shape().to_vec();
    let log_weights = client.log(&model.weights)?.unsqueeze(0)?.broadcast_to(&shape)?;
    Ok(client.add(&log_prob, &log_weights)?)
}

/// E-step: mean log normalizer and log-responsibilities.
pub fn e_step_impl<R, C>(
    client: &C,
    model: &GmmModel<R>,
    data: &Tensor<R>,
) -> MixtureResult<EStep<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let weighted = weighted_log_prob(client, model, data)?;
    let shape = weighted.shape().to_vec();
    let log_norm = log_sum_exp_rows(client, &weighted)?; // [n, 1]
    let log_resp = client.sub(&weighted, &log_norm.broadcast_to(&shape)?)?;
    let log_prob_norm = scalar_value(&client.mean(&log_norm, &[0, 1], false)?)?;
    Ok(EStep {
        log_prob_norm,
        log_resp,
    })
}

/// M-step: replace weights, means, covariances and precision factors.
///
/// The model is left untouched when any part of the update fails.
pub fn m_step_impl<R, C>(
    client: &C,
    model: &mut GmmModel<R>,
    data: &Tensor<R>,
    log_resp: &Tensor<R>,
    reg_covar: f64,
) -> MixtureResult<()>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let resp = client.exp(log_resp)?;
    let params =
        estimate_gaussian_parameters_impl(client, data, &resp, reg_covar, model.covariance_type())?;
    let total = scalar_value(&client.sum(&params.nk, &[0], false)?)?;
    let weights = client.div_scalar(&params.nk, total)?;
    let precisions_cholesky = compute_precision_cholesky_impl(client, &params.covariances)?;

    model.weights = weights;
    model.means = params.means;
    model.covariances = Some(params.covariances);
    model.precisions_cholesky = precisions_cholesky;
    Ok(())
}

/// Most likely component per sample, `[n]` (I64).
pub fn predict_impl<R, C>(
    client: &C,
    model: &GmmModel<R>,
    data: &Tensor<R>,
) -> MixtureResult<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let weighted = weighted_log_prob(client, model, data)?;
    Ok(client.argmax(&weighted, 1, false)?)
}

/// Posterior component probabilities, `[n, k]`.
pub fn predict_proba_impl<R, C>(
    client: &C,
    model: &GmmModel<R>,
    data: &Tensor<R>,
) -> MixtureResult<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let e_step = e_step_impl(client, model, data)?;
    Ok(client.exp(&e_step.log_resp)?)
}

/// Per-sample mixture log-likelihood, `[n]`.
pub fn score_samples_impl<R, C>(
    client: &C,
    model: &GmmModel<R>,
    data: &Tensor<R>,
) -> MixtureResult<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let weighted = weighted_log_prob(client, model, data)?;
    let n = weighted.shape()[0];
    Ok(log_sum_exp_rows(client, &weighted)?.contiguous().reshape(&[n])?)
}

/// Mean per-sample log-likelihood.
pub fn score_impl<R, C>(client: &C, model: &GmmModel<R>, data: &Tensor<R>) -> MixtureResult<f64>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let samples = score_samples_impl(client, model, data)?;
    scalar_value(&client.mean(&samples, &[0], false)?)
}

/// `-2·score·n + 2·p`.
pub fn aic_from_score(score: f64, n_samples: usize, n_parameters: usize) -> f64 {
    -2.0 * score * n_samples as f64 + 2.0 * n_parameters as f64
}

/// `-2·score·n + p·ln n`.
pub fn bic_from_score(score: f64, n_samples: usize, n_parameters: usize) -> f64 {
    -2.0 * score * n_samples as f64 + n_parameters as f64 * (n_samples as f64).ln()
}

pub fn aic_impl<R, C>(client: &C, model: &GmmModel<R>, data: &Tensor<R>) -> MixtureResult<f64>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let score = score_impl(client, model, data)?;
    Ok(aic_from_score(score, data.shape()[0], model.n_parameters()))
}

pub fn bic_impl<R, C>(client: &C, model: &GmmModel<R>, data: &Tensor<R>) -> MixtureResult<f64>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let score = score_impl(client, model, data)?;
    Ok(bic_from_score(score, data.shape()[0], model.n_parameters()))
}

/// Precisions rebuilt from the model's Cholesky factors.
pub fn precisions_impl<R, C>(
    client: &C,
    model: &GmmModel<R>,
) -> MixtureResult<CovarianceTensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    precisions_from_cholesky_impl(client, &model.precisions_cholesky)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_information_criteria() {
        // n = 6, p = 11, mean log-likelihood -2
        let aic = aic_from_score(-2.0, 6, 11);
        let bic = bic_from_score(-2.0, 6, 11);
        assert!((aic - (24.0 + 22.0)).abs() < 1e-12);
        assert!((bic - (24.0 + 11.0 * 6f64.ln())).abs() < 1e-12);
        // ln 6 < 2
        assert!(bic < aic);

        // ln 8 > 2
        assert!(bic_from_score(-2.0, 8, 11) > aic_from_score(-2.0, 8, 11));
    }
}
