//! Generic Gaussian Mixture Model fitting via EM.
//!
//! Supports Full, Tied, Diagonal, and Spherical covariance types. All tensor
//! work, factorizations included, runs on the client; each iteration reads
//! back one scalar (the lower bound).

use numr::dtype::DType;
use super::model::{e_step_impl, initialize_impl, m_step_impl};
use crate::mixture::error::{MixtureError, MixtureResult};
use crate::mixture::traits::gmm::{FitState, GmmModel, GmmOptions};
use crate::mixture::validation::{
    validate_data_2d, validate_float_dtype, validate_n_components, validate_non_negative,
};
use numr::algorithm::linalg::LinearAlgebraAlgorithms;
use numr::ops::{
    BinaryOps, CompareOps, ConditionalOps, DistanceOps, IndexingOps, MatmulOps, RandomOps,
    ReduceOps, ScalarOps, ShapeOps, TypeConversionOps, UnaryOps, UtilityOps,
};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Trait bounds needed for mixture estimation.
pub trait MixtureClient<R: Runtime<DType = DType>>:
    BinaryOps<R>
    + CompareOps<R>
    + ConditionalOps<R>
    + DistanceOps<R>
    + IndexingOps<R>
    + MatmulOps<R>
    + RandomOps<R>
    + ReduceOps<R>
    + ScalarOps<R>
    + ShapeOps<R>
    + TypeConversionOps<R>
    + UnaryOps<R>
    + UtilityOps<R>
    + LinearAlgebraAlgorithms<R>
    + RuntimeClient<R>
{
}

impl<R, C> MixtureClient<R> for C
where
    R: Runtime<DType = DType>,
    C: BinaryOps<R>
        + CompareOps<R>
        + ConditionalOps<R>
        + DistanceOps<R>
        + IndexingOps<R>
        + MatmulOps<R>
        + RandomOps<R>
        + ReduceOps<R>
        + ScalarOps<R>
        + ShapeOps<R>
        + TypeConversionOps<R>
        + UnaryOps<R>
        + UtilityOps<R>
        + LinearAlgebraAlgorithms<R>
        + RuntimeClient<R>,
{
}

/// Validate data and options before any computation.
pub fn validate_options<R: Runtime<DType = DType>>(
    data: &Tensor<R>,
    options: &GmmOptions<R>,
    op: &'static str,
) -> MixtureResult<()> {
    validate_float_dtype(data.dtype(), op)?;
    validate_data_2d(data.shape(), op)?;
    validate_n_components(options.n_components, data.shape()[0], op)?;
    validate_non_negative(options.tol, "tol", op)?;
    validate_non_negative(options.reg_covar, "reg_covar", op)?;
    if options.n_init == 0 {
        return Err(MixtureError::InvalidArgument {
            arg: "n_init",
            reason: format!("{op} requires n_init >= 1"),
        });
    }
    if options.strict_numeric_mode && !options.init.is_random() {
        return Err(MixtureError::UnsupportedConfiguration {
            message: format!(
                "init {:?} is not available in strict numeric mode; use Random or RandomFromData",
                options.init
            ),
        });
    }
    Ok(())
}

/// Fit a mixture to data by EM, keeping the initialization with the highest
/// final lower bound.
pub fn gmm_fit_impl<R, C>(
    client: &C,
    data: &Tensor<R>,
    options: &GmmOptions<R>,
) -> MixtureResult<GmmModel<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    validate_options(data, options, "gmm_fit")?;

    // A fully specified start point gives the same run every time.
    let n_init = if options.has_full_initialization() {
        1
    } else {
        options.n_init
    };

    let mut best_model: Option<GmmModel<R>> = None;
    for init in 0..n_init {
        let model = gmm_fit_single(client, data, options, init)?;
        let better = best_model
            .as_ref()
            .is_none_or(|best| model.lower_bound > best.lower_bound);
        if better {
            best_model = Some(model);
        }
    }

    let best = best_model.ok_or_else(|| MixtureError::InvalidArgument {
        arg: "n_init",
        reason: "n_init must be >= 1 to produce a model".to_string(),
    })?;

    if needs_convergence_warning(&best) {
        log::warn!(
            "Best of {} initializations did not converge within {} iterations. \
             Try different init parameters, increase max_iter or tol, or check for \
             degenerate data.",
            n_init,
            options.max_iter
        );
    }
    Ok(best)
}

/// The selected run stopped on `max_iter`; runs with `max_iter == 0` stay
/// `Initialized` and are not reported.
fn needs_convergence_warning<R: Runtime<DType = DType>>(best: &GmmModel<R>) -> bool {
    best.state == FitState::MaxIterReached
}

fn gmm_fit_single<R, C>(
    client: &C,
    data: &Tensor<R>,
    options: &GmmOptions<R>,
    init: usize,
) -> MixtureResult<GmmModel<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let mut model = initialize_impl(client, data, None, options)?;
    if options.max_iter == 0 {
        return Ok(model);
    }

    let mut lower_bound = f64::NEG_INFINITY;
    let mut state = FitState::MaxIterReached;
    for iter in 1..=options.max_iter {
        let prev_lower_bound = lower_bound;
        let e_step = e_step_impl(client, &model, data)?;
        m_step_impl(client, &mut model, data, &e_step.log_resp, options.reg_covar)?;
        lower_bound = e_step.log_prob_norm;
        model.n_iter = iter;

        let change = lower_bound - prev_lower_bound;
        log::debug!(
            "gmm init {init} iter {iter}: lower bound {lower_bound:.6}, change {change:.3e}"
        );
        if change.abs() < options.tol {
            state = FitState::Converged;
            log::info!("gmm init {init} converged after {iter} iterations");
            break;
        }
    }

    model.state = state;
    model.lower_bound = lower_bound;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixture::traits::gmm::GmmInit;
    use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

    fn setup() -> (CpuClient, CpuDevice) {
        let device = CpuDevice::new();
        let client = CpuClient::new(device.clone());
        (client, device)
    }

    fn line(device: &CpuDevice) -> Tensor<CpuRuntime> {
        Tensor::<CpuRuntime>::from_slice(
            &[0.0f64, 0.1, 0.2, 0.3, 5.0, 5.1, 5.2, 5.3],
            &[8, 1],
            device,
        )
    }

    #[test]
    fn test_warns_when_selected_run_stops_on_max_iter() {
        let (client, device) = setup();
        let data = line(&device);

        // tol = 0 never converges
        let options = GmmOptions {
            n_components: 2,
            tol: 0.0,
            max_iter: 2,
            init: GmmInit::RandomFromData,
            ..Default::default()
        };
        let model = gmm_fit_impl(&client, &data, &options).unwrap();
        assert_eq!(model.state, FitState::MaxIterReached);
        assert!(needs_convergence_warning(&model));

        let options = GmmOptions {
            max_iter: 0,
            ..options
        };
        let model = gmm_fit_impl(&client, &data, &options).unwrap();
        assert!(!needs_convergence_warning(&model));

        let options = GmmOptions {
            tol: 1e-3,
            max_iter: 100,
            ..options
        };
        let model = gmm_fit_impl(&client, &data, &options).unwrap();
        assert_eq!(model.converged(), !needs_convergence_warning(&model));
    }

    #[test]
    fn test_validate_options_rejects_zero_n_init() {
        let (_client, device) = setup();
        let data = line(&device);
        let options = GmmOptions::<CpuRuntime> {
            n_init: 0,
            ..Default::default()
        };
        assert!(matches!(
            validate_options(&data, &options, "test"),
            Err(MixtureError::InvalidArgument { arg: "n_init", .. })
        ));
    }
}
