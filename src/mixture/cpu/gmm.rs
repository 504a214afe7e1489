//! CPU implementation of Gaussian Mixture Model.

use crate::mixture::error::MixtureResult;
use crate::mixture::impl_generic::{
    aic_impl, bic_impl, compute_precision_cholesky_from_precisions_impl,
    compute_precision_cholesky_impl, e_step_impl, estimate_gaussian_parameters_impl,
    gmm_fit_impl, initialize_impl, log_gaussian_prob_impl, m_step_impl, precisions_impl,
    predict_impl, predict_proba_impl, score_impl, score_samples_impl, set_parameters_impl,
};
use crate::mixture::traits::gmm::{
    CovarianceTensor, CovarianceType, EStep, GaussianParameters, GmmAlgorithms, GmmModel,
    GmmOptions, GmmParameters,
};
use numr::runtime::cpu::{CpuClient, CpuRuntime};
use numr::tensor::Tensor;

impl GmmAlgorithms<CpuRuntime> for CpuClient {
    fn gmm_fit(
        &self,
        data: &Tensor<CpuRuntime>,
        options: &GmmOptions<CpuRuntime>,
    ) -> MixtureResult<GmmModel<CpuRuntime>> {
        gmm_fit_impl(self, data, options)
    }

    fn gmm_initialize(
        &self,
        data: &Tensor<CpuRuntime>,
        resp: Option<&Tensor<CpuRuntime>>,
        options: &GmmOptions<CpuRuntime>,
    ) -> MixtureResult<GmmModel<CpuRuntime>> {
        initialize_impl(self, data, resp, options)
    }

    fn gmm_e_step(
        &self,
        model: &GmmModel<CpuRuntime>,
        data: &Tensor<CpuRuntime>,
    ) -> MixtureResult<EStep<CpuRuntime>> {
        e_step_impl(self, model, data)
    }

    fn gmm_m_step(
        &self,
        model: &mut GmmModel<CpuRuntime>,
        data: &Tensor<CpuRuntime>,
        log_resp: &Tensor<CpuRuntime>,
        reg_covar: f64,
    ) -> MixtureResult<()> {
        m_step_impl(self, model, data, log_resp, reg_covar)
    }

    fn gmm_estimate_parameters(
        &self,
        data: &Tensor<CpuRuntime>,
        resp: &Tensor<CpuRuntime>,
        reg_covar: f64,
        covariance_type: CovarianceType,
    ) -> MixtureResult<GaussianParameters<CpuRuntime>> {
        estimate_gaussian_parameters_impl(self, data, resp, reg_covar, covariance_type)
    }

    fn gmm_precision_cholesky(
        &self,
        covariances: &CovarianceTensor<CpuRuntime>,
    ) -> MixtureResult<CovarianceTensor<CpuRuntime>> {
        compute_precision_cholesky_impl(self, covariances)
    }

    fn gmm_precision_cholesky_from_precisions(
        &self,
        precisions: &CovarianceTensor<CpuRuntime>,
    ) -> MixtureResult<CovarianceTensor<CpuRuntime>> {
        compute_precision_cholesky_from_precisions_impl(self, precisions)
    }

    fn gmm_log_gaussian_prob(
        &self,
        data: &Tensor<CpuRuntime>,
        means: &Tensor<CpuRuntime>,
        precisions_cholesky: &CovarianceTensor<CpuRuntime>,
    ) -> MixtureResult<Tensor<CpuRuntime>> {
        log_gaussian_prob_impl(self, data, means, precisions_cholesky)
    }

    fn gmm_predict(
        &self,
        model: &GmmModel<CpuRuntime>,
        data: &Tensor<CpuRuntime>,
    ) -> MixtureResult<Tensor<CpuRuntime>> {
        predict_impl(self, model, data)
    }

    fn gmm_predict_proba(
        &self,
        model: &GmmModel<CpuRuntime>,
        data: &Tensor<CpuRuntime>,
    ) -> MixtureResult<Tensor<CpuRuntime>> {
        predict_proba_impl(self, model, data)
    }

    fn gmm_score_samples(
        &self,
        model: &GmmModel<CpuRuntime>,
        data: &Tensor<CpuRuntime>,
    ) -> MixtureResult<Tensor<CpuRuntime>> {
        score_samples_impl(self, model, data)
    }

    fn gmm_score(
        &self,
        model: &GmmModel<CpuRuntime>,
        data: &Tensor<CpuRuntime>,
    ) -> MixtureResult<f64> {
        score_impl(self, model, data)
    }

    fn gmm_aic(
        &self,
        model: &GmmModel<CpuRuntime>,
        data: &Tensor<CpuRuntime>,
    ) -> MixtureResult<f64> {
        aic_impl(self, model, data)
    }

    fn gmm_bic(
        &self,
        model: &GmmModel<CpuRuntime>,
        data: &Tensor<CpuRuntime>,
    ) -> MixtureResult<f64> {
        bic_impl(self, model, data)
    }

    fn gmm_set_parameters(
        &self,
        parameters: GmmParameters<CpuRuntime>,
    ) -> MixtureResult<GmmModel<CpuRuntime>> {
        set_parameters_impl(self, parameters)
    }

    fn gmm_precisions(
        &self,
        model: &GmmModel<CpuRuntime>,
    ) -> MixtureResult<CovarianceTensor<CpuRuntime>> {
        precisions_impl(self, model)
    }
}
