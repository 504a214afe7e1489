//! Generic mixture implementations, usable with any client satisfying
//! [`MixtureClient`].

pub mod estimate;
pub mod gmm;
pub mod helpers;
pub mod init;
pub mod kmeans;
pub mod linalg;
pub mod log_prob;
pub mod model;
pub mod precision;

pub use estimate::estimate_gaussian_parameters_impl;
pub use gmm::{MixtureClient, gmm_fit_impl};
pub use log_prob::{log_det_cholesky_impl, log_gaussian_prob_impl};
pub use model::{
    aic_from_score, aic_impl, bic_from_score, bic_impl, e_step_impl, initialize_impl, m_step_impl,
    precisions_impl, predict_impl, predict_proba_impl, score_impl, score_samples_impl,
    set_parameters_impl,
};
pub use precision::{
    compute_precision_cholesky_from_precisions_impl, compute_precision_cholesky_impl,
    precisions_from_cholesky_impl,
};
