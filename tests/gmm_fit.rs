//! End-to-end fitting through the public API.

use approx::assert_relative_eq;
use mixr::{
    CovarianceTensor, CovarianceType, FitState, GmmAlgorithms, GmmInit, GmmOptions,
    MixtureError,
};
use numr::dtype::DType;
use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
use numr::tensor::Tensor;

fn setup() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuClient::new(device.clone());
    (client, device)
}

/// Two tight blobs around (0, 0) and (6, 6).
fn blobs(device: &CpuDevice) -> Tensor<CpuRuntime> {
    #[rustfmt::skip]
    let data = Tensor::<CpuRuntime>::from_slice(
        &[
            0.0f64, 0.1,
            0.2, -0.1,
            -0.1, 0.0,
            0.1, 0.2,
            -0.2, -0.2,
            6.0, 6.1,
            6.2, 5.9,
            5.9, 6.0,
            6.1, 6.2,
            5.8, 5.8,
        ],
        &[10, 2],
        device,
    );
    data
}

fn assert_split(labels: &[i64]) {
    assert!(labels[..5].iter().all(|&l| l == labels[0]));
    assert!(labels[5..].iter().all(|&l| l == labels[5]));
    assert_ne!(labels[0], labels[5]);
}

#[test]
fn every_init_separates_blobs() {
    let (client, device) = setup();
    let data = blobs(&device);
    for init in [
        GmmInit::KMeans,
        GmmInit::KMeansPlusPlus,
        GmmInit::Random,
        GmmInit::RandomFromData,
    ] {
        let options = GmmOptions {
            n_components: 2,
            covariance_type: CovarianceType::Spherical,
            n_init: 10,
            init,
            ..Default::default()
        };
        let model = client.gmm_fit(&data, &options).unwrap();
        let labels: Vec<i64> = client.gmm_predict(&model, &data).unwrap().to_vec();
        assert_split(&labels);
        assert_ne!(model.state, FitState::Initialized);
        assert!(model.n_iter >= 1);
    }
}

#[test]
fn score_is_mean_of_score_samples() {
    let (client, device) = setup();
    let data = blobs(&device);
    let options = GmmOptions {
        n_components: 2,
        covariance_type: CovarianceType::Tied,
        ..Default::default()
    };
    let model = client.gmm_fit(&data, &options).unwrap();
    let samples: Vec<f64> = client.gmm_score_samples(&model, &data).unwrap().to_vec();
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    assert_relative_eq!(client.gmm_score(&model, &data).unwrap(), mean, epsilon = 1e-10);

    // A converged model scores its own data at the final lower bound.
    if model.converged() {
        assert_relative_eq!(mean, model.lower_bound, epsilon = options.tol * 10.0);
    }
}

#[test]
fn parameters_round_trip_through_model() {
    let (client, device) = setup();
    let data = blobs(&device);
    let options = GmmOptions {
        n_components: 2,
        covariance_type: CovarianceType::Full,
        ..Default::default()
    };
    let fitted = client.gmm_fit(&data, &options).unwrap();
    let rebuilt = client
        .gmm_set_parameters(fitted.parameters().unwrap())
        .unwrap();

    let a: Vec<f64> = client.gmm_score_samples(&fitted, &data).unwrap().to_vec();
    let b: Vec<f64> = client.gmm_score_samples(&rebuilt, &data).unwrap().to_vec();
    for (x, y) in a.iter().zip(b.iter()) {
        assert_relative_eq!(x, y, epsilon = 1e-9);
    }
    assert_eq!(rebuilt.n_parameters(), 2 * 3 + 2 * 2 + 1);
}

#[test]
fn rejects_user_parameters_with_wrong_shape() {
    let (client, device) = setup();
    let data = blobs(&device);
    let options = GmmOptions {
        n_components: 2,
        means_init: Some(Tensor::<CpuRuntime>::zeros(&[3, 2], DType::F64, &device)),
        ..Default::default()
    };
    let err = client.gmm_fit(&data, &options).unwrap_err();
    match err {
        MixtureError::ShapeMismatch {
            parameter,
            expected,
            got,
        } => {
            assert_eq!(parameter, "means");
            assert_eq!(expected, vec![2, 2]);
            assert_eq!(got, vec![3, 2]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn rejects_indefinite_precisions() {
    let (client, device) = setup();
    let data = blobs(&device);
    #[rustfmt::skip]
    let precisions = Tensor::<CpuRuntime>::from_slice(
        &[
            1.0f64, 0.0, 0.0, 1.0,
            1.0, 3.0, 3.0, 1.0,
        ],
        &[2, 2, 2],
        &device,
    );
    let options = GmmOptions {
        n_components: 2,
        precisions_init: Some(precisions),
        ..Default::default()
    };
    assert!(matches!(
        client.gmm_fit(&data, &options),
        Err(MixtureError::NotPositiveDefinite { .. })
    ));
}

#[test]
fn f32_ill_conditioned_error_suggests_f64() {
    let (client, device) = setup();
    let zeros = CovarianceTensor::Diagonal(Tensor::<CpuRuntime>::zeros(
        &[2, 3],
        DType::F32,
        &device,
    ));
    let err = client.gmm_precision_cholesky(&zeros).unwrap_err();
    assert!(err.to_string().contains("F64"));
}
