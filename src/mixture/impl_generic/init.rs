//! Initial responsibilities for the EM driver.

use numr::dtype::DType;
use super::gmm::MixtureClient;
use super::helpers::tensor_from_f64;
use super::kmeans::{kmeans_labels, kmeans_plusplus_indices};
use crate::mixture::error::MixtureResult;
use crate::mixture::traits::gmm::GmmInit;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// `[n, k]` responsibilities with `resp[rows[j], j] = 1` for each `j`.
fn indicator_resp<R: Runtime<DType = DType>>(
    rows: &[usize],
    n: usize,
    k: usize,
    data: &Tensor<R>,
) -> MixtureResult<Tensor<R>> {
    let mut resp = vec![0.0; n * k];
    for (j, &i) in rows.iter().enumerate() {
        resp[i * k + j] = 1.0;
    }
    tensor_from_f64::<R>(&resp, &[n, k], data.dtype(), data.device())
}

/// Initial `[n, k]` responsibilities for `init`.
pub fn initial_responsibilities<R, C>(
    client: &C,
    data: &Tensor<R>,
    k: usize,
    init: GmmInit,
) -> MixtureResult<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let n = data.shape()[0];
    match init {
        GmmInit::KMeans => {
            let labels: Vec<i64> = kmeans_labels(client, data, k)?.contiguous().to_vec();
            let mut resp = vec![0.0; n * k];
            for (i, &label) in labels.iter().enumerate() {
                resp[i * k + label as usize] = 1.0;
            }
            tensor_from_f64::<R>(&resp, &[n, k], data.dtype(), data.device())
        }
        GmmInit::KMeansPlusPlus => {
            let seeds = kmeans_plusplus_indices(client, data, k)?;
            indicator_resp(&seeds, n, k, data)
        }
        GmmInit::Random => {
            let resp = client.rand(&[n, k], data.dtype())?;
            let row_sums = client.sum(&resp, &[1], true)?; // [n, 1]
            Ok(client.div(&resp, &row_sums.broadcast_to(&[n, k])?)?)
        }
        GmmInit::RandomFromData => {
            let perm: Vec<i64> = client.randperm(n)?.contiguous().to_vec();
            let rows: Vec<usize> = perm.iter().take(k).map(|&i| i as usize).collect();
            indicator_resp(&rows, n, k, data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixture::impl_generic::helpers::tensor_to_f64;
    use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

    fn setup() -> (CpuClient, CpuDevice) {
        let device = CpuDevice::new();
        let client = CpuClient::new(device.clone());
        (client, device)
    }

    fn sample_data(device: &CpuDevice) -> Tensor<CpuRuntime> {
        #[rustfmt::skip]
        let data = Tensor::<CpuRuntime>::from_slice(
            &[
                1.0f64, 2.0,
                1.0, 4.0,
                1.0, 0.0,
                10.0, 2.0,
                10.0, 4.0,
                10.0, 0.0,
            ],
            &[6, 2],
            device,
        );
        data
    }

    #[test]
    fn test_rows_sum_to_one_for_every_strategy() {
        let (client, device) = setup();
        let data = sample_data(&device);
        for init in [
            GmmInit::KMeans,
            GmmInit::KMeansPlusPlus,
            GmmInit::Random,
            GmmInit::RandomFromData,
        ] {
            let resp = initial_responsibilities(&client, &data, 2, init).unwrap();
            assert_eq!(resp.shape(), &[6, 2]);
            let values = tensor_to_f64(&resp).unwrap();
            assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
            if matches!(init, GmmInit::KMeans | GmmInit::Random) {
                for row in values.chunks(2) {
                    assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12, "{init:?}");
                }
            }
        }
    }

    #[test]
    fn test_indicator_strategies_mark_one_sample_per_component() {
        let (client, device) = setup();
        let data = sample_data(&device);
        for init in [GmmInit::KMeansPlusPlus, GmmInit::RandomFromData] {
            let resp = initial_responsibilities(&client, &data, 2, init).unwrap();
            let values = tensor_to_f64(&resp).unwrap();
            for j in 0..2 {
                let column: f64 = (0..6).map(|i| values[i * 2 + j]).sum();
                assert_eq!(column, 1.0);
            }
        }
    }
}
