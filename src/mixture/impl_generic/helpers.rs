//! Helpers shared by the mixture implementations.
//!
//! Validators and scalar read-backs inspect values on the host; the
//! conversions here keep the caller's dtype on the way back.

use crate::mixture::error::{MixtureError, MixtureResult};
use numr::dtype::DType;
use numr::ops::{BinaryOps, ReduceOps, UnaryOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Copy a float tensor to the host as `f64` values in row-major order.
pub fn tensor_to_f64<R: Runtime<DType = DType>>(t: &Tensor<R>) -> MixtureResult<Vec<f64>> {
    let t = t.contiguous();
    match t.dtype() {
        DType::F32 => {
            let data: Vec<f32> = t.to_vec();
            Ok(data.into_iter().map(f64::from).collect())
        }
        DType::F64 => Ok(t.to_vec()),
        dtype => Err(MixtureError::UnsupportedDType {
            dtype,
            op: "tensor_to_f64",
        }),
    }
}

/// Build a tensor of `dtype` from host `f64` values.
pub fn tensor_from_f64<R: Runtime<DType = DType>>(
    data: &[f64],
    shape: &[usize],
    dtype: DType,
    device: &R::Device,
) -> MixtureResult<Tensor<R>> {
    match dtype {
        DType::F32 => {
            let narrowed: Vec<f32> = data.iter().map(|&v| v as f32).collect();
            Ok(Tensor::<R>::from_slice(&narrowed, shape, device))
        }
        DType::F64 => Ok(Tensor::<R>::from_slice(data, shape, device)),
        dtype => Err(MixtureError::UnsupportedDType {
            dtype,
            op: "tensor_from_f64",
        }),
    }
}

/// Extract a scalar from a 1-element tensor.
pub fn scalar_value<R: Runtime<DType = DType>>(t: &Tensor<R>) -> MixtureResult<f64> {
    if t.numel() != 1 {
        return Err(MixtureError::InvalidArgument {
            arg: "tensor",
            reason: format!("expected scalar (1 element), got {} elements", t.numel()),
        });
    }
    Ok(tensor_to_f64(t)?[0])
}

/// Machine epsilon of a float dtype.
pub fn machine_epsilon(dtype: DType) -> f64 {
    match dtype {
        DType::F32 => f32::EPSILON as f64,
        _ => f64::EPSILON,
    }
}

/// 1-D I64 index tensor for `index_select`.
pub fn index_tensor<R: Runtime<DType = DType>>(indices: &[usize], device: &R::Device) -> Tensor<R> {
    let idx: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
    Tensor::<R>::from_slice(&idx, &[idx.len()], device)
}

/// Row-wise log-sum-exp of an `[n, k]` tensor, returned as `[n, 1]`.
pub fn log_sum_exp_rows<R, C>(client: &C, t: &Tensor<R>) -> MixtureResult<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: BinaryOps<R> + ReduceOps<R> + UnaryOps<R> + RuntimeClient<R>,
{
    let max_log = client.max(t, &[1], true)?; // [n, 1]
    let shifted = client.sub(t, &max_log)?;
    let sum_exp = client.sum(&client.exp(&shifted)?, &[1], true)?;
    Ok(client.add(&client.log(&sum_exp)?, &max_log)?)
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
    fn test_round_trip_keeps_dtype() {
        let (_client, device) = setup();
        let t = tensor_from_f64::<CpuRuntime>(&[1.5, -2.0, 3.25], &[3], DType::F32, &device)
            .unwrap();
        assert_eq!(t.dtype(), DType::F32);
        assert_eq!(tensor_to_f64(&t).unwrap(), vec![1.5, -2.0, 3.25]);
    }

    #[test]
    fn test_log_sum_exp_rows_is_stable() {
        let (client, device) = setup();
        let t = Tensor::<CpuRuntime>::from_slice(&[1000.0f64, 1000.0, 0.0, 0.0], &[2, 2], &device);
        let lse = tensor_to_f64(&log_sum_exp_rows(&client, &t).unwrap()).unwrap();
        assert!((lse[0] - (1000.0 + 2f64.ln())).abs() < 1e-9);
        assert!((lse[1] - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_scalar_value_rejects_vectors() {
        let (_client, device) = setup();
        let t = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 2.0], &[2], &device);
        assert!(scalar_value(&t).is_err());
    }
}
