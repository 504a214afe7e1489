//! Dense factorizations for the precision-Cholesky engine.
//!
//! Thin wrappers over numr's `LinearAlgebraAlgorithms`. Each factorization
//! returns `None` when its input is not positive definite so the caller can
//! report the error that fits its context.

use numr::dtype::DType;
use super::gmm::MixtureClient;
use super::helpers::{index_tensor, tensor_to_f64};
use crate::mixture::error::MixtureResult;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Diagonal of a `[d, d]` matrix as `[d]`.
pub fn diagonal<R, C>(client: &C, matrix: &Tensor<R>) -> MixtureResult<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let d = matrix.shape()[0];
    let positions: Vec<usize> = (0..d).map(|i| i * (d + 1)).collect();
    let flat = matrix.contiguous().reshape(&[d * d])?;
    Ok(client.index_select(&flat, 0, &index_tensor::<R>(&positions, matrix.device()))?)
}

/// Lower Cholesky factor `L` with `L·Lᵀ = a`.
pub fn cholesky_lower<R, C>(client: &C, a: &Tensor<R>) -> MixtureResult<Option<Tensor<R>>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let l = match client.cholesky_decompose(&a.contiguous()) {
        Ok(decomposition) => decomposition.l,
        Err(_) => return Ok(None),
    };
    // NaN pivots slip through the positivity test.
    let pivots = tensor_to_f64(&diagonal(client, &l)?)?;
    if pivots.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return Ok(None);
    }
    Ok(Some(l))
}

/// Upper-triangular `U = L⁻ᵀ` for `cov = L·Lᵀ`, so that `U·Uᵀ = cov⁻¹`.
pub fn inverse_cholesky_factor<R, C>(client: &C, cov: &Tensor<R>) -> MixtureResult<Option<Tensor<R>>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let Some(l) = cholesky_lower(client, cov)? else {
        return Ok(None);
    };
    let eye = client.eye(l.shape()[0], None, l.dtype())?;
    let l_inv = client.solve_triangular_lower(&l, &eye, false)?;
    Ok(Some(l_inv.transpose(0, 1)?.contiguous()))
}

/// Upper-triangular `U` with `U·Uᵀ = precision`.
///
/// `chol(J·P·J)` is lower with `L·Lᵀ = J·P·J`, so `U = J·L·J` is upper and
/// satisfies `U·Uᵀ = P` (`J` reverses rows or columns).
pub fn upper_cholesky_of_precision<R, C>(
    client: &C,
    precision: &Tensor<R>,
) -> MixtureResult<Option<Tensor<R>>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let flipped = precision.flip_dims(&[0, 1])?.contiguous();
    let Some(l) = cholesky_lower(client, &flipped)? else {
        return Ok(None);
    };
    Ok(Some(l.flip_dims(&[0, 1])?.contiguous()))
}

/// Add `value` to the diagonal of a `[d, d]` tensor.
pub fn add_to_diagonal<R, C>(client: &C, matrix: &Tensor<R>, value: f64) -> MixtureResult<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let eye = client.eye(matrix.shape()[0], None, matrix.dtype())?;
    Ok(client.add(matrix, &client.mul_scalar(&eye, value)?)?)
}
