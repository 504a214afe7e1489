//! k-means seeding and Lloyd refinement used to initialize responsibilities.

use super::gmm::MixtureClient;
use super::helpers::{index_tensor, scalar_value, tensor_to_f64};
use crate::mixture::error::MixtureResult;
use numr::dtype::DType;
use numr::ops::{DistanceMetric, ScatterReduceOp};
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Lloyd iterations for the k-means initialization.
const KMEANS_MAX_ITER: usize = 100;
/// Relative inertia change below which Lloyd iterations stop.
const KMEANS_REL_TOL: f64 = 1e-4;

/// Draw a uniform value in `[0, 1)` from the client's generator.
fn uniform<R, C>(client: &C, dtype: DType) -> MixtureResult<f64>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    scalar_value(&client.rand(&[1], dtype)?)
}

/// k-means++ seeding: sample indices with probability proportional to the
/// squared distance to the nearest seed chosen so far.
pub fn kmeans_plusplus_indices<R, C>(
    client: &C,
    data: &Tensor<R>,
    k: usize,
) -> MixtureResult<Vec<usize>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let n = data.shape()[0];
    let dtype = data.dtype();
    let device = data.device();

    let first = ((uniform(client, dtype)? * n as f64) as usize).min(n - 1);
    let mut indices = vec![first];

    while indices.len() < k {
        let seeds = client.index_select(data, 0, &index_tensor::<R>(&indices, device))?;
        let dists = client.cdist(data, &seeds, DistanceMetric::SquaredEuclidean)?;
        let min_dists = tensor_to_f64(&client.min(&dists, &[1], false)?)?; // [n]
        let total: f64 = min_dists.iter().sum();

        let next = if total > 0.0 && total.is_finite() {
            let threshold = uniform(client, dtype)? * total;
            let mut cumulative = 0.0;
            let mut chosen = None;
            for (i, &w) in min_dists.iter().enumerate() {
                cumulative += w;
                if w > 0.0 && cumulative >= threshold {
                    chosen = Some(i);
                    break;
                }
            }
            // Rounding can leave the threshold just above the final sum.
            chosen.or_else(|| min_dists.iter().rposition(|&w| w > 0.0))
        } else {
            None
        };
        // All remaining points coincide with a seed.
        let next = next.unwrap_or_else(|| (0..n).find(|i| !indices.contains(i)).unwrap_or(0));
        indices.push(next);
    }

    Ok(indices)
}

/// One Lloyd step: assign points, then move centroids to the mean of their
/// points. Empty clusters keep their previous centroid.
///
/// Returns `(new_centroids, labels, inertia)`.
fn lloyd_step<R, C>(
    client: &C,
    data: &Tensor<R>,
    centroids: &Tensor<R>,
) -> MixtureResult<(Tensor<R>, Tensor<R>, f64)>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let n = data.shape()[0];
    let k = centroids.shape()[0];
    let d = data.shape()[1];
    let dtype = data.dtype();
    let device = data.device();

    let dists = client.cdist(data, centroids, DistanceMetric::SquaredEuclidean)?; // [n, k]
    let labels = client.argmin(&dists, 1, false)?; // [n] I64
    let inertia = scalar_value(&client.sum(&client.min(&dists, &[1], false)?, &[0], false)?)?;

    let labels_expanded = labels.unsqueeze(1)?.broadcast_to(&[n, d])?;
    let dst = Tensor::<R>::zeros(&[k, d], dtype, device);
    let sums = client.scatter_reduce(
        &dst,
        0,
        &labels_expanded,
        data,
        ScatterReduceOp::Sum,
        false,
    )?;

    let counts = client.cast(&client.bincount(&labels, None, k)?, dtype)?; // [k]
    let zeros = Tensor::<R>::zeros(&[k], dtype, device);
    let ones = Tensor::<R>::ones(&[k], dtype, device);
    let is_empty = client.eq(&counts, &zeros)?;
    let safe_counts = client.where_cond(&is_empty, &ones, &counts)?;
    let means = client.div(&sums, &safe_counts.unsqueeze(1)?.broadcast_to(&[k, d])?)?;
    let is_empty = is_empty.unsqueeze(1)?.broadcast_to(&[k, d])?;
    let new_centroids = client.where_cond(&is_empty, centroids, &means)?;

    Ok((new_centroids, labels, inertia))
}

/// Cluster labels `[n]` (I64) from one k-means run seeded with k-means++.
pub fn kmeans_labels<R, C>(client: &C, data: &Tensor<R>, k: usize) -> MixtureResult<Tensor<R>>
where
    R: Runtime<DType = DType>,
    C: MixtureClient<R>,
{
    let seeds = kmeans_plusplus_indices(client, data, k)?;
    let mut centroids = client.index_select(data, 0, &index_tensor::<R>(&seeds, data.device()))?;
    let mut prev_inertia = f64::INFINITY;

    for _ in 0..KMEANS_MAX_ITER {
        let (new_centroids, _, inertia) = lloyd_step(client, data, &centroids)?;
        centroids = new_centroids;
        if (prev_inertia - inertia).abs() <= KMEANS_REL_TOL * inertia.abs() {
            break;
        }
        prev_inertia = inertia;
    }

    let dists = client.cdist(data, &centroids, DistanceMetric::SquaredEuclidean)?;
    Ok(client.argmin(&dists, 1, false)?)
}
