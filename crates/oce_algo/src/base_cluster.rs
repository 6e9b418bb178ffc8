//! Base clustering: the first of the two clustering passes. `k_base` is
//! derived from the voter count rather than chosen by silhouette, since the
//! base layer exists to compress the voter population into a manageable
//! number of fine-grained cells before the group layer looks for structure.

use crate::kmeans::{weighted_kmeans, KMeansError, KMeansResult};
use crate::matrix::VoteMatrix;
use crate::pca::Projection;

const K_BASE_MIN: u32 = 10;
const K_BASE_MAX: u32 = 100;
const K_BASE_DIVISOR: u32 = 10;

/// `k_base = clamp(n_voters / 10, 10, 100)`.
pub fn k_base_for(n_voters: usize) -> usize {
    let raw = (n_voters as u32) / K_BASE_DIVISOR;
    raw.clamp(K_BASE_MIN, K_BASE_MAX) as usize
}

#[derive(Clone, Debug, PartialEq)]
pub struct BaseClustering {
    pub k: usize,
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
}

pub fn cluster(
    matrix: &VoteMatrix,
    projection: &Projection,
    run_seed: u64,
) -> Result<BaseClustering, KMeansError> {
    let k = k_base_for(matrix.n_voters());
    let weights: Vec<f64> = matrix.row_nnz.iter().map(|n| *n as f64).collect();
    let KMeansResult {
        assignments,
        centroids,
        ..
    } = weighted_kmeans(&projection.coords, &weights, k, run_seed)?;
    Ok(BaseClustering {
        k,
        assignments,
        centroids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_base_respects_floor() {
        assert_eq!(k_base_for(5), 10);
        assert_eq!(k_base_for(0), 10);
    }

    #[test]
    fn k_base_respects_ceiling() {
        assert_eq!(k_base_for(100_000), 100);
    }

    #[test]
    fn k_base_scales_in_between() {
        assert_eq!(k_base_for(500), 50);
    }
}
