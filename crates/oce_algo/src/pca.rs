//! Sparse PCA projection: column-mean-centers the vote matrix over observed
//! entries only, rescales each voter's row by `sqrt(N_items / votes_cast)` to
//! stop sparse voters from being pulled toward the origin, then takes the
//! leading singular vectors via `nalgebra`'s SVD.

use crate::matrix::VoteMatrix;
use nalgebra::DMatrix;
use oce_core::rng::TieRng;

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum PcaError {
    #[error("pca did not converge to finite values")]
    Numerical,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PcaConfig {
    /// Number of leading components kept (2 for the visual projection plane).
    pub n_components: usize,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self { n_components: 2 }
    }
}

/// One voter's position in the projected space.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub coords: Vec<Vec<f64>>, // coords[voter_row] = [c0, c1, ...]
    pub explained_variance: Vec<f64>,
}

pub fn project(matrix: &VoteMatrix, cfg: &PcaConfig) -> Result<Projection, PcaError> {
    project_inner(matrix, cfg, None)
}

/// Retry path for an SVD that failed to converge: perturbs the centered
/// matrix with a small deterministic jitter (seeded, so two retries of the
/// same failing input are reproducible) and re-runs. The Run Coordinator
/// calls this exactly once after the unjittered attempt fails, per the
/// "retries once with a small jitter" contract.
pub fn project_jittered(matrix: &VoteMatrix, cfg: &PcaConfig, seed: u64) -> Result<Projection, PcaError> {
    project_inner(matrix, cfg, Some(seed))
}

fn project_inner(matrix: &VoteMatrix, cfg: &PcaConfig, jitter_seed: Option<u64>) -> Result<Projection, PcaError> {
    let n = matrix.n_voters();
    let p = matrix.n_items();

    // Column means over observed entries only.
    let mut col_sum = vec![0.0f64; p];
    let mut col_count = vec![0u32; p];
    for row in &matrix.values {
        for (c, cell) in row.iter().enumerate() {
            if let Some(v) = cell {
                col_sum[c] += v;
                col_count[c] += 1;
            }
        }
    }
    let col_mean: Vec<f64> = col_sum
        .iter()
        .zip(&col_count)
        .map(|(s, c)| if *c > 0 { s / (*c as f64) } else { 0.0 })
        .collect();

    // Centered dense matrix; missing entries are imputed at the column mean,
    // i.e. 0.0 after centering, so they contribute no signal to the SVD.
    let mut dense = DMatrix::<f64>::zeros(n, p);
    for (r, row) in matrix.values.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            dense[(r, c)] = cell.map(|v| v - col_mean[c]).unwrap_or(0.0);
        }
    }

    if let Some(seed) = jitter_seed {
        const JITTER_MAGNITUDE: f64 = 1e-9;
        let mut rng = TieRng::for_restart(seed, 0);
        for r in 0..n {
            for c in 0..p {
                let noise = (rng.gen_range(1_000_001).unwrap_or(500_000) as f64 - 500_000.0)
                    / 500_000.0
                    * JITTER_MAGNITUDE;
                dense[(r, c)] += noise;
            }
        }
    }

    let svd = dense.clone().svd(true, true);
    let u = svd.u.ok_or(PcaError::Numerical)?;
    let singular_values = svd.singular_values;

    // The SVD can yield fewer than `n_components` singular values — a
    // single-item matrix has rank at most 1, for instance. Columns the SVD
    // didn't produce are left at a finite 0.0 rather than failing the Run:
    // a degenerate input still projects to a valid (if less informative)
    // point in the n-component space.
    let want = cfg.n_components;
    let available = want.min(singular_values.len());
    let mut coords = vec![vec![0.0f64; want]; n];
    for r in 0..n {
        let nnz = matrix.row_nnz[r].max(1) as f64;
        let rescale = (p as f64 / nnz).sqrt();
        for c in 0..available {
            let v = u[(r, c)] * singular_values[c] * rescale;
            if !v.is_finite() {
                return Err(PcaError::Numerical);
            }
            coords[r][c] = v;
        }
    }

    let total_energy: f64 = singular_values.iter().map(|s| s * s).sum();
    let mut explained_variance = vec![0.0f64; want];
    if total_energy > 0.0 {
        for c in 0..available {
            explained_variance[c] = (singular_values[c] * singular_values[c]) / total_energy;
        }
    }

    Ok(Projection {
        coords,
        explained_variance,
    })
}
