//! Weighted k-means: k-means++ seeding, 10 deterministic restarts, a 20
//! iteration cap per restart, and lowest-id tie-breaks at every point where
//! floating point equality could otherwise make the outcome order-dependent.

use oce_core::determinism::lowest_id_tie_break;
use oce_core::rng::TieRng;

const RESTARTS: u32 = 10;
const MAX_ITERATIONS: u32 = 20;

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum KMeansError {
    #[error("k-means needs at least k={k} points, got {have}")]
    TooFewPoints { have: usize, k: usize },
    #[error("k must be at least 1")]
    ZeroK,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KMeansResult {
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Run weighted k-means over `points` (row-major, one vector per point),
/// with per-point `weights` (e.g. votes cast), for a fixed `k`, deterministic
/// given `run_seed`. Returns the lowest-inertia result across `RESTARTS`
/// restarts; ties go to the earliest restart index.
pub fn weighted_kmeans(
    points: &[Vec<f64>],
    weights: &[f64],
    k: usize,
    run_seed: u64,
) -> Result<KMeansResult, KMeansError> {
    if k == 0 {
        return Err(KMeansError::ZeroK);
    }
    if points.len() < k {
        return Err(KMeansError::TooFewPoints {
            have: points.len(),
            k,
        });
    }

    let mut best: Option<KMeansResult> = None;

    for restart in 0..RESTARTS {
        let mut rng = TieRng::for_restart(run_seed, restart);
        let centroids = init_plus_plus(points, k, &mut rng);
        let result = run_to_convergence(points, weights, centroids);
        match &best {
            Some(b) if b.inertia <= result.inertia => {}
            _ => best = Some(result),
        }
    }

    Ok(best.expect("RESTARTS > 0"))
}

fn init_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut TieRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    let first = rng.gen_range(points.len() as u64).unwrap_or(0) as usize;
    centroids.push(points[first].clone());

    while centroids.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| sq_dist(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let chosen = rng.weighted_choice(&weights).unwrap_or(0);
        centroids.push(points[chosen].clone());
    }
    centroids
}

fn run_to_convergence(
    points: &[Vec<f64>],
    weights: &[f64],
    mut centroids: Vec<Vec<f64>>,
) -> KMeansResult {
    let k = centroids.len();
    let dims = centroids.first().map(|c| c.len()).unwrap_or(0);
    let mut assignments = vec![0usize; points.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let dists: Vec<f64> = centroids.iter().map(|c| sq_dist(p, c)).collect();
            let min_dist = dists.iter().cloned().fold(f64::INFINITY, f64::min);
            let candidates: Vec<usize> = dists
                .iter()
                .enumerate()
                .filter(|(_, d)| (**d - min_dist).abs() < 1e-12)
                .map(|(idx, _)| idx)
                .collect();
            let assigned = lowest_id_tie_break(&candidates).unwrap_or(0);
            if assignments[i] != assigned {
                changed = true;
            }
            assignments[i] = assigned;
        }

        let mut sums = vec![vec![0.0f64; dims]; k];
        let mut weight_totals = vec![0.0f64; k];
        for (i, p) in points.iter().enumerate() {
            let c = assignments[i];
            let w = weights.get(i).copied().unwrap_or(1.0);
            for d in 0..dims {
                sums[c][d] += p[d] * w;
            }
            weight_totals[c] += w;
        }
        for c in 0..k {
            if weight_totals[c] > 0.0 {
                for d in 0..dims {
                    centroids[c][d] = sums[c][d] / weight_totals[c];
                }
            }
        }

        if !changed {
            break;
        }
    }

    let inertia: f64 = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let w = weights.get(i).copied().unwrap_or(1.0);
            w * sq_dist(p, &centroids[assignments[i]])
        })
        .sum();

    KMeansResult {
        assignments,
        centroids,
        inertia,
    }
}
