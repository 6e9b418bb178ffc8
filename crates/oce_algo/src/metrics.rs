//! Per-cluster and per-(cluster, item) diagnostics: silhouette (used
//! internally to pick group-cluster `k`), consensus (entropy-based
//! agreement), voting patterns, and pairwise voter similarity (computed only
//! on demand from `oce_query`, never during the batch run).

use crate::matrix::VoteMatrix;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Category {
    Support,
    Oppose,
    Neutral,
}

/// Recover the discrete category from an encoded cell. Support/Oppose are
/// encoded at exactly +-1.0; anything strictly between is the (non-zero)
/// neutral encoding.
pub fn classify(v: f64) -> Category {
    if v >= 0.5 {
        Category::Support
    } else if v <= -0.5 {
        Category::Oppose
    } else {
        Category::Neutral
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

/// Mean silhouette coefficient over `points`, given a cluster `assignments`
/// vector. Singleton clusters contribute 0 for their member (no `b`
/// comparison is meaningful), matching the standard convention.
pub fn silhouette_score(points: &[Vec<f64>], assignments: &[usize]) -> f64 {
    let n = points.len();
    if n == 0 {
        return 0.0;
    }
    let k = assignments.iter().copied().max().map(|m| m + 1).unwrap_or(0);
    if k < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = assignments[i];
        let mut same_sum = 0.0;
        let mut same_count = 0usize;
        let mut other_sums = vec![0.0f64; k];
        let mut other_counts = vec![0usize; k];

        for j in 0..n {
            if i == j {
                continue;
            }
            let d = euclidean(&points[i], &points[j]);
            if assignments[j] == own {
                same_sum += d;
                same_count += 1;
            } else {
                other_sums[assignments[j]] += d;
                other_counts[assignments[j]] += 1;
            }
        }

        if same_count == 0 {
            continue; // singleton cluster: contributes 0
        }
        let a = same_sum / same_count as f64;
        let b = (0..k)
            .filter(|&c| c != own && other_counts[c] > 0)
            .map(|c| other_sums[c] / other_counts[c] as f64)
            .fold(f64::INFINITY, f64::min);
        if !b.is_finite() {
            continue;
        }
        let denom = a.max(b);
        let s = if denom > 0.0 { (b - a) / denom } else { 0.0 };
        total += s;
    }
    total / n as f64
}

/// Entropy-based consensus contribution for one item's vote counts:
/// `1 - H / H_max`, `H_max = ln(3)`. `None` if the item got no votes at all
/// (the caller must omit it from the cluster-level average, not treat it as
/// zero consensus).
fn item_consensus(support: u32, oppose: u32, neutral: u32) -> Option<f64> {
    let total = support + oppose + neutral;
    if total == 0 {
        return None;
    }
    let h_max = 3.0f64.ln();
    let h: f64 = [support, oppose, neutral]
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let q = c as f64 / total as f64;
            -q * q.ln()
        })
        .sum();
    Some(1.0 - (h / h_max))
}

/// Per-cluster consensus: the arithmetic mean, across every item that
/// received at least one vote from the cluster's members, of that item's
/// entropy-based consensus contribution. Items the cluster never touched are
/// omitted from the average entirely, not folded in as zero — averaging
/// pooled counts across all items instead of per item would let a single
/// unanimous item swamp many divided ones (or vice versa).
pub fn cluster_consensus(matrix: &VoteMatrix, member_rows: &[usize]) -> f64 {
    let mut contributions = Vec::new();
    for col in 0..matrix.n_items() {
        let mut support = 0u32;
        let mut oppose = 0u32;
        let mut neutral = 0u32;
        for &row in member_rows {
            if let Some(v) = matrix.values[row][col] {
                match classify(v) {
                    Category::Support => support += 1,
                    Category::Oppose => oppose += 1,
                    Category::Neutral => neutral += 1,
                }
            }
        }
        if let Some(c) = item_consensus(support, oppose, neutral) {
            contributions.push(c);
        }
    }
    if contributions.is_empty() {
        return 0.0;
    }
    contributions.iter().sum::<f64>() / contributions.len() as f64
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VotingPattern {
    pub support: u32,
    pub oppose: u32,
    pub neutral: u32,
    /// This item's own entropy-based consensus contribution (not the
    /// cluster-wide average) — `None` iff the item got no votes at all.
    pub consensus: Option<f64>,
    /// `None` is the documented "no clear majority" outcome (empty column
    /// for that cluster, or an exact multi-way tie).
    pub majority: Option<Category>,
}

/// Per-(cluster, item) voting pattern. Majority tie-break order is
/// Support > Oppose > Neutral; an exact tie across all three, or no votes
/// at all, yields `majority: None`.
pub fn voting_pattern(matrix: &VoteMatrix, member_rows: &[usize], item_col: usize) -> VotingPattern {
    let mut support = 0u32;
    let mut oppose = 0u32;
    let mut neutral = 0u32;
    for &row in member_rows {
        if let Some(v) = matrix.values[row][item_col] {
            match classify(v) {
                Category::Support => support += 1,
                Category::Oppose => oppose += 1,
                Category::Neutral => neutral += 1,
            }
        }
    }

    let consensus = item_consensus(support, oppose, neutral);
    // argmax(support, oppose, neutral) with ties broken support > oppose >
    // neutral; `None` ("no clear majority") is reserved for the all-zero
    // case, never for a genuine tie.
    let majority = if support == 0 && oppose == 0 && neutral == 0 {
        None
    } else if support >= oppose && support >= neutral {
        Some(Category::Support)
    } else if oppose >= neutral {
        Some(Category::Oppose)
    } else {
        Some(Category::Neutral)
    };

    VotingPattern {
        support,
        oppose,
        neutral,
        consensus,
        majority,
    }
}

/// Voter agreement over the items both cast a vote on: the fraction of
/// co-voted items where their discrete opinion category matches exactly
/// (support/support or oppose/oppose or neutral/neutral). `None` if they
/// share no co-voted item. This is deliberately not called anywhere in the
/// run pipeline — it exists only for `oce_query`'s on-demand bubble view,
/// computed at read time over a handful of voters.
pub fn pairwise_similarity(matrix: &VoteMatrix, row_a: usize, row_b: usize) -> Option<f64> {
    let mut shared = 0u32;
    let mut matching = 0u32;
    for col in 0..matrix.n_items() {
        if let (Some(a), Some(b)) = (matrix.values[row_a][col], matrix.values[row_b][col]) {
            shared += 1;
            if classify(a) == classify(b) {
                matching += 1;
            }
        }
    }
    if shared == 0 {
        return None;
    }
    Some(matching as f64 / shared as f64)
}
