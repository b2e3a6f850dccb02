//! Summary statistics over insertion counts
//!
//! Two families of statistics feed the analysis:
//! - per gene and condition: mean count, mean of nonzero counts and the
//!   fraction of nonzero observations, reported in the output table;
//! - per replicate, over all sites: logit of the zero fraction and the mean
//!   of nonzero counts, used as offsets by the count models.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Per-condition statistics of one gene, aligned with the condition levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneConditionStats {
    pub means: Vec<f64>,
    pub nz_means: Vec<f64>,
    pub nz_percs: Vec<f64>,
}

impl GeneConditionStats {
    /// All-zero statistics for `n_levels` conditions
    pub fn zeros(n_levels: usize) -> Self {
        Self {
            means: vec![0.0; n_levels],
            nz_means: vec![0.0; n_levels],
            nz_percs: vec![0.0; n_levels],
        }
    }
}

/// Mean, nonzero mean and nonzero fraction of a gene's counts per condition.
///
/// `data` is replicates x sites, `conditions` gives the condition of each
/// replicate and `levels` the output order. A gene without sites gets 0 for
/// every statistic.
pub fn condition_stats_for_gene(
    site_indexes: &[usize],
    conditions: &[String],
    levels: &[String],
    data: ArrayView2<f64>,
) -> GeneConditionStats {
    let mut stats = GeneConditionStats::zeros(levels.len());
    if site_indexes.is_empty() {
        return stats;
    }

    for (k, level) in levels.iter().enumerate() {
        let mut total = 0.0;
        let mut n = 0usize;
        let mut nz_total = 0.0;
        let mut nz_n = 0usize;

        for (rep, _) in conditions.iter().enumerate().filter(|(_, c)| *c == level) {
            for &site in site_indexes {
                let count = data[[rep, site]];
                total += count;
                n += 1;
                if count != 0.0 {
                    nz_total += count;
                    nz_n += 1;
                }
            }
        }

        if n > 0 {
            stats.means[k] = total / n as f64;
            stats.nz_percs[k] = nz_n as f64 / n as f64;
        }
        if nz_n > 0 {
            stats.nz_means[k] = nz_total / nz_n as f64;
        }
    }

    stats
}

/// Log-odds transform
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Replicate-level offsets used by the count models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateOffsets {
    /// logit of the fraction of sites with zero insertions
    pub logit_zero_perc: Vec<f64>,
    /// Mean count over sites with at least one insertion
    pub nz_mean: Vec<f64>,
}

impl ReplicateOffsets {
    /// Compute offsets for every replicate (rows of `data`) over all sites.
    ///
    /// A zero fraction of exactly 0 or 1 has no finite logit; it is clamped
    /// to [0.5/n, 1 - 0.5/n] for n sites. A replicate without insertions has
    /// no nonzero mean and gets 1.0 (a neutral exposure).
    pub fn from_counts(data: ArrayView2<f64>) -> Self {
        let (logit_zero_perc, nz_mean) = data
            .outer_iter()
            .enumerate()
            .map(|(rep, wig)| replicate_offsets(rep, wig))
            .unzip();

        Self {
            logit_zero_perc,
            nz_mean,
        }
    }
}

fn replicate_offsets(rep: usize, wig: ArrayView1<f64>) -> (f64, f64) {
    let n_sites = wig.len();
    if n_sites == 0 {
        return (0.0, 1.0);
    }

    let nonzero: Vec<f64> = wig.iter().copied().filter(|&c| c != 0.0).collect();
    let n = n_sites as f64;
    let zero_perc = (n - nonzero.len() as f64) / n;

    let floor = 0.5 / n;
    let clamped = zero_perc.clamp(floor, 1.0 - floor);
    if clamped != zero_perc {
        log::warn!(
            "Replicate {} has zero fraction {:.3}; clamping to {:.6} for the logit",
            rep, zero_perc, clamped
        );
    }

    let nz_mean = if nonzero.is_empty() {
        log::warn!("Replicate {} has no insertions", rep);
        1.0
    } else {
        nonzero.iter().sum::<f64>() / nonzero.len() as f64
    };

    (logit(clamped), nz_mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_condition_stats_basic() {
        // replicates x sites
        let data = array![
            [0.0, 4.0, 2.0, 9.0],
            [6.0, 0.0, 0.0, 9.0],
            [1.0, 1.0, 1.0, 9.0],
        ];
        let conds = strings(&["A", "A", "B"]);
        let levels = strings(&["A", "B"]);

        let stats = condition_stats_for_gene(&[0, 1, 2], &conds, &levels, data.view());

        assert_relative_eq!(stats.means[0], 12.0 / 6.0);
        assert_relative_eq!(stats.nz_means[0], 12.0 / 3.0);
        assert_relative_eq!(stats.nz_percs[0], 0.5);
        assert_relative_eq!(stats.means[1], 1.0);
        assert_relative_eq!(stats.nz_means[1], 1.0);
        assert_relative_eq!(stats.nz_percs[1], 1.0);
    }

    #[test]
    fn test_condition_stats_no_sites_are_zero() {
        let data = array![[5.0, 5.0], [3.0, 0.0]];
        let conds = strings(&["A", "B"]);
        let levels = strings(&["A", "B"]);

        let stats = condition_stats_for_gene(&[], &conds, &levels, data.view());
        assert_eq!(stats, GeneConditionStats::zeros(2));
    }

    #[test]
    fn test_condition_stats_all_zero_condition() {
        let data = array![[0.0, 0.0], [3.0, 1.0]];
        let conds = strings(&["A", "B"]);
        let levels = strings(&["A", "B"]);

        let stats = condition_stats_for_gene(&[0, 1], &conds, &levels, data.view());
        assert_eq!(stats.means[0], 0.0);
        assert_eq!(stats.nz_means[0], 0.0);
        assert_eq!(stats.nz_percs[0], 0.0);
    }

    #[test]
    fn test_replicate_offsets() {
        let data = array![[0.0, 2.0, 4.0, 0.0], [1.0, 1.0, 1.0, 0.0]];
        let offsets = ReplicateOffsets::from_counts(data.view());

        assert_relative_eq!(offsets.logit_zero_perc[0], 0.0);
        assert_relative_eq!(offsets.nz_mean[0], 3.0);
        assert_relative_eq!(offsets.logit_zero_perc[1], logit(0.25));
        assert_relative_eq!(offsets.nz_mean[1], 1.0);
    }

    #[test]
    fn test_replicate_offsets_saturated_are_finite() {
        let data = array![[1.0, 2.0, 3.0, 4.0], [0.0, 0.0, 0.0, 0.0]];
        let offsets = ReplicateOffsets::from_counts(data.view());

        // no zeros: zero fraction clamped to 0.5/4
        assert_relative_eq!(offsets.logit_zero_perc[0], logit(0.125));
        // all zeros: clamped to 1 - 0.5/4
        assert_relative_eq!(offsets.logit_zero_perc[1], logit(0.875));
        assert_eq!(offsets.nz_mean[1], 1.0);
        assert!(offsets.logit_zero_perc.iter().all(|v| v.is_finite()));
    }
}
