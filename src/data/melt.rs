//! Reshaping one gene's counts into a long observation table

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::stats::ReplicateOffsets;

/// One gene's observations, one entry per (replicate, site) pair.
///
/// Entries are replicate-major: all sites of the first replicate, then all
/// sites of the second, and so on. Offsets are per replicate and repeated
/// for each of its sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeltedGene {
    /// Integer read counts
    pub counts: Vec<u64>,
    /// Condition of each observation, as an index into `levels`
    pub groups: Vec<usize>,
    /// Mean nonzero count of the observation's replicate
    pub nz_mean: Vec<f64>,
    /// logit zero fraction of the observation's replicate
    pub logit_zero_perc: Vec<f64>,
    /// Condition labels
    pub levels: Vec<String>,
}

impl MeltedGene {
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn n_groups(&self) -> usize {
        self.levels.len()
    }

    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn min_count(&self) -> Option<u64> {
        self.counts.iter().copied().min()
    }

    /// Total count per condition group
    pub fn group_sums(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.n_groups()];
        for (&c, &g) in self.counts.iter().zip(self.groups.iter()) {
            sums[g] += c;
        }
        sums
    }

    /// Append an observation copying the covariates of observation `template`
    fn push_like(&mut self, template: usize, count: u64) {
        self.counts.push(count);
        self.groups.push(self.groups[template]);
        self.nz_mean.push(self.nz_mean[template]);
        self.logit_zero_perc.push(self.logit_zero_perc[template]);
    }

    /// Guard against a rank-deficient condition design.
    ///
    /// If any condition sums to zero, one observation with count 1 is added
    /// to every condition, copying the covariates of that condition's first
    /// observation. Returns whether observations were added.
    pub fn add_pseudocounts_if_singular(&mut self) -> bool {
        if !self.group_sums().contains(&0) {
            return false;
        }

        let firsts: Vec<usize> = (0..self.n_groups())
            .filter_map(|g| self.groups.iter().position(|&x| x == g))
            .collect();
        for template in firsts {
            self.push_like(template, 1);
        }
        true
    }
}

/// Flatten a gene's counts into per-observation vectors.
///
/// `data` is replicates x sites, `groups` the condition index of each
/// replicate. Normalized counts are truncated toward zero.
pub fn melt_gene(
    data: ArrayView2<f64>,
    site_indexes: &[usize],
    groups: &[usize],
    levels: &[String],
    offsets: &ReplicateOffsets,
) -> MeltedGene {
    let n_obs = groups.len() * site_indexes.len();
    let mut melted = MeltedGene {
        counts: Vec::with_capacity(n_obs),
        groups: Vec::with_capacity(n_obs),
        nz_mean: Vec::with_capacity(n_obs),
        logit_zero_perc: Vec::with_capacity(n_obs),
        levels: levels.to_vec(),
    };

    for (rep, &group) in groups.iter().enumerate() {
        for &site in site_indexes {
            melted.counts.push(data[[rep, site]].max(0.0).trunc() as u64);
            melted.groups.push(group);
            melted.nz_mean.push(offsets.nz_mean[rep]);
            melted.logit_zero_perc.push(offsets.logit_zero_perc[rep]);
        }
    }

    melted
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn levels() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    fn offsets() -> ReplicateOffsets {
        ReplicateOffsets {
            logit_zero_perc: vec![-1.0, 0.5, 2.0],
            nz_mean: vec![10.0, 20.0, 30.0],
        }
    }

    #[test]
    fn test_melt_layout() {
        let data = array![
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.7, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
        ];
        let melted = melt_gene(data.view(), &[1, 2], &[0, 0, 1], &levels(), &offsets());

        assert_eq!(melted.len(), 6);
        assert_eq!(melted.counts, vec![2, 3, 6, 7, 10, 11]);
        assert_eq!(melted.groups, vec![0, 0, 0, 0, 1, 1]);
        assert_eq!(melted.nz_mean, vec![10.0, 10.0, 20.0, 20.0, 30.0, 30.0]);
        assert_eq!(melted.logit_zero_perc, vec![-1.0, -1.0, 0.5, 0.5, 2.0, 2.0]);
        assert_eq!(melted.levels[melted.groups[5]], "B");
        assert_eq!(melted.total_count(), 39);
    }

    #[test]
    fn test_pseudocounts_only_when_singular() {
        let data = array![[1.0, 2.0], [0.0, 3.0], [4.0, 0.0]];
        let mut melted = melt_gene(data.view(), &[0, 1], &[0, 1, 1], &levels(), &offsets());
        assert!(!melted.add_pseudocounts_if_singular());
        assert_eq!(melted.len(), 6);
    }

    #[test]
    fn test_pseudocounts_added_to_every_condition() {
        let data = array![[0.0, 0.0], [0.0, 0.0], [4.0, 1.0]];
        let mut melted = melt_gene(data.view(), &[0, 1], &[0, 0, 1], &levels(), &offsets());
        assert_eq!(melted.group_sums(), vec![0, 5]);

        assert!(melted.add_pseudocounts_if_singular());
        assert_eq!(melted.len(), 8);
        assert_eq!(&melted.counts[6..], &[1, 1]);
        assert_eq!(&melted.groups[6..], &[0, 1]);
        assert_eq!(&melted.nz_mean[6..], &[10.0, 30.0]);
        assert_eq!(&melted.logit_zero_perc[6..], &[-1.0, 2.0]);
        assert_eq!(melted.group_sums(), vec![1, 6]);
    }
}
