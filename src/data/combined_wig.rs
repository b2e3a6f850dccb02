//! Per-site insertion counts for all replicates

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZinbError};

/// Insertion counts at a shared, ordered set of sites
///
/// `counts` is replicates x sites; every replicate uses the same site order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedWig {
    sites: Vec<u64>,
    counts: Array2<f64>,
    filenames: Vec<String>,
}

impl CombinedWig {
    /// Create a combined wig, validating dimensions
    pub fn new(sites: Vec<u64>, counts: Array2<f64>, filenames: Vec<String>) -> Result<Self> {
        let (n_reps, n_sites) = counts.dim();

        if n_sites != sites.len() {
            return Err(ZinbError::DimensionMismatch {
                expected: format!("{} sites", sites.len()),
                got: format!("{} count columns", n_sites),
            });
        }
        if n_reps != filenames.len() {
            return Err(ZinbError::DimensionMismatch {
                expected: format!("{} replicate files", filenames.len()),
                got: format!("{} count rows", n_reps),
            });
        }
        if counts.iter().any(|&c| c < 0.0 || !c.is_finite()) {
            return Err(ZinbError::InvalidCombinedWig {
                reason: "Counts must be finite and non-negative".to_string(),
            });
        }
        if sites.windows(2).any(|w| w[0] >= w[1]) {
            log::warn!("Site positions are not strictly increasing");
        }

        Ok(Self {
            sites,
            counts,
            filenames,
        })
    }

    /// Site positions
    pub fn sites(&self) -> &[u64] {
        &self.sites
    }

    /// Counts (replicates x sites)
    pub fn counts(&self) -> ArrayView2<f64> {
        self.counts.view()
    }

    /// Replicate file names, in row order
    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    pub fn n_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn n_replicates(&self) -> usize {
        self.filenames.len()
    }

    /// Same sites and files with replaced counts (e.g. after normalization)
    pub fn with_counts(&self, counts: Array2<f64>) -> Result<Self> {
        Self::new(self.sites.clone(), counts, self.filenames.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_combined_wig_dims() {
        let wig = CombinedWig::new(
            vec![60, 72, 102],
            array![[0.0, 3.0, 1.0], [2.0, 0.0, 5.0]],
            vec!["a.wig".to_string(), "b.wig".to_string()],
        )
        .unwrap();

        assert_eq!(wig.n_sites(), 3);
        assert_eq!(wig.n_replicates(), 2);
        assert_eq!(wig.counts().row(1).to_vec(), vec![2.0, 0.0, 5.0]);
    }

    #[test]
    fn test_combined_wig_rejects_mismatch() {
        let res = CombinedWig::new(
            vec![60, 72],
            array![[0.0, 3.0, 1.0]],
            vec!["a.wig".to_string()],
        );
        assert!(res.is_err());

        let res = CombinedWig::new(vec![60], array![[-1.0]], vec!["a.wig".to_string()]);
        assert!(res.is_err());
    }
}
