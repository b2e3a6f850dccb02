//! Per-replicate scale factors for insertion counts

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZinbError};

/// Fraction trimmed from each end of the sorted nonzero counts for TTR
const TTR_TRIM: f64 = 0.05;

/// Target mean count per site after TTR scaling
const TTR_TARGET: f64 = 100.0;

/// Normalization method applied to every replicate before analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormMethod {
    /// Leave counts unchanged
    NoNorm,
    /// Trimmed total reads: scale to a common trimmed mean site count
    Ttr,
    /// Scale to a common mean of nonzero counts
    NzMean,
    /// Scale to a common total read count
    TotReads,
}

impl FromStr for NormMethod {
    type Err = ZinbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nonorm" | "none" => Ok(NormMethod::NoNorm),
            "ttr" => Ok(NormMethod::Ttr),
            "nzmean" => Ok(NormMethod::NzMean),
            "totreads" => Ok(NormMethod::TotReads),
            _ => Err(ZinbError::InvalidInput {
                reason: format!(
                    "Unknown normalization method '{}'. Use nonorm, TTR, nzmean or totreads.",
                    s
                ),
            }),
        }
    }
}

impl fmt::Display for NormMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NormMethod::NoNorm => "nonorm",
            NormMethod::Ttr => "TTR",
            NormMethod::NzMean => "nzmean",
            NormMethod::TotReads => "totreads",
        };
        write!(f, "{}", name)
    }
}

/// Rescale each replicate (row) of `data`.
///
/// Returns the normalized matrix and the factor applied to each replicate.
pub fn normalize_data(data: ArrayView2<f64>, method: NormMethod) -> Result<(Array2<f64>, Array1<f64>)> {
    let n_reps = data.nrows();
    if n_reps == 0 || data.ncols() == 0 {
        return Err(ZinbError::EmptyData {
            reason: "Count matrix is empty".to_string(),
        });
    }

    let factors = match method {
        NormMethod::NoNorm => Array1::ones(n_reps),
        NormMethod::Ttr => {
            let stats = per_replicate(data, |wig| density(wig) * trimmed_nonzero_mean(wig, TTR_TRIM))?;
            scale_to(&stats, TTR_TARGET)
        }
        NormMethod::NzMean => {
            let stats = per_replicate(data, nonzero_mean)?;
            scale_to(&stats, finite_mean(&stats))
        }
        NormMethod::TotReads => {
            let stats = per_replicate(data, |wig| wig.sum())?;
            scale_to(&stats, finite_mean(&stats))
        }
    };

    log::debug!("Normalization factors ({}): {:?}", method, factors.to_vec());

    let normalized = &data * &factors.view().insert_axis(Axis(1));
    Ok((normalized, factors))
}

/// Apply `stat` to every replicate.
///
/// Replicates where it is not positive are marked NaN and later left unscaled,
/// so an empty track that is filtered out afterwards does not stop the run.
fn per_replicate<F>(data: ArrayView2<f64>, stat: F) -> Result<Array1<f64>>
where
    F: Fn(ArrayView1<f64>) -> f64,
{
    let values: Array1<f64> = data
        .outer_iter()
        .enumerate()
        .map(|(rep, wig)| {
            let v = stat(wig);
            if v > 0.0 && v.is_finite() {
                v
            } else {
                log::warn!("Replicate {} has no insertions; leaving it unscaled", rep);
                f64::NAN
            }
        })
        .collect();
    if values.iter().all(|v| v.is_nan()) {
        return Err(ZinbError::NormalizationFailed {
            reason: "No replicate has any insertions".to_string(),
        });
    }
    Ok(values)
}

fn finite_mean(stats: &Array1<f64>) -> f64 {
    let (sum, n) = stats
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
    sum / n as f64
}

/// Factor `target / stat` per replicate, 1.0 where the statistic is undefined
fn scale_to(stats: &Array1<f64>, target: f64) -> Array1<f64> {
    stats.mapv(|s| if s.is_finite() { target / s } else { 1.0 })
}

/// Fraction of sites with at least one insertion
fn density(wig: ArrayView1<f64>) -> f64 {
    if wig.is_empty() {
        return 0.0;
    }
    wig.iter().filter(|&&c| c > 0.0).count() as f64 / wig.len() as f64
}

fn nonzero_mean(wig: ArrayView1<f64>) -> f64 {
    let (sum, n) = wig
        .iter()
        .filter(|&&c| c > 0.0)
        .fold((0.0, 0usize), |(s, n), &c| (s + c, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Mean of the nonzero counts after dropping `trim` of them from each end
fn trimmed_nonzero_mean(wig: ArrayView1<f64>, trim: f64) -> f64 {
    let mut nonzero: Vec<f64> = wig.iter().copied().filter(|&c| c > 0.0).collect();
    if nonzero.is_empty() {
        return 0.0;
    }
    nonzero.sort_by(|a, b| a.total_cmp(b));

    let cut = (trim * nonzero.len() as f64) as usize;
    let kept = &nonzero[cut..nonzero.len() - cut];
    kept.iter().sum::<f64>() / kept.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_parse_methods() {
        assert_eq!("TTR".parse::<NormMethod>().unwrap(), NormMethod::Ttr);
        assert_eq!("nonorm".parse::<NormMethod>().unwrap(), NormMethod::NoNorm);
        assert_eq!("NZMean".parse::<NormMethod>().unwrap(), NormMethod::NzMean);
        assert!("betageom".parse::<NormMethod>().is_err());
    }

    #[test]
    fn test_nonorm_identity() {
        let data = array![[0.0, 3.0], [5.0, 1.0]];
        let (norm, factors) = normalize_data(data.view(), NormMethod::NoNorm).unwrap();
        assert_eq!(norm, data);
        assert_eq!(factors.to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_totreads_equalizes_totals() {
        let data = array![[10.0, 10.0, 0.0], [40.0, 0.0, 40.0]];
        let (norm, _) = normalize_data(data.view(), NormMethod::TotReads).unwrap();
        assert_relative_eq!(norm.row(0).sum(), norm.row(1).sum(), epsilon = 1e-9);
    }

    #[test]
    fn test_ttr_scales_to_target() {
        // 20 sites, half of them nonzero: density 0.5, no trimming at n = 10
        let wig: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 4.0 } else { 0.0 }).collect();
        let data = Array2::from_shape_vec((1, 20), wig).unwrap();
        let (norm, factors) = normalize_data(data.view(), NormMethod::Ttr).unwrap();

        assert_relative_eq!(factors[0], 100.0 / (0.5 * 4.0));
        assert_relative_eq!(norm.row(0).mean().unwrap(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_trimmed_mean_drops_extremes() {
        let mut wig = vec![10.0; 18];
        wig.push(1.0);
        wig.push(1000.0);
        let arr = Array1::from(wig);
        assert_relative_eq!(trimmed_nonzero_mean(arr.view(), 0.05), 10.0);
    }

    #[test]
    fn test_empty_replicate_left_unscaled() {
        let data = array![[0.0, 0.0], [1.0, 3.0], [2.0, 6.0]];
        for method in [NormMethod::Ttr, NormMethod::NzMean, NormMethod::TotReads] {
            let (norm, factors) = normalize_data(data.view(), method).unwrap();
            assert_eq!(factors[0], 1.0);
            assert_eq!(norm.row(0).to_vec(), vec![0.0, 0.0]);
            assert!(factors.iter().all(|f| f.is_finite()));
        }
        // nonempty replicates still share a common total
        let (norm, _) = normalize_data(data.view(), NormMethod::TotReads).unwrap();
        assert_relative_eq!(norm.row(1).sum(), 6.0, epsilon = 1e-9);
        assert_relative_eq!(norm.row(2).sum(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_all_replicates_empty_fails() {
        let data = array![[0.0, 0.0], [0.0, 0.0]];
        assert!(normalize_data(data.view(), NormMethod::Ttr).is_err());
        assert!(normalize_data(data.view(), NormMethod::NoNorm).is_ok());
    }
}
