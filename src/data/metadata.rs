//! Sample metadata: replicate file name -> condition label

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{ZinbError, Result};

/// Condition assigned to replicates whose file is missing from the metadata
pub const UNKNOWN_CONDITION: &str = "Unknown";

/// Samples metadata table resolved to a file name -> condition map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplesMetadata {
    conditions_by_file: HashMap<String, String>,
}

impl SamplesMetadata {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the condition of one replicate file
    pub fn add_sample(&mut self, filename: &str, condition: &str) {
        if let Some(previous) = self
            .conditions_by_file
            .insert(filename.to_string(), condition.to_string())
        {
            if previous != condition {
                log::warn!(
                    "File '{}' listed twice in metadata ('{}' then '{}'); keeping '{}'",
                    filename, previous, condition, condition
                );
            }
        }
    }

    /// Condition of a file, if the metadata lists it
    pub fn condition_of(&self, filename: &str) -> Option<&str> {
        self.conditions_by_file.get(filename).map(|s| s.as_str())
    }

    /// Resolve the condition of each replicate, in replicate order.
    /// Files absent from the table resolve to `Unknown`.
    pub fn conditions_for_files(&self, filenames: &[String]) -> Vec<String> {
        filenames
            .iter()
            .map(|f| {
                self.condition_of(f)
                    .unwrap_or(UNKNOWN_CONDITION)
                    .to_string()
            })
            .collect()
    }

    /// Number of files described
    pub fn n_samples(&self) -> usize {
        self.conditions_by_file.len()
    }
}

/// Drop replicates whose condition is ignored.
///
/// Rows of `data` are replicates. Kept rows stay in their original order.
pub fn filter_by_conditions(
    data: ArrayView2<f64>,
    conditions: &[String],
    ignored: &BTreeSet<String>,
) -> Result<(Array2<f64>, Vec<String>)> {
    if data.nrows() != conditions.len() {
        return Err(ZinbError::DimensionMismatch {
            expected: format!("{} conditions", data.nrows()),
            got: format!("{} conditions", conditions.len()),
        });
    }

    let keep: Vec<usize> = conditions
        .iter()
        .enumerate()
        .filter(|(_, c)| !ignored.contains(c.as_str()))
        .map(|(i, _)| i)
        .collect();

    let kept_conditions = keep.iter().map(|&i| conditions[i].clone()).collect();
    Ok((data.select(Axis(0), &keep), kept_conditions))
}

/// Sorted distinct condition labels
pub fn condition_levels(conditions: &[String]) -> Vec<String> {
    let mut levels: Vec<String> = conditions.to_vec();
    levels.sort();
    levels.dedup();
    levels
}
