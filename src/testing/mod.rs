//! Significance testing and multiple-testing correction

mod fdr;
mod lrt;
mod pvalue;

pub use fdr::{benjamini_hochberg, benjamini_hochberg_masked};
pub use lrt::{likelihood_ratio_test, GeneTestResult, SignificanceTest, TestStatus, UNTESTABLE_PVALUE};
pub use pvalue::{calculate_pvalue, chi_squared_sf};

/// q-values for a run's p-values.
///
/// Finite p-values always take part. With `exclude_untestable` the genes
/// whose status is not a real test are dropped from the correction as well.
pub fn adjust_pvalues(results: &[GeneTestResult], exclude_untestable: bool) -> Vec<f64> {
    let pvalues: Vec<f64> = results.iter().map(|r| r.pvalue).collect();
    let mask: Vec<bool> = results
        .iter()
        .map(|r| !exclude_untestable || r.status.is_testable())
        .collect();
    benjamini_hochberg_masked(&pvalues, &mask)
}
