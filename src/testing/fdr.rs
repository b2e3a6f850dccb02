//! Benjamini-Hochberg false discovery rate correction
//!
//! Only finite p-values take part in the ranking. A caller-supplied mask
//! can drop further entries (untestable genes); dropped and non-finite
//! entries get a NaN q-value.

/// Apply Benjamini-Hochberg FDR correction to the finite p-values
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let mask = vec![true; pvalues.len()];
    benjamini_hochberg_masked(pvalues, &mask)
}

/// Benjamini-Hochberg over the entries where `mask` is true and the p-value is finite
pub fn benjamini_hochberg_masked(pvalues: &[f64], mask: &[bool]) -> Vec<f64> {
    let n = pvalues.len();
    let mut padj = vec![f64::NAN; n];

    let mut indices: Vec<usize> = (0..n)
        .filter(|&i| pvalues[i].is_finite() && mask.get(i).copied().unwrap_or(false))
        .collect();
    let m = indices.len();
    if m == 0 {
        return padj;
    }

    indices.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));

    // walk from the largest p-value down, keeping the running minimum
    let mut cummin = f64::INFINITY;
    for (rank0, &i) in indices.iter().enumerate().rev() {
        let rank = rank0 + 1;
        let adj = (pvalues[i] * m as f64 / rank as f64).min(1.0);
        cummin = cummin.min(adj);
        padj[i] = cummin;
    }

    padj
}
