//! tnseq_zinb: multi-condition differential essentiality for TnSeq data
//!
//! Insertion counts from a combined wig are normalized, grouped by the
//! condition of each replicate, and tested gene by gene with a
//! zero-inflated negative binomial likelihood ratio test.
//!
//! # Example
//!
//! ```ignore
//! use tnseq_zinb::prelude::*;
//!
//! let input = ZinbInput {
//!     wig: read_combined_wig("combined.wig")?,
//!     metadata: read_samples_metadata("samples.tsv")?,
//!     genes: read_genes("H37Rv.prot_table")?,
//! };
//! let results = run_zinb(&input, &ZinbParams::default(), &NativeFitter::default())?;
//! write_results("zinb_results.txt", &results)?;
//! ```

pub mod cli;
pub mod data;
pub mod error;
pub mod glm;
pub mod io;
pub mod normalization;
pub mod stats;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{CombinedWig, Gene, SamplesMetadata, Strand, UNKNOWN_CONDITION};
    pub use crate::error::{Result, ZinbError};
    pub use crate::glm::{FitParams, ModelFitter, NativeFitter};
    pub use crate::io::{
        read_combined_wig, read_genes, read_results, read_samples_metadata, write_combined_wig,
        write_results, write_summary_json, ResultsSummary, ZinbResults,
    };
    pub use crate::normalization::{normalize_data, NormMethod};
    pub use crate::testing::TestStatus;
    pub use crate::{run_zinb, ZinbInput, ZinbParams};
}

use std::collections::BTreeSet;

use rayon::prelude::*;

use data::{
    condition_levels, filter_by_conditions, gene_site_indexes, melt_gene, CombinedWig, Gene,
    SamplesMetadata, UNKNOWN_CONDITION,
};
use error::{Result, ZinbError};
use glm::ModelFitter;
use io::{GeneResultRow, ZinbResults};
use normalization::{normalize_data, NormMethod};
use stats::{condition_stats_for_gene, ReplicateOffsets};
use testing::{adjust_pvalues, GeneTestResult, SignificanceTest};

/// Settings of one run
#[derive(Debug, Clone)]
pub struct ZinbParams {
    pub normalization: NormMethod,
    /// Replicates with these conditions are dropped before testing
    pub ignored_conditions: BTreeSet<String>,
    /// Use per-replicate saturation offsets in the models
    pub sat_adjust: bool,
    /// Leave untestable genes out of the FDR correction
    pub exclude_untestable_from_fdr: bool,
    /// Significance level used for the run summary
    pub alpha: f64,
}

impl Default for ZinbParams {
    fn default() -> Self {
        Self {
            normalization: NormMethod::Ttr,
            ignored_conditions: [UNKNOWN_CONDITION.to_string()].into_iter().collect(),
            sat_adjust: true,
            exclude_untestable_from_fdr: false,
            alpha: 0.05,
        }
    }
}

/// Parsed inputs of a run
#[derive(Debug, Clone)]
pub struct ZinbInput {
    pub wig: CombinedWig,
    pub metadata: SamplesMetadata,
    pub genes: Vec<Gene>,
}

/// Run the multi-condition ZINB analysis.
///
/// Model fitting settings belong to `fitter` (see `NativeFitter::new`).
/// Rows come back in annotation order with conditions sorted by name.
pub fn run_zinb(input: &ZinbInput, params: &ZinbParams, fitter: &dyn ModelFitter) -> Result<ZinbResults> {
    log::info!("Normalizing using: {}", params.normalization);
    let (normalized, _factors) = normalize_data(input.wig.counts(), params.normalization)?;

    let all_conditions = input.metadata.conditions_for_files(input.wig.filenames());
    let (data, conditions) =
        filter_by_conditions(normalized.view(), &all_conditions, &params.ignored_conditions)?;
    if conditions.len() < all_conditions.len() {
        log::info!(
            "Ignoring {} replicates with conditions in {:?}",
            all_conditions.len() - conditions.len(),
            params.ignored_conditions
        );
    }

    let levels = condition_levels(&conditions);
    if levels.len() < 2 {
        return Err(ZinbError::InvalidInput {
            reason: format!(
                "need at least two conditions after filtering, found {:?}",
                levels
            ),
        });
    }
    log::info!(
        "Testing {} replicates in {} conditions: {}",
        conditions.len(),
        levels.len(),
        levels.join(", ")
    );

    // replicate -> index into the sorted levels
    let groups: Vec<usize> = conditions
        .iter()
        .map(|c| levels.binary_search(c).unwrap_or(0))
        .collect();

    let site_map = gene_site_indexes(input.wig.sites(), &input.genes);
    let offsets = ReplicateOffsets::from_counts(data.view());
    let engine = SignificanceTest::new(fitter, params.sat_adjust);
    let empty: Vec<usize> = Vec::new();

    log::info!("Running ZINB on {} genes with the {} fitter", input.genes.len(), fitter.name());
    let per_gene: Vec<(GeneResultRow, GeneTestResult)> = input
        .genes
        .par_iter()
        .map(|gene| {
            let sites = site_map.get(&gene.locus_tag).unwrap_or(&empty);
            let stats = condition_stats_for_gene(sites, &conditions, &levels, data.view());
            let melted = melt_gene(data.view(), sites, &groups, &levels, &offsets);
            let test = engine.zinb_signif(sites.len(), melted);
            if !test.status.is_testable() {
                log::debug!("{}: {}", gene.locus_tag, test.status);
            }

            let row = GeneResultRow {
                locus_tag: gene.locus_tag.clone(),
                name: gene.name.clone(),
                n_sites: sites.len(),
                stats,
                pvalue: test.pvalue,
                qvalue: f64::NAN,
                status: test.status.clone(),
            };
            (row, test)
        })
        .collect();

    let (mut rows, tests): (Vec<GeneResultRow>, Vec<GeneTestResult>) = per_gene.into_iter().unzip();
    let qvalues = adjust_pvalues(&tests, params.exclude_untestable_from_fdr);
    for (row, q) in rows.iter_mut().zip(qvalues) {
        row.qvalue = q;
    }

    Ok(ZinbResults {
        conditions: levels,
        rows,
    })
}
