//! Input/Output: combined wig, annotation, metadata and result tables

mod annotation;
mod metadata;
mod results;
mod wig;

pub use annotation::{parse_prot_table, read_genes};
pub use metadata::{parse_samples_metadata, read_samples_metadata};
pub use results::{
    format_value, read_results, read_results_from, write_results, write_results_to,
    write_summary_json, GeneResultRow, ResultsSummary, ZinbResults,
};
pub use wig::{parse_combined_wig, read_combined_wig, write_combined_wig};
