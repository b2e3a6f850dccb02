//! Data structures for the multi-condition analysis

mod combined_wig;
mod genes;
mod melt;
mod metadata;

pub use combined_wig::CombinedWig;
pub use genes::{gene_site_indexes, site_indexes_for_gene, Gene, Strand};
pub use melt::{melt_gene, MeltedGene};
pub use metadata::{condition_levels, filter_by_conditions, SamplesMetadata, UNKNOWN_CONDITION};
