//! Gene annotation and the gene -> site index mapping

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coding strand of a gene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

impl Strand {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "+" => Strand::Forward,
            "-" => Strand::Reverse,
            _ => Strand::Unknown,
        }
    }
}

/// One annotated gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    /// Unique locus tag (e.g. Rv0001)
    pub locus_tag: String,
    /// Display name (e.g. dnaA)
    pub name: String,
    pub description: String,
    /// First coordinate covered by the gene
    pub start: u64,
    /// End coordinate, exclusive for site assignment
    pub end: u64,
    pub strand: Strand,
}

impl Gene {
    pub fn new(locus_tag: &str, name: &str, start: u64, end: u64, strand: Strand) -> Self {
        Self {
            locus_tag: locus_tag.to_string(),
            name: name.to_string(),
            description: String::new(),
            start,
            end,
            strand,
        }
    }

    /// Whether a position falls within [start, end)
    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && position < self.end
    }
}

/// Indices of the sites falling in a gene, ascending
pub fn site_indexes_for_gene(sites: &[u64], gene: &Gene) -> Vec<usize> {
    indexes_in_gene(sites, is_sorted(sites), gene)
}

fn is_sorted(sites: &[u64]) -> bool {
    sites.windows(2).all(|w| w[0] < w[1])
}

fn indexes_in_gene(sites: &[u64], sorted: bool, gene: &Gene) -> Vec<usize> {
    if sorted {
        let lo = sites.partition_point(|&p| p < gene.start);
        let hi = sites.partition_point(|&p| p < gene.end).max(lo);
        (lo..hi).collect()
    } else {
        sites
            .iter()
            .enumerate()
            .filter(|&(_, &p)| gene.contains(p))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Map every gene's locus tag to the indices of its sites
pub fn gene_site_indexes(sites: &[u64], genes: &[Gene]) -> HashMap<String, Vec<usize>> {
    let sorted = is_sorted(sites);
    let mut map = HashMap::with_capacity(genes.len());
    for gene in genes {
        if map
            .insert(gene.locus_tag.clone(), indexes_in_gene(sites, sorted, gene))
            .is_some()
        {
            log::warn!("Duplicate locus tag '{}' in annotation", gene.locus_tag);
        }
    }
    map
}
