//! Gene annotation reader for `.prot_table` files
//!
//! Tab-separated, one gene per line: description, start, end, strand,
//! length, pid, gene code, gene name, locus tag, COG.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::data::{Gene, Strand};
use crate::error::{Result, ZinbError};

const COL_DESCRIPTION: usize = 0;
const COL_START: usize = 1;
const COL_END: usize = 2;
const COL_STRAND: usize = 3;
const COL_NAME: usize = 7;
const COL_LOCUS_TAG: usize = 8;

/// Read genes from a prot_table, in file order
pub fn read_genes<P: AsRef<Path>>(path: P) -> Result<Vec<Gene>> {
    let file = File::open(path)?;
    parse_prot_table(BufReader::new(file))
}

fn parse_coordinate(field: &str, line_no: usize) -> Result<u64> {
    field.trim().parse::<u64>().map_err(|_| ZinbError::InvalidAnnotation {
        reason: format!("line {}: invalid coordinate '{}'", line_no, field.trim()),
    })
}

/// Parse a prot_table from any buffered reader
pub fn parse_prot_table<R: BufRead>(reader: R) -> Result<Vec<Gene>> {
    let mut genes = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() <= COL_LOCUS_TAG {
            return Err(ZinbError::InvalidAnnotation {
                reason: format!(
                    "line {}: expected at least {} columns, found {}",
                    line_no,
                    COL_LOCUS_TAG + 1,
                    fields.len()
                ),
            });
        }

        let start = parse_coordinate(fields[COL_START], line_no)?;
        let end = parse_coordinate(fields[COL_END], line_no)?;
        let mut gene = Gene::new(
            fields[COL_LOCUS_TAG].trim(),
            fields[COL_NAME].trim(),
            start,
            end,
            Strand::parse(fields[COL_STRAND]),
        );
        gene.description = fields[COL_DESCRIPTION].trim().to_string();
        genes.push(gene);
    }

    if genes.is_empty() {
        return Err(ZinbError::EmptyData {
            reason: "no genes in annotation".to_string(),
        });
    }

    log::debug!("read {} genes", genes.len());
    Ok(genes)
}
