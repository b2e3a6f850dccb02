//! Samples metadata table reader
//!
//! Whitespace-separated text with a header row. The `condition` and
//! `filename` columns are located by case-insensitive name; any other
//! columns are ignored. Lines starting with `#` are comments.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::data::SamplesMetadata;
use crate::error::{Result, ZinbError};

const CONDITION_COLUMN: &str = "condition";
const FILENAME_COLUMN: &str = "filename";

/// Read a samples metadata file
pub fn read_samples_metadata<P: AsRef<Path>>(path: P) -> Result<SamplesMetadata> {
    let file = File::open(path)?;
    parse_samples_metadata(BufReader::new(file))
}

fn column_index(header: &[&str], name: &str) -> Result<usize> {
    header
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| ZinbError::InvalidMetadata {
            reason: format!("header has no '{}' column", name),
        })
}

/// Parse samples metadata from any buffered reader
pub fn parse_samples_metadata<R: BufRead>(reader: R) -> Result<SamplesMetadata> {
    let mut lines = reader
        .lines()
        .enumerate()
        .filter(|(_, line)| match line {
            Ok(l) => !l.starts_with('#') && !l.trim().is_empty(),
            Err(_) => true,
        });

    let (_, header_line) = lines.next().ok_or_else(|| ZinbError::InvalidMetadata {
        reason: "empty metadata file".to_string(),
    })?;
    let header_line = header_line?;
    let header: Vec<&str> = header_line.split_whitespace().collect();
    let condition_idx = column_index(&header, CONDITION_COLUMN)?;
    let filename_idx = column_index(&header, FILENAME_COLUMN)?;

    let mut metadata = SamplesMetadata::new();
    for (line_no, line) in lines {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        match (fields.get(condition_idx), fields.get(filename_idx)) {
            (Some(condition), Some(filename)) => metadata.add_sample(filename, condition),
            _ => {
                return Err(ZinbError::InvalidMetadata {
                    reason: format!(
                        "line {}: expected at least {} columns, found {}",
                        line_no + 1,
                        condition_idx.max(filename_idx) + 1,
                        fields.len()
                    ),
                })
            }
        }
    }

    log::debug!("metadata lists {} files", metadata.n_samples());
    Ok(metadata)
}
