//! Combined wig reading and writing
//!
//! A combined wig holds one row per insertion site: the position followed
//! by one count per replicate. Header lines start with `#`; the
//! `#File: <name>` lines name the replicates in column order.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::Array2;

use crate::data::CombinedWig;
use crate::error::{Result, ZinbError};

const FILE_PREFIX: &str = "#File:";

/// Read a combined wig file
pub fn read_combined_wig<P: AsRef<Path>>(path: P) -> Result<CombinedWig> {
    let file = File::open(path)?;
    parse_combined_wig(BufReader::new(file))
}

/// Parse combined wig content from any buffered reader
pub fn parse_combined_wig<R: BufRead>(reader: R) -> Result<CombinedWig> {
    let mut filenames: Vec<String> = Vec::new();
    let mut sites: Vec<u64> = Vec::new();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut n_reps: Option<usize> = None;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(name) = trimmed.strip_prefix(FILE_PREFIX) {
            filenames.push(name.trim().to_string());
            continue;
        }
        if trimmed.starts_with('#') {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let position = fields
            .next()
            .and_then(|f| f.parse::<u64>().ok())
            .ok_or_else(|| ZinbError::InvalidCombinedWig {
                reason: format!("line {}: invalid site position", line_no + 1),
            })?;

        // counts run until the first non-numeric field
        let counts: Vec<f64> = fields.map_while(|f| f.parse::<f64>().ok()).collect();
        let expected = match n_reps {
            Some(k) => k,
            None => {
                let k = if filenames.is_empty() {
                    counts.len()
                } else {
                    filenames.len()
                };
                n_reps = Some(k);
                k
            }
        };
        if counts.len() < expected || expected == 0 {
            return Err(ZinbError::InvalidCombinedWig {
                reason: format!(
                    "line {}: expected {} counts, found {}",
                    line_no + 1,
                    expected,
                    counts.len()
                ),
            });
        }

        sites.push(position);
        rows.push(counts[..expected].to_vec());
    }

    let n_reps = n_reps.ok_or_else(|| ZinbError::EmptyData {
        reason: "no insertion sites in combined wig".to_string(),
    })?;
    if filenames.is_empty() {
        filenames = (1..=n_reps).map(|i| format!("rep{}", i)).collect();
    }

    let n_sites = sites.len();
    let mut counts = Array2::zeros((n_reps, n_sites));
    for (j, row) in rows.iter().enumerate() {
        for (i, &value) in row.iter().enumerate() {
            counts[[i, j]] = value;
        }
    }

    log::debug!("read {} sites x {} replicates", n_sites, n_reps);
    CombinedWig::new(sites, counts, filenames)
}

/// Write a combined wig, one decimal per count
pub fn write_combined_wig<P: AsRef<Path>>(path: P, wig: &CombinedWig) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);

    for name in wig.filenames() {
        writeln!(out, "{} {}", FILE_PREFIX, name)?;
    }

    let counts = wig.counts();
    for (j, position) in wig.sites().iter().enumerate() {
        write!(out, "{}", position)?;
        for value in counts.column(j) {
            write!(out, "\t{:.1}", value)?;
        }
        writeln!(out)?;
    }
    out.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    const WIG: &str = "#Converted to CombinedWig with TRANSIT.\n\
#File: /data/glyc1.wig\n\
#File: /data/glyc2.wig\n\
#File: /data/chol1.wig\n\
60\t0.0\t12.0\t3.0\tRv0001 (dnaA)\n\
72\t5.0\t0.0\t0.0\tRv0001 (dnaA)\n\
102\t1.0\t2.0\t8.0\n";

    #[test]
    fn test_parse_combined_wig() {
        let wig = parse_combined_wig(Cursor::new(WIG)).unwrap();

        assert_eq!(wig.sites(), &[60, 72, 102]);
        assert_eq!(wig.n_replicates(), 3);
        assert_eq!(wig.filenames()[0], "/data/glyc1.wig");
        assert_eq!(wig.counts()[[1, 0]], 12.0);
        assert_eq!(wig.counts()[[2, 2]], 8.0);
    }

    #[test]
    fn test_parse_without_file_lines() {
        let wig = parse_combined_wig(Cursor::new("10 1 2\n20 3 4\n")).unwrap();
        assert_eq!(wig.filenames(), &["rep1".to_string(), "rep2".to_string()]);
        assert_eq!(wig.counts()[[1, 1]], 4.0);
    }

    #[test]
    fn test_short_row_is_fatal() {
        let content = "#File: a\n#File: b\n10 1 2\n20 3\n";
        let err = parse_combined_wig(Cursor::new(content)).unwrap_err();
        assert!(matches!(err, ZinbError::InvalidCombinedWig { .. }));
    }

    #[test]
    fn test_bad_position_is_fatal() {
        let err = parse_combined_wig(Cursor::new("abc 1 2\n")).unwrap_err();
        assert!(matches!(err, ZinbError::InvalidCombinedWig { .. }));
    }

    #[test]
    fn test_empty_file() {
        let err = parse_combined_wig(Cursor::new("#File: a\n")).unwrap_err();
        assert!(matches!(err, ZinbError::EmptyData { .. }));
    }

    #[test]
    fn test_write_then_read() {
        let wig = parse_combined_wig(Cursor::new(WIG)).unwrap();
        let file = NamedTempFile::new().unwrap();
        write_combined_wig(file.path(), &wig).unwrap();

        let back = read_combined_wig(file.path()).unwrap();
        assert_eq!(back.sites(), wig.sites());
        assert_eq!(back.filenames(), wig.filenames());
        assert_eq!(back.counts(), wig.counts());
    }
}
