//! Result table of a multi-condition run
//!
//! One tab-separated row per gene, in annotation order:
//! `Rv Gene TAs mean_<c>... NZmean_<c>... NZperc_<c>... pval padj status`

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;

use crate::error::{Result, ZinbError};
use crate::stats::GeneConditionStats;
use crate::testing::TestStatus;

const LEADING_COLUMNS: [&str; 3] = ["Rv", "Gene", "TAs"];
const TRAILING_COLUMNS: [&str; 3] = ["pval", "padj", "status"];

/// One gene's output row
#[derive(Debug, Clone, PartialEq)]
pub struct GeneResultRow {
    pub locus_tag: String,
    pub name: String,
    pub n_sites: usize,
    pub stats: GeneConditionStats,
    pub pvalue: f64,
    pub qvalue: f64,
    pub status: TestStatus,
}

/// Full result table; `conditions` fixes the per-condition column order
#[derive(Debug, Clone, PartialEq)]
pub struct ZinbResults {
    pub conditions: Vec<String>,
    pub rows: Vec<GeneResultRow>,
}

/// Counts of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct ResultsSummary {
    pub total_genes: usize,
    pub genes_tested: usize,
    pub significant: usize,
    pub alpha: f64,
    pub conditions: Vec<String>,
    /// Genes per status kind
    pub status_counts: BTreeMap<String, usize>,
}

impl ZinbResults {
    pub fn n_genes(&self) -> usize {
        self.rows.len()
    }

    /// Locus tags with q-value below `alpha`
    pub fn significant_genes(&self, alpha: f64) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.qvalue.is_finite() && r.qvalue < alpha)
            .map(|r| r.locus_tag.as_str())
            .collect()
    }

    pub fn summary(&self, alpha: f64) -> ResultsSummary {
        let mut status_counts = BTreeMap::new();
        for row in &self.rows {
            *status_counts.entry(row.status.kind().to_string()).or_insert(0) += 1;
        }

        ResultsSummary {
            total_genes: self.n_genes(),
            genes_tested: self.rows.iter().filter(|r| r.status.is_testable()).count(),
            significant: self.significant_genes(alpha).len(),
            alpha,
            conditions: self.conditions.clone(),
            status_counts,
        }
    }

    /// Header row for the current conditions
    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = LEADING_COLUMNS.iter().map(|s| s.to_string()).collect();
        for prefix in ["mean_", "NZmean_", "NZperc_"] {
            header.extend(self.conditions.iter().map(|c| format!("{}{}", prefix, c)));
        }
        header.extend(TRAILING_COLUMNS.iter().map(|s| s.to_string()));
        header
    }
}

impl std::fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ZINB Results Summary")?;
        writeln!(f, "====================")?;
        writeln!(f, "Conditions: {}", self.conditions.join(", "))?;
        writeln!(f, "Total genes: {}", self.total_genes)?;
        writeln!(f, "Genes tested: {}", self.genes_tested)?;
        writeln!(f, "Significant (padj < {}): {}", self.alpha, self.significant)?;
        for (kind, n) in &self.status_counts {
            writeln!(f, "  {}: {}", kind, n)?;
        }
        Ok(())
    }
}

/// Fixed-precision text for a number, `nan` for NaN
pub fn format_value(value: f64, precision: usize) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{:.*}", precision, value)
    }
}

fn parse_value(field: &str, column: &str) -> Result<f64> {
    let field = field.trim();
    if field.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    field.parse::<f64>().map_err(|_| ZinbError::InvalidInput {
        reason: format!("invalid value '{}' in column {}", field, column),
    })
}

/// Write the result table to any writer
pub fn write_results_to<W: Write>(writer: W, results: &ZinbResults) -> Result<()> {
    let mut out = WriterBuilder::new().delimiter(b'\t').from_writer(writer);
    out.write_record(results.header())?;

    let n = results.conditions.len();
    for row in &results.rows {
        if row.stats.means.len() != n {
            return Err(ZinbError::DimensionMismatch {
                expected: format!("{} conditions", n),
                got: format!("{} for {}", row.stats.means.len(), row.locus_tag),
            });
        }

        let mut record = vec![row.locus_tag.clone(), row.name.clone(), row.n_sites.to_string()];
        for values in [&row.stats.means, &row.stats.nz_means, &row.stats.nz_percs] {
            record.extend(values.iter().map(|&v| format_value(v, 1)));
        }
        record.push(format_value(row.pvalue, 6));
        record.push(format_value(row.qvalue, 6));
        record.push(row.status.to_string());
        out.write_record(&record)?;
    }
    out.flush()?;

    Ok(())
}

/// Write the result table to a file
pub fn write_results<P: AsRef<Path>>(path: P, results: &ZinbResults) -> Result<()> {
    let file = File::create(path)?;
    write_results_to(BufWriter::new(file), results)
}

/// Parse a result table from any reader
pub fn read_results_from<R: Read>(reader: R) -> Result<ZinbResults> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader);

    let header: Vec<String> = rdr.headers()?.iter().map(|s| s.to_string()).collect();
    let fixed = LEADING_COLUMNS.len() + TRAILING_COLUMNS.len();
    if header.len() < fixed || (header.len() - fixed) % 3 != 0 {
        return Err(ZinbError::InvalidInput {
            reason: format!("unexpected result header with {} columns", header.len()),
        });
    }
    let n = (header.len() - fixed) / 3;
    let conditions: Vec<String> = header[3..3 + n]
        .iter()
        .map(|h| h.strip_prefix("mean_").unwrap_or(h).to_string())
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let column_values = |start: usize| -> Result<Vec<f64>> {
            (start..start + n)
                .map(|i| parse_value(field(i), &header[i]))
                .collect()
        };

        let n_sites = field(2).trim().parse::<usize>().map_err(|_| ZinbError::InvalidInput {
            reason: format!("invalid site count '{}'", field(2)),
        })?;
        let stats = GeneConditionStats {
            means: column_values(3)?,
            nz_means: column_values(3 + n)?,
            nz_percs: column_values(3 + 2 * n)?,
        };
        let base = 3 + 3 * n;

        rows.push(GeneResultRow {
            locus_tag: field(0).to_string(),
            name: field(1).to_string(),
            n_sites,
            stats,
            pvalue: parse_value(field(base), "pval")?,
            qvalue: parse_value(field(base + 1), "padj")?,
            status: TestStatus::from_label(field(base + 2)),
        });
    }

    Ok(ZinbResults { conditions, rows })
}

/// Read a result table from a file
pub fn read_results<P: AsRef<Path>>(path: P) -> Result<ZinbResults> {
    let file = File::open(path)?;
    read_results_from(file)
}

/// Write a run summary as JSON
pub fn write_summary_json<P: AsRef<Path>>(path: P, summary: &ResultsSummary) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_results() -> ZinbResults {
        ZinbResults {
            conditions: vec!["cholesterol".to_string(), "glycerol".to_string()],
            rows: vec![
                GeneResultRow {
                    locus_tag: "Rv0001".to_string(),
                    name: "dnaA".to_string(),
                    n_sites: 14,
                    stats: GeneConditionStats {
                        means: vec![12.345, 3.0],
                        nz_means: vec![40.26, 9.0],
                        nz_percs: vec![0.3, 0.333333],
                    },
                    pvalue: 0.0001234567,
                    qvalue: 0.004,
                    status: TestStatus::Tested,
                },
                GeneResultRow {
                    locus_tag: "Rv0002".to_string(),
                    name: "dnaN".to_string(),
                    n_sites: 0,
                    stats: GeneConditionStats::zeros(2),
                    pvalue: 1.0,
                    qvalue: f64::NAN,
                    status: TestStatus::InsufficientSites,
                },
            ],
        }
    }

    fn written(results: &ZinbResults) -> String {
        let mut buf = Vec::new();
        write_results_to(&mut buf, results).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_header_and_formatting() {
        let text = written(&sample_results());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Rv\tGene\tTAs\tmean_cholesterol\tmean_glycerol\tNZmean_cholesterol\tNZmean_glycerol\t\
NZperc_cholesterol\tNZperc_glycerol\tpval\tpadj\tstatus"
        );
        assert_eq!(
            lines[1],
            "Rv0001\tdnaA\t14\t12.3\t3.0\t40.3\t9.0\t0.3\t0.3\t0.000123\t0.004000\t-"
        );
        assert_eq!(
            lines[2],
            "Rv0002\tdnaN\t0\t0.0\t0.0\t0.0\t0.0\t0.0\t0.0\t1.000000\tnan\tinsufficient sites"
        );
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let first = written(&sample_results());
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &first).unwrap();

        let parsed = read_results(file.path()).unwrap();
        assert_eq!(parsed.conditions, sample_results().conditions);
        assert_eq!(parsed.rows[1].status, TestStatus::InsufficientSites);
        assert!(parsed.rows[1].qvalue.is_nan());

        let second = written(&parsed);
        assert_eq!(first, second);
    }

    #[test]
    fn test_summary_counts() {
        let summary = sample_results().summary(0.05);
        assert_eq!(summary.total_genes, 2);
        assert_eq!(summary.genes_tested, 1);
        assert_eq!(summary.significant, 1);
        assert_eq!(summary.status_counts.get("insufficient_sites"), Some(&1));

        let file = NamedTempFile::new().unwrap();
        write_summary_json(file.path(), &summary).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(json["genes_tested"], 1);
    }

    #[test]
    fn test_bad_header() {
        let err = read_results_from("Rv\tGene\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ZinbError::InvalidInput { .. }));
    }
}
