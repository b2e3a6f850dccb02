//! Command-line interface for tnseq_zinb

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tnseq_zinb")]
#[command(version)]
#[command(about = "Multi-condition ZINB analysis of TnSeq insertion counts")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the multi-condition ZINB analysis
    #[command(
        about = "Run the multi-condition ZINB analysis",
        long_about = "Run the multi-condition ZINB analysis\n\n\
            Normalizes the combined wig, assigns each replicate its condition from the\n\
            samples metadata, and tests every annotated gene for a difference in\n\
            insertion counts across conditions with a likelihood ratio test between a\n\
            per-condition and an intercept-only (zero-inflated) negative binomial model.\n\
            p-values are adjusted with Benjamini-Hochberg.",
        after_long_help = "\
Examples:
  # Default: TTR normalization, replicates without metadata ignored
  tnseq_zinb zinb -w combined.wig -p H37Rv.prot_table -m samples.tsv -o zinb.txt

  # Ignore extra conditions and skip the saturation offsets
  tnseq_zinb zinb -w combined.wig -p H37Rv.prot_table -m samples.tsv -o zinb.txt \\
    --ignore-conditions Unknown,day0 --no-sat-adjust

  # Write a JSON summary, 8 threads
  tnseq_zinb zinb -w combined.wig -p H37Rv.prot_table -m samples.tsv -o zinb.txt \\
    --summary zinb_summary.json -t 8"
    )]
    Zinb {
        /// Path to combined wig file
        #[arg(short = 'w', long = "combined-wig",
            long_help = "Path to combined wig file.\n\
                `#File: <name>` header lines name the replicates in column order;\n\
                each data line is a site position followed by one count per replicate.")]
        combined_wig: String,

        /// Path to gene annotation (.prot_table)
        #[arg(short = 'p', long = "prot-table")]
        prot_table: String,

        /// Path to samples metadata file
        #[arg(short, long,
            long_help = "Path to samples metadata file.\n\
                Whitespace-separated with a header containing `Condition` and `Filename`\n\
                columns (case-insensitive). Lines starting with `#` are ignored.\n\
                Replicates missing from the table get the condition `Unknown`.")]
        metadata: String,

        /// Output file path [default: zinb_results.txt]
        #[arg(short, long, default_value = "zinb_results.txt")]
        output: String,

        /// Normalization method [default: TTR]
        #[arg(short, long, default_value = "TTR",
            long_help = "Normalization method applied to each replicate.\n\
                TTR:      Trimmed total reads (default)\n\
                nzmean:   Scale to a common mean over nonzero sites\n\
                totreads: Scale to a common total read count\n\
                nonorm:   No normalization")]
        normalization: String,

        /// Conditions to ignore [default: Unknown]
        #[arg(long, value_delimiter = ',', default_value = "Unknown",
            long_help = "Comma-separated conditions whose replicates are dropped before testing.")]
        ignore_conditions: Vec<String>,

        /// Do not use the per-replicate saturation offsets
        #[arg(long)]
        no_sat_adjust: bool,

        /// Leave untestable genes out of the FDR correction
        #[arg(long,
            long_help = "Leave genes that could not be tested (p-value fixed at 1) out of the\n\
                Benjamini-Hochberg correction; their padj is written as nan.\n\
                By default they take part in the correction.")]
        exclude_untestable: bool,

        /// Significance threshold for the summary [default: 0.05]
        #[arg(short, long, default_value = "0.05")]
        alpha: f64,

        /// Maximum fitting iterations [default: 200]
        #[arg(long, default_value = "200")]
        maxit: usize,

        /// Relative log-likelihood convergence tolerance [default: 1e-8]
        #[arg(long, default_value = "1e-8")]
        tol: f64,

        /// Number of threads (0 = all cores) [default: 0]
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Write the run summary as JSON to this path
        #[arg(long, value_name = "PATH")]
        summary: Option<String>,
    },

    /// Normalize a combined wig only
    #[command(
        long_about = "Normalize a combined wig.\n\n\
            Writes a combined wig with every replicate rescaled by the chosen method.",
        after_long_help = "\
Examples:
  tnseq_zinb normalize -w combined.wig -o combined_ttr.wig
  tnseq_zinb normalize -w combined.wig -o combined_nz.wig -n nzmean"
    )]
    Normalize {
        /// Path to combined wig file
        #[arg(short = 'w', long = "combined-wig")]
        combined_wig: String,

        /// Output file path
        #[arg(short, long)]
        output: String,

        /// Normalization method [default: TTR]
        #[arg(short, long, default_value = "TTR")]
        normalization: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zinb_defaults() {
        let cli = Cli::try_parse_from([
            "tnseq_zinb", "zinb", "-w", "c.wig", "-p", "g.prot_table", "-m", "s.tsv",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Zinb {
                normalization,
                ignore_conditions,
                no_sat_adjust,
                alpha,
                maxit,
                output,
                ..
            }) => {
                assert_eq!(normalization, "TTR");
                assert_eq!(ignore_conditions, vec!["Unknown".to_string()]);
                assert!(!no_sat_adjust);
                assert_eq!(alpha, 0.05);
                assert_eq!(maxit, 200);
                assert_eq!(output, "zinb_results.txt");
            }
            _ => panic!("expected zinb subcommand"),
        }
    }

    #[test]
    fn test_ignore_conditions_split() {
        let cli = Cli::try_parse_from([
            "tnseq_zinb", "zinb", "-w", "c.wig", "-p", "g", "-m", "s",
            "--ignore-conditions", "Unknown,day0", "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Zinb { ignore_conditions, .. }) => {
                assert_eq!(ignore_conditions, vec!["Unknown".to_string(), "day0".to_string()]);
            }
            _ => panic!("expected zinb subcommand"),
        }
    }
}
