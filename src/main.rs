//! tnseq_zinb command-line interface

use std::collections::BTreeSet;

use clap::Parser;
use log::{info, LevelFilter};

use tnseq_zinb::cli::{Cli, Commands};
use tnseq_zinb::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["zinb", "normalize", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("tnseq_zinb {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Zinb {
            combined_wig,
            prot_table,
            metadata,
            output,
            normalization,
            ignore_conditions,
            no_sat_adjust,
            exclude_untestable,
            alpha,
            maxit,
            tol,
            threads,
            summary,
        }) => build_params(
            &normalization,
            ignore_conditions,
            no_sat_adjust,
            exclude_untestable,
            alpha,
        )
        .and_then(|params| build_fit_params(maxit, tol).map(|fit| (params, fit)))
        .and_then(|(params, fit)| {
            run_analysis(
                &combined_wig,
                &prot_table,
                &metadata,
                &output,
                &params,
                fit,
                threads,
                summary.as_deref(),
            )
        }),
        Some(Commands::Normalize {
            combined_wig,
            output,
            normalization,
        }) => run_normalize(&combined_wig, &output, &normalization),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("tnseq_zinb v{}", VERSION);
    println!("Run `tnseq_zinb -h` for usage or `tnseq_zinb --help` for detailed information.");
}

fn print_short_help() {
    println!("tnseq_zinb v{}", VERSION);
    println!();
    println!("Usage: tnseq_zinb <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  zinb       Run the multi-condition ZINB analysis");
    println!("  normalize  Normalize a combined wig only");
    println!();
    println!("Run `tnseq_zinb <COMMAND> --help` for command-specific options.");
}

fn print_long_help() {
    println!("tnseq_zinb v{}", VERSION);
    println!("Differential essentiality across multiple TnSeq conditions");
    println!();
    println!("Usage: tnseq_zinb <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  zinb       Run the multi-condition ZINB analysis");
    println!("               - per-gene NB / zero-inflated NB likelihood ratio test");
    println!("               - per-replicate saturation offsets (disable with --no-sat-adjust)");
    println!("               - Benjamini-Hochberg adjusted p-values");
    println!("  normalize  Normalize a combined wig (TTR, nzmean, totreads, nonorm)");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -h               Print short help");
    println!("      --help       Print detailed help");
    println!("  -V, --version    Print version");
    println!();
    println!("Examples:");
    println!("  tnseq_zinb zinb -w combined.wig -p H37Rv.prot_table -m samples.tsv -o zinb.txt");
    println!();
    println!("  tnseq_zinb zinb -w combined.wig -p H37Rv.prot_table -m samples.tsv -o zinb.txt \\");
    println!("    --ignore-conditions Unknown,day0 -n nzmean");
    println!();
    println!("  tnseq_zinb normalize -w combined.wig -o combined_ttr.wig");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn build_params(
    normalization: &str,
    ignore_conditions: Vec<String>,
    no_sat_adjust: bool,
    exclude_untestable: bool,
    alpha: f64,
) -> Result<ZinbParams> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(ZinbError::InvalidInput {
            reason: format!("alpha must be in (0, 1), got {}", alpha),
        });
    }

    let ignored_conditions: BTreeSet<String> = ignore_conditions
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    Ok(ZinbParams {
        normalization: normalization.parse()?,
        ignored_conditions,
        sat_adjust: !no_sat_adjust,
        exclude_untestable_from_fdr: exclude_untestable,
        alpha,
    })
}

fn build_fit_params(maxit: usize, tol: f64) -> Result<FitParams> {
    if maxit == 0 || !(tol > 0.0) {
        return Err(ZinbError::InvalidInput {
            reason: "--maxit must be positive and --tol greater than 0".to_string(),
        });
    }
    Ok(FitParams { max_iter: maxit, tol })
}

fn run_analysis(
    wig_path: &str,
    prot_table_path: &str,
    metadata_path: &str,
    output_path: &str,
    params: &ZinbParams,
    fit: FitParams,
    threads: usize,
    summary_path: Option<&str>,
) -> Result<()> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }

    info!("Loading combined wig from: {}", wig_path);
    let wig = read_combined_wig(wig_path)?;
    info!("  {} sites, {} replicates", wig.n_sites(), wig.n_replicates());

    info!("Loading samples metadata from: {}", metadata_path);
    let metadata = read_samples_metadata(metadata_path)?;

    info!("Loading annotation from: {}", prot_table_path);
    let genes = read_genes(prot_table_path)?;
    info!("  {} genes", genes.len());

    let input = ZinbInput {
        wig,
        metadata,
        genes,
    };
    let fitter = NativeFitter::new(fit);
    let results = run_zinb(&input, params, &fitter)?;

    info!("Writing results to: {}", output_path);
    write_results(output_path, &results)?;

    let summary = results.summary(params.alpha);
    info!("\n{}", summary);
    if let Some(path) = summary_path {
        info!("Writing summary to: {}", path);
        write_summary_json(path, &summary)?;
    }

    info!("Finished ZINB analysis");
    Ok(())
}

fn run_normalize(wig_path: &str, output_path: &str, method: &str) -> Result<()> {
    let method: NormMethod = method.parse()?;

    info!("Loading combined wig from: {}", wig_path);
    let wig = read_combined_wig(wig_path)?;

    info!("Normalizing using: {}", method);
    let (normalized, factors) = normalize_data(wig.counts(), method)?;
    for (name, factor) in wig.filenames().iter().zip(factors.iter()) {
        info!("  {}: {:.4}", name, factor);
    }

    info!("Writing normalized counts to: {}", output_path);
    write_combined_wig(output_path, &wig.with_counts(normalized)?)?;

    Ok(())
}
