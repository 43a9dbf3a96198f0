mod bitset;
mod cli;
mod counts;
mod distinctive;
mod error;
mod extsort;
mod hwe;
mod matcher;
mod model;
mod output;
mod pairs;
mod reader;

use std::path::PathBuf;

use crate::error::Result;
use chrono::Local;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

/// Check sample identity. With no --genotypes file, a multi-sample cross-check is performed.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Query VCF file, optionally gzip/BGZF compressed; "-" reads standard input.
    #[arg(value_hint = clap::ValueHint::FilePath, default_value = "-")]
    query: PathBuf,

    /// Genotypes to compare against.
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    genotypes: Option<PathBuf>,

    /// Output directory.
    #[arg(
        short,
        long,
        value_hint = clap::ValueHint::DirPath,
        default_value_t = format!("gtcheck_output_{}", Local::now().format("%Y%m%d_%H%M%S"))
    )]
    output_directory: String,

    /// Which tag to use in the query file (TAG1) and the --genotypes file (TAG2) [PL,GT].
    /// A single tag applies to both files.
    #[arg(short, long = "use", value_name = "TAG1[,TAG2]")]
    use_tags: Option<String>,

    /// List of query or --genotypes samples (by default all samples are compared).
    #[arg(short = 's', long = "samples", value_name = "[qry|gt]:LIST")]
    samples: Vec<String>,

    /// File with the query or --genotypes samples to compare.
    #[arg(short = 'S', long = "samples-file", value_name = "[qry|gt]:FILE")]
    samples_file: Vec<String>,

    /// Comma-separated sample pairs to compare (qry,gt[,qry,gt..]).
    #[arg(short, long, value_name = "LIST")]
    pairs: Option<String>,

    /// File with tab-delimited sample pairs to compare (qry, gt).
    #[arg(short = 'P', long, value_name = "FILE")]
    pairs_file: Option<PathBuf>,

    /// Comma-separated targets CHR[:BEG[-END]]; records are filtered while streaming.
    /// Prefix with "^" to exclude.
    #[arg(short = 't', long, value_name = "REGION")]
    targets: Option<String>,

    /// File with targets: CHROM and POS, or CHROM, BEG and END, tab-delimited.
    /// Prefix with "^" to exclude.
    #[arg(short = 'T', long, value_name = "FILE")]
    targets_file: Option<String>,

    /// Homozygous genotypes only, useful with low coverage data (requires --genotypes).
    #[arg(short = 'H', long)]
    homs_only: bool,

    /// Print only the top INT matches for each sample, 0 for unlimited.
    /// Negative values sort by HWE probability rather than by discordance.
    #[arg(long, value_name = "INT", allow_negative_numbers = true)]
    n_matches: Option<i64>,

    /// Disable calculation of the HWE probability.
    #[arg(long = "no-hwe-prob", alias = "no-HWE-prob")]
    no_hwe_prob: bool,

    /// Find sites that can distinguish between NUM sample pairs.
    /// Values up to 1 are a fraction of all pairs, larger values a count.
    #[arg(long, value_name = "NUM", allow_negative_numbers = true)]
    distinctive_sites: Option<f64>,

    /// Stop after the first record to estimate the required time.
    #[arg(long)]
    dry_run: bool,

    /// Directory for temporary files used by --distinctive-sites.
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    temp_dir: Option<PathBuf>,

    /// Memory limit for --distinctive-sites before spilling to disk, e.g. 500M.
    #[arg(long, default_value = "500M")]
    max_mem: String,

    /// Seed for shuffling sites that distinguish the same number of pairs.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("gtcheck=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gtcheck=info,warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let input_spec = cli::build_input_spec(&args)?;
    std::fs::create_dir_all(&input_spec.output_dir)
        .map_err(|e| error::CustomError::OutputDir { source: e })?;
    input_spec.print_paths();

    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    cli::run(&input_spec, &command_line)?;
    Ok(())
}

fn main() -> miette::Result<()> {
    try_main().into_diagnostic()
}
