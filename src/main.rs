use clap::Parser;
use hybridization_number::hybrid::{HybridizationNumber, SearchConfig};
use hybridization_number::io::{read_trees, write_matrix_tsv};
use log::{LevelFilter, error, info};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Compute pairwise hybridization numbers of rooted trees read from Newick or
/// BEAST/NEXUS files and write a labeled matrix (TSV) where row/column names
/// are tree names.
#[derive(Parser, Debug)]
#[command(name = "hybrid-number", version, about = "Pairwise hybridization number matrix")]
struct Args {
    /// Tree file(s): Newick or BEAST .trees (NEXUS), optionally gzipped
    #[arg(short = 'i', long = "input", required = true)]
    input: Vec<PathBuf>,

    /// Output path for the TSV matrix (`-` for stdout, `.gz` to compress)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Burn-in by number of trees (drop first N trees of every file)
    #[arg(short = 't', long = "burnin-trees", default_value_t = 0)]
    burnin_trees: usize,

    /// Use TRANSLATE block to map taxon IDs to labels when available
    #[arg(long = "use-real-taxa", default_value_t = false)]
    use_real_taxa: bool,

    /// Worker threads for each search (default: all cores)
    #[arg(long = "threads")]
    threads: Option<usize>,

    /// Entries kept in the subproblem cache
    #[arg(long = "cache-capacity")]
    cache_capacity: Option<usize>,

    /// Known achievable hybridization number, skips the heuristic bound
    #[arg(long = "upper-bound")]
    upper_bound: Option<u32>,

    /// Milliseconds between progress polls
    #[arg(long = "poll-ms", default_value_t = 100)]
    poll_ms: u64,

    /// Quiet mode: only warnings and errors
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,

    /// Verbose mode: also log search milestones
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

fn init_logging(args: &Args) {
    let level = if args.quiet {
        LevelFilter::Warn
    } else if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
}

fn search_config(args: &Args) -> SearchConfig {
    let defaults = SearchConfig::default();
    SearchConfig {
        threads: args.threads.unwrap_or(defaults.threads),
        cache_capacity: args.cache_capacity.unwrap_or(defaults.cache_capacity),
        poll_interval: Duration::from_millis(args.poll_ms),
        upper_bound: args.upper_bound,
    }
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    let t0 = Instant::now();
    let mut named_trees = Vec::new();
    for path in &args.input {
        match read_trees(path, args.burnin_trees, args.use_real_taxa) {
            Ok(trees) => named_trees.extend(trees),
            Err(e) => {
                error!("Failed to read {}: {e}", path.display());
                std::process::exit(2);
            }
        }
    }
    if named_trees.len() < 2 {
        error!("Need at least 2 trees, parsed {} from {:?}.", named_trees.len(), args.input);
        std::process::exit(2);
    }
    info!("Read {} trees in {:.3}s", named_trees.len(), t0.elapsed().as_secs_f64());
    let (names, trees): (Vec<String>, Vec<_>) = named_trees.into_iter().unzip();

    let runner = HybridizationNumber::new(search_config(&args));
    let n = names.len();
    info!(
        "Determining hybridization numbers for {} pairs on {} threads",
        n * (n - 1) / 2,
        runner.config().threads
    );

    let t1 = Instant::now();
    let mut mat = vec![vec![0u32; n]; n];
    for i in 0..n {
        for j in i + 1..n {
            match runner.run(&trees[i], &trees[j]) {
                Ok(h) => {
                    info!("{} vs {}: {h}", names[i], names[j]);
                    mat[i][j] = h;
                    mat[j][i] = h;
                }
                Err(e) => {
                    error!("Failed on {} vs {}: {e}", names[i], names[j]);
                    std::process::exit(3);
                }
            }
        }
    }
    info!("Computed all pairs in {:.3}s", t1.elapsed().as_secs_f64());

    let t2 = Instant::now();
    if let Err(e) = write_matrix_tsv(&args.output, &names, &mat) {
        error!("Failed to write output {}: {e}", args.output.display());
        std::process::exit(4);
    }
    info!("Wrote {} in {:.3}s", args.output.display(), t2.elapsed().as_secs_f64());
}
