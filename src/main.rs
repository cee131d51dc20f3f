use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use makepair::dataset::MalformedPolicy;
use makepair::options::PairOpt;
use makepair::sampler::{SamplingStrategy, DEFAULT_MAX_REDRAWS};
use makepair::{run, seeded_rng, RunSummary};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    /// Sample directly from the accepted partners
    Exact,
    /// Redraw over all records until a partner is accepted
    Rejection,
    /// Redraw loop that takes the multiple-of-3 test from the first draw only
    FixedFlag,
}

#[derive(Parser)]
#[command(name = "makepair")]
#[command(about = "Build a labeled pair training set from `category ,text` lines", long_about = None)]
#[command(version)]
struct Cli {
    /// Input file, one `category ,text` record per line
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Directory for train.label, train.first and train.second
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Seed the random generator for reproducible output
    #[arg(short = 's', long, value_name = "INT")]
    seed: Option<u64>,

    /// Partner sampling strategy
    #[arg(long, value_enum, default_value_t = Strategy::Exact)]
    strategy: Strategy,

    /// Redraw cap for the rejection and fixed-flag strategies
    #[arg(long, value_name = "INT", default_value_t = DEFAULT_MAX_REDRAWS)]
    max_redraws: usize,

    /// Skip lines without a " ," delimiter instead of aborting
    #[arg(long)]
    skip_malformed: bool,

    /// Verbose level: 1=error, 2=warning, 3=message, 4=debugging, 5+=trace
    #[arg(short = 'v', long, value_name = "INT", default_value = "3")]
    verbosity: i32,
}

impl Cli {
    fn to_opt(&self) -> PairOpt {
        let strategy = match self.strategy {
            Strategy::Exact => SamplingStrategy::Exact,
            Strategy::Rejection => SamplingStrategy::Rejection {
                max_redraws: self.max_redraws,
            },
            Strategy::FixedFlag => SamplingStrategy::FixedFlag {
                max_redraws: self.max_redraws,
            },
        };
        let malformed = if self.skip_malformed {
            MalformedPolicy::Skip
        } else {
            MalformedPolicy::Abort
        };

        PairOpt {
            input: self.input.clone(),
            output_dir: self.output_dir.clone(),
            seed: self.seed,
            strategy,
            malformed,
        }
    }
}

fn make_pairs(opt: &PairOpt) -> Result<RunSummary> {
    let mut rng = seeded_rng(opt.seed);
    run(opt, &mut rng).with_context(|| format!("Pairing {} failed", opt.input.display()))
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let opt = cli.to_opt();
    log::debug!("{:?}", opt);

    match make_pairs(&opt) {
        Ok(summary) => {
            if summary.skipped > 0 {
                log::warn!("Skipped {} malformed lines", summary.skipped);
            }
            let match_rate = if summary.pairs > 0 {
                summary.matches as f64 / summary.pairs as f64
            } else {
                0.0
            };
            log::info!(
                "Wrote {} pairs ({:.1}% matching)",
                summary.pairs,
                match_rate * 100.0
            );
            for path in opt.output_paths() {
                log::info!("  {}", path.display());
            }
        }
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
