use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use skein_runtime::{Configuration, StrategyKind, TestingEngine, TraceFile};

mod samples;

#[derive(Parser)]
#[command(name = "skein", about = "Skein: systematic concurrency testing for actor programs")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in sample programs.
    Samples,
    /// Explore a sample program under a scheduling strategy.
    Test(TestArgs),
    /// Replay a trace file against a sample and check the bug reproduces.
    Replay {
        /// Sample name.
        sample: String,
        /// Trace file written by `skein test --out`.
        trace: PathBuf,
    },
    /// Print a trace file in human-readable form.
    Show {
        /// Trace file (JSON)
        trace: PathBuf,
        /// Also print the schedule decisions.
        #[arg(long)]
        schedule: bool,
    },
}

#[derive(clap::Args, Default)]
struct TestArgs {
    /// Sample name (see `skein samples`).
    sample: String,
    /// JSON configuration file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// random, dfs, pct, random-delay, or exhaustive-delay.
    #[arg(short, long)]
    strategy: Option<StrategyKind>,
    /// Iteration budget (0 = until the strategy is exhausted).
    #[arg(short, long)]
    iterations: Option<usize>,
    /// Depth bound in scheduling decisions (0 = unbounded).
    #[arg(long)]
    max_steps: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Max delays or priority change points.
    #[arg(long)]
    bound: Option<usize>,
    /// Enable the race detector.
    #[arg(long)]
    race: bool,
    #[arg(long)]
    stop_at_first_bug: bool,
    #[arg(long)]
    depth_bound_is_bug: bool,
    /// Fold actor-defined state hashes into state fingerprints.
    #[arg(long)]
    user_state_hashing: bool,
    /// Write the first bug's trace file here.
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Samples => {
            for sample in samples::SAMPLES {
                println!("{:<20} {}", sample.name, sample.summary);
            }
        }
        Command::Test(args) => {
            let sample = samples::find(&args.sample)?;
            let config = build_config(&args)?;
            let engine = TestingEngine::new(config, sample.entry);
            let report = engine.run()?;

            if args.json {
                println!("{}", report.to_json()?);
            } else {
                print!("{report}");
            }

            if let (Some(path), Some(first)) = (&args.out, &report.first_bug) {
                TraceFile::new(report.strategy.clone(), first)?.save(path)?;
                eprintln!("trace written to {}", path.display());
            }
            if report.found_bug() {
                process::exit(2);
            }
        }
        Command::Replay { sample, trace } => {
            let sample = samples::find(&sample)?;
            let file = TraceFile::load(&trace)?;
            let engine = TestingEngine::new(Configuration::default(), sample.entry);
            let outcome = engine.replay_file(&file)?;
            println!("reproduced: {}", file.bug);
            println!("{} decisions replayed", outcome.schedule.len());
            print!("{}", outcome.bug_trace);
        }
        Command::Show { trace, schedule } => {
            let file = TraceFile::load(&trace)?;
            println!("strategy: {}", file.strategy);
            println!("bug: {}", file.bug);
            println!("digest: {}", file.digest);
            if schedule {
                println!("schedule ({} decisions):", file.schedule.len());
                for step in file.schedule.steps() {
                    println!("{:>4}  {}", step.index, step.decision);
                }
            }
            println!("bug trace ({} steps):", file.bug_trace.len());
            print!("{}", file.bug_trace);
        }
    }
    Ok(())
}

fn build_config(args: &TestArgs) -> Result<Configuration, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => Configuration::load(path)?,
        None => Configuration::default(),
    };
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(max_steps) = args.max_steps {
        config.max_steps = max_steps;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(bound) = args.bound {
        config.strategy_bound = bound;
    }
    config.enable_race_detection |= args.race;
    config.stop_at_first_bug |= args.stop_at_first_bug;
    config.depth_bound_is_bug |= args.depth_bound_is_bug;
    config.user_state_hashing |= args.user_state_hashing;
    Ok(config)
}
