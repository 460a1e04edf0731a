// src/main.rs — linstress command-line driver

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use linstress::spec::{Options, Spec, StrategyKind};
use linstress::targets::mutex::DeadlockSpec;
use linstress::targets::queue::FaultyQueueSpec;
use linstress::targets::register::{AtomicRegisterSpec, RaceRegisterSpec, RelaxedCounterSpec};
use linstress::targets::stack::FaultyStackSpec;
use linstress::verify::{verify, Verdict};
use linstress::{pretty::PrettyPrinter, report, EngineError};

const TARGETS: &[&str] = &[
    "race-register",
    "atomic-register",
    "relaxed-counter",
    "faulty-queue",
    "faulty-stack",
    "deadlock",
];

#[derive(Parser)]
#[command(
    name = "linstress",
    version,
    about = "linstress — interleaving stress tester for concurrent data structures",
    long_about = "Runs operations of a target structure as cooperatively scheduled tasks, \
explores interleavings under the selected strategy, checks each observed history for \
linearizability and shrinks any counterexample to a minimal failing round."
)]
struct Cli {
    /// Built-in target to verify
    #[arg(long, default_value = "race-register")]
    target: String,

    /// Number of thread slots
    #[arg(long)]
    threads: Option<usize>,

    /// Tasks to finish per round
    #[arg(long)]
    tasks: Option<usize>,

    /// Preemption bound for the tla strategy
    #[arg(long)]
    switches: Option<usize>,

    /// Max rounds to try
    #[arg(long)]
    rounds: Option<usize>,

    /// Scheduling strategy: rr, random, tla or pct
    #[arg(long)]
    strategy: Option<String>,

    /// Comma-separated per-thread weights for the random strategy
    #[arg(long)]
    weights: Option<String>,

    /// Forbid rounds that run the same method on every thread
    #[arg(long)]
    forbid_all_same: bool,

    /// Verbose logging of rounds and minimization stages
    #[arg(short, long, env = "LINSTRESS_VERBOSE")]
    verbose: bool,

    /// Strategy RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Run budget for exploration-based minimization
    #[arg(long)]
    explore_runs: Option<usize>,

    /// Emit the counterexample as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn build_options<Sp: Spec>(cli: &Cli) -> Result<Options, EngineError> {
    let mut opts = Sp::options().unwrap_or_default();
    if let Some(threads) = cli.threads {
        opts.threads = threads;
    }
    if let Some(tasks) = cli.tasks {
        opts.tasks = tasks;
    }
    if let Some(switches) = cli.switches {
        opts.switches = switches;
    }
    if let Some(rounds) = cli.rounds {
        opts.rounds = rounds;
    }
    if let Some(strategy) = &cli.strategy {
        opts.strategy = strategy
            .parse::<StrategyKind>()
            .map_err(EngineError::Config)?;
    }
    if let Some(weights) = &cli.weights {
        opts.weights = weights
            .split(',')
            .map(|w| {
                w.trim()
                    .parse::<u32>()
                    .map_err(|_| EngineError::Config(format!("invalid weight '{w}'")))
            })
            .collect::<Result<Vec<u32>, _>>()?;
    }
    if cli.forbid_all_same {
        opts.forbid_all_same = true;
    }
    if cli.verbose {
        opts.verbose = true;
    }
    if cli.seed.is_some() {
        opts.seed = cli.seed;
    }
    if let Some(explore_runs) = cli.explore_runs {
        opts.explore_runs = explore_runs;
    }
    Ok(opts)
}

fn run_target<Sp>(cli: &Cli) -> Result<i32, EngineError>
where
    Sp: Spec,
    Sp::Target: 'static,
{
    let opts = build_options::<Sp>(cli)?;

    println!("target   = {}", cli.target);
    println!("strategy = {}", opts.strategy.literal());
    println!("threads  = {}", opts.threads);
    println!("tasks    = {}", opts.tasks);
    println!("switches = {}", opts.switches);
    println!("rounds   = {}", opts.rounds);
    println!();

    match verify::<Sp>(&opts)? {
        Verdict::Linearizable => {
            println!("{}", "success!".green().bold());
            Ok(0)
        }
        Verdict::NonLinearizable(histories) => {
            if cli.json {
                println!("{}", report::render_json(&histories));
            } else {
                println!("{}", "non linearizable:".red().bold());
                print!("{}", PrettyPrinter::new(opts.threads).render(&histories.seq));
            }
            Ok(1)
        }
    }
}

fn dispatch(cli: &Cli) -> Result<i32, EngineError> {
    match cli.target.as_str() {
        "race-register" => run_target::<RaceRegisterSpec>(cli),
        "atomic-register" => run_target::<AtomicRegisterSpec>(cli),
        "relaxed-counter" => run_target::<RelaxedCounterSpec>(cli),
        "faulty-queue" => run_target::<FaultyQueueSpec>(cli),
        "faulty-stack" => run_target::<FaultyStackSpec>(cli),
        "deadlock" => run_target::<DeadlockSpec>(cli),
        other => Err(EngineError::Config(format!(
            "unknown target '{other}' (available: {})",
            TARGETS.join(", ")
        ))),
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "linstress=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let code = match dispatch(&cli) {
        Ok(code) => code,
        Err(err @ EngineError::Config(_)) => {
            eprintln!("{} {err}", "[linstress]".red().bold());
            2
        }
        Err(err) => {
            eprintln!("{} {err}", "[linstress]".red().bold());
            1
        }
    };
    std::process::exit(code);
}
