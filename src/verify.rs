// src/verify.rs — top-level run orchestration

use tracing::info;

use crate::checker::LinearizabilityChecker;
use crate::error::EngineError;
use crate::runtime::task::TaskBuilder;
use crate::scheduler::{Histories, Scheduler, StrategyScheduler, TlaScheduler};
use crate::spec::{Options, Spec, StrategyKind, TestTarget};
use crate::strategy::pct::PctStrategy;
use crate::strategy::random::RandomStrategy;
use crate::strategy::round_robin::RoundRobinStrategy;
use crate::strategy::Strategy;

/// Outcome of a verification run.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Every explored round checked out within the budget.
    Linearizable,
    /// A counterexample survived minimization.
    NonLinearizable(Histories),
}

/// Builds the strategy selected by the options. The enumerative scheduler
/// is not a strategy; `verify` dispatches it separately.
pub fn make_strategy<T>(
    opts: &Options,
    builders: Vec<TaskBuilder<T>>,
) -> Result<Box<dyn Strategy<T>>, EngineError>
where
    T: TestTarget + 'static,
{
    match opts.strategy {
        StrategyKind::RoundRobin => Ok(Box::new(RoundRobinStrategy::new(
            opts.threads,
            builders,
            opts.seed,
        ))),
        StrategyKind::Random => {
            let weights = if opts.weights.is_empty() {
                vec![1; opts.threads]
            } else {
                opts.weights.clone()
            };
            if weights.len() != opts.threads {
                return Err(EngineError::Config(format!(
                    "number of weights ({}) does not match the number of threads ({})",
                    weights.len(),
                    opts.threads
                )));
            }
            if weights.iter().all(|w| *w == 0) {
                return Err(EngineError::Config(
                    "at least one thread weight must be non-zero".into(),
                ));
            }
            Ok(Box::new(RandomStrategy::new(
                opts.threads,
                builders,
                weights,
                opts.seed,
            )))
        }
        StrategyKind::Pct => Ok(Box::new(PctStrategy::new(
            opts.threads,
            builders,
            opts.forbid_all_same,
            opts.seed,
        ))),
        StrategyKind::Tla => Err(EngineError::Config(
            "the tla scheduler is not strategy-driven".into(),
        )),
    }
}

/// Runs the full pipeline for one registered spec: strategy, driver,
/// checker, and on failure the minimization stack.
pub fn verify<Sp>(opts: &Options) -> Result<Verdict, EngineError>
where
    Sp: Spec,
    Sp::Target: 'static,
{
    let builders = Sp::builders();
    if builders.is_empty() {
        return Err(EngineError::Config("no task builders registered".into()));
    }
    if opts.threads == 0 {
        return Err(EngineError::Config("at least one thread is required".into()));
    }

    info!(
        strategy = opts.strategy.literal(),
        threads = opts.threads,
        tasks = opts.tasks,
        rounds = opts.rounds,
        targets = builders.len(),
        "starting verification"
    );

    let checker = LinearizabilityChecker::new(Sp::reference());
    let result = match opts.strategy {
        StrategyKind::Tla => {
            let mut scheduler = TlaScheduler::new(
                opts.threads,
                builders,
                checker,
                opts.tasks,
                opts.rounds,
                opts.switches,
            );
            scheduler.run()?
        }
        _ => {
            let strategy = make_strategy(opts, builders)?;
            let mut scheduler = StrategyScheduler::new(
                strategy,
                checker,
                opts.tasks,
                opts.rounds,
                opts.explore_runs,
                opts.seed,
            );
            scheduler.run()?
        }
    };

    Ok(match result {
        Some(histories) => Verdict::NonLinearizable(histories),
        None => Verdict::Linearizable,
    })
}
