// src/spec.rs — registration surface: targets, sequential references, options

use std::hash::Hash;
use std::str::FromStr;

use crate::runtime::task::TaskBuilder;
use crate::value::Value;

/// The system under test.
///
/// A fresh target is built with `Default` at the start of a run and `reset`
/// between rounds. Targets that model futex-style blocking expose their
/// words through `futex_word`; everything else keeps the default.
pub trait TestTarget: Default {
    fn reset(&mut self);

    /// Current value of the futex word at `addr`, if the target has one.
    fn futex_word(&self, _addr: u64) -> Option<i64> {
        None
    }
}

/// Sequential reference semantics of the target.
///
/// For every method name of the target there is a pure transition
/// `(state, args) -> (state', value)`. The checker copies states freely and
/// memoizes them, hence the `Clone + Eq + Hash` bounds.
///
/// Calling `apply` with a method the reference does not know indicates a
/// broken registration and aborts.
pub trait SeqSpec: Clone + Eq + Hash {
    fn apply(&mut self, method: &str, args: &[Value]) -> Value;
}

/// One verifiable target: the implementation, its sequential reference, and
/// the set of task builders that produce operations on it.
pub trait Spec {
    type Target: TestTarget;
    type Ref: SeqSpec;

    /// Initial state of the sequential reference.
    fn reference() -> Self::Ref;

    /// Task builders registered for this target. Fixed for the whole run.
    fn builders() -> Vec<TaskBuilder<Self::Target>>;

    /// Per-target defaults applied underneath the command-line flags.
    fn options() -> Option<Options> {
        None
    }
}

/// Which scheduling strategy drives the round generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Cyclic scan over thread slots.
    RoundRobin,
    /// Weighted draw over thread slots.
    Random,
    /// Exhaustive enumeration bounded by the preemption budget.
    Tla,
    /// Probabilistic concurrency testing with priority change points.
    Pct,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rr" => Ok(StrategyKind::RoundRobin),
            "random" => Ok(StrategyKind::Random),
            "tla" => Ok(StrategyKind::Tla),
            "pct" => Ok(StrategyKind::Pct),
            other => Err(format!("unknown strategy '{other}' (expected rr, random, tla or pct)")),
        }
    }
}

impl StrategyKind {
    pub fn literal(self) -> &'static str {
        match self {
            StrategyKind::RoundRobin => "rr",
            StrategyKind::Random => "random",
            StrategyKind::Tla => "tla",
            StrategyKind::Pct => "pct",
        }
    }
}

/// Run configuration shared by the library entry points and the CLI.
#[derive(Debug, Clone)]
pub struct Options {
    /// Number of thread slots.
    pub threads: usize,
    /// Finished tasks per round.
    pub tasks: usize,
    /// Preemption bound for the enumerative scheduler.
    pub switches: usize,
    /// Rounds to try before giving up.
    pub rounds: usize,
    pub strategy: StrategyKind,
    /// Per-thread weights for the random strategy; empty means all ones.
    pub weights: Vec<u32>,
    /// Forbid rounds that run the same method on every thread at once.
    pub forbid_all_same: bool,
    pub verbose: bool,
    /// Strategy RNG seed; `None` draws one from entropy.
    pub seed: Option<u64>,
    /// Run budget handed to exploration-based minimization.
    pub explore_runs: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            threads: 2,
            tasks: 15,
            switches: 100_000_000,
            rounds: 5,
            strategy: StrategyKind::RoundRobin,
            weights: Vec::new(),
            forbid_all_same: false,
            verbose: false,
            seed: None,
            explore_runs: 10,
        }
    }
}
