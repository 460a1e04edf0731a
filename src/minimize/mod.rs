//! Counterexample shrinking.
//!
//! Given a failing round, a minimizer shrinks the set of live tasks while
//! keeping the reduced history non-linearizable. Minimizers never report
//! failure: when nothing can be removed they leave the input unchanged, and
//! every speculative removal that does not pan out is rolled back.

pub mod greedy;
pub mod smart;

pub use greedy::{SameInterleavingMinimizer, StrategyExplorationMinimizer};
pub use smart::SmartMinimizer;

use crate::checker::ModelChecker;
use crate::error::EngineError;
use crate::scheduler::{Histories, StrategyScheduler};
use crate::spec::TestTarget;

/// Shrinks `histories` in place, marking removed tasks in the scheduler's
/// strategy as it goes.
pub trait Minimizer<T: TestTarget, C: ModelChecker> {
    fn minimize(
        &mut self,
        sched: &mut StrategyScheduler<T, C>,
        histories: &mut Histories,
    ) -> Result<(), EngineError>;
}
