// src/minimize/greedy.rs — greedy task removal
//
// Both greedy minimizers walk the failing round's tasks and speculatively
// remove them, first one at a time, then in ordered pairs. The pair pass is
// what shrinks structures with matched operation semantics (a push and the
// pop that observes it can only go away together). They differ in how a
// removal attempt is validated.

use std::collections::HashSet;

use tracing::debug;

use crate::checker::ModelChecker;
use crate::error::EngineError;
use crate::history::Event;
use crate::runtime::task::TaskId;
use crate::scheduler::{Histories, StrategyScheduler};
use crate::spec::TestTarget;
use crate::strategy::Strategy;

use super::Minimizer;

/// Task ids in invoke order of a sequential history.
fn invoked_tasks(seq: &[Event]) -> Vec<TaskId> {
    seq.iter()
        .filter(|event| event.is_invoke())
        .map(Event::task)
        .collect()
}

/// How a greedy minimizer validates a speculative removal. Returns the new
/// failing histories when the round still fails without the tasks, `None`
/// otherwise (with all speculative state rolled back).
trait RemovalProbe<T: TestTarget, C: ModelChecker> {
    fn on_tasks_removed(
        &mut self,
        sched: &mut StrategyScheduler<T, C>,
        histories: &Histories,
        ids: &[TaskId],
    ) -> Result<Option<Histories>, EngineError>;
}

fn greedy_minimize<T, C, P>(
    probe: &mut P,
    sched: &mut StrategyScheduler<T, C>,
    histories: &mut Histories,
) -> Result<(), EngineError>
where
    T: TestTarget,
    C: ModelChecker,
    P: RemovalProbe<T, C>,
{
    let tasks = invoked_tasks(&histories.seq);

    // single tasks
    for &id in &tasks {
        if sched.strategy().base().is_removed(id) {
            continue;
        }
        debug!(task = %id, "trying to remove task");
        if let Some(new_histories) = probe.on_tasks_removed(sched, histories, &[id])? {
            *histories = new_histories;
            sched.strategy_mut().set_removed(id, true);
        }
    }

    // ordered pairs, for add/remove style structures
    for i in 0..tasks.len() {
        if sched.strategy().base().is_removed(tasks[i]) {
            continue;
        }
        for j in (i + 1)..tasks.len() {
            if sched.strategy().base().is_removed(tasks[j]) {
                continue;
            }
            let (first, second) = (tasks[i], tasks[j]);
            debug!(%first, %second, "trying to remove task pair");
            if let Some(new_histories) =
                probe.on_tasks_removed(sched, histories, &[first, second])?
            {
                // a replayed round completes every scheduled task, so the
                // sequential history pairs up
                debug_assert!(new_histories.seq.len() % 2 == 0);
                *histories = new_histories;
                sched.strategy_mut().set_removed(tasks[i], true);
                sched.strategy_mut().set_removed(tasks[j], true);
                break;
            }
        }
    }

    Ok(())
}

/// Replays the failing interleaving itself, minus the removed tasks: the
/// full history is projected onto the surviving ids and re-executed
/// verbatim. Cheap, deterministic, and by construction never enlarges the
/// surviving set.
pub struct SameInterleavingMinimizer;

impl<T: TestTarget, C: ModelChecker> RemovalProbe<T, C> for SameInterleavingMinimizer {
    fn on_tasks_removed(
        &mut self,
        sched: &mut StrategyScheduler<T, C>,
        histories: &Histories,
        ids: &[TaskId],
    ) -> Result<Option<Histories>, EngineError> {
        let exclude: HashSet<TaskId> = ids.iter().copied().collect();
        let ordering = StrategyScheduler::<T, C>::tasks_ordering(&histories.full, &exclude);
        match sched.replay_round(&ordering) {
            // a stuck replay just means this removal does not work
            Err(EngineError::Deadlock) => Ok(None),
            other => other,
        }
    }
}

impl<T: TestTarget, C: ModelChecker> Minimizer<T, C> for SameInterleavingMinimizer {
    fn minimize(
        &mut self,
        sched: &mut StrategyScheduler<T, C>,
        histories: &mut Histories,
    ) -> Result<(), EngineError> {
        greedy_minimize(self, sched, histories)
    }
}

/// Marks the tasks removed and lets the strategy look for any failing
/// interleaving of the reduced round within a run budget. Slower than the
/// same-interleaving probe but can shrink rounds whose original
/// interleaving stops failing once a task disappears.
pub struct StrategyExplorationMinimizer {
    runs: usize,
}

impl StrategyExplorationMinimizer {
    pub fn new(runs: usize) -> Self {
        StrategyExplorationMinimizer { runs }
    }
}

impl<T: TestTarget, C: ModelChecker> RemovalProbe<T, C> for StrategyExplorationMinimizer {
    fn on_tasks_removed(
        &mut self,
        sched: &mut StrategyScheduler<T, C>,
        _histories: &Histories,
        ids: &[TaskId],
    ) -> Result<Option<Histories>, EngineError> {
        for &id in ids {
            sched.strategy_mut().set_removed(id, true);
        }
        let explored = match sched.explore_round(self.runs) {
            Err(EngineError::Deadlock) => None,
            other => other?,
        };
        if explored.is_none() {
            for &id in ids {
                sched.strategy_mut().set_removed(id, false);
            }
        }
        Ok(explored)
    }
}

impl<T: TestTarget, C: ModelChecker> Minimizer<T, C> for StrategyExplorationMinimizer {
    fn minimize(
        &mut self,
        sched: &mut StrategyScheduler<T, C>,
        histories: &mut Histories,
    ) -> Result<(), EngineError> {
        greedy_minimize(self, sched, histories)
    }
}
