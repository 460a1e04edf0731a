//! Round drivers.
//!
//! `StrategyScheduler` generates candidate interleavings through a strategy,
//! records the invoke/response history of each round, hands it to the
//! checker, and on the first violation shrinks the round through the
//! minimization pipeline. `TlaScheduler` is the enumerative alternative
//! that walks every execution within a preemption budget.

pub mod tla;

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, info};

use crate::checker::ModelChecker;
use crate::error::EngineError;
use crate::history::{Event, Invoke, Response};
use crate::minimize::{
    Minimizer, SameInterleavingMinimizer, SmartMinimizer, StrategyExplorationMinimizer,
};
use crate::pretty::PrettyPrinter;
use crate::runtime::task::TaskId;
use crate::spec::TestTarget;
use crate::strategy::{Choice, Strategy};

pub use tla::TlaScheduler;

/// The record of one failing round: every resume step (full history) and the
/// invoke/response events (sequential history).
#[derive(Debug, Clone, PartialEq)]
pub struct Histories {
    pub full: Vec<TaskId>,
    pub seq: Vec<Event>,
}

/// A scheduler runs rounds until it finds a counterexample or exhausts its
/// budget. `None` means every explored history checked out.
pub trait Scheduler {
    fn run(&mut self) -> Result<Option<Histories>, EngineError>;
}

/// Generates interleavings with a strategy and verifies each observed
/// history with the checker.
pub struct StrategyScheduler<T: TestTarget, C: ModelChecker> {
    strategy: Box<dyn Strategy<T>>,
    checker: C,
    printer: PrettyPrinter,
    max_tasks: usize,
    max_rounds: usize,
    explore_runs: usize,
    minimizer_seed: Option<u64>,
}

impl<T: TestTarget, C: ModelChecker> StrategyScheduler<T, C> {
    pub fn new(
        strategy: Box<dyn Strategy<T>>,
        checker: C,
        max_tasks: usize,
        max_rounds: usize,
        explore_runs: usize,
        minimizer_seed: Option<u64>,
    ) -> Self {
        let printer = PrettyPrinter::new(strategy.threads_count());
        StrategyScheduler {
            strategy,
            checker,
            printer,
            max_tasks,
            max_rounds,
            explore_runs,
            minimizer_seed,
        }
    }

    pub fn strategy(&self) -> &dyn Strategy<T> {
        &*self.strategy
    }

    pub fn strategy_mut(&mut self) -> &mut dyn Strategy<T> {
        &mut *self.strategy
    }

    pub fn checker(&self) -> &C {
        &self.checker
    }

    /// Restarts the round and clears the removed overlay, so every task of
    /// the round participates again.
    pub fn reset_current_round(&mut self) {
        self.strategy.reset_current_round();
        self.strategy.clear_removed();
    }

    /// Projects the full history onto task ids, dropping the excluded ones.
    pub fn tasks_ordering(full: &[TaskId], exclude: &HashSet<TaskId>) -> Vec<TaskId> {
        full.iter()
            .copied()
            .filter(|id| !exclude.contains(id))
            .collect()
    }

    fn record_choice(&self, choice: &Choice, seq: &mut Vec<Event>, full: &mut Vec<TaskId>) {
        let task = self.strategy.base().task(choice.thread, choice.index);
        if choice.is_new {
            seq.push(Event::Invoke(Invoke {
                task: task.id(),
                thread: choice.thread,
                method: task.name(),
                args: task.args().to_vec(),
            }));
        }
        full.push(task.id());
    }

    /// Response event for the task at `choice` if it has just returned.
    fn record_return(&self, choice: &Choice, seq: &mut Vec<Event>) -> bool {
        let task = self.strategy.base().task(choice.thread, choice.index);
        if task.returned() {
            seq.push(Event::Response(Response {
                task: task.id(),
                thread: choice.thread,
                result: task.ret_val().clone(),
            }));
            true
        } else {
            false
        }
    }

    /// Generates one round and checks it. `Some` carries the failing
    /// histories.
    pub fn run_round(&mut self) -> Result<Option<Histories>, EngineError> {
        let mut seq = Vec::new();
        let mut full = Vec::new();

        let mut finished = 0usize;
        while finished < self.max_tasks {
            let choice = self.strategy.next()?;
            self.record_choice(&choice, &mut seq, &mut full);
            self.strategy.base_mut().resume(choice.thread, choice.index);
            if self.record_return(&choice, &mut seq) {
                finished += 1;
            }
        }

        debug!("round history:\n{}", self.printer.render(&seq));

        if self.checker.check(&seq) {
            Ok(None)
        } else {
            Ok(Some(Histories { full, seq }))
        }
    }

    /// Replays the current round `runs` times under fresh strategy
    /// schedules, stopping at the first non-linearizable history.
    pub fn explore_round(&mut self, runs: usize) -> Result<Option<Histories>, EngineError> {
        for _ in 0..runs {
            self.strategy.reset_current_round();
            let mut seq = Vec::new();
            let mut full = Vec::new();

            let mut tasks_to_run = self.strategy.valid_tasks_count();
            while tasks_to_run > 0 {
                let choice = self.strategy.next_schedule()?;
                self.record_choice(&choice, &mut seq, &mut full);
                self.strategy.base_mut().resume(choice.thread, choice.index);
                if self.record_return(&choice, &mut seq) {
                    tasks_to_run -= 1;
                }
            }

            if !self.checker.check(&seq) {
                return Ok(Some(Histories { full, seq }));
            }
        }
        Ok(None)
    }

    /// Deterministically re-executes exactly the given order of task ids.
    ///
    /// Each id is resumed once per appearance; on its last appearance the
    /// task is driven to completion instead, which makes "the same
    /// interleaving minus some tasks" a complete round.
    pub fn replay_round(&mut self, ordering: &[TaskId]) -> Result<Option<Histories>, EngineError> {
        self.strategy.reset_current_round();

        let mut remaining: HashMap<TaskId, usize> = HashMap::new();
        for id in ordering {
            *remaining.entry(*id).or_insert(0) += 1;
        }

        let mut seq = Vec::new();
        let mut full = Vec::new();
        let mut started: HashSet<TaskId> = HashSet::new();

        for &id in ordering {
            let (thread, index) = self
                .strategy
                .find_task(id)
                .ok_or(EngineError::UnknownTask(id))?;
            let choice = Choice {
                thread,
                index,
                is_new: started.insert(id),
            };
            self.record_choice(&choice, &mut seq, &mut full);

            if self.strategy.base().task(thread, index).returned() {
                continue;
            }

            let left = remaining
                .get_mut(&id)
                .expect("appearance count exists for every id in the ordering");
            *left -= 1;
            if *left == 0 {
                self.strategy.base_mut().terminate_task(thread, index);
            } else {
                self.strategy.base_mut().resume(thread, index);
            }
            self.record_return(&choice, &mut seq);
        }

        if self.checker.check(&seq) {
            Ok(None)
        } else {
            Ok(Some(Histories { full, seq }))
        }
    }

    fn minimize_stage<M: Minimizer<T, C>>(
        &mut self,
        label: &str,
        minimizer: &mut M,
        histories: &mut Histories,
    ) -> Result<(), EngineError> {
        let started = Instant::now();
        minimizer.minimize(self, histories)?;
        info!(
            stage = label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            surviving_tasks = self.strategy.valid_tasks_count(),
            total_tasks = self.strategy.total_tasks_count(),
            "minimization stage finished"
        );
        debug!("minimized history:\n{}", self.printer.render(&histories.seq));
        Ok(())
    }
}

impl<T: TestTarget, C: ModelChecker> Scheduler for StrategyScheduler<T, C> {
    fn run(&mut self) -> Result<Option<Histories>, EngineError> {
        for round in 0..self.max_rounds {
            debug!(round, "running round");
            if let Some(mut histories) = self.run_round()? {
                info!(
                    round,
                    tasks = self.strategy.total_tasks_count(),
                    "found a non-linearizable scenario"
                );
                info!("full scenario:\n{}", self.printer.render(&histories.seq));

                self.minimize_stage(
                    "same-interleaving",
                    &mut SameInterleavingMinimizer,
                    &mut histories,
                )?;
                self.minimize_stage(
                    "strategy-exploration",
                    &mut StrategyExplorationMinimizer::new(self.explore_runs),
                    &mut histories,
                )?;
                let mut smart =
                    SmartMinimizer::new(self.explore_runs, self.explore_runs, self.minimizer_seed);
                self.minimize_stage("smart", &mut smart, &mut histories)?;

                return Ok(Some(histories));
            }
            self.strategy.start_next_round();
        }
        Ok(None)
    }
}
