// src/strategy/pct.rs — probabilistic concurrency testing
//
// Priority-based scheduling with d-1 priority change points, after
// Burckhardt et al., "A Randomized Scheduler with Probabilistic Guarantees
// of Finding Bugs" (ASPLOS 2010). The depth parameter grows round by round
// so later rounds target deeper priority inversions.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::EngineError;
use crate::runtime::task::TaskBuilder;
use crate::spec::TestTarget;
use crate::strategy::{Choice, Strategy, StrategyBase};

/// Default ceiling for the bug-depth parameter.
pub const DEFAULT_DEPTH_CAP: usize = 50;

pub struct PctStrategy<T: TestTarget> {
    base: StrategyBase<T>,
    /// Bug depth targeted by the current round.
    depth: usize,
    depth_cap: usize,
    /// Scheduling decisions made in the current round so far.
    schedule_length: usize,
    /// Schedule lengths of finished rounds; their running average estimates
    /// the number of potential switch points per round.
    k_history: Vec<usize>,
    priorities: Vec<usize>,
    change_points: Vec<usize>,
    forbid_all_same: bool,
}

impl<T: TestTarget> PctStrategy<T> {
    pub fn new(
        threads: usize,
        builders: Vec<TaskBuilder<T>>,
        forbid_all_same: bool,
        seed: Option<u64>,
    ) -> Self {
        Self::with_depth_cap(threads, builders, forbid_all_same, seed, DEFAULT_DEPTH_CAP)
    }

    pub fn with_depth_cap(
        threads: usize,
        builders: Vec<TaskBuilder<T>>,
        forbid_all_same: bool,
        seed: Option<u64>,
        depth_cap: usize,
    ) -> Self {
        let mut strategy = PctStrategy {
            base: StrategyBase::new(threads, builders, seed),
            depth: 1,
            depth_cap: depth_cap.max(1),
            schedule_length: 0,
            k_history: Vec::new(),
            priorities: Vec::new(),
            change_points: Vec::new(),
            forbid_all_same,
        };
        strategy.prepare_for_depth(1);
        strategy
    }

    /// Regenerates slot priorities and samples the d-1 change points from
    /// [1, k].
    fn prepare_for_depth(&mut self, k: usize) {
        let threads = self.base.threads_count();
        let depth = self.depth;
        self.priorities = (0..threads).map(|i| depth + i).collect();
        self.priorities.shuffle(&mut self.base.rng);
        let k = k.max(1);
        self.change_points = (0..depth.saturating_sub(1))
            .map(|_| self.base.rng.gen_range(1..=k))
            .collect();
    }

    /// Highest-priority slot among the candidates; ties go to the highest
    /// slot index.
    fn pick_by_priority(&self, candidates: &[usize]) -> Result<usize, EngineError> {
        let mut best: Option<usize> = None;
        let mut max_priority = 0;
        for &thread in candidates {
            if best.is_none() || self.priorities[thread] >= max_priority {
                max_priority = self.priorities[thread];
                best = Some(thread);
            }
        }
        best.ok_or(EngineError::Deadlock)
    }

    /// Counts one scheduling decision and applies any change point that
    /// fires at this position: the running slot's priority drops below
    /// every initial priority.
    fn account_pick(&mut self, chosen: usize) {
        self.schedule_length += 1;
        for i in 0..self.change_points.len() {
            if self.schedule_length == self.change_points[i] {
                self.priorities[chosen] = self.depth - i;
            }
        }
    }

    /// Method names of the newest task on every other non-empty thread.
    fn other_slot_names(&self, except: usize) -> HashSet<&'static str> {
        let mut names = HashSet::new();
        for thread in 0..self.base.threads_count() {
            if thread == except {
                continue;
            }
            if let Some(task) = self.base.thread(thread).last() {
                names.insert(task.name());
            }
        }
        names
    }

    /// Builder draw for `thread`, re-drawing while the candidate would make
    /// every thread run the same method.
    fn draw_builder(&mut self, thread: usize) -> usize {
        let mut builder = self.base.random_builder();
        if !self.forbid_all_same || self.base.builders().len() < 2 {
            return builder;
        }
        let names = self.other_slot_names(thread);
        if names.is_empty() {
            return builder;
        }
        loop {
            let candidate = self.base.builders()[builder].name;
            if names.len() == 1 && names.contains(candidate) {
                builder = self.base.random_builder();
            } else {
                return builder;
            }
        }
    }

    fn update_statistics(&mut self) {
        self.depth = (self.depth + 1).min(self.depth_cap);
        self.k_history.push(self.schedule_length);
        self.schedule_length = 0;
        let k = self.k_history.iter().sum::<usize>() / self.k_history.len();
        debug!(k, depth = self.depth, "pct round statistics");
        self.prepare_for_depth(k);
    }
}

impl<T: TestTarget> Strategy<T> for PctStrategy<T> {
    fn base(&self) -> &StrategyBase<T> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StrategyBase<T> {
        &mut self.base
    }

    fn next(&mut self) -> Result<Choice, EngineError> {
        let mut candidates = Vec::with_capacity(self.base.threads_count());
        for thread in 0..self.base.threads_count() {
            if !self.base.slot_unavailable(thread) {
                candidates.push(thread);
            }
        }
        let chosen = self.pick_by_priority(&candidates)?;
        self.account_pick(chosen);

        let needs_new = self
            .base
            .thread(chosen)
            .last()
            .map_or(true, |task| task.returned());
        if needs_new {
            let builder = self.draw_builder(chosen);
            Ok(self.base.spawn_with(chosen, builder))
        } else {
            Ok(Choice {
                thread: chosen,
                index: self.base.thread(chosen).len() - 1,
                is_new: false,
            })
        }
    }

    fn next_schedule(&mut self) -> Result<Choice, EngineError> {
        let mut candidates = Vec::with_capacity(self.base.threads_count());
        for thread in 0..self.base.threads_count() {
            if self.base.schedulable_index(thread).is_some() {
                candidates.push(thread);
            }
        }
        let chosen = self.pick_by_priority(&candidates)?;
        self.account_pick(chosen);
        Ok(self.base.schedule_choice(chosen))
    }

    fn start_next_round(&mut self) {
        self.base.hard_reset();
        self.update_statistics();
    }

    fn reset_current_round(&mut self) {
        self.base.soft_reset();
        self.update_statistics();
    }
}
