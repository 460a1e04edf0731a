// src/strategy/random.rs — weighted random slot selection

use rand::distributions::{Distribution, WeightedIndex};

use crate::error::EngineError;
use crate::runtime::task::TaskBuilder;
use crate::spec::TestTarget;
use crate::strategy::{Choice, Strategy, StrategyBase};

/// Draws the next thread slot from a discrete distribution weighted by the
/// per-slot weights, ignoring parked and blocked slots.
pub struct RandomStrategy<T: TestTarget> {
    base: StrategyBase<T>,
    weights: Vec<u32>,
}

impl<T: TestTarget> RandomStrategy<T> {
    pub fn new(
        threads: usize,
        builders: Vec<TaskBuilder<T>>,
        weights: Vec<u32>,
        seed: Option<u64>,
    ) -> Self {
        assert_eq!(
            weights.len(),
            threads,
            "number of weights must match the number of threads"
        );
        RandomStrategy {
            base: StrategyBase::new(threads, builders, seed),
            weights,
        }
    }

    /// Weighted draw over the given candidate slots. All candidates having
    /// weight zero counts as no candidate at all.
    fn draw(&mut self, candidates: &[usize]) -> Result<usize, EngineError> {
        if candidates.is_empty() {
            return Err(EngineError::Deadlock);
        }
        let dist = WeightedIndex::new(candidates.iter().map(|&i| self.weights[i]))
            .map_err(|_| EngineError::Deadlock)?;
        Ok(candidates[dist.sample(&mut self.base.rng)])
    }
}

impl<T: TestTarget> Strategy<T> for RandomStrategy<T> {
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
        let thread = self.draw(&candidates)?;
        Ok(self.base.choice_for(thread))
    }

    fn next_schedule(&mut self) -> Result<Choice, EngineError> {
        let mut candidates = Vec::with_capacity(self.base.threads_count());
        for thread in 0..self.base.threads_count() {
            if self.base.schedulable_index(thread).is_some() {
                candidates.push(thread);
            }
        }
        let thread = self.draw(&candidates)?;
        Ok(self.base.schedule_choice(thread))
    }
}
