// src/strategy/round_robin.rs — cyclic scan over thread slots

use crate::error::EngineError;
use crate::runtime::task::TaskBuilder;
use crate::spec::TestTarget;
use crate::strategy::{Choice, Strategy, StrategyBase};

/// Advances thread slots in cyclic order, skipping slots whose newest task
/// is parked or blocked. The first runnable slot wins.
pub struct RoundRobinStrategy<T: TestTarget> {
    base: StrategyBase<T>,
    cursor: usize,
}

impl<T: TestTarget> RoundRobinStrategy<T> {
    pub fn new(threads: usize, builders: Vec<TaskBuilder<T>>, seed: Option<u64>) -> Self {
        RoundRobinStrategy {
            base: StrategyBase::new(threads, builders, seed),
            cursor: 0,
        }
    }
}

impl<T: TestTarget> Strategy<T> for RoundRobinStrategy<T> {
    fn base(&self) -> &StrategyBase<T> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StrategyBase<T> {
        &mut self.base
    }

    fn next(&mut self) -> Result<Choice, EngineError> {
        let slots = self.base.threads_count();
        for _ in 0..slots {
            let current = self.cursor % slots;
            self.cursor += 1;
            if self.base.slot_unavailable(current) {
                continue;
            }
            return Ok(self.base.choice_for(current));
        }
        Err(EngineError::Deadlock)
    }

    fn next_schedule(&mut self) -> Result<Choice, EngineError> {
        let slots = self.base.threads_count();
        for _ in 0..slots {
            let current = self.cursor % slots;
            self.cursor += 1;
            if self.base.schedulable_index(current).is_some() {
                return Ok(self.base.schedule_choice(current));
            }
        }
        Err(EngineError::Deadlock)
    }
}
