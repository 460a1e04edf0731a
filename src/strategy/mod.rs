//! Scheduling strategies.
//!
//! A strategy owns the round: the target instance, the per-thread task
//! sequences and the builders that create new tasks. The driver asks it for
//! the next thread slot to advance, either while generating a fresh round
//! (`next`) or while re-exploring the tasks of the current round
//! (`next_schedule`, which never creates tasks).

pub mod pct;
pub mod random;
pub mod round_robin;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;
use crate::runtime::task::{Task, TaskBuilder, TaskId};
use crate::spec::TestTarget;

/// A scheduling decision: which task slot to resume next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Choice {
    pub thread: usize,
    pub index: usize,
    /// True when this resume is the first resume of the task, which is what
    /// drives invoke-event emission in the driver.
    pub is_new: bool,
}

/// State shared by every strategy: the target, the thread slots and the
/// bookkeeping needed to re-walk an already generated round.
pub struct StrategyBase<T: TestTarget> {
    pub target: T,
    threads: Vec<Vec<Task<T>>>,
    builders: Vec<TaskBuilder<T>>,
    /// Per thread, the index of the task scheduled last during a re-walk;
    /// -1 before the first pick. Reset whenever tasks are terminated.
    round_schedule: Vec<isize>,
    next_id: usize,
    pub rng: StdRng,
}

impl<T: TestTarget> StrategyBase<T> {
    pub fn new(threads_count: usize, builders: Vec<TaskBuilder<T>>, seed: Option<u64>) -> Self {
        assert!(threads_count > 0, "at least one thread slot is required");
        assert!(!builders.is_empty(), "no task builders registered");
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        StrategyBase {
            target: T::default(),
            threads: (0..threads_count).map(|_| Vec::new()).collect(),
            builders,
            round_schedule: vec![-1; threads_count],
            next_id: 0,
            rng,
        }
    }

    pub fn threads_count(&self) -> usize {
        self.threads.len()
    }

    pub fn thread(&self, thread: usize) -> &[Task<T>] {
        &self.threads[thread]
    }

    pub fn task(&self, thread: usize, index: usize) -> &Task<T> {
        &self.threads[thread][index]
    }

    pub fn builders(&self) -> &[TaskBuilder<T>] {
        &self.builders
    }

    pub fn find_task(&self, id: TaskId) -> Option<(usize, usize)> {
        for (thread, tasks) in self.threads.iter().enumerate() {
            for (index, task) in tasks.iter().enumerate() {
                if task.id() == id {
                    return Some((thread, index));
                }
            }
        }
        None
    }

    pub fn valid_tasks_count(&self) -> usize {
        self.threads
            .iter()
            .flatten()
            .filter(|t| !t.removed())
            .count()
    }

    pub fn total_tasks_count(&self) -> usize {
        self.threads.iter().map(Vec::len).sum()
    }

    pub fn set_removed(&mut self, id: TaskId, removed: bool) {
        if let Some((thread, index)) = self.find_task(id) {
            self.threads[thread][index].set_removed(removed);
        }
    }

    pub fn is_removed(&self, id: TaskId) -> bool {
        self.find_task(id)
            .map(|(t, i)| self.threads[t][i].removed())
            .unwrap_or(false)
    }

    pub fn clear_removed(&mut self) {
        for task in self.threads.iter_mut().flatten() {
            task.set_removed(false);
        }
    }

    /// Draws a builder index uniformly.
    pub fn random_builder(&mut self) -> usize {
        self.rng.gen_range(0..self.builders.len())
    }

    /// Appends a freshly built task to `thread` and reports it as new.
    pub fn spawn_with(&mut self, thread: usize, builder: usize) -> Choice {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let task = (self.builders[builder].build)(thread, id);
        self.threads[thread].push(task);
        Choice {
            thread,
            index: self.threads[thread].len() - 1,
            is_new: true,
        }
    }

    /// Round-generation pick on a chosen thread: reuse the newest task if it
    /// is still running, otherwise build a new one.
    pub fn choice_for(&mut self, thread: usize) -> Choice {
        let needs_new = self.threads[thread]
            .last()
            .map_or(true, |task| task.returned());
        if needs_new {
            let builder = self.random_builder();
            self.spawn_with(thread, builder)
        } else {
            Choice {
                thread,
                index: self.threads[thread].len() - 1,
                is_new: false,
            }
        }
    }

    /// First task index in `thread` at or after the re-walk position that is
    /// neither returned nor removed. May run one past the end.
    pub fn next_task_index(&self, thread: usize) -> usize {
        let tasks = &self.threads[thread];
        let mut index = self.round_schedule[thread];
        while index < tasks.len() as isize
            && (index < 0 || tasks[index as usize].returned() || tasks[index as usize].removed())
        {
            index += 1;
        }
        index.max(0) as usize
    }

    /// Re-walk pick on a chosen thread. The resume is "new" when the walk
    /// position moves onto a task for the first time.
    pub fn schedule_choice(&mut self, thread: usize) -> Choice {
        let index = self.next_task_index(thread);
        let is_new = self.round_schedule[thread] != index as isize;
        self.round_schedule[thread] = index as isize;
        Choice {
            thread,
            index,
            is_new,
        }
    }

    /// True when the newest task of the slot exists and cannot run right
    /// now (parked on a token or blocked on a futex word).
    pub fn slot_unavailable(&mut self, thread: usize) -> bool {
        let target = &self.target;
        match self.threads[thread].last_mut() {
            Some(task) => task.is_parked() || task.is_blocked(target),
            None => false,
        }
    }

    /// Next runnable task index of a slot during a re-walk, or `None` when
    /// the slot is exhausted or its task cannot run right now.
    pub fn schedulable_index(&mut self, thread: usize) -> Option<usize> {
        let index = self.next_task_index(thread);
        if index >= self.threads[thread].len() {
            return None;
        }
        let target = &self.target;
        let task = &mut self.threads[thread][index];
        if task.is_parked() || task.is_blocked(target) {
            return None;
        }
        Some(index)
    }

    pub fn resume(&mut self, thread: usize, index: usize) {
        let target = &mut self.target;
        self.threads[thread][index].resume(target);
    }

    pub fn terminate_task(&mut self, thread: usize, index: usize) {
        let target = &mut self.target;
        self.threads[thread][index].terminate(target);
    }

    /// Drives every unfinished task to completion, in thread order.
    /// Obstruction freedom of the target is assumed here.
    pub fn terminate_all(&mut self) {
        for slot in self.round_schedule.iter_mut() {
            *slot = -1;
        }
        let target = &mut self.target;
        for tasks in self.threads.iter_mut() {
            for task in tasks.iter_mut() {
                if !task.returned() {
                    task.terminate(target);
                }
            }
        }
    }

    /// Discards all tasks and reconstructs the target for a fresh round.
    pub fn hard_reset(&mut self) {
        self.terminate_all();
        for tasks in self.threads.iter_mut() {
            tasks.clear();
        }
        self.target.reset();
        self.next_id = 0;
    }

    /// Keeps the task sequences but rebuilds every non-removed task with its
    /// original arguments and id, ready for a re-walk.
    pub fn soft_reset(&mut self) {
        self.terminate_all();
        self.target.reset();
        for tasks in self.threads.iter_mut() {
            for task in tasks.iter_mut() {
                if !task.removed() {
                    task.restart();
                }
            }
        }
    }
}

/// The strategy contract consumed by the driver.
pub trait Strategy<T: TestTarget> {
    fn base(&self) -> &StrategyBase<T>;
    fn base_mut(&mut self) -> &mut StrategyBase<T>;

    /// Picks the next slot while generating the round, creating a task when
    /// the slot has none running.
    fn next(&mut self) -> Result<Choice, EngineError>;

    /// Picks the next slot over the existing tasks of the round. Never
    /// creates tasks.
    fn next_schedule(&mut self) -> Result<Choice, EngineError>;

    /// Terminates everything and clears the round.
    fn start_next_round(&mut self) {
        self.base_mut().hard_reset();
    }

    /// Terminates everything and restarts the round's non-removed tasks.
    fn reset_current_round(&mut self) {
        self.base_mut().soft_reset();
    }

    fn find_task(&self, id: TaskId) -> Option<(usize, usize)> {
        self.base().find_task(id)
    }

    fn threads_count(&self) -> usize {
        self.base().threads_count()
    }

    fn valid_tasks_count(&self) -> usize {
        self.base().valid_tasks_count()
    }

    fn total_tasks_count(&self) -> usize {
        self.base().total_tasks_count()
    }

    fn set_removed(&mut self, id: TaskId, removed: bool) {
        self.base_mut().set_removed(id, removed);
    }

    fn clear_removed(&mut self) {
        self.base_mut().clear_removed();
    }
}
