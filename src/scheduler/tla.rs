// src/scheduler/tla.rs — bounded exhaustive exploration
//
// Enumerates every execution that finishes `max_tasks` tasks, bounded by
// the preemption budget: resuming a thread different from the previous one
// costs a switch, and branches that exceed `max_switches` are cut. The
// search is a depth-first walk over a frame stack; suspended state cannot
// be forked, so backtracking re-executes the prefix from scratch.

use tracing::debug;

use crate::checker::ModelChecker;
use crate::error::EngineError;
use crate::history::{Event, Invoke, Response};
use crate::pretty::PrettyPrinter;
use crate::runtime::task::{Task, TaskBuilder, TaskId};
use crate::scheduler::{Histories, Scheduler};
use crate::spec::TestTarget;

/// One row of the execution table: which task slot advanced at this step
/// and whether the step created it.
#[derive(Debug, Clone, Copy, Default)]
struct Frame {
    thread: usize,
    index: usize,
    is_new: bool,
}

pub struct TlaScheduler<T: TestTarget, C: ModelChecker> {
    max_tasks: usize,
    max_rounds: usize,
    max_switches: usize,
    builders: Vec<TaskBuilder<T>>,
    checker: C,
    printer: PrettyPrinter,

    target: T,
    threads: Vec<Vec<Task<T>>>,
    frames: Vec<Frame>,
    seq: Vec<Event>,
    full: Vec<TaskId>,
    thread_history: Vec<usize>,
    finished_tasks: usize,
    finished_rounds: usize,
    next_id: usize,
}

impl<T: TestTarget, C: ModelChecker> TlaScheduler<T, C> {
    pub fn new(
        threads_count: usize,
        builders: Vec<TaskBuilder<T>>,
        checker: C,
        max_tasks: usize,
        max_rounds: usize,
        max_switches: usize,
    ) -> Self {
        assert!(threads_count > 0, "at least one thread slot is required");
        assert!(!builders.is_empty(), "no task builders registered");
        TlaScheduler {
            max_tasks,
            max_rounds,
            max_switches,
            builders,
            checker,
            printer: PrettyPrinter::new(threads_count),
            target: T::default(),
            threads: (0..threads_count).map(|_| Vec::new()).collect(),
            frames: Vec::new(),
            seq: Vec::new(),
            full: Vec::new(),
            thread_history: Vec::new(),
            finished_tasks: 0,
            finished_rounds: 0,
            next_id: 0,
        }
    }

    fn terminate_unfinished(&mut self) {
        let target = &mut self.target;
        for tasks in self.threads.iter_mut() {
            for task in tasks.iter_mut() {
                if !task.returned() {
                    task.terminate(target);
                }
            }
        }
    }

    /// Re-executes the first `step_end` frames from a fresh target.
    /// Suspended tasks cannot be rewound, so this is how the walk returns
    /// to an earlier point of the table.
    fn replay(&mut self, step_end: usize) {
        self.terminate_unfinished();
        self.target.reset();
        for step in 0..step_end {
            let Frame {
                thread,
                index,
                is_new,
            } = self.frames[step];
            if is_new {
                self.threads[thread][index].restart();
            }
            let target = &mut self.target;
            self.threads[thread][index].resume(target);
        }
    }

    /// Resumes the newest task of `thread` at this step and recurses.
    fn resume_task(
        &mut self,
        step: usize,
        switches: usize,
        thread: usize,
        is_new: bool,
    ) -> Result<(bool, Option<Histories>), EngineError> {
        let mut next_switches = switches;
        if !is_new {
            let previous = self.thread_history.last().copied();
            if previous != Some(thread) {
                next_switches += 1;
            }
            if next_switches > self.max_switches {
                // switch budget exhausted, do not take this branch
                return Ok((false, None));
            }
        }

        let index = self.threads[thread].len() - 1;
        self.frames[step] = Frame {
            thread,
            index,
            is_new,
        };

        {
            let task = &self.threads[thread][index];
            assert!(!task.is_parked(), "scheduled a parked task");
            self.full.push(task.id());
            self.thread_history.push(thread);
            if is_new {
                self.seq.push(Event::Invoke(Invoke {
                    task: task.id(),
                    thread,
                    method: task.name(),
                    args: task.args().to_vec(),
                }));
            }
        }

        {
            let target = &mut self.target;
            self.threads[thread][index].resume(target);
        }
        let finished = self.threads[thread][index].returned();
        if finished {
            self.finished_tasks += 1;
            let task = &self.threads[thread][index];
            self.seq.push(Event::Response(Response {
                task: task.id(),
                thread,
                result: task.ret_val().clone(),
            }));
        }

        if self.finished_tasks < self.max_tasks {
            let (over, result) = self.run_step(step + 1, next_switches)?;
            if over || result.is_some() {
                return Ok((over, result));
            }
        } else {
            debug!(
                round = self.finished_rounds,
                "tla round:\n{}",
                self.printer.render(&self.seq)
            );
            self.finished_rounds += 1;
            if !self.checker.check(&self.seq) {
                return Ok((
                    false,
                    Some(Histories {
                        full: self.full.clone(),
                        seq: self.seq.clone(),
                    }),
                ));
            }
            if self.finished_rounds == self.max_rounds {
                return Ok((true, None));
            }
        }

        // roll this step back
        self.thread_history.pop();
        self.full.pop();
        if finished {
            self.finished_tasks -= 1;
            self.seq.pop();
        }
        if is_new {
            self.seq.pop();
        }
        Ok((false, None))
    }

    fn run_step(
        &mut self,
        step: usize,
        switches: usize,
    ) -> Result<(bool, Option<Histories>), EngineError> {
        self.frames.push(Frame::default());

        let mut all_parked = true;
        for thread in 0..self.threads.len() {
            let running = self.threads[thread]
                .last()
                .map_or(false, |task| !task.returned());
            if running {
                let unavailable = {
                    let target = &self.target;
                    let task = self.threads[thread]
                        .last_mut()
                        .expect("slot has a running task");
                    task.is_parked() || task.is_blocked(target)
                };
                if unavailable {
                    continue;
                }
                all_parked = false;
                let (over, result) = self.resume_task(step, switches, thread, false)?;
                if over || result.is_some() {
                    return Ok((over, result));
                }
                self.replay(step);
                continue;
            }

            all_parked = false;
            // try every constructor for the next task of this slot
            for builder in 0..self.builders.len() {
                let id = TaskId(self.next_id);
                self.next_id += 1;
                let task = (self.builders[builder].build)(thread, id);
                self.threads[thread].push(task);

                let (over, result) = self.resume_task(step, switches, thread, true)?;
                if over || result.is_some() {
                    return Ok((over, result));
                }

                {
                    let target = &mut self.target;
                    let candidate = self.threads[thread]
                        .last_mut()
                        .expect("candidate was just pushed");
                    if !candidate.returned() {
                        candidate.terminate(target);
                    }
                }
                self.threads[thread].pop();
                self.replay(step);
            }
        }

        if all_parked {
            return Err(EngineError::Deadlock);
        }
        self.frames.pop();
        Ok((false, None))
    }
}

impl<T: TestTarget, C: ModelChecker> Scheduler for TlaScheduler<T, C> {
    fn run(&mut self) -> Result<Option<Histories>, EngineError> {
        let (_, result) = self.run_step(0, 0)?;
        Ok(result)
    }
}
