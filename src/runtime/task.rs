// src/runtime/task.rs — task objects, ids and builders

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::runtime::{Coro, Step, Token};
use crate::spec::TestTarget;
use crate::value::Value;

/// Resumes `terminate` is willing to spend before concluding the task is
/// spinning forever (a mis-instrumented loop or a wrong termination order).
const TERMINATE_SPIN_CAP: usize = 10_000_000;

/// Unique task identifier, stable for the lifetime of a round.
///
/// History events refer to tasks by id only; the tasks themselves are owned
/// by their thread slot inside the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Futex-style wait recorded on a task.
///
/// The task stays blocked while the target's word at `addr` still reads
/// `value`; the condition is re-checked at scheduling time and cleared on
/// the first mismatch. This models the single-writer, single-waiter
/// pattern only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FutexWait {
    pub addr: u64,
    pub value: i64,
}

/// One execution of one method on the system under test.
pub struct Task<T> {
    id: TaskId,
    thread: usize,
    name: &'static str,
    args: Vec<Value>,
    body: Box<dyn Coro<T>>,
    /// Rebuilds the body from scratch with the same captured arguments.
    /// Used by round restarts and by the enumerative scheduler's rewinds.
    spawn: Rc<dyn Fn() -> Box<dyn Coro<T>>>,
    token: Option<Token>,
    ret: Option<Value>,
    removed: bool,
    wait: Option<FutexWait>,
}

impl<T: TestTarget> Task<T> {
    pub fn new<F>(
        name: &'static str,
        args: Vec<Value>,
        thread: usize,
        id: TaskId,
        token: Option<Token>,
        spawn: F,
    ) -> Self
    where
        F: Fn() -> Box<dyn Coro<T>> + 'static,
    {
        let spawn: Rc<dyn Fn() -> Box<dyn Coro<T>>> = Rc::new(spawn);
        Task {
            id,
            thread,
            name,
            args,
            body: spawn(),
            spawn,
            token,
            ret: None,
            removed: false,
            wait: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn thread(&self) -> usize {
        self.thread
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn returned(&self) -> bool {
        self.ret.is_some()
    }

    /// Return value of a completed task. Asking before the task returned is
    /// a bug in the caller.
    pub fn ret_val(&self) -> &Value {
        self.ret
            .as_ref()
            .expect("return value requested from a task that has not returned")
    }

    pub fn removed(&self) -> bool {
        self.removed
    }

    pub fn set_removed(&mut self, removed: bool) {
        self.removed = removed;
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn is_parked(&self) -> bool {
        self.token.as_ref().is_some_and(Token::is_parked)
    }

    /// Re-checks the recorded futex wait against the target. A wait that no
    /// longer holds is cleared.
    pub fn is_blocked(&mut self, target: &T) -> bool {
        match self.wait {
            Some(w) if target.futex_word(w.addr) == Some(w.value) => true,
            Some(_) => {
                self.wait = None;
                false
            }
            None => false,
        }
    }

    /// Drives the task to its next yield point or to its return.
    ///
    /// On return either the task suspended at an instrumented point, entered
    /// a wait, or set its return value; exactly one of these per call.
    pub fn resume(&mut self, target: &mut T) {
        assert!(!self.returned(), "resumed a task that already returned");
        debug_assert!(!self.removed, "resumed a removed task");
        match self.body.resume(target) {
            Step::Yield => {}
            Step::Wait { addr, value } => self.wait = Some(FutexWait { addr, value }),
            Step::Return(v) => self.ret = Some(v),
        }
    }

    /// Repeatedly resumes until the task returns. Used when the strategy
    /// discards an unfinished task between rounds.
    pub fn terminate(&mut self, target: &mut T) {
        let mut tries = 0usize;
        while !self.returned() {
            tries += 1;
            assert!(
                tries < TERMINATE_SPIN_CAP,
                "task {} ({}) is spinning too long, possible wrong terminating order",
                self.id,
                self.name
            );
            self.resume(target);
        }
    }

    /// Rebuilds the task from the beginning with the same arguments and id.
    /// Only a returned task may be restarted; terminating first is the
    /// runtime's responsibility.
    pub fn restart(&mut self) {
        assert!(self.returned(), "restarted a task that has not returned");
        self.body = (self.spawn)();
        self.ret = None;
        self.wait = None;
        if let Some(token) = &self.token {
            token.unpark();
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("thread", &self.thread)
            .field("name", &self.name)
            .field("args", &self.args)
            .field("returned", &self.ret.is_some())
            .field("removed", &self.removed)
            .finish()
    }
}

/// A named task factory: `(thread slot, task id) -> Task`.
///
/// The build function draws fresh arguments from the target's generators;
/// restarting the produced task later reuses the drawn arguments.
pub struct TaskBuilder<T> {
    pub name: &'static str,
    pub build: fn(thread: usize, id: TaskId) -> Task<T>,
}

impl<T> Clone for TaskBuilder<T> {
    fn clone(&self) -> Self {
        TaskBuilder {
            name: self.name,
            build: self.build,
        }
    }
}

impl<T> fmt::Debug for TaskBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskBuilder").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Cell2 {
        value: i64,
        word: i64,
    }

    impl TestTarget for Cell2 {
        fn reset(&mut self) {
            self.value = 0;
            self.word = 0;
        }

        fn futex_word(&self, addr: u64) -> Option<i64> {
            (addr == 0).then_some(self.word)
        }
    }

    /// Increments in two steps with a yield in between.
    struct TwoStepAdd {
        pc: u8,
        tmp: i64,
    }

    impl Coro<Cell2> for TwoStepAdd {
        fn resume(&mut self, target: &mut Cell2) -> Step {
            match self.pc {
                0 => {
                    self.tmp = target.value;
                    self.pc = 1;
                    Step::Yield
                }
                _ => {
                    target.value = self.tmp + 1;
                    Step::Return(Value::Unit)
                }
            }
        }
    }

    fn add_task(id: usize) -> Task<Cell2> {
        Task::new("add", vec![], 0, TaskId(id), None, || {
            Box::new(TwoStepAdd { pc: 0, tmp: 0 })
        })
    }

    #[test]
    fn resume_until_return() {
        let mut target = Cell2::default();
        let mut task = add_task(0);
        task.resume(&mut target);
        assert!(!task.returned());
        task.resume(&mut target);
        assert!(task.returned());
        assert_eq!(task.ret_val(), &Value::Unit);
        assert_eq!(target.value, 1);
    }

    #[test]
    fn terminate_drains_to_completion() {
        let mut target = Cell2::default();
        let mut task = add_task(1);
        task.terminate(&mut target);
        assert!(task.returned());
        assert_eq!(target.value, 1);
    }

    #[test]
    fn restart_reuses_args_and_id() {
        let mut target = Cell2::default();
        let mut task = add_task(2);
        task.terminate(&mut target);
        task.restart();
        assert!(!task.returned());
        assert_eq!(task.id(), TaskId(2));
        task.terminate(&mut target);
        assert_eq!(target.value, 2);
    }

    #[test]
    #[should_panic(expected = "has not returned")]
    fn restart_requires_return() {
        let mut task = add_task(3);
        task.restart();
    }

    struct FutexWaiter {
        pc: u8,
    }

    impl Coro<Cell2> for FutexWaiter {
        fn resume(&mut self, target: &mut Cell2) -> Step {
            match self.pc {
                0 => {
                    self.pc = 1;
                    Step::Wait {
                        addr: 0,
                        value: target.word,
                    }
                }
                _ => Step::Return(Value::Unit),
            }
        }
    }

    #[test]
    fn futex_wait_clears_on_write() {
        let mut target = Cell2::default();
        let mut task = Task::new("wait", vec![], 0, TaskId(4), None, || {
            Box::new(FutexWaiter { pc: 0 })
        });
        task.resume(&mut target);
        assert!(task.is_blocked(&target));
        // still blocked: the word has not changed
        assert!(task.is_blocked(&target));
        target.word = 1;
        assert!(!task.is_blocked(&target));
        // wait is cleared, not re-armed
        target.word = 0;
        assert!(!task.is_blocked(&target));
    }
}
