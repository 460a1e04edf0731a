// src/targets/mutex.rs — lock-ordering deadlock demo
//
// Two cooperative mutexes acquired in opposite orders depending on the
// argument's parity. Waiters park their task token and are unparked by the
// releaser, so a cycle leaves every task parked and the engine reports a
// deadlock instead of a history.

use std::collections::VecDeque;

use crate::runtime::task::{Task, TaskBuilder, TaskId};
use crate::runtime::{Coro, Step, Token};
use crate::spec::{SeqSpec, Spec, TestTarget};
use crate::value::Value;

/// Cooperative mutex: a failed acquire parks the caller's token and queues
/// it; release hands the token back.
#[derive(Debug, Default)]
pub struct CoopMutex {
    locked: bool,
    waiters: VecDeque<Token>,
}

impl CoopMutex {
    /// One acquire attempt. On failure the caller is parked and must yield.
    pub fn try_lock(&mut self, token: &Token) -> bool {
        if self.locked {
            self.waiters.push_back(token.clone());
            token.park();
            false
        } else {
            self.locked = true;
            true
        }
    }

    pub fn unlock(&mut self) {
        self.locked = false;
        if let Some(waiter) = self.waiters.pop_front() {
            waiter.unpark();
        }
    }
}

#[derive(Debug, Default)]
pub struct DeadlockPair {
    m1: CoopMutex,
    m2: CoopMutex,
}

impl TestTarget for DeadlockPair {
    fn reset(&mut self) {
        self.m1 = CoopMutex::default();
        self.m2 = CoopMutex::default();
    }
}

/// `lock(v)`: even `v` takes m1 then m2, odd `v` the reverse.
struct LockOp {
    pc: u8,
    v: i64,
    token: Token,
}

impl LockOp {
    fn new(v: i64, token: Token) -> Self {
        LockOp { pc: 0, v, token }
    }

    fn mutexes<'a>(&self, target: &'a mut DeadlockPair) -> (&'a mut CoopMutex, &'a mut CoopMutex) {
        if self.v % 2 == 0 {
            (&mut target.m1, &mut target.m2)
        } else {
            (&mut target.m2, &mut target.m1)
        }
    }
}

impl Coro<DeadlockPair> for LockOp {
    fn resume(&mut self, target: &mut DeadlockPair) -> Step {
        match self.pc {
            0 => {
                let (first, _) = self.mutexes(target);
                if first.try_lock(&self.token) {
                    self.pc = 1;
                }
                Step::Yield
            }
            1 => {
                let (_, second) = self.mutexes(target);
                if second.try_lock(&self.token) {
                    self.pc = 2;
                }
                Step::Yield
            }
            2 => {
                let (first, _) = self.mutexes(target);
                first.unlock();
                self.pc = 3;
                Step::Yield
            }
            _ => {
                let (_, second) = self.mutexes(target);
                second.unlock();
                Step::Return(Value::Unit)
            }
        }
    }
}

/// Trivial reference: a lock section has no observable result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LockSpec;

impl SeqSpec for LockSpec {
    fn apply(&mut self, method: &str, _args: &[Value]) -> Value {
        match method {
            "lock" => Value::Unit,
            other => panic!("unknown method in sequential reference: {other}"),
        }
    }
}

fn build_lock(thread: usize, id: TaskId) -> Task<DeadlockPair> {
    let v = thread as i64;
    let token = Token::new();
    let coro_token = token.clone();
    Task::new(
        "lock",
        vec![Value::Token, Value::Int(v)],
        thread,
        id,
        Some(token),
        move || Box::new(LockOp::new(v, coro_token.clone())),
    )
}

pub struct DeadlockSpec;

impl Spec for DeadlockSpec {
    type Target = DeadlockPair;
    type Ref = LockSpec;

    fn reference() -> LockSpec {
        LockSpec
    }

    fn builders() -> Vec<TaskBuilder<DeadlockPair>> {
        vec![TaskBuilder {
            name: "lock",
            build: build_lock,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncontended_lock_completes() {
        let mut target = DeadlockPair::default();
        let token = Token::new();
        let mut op = LockOp::new(0, token.clone());
        let mut steps = 0;
        loop {
            match op.resume(&mut target) {
                Step::Return(v) => {
                    assert_eq!(v, Value::Unit);
                    break;
                }
                _ => steps += 1,
            }
            assert!(steps < 16, "lock should finish without contention");
        }
        assert!(!token.is_parked());
        assert!(!target.m1.locked && !target.m2.locked);
    }

    #[test]
    fn opposite_orders_park_both() {
        let mut target = DeadlockPair::default();
        let (ta, tb) = (Token::new(), Token::new());
        let mut even = LockOp::new(0, ta.clone());
        let mut odd = LockOp::new(1, tb.clone());

        even.resume(&mut target); // takes m1
        odd.resume(&mut target); // takes m2
        even.resume(&mut target); // wants m2, parks
        odd.resume(&mut target); // wants m1, parks

        assert!(ta.is_parked());
        assert!(tb.is_parked());
    }

    #[test]
    fn release_unparks_the_waiter() {
        let mut target = DeadlockPair::default();
        let (ta, tb) = (Token::new(), Token::new());
        let mut holder = LockOp::new(0, ta.clone());
        let mut waiter = LockOp::new(2, tb.clone()); // same order, contends on m1

        holder.resume(&mut target); // m1 held
        waiter.resume(&mut target); // parks on m1
        assert!(tb.is_parked());

        holder.resume(&mut target); // m2 held
        holder.resume(&mut target); // m1 released, waiter unparked
        assert!(!tb.is_parked());
    }
}
