// src/targets/stack.rs — Treiber stack whose push abandons its retry loop
//
// Nodes live in a fixed pool chained through a free list, so there is no
// reclamation to model; the pool is reknit between rounds. Pop is the
// textbook compare-and-swap loop. Push carries the planted defect: its
// head swap retries at most a fixed number of times and then walks away,
// losing the element while still reporting success.

use rand::Rng;

use crate::runtime::task::{Task, TaskBuilder, TaskId};
use crate::runtime::{Coro, Step};
use crate::spec::{SeqSpec, Spec, TestTarget};
use crate::value::Value;

const POOL: usize = 64;
const PUSH_ATTEMPTS: u8 = 4;

pub struct FaultyStack {
    value: [i64; POOL],
    next: [i64; POOL],
    head: i64,
    free_list: i64,
}

impl Default for FaultyStack {
    fn default() -> Self {
        let mut stack = FaultyStack {
            value: [0; POOL],
            next: [0; POOL],
            head: -1,
            free_list: 0,
        };
        stack.reset();
        stack
    }
}

impl TestTarget for FaultyStack {
    fn reset(&mut self) {
        self.value = [0; POOL];
        for i in 0..POOL - 1 {
            self.next[i] = i as i64 + 1;
        }
        self.next[POOL - 1] = -1;
        self.head = -1;
        self.free_list = 0;
    }
}

struct StackPushOp {
    pc: u8,
    v: i64,
    node: i64,
    observed: i64,
    attempts: u8,
}

impl StackPushOp {
    fn new(v: i64) -> Self {
        StackPushOp {
            pc: 0,
            v,
            node: -1,
            observed: -1,
            attempts: 0,
        }
    }
}

impl Coro<FaultyStack> for StackPushOp {
    fn resume(&mut self, target: &mut FaultyStack) -> Step {
        match self.pc {
            // allocate a node off the free list
            0 => {
                self.node = target.free_list;
                if self.node == -1 {
                    // no free nodes left
                    return Step::Return(Value::Unit);
                }
                self.pc = 1;
                Step::Yield
            }
            1 => {
                if target.free_list == self.node {
                    target.free_list = target.next[self.node as usize];
                    target.value[self.node as usize] = self.v;
                    self.pc = 2;
                } else {
                    self.pc = 0;
                }
                Step::Yield
            }
            // swing the head, giving up after a bounded number of tries
            2 => {
                self.observed = target.head;
                target.next[self.node as usize] = self.observed;
                self.attempts += 1;
                self.pc = 3;
                Step::Yield
            }
            3 => {
                if target.head == self.observed {
                    target.head = self.node;
                    Step::Return(Value::Unit)
                } else if self.attempts < PUSH_ATTEMPTS {
                    self.pc = 2;
                    Step::Yield
                } else {
                    // retries exhausted, the element is silently lost
                    Step::Return(Value::Unit)
                }
            }
            _ => Step::Return(Value::Unit),
        }
    }
}

struct StackPopOp {
    pc: u8,
    node: i64,
    taken: i64,
    observed_free: i64,
}

impl Default for StackPopOp {
    fn default() -> Self {
        StackPopOp {
            pc: 0,
            node: -1,
            taken: 0,
            observed_free: -1,
        }
    }
}

impl Coro<FaultyStack> for StackPopOp {
    fn resume(&mut self, target: &mut FaultyStack) -> Step {
        match self.pc {
            0 => {
                self.node = target.head;
                if self.node == -1 {
                    return Step::Return(Value::Int(0));
                }
                self.pc = 1;
                Step::Yield
            }
            1 => {
                if target.head == self.node {
                    target.head = target.next[self.node as usize];
                    self.taken = target.value[self.node as usize];
                    self.pc = 2;
                } else {
                    self.pc = 0;
                }
                Step::Yield
            }
            // return the node to the free list
            2 => {
                self.observed_free = target.free_list;
                target.next[self.node as usize] = self.observed_free;
                self.pc = 3;
                Step::Yield
            }
            3 => {
                if target.free_list == self.observed_free {
                    target.free_list = self.node;
                    Step::Return(Value::Int(self.taken))
                } else {
                    self.pc = 2;
                    Step::Yield
                }
            }
            _ => Step::Return(Value::Int(self.taken)),
        }
    }
}

/// LIFO reference; popping an empty stack yields 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LifoStack {
    items: Vec<i64>,
}

impl SeqSpec for LifoStack {
    fn apply(&mut self, method: &str, args: &[Value]) -> Value {
        match method {
            "push" => {
                let v = args
                    .first()
                    .and_then(Value::as_int)
                    .expect("push takes one integer argument");
                self.items.push(v);
                Value::Unit
            }
            "pop" => Value::Int(self.items.pop().unwrap_or(0)),
            other => panic!("unknown method in sequential reference: {other}"),
        }
    }
}

fn build_push(thread: usize, id: TaskId) -> Task<FaultyStack> {
    let v = rand::thread_rng().gen_range(1..=10);
    Task::new("push", vec![Value::Int(v)], thread, id, None, move || {
        Box::new(StackPushOp::new(v))
    })
}

fn build_pop(thread: usize, id: TaskId) -> Task<FaultyStack> {
    Task::new("pop", vec![], thread, id, None, || {
        Box::new(StackPopOp::default())
    })
}

pub struct FaultyStackSpec;

impl Spec for FaultyStackSpec {
    type Target = FaultyStack;
    type Ref = LifoStack;

    fn reference() -> LifoStack {
        LifoStack::default()
    }

    fn builders() -> Vec<TaskBuilder<FaultyStack>> {
        vec![
            TaskBuilder {
                name: "push",
                build: build_push,
            },
            TaskBuilder {
                name: "pop",
                build: build_pop,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_completion(op: &mut dyn Coro<FaultyStack>, target: &mut FaultyStack) -> Value {
        loop {
            if let Step::Return(v) = op.resume(target) {
                return v;
            }
        }
    }

    #[test]
    fn sequential_pushes_and_pops_are_lifo() {
        let mut s = FaultyStack::default();
        for v in [3, 5, 7] {
            run_to_completion(&mut StackPushOp::new(v), &mut s);
        }
        for expected in [7, 5, 3, 0] {
            let got = run_to_completion(&mut StackPopOp::default(), &mut s);
            assert_eq!(got, Value::Int(expected));
        }
    }

    #[test]
    fn push_gives_up_under_sustained_contention() {
        let mut s = FaultyStack::default();
        let mut victim = StackPushOp::new(42);
        // victim allocates its node
        assert_eq!(victim.resume(&mut s), Step::Yield);
        assert_eq!(victim.resume(&mut s), Step::Yield);
        // every time the victim snapshots the head, a rival push completes
        // and moves it before the victim's swap lands
        for rival_value in 0..PUSH_ATTEMPTS as i64 {
            assert_eq!(victim.resume(&mut s), Step::Yield); // snapshot
            run_to_completion(&mut StackPushOp::new(rival_value + 100), &mut s);
            if rival_value + 1 == PUSH_ATTEMPTS as i64 {
                break;
            }
            assert_eq!(victim.resume(&mut s), Step::Yield); // failed swap, retry
        }
        assert_eq!(victim.resume(&mut s), Step::Return(Value::Unit));
        // 42 was dropped: pops drain only the rivals' values
        let mut drained = Vec::new();
        loop {
            match run_to_completion(&mut StackPopOp::default(), &mut s) {
                Value::Int(0) => break,
                Value::Int(v) => drained.push(v),
                other => panic!("unexpected pop result {other}"),
            }
        }
        assert!(!drained.contains(&42));
        assert_eq!(drained.len(), PUSH_ATTEMPTS as usize);
    }
}
