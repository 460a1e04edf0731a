// src/targets/queue.rs — linked queue with an early-quit append
//
// Michael-Scott shaped queue over an index pool: a sentinel node, `head`
// for consumers, `tail` for producers. The broken optimization sits in
// push: when the appending store observes that the tail moved under it, it
// gives up instead of re-reading and retrying, silently dropping the
// element. A push can therefore respond with success while its value never
// entered the structure, and later pops come up short against FIFO.

use std::collections::VecDeque;

use rand::Rng;

use crate::runtime::task::{Task, TaskBuilder, TaskId};
use crate::runtime::{Coro, Step};
use crate::spec::{SeqSpec, Spec, TestTarget};
use crate::value::Value;

const POOL: usize = 64;

pub struct FaultyQueue {
    value: [i64; POOL],
    next: [i64; POOL],
    head: i64,
    tail: i64,
    /// Bump allocator over the node pool; node 0 is the sentinel.
    free: i64,
}

impl Default for FaultyQueue {
    fn default() -> Self {
        let mut queue = FaultyQueue {
            value: [0; POOL],
            next: [0; POOL],
            head: 0,
            tail: 0,
            free: 0,
        };
        queue.reset();
        queue
    }
}

impl TestTarget for FaultyQueue {
    fn reset(&mut self) {
        self.value = [0; POOL];
        self.next = [-1; POOL];
        self.head = 0;
        self.tail = 0;
        self.free = 1;
    }
}

struct PushOp {
    pc: u8,
    v: i64,
    node: i64,
    observed_tail: i64,
}

impl PushOp {
    fn new(v: i64) -> Self {
        PushOp {
            pc: 0,
            v,
            node: -1,
            observed_tail: -1,
        }
    }
}

impl Coro<FaultyQueue> for PushOp {
    fn resume(&mut self, target: &mut FaultyQueue) -> Step {
        match self.pc {
            0 => {
                self.node = target.free;
                target.free += 1;
                if self.node as usize >= POOL {
                    // pool exhausted within the round
                    return Step::Return(Value::Unit);
                }
                target.value[self.node as usize] = self.v;
                target.next[self.node as usize] = -1;
                self.pc = 1;
                Step::Yield
            }
            1 => {
                self.observed_tail = target.tail;
                self.pc = 2;
                Step::Yield
            }
            2 => {
                let t = self.observed_tail as usize;
                if target.next[t] == -1 {
                    target.next[t] = self.node;
                    self.pc = 3;
                    Step::Yield
                } else {
                    // the tail moved between the read and the append;
                    // assume another producer finished the job and bail
                    Step::Return(Value::Unit)
                }
            }
            3 => {
                target.tail = self.node;
                self.pc = 4;
                Step::Yield
            }
            _ => Step::Return(Value::Unit),
        }
    }
}

struct PopOp {
    pc: u8,
    h: i64,
    n: i64,
}

impl Default for PopOp {
    fn default() -> Self {
        PopOp { pc: 0, h: -1, n: -1 }
    }
}

impl Coro<FaultyQueue> for PopOp {
    fn resume(&mut self, target: &mut FaultyQueue) -> Step {
        match self.pc {
            0 => {
                self.h = target.head;
                self.pc = 1;
                Step::Yield
            }
            1 => {
                self.n = target.next[self.h as usize];
                self.pc = 2;
                Step::Yield
            }
            _ => {
                if self.n == -1 {
                    return Step::Return(Value::Int(0));
                }
                if target.head == self.h {
                    target.head = self.n;
                    Step::Return(Value::Int(target.value[self.n as usize]))
                } else {
                    // lost the race for the head, start over
                    self.pc = 0;
                    Step::Yield
                }
            }
        }
    }
}

/// FIFO reference; popping an empty queue yields 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FifoQueue {
    items: VecDeque<i64>,
}

impl SeqSpec for FifoQueue {
    fn apply(&mut self, method: &str, args: &[Value]) -> Value {
        match method {
            "push" => {
                let v = args
                    .first()
                    .and_then(Value::as_int)
                    .expect("push takes one integer argument");
                self.items.push_back(v);
                Value::Unit
            }
            "pop" => Value::Int(self.items.pop_front().unwrap_or(0)),
            other => panic!("unknown method in sequential reference: {other}"),
        }
    }
}

fn build_push(thread: usize, id: TaskId) -> Task<FaultyQueue> {
    let v = rand::thread_rng().gen_range(1..=10);
    Task::new("push", vec![Value::Int(v)], thread, id, None, move || {
        Box::new(PushOp::new(v))
    })
}

fn build_pop(thread: usize, id: TaskId) -> Task<FaultyQueue> {
    Task::new("pop", vec![], thread, id, None, || Box::new(PopOp::default()))
}

pub struct FaultyQueueSpec;

impl Spec for FaultyQueueSpec {
    type Target = FaultyQueue;
    type Ref = FifoQueue;

    fn reference() -> FifoQueue {
        FifoQueue::default()
    }

    fn builders() -> Vec<TaskBuilder<FaultyQueue>> {
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

    fn run_to_completion(op: &mut dyn Coro<FaultyQueue>, target: &mut FaultyQueue) -> Value {
        loop {
            if let Step::Return(v) = op.resume(target) {
                return v;
            }
        }
    }

    #[test]
    fn sequential_pushes_and_pops_are_fifo() {
        let mut q = FaultyQueue::default();
        for v in [3, 5, 7] {
            run_to_completion(&mut PushOp::new(v), &mut q);
        }
        for expected in [3, 5, 7, 0] {
            let got = run_to_completion(&mut PopOp::default(), &mut q);
            assert_eq!(got, Value::Int(expected));
        }
    }

    #[test]
    fn contended_push_drops_its_element() {
        let mut q = FaultyQueue::default();
        let mut a = PushOp::new(1);
        let mut b = PushOp::new(2);
        // both producers read the same tail
        assert_eq!(a.resume(&mut q), Step::Yield); // alloc
        assert_eq!(a.resume(&mut q), Step::Yield); // read tail
        assert_eq!(b.resume(&mut q), Step::Yield); // alloc
        assert_eq!(b.resume(&mut q), Step::Yield); // read tail
        // b appends first, a observes the moved tail and gives up
        assert_eq!(b.resume(&mut q), Step::Yield);
        assert_eq!(a.resume(&mut q), Step::Return(Value::Unit));
        run_to_completion(&mut b, &mut q);
        // only b's element is in the queue
        assert_eq!(
            run_to_completion(&mut PopOp::default(), &mut q),
            Value::Int(2)
        );
        assert_eq!(
            run_to_completion(&mut PopOp::default(), &mut q),
            Value::Int(0)
        );
    }
}
