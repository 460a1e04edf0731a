// src/targets/register.rs — register targets: racy, atomic, and a relaxed
// counter whose increment reports the value it wrote

use crate::runtime::task::{Task, TaskBuilder, TaskId};
use crate::runtime::{Coro, Step};
use crate::spec::{SeqSpec, Spec, TestTarget};
use crate::value::Value;

/// Sequential reference shared by the register targets: `add` increments,
/// `get` reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IntRegister {
    pub value: i64,
}

impl SeqSpec for IntRegister {
    fn apply(&mut self, method: &str, _args: &[Value]) -> Value {
        match method {
            "add" => {
                self.value += 1;
                Value::Unit
            }
            "get" => Value::Int(self.value),
            other => panic!("unknown method in sequential reference: {other}"),
        }
    }
}

/// Register whose increment is a plain load/store pair. Two overlapping
/// `add`s can lose an update, which a later `get` exposes.
#[derive(Debug, Default)]
pub struct RaceRegister {
    value: i64,
}

impl TestTarget for RaceRegister {
    fn reset(&mut self) {
        self.value = 0;
    }
}

#[derive(Default)]
struct RacyAdd {
    pc: u8,
    tmp: i64,
}

impl Coro<RaceRegister> for RacyAdd {
    fn resume(&mut self, target: &mut RaceRegister) -> Step {
        match self.pc {
            0 => {
                self.tmp = target.value;
                self.pc = 1;
                Step::Yield
            }
            1 => {
                target.value = self.tmp + 1;
                self.pc = 2;
                Step::Yield
            }
            _ => Step::Return(Value::Unit),
        }
    }
}

#[derive(Default)]
struct RacyGet {
    pc: u8,
    tmp: i64,
}

impl Coro<RaceRegister> for RacyGet {
    fn resume(&mut self, target: &mut RaceRegister) -> Step {
        match self.pc {
            0 => {
                self.tmp = target.value;
                self.pc = 1;
                Step::Yield
            }
            _ => Step::Return(Value::Int(self.tmp)),
        }
    }
}

fn build_racy_add(thread: usize, id: TaskId) -> Task<RaceRegister> {
    Task::new("add", vec![], thread, id, None, || {
        Box::new(RacyAdd::default())
    })
}

fn build_racy_get(thread: usize, id: TaskId) -> Task<RaceRegister> {
    Task::new("get", vec![], thread, id, None, || {
        Box::new(RacyGet::default())
    })
}

pub struct RaceRegisterSpec;

impl Spec for RaceRegisterSpec {
    type Target = RaceRegister;
    type Ref = IntRegister;

    fn reference() -> IntRegister {
        IntRegister::default()
    }

    fn builders() -> Vec<TaskBuilder<RaceRegister>> {
        vec![
            TaskBuilder {
                name: "add",
                build: build_racy_add,
            },
            TaskBuilder {
                name: "get",
                build: build_racy_get,
            },
        ]
    }
}

/// Register whose operations complete in a single step, so every observed
/// history is sequential. Never produces a counterexample.
#[derive(Debug, Default)]
pub struct AtomicRegister {
    value: i64,
}

impl TestTarget for AtomicRegister {
    fn reset(&mut self) {
        self.value = 0;
    }
}

struct AtomicAdd;

impl Coro<AtomicRegister> for AtomicAdd {
    fn resume(&mut self, target: &mut AtomicRegister) -> Step {
        target.value += 1;
        Step::Return(Value::Unit)
    }
}

struct AtomicGet;

impl Coro<AtomicRegister> for AtomicGet {
    fn resume(&mut self, target: &mut AtomicRegister) -> Step {
        Step::Return(Value::Int(target.value))
    }
}

fn build_atomic_add(thread: usize, id: TaskId) -> Task<AtomicRegister> {
    Task::new("add", vec![], thread, id, None, || Box::new(AtomicAdd))
}

fn build_atomic_get(thread: usize, id: TaskId) -> Task<AtomicRegister> {
    Task::new("get", vec![], thread, id, None, || Box::new(AtomicGet))
}

pub struct AtomicRegisterSpec;

impl Spec for AtomicRegisterSpec {
    type Target = AtomicRegister;
    type Ref = IntRegister;

    fn reference() -> IntRegister {
        IntRegister::default()
    }

    fn builders() -> Vec<TaskBuilder<AtomicRegister>> {
        vec![
            TaskBuilder {
                name: "add",
                build: build_atomic_add,
            },
            TaskBuilder {
                name: "get",
                build: build_atomic_get,
            },
        ]
    }
}

/// Counter whose only operation increments non-atomically and returns the
/// value it wrote. Any two overlapping `inc`s that read the same snapshot
/// report the same value, which no sequential order can explain; with two
/// thread slots even a strict round-robin walk trips over it in the first
/// round. The test suite leans on that determinism.
#[derive(Debug, Default)]
pub struct RelaxedCounter {
    value: i64,
}

impl TestTarget for RelaxedCounter {
    fn reset(&mut self) {
        self.value = 0;
    }
}

/// Reference for the counter: `inc` returns the incremented value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CountingSpec {
    pub value: i64,
}

impl SeqSpec for CountingSpec {
    fn apply(&mut self, method: &str, _args: &[Value]) -> Value {
        match method {
            "inc" => {
                self.value += 1;
                Value::Int(self.value)
            }
            other => panic!("unknown method in sequential reference: {other}"),
        }
    }
}

#[derive(Default)]
struct RelaxedInc {
    pc: u8,
    tmp: i64,
}

impl Coro<RelaxedCounter> for RelaxedInc {
    fn resume(&mut self, target: &mut RelaxedCounter) -> Step {
        match self.pc {
            0 => {
                self.tmp = target.value;
                self.pc = 1;
                Step::Yield
            }
            _ => {
                target.value = self.tmp + 1;
                Step::Return(Value::Int(self.tmp + 1))
            }
        }
    }
}

fn build_relaxed_inc(thread: usize, id: TaskId) -> Task<RelaxedCounter> {
    Task::new("inc", vec![], thread, id, None, || {
        Box::new(RelaxedInc::default())
    })
}

pub struct RelaxedCounterSpec;

impl Spec for RelaxedCounterSpec {
    type Target = RelaxedCounter;
    type Ref = CountingSpec;

    fn reference() -> CountingSpec {
        CountingSpec::default()
    }

    fn builders() -> Vec<TaskBuilder<RelaxedCounter>> {
        vec![TaskBuilder {
            name: "inc",
            build: build_relaxed_inc,
        }]
    }
}
