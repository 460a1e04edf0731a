//! linstress — interleaving stress tester for concurrent data structures.
//!
//! The engine runs target operations as cooperatively scheduled tasks,
//! explores interleavings under a pluggable strategy, checks every observed
//! history for linearizability against a sequential reference, and shrinks
//! any counterexample to a minimal failing round.
//!
//! The layers, bottom up:
//! - [`runtime`]: suspendable tasks, tokens, futex-style waits
//! - [`strategy`]: round-robin, weighted random and PCT scheduling
//! - [`scheduler`]: round drivers, replay, and the enumerative explorer
//! - [`checker`]: the linearizability search with state caching
//! - [`minimize`]: greedy and genetic counterexample shrinking

pub mod checker;
pub mod error;
pub mod history;
pub mod minimize;
pub mod pretty;
pub mod report;
pub mod runtime;
pub mod scheduler;
pub mod spec;
pub mod strategy;
pub mod targets;
pub mod value;
pub mod verify;

pub use checker::{LinearizabilityChecker, ModelChecker, ReferenceChecker};
pub use error::EngineError;
pub use history::{Event, Invoke, Response};
pub use runtime::task::{Task, TaskBuilder, TaskId};
pub use runtime::{Coro, Step, Token};
pub use scheduler::{Histories, Scheduler, StrategyScheduler, TlaScheduler};
pub use spec::{Options, SeqSpec, Spec, StrategyKind, TestTarget};
pub use value::Value;
pub use verify::{verify, Verdict};
