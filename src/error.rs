// src/error.rs — engine error taxonomy

use thiserror::Error;

use crate::runtime::task::TaskId;

/// Errors surfaced by the verification engine.
///
/// Invariant violations that indicate a broken target registration or a
/// malformed history are not represented here: those are bugs in the caller
/// (or in the instrumentation that produced the tasks) and abort via
/// assertions instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before the run begins: bad flag combination, unknown target,
    /// mismatched weights and so on.
    #[error("configuration error: {0}")]
    Config(String),

    /// Every live task is parked on a token or blocked on a futex word, so
    /// no thread slot can be scheduled.
    #[error("deadlock: every live task is parked or blocked")]
    Deadlock,

    /// A replay ordering referenced a task id that does not exist in the
    /// current round.
    #[error("replay references unknown task id {0}")]
    UnknownTask(TaskId),
}
