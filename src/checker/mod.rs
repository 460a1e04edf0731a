//! History checking.
//!
//! A checker decides whether a recorded sequential history (the ordered
//! invoke/response events of one round) is consistent with the target's
//! sequential reference. The engine ships two implementations of the
//! linearizability check: the iterative search with state caching used in
//! production runs, and a plain recursive search kept as a reference for
//! cross-checking.

pub mod reference;
pub mod wgl;

use crate::history::Event;

pub use reference::ReferenceChecker;
pub use wgl::LinearizabilityChecker;

/// The general checker interface; each implementation checks its own
/// consistency model against the observed history.
pub trait ModelChecker {
    fn check(&self, history: &[Event]) -> bool;
}
