// src/checker/wgl.rs — iterative linearizability search with state caching
//
// Wing & Gong's exhaustive search in the iterative formulation due to Lowe,
// http://www.cs.ox.ac.uk/people/gavin.lowe/LinearizabiltyTesting/
// https://arxiv.org/pdf/1504.00204.pdf

use std::collections::HashSet;

use crate::checker::ModelChecker;
use crate::history::{invoke_response_pairs, Event};
use crate::spec::SeqSpec;

/// Decides whether a history can be linearized against the sequential
/// reference `S` starting from a given initial state.
///
/// The search walks the history left to right maintaining a stack of open
/// sections (invokes linearized but whose matching response has not yet been
/// crossed). A memo set over `(linearized bitmap, reference state)` pairs
/// prunes subproblems that were already explored through a different order
/// of choices.
///
/// Invokes without a matching response are allowed: their linearization
/// point may be placed anywhere after the invoke, so they accept any
/// reference result.
pub struct LinearizabilityChecker<S: SeqSpec> {
    initial: S,
}

impl<S: SeqSpec> LinearizabilityChecker<S> {
    pub fn new(initial: S) -> Self {
        LinearizabilityChecker { initial }
    }
}

impl<S: SeqSpec> ModelChecker for LinearizabilityChecker<S> {
    fn check(&self, history: &[Event]) -> bool {
        let pairs = invoke_response_pairs(history);
        let total = history.len();

        let mut state = self.initial.clone();
        let mut linearized = vec![false; total];
        let mut linearized_count = 0usize;
        // Indexes of linearized invokes whose section is still open, and the
        // reference states saved right before each of them was applied.
        let mut open_sections: Vec<usize> = Vec::new();
        let mut saved_states: Vec<S> = Vec::new();
        let mut cache: HashSet<(Vec<bool>, S)> = HashSet::new();
        let mut cursor = 0usize;

        while linearized_count != total {
            if cursor >= total {
                // walked off the end without completing: the newest choice
                // is a dead end, revert it and continue after its invoke
                if open_sections.is_empty() {
                    return false;
                }
                state = saved_states.pop().expect("state stack in sync");
                let last_inv = open_sections.pop().expect("section stack in sync");
                linearized[last_inv] = false;
                linearized_count -= 1;
                if let Some(res_index) = pairs.get(&last_inv) {
                    linearized[*res_index] = false;
                    linearized_count -= 1;
                }
                cursor = last_inv + 1;
                continue;
            }
            if linearized[cursor] {
                cursor += 1;
                continue;
            }

            match &history[cursor] {
                Event::Invoke(inv) => {
                    let mut candidate = state.clone();
                    let produced = candidate.apply(inv.method, &inv.args);
                    let response = pairs.get(&cursor).copied();
                    let result_fits = match response {
                        None => true,
                        Some(res_index) => match &history[res_index] {
                            Event::Response(res) => produced == res.result,
                            Event::Invoke(_) => unreachable!("response index maps to an invoke"),
                        },
                    };

                    let mut already_seen = false;
                    if result_fits {
                        linearized[cursor] = true;
                        linearized_count += 1;
                        if let Some(res_index) = response {
                            linearized[res_index] = true;
                            linearized_count += 1;
                        }
                        already_seen = cache.contains(&(linearized.clone(), candidate.clone()));
                        if already_seen {
                            // equal subproblem was explored before, undo
                            linearized[cursor] = false;
                            linearized_count -= 1;
                            if let Some(res_index) = response {
                                linearized[res_index] = false;
                                linearized_count -= 1;
                            }
                        } else {
                            cache.insert((linearized.clone(), candidate.clone()));
                        }
                    }

                    if result_fits && !already_seen {
                        open_sections.push(cursor);
                        saved_states.push(state);
                        state = candidate;
                        // previously skipped entries become candidates again
                        cursor = 0;
                    } else {
                        cursor += 1;
                    }
                }
                Event::Response(_) => {
                    // A response that cannot close any open section means the
                    // choices so far are wrong; with nothing open there is
                    // nothing left to revise.
                    if open_sections.is_empty() {
                        return false;
                    }
                    state = saved_states.pop().expect("state stack in sync");
                    let last_inv = open_sections.pop().expect("section stack in sync");
                    linearized[last_inv] = false;
                    linearized_count -= 1;
                    if let Some(res_index) = pairs.get(&last_inv) {
                        linearized[*res_index] = false;
                        linearized_count -= 1;
                    }
                    cursor = last_inv + 1;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{Invoke, Response};
    use crate::runtime::task::TaskId;
    use crate::value::Value;

    /// Counter with fetch-and-add semantics.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
    struct Counter {
        count: i64,
    }

    impl SeqSpec for Counter {
        fn apply(&mut self, method: &str, _args: &[Value]) -> Value {
            match method {
                "faa" => {
                    self.count += 1;
                    Value::Int(self.count - 1)
                }
                "get" => Value::Int(self.count),
                other => panic!("unknown method in sequential reference: {other}"),
            }
        }
    }

    fn inv(task: usize, thread: usize, method: &'static str) -> Event {
        Event::Invoke(Invoke {
            task: TaskId(task),
            thread,
            method,
            args: vec![],
        })
    }

    fn res(task: usize, thread: usize, result: i64) -> Event {
        Event::Response(Response {
            task: TaskId(task),
            thread,
            result: Value::Int(result),
        })
    }

    #[test]
    fn empty_history_is_linearizable() {
        let checker = LinearizabilityChecker::new(Counter::default());
        assert!(checker.check(&[]));
    }

    #[test]
    fn overlapping_faas_permute_freely() {
        // Five concurrent faa calls that responded in reverse order of their
        // linearization: valid.
        let mut history = Vec::new();
        for task in 0..5 {
            history.push(inv(task, task, "faa"));
        }
        for task in (0..5).rev() {
            history.push(res(task, task, task as i64));
        }
        let checker = LinearizabilityChecker::new(Counter::default());
        assert!(checker.check(&history));
    }

    #[test]
    fn impossible_return_is_rejected() {
        let history = vec![
            inv(0, 0, "faa"),
            inv(1, 1, "faa"),
            res(0, 0, 7),
            res(1, 1, 0),
        ];
        let checker = LinearizabilityChecker::new(Counter::default());
        assert!(!checker.check(&history));
    }

    #[test]
    fn stale_get_pinned_by_real_time_is_rejected() {
        // Both faa calls responded before get was invoked, so get must see 2.
        let history = vec![
            inv(0, 0, "faa"),
            res(0, 0, 0),
            inv(1, 1, "faa"),
            res(1, 1, 1),
            inv(2, 0, "get"),
            res(2, 0, 1),
        ];
        let checker = LinearizabilityChecker::new(Counter::default());
        assert!(!checker.check(&history));
    }

    #[test]
    fn unmatched_invoke_linearizes_after() {
        // The pending faa's linearization point may be placed after get.
        let history = vec![inv(0, 0, "faa"), inv(1, 1, "get"), res(1, 1, 0)];
        let checker = LinearizabilityChecker::new(Counter::default());
        assert!(checker.check(&history));
    }
}
