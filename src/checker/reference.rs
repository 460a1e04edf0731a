// src/checker/reference.rs — plain recursive linearizability search
//
// No caching and no iterative bookkeeping: at every level try each minimal
// not-yet-linearized invoke, recurse, backtrack on failure. Slow, but its
// verdicts are the yardstick the optimized checker is cross-checked against.

use crate::checker::ModelChecker;
use crate::history::{invoke_response_pairs, Event};
use crate::spec::SeqSpec;

pub struct ReferenceChecker<S: SeqSpec> {
    initial: S,
}

impl<S: SeqSpec> ReferenceChecker<S> {
    pub fn new(initial: S) -> Self {
        ReferenceChecker { initial }
    }

    fn search(
        history: &[Event],
        pairs: &std::collections::HashMap<usize, usize>,
        linearized: &mut [bool],
        remaining: usize,
        state: &S,
    ) -> bool {
        if remaining == 0 {
            return true;
        }

        for i in 0..history.len() {
            if linearized[i] {
                continue;
            }
            let inv = match &history[i] {
                Event::Invoke(inv) => inv,
                // Operations past a pending response are not minimal.
                Event::Response(_) => break,
            };

            let mut candidate = state.clone();
            let produced = candidate.apply(inv.method, &inv.args);

            match pairs.get(&i) {
                None => {
                    // No response recorded: any placement works.
                    linearized[i] = true;
                    if Self::search(history, pairs, linearized, remaining - 1, &candidate) {
                        return true;
                    }
                    linearized[i] = false;
                }
                Some(&res_index) => {
                    let fits = match &history[res_index] {
                        Event::Response(res) => produced == res.result,
                        Event::Invoke(_) => unreachable!("response index maps to an invoke"),
                    };
                    if fits {
                        linearized[i] = true;
                        linearized[res_index] = true;
                        if Self::search(history, pairs, linearized, remaining - 2, &candidate) {
                            return true;
                        }
                        linearized[i] = false;
                        linearized[res_index] = false;
                    }
                }
            }
        }

        false
    }
}

impl<S: SeqSpec> ModelChecker for ReferenceChecker<S> {
    fn check(&self, history: &[Event]) -> bool {
        if history.is_empty() {
            return true;
        }
        let pairs = invoke_response_pairs(history);
        let mut linearized = vec![false; history.len()];
        Self::search(
            history,
            &pairs,
            &mut linearized,
            history.len(),
            &self.initial,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{Invoke, Response};
    use crate::runtime::task::TaskId;
    use crate::value::Value;

    #[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
    struct Register {
        x: i64,
    }

    impl SeqSpec for Register {
        fn apply(&mut self, method: &str, _args: &[Value]) -> Value {
            match method {
                "add" => {
                    self.x += 1;
                    Value::Unit
                }
                "get" => Value::Int(self.x),
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

    #[test]
    fn sequential_get_must_observe_adds() {
        let history = vec![
            inv(0, 0, "add"),
            Event::Response(Response {
                task: TaskId(0),
                thread: 0,
                result: Value::Unit,
            }),
            inv(1, 1, "get"),
            Event::Response(Response {
                task: TaskId(1),
                thread: 1,
                result: Value::Int(0),
            }),
        ];
        let checker = ReferenceChecker::new(Register::default());
        assert!(!checker.check(&history));
    }

    #[test]
    fn pending_add_floats_past_get() {
        let history = vec![
            inv(0, 0, "add"),
            inv(1, 1, "get"),
            Event::Response(Response {
                task: TaskId(1),
                thread: 1,
                result: Value::Int(0),
            }),
        ];
        let checker = ReferenceChecker::new(Register::default());
        assert!(checker.check(&history));
    }
}
