// src/history.rs — invoke/response events recorded per round

use std::collections::HashMap;

use serde::Serialize;

use crate::runtime::task::TaskId;
use crate::value::Value;

/// The first resume of a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoke {
    pub task: TaskId,
    pub thread: usize,
    pub method: &'static str,
    pub args: Vec<Value>,
}

/// The resume on which a task returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub task: TaskId,
    pub thread: usize,
    pub result: Value,
}

/// One entry of the sequential history.
///
/// Events carry the task's method, arguments and result so a history is
/// checkable and printable on its own, without reaching back into the
/// round's task arena.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Invoke(Invoke),
    Response(Response),
}

impl Event {
    pub fn task(&self) -> TaskId {
        match self {
            Event::Invoke(inv) => inv.task,
            Event::Response(res) => res.task,
        }
    }

    pub fn thread(&self) -> usize {
        match self {
            Event::Invoke(inv) => inv.thread,
            Event::Response(res) => res.thread,
        }
    }

    pub fn is_invoke(&self) -> bool {
        matches!(self, Event::Invoke(_))
    }
}

/// Maps each invoke index to the index of its matching response.
///
/// Invokes without a response are absent from the map; that is a legal
/// partial history. A response whose task was never invoked earlier means
/// the recording itself is broken and aborts.
pub fn invoke_response_pairs(history: &[Event]) -> HashMap<usize, usize> {
    let mut open: HashMap<TaskId, usize> = HashMap::new();
    let mut pairs = HashMap::new();
    for (i, event) in history.iter().enumerate() {
        match event {
            Event::Invoke(inv) => {
                let prev = open.insert(inv.task, i);
                assert!(
                    prev.is_none(),
                    "malformed history: task {} invoked twice",
                    inv.task
                );
            }
            Event::Response(res) => {
                let inv_index = open
                    .remove(&res.task)
                    .unwrap_or_else(|| {
                        panic!("malformed history: response without invoke for task {}", res.task)
                    });
                pairs.insert(inv_index, i);
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(task: usize, thread: usize) -> Event {
        Event::Invoke(Invoke {
            task: TaskId(task),
            thread,
            method: "op",
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
    fn pairs_match_by_task() {
        let h = vec![inv(0, 0), inv(1, 1), res(1, 1, 7), res(0, 0, 9)];
        let pairs = invoke_response_pairs(&h);
        assert_eq!(pairs.get(&0), Some(&3));
        assert_eq!(pairs.get(&1), Some(&2));
    }

    #[test]
    fn partial_history_leaves_invoke_unpaired() {
        let h = vec![inv(0, 0), inv(1, 1), res(1, 1, 7)];
        let pairs = invoke_response_pairs(&h);
        assert_eq!(pairs.len(), 1);
        assert!(!pairs.contains_key(&0));
    }

    #[test]
    #[should_panic(expected = "response without invoke")]
    fn orphan_response_is_fatal() {
        let h = vec![res(5, 0, 1)];
        invoke_response_pairs(&h);
    }
}
