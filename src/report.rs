// src/report.rs — machine-readable counterexample rendering

use serde::Serialize;

use crate::history::Event;
use crate::runtime::task::TaskId;
use crate::scheduler::Histories;

#[derive(Serialize)]
struct CounterexampleReport<'a> {
    verdict: &'static str,
    /// Task ids in resume order, one entry per scheduling step.
    resume_order: &'a [TaskId],
    /// The invoke/response events the checker rejected.
    events: &'a [Event],
}

/// Renders a failing round as pretty-printed JSON for downstream tooling.
pub fn render_json(histories: &Histories) -> String {
    serde_json::to_string_pretty(&CounterexampleReport {
        verdict: "non-linearizable",
        resume_order: &histories.full,
        events: &histories.seq,
    })
    .expect("histories serialize without error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{Invoke, Response};
    use crate::value::Value;

    #[test]
    fn report_carries_events_and_order() {
        let histories = Histories {
            full: vec![TaskId(0), TaskId(0)],
            seq: vec![
                Event::Invoke(Invoke {
                    task: TaskId(0),
                    thread: 0,
                    method: "get",
                    args: vec![],
                }),
                Event::Response(Response {
                    task: TaskId(0),
                    thread: 0,
                    result: Value::Int(3),
                }),
            ],
        };
        let json = render_json(&histories);
        assert!(json.contains("non-linearizable"));
        assert!(json.contains("\"method\": \"get\""));
        assert!(json.contains("\"kind\": \"response\""));
    }
}
