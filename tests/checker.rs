// tests/checker.rs — linearizability checker properties on hand-built and
// generated histories

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use linstress::checker::{LinearizabilityChecker, ModelChecker, ReferenceChecker};
use linstress::history::{Event, Invoke, Response};
use linstress::runtime::task::TaskId;
use linstress::spec::SeqSpec;
use linstress::targets::queue::FifoQueue;
use linstress::targets::register::IntRegister;
use linstress::value::Value;

/// Fetch-and-add counter used by the generated-history tests.
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

fn inv(task: usize, method: &'static str, args: Vec<Value>) -> Event {
    Event::Invoke(Invoke {
        task: TaskId(task),
        thread: task,
        method,
        args,
    })
}

fn res(task: usize, result: Value) -> Event {
    Event::Response(Response {
        task: TaskId(task),
        thread: task,
        result,
    })
}

#[test]
fn fifo_pop_of_a_never_pushed_value_is_rejected() {
    // A pushes 1, B pops 2: no sequential order explains the 2.
    let history = vec![
        inv(0, "push", vec![Value::Int(1)]),
        inv(1, "pop", vec![]),
        res(0, Value::Unit),
        res(1, Value::Int(2)),
    ];
    let checker = LinearizabilityChecker::new(FifoQueue::default());
    assert_eq!(checker.check(&history), false);

    // popping the pushed value instead is fine
    let mut fixed = history.clone();
    fixed[3] = res(1, Value::Int(1));
    assert_eq!(checker.check(&fixed), true);
}

#[test]
fn pending_invoke_may_linearize_after_the_reader() {
    // add never responds; get sees the old value, so add sits after it.
    let history = vec![
        inv(0, "add", vec![]),
        inv(1, "get", vec![]),
        res(1, Value::Int(0)),
    ];
    let checker = LinearizabilityChecker::new(IntRegister::default());
    assert_eq!(checker.check(&history), true);
}

#[test]
fn sequential_histories_accept_iff_returns_match() {
    // every invoke immediately followed by its response, returns computed
    // from the reference itself
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let mut spec = FifoQueue::default();
        let mut history = Vec::new();
        let ops = rng.gen_range(1..8);
        for task in 0..ops {
            let (method, args) = if rng.gen_bool(0.5) {
                ("push", vec![Value::Int(rng.gen_range(1..10))])
            } else {
                ("pop", vec![])
            };
            let result = spec.apply(method, &args);
            history.push(inv(task, method, args));
            history.push(res(task, result));
        }
        // final pop to guarantee a corruptible response
        let result = spec.apply("pop", &[]);
        history.push(inv(ops, "pop", vec![]));
        history.push(res(ops, result));

        let checker = LinearizabilityChecker::new(FifoQueue::default());
        assert_eq!(checker.check(&history), true);

        // a return value no reachable state can produce flips the verdict
        let last = history.len() - 1;
        history[last] = res(ops, Value::Int(99));
        assert_eq!(checker.check(&history), false);
    }
}

/// Legal adjacent swaps: two invokes, two responses, or moving an invoke in
/// front of the response right before it. None of these strengthen the
/// real-time order, so an accepted history stays accepted.
fn legal_swaps(history: &[Event]) -> Vec<Vec<Event>> {
    let mut variants = Vec::new();
    for i in 0..history.len().saturating_sub(1) {
        let (a, b) = (&history[i], &history[i + 1]);
        if a.task() == b.task() {
            continue;
        }
        let allowed = match (a, b) {
            (Event::Invoke(_), Event::Invoke(_)) => true,
            (Event::Response(_), Event::Response(_)) => true,
            (Event::Response(_), Event::Invoke(_)) => true,
            (Event::Invoke(_), Event::Response(_)) => false,
        };
        if allowed {
            let mut swapped = history.to_vec();
            swapped.swap(i, i + 1);
            variants.push(swapped);
        }
    }
    variants
}

#[test]
fn accepted_histories_survive_order_preserving_swaps() {
    let accepted = vec![
        vec![
            inv(0, "faa", vec![]),
            inv(1, "faa", vec![]),
            res(0, Value::Int(0)),
            res(1, Value::Int(1)),
        ],
        vec![
            inv(0, "faa", vec![]),
            res(0, Value::Int(0)),
            inv(1, "get", vec![]),
            inv(2, "faa", vec![]),
            res(2, Value::Int(1)),
            res(1, Value::Int(2)),
        ],
    ];
    for history in accepted {
        let checker = LinearizabilityChecker::new(Counter::default());
        assert_eq!(checker.check(&history), true, "base history must pass");
        for variant in legal_swaps(&history) {
            assert_eq!(
                checker.check(&variant),
                true,
                "swap changed the verdict: {variant:?}"
            );
        }
    }
}

/// Well-formed random history over the counter: invokes before responses,
/// some invokes left pending, return values drawn blindly.
fn random_history(rng: &mut StdRng) -> Vec<Event> {
    let mut events = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let target_len = rng.gen_range(0..=10);
    let mut next_task = 0;

    while events.len() < target_len {
        let may_invoke = next_task < 5;
        if open.is_empty() || (may_invoke && rng.gen_bool(0.5)) {
            if !may_invoke {
                break;
            }
            let method = if rng.gen_bool(0.5) { "faa" } else { "get" };
            events.push(inv(next_task, method, vec![]));
            open.push(next_task);
            next_task += 1;
        } else {
            let slot = rng.gen_range(0..open.len());
            let task = open.remove(slot);
            events.push(res(task, Value::Int(rng.gen_range(0..4))));
        }
    }
    events
}

#[test]
fn iterative_and_recursive_checkers_agree() {
    let mut rng = StdRng::seed_from_u64(2024);
    for round in 0..300 {
        let history = random_history(&mut rng);
        let fast = LinearizabilityChecker::new(Counter::default()).check(&history);
        let slow = ReferenceChecker::new(Counter::default()).check(&history);
        assert_eq!(fast, slow, "checkers disagree on round {round}: {history:?}");
    }
}

#[test]
fn accepted_random_histories_survive_legal_swaps() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut accepted_seen = 0;
    for _ in 0..200 {
        let history = random_history(&mut rng);
        let checker = LinearizabilityChecker::new(Counter::default());
        if !checker.check(&history) {
            continue;
        }
        accepted_seen += 1;
        for variant in legal_swaps(&history) {
            assert_eq!(
                checker.check(&variant),
                true,
                "swap changed the verdict: {variant:?}"
            );
        }
    }
    assert!(accepted_seen > 10, "generator produced too few accepted histories");
}
