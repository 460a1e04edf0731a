// tests/minimize.rs — replay determinism and shrinking behavior on a
// deterministic failing round

use std::collections::HashSet;

use pretty_assertions::assert_eq;

use linstress::checker::{LinearizabilityChecker, ModelChecker};
use linstress::minimize::{
    Minimizer, SameInterleavingMinimizer, SmartMinimizer, StrategyExplorationMinimizer,
};
use linstress::scheduler::{Histories, StrategyScheduler};
use linstress::spec::Spec;
use linstress::strategy::round_robin::RoundRobinStrategy;
use linstress::strategy::Strategy;
use linstress::targets::register::{CountingSpec, RelaxedCounter, RelaxedCounterSpec};

type Checker = LinearizabilityChecker<CountingSpec>;
type Sched = StrategyScheduler<RelaxedCounter, Checker>;

/// Round-robin over two threads with the relaxed counter: the first round
/// interleaves two increments lock-step and fails deterministically.
fn failing_round(tasks: usize) -> (Sched, Histories) {
    let strategy = Box::new(RoundRobinStrategy::new(
        2,
        RelaxedCounterSpec::builders(),
        Some(99),
    ));
    let checker = Checker::new(RelaxedCounterSpec::reference());
    let mut sched = StrategyScheduler::new(strategy, checker, tasks, 5, 10, Some(99));
    let histories = sched
        .run_round()
        .expect("no deadlock")
        .expect("lock-step increments collide in the first round");
    (sched, histories)
}

#[test]
fn replay_reproduces_the_failing_round_exactly() {
    let (mut sched, histories) = failing_round(2);
    let ordering = Sched::tasks_ordering(&histories.full, &HashSet::new());
    let replayed = sched
        .replay_round(&ordering)
        .expect("no deadlock")
        .expect("replaying a failing interleaving fails again");
    assert_eq!(replayed, histories);
}

#[test]
fn same_interleaving_shrinks_and_never_enlarges() {
    let (mut sched, mut histories) = failing_round(4);
    let before = sched.strategy().valid_tasks_count();
    assert_eq!(before, 4);

    SameInterleavingMinimizer
        .minimize(&mut sched, &mut histories)
        .expect("minimization runs");

    let after = sched.strategy().valid_tasks_count();
    assert!(after <= before, "minimizer enlarged the surviving set");
    assert_eq!(after, 2, "two colliding increments are the minimal witness");
    assert_eq!(histories.seq.iter().filter(|e| e.is_invoke()).count(), 2);

    // still non-linearizable after shrinking
    let checker = Checker::new(RelaxedCounterSpec::reference());
    assert!(!checker.check(&histories.seq));
}

#[test]
fn exploration_minimizer_keeps_the_witness_failing() {
    let (mut sched, mut histories) = failing_round(4);

    StrategyExplorationMinimizer::new(10)
        .minimize(&mut sched, &mut histories)
        .expect("minimization runs");

    assert!(sched.strategy().valid_tasks_count() >= 2);
    let checker = Checker::new(RelaxedCounterSpec::reference());
    assert!(!checker.check(&histories.seq));
}

#[test]
fn smart_minimizer_keeps_the_witness_failing() {
    let (mut sched, mut histories) = failing_round(4);

    SmartMinimizer::new(10, 10, Some(4))
        .minimize(&mut sched, &mut histories)
        .expect("minimization runs");

    let surviving = sched.strategy().valid_tasks_count();
    assert!(
        (2..=4).contains(&surviving),
        "unexpected survivor count {surviving}"
    );
    let checker = Checker::new(RelaxedCounterSpec::reference());
    assert!(!checker.check(&histories.seq));
}

#[test]
fn pipeline_of_minimizers_is_monotone() {
    let (mut sched, mut histories) = failing_round(4);
    let mut last = sched.strategy().valid_tasks_count();

    SameInterleavingMinimizer
        .minimize(&mut sched, &mut histories)
        .expect("minimization runs");
    let now = sched.strategy().valid_tasks_count();
    assert!(now <= last);
    last = now;

    StrategyExplorationMinimizer::new(10)
        .minimize(&mut sched, &mut histories)
        .expect("minimization runs");
    let now = sched.strategy().valid_tasks_count();
    assert!(now <= last);
    last = now;

    SmartMinimizer::new(10, 10, Some(8))
        .minimize(&mut sched, &mut histories)
        .expect("minimization runs");
    assert!(sched.strategy().valid_tasks_count() <= last);

    let checker = Checker::new(RelaxedCounterSpec::reference());
    assert!(!checker.check(&histories.seq));
}
