// src/minimize/smart.rs — genetic round shrinking
//
// Keeps a tiny population of "solutions", each a per-thread set of
// surviving task ids together with a failing history for that survivor
// mask. Offspring are produced by crossing the two fittest solutions and
// mutating the result (dropping random tasks), then validated by
// re-exploring the reduced round. Fitness rewards fewer surviving tasks
// and, secondarily, fewer surviving threads.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::checker::ModelChecker;
use crate::error::EngineError;
use crate::runtime::task::TaskId;
use crate::scheduler::{Histories, StrategyScheduler};
use crate::spec::TestTarget;
use crate::strategy::Strategy;

use super::Minimizer;

const FITNESS_EPS: f64 = 1e-4;

/// Per-thread sets of surviving task ids.
type SurvivorMap = BTreeMap<usize, BTreeSet<TaskId>>;

#[derive(Clone)]
struct Solution {
    threads: SurvivorMap,
    histories: Histories,
    fitness: f64,
    valid_tasks: usize,
}

impl Solution {
    /// Snapshots the strategy's current survivor mask together with the
    /// failing histories observed under it.
    fn capture<T: TestTarget>(
        strategy: &dyn Strategy<T>,
        histories: Histories,
        total_tasks: usize,
    ) -> Self {
        let total_threads = strategy.threads_count();
        let mut threads: SurvivorMap = BTreeMap::new();
        let mut valid_tasks = 0usize;
        for thread in 0..total_threads {
            for task in strategy.base().thread(thread) {
                if !task.removed() {
                    valid_tasks += 1;
                    threads.entry(thread).or_default().insert(task.id());
                }
            }
        }

        // the fewer tasks and threads survive, the closer to 1.0
        let tasks_fitness = 1.0 - valid_tasks as f64 / total_tasks as f64;
        let threads_fitness = FITNESS_EPS + 1.0 - threads.len() as f64 / total_threads as f64;
        Solution {
            threads,
            histories,
            fitness: tasks_fitness * threads_fitness,
            valid_tasks,
        }
    }
}

pub struct SmartMinimizer {
    explore_runs: usize,
    generations: usize,
    max_offsprings: usize,
    generation_attempts: usize,
    max_population: usize,
    mutations_count: usize,
    rng: StdRng,
}

impl SmartMinimizer {
    pub fn new(explore_runs: usize, generations: usize, seed: Option<u64>) -> Self {
        Self::with_params(explore_runs, generations, seed, 5, 10, 10)
    }

    pub fn with_params(
        explore_runs: usize,
        generations: usize,
        seed: Option<u64>,
        max_offsprings: usize,
        generation_attempts: usize,
        initial_mutations: usize,
    ) -> Self {
        assert!(generation_attempts > 0);
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        SmartMinimizer {
            explore_runs,
            generations,
            max_offsprings,
            generation_attempts,
            max_population: 2,
            mutations_count: initial_mutations,
            rng,
        }
    }

    /// Mixes the parents' threads. The parent with fewer threads bounds the
    /// result; each of its threads is inherited from either parent with
    /// equal probability.
    fn cross(&mut self, p1: &Solution, p2: &Solution) -> SurvivorMap {
        let (small, big) = if p1.threads.len() <= p2.threads.len() {
            (p1, p2)
        } else {
            (p2, p1)
        };
        let mut threads = SurvivorMap::new();
        for (thread, tasks) in &small.threads {
            let inherited = match big.threads.get(thread) {
                Some(other) if self.rng.gen::<f64>() >= 0.5 => other.clone(),
                _ => tasks.clone(),
            };
            threads.insert(*thread, inherited);
        }
        threads
    }

    /// Drops one random task from one random thread, never emptying the
    /// solution and never leaving a lone thread behind by accident.
    fn drop_random_task(&mut self, threads: &mut SurvivorMap) {
        if threads.is_empty() {
            return;
        }
        let total: usize = threads.values().map(BTreeSet::len).sum();
        if total <= 1 {
            return;
        }
        let keys: Vec<usize> = threads.keys().copied().collect();
        let thread = keys[self.rng.gen_range(0..keys.len())];
        let thread_count = threads.len();
        let tasks = threads.get_mut(&thread).expect("picked an existing thread");
        if tasks.len() == 1 && thread_count == 2 {
            return;
        }
        let drop_index = self.rng.gen_range(0..tasks.len());
        let id = *tasks
            .iter()
            .nth(drop_index)
            .expect("index within the task set");
        tasks.remove(&id);
        if tasks.is_empty() {
            threads.remove(&thread);
        }
    }

    /// Applies a survivor mask to the strategy: tasks absent from the mask
    /// are marked removed.
    fn apply_survivors<T: TestTarget>(strategy: &mut dyn Strategy<T>, survivors: &SurvivorMap) {
        for thread in 0..strategy.threads_count() {
            let ids: Vec<TaskId> = strategy
                .base()
                .thread(thread)
                .iter()
                .map(|task| task.id())
                .collect();
            for id in ids {
                let keep = survivors
                    .get(&thread)
                    .is_some_and(|tasks| tasks.contains(&id));
                strategy.set_removed(id, !keep);
            }
        }
    }

    fn generate_offsprings<T: TestTarget, C: ModelChecker>(
        &mut self,
        sched: &mut StrategyScheduler<T, C>,
        p1: &Solution,
        p2: &Solution,
        total_tasks: usize,
    ) -> Result<Vec<Solution>, EngineError> {
        let mut offsprings = Vec::new();

        for _ in 0..self.max_offsprings {
            let mut attempts = self.generation_attempts;
            while attempts > 0 {
                attempts -= 1;

                let mut survivors = self.cross(p1, p2);
                for _ in 0..self.mutations_count {
                    // with a single permitted mutation, occasionally apply
                    // none at all and let the crossover stand on its own
                    if self.mutations_count > 1 || self.rng.gen::<f64>() < 0.95 {
                        self.drop_random_task(&mut survivors);
                    }
                }

                Self::apply_survivors(sched.strategy_mut(), &survivors);
                let explored = match sched.explore_round(self.explore_runs) {
                    Err(EngineError::Deadlock) => None,
                    other => other?,
                };
                if let Some(histories) = explored {
                    let solution = Solution::capture(sched.strategy(), histories, total_tasks);
                    debug!(
                        fitness = solution.fitness,
                        surviving = solution.valid_tasks,
                        "smart minimizer produced an offspring"
                    );
                    offsprings.push(solution);
                    break;
                }
            }
        }

        // anneal toward fewer mutations when offspring generation keeps
        // missing
        if offsprings.len() * 2 < self.max_offsprings && self.mutations_count > 1 {
            self.mutations_count -= 1;
        }

        Ok(offsprings)
    }
}

impl<T: TestTarget, C: ModelChecker> Minimizer<T, C> for SmartMinimizer {
    fn minimize(
        &mut self,
        sched: &mut StrategyScheduler<T, C>,
        histories: &mut Histories,
    ) -> Result<(), EngineError> {
        let total_tasks = sched.strategy().total_tasks_count();
        let mut population: Vec<Solution> = vec![Solution::capture(
            sched.strategy(),
            histories.clone(),
            total_tasks,
        )];

        for _ in 0..self.generations {
            let p1 = population[0].clone();
            let p2 = population.get(1).unwrap_or(&population[0]).clone();

            let offsprings = self.generate_offsprings(sched, &p1, &p2, total_tasks)?;
            population.extend(offsprings);
            population.sort_by(|a, b| {
                b.fitness
                    .partial_cmp(&a.fitness)
                    .expect("fitness values are finite")
            });
            population.truncate(self.max_population);
        }

        let best = population
            .first()
            .expect("population holds at least the initial solution");
        Self::apply_survivors(sched.strategy_mut(), &best.threads);

        // replay the winning interleaving so the round ends in a consistent
        // state and the histories reflect the survivor mask exactly
        let ordering =
            StrategyScheduler::<T, C>::tasks_ordering(&best.histories.full, &HashSet::new());
        let replayed = sched.replay_round(&ordering)?;
        let replayed =
            replayed.expect("deterministic replay of a failing interleaving fails again");
        *histories = replayed;
        Ok(())
    }
}
