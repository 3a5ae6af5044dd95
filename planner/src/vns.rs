//! Variable-neighborhood search over observation plans: first improvement
//! within a neighborhood, cycling through the neighborhood family and
//! restarting from the first one after every improvement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fireobs_structs::error::{Error, Result};
use fireobs_structs::plan::Plan;
use log::{debug, trace};
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

use crate::neighborhoods::{default_neighborhoods, Neighborhood};

#[derive(Clone, Debug)]
pub struct SearchParams {
    /// Seed of the PRNG shared by all neighborhoods.
    pub seed: u64,
    /// Snapshot the plan into the history every this many steps.
    pub save_every: usize,
    /// Step budget.
    pub max_steps: usize,
    /// Stop after this many full neighborhood cycles without improvement.
    pub max_stale_cycles: usize,
    /// Wall-clock budget.
    pub timeout: Option<Duration>,
    /// Weight of total flight time against utility in the cost.
    pub alpha: f64,
    /// Minimum cost decrease that counts as an improvement.
    pub epsilon: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            seed: 0,
            save_every: 100,
            max_steps: 10_000,
            max_stale_cycles: 25,
            timeout: None,
            alpha: 1e-4,
            epsilon: 1e-6,
        }
    }
}

/// Cooperative cancellation, checked at the top of every iteration.
#[derive(Clone, Default, Debug)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub initial: Plan,
    pub final_plan: Plan,
    /// Snapshots taken every `save_every` steps.
    pub intermediate: Vec<Plan>,
}

pub fn cost(plan: &Plan, alpha: f64) -> f64 {
    plan.utility() + alpha * plan.duration()
}

/// Improve `plan` with the given neighborhoods. Deterministic for a fixed
/// seed and neighborhood order; on cancellation the best plan so far is
/// returned.
pub fn search(
    plan: Plan,
    neighborhoods: &[Box<dyn Neighborhood>],
    params: &SearchParams,
    token: &CancellationToken,
) -> SearchResult {
    assert!(!neighborhoods.is_empty());
    #[cfg(feature = "prof")]
    let _p = hprof::enter("vns search");

    let initial = plan.clone();
    let mut best = plan;
    let mut best_cost = cost(&best, params.alpha);
    let mut rng = ChaChaRng::seed_from_u64(params.seed);
    let started = Instant::now();
    let mut history = Vec::new();
    let mut k = 0;
    let mut stale_cycles = 0;

    debug!("starting VNS at cost {best_cost} with {} neighborhoods", neighborhoods.len());
    for step in 0..params.max_steps {
        if token.check().is_err() {
            debug!("cancelled at step {step}");
            break;
        }
        if params.timeout.is_some_and(|t| started.elapsed() >= t) {
            debug!("timed out at step {step}");
            break;
        }
        if stale_cycles >= params.max_stale_cycles {
            debug!("no improvement for {stale_cycles} cycles, stopping at step {step}");
            break;
        }

        let neighborhood = &neighborhoods[k];
        let mut improved = false;
        match neighborhood.propose(&best, &mut rng) {
            None => trace!("step {step}: {} has no proposal", neighborhood.name()),
            Some(update) => match update.apply(&mut best) {
                Err(e) => trace!("step {step}: {} proposal infeasible: {e}", neighborhood.name()),
                Ok(inverse) => {
                    let new_cost = cost(&best, params.alpha);
                    if new_cost < best_cost - params.epsilon {
                        trace!("step {step}: {} improved {best_cost} -> {new_cost}", neighborhood.name());
                        best_cost = new_cost;
                        improved = true;
                    } else if let Err(e) = inverse.apply(&mut best) {
                        panic!("rollback failed: {e}");
                    }
                }
            },
        }

        if improved {
            k = 0;
            stale_cycles = 0;
        } else if k + 1 == neighborhoods.len() {
            k = 0;
            stale_cycles += 1;
        } else {
            k += 1;
        }

        if params.save_every > 0 && step % params.save_every == 0 {
            history.push(best.clone());
        }
    }

    debug!("search done: cost {best_cost}, {} segments, {} snapshots", best.num_segments(), history.len());
    SearchResult { initial, final_plan: best, intermediate: history }
}

/// Search with the default move set and a fixed step budget.
pub fn plan_search(initial: Plan, seed: u64, save_every: usize, budget: usize) -> SearchResult {
    let params = SearchParams { seed, save_every, max_steps: budget, ..Default::default() };
    search(initial, &default_neighborhoods(), &params, &CancellationToken::new())
}
