use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, mpsc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::{
    Error, Instance, Result, Tour, algo::construct::NearestNeighborBuilder,
    algo::parallel::DEFAULT_WORKERS, utils,
};

pub const DEFAULT_GRID_STRIDE: usize = 1_000;
/// Pool-wide join limit; a search that runs longer is abandoned.
pub const DEFAULT_GRID_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

const POOL_NAME: &str = "grid";
const ERR_INVALID_STRIDE: &str = "grid stride must be > 0";
const ERR_NO_WORKERS: &str = "workers must be > 0";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridConfig {
    pub stride: usize,
    pub workers: usize,
    pub timeout: Duration,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            stride: DEFAULT_GRID_STRIDE,
            workers: DEFAULT_WORKERS,
            timeout: DEFAULT_GRID_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GridOutcome {
    pub split: usize,
    pub cost: f64,
    pub tour: Tour,
    /// Split values that were actually evaluated.
    pub evaluated: usize,
}

/// Split values `0, stride, 2 * stride, ...` below the number of non-depot
/// cities. Always contains 0.
pub fn candidate_splits(cities: usize, stride: usize) -> Vec<usize> {
    let upper = cities.saturating_sub(1).max(1);
    (0..upper).step_by(stride.max(1)).collect()
}

/// Deals candidates round-robin over `workers` shards, dropping empty shards.
pub(crate) fn shard(candidates: &[usize], workers: usize) -> Vec<Vec<usize>> {
    let workers = workers.max(1);
    let mut shards = vec![Vec::new(); workers];
    for (idx, &split) in candidates.iter().enumerate() {
        shards[idx % workers].push(split);
    }
    shards.retain(|shard| !shard.is_empty());
    shards
}

/// Cheapest `(cost, split)` in one shard; ties go to the smaller split.
///
/// Stops before the next split once `cancelled` is set.
fn best_in_shard(
    instance: &Instance,
    splits: &[usize],
    cancelled: &AtomicBool,
) -> Result<Option<(f64, usize)>> {
    let mut best: Option<(f64, usize)> = None;
    for &split in splits {
        if cancelled.load(Ordering::Relaxed) {
            log::debug!("grid.eval: cancelled before split={split}");
            break;
        }
        let tour = NearestNeighborBuilder::new(instance).split(split).build()?;
        let cost = tour.cost(instance);
        log::debug!("grid.eval: split={split} cost={cost:.2}");
        if best.is_none_or(|(best_cost, best_split)| is_better((cost, split), (best_cost, best_split))) {
            best = Some((cost, split));
        }
    }
    Ok(best)
}

fn is_better(candidate: (f64, usize), incumbent: (f64, usize)) -> bool {
    candidate
        .0
        .total_cmp(&incumbent.0)
        .then(candidate.1.cmp(&incumbent.1))
        .is_lt()
}

type ShardReport = (usize, std::thread::Result<Result<Option<(f64, usize)>>>);

/// Builds a nearest-neighbour tour for every candidate split in parallel and
/// returns the cheapest.
///
/// Failed shards are logged and skipped. Waiting longer than
/// `config.timeout` for the pool is fatal.
#[prime_tour_derive::timer("grid")]
pub fn grid_search(instance: &Arc<Instance>, config: &GridConfig) -> Result<GridOutcome> {
    if config.stride == 0 {
        return Err(Error::invalid_input(ERR_INVALID_STRIDE));
    }
    if config.workers == 0 {
        return Err(Error::invalid_input(ERR_NO_WORKERS));
    }

    let candidates = candidate_splits(instance.len(), config.stride);
    let shards = shard(&candidates, config.workers);
    let shard_count = shards.len();
    let pool = utils::build_pool(shard_count, POOL_NAME)?;

    log::info!(
        "grid: start n={} candidates={} stride={} workers={shard_count}",
        instance.len(),
        candidates.len(),
        config.stride
    );

    let cancelled = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<ShardReport>();
    for (worker, splits) in shards.into_iter().enumerate() {
        let tx = tx.clone();
        let instance = Arc::clone(instance);
        let cancelled = Arc::clone(&cancelled);
        pool.spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                best_in_shard(&instance, &splits, &cancelled)
            }));
            // The receiver is gone only after a fatal timeout.
            let _ = tx.send((worker, result));
        });
    }
    drop(tx);

    let deadline = Instant::now() + config.timeout;
    let mut best: Option<(f64, usize)> = None;
    let mut failures = 0;
    for _ in 0..shard_count {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let (worker, result) = rx.recv_timeout(remaining).map_err(|e| {
            // Shards still running finish their current split and exit.
            cancelled.store(true, Ordering::Relaxed);
            Error::timeout(format!(
                "grid search did not finish within {:?}: {e}",
                config.timeout
            ))
        })?;

        match result {
            Ok(Ok(Some(found))) => {
                log::debug!("grid.worker: done worker={worker} split={} cost={:.2}", found.1, found.0);
                if best.is_none_or(|current| is_better(found, current)) {
                    best = Some(found);
                }
            }
            Ok(Ok(None)) => {}
            Ok(Err(err)) => {
                failures += 1;
                log::error!("grid.worker: failed worker={worker} err={err}");
            }
            Err(payload) => {
                failures += 1;
                log::error!(
                    "grid.worker: panicked worker={worker} err={}",
                    utils::panic_message(payload.as_ref())
                );
            }
        }
    }

    let (best_cost, split) = best.ok_or_else(|| {
        Error::worker(format!("all {failures} grid workers failed"))
    })?;

    let tour = NearestNeighborBuilder::new(instance).split(split).build()?;
    let cost = tour.cost(instance.as_ref());
    log::info!(
        "grid: complete best_split={split} cost={cost:.2} failures={failures}"
    );
    debug_assert!((cost - best_cost).abs() <= 1e-9 * cost.max(1.0));

    Ok(GridOutcome {
        split,
        cost,
        tour,
        evaluated: candidates.len(),
    })
}
