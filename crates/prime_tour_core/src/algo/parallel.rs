//! Parallel annealing over one shared tour.
//!
//! The interior positions are cut into contiguous blocks, one per worker.
//! Consecutive blocks share one boundary position (the seam). A swap at
//! `(p, p + 1)` reads positions `p - 1 ..= p + 2`, so only the two swaps on
//! either side of a seam can observe a neighbour's writes; those take the
//! seam's mutex and everything else runs lock-free on disjoint positions.
//!
//! Workers accept against the epoch-start cost plus their own deltas, which
//! is stale relative to sibling workers. The summed deltas are still exact
//! because every overlapping read/write window is serialized by a seam lock.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use rand::{Rng, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;

use crate::{
    DistanceModel, Error, Result, Tour,
    algo::anneal::{
        Acceptance, AnnealConfig, AnnealOutcome, EpochStats, INITIAL_TEMPERATURE, Incumbent,
        MIN_SWAP_TOUR_LEN, adjacent_swap_delta, anneal, metropolis, swap_positions,
    },
    utils,
};

pub const DEFAULT_WORKERS: usize = 8;

/// Narrowest block (in adjacent pairs) that keeps the two seam zones of a
/// block from overlapping.
pub const MIN_BLOCK_SPAN: usize = 4;

const POOL_NAME: &str = "anneal";
const ERR_NO_WORKERS: &str = "workers must be > 0";

/// Inclusive range of tour positions owned by one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub start: usize,
    pub end: usize,
}

impl Block {
    /// Number of adjacent pairs `(p, p + 1)` inside the block.
    pub fn span(&self) -> usize {
        self.end - self.start
    }

    pub fn contains(&self, position: usize) -> bool {
        (self.start..=self.end).contains(&position)
    }
}

/// Cuts the interior `[1, len - 2]` of a tour into `workers` blocks.
///
/// Blocks advance by `(len - 3) / (workers - 1)`; the last one ends at
/// `len - 2` and absorbs the remainder. Neighbouring blocks share their
/// boundary position.
pub fn partition(len: usize, workers: usize) -> Vec<Block> {
    if len < MIN_SWAP_TOUR_LEN - 1 || workers == 0 {
        return Vec::new();
    }

    let last = len - 2;
    if workers == 1 {
        return vec![Block {
            start: 1,
            end: last,
        }];
    }

    let stride = (len - 3) / (workers - 1);
    (0..workers)
        .map(|idx| {
            let start = (1 + idx * stride).min(last);
            let end = if idx + 1 == workers {
                last
            } else {
                (1 + (idx + 1) * stride).min(last)
            };
            Block { start, end }
        })
        .collect()
}

/// Largest worker count not above `requested` whose blocks are all at least
/// [`MIN_BLOCK_SPAN`] wide (the last block excepted).
pub fn effective_workers(len: usize, requested: usize) -> usize {
    let pairs = swap_positions(len);
    if pairs < MIN_BLOCK_SPAN {
        return 1;
    }
    requested.clamp(1, pairs / MIN_BLOCK_SPAN + 1)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParallelConfig {
    pub workers: usize,
    pub anneal: AnnealConfig,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            anneal: AnnealConfig::default(),
        }
    }
}

/// Tour positions readable and writable from several threads.
struct SharedTour {
    slots: Vec<AtomicUsize>,
}

impl SharedTour {
    fn new(tour: &Tour) -> Self {
        Self {
            slots: tour.iter().map(AtomicUsize::new).collect(),
        }
    }

    fn load(&self, position: usize) -> usize {
        self.slots[position].load(Ordering::Relaxed)
    }

    fn window(&self, fst: usize) -> [usize; 4] {
        [
            self.load(fst - 1),
            self.load(fst),
            self.load(fst + 1),
            self.load(fst + 2),
        ]
    }

    fn swap_adjacent(&self, fst: usize, a: usize, b: usize) {
        self.slots[fst].store(b, Ordering::Relaxed);
        self.slots[fst + 1].store(a, Ordering::Relaxed);
    }

    fn snapshot(&self) -> Tour {
        Tour::new((0..self.slots.len()).map(|pos| self.load(pos)).collect())
    }
}

/// One mutex per seam, i.e. per position shared by two blocks.
struct SeamLocks {
    seams: Vec<Mutex<()>>,
}

impl SeamLocks {
    fn new(blocks: &[Block]) -> Self {
        Self {
            seams: (1..blocks.len()).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Seams whose neighbour can observe a swap at `(fst, fst + 1)` by the
    /// owner of `blocks[worker]`, lowest first.
    fn seams_for(blocks: &[Block], worker: usize, fst: usize) -> [Option<usize>; 2] {
        let block = blocks[worker];
        let left = (worker > 0 && fst <= block.start + 1).then(|| worker - 1);
        let right = (worker + 1 < blocks.len() && fst + 2 >= block.end).then_some(worker);
        [left, right]
    }

    fn lock(&self, seams: [Option<usize>; 2]) -> [Option<MutexGuard<'_, ()>>; 2] {
        seams.map(|seam| {
            seam.map(|idx| {
                self.seams[idx]
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
            })
        })
    }
}

/// Inputs every worker snapshots at the start of an epoch.
#[derive(Clone, Copy, Debug)]
struct EpochPlan {
    epoch: usize,
    cost: f64,
    temperature: f64,
    moves: usize,
    pairs: usize,
    seed: u64,
}

impl EpochPlan {
    /// Share of the epoch's moves proportional to the block's width.
    fn moves_for(&self, block: &Block) -> usize {
        if self.pairs == 0 {
            return 0;
        }
        (self.moves * block.span()).div_ceil(self.pairs)
    }
}

fn run_block<D: DistanceModel + ?Sized>(
    model: &D,
    tour: &SharedTour,
    locks: &SeamLocks,
    blocks: &[Block],
    worker: usize,
    plan: &EpochPlan,
) -> EpochStats {
    let block = blocks[worker];
    let mut stats = EpochStats::default();
    if block.span() == 0 {
        return stats;
    }

    let mut rng = SmallRng::seed_from_u64(utils::worker_seed(plan.seed, plan.epoch, worker));
    let mut cost = plan.cost;

    for _ in 0..plan.moves_for(&block) {
        let fst = rng.random_range(block.start..block.end);
        let draw = rng.random::<f64>();

        let _guards = locks.lock(SeamLocks::seams_for(blocks, worker, fst));
        let window = tour.window(fst);
        let delta = adjacent_swap_delta(model, window, fst);
        let acceptance = metropolis(cost, cost + delta, plan.temperature, draw);

        if acceptance.is_accepted() {
            tour.swap_adjacent(fst, window[1], window[2]);
            cost += delta;
            if acceptance == Acceptance::Probabilistic {
                log::trace!(
                    "anneal.accept: probabilistic worker={worker} pos={fst} delta={delta:.6}"
                );
            }
        }
        stats.record(acceptance, delta);
    }

    stats
}

/// Annealing with the tour partitioned across a worker pool.
///
/// Falls back to [`anneal`] when the tour is too short for more than one
/// worker.
#[prime_tour_derive::timer("anneal.parallel")]
pub fn anneal_parallel<D: DistanceModel + Sync + ?Sized>(
    model: &D,
    tour: Tour,
    config: &ParallelConfig,
) -> Result<AnnealOutcome> {
    config.anneal.validate()?;
    if config.workers == 0 {
        return Err(Error::invalid_input(ERR_NO_WORKERS));
    }

    let len = tour.len();
    let workers = effective_workers(len, config.workers);
    if workers < config.workers {
        log::info!(
            "anneal.parallel: lowering workers requested={} effective={workers} len={len}",
            config.workers
        );
    }
    if workers == 1 {
        return anneal(model, tour, &config.anneal);
    }

    let blocks = partition(len, workers);
    let locks = SeamLocks::new(&blocks);
    let pool = utils::build_pool(workers, POOL_NAME)?;

    let mut cost = tour.cost(model);
    let mut temperature = INITIAL_TEMPERATURE;
    let mut best = Incumbent::new(tour.clone(), cost);
    let shared = SharedTour::new(&tour);
    drop(tour);

    let moves = config.anneal.moves_for(len);
    let mut totals = EpochStats::default();

    log::info!(
        "anneal.parallel: start len={len} cost={cost:.2} workers={workers} epochs={} moves={moves} cooling={}",
        config.anneal.epochs,
        config.anneal.cooling
    );

    for epoch in 0..config.anneal.epochs {
        let plan = EpochPlan {
            epoch,
            cost,
            temperature,
            moves,
            pairs: swap_positions(len),
            seed: config.anneal.seed,
        };

        let reports: Vec<Option<EpochStats>> = pool.install(|| {
            (0..blocks.len())
                .into_par_iter()
                .map(|worker| {
                    panic::catch_unwind(AssertUnwindSafe(|| {
                        run_block(model, &shared, &locks, &blocks, worker, &plan)
                    }))
                    .map_err(|payload| {
                        log::error!(
                            "anneal.worker: failed epoch={epoch} worker={worker} err={}",
                            utils::panic_message(payload.as_ref())
                        );
                    })
                    .ok()
                })
                .collect()
        });

        let mut stats = EpochStats::default();
        let mut failed = 0;
        for report in &reports {
            match report {
                Some(report) => stats.merge(report),
                None => failed += 1,
            }
        }

        if failed > 0 {
            cost = shared.snapshot().cost(model);
            log::warn!(
                "anneal.parallel: resynced cost after worker failure epoch={epoch} failed={failed} cost={cost:.2}"
            );
        } else {
            cost += stats.delta;
        }

        log::debug!(
            "anneal.epoch: epoch={epoch} temp={temperature:.6} cost={cost:.2} {stats}"
        );
        totals.merge(&stats);
        best.offer(cost, || shared.snapshot());
        temperature *= config.anneal.cooling;
    }

    let (tour, tracked) = best.into_parts();
    let exact = tour.cost(model);
    let drift = exact - tracked;
    log::info!("anneal.parallel: complete cost={exact:.2} drift={drift:.3e} {totals}");

    Ok(AnnealOutcome {
        tour,
        cost: exact,
        drift,
        stats: totals,
        final_temperature: temperature,
    })
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    use super::{
        Block, MIN_BLOCK_SPAN, ParallelConfig, SeamLocks, anneal_parallel, effective_workers,
        partition,
    };
    use crate::{
        City, DistanceModel, Instance,
        algo::{anneal::AnnealConfig, construct::random_tour},
    };

    fn scattered(n: usize, seed: u64) -> Instance {
        let mut rng = SmallRng::seed_from_u64(seed);
        Instance::new(
            (0..n)
                .map(|_| City::new(rng.random::<f64>() * 800.0, rng.random::<f64>() * 800.0))
                .collect(),
        )
    }

    fn config(workers: usize, epochs: usize) -> ParallelConfig {
        ParallelConfig {
            workers,
            anneal: AnnealConfig {
                cooling: 0.7,
                epochs,
                moves_per_epoch: 0,
                seed: 5,
            },
        }
    }

    #[test]
    fn partition_of_twenty_over_four_workers() {
        let blocks = partition(20, 4);
        assert_eq!(
            blocks,
            vec![
                Block { start: 1, end: 6 },
                Block { start: 6, end: 11 },
                Block { start: 11, end: 16 },
                Block { start: 16, end: 18 },
            ]
        );

        for position in 1..=18 {
            let owners = blocks.iter().filter(|b| b.contains(position)).count();
            let is_seam = blocks.windows(2).any(|pair| pair[0].end == position);
            assert_eq!(owners, if is_seam { 2 } else { 1 }, "position={position}");
        }
        assert!(!blocks.iter().any(|b| b.contains(0) || b.contains(19)));
    }

    #[test]
    fn partition_spans_cover_every_adjacent_pair_once() {
        for len in [4, 5, 20, 37, 101, 1_000] {
            for workers in 1..=8 {
                let workers = effective_workers(len, workers);
                let blocks = partition(len, workers);
                assert_eq!(blocks.len(), workers);
                assert_eq!(blocks[0].start, 1);
                assert_eq!(blocks[workers - 1].end, len - 2);
                let pairs: usize = blocks.iter().map(Block::span).sum();
                assert_eq!(pairs, len - 3, "len={len} workers={workers}");
                for pair in blocks.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                    assert!(pair[0].span() >= MIN_BLOCK_SPAN);
                }
            }
        }
    }

    #[test]
    fn effective_workers_shrinks_for_short_tours() {
        assert_eq!(effective_workers(20, 4), 4);
        assert_eq!(effective_workers(20, 8), 5);
        assert_eq!(effective_workers(6, 8), 1);
        assert_eq!(effective_workers(1_000, 0), 1);
    }

    #[test]
    fn seam_zones_cover_the_two_swaps_on_each_side() {
        let blocks = partition(20, 4);
        // Block 1 is [6, 11]: seam 0 at position 6, seam 1 at position 11.
        assert_eq!(SeamLocks::seams_for(&blocks, 1, 6), [Some(0), None]);
        assert_eq!(SeamLocks::seams_for(&blocks, 1, 7), [Some(0), None]);
        assert_eq!(SeamLocks::seams_for(&blocks, 1, 8), [None, None]);
        assert_eq!(SeamLocks::seams_for(&blocks, 1, 9), [None, Some(1)]);
        assert_eq!(SeamLocks::seams_for(&blocks, 1, 10), [None, Some(1)]);
        assert_eq!(SeamLocks::seams_for(&blocks, 0, 1), [None, None]);
        assert_eq!(SeamLocks::seams_for(&blocks, 3, 17), [Some(2), None]);
    }

    #[test]
    fn parallel_run_keeps_tour_valid_and_cost_exact() {
        let instance = scattered(2_000, 13);
        let start = random_tour(&instance, 1).expect("tour");
        let start_cost = start.cost(&instance);

        let outcome = anneal_parallel(&instance, start, &config(4, 12)).expect("anneal");

        outcome.tour.validate(instance.len()).expect("valid");
        assert!(outcome.cost <= start_cost);
        assert!(outcome.drift.abs() <= 1e-9 * outcome.cost);
        assert!((outcome.cost - instance.path_cost(outcome.tour.as_slice())).abs() < 1e-6);
        assert!(outcome.stats.candidates >= 12 * (instance.len() - 2));
    }

    #[test]
    fn short_tour_falls_back_to_single_worker() {
        let instance = scattered(6, 2);
        let start = random_tour(&instance, 1).expect("tour");
        let outcome = anneal_parallel(&instance, start, &config(8, 3)).expect("anneal");
        outcome.tour.validate(instance.len()).expect("valid");
    }

    #[test]
    fn zero_workers_is_rejected() {
        let instance = scattered(50, 2);
        let start = random_tour(&instance, 1).expect("tour");
        assert!(anneal_parallel(&instance, start, &config(0, 3)).is_err());
    }

    /// Panics when a pool thread prices edge position 9.
    struct FaultyModel<'a>(&'a Instance);

    impl DistanceModel for FaultyModel<'_> {
        fn edge_cost(&self, from: usize, to: usize, position: usize) -> f64 {
            let on_pool = std::thread::current()
                .name()
                .is_some_and(|name| name.starts_with("anneal-"));
            if on_pool && position == 9 {
                panic!("injected fault");
            }
            self.0.edge_cost(from, to, position)
        }
    }

    #[test]
    fn worker_panic_is_isolated_and_cost_resynced() {
        let instance = scattered(19, 3);
        let model = FaultyModel(&instance);
        let start = random_tour(&instance, 1).expect("tour");
        assert_eq!(start.len(), 20);

        let outcome = anneal_parallel(&model, start, &config(4, 4)).expect("anneal");

        outcome.tour.validate(instance.len()).expect("valid");
        assert!((outcome.cost - model.path_cost(outcome.tour.as_slice())).abs() < 1e-9);
    }
}
