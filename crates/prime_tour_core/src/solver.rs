use std::{sync::Arc, time::Duration};

use crate::{
    Instance, Result, Tour,
    algo::{
        anneal::{AnnealConfig, anneal},
        construct::{NearestNeighborBuilder, random_tour},
        grid::{GridConfig, grid_search},
        parallel::{ParallelConfig, anneal_parallel},
    },
    io::options::{SolverOptions, StrategyKind},
};

/// How a tour is produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Strategy {
    /// Seeded shuffle of the non-depot cities.
    Random { seed: u64 },
    Greedy { split: usize },
    GreedyThenAnneal { split: usize, anneal: ParallelConfig },
    /// Greedy construction for every candidate split; keeps the cheapest.
    GridSearch { grid: GridConfig },
}

impl Strategy {
    pub fn from_options(options: &SolverOptions) -> Self {
        match options.strategy {
            StrategyKind::Random => Self::Random { seed: options.seed },
            StrategyKind::Greedy => Self::Greedy {
                split: options.split,
            },
            StrategyKind::Anneal => Self::GreedyThenAnneal {
                split: options.split,
                anneal: ParallelConfig {
                    workers: options.workers,
                    anneal: AnnealConfig {
                        cooling: options.cooling,
                        epochs: options.epochs,
                        moves_per_epoch: options.moves_per_epoch,
                        seed: options.seed,
                    },
                },
            },
            StrategyKind::Grid => Self::GridSearch {
                grid: GridConfig {
                    stride: options.grid_stride,
                    workers: options.workers,
                    timeout: Duration::from_secs(options.grid_timeout_secs),
                },
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct Solution {
    pub tour: Tour,
    pub cost: f64,
    /// Split that produced the tour, for greedy-based strategies.
    pub split: Option<usize>,
}

#[prime_tour_derive::timer("solver")]
pub fn solve(instance: &Arc<Instance>, strategy: &Strategy) -> Result<Solution> {
    let (tour, split) = match *strategy {
        Strategy::Random { seed } => (random_tour(instance, seed)?, None),
        Strategy::Greedy { split } => (
            NearestNeighborBuilder::new(instance).split(split).build()?,
            Some(split),
        ),
        Strategy::GreedyThenAnneal { split, anneal: config } => {
            let initial = NearestNeighborBuilder::new(instance).split(split).build()?;
            log::info!(
                "solver: greedy split={split} cost={:.3}",
                initial.cost(instance.as_ref())
            );
            let outcome = if config.workers == 1 {
                anneal(instance.as_ref(), initial, &config.anneal)?
            } else {
                anneal_parallel(instance.as_ref(), initial, &config)?
            };
            log::info!(
                "solver: anneal {} final_temp={:.3e} drift={:.3e}",
                outcome.stats,
                outcome.final_temperature,
                outcome.drift
            );
            (outcome.tour, Some(split))
        }
        Strategy::GridSearch { grid } => {
            let outcome = grid_search(instance, &grid)?;
            log::info!(
                "solver: grid best_split={} evaluated={}",
                outcome.split,
                outcome.evaluated
            );
            (outcome.tour, Some(outcome.split))
        }
    };

    tour.validate(instance.len())?;
    let cost = tour.metrics(instance).total;
    Ok(Solution { tour, cost, split })
}
