//! Closed tours through a depot under a prime-position edge penalty.
//!
//! Every 10th edge of a tour costs 10% more unless it leaves a prime-numbered
//! city. Tours are built greedily from a k-d tree and improved by simulated
//! annealing over adjacent swaps, optionally on partitioned blocks in parallel.

pub mod algo;
mod city;
mod distance;
mod error;
pub mod io;
pub mod logging;
mod primes;
pub mod solver;
mod tour;
pub mod utils;

pub use algo::anneal::{AnnealConfig, AnnealOutcome, anneal};
pub use algo::construct::{NearestNeighborBuilder, random_tour};
pub use algo::grid::{GridConfig, GridOutcome, grid_search};
pub use algo::parallel::{ParallelConfig, anneal_parallel};
pub use city::{Cities, City};
pub use distance::{DistanceModel, Instance, PENALTY_FACTOR, PENALTY_PERIOD};
pub use error::{Error, Result};
pub use io::{input::read_cities, options::SolverOptions, output::write_tour};
pub use primes::PrimeSet;
pub use solver::{Solution, Strategy, solve};
pub use tour::{DEPOT, Tour, TourMetrics};
