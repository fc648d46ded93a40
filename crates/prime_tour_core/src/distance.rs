use crate::{Cities, City, PrimeSet};

/// Every `PENALTY_PERIOD`-th edge is penalized when it leaves a non-prime city.
pub const PENALTY_PERIOD: usize = 10;
pub const PENALTY_FACTOR: f64 = 1.1;

/// Cost of travelling between two cities as the `position`-th edge of a tour.
///
/// Positions are 1-based: the edge leaving the depot is position 1.
pub trait DistanceModel {
    fn edge_cost(&self, from: usize, to: usize, position: usize) -> f64;

    /// Sum of [`DistanceModel::edge_cost`] over consecutive pairs of `path`.
    fn path_cost(&self, path: &[usize]) -> f64 {
        path.windows(2)
            .enumerate()
            .map(|(idx, pair)| self.edge_cost(pair[0], pair[1], idx + 1))
            .sum()
    }
}

/// The immutable problem context: city coordinates plus the primes below the
/// city count. Built once and shared by reference.
#[derive(Clone, Debug, Default)]
pub struct Instance {
    cities: Cities,
    primes: PrimeSet,
}

impl Instance {
    pub fn new(cities: Cities) -> Self {
        let primes = PrimeSet::up_to(cities.len());
        log::info!(
            "instance: cities={} primes={}",
            cities.len(),
            primes.len()
        );
        Self { cities, primes }
    }

    pub fn cities(&self) -> &Cities {
        &self.cities
    }

    pub fn primes(&self) -> &PrimeSet {
        &self.primes
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn city(&self, idx: usize) -> City {
        self.cities.get(idx)
    }

    pub fn plain_distance(&self, from: usize, to: usize) -> f64 {
        self.city(from).dist(&self.city(to))
    }

    pub fn is_penalized(&self, from: usize, position: usize) -> bool {
        position % PENALTY_PERIOD == 0 && !self.primes.contains(from)
    }
}

impl DistanceModel for Instance {
    fn edge_cost(&self, from: usize, to: usize, position: usize) -> f64 {
        let factor = if self.is_penalized(from, position) {
            PENALTY_FACTOR
        } else {
            1.0
        };
        self.plain_distance(from, to) * factor
    }
}
