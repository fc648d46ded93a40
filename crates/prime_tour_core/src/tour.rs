use std::fmt;

use crate::{DistanceModel, Error, Instance, Result};

/// Index of the city every tour starts and ends at.
pub const DEPOT: usize = 0;

/// A closed visiting order: `DEPOT, c1, ..., c(n-1), DEPOT`.
///
/// Swapping two interior positions is the only in-place mutation, so a valid
/// tour stays valid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tour {
    cities: Vec<usize>,
}

impl Tour {
    /// Wraps `cities` as-is. Use [`Tour::validate`] before trusting it.
    pub fn new(cities: Vec<usize>) -> Self {
        Self { cities }
    }

    /// Builds `DEPOT, interior..., DEPOT`.
    pub fn closed(interior: impl IntoIterator<Item = usize>) -> Self {
        let mut cities = vec![DEPOT];
        cities.extend(interior);
        cities.push(DEPOT);
        Self { cities }
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.cities
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.cities
    }

    pub fn get(&self, position: usize) -> usize {
        self.cities[position]
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.cities.iter().copied()
    }

    /// Swaps two interior positions. Depot positions are never touched.
    pub fn swap(&mut self, a: usize, b: usize) {
        debug_assert!(a >= 1 && b >= 1 && a + 1 < self.len() && b + 1 < self.len());
        self.cities.swap(a, b);
    }

    pub fn cost(&self, model: &(impl DistanceModel + ?Sized)) -> f64 {
        model.path_cost(&self.cities)
    }

    /// Checks that this is a closed tour over exactly `n` cities.
    pub fn validate(&self, n: usize) -> Result<()> {
        if n == 0 {
            return Err(Error::invalid_tour("no cities to visit"));
        }
        if self.len() != n + 1 {
            return Err(Error::invalid_tour(format!(
                "expected {} entries for {n} cities, found {}",
                n + 1,
                self.len()
            )));
        }
        if self.cities[0] != DEPOT || self.cities[n] != DEPOT {
            return Err(Error::invalid_tour(format!(
                "tour must start and end at the depot, found {} .. {}",
                self.cities[0], self.cities[n]
            )));
        }

        let mut seen = vec![false; n];
        seen[DEPOT] = true;
        for (position, &city) in self.cities[1..n].iter().enumerate() {
            if city >= n {
                return Err(Error::invalid_tour(format!(
                    "city {city} at position {} is out of range",
                    position + 1
                )));
            }
            if seen[city] {
                return Err(Error::invalid_tour(format!(
                    "city {city} visited twice (position {})",
                    position + 1
                )));
            }
            seen[city] = true;
        }
        Ok(())
    }

    pub fn metrics(&self, instance: &Instance) -> TourMetrics {
        if self.len() < 2 {
            log::info!("metrics: n < 2 so there's nothing to report");
            return TourMetrics::default();
        }

        let mut metrics = TourMetrics::default();
        for (idx, pair) in self.cities.windows(2).enumerate() {
            let position = idx + 1;
            let plain = instance.plain_distance(pair[0], pair[1]);
            metrics.total += instance.edge_cost(pair[0], pair[1], position);
            metrics.longest = metrics.longest.max(plain);
            if instance.is_penalized(pair[0], position) {
                metrics.penalized += 1;
                metrics.penalty += instance.edge_cost(pair[0], pair[1], position) - plain;
            }
        }
        metrics.edges = self.len() - 1;
        metrics.average = metrics.total / metrics.edges as f64;

        log::info!("metrics: {metrics}");
        metrics
    }
}

impl From<Vec<usize>> for Tour {
    fn from(cities: Vec<usize>) -> Self {
        Self::new(cities)
    }
}

/// Summary of a tour's edges.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TourMetrics {
    pub edges: usize,
    pub total: f64,
    pub longest: f64,
    pub average: f64,
    /// Edges that paid the prime penalty.
    pub penalized: usize,
    /// Extra distance paid because of the penalty.
    pub penalty: f64,
}

impl fmt::Display for TourMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "edges={} total={:.2} longest={:.2} avg={:.4} penalized={} penalty={:.2}",
            self.edges, self.total, self.longest, self.average, self.penalized, self.penalty
        )
    }
}
