use rand::{SeedableRng, rngs::SmallRng, seq::SliceRandom};

use crate::{Cities, DEPOT, Error, Instance, Result, Tour, algo::spatial::SpatialIndex};

const ERR_NO_CITIES: &str = "Need at least one city (the depot) to build a tour";

/// Seeded shuffle of every non-depot city.
pub fn random_tour(instance: &Instance, seed: u64) -> Result<Tour> {
    if instance.is_empty() {
        return Err(Error::invalid_input(ERR_NO_CITIES));
    }

    let mut interior: Vec<usize> = (1..instance.len()).collect();
    let mut rng = SmallRng::seed_from_u64(seed);
    interior.shuffle(&mut rng);

    log::debug!("construct.random: n={} seed={seed}", instance.len());
    Ok(Tour::closed(interior))
}

/// Greedy nearest-neighbour construction, optionally growing from both ends.
///
/// With `split == 0` the tour is grown from the depot only. With `split = k`
/// the first `k` cities extend the front path and every later city extends a
/// second path that also starts at the depot; the back path is reversed onto
/// the end of the front path.
#[derive(Clone, Copy, Debug)]
pub struct NearestNeighborBuilder<'a> {
    instance: &'a Instance,
    split: usize,
}

impl<'a> NearestNeighborBuilder<'a> {
    pub fn new(instance: &'a Instance) -> Self {
        Self { instance, split: 0 }
    }

    pub fn split(mut self, split: usize) -> Self {
        self.split = split;
        self
    }

    pub fn build(&self) -> Result<Tour> {
        let n = self.instance.len();
        if n == 0 {
            return Err(Error::invalid_input(ERR_NO_CITIES));
        }

        let cities = self.instance.cities();
        let mut index = SpatialIndex::with_capacity(n);
        for city in 1..n {
            index.insert(city, cities.get(city).coords())?;
        }

        let depot = cities.get(DEPOT).coords();
        let mut front = Walk::new(depot, n);
        let mut back = Walk::new(depot, n.saturating_sub(self.split));

        let mut placed = 0;
        while !index.is_empty() {
            if self.split == 0 || placed < self.split {
                front.extend(&mut index, cities)?;
            } else {
                back.extend(&mut index, cities)?;
            }
            placed += 1;
        }

        log::trace!(
            "construct.nn: n={n} split={} front={} back={}",
            self.split,
            front.path.len(),
            back.path.len()
        );

        Ok(Tour::closed(
            front.path.into_iter().chain(back.path.into_iter().rev()),
        ))
    }
}

/// One growing end of the tour.
struct Walk {
    cursor: [f64; 2],
    path: Vec<usize>,
}

impl Walk {
    fn new(start: [f64; 2], capacity: usize) -> Self {
        Self {
            cursor: start,
            path: Vec::with_capacity(capacity),
        }
    }

    fn extend(&mut self, index: &mut SpatialIndex, cities: &Cities) -> Result<()> {
        let (city, _) = index.nearest(self.cursor)?;
        let point = cities.get(city).coords();
        index.remove(city, point)?;
        self.path.push(city);
        self.cursor = point;
        Ok(())
    }
}
