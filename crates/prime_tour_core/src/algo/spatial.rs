use std::collections::HashMap;

use kiddo::{KdTree, SquaredEuclidean};

use crate::{Error, Result};

/// Bit pattern of a point, with `-0.0` folded onto `0.0`.
type PointKey = [u64; 2];

fn point_key(point: [f64; 2]) -> PointKey {
    [(point[0] + 0.0).to_bits(), (point[1] + 0.0).to_bits()]
}

/// Nearest-neighbour index over the cities that have not been visited yet.
///
/// Wraps a kiddo KD-tree and tracks membership itself, so a duplicate insert
/// or a delete of a city that is not indexed surfaces as
/// [`Error::SpatialIndex`] instead of silently corrupting the tour.
///
/// The tree holds one entry per distinct point. Cities sharing a coordinate
/// live in that point's bucket, so any number of them can be indexed.
pub struct SpatialIndex {
    tree: KdTree<f64, 2>,
    buckets: Vec<Vec<usize>>,
    bucket_of: HashMap<PointKey, usize>,
    free: Vec<usize>,
    present: Vec<bool>,
    len: usize,
}

impl SpatialIndex {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tree: KdTree::with_capacity(capacity.max(1)),
            buckets: Vec::with_capacity(capacity),
            bucket_of: HashMap::with_capacity(capacity),
            free: Vec::new(),
            present: vec![false; capacity],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, city: usize) -> bool {
        self.present.get(city).copied().unwrap_or(false)
    }

    pub fn insert(&mut self, city: usize, point: [f64; 2]) -> Result<()> {
        if self.contains(city) {
            return Err(Error::spatial_index(format!(
                "city {city} inserted twice at ({},{})",
                point[0], point[1]
            )));
        }
        if city >= self.present.len() {
            self.present.resize(city + 1, false);
        }

        let key = point_key(point);
        match self.bucket_of.get(&key).copied() {
            Some(bucket) => self.buckets[bucket].push(city),
            None => {
                let bucket = match self.free.pop() {
                    Some(bucket) => {
                        self.buckets[bucket].push(city);
                        bucket
                    }
                    None => {
                        self.buckets.push(vec![city]);
                        self.buckets.len() - 1
                    }
                };
                self.tree.add(&point, bucket as u64);
                self.bucket_of.insert(key, bucket);
            }
        }
        self.present[city] = true;
        self.len += 1;
        Ok(())
    }

    /// City closest to `point`, with its Euclidean distance.
    pub fn nearest(&self, point: [f64; 2]) -> Result<(usize, f64)> {
        if self.is_empty() {
            return Err(Error::spatial_index(format!(
                "nearest query at ({},{}) against an empty index",
                point[0], point[1]
            )));
        }

        let nn = self.tree.nearest_one::<SquaredEuclidean>(&point);
        let bucket = nn.item as usize;
        let Some(&city) = self.buckets.get(bucket).and_then(|cities| cities.last()) else {
            return Err(Error::spatial_index(format!(
                "nearest query returned empty bucket {bucket}"
            )));
        };
        if !self.contains(city) {
            return Err(Error::spatial_index(format!(
                "nearest query returned city {city} which is not indexed"
            )));
        }
        Ok((city, nn.distance.sqrt()))
    }

    /// Removes `city`, which must be indexed at exactly `point`.
    pub fn remove(&mut self, city: usize, point: [f64; 2]) -> Result<()> {
        if !self.contains(city) {
            return Err(Error::spatial_index(format!(
                "city {city} is not indexed and cannot be removed"
            )));
        }

        let key = point_key(point);
        let slot = self.bucket_of.get(&key).and_then(|&bucket| {
            self.buckets[bucket]
                .iter()
                .position(|&c| c == city)
                .map(|pos| (bucket, pos))
        });
        let Some((bucket, pos)) = slot else {
            return Err(Error::spatial_index(format!(
                "city {city} missing from the tree at ({},{})",
                point[0], point[1]
            )));
        };

        if self.buckets[bucket].len() == 1 {
            if self.tree.remove(&point, bucket as u64) == 0 {
                return Err(Error::spatial_index(format!(
                    "bucket {bucket} missing from the tree at ({},{})",
                    point[0], point[1]
                )));
            }
            self.bucket_of.remove(&key);
            self.free.push(bucket);
        }
        self.buckets[bucket].swap_remove(pos);

        self.present[city] = false;
        self.len -= 1;
        Ok(())
    }
}
