use std::fmt;

/// A city location in the plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct City {
    pub x: f64,
    pub y: f64,
}

impl City {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn coords(self) -> [f64; 2] {
        [self.x, self.y]
    }

    pub fn dist(self, rhs: &Self) -> f64 {
        let dx = self.x - rhs.x;
        let dy = self.y - rhs.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub(crate) fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut b1 = ryu::Buffer::new();
        let mut b2 = ryu::Buffer::new();
        write!(f, "{},{}", b1.format(self.x), b2.format(self.y))
    }
}

/// Immutable coordinate store. City `i` lives at `coords[2i], coords[2i+1]`;
/// city 0 is the depot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cities {
    coords: Vec<f64>,
}

impl Cities {
    pub fn new(cities: &[City]) -> Self {
        Self {
            coords: cities.iter().flat_map(|c| c.coords()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.coords.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn x(&self, idx: usize) -> f64 {
        self.coords[2 * idx]
    }

    pub fn y(&self, idx: usize) -> f64 {
        self.coords[2 * idx + 1]
    }

    pub fn get(&self, idx: usize) -> City {
        City::new(self.x(idx), self.y(idx))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = City> + '_ {
        self.coords.chunks_exact(2).map(|xy| City::new(xy[0], xy[1]))
    }
}

impl FromIterator<City> for Cities {
    fn from_iter<I: IntoIterator<Item = City>>(iter: I) -> Self {
        Self {
            coords: iter.into_iter().flat_map(City::coords).collect(),
        }
    }
}
