/// Generic axis-aligned bounding box for N-dimensional space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox<const D: usize> {
    pub min: [f64; D],
    pub max: [f64; D],
}

impl<const D: usize> BoundingBox<D> {
    pub fn new(min: [f64; D], max: [f64; D]) -> Self {
        Self { min, max }
    }

    /// The unit box `[0, 1]^D`.
    pub fn unit() -> Self {
        Self { min: [0.0; D], max: [1.0; D] }
    }

    /// Smallest box enclosing a flat `[x, y, (z), x, y, (z), ...]` coordinate array.
    ///
    /// Returns `None` for an empty array.
    pub fn from_flat(coords: &[f64]) -> Option<Self> {
        if coords.len() < D {
            return None;
        }
        let mut bounds = Self { min: [f64::MAX; D], max: [f64::MIN; D] };
        for point in coords.chunks_exact(D) {
            for j in 0..D {
                bounds.min[j] = bounds.min[j].min(point[j]);
                bounds.max[j] = bounds.max[j].max(point[j]);
            }
        }
        Some(bounds)
    }

    /// Grows the box so it contains `point`.
    pub fn include(&mut self, point: &[f64; D]) {
        for j in 0..D {
            self.min[j] = self.min[j].min(point[j]);
            self.max[j] = self.max[j].max(point[j]);
        }
    }

    /// Union of two boxes.
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = *self;
        result.include(&other.min);
        result.include(&other.max);
        result
    }

    pub fn extent(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    pub fn max_extent(&self) -> f64 {
        (0..D).map(|j| self.extent(j)).fold(0.0, f64::max)
    }

    pub fn center(&self) -> [f64; D] {
        std::array::from_fn(|j| 0.5 * (self.min[j] + self.max[j]))
    }

    pub fn diagonal(&self) -> f64 {
        (0..D).map(|j| self.extent(j) * self.extent(j)).sum::<f64>().sqrt()
    }

    /// `true` if `min <= max` on every axis.
    pub fn is_ordered(&self) -> bool {
        (0..D).all(|j| self.min[j] <= self.max[j])
    }

    pub fn contains(&self, point: &[f64; D]) -> bool {
        (0..D).all(|j| point[j] >= self.min[j] && point[j] <= self.max[j])
    }

    /// `true` if `other` lies completely inside this box.
    pub fn contains_box(&self, other: &Self) -> bool {
        self.contains(&other.min) && self.contains(&other.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flat() {
        let b = BoundingBox::<2>::from_flat(&[0.0, 1.0, 2.0, -1.0, 1.0, 3.0]).unwrap();
        assert_eq!(b.min, [0.0, -1.0]);
        assert_eq!(b.max, [2.0, 3.0]);
        assert_eq!(b.max_extent(), 4.0);
        assert_eq!(b.center(), [1.0, 1.0]);
        assert!(BoundingBox::<2>::from_flat(&[]).is_none());
    }

    #[test]
    fn test_merged_contains() {
        let a = BoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = BoundingBox::new([-1.0, 0.5, 0.5], [0.5, 2.0, 0.6]);
        let m = a.merged(&b);
        assert!(m.contains_box(&a));
        assert!(m.contains_box(&b));
        assert!(!a.contains_box(&m));
        assert!((BoundingBox::<3>::unit().diagonal() - 3.0f64.sqrt()).abs() < 1e-12);
    }
}
