//! Quantization of positions into packed integer hashes.
//!
//! A [`PointHash`] packs one unsigned lattice coordinate per axis into a `u64`,
//! `63 / D` bits each, leaving the top bit to flag positions that were quantized
//! in the coarse *outer* frame instead of the fine *inner* frame. Two positions
//! hash equal iff they round to the same lattice point at the applicable
//! resolution, which is what merges nearly coincident Voronoi vertices.

use rustc_hash::FxHashMap;

use crate::bounds::BoundingBox;
use crate::errors::{Result, TessellationError};

/// Quantized position, see the module documentation for the bit layout.
pub type PointHash = u64;

/// Bit set on hashes quantized in the outer frame.
pub const OUTER_FLAG: PointHash = 1 << 63;

/// Quantization frame: fine inner box, coarse outer box and the degeneracy floor.
///
/// Hashing is a pure function of these values; two meshes built with equal
/// hashers agree on every node they share.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hasher<const D: usize> {
    pub inner: BoundingBox<D>,
    pub outer: BoundingBox<D>,
    pub degeneracy: f64,
}

impl<const D: usize> Hasher<D> {
    /// Bits available per axis.
    pub const BITS: u32 = (63 / D) as u32;
    /// Largest lattice coordinate per axis.
    pub const COORD_MAX: u64 = (1u64 << Self::BITS) - 1;

    pub fn new(inner: BoundingBox<D>, outer: BoundingBox<D>, degeneracy: f64) -> Self {
        debug_assert!(inner.is_ordered() && outer.is_ordered());
        debug_assert!(outer.contains_box(&inner));
        Self { inner, outer, degeneracy }
    }

    /// A frame without a separate sky region: the outer box equals the inner box.
    pub fn bounded(inner: BoundingBox<D>, degeneracy: f64) -> Self {
        Self::new(inner, inner, degeneracy)
    }

    fn step(&self, frame: &BoundingBox<D>) -> f64 {
        let step = frame.max_extent() / Self::COORD_MAX as f64;
        if step > self.degeneracy { step } else { self.degeneracy }
    }

    /// Lattice spacing inside the inner box.
    pub fn inner_step(&self) -> f64 {
        self.step(&self.inner)
    }

    /// Lattice spacing in the outer frame.
    pub fn outer_step(&self) -> f64 {
        self.step(&self.outer)
    }

    /// Unclamped lattice coordinates of `position` in the inner frame.
    pub fn int_point(&self, position: &[f64; D]) -> [i64; D] {
        let dx = self.inner_step();
        std::array::from_fn(|j| ((position[j] - self.inner.min[j]) / dx + 0.5).floor() as i64)
    }

    /// Position of an inner lattice point.
    pub fn real_point(&self, point: &[i64; D]) -> [f64; D] {
        let dx = self.inner_step();
        std::array::from_fn(|j| self.inner.min[j] + point[j] as f64 * dx)
    }

    /// Hash of an inner lattice point, falling back to the outer frame when
    /// the point lies beyond the inner lattice.
    pub fn hash_ints(&self, point: &[i64; D]) -> PointHash {
        if point.iter().all(|&q| q >= 0 && q as u64 <= Self::COORD_MAX) {
            return Self::pack(&point.map(|q| q as u64), false);
        }
        self.hash_outer(&self.real_point(point))
    }

    /// Quantizes a position. Positions inside the inner box (to within half a
    /// step) use the inner resolution; everything else is clamped to the outer
    /// frame and flagged with [`OUTER_FLAG`].
    pub fn hash_position(&self, position: &[f64; D]) -> PointHash {
        let fine = self.int_point(position);
        if fine.iter().all(|&q| q >= 0 && q as u64 <= Self::COORD_MAX) {
            return Self::pack(&fine.map(|q| q as u64), false);
        }
        self.hash_outer(position)
    }

    fn hash_outer(&self, position: &[f64; D]) -> PointHash {
        let dx = self.outer_step();
        let coarse: [u64; D] = std::array::from_fn(|j| {
            let q = ((position[j] - self.outer.min[j]) / dx + 0.5).floor();
            q.clamp(0.0, Self::COORD_MAX as f64) as u64
        });
        Self::pack(&coarse, true)
    }

    /// Lattice position of a hash; loses at most half a step per axis.
    pub fn unhash_position(&self, hash: PointHash) -> [f64; D] {
        let coords = Self::coords(hash);
        let (frame, dx) = if is_outer(hash) {
            (&self.outer, self.outer_step())
        } else {
            (&self.inner, self.inner_step())
        };
        std::array::from_fn(|j| frame.min[j] + coords[j] as f64 * dx)
    }

    /// Rejects positions that quantize onto the same lattice point.
    pub fn check_duplicates(&self, positions: &[[f64; D]]) -> Result<()> {
        let mut seen: FxHashMap<PointHash, usize> = FxHashMap::default();
        for (i, p) in positions.iter().enumerate() {
            if let Some(first) = seen.insert(self.hash_position(p), i) {
                return Err(TessellationError::DuplicateGenerator { first, second: i });
            }
        }
        Ok(())
    }

    /// Packs lattice coordinates into a hash.
    pub fn pack(coords: &[u64; D], outer: bool) -> PointHash {
        let mut hash: PointHash = if outer { OUTER_FLAG } else { 0 };
        for (j, &q) in coords.iter().enumerate() {
            debug_assert!(q <= Self::COORD_MAX);
            hash |= q << (Self::BITS * j as u32);
        }
        hash
    }

    /// Unpacks the lattice coordinates of a hash.
    pub fn coords(hash: PointHash) -> [u64; D] {
        std::array::from_fn(|j| (hash >> (Self::BITS * j as u32)) & Self::COORD_MAX)
    }
}

/// `true` if the hash was quantized in the outer frame.
pub fn is_outer(hash: PointHash) -> bool {
    hash & OUTER_FLAG != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn frame2() -> Hasher<2> {
        Hasher::new(
            BoundingBox::unit(),
            BoundingBox::new([-4.0, -4.0], [5.0, 5.0]),
            1e-14,
        )
    }

    #[test]
    fn test_bit_layout() {
        assert_eq!(Hasher::<2>::BITS, 31);
        assert_eq!(Hasher::<3>::BITS, 21);
        let h = Hasher::<3>::pack(&[1, 2, 3], true);
        assert!(is_outer(h));
        assert_eq!(Hasher::<3>::coords(h), [1, 2, 3]);
    }

    #[test]
    fn test_inner_and_outer_regions() {
        let hasher = frame2();
        let inside = hasher.hash_position(&[0.25, 0.75]);
        let outside = hasher.hash_position(&[2.0, -3.0]);
        assert!(!is_outer(inside));
        assert!(is_outer(outside));
        assert!(hasher.outer_step() > hasher.inner_step());
    }

    #[test]
    fn test_nearby_positions_merge() {
        let hasher = frame2();
        let a = hasher.hash_position(&[0.5, 0.5]);
        let b = hasher.hash_position(&[0.5 + 1e-12, 0.5 - 1e-12]);
        let c = hasher.hash_position(&[0.5 + 1e-6, 0.5]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_degeneracy_floor() {
        let hasher = Hasher::<2>::bounded(BoundingBox::unit(), 1e-3);
        assert_eq!(hasher.inner_step(), 1e-3);
        assert_eq!(hasher.hash_position(&[0.1, 0.1]), hasher.hash_position(&[0.1004, 0.0996]));
    }

    #[test]
    fn test_clamps_beyond_outer() {
        let hasher = frame2();
        let far = hasher.unhash_position(hasher.hash_position(&[1e9, -1e9]));
        assert_abs_diff_eq!(far[0], 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(far[1], -4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_int_point_lattice() {
        let hasher = Hasher::<2>::bounded(BoundingBox::unit(), 0.25);
        assert_eq!(hasher.int_point(&[0.5, -0.5]), [2, -2]);
        assert_eq!(hasher.real_point(&[3, 5]), [0.75, 1.25]);
        assert_eq!(hasher.hash_ints(&[3, 2]), hasher.hash_position(&[0.75, 0.5]));
        assert!(is_outer(hasher.hash_ints(&[-1, 2])));
    }

    #[test]
    fn test_check_duplicates() {
        let hasher = Hasher::<2>::bounded(BoundingBox::unit(), 1e-14);
        assert_eq!(hasher.check_duplicates(&[[0.1, 0.2], [0.3, 0.4]]), Ok(()));
        assert_eq!(
            hasher.check_duplicates(&[[0.1, 0.2], [0.3, 0.4], [0.1, 0.2 + 1e-12]]),
            Err(TessellationError::DuplicateGenerator { first: 0, second: 2 })
        );
    }

    proptest! {
        #[test]
        fn prop_inner_round_trip(x in 0.0f64..=1.0, y in 0.0f64..=1.0) {
            let hasher = frame2();
            let p = hasher.unhash_position(hasher.hash_position(&[x, y]));
            let tol = 0.5 * hasher.inner_step() + 1e-15;
            prop_assert!((p[0] - x).abs() <= tol && (p[1] - y).abs() <= tol);
        }

        #[test]
        fn prop_outer_round_trip(x in -4.0f64..=5.0, y in 1.5f64..=5.0) {
            let hasher = frame2();
            let h = hasher.hash_position(&[x, y]);
            prop_assert!(is_outer(h));
            let p = hasher.unhash_position(h);
            let tol = 0.5 * hasher.outer_step() + 1e-14;
            prop_assert!((p[0] - x).abs() <= tol && (p[1] - y).abs() <= tol);
        }

        #[test]
        fn prop_rehash_is_stable(x in 0.0f64..=1.0, y in 0.0f64..=1.0, z in 0.0f64..=1.0) {
            let hasher = Hasher::<3>::bounded(BoundingBox::unit(), 1e-14);
            let h = hasher.hash_position(&[x, y, z]);
            prop_assert_eq!(hasher.hash_position(&hasher.unhash_position(h)), h);
        }
    }
}
