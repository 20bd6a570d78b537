//! Piecewise linear complexes describing tessellation boundaries.

use rustc_hash::FxHashMap;

use crate::errors::{Result, TessellationError};

/// Boundary connectivity over a separate array of PLC points.
///
/// In 2D every facet is a segment `[i, j]`; the outer facets chain into one
/// closed loop and every entry of `holes` is another closed loop cut out of
/// the domain. In 3D facets are polygons.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Plc<const D: usize> {
    pub facets: Vec<Vec<usize>>,
    pub holes: Vec<Vec<Vec<usize>>>,
}

impl<const D: usize> Plc<D> {
    pub fn new(facets: Vec<Vec<usize>>, holes: Vec<Vec<Vec<usize>>>) -> Self {
        Self { facets, holes }
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    /// Checks every facet index against the number of PLC points.
    pub fn validate(&self, num_points: usize) -> Result<()> {
        let facets = self.facets.iter().chain(self.holes.iter().flatten());
        for (facet, indices) in facets.enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i >= num_points) {
                return Err(TessellationError::PlcIndexOutOfRange { facet, index, count: num_points });
            }
        }
        Ok(())
    }
}

impl Plc<2> {
    /// A single closed loop over the points `0..n` in order.
    pub fn ring(n: usize) -> Self {
        Self::new((0..n).map(|i| vec![i, (i + 1) % n]).collect(), Vec::new())
    }

    /// Adds a hole loop over the points `first..first + n` in order.
    pub fn with_hole_ring(mut self, first: usize, n: usize) -> Self {
        self.holes.push((0..n).map(|i| vec![first + i, first + (i + 1) % n]).collect());
        self
    }

    /// Corners of the box `low .. high` in counter-clockwise order, together
    /// with the PLC over them.
    pub fn from_box(low: [f64; 2], high: [f64; 2]) -> (Vec<f64>, Self) {
        let points = vec![low[0], low[1], high[0], low[1], high[0], high[1], low[0], high[1]];
        (points, Self::ring(4))
    }

    /// Point loops of the outer boundary and of each hole, in the order the
    /// facets connect them. The orientation of each loop is whatever the
    /// facets give; callers orient them geometrically.
    pub fn loops(&self) -> Result<(Vec<usize>, Vec<Vec<usize>>)> {
        let outer = chain_segments(&self.facets, 0)?;
        let holes = self
            .holes
            .iter()
            .enumerate()
            .map(|(k, hole)| chain_segments(hole, k + 1))
            .collect::<Result<Vec<_>>>()?;
        Ok((outer, holes))
    }
}

/// Chains undirected segments into one closed loop of point indices.
fn chain_segments(segments: &[Vec<usize>], ring: usize) -> Result<Vec<usize>> {
    let open = || TessellationError::OpenBoundary { ring };
    if segments.len() < 3 || segments.iter().any(|s| s.len() != 2 || s[0] == s[1]) {
        return Err(open());
    }

    let mut touching: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for (k, s) in segments.iter().enumerate() {
        touching.entry(s[0]).or_default().push(k);
        touching.entry(s[1]).or_default().push(k);
    }

    let mut used = vec![false; segments.len()];
    let start = segments[0][0];
    let mut result = vec![start];
    used[0] = true;
    let mut node = segments[0][1];
    while node != start {
        result.push(node);
        let next = touching
            .get(&node)
            .and_then(|ks| ks.iter().copied().find(|&k| !used[k]))
            .ok_or_else(open)?;
        used[next] = true;
        let s = &segments[next];
        node = if s[0] == node { s[1] } else { s[0] };
    }
    if used.iter().any(|u| !u) {
        return Err(open());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_loops() {
        let plc = Plc::<2>::ring(4).with_hole_ring(4, 3);
        let (outer, holes) = plc.loops().unwrap();
        assert_eq!(outer, vec![0, 1, 2, 3]);
        assert_eq!(holes, vec![vec![4, 5, 6]]);
        assert_eq!(plc.validate(7), Ok(()));
    }

    #[test]
    fn test_unordered_facets_chain() {
        // Shuffled and partly reversed segments of the loop 0-1-2-3.
        let plc = Plc::<2>::new(vec![vec![0, 1], vec![3, 2], vec![3, 0], vec![1, 2]], Vec::new());
        assert_eq!(plc.loops().unwrap().0, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_open_loop_is_rejected() {
        let plc = Plc::<2>::new(vec![vec![0, 1], vec![1, 2], vec![2, 3]], Vec::new());
        assert_eq!(plc.loops(), Err(TessellationError::OpenBoundary { ring: 0 }));
        let plc = Plc::<2>::ring(4).with_hole_ring(4, 2);
        assert_eq!(plc.loops(), Err(TessellationError::OpenBoundary { ring: 1 }));
    }

    #[test]
    fn test_index_out_of_range() {
        let plc = Plc::<2>::ring(4);
        assert_eq!(
            plc.validate(3),
            Err(TessellationError::PlcIndexOutOfRange { facet: 2, index: 3, count: 3 })
        );
    }
}
