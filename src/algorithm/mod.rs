use crate::bounds::BoundingBox;

pub mod d3_grid;

/// Trait defining a spatial acceleration structure for generator lookups.
///
/// The clip-based tessellators only need to find candidate neighbours of a
/// generator in order of increasing distance, so the index can stop searching
/// once the cell is provably closed.
pub trait SpatialAlgorithm<const D: usize>: Send + Sync {
    /// Rebuild the index with new generators.
    fn set_generators(&mut self, generators: &[f64], bounds: &BoundingBox<D>);

    /// Visit potential neighbors for a given generator.
    ///
    /// # Arguments
    /// * `generators` - The full flat list of generators.
    /// * `index` - The index of the generator we are processing.
    /// * `pos` - The position of the generator.
    /// * `max_dist_sq` - The current squared radius of the cell around the generator.
    ///                   Bins farther than twice this radius are skipped.
    /// * `visitor` - Called with each candidate's index, position and the current
    ///               radius; returns the (possibly shrunk) radius.
    fn visit_neighbors<F>(&self, generators: &[f64], index: usize, pos: [f64; D], max_dist_sq: &mut f64, visitor: F)
    where
        F: FnMut(usize, [f64; D], f64) -> f64;
}
