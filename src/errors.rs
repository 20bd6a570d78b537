//! Errors reported by the tessellators.

/// Everything that can abort a tessellation call.
///
/// Contract violations are reported before any mesh is produced; a
/// tessellator never hands back a partially built mesh together with an error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TessellationError {
    /// The generator array was empty.
    #[error("no generators were provided")]
    NoGenerators,
    /// A flat coordinate array is not a whole number of points.
    #[error("coordinate array of length {len} is not a multiple of the dimension {dim}")]
    CoordinateCount { len: usize, dim: usize },
    /// A generator or PLC coordinate is NaN or infinite.
    #[error("point {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
    /// Two generators quantize to the same position.
    #[error("generators {first} and {second} coincide within the degeneracy tolerance")]
    DuplicateGenerator { first: usize, second: usize },
    /// A user supplied box with `low > high` on some axis, or zero volume.
    #[error("bounding box {low:?} .. {high:?} is empty or inverted")]
    InvalidBox { low: Vec<f64>, high: Vec<f64> },
    /// The triangulator returned no triangles.
    #[error("the Delaunay triangulation produced no triangles")]
    EmptyTriangulation,
    /// A Delaunay edge is shared by more than two real triangles.
    #[error("Delaunay edge ({a}, {b}) is used by {count} triangles")]
    NonManifoldEdge { a: usize, b: usize, count: usize },
    /// The Voronoi edges of an unbounded cell do not form a chain with at most one break.
    #[error("cell {generator} has {loose_ends} loose chain ends; only a single break can be closed")]
    MultipleChainBreaks { generator: usize, loose_ends: usize },
    /// A PLC facet references a point that does not exist.
    #[error("PLC facet {facet} references point {index}, but only {count} points were given")]
    PlcIndexOutOfRange { facet: usize, index: usize, count: usize },
    /// The PLC facets do not chain into closed rings.
    #[error("PLC loop {ring} does not close")]
    OpenBoundary { ring: usize },
    /// No part of a generator's cell lies inside the boundary.
    #[error("generator {0} lies outside the boundary")]
    GeneratorOutsideBoundary(usize),
    /// The tessellator cannot clip against a PLC.
    #[error("{0} does not support PLC boundaries")]
    PlcUnsupported(String),
    /// The tessellator does not implement the requested operation.
    #[error("{name} does not support {operation}")]
    Unsupported { name: String, operation: &'static str },
    /// A per-cell mask does not have one entry per cell.
    #[error("cell mask has {len} entries for {cells} cells")]
    CellMaskLength { len: usize, cells: usize },
    /// The assembled mesh failed its topology checks.
    #[error("invalid tessellation topology: {0}")]
    Topology(String),
}

pub type Result<T> = std::result::Result<T, TessellationError>;

/// Checks that `coords` is a whole number of finite `D`-dimensional points.
pub(crate) fn check_coordinates<const D: usize>(coords: &[f64]) -> Result<usize> {
    if coords.len() % D != 0 {
        return Err(TessellationError::CoordinateCount { len: coords.len(), dim: D });
    }
    if let Some(pos) = coords.iter().position(|c| !c.is_finite()) {
        return Err(TessellationError::NonFiniteCoordinate { index: pos / D });
    }
    Ok(coords.len() / D)
}
