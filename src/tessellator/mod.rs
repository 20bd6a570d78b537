//! Tessellator front-ends turning flat generator arrays into meshes.
//!
//! Every call derives its own frames from the input; a tessellator holds only
//! configuration, so one instance can serve concurrent calls.

use crate::boundary::ClipMode;
use crate::bounds::BoundingBox;
use crate::errors::{Result, TessellationError, check_coordinates};
use crate::plc::Plc;
use crate::tessellation::Tessellation;

pub mod d2;
pub mod d3;

pub use d2::DelaunayTessellator;
pub use d3::BoxTessellator3D;

/// Degeneracy floor used unless configured otherwise.
pub const DEFAULT_DEGENERACY: f64 = 1e-14;

/// Settings shared by the tessellators.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TessellatorConfig {
    /// Relative distance under which positions are considered equal.
    pub degeneracy: f64,
    /// Arithmetic used when clipping against a boundary.
    pub clip_mode: ClipMode,
}

impl Default for TessellatorConfig {
    fn default() -> Self {
        Self { degeneracy: DEFAULT_DEGENERACY, clip_mode: ClipMode::default() }
    }
}

impl TessellatorConfig {
    pub fn with_degeneracy(mut self, degeneracy: f64) -> Self {
        self.degeneracy = degeneracy;
        self
    }

    pub fn with_clip_mode(mut self, clip_mode: ClipMode) -> Self {
        self.clip_mode = clip_mode;
        self
    }
}

/// A Voronoi tessellator over `D`-dimensional generators.
///
/// Generators are passed as flat interleaved coordinates
/// `[x0, y0, (z0,) x1, y1, ...]`. The returned mesh is in the caller's
/// coordinates, with cell `i` belonging to generator `i`.
pub trait Tessellator<const D: usize> {
    /// Human readable name used in error messages.
    fn name(&self) -> &str;

    /// Whether [`tessellate_with_plc`](Self::tessellate_with_plc) is supported.
    fn handles_plcs(&self) -> bool {
        false
    }

    fn degeneracy(&self) -> f64;

    /// Tessellation bounded by the generators themselves.
    fn tessellate(&self, generators: &[f64]) -> Result<Tessellation<D>>;

    /// Tessellation clipped to `bounds`, which must contain every generator.
    fn tessellate_in_box(&self, generators: &[f64], bounds: &BoundingBox<D>) -> Result<Tessellation<D>>;

    /// Tessellation clipped to the domain described by a PLC over `plc_points`.
    fn tessellate_with_plc(&self, generators: &[f64], plc_points: &[f64], plc: &Plc<D>) -> Result<Tessellation<D>> {
        let _ = (generators, plc_points, plc);
        Err(TessellationError::PlcUnsupported(self.name().to_string()))
    }

    /// Tessellation without clipping; outermost cells end on infinite elements.
    fn tessellate_unbounded(&self, generators: &[f64]) -> Result<Tessellation<D>> {
        let _ = generators;
        Err(TessellationError::Unsupported { name: self.name().to_string(), operation: "unbounded tessellation" })
    }
}

/// Number of generators in a flat array, rejecting empty or malformed input.
pub(crate) fn count_generators<const D: usize>(generators: &[f64]) -> Result<usize> {
    match check_coordinates::<D>(generators)? {
        0 => Err(TessellationError::NoGenerators),
        n => Ok(n),
    }
}

/// Rejects inverted or flat boxes.
pub(crate) fn check_box<const D: usize>(bounds: &BoundingBox<D>) -> Result<()> {
    let finite = bounds.min.iter().chain(&bounds.max).all(|c| c.is_finite());
    if finite && (0..D).all(|j| bounds.max[j] > bounds.min[j]) {
        Ok(())
    } else {
        Err(TessellationError::InvalidBox { low: bounds.min.to_vec(), high: bounds.max.to_vec() })
    }
}
