use tracing::debug;

use super::{Tessellator, TessellatorConfig, check_box, count_generators};
use crate::boundary::{Boundary, clip_cells};
use crate::bounds::BoundingBox;
use crate::delaunay::{Delaunator, Triangulator};
use crate::errors::{Result, TessellationError, check_coordinates};
use crate::plc::Plc;
use crate::quant_tessellation::LabFrame;
use crate::tessellation::Tessellation;
use crate::unbounded::{UnboundedTessellation, build_unbounded};

/// Where the cells of a 2D tessellation end.
enum Domain<'a> {
    /// The region covered by the valid Delaunay triangles.
    Hull,
    Box(&'a BoundingBox<2>),
    Plc { points: &'a [f64], plc: &'a Plc<2> },
    Unbounded,
}

/// 2D Voronoi tessellator built on the dual of a Delaunay triangulation.
///
/// The unbounded diagram is assembled from the triangulation and then clipped
/// against the requested domain, with cell fragments cut off from their
/// generator handed to neighbouring cells.
pub struct DelaunayTessellator<T: Triangulator = Delaunator> {
    triangulator: T,
    config: TessellatorConfig,
}

impl Default for DelaunayTessellator {
    fn default() -> Self {
        Self::new()
    }
}

impl DelaunayTessellator {
    pub fn new() -> Self {
        Self { triangulator: Delaunator, config: TessellatorConfig::default() }
    }
}

impl<T: Triangulator> DelaunayTessellator<T> {
    /// A tessellator using a custom triangulation backend.
    pub fn with_triangulator(triangulator: T) -> Self {
        Self { triangulator, config: TessellatorConfig::default() }
    }

    pub fn with_config(mut self, config: TessellatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TessellatorConfig {
        &self.config
    }

    /// The unbounded diagram of `generators` in a frame enclosing them and
    /// `extra` points.
    pub fn unbounded(&self, generators: &[f64], extra: &[f64]) -> Result<UnboundedTessellation> {
        count_generators::<2>(generators)?;
        let mut bounds = BoundingBox::from_flat(generators).ok_or(TessellationError::NoGenerators)?;
        if let Some(more) = BoundingBox::from_flat(extra) {
            bounds = bounds.merged(&more);
        }
        let lab = LabFrame::enclosing(&bounds);
        build_unbounded(&self.triangulator, lab.normalize_flat(generators), lab, self.config.degeneracy)
    }

    fn run(&self, generators: &[f64], domain: Domain<'_>) -> Result<Tessellation<2>> {
        let extra: Vec<f64> = match &domain {
            Domain::Box(bounds) => {
                check_box(bounds)?;
                bounds.min.iter().chain(&bounds.max).copied().collect()
            }
            Domain::Plc { points, plc } => {
                let count = check_coordinates::<2>(points)?;
                plc.validate(count)?;
                if plc.is_empty() {
                    return Err(TessellationError::OpenBoundary { ring: 0 });
                }
                points.to_vec()
            }
            Domain::Hull | Domain::Unbounded => Vec::new(),
        };
        let unbounded = self.unbounded(generators, &extra)?;
        let mesh = &unbounded.mesh;
        let lab = mesh.lab;

        let boundary = match domain {
            Domain::Unbounded => return Ok(mesh.tessellation()),
            Domain::Hull => match &unbounded.delaunay {
                Some(delaunay) if !unbounded.is_collinear() => {
                    let rings: Vec<Vec<[f64; 2]>> = delaunay
                        .exterior_rings()
                        .iter()
                        .map(|ring| ring.iter().map(|&g| mesh.generators[g]).collect())
                        .collect();
                    Boundary::from_loops(&rings)
                }
                _ => Boundary::from_box(&BoundingBox::unit()),
            },
            Domain::Box(bounds) => {
                let low = lab.normalize(&bounds.min);
                let high = lab.normalize(&bounds.max);
                Boundary::from_box(&BoundingBox::new(low, high))
            }
            Domain::Plc { points, plc } => Boundary::from_plc(&lab.normalize_flat(points), plc)?,
        };
        if let Some(outside) = mesh.generators.iter().position(|g| !boundary.contains(g)) {
            return Err(TessellationError::GeneratorOutsideBoundary(outside));
        }

        let bounded = clip_cells(mesh, &boundary, self.config.clip_mode)?;
        debug!(
            "{}: {} cells, {} nodes, {} faces",
            self.name(),
            bounded.num_generators(),
            bounded.points.len(),
            bounded.faces.len()
        );
        Ok(bounded.tessellation())
    }
}

impl<T: Triangulator> Tessellator<2> for DelaunayTessellator<T> {
    fn name(&self) -> &str {
        "DelaunayTessellator"
    }

    fn handles_plcs(&self) -> bool {
        true
    }

    fn degeneracy(&self) -> f64 {
        self.config.degeneracy
    }

    fn tessellate(&self, generators: &[f64]) -> Result<Tessellation<2>> {
        self.run(generators, Domain::Hull)
    }

    fn tessellate_in_box(&self, generators: &[f64], bounds: &BoundingBox<2>) -> Result<Tessellation<2>> {
        self.run(generators, Domain::Box(bounds))
    }

    fn tessellate_with_plc(&self, generators: &[f64], plc_points: &[f64], plc: &Plc<2>) -> Result<Tessellation<2>> {
        self.run(generators, Domain::Plc { points: plc_points, plc })
    }

    fn tessellate_unbounded(&self, generators: &[f64]) -> Result<Tessellation<2>> {
        self.run(generators, Domain::Unbounded)
    }
}
