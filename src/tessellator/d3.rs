use rayon::prelude::*;
use tracing::debug;

use super::{DEFAULT_DEGENERACY, Tessellator, check_box, count_generators};
use crate::algorithm::SpatialAlgorithm;
use crate::algorithm::d3_grid::AlgorithmGrid3D;
use crate::bounds::BoundingBox;
use crate::errors::{Result, TessellationError};
use crate::hasher::Hasher;
use crate::polyhedron::{Polyhedron, PolyhedronScratch};
use crate::quant_tessellation::{LabFrame, QuantTessellation, Validate};
use crate::tessellation::Tessellation;

/// 3D Voronoi tessellator clipping each cell out of a box.
///
/// Every cell starts as the box and is cut by the bisector planes of its
/// neighbours, visited through a uniform grid in order of distance until the
/// cell is provably complete. Cells are computed in parallel and then merged
/// into one quantized mesh, so neighbouring cells share their faces.
///
/// The grid resolution (`nx`, `ny`, `nz`) only affects speed; the cube root
/// of the number of generators per axis is a good starting point.
#[derive(Clone, Debug)]
pub struct BoxTessellator3D {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub degeneracy: f64,
}

impl Default for BoxTessellator3D {
    fn default() -> Self {
        Self::new(8, 8, 8, DEFAULT_DEGENERACY)
    }
}

impl BoxTessellator3D {
    pub fn new(nx: usize, ny: usize, nz: usize, degeneracy: f64) -> Self {
        Self { nx, ny, nz, degeneracy }
    }

    /// Grid resolution suited to `count` generators.
    pub fn for_count(count: usize) -> Self {
        let n = (count as f64).cbrt().ceil().max(1.0) as usize;
        Self::new(n, n, n, DEFAULT_DEGENERACY)
    }

    /// Convex cells of normalized `generators` inside `bounds`.
    fn cells(&self, generators: &[[f64; 3]], bounds: &BoundingBox<3>) -> Vec<Polyhedron> {
        let flat: Vec<f64> = generators.iter().flatten().copied().collect();
        let mut grid = AlgorithmGrid3D::new(self.nx, self.ny, self.nz, bounds);
        grid.set_generators(&flat, bounds);

        (0..generators.len())
            .into_par_iter()
            .map_init(PolyhedronScratch::default, |scratch, i| {
                let g = generators[i];
                let mut cell = Polyhedron::from_box(bounds);
                let mut radius_sq = cell.max_radius_sq(&g);
                grid.visit_neighbors(&flat, i, g, &mut radius_sq, |_, other, current| {
                    let d = [other[0] - g[0], other[1] - g[1], other[2] - g[2]];
                    if d[0] * d[0] + d[1] * d[1] + d[2] * d[2] > 4.0 * current {
                        return current;
                    }
                    let mid = [g[0] + 0.5 * d[0], g[1] + 0.5 * d[1], g[2] + 0.5 * d[2]];
                    match cell.clip(&mid, &d, scratch, Some(&g)) {
                        (true, shrunk) => shrunk,
                        (false, _) => current,
                    }
                });
                cell
            })
            .collect()
    }

    fn run(&self, generators: &[f64], bounds: &BoundingBox<3>) -> Result<Tessellation<3>> {
        count_generators::<3>(generators)?;
        check_box(bounds)?;
        if let Some(outside) = generators.chunks_exact(3).position(|p| !bounds.contains(&[p[0], p[1], p[2]])) {
            return Err(TessellationError::GeneratorOutsideBoundary(outside));
        }

        let lab = LabFrame::enclosing(bounds);
        let points = lab.normalize_flat(generators);
        let inner = BoundingBox::new(lab.normalize(&bounds.min), lab.normalize(&bounds.max));
        let hasher = Hasher::bounded(inner, self.degeneracy);
        hasher.check_duplicates(&points)?;

        let cells = self.cells(&points, &inner);
        if let Some(empty) = cells.iter().position(Polyhedron::is_empty) {
            return Err(TessellationError::Topology(format!("cell {empty} was clipped away")));
        }
        let mesh = QuantTessellation::from_polyhedra(points, lab, hasher, &cells);
        mesh.validate()?;
        debug!(
            "{}: {} cells, {} nodes, {} faces",
            self.name(),
            mesh.num_generators(),
            mesh.points.len(),
            mesh.faces.len()
        );
        Ok(mesh.tessellation())
    }
}

impl Tessellator<3> for BoxTessellator3D {
    fn name(&self) -> &str {
        "BoxTessellator3D"
    }

    fn degeneracy(&self) -> f64 {
        self.degeneracy
    }

    fn tessellate(&self, generators: &[f64]) -> Result<Tessellation<3>> {
        count_generators::<3>(generators)?;
        let bounds = BoundingBox::from_flat(generators).ok_or(TessellationError::NoGenerators)?;
        self.run(generators, &bounds)
    }

    fn tessellate_in_box(&self, generators: &[f64], bounds: &BoundingBox<3>) -> Result<Tessellation<3>> {
        self.run(generators, bounds)
    }
}
