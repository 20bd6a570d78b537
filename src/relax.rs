//! Lloyd relaxation towards a centroidal Voronoi tessellation.

use rayon::prelude::*;
use tracing::debug;

use crate::errors::Result;
use crate::plc::Plc;
use crate::tessellation::Tessellation;
use crate::tessellator::Tessellator;

/// Fraction of the way each generator moves towards its cell centroid.
pub const LLOYD_DAMPING: f64 = 0.5;

/// Moves every generator half-way to the centroid of its cell in `mesh`.
///
/// Cells without area keep their generator in place.
pub fn lloyd_step(mesh: &Tessellation<2>, generators: &[f64]) -> Vec<f64> {
    generators
        .par_chunks_exact(2)
        .enumerate()
        .flat_map_iter(|(cell, g)| {
            if cell >= mesh.num_cells() {
                return [g[0], g[1]];
            }
            match mesh.cell_centroid_and_area(cell) {
                (_, area) if area.abs() <= f64::EPSILON => [g[0], g[1]],
                (c, _) => [g[0] + LLOYD_DAMPING * (c[0] - g[0]), g[1] + LLOYD_DAMPING * (c[1] - g[1])],
            }
        })
        .collect()
}

/// Runs `iterations` rounds of tessellation followed by a Lloyd step and
/// returns the relaxed generators together with their final tessellation.
///
/// An empty `plc` bounds every round by the hull of the current generators.
pub fn relax<T: Tessellator<2> + ?Sized>(
    tessellator: &T,
    generators: &[f64],
    plc_points: &[f64],
    plc: &Plc<2>,
    iterations: usize,
) -> Result<(Vec<f64>, Tessellation<2>)> {
    let tessellate = |points: &[f64]| {
        if plc.is_empty() {
            tessellator.tessellate(points)
        } else {
            tessellator.tessellate_with_plc(points, plc_points, plc)
        }
    };
    let mut current = generators.to_vec();
    let mut mesh = tessellate(&current)?;
    for iteration in 0..iterations {
        current = lloyd_step(&mesh, &current);
        mesh = tessellate(&current)?;
        debug!("lloyd iteration {iteration}: {} cells", mesh.num_cells());
    }
    Ok((current, mesh))
}
