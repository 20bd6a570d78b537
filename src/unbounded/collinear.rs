//! Closed form Voronoi diagram of generators on one line.
//!
//! Sorted along the line, consecutive generators are separated by parallel
//! bisectors that run from sky to sky. The two outermost cells are caps
//! bounded by one bisector and one arc, every other cell is a strip bounded by
//! two bisectors and two arcs.

use std::f64::consts::FRAC_PI_3;

use tracing::{debug, trace};

use super::{Sky, UnboundedTessellation, push_cell};
use crate::bounds::BoundingBox;
use crate::errors::Result;
use crate::geometry::{circle_point, distance_sq};
use crate::hasher::Hasher;
use crate::quant_tessellation::{LabFrame, QuantTessellation, Validate};

pub(super) fn build(generators: Vec<[f64; 2]>, lab: LabFrame<2>, degeneracy: f64) -> Result<UnboundedTessellation> {
    let inner = BoundingBox::unit();
    let mut bounds = inner;
    generators.iter().for_each(|p| bounds.include(p));
    let sky = Sky::around(&bounds);
    let hasher = Hasher::new(inner, sky.outer_box().merged(&inner), degeneracy);
    let mut mesh = QuantTessellation::new(generators, lab, hasher);

    let n = mesh.num_generators();
    if n == 1 {
        let corners: Vec<(usize, bool)> = (0..6)
            .map(|k| (mesh.add_new_node_at(&circle_point(&sky.center, sky.radius, k as f64 * FRAC_PI_3)), true))
            .collect();
        push_cell(&mut mesh, 0, &sky, &corners);
        mesh.sort_inf_markers();
        mesh.assert_valid();
        return Ok(UnboundedTessellation { mesh, sky, delaunay: None });
    }

    // Line direction from the first generator to the one furthest from it.
    let p0 = mesh.generators[0];
    let p1 = mesh
        .generators
        .iter()
        .copied()
        .max_by(|a, b| distance_sq(&p0, a).total_cmp(&distance_sq(&p0, b)))
        .unwrap_or(p0);
    let length = distance_sq(&p0, &p1).sqrt();
    let u = [(p1[0] - p0[0]) / length, (p1[1] - p0[1]) / length];
    let v = [-u[1], u[0]];

    let along = |p: &[f64; 2]| (p[0] - p0[0]) * u[0] + (p[1] - p0[1]) * u[1];
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| along(&mesh.generators[i]).total_cmp(&along(&mesh.generators[j])));
    trace!("collinear order {order:?}");

    // Bisector k separates order[k] and order[k + 1]; a on the +v side, b on -v.
    let bisectors: Vec<(usize, usize)> = (0..n - 1)
        .map(|k| {
            let (p, q) = (mesh.generators[order[k]], mesh.generators[order[k + 1]]);
            let mid = [0.5 * (p[0] + q[0]), 0.5 * (p[1] + q[1])];
            let a = sky.exit(&mid, &v);
            let b = sky.exit(&mid, &[-v[0], -v[1]]);
            let (a, b) = (mesh.add_new_node_at(&a), mesh.add_new_node_at(&b));
            mesh.mark_inf_node(a);
            mesh.mark_inf_node(b);
            (a, b)
        })
        .collect();

    for (k, &cell) in order.iter().enumerate() {
        let corners = if k == 0 {
            let (a, b) = bisectors[0];
            vec![(b, false), (a, true)]
        } else if k == n - 1 {
            let (a, b) = bisectors[n - 2];
            vec![(a, false), (b, true)]
        } else {
            let (a_low, b_low) = bisectors[k - 1];
            let (a_high, b_high) = bisectors[k];
            vec![(a_low, false), (b_low, true), (b_high, false), (a_high, true)]
        };
        push_cell(&mut mesh, cell, &sky, &corners);
    }
    mesh.sort_inf_markers();

    debug!("collinear: {} cells, {} nodes, {} faces", n, mesh.points.len(), mesh.faces.len());
    trace!("collinear tessellation:\n{mesh}");
    mesh.assert_valid();
    Ok(UnboundedTessellation { mesh, sky, delaunay: None })
}
