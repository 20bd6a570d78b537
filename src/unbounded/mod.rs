//! Unbounded 2D Voronoi construction.
//!
//! Voronoi vertices are the circumcentres of the valid Delaunay triangles.
//! Cells of hull generators are open; their rays are cut where they leave a
//! bounding *sky* circle enclosing every finite vertex and the inner box, and
//! the remaining gap is closed along that circle. Elements created on the
//! circle are recorded as infinite.

use std::f64::consts::{FRAC_PI_3, TAU};

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::bounds::BoundingBox;
use crate::delaunay::{DelaunayConnectivity, Triangulator};
use crate::errors::{Result, TessellationError};
use crate::geometry::{circle_point, distance_sq, orient2d, polar_angle, ray_circle_exit};
use crate::hasher::Hasher;
use crate::quant_tessellation::{LabFrame, QuantTessellation, Validate};

mod collinear;

/// Margin between the sky circle and the outer quantization box.
const SKY_MARGIN: f64 = 1.01;

/// Relative slack so an arc of exactly 60 degrees stays one piece.
const ARC_SLACK: f64 = 1e-9;

/// The circle standing in for infinity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sky {
    pub center: [f64; 2],
    pub radius: f64,
}

impl Sky {
    /// The circle around `bounds` with 1.5 times its diagonal as radius.
    pub fn around(bounds: &BoundingBox<2>) -> Self {
        Self { center: bounds.center(), radius: 1.5 * bounds.diagonal() }
    }

    /// Box enclosing the circle with some margin, used as the outer frame.
    pub fn outer_box(&self) -> BoundingBox<2> {
        let r = SKY_MARGIN * self.radius;
        BoundingBox::new(
            [self.center[0] - r, self.center[1] - r],
            [self.center[0] + r, self.center[1] + r],
        )
    }

    /// Where the ray from `origin` along the unit vector `direction` leaves
    /// the circle.
    pub fn exit(&self, origin: &[f64; 2], direction: &[f64; 2]) -> [f64; 2] {
        ray_circle_exit(origin, direction, &self.center, self.radius)
    }

    /// Intermediate points of the counter-clockwise arc from `from` to `to`,
    /// spaced so no piece spans more than 60 degrees.
    pub fn arc(&self, from: &[f64; 2], to: &[f64; 2]) -> Vec<[f64; 2]> {
        let start = polar_angle(&self.center, from);
        let sweep = (polar_angle(&self.center, to) - start).rem_euclid(TAU);
        let pieces = (sweep / FRAC_PI_3 - ARC_SLACK).ceil().max(1.0) as usize;
        (1..pieces)
            .map(|j| circle_point(&self.center, self.radius, start + sweep * j as f64 / pieces as f64))
            .collect()
    }
}

/// Result of the unbounded construction.
#[derive(Clone, Debug)]
pub struct UnboundedTessellation {
    pub mesh: QuantTessellation<2>,
    pub sky: Sky,
    /// The Delaunay connectivity, absent when the generators were collinear.
    pub delaunay: Option<DelaunayConnectivity>,
}

impl UnboundedTessellation {
    pub fn is_collinear(&self) -> bool {
        self.delaunay.is_none()
    }
}

/// Appends the boundary of `cell` visiting `corners` in order. A corner
/// flagged `true` is joined to its successor along the sky circle, with the
/// arc and its nodes marked infinite.
pub(crate) fn push_cell(mesh: &mut QuantTessellation<2>, cell: usize, sky: &Sky, corners: &[(usize, bool)]) {
    let mut nodes = Vec::with_capacity(corners.len());
    let mut inf_steps = Vec::with_capacity(corners.len());
    for (k, &(node, arc)) in corners.iter().enumerate() {
        nodes.push(node);
        inf_steps.push(arc);
        if arc {
            let next = corners[(k + 1) % corners.len()].0;
            let from = mesh.node_position(node);
            let to = mesh.node_position(next);
            for p in sky.arc(&from, &to) {
                let id = mesh.add_new_node_at(&p);
                nodes.push(id);
                inf_steps.push(true);
            }
        }
    }
    mesh.push_loop(cell, &nodes, Some(&inf_steps));
}

/// `true` if every generator lies within `tolerance` of one line.
pub fn is_collinear(generators: &[[f64; 2]], tolerance: f64) -> bool {
    if generators.len() <= 2 {
        return true;
    }
    let p0 = generators[0];
    let p1 = generators
        .iter()
        .copied()
        .max_by(|a, b| distance_sq(&p0, a).total_cmp(&distance_sq(&p0, b)))
        .unwrap_or(p0);
    let length = distance_sq(&p0, &p1).sqrt();
    if length == 0.0 {
        return true;
    }
    let (ux, uy) = ((p1[0] - p0[0]) / length, (p1[1] - p0[1]) / length);
    generators
        .iter()
        .all(|p| ((p[0] - p0[0]) * uy - (p[1] - p0[1]) * ux).abs() <= tolerance)
}

/// Builds the unbounded tessellation of normalized generators.
///
/// Generators must lie in the unit box, which becomes the inner
/// quantization frame.
pub fn build_unbounded<T: Triangulator + ?Sized>(
    triangulator: &T,
    generators: Vec<[f64; 2]>,
    lab: LabFrame<2>,
    degeneracy: f64,
) -> Result<UnboundedTessellation> {
    if generators.is_empty() {
        return Err(TessellationError::NoGenerators);
    }
    let inner = BoundingBox::unit();
    let lattice = Hasher::bounded(inner, degeneracy);
    lattice.check_duplicates(&generators)?;

    if is_collinear(&generators, lattice.inner_step()) {
        debug!("unbounded: {} collinear generators", generators.len());
        return collinear::build(generators, lab, degeneracy);
    }

    let delaunay = DelaunayConnectivity::build(triangulator, &generators)?;
    if delaunay.num_valid() == 0 {
        return Err(TessellationError::EmptyTriangulation);
    }
    if let Some(g) = delaunay.generator_triangles.iter().position(|ts| ts.is_empty()) {
        return Err(TessellationError::Topology(format!("generator {g} is not part of any valid Delaunay triangle")));
    }

    let mut bounds = inner;
    for (t, c) in delaunay.circumcenters.iter().enumerate() {
        if delaunay.valid[t] {
            bounds.include(c);
        }
    }
    let sky = Sky::around(&bounds);
    let hasher = Hasher::new(inner, sky.outer_box().merged(&inner), degeneracy);
    let mut mesh = QuantTessellation::new(generators, lab, hasher);

    let tri_nodes: Vec<Option<usize>> = (0..delaunay.triangles.len())
        .map(|t| delaunay.valid[t].then(|| mesh.add_new_node_at(&delaunay.circumcenters[t])))
        .collect();

    // Voronoi edges per generator, as undirected node pairs.
    let mut cell_edges: Vec<Vec<(usize, usize)>> = vec![Vec::new(); mesh.num_generators()];
    let mut delaunay_edges: Vec<_> = delaunay.edge_triangles.iter().collect();
    delaunay_edges.sort_unstable_by_key(|(edge, _)| **edge);
    for (&(a, b), triangles) in delaunay_edges {
        let (u, v) = match triangles.as_slice() {
            &[t1, t2] => {
                let (Some(u), Some(v)) = (tri_nodes[t1], tri_nodes[t2]) else { continue };
                (u, v)
            }
            &[t] => {
                let Some(u) = tri_nodes[t] else { continue };
                let (pa, pb) = (delaunay.points[a], delaunay.points[b]);
                let pk = delaunay.points[delaunay.opposite_vertex(t, a, b)];
                let (dx, dy) = (pb[0] - pa[0], pb[1] - pa[1]);
                let length = (dx * dx + dy * dy).sqrt();
                let normal = if orient2d(&pa, &pb, &pk) > 0.0 {
                    [dy / length, -dx / length]
                } else {
                    [-dy / length, dx / length]
                };
                let end = sky.exit(&delaunay.circumcenters[t], &normal);
                let w = mesh.add_new_node_at(&end);
                mesh.mark_inf_node(w);
                (u, w)
            }
            _ => continue,
        };
        if u == v {
            continue;
        }
        cell_edges[a].push((u, v));
        cell_edges[b].push((u, v));
    }

    for (cell, edges) in cell_edges.iter().enumerate() {
        let (chain, open) = chain_cell(cell, edges)?;
        let chain = orient_chain(&mesh, cell, chain, open);
        let corners: Vec<(usize, bool)> = chain
            .iter()
            .enumerate()
            .map(|(k, &n)| (n, open && k + 1 == chain.len()))
            .collect();
        trace!("cell {cell}: chain {chain:?}, open {open}");
        push_cell(&mut mesh, cell, &sky, &corners);
    }
    mesh.sort_inf_markers();

    debug!(
        "unbounded: {} cells, {} nodes, {} faces, {} infinite faces",
        mesh.cells.len(),
        mesh.points.len(),
        mesh.faces.len(),
        mesh.inf_faces.len()
    );
    trace!("unbounded tessellation:\n{mesh}");
    mesh.assert_valid();
    Ok(UnboundedTessellation { mesh, sky, delaunay: Some(delaunay) })
}

/// Sorts the Voronoi edges of one cell into a single node chain. Returns the
/// chain and whether it is open (one break, the ends being the two loose
/// ends).
fn chain_cell(cell: usize, edges: &[(usize, usize)]) -> Result<(Vec<usize>, bool)> {
    let mut neighbours: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for &(u, v) in edges {
        neighbours.entry(u).or_default().push(v);
        neighbours.entry(v).or_default().push(u);
    }
    if let Some((node, ns)) = neighbours.iter().find(|(_, ns)| ns.len() > 2) {
        return Err(TessellationError::Topology(format!(
            "cell {cell}: Voronoi node {node} has {} chain neighbours",
            ns.len()
        )));
    }
    let mut loose: Vec<usize> = neighbours.iter().filter(|(_, ns)| ns.len() == 1).map(|(&n, _)| n).collect();
    loose.sort_unstable();
    if !(loose.is_empty() || loose.len() == 2) {
        return Err(TessellationError::MultipleChainBreaks { generator: cell, loose_ends: loose.len() });
    }
    let open = !loose.is_empty();
    let start = match loose.first() {
        Some(&n) => n,
        None => edges.iter().map(|&(u, _)| u).min().ok_or_else(|| {
            TessellationError::Topology(format!("cell {cell} has no Voronoi edges"))
        })?,
    };

    let mut chain = vec![start];
    let mut previous = usize::MAX;
    let mut node = start;
    loop {
        let next = neighbours[&node].iter().copied().find(|&n| n != previous);
        match next {
            Some(n) if n != start && chain.len() <= edges.len() => {
                chain.push(n);
                previous = node;
                node = n;
            }
            _ => break,
        }
        if open && neighbours[&node].len() == 1 {
            break;
        }
    }
    let expected = if open { edges.len() + 1 } else { edges.len() };
    if chain.len() != expected {
        return Err(TessellationError::MultipleChainBreaks { generator: cell, loose_ends: loose.len() });
    }
    Ok((chain, open))
}

/// Orders a chain counter-clockwise around its generator, judged by the
/// longest edge of the chain.
fn orient_chain(mesh: &QuantTessellation<2>, cell: usize, mut chain: Vec<usize>, open: bool) -> Vec<usize> {
    let steps = if open { chain.len() - 1 } else { chain.len() };
    let longest = (0..steps)
        .map(|k| {
            let u = mesh.node_position(chain[k]);
            let v = mesh.node_position(chain[(k + 1) % chain.len()]);
            (distance_sq(&u, &v), u, v)
        })
        .max_by(|a, b| a.0.total_cmp(&b.0));
    if let Some((_, u, v)) = longest {
        if orient2d(&u, &v, &mesh.generators[cell]) < 0.0 {
            chain.reverse();
        }
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delaunay::Delaunator;
    use crate::geometry::ring_signed_area;
    use crate::tessellation::positive_id;

    fn lab() -> LabFrame<2> {
        LabFrame { low: [0.0, 0.0], high: [1.0, 1.0] }
    }

    #[test]
    fn test_sky_arc_spacing() {
        let sky = Sky { center: [0.0, 0.0], radius: 1.0 };
        assert!(sky.arc(&[1.0, 0.0], &[0.8, 0.6]).is_empty());
        let half = sky.arc(&[1.0, 0.0], &[-1.0, 0.0]);
        assert_eq!(half.len(), 2);
        // Counter-clockwise: the intermediate points lie above the axis.
        assert!(half.iter().all(|p| p[1] > 0.0));
        assert_eq!(sky.arc(&[0.0, -1.0], &[1.0, 0.0]).len(), 1);
    }

    #[test]
    fn test_is_collinear() {
        assert!(is_collinear(&[[0.1, 0.1]], 1e-12));
        assert!(is_collinear(&[[0.1, 0.1], [0.2, 0.9], [0.15, 0.5]], 1e-12));
        assert!(!is_collinear(&[[0.1, 0.1], [0.2, 0.9], [0.3, 0.5]], 1e-12));
    }

    #[test]
    fn test_duplicate_generators() {
        let err = build_unbounded(&Delaunator, vec![[0.2, 0.2], [0.8, 0.3], [0.2, 0.2 + 1e-12]], lab(), 1e-14)
            .unwrap_err();
        assert_eq!(err, TessellationError::DuplicateGenerator { first: 0, second: 2 });
    }

    #[test]
    fn test_square_with_center() {
        let gens = vec![[0.1, 0.1], [0.9, 0.1], [0.9, 0.9], [0.1, 0.9], [0.5, 0.5]];
        let result = build_unbounded(&Delaunator, gens, lab(), 1e-14).unwrap();
        let mesh = &result.mesh;
        assert_eq!(mesh.validate(), Ok(()));
        assert!(!result.is_collinear());

        // The centre cell is a closed diamond of circumcentres.
        assert_eq!(mesh.cells[4].len(), 4);
        assert!(mesh.cells[4].iter().all(|&f| mesh.inf_faces.binary_search(&positive_id(f)).is_err()));

        // Hull cells each contain one run of infinite faces.
        for cell in 0..4 {
            let flags: Vec<bool> =
                mesh.cells[cell].iter().map(|&f| mesh.inf_faces.binary_search(&positive_id(f)).is_ok()).collect();
            let runs = (0..flags.len()).filter(|&k| flags[k] && !flags[(k + flags.len() - 1) % flags.len()]).count();
            assert_eq!(runs, 1, "cell {cell}: {flags:?}");
        }

        // The cells tile the polygon inscribed in the sky circle.
        let area: f64 = (0..5)
            .flat_map(|c| mesh.cell_node_ring(c))
            .map(|ring| ring_signed_area(&ring))
            .sum();
        let mut rim: Vec<[f64; 2]> = mesh.inf_nodes.iter().map(|&n| mesh.node_position(n)).collect();
        rim.sort_by(|a, b| polar_angle(&result.sky.center, a).total_cmp(&polar_angle(&result.sky.center, b)));
        assert!(rim.len() >= 8);
        assert!((area - ring_signed_area(&rim)).abs() < 1e-6);
    }

    #[test]
    fn test_two_generators_are_collinear() {
        let result = build_unbounded(&Delaunator, vec![[0.25, 0.5], [0.75, 0.5]], lab(), 1e-14).unwrap();
        assert!(result.is_collinear());
        assert_eq!(result.mesh.validate(), Ok(()));
        let shared = result.mesh.face_cells().iter().filter(|c| c.len() == 2).count();
        assert_eq!(shared, 1);
    }

    #[test]
    fn test_flat_hull_triangle() {
        let gens = vec![[0.0, 0.45], [1.0, 0.45], [0.5, 0.5]];
        let result = build_unbounded(&Delaunator, gens, lab(), 1e-14).unwrap();
        assert!(!result.is_collinear());
        assert_eq!(result.delaunay.as_ref().map(|d| d.num_valid()), Some(1));
        let mesh = &result.mesh;
        assert_eq!(mesh.validate(), Ok(()));

        // Every cell winds counter-clockwise and together they fill the sky polygon.
        let areas: Vec<f64> =
            (0..3).map(|c| mesh.cell_node_ring(c).iter().map(|ring| ring_signed_area(ring)).sum()).collect();
        assert!(areas.iter().all(|&a| a > 0.0), "{areas:?}");
        let mut rim: Vec<[f64; 2]> = mesh.inf_nodes.iter().map(|&n| mesh.node_position(n)).collect();
        rim.sort_by(|a, b| polar_angle(&result.sky.center, a).total_cmp(&polar_angle(&result.sky.center, b)));
        assert!((areas.iter().sum::<f64>() - ring_signed_area(&rim)).abs() < 1e-6);
    }

    #[test]
    fn test_no_valid_triangle_is_an_error() {
        /// Only ever returns one triangle through two synthetic corners.
        struct CornersOnly;
        impl Triangulator for CornersOnly {
            fn triangulate(&self, _points: &[[f64; 2]]) -> Vec<[usize; 3]> {
                vec![[0, 3, 4]]
            }
        }
        let gens = vec![[0.1, 0.1], [0.9, 0.1], [0.5, 0.6]];
        let err = build_unbounded(&CornersOnly, gens, lab(), 1e-14).unwrap_err();
        assert_eq!(err, TessellationError::EmptyTriangulation);
    }
}
