use geo::orient::Direction;
use geo::{BooleanOps, BoundingRect, Intersects, LineString, MultiPolygon, Orient, Point, Polygon};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::orphans::{Orphan, adopt_orphans};
use super::{Boundary, line_string, polygons_from_loops, ring_points};
use crate::bounds::BoundingBox;
use crate::errors::{Result, TessellationError};
use crate::geometry::segment_distance_sq;
use crate::hasher::Hasher;
use crate::quant_tessellation::{QuantTessellation, Validate};

/// Snap radius in lattice units for exact clipping.
const EXACT_SNAP: f64 = 2.0;
/// Snap radius in inner steps for float clipping.
const FLOAT_SNAP: f64 = 8.0;

/// Arithmetic used to intersect cells with the boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClipMode {
    /// Boundary and cells are moved onto the inner quantization lattice
    /// before intersecting, and every result vertex is snapped back onto it.
    #[default]
    Exact,
    /// Intersection on the normalized coordinates; the resulting rings are
    /// simplified with a tolerance derived from the degeneracy.
    Float,
}

/// Coordinates the boolean operations run in: inner lattice units in exact
/// mode, normalized coordinates otherwise.
#[derive(Clone, Copy, Debug)]
struct WorkFrame {
    hasher: Hasher<2>,
    mode: ClipMode,
}

impl WorkFrame {
    fn to_work(&self, p: [f64; 2]) -> [f64; 2] {
        match self.mode {
            ClipMode::Exact => self.hasher.int_point(&p).map(|q| q as f64),
            ClipMode::Float => p,
        }
    }

    fn from_work(&self, q: [f64; 2]) -> [f64; 2] {
        match self.mode {
            ClipMode::Exact => self.hasher.real_point(&q.map(|x| x.round() as i64)),
            ClipMode::Float => q,
        }
    }

    fn round(&self, q: [f64; 2]) -> [f64; 2] {
        match self.mode {
            ClipMode::Exact => q.map(f64::round),
            ClipMode::Float => q,
        }
    }

    fn tolerance(&self) -> f64 {
        match self.mode {
            ClipMode::Exact => EXACT_SNAP,
            ClipMode::Float => FLOAT_SNAP * self.hasher.inner_step(),
        }
    }
}

/// Known vertices that boolean operation output is pulled back onto.
pub(super) struct SnapIndex {
    frame: WorkFrame,
    bins: FxHashMap<(i64, i64), Vec<[f64; 2]>>,
}

impl SnapIndex {
    fn new(frame: WorkFrame) -> Self {
        Self { frame, bins: FxHashMap::default() }
    }

    fn bin(&self, p: &[f64; 2]) -> (i64, i64) {
        let tol = self.frame.tolerance();
        ((p[0] / tol).floor() as i64, (p[1] / tol).floor() as i64)
    }

    fn insert(&mut self, p: [f64; 2]) {
        let key = self.bin(&p);
        let bin = self.bins.entry(key).or_default();
        if !bin.contains(&p) {
            bin.push(p);
        }
    }

    fn insert_polygon(&mut self, polygon: &Polygon<f64>) {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            ring_points(ring).into_iter().for_each(|p| self.insert(p));
        }
    }

    /// The closest known vertex within the tolerance, else `p` rounded.
    fn snap(&self, p: [f64; 2]) -> [f64; 2] {
        let tol = self.frame.tolerance();
        let (bx, by) = self.bin(&p);
        let mut best = (tol * tol, None);
        for x in bx - 1..=bx + 1 {
            for y in by - 1..=by + 1 {
                for q in self.bins.get(&(x, y)).into_iter().flatten() {
                    let d2 = (q[0] - p[0]).powi(2) + (q[1] - p[1]).powi(2);
                    if d2 <= best.0 {
                        best = (d2, Some(*q));
                    }
                }
            }
        }
        best.1.unwrap_or_else(|| self.frame.round(p))
    }

    pub(super) fn snap_polygon(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
        let snap_ring = |ring: &LineString<f64>| {
            let points: Vec<[f64; 2]> = ring_points(ring).into_iter().map(|p| self.snap(p)).collect();
            line_string(&points)
        };
        Polygon::new(snap_ring(polygon.exterior()), polygon.interiors().iter().map(snap_ring).collect())
    }

    pub(super) fn snap_multi(&self, polygons: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        MultiPolygon::new(polygons.iter().map(|p| self.snap_polygon(p)).collect())
    }

    pub(super) fn tolerance(&self) -> f64 {
        self.frame.tolerance()
    }
}

/// Where a cell is on its way through the clipper.
#[derive(Debug)]
enum ClipStage {
    /// The cell rings, cut down to the boundary's bounding box.
    Unclipped(MultiPolygon<f64>),
    /// Fragments left after intersecting with the boundary.
    Intersected(Vec<Polygon<f64>>),
    /// The fragment owned by the generator and the orphaned rest.
    Selected { kept: Polygon<f64>, orphans: Vec<Polygon<f64>> },
    Clipped(MultiPolygon<f64>),
}

impl ClipStage {
    fn name(&self) -> &'static str {
        match self {
            ClipStage::Unclipped(_) => "unclipped",
            ClipStage::Intersected(_) => "intersected",
            ClipStage::Selected { .. } => "selected",
            ClipStage::Clipped(_) => "clipped",
        }
    }
}

/// Sutherland-Hodgman clip of a closed ring against one axis aligned half
/// plane. Crossing points are computed from the lexicographically smaller
/// end of each edge, so both traversal directions of an edge agree.
fn clip_ring_axis(ring: &[[f64; 2]], axis: usize, bound: f64, keep_below: bool, frame: &WorkFrame) -> Vec<[f64; 2]> {
    let inside = |p: &[f64; 2]| if keep_below { p[axis] <= bound } else { p[axis] >= bound };
    let mut result = Vec::with_capacity(ring.len() + 2);
    for i in 0..ring.len() {
        let p = ring[i];
        let q = ring[(i + 1) % ring.len()];
        let (p_in, q_in) = (inside(&p), inside(&q));
        if p_in {
            result.push(p);
        }
        if p_in != q_in {
            let (a, b) = if p < q { (p, q) } else { (q, p) };
            let t = (bound - a[axis]) / (b[axis] - a[axis]);
            let mut x = [a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1])];
            x[axis] = bound;
            result.push(frame.round(x));
        }
    }
    result
}

fn clip_ring_to_box(ring: &[[f64; 2]], window: &BoundingBox<2>, frame: &WorkFrame) -> Vec<[f64; 2]> {
    let mut ring = ring.to_vec();
    for axis in 0..2 {
        ring = clip_ring_axis(&ring, axis, window.min[axis], false, frame);
        ring = clip_ring_axis(&ring, axis, window.max[axis], true, frame);
    }
    ring
}

/// Squared distance from `p` to the closest edge of a polygon.
pub(super) fn polygon_distance_sq(polygon: &Polygon<f64>, p: &[f64; 2]) -> f64 {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .flat_map(|ring| ring.lines())
        .map(|line| segment_distance_sq(p, &[line.start.x, line.start.y], &[line.end.x, line.end.y]))
        .fold(f64::INFINITY, f64::min)
}

/// Drops vertices closer than `tolerance` to their predecessor or to the
/// chord joining their neighbours.
fn simplify_ring(mut ring: Vec<[f64; 2]>, tolerance: f64) -> Vec<[f64; 2]> {
    let tol2 = tolerance * tolerance;
    let dist2 = |a: &[f64; 2], b: &[f64; 2]| (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2);
    ring.dedup_by(|p, prev| dist2(p, prev) <= tol2);
    while ring.len() > 3 && dist2(&ring[0], &ring[ring.len() - 1]) <= tol2 {
        ring.pop();
    }
    loop {
        let n = ring.len();
        if n <= 3 {
            return ring;
        }
        let flat = (0..n).find(|&k| segment_distance_sq(&ring[k], &ring[(k + n - 1) % n], &ring[(k + 1) % n]) <= tol2);
        match flat {
            Some(k) => {
                ring.remove(k);
            }
            None => return ring,
        }
    }
}

struct Clipper<'a> {
    mesh: &'a QuantTessellation<2>,
    frame: WorkFrame,
    boundary: MultiPolygon<f64>,
    window: BoundingBox<2>,
    snap: SnapIndex,
}

impl Clipper<'_> {
    fn generator(&self, cell: usize) -> [f64; 2] {
        self.frame.to_work(self.mesh.generators[cell])
    }

    fn unclipped(&self, cell: usize) -> MultiPolygon<f64> {
        let loops: Vec<Vec<[f64; 2]>> = self
            .mesh
            .cell_node_ring(cell)
            .into_iter()
            .map(|ring| {
                let ring: Vec<[f64; 2]> = ring.into_iter().map(|p| self.frame.to_work(p)).collect();
                clip_ring_to_box(&ring, &self.window, &self.frame)
            })
            .collect();
        polygons_from_loops(&loops)
    }

    fn intersect(&self, cell: &MultiPolygon<f64>) -> Vec<Polygon<f64>> {
        cell.intersection(&self.boundary)
            .into_iter()
            .map(|p| self.snap.snap_polygon(&p))
            .collect()
    }

    fn select(&self, cell: usize, mut pieces: Vec<Polygon<f64>>) -> Result<ClipStage> {
        if pieces.is_empty() {
            return Err(TessellationError::GeneratorOutsideBoundary(cell));
        }
        let g = self.generator(cell);
        let site = Point::new(g[0], g[1]);
        let k = pieces.iter().position(|p| p.intersects(&site)).unwrap_or_else(|| {
            (0..pieces.len())
                .min_by(|&a, &b| polygon_distance_sq(&pieces[a], &g).total_cmp(&polygon_distance_sq(&pieces[b], &g)))
                .unwrap_or(0)
        });
        let kept = pieces.swap_remove(k);
        Ok(ClipStage::Selected { kept, orphans: pieces })
    }

    /// Runs one cell through every stage, collecting its orphans.
    fn clip(&self, cell: usize, orphans: &mut Vec<Orphan>) -> Result<MultiPolygon<f64>> {
        let mut stage = ClipStage::Unclipped(self.unclipped(cell));
        loop {
            trace!("cell {cell}: {}", stage.name());
            stage = match stage {
                ClipStage::Unclipped(polygons) => ClipStage::Intersected(self.intersect(&polygons)),
                ClipStage::Intersected(pieces) => self.select(cell, pieces)?,
                ClipStage::Selected { kept, orphans: rest } => {
                    orphans.extend(rest.into_iter().map(|polygon| Orphan { source: cell, polygon }));
                    ClipStage::Clipped(MultiPolygon::new(vec![kept]))
                }
                ClipStage::Clipped(result) => return Ok(result),
            };
        }
    }

    fn output_rings(&self, cell: &MultiPolygon<f64>) -> Vec<Vec<[f64; 2]>> {
        let oriented = cell.clone().orient(Direction::Default);
        let mut rings = Vec::new();
        for polygon in oriented.iter() {
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                let mut points = ring_points(ring);
                if self.frame.mode == ClipMode::Float {
                    points = simplify_ring(points, self.frame.tolerance());
                }
                rings.push(points.into_iter().map(|q| self.frame.from_work(q)).collect());
            }
        }
        rings
    }
}

/// Clips every cell of `mesh` to `boundary` and rebuilds a bounded mesh.
///
/// Each cell keeps the fragment containing (or else nearest to) its
/// generator; other fragments are adopted by the neighbouring cell sharing
/// the longest edge with them, or by the nearest generator when they touch
/// no cell. The result uses the inner box of `mesh` as both frames.
pub fn clip_cells(mesh: &QuantTessellation<2>, boundary: &Boundary, mode: ClipMode) -> Result<QuantTessellation<2>> {
    let frame = WorkFrame { hasher: mesh.hasher, mode };
    let work_boundary = boundary.map_points(|p| frame.to_work(p)).orient(Direction::Default);
    let Some(rect) = work_boundary.bounding_rect() else {
        return Err(TessellationError::GeneratorOutsideBoundary(0));
    };
    let window = BoundingBox::new([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

    let mut snap = SnapIndex::new(frame);
    work_boundary.iter().for_each(|p| snap.insert_polygon(p));
    for node in 0..mesh.points.len() {
        snap.insert(frame.to_work(mesh.node_position(node)));
    }

    let mut clipper = Clipper { mesh, frame, boundary: work_boundary, window, snap };
    let mut orphans = Vec::new();
    let mut cells = (0..mesh.num_generators())
        .map(|cell| clipper.clip(cell, &mut orphans))
        .collect::<Result<Vec<_>>>()?;

    for polygon in cells.iter().flat_map(|c| c.iter()).chain(orphans.iter().map(|o| &o.polygon)) {
        clipper.snap.insert_polygon(polygon);
    }
    let num_orphans = orphans.len();
    let generators: Vec<[f64; 2]> = (0..mesh.num_generators()).map(|c| clipper.generator(c)).collect();
    let by_proximity = adopt_orphans(&mut cells, &generators, orphans, &clipper.snap);
    debug!(
        "clip: {} cells, {} orphans, {} adopted by proximity",
        cells.len(),
        num_orphans,
        by_proximity
    );

    let rings: Vec<Vec<Vec<[f64; 2]>>> = cells.iter().map(|c| clipper.output_rings(c)).collect();
    let hasher = Hasher::bounded(mesh.hasher.inner, mesh.hasher.degeneracy);
    let result = QuantTessellation::from_cell_rings(mesh.generators.clone(), mesh.lab, hasher, &rings);
    trace!("clipped tessellation:\n{result}");
    result.validate()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quant_tessellation::LabFrame;
    use approx::assert_relative_eq;

    fn frame(mode: ClipMode) -> WorkFrame {
        WorkFrame { hasher: Hasher::bounded(BoundingBox::unit(), 0.25), mode }
    }

    #[test]
    fn test_work_frame_round_trip() {
        let exact = frame(ClipMode::Exact);
        assert_eq!(exact.to_work([0.5, 0.76]), [2.0, 3.0]);
        assert_eq!(exact.from_work([2.2, 2.9]), [0.5, 0.75]);
        let float = frame(ClipMode::Float);
        assert_eq!(float.from_work(float.to_work([0.3, 0.7])), [0.3, 0.7]);
    }

    #[test]
    fn test_clip_ring_to_box_is_direction_independent() {
        let f = frame(ClipMode::Float);
        let window = BoundingBox::new([0.0, 0.0], [1.0, 1.0]);
        let ring = vec![[0.5, 0.5], [2.0, 0.7], [0.5, 3.0]];
        let clipped = clip_ring_to_box(&ring, &window, &f);
        let mut reversed = ring.clone();
        reversed.reverse();
        let clipped_rev = clip_ring_to_box(&reversed, &window, &f);
        let crossing = clipped.iter().find(|p| p[0] == 1.0).unwrap();
        assert!(clipped_rev.contains(crossing));
    }

    #[test]
    fn test_simplify_ring() {
        let ring = vec![[0.0, 0.0], [0.5, 1e-12], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0 + 1e-13], [0.0, 1.0]];
        assert_eq!(simplify_ring(ring, 1e-9), vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
    }

    fn big_square_mesh() -> QuantTessellation<2> {
        let lab = LabFrame { low: [0.0, 0.0], high: [1.0, 1.0] };
        let hasher = Hasher::new(BoundingBox::unit(), BoundingBox::new([-2.0, -2.0], [3.0, 3.0]), 1e-14);
        // Two half planes split at x = 0.5, cut off far away.
        QuantTessellation::from_cell_rings(
            vec![[0.25, 0.5], [0.75, 0.5]],
            lab,
            hasher,
            &[
                vec![vec![[-1.0, -1.0], [0.5, -1.0], [0.5, 2.0], [-1.0, 2.0]]],
                vec![vec![[0.5, -1.0], [2.0, -1.0], [2.0, 2.0], [0.5, 2.0]]],
            ],
        )
    }

    #[test]
    fn test_clip_to_box_both_modes() {
        for mode in [ClipMode::Exact, ClipMode::Float] {
            let mesh = big_square_mesh();
            let clipped = clip_cells(&mesh, &Boundary::from_box(&BoundingBox::unit()), mode).unwrap();
            let out = clipped.tessellation();
            assert_eq!(out.num_cells(), 2);
            assert_eq!(out.num_nodes(), 6, "{mode:?}");
            assert_eq!(out.num_faces(), 7, "{mode:?}");
            assert_relative_eq!(out.cell_area(0), 0.5, epsilon = 1e-8);
            assert_relative_eq!(out.cell_area(1), 0.5, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_orphan_goes_to_neighbour() {
        // A U shaped domain: the left cell's half plane also covers the tip of
        // the right arm, which is cut off from the left generator.
        let boundary = Boundary::from_loops(&[vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.8, 1.0],
            [0.8, 0.2],
            [0.2, 0.2],
            [0.2, 1.0],
            [0.0, 1.0],
        ]]);
        let lab = LabFrame { low: [0.0, 0.0], high: [1.0, 1.0] };
        let hasher = Hasher::new(BoundingBox::unit(), BoundingBox::new([-2.0, -2.0], [3.0, 3.0]), 1e-14);
        // Cell 0 owns x < 0.1 plus the top strip y > 0.9; cell 1 owns the rest.
        let mesh = QuantTessellation::from_cell_rings(
            vec![[0.05, 0.5], [0.5, 0.1]],
            lab,
            hasher,
            &[
                vec![vec![[-1.0, -1.0], [0.1, -1.0], [0.1, 0.9], [2.0, 0.9], [2.0, 2.0], [-1.0, 2.0]]],
                vec![vec![[0.1, -1.0], [2.0, -1.0], [2.0, 0.9], [0.1, 0.9]]],
            ],
        );
        for mode in [ClipMode::Exact, ClipMode::Float] {
            let clipped = clip_cells(&mesh, &boundary, mode).unwrap();
            let out = clipped.tessellation();
            let total = out.cell_area(0) + out.cell_area(1);
            assert_relative_eq!(total, boundary.area(), epsilon = 1e-8);
            // The right arm tip (0.8..1.0 x 0.9..1.0) went to cell 1.
            assert_relative_eq!(out.cell_area(0), 0.1 * 1.0 + 0.1 * 0.1, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_generator_outside_boundary() {
        let mesh = big_square_mesh();
        let boundary = Boundary::from_box(&BoundingBox::new([0.6, 0.0], [1.0, 1.0]));
        let err = clip_cells(&mesh, &boundary, ClipMode::Exact).unwrap_err();
        assert_eq!(err, TessellationError::GeneratorOutsideBoundary(0));
    }
}
