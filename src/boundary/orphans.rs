//! Redistribution of cell fragments not owned by their generator.

use geo::{BooleanOps, BoundingRect, Centroid, LineString, MultiPolygon, Polygon, Rect};
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use super::clipper::{SnapIndex, polygon_distance_sq};
use super::{line_string, ring_points};
use crate::geometry::{distance_sq, segment_distance_sq};

/// A fragment of cell `source` that does not contain its generator.
#[derive(Clone, Debug)]
pub(super) struct Orphan {
    pub source: usize,
    pub polygon: Polygon<f64>,
}

type Segment = ([f64; 2], [f64; 2]);

fn segments(polygons: &[&Polygon<f64>]) -> Vec<Segment> {
    polygons
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .flat_map(|ring| ring.lines())
        .map(|l| ([l.start.x, l.start.y], [l.end.x, l.end.y]))
        .collect()
}

/// Length of the common part of two segments lying on one line, zero when
/// they are not collinear within `tolerance`.
fn collinear_overlap(s: &Segment, t: &Segment, tolerance: f64) -> f64 {
    let (a, b) = *s;
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let length = (dx * dx + dy * dy).sqrt();
    if length <= tolerance {
        return 0.0;
    }
    let (ux, uy) = (dx / length, dy / length);
    let offset = |p: &[f64; 2]| ((p[0] - a[0]) * uy - (p[1] - a[1]) * ux).abs();
    if offset(&t.0) > tolerance || offset(&t.1) > tolerance {
        return 0.0;
    }
    let along = |p: &[f64; 2]| (p[0] - a[0]) * ux + (p[1] - a[1]) * uy;
    let (t0, t1) = (along(&t.0), along(&t.1));
    (length.min(t0.max(t1)) - t0.min(t1).max(0.0)).max(0.0)
}

fn rects_touch(a: &Rect<f64>, b: &Rect<f64>, tolerance: f64) -> bool {
    a.min().x <= b.max().x + tolerance
        && b.min().x <= a.max().x + tolerance
        && a.min().y <= b.max().y + tolerance
        && b.min().y <= a.max().y + tolerance
}

/// Total length of boundary shared by an orphan and a cell.
fn shared_length(orphan: &[Segment], cell: &MultiPolygon<f64>, tolerance: f64) -> f64 {
    let cell_segments = segments(&cell.iter().collect::<Vec<_>>());
    orphan
        .iter()
        .map(|s| cell_segments.iter().map(|t| collinear_overlap(s, t, tolerance)).sum::<f64>())
        .sum()
}

fn merge(cell: &mut MultiPolygon<f64>, polygon: &Polygon<f64>, snap: &SnapIndex) {
    let merged = cell.union(&MultiPolygon::new(vec![polygon.clone()]));
    *cell = snap.snap_multi(&merged);
}

/// Merges every orphan into a cell.
///
/// Repeatedly, each pending orphan joins the cell sharing the longest edge
/// with it; an orphan adopted in one round can make others adoptable in the
/// next. Orphans that never touch a cell go to the generator closest to
/// them. Returns how many orphans were placed by proximity.
pub(super) fn adopt_orphans(
    cells: &mut [MultiPolygon<f64>],
    generators: &[[f64; 2]],
    orphans: Vec<Orphan>,
    snap: &SnapIndex,
) -> usize {
    let tolerance = snap.tolerance();
    let mut merged = vec![false; cells.len()];
    let mut pending = orphans;
    loop {
        let before = pending.len();
        let mut rects: Vec<Option<Rect<f64>>> = cells.iter().map(|c| c.bounding_rect()).collect();
        pending.retain(|orphan| {
            let Some(orphan_rect) = orphan.polygon.bounding_rect() else {
                return false;
            };
            let orphan_segments = segments(&[&orphan.polygon]);
            let best = (0..cells.len())
                .filter(|&c| rects[c].is_some_and(|r| rects_touch(&r, &orphan_rect, tolerance)))
                .map(|c| (c, shared_length(&orphan_segments, &cells[c], tolerance)))
                .filter(|&(_, length)| length > tolerance)
                .max_by(|a, b| a.1.total_cmp(&b.1));
            match best {
                Some((c, length)) => {
                    trace!("orphan of cell {} adopted by cell {c} along {length}", orphan.source);
                    merge(&mut cells[c], &orphan.polygon, snap);
                    merged[c] = true;
                    rects[c] = cells[c].bounding_rect();
                    false
                }
                None => true,
            }
        });
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    let stranded = pending.len();
    for orphan in pending {
        let center = orphan
            .polygon
            .centroid()
            .map(|p| [p.x(), p.y()])
            .unwrap_or_else(|| {
                let c = orphan.polygon.exterior().0[0];
                [c.x, c.y]
            });
        let nearest = (0..generators.len())
            .min_by(|&a, &b| {
                distance_sq(&generators[a], &center)
                    .total_cmp(&distance_sq(&generators[b], &center))
                    .then(
                        polygon_distance_sq(&orphan.polygon, &generators[a])
                            .total_cmp(&polygon_distance_sq(&orphan.polygon, &generators[b])),
                    )
            })
            .unwrap_or(orphan.source);
        warn!(
            "orphan of cell {} shares no edge with any cell; merging it into cell {nearest}",
            orphan.source
        );
        merge(&mut cells[nearest], &orphan.polygon, snap);
        merged[nearest] = true;
    }
    restore_junctions(cells, &merged, tolerance);
    stranded
}

/// Vertices of all cells binned on a uniform grid.
struct VertexGrid {
    size: f64,
    bins: FxHashMap<(i64, i64), Vec<[f64; 2]>>,
}

impl VertexGrid {
    fn new(cells: &[MultiPolygon<f64>], tolerance: f64) -> Self {
        let vertices: Vec<[f64; 2]> = cells
            .iter()
            .flat_map(|c| c.iter())
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
            .flat_map(ring_points)
            .collect();
        let extent = cells
            .iter()
            .filter_map(|c| c.bounding_rect())
            .map(|r| r.width().max(r.height()))
            .fold(0.0, f64::max);
        let size = (extent / (vertices.len() as f64).sqrt().max(1.0)).max(tolerance);
        let mut grid = Self { size, bins: FxHashMap::default() };
        for v in vertices {
            let bin = grid.bins.entry(grid_key(&v, size)).or_default();
            if !bin.contains(&v) {
                bin.push(v);
            }
        }
        grid
    }

    /// Known vertices lying strictly inside the segment `a`-`b`, ordered
    /// from `a` to `b`.
    fn on_segment(&self, a: &[f64; 2], b: &[f64; 2], tolerance: f64) -> Vec<[f64; 2]> {
        let tol2 = tolerance * tolerance;
        let (lo, hi) = (
            grid_key(&[a[0].min(b[0]) - tolerance, a[1].min(b[1]) - tolerance], self.size),
            grid_key(&[a[0].max(b[0]) + tolerance, a[1].max(b[1]) + tolerance], self.size),
        );
        let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
        let mut found: Vec<(f64, [f64; 2])> = Vec::new();
        for x in lo.0..=hi.0 {
            for y in lo.1..=hi.1 {
                for v in self.bins.get(&(x, y)).into_iter().flatten() {
                    if distance_sq(v, a) <= tol2 || distance_sq(v, b) <= tol2 || segment_distance_sq(v, a, b) > tol2 {
                        continue;
                    }
                    found.push(((v[0] - a[0]) * dx + (v[1] - a[1]) * dy, *v));
                }
            }
        }
        found.sort_by(|p, q| p.0.total_cmp(&q.0));
        found.into_iter().map(|(_, v)| v).collect()
    }
}

fn grid_key(p: &[f64; 2], size: f64) -> (i64, i64) {
    ((p[0] / size).floor() as i64, (p[1] / size).floor() as i64)
}

/// Splits the edges of merged cells at vertices of other cells lying on
/// them. The union drops collinear vertices, which would leave a neighbour's
/// corner in the middle of a merged cell's edge.
fn restore_junctions(cells: &mut [MultiPolygon<f64>], merged: &[bool], tolerance: f64) {
    if !merged.contains(&true) {
        return;
    }
    let grid = VertexGrid::new(cells, tolerance);
    let split = |ring: &LineString<f64>| {
        let points = ring_points(ring);
        let n = points.len();
        let mut out = Vec::with_capacity(n);
        for k in 0..n {
            let (a, b) = (points[k], points[(k + 1) % n]);
            out.push(a);
            out.extend(grid.on_segment(&a, &b, tolerance));
        }
        line_string(&out)
    };
    for (cell, _) in merged.iter().enumerate().filter(|(_, m)| **m) {
        cells[cell] = MultiPolygon::new(
            cells[cell]
                .iter()
                .map(|p| Polygon::new(split(p.exterior()), p.interiors().iter().map(split).collect()))
                .collect(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collinear_overlap() {
        let s = ([0.0, 0.0], [2.0, 0.0]);
        assert_eq!(collinear_overlap(&s, &([1.0, 0.0], [3.0, 0.0]), 1e-9), 1.0);
        assert_eq!(collinear_overlap(&s, &([3.0, 0.0], [-1.0, 0.0]), 1e-9), 2.0);
        assert_eq!(collinear_overlap(&s, &([3.0, 0.0], [4.0, 0.0]), 1e-9), 0.0);
        assert_eq!(collinear_overlap(&s, &([0.0, 0.1], [2.0, 0.1]), 1e-9), 0.0);
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Polygon::new(
            line_string(&[[x0, y0], [x1, y0], [x1, y1], [x0, y1]]),
            Vec::new(),
        )])
    }

    #[test]
    fn test_restore_junctions() {
        // Cell 0 spans the bottom, cells 1 and 2 sit on top of it side by side.
        let mut cells = vec![square(0.0, 0.0, 2.0, 1.0), square(0.0, 1.0, 1.0, 2.0), square(1.0, 1.0, 2.0, 2.0)];
        restore_junctions(&mut cells, &[true, false, false], 1e-9);
        let ring = ring_points(cells[0].0[0].exterior());
        assert_eq!(ring, vec![[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [0.0, 1.0]]);
        assert_eq!(ring_points(cells[1].0[0].exterior()).len(), 4);
    }
}
