//! Delaunay connectivity of the generators.
//!
//! The triangulation itself comes from a [`Triangulator`]; this module turns
//! its raw output into consistently oriented triangles with circumcentres and
//! the edge and generator adjacency the unbounded builder walks.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::bounds::BoundingBox;
use crate::errors::{Result, TessellationError};
use crate::geometry::{circumcenter, orient2d};
use crate::quant_tessellation::{EdgeHash, hash_edge};

/// A 2D Delaunay triangulation backend.
pub trait Triangulator: Send + Sync {
    /// Triangles of the Delaunay triangulation of `points`, as index triples
    /// in any orientation.
    fn triangulate(&self, points: &[[f64; 2]]) -> Vec<[usize; 3]>;
}

/// [`Triangulator`] backed by the `delaunator` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct Delaunator;

impl Triangulator for Delaunator {
    fn triangulate(&self, points: &[[f64; 2]]) -> Vec<[usize; 3]> {
        let points: Vec<delaunator::Point> = points.iter().map(|p| delaunator::Point { x: p[0], y: p[1] }).collect();
        delaunator::triangulate(&points)
            .triangles
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect()
    }
}

/// Oriented Delaunay triangles of the generators plus four synthetic corners.
///
/// Points `0..num_generators` are the generators, the last four the corners
/// placed at twice the generator extent around their centre. A triangle is
/// *valid* when all three vertices are generators; the adjacency maps only
/// record valid triangles. When the valid triangles fall short of the convex
/// hull, the generators are triangulated again without the corners.
#[derive(Clone, Debug)]
pub struct DelaunayConnectivity {
    pub points: Vec<[f64; 2]>,
    pub num_generators: usize,
    /// Counter-clockwise vertex triples.
    pub triangles: Vec<[usize; 3]>,
    pub circumcenters: Vec<[f64; 2]>,
    pub valid: Vec<bool>,
    /// Valid triangles using each generator edge: one for exterior edges,
    /// two for interior ones.
    pub edge_triangles: FxHashMap<EdgeHash, Vec<usize>>,
    /// Valid triangles around each generator.
    pub generator_triangles: Vec<Vec<usize>>,
}

impl DelaunayConnectivity {
    pub fn build<T: Triangulator + ?Sized>(triangulator: &T, generators: &[[f64; 2]]) -> Result<Self> {
        let num_generators = generators.len();
        let mut bounds = BoundingBox::new(generators[0], generators[0]);
        generators.iter().for_each(|p| bounds.include(p));
        let center = bounds.center();
        let extent = match bounds.max_extent() {
            e if e > 0.0 => 2.0 * e,
            _ => 2.0,
        };
        let mut points = generators.to_vec();
        points.extend([
            [center[0] - extent, center[1] - extent],
            [center[0] + extent, center[1] - extent],
            [center[0] + extent, center[1] + extent],
            [center[0] - extent, center[1] + extent],
        ]);

        let triangles = oriented_triangles(triangulator.triangulate(&points), &points);
        let mut result = Self::from_triangles(points, num_generators, triangles)?;
        if !result.covers_hull() {
            // A corner inside the circumcircle of a flat hull triangle removes
            // it from the valid set; the generators alone triangulate the hull.
            let direct = oriented_triangles(triangulator.triangulate(&result.points[..num_generators]), &result.points);
            if !direct.is_empty() {
                debug!("delaunay: corners cut into the hull, triangulating the generators alone");
                result = Self::from_triangles(std::mem::take(&mut result.points), num_generators, direct)?;
            }
        }
        debug!(
            "delaunay: {} generators, {} triangles, {} valid, {} edges",
            num_generators,
            result.triangles.len(),
            result.num_valid(),
            result.edge_triangles.len()
        );
        Ok(result)
    }

    fn from_triangles(points: Vec<[f64; 2]>, num_generators: usize, triangles: Vec<[usize; 3]>) -> Result<Self> {
        if triangles.is_empty() {
            return Err(TessellationError::EmptyTriangulation);
        }
        let circumcenters = triangles
            .iter()
            .map(|&[a, b, c]| circumcenter(&points[a], &points[b], &points[c]))
            .collect();
        let valid: Vec<bool> = triangles.iter().map(|t| t.iter().all(|&v| v < num_generators)).collect();

        let mut edge_triangles: FxHashMap<EdgeHash, Vec<usize>> = FxHashMap::default();
        let mut generator_triangles = vec![Vec::new(); num_generators];
        for (t, tri) in triangles.iter().enumerate().filter(|(t, _)| valid[*t]) {
            for k in 0..3 {
                edge_triangles.entry(hash_edge(tri[k], tri[(k + 1) % 3])).or_default().push(t);
                generator_triangles[tri[k]].push(t);
            }
        }
        if let Some((&(a, b), ts)) = edge_triangles.iter().find(|(_, ts)| ts.len() > 2) {
            return Err(TessellationError::NonManifoldEdge { a, b, count: ts.len() });
        }
        Ok(Self { points, num_generators, triangles, circumcenters, valid, edge_triangles, generator_triangles })
    }

    /// `true` when the valid triangles tile the convex hull of the generators:
    /// every generator is used and the exterior is one simple convex ring.
    pub fn covers_hull(&self) -> bool {
        if self.generator_triangles.iter().any(Vec::is_empty) {
            return false;
        }
        let rings = self.exterior_rings();
        let [ring] = rings.as_slice() else {
            return false;
        };
        let mut distinct = ring.clone();
        distinct.sort_unstable();
        distinct.dedup();
        let n = ring.len();
        distinct.len() == n
            && (0..n).all(|k| {
                let (a, b, c) = (ring[(k + n - 1) % n], ring[k], ring[(k + 1) % n]);
                orient2d(&self.points[a], &self.points[b], &self.points[c]) >= 0.0
            })
    }

    pub fn num_valid(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Vertex of triangle `t` opposite the edge `(a, b)`.
    pub fn opposite_vertex(&self, t: usize, a: usize, b: usize) -> usize {
        let tri = self.triangles[t];
        tri.into_iter().find(|&v| v != a && v != b).unwrap_or(tri[0])
    }

    /// Edges of the valid region used by one valid triangle, oriented so the
    /// region lies to their left, in a deterministic order.
    pub fn exterior_edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = self
            .triangles
            .iter()
            .enumerate()
            .filter(|(t, _)| self.valid[*t])
            .flat_map(|(_, tri)| (0..3).map(move |k| (tri[k], tri[(k + 1) % 3])))
            .filter(|&(a, b)| self.edge_triangles.get(&hash_edge(a, b)).is_some_and(|ts| ts.len() == 1))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// The exterior edges chained into closed generator loops: counter
    /// clockwise around the valid region, clockwise around gaps in it.
    pub fn exterior_rings(&self) -> Vec<Vec<usize>> {
        let edges = self.exterior_edges();
        let mut outgoing: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for (k, &(a, _)) in edges.iter().enumerate() {
            outgoing.entry(a).or_default().push(k);
        }
        let mut used = vec![false; edges.len()];
        let mut rings = Vec::new();
        for first in 0..edges.len() {
            if used[first] {
                continue;
            }
            used[first] = true;
            let start = edges[first].0;
            let mut ring = vec![start];
            let mut node = edges[first].1;
            while node != start {
                ring.push(node);
                let Some(k) = outgoing.get(&node).and_then(|ks| ks.iter().copied().find(|&k| !used[k])) else {
                    break;
                };
                used[k] = true;
                node = edges[k].1;
            }
            rings.push(ring);
        }
        rings
    }
}

/// Counter-clockwise copies of `raw`, dropping collinear triples.
fn oriented_triangles(raw: Vec<[usize; 3]>, points: &[[f64; 2]]) -> Vec<[usize; 3]> {
    raw.into_iter()
        .filter_map(|[a, b, c]| {
            let turn = orient2d(&points[a], &points[b], &points[c]);
            if turn == 0.0 {
                warn!("rejecting collinear Delaunay triangle ({a}, {b}, {c})");
                return None;
            }
            Some(if turn > 0.0 { [a, b, c] } else { [a, c, b] })
        })
        .collect()
}
