//! Clipping unbounded cells against a domain boundary.
//!
//! A [`Boundary`] is a set of polygons with holes in normalized coordinates.
//! [`clip_cells`] intersects every cell of an unbounded mesh with it, keeps
//! the fragment belonging to each generator and hands the remaining
//! fragments (orphans) to neighbouring cells.

use geo::orient::Direction;
use geo::{Area, BoundingRect, Coord, Intersects, LineString, MultiPolygon, Orient, Point, Polygon};

use crate::bounds::BoundingBox;
use crate::errors::Result;
use crate::geometry::ring_signed_area;
use crate::plc::Plc;

mod clipper;
mod orphans;

pub use clipper::{ClipMode, clip_cells};

/// Domain boundary: exteriors counter-clockwise, holes clockwise.
#[derive(Clone, Debug, PartialEq)]
pub struct Boundary {
    pub polygons: MultiPolygon<f64>,
}

/// Closed geo ring from an open vertex loop.
pub(crate) fn line_string(ring: &[[f64; 2]]) -> LineString<f64> {
    LineString::from(ring.iter().map(|p| Coord { x: p[0], y: p[1] }).collect::<Vec<_>>())
}

/// Open vertex loop of a closed geo ring.
pub(crate) fn ring_points(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    let mut points: Vec<[f64; 2]> = ring.coords().map(|c| [c.x, c.y]).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// Groups loops into polygons: counter-clockwise loops are exteriors,
/// clockwise loops become holes of the first exterior containing them.
pub(crate) fn polygons_from_loops(loops: &[Vec<[f64; 2]>]) -> MultiPolygon<f64> {
    let (outers, holes): (Vec<_>, Vec<_>) = loops
        .iter()
        .filter(|l| l.len() >= 3)
        .partition(|l| ring_signed_area(l) > 0.0);
    let mut polygons: Vec<Polygon<f64>> = outers.iter().map(|l| Polygon::new(line_string(l), Vec::new())).collect();
    for hole in holes {
        let seed = Point::new(hole[0][0], hole[0][1]);
        let owner = polygons
            .iter()
            .position(|p| Polygon::new(p.exterior().clone(), Vec::new()).intersects(&seed));
        if let Some(k) = owner {
            polygons[k].interiors_push(line_string(hole));
        }
    }
    MultiPolygon::new(polygons).orient(Direction::Default)
}

impl Boundary {
    pub fn from_polygons(polygons: MultiPolygon<f64>) -> Self {
        Self { polygons: polygons.orient(Direction::Default) }
    }

    /// The box as a single square polygon.
    pub fn from_box(bounds: &BoundingBox<2>) -> Self {
        let [x0, y0] = bounds.min;
        let [x1, y1] = bounds.max;
        Self::from_loops(&[vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]]])
    }

    /// Polygons from loops of either orientation; see [`polygons_from_loops`].
    pub fn from_loops(loops: &[Vec<[f64; 2]>]) -> Self {
        Self::from_polygons(polygons_from_loops(loops))
    }

    /// The region enclosed by the PLC outer loop minus its holes, over
    /// `points` given in normalized coordinates.
    pub fn from_plc(points: &[[f64; 2]], plc: &Plc<2>) -> Result<Self> {
        plc.validate(points.len())?;
        let (outer, holes) = plc.loops()?;
        let to_points = |ring: &[usize]| -> Vec<[f64; 2]> { ring.iter().map(|&i| points[i]).collect() };
        let polygon = Polygon::new(
            line_string(&to_points(&outer)),
            holes.iter().map(|h| line_string(&to_points(h))).collect(),
        );
        Ok(Self::from_polygons(MultiPolygon::new(vec![polygon])))
    }

    pub fn area(&self) -> f64 {
        self.polygons.unsigned_area()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.0.is_empty()
    }

    pub fn bounds(&self) -> Option<BoundingBox<2>> {
        self.polygons
            .bounding_rect()
            .map(|r| BoundingBox::new([r.min().x, r.min().y], [r.max().x, r.max().y]))
    }

    /// `true` if `p` lies inside or on the boundary.
    pub fn contains(&self, p: &[f64; 2]) -> bool {
        self.polygons.intersects(&Point::new(p[0], p[1]))
    }

    /// Applies `f` to every vertex.
    pub(crate) fn map_points(&self, f: impl Fn([f64; 2]) -> [f64; 2]) -> MultiPolygon<f64> {
        let map_ring = |ring: &LineString<f64>| line_string(&ring_points(ring).into_iter().map(&f).collect::<Vec<_>>());
        MultiPolygon::new(
            self.polygons
                .iter()
                .map(|p| Polygon::new(map_ring(p.exterior()), p.interiors().iter().map(map_ring).collect()))
                .collect(),
        )
    }
}
