use wasm_bindgen::prelude::*;

use crate::bounds::BoundingBox;
use crate::plc::Plc;
use crate::tessellation::Tessellation;
use crate::tessellator::{DelaunayTessellator, Tessellator};
use crate::wasm::utils::flatten_with_offsets;

// --- Bounding Box ---

#[wasm_bindgen]
#[derive(Clone, Copy, Debug)]
pub struct BoundingBox2D {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

#[wasm_bindgen]
impl BoundingBox2D {
    #[wasm_bindgen(constructor)]
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox2D {
        BoundingBox2D { min_x, min_y, max_x, max_y }
    }
}

impl From<BoundingBox2D> for BoundingBox<2> {
    fn from(b: BoundingBox2D) -> Self {
        Self { min: [b.min_x, b.min_y], max: [b.max_x, b.max_y] }
    }
}

// --- Tessellation ---

/// A finished 2D tessellation with its connectivity flattened for JavaScript.
///
/// Variable length lists come as a flat array plus offsets: the nodes of face
/// `f` are `face_nodes[face_offsets[f]..face_offsets[f + 1]]`, and likewise
/// for cells. Cell faces are signed, `~f` marking a reversed face.
#[wasm_bindgen(js_name = Tessellation2D)]
pub struct Tessellation2D {
    inner: Tessellation<2>,
}

#[wasm_bindgen(js_class = Tessellation2D)]
impl Tessellation2D {
    #[wasm_bindgen(getter)]
    pub fn count_nodes(&self) -> usize { self.inner.num_nodes() }
    #[wasm_bindgen(getter)]
    pub fn count_faces(&self) -> usize { self.inner.num_faces() }
    #[wasm_bindgen(getter)]
    pub fn count_cells(&self) -> usize { self.inner.num_cells() }
    #[wasm_bindgen(getter)]
    pub fn nodes(&self) -> Vec<f64> { self.inner.nodes.clone() }
    #[wasm_bindgen(getter)]
    pub fn face_nodes(&self) -> Vec<u32> { flatten_with_offsets(&self.inner.faces, |n| n as u32).0 }
    #[wasm_bindgen(getter)]
    pub fn face_offsets(&self) -> Vec<u32> { flatten_with_offsets(&self.inner.faces, |n| n as u32).1 }
    #[wasm_bindgen(getter)]
    pub fn cell_faces(&self) -> Vec<i32> { flatten_with_offsets(&self.inner.cells, |f| f).0 }
    #[wasm_bindgen(getter)]
    pub fn cell_offsets(&self) -> Vec<u32> { flatten_with_offsets(&self.inner.cells, |f| f).1 }
    #[wasm_bindgen(getter)]
    pub fn inf_nodes(&self) -> Vec<u32> { self.inner.inf_nodes.iter().map(|&n| n as u32).collect() }
    #[wasm_bindgen(getter)]
    pub fn inf_faces(&self) -> Vec<u32> { self.inner.inf_faces.iter().map(|&f| f as u32).collect() }
    pub fn cell_area(&self, cell: usize) -> f64 { self.inner.cell_area(cell) }
    pub fn cell_centroid(&self, cell: usize) -> Vec<f64> { self.inner.cell_centroid(cell).to_vec() }
}

impl Tessellation2D {
    pub fn into_inner(self) -> Tessellation<2> {
        self.inner
    }
}

/// Tessellates `points` (flat `[x, y, ...]`) inside the closed polygon given
/// by `boundary` (flat vertices in order). An empty boundary bounds the cells
/// by the hull of the points.
#[wasm_bindgen]
pub fn tessellate_2d(points: &[f64], boundary: &[f64]) -> Result<Tessellation2D, JsError> {
    let tessellator = DelaunayTessellator::new();
    let inner = if boundary.is_empty() {
        tessellator.tessellate(points)?
    } else {
        tessellator.tessellate_with_plc(points, boundary, &Plc::ring(boundary.len() / 2))?
    };
    Ok(Tessellation2D { inner })
}

#[wasm_bindgen]
pub fn tessellate_2d_in_box(points: &[f64], bounds: BoundingBox2D) -> Result<Tessellation2D, JsError> {
    let inner = DelaunayTessellator::new().tessellate_in_box(points, &bounds.into())?;
    Ok(Tessellation2D { inner })
}

/// Unclipped tessellation; outer cells end on a circle far outside the points.
#[wasm_bindgen]
pub fn tessellate_2d_unbounded(points: &[f64]) -> Result<Tessellation2D, JsError> {
    let inner = DelaunayTessellator::new().tessellate_unbounded(points)?;
    Ok(Tessellation2D { inner })
}
