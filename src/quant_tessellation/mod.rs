//! The quantized intermediate mesh.
//!
//! Every node is identified by its [`PointHash`], every edge by its sorted node
//! pair and every face by its sorted edge set, so elements produced
//! independently for neighbouring cells collapse onto one another. Elements
//! are append-only: indices handed out by the `add_new_*` methods stay valid
//! for the lifetime of the mesh.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::bounds::BoundingBox;
use crate::errors::{Result, TessellationError};
use crate::hasher::{Hasher, PointHash};
use crate::tessellation::{Tessellation, positive_id, signed_id};

mod d2;
mod d3;

/// Undirected edge key: the node pair with the smaller index first.
pub type EdgeHash = (usize, usize);

/// Face key: the sorted unsigned edge indices.
pub type FaceHash = Vec<usize>;

#[inline]
pub fn hash_edge(a: usize, b: usize) -> EdgeHash {
    if a < b { (a, b) } else { (b, a) }
}

/// Normalizes a signed edge cycle into its orientation independent key.
pub fn hash_face(edges: &[i32]) -> FaceHash {
    let mut key: FaceHash = edges.iter().map(|&e| positive_id(e)).collect();
    key.sort_unstable();
    key
}

/// The lab frame of a tessellation: a cube enclosing the input, mapped onto
/// `[0, 1]^D` by one uniform scale so angles and bisectors are preserved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabFrame<const D: usize> {
    pub low: [f64; D],
    pub high: [f64; D],
}

impl<const D: usize> LabFrame<D> {
    /// The cube centred on `bounds` whose side is the largest extent of `bounds`.
    pub fn enclosing(bounds: &BoundingBox<D>) -> Self {
        let side = bounds.max_extent();
        let center = bounds.center();
        Self {
            low: std::array::from_fn(|j| center[j] - 0.5 * side),
            high: std::array::from_fn(|j| center[j] + 0.5 * side),
        }
    }

    /// Uniform scale from normalized to lab units; zero for a degenerate frame.
    pub fn scale(&self) -> f64 {
        (0..D).map(|j| self.high[j] - self.low[j]).fold(0.0, f64::max)
    }

    /// Lab position to normalized coordinates.
    pub fn normalize(&self, p: &[f64; D]) -> [f64; D] {
        let scale = self.scale();
        if scale > 0.0 {
            std::array::from_fn(|j| (p[j] - self.low[j]) / scale)
        } else {
            std::array::from_fn(|j| p[j] - self.low[j])
        }
    }

    /// Normalized coordinates back to the lab frame. A frame without extent
    /// (a lone generator) is translated instead of scaled.
    pub fn to_lab(&self, p: &[f64; D]) -> [f64; D] {
        let scale = self.scale();
        if scale > 0.0 {
            std::array::from_fn(|j| self.low[j] + p[j] * scale)
        } else {
            std::array::from_fn(|j| self.low[j] + p[j])
        }
    }

    /// Normalizes a flat coordinate array.
    pub fn normalize_flat(&self, coords: &[f64]) -> Vec<[f64; D]> {
        coords
            .chunks_exact(D)
            .map(|c| self.normalize(&std::array::from_fn(|j| c[j])))
            .collect()
    }
}

/// Quantized node/edge/face/cell mesh in normalized coordinates.
#[derive(Clone, Debug)]
pub struct QuantTessellation<const D: usize> {
    /// Normalized generator positions, one cell per generator.
    pub generators: Vec<[f64; D]>,
    pub lab: LabFrame<D>,
    /// Quantization frame: inner box, outer box and degeneracy.
    pub hasher: Hasher<D>,
    pub point2id: FxHashMap<PointHash, usize>,
    pub edge2id: FxHashMap<EdgeHash, usize>,
    pub face2id: FxHashMap<FaceHash, usize>,
    pub points: Vec<PointHash>,
    pub edges: Vec<EdgeHash>,
    /// Signed edge references per face.
    pub faces: Vec<Vec<i32>>,
    /// Signed face references per cell.
    pub cells: Vec<Vec<i32>>,
    pub inf_nodes: Vec<usize>,
    pub inf_edges: Vec<usize>,
    pub inf_faces: Vec<usize>,
}

impl<const D: usize> QuantTessellation<D> {
    pub fn new(generators: Vec<[f64; D]>, lab: LabFrame<D>, hasher: Hasher<D>) -> Self {
        let num_cells = generators.len();
        Self {
            generators,
            lab,
            hasher,
            point2id: FxHashMap::default(),
            edge2id: FxHashMap::default(),
            face2id: FxHashMap::default(),
            points: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
            cells: vec![Vec::new(); num_cells],
            inf_nodes: Vec::new(),
            inf_edges: Vec::new(),
            inf_faces: Vec::new(),
        }
    }

    pub fn num_generators(&self) -> usize {
        self.generators.len()
    }

    pub fn hash_position(&self, position: &[f64; D]) -> PointHash {
        self.hasher.hash_position(position)
    }

    pub fn unhash_position(&self, hash: PointHash) -> [f64; D] {
        self.hasher.unhash_position(hash)
    }

    /// Index of the node with `hash`, inserting it if unseen.
    pub fn add_new_node(&mut self, hash: PointHash) -> usize {
        if let Some(&id) = self.point2id.get(&hash) {
            return id;
        }
        let id = self.points.len();
        self.points.push(hash);
        self.point2id.insert(hash, id);
        debug_assert_eq!(self.points.len(), self.point2id.len());
        id
    }

    /// Quantizes `position` and returns its node index.
    pub fn add_new_node_at(&mut self, position: &[f64; D]) -> usize {
        let hash = self.hash_position(position);
        self.add_new_node(hash)
    }

    /// Index of the edge joining two nodes, inserting it if unseen.
    pub fn add_new_edge(&mut self, edge: EdgeHash) -> usize {
        let edge = hash_edge(edge.0, edge.1);
        debug_assert!(edge.0 != edge.1, "degenerate edge on node {}", edge.0);
        debug_assert!(edge.1 < self.points.len());
        if let Some(&id) = self.edge2id.get(&edge) {
            return id;
        }
        let id = self.edges.len();
        self.edges.push(edge);
        self.edge2id.insert(edge, id);
        debug_assert_eq!(self.edges.len(), self.edge2id.len());
        id
    }

    /// Index of the face with this edge set, inserting `edges` as its stored
    /// orientation if unseen.
    pub fn add_new_face(&mut self, edges: &[i32]) -> usize {
        let key = hash_face(edges);
        if let Some(&id) = self.face2id.get(&key) {
            return id;
        }
        let id = self.faces.len();
        self.faces.push(edges.to_vec());
        self.face2id.insert(key, id);
        debug_assert_eq!(self.faces.len(), self.face2id.len());
        id
    }

    pub fn mark_inf_node(&mut self, node: usize) {
        self.inf_nodes.push(node);
    }

    pub fn mark_inf_edge(&mut self, edge: usize) {
        self.inf_edges.push(edge);
    }

    pub fn mark_inf_face(&mut self, face: usize) {
        self.inf_faces.push(face);
    }

    /// Sorts the infinite element lists and drops repeated marks.
    pub fn sort_inf_markers(&mut self) {
        for list in [&mut self.inf_nodes, &mut self.inf_edges, &mut self.inf_faces] {
            list.sort_unstable();
            list.dedup();
        }
    }

    /// Normalized position of a node.
    pub fn node_position(&self, node: usize) -> [f64; D] {
        self.unhash_position(self.points[node])
    }

    /// Lab frame position of a node.
    pub fn lab_node_position(&self, node: usize) -> [f64; D] {
        self.lab.to_lab(&self.node_position(node))
    }

    /// Normalized end points of an edge.
    pub fn edge_position(&self, edge: usize) -> [[f64; D]; 2] {
        let (a, b) = self.edges[edge];
        [self.node_position(a), self.node_position(b)]
    }

    /// Tail and head node of a signed edge reference.
    #[inline]
    pub fn edge_nodes(&self, edge: i32) -> (usize, usize) {
        let (a, b) = self.edges[positive_id(edge)];
        if edge < 0 { (b, a) } else { (a, b) }
    }

    /// Edges touching each node.
    pub fn node_edges(&self) -> Vec<Vec<usize>> {
        let mut result = vec![Vec::new(); self.points.len()];
        for (i, &(a, b)) in self.edges.iter().enumerate() {
            result[a].push(i);
            result[b].push(i);
        }
        result
    }

    /// Signed faces using each edge.
    pub fn edge_faces(&self) -> Vec<Vec<i32>> {
        let mut result = vec![Vec::new(); self.edges.len()];
        for (i, face) in self.faces.iter().enumerate() {
            for &e in face {
                result[positive_id(e)].push(signed_id(i, e < 0));
            }
        }
        result
    }

    /// Signed cells bounded by each face.
    pub fn face_cells(&self) -> Vec<Vec<i32>> {
        let mut result = vec![Vec::new(); self.faces.len()];
        for (i, cell) in self.cells.iter().enumerate() {
            for &f in cell {
                result[positive_id(f)].push(signed_id(i, f < 0));
            }
        }
        result
    }

    /// Node cycle of a face, following its signed edges.
    pub fn face_nodes(&self, face: usize) -> Vec<usize> {
        let edges = &self.faces[face];
        if edges.len() == 1 {
            let (a, b) = self.edge_nodes(edges[0]);
            return vec![a, b];
        }
        edges.iter().map(|&e| self.edge_nodes(e).0).collect()
    }

    /// Converts to the output mesh in lab coordinates.
    pub fn tessellation(&self) -> Tessellation<D> {
        let mut mesh = Tessellation::new();
        mesh.nodes = (0..self.points.len())
            .flat_map(|i| self.lab_node_position(i))
            .collect();
        mesh.faces = (0..self.faces.len()).map(|f| self.face_nodes(f)).collect();
        mesh.cells = self.cells.clone();
        mesh.face_cells = self.face_cells();
        mesh.inf_nodes = self.inf_nodes.clone();
        mesh.inf_nodes.sort_unstable();
        mesh.inf_nodes.dedup();
        mesh.inf_faces = self.inf_faces.clone();
        mesh.inf_faces.sort_unstable();
        mesh.inf_faces.dedup();
        mesh
    }

    /// Checks the bookkeeping shared by all dimensions.
    fn validate_common(&self) -> Result<()> {
        let fail = |msg: String| Err(TessellationError::Topology(msg));
        if self.points.len() != self.point2id.len()
            || self.edges.len() != self.edge2id.len()
            || self.faces.len() != self.face2id.len()
        {
            return fail("element vectors and hash maps are out of step".into());
        }
        if self.cells.len() != self.generators.len() {
            return fail(format!("{} cells for {} generators", self.cells.len(), self.generators.len()));
        }
        for (i, &(a, b)) in self.edges.iter().enumerate() {
            if a >= b || b >= self.points.len() {
                return fail(format!("edge {i} = ({a}, {b}) is not a sorted pair of existing nodes"));
            }
        }
        for (i, face) in self.faces.iter().enumerate() {
            if face.iter().any(|&e| positive_id(e) >= self.edges.len()) {
                return fail(format!("face {i} references a missing edge"));
            }
        }
        for (i, cell) in self.cells.iter().enumerate() {
            if cell.iter().any(|&f| positive_id(f) >= self.faces.len()) {
                return fail(format!("cell {i} references a missing face"));
            }
        }
        for (f, cells) in self.face_cells().iter().enumerate() {
            if cells.is_empty() || cells.len() > 2 {
                return fail(format!("face {f} bounds {} cells", cells.len()));
            }
        }
        Ok(())
    }
}

/// Dimension specific topology checks.
pub trait Validate {
    /// Checks the mesh topology, describing the first violation found.
    fn validate(&self) -> Result<()>;

    /// Runs [`validate`](Self::validate) and panics on failure; compiled out
    /// without debug assertions.
    fn assert_valid(&self) {
        #[cfg(debug_assertions)]
        if let Err(e) = self.validate() {
            panic!("{e}");
        }
    }
}

impl<const D: usize> fmt::Display for QuantTessellation<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "QuantTessellation<{D}>")?;
        writeln!(f, "  lab frame: {:?} .. {:?}", self.lab.low, self.lab.high)?;
        writeln!(f, "  inner: {:?} .. {:?}", self.hasher.inner.min, self.hasher.inner.max)?;
        writeln!(f, "  outer: {:?} .. {:?}", self.hasher.outer.min, self.hasher.outer.max)?;
        writeln!(f, "  {} nodes:", self.points.len())?;
        for i in 0..self.points.len() {
            writeln!(f, "    {i}: {:#018x} {:?}", self.points[i], self.node_position(i))?;
        }
        writeln!(f, "  {} edges:", self.edges.len())?;
        for (i, e) in self.edges.iter().enumerate() {
            writeln!(f, "    {i}: {e:?}")?;
        }
        writeln!(f, "  {} faces:", self.faces.len())?;
        for (i, face) in self.faces.iter().enumerate() {
            writeln!(f, "    {i}: {face:?}")?;
        }
        writeln!(f, "  {} cells:", self.cells.len())?;
        for (i, cell) in self.cells.iter().enumerate() {
            writeln!(f, "    {i}: {cell:?}")?;
        }
        writeln!(f, "  inf nodes: {:?}", self.inf_nodes)?;
        writeln!(f, "  inf edges: {:?}", self.inf_edges)?;
        write!(f, "  inf faces: {:?}", self.inf_faces)
    }
}
