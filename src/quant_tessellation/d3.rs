use rustc_hash::FxHashMap;
use tracing::trace;

use super::{LabFrame, QuantTessellation, Validate};
use crate::errors::{Result, TessellationError};
use crate::hasher::Hasher;
use crate::polyhedron::{Polyhedron, PolyhedronScratch};
use crate::tessellation::{positive_id, signed_id};

impl QuantTessellation<3> {
    /// Adds an outward oriented face loop to `cell`. The loop is quantized
    /// and consecutive repeats are dropped; a loop left with fewer than three
    /// nodes contributes nothing.
    pub fn push_face_loop(&mut self, cell: usize, nodes: &[usize]) {
        let mut nodes = nodes.to_vec();
        nodes.dedup();
        while nodes.len() > 1 && nodes.first() == nodes.last() {
            nodes.pop();
        }
        let n = nodes.len();
        if n < 3 {
            trace!("cell {cell}: dropping face collapsed to {n} nodes");
            return;
        }
        let edges: Vec<i32> = (0..n)
            .map(|k| {
                let (u, v) = (nodes[k], nodes[(k + 1) % n]);
                signed_id(self.add_new_edge((u, v)), u > v)
            })
            .collect();
        let known = self.face2id.len();
        let f = self.add_new_face(&edges);
        let reversed = f < known && !self.faces[f].contains(&edges[0]);
        self.cells[cell].push(signed_id(f, reversed));
    }

    /// Builds a bounded mesh from one convex polyhedron per generator, given
    /// in normalized coordinates with outward oriented faces. Faces shared by
    /// neighbouring polyhedra collapse onto one face referenced with opposite
    /// signs.
    pub fn from_polyhedra(
        generators: Vec<[f64; 3]>,
        lab: LabFrame<3>,
        hasher: Hasher<3>,
        cells: &[Polyhedron],
    ) -> Self {
        debug_assert_eq!(generators.len(), cells.len());
        let mut mesh = Self::new(generators, lab, hasher);
        for (cell, poly) in cells.iter().enumerate() {
            let ids: Vec<usize> = (0..poly.num_vertices()).map(|v| mesh.add_new_node_at(&poly.vertex(v))).collect();
            for face in poly.faces() {
                let nodes: Vec<usize> = face.iter().map(|&v| ids[v]).collect();
                mesh.push_face_loop(cell, &nodes);
            }
        }
        mesh
    }

    /// The cell as a polyhedron with faces oriented outward.
    pub fn cell_polyhedron(&self, cell: usize) -> Polyhedron {
        let mut local: FxHashMap<usize, usize> = FxHashMap::default();
        let mut vertices = Vec::new();
        let mut faces = Vec::with_capacity(self.cells[cell].len());
        for &f in &self.cells[cell] {
            let mut nodes = self.face_nodes(positive_id(f));
            if f < 0 {
                nodes.reverse();
            }
            let face = nodes
                .into_iter()
                .map(|n| {
                    *local.entry(n).or_insert_with(|| {
                        vertices.push(self.node_position(n));
                        vertices.len() - 1
                    })
                })
                .collect();
            faces.push(face);
        }
        Polyhedron::from_faces(&vertices, &faces)
    }

    /// Clips every cell against the six planes of the inner box and rebuilds
    /// the mesh. Afterwards the outer frame equals the inner box and no
    /// infinite elements remain.
    pub fn clip_to_inner_bounding_box(&mut self) -> Result<()> {
        let inner = self.hasher.inner;
        let mut scratch = PolyhedronScratch::default();
        let cells: Vec<Polyhedron> = (0..self.cells.len())
            .map(|cell| {
                let mut poly = self.cell_polyhedron(cell);
                poly.clip_to_box(&inner, &mut scratch);
                poly
            })
            .collect();
        let hasher = Hasher::bounded(inner, self.hasher.degeneracy);
        *self = Self::from_polyhedra(std::mem::take(&mut self.generators), self.lab, hasher, &cells);
        self.validate()
    }
}

impl Validate for QuantTessellation<3> {
    fn validate(&self) -> Result<()> {
        self.validate_common()?;
        let fail = |msg: String| Err(TessellationError::Topology(msg));

        for (n, edges) in self.node_edges().iter().enumerate() {
            if edges.is_empty() {
                return fail(format!("node {n} is not used by any edge"));
            }
        }
        for (e, faces) in self.edge_faces().iter().enumerate() {
            if faces.is_empty() {
                return fail(format!("edge {e} is not used by any face"));
            }
        }
        for (f, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return fail(format!("face {f} has {} edges", face.len()));
            }
            for k in 0..face.len() {
                let head = self.edge_nodes(face[k]).1;
                let tail = self.edge_nodes(face[(k + 1) % face.len()]).0;
                if head != tail {
                    return fail(format!("face {f} edges {k} and {} do not chain", (k + 1) % face.len()));
                }
            }
        }

        // In a closed cell every edge is crossed once in each direction.
        let mut crossings: FxHashMap<usize, i32> = FxHashMap::default();
        for (c, cell) in self.cells.iter().enumerate() {
            if cell.len() < 4 {
                return fail(format!("cell {c} has {} faces", cell.len()));
            }
            crossings.clear();
            for &f in cell {
                for &e in &self.faces[positive_id(f)] {
                    let forward = (e >= 0) == (f >= 0);
                    *crossings.entry(positive_id(e)).or_insert(0) += if forward { 1 } else { -1 };
                }
            }
            if let Some((e, _)) = crossings.iter().find(|(_, s)| **s != 0) {
                return fail(format!("cell {c} is not closed along edge {e}"));
            }
        }
        Ok(())
    }
}
