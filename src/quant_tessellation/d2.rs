use rustc_hash::FxHashMap;
use tracing::trace;

use super::{LabFrame, QuantTessellation, Validate};
use crate::boundary::{Boundary, ClipMode, clip_cells};
use crate::errors::{Result, TessellationError};
use crate::hasher::Hasher;
use crate::tessellation::{positive_id, signed_id};

impl QuantTessellation<2> {
    /// Appends the closed node loop `nodes` to the boundary of `cell`.
    ///
    /// Every step `nodes[k] -> nodes[k + 1]` (wrapping) becomes an edge and a
    /// one-edge face referenced in traversal direction. Steps flagged in
    /// `inf_steps` are marked infinite together with their end nodes.
    pub fn push_loop(&mut self, cell: usize, nodes: &[usize], inf_steps: Option<&[bool]>) {
        let n = nodes.len();
        for k in 0..n {
            let (u, v) = (nodes[k], nodes[(k + 1) % n]);
            if u == v {
                continue;
            }
            let e = self.add_new_edge((u, v));
            let f = self.add_new_face(&[e as i32]);
            self.cells[cell].push(signed_id(f, u > v));
            if inf_steps.is_some_and(|flags| flags[k]) {
                self.mark_inf_edge(e);
                self.mark_inf_face(f);
                self.mark_inf_node(u);
                self.mark_inf_node(v);
            }
        }
    }

    /// Builds a bounded mesh from explicit cell rings in normalized
    /// coordinates. Each cell may have several rings (outer boundary plus CW
    /// holes, or disjoint pieces). Ring vertices are quantized; repeated
    /// vertices and spikes produced by the quantization are removed and rings
    /// left with fewer than three nodes are dropped.
    pub fn from_cell_rings(
        generators: Vec<[f64; 2]>,
        lab: LabFrame<2>,
        hasher: Hasher<2>,
        rings: &[Vec<Vec<[f64; 2]>>],
    ) -> Self {
        debug_assert_eq!(generators.len(), rings.len());
        let mut mesh = Self::new(generators, lab, hasher);
        for (cell, cell_rings) in rings.iter().enumerate() {
            for ring in cell_rings {
                let nodes: Vec<usize> = ring.iter().map(|p| mesh.add_new_node_at(p)).collect();
                let nodes = clean_loop(nodes);
                if nodes.len() < 3 {
                    trace!("cell {cell}: dropping ring collapsed to {} nodes", nodes.len());
                    continue;
                }
                mesh.push_loop(cell, &nodes, None);
            }
        }
        mesh
    }

    /// Oriented `(tail, head)` node pair of the face reference `face` as
    /// traversed by a cell.
    pub fn oriented_edge(&self, face: i32) -> (usize, usize) {
        let (a, b) = self.edge_nodes(self.faces[positive_id(face)][0]);
        if face < 0 { (b, a) } else { (a, b) }
    }

    /// Node loops bounding a cell, following the cell's orientation. Counter
    /// clockwise loops are outer boundaries, clockwise loops are holes.
    pub fn cell_loops(&self, cell: usize) -> Vec<Vec<usize>> {
        let steps: Vec<(usize, usize)> = self.cells[cell].iter().map(|&f| self.oriented_edge(f)).collect();
        let mut outgoing: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for (k, &(tail, _)) in steps.iter().enumerate() {
            outgoing.entry(tail).or_default().push(k);
        }

        let mut used = vec![false; steps.len()];
        let mut loops = Vec::new();
        for first in 0..steps.len() {
            if used[first] {
                continue;
            }
            used[first] = true;
            let start = steps[first].0;
            let mut ring = vec![start];
            let mut node = steps[first].1;
            while node != start {
                ring.push(node);
                let next = outgoing
                    .get(&node)
                    .and_then(|out| out.iter().copied().find(|&k| !used[k]));
                let Some(k) = next else {
                    break;
                };
                used[k] = true;
                node = steps[k].1;
            }
            loops.push(ring);
        }
        loops
    }

    /// Normalized vertex rings of a cell, see [`cell_loops`](Self::cell_loops).
    pub fn cell_node_ring(&self, cell: usize) -> Vec<Vec<[f64; 2]>> {
        self.cell_loops(cell)
            .into_iter()
            .map(|ring| ring.into_iter().map(|n| self.node_position(n)).collect())
            .collect()
    }

    /// Clips every cell against the inner box. Afterwards the outer frame
    /// equals the inner box and no infinite elements remain.
    pub fn clip_to_inner_bounding_box(&mut self) -> Result<()> {
        let boundary = Boundary::from_box(&self.hasher.inner);
        *self = clip_cells(self, &boundary, ClipMode::default())?;
        Ok(())
    }
}

/// Removes consecutive repeats (including across the wrap) and spikes
/// `a, b, a` from a closed node loop.
pub(crate) fn clean_loop(mut nodes: Vec<usize>) -> Vec<usize> {
    loop {
        nodes.dedup();
        while nodes.len() > 1 && nodes.first() == nodes.last() {
            nodes.pop();
        }
        let n = nodes.len();
        if n < 3 {
            return nodes;
        }
        let Some(k) = (0..n).find(|&k| nodes[(k + n - 1) % n] == nodes[(k + 1) % n]) else {
            return nodes;
        };
        // Drop the spike tip and one copy of its base.
        let (tip, base) = (k, (k + 1) % n);
        let (hi, lo) = if tip > base { (tip, base) } else { (base, tip) };
        nodes.remove(hi);
        nodes.remove(lo);
    }
}

impl Validate for QuantTessellation<2> {
    fn validate(&self) -> Result<()> {
        self.validate_common()?;
        let fail = |msg: String| Err(TessellationError::Topology(msg));
        for (f, face) in self.faces.iter().enumerate() {
            if face.len() != 1 || face[0] < 0 {
                return fail(format!("face {f} is not a single forward edge: {face:?}"));
            }
        }
        let mut balance: FxHashMap<usize, i64> = FxHashMap::default();
        for (c, cell) in self.cells.iter().enumerate() {
            if cell.len() < 3 {
                return fail(format!("cell {c} has {} faces", cell.len()));
            }
            balance.clear();
            for &f in cell {
                let (tail, head) = self.oriented_edge(f);
                *balance.entry(tail).or_insert(0) += 1;
                *balance.entry(head).or_insert(0) -= 1;
            }
            if let Some((node, _)) = balance.iter().find(|(_, b)| **b != 0) {
                return fail(format!("cell {c} boundary is open at node {node}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::BoundingBox;
    use approx::assert_relative_eq;

    fn frame() -> (LabFrame<2>, Hasher<2>) {
        (
            LabFrame { low: [0.0, 0.0], high: [1.0, 1.0] },
            Hasher::bounded(BoundingBox::unit(), 1e-14),
        )
    }

    fn two_squares() -> QuantTessellation<2> {
        let (lab, hasher) = frame();
        QuantTessellation::from_cell_rings(
            vec![[0.25, 0.5], [0.75, 0.5]],
            lab,
            hasher,
            &[
                vec![vec![[0.0, 0.0], [0.5, 0.0], [0.5, 1.0], [0.0, 1.0]]],
                vec![vec![[0.5, 0.0], [1.0, 0.0], [1.0, 1.0], [0.5, 1.0]]],
            ],
        )
    }

    #[test]
    fn test_two_squares_share_a_face() {
        let mesh = two_squares();
        assert_eq!(mesh.validate(), Ok(()));
        assert_eq!(mesh.points.len(), 6);
        assert_eq!(mesh.faces.len(), 7);
        let face_cells = mesh.face_cells();
        let shared: Vec<_> = face_cells.iter().filter(|c| c.len() == 2).collect();
        assert_eq!(shared.len(), 1);
        // Opposite traversal directions.
        assert!((shared[0][0] < 0) != (shared[0][1] < 0));
    }

    #[test]
    fn test_cell_loops_follow_orientation() {
        let mesh = two_squares();
        let rings = mesh.cell_node_ring(1);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 4);
        assert_relative_eq!(crate::geometry::ring_signed_area(&rings[0]), 0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_cell_with_hole() {
        let (lab, hasher) = frame();
        let mesh = QuantTessellation::from_cell_rings(
            vec![[0.1, 0.1]],
            lab,
            hasher,
            &[vec![
                vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
                vec![[0.25, 0.25], [0.25, 0.75], [0.75, 0.75], [0.75, 0.25]],
            ]],
        );
        assert_eq!(mesh.validate(), Ok(()));
        let loops = mesh.cell_node_ring(0);
        assert_eq!(loops.len(), 2);
        let area: f64 = loops.iter().map(|r| crate::geometry::ring_signed_area(r)).sum();
        assert_relative_eq!(area, 0.75, epsilon = 1e-8);
        assert_relative_eq!(mesh.tessellation().cell_area(0), 0.75, epsilon = 1e-8);
    }

    #[test]
    fn test_clean_loop() {
        assert_eq!(clean_loop(vec![1, 1, 2, 3, 1]), vec![1, 2, 3]);
        assert_eq!(clean_loop(vec![0, 1, 2, 1, 3]), vec![0, 1, 3]);
        assert!(clean_loop(vec![4, 5, 4]).len() < 3);
    }

    #[test]
    fn test_open_cell_is_rejected() {
        let (lab, hasher) = frame();
        let mut mesh = QuantTessellation::new(vec![[0.5, 0.5]], lab, hasher);
        let n: Vec<usize> = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
            .iter()
            .map(|p| mesh.add_new_node_at(p))
            .collect();
        for k in 0..3 {
            let e = mesh.add_new_edge((n[k], n[k + 1]));
            let f = mesh.add_new_face(&[e as i32]);
            mesh.cells[0].push(signed_id(f, n[k] > n[k + 1]));
        }
        assert!(matches!(mesh.validate(), Err(TessellationError::Topology(_))));
    }

    #[test]
    fn test_clip_to_inner_box_drops_infinite_elements() {
        let (lab, _) = frame();
        let hasher = Hasher::new(BoundingBox::unit(), BoundingBox::new([-2.0, -2.0], [3.0, 3.0]), 1e-14);
        let mut mesh = QuantTessellation::new(vec![[0.5, 0.5]], lab, hasher);
        let nodes: Vec<usize> = [[-1.0, -1.0], [2.0, -1.0], [2.0, 2.0], [-1.0, 2.0]]
            .iter()
            .map(|p| mesh.add_new_node_at(p))
            .collect();
        mesh.push_loop(0, &nodes, Some(&[true; 4]));
        assert_eq!(mesh.inf_faces.len(), 4);

        mesh.clip_to_inner_bounding_box().unwrap();
        assert_eq!(mesh.validate(), Ok(()));
        assert!(mesh.inf_nodes.is_empty() && mesh.inf_faces.is_empty());
        assert_eq!(mesh.hasher.outer, mesh.hasher.inner);
        assert_relative_eq!(mesh.tessellation().cell_area(0), 1.0, epsilon = 1e-8);
    }
}
