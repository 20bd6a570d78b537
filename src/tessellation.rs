use crate::errors::{Result, TessellationError};

/// Index of a possibly reversed element reference.
///
/// Element references are stored as `i32`; a negative value `!i` means the
/// element `i` is traversed against its stored orientation.
#[inline]
pub fn positive_id(id: i32) -> usize {
    if id < 0 { !id as usize } else { id as usize }
}

/// Builds a signed reference to `index`, complemented when `reversed`.
#[inline]
pub fn signed_id(index: usize, reversed: bool) -> i32 {
    let id = index as i32;
    if reversed { !id } else { id }
}

/// The final polytopal mesh produced by a tessellator, in lab coordinates.
///
/// * `nodes`: flat `[x, y, (z), ...]` coordinates.
/// * `faces`: node indices per face; a 2-node segment in 2D, a cycle in 3D.
/// * `cells`: signed face references per cell; a negative entry `!f` means
///   the face is traversed against its stored orientation by this cell.
/// * `face_cells`: the one or two cells bounding each face, signed the same way.
/// * `inf_nodes`, `inf_faces`: elements lying on the synthetic bounding
///   sphere of an unbounded tessellation. Empty for bounded meshes.
/// * `neighbor_domains`, `shared_nodes`, `shared_faces`: bookkeeping for a
///   distributed layer; parallel arrays keyed by neighbouring domain id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tessellation<const D: usize> {
    pub nodes: Vec<f64>,
    pub faces: Vec<Vec<usize>>,
    pub cells: Vec<Vec<i32>>,
    pub face_cells: Vec<Vec<i32>>,
    pub inf_nodes: Vec<usize>,
    pub inf_faces: Vec<usize>,
    pub neighbor_domains: Vec<usize>,
    pub shared_nodes: Vec<Vec<usize>>,
    pub shared_faces: Vec<Vec<usize>>,
}

impl<const D: usize> Tessellation<D> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            faces: Vec::new(),
            cells: Vec::new(),
            face_cells: Vec::new(),
            inf_nodes: Vec::new(),
            inf_faces: Vec::new(),
            neighbor_domains: Vec::new(),
            shared_nodes: Vec::new(),
            shared_faces: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.faces.is_empty() && self.cells.is_empty()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len() / D
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Coordinates of node `index`.
    pub fn node(&self, index: usize) -> [f64; D] {
        std::array::from_fn(|j| self.nodes[index * D + j])
    }

    /// Sorted list of cells touching each node.
    pub fn compute_node_cells(&self) -> Vec<Vec<usize>> {
        let mut node_cells = vec![Vec::new(); self.num_nodes()];
        for (icell, cell) in self.cells.iter().enumerate() {
            for &face in cell {
                for &node in &self.faces[positive_id(face)] {
                    node_cells[node].push(icell);
                }
            }
        }
        for cells in &mut node_cells {
            cells.sort_unstable();
            cells.dedup();
        }
        node_cells
    }

    /// Sorted list of nodes of each cell.
    pub fn compute_cell_nodes(&self) -> Vec<Vec<usize>> {
        self.cells
            .iter()
            .map(|cell| {
                let mut nodes: Vec<usize> = cell
                    .iter()
                    .flat_map(|&face| self.faces[positive_id(face)].iter().copied())
                    .collect();
                nodes.sort_unstable();
                nodes.dedup();
                nodes
            })
            .collect()
    }

    /// Faces bounding only a single cell.
    pub fn exterior_faces(&self) -> Vec<usize> {
        (0..self.faces.len())
            .filter(|&f| self.face_cells[f].len() == 1)
            .collect()
    }

    /// Nodes lying on an exterior face, sorted.
    pub fn exterior_nodes(&self) -> Vec<usize> {
        let mut nodes: Vec<usize> = self
            .exterior_faces()
            .into_iter()
            .flat_map(|f| self.faces[f].iter().copied())
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    /// Records the nodes and faces shared with a neighbouring domain.
    ///
    /// Domains are kept sorted; registering a domain twice replaces its lists.
    pub fn add_neighbor_domain(&mut self, domain: usize, mut nodes: Vec<usize>, mut faces: Vec<usize>) {
        nodes.sort_unstable();
        nodes.dedup();
        faces.sort_unstable();
        faces.dedup();
        match self.neighbor_domains.binary_search(&domain) {
            Ok(k) => {
                self.shared_nodes[k] = nodes;
                self.shared_faces[k] = faces;
            }
            Err(k) => {
                self.neighbor_domains.insert(k, domain);
                self.shared_nodes.insert(k, nodes);
                self.shared_faces.insert(k, faces);
            }
        }
    }

    pub fn shared_nodes_with(&self, domain: usize) -> Option<&[usize]> {
        let k = self.neighbor_domains.binary_search(&domain).ok()?;
        Some(&self.shared_nodes[k])
    }

    pub fn shared_faces_with(&self, domain: usize) -> Option<&[usize]> {
        let k = self.neighbor_domains.binary_search(&domain).ok()?;
        Some(&self.shared_faces[k])
    }

    /// Deletes every cell whose mask entry is `false`, together with the nodes
    /// and faces no longer used by a remaining cell. Survivors are renumbered in
    /// their original order and keep their orientation.
    pub fn delete_cells(&mut self, keep: &[bool]) -> Result<()> {
        if keep.len() != self.cells.len() {
            return Err(TessellationError::CellMaskLength { len: keep.len(), cells: self.cells.len() });
        }

        let mut node_mask = vec![false; self.num_nodes()];
        let mut face_mask = vec![false; self.faces.len()];
        for (cell, _) in self.cells.iter().zip(keep).filter(|(_, k)| **k) {
            for &face in cell {
                let f = positive_id(face);
                face_mask[f] = true;
                for &node in &self.faces[f] {
                    node_mask[node] = true;
                }
            }
        }

        let renumber = |mask: &[bool]| -> Vec<Option<usize>> {
            let mut next = 0;
            mask.iter()
                .map(|&m| {
                    m.then(|| {
                        next += 1;
                        next - 1
                    })
                })
                .collect()
        };
        let new_node = renumber(&node_mask);
        let new_face = renumber(&face_mask);
        let new_cell = renumber(keep);

        let nodes = std::mem::take(&mut self.nodes);
        self.nodes = nodes
            .chunks_exact(D)
            .zip(&node_mask)
            .filter(|(_, m)| **m)
            .flat_map(|(p, _)| p.iter().copied())
            .collect();

        let faces = std::mem::take(&mut self.faces);
        let face_cells = std::mem::take(&mut self.face_cells);
        for ((face, cells), _) in faces.into_iter().zip(face_cells).zip(&face_mask).filter(|(_, m)| **m) {
            self.faces.push(face.iter().filter_map(|&n| new_node[n]).collect());
            self.face_cells.push(
                cells
                    .iter()
                    .filter_map(|&c| new_cell[positive_id(c)].map(|i| signed_id(i, c < 0)))
                    .collect(),
            );
        }

        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .map(|(cell, _)| {
                cell.iter()
                    .filter_map(|&f| new_face[positive_id(f)].map(|i| signed_id(i, f < 0)))
                    .collect()
            })
            .collect();

        self.inf_nodes = self.inf_nodes.iter().filter_map(|&n| new_node[n]).collect();
        self.inf_faces = self.inf_faces.iter().filter_map(|&f| new_face[f]).collect();
        for nodes in &mut self.shared_nodes {
            *nodes = nodes.iter().filter_map(|&n| new_node[n]).collect();
        }
        for faces in &mut self.shared_faces {
            *faces = faces.iter().filter_map(|&f| new_face[f]).collect();
        }
        Ok(())
    }

    /// Oriented node pairs of the faces of a cell, in cell traversal order.
    fn oriented_faces(&self, cell: usize) -> impl Iterator<Item = Vec<usize>> + '_ {
        self.cells[cell].iter().map(move |&f| {
            let mut nodes = self.faces[positive_id(f)].clone();
            if f < 0 {
                nodes.reverse();
            }
            nodes
        })
    }
}

impl Tessellation<2> {
    /// Centroid and signed area of a cell, summed over its oriented edges so
    /// cells with holes or several loops are handled too.
    pub fn cell_centroid_and_area(&self, cell: usize) -> ([f64; 2], f64) {
        let mut origin = None;
        let mut cx = 0.0;
        let mut cy = 0.0;
        let mut area = 0.0;
        for edge in self.oriented_faces(cell) {
            let p = self.node(edge[0]);
            let q = self.node(edge[1]);
            let o = *origin.get_or_insert(p);
            let (px, py) = (p[0] - o[0], p[1] - o[1]);
            let (qx, qy) = (q[0] - o[0], q[1] - o[1]);
            let cross = px * qy - qx * py;
            area += cross;
            cx += (px + qx) * cross;
            cy += (py + qy) * cross;
        }
        let Some(o) = origin else {
            return ([0.0, 0.0], 0.0);
        };
        if area == 0.0 {
            return (o, 0.0);
        }
        let factor = 1.0 / (3.0 * area);
        ([o[0] + cx * factor, o[1] + cy * factor], 0.5 * area)
    }

    pub fn cell_area(&self, cell: usize) -> f64 {
        self.cell_centroid_and_area(cell).1
    }

    pub fn cell_centroid(&self, cell: usize) -> [f64; 2] {
        self.cell_centroid_and_area(cell).0
    }
}

impl Tessellation<3> {
    /// Signed volume of a cell; positive when its faces are oriented outward.
    pub fn cell_volume(&self, cell: usize) -> f64 {
        let mut volume = 0.0;
        for face in self.oriented_faces(cell) {
            if face.len() < 3 {
                continue;
            }
            let v0 = self.node(face[0]);
            for k in 1..face.len() - 1 {
                let v1 = self.node(face[k]);
                let v2 = self.node(face[k + 1]);
                volume += v0[0] * (v1[1] * v2[2] - v1[2] * v2[1])
                    + v0[1] * (v1[2] * v2[0] - v1[0] * v2[2])
                    + v0[2] * (v1[0] * v2[1] - v1[1] * v2[0]);
            }
        }
        volume / 6.0
    }
}
