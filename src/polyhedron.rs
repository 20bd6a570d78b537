use crate::bounds::BoundingBox;

/// Vertices closer than this to a clipping plane count as lying on it.
const PLANE_TOLERANCE: f64 = 1e-12;

/// Scratch buffers reused between clips.
#[derive(Default, Clone)]
pub struct PolyhedronScratch {
    vertices: Vec<f64>,
    face_counts: Vec<u16>,
    face_indices: Vec<u32>,
    dists: Vec<f64>,
    is_intersection: Vec<bool>,
    old_to_new: Vec<Option<u32>>,
    intersection_map: Vec<(u64, u32)>,
    lid_segments: Vec<(u32, u32)>,
    face_buffer: Vec<u32>,
    lid_buffer: Vec<u32>,
    lid_map: Vec<u32>,
}

/// A convex polyhedron stored as a vertex array and outward oriented faces.
///
/// Faces list their vertices counter-clockwise when seen from outside.
#[derive(Clone, Debug, Default)]
pub struct Polyhedron {
    // Flat array of vertices [x, y, z, x, y, z, ...]
    pub(crate) vertices: Vec<f64>,
    // Number of vertices for each face
    pub(crate) face_counts: Vec<u16>,
    // Flattened indices for all faces
    pub(crate) face_indices: Vec<u32>,
}

impl Polyhedron {
    /// The box as a hexahedron.
    pub fn from_box(bounds: &BoundingBox<3>) -> Polyhedron {
        let [x0, y0, z0] = bounds.min;
        let [x1, y1, z1] = bounds.max;
        let vertices = vec![
            x0, y0, z0, // 0
            x1, y0, z0, // 1
            x1, y1, z0, // 2
            x0, y1, z0, // 3
            x0, y0, z1, // 4
            x1, y0, z1, // 5
            x1, y1, z1, // 6
            x0, y1, z1, // 7
        ];
        let face_indices = vec![
            3, 2, 1, 0, // z-
            4, 5, 6, 7, // z+
            0, 1, 5, 4, // y-
            2, 3, 7, 6, // y+
            0, 4, 7, 3, // x-
            1, 2, 6, 5, // x+
        ];
        Polyhedron { vertices, face_counts: vec![4; 6], face_indices }
    }

    /// Builds a polyhedron from explicit vertices and outward oriented face loops.
    pub fn from_faces(vertices: &[[f64; 3]], faces: &[Vec<usize>]) -> Polyhedron {
        Polyhedron {
            vertices: vertices.iter().flat_map(|v| v.iter().copied()).collect(),
            face_counts: faces.iter().map(|f| f.len() as u16).collect(),
            face_indices: faces.iter().flat_map(|f| f.iter().map(|&i| i as u32)).collect(),
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn vertex(&self, index: usize) -> [f64; 3] {
        [self.vertices[index * 3], self.vertices[index * 3 + 1], self.vertices[index * 3 + 2]]
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertex loops of all faces.
    pub fn faces(&self) -> Vec<Vec<usize>> {
        let mut faces = Vec::with_capacity(self.face_counts.len());
        let mut offset = 0;
        for &count in &self.face_counts {
            let count = count as usize;
            faces.push(self.face_indices[offset..offset + count].iter().map(|&i| i as usize).collect());
            offset += count;
        }
        faces
    }

    pub fn volume(&self) -> f64 {
        let mut volume = 0.0;
        for face in self.faces() {
            if face.len() < 3 {
                continue;
            }
            let v0 = self.vertex(face[0]);
            for k in 1..face.len() - 1 {
                let v1 = self.vertex(face[k]);
                let v2 = self.vertex(face[k + 1]);
                volume += v0[0] * (v1[1] * v2[2] - v1[2] * v2[1])
                    + v0[1] * (v1[2] * v2[0] - v1[0] * v2[2])
                    + v0[2] * (v1[0] * v2[1] - v1[1] * v2[0]);
            }
        }
        (volume / 6.0).abs()
    }

    /// Squared distance from `center` to the furthest vertex.
    pub fn max_radius_sq(&self, center: &[f64; 3]) -> f64 {
        self.vertices
            .chunks_exact(3)
            .map(|v| (v[0] - center[0]).powi(2) + (v[1] - center[1]).powi(2) + (v[2] - center[2]).powi(2))
            .fold(0.0, f64::max)
    }

    fn intersection_vertex(
        &self,
        idx_s: usize,
        idx_e: usize,
        d_s: f64,
        d_e: f64,
        scratch: &mut PolyhedronScratch,
        generator: Option<&[f64; 3]>,
        max_d2: &mut f64,
    ) -> u32 {
        let key = if idx_s < idx_e {
            (idx_s as u64) << 32 | idx_e as u64
        } else {
            (idx_e as u64) << 32 | idx_s as u64
        };
        if let Some(&(_, id)) = scratch.intersection_map.iter().find(|&&(k, _)| k == key) {
            return id;
        }
        // Interpolate from the lower index so both faces sharing the edge agree.
        let (a, b, da, db) = if idx_s < idx_e { (idx_s, idx_e, d_s, d_e) } else { (idx_e, idx_s, d_e, d_s) };
        let t = (da / (da - db)).clamp(0.0, 1.0);
        let pa = self.vertex(a);
        let pb = self.vertex(b);
        let p: [f64; 3] = std::array::from_fn(|j| pa[j] + t * (pb[j] - pa[j]));
        if let Some(g) = generator {
            let d2 = (p[0] - g[0]).powi(2) + (p[1] - g[1]).powi(2) + (p[2] - g[2]).powi(2);
            if d2 > *max_d2 {
                *max_d2 = d2;
            }
        }
        let new_idx = (scratch.vertices.len() / 3) as u32;
        scratch.vertices.extend_from_slice(&p);
        scratch.is_intersection.push(true);
        scratch.intersection_map.push((key, new_idx));
        new_idx
    }

    /// Cuts away the part of the polyhedron on the positive side of the plane
    /// through `point` with normal `normal`, closing the hole with a new face.
    ///
    /// Returns `(true, new_max_radius_sq)` if the polyhedron changed, where the
    /// radius is measured from `generator` when given, or `(false, 0.0)`.
    pub fn clip(
        &mut self,
        point: &[f64; 3],
        normal: &[f64; 3],
        scratch: &mut PolyhedronScratch,
        generator: Option<&[f64; 3]>,
    ) -> (bool, f64) {
        let num_verts = self.num_vertices();
        scratch.dists.clear();
        let mut all_inside = true;
        let mut all_outside = true;

        // 1. Signed distances
        for i in 0..num_verts {
            let v = self.vertex(i);
            let d = (v[0] - point[0]) * normal[0] + (v[1] - point[1]) * normal[1] + (v[2] - point[2]) * normal[2];
            scratch.dists.push(d);
            if d > PLANE_TOLERANCE {
                all_inside = false;
            } else if d < -PLANE_TOLERANCE {
                all_outside = false;
            }
        }

        if all_inside {
            return (false, 0.0);
        }
        if all_outside {
            self.vertices.clear();
            self.face_counts.clear();
            self.face_indices.clear();
            return (true, 0.0);
        }

        // 2. Keep the vertices inside
        scratch.vertices.clear();
        scratch.face_counts.clear();
        scratch.face_indices.clear();
        scratch.is_intersection.clear();
        scratch.old_to_new.clear();
        scratch.old_to_new.resize(num_verts, None);
        scratch.intersection_map.clear();
        scratch.lid_segments.clear();
        scratch.lid_map.clear();

        let mut max_d2 = 0.0;
        for i in 0..num_verts {
            if scratch.dists[i] <= PLANE_TOLERANCE {
                let v = self.vertex(i);
                scratch.old_to_new[i] = Some((scratch.vertices.len() / 3) as u32);
                scratch.vertices.extend_from_slice(&v);
                scratch.is_intersection.push(false);
                if let Some(g) = generator {
                    let d2 = (v[0] - g[0]).powi(2) + (v[1] - g[1]).powi(2) + (v[2] - g[2]).powi(2);
                    if d2 > max_d2 {
                        max_d2 = d2;
                    }
                }
            }
        }

        // 3. Clip each face
        let mut index_offset = 0;
        for face_idx in 0..self.face_counts.len() {
            let count = self.face_counts[face_idx] as usize;
            scratch.face_buffer.clear();
            for i in 0..count {
                let idx_s = self.face_indices[index_offset + i] as usize;
                let idx_e = self.face_indices[index_offset + (i + 1) % count] as usize;
                let d_s = scratch.dists[idx_s];
                let d_e = scratch.dists[idx_e];
                let s_in = d_s <= PLANE_TOLERANCE;
                let e_in = d_e <= PLANE_TOLERANCE;

                if s_in && e_in {
                    if let Some(idx) = scratch.old_to_new[idx_e] {
                        scratch.face_buffer.push(idx);
                    }
                } else if s_in {
                    // Leaving: intersection only
                    let idx = self.intersection_vertex(idx_s, idx_e, d_s, d_e, scratch, generator, &mut max_d2);
                    scratch.face_buffer.push(idx);
                } else if e_in {
                    // Entering: intersection then the end vertex
                    let idx = self.intersection_vertex(idx_s, idx_e, d_s, d_e, scratch, generator, &mut max_d2);
                    scratch.face_buffer.push(idx);
                    if let Some(idx) = scratch.old_to_new[idx_e] {
                        scratch.face_buffer.push(idx);
                    }
                }
            }
            index_offset += count;

            if scratch.face_buffer.len() >= 3 {
                scratch.face_counts.push(scratch.face_buffer.len() as u16);
                let n = scratch.face_buffer.len();
                for i in 0..n {
                    let u = scratch.face_buffer[i];
                    let v = scratch.face_buffer[(i + 1) % n];
                    if scratch.is_intersection[u as usize] && scratch.is_intersection[v as usize] {
                        // Reversed for the lid
                        scratch.lid_segments.push((v, u));
                    }
                }
                scratch.face_indices.extend_from_slice(&scratch.face_buffer);
            }
        }

        // 4. Close the hole with the lid face
        if !scratch.lid_segments.is_empty() {
            scratch.lid_buffer.clear();
            scratch.lid_map.resize(scratch.vertices.len() / 3, u32::MAX);
            for &(u, v) in &scratch.lid_segments {
                scratch.lid_map[u as usize] = v;
            }
            let (start, next) = scratch.lid_segments[0];
            scratch.lid_buffer.push(start);
            let mut current = next;
            while current != start && current != u32::MAX && scratch.lid_buffer.len() <= scratch.lid_segments.len() {
                scratch.lid_buffer.push(current);
                current = scratch.lid_map[current as usize];
            }
            if scratch.lid_buffer.len() >= 3 {
                scratch.face_counts.push(scratch.lid_buffer.len() as u16);
                scratch.face_indices.extend_from_slice(&scratch.lid_buffer);
            }
        }

        std::mem::swap(&mut self.vertices, &mut scratch.vertices);
        std::mem::swap(&mut self.face_counts, &mut scratch.face_counts);
        std::mem::swap(&mut self.face_indices, &mut scratch.face_indices);

        (true, max_d2)
    }

    /// Clips against the six faces of `bounds`.
    pub fn clip_to_box(&mut self, bounds: &BoundingBox<3>, scratch: &mut PolyhedronScratch) {
        for axis in 0..3 {
            let mut normal = [0.0; 3];
            normal[axis] = -1.0;
            self.clip(&bounds.min, &normal, scratch, None);
            normal[axis] = 1.0;
            self.clip(&bounds.max, &normal, scratch, None);
        }
    }
}
