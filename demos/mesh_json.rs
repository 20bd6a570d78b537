use polytess::{BoundingBox, BoxTessellator3D, DelaunayTessellator, Tessellation, Tessellator};
use rand::Rng;
use serde::Serialize;

/// Plain serializable view of a tessellation.
#[derive(Serialize)]
struct MeshJson<'a> {
    dimension: usize,
    nodes: Vec<&'a [f64]>,
    faces: &'a [Vec<usize>],
    cells: &'a [Vec<i32>],
    face_cells: &'a [Vec<i32>],
    inf_nodes: &'a [usize],
    inf_faces: &'a [usize],
}

impl<'a> MeshJson<'a> {
    fn new<const D: usize>(mesh: &'a Tessellation<D>) -> Self {
        MeshJson {
            dimension: D,
            nodes: mesh.nodes.chunks_exact(D).collect(),
            faces: &mesh.faces,
            cells: &mesh.cells,
            face_cells: &mesh.face_cells,
            inf_nodes: &mesh.inf_nodes,
            inf_faces: &mesh.inf_faces,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = rand::thread_rng();

    let generators: Vec<f64> = (0..20 * 2).map(|_| rng.gen_range(0.0..1.0)).collect();
    let mesh = DelaunayTessellator::new().tessellate_unbounded(&generators)?;
    std::fs::write("mesh_2d.json", serde_json::to_string_pretty(&MeshJson::new(&mesh))?)?;
    println!("{} cells, {} infinite faces -> mesh_2d.json", mesh.num_cells(), mesh.inf_faces.len());

    let generators: Vec<f64> = (0..50 * 3).map(|_| rng.gen_range(0.0..1.0)).collect();
    let bounds = BoundingBox::new([0.0; 3], [1.0; 3]);
    let mesh = BoxTessellator3D::for_count(50).tessellate_in_box(&generators, &bounds)?;
    std::fs::write("mesh_3d.json", serde_json::to_string(&MeshJson::new(&mesh))?)?;
    println!("{} cells, {} faces -> mesh_3d.json", mesh.num_cells(), mesh.num_faces());
    Ok(())
}
