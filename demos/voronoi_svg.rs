use std::collections::HashMap;

use plotters::prelude::*;
use polytess::{BoundingBox, DelaunayTessellator, Plc, Tessellation, Tessellator, positive_id};
use rand::Rng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = rand::thread_rng();
    let generators: Vec<f64> = (0..500 * 2).map(|_| rng.gen_range(0.0..100.0)).collect();
    let tessellator = DelaunayTessellator::new();

    let mesh = tessellator.tessellate_in_box(&generators, &BoundingBox::new([0.0, 0.0], [100.0, 100.0]))?;
    draw("voronoi_box.svg", &mesh, &generators)?;

    let mesh = tessellator.tessellate(&generators)?;
    draw("voronoi_hull.svg", &mesh, &generators)?;

    // A square with a square hole; generators inside the hole are dropped.
    let points = [
        0.0, 0.0, 100.0, 0.0, 100.0, 100.0, 0.0, 100.0, 30.0, 30.0, 70.0, 30.0, 70.0, 70.0, 30.0, 70.0,
    ];
    let plc = Plc::<2>::ring(4).with_hole_ring(4, 4);
    let outside: Vec<f64> = generators
        .chunks_exact(2)
        .filter(|p| !(30.0..=70.0).contains(&p[0]) || !(30.0..=70.0).contains(&p[1]))
        .flatten()
        .copied()
        .collect();
    let mesh = tessellator.tessellate_with_plc(&outside, &points, &plc)?;
    draw("voronoi_hole.svg", &mesh, &outside)?;
    Ok(())
}

/// Closed node loops of a cell, chained from its oriented faces.
fn cell_loops(mesh: &Tessellation<2>, cell: usize) -> Vec<Vec<(f64, f64)>> {
    let mut next: HashMap<usize, usize> = mesh.cells[cell]
        .iter()
        .map(|&f| {
            let face = &mesh.faces[positive_id(f)];
            if f < 0 { (face[1], face[0]) } else { (face[0], face[1]) }
        })
        .collect();
    let mut loops = Vec::new();
    while let Some(&start) = next.keys().next() {
        let mut ring = Vec::new();
        let mut node = start;
        while let Some(to) = next.remove(&node) {
            let p = mesh.node(node);
            ring.push((p[0], p[1]));
            node = to;
        }
        loops.push(ring);
    }
    loops
}

fn draw(filename: &str, mesh: &Tessellation<2>, generators: &[f64]) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(filename, (1024, 1024)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root).build_cartesian_2d(-5.0..105.0, -5.0..105.0)?;

    for cell in 0..mesh.num_cells() {
        for ring in cell_loops(mesh, cell) {
            chart.draw_series(std::iter::once(Polygon::new(ring, BLUE.mix(0.1).filled())))?;
        }
    }
    for face in &mesh.faces {
        let segment: Vec<(f64, f64)> = face.iter().map(|&n| (mesh.node(n)[0], mesh.node(n)[1])).collect();
        chart.draw_series(std::iter::once(PathElement::new(segment, BLACK.mix(0.5))))?;
    }
    let points: Vec<(f64, f64)> = generators.chunks(2).map(|c| (c[0], c[1])).collect();
    chart.draw_series(points.iter().map(|&p| Circle::new(p, 2, RED.filled())))?;

    root.present()?;
    println!("Output saved to {}", filename);
    Ok(())
}
