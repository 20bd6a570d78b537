use plotters::prelude::*;
use polytess::{DelaunayTessellator, Plc, Tessellation, lloyd_step, Tessellator};
use rand::Rng;

const ITERATIONS: usize = 30;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = rand::thread_rng();
    // Clustered start so the relaxation has something to do.
    let mut generators: Vec<f64> = (0..300 * 2).map(|_| rng.gen_range(0.0..40.0f64).powf(1.2)).collect();
    let (points, plc) = Plc::from_box([0.0, 0.0], [100.0, 100.0]);
    let tessellator = DelaunayTessellator::new();

    let root = SVGBackend::new("lloyd.svg", (1536, 512)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 3));

    let mut mesh = tessellator.tessellate_with_plc(&generators, &points, &plc)?;
    draw(&panels[0], &mesh, &generators, "initial")?;
    for iteration in 1..=ITERATIONS {
        generators = lloyd_step(&mesh, &generators);
        mesh = tessellator.tessellate_with_plc(&generators, &points, &plc)?;
        if iteration == 5 {
            draw(&panels[1], &mesh, &generators, "5 iterations")?;
        }
    }
    draw(&panels[2], &mesh, &generators, &format!("{ITERATIONS} iterations"))?;

    root.present()?;
    println!("Output saved to lloyd.svg");
    Ok(())
}

fn draw<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    mesh: &Tessellation<2>,
    generators: &[f64],
    caption: &str,
) -> Result<(), Box<dyn std::error::Error>>
where
    DB::ErrorType: 'static,
{
    let mut chart = ChartBuilder::on(area).caption(caption, ("sans-serif", 24)).build_cartesian_2d(0.0..100.0, 0.0..100.0)?;
    for face in &mesh.faces {
        let segment: Vec<(f64, f64)> = face.iter().map(|&n| (mesh.node(n)[0], mesh.node(n)[1])).collect();
        chart.draw_series(std::iter::once(PathElement::new(segment, BLACK.mix(0.6))))?;
    }
    let points: Vec<(f64, f64)> = generators.chunks(2).map(|c| (c[0], c[1])).collect();
    chart.draw_series(points.iter().map(|&p| Circle::new(p, 2, RED.filled())))?;
    Ok(())
}
