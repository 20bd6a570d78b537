use polytess::{
    BoundingBox, ClipMode, DelaunayTessellator, Plc, Tessellation, TessellationError, Tessellator, TessellatorConfig,
    positive_id,
};
use geo::{Area, ConvexHull, MultiPoint};
use rand::prelude::*;
use rand::rngs::StdRng;

fn lattice(n: usize, size: f64) -> Vec<f64> {
    let step = size / n as f64;
    let mut generators = Vec::with_capacity(2 * n * n);
    for y in 0..n {
        for x in 0..n {
            generators.push((x as f64 + 0.5) * step);
            generators.push((y as f64 + 0.5) * step);
        }
    }
    generators
}

fn total_area(mesh: &Tessellation<2>) -> f64 {
    (0..mesh.num_cells()).map(|c| mesh.cell_area(c)).sum()
}

/// Even-odd test of `p` against the oriented edges of `cell`.
fn cell_contains(mesh: &Tessellation<2>, cell: usize, p: [f64; 2]) -> bool {
    let mut inside = false;
    for &f in &mesh.cells[cell] {
        let face = &mesh.faces[positive_id(f)];
        let (a, b) = (mesh.node(face[0]), mesh.node(face[1]));
        if (a[1] > p[1]) != (b[1] > p[1]) && p[0] < a[0] + (p[1] - a[1]) * (b[0] - a[0]) / (b[1] - a[1]) {
            inside = !inside;
        }
    }
    inside
}

/// Every generator lies in its own cell, and every sample point of `bounds`
/// lies in the cell of its nearest generator unless it sits on a bisector.
fn assert_voronoi_cells(mesh: &Tessellation<2>, generators: &[f64], bounds: &BoundingBox<2>, samples: usize) {
    let points: Vec<[f64; 2]> = generators.chunks_exact(2).map(|g| [g[0], g[1]]).collect();
    for (cell, &g) in points.iter().enumerate() {
        assert!(cell_contains(mesh, cell, g), "generator {cell} at {g:?} is outside its cell");
    }
    for i in 0..samples {
        for j in 0..samples {
            let q = [
                bounds.min[0] + (i as f64 + 0.5) / samples as f64 * (bounds.max[0] - bounds.min[0]),
                bounds.min[1] + (j as f64 + 0.5) / samples as f64 * (bounds.max[1] - bounds.min[1]),
            ];
            let mut by_distance: Vec<(f64, usize)> = points
                .iter()
                .enumerate()
                .map(|(c, g)| (((g[0] - q[0]).powi(2) + (g[1] - q[1]).powi(2)).sqrt(), c))
                .collect();
            by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));
            if by_distance.len() > 1 && by_distance[1].0 - by_distance[0].0 < 1e-6 {
                continue;
            }
            let nearest = by_distance[0].1;
            assert!(cell_contains(mesh, nearest, q), "{q:?} is not in the cell of its nearest generator {nearest}");
        }
    }
}

/// Every face bounds one or two cells, and a face shared by two cells is
/// traversed in opposite directions by them.
fn assert_consistent(mesh: &Tessellation<2>) {
    for (f, cells) in mesh.face_cells.iter().enumerate() {
        assert!(!cells.is_empty() && cells.len() <= 2, "face {f} bounds {} cells", cells.len());
        if let [a, b] = cells[..] {
            assert_ne!(a < 0, b < 0, "face {f} has the same orientation in both cells");
        }
        for &c in cells {
            let cell = &mesh.cells[positive_id(c)];
            assert!(cell.iter().any(|&g| positive_id(g) == f && (g < 0) == (c < 0)));
        }
    }
}

#[test]
fn test_unit_square_four_cells() {
    let generators = [0.25, 0.25, 0.75, 0.25, 0.25, 0.75, 0.75, 0.75];
    let bounds = BoundingBox::new([0.0, 0.0], [1.0, 1.0]);
    let mesh = DelaunayTessellator::new().tessellate_in_box(&generators, &bounds).unwrap();

    assert_eq!(mesh.num_cells(), 4);
    assert_eq!(mesh.num_nodes(), 9);
    assert_eq!(mesh.num_faces(), 12);
    for cell in 0..4 {
        assert!((mesh.cell_area(cell) - 0.25).abs() < 1e-9, "cell {cell} area {}", mesh.cell_area(cell));
        let c = mesh.cell_centroid(cell);
        assert!((c[0] - generators[2 * cell]).abs() < 1e-9);
        assert!((c[1] - generators[2 * cell + 1]).abs() < 1e-9);
    }
    assert_eq!(mesh.exterior_faces().len(), 8);
    assert!(mesh.inf_faces.is_empty());
    assert_consistent(&mesh);

    let node_cells = mesh.compute_node_cells();
    let center = (0..mesh.num_nodes())
        .find(|&n| {
            let p = mesh.node(n);
            (p[0] - 0.5).abs() < 1e-9 && (p[1] - 0.5).abs() < 1e-9
        })
        .unwrap();
    assert_eq!(node_cells[center], vec![0, 1, 2, 3]);
}

#[test]
fn test_lattice_matches_grid() {
    let n = 6;
    let size = 3.0;
    let generators = lattice(n, size);
    let bounds = BoundingBox::new([0.0, 0.0], [size, size]);
    for mode in [ClipMode::Exact, ClipMode::Float] {
        let tessellator = DelaunayTessellator::new().with_config(TessellatorConfig::default().with_clip_mode(mode));
        let mesh = tessellator.tessellate_in_box(&generators, &bounds).unwrap();
        assert_eq!(mesh.num_cells(), n * n);
        assert_eq!(mesh.num_nodes(), (n + 1) * (n + 1));
        assert_eq!(mesh.num_faces(), 2 * n * (n + 1));
        let cell_area = (size / n as f64).powi(2);
        for cell in 0..n * n {
            assert!((mesh.cell_area(cell) - cell_area).abs() < 1e-8);
            assert_eq!(mesh.cells[cell].len(), 4);
        }
        assert_consistent(&mesh);

        // Interior nodes touch 4 cells, edge nodes 2 and corner nodes 1.
        let node_cells = mesh.compute_node_cells();
        for node in 0..mesh.num_nodes() {
            let p = mesh.node(node);
            let on_sides = p.iter().filter(|&&x| x.abs() < 1e-9 || (x - size).abs() < 1e-9).count();
            let expected = [4, 2, 1][on_sides];
            assert_eq!(node_cells[node].len(), expected, "node {node} at {p:?}");
        }
    }
}

#[test]
fn test_perturbed_lattice_covers_box() {
    let mut rng = StdRng::seed_from_u64(7);
    let n = 8;
    let step = 1.0 / n as f64;
    let generators: Vec<f64> = lattice(n, 1.0).into_iter().map(|c| c + rng.gen_range(-0.3..0.3) * step).collect();
    let bounds = BoundingBox::new([0.0, 0.0], [1.0, 1.0]);
    let mesh = DelaunayTessellator::new().tessellate_in_box(&generators, &bounds).unwrap();

    assert_eq!(mesh.num_cells(), n * n);
    assert!((total_area(&mesh) - 1.0).abs() < 1e-8);
    assert!((0..mesh.num_cells()).all(|c| mesh.cell_area(c) > 0.0));
    assert_consistent(&mesh);
    // Clip containment: no node leaves the box.
    for node in 0..mesh.num_nodes() {
        let p = mesh.node(node);
        assert!(p.iter().all(|&x| (-1e-9..=1.0 + 1e-9).contains(&x)), "node {node} at {p:?}");
    }
}

#[test]
fn test_random_points_in_hull() {
    let mut rng = StdRng::seed_from_u64(42);
    let generators: Vec<f64> = (0..200).map(|_| rng.gen_range(-5.0..5.0)).collect();
    let mesh = DelaunayTessellator::new().tessellate(&generators).unwrap();
    assert_eq!(mesh.num_cells(), 100);
    assert!((0..mesh.num_cells()).all(|c| mesh.cell_area(c) > 0.0));
    assert_consistent(&mesh);

    let hull = MultiPoint::from(generators.chunks_exact(2).map(|g| (g[0], g[1])).collect::<Vec<_>>()).convex_hull();
    assert!((total_area(&mesh) - hull.unsigned_area()).abs() < 1e-5, "area {}", total_area(&mesh));
    // Hull generators sit on their cell boundary, so step slightly inwards.
    let inward = |g: f64, c: f64| g + 1e-6 * (c - g);
    for (cell, g) in generators.chunks_exact(2).enumerate() {
        let p = [inward(g[0], 0.0), inward(g[1], 0.0)];
        assert!(cell_contains(&mesh, cell, p), "generator {cell} is outside its cell");
    }
}

#[test]
fn test_random_points_in_box_are_voronoi() {
    let bounds = BoundingBox::new([0.0, 0.0], [1.0, 1.0]);
    let mut rng = StdRng::seed_from_u64(12345);
    for mode in [ClipMode::Exact, ClipMode::Float] {
        let tessellator = DelaunayTessellator::new().with_config(TessellatorConfig::default().with_clip_mode(mode));
        for trial in 0..20 {
            let generators: Vec<f64> = (0..60).map(|_| rng.gen_range(0.0..1.0)).collect();
            let mesh = tessellator.tessellate_in_box(&generators, &bounds).unwrap();
            assert!((total_area(&mesh) - 1.0).abs() < 1e-8, "trial {trial}: area {}", total_area(&mesh));
            assert_consistent(&mesh);
            assert_voronoi_cells(&mesh, &generators, &bounds, 25);
        }
    }
}

#[test]
fn test_flat_triangle_in_box() {
    let generators = [0.0, 0.0, 1.0, 0.0, 0.5, 0.05];
    let bounds = BoundingBox::new([-0.1, -0.5], [1.1, 0.5]);
    let mesh = DelaunayTessellator::new().tessellate_in_box(&generators, &bounds).unwrap();
    assert_eq!(mesh.num_cells(), 3);
    assert!((total_area(&mesh) - 1.2).abs() < 1e-8);
    // Below the generators the bisector of 0 and 2 leans right of x = 0.25.
    assert!(cell_contains(&mesh, 0, [0.28, -0.45]));
    assert_voronoi_cells(&mesh, &generators, &bounds, 30);
}

#[test]
fn test_collinear_generators() {
    let generators = [0.1, 0.1, 0.5, 0.5, 0.3, 0.3, 0.9, 0.9, 0.7, 0.7];
    let bounds = BoundingBox::new([0.0, 0.0], [1.0, 1.0]);
    let tessellator = DelaunayTessellator::new();

    let mesh = tessellator.tessellate_in_box(&generators, &bounds).unwrap();
    assert_eq!(mesh.num_cells(), 5);
    assert!((total_area(&mesh) - 1.0).abs() < 1e-8);
    // Cells mirrored across the middle bisector have equal areas.
    assert!((mesh.cell_area(2) - mesh.cell_area(4)).abs() < 1e-8);
    assert!((mesh.cell_area(0) - mesh.cell_area(3)).abs() < 1e-8);
    assert_consistent(&mesh);

    // Without a box the cells fill the square spanned by the generators.
    let hull = tessellator.tessellate(&generators).unwrap();
    assert!((total_area(&hull) - 0.64).abs() < 1e-8);
}

#[test]
fn test_two_generators_and_one() {
    let bounds = BoundingBox::new([0.0, 0.0], [2.0, 1.0]);
    let tessellator = DelaunayTessellator::new();
    let two = tessellator.tessellate_in_box(&[0.5, 0.5, 1.5, 0.5], &bounds).unwrap();
    assert_eq!(two.num_cells(), 2);
    assert!((two.cell_area(0) - 1.0).abs() < 1e-8);
    assert_eq!(two.face_cells.iter().filter(|c| c.len() == 2).count(), 1);

    let one = tessellator.tessellate_in_box(&[0.3, 0.6], &bounds).unwrap();
    assert_eq!(one.num_cells(), 1);
    assert_eq!(one.num_nodes(), 4);
    assert!((one.cell_area(0) - 2.0).abs() < 1e-8);
}

#[test]
fn test_plc_with_hole_conserves_area() {
    let points = [
        0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, // outer
        0.4, 0.4, 0.6, 0.4, 0.6, 0.6, 0.4, 0.6, // hole
    ];
    let plc = Plc::<2>::ring(4).with_hole_ring(4, 4);
    let generators: Vec<f64> = lattice(5, 1.0)
        .chunks_exact(2)
        .filter(|p| !(p[0] > 0.35 && p[0] < 0.65 && p[1] > 0.35 && p[1] < 0.65))
        .flatten()
        .copied()
        .collect();
    assert_eq!(generators.len(), 48);

    for mode in [ClipMode::Exact, ClipMode::Float] {
        let tessellator = DelaunayTessellator::new().with_config(TessellatorConfig::default().with_clip_mode(mode));
        let mesh = tessellator.tessellate_with_plc(&generators, &points, &plc).unwrap();
        assert_eq!(mesh.num_cells(), 24);
        assert!((total_area(&mesh) - 0.96).abs() < 1e-8, "area {}", total_area(&mesh));
        assert_consistent(&mesh);
        // The hole edges are exterior faces.
        let hole_faces = mesh
            .exterior_faces()
            .into_iter()
            .filter(|&f| {
                mesh.faces[f].iter().all(|&n| {
                    let p = mesh.node(n);
                    (0.39..=0.61).contains(&p[0]) && (0.39..=0.61).contains(&p[1])
                })
            })
            .count();
        assert!(hole_faces >= 4);
    }
}

#[test]
fn test_unbounded_infinite_markers() {
    let mut rng = StdRng::seed_from_u64(3);
    let generators: Vec<f64> = (0..40).map(|_| rng.gen_range(0.0..1.0)).collect();
    let mesh = DelaunayTessellator::new().tessellate_unbounded(&generators).unwrap();
    assert_eq!(mesh.num_cells(), 20);
    assert!(!mesh.inf_faces.is_empty());
    // Only the closing arcs bound a single cell.
    assert_eq!(mesh.exterior_faces(), mesh.inf_faces);
    for &node in &mesh.inf_nodes {
        let p = mesh.node(node);
        assert!(p[0] < 0.0 || p[0] > 1.0 || p[1] < 0.0 || p[1] > 1.0, "infinite node {node} at {p:?}");
    }
    assert_consistent(&mesh);
    assert_voronoi_cells(&mesh, &generators, &BoundingBox::new([0.0, 0.0], [1.0, 1.0]), 20);
}

#[test]
fn test_delete_cells_opens_interior() {
    let generators = lattice(3, 3.0);
    let bounds = BoundingBox::new([0.0, 0.0], [3.0, 3.0]);
    let mut mesh = DelaunayTessellator::new().tessellate_in_box(&generators, &bounds).unwrap();
    assert_eq!(mesh.num_faces(), 24);
    assert_eq!(mesh.exterior_faces().len(), 12);

    let keep: Vec<bool> = (0..9).map(|c| c != 4).collect();
    mesh.delete_cells(&keep).unwrap();
    assert_eq!(mesh.num_cells(), 8);
    assert_eq!(mesh.num_nodes(), 16);
    assert_eq!(mesh.num_faces(), 24);
    assert_eq!(mesh.exterior_faces().len(), 16);
    assert!((total_area(&mesh) - 8.0).abs() < 1e-8);
    assert_consistent(&mesh);
}

#[test]
fn test_rejects_duplicates() {
    let generators = [0.1, 0.1, 0.5, 0.9, 0.1, 0.1];
    assert_eq!(
        DelaunayTessellator::new().tessellate(&generators),
        Err(TessellationError::DuplicateGenerator { first: 0, second: 2 })
    );
}
