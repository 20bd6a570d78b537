use crate::algorithm::SpatialAlgorithm;
use crate::bounds::BoundingBox;

/// A spatial index based on a uniform grid for 3D space.
///
/// Generators are binned into `nx * ny * nz` voxels; neighbour searches walk
/// the bins in order of their minimum distance from the generator's bin.
pub struct AlgorithmGrid3D {
    /// Number of bins along each axis.
    pub grid_res: [usize; 3],
    /// Scale factor from coordinate to grid index, per axis.
    pub grid_scale: [f64; 3],
    /// Maximum valid fractional index, per axis.
    pub grid_limit: [f64; 3],
    /// Minimum corner of the grid bounds.
    pub min: [f64; 3],
    /// The grid bins, each containing a list of generator indices.
    pub grid_bins: Vec<Vec<usize>>,
    /// Map from generator index to its bin index.
    pub generator_bin_ids: Vec<usize>,
    /// Precomputed search order: bin offset and its minimum squared distance.
    pub bin_search_order: Vec<([isize; 3], f64)>,
}

impl AlgorithmGrid3D {
    /// Creates a new grid with the given resolution over `bounds`.
    pub fn new(nx: usize, ny: usize, nz: usize, bounds: &BoundingBox<3>) -> Self {
        let grid_res = [nx.max(1), ny.max(1), nz.max(1)];
        let grid_scale: [f64; 3] = std::array::from_fn(|j| grid_res[j] as f64 / bounds.extent(j));
        let cell_size: [f64; 3] = std::array::from_fn(|j| 1.0 / grid_scale[j]);

        let min_dist_sq = |offset: [isize; 3]| -> f64 {
            (0..3)
                .map(|j| {
                    let bins = if offset[j] > 0 {
                        (offset[j] - 1) as f64
                    } else if offset[j] < 0 {
                        (-offset[j] - 1) as f64
                    } else {
                        0.0
                    };
                    let gap = bins * cell_size[j];
                    gap * gap
                })
                .sum()
        };

        let [rx, ry, rz] = grid_res.map(|r| r as isize);
        let mut bin_search_order = Vec::with_capacity(((2 * rx + 1) * (2 * ry + 1) * (2 * rz + 1)) as usize);
        for z in -rz..=rz {
            for y in -ry..=ry {
                for x in -rx..=rx {
                    let offset = [x, y, z];
                    bin_search_order.push((offset, min_dist_sq(offset)));
                }
            }
        }
        bin_search_order.sort_unstable_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        AlgorithmGrid3D {
            grid_res,
            grid_scale,
            grid_limit: grid_res.map(|r| r as f64 - 1e-5),
            min: bounds.min,
            grid_bins: vec![Vec::new(); grid_res.iter().product()],
            generator_bin_ids: Vec::new(),
            bin_search_order,
        }
    }

    fn bin_coords(&self, pos: &[f64; 3]) -> [usize; 3] {
        std::array::from_fn(|j| ((pos[j] - self.min[j]) * self.grid_scale[j]).clamp(0.0, self.grid_limit[j]) as usize)
    }

    /// Linear index of the bin containing `pos`.
    pub fn get_bin_index(&self, pos: &[f64; 3]) -> usize {
        let [ix, iy, iz] = self.bin_coords(pos);
        ix + iy * self.grid_res[0] + iz * self.grid_res[0] * self.grid_res[1]
    }
}

impl SpatialAlgorithm<3> for AlgorithmGrid3D {
    fn set_generators(&mut self, generators: &[f64], bounds: &BoundingBox<3>) {
        self.min = bounds.min;
        self.grid_bins.iter_mut().for_each(|bin| bin.clear());
        self.generator_bin_ids.clear();
        for (i, p) in generators.chunks_exact(3).enumerate() {
            let bin = self.get_bin_index(&[p[0], p[1], p[2]]);
            self.grid_bins[bin].push(i);
            self.generator_bin_ids.push(bin);
        }
    }

    fn visit_neighbors<F>(&self, generators: &[f64], index: usize, pos: [f64; 3], max_dist_sq: &mut f64, mut visitor: F)
    where
        F: FnMut(usize, [f64; 3], f64) -> f64,
    {
        let [nx, ny, nz] = self.grid_res;
        let home = self.bin_coords(&pos);
        let cell_size: [f64; 3] = std::array::from_fn(|j| 1.0 / self.grid_scale[j]);
        let rel: [f64; 3] = std::array::from_fn(|j| (pos[j] - self.min[j]) * self.grid_scale[j] - home[j] as f64);

        for &(offset, min_d2) in &self.bin_search_order {
            if min_d2 > 4.0 * *max_dist_sq {
                break;
            }
            let b: [isize; 3] = std::array::from_fn(|j| home[j] as isize + offset[j]);
            if b[0] < 0 || b[0] >= nx as isize || b[1] < 0 || b[1] >= ny as isize || b[2] < 0 || b[2] >= nz as isize {
                continue;
            }

            // Exact distance from the generator to the candidate bin.
            let bin_d2: f64 = (0..3)
                .map(|j| {
                    let d: f64 = if offset[j] > 0 {
                        (offset[j] as f64 - rel[j]) * cell_size[j]
                    } else if offset[j] < 0 {
                        (-(offset[j] + 1) as f64 + rel[j]) * cell_size[j]
                    } else {
                        0.0
                    };
                    d.max(0.0) * d.max(0.0)
                })
                .sum();
            if bin_d2 > 4.0 * *max_dist_sq {
                continue;
            }

            let bin_index = b[0] as usize + b[1] as usize * nx + b[2] as usize * nx * ny;
            for &j in &self.grid_bins[bin_index] {
                if j == index {
                    continue;
                }
                let other = [generators[j * 3], generators[j * 3 + 1], generators[j * 3 + 2]];
                *max_dist_sq = visitor(j, other, *max_dist_sq);
            }
        }
    }
}
