// others
use atomic::{Atomic, Ordering};
use smallvec::SmallVec;
// vcm
use crate::core::geometry::{pnt3_distance_squared, Point3f};
use crate::core::vcm::Float;

/// Uniform spatial hash over a point set, with cell size equal to the query
/// radius so every radius query touches at most the 2x2x2 cell neighborhood
/// around its center. Rebuilt from scratch each iteration (the radius
/// shrinks progressively) and read-only afterwards.
pub struct HashGrid {
    positions: Vec<Point3f>,
    cell_starts: Vec<u32>,
    indices: Vec<u32>,
    bb_min: Point3f,
    inv_cell_size: Float,
    radius_sqr: Float,
}

impl Default for HashGrid {
    fn default() -> Self {
        HashGrid {
            positions: Vec::new(),
            cell_starts: Vec::new(),
            indices: Vec::new(),
            bb_min: Point3f::default(),
            inv_cell_size: 1.0,
            radius_sqr: 0.0,
        }
    }
}

impl HashGrid {
    pub fn new() -> Self {
        HashGrid::default()
    }
    pub fn len(&self) -> usize {
        self.positions.len()
    }
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
    pub fn radius_sqr(&self) -> Float {
        self.radius_sqr
    }
    /// Rebuilds the grid over the given positions. The counting phase runs
    /// bulk-parallel over worker chunks with atomic per-cell counters, then
    /// a serial prefix sum turns the counts into cell ranges, then the
    /// scatter phase fills the index table in parallel.
    pub fn build(&mut self, positions: Vec<Point3f>, radius: Float, workers: usize) {
        self.positions = positions;
        self.radius_sqr = radius * radius;
        self.inv_cell_size = 1.0 as Float / radius;
        let n = self.positions.len();
        if n == 0 {
            self.cell_starts.clear();
            self.indices.clear();
            return;
        }
        let mut bb_min = self.positions[0];
        for p in &self.positions {
            bb_min = Point3f::new(bb_min.x.min(p.x), bb_min.y.min(p.y), bb_min.z.min(p.z));
        }
        self.bb_min = bb_min;
        let cell_count = (n * 2).next_power_of_two();
        let counters: Vec<Atomic<u32>> = (0..cell_count).map(|_| Atomic::new(0)).collect();
        let workers = workers.max(1);
        let chunk = ((n + workers - 1) / workers).max(1);
        crossbeam::scope(|scope| {
            for pos_chunk in self.positions.chunks(chunk) {
                let counters = &counters;
                let bb_min = self.bb_min;
                let inv = self.inv_cell_size;
                scope.spawn(move |_| {
                    for p in pos_chunk {
                        let c = cell_of(p, &bb_min, inv, cell_count);
                        counters[c].fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        })
        .unwrap();
        // prefix sum: cell_starts[c] is the first slot of cell c
        let mut cell_starts = vec![0u32; cell_count + 1];
        let mut running: u32 = 0;
        for c in 0..cell_count {
            cell_starts[c] = running;
            running += counters[c].load(Ordering::Relaxed);
        }
        cell_starts[cell_count] = running;
        // scatter with per-cell cursors
        let cursors: Vec<Atomic<u32>> = cell_starts[..cell_count]
            .iter()
            .map(|s| Atomic::new(*s))
            .collect();
        let indices: Vec<Atomic<u32>> = (0..n).map(|_| Atomic::new(0)).collect();
        crossbeam::scope(|scope| {
            for (chunk_idx, pos_chunk) in self.positions.chunks(chunk).enumerate() {
                let cursors = &cursors;
                let indices = &indices;
                let bb_min = self.bb_min;
                let inv = self.inv_cell_size;
                let base = chunk_idx * chunk;
                scope.spawn(move |_| {
                    for (off, p) in pos_chunk.iter().enumerate() {
                        let c = cell_of(p, &bb_min, inv, cell_count);
                        let slot = cursors[c].fetch_add(1, Ordering::Relaxed);
                        indices[slot as usize].store((base + off) as u32, Ordering::Relaxed);
                    }
                });
            }
        })
        .unwrap();
        self.indices = indices.iter().map(|i| i.load(Ordering::Relaxed)).collect();
        self.cell_starts = cell_starts;
    }
    /// Visits every stored point within the build radius of `pos`.
    pub fn for_each_in_radius<F: FnMut(u32)>(&self, pos: &Point3f, mut visit: F) {
        if self.is_empty() {
            return;
        }
        let cell_count = self.cell_starts.len() - 1;
        let radius = self.radius_sqr.sqrt();
        let (x0, x1) = axis_range(pos.x - self.bb_min.x, radius, self.inv_cell_size);
        let (y0, y1) = axis_range(pos.y - self.bb_min.y, radius, self.inv_cell_size);
        let (z0, z1) = axis_range(pos.z - self.bb_min.z, radius, self.inv_cell_size);
        // neighboring cells may collide onto one bucket; visit each bucket once
        let mut seen: SmallVec<[usize; 32]> = SmallVec::new();
        for z in z0..=z1 {
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let c = hash_cell(x, y, z, cell_count);
                    if seen.contains(&c) {
                        continue;
                    }
                    seen.push(c);
                    let start = self.cell_starts[c] as usize;
                    let end = self.cell_starts[c + 1] as usize;
                    for idx in &self.indices[start..end] {
                        let d2 = pnt3_distance_squared(&self.positions[*idx as usize], pos);
                        if d2 <= self.radius_sqr {
                            visit(*idx);
                        }
                    }
                }
            }
        }
    }
    /// k-nearest query within the build radius. Returns the matches sorted
    /// by distance (at most `k` of them) and the squared radius that
    /// bounds them, shrunk to the kth neighbor when the candidate set
    /// overflows.
    pub fn query_knn(
        &self,
        pos: &Point3f,
        k: usize,
        out: &mut SmallVec<[(u32, Float); 32]>,
    ) -> Float {
        out.clear();
        self.for_each_in_radius(pos, |idx| {
            let d2 = pnt3_distance_squared(&self.positions[idx as usize], pos);
            out.push((idx, d2));
        });
        if out.len() > k {
            out.sort_unstable_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
            out.truncate(k);
            out.last().map(|l| l.1).unwrap_or(self.radius_sqr)
        } else {
            self.radius_sqr
        }
    }
}

/// Cells overlapped by the interval [center - radius, center + radius].
fn axis_range(center: Float, radius: Float, inv_cell_size: Float) -> (i32, i32) {
    (
        ((center - radius) * inv_cell_size).floor() as i32,
        ((center + radius) * inv_cell_size).floor() as i32,
    )
}

fn hash_cell(x: i32, y: i32, z: i32, cell_count: usize) -> usize {
    let h = (x.wrapping_mul(73_856_093)) ^ (y.wrapping_mul(19_349_663))
        ^ (z.wrapping_mul(83_492_791));
    (h as u32 as usize) & (cell_count - 1)
}

fn cell_of(p: &Point3f, bb_min: &Point3f, inv_cell_size: Float, cell_count: usize) -> usize {
    let x = ((p.x - bb_min.x) * inv_cell_size).floor() as i32;
    let y = ((p.y - bb_min.y) * inv_cell_size).floor() as i32;
    let z = ((p.z - bb_min.z) * inv_cell_size).floor() as i32;
    hash_cell(x, y, z, cell_count)
}
