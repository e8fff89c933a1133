// std
use std::sync::{Mutex, MutexGuard};
// vcm
use crate::core::interaction::Intersection;
use crate::core::vcm::{Float, Spectrum};
use crate::integrators::mis::PartialMis;

/// Material id of synthetic light-endpoint vertices; they are stored for
/// bookkeeping only (path_len == 1) and skipped by every technique.
pub const NO_MATERIAL: usize = usize::MAX;

/// One non-specular subpath vertex, immutable once stored. `ancestor` is
/// the cache index of the previous non-specular vertex of the same path
/// (-1 past a specular parent or at the subpath start).
#[derive(Debug, Copy, Clone)]
pub struct CachedVertex {
    pub isect: Intersection,
    pub throughput: Spectrum,
    pub path_len: i32,
    pub pixel_id: i32,
    pub mis: PartialMis,
    pub continue_prob: Float,
    pub ancestor: i32,
}

/// Append-only vertex store shared by all workers of a tracing pass.
/// Appends return stable indices; the buffer grows as needed and is
/// cleared at the start of each iteration.
pub struct VertexCache {
    verts: Mutex<Vec<CachedVertex>>,
}

impl VertexCache {
    pub fn new() -> Self {
        VertexCache {
            verts: Mutex::new(Vec::new()),
        }
    }
    pub fn with_capacity(capacity: usize) -> Self {
        VertexCache {
            verts: Mutex::new(Vec::with_capacity(capacity)),
        }
    }
    pub fn clear(&self) {
        self.verts.lock().unwrap().clear();
    }
    pub fn len(&self) -> usize {
        self.verts.lock().unwrap().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn add(&self, vertex: CachedVertex) -> i32 {
        let mut verts = self.verts.lock().unwrap();
        verts.push(vertex);
        (verts.len() - 1) as i32
    }
    /// Read access for the technique passes; tracing must have finished.
    pub fn read(&self) -> MutexGuard<'_, Vec<CachedVertex>> {
        self.verts.lock().unwrap()
    }
}

impl Default for VertexCache {
    fn default() -> Self {
        VertexCache::new()
    }
}
