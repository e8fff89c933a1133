// std
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
// vcm
use crate::core::geometry::{Hit, Ray};
use crate::scheduling::RayState;

/// Fixed-capacity set of rays for traversal, with their hits and states in
/// parallel arrays. `push` reserves a slot by atomic increment so any number
/// of workers can emit secondary and shadow rays concurrently; exclusive
/// phases (traversal, sorting) go through `slices_mut`.
///
/// Overflow is a sizing bug, not a runtime condition: the capacity must
/// cover the worst case and `push` panics past it.
pub struct RayQueue<S> {
    rays: Vec<UnsafeCell<Ray>>,
    hits: Vec<UnsafeCell<Hit>>,
    states: Vec<UnsafeCell<S>>,
    end: AtomicUsize,
}

// Safety: concurrent access is only ever `push`, and each push writes the
// unique slot index it reserved from `end`.
unsafe impl<S: Send> Sync for RayQueue<S> {}

impl<S: Copy + Default> RayQueue<S> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        let mut rays = Vec::with_capacity(capacity);
        let mut hits = Vec::with_capacity(capacity);
        let mut states = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            rays.push(UnsafeCell::new(Ray::default()));
            hits.push(UnsafeCell::new(Hit::default()));
            states.push(UnsafeCell::new(S::default()));
        }
        RayQueue {
            rays,
            hits,
            states,
            end: AtomicUsize::new(0),
        }
    }
    pub fn capacity(&self) -> usize {
        self.rays.len()
    }
    pub fn size(&self) -> usize {
        self.end.load(Ordering::Acquire).min(self.capacity())
    }
    pub fn clear(&mut self) {
        *self.end.get_mut() = 0;
    }
    /// Adds a single secondary or shadow ray to the queue. Thread-safe.
    pub fn push(&self, ray: Ray, state: S) -> usize {
        let id = self.end.fetch_add(1, Ordering::AcqRel);
        assert!(id < self.capacity(), "ray queue overflow");
        unsafe {
            *self.rays[id].get() = ray;
            *self.hits[id].get() = Hit::default();
            *self.states[id].get() = state;
        }
        id
    }
    /// Exclusive view of the live prefix of all three arrays.
    pub fn slices_mut(&mut self) -> (&mut [Ray], &mut [Hit], &mut [S]) {
        let n = self.size();
        // Safety: &mut self guarantees no concurrent pushes; the first `n`
        // slots are initialized.
        unsafe {
            (
                std::slice::from_raw_parts_mut(self.rays.as_ptr() as *mut Ray, n),
                std::slice::from_raw_parts_mut(self.hits.as_ptr() as *mut Hit, n),
                std::slice::from_raw_parts_mut(self.states.as_ptr() as *mut S, n),
            )
        }
    }
}

impl<S: Copy + Default + RayState> RayQueue<S> {
    /// Drops entries whose state was marked dead (negative pixel id),
    /// keeping ray/hit/state triples together.
    pub fn compact_rays(&mut self) {
        let (rays, hits, states) = self.slices_mut();
        let mut write = 0usize;
        for read in 0..states.len() {
            if states[read].pixel_id() < 0 {
                continue;
            }
            if write != read {
                rays[write] = rays[read];
                hits[write] = hits[read];
                states[write] = states[read];
            }
            write += 1;
        }
        *self.end.get_mut() = write;
    }
    /// Counting sort of the queue by a small integer key (material id of
    /// the hit triangle) so that subsequent shading batches touch coherent
    /// material data. Misses should be keyed to `buckets - 1`.
    pub fn sort_by_material<F>(&mut self, buckets: usize, key: F)
    where
        F: Fn(&Hit) -> usize,
    {
        let (rays, hits, states) = self.slices_mut();
        let n = rays.len();
        if n <= 1 {
            return;
        }
        let mut counts = vec![0usize; buckets + 1];
        for hit in hits.iter() {
            let k = key(hit);
            debug_assert!(k < buckets);
            counts[k + 1] += 1;
        }
        for b in 1..counts.len() {
            counts[b] += counts[b - 1];
        }
        let mut sorted_rays = vec![Ray::default(); n];
        let mut sorted_hits = vec![Hit::default(); n];
        let mut sorted_states = vec![S::default(); n];
        for i in 0..n {
            let k = key(&hits[i]);
            let dst = counts[k];
            counts[k] += 1;
            sorted_rays[dst] = rays[i];
            sorted_hits[dst] = hits[i];
            sorted_states[dst] = states[i];
        }
        rays.copy_from_slice(&sorted_rays);
        hits.copy_from_slice(&sorted_hits);
        states.copy_from_slice(&sorted_states);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Copy, Clone)]
    struct TestState {
        pixel: i32,
        sample: i32,
    }

    impl RayState for TestState {
        fn pixel_id(&self) -> i32 {
            self.pixel
        }
        fn sample_id(&self) -> i32 {
            self.sample
        }
        fn set_ids(&mut self, pixel_id: i32, sample_id: i32) {
            self.pixel = pixel_id;
            self.sample = sample_id;
        }
    }

    #[test]
    fn concurrent_pushes_reserve_unique_slots() {
        let q: RayQueue<TestState> = RayQueue::new(4096);
        crossbeam::scope(|scope| {
            for t in 0..4 {
                let q = &q;
                scope.spawn(move |_| {
                    for i in 0..1024 {
                        q.push(
                            Ray::default(),
                            TestState {
                                pixel: t * 1024 + i,
                                sample: 0,
                            },
                        );
                    }
                });
            }
        })
        .unwrap();
        let mut q = q;
        assert_eq!(q.size(), 4096);
        let (_, _, states) = q.slices_mut();
        let mut seen: Vec<i32> = states.iter().map(|s| s.pixel).collect();
        seen.sort_unstable();
        for (i, v) in seen.iter().enumerate() {
            assert_eq!(*v, i as i32);
        }
    }

    #[test]
    fn compact_drops_dead_states() {
        let mut q: RayQueue<TestState> = RayQueue::new(16);
        for i in 0..8 {
            let pixel = if i % 2 == 0 { i } else { -1 };
            q.push(Ray::default(), TestState { pixel, sample: 0 });
        }
        q.compact_rays();
        assert_eq!(q.size(), 4);
        let (_, _, states) = q.slices_mut();
        assert!(states.iter().all(|s| s.pixel >= 0));
    }

    #[test]
    fn counting_sort_groups_by_key() {
        let mut q: RayQueue<TestState> = RayQueue::new(16);
        let keys = [2, 0, 1, 2, 0, 1, 0];
        for (i, k) in keys.iter().enumerate() {
            q.push(Ray::default(), TestState { pixel: i as i32, sample: 0 });
            let (_, hits, _) = q.slices_mut();
            hits[i].tri_id = *k;
        }
        q.sort_by_material(3, |h| h.tri_id as usize);
        let (_, hits, _) = q.slices_mut();
        let sorted: Vec<i32> = hits.iter().map(|h| h.tri_id).collect();
        assert_eq!(sorted, vec![0, 0, 0, 1, 1, 2, 2]);
    }

    #[test]
    #[should_panic(expected = "ray queue overflow")]
    fn overflow_is_fatal() {
        let q: RayQueue<TestState> = RayQueue::new(2);
        for _ in 0..3 {
            q.push(Ray::default(), TestState::default());
        }
    }
}
