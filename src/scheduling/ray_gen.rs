// vcm
use crate::core::geometry::Ray;
use crate::scheduling::queue::RayQueue;
use crate::scheduling::RayState;

/// Fills queues with fresh primary rays until its budget is exhausted. The
/// sample callback receives generator-specific coordinates (pixel x/y, ray
/// and light ids, or array element and sample index) and may decline a ray
/// by returning false.
pub trait RayGen<S> {
    fn fill_queue(
        &mut self,
        out: &RayQueue<S>,
        sample: &mut dyn FnMut(i32, i32, &mut Ray, &mut S) -> bool,
    );
    fn start_frame(&mut self);
    fn is_empty(&self) -> bool;
}

/// Generates n primary rays per pixel in range [0,0] to [w,h].
pub struct PixelRayGen {
    width: i32,
    height: i32,
    n_samples: i32,
    next: i32,
}

impl PixelRayGen {
    pub fn new(width: i32, height: i32, n_samples: i32) -> Self {
        PixelRayGen {
            width,
            height,
            n_samples,
            next: 0,
        }
    }
    fn max_rays(&self) -> i32 {
        self.width * self.height * self.n_samples
    }
}

impl<S: Copy + Default + RayState> RayGen<S> for PixelRayGen {
    fn fill_queue(
        &mut self,
        out: &RayQueue<S>,
        sample: &mut dyn FnMut(i32, i32, &mut Ray, &mut S) -> bool,
    ) {
        if self.next >= self.max_rays() {
            return;
        }
        // only request as many rays as the queue can still take
        let mut count = (out.capacity() - out.size()) as i32;
        count = count.min(self.max_rays() - self.next);
        if count <= 0 {
            return;
        }
        for i in self.next..self.next + count {
            let pixel_idx = i / self.n_samples;
            let sample_idx = i % self.n_samples;
            let x = pixel_idx % self.width;
            let y = pixel_idx / self.width;
            let mut state = S::default();
            state.set_ids(pixel_idx, sample_idx);
            let mut ray = Ray::default();
            if sample(x, y, &mut ray, &mut state) {
                out.push(ray, state);
            }
        }
        self.next += count;
    }
    fn start_frame(&mut self) {
        self.next = 0;
    }
    fn is_empty(&self) -> bool {
        self.next >= self.max_rays()
    }
}

/// Pixel generator restricted to a tile; pixel ids refer to the full image.
pub struct TiledRayGen {
    inner: PixelRayGen,
    left: i32,
    top: i32,
    full_width: i32,
}

impl TiledRayGen {
    pub fn new(
        left: i32,
        top: i32,
        width: i32,
        height: i32,
        n_samples: i32,
        full_width: i32,
    ) -> Self {
        TiledRayGen {
            inner: PixelRayGen::new(width, height, n_samples),
            left,
            top,
            full_width,
        }
    }
}

impl<S: Copy + Default + RayState> RayGen<S> for TiledRayGen {
    fn fill_queue(
        &mut self,
        out: &RayQueue<S>,
        sample: &mut dyn FnMut(i32, i32, &mut Ray, &mut S) -> bool,
    ) {
        let left = self.left;
        let top = self.top;
        let full_width = self.full_width;
        self.inner.fill_queue(out, &mut |x, y, ray, state: &mut S| {
            let gx = x + left;
            let gy = y + top;
            state.set_ids(gy * full_width + gx, state.sample_id());
            sample(gx, gy, ray, state)
        });
    }
    fn start_frame(&mut self) {
        <PixelRayGen as RayGen<S>>::start_frame(&mut self.inner);
    }
    fn is_empty(&self) -> bool {
        <PixelRayGen as RayGen<S>>::is_empty(&self.inner)
    }
}

/// Generates rays starting from the light sources; the callback picks the
/// light. Path ids stand in for pixel ids until a connection to the camera
/// assigns a real one.
pub struct LightRayGen {
    ray_count: i32,
    next: i32,
}

impl LightRayGen {
    pub fn new(ray_count: i32) -> Self {
        LightRayGen { ray_count, next: 0 }
    }
}

impl<S: Copy + Default + RayState> RayGen<S> for LightRayGen {
    fn fill_queue(
        &mut self,
        out: &RayQueue<S>,
        sample: &mut dyn FnMut(i32, i32, &mut Ray, &mut S) -> bool,
    ) {
        let mut count = (out.capacity() - out.size()) as i32;
        count = count.min(self.ray_count - self.next);
        if count <= 0 {
            return;
        }
        for i in self.next..self.next + count {
            let mut state = S::default();
            state.set_ids(i, 0);
            let mut ray = Ray::default();
            if sample(i, 0, &mut ray, &mut state) {
                out.push(ray, state);
            }
        }
        self.next += count;
    }
    fn start_frame(&mut self) {
        self.next = 0;
    }
    fn is_empty(&self) -> bool {
        self.next >= self.ray_count
    }
}

/// Generates `samples` rays for every element of an array; drives the
/// technique passes over cached vertices.
pub struct ArrayRayGen {
    len: i32,
    samples: i32,
    next: i32,
}

impl ArrayRayGen {
    pub fn new(len: usize, samples: i32) -> Self {
        ArrayRayGen {
            len: len as i32,
            samples,
            next: 0,
        }
    }
    fn total(&self) -> i32 {
        self.len * self.samples
    }
}

impl<S: Copy + Default + RayState> RayGen<S> for ArrayRayGen {
    fn fill_queue(
        &mut self,
        out: &RayQueue<S>,
        sample: &mut dyn FnMut(i32, i32, &mut Ray, &mut S) -> bool,
    ) {
        let mut count = (out.capacity() - out.size()) as i32;
        count = count.min(self.total() - self.next);
        if count <= 0 {
            return;
        }
        for i in self.next..self.next + count {
            let elem = i / self.samples;
            let sub = i % self.samples;
            let mut state = S::default();
            state.set_ids(elem, sub);
            let mut ray = Ray::default();
            if sample(elem, sub, &mut ray, &mut state) {
                out.push(ray, state);
            }
        }
        self.next += count;
    }
    fn start_frame(&mut self) {
        self.next = 0;
    }
    fn is_empty(&self) -> bool {
        self.next >= self.total()
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
    fn pixel_gen_visits_every_pixel_sample_pair() {
        let q: RayQueue<TestState> = RayQueue::new(1024);
        let mut gen = PixelRayGen::new(4, 4, 2);
        let mut visited = vec![0; 16];
        let mut sample = |x: i32, y: i32, _ray: &mut Ray, _s: &mut TestState| {
            visited[(y * 4 + x) as usize] += 1;
            true
        };
        while !<PixelRayGen as RayGen<TestState>>::is_empty(&gen) {
            gen.fill_queue(&q, &mut sample);
        }
        assert!(visited.iter().all(|v| *v == 2));
        assert_eq!(q.size(), 32);
    }

    #[test]
    fn declined_rays_are_not_pushed() {
        let q: RayQueue<TestState> = RayQueue::new(64);
        let mut gen = LightRayGen::new(10);
        let mut sample =
            |id: i32, _light: i32, _ray: &mut Ray, _s: &mut TestState| id % 2 == 0;
        gen.fill_queue(&q, &mut sample);
        assert_eq!(q.size(), 5);
        assert!(<LightRayGen as RayGen<TestState>>::is_empty(&gen));
    }

    #[test]
    fn tiled_gen_reports_full_image_pixel_ids() {
        let q: RayQueue<TestState> = RayQueue::new(64);
        // a 2x2 tile at offset (4, 2) of an 8-wide image
        let mut gen = TiledRayGen::new(4, 2, 2, 2, 1, 8);
        let mut coords = Vec::new();
        let mut sample = |x: i32, y: i32, _ray: &mut Ray, _s: &mut TestState| {
            coords.push((x, y));
            true
        };
        gen.fill_queue(&q, &mut sample);
        assert!(coords.contains(&(4, 2)));
        assert!(coords.contains(&(5, 3)));
        let mut q = q;
        let (_, _, states) = q.slices_mut();
        let mut ids: Vec<i32> = states.iter().map(|s| s.pixel).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2 * 8 + 4, 2 * 8 + 5, 3 * 8 + 4, 3 * 8 + 5]);
    }

    #[test]
    fn array_gen_enumerates_elements_and_samples() {
        let q: RayQueue<TestState> = RayQueue::new(64);
        let mut gen = ArrayRayGen::new(3, 4);
        let mut pairs = Vec::new();
        let mut sample = |elem: i32, sub: i32, _ray: &mut Ray, _s: &mut TestState| {
            pairs.push((elem, sub));
            true
        };
        gen.fill_queue(&q, &mut sample);
        assert_eq!(pairs.len(), 12);
        assert!(pairs.contains(&(2, 3)));
    }
}
