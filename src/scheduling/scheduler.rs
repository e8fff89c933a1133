// vcm
use crate::core::geometry::{Hit, Ray};
use crate::core::scene::Scene;
use crate::scheduling::queue::RayQueue;
use crate::scheduling::ray_gen::RayGen;
use crate::scheduling::RayState;

/// Double-buffered primary queues plus one shadow queue, driven as a
/// bulk-synchronous pipeline: fill from a generator, traverse, process hits
/// in parallel (which pushes secondaries and shadow rays), resolve the
/// shadow batch, swap buffers, repeat until the generator is exhausted and
/// no secondaries remain.
pub struct RayScheduler<S> {
    queues: Vec<RayQueue<S>>,
    shadow: RayQueue<S>,
    workers: usize,
}

impl<S: Copy + Default + RayState + Send + Sync> RayScheduler<S> {
    pub fn new(capacity: usize, workers: usize) -> Self {
        RayScheduler {
            queues: vec![RayQueue::new(capacity), RayQueue::new(capacity)],
            shadow: RayQueue::new(capacity),
            workers: workers.max(1),
        }
    }
    pub fn capacity(&self) -> usize {
        self.queues[0].capacity()
    }
    /// Runs one full pass. `process_hit` is called in parallel for every
    /// ray that hit geometry and may push follow-up rays into the out queue
    /// or the shadow queue; `process_shadow` is called for every shadow ray
    /// that reached its target.
    pub fn run_iteration(
        &mut self,
        scene: &Scene,
        gen: &mut dyn RayGen<S>,
        sample: &mut dyn FnMut(i32, i32, &mut Ray, &mut S) -> bool,
        process_hit: &(dyn Fn(&Ray, &Hit, &mut S, &RayQueue<S>, &RayQueue<S>) + Sync),
        process_shadow: &(dyn Fn(&S) + Sync),
    ) {
        gen.start_frame();
        for q in self.queues.iter_mut() {
            q.clear();
        }
        self.shadow.clear();
        let workers = self.workers;
        let mut in_q = 0usize;
        loop {
            gen.fill_queue(&self.queues[in_q], sample);
            if self.queues[in_q].size() == 0 {
                break;
            }
            // traverse, then regroup by material for coherent shading
            {
                let q = &mut self.queues[in_q];
                {
                    let (rays, hits, _) = q.slices_mut();
                    parallel_intersect(scene, rays, hits, workers);
                }
                q.compact_rays();
                let buckets = scene.material_count() + 1;
                let miss_key = buckets - 1;
                q.sort_by_material(buckets, |hit| {
                    if hit.tri_id < 0 {
                        miss_key
                    } else {
                        scene.triangle_material(hit.tri_id)
                    }
                });
            }
            {
                let (a, b) = self.queues.split_at_mut(1);
                let (q_in, q_out) = if in_q == 0 {
                    (&mut a[0], &b[0])
                } else {
                    (&mut b[0], &a[0])
                };
                let shadow = &self.shadow;
                let (rays, hits, states) = q_in.slices_mut();
                let n = rays.len();
                let chunk = chunk_size(n, workers);
                crossbeam::scope(|scope| {
                    let rays = &rays[..];
                    let hits = &hits[..];
                    for ((ray_chunk, hit_chunk), state_chunk) in rays
                        .chunks(chunk)
                        .zip(hits.chunks(chunk))
                        .zip(states.chunks_mut(chunk))
                    {
                        scope.spawn(move |_| {
                            for i in 0..ray_chunk.len() {
                                if hit_chunk[i].tri_id < 0 {
                                    continue;
                                }
                                process_hit(
                                    &ray_chunk[i],
                                    &hit_chunk[i],
                                    &mut state_chunk[i],
                                    q_out,
                                    shadow,
                                );
                            }
                        });
                    }
                })
                .unwrap();
            }
            self.queues[in_q].clear();
            if self.shadow.size() > 0 {
                self.resolve_shadow_batch(scene, process_shadow);
            }
            in_q = 1 - in_q;
        }
    }
    /// Pass over a generator that emits shadow rays directly (the
    /// technique passes); `on_visible` fires for every unoccluded ray.
    pub fn run_shadow_pass(
        &mut self,
        scene: &Scene,
        gen: &mut dyn RayGen<S>,
        sample: &mut dyn FnMut(i32, i32, &mut Ray, &mut S) -> bool,
        on_visible: &(dyn Fn(&S) + Sync),
    ) {
        gen.start_frame();
        self.shadow.clear();
        loop {
            gen.fill_queue(&self.shadow, sample);
            if self.shadow.size() == 0 {
                break;
            }
            self.resolve_shadow_batch(scene, on_visible);
        }
    }
    fn resolve_shadow_batch(&mut self, scene: &Scene, on_visible: &(dyn Fn(&S) + Sync)) {
        let workers = self.workers;
        let (rays, hits, states) = self.shadow.slices_mut();
        parallel_occluded(scene, rays, hits, workers);
        let n = rays.len();
        let chunk = chunk_size(n, workers);
        crossbeam::scope(|scope| {
            let states = &states[..];
            let hits = &hits[..];
            for (hit_chunk, state_chunk) in hits.chunks(chunk).zip(states.chunks(chunk)) {
                scope.spawn(move |_| {
                    for i in 0..hit_chunk.len() {
                        if hit_chunk[i].tri_id < 0 {
                            on_visible(&state_chunk[i]);
                        }
                    }
                });
            }
        })
        .unwrap();
        self.shadow.clear();
    }
}

fn chunk_size(n: usize, workers: usize) -> usize {
    ((n + workers - 1) / workers).max(1)
}

fn parallel_intersect(scene: &Scene, rays: &[Ray], hits: &mut [Hit], workers: usize) {
    let chunk = chunk_size(rays.len(), workers);
    crossbeam::scope(|scope| {
        for (ray_chunk, hit_chunk) in rays.chunks(chunk).zip(hits.chunks_mut(chunk)) {
            scope.spawn(move |_| scene.intersect(ray_chunk, hit_chunk));
        }
    })
    .unwrap();
}

fn parallel_occluded(scene: &Scene, rays: &[Ray], hits: &mut [Hit], workers: usize) {
    let chunk = chunk_size(rays.len(), workers);
    crossbeam::scope(|scope| {
        for (ray_chunk, hit_chunk) in rays.chunks(chunk).zip(hits.chunks_mut(chunk)) {
            scope.spawn(move |_| scene.occluded(ray_chunk, hit_chunk));
        }
    })
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{Point3f, Vector3f};
    use crate::core::material::Material;
    use crate::core::scene::Triangle;
    use crate::core::vcm::Spectrum;
    use crate::scheduling::ray_gen::PixelRayGen;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default, Copy, Clone)]
    struct TestState {
        pixel: i32,
        sample: i32,
        depth: i32,
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

    fn plane_scene() -> Scene {
        let mats = vec![Material::lambert(Spectrum::new(0.5))];
        let tris = vec![
            Triangle::flat(
                Point3f::new(-10.0, 0.0, -10.0),
                Point3f::new(10.0, 0.0, -10.0),
                Point3f::new(-10.0, 0.0, 10.0),
                0,
            ),
            Triangle::flat(
                Point3f::new(10.0, 0.0, -10.0),
                Point3f::new(10.0, 0.0, 10.0),
                Point3f::new(-10.0, 0.0, 10.0),
                0,
            ),
        ];
        Scene::new(tris, mats)
    }

    #[test]
    fn hits_are_processed_and_secondaries_resubmitted() {
        let scene = plane_scene();
        let mut sched: RayScheduler<TestState> = RayScheduler::new(256, 2);
        let mut gen = PixelRayGen::new(4, 4, 1);
        let hit_count = AtomicUsize::new(0);
        let shadow_count = AtomicUsize::new(0);
        let mut sample = |_x: i32, _y: i32, ray: &mut Ray, _s: &mut TestState| {
            *ray = Ray {
                o: Point3f::new(0.0, 1.0, 0.0),
                d: Vector3f::new(0.0, -1.0, 0.0),
                t_min: 0.0,
                t_max: std::f32::INFINITY,
            };
            true
        };
        sched.run_iteration(
            &scene,
            &mut gen,
            &mut sample,
            &|_ray, _hit, state, out, shadow| {
                hit_count.fetch_add(1, Ordering::Relaxed);
                // one bounce back up, then stop
                if state.depth == 0 {
                    let mut s = *state;
                    s.depth = 1;
                    out.push(
                        Ray {
                            o: Point3f::new(0.0, 1.0, 0.0),
                            d: Vector3f::new(0.0, -1.0, 0.0),
                            t_min: 0.0,
                            t_max: std::f32::INFINITY,
                        },
                        s,
                    );
                    // an unoccluded shadow ray pointing away from the plane
                    shadow.push(
                        Ray {
                            o: Point3f::new(0.0, 1.0, 0.0),
                            d: Vector3f::new(0.0, 1.0, 0.0),
                            t_min: 0.0,
                            t_max: 100.0,
                        },
                        s,
                    );
                }
            },
            &|_state| {
                shadow_count.fetch_add(1, Ordering::Relaxed);
            },
        );
        // 16 primaries plus 16 resubmitted secondaries
        assert_eq!(hit_count.load(Ordering::Relaxed), 32);
        assert_eq!(shadow_count.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn shadow_pass_reports_visibility() {
        let scene = plane_scene();
        let mut sched: RayScheduler<TestState> = RayScheduler::new(64, 2);
        let mut gen = crate::scheduling::ray_gen::ArrayRayGen::new(8, 1);
        let visible = AtomicUsize::new(0);
        let mut sample = |elem: i32, _sub: i32, ray: &mut Ray, _s: &mut TestState| {
            // even elements are blocked by the plane, odd ones point away
            let dir = if elem % 2 == 0 {
                Vector3f::new(0.0, -1.0, 0.0)
            } else {
                Vector3f::new(0.0, 1.0, 0.0)
            };
            *ray = Ray {
                o: Point3f::new(0.0, 1.0, 0.0),
                d: dir,
                t_min: 0.0,
                t_max: 50.0,
            };
            true
        };
        sched.run_shadow_pass(&scene, &mut gen, &mut sample, &|_s| {
            visible.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(visible.load(Ordering::Relaxed), 4);
    }
}
