//! The deferred vertex-connection-and-merging integrator.
//!
//! Each iteration traces all camera and light subpaths first, recording
//! their non-specular vertices, then runs the combination techniques as
//! separate passes over the caches: path tracing (emissive hits plus
//! next-event estimation), light tracing (connections to the camera),
//! vertex connections between the caches, and vertex merging against a
//! photon grid built from the light vertices. All passes write into one
//! atomic image, so their order is irrelevant.

// others
use log::debug;
use smallvec::SmallVec;
// vcm
use crate::accelerators::HashGrid;
use crate::cameras::PerspectiveCamera;
use crate::core::geometry::{nrm_abs_dot_vec3, nrm_dot_vec3, vec3_dot_vec3, Hit, Ray};
use crate::core::image::AtomicImage;
use crate::core::interaction::{hemispheres_agree, shading_normal_adjoint, Intersection};
use crate::core::rng::{bernstein_seed, Rng};
use crate::core::sampling::cosine_hemisphere_pdf;
use crate::core::scene::Scene;
use crate::core::vcm::{Float, Spectrum, RAY_OFFSET};
use crate::integrators::mis::{self, MisContext, PartialMis};
use crate::integrators::vertices::{CachedVertex, VertexCache, NO_MATERIAL};
use crate::integrators::{russian_roulette, ConfigError, Mode, Settings};
use crate::scheduling::{ArrayRayGen, LightRayGen, PixelRayGen, RayQueue, RayScheduler, RayState};

/// Exponent parameter of the progressive radius schedule.
pub const RADIUS_ALPHA: Float = 0.75;

/// Merge radius for the given 1-based iteration:
/// `r_i = r_base * i^(-0.5 * (1 - alpha))`, clamped for numerical
/// stability.
pub fn progressive_radius(base_radius: Float, iteration: u32) -> Float {
    let r = base_radius
        / (iteration as Float).powf(0.5 as Float * (1.0 as Float - RADIUS_ALPHA));
    r.max(1e-7)
}

/// Per-ray state of an in-flight subpath.
#[derive(Debug, Copy, Clone)]
pub struct PathState {
    pub throughput: Spectrum,
    /// Vertices of the subpath so far; the camera or light endpoint is
    /// vertex 1.
    pub path_length: i32,
    pub pixel_id: i32,
    pub sample_id: i32,
    pub rng: Rng,
    /// Russian-roulette acceptance probability of the previous bounce.
    pub continue_prob: Float,
    pub mis: PartialMis,
    pub is_finite_light: bool,
    /// Cache index of the previous non-specular vertex, -1 after a delta
    /// event.
    pub ancestor: i32,
}

impl Default for PathState {
    fn default() -> Self {
        PathState {
            throughput: Spectrum::default(),
            path_length: 1,
            pixel_id: -1,
            sample_id: 0,
            rng: Rng::default(),
            continue_prob: 1.0,
            mis: PartialMis::default(),
            is_finite_light: true,
            ancestor: -1,
        }
    }
}

impl RayState for PathState {
    fn pixel_id(&self) -> i32 {
        self.pixel_id
    }
    fn sample_id(&self) -> i32 {
        self.sample_id
    }
    fn set_ids(&mut self, pixel_id: i32, sample_id: i32) {
        self.pixel_id = pixel_id;
        self.sample_id = sample_id;
    }
}

/// State of a technique-pass shadow ray: the contribution it will add if
/// the connection turns out unoccluded.
#[derive(Debug, Copy, Clone)]
pub struct ShadowState {
    pub pixel_id: i32,
    pub sample_id: i32,
    pub contrib: Spectrum,
    pub rng: Rng,
}

impl Default for ShadowState {
    fn default() -> Self {
        ShadowState {
            pixel_id: -1,
            sample_id: 0,
            contrib: Spectrum::default(),
            rng: Rng::default(),
        }
    }
}

impl RayState for ShadowState {
    fn pixel_id(&self) -> i32 {
        self.pixel_id
    }
    fn sample_id(&self) -> i32 {
        self.sample_id
    }
    fn set_ids(&mut self, pixel_id: i32, sample_id: i32) {
        self.pixel_id = pixel_id;
        self.sample_id = sample_id;
    }
}

// rng stream salts so the passes draw independent sequences
const STREAM_CAMERA: u32 = 0;
const STREAM_LIGHT: u32 = 1;
const STREAM_NEE: u32 = 2;
const STREAM_CONNECT: u32 = 3;

pub struct VcmIntegrator<'s> {
    scene: &'s Scene,
    camera: PerspectiveCamera,
    settings: Settings,
    workers: usize,
    cur_iteration: u32,
    pm_radius: Float,
    mis_ctx: MisContext,
    cam_verts: VertexCache,
    light_verts: VertexCache,
    photon_grid: HashGrid,
    trace_sched: RayScheduler<PathState>,
    shadow_sched: RayScheduler<ShadowState>,
}

impl<'s> VcmIntegrator<'s> {
    pub fn new(
        scene: &'s Scene,
        camera: PerspectiveCamera,
        settings: Settings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        if camera.width() != settings.width || camera.height() != settings.height {
            return Err(ConfigError::ResolutionMismatch {
                cam_w: camera.width(),
                cam_h: camera.height(),
                width: settings.width,
                height: settings.height,
            });
        }
        let workers = if settings.num_threads == 0 {
            num_cpus::get()
        } else {
            settings.num_threads
        };
        let capacity = settings.queue_capacity();
        Ok(VcmIntegrator {
            scene,
            camera,
            settings,
            workers,
            cur_iteration: 0,
            pm_radius: settings.base_radius,
            mis_ctx: MisContext::new(
                settings.mode,
                settings.base_radius,
                settings.light_path_count as Float,
            ),
            cam_verts: VertexCache::with_capacity(capacity),
            light_verts: VertexCache::with_capacity(capacity),
            photon_grid: HashGrid::new(),
            trace_sched: RayScheduler::new(capacity, workers),
            shadow_sched: RayScheduler::new(capacity, workers),
        })
    }
    pub fn iteration(&self) -> u32 {
        self.cur_iteration
    }
    /// Merge radius used by the most recent iteration.
    pub fn radius(&self) -> Float {
        self.pm_radius
    }
    /// Renders one progressive iteration into the accumulator.
    pub fn render(&mut self, img: &AtomicImage) {
        self.cur_iteration += 1;
        self.pm_radius = progressive_radius(self.settings.base_radius, self.cur_iteration);
        self.mis_ctx = MisContext::new(
            self.settings.mode,
            self.pm_radius,
            self.settings.light_path_count as Float,
        );
        self.cam_verts.clear();
        self.light_verts.clear();
        let mode = self.settings.mode;
        debug!(
            "iteration {}: radius {} mode {:?}",
            self.cur_iteration, self.pm_radius, mode
        );
        if mode.trace_camera_paths() {
            self.trace_camera_paths();
        }
        if mode.trace_light_paths() {
            self.trace_light_paths();
        }
        if mode.use_merge() {
            self.build_photon_grid();
        }
        debug!(
            "iteration {}: {} camera and {} light vertices",
            self.cur_iteration,
            self.cam_verts.len(),
            self.light_verts.len()
        );
        if mode.trace_camera_paths() {
            self.path_tracing(img);
        }
        if mode.use_lt() {
            self.light_tracing(img);
        }
        if mode.use_connect() {
            self.connect(img);
        }
        if mode.use_merge() {
            self.merge(img);
        }
    }
    fn trace_camera_paths(&mut self) {
        let scene = self.scene;
        let camera = &self.camera;
        let ctx = self.mis_ctx;
        let settings = self.settings;
        let cache = &self.cam_verts;
        let iteration = self.cur_iteration;
        let mut gen = PixelRayGen::new(settings.width, settings.height, 1);
        let mut sample = |x: i32, y: i32, ray: &mut Ray, state: &mut PathState| -> bool {
            state.rng = Rng::new(bernstein_seed(
                iteration,
                state.pixel_id as u32,
                state.sample_id as u32,
                STREAM_CAMERA,
            ));
            let sx = x as Float + state.rng.uniform_float();
            let sy = y as Float + state.rng.uniform_float();
            *ray = camera.generate_ray(sx, sy);
            let pdf_cam_w = camera.pdf(&ray.d);
            if pdf_cam_w <= 0.0 as Float {
                return false;
            }
            state.throughput = Spectrum::new(1.0);
            state.path_length = 1;
            state.continue_prob = 1.0;
            state.is_finite_light = true;
            state.ancestor = -1;
            state.mis = PartialMis::init_camera(ctx.light_path_count, pdf_cam_w);
            true
        };
        let process = |ray: &Ray,
                       hit: &Hit,
                       state: &mut PathState,
                       out: &RayQueue<PathState>,
                       _shadow: &RayQueue<PathState>| {
            process_hits(scene, &ctx, &settings, cache, ray, hit, state, out, false);
        };
        self.trace_sched
            .run_iteration(scene, &mut gen, &mut sample, &process, &|_s| {});
    }
    fn trace_light_paths(&mut self) {
        let scene = self.scene;
        if scene.light_count() == 0 || self.settings.light_path_count == 0 {
            return;
        }
        let ctx = self.mis_ctx;
        let settings = self.settings;
        let cache = &self.light_verts;
        let iteration = self.cur_iteration;
        let pdf_lightpick = 1.0 as Float / scene.light_count() as Float;
        let mut gen = LightRayGen::new(settings.light_path_count);
        let mut sample = |ray_id: i32, _unused: i32, ray: &mut Ray, state: &mut PathState| -> bool {
            state.rng = Rng::new(bernstein_seed(
                iteration,
                ray_id as u32,
                0,
                STREAM_LIGHT,
            ));
            let light_i = state
                .rng
                .uniform_uint32_bounded(scene.light_count() as u32) as usize;
            let light = scene.light(light_i);
            let emit = light.sample_emit(&mut state.rng);
            if emit.pdf_emit_w <= 0.0 as Float || emit.radiance.is_black() {
                return false;
            }
            *ray = Ray {
                o: emit.pos,
                d: emit.dir,
                t_min: RAY_OFFSET,
                t_max: std::f32::INFINITY,
            };
            state.throughput = emit.radiance / pdf_lightpick;
            state.path_length = 1;
            state.continue_prob = 1.0;
            state.is_finite_light = light.is_finite();
            state.mis = PartialMis::init_light(
                emit.pdf_emit_w,
                emit.pdf_direct_a,
                pdf_lightpick,
                emit.cos_out,
                light.is_delta(),
                &ctx,
            );
            // store the emission point for bookkeeping; never connected
            state.ancestor = cache.add(CachedVertex {
                isect: Intersection {
                    pos: emit.pos,
                    out_dir: -emit.dir,
                    mat: NO_MATERIAL,
                    ..Intersection::default()
                },
                throughput: state.throughput,
                path_len: 1,
                pixel_id: state.pixel_id,
                mis: state.mis,
                continue_prob: 1.0,
                ancestor: -1,
            });
            true
        };
        let process = |ray: &Ray,
                       hit: &Hit,
                       state: &mut PathState,
                       out: &RayQueue<PathState>,
                       _shadow: &RayQueue<PathState>| {
            process_hits(scene, &ctx, &settings, cache, ray, hit, state, out, true);
        };
        self.trace_sched
            .run_iteration(scene, &mut gen, &mut sample, &process, &|_s| {});
    }
    fn build_photon_grid(&mut self) {
        let positions: Vec<_> = {
            let verts = self.light_verts.read();
            verts.iter().map(|v| v.isect.pos).collect()
        };
        self.photon_grid.build(positions, self.pm_radius, self.workers);
    }
    /// Emissive-hit crediting and next-event estimation over the cached
    /// camera vertices.
    fn path_tracing(&mut self, img: &AtomicImage) {
        let scene = self.scene;
        let ctx = self.mis_ctx;
        let settings = self.settings;
        let iteration = self.cur_iteration;
        let verts = self.cam_verts.read();
        if verts.is_empty() {
            return;
        }
        let verts: &[CachedVertex] = &verts;
        let pdf_lightpick_inv = scene.light_count() as Float;
        let mut gen = ArrayRayGen::new(verts.len(), 1);
        let mut sample = |vert_id: i32, _sub: i32, ray: &mut Ray, state: &mut ShadowState| -> bool {
            let v = &verts[vert_id as usize];
            let mut mv = scene.eval_material(&v.isect, false);
            mv.bsdf.prepare(&v.throughput, &v.isect.out_dir);
            if !mv.emit.is_black() {
                // a light source was hit directly; add the weighted
                // contribution and stop, the path never continued
                let cos_out = nrm_dot_vec3(&v.isect.normal, &v.isect.out_dir);
                if cos_out <= 0.0 as Float {
                    return false;
                }
                let pdf_direct_a = 1.0 as Float / v.isect.area;
                let pdf_emit_w = pdf_direct_a * cosine_hemisphere_pdf(cos_out);
                let weight = mis::weight_hit(
                    &ctx,
                    &v.mis,
                    pdf_direct_a,
                    pdf_emit_w,
                    1.0 as Float / pdf_lightpick_inv,
                    v.path_len,
                );
                img.add(v.pixel_id, v.throughput * mv.emit * weight);
                return false;
            }
            if !ctx.mode.use_nee() || scene.light_count() == 0 {
                return false;
            }
            // the shadow segment extends the path by one edge
            if v.path_len > settings.max_path_len {
                return false;
            }
            state.rng = Rng::new(bernstein_seed(
                iteration,
                vert_id as u32,
                0,
                STREAM_NEE,
            ));
            let light_i = state
                .rng
                .uniform_uint32_bounded(scene.light_count() as u32) as usize;
            let light = scene.light(light_i);
            let sample = light.sample_direct(&v.isect.pos, &mut state.rng);
            if sample.radiance.is_black() || sample.pdf_direct_w <= 0.0 as Float {
                return false;
            }
            if !hemispheres_agree(&v.isect.normal, &v.isect.geom_normal, &sample.dir) {
                return false;
            }
            let bsdf_value = mv.bsdf.eval(&v.isect.out_dir, &sample.dir);
            if bsdf_value.is_black() {
                return false;
            }
            let pdf_fwd_w = mv.bsdf.pdf(&v.isect.out_dir, &sample.dir);
            let pdf_rev_w = mv.bsdf.pdf(&sample.dir, &v.isect.out_dir);
            if pdf_fwd_w == 0.0 as Float || pdf_rev_w == 0.0 as Float {
                return false;
            }
            let cos_to_light = nrm_abs_dot_vec3(&v.isect.normal, &sample.dir);
            let weight = mis::weight_nee(
                &ctx,
                &v.mis,
                pdf_fwd_w,
                pdf_rev_w,
                sample.pdf_direct_w,
                sample.pdf_emit_w,
                pdf_lightpick_inv,
                cos_to_light,
                sample.cos_out,
                light.is_delta(),
                v.continue_prob,
            );
            *ray = Ray {
                o: v.isect.pos,
                d: sample.dir,
                t_min: RAY_OFFSET,
                t_max: sample.distance - RAY_OFFSET,
            };
            state.pixel_id = v.pixel_id;
            state.contrib = v.throughput
                * bsdf_value
                * sample.radiance
                * (cos_to_light * weight * pdf_lightpick_inv);
            true
        };
        self.shadow_sched
            .run_shadow_pass(scene, &mut gen, &mut sample, &|s: &ShadowState| {
                img.add(s.pixel_id, s.contrib);
            });
    }
    /// Connects cached light vertices to the camera.
    fn light_tracing(&mut self, img: &AtomicImage) {
        let scene = self.scene;
        let camera = &self.camera;
        let ctx = self.mis_ctx;
        let settings = self.settings;
        let verts = self.light_verts.read();
        if verts.is_empty() {
            return;
        }
        let verts: &[CachedVertex] = &verts;
        let mut gen = ArrayRayGen::new(verts.len(), 1);
        let mut sample = |vert_id: i32, _sub: i32, ray: &mut Ray, state: &mut ShadowState| -> bool {
            let v = &verts[vert_id as usize];
            // never connect the emission point itself; direct visibility is
            // the hit technique's job
            if v.path_len <= 1 || v.path_len > settings.max_path_len {
                return false;
            }
            let mut dir_to_cam = camera.pos() - v.isect.pos;
            if vec3_dot_vec3(&-dir_to_cam, &camera.dir()) < 0.0 as Float {
                return false; // vertex is behind the camera
            }
            let raster = camera.world_to_raster(&v.isect.pos);
            let pixel_id = camera.raster_to_id(raster);
            if pixel_id < 0 {
                return false; // outside the image plane
            }
            let dist_sqr = dir_to_cam.length_squared();
            let dist = dist_sqr.sqrt();
            dir_to_cam = dir_to_cam / dist;
            if !hemispheres_agree(&v.isect.normal, &v.isect.geom_normal, &dir_to_cam) {
                return false;
            }
            let cos_at_cam = vec3_dot_vec3(&camera.dir(), &-dir_to_cam).abs();
            // adjoint cosine at the surface, not a raw one, so shading
            // normals stay continuous
            let cos_at_surf = shading_normal_adjoint(
                &v.isect.normal,
                &v.isect.geom_normal,
                &v.isect.out_dir,
                &dir_to_cam,
            );
            let mut mv = scene.eval_material(&v.isect, true);
            mv.bsdf.prepare(&v.throughput, &v.isect.out_dir);
            let bsdf_value = mv.bsdf.eval(&v.isect.out_dir, &dir_to_cam);
            if bsdf_value.is_black() {
                return false;
            }
            let pdf_rev_w = mv.bsdf.pdf(&dir_to_cam, &v.isect.out_dir);
            if pdf_rev_w == 0.0 as Float {
                return false;
            }
            // conversion between image-plane area and surface area; the
            // pixel sampling pdf is one because pixels have unit area
            let ipd = camera.image_plane_dist();
            let img_to_surf =
                (ipd * ipd * cos_at_surf) / (dist_sqr * cos_at_cam * cos_at_cam * cos_at_cam);
            let weight = mis::weight_lt(&ctx, &v.mis, img_to_surf, pdf_rev_w, v.continue_prob);
            *ray = Ray {
                o: v.isect.pos,
                d: dir_to_cam,
                t_min: RAY_OFFSET,
                t_max: dist - RAY_OFFSET,
            };
            state.pixel_id = pixel_id;
            // the adjoint cosine lives inside img_to_surf; divide by the
            // number of light paths that all splat onto this image
            state.contrib = v.throughput
                * bsdf_value
                * (img_to_surf * weight / ctx.light_path_count);
            true
        };
        self.shadow_sched
            .run_shadow_pass(scene, &mut gen, &mut sample, &|s: &ShadowState| {
                img.add(s.pixel_id, s.contrib);
            });
    }
    /// Vertex connections: each camera vertex is paired with
    /// `num_connections` randomly chosen light vertices.
    fn connect(&mut self, img: &AtomicImage) {
        let scene = self.scene;
        let ctx = self.mis_ctx;
        let settings = self.settings;
        let iteration = self.cur_iteration;
        let cam_verts = self.cam_verts.read();
        let light_verts = self.light_verts.read();
        if cam_verts.is_empty() || light_verts.is_empty() {
            return;
        }
        let cam_verts: &[CachedVertex] = &cam_verts;
        let light_verts: &[CachedVertex] = &light_verts;
        // sampling light vertices from the joint cache changes the pdf by
        // the cache size over the number of paths and connections
        let vc_weight = light_verts.len() as Float
            / (ctx.light_path_count * settings.num_connections as Float);
        let mut gen = ArrayRayGen::new(cam_verts.len(), settings.num_connections);
        let mut sample = |vert_id: i32, conn: i32, ray: &mut Ray, state: &mut ShadowState| -> bool {
            let v = &cam_verts[vert_id as usize];
            state.rng = Rng::new(bernstein_seed(
                iteration,
                vert_id as u32,
                conn as u32,
                STREAM_CONNECT,
            ));
            let lv = &light_verts
                [state.rng.uniform_uint32_bounded(light_verts.len() as u32) as usize];
            if lv.path_len <= 1 {
                return false;
            }
            if v.path_len + lv.path_len - 1 > settings.max_path_len {
                return false;
            }
            let mut connect_dir = lv.isect.pos - v.isect.pos;
            let dist_sqr = connect_dir.length_squared();
            let dist = dist_sqr.sqrt();
            if dist < settings.base_radius {
                // pairs this close either see a cosine of zero or explode
                // the geometric term into a firefly
                return false;
            }
            connect_dir = connect_dir / dist;
            if !hemispheres_agree(&v.isect.normal, &v.isect.geom_normal, &connect_dir)
                || !hemispheres_agree(&lv.isect.normal, &lv.isect.geom_normal, &-connect_dir)
            {
                return false;
            }
            let mut cam_mv = scene.eval_material(&v.isect, false);
            cam_mv.bsdf.prepare(&v.throughput, &v.isect.out_dir);
            let mut light_mv = scene.eval_material(&lv.isect, true);
            light_mv.bsdf.prepare(&lv.throughput, &lv.isect.out_dir);
            // evaluate both BSDFs and their pdf values
            let cam_value = cam_mv.bsdf.eval(&v.isect.out_dir, &connect_dir);
            let light_value = light_mv.bsdf.eval(&lv.isect.out_dir, &-connect_dir);
            if cam_value.is_black() || light_value.is_black() {
                return false;
            }
            let pdf_cam_fwd_w = cam_mv.bsdf.pdf(&v.isect.out_dir, &connect_dir);
            let pdf_cam_rev_w = cam_mv.bsdf.pdf(&connect_dir, &v.isect.out_dir);
            let pdf_light_fwd_w = light_mv.bsdf.pdf(&lv.isect.out_dir, &-connect_dir);
            let pdf_light_rev_w = light_mv.bsdf.pdf(&-connect_dir, &lv.isect.out_dir);
            if pdf_cam_fwd_w == 0.0 as Float
                || pdf_cam_rev_w == 0.0 as Float
                || pdf_light_fwd_w == 0.0 as Float
                || pdf_light_rev_w == 0.0 as Float
            {
                return false;
            }
            // the light side uses the adjoint cosine
            let cos_cam = nrm_dot_vec3(&v.isect.normal, &connect_dir);
            let cos_light = shading_normal_adjoint(
                &lv.isect.normal,
                &lv.isect.geom_normal,
                &lv.isect.out_dir,
                &-connect_dir,
            );
            let geom = (cos_cam * cos_light / dist_sqr).max(0.0 as Float);
            if geom == 0.0 as Float {
                return false;
            }
            let pdf_cam_a = pdf_cam_fwd_w * v.continue_prob * cos_light / dist_sqr;
            let pdf_light_a = pdf_light_fwd_w * lv.continue_prob * cos_cam.abs() / dist_sqr;
            let weight = mis::weight_connect(
                &ctx,
                &v.mis,
                &lv.mis,
                pdf_cam_a,
                pdf_cam_rev_w * v.continue_prob,
                pdf_light_a,
                pdf_light_rev_w * lv.continue_prob,
            );
            *ray = Ray {
                o: v.isect.pos,
                d: connect_dir,
                t_min: RAY_OFFSET,
                t_max: dist - RAY_OFFSET,
            };
            state.pixel_id = v.pixel_id;
            state.contrib = v.throughput
                * lv.throughput
                * cam_value
                * light_value
                * (geom * weight * vc_weight);
            true
        };
        self.shadow_sched
            .run_shadow_pass(scene, &mut gen, &mut sample, &|s: &ShadowState| {
                img.add(s.pixel_id, s.contrib);
            });
    }
    /// Density estimation of cached photons around every camera vertex.
    fn merge(&mut self, img: &AtomicImage) {
        let scene = self.scene;
        let ctx = self.mis_ctx;
        let settings = self.settings;
        let grid = &self.photon_grid;
        let cam_verts = self.cam_verts.read();
        let light_verts = self.light_verts.read();
        if cam_verts.is_empty() || grid.is_empty() {
            return;
        }
        let cam_verts: &[CachedVertex] = &cam_verts;
        let light_verts: &[CachedVertex] = &light_verts;
        let chunk = ((cam_verts.len() + self.workers - 1) / self.workers).max(1);
        crossbeam::scope(|scope| {
            for vert_chunk in cam_verts.chunks(chunk) {
                scope.spawn(move |_| {
                    let mut photons: SmallVec<[(u32, Float); 32]> = SmallVec::new();
                    for v in vert_chunk {
                        let mut mv = scene.eval_material(&v.isect, false);
                        mv.bsdf.prepare(&v.throughput, &v.isect.out_dir);
                        if mv.bsdf.is_specular() || mv.bsdf.num_lobes() == 0 {
                            continue;
                        }
                        let radius_sqr =
                            grid.query_knn(&v.isect.pos, settings.num_knn, &mut photons);
                        if photons.is_empty() || radius_sqr <= 0.0 as Float {
                            continue;
                        }
                        let mut contrib = Spectrum::default();
                        for (idx, d2) in photons.iter() {
                            let p = &light_verts[*idx as usize];
                            if p.path_len <= 1 {
                                continue;
                            }
                            if v.path_len + p.path_len - 2 > settings.max_path_len {
                                continue;
                            }
                            let photon_in = p.isect.out_dir;
                            let bsdf_value = mv.bsdf.eval(&v.isect.out_dir, &photon_in);
                            if bsdf_value.is_black() {
                                continue;
                            }
                            let pdf_fwd_w = mv.bsdf.pdf(&v.isect.out_dir, &photon_in);
                            let pdf_rev_w = mv.bsdf.pdf(&photon_in, &v.isect.out_dir);
                            if pdf_fwd_w == 0.0 as Float || pdf_rev_w == 0.0 as Float {
                                continue;
                            }
                            let cos_photon =
                                nrm_abs_dot_vec3(&v.isect.normal, &photon_in);
                            if cos_photon < 1e-6 {
                                continue;
                            }
                            let weight = mis::weight_merge(
                                &ctx,
                                &v.mis,
                                &p.mis,
                                pdf_fwd_w * v.continue_prob,
                                pdf_rev_w * v.continue_prob,
                            );
                            // Epanechnikov kernel over the (possibly
                            // shrunken) gather disk
                            let kernel = 1.0 as Float - *d2 / radius_sqr;
                            contrib += bsdf_value
                                * p.throughput
                                * (weight * kernel / cos_photon);
                        }
                        contrib *= 2.0 as Float
                            / (std::f32::consts::PI * radius_sqr * ctx.light_path_count);
                        img.add(v.pixel_id, v.throughput * contrib);
                    }
                });
            }
        })
        .unwrap();
    }
}

/// Shared hit handler for both subpath kinds: build the intersection,
/// complete the partial MIS weights, cache the vertex if the surface is
/// not purely specular, and continue the walk.
#[allow(clippy::too_many_arguments)]
fn process_hits(
    scene: &Scene,
    ctx: &MisContext,
    settings: &Settings,
    cache: &VertexCache,
    ray: &Ray,
    hit: &Hit,
    state: &mut PathState,
    out: &RayQueue<PathState>,
    adjoint: bool,
) {
    let isect = scene.calculate_intersection(hit, ray);
    let cos_theta_o = nrm_abs_dot_vec3(&isect.normal, &isect.out_dir);
    if cos_theta_o == 0.0 as Float {
        return; // grazing hit, would divide the partials by zero
    }
    let mut mv = scene.eval_material(&isect, adjoint);
    mv.bsdf.prepare(&state.throughput, &isect.out_dir);
    let apply_dist = state.path_length > 1 || state.is_finite_light;
    state
        .mis
        .update_hit(cos_theta_o, isect.distance * isect.distance, apply_dist);
    state.path_length += 1;
    if !mv.bsdf.is_specular() {
        state.ancestor = cache.add(CachedVertex {
            isect,
            throughput: state.throughput,
            path_len: state.path_length,
            pixel_id: state.pixel_id,
            mis: state.mis,
            continue_prob: state.continue_prob,
            ancestor: state.ancestor,
        });
    } else {
        state.ancestor = -1;
    }
    bounce(ctx, settings, &isect, &mv.bsdf, state, out, adjoint);
}

/// Continues a subpath by one sampled segment, or lets it die.
fn bounce(
    ctx: &MisContext,
    settings: &Settings,
    isect: &Intersection,
    bsdf: &crate::materials::Bsdf,
    state: &mut PathState,
    out: &RayQueue<PathState>,
    adjoint: bool,
) {
    // the new segment must keep the full path within the length budget
    if state.path_length > settings.max_path_len {
        return;
    }
    let u_rr = state.rng.uniform_float();
    let rr_pdf = match russian_roulette(&state.throughput, u_rr) {
        Some(p) => p,
        None => return,
    };
    let flags = if adjoint {
        crate::materials::BSDF_ALL
    } else {
        settings.mode.camera_bounce_flags()
    };
    let sample = match bsdf.sample_matching(&isect.out_dir, &mut state.rng, flags) {
        Some(s) => s,
        None => return,
    };
    if !hemispheres_agree(&isect.normal, &isect.geom_normal, &sample.in_dir) {
        return;
    }
    let pdf_rev_w = if sample.specular {
        sample.pdf
    } else {
        bsdf.pdf(&sample.in_dir, &isect.out_dir)
    };
    let cos_theta_i = nrm_abs_dot_vec3(&isect.normal, &sample.in_dir);
    state.mis.update_bounce(
        sample.pdf,
        pdf_rev_w,
        cos_theta_i,
        sample.specular,
        rr_pdf,
        state.path_length,
        !adjoint,
        ctx,
    );
    let adjoint_cos = if adjoint {
        shading_normal_adjoint(
            &isect.normal,
            &isect.geom_normal,
            &isect.out_dir,
            &sample.in_dir,
        )
    } else {
        cos_theta_i
    };
    state.throughput *= sample.value * (adjoint_cos / (rr_pdf * sample.pdf));
    if state.throughput.is_black() || state.throughput.has_nans() {
        return;
    }
    state.continue_prob = rr_pdf;
    out.push(
        Ray {
            o: isect.pos,
            d: sample.in_dir,
            t_min: RAY_OFFSET,
            t_max: std::f32::INFINITY,
        },
        *state,
    );
}
