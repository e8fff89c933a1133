//! Partial MIS quantities and per-technique balance-heuristic weights.
//!
//! Every subpath carries three scalars (`d_vcm`, `d_vc`, `d_vm`) that are
//! updated at each hit and each bounce. Together with a handful of local
//! pdfs they make the balance-heuristic weight of any combination technique
//! computable in O(1) at the moment the technique fires, without ever
//! walking the path again. The invariant between a hit and the following
//! bounce is the "partial" form: the squared-distance factor and the
//! cosine at the hit have been folded in, the outgoing pdf has not.

// std
use std::f32::consts::PI;
// vcm
use crate::core::vcm::Float;
use crate::integrators::Mode;

/// Per-iteration MIS constants: the merge acceptance normalizer
/// `eta_vcm = pi * r^2 * n_light_paths` and its reciprocal, plus the mode
/// masks that zero disabled techniques.
#[derive(Debug, Copy, Clone)]
pub struct MisContext {
    pub vc_weight: Float,
    pub vm_weight: Float,
    pub light_path_count: Float,
    pub mode: Mode,
}

impl MisContext {
    pub fn new(mode: Mode, radius: Float, light_path_count: Float) -> Self {
        let eta_vcm = PI * radius * radius * light_path_count.max(1.0 as Float);
        MisContext {
            vc_weight: 1.0 as Float / eta_vcm,
            vm_weight: if mode.use_merge() { eta_vcm } else { 0.0 as Float },
            light_path_count,
            mode,
        }
    }
    /// Whether the bounce recurrence accumulates the connection/NEE term at
    /// this vertex. Two-way path tracing has no connections or NEE; its
    /// only light-side technique is the camera connection seeded at the
    /// first camera bounce.
    fn keep_connect_term(&self, from_camera: bool, path_len: i32) -> bool {
        if self.mode == Mode::Twpt {
            from_camera && path_len == 2
        } else {
            true
        }
    }
}

/// The partial weights carried by a path state (and frozen into cached
/// vertices).
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct PartialMis {
    pub d_vcm: Float,
    pub d_vc: Float,
    pub d_vm: Float,
}

impl PartialMis {
    /// Camera subpath start. `pdf_cam_w` is the solid-angle pdf of the
    /// primary ray; the light-path count enters here so the light-tracing
    /// technique is weighted against all of an iteration's light paths.
    pub fn init_camera(light_path_count: Float, pdf_cam_w: Float) -> Self {
        PartialMis {
            d_vcm: light_path_count / pdf_cam_w,
            d_vc: 0.0 as Float,
            d_vm: 0.0 as Float,
        }
    }
    /// Light subpath start, from an emission sample. The lightpick
    /// probability cancels inside `d_vcm`.
    pub fn init_light(
        pdf_emit_w: Float,
        pdf_direct_a: Float,
        pdf_lightpick: Float,
        cos_out: Float,
        is_delta: bool,
        ctx: &MisContext,
    ) -> Self {
        let d_vc = if is_delta {
            0.0 as Float
        } else {
            cos_out / (pdf_emit_w * pdf_lightpick)
        };
        PartialMis {
            d_vcm: pdf_direct_a / pdf_emit_w,
            d_vc,
            d_vm: d_vc * ctx.vc_weight,
        }
    }
    /// Completes the partial weights once the next hit is known: converts
    /// the divided pdfs from solid angle to surface area. The distance
    /// factor only applies after the first segment of a finite emitter
    /// (infinite lights have no origin area).
    pub fn update_hit(&mut self, cos_theta_o: Float, dist_sqr: Float, apply_dist: bool) {
        if apply_dist {
            self.d_vcm *= dist_sqr;
        }
        self.d_vcm /= cos_theta_o;
        self.d_vc /= cos_theta_o;
        self.d_vm /= cos_theta_o;
    }
    /// Folds a sampled bounce into the partials. A delta event collapses
    /// `d_vcm` and scales the others by the cosine alone, since the forward
    /// pdf cancels against the matching factor in any technique weight.
    pub fn update_bounce(
        &mut self,
        pdf_dir_w: Float,
        pdf_rev_w: Float,
        cos_theta_i: Float,
        specular: bool,
        rr_pdf: Float,
        path_len: i32,
        from_camera: bool,
        ctx: &MisContext,
    ) {
        if specular {
            self.d_vcm = 0.0 as Float;
            self.d_vc *= cos_theta_i;
            self.d_vm *= cos_theta_i;
            return;
        }
        let rp = pdf_dir_w * rr_pdf;
        let rq = pdf_rev_w * rr_pdf;
        let prev = *self;
        let connect_term = if ctx.keep_connect_term(from_camera, path_len) {
            prev.d_vcm
        } else {
            0.0 as Float
        };
        self.d_vc = (cos_theta_i / rp) * (prev.d_vc * rq + connect_term + ctx.vm_weight);
        self.d_vm = (cos_theta_i / rp) * (prev.d_vm * rq + prev.d_vcm * ctx.vc_weight + 1.0);
        self.d_vcm = 1.0 as Float / rp;
    }
}

/// Weight of a camera path hitting an emitter. A primary hit (`path_len`
/// == 2, the camera itself being vertex 1) has no competing technique.
pub fn weight_hit(
    ctx: &MisContext,
    mis: &PartialMis,
    pdf_direct_a: Float,
    pdf_emit_w: Float,
    pdf_lightpick: Float,
    path_len: i32,
) -> Float {
    if path_len == 2 {
        return 1.0 as Float;
    }
    if ctx.mode == Mode::Ppm {
        // a purely specular camera chain is the only way to reach this path
        return 1.0 as Float;
    }
    let mut w_camera: Float = 0.0;
    if ctx.mode.use_nee() {
        w_camera += pdf_direct_a * pdf_lightpick * mis.d_vcm;
    }
    if ctx.mode.has_light_side_techniques() {
        w_camera += pdf_emit_w * pdf_lightpick * mis.d_vc;
    }
    1.0 as Float / (1.0 as Float + w_camera)
}

/// Weight of a next-event-estimation connection from a camera vertex.
#[allow(clippy::too_many_arguments)]
pub fn weight_nee(
    ctx: &MisContext,
    mis: &PartialMis,
    pdf_bsdf_fwd_w: Float,
    pdf_bsdf_rev_w: Float,
    pdf_direct_w: Float,
    pdf_emit_w: Float,
    pdf_lightpick_inv: Float,
    cos_to_light: Float,
    cos_at_light: Float,
    light_is_delta: bool,
    continue_prob: Float,
) -> Float {
    // competing BSDF-sampled hit; impossible for delta lights
    let w_light = if light_is_delta {
        0.0 as Float
    } else {
        continue_prob * pdf_bsdf_fwd_w * pdf_lightpick_inv / pdf_direct_w
    };
    let w_camera = if ctx.mode.has_light_side_techniques() {
        (pdf_emit_w * cos_to_light / (pdf_direct_w * cos_at_light))
            * (ctx.vm_weight
                + mis.d_vcm
                + mis.d_vc * (pdf_bsdf_rev_w * continue_prob))
    } else {
        0.0 as Float
    };
    1.0 as Float / (w_camera + 1.0 as Float + w_light)
}

/// Weight of connecting a light vertex to the camera. `pdf_cam_a` is the
/// image-to-surface pdf of the camera sampling this vertex.
pub fn weight_lt(
    ctx: &MisContext,
    mis: &PartialMis,
    pdf_cam_a: Float,
    pdf_bsdf_rev_w: Float,
    continue_prob: Float,
) -> Float {
    if ctx.mode == Mode::Lt {
        return 1.0 as Float;
    }
    let connect_term = if ctx.mode == Mode::Twpt {
        // the BSDF hit is the only competing technique; it enters through
        // the d_vc chain
        0.0 as Float
    } else {
        mis.d_vcm
    };
    let w_light = (pdf_cam_a / ctx.light_path_count)
        * (ctx.vm_weight + connect_term + mis.d_vc * (pdf_bsdf_rev_w * continue_prob));
    1.0 as Float / (w_light + 1.0 as Float)
}

/// Weight of a vertex connection between a camera and a light vertex. The
/// pdfs are already converted to area measure at the opposite vertex and
/// multiplied by the respective continuation probabilities.
pub fn weight_connect(
    ctx: &MisContext,
    cam_mis: &PartialMis,
    light_mis: &PartialMis,
    pdf_cam_a: Float,
    pdf_cam_rev: Float,
    pdf_light_a: Float,
    pdf_light_rev: Float,
) -> Float {
    let w_light =
        pdf_cam_a * (ctx.vm_weight + light_mis.d_vcm + light_mis.d_vc * pdf_light_rev);
    let w_camera =
        pdf_light_a * (ctx.vm_weight + cam_mis.d_vcm + cam_mis.d_vc * pdf_cam_rev);
    1.0 as Float / (w_light + 1.0 as Float + w_camera)
}

/// Weight of merging a photon into a camera vertex. The pdfs are the
/// camera BSDF's forward/reverse solid-angle pdfs toward the photon's
/// incoming direction, multiplied by the continuation probability.
pub fn weight_merge(
    ctx: &MisContext,
    cam_mis: &PartialMis,
    photon_mis: &PartialMis,
    pdf_fwd: Float,
    pdf_rev: Float,
) -> Float {
    if ctx.mode == Mode::Ppm {
        return 1.0 as Float;
    }
    let w_light = photon_mis.d_vcm * ctx.vc_weight + photon_mis.d_vm * pdf_fwd;
    let w_camera = cam_mis.d_vcm * ctx.vc_weight + cam_mis.d_vm * pdf_rev;
    1.0 as Float / (w_light + 1.0 as Float + w_camera)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cameras::PerspectiveCamera;
    use crate::core::geometry::{
        nrm_dot_vec3, vec3_dot_vec3, vec3_normalize, Normal3f, Point3f, Vector3f,
    };
    use crate::core::interaction::{shading_normal_adjoint, Intersection};
    use crate::core::material::Material;
    use crate::core::rng::Rng;
    use crate::core::vcm::{Spectrum, INV_PI};
    use crate::lights::area::TriangleLight;

    #[test]
    fn specular_bounce_collapses_d_vcm() {
        let ctx = MisContext::new(Mode::Vcm, 0.01, 64.0);
        let mut mis = PartialMis {
            d_vcm: 3.0,
            d_vc: 2.0,
            d_vm: 5.0,
        };
        mis.update_bounce(1.0, 1.0, 0.25, true, 1.0, 3, true, &ctx);
        assert_eq!(mis.d_vcm, 0.0);
        assert_eq!(mis.d_vc, 0.5);
        assert_eq!(mis.d_vm, 1.25);
    }

    #[test]
    fn connection_weight_is_symmetric_in_its_endpoints() {
        let ctx = MisContext::new(Mode::Bpt, 0.02, 128.0);
        let a = PartialMis {
            d_vcm: 1.7,
            d_vc: 0.4,
            d_vm: 0.0,
        };
        let b = PartialMis {
            d_vcm: 0.9,
            d_vc: 1.1,
            d_vm: 0.0,
        };
        let w_ab = weight_connect(&ctx, &a, &b, 0.3, 0.7, 0.5, 0.2);
        let w_ba = weight_connect(&ctx, &b, &a, 0.5, 0.2, 0.3, 0.7);
        assert!((w_ab - w_ba).abs() < 1e-7);
    }

    // A fixed two-segment path camera-floor-light, with every pdf computed
    // through the same objects the integrator uses. The weights of the
    // techniques able to produce the path must sum to one.
    struct FixedPath {
        ctx: MisContext,
        w_nee: Float,
        w_hit: Float,
        w_lt: Float,
    }

    fn build_fixed_path(mode: Mode, n_light_paths: Float) -> FixedPath {
        let ctx = MisContext::new(mode, 0.05, n_light_paths);
        // geometry: floor point P at the origin facing +y, light triangle
        // 2 above it facing down, camera off to the side
        let p = Point3f::new(0.0, 0.0, 0.0);
        let n_p = Normal3f::new(0.0, 1.0, 0.0);
        let c = Point3f::new(0.0, 1.0, 1.0);
        let x = Point3f::new(0.0, 2.0, 0.0);
        let camera = PerspectiveCamera::new(
            c,
            p - c,
            Vector3f::new(0.0, 1.0, 0.0),
            60.0,
            16,
            16,
        );
        let light = TriangleLight::new(
            Point3f::new(-0.05, 2.0, -0.05),
            Point3f::new(0.05, 2.0, -0.05),
            Point3f::new(-0.05, 2.0, 0.15),
            Spectrum::new(5.0),
        );
        assert!((light.area() - 0.01).abs() < 1e-6);
        let area = light.area();
        let pdf_direct_a = 1.0 / area;
        let d_cp_sqr = (p - c).length_squared();
        let d_px_sqr = (x - p).length_squared();
        let dir_pc = vec3_normalize(&(c - p));
        let dir_px = vec3_normalize(&(x - p));
        // diffuse floor BSDF queried through the material system
        let isect_p = Intersection {
            pos: p,
            out_dir: dir_pc,
            distance: d_cp_sqr.sqrt(),
            normal: n_p,
            geom_normal: n_p,
            uv: Default::default(),
            area: 1.0,
            mat: 0,
        };
        let mut mv = Material::lambert(Spectrum::new(0.6))
            .evaluate(&isect_p, crate::core::material::TransportMode::Radiance);
        mv.bsdf.prepare(&Spectrum::new(1.0), &dir_pc);
        let pdf_fwd = mv.bsdf.pdf(&dir_pc, &dir_px);
        let pdf_rev = mv.bsdf.pdf(&dir_px, &dir_pc);
        assert!((pdf_fwd - INV_PI).abs() < 1e-5);
        // light pdfs at X for the direction towards P
        let (_, _, pdf_emit_w) = light.radiance(&-dir_px);
        let cos_at_light = nrm_dot_vec3(&light.normal(), &-dir_px);
        let pdf_direct_w = d_px_sqr / (cos_at_light * area);
        // camera subpath partials at P
        let pdf_cam_w = camera.pdf(&(p - c));
        let mut cam_mis = PartialMis::init_camera(n_light_paths, pdf_cam_w);
        cam_mis.update_hit(nrm_dot_vec3(&n_p, &dir_pc), d_cp_sqr, true);
        // technique 1: next-event estimation at P
        let w_nee = weight_nee(
            &ctx,
            &cam_mis,
            pdf_fwd,
            pdf_rev,
            pdf_direct_w,
            pdf_emit_w,
            1.0,
            nrm_dot_vec3(&n_p, &dir_px),
            cos_at_light,
            false,
            1.0,
        );
        // technique 2: BSDF bounce at P hits the light
        let mut hit_mis = cam_mis;
        hit_mis.update_bounce(pdf_fwd, pdf_rev, nrm_dot_vec3(&n_p, &dir_px), false, 1.0, 2, true, &ctx);
        hit_mis.update_hit(cos_at_light, d_px_sqr, true);
        let w_hit = weight_hit(&ctx, &hit_mis, pdf_direct_a, pdf_emit_w, 1.0, 3);
        // technique 3: light path emitted at X hits P and connects to the
        // camera
        let mut light_mis =
            PartialMis::init_light(pdf_emit_w, pdf_direct_a, 1.0, cos_at_light, false, &ctx);
        light_mis.update_hit(nrm_dot_vec3(&n_p, &dir_px), d_px_sqr, true);
        let cos_at_cam = vec3_dot_vec3(&camera.dir(), &-dir_pc).abs();
        let cos_surf = shading_normal_adjoint(&n_p, &n_p, &dir_px, &dir_pc);
        let img_to_surf = camera.image_plane_dist() * camera.image_plane_dist() * cos_surf
            / (d_cp_sqr * cos_at_cam * cos_at_cam * cos_at_cam);
        let pdf_rev_lt = mv.bsdf.pdf(&dir_pc, &dir_px);
        let w_lt = weight_lt(&ctx, &light_mis, img_to_surf, pdf_rev_lt, 1.0);
        FixedPath {
            ctx,
            w_nee,
            w_hit,
            w_lt,
        }
    }

    #[test]
    fn bpt_weights_partition_unity() {
        let fp = build_fixed_path(Mode::Bpt, 4.0);
        assert_eq!(fp.ctx.vm_weight, 0.0);
        let sum = fp.w_nee + fp.w_hit + fp.w_lt;
        assert!(
            (sum - 1.0).abs() < 1e-3,
            "nee {} hit {} lt {} sum {}",
            fp.w_nee,
            fp.w_hit,
            fp.w_lt,
            sum
        );
    }

    #[test]
    fn pt_weights_partition_unity() {
        // only NEE and the BSDF hit exist; light tracing is disabled
        let fp = build_fixed_path(Mode::Pt, 4.0);
        let sum = fp.w_nee + fp.w_hit;
        assert!(
            (sum - 1.0).abs() < 1e-3,
            "nee {} hit {} sum {}",
            fp.w_nee,
            fp.w_hit,
            sum
        );
    }

    #[test]
    fn delta_lights_zero_the_bsdf_alternative() {
        let ctx = MisContext::new(Mode::Bpt, 0.05, 16.0);
        let mis = PartialMis::default();
        let w = weight_nee(&ctx, &mis, 0.5, 0.5, 1.0, 0.1, 1.0, 1.0, 1.0, true, 1.0);
        // with empty partials and a delta light nothing competes
        assert!((w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn merge_weight_is_one_for_ppm() {
        let ctx = MisContext::new(Mode::Ppm, 0.05, 16.0);
        let a = PartialMis {
            d_vcm: 1.0,
            d_vc: 1.0,
            d_vm: 1.0,
        };
        assert_eq!(weight_merge(&ctx, &a, &a, 0.5, 0.5), 1.0);
    }

    #[test]
    fn radius_enters_the_merge_normalizer() {
        let ctx = MisContext::new(Mode::Vcm, 0.1, 100.0);
        let eta = PI * 0.1 * 0.1 * 100.0;
        assert!((ctx.vm_weight - eta).abs() < 1e-4);
        assert!((ctx.vc_weight - 1.0 / eta).abs() < 1e-6);
    }

    #[test]
    fn fixed_rng_streams_do_not_affect_weights() {
        // weights are pure functions of the pdfs; drawing random numbers in
        // between must not matter
        let mut rng = Rng::new(7);
        let fp1 = build_fixed_path(Mode::Bpt, 4.0);
        let _ = rng.uniform_float();
        let fp2 = build_fixed_path(Mode::Bpt, 4.0);
        assert_eq!(fp1.w_nee, fp2.w_nee);
        assert_eq!(fp1.w_hit, fp2.w_hit);
        assert_eq!(fp1.w_lt, fp2.w_lt);
    }
}
