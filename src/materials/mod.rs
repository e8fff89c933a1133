//! BSDF lobes and the per-intersection `Bsdf` wrapper. Lobes evaluate in a
//! local shading frame with the normal along +z; the wrapper converts
//! to and from world space, carries blend weights for mixtures and caches
//! lobe-selection probabilities computed by `prepare`.
pub mod lambert;
pub mod orennayar;
pub mod phong;
pub mod specular;

// others
use smallvec::SmallVec;
// vcm
use crate::core::geometry::{Normal3f, Vector3f};
use crate::core::interaction::{Frame, Intersection};
use crate::core::material::TransportMode;
use crate::core::rng::Rng;
use crate::core::vcm::{luminance, Float, Spectrum};
use crate::materials::lambert::LambertianReflection;
use crate::materials::orennayar::OrenNayarReflection;
use crate::materials::phong::PhongReflection;
use crate::materials::specular::{SpecularReflection, SpecularTransmission};

pub const BSDF_REFLECTION: u8 = 1;
pub const BSDF_TRANSMISSION: u8 = 2;
pub const BSDF_DIFFUSE: u8 = 4;
pub const BSDF_GLOSSY: u8 = 8;
pub const BSDF_SPECULAR: u8 = 16;
pub const BSDF_ALL: u8 = BSDF_REFLECTION | BSDF_TRANSMISSION | BSDF_DIFFUSE | BSDF_GLOSSY | BSDF_SPECULAR;

// local-frame trigonometry helpers
pub fn cos_theta(w: &Vector3f) -> Float {
    w.z
}
pub fn abs_cos_theta(w: &Vector3f) -> Float {
    w.z.abs()
}
pub fn sin_theta_sq(w: &Vector3f) -> Float {
    (0.0 as Float).max(1.0 as Float - w.z * w.z)
}
pub fn sin_theta(w: &Vector3f) -> Float {
    sin_theta_sq(w).sqrt()
}
pub fn cos_phi(w: &Vector3f) -> Float {
    let s = sin_theta(w);
    if s == 0.0 as Float {
        1.0 as Float
    } else {
        (w.x / s).max(-1.0).min(1.0)
    }
}
pub fn sin_phi(w: &Vector3f) -> Float {
    let s = sin_theta(w);
    if s == 0.0 as Float {
        0.0 as Float
    } else {
        (w.y / s).max(-1.0).min(1.0)
    }
}
pub fn same_hemisphere(w: &Vector3f, wp: &Vector3f) -> bool {
    w.z * wp.z > 0.0 as Float
}

/// Result of importance-sampling a scattering direction. For delta lobes
/// `pdf` is the discrete lobe-selection probability and `value` is already
/// divided by `|cos θ_i|`.
#[derive(Debug, Default, Copy, Clone)]
pub struct BsdfSample {
    pub in_dir: Vector3f,
    pub pdf: Float,
    pub value: Spectrum,
    pub specular: bool,
}

/// Closed set of scattering lobes.
pub enum Bxdf {
    Lambert(LambertianReflection),
    OrenNayar(OrenNayarReflection),
    Phong(PhongReflection),
    SpecularRefl(SpecularReflection),
    SpecularTrans(SpecularTransmission),
}

impl Bxdf {
    pub fn flags(&self) -> u8 {
        match self {
            Bxdf::Lambert(_) => BSDF_DIFFUSE | BSDF_REFLECTION,
            Bxdf::OrenNayar(_) => BSDF_DIFFUSE | BSDF_REFLECTION,
            Bxdf::Phong(_) => BSDF_GLOSSY | BSDF_REFLECTION,
            Bxdf::SpecularRefl(_) => BSDF_SPECULAR | BSDF_REFLECTION,
            Bxdf::SpecularTrans(_) => BSDF_SPECULAR | BSDF_TRANSMISSION,
        }
    }
    pub fn is_specular(&self) -> bool {
        self.flags() & BSDF_SPECULAR != 0
    }
    fn eval(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        match self {
            Bxdf::Lambert(b) => b.eval(wo, wi),
            Bxdf::OrenNayar(b) => b.eval(wo, wi),
            Bxdf::Phong(b) => b.eval(wo, wi),
            // delta distributions never match a sampled pair of directions
            Bxdf::SpecularRefl(_) => Spectrum::default(),
            Bxdf::SpecularTrans(_) => Spectrum::default(),
        }
    }
    fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        match self {
            Bxdf::Lambert(b) => b.pdf(wo, wi),
            Bxdf::OrenNayar(b) => b.pdf(wo, wi),
            Bxdf::Phong(b) => b.pdf(wo, wi),
            Bxdf::SpecularRefl(_) => 0.0 as Float,
            Bxdf::SpecularTrans(_) => 0.0 as Float,
        }
    }
    fn sample(&self, wo: &Vector3f, u1: Float, u2: Float) -> Option<(Vector3f, Float, Spectrum)> {
        match self {
            Bxdf::Lambert(b) => b.sample(wo, u1, u2),
            Bxdf::OrenNayar(b) => b.sample(wo, u1, u2),
            Bxdf::Phong(b) => b.sample(wo, u1, u2),
            Bxdf::SpecularRefl(b) => b.sample(wo),
            Bxdf::SpecularTrans(b) => b.sample(wo),
        }
    }
    /// Rough single-number reflectance used to weight lobe selection.
    fn selection_albedo(&self, wo: &Vector3f) -> Float {
        match self {
            Bxdf::Lambert(b) => luminance(&b.albedo()),
            Bxdf::OrenNayar(b) => luminance(&b.albedo()),
            Bxdf::Phong(b) => luminance(&b.albedo()),
            Bxdf::SpecularRefl(b) => luminance(&b.reflectance(abs_cos_theta(wo))),
            Bxdf::SpecularTrans(b) => luminance(&b.transmittance(cos_theta(wo))),
        }
    }
}

struct BsdfLobe {
    bxdf: Bxdf,
    /// Blend coefficient of this lobe in the material mixture.
    scale: Float,
    /// Sampling probability, filled in by `prepare`.
    select: Float,
}

/// Per-intersection BSDF: shading frame plus weighted lobes. Built fresh for
/// every processed hit and dropped right after; never shared across hits.
pub struct Bsdf {
    frame: Frame,
    geom_normal: Normal3f,
    mode: TransportMode,
    lobes: SmallVec<[BsdfLobe; 4]>,
    prepared: bool,
}

impl Bsdf {
    pub fn new(isect: &Intersection, mode: TransportMode) -> Self {
        Bsdf {
            frame: Frame::from_normal(&isect.normal),
            geom_normal: isect.geom_normal,
            mode,
            lobes: SmallVec::new(),
            prepared: false,
        }
    }
    pub fn add(&mut self, bxdf: Bxdf, scale: Float) {
        self.lobes.push(BsdfLobe {
            bxdf,
            scale,
            select: 0.0 as Float,
        });
        self.prepared = false;
    }
    pub fn num_lobes(&self) -> usize {
        self.lobes.len()
    }
    /// True when every lobe is a delta distribution. A BSDF without lobes
    /// (a pure emitter) is not specular: its vertices still get cached so
    /// direct hits can be credited.
    pub fn is_specular(&self) -> bool {
        !self.lobes.is_empty() && self.lobes.iter().all(|l| l.bxdf.is_specular())
    }
    pub fn transport_mode(&self) -> TransportMode {
        self.mode
    }
    /// Computes the mixture-selection weights for the given outgoing
    /// direction. Fresnel-dependent lobes (glass) split their probability by
    /// the reflectance at this angle, so `prepare` must run before
    /// `sample`/`pdf`.
    pub fn prepare(&mut self, _throughput: &Spectrum, out_dir: &Vector3f) {
        let wo = self.frame.to_local(out_dir);
        let mut total: Float = 0.0;
        for lobe in self.lobes.iter_mut() {
            lobe.select = lobe.scale * lobe.bxdf.selection_albedo(&wo).max(1e-4);
            total += lobe.select;
        }
        if total > 0.0 as Float {
            for lobe in self.lobes.iter_mut() {
                lobe.select /= total;
            }
        }
        self.prepared = true;
    }
    /// Evaluates the non-delta part of the BSDF; zero for mismatched
    /// shading/geometric hemispheres.
    pub fn eval(&self, out_dir: &Vector3f, in_dir: &Vector3f) -> Spectrum {
        let wo = self.frame.to_local(out_dir);
        let wi = self.frame.to_local(in_dir);
        if wo.z == 0.0 as Float {
            return Spectrum::default();
        }
        let mut f = Spectrum::default();
        for lobe in &self.lobes {
            if !lobe.bxdf.is_specular() {
                f += lobe.bxdf.eval(&wo, &wi) * lobe.scale;
            }
        }
        f
    }
    /// Forward (or reverse, by swapping the arguments) solid-angle pdf of
    /// sampling `in_dir`; zero over delta lobes.
    pub fn pdf(&self, out_dir: &Vector3f, in_dir: &Vector3f) -> Float {
        debug_assert!(self.prepared);
        let wo = self.frame.to_local(out_dir);
        let wi = self.frame.to_local(in_dir);
        let mut pdf: Float = 0.0;
        for lobe in &self.lobes {
            if !lobe.bxdf.is_specular() {
                pdf += lobe.select * lobe.bxdf.pdf(&wo, &wi);
            }
        }
        pdf
    }
    pub fn sample(&self, out_dir: &Vector3f, rng: &mut Rng) -> Option<BsdfSample> {
        self.sample_matching(out_dir, rng, BSDF_ALL)
    }
    /// Samples a scattering direction from the lobes matching `flags`
    /// (progressive photon mapping restricts camera paths to the specular
    /// ones). Lobe choice follows the `prepare` weights renormalized over
    /// the matching set.
    pub fn sample_matching(
        &self,
        out_dir: &Vector3f,
        rng: &mut Rng,
        flags: u8,
    ) -> Option<BsdfSample> {
        debug_assert!(self.prepared);
        let wo = self.frame.to_local(out_dir);
        if wo.z == 0.0 as Float {
            return None;
        }
        let matching: Float = self
            .lobes
            .iter()
            .filter(|l| l.bxdf.flags() & flags == l.bxdf.flags())
            .map(|l| l.select)
            .sum();
        if matching <= 0.0 as Float {
            return None;
        }
        // pick a lobe proportionally to its selection weight
        let mut u = rng.uniform_float() * matching;
        let mut chosen: Option<&BsdfLobe> = None;
        for lobe in &self.lobes {
            if lobe.bxdf.flags() & flags != lobe.bxdf.flags() {
                continue;
            }
            chosen = Some(lobe);
            if u < lobe.select {
                break;
            }
            u -= lobe.select;
        }
        let chosen = chosen?;
        let (u1, u2) = (rng.uniform_float(), rng.uniform_float());
        let (wi, lobe_pdf, lobe_value) = chosen.bxdf.sample(&wo, u1, u2)?;
        if lobe_pdf <= 0.0 as Float {
            return None;
        }
        let in_dir = self.frame.to_world(&wi);
        if chosen.bxdf.is_specular() {
            return Some(BsdfSample {
                in_dir,
                pdf: (chosen.select / matching) * lobe_pdf,
                value: lobe_value * chosen.scale,
                specular: true,
            });
        }
        // mixture pdf and value over all matching non-delta lobes
        let mut pdf: Float = 0.0;
        let mut value = Spectrum::default();
        for lobe in &self.lobes {
            if lobe.bxdf.is_specular() || lobe.bxdf.flags() & flags != lobe.bxdf.flags() {
                continue;
            }
            pdf += (lobe.select / matching) * lobe.bxdf.pdf(&wo, &wi);
            value += lobe.bxdf.eval(&wo, &wi) * lobe.scale;
        }
        if pdf <= 0.0 as Float || value.is_black() {
            return None;
        }
        Some(BsdfSample {
            in_dir,
            pdf,
            value,
            specular: false,
        })
    }
    pub fn geom_normal(&self) -> Normal3f {
        self.geom_normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{vec3_normalize, Point3f};
    use crate::core::material::Material;

    fn test_isect() -> Intersection {
        Intersection {
            pos: Point3f::default(),
            out_dir: vec3_normalize(&Vector3f::new(0.0, 0.3, 1.0)),
            distance: 1.0,
            normal: Normal3f::new(0.0, 0.0, 1.0),
            geom_normal: Normal3f::new(0.0, 0.0, 1.0),
            uv: Default::default(),
            area: 1.0,
            mat: 0,
        }
    }

    #[test]
    fn lambert_eval_is_albedo_over_pi() {
        let isect = test_isect();
        let mat = Material::lambert(Spectrum::new(0.5));
        let mut mv = mat.evaluate(&isect, TransportMode::Radiance);
        mv.bsdf.prepare(&Spectrum::new(1.0), &isect.out_dir);
        let wi = vec3_normalize(&Vector3f::new(0.2, -0.1, 0.9));
        let f = mv.bsdf.eval(&isect.out_dir, &wi);
        assert!((f.c[0] - 0.5 * crate::core::vcm::INV_PI).abs() < 1e-5);
    }

    #[test]
    fn sample_pdf_matches_pdf_query() {
        let isect = test_isect();
        let mat = Material::blend(
            Material::lambert(Spectrum::new(0.6)),
            Material::phong(Spectrum::new(0.4), 20.0),
            0.5,
        );
        let mut mv = mat.evaluate(&isect, TransportMode::Radiance);
        mv.bsdf.prepare(&Spectrum::new(1.0), &isect.out_dir);
        let mut rng = Rng::new(9);
        for _ in 0..200 {
            if let Some(s) = mv.bsdf.sample(&isect.out_dir, &mut rng) {
                assert!(!s.specular);
                let q = mv.bsdf.pdf(&isect.out_dir, &s.in_dir);
                assert!((s.pdf - q).abs() < 1e-4 * q.max(1.0));
            }
        }
    }

    #[test]
    fn mirror_reports_specular() {
        let isect = test_isect();
        let mat = Material::mirror(Spectrum::new(0.9));
        let mut mv = mat.evaluate(&isect, TransportMode::Radiance);
        mv.bsdf.prepare(&Spectrum::new(1.0), &isect.out_dir);
        assert!(mv.bsdf.is_specular());
        let mut rng = Rng::new(4);
        let s = mv.bsdf.sample(&isect.out_dir, &mut rng).unwrap();
        assert!(s.specular);
        assert_eq!(s.pdf, 1.0);
        // mirror reflection about the normal
        let expect = Vector3f::new(-isect.out_dir.x, -isect.out_dir.y, isect.out_dir.z);
        assert!((s.in_dir - expect).length() < 1e-5);
    }

    #[test]
    fn emitter_bsdf_is_black_but_not_specular() {
        let isect = test_isect();
        let mat = Material::emissive(Spectrum::new(3.0));
        let mut mv = mat.evaluate(&isect, TransportMode::Radiance);
        mv.bsdf.prepare(&Spectrum::new(1.0), &isect.out_dir);
        assert!(!mv.bsdf.is_specular());
        let wi = Vector3f::new(0.0, 0.0, 1.0);
        assert!(mv.bsdf.eval(&isect.out_dir, &wi).is_black());
        let mut rng = Rng::new(1);
        assert!(mv.bsdf.sample(&isect.out_dir, &mut rng).is_none());
    }
}
