//! Light sources. Emission sampling starts light subpaths; direct
//! sampling serves next-event estimation; `radiance` evaluates direct hits
//! on area lights.
//!
//! Two conventions keep the integrator arithmetic free of redundant pdf
//! factors, matching how the path processors consume the samples:
//! [`EmitSample::radiance`] is pre-weighted by `cos_out / pdf_emit_w`, and
//! [`DirectSample::radiance`] is pre-divided by `pdf_direct_w`. The raw pdf
//! values are still carried for MIS.
pub mod area;
pub mod distant;
pub mod point;

// vcm
use crate::core::geometry::{Point3f, Vector3f};
use crate::core::rng::Rng;
use crate::core::vcm::{Float, Spectrum};
use crate::lights::area::TriangleLight;
use crate::lights::distant::DirectionalLight;
use crate::lights::point::PointLight;

/// Position, direction and weight of an emitted particle.
#[derive(Debug, Default, Copy, Clone)]
pub struct EmitSample {
    pub pos: Point3f,
    pub dir: Vector3f,
    /// Emitted radiance pre-weighted by `cos_out / pdf_emit_w`.
    pub radiance: Spectrum,
    /// Full emission pdf: area pdf times directional solid-angle pdf.
    pub pdf_emit_w: Float,
    /// Area pdf of sampling the emission point directly from a surface.
    pub pdf_direct_a: Float,
    pub cos_out: Float,
}

/// A light point visible from a shading point.
#[derive(Debug, Default, Copy, Clone)]
pub struct DirectSample {
    pub dir: Vector3f,
    pub distance: Float,
    /// Emitted radiance pre-divided by `pdf_direct_w`.
    pub radiance: Spectrum,
    /// Solid-angle pdf of this direct sample as seen from the shading point.
    pub pdf_direct_w: Float,
    /// Full emission pdf of the same light point and direction.
    pub pdf_emit_w: Float,
    pub cos_out: Float,
}

pub enum Light {
    Area(TriangleLight),
    Point(PointLight),
    Distant(DirectionalLight),
}

impl Light {
    pub fn sample_emit(&self, rng: &mut Rng) -> EmitSample {
        match self {
            Light::Area(l) => l.sample_emit(rng),
            Light::Point(l) => l.sample_emit(rng),
            Light::Distant(l) => l.sample_emit(rng),
        }
    }
    pub fn sample_direct(&self, from: &Point3f, rng: &mut Rng) -> DirectSample {
        match self {
            Light::Area(l) => l.sample_direct(from, rng),
            Light::Point(l) => l.sample_direct(from, rng),
            Light::Distant(l) => l.sample_direct(from, rng),
        }
    }
    /// Radiance leaving the light toward `out_dir` on a direct hit, with the
    /// pdfs needed to weight that hit against the other techniques. Delta
    /// lights cannot be hit and return black.
    pub fn radiance(&self, out_dir: &Vector3f) -> (Spectrum, Float, Float) {
        match self {
            Light::Area(l) => l.radiance(out_dir),
            Light::Point(_) | Light::Distant(_) => {
                (Spectrum::default(), 0.0 as Float, 0.0 as Float)
            }
        }
    }
    pub fn is_delta(&self) -> bool {
        match self {
            Light::Area(_) => false,
            Light::Point(_) => true,
            Light::Distant(_) => true,
        }
    }
    pub fn is_finite(&self) -> bool {
        match self {
            Light::Area(_) => true,
            Light::Point(_) => true,
            Light::Distant(_) => false,
        }
    }
}
