// std
use std::f32::consts::PI;
// vcm
use crate::core::geometry::{vec3_normalize, Point2f, Point3f};
use crate::core::rng::Rng;
use crate::core::sampling::{uniform_sample_sphere, uniform_sphere_pdf};
use crate::core::vcm::{Float, Spectrum};
use crate::lights::{DirectSample, EmitSample};

/// Isotropic point emitter with the given intensity (power per solid angle).
pub struct PointLight {
    pos: Point3f,
    intensity: Spectrum,
}

impl PointLight {
    pub fn new(pos: Point3f, intensity: Spectrum) -> Self {
        PointLight { pos, intensity }
    }
    pub fn sample_emit(&self, rng: &mut Rng) -> EmitSample {
        let dir = uniform_sample_sphere(&Point2f::new(
            rng.uniform_float(),
            rng.uniform_float(),
        ));
        let pdf_emit_w = uniform_sphere_pdf();
        EmitSample {
            pos: self.pos,
            dir,
            // intensity over the sphere pdf: I * 4 pi
            radiance: self.intensity * (4.0 as Float * PI),
            pdf_emit_w,
            pdf_direct_a: 1.0 as Float,
            cos_out: 1.0 as Float,
        }
    }
    pub fn sample_direct(&self, from: &Point3f, _rng: &mut Rng) -> DirectSample {
        let to_light = self.pos - *from;
        let dist_sqr = to_light.length_squared();
        if dist_sqr == 0.0 as Float {
            return DirectSample::default();
        }
        let distance = dist_sqr.sqrt();
        DirectSample {
            dir: vec3_normalize(&to_light),
            distance,
            radiance: self.intensity / dist_sqr,
            pdf_direct_w: 1.0 as Float,
            pdf_emit_w: uniform_sphere_pdf(),
            cos_out: 1.0 as Float,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_square_falloff() {
        let l = PointLight::new(Point3f::new(0.0, 2.0, 0.0), Spectrum::new(8.0));
        let mut rng = Rng::new(1);
        let s = l.sample_direct(&Point3f::new(0.0, 0.0, 0.0), &mut rng);
        assert!((s.distance - 2.0).abs() < 1e-6);
        assert!((s.radiance.c[0] - 2.0).abs() < 1e-5);
        assert_eq!(s.pdf_direct_w, 1.0);
    }
}
