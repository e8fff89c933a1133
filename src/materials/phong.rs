// std
use std::f32::consts::PI;
// vcm
use crate::core::geometry::{vec3_coordinate_system, Point2f, Vector3f};
use crate::core::sampling::{power_cosine_hemisphere_pdf, power_cosine_sample_hemisphere};
use crate::core::vcm::{Float, Spectrum};
use crate::materials::same_hemisphere;

/// Modified Phong glossy reflection with the (n+2)/2pi normalization.
pub struct PhongReflection {
    coefficient: Spectrum,
    exponent: Float,
}

fn reflect_about_normal(w: &Vector3f) -> Vector3f {
    Vector3f::new(-w.x, -w.y, w.z)
}

impl PhongReflection {
    pub fn new(coefficient: Spectrum, exponent: Float) -> Self {
        PhongReflection {
            coefficient,
            exponent,
        }
    }
    pub fn albedo(&self) -> Spectrum {
        self.coefficient
    }
    pub fn eval(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        if !same_hemisphere(wo, wi) {
            return Spectrum::default();
        }
        let reflected_in = reflect_about_normal(wi);
        let cos_r_o = crate::core::geometry::vec3_dot_vec3(&reflected_in, wo).max(0.0 as Float);
        self.coefficient * ((self.exponent + 2.0 as Float) / (2.0 as Float * PI)
            * cos_r_o.powf(self.exponent))
    }
    pub fn sample(&self, wo: &Vector3f, u1: Float, u2: Float) -> Option<(Vector3f, Float, Spectrum)> {
        // sample a power-cosine direction about the reflected outgoing
        // direction
        let lobe_dir = power_cosine_sample_hemisphere(self.exponent, &Point2f::new(u1, u2));
        let reflected = reflect_about_normal(wo);
        let mut tangent = Vector3f::default();
        let mut binormal = Vector3f::default();
        vec3_coordinate_system(&reflected, &mut tangent, &mut binormal);
        let wi = tangent * lobe_dir.x + binormal * lobe_dir.y + reflected * lobe_dir.z;
        if !same_hemisphere(wo, &wi) {
            return None;
        }
        let pdf = self.pdf(wo, &wi);
        if pdf == 0.0 as Float {
            return None;
        }
        Some((wi, pdf, self.eval(wo, &wi)))
    }
    pub fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        if !same_hemisphere(wo, wi) {
            return 0.0 as Float;
        }
        let reflected = reflect_about_normal(wo);
        let cos_r = crate::core::geometry::vec3_dot_vec3(&reflected, wi);
        power_cosine_hemisphere_pdf(self.exponent, cos_r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::vec3_normalize;
    use crate::core::rng::Rng;

    #[test]
    fn peak_is_at_the_mirror_direction() {
        let b = PhongReflection::new(Spectrum::new(1.0), 50.0);
        let wo = vec3_normalize(&Vector3f::new(0.5, 0.0, 0.5));
        let mirror = Vector3f::new(-wo.x, -wo.y, wo.z);
        let off = vec3_normalize(&Vector3f::new(-0.2, 0.3, 0.8));
        assert!(b.eval(&wo, &mirror).c[0] > b.eval(&wo, &off).c[0]);
    }

    #[test]
    fn sample_pdf_agrees_with_query() {
        let b = PhongReflection::new(Spectrum::new(0.9), 12.0);
        let wo = vec3_normalize(&Vector3f::new(0.1, -0.3, 0.9));
        let mut rng = Rng::new(21);
        for _ in 0..200 {
            if let Some((wi, pdf, _)) = b.sample(&wo, rng.uniform_float(), rng.uniform_float()) {
                let q = b.pdf(&wo, &wi);
                assert!((pdf - q).abs() < 1e-4 * q.max(1.0));
            }
        }
    }
}
