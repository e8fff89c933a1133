// vcm
use crate::core::geometry::{Point2f, Vector3f};
use crate::core::sampling::{cosine_hemisphere_pdf, cosine_sample_hemisphere};
use crate::core::vcm::{Float, Spectrum, INV_PI};
use crate::materials::{abs_cos_theta, cos_phi, same_hemisphere, sin_phi, sin_theta};

/// Oren-Nayar rough diffuse reflection, parameterized by the standard
/// deviation of the microfacet orientation angle in degrees.
pub struct OrenNayarReflection {
    reflectance: Spectrum,
    a: Float,
    b: Float,
}

impl OrenNayarReflection {
    pub fn new(reflectance: Spectrum, sigma_degrees: Float) -> Self {
        let sigma = sigma_degrees.to_radians();
        let sigma_sq = sigma * sigma;
        OrenNayarReflection {
            reflectance,
            a: 1.0 as Float - sigma_sq / (2.0 as Float * (sigma_sq + 0.33)),
            b: 0.45 * sigma_sq / (sigma_sq + 0.09),
        }
    }
    pub fn albedo(&self) -> Spectrum {
        self.reflectance
    }
    pub fn eval(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        if !same_hemisphere(wo, wi) {
            return Spectrum::default();
        }
        let sin_theta_i = sin_theta(wi);
        let sin_theta_o = sin_theta(wo);
        // compute max(0, cos(phi_i - phi_o)) via the angle difference identity
        let mut max_cos: Float = 0.0;
        if sin_theta_i > 1e-4 && sin_theta_o > 1e-4 {
            let d_cos = cos_phi(wi) * cos_phi(wo) + sin_phi(wi) * sin_phi(wo);
            max_cos = d_cos.max(0.0 as Float);
        }
        let (sin_alpha, tan_beta) = if abs_cos_theta(wi) > abs_cos_theta(wo) {
            (sin_theta_o, sin_theta_i / abs_cos_theta(wi))
        } else {
            (sin_theta_i, sin_theta_o / abs_cos_theta(wo))
        };
        self.reflectance * (INV_PI * (self.a + self.b * max_cos * sin_alpha * tan_beta))
    }
    pub fn sample(&self, wo: &Vector3f, u1: Float, u2: Float) -> Option<(Vector3f, Float, Spectrum)> {
        let mut wi = cosine_sample_hemisphere(&Point2f::new(u1, u2));
        if wo.z < 0.0 as Float {
            wi.z = -wi.z;
        }
        let pdf = self.pdf(wo, &wi);
        if pdf == 0.0 as Float {
            return None;
        }
        Some((wi, pdf, self.eval(wo, &wi)))
    }
    pub fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        if same_hemisphere(wo, wi) {
            cosine_hemisphere_pdf(abs_cos_theta(wi))
        } else {
            0.0 as Float
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::vec3_normalize;

    #[test]
    fn zero_roughness_reduces_to_lambert() {
        let b = OrenNayarReflection::new(Spectrum::new(0.8), 0.0);
        let wo = vec3_normalize(&Vector3f::new(0.3, 0.1, 0.7));
        let wi = vec3_normalize(&Vector3f::new(-0.2, 0.4, 0.6));
        let f = b.eval(&wo, &wi);
        assert!((f.c[0] - 0.8 * INV_PI).abs() < 1e-5);
    }

    #[test]
    fn rough_surface_darkens_normal_incidence() {
        let rough = OrenNayarReflection::new(Spectrum::new(0.8), 30.0);
        let wo = Vector3f::new(0.0, 0.0, 1.0);
        let wi = Vector3f::new(0.0, 0.0, 1.0);
        // at normal/normal the oblique correction vanishes and only the A
        // term remains, which is below the Lambert value
        assert!(rough.eval(&wo, &wi).c[0] < 0.8 * INV_PI);
    }
}
