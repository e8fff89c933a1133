// vcm
use crate::core::geometry::{Point2f, Vector3f};
use crate::core::sampling::{cosine_hemisphere_pdf, cosine_sample_hemisphere};
use crate::core::vcm::{Float, Spectrum, INV_PI};
use crate::materials::{abs_cos_theta, same_hemisphere};

/// Ideal diffuse reflection.
pub struct LambertianReflection {
    color: Spectrum,
}

impl LambertianReflection {
    pub fn new(color: Spectrum) -> Self {
        LambertianReflection { color }
    }
    pub fn albedo(&self) -> Spectrum {
        self.color
    }
    pub fn eval(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        if !same_hemisphere(wo, wi) {
            return Spectrum::default();
        }
        self.color * INV_PI
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
        Some((wi, pdf, self.color * INV_PI))
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
    use crate::core::rng::Rng;

    #[test]
    fn reciprocity() {
        let b = LambertianReflection::new(Spectrum::new(0.7));
        let wo = vec3_normalize(&Vector3f::new(0.1, 0.2, 0.9));
        let wi = vec3_normalize(&Vector3f::new(-0.4, 0.3, 0.5));
        assert_eq!(b.eval(&wo, &wi), b.eval(&wi, &wo));
    }

    #[test]
    fn opposite_hemispheres_are_black() {
        let b = LambertianReflection::new(Spectrum::new(0.7));
        let wo = Vector3f::new(0.0, 0.0, 1.0);
        let wi = Vector3f::new(0.0, 0.0, -1.0);
        assert!(b.eval(&wo, &wi).is_black());
        assert_eq!(b.pdf(&wo, &wi), 0.0);
    }

    #[test]
    fn sampling_follows_outgoing_hemisphere() {
        let b = LambertianReflection::new(Spectrum::new(0.7));
        let wo = vec3_normalize(&Vector3f::new(0.2, 0.1, -0.8));
        let mut rng = Rng::new(5);
        for _ in 0..100 {
            let (wi, pdf, _) = b
                .sample(&wo, rng.uniform_float(), rng.uniform_float())
                .unwrap();
            assert!(wi.z < 0.0);
            assert!(pdf > 0.0);
        }
    }
}
