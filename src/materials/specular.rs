// vcm
use crate::core::geometry::Vector3f;
use crate::core::material::TransportMode;
use crate::core::vcm::{clamp_t, Float, Spectrum};
use crate::materials::{abs_cos_theta, cos_theta};

/// Fresnel reflectance, either for a conductor (complex index) or a
/// dielectric boundary.
#[derive(Debug, Copy, Clone)]
pub enum Fresnel {
    Conductor { eta: Spectrum, k: Spectrum },
    Dielectric { eta: Float },
}

impl Fresnel {
    pub fn conductor(eta: Spectrum, k: Spectrum) -> Self {
        Fresnel::Conductor { eta, k }
    }
    pub fn dielectric(eta: Float) -> Self {
        Fresnel::Dielectric { eta }
    }
    pub fn eval(&self, cos_theta_i: Float) -> Spectrum {
        match self {
            Fresnel::Conductor { eta, k } => {
                fr_conductor(cos_theta_i.abs(), eta, k)
            }
            Fresnel::Dielectric { eta } => {
                Spectrum::new(fr_dielectric(cos_theta_i, 1.0 as Float, *eta))
            }
        }
    }
}

/// Fresnel reflectance of a conductor, unpolarized approximation.
fn fr_conductor(cos_theta_i: Float, eta: &Spectrum, k: &Spectrum) -> Spectrum {
    let cos_theta_i = clamp_t(cos_theta_i, -1.0, 1.0);
    let cos2 = cos_theta_i * cos_theta_i;
    let sin2 = 1.0 as Float - cos2;
    let mut result = Spectrum::default();
    for i in 0..3 {
        let eta2 = eta.c[i] * eta.c[i];
        let k2 = k.c[i] * k.c[i];
        let t0 = eta2 - k2 - sin2;
        let a2_plus_b2 = (t0 * t0 + 4.0 as Float * eta2 * k2).sqrt();
        let t1 = a2_plus_b2 + cos2;
        let a = (0.5 as Float * (a2_plus_b2 + t0)).max(0.0 as Float).sqrt();
        let t2 = 2.0 as Float * a * cos_theta_i;
        let rs = (t1 - t2) / (t1 + t2);
        let t3 = cos2 * a2_plus_b2 + sin2 * sin2;
        let t4 = t2 * sin2;
        let rp = rs * (t3 - t4) / (t3 + t4);
        result.c[i] = 0.5 as Float * (rp + rs);
    }
    result
}

/// Fresnel reflectance of a dielectric boundary; handles entering and
/// leaving via the sign of `cos_theta_i`.
fn fr_dielectric(cos_theta_i: Float, eta_i: Float, eta_t: Float) -> Float {
    let mut cos_theta_i = clamp_t(cos_theta_i, -1.0, 1.0);
    let (eta_i, eta_t) = if cos_theta_i > 0.0 as Float {
        (eta_i, eta_t)
    } else {
        cos_theta_i = cos_theta_i.abs();
        (eta_t, eta_i)
    };
    let sin_theta_i = (0.0 as Float)
        .max(1.0 as Float - cos_theta_i * cos_theta_i)
        .sqrt();
    let sin_theta_t = eta_i / eta_t * sin_theta_i;
    if sin_theta_t >= 1.0 as Float {
        // total internal reflection
        return 1.0 as Float;
    }
    let cos_theta_t = (0.0 as Float)
        .max(1.0 as Float - sin_theta_t * sin_theta_t)
        .sqrt();
    let r_parl = ((eta_t * cos_theta_i) - (eta_i * cos_theta_t))
        / ((eta_t * cos_theta_i) + (eta_i * cos_theta_t));
    let r_perp = ((eta_i * cos_theta_i) - (eta_t * cos_theta_t))
        / ((eta_i * cos_theta_i) + (eta_t * cos_theta_t));
    0.5 as Float * (r_parl * r_parl + r_perp * r_perp)
}

/// Perfect mirror reflection scaled by a Fresnel term. The sampled value is
/// pre-divided by `|cos θ_i|` so the common throughput update applies the
/// cosine uniformly across lobe kinds.
pub struct SpecularReflection {
    scale: Spectrum,
    fresnel: Fresnel,
}

impl SpecularReflection {
    pub fn new(scale: Spectrum, fresnel: Fresnel) -> Self {
        SpecularReflection { scale, fresnel }
    }
    pub fn reflectance(&self, cos_theta_o: Float) -> Spectrum {
        self.fresnel.eval(cos_theta_o) * self.scale
    }
    pub fn sample(&self, wo: &Vector3f) -> Option<(Vector3f, Float, Spectrum)> {
        if wo.z == 0.0 as Float {
            return None;
        }
        // reflected direction in shading space (normal == z)
        let wi = Vector3f::new(-wo.x, -wo.y, wo.z);
        let value = self.fresnel.eval(cos_theta(wo)) * self.scale / abs_cos_theta(&wi);
        Some((wi, 1.0 as Float, value))
    }
}

/// Perfect refraction through a smooth dielectric. Radiance transport picks
/// up the eta^2 radiance compression factor; importance transport does not.
pub struct SpecularTransmission {
    scale: Spectrum,
    eta: Float,
    mode: TransportMode,
}

impl SpecularTransmission {
    pub fn new(scale: Spectrum, eta: Float, mode: TransportMode) -> Self {
        SpecularTransmission { scale, eta, mode }
    }
    pub fn transmittance(&self, cos_theta_o: Float) -> Spectrum {
        let f = fr_dielectric(cos_theta_o, 1.0 as Float, self.eta);
        self.scale * (1.0 as Float - f)
    }
    pub fn sample(&self, wo: &Vector3f) -> Option<(Vector3f, Float, Spectrum)> {
        let entering = cos_theta(wo) > 0.0 as Float;
        let (eta_i, eta_t) = if entering {
            (1.0 as Float, self.eta)
        } else {
            (self.eta, 1.0 as Float)
        };
        let eta_rel = eta_i / eta_t;
        let cos_i = abs_cos_theta(wo);
        let sin2_t = eta_rel * eta_rel * (1.0 as Float - cos_i * cos_i).max(0.0 as Float);
        if sin2_t >= 1.0 as Float {
            // total internal reflection; the reflection lobe takes over
            return None;
        }
        let cos_t = (1.0 as Float - sin2_t).sqrt();
        let z = if entering { -cos_t } else { cos_t };
        let wi = Vector3f::new(-wo.x * eta_rel, -wo.y * eta_rel, z);
        let f = fr_dielectric(cos_theta(wo), 1.0 as Float, self.eta);
        let mut ft = self.scale * (1.0 as Float - f);
        if self.mode == TransportMode::Radiance {
            ft *= eta_rel * eta_rel;
        }
        Some((wi, 1.0 as Float, ft / abs_cos_theta(&wi)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::vec3_normalize;

    #[test]
    fn dielectric_fresnel_brackets() {
        // normal incidence on glass is about 4 percent
        let f0 = fr_dielectric(1.0, 1.0, 1.5);
        assert!((f0 - 0.04).abs() < 0.005);
        // grazing incidence approaches one
        assert!(fr_dielectric(0.01, 1.0, 1.5) > 0.9);
    }

    #[test]
    fn refraction_bends_toward_the_normal_when_entering() {
        let t = SpecularTransmission::new(Spectrum::new(1.0), 1.5, TransportMode::Radiance);
        let wo = vec3_normalize(&Vector3f::new(0.6, 0.0, 0.8));
        let (wi, pdf, _) = t.sample(&wo).unwrap();
        assert_eq!(pdf, 1.0);
        assert!(wi.z < 0.0);
        // Snell: sin_t = sin_i / 1.5
        let sin_i = 0.6;
        let sin_t = (wi.x * wi.x + wi.y * wi.y).sqrt();
        assert!((sin_t - sin_i / 1.5).abs() < 1e-4);
    }

    #[test]
    fn total_internal_reflection_yields_no_transmission() {
        let t = SpecularTransmission::new(Spectrum::new(1.0), 1.5, TransportMode::Radiance);
        // leaving the dense medium at a grazing angle
        let wo = vec3_normalize(&Vector3f::new(0.95, 0.0, -0.3));
        assert!(t.sample(&wo).is_none());
    }

    #[test]
    fn conductor_reflectance_is_high_at_normal_incidence() {
        let f = Fresnel::conductor(Spectrum::rgb(0.2, 0.92, 1.38), Spectrum::rgb(3.9, 2.45, 2.14));
        let r = f.eval(1.0);
        assert!(r.c[0] > 0.8);
    }
}
