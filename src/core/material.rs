// vcm
use crate::core::interaction::Intersection;
use crate::core::vcm::{Float, Spectrum};
use crate::materials::lambert::LambertianReflection;
use crate::materials::orennayar::OrenNayarReflection;
use crate::materials::phong::PhongReflection;
use crate::materials::specular::{Fresnel, SpecularReflection, SpecularTransmission};
use crate::materials::{Bsdf, Bxdf};

/// Radiance is carried along camera subpaths, importance along light
/// subpaths; scattering is not symmetric between the two once refraction or
/// shading normals are involved.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TransportMode {
    Radiance,
    Importance,
}

/// Closed description of a surface; the scene stores one per material slot
/// and triangles reference them by index. Emissive triangles additionally
/// get a light id assigned when the scene is built, so materials never hold
/// light references.
#[derive(Debug, Clone)]
pub enum MaterialKind {
    Lambert {
        kd: Spectrum,
    },
    OrenNayar {
        kr: Spectrum,
        /// Surface roughness, standard deviation of the microfacet angle in
        /// degrees.
        sigma: Float,
    },
    Phong {
        ks: Spectrum,
        exponent: Float,
    },
    /// Smooth conductor.
    Mirror {
        kr: Spectrum,
        eta: Spectrum,
        k: Spectrum,
    },
    /// Smooth dielectric with reflection and transmission lobes.
    Glass {
        kr: Spectrum,
        kt: Spectrum,
        eta: Float,
    },
    /// Convex combination of two other kinds.
    Blend {
        a: Box<MaterialKind>,
        b: Box<MaterialKind>,
        weight: Float,
    },
    /// Pure emitter; scattering evaluates to black.
    None,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub kind: MaterialKind,
    pub emission: Spectrum,
}

/// BSDF plus emitted radiance, prepared per intersection.
pub struct MaterialValue {
    pub bsdf: Bsdf,
    pub emit: Spectrum,
}

impl Material {
    pub fn lambert(kd: Spectrum) -> Self {
        Material {
            kind: MaterialKind::Lambert { kd },
            emission: Spectrum::default(),
        }
    }
    pub fn oren_nayar(kr: Spectrum, sigma: Float) -> Self {
        Material {
            kind: MaterialKind::OrenNayar { kr, sigma },
            emission: Spectrum::default(),
        }
    }
    pub fn phong(ks: Spectrum, exponent: Float) -> Self {
        Material {
            kind: MaterialKind::Phong { ks, exponent },
            emission: Spectrum::default(),
        }
    }
    pub fn mirror(kr: Spectrum) -> Self {
        Material {
            // gold-ish conductor response by default
            kind: MaterialKind::Mirror {
                kr,
                eta: Spectrum::rgb(0.2, 0.92, 1.38),
                k: Spectrum::rgb(3.9, 2.45, 2.14),
            },
            emission: Spectrum::default(),
        }
    }
    pub fn glass(kr: Spectrum, kt: Spectrum, eta: Float) -> Self {
        Material {
            kind: MaterialKind::Glass { kr, kt, eta },
            emission: Spectrum::default(),
        }
    }
    pub fn blend(a: Material, b: Material, weight: Float) -> Self {
        Material {
            kind: MaterialKind::Blend {
                a: Box::new(a.kind),
                b: Box::new(b.kind),
                weight,
            },
            emission: Spectrum::default(),
        }
    }
    pub fn emissive(emission: Spectrum) -> Self {
        Material {
            kind: MaterialKind::None,
            emission,
        }
    }
    pub fn with_emission(mut self, emission: Spectrum) -> Self {
        self.emission = emission;
        self
    }
    pub fn is_emissive(&self) -> bool {
        !self.emission.is_black()
    }
    /// Builds the BSDF for a hit on this material. The result is a plain
    /// value with inline lobe storage; it lives for the processing of one
    /// hit and is never shared.
    pub fn evaluate(&self, isect: &Intersection, mode: TransportMode) -> MaterialValue {
        let mut bsdf = Bsdf::new(isect, mode);
        add_lobes(&self.kind, 1.0 as Float, mode, &mut bsdf);
        MaterialValue {
            bsdf,
            emit: self.emission,
        }
    }
}

fn add_lobes(kind: &MaterialKind, scale: Float, mode: TransportMode, bsdf: &mut Bsdf) {
    match kind {
        MaterialKind::Lambert { kd } => {
            bsdf.add(Bxdf::Lambert(LambertianReflection::new(*kd)), scale);
        }
        MaterialKind::OrenNayar { kr, sigma } => {
            bsdf.add(Bxdf::OrenNayar(OrenNayarReflection::new(*kr, *sigma)), scale);
        }
        MaterialKind::Phong { ks, exponent } => {
            bsdf.add(Bxdf::Phong(PhongReflection::new(*ks, *exponent)), scale);
        }
        MaterialKind::Mirror { kr, eta, k } => {
            bsdf.add(
                Bxdf::SpecularRefl(SpecularReflection::new(
                    *kr,
                    Fresnel::conductor(*eta, *k),
                )),
                scale,
            );
        }
        MaterialKind::Glass { kr, kt, eta } => {
            bsdf.add(
                Bxdf::SpecularRefl(SpecularReflection::new(*kr, Fresnel::dielectric(*eta))),
                scale,
            );
            bsdf.add(
                Bxdf::SpecularTrans(SpecularTransmission::new(*kt, *eta, mode)),
                scale,
            );
        }
        MaterialKind::Blend { a, b, weight } => {
            // lobe-weighted selection; sampling and both pdf directions use
            // the same weights
            add_lobes(&**a, scale * *weight, mode, bsdf);
            add_lobes(&**b, scale * (1.0 as Float - *weight), mode, bsdf);
        }
        MaterialKind::None => {}
    }
}
