// vcm
use crate::core::geometry::{
    nrm_dot_vec3, vec3_normalize, Normal3f, Point2f, Point3f, Vector3f,
};
use crate::core::interaction::{triangle_cross, Frame};
use crate::core::rng::Rng;
use crate::core::sampling::{
    cosine_hemisphere_pdf, cosine_sample_hemisphere, uniform_sample_triangle,
};
use crate::core::vcm::{Float, Spectrum};
use crate::lights::{DirectSample, EmitSample};

/// One-sided diffuse triangle emitter. The scene creates one of these per
/// emissive triangle and records the light id in its triangle table.
pub struct TriangleLight {
    v0: Point3f,
    v1: Point3f,
    v2: Point3f,
    normal: Normal3f,
    area: Float,
    radiance: Spectrum,
}

impl TriangleLight {
    pub fn new(v0: Point3f, v1: Point3f, v2: Point3f, radiance: Spectrum) -> Self {
        let cross = triangle_cross(&v0, &v1, &v2);
        let area = 0.5 as Float * cross.length();
        let normal = Normal3f::from(vec3_normalize(&cross));
        TriangleLight {
            v0,
            v1,
            v2,
            normal,
            area,
            radiance,
        }
    }
    pub fn area(&self) -> Float {
        self.area
    }
    pub fn normal(&self) -> Normal3f {
        self.normal
    }
    fn sample_point(&self, rng: &mut Rng) -> Point3f {
        let b = uniform_sample_triangle(&Point2f::new(rng.uniform_float(), rng.uniform_float()));
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        self.v0 + e1 * b.x + e2 * b.y
    }
    pub fn sample_emit(&self, rng: &mut Rng) -> EmitSample {
        let pos = self.sample_point(rng);
        let local = cosine_sample_hemisphere(&Point2f::new(
            rng.uniform_float(),
            rng.uniform_float(),
        ));
        let frame = Frame::from_normal(&self.normal);
        let dir = frame.to_world(&local);
        let cos_out = local.z.max(1e-6);
        let pdf_direct_a = 1.0 as Float / self.area;
        let pdf_emit_w = pdf_direct_a * cosine_hemisphere_pdf(cos_out);
        EmitSample {
            pos,
            dir,
            // L * cos / pdf collapses to L * pi * area for the cosine lobe
            radiance: self.radiance * (cos_out / pdf_emit_w),
            pdf_emit_w,
            pdf_direct_a,
            cos_out,
        }
    }
    pub fn sample_direct(&self, from: &Point3f, rng: &mut Rng) -> DirectSample {
        let pos = self.sample_point(rng);
        let to_light = pos - *from;
        let dist_sqr = to_light.length_squared();
        let distance = dist_sqr.sqrt();
        let dir = to_light / distance;
        let cos_out = nrm_dot_vec3(&self.normal, &-dir);
        if cos_out <= 1e-6 || dist_sqr == 0.0 as Float {
            // backside or degenerate; contributes nothing
            return DirectSample::default();
        }
        let pdf_direct_w = dist_sqr / (cos_out * self.area);
        let pdf_emit_w = (1.0 as Float / self.area) * cosine_hemisphere_pdf(cos_out);
        DirectSample {
            dir,
            distance,
            radiance: self.radiance / pdf_direct_w,
            pdf_direct_w,
            pdf_emit_w,
            cos_out,
        }
    }
    pub fn radiance(&self, out_dir: &Vector3f) -> (Spectrum, Float, Float) {
        let cos_out = nrm_dot_vec3(&self.normal, out_dir);
        if cos_out <= 0.0 as Float {
            return (Spectrum::default(), 0.0 as Float, 0.0 as Float);
        }
        let pdf_direct_a = 1.0 as Float / self.area;
        let pdf_emit_w = pdf_direct_a * cosine_hemisphere_pdf(cos_out);
        (self.radiance, pdf_direct_a, pdf_emit_w)
    }
}
