// std
use std::f32::consts::PI;
// vcm
use crate::core::geometry::{
    vec3_coordinate_system, vec3_normalize, Point2f, Point3f, Vector3f,
};
use crate::core::rng::Rng;
use crate::core::sampling::concentric_sample_disk;
use crate::core::vcm::{Float, Spectrum};
use crate::lights::{DirectSample, EmitSample};

/// Directional emitter infinitely far away. Emitted particles start on a
/// disk of the scene's bounding radius so every surface can be reached; the
/// light is not finite, which the MIS bookkeeping must know about when it
/// converts pdfs to area measure.
pub struct DirectionalLight {
    /// Direction the light travels (towards the scene).
    dir: Vector3f,
    irradiance: Spectrum,
    scene_center: Point3f,
    scene_radius: Float,
}

impl DirectionalLight {
    pub fn new(
        dir: Vector3f,
        irradiance: Spectrum,
        scene_center: Point3f,
        scene_radius: Float,
    ) -> Self {
        DirectionalLight {
            dir: vec3_normalize(&dir),
            irradiance,
            scene_center,
            scene_radius: scene_radius.max(1e-4),
        }
    }
    pub fn sample_emit(&self, rng: &mut Rng) -> EmitSample {
        let mut frame_x = Vector3f::default();
        let mut frame_y = Vector3f::default();
        vec3_coordinate_system(&self.dir, &mut frame_x, &mut frame_y);
        let d = concentric_sample_disk(&Point2f::new(
            rng.uniform_float(),
            rng.uniform_float(),
        ));
        let pos = self.scene_center + (frame_x * d.x + frame_y * d.y) * self.scene_radius
            - self.dir * self.scene_radius;
        let disk_area = PI * self.scene_radius * self.scene_radius;
        let pdf_emit_w = 1.0 as Float / disk_area;
        EmitSample {
            pos,
            dir: self.dir,
            radiance: self.irradiance * disk_area,
            pdf_emit_w,
            pdf_direct_a: 1.0 as Float,
            cos_out: 1.0 as Float,
        }
    }
    pub fn sample_direct(&self, _from: &Point3f, _rng: &mut Rng) -> DirectSample {
        let disk_area = PI * self.scene_radius * self.scene_radius;
        DirectSample {
            dir: -self.dir,
            distance: 2.0 as Float * self.scene_radius,
            radiance: self.irradiance,
            pdf_direct_w: 1.0 as Float,
            pdf_emit_w: 1.0 as Float / disk_area,
            cos_out: 1.0 as Float,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_particles_travel_along_the_light_direction() {
        let l = DirectionalLight::new(
            Vector3f::new(0.0, -1.0, 0.0),
            Spectrum::new(1.0),
            Point3f::default(),
            2.0,
        );
        let mut rng = Rng::new(2);
        for _ in 0..16 {
            let s = l.sample_emit(&mut rng);
            assert!((s.dir - Vector3f::new(0.0, -1.0, 0.0)).length() < 1e-6);
            // particles start above the scene
            assert!(s.pos.y >= 2.0 - 1e-4);
        }
    }
}
