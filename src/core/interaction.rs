//! The geometry of a particular point on a surface. Every combination
//! technique works in terms of an `Intersection`, so the partial MIS
//! quantities and the BSDF never need to know which triangle produced it.

// vcm
use crate::core::geometry::{
    nrm_dot_vec3, vec3_coordinate_system, vec3_cross_vec3, vec3_dot_vec3, vec3_normalize,
    Normal3f, Point2f, Point3f, Vector3f,
};
use crate::core::vcm::Float;

/// Shading data at a hit point. `out_dir` is the negated (normalized)
/// direction of the incoming ray, `normal` the interpolated shading normal
/// and `geom_normal` the triangle plane normal; `area` is the surface area
/// of the hit triangle, needed to evaluate emission pdfs on direct hits.
#[derive(Debug, Default, Copy, Clone)]
pub struct Intersection {
    pub pos: Point3f,
    pub out_dir: Vector3f,
    pub distance: Float,
    pub normal: Normal3f,
    pub geom_normal: Normal3f,
    pub uv: Point2f,
    pub area: Float,
    pub mat: usize,
}

/// Orthonormal shading frame with the normal along the local +z axis.
#[derive(Debug, Default, Copy, Clone)]
pub struct Frame {
    pub s: Vector3f,
    pub t: Vector3f,
    pub n: Vector3f,
}

impl Frame {
    pub fn from_normal(n: &Normal3f) -> Self {
        let nv = vec3_normalize(&Vector3f::from(*n));
        let mut s = Vector3f::default();
        let mut t = Vector3f::default();
        vec3_coordinate_system(&nv, &mut s, &mut t);
        Frame { s, t, n: nv }
    }
    pub fn to_local(&self, v: &Vector3f) -> Vector3f {
        Vector3f::new(
            vec3_dot_vec3(v, &self.s),
            vec3_dot_vec3(v, &self.t),
            vec3_dot_vec3(v, &self.n),
        )
    }
    pub fn to_world(&self, v: &Vector3f) -> Vector3f {
        self.s * v.x + self.t * v.y + self.n * v.z
    }
}

/// Cosine term for adjoint BSDFs that use shading normals. Used in place of
/// a raw cosine for all scattering along light subpaths so that shading
/// normals do not introduce brightness discontinuities (see Veach).
pub fn shading_normal_adjoint(
    normal: &Normal3f,
    geom_normal: &Normal3f,
    out_dir: &Vector3f,
    in_dir: &Vector3f,
) -> Float {
    let denom = nrm_dot_vec3(geom_normal, out_dir).abs();
    if denom == 0.0 as Float {
        return 0.0 as Float;
    }
    nrm_dot_vec3(normal, out_dir).abs() * nrm_dot_vec3(geom_normal, in_dir).abs() / denom
}

/// Shading and geometric hemispheres must agree for a scattering or
/// connection direction to be valid.
pub fn hemispheres_agree(normal: &Normal3f, geom_normal: &Normal3f, dir: &Vector3f) -> bool {
    nrm_dot_vec3(normal, dir) * nrm_dot_vec3(geom_normal, dir) > 0.0 as Float
}

/// Unnormalized geometric normal of a triangle; its length is twice the
/// triangle area.
pub fn triangle_cross(v0: &Point3f, v1: &Point3f, v2: &Point3f) -> Vector3f {
    vec3_cross_vec3(&(*v1 - *v0), &(*v2 - *v0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let f = Frame::from_normal(&Normal3f::new(0.0, 1.0, 0.0));
        let v = Vector3f::new(0.3, 0.9, -0.2);
        let back = f.to_world(&f.to_local(&v));
        assert!((back - v).length() < 1e-5);
    }

    #[test]
    fn local_z_is_the_normal() {
        let n = Normal3f::new(0.0, 0.0, 1.0);
        let f = Frame::from_normal(&n);
        let l = f.to_local(&Vector3f::new(0.0, 0.0, 1.0));
        assert!((l.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn adjoint_term_matches_plain_cosine_for_equal_normals() {
        let n = Normal3f::new(0.0, 0.0, 1.0);
        let out = vec3_normalize(&Vector3f::new(0.5, 0.0, 0.8));
        let inp = vec3_normalize(&Vector3f::new(-0.3, 0.2, 0.9));
        let adjoint = shading_normal_adjoint(&n, &n, &out, &inp);
        assert!((adjoint - nrm_dot_vec3(&n, &inp).abs()).abs() < 1e-5);
    }
}
