//! Scene registry: triangles with per-vertex attributes, the material
//! table, lights, and the mapping from emissive triangles to their light
//! ids. Also hosts the reference batched intersector that stands in for an
//! external traversal engine; it answers closest-hit and any-hit queries
//! over whole ray batches.

// vcm
use crate::core::geometry::{
    nrm_dot_vec3, vec3_cross_vec3, vec3_dot_vec3, vec3_normalize, Hit, Normal3f, Point2f,
    Point3f, Ray, Vector3f,
};
use crate::core::interaction::Intersection;
use crate::core::material::{Material, MaterialValue, TransportMode};
use crate::core::vcm::Float;
use crate::lights::area::TriangleLight;
use crate::lights::distant::DirectionalLight;
use crate::lights::point::PointLight;
use crate::lights::Light;

/// Triangle with per-vertex shading normals and uvs, referencing a material
/// slot by index.
#[derive(Debug, Clone)]
pub struct Triangle {
    pub v: [Point3f; 3],
    pub n: [Normal3f; 3],
    pub uv: [Point2f; 3],
    pub mat: usize,
}

impl Triangle {
    /// Flat-shaded triangle; vertex normals follow the winding.
    pub fn flat(v0: Point3f, v1: Point3f, v2: Point3f, mat: usize) -> Self {
        let n = Normal3f::from(vec3_normalize(&vec3_cross_vec3(&(v1 - v0), &(v2 - v0))));
        Triangle {
            v: [v0, v1, v2],
            n: [n, n, n],
            uv: [
                Point2f::new(0.0, 0.0),
                Point2f::new(1.0, 0.0),
                Point2f::new(0.0, 1.0),
            ],
            mat,
        }
    }
    pub fn with_normals(mut self, n0: Normal3f, n1: Normal3f, n2: Normal3f) -> Self {
        self.n = [n0, n1, n2];
        self
    }
}

pub struct Scene {
    triangles: Vec<Triangle>,
    materials: Vec<Material>,
    lights: Vec<Light>,
    /// Light id per triangle, -1 for non-emitters.
    tri_light: Vec<i32>,
    center: Point3f,
    radius: Float,
}

impl Scene {
    pub fn new(triangles: Vec<Triangle>, materials: Vec<Material>) -> Self {
        let (center, radius) = bounding_sphere(&triangles);
        let mut lights: Vec<Light> = Vec::new();
        let mut tri_light: Vec<i32> = vec![-1; triangles.len()];
        for (i, tri) in triangles.iter().enumerate() {
            let mat = &materials[tri.mat];
            if mat.is_emissive() {
                tri_light[i] = lights.len() as i32;
                lights.push(Light::Area(TriangleLight::new(
                    tri.v[0],
                    tri.v[1],
                    tri.v[2],
                    mat.emission,
                )));
            }
        }
        Scene {
            triangles,
            materials,
            lights,
            tri_light,
            center,
            radius,
        }
    }
    pub fn add_point_light(&mut self, pos: Point3f, intensity: crate::core::vcm::Spectrum) {
        self.lights.push(Light::Point(PointLight::new(pos, intensity)));
    }
    pub fn add_directional_light(
        &mut self,
        dir: Vector3f,
        irradiance: crate::core::vcm::Spectrum,
    ) {
        self.lights.push(Light::Distant(DirectionalLight::new(
            dir,
            irradiance,
            self.center,
            self.radius,
        )));
    }
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }
    pub fn light(&self, i: usize) -> &Light {
        &self.lights[i]
    }
    /// Resolves the light belonging to an emissive triangle; -1 otherwise.
    /// This indirection keeps materials free of light references.
    pub fn light_id_of(&self, tri_id: i32) -> i32 {
        if tri_id < 0 {
            -1
        } else {
            self.tri_light[tri_id as usize]
        }
    }
    pub fn material(&self, id: usize) -> &Material {
        &self.materials[id]
    }
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
    pub fn triangle_material(&self, tri_id: i32) -> usize {
        self.triangles[tri_id as usize].mat
    }
    pub fn center(&self) -> Point3f {
        self.center
    }
    pub fn radius(&self) -> Float {
        self.radius
    }
    /// Builds the BSDF and emission for a hit; the adjoint flag selects
    /// importance-mode scattering for light subpaths.
    pub fn eval_material(&self, isect: &Intersection, adjoint: bool) -> MaterialValue {
        let mode = if adjoint {
            TransportMode::Importance
        } else {
            TransportMode::Radiance
        };
        self.materials[isect.mat].evaluate(isect, mode)
    }
    /// Derives the full shading record from a ray/hit pair.
    pub fn calculate_intersection(&self, hit: &Hit, ray: &Ray) -> Intersection {
        debug_assert!(hit.tri_id >= 0);
        let tri = &self.triangles[hit.tri_id as usize];
        let w = 1.0 as Float - hit.u - hit.v;
        let pos = Point3f::new(
            tri.v[0].x * w + tri.v[1].x * hit.u + tri.v[2].x * hit.v,
            tri.v[0].y * w + tri.v[1].y * hit.u + tri.v[2].y * hit.v,
            tri.v[0].z * w + tri.v[1].z * hit.u + tri.v[2].z * hit.v,
        );
        let uv = Point2f::new(
            tri.uv[0].x * w + tri.uv[1].x * hit.u + tri.uv[2].x * hit.v,
            tri.uv[0].y * w + tri.uv[1].y * hit.u + tri.uv[2].y * hit.v,
        );
        let cross = vec3_cross_vec3(&(tri.v[1] - tri.v[0]), &(tri.v[2] - tri.v[0]));
        let cross_len = cross.length();
        let area = 0.5 as Float * cross_len;
        let mut geom_normal = Normal3f::from(cross / cross_len);
        let normal = Normal3f::new(
            tri.n[0].x * w + tri.n[1].x * hit.u + tri.n[2].x * hit.v,
            tri.n[0].y * w + tri.n[1].y * hit.u + tri.n[2].y * hit.v,
            tri.n[0].z * w + tri.n[1].z * hit.u + tri.n[2].z * hit.v,
        );
        let normal = crate::core::geometry::nrm_normalize(&normal);
        // keep both normals on the same side so hemisphere tests agree
        if crate::core::geometry::nrm_dot_nrm(&geom_normal, &normal) < 0.0 as Float {
            geom_normal = -geom_normal;
        }
        Intersection {
            pos,
            out_dir: -vec3_normalize(&ray.d),
            distance: hit.t,
            normal,
            geom_normal,
            uv,
            area,
            mat: tri.mat,
        }
    }
    /// Closest-hit traversal for a batch of rays.
    pub fn intersect(&self, rays: &[Ray], hits: &mut [Hit]) {
        for (ray, hit) in rays.iter().zip(hits.iter_mut()) {
            *hit = self.intersect_one(ray);
        }
    }
    /// Any-hit traversal; `tri_id >= 0` flags an occluded ray.
    pub fn occluded(&self, rays: &[Ray], hits: &mut [Hit]) {
        for (ray, hit) in rays.iter().zip(hits.iter_mut()) {
            *hit = Hit::default();
            for (i, tri) in self.triangles.iter().enumerate() {
                if let Some((t, u, v)) = intersect_triangle(tri, ray) {
                    hit.tri_id = i as i32;
                    hit.u = u;
                    hit.v = v;
                    hit.t = t;
                    break;
                }
            }
        }
    }
    fn intersect_one(&self, ray: &Ray) -> Hit {
        let mut hit = Hit::default();
        for (i, tri) in self.triangles.iter().enumerate() {
            if let Some((t, u, v)) = intersect_triangle(tri, ray) {
                if t < hit.t {
                    hit = Hit {
                        tri_id: i as i32,
                        u,
                        v,
                        t,
                    };
                }
            }
        }
        hit
    }
}

/// Moeller-Trumbore ray/triangle test over the ray's validity interval.
fn intersect_triangle(tri: &Triangle, ray: &Ray) -> Option<(Float, Float, Float)> {
    let e1 = tri.v[1] - tri.v[0];
    let e2 = tri.v[2] - tri.v[0];
    let pvec = vec3_cross_vec3(&ray.d, &e2);
    let det = vec3_dot_vec3(&e1, &pvec);
    if det.abs() < 1e-9 {
        return None;
    }
    let inv_det = 1.0 as Float / det;
    let tvec = ray.o - tri.v[0];
    let u = vec3_dot_vec3(&tvec, &pvec) * inv_det;
    if u < 0.0 as Float || u > 1.0 as Float {
        return None;
    }
    let qvec = vec3_cross_vec3(&tvec, &e1);
    let v = vec3_dot_vec3(&ray.d, &qvec) * inv_det;
    if v < 0.0 as Float || u + v > 1.0 as Float {
        return None;
    }
    let t = vec3_dot_vec3(&e2, &qvec) * inv_det;
    if t <= ray.t_min || t >= ray.t_max {
        return None;
    }
    Some((t, u, v))
}

fn bounding_sphere(triangles: &[Triangle]) -> (Point3f, Float) {
    if triangles.is_empty() {
        return (Point3f::default(), 1.0 as Float);
    }
    let mut min = Point3f::new(std::f32::MAX, std::f32::MAX, std::f32::MAX);
    let mut max = Point3f::new(std::f32::MIN, std::f32::MIN, std::f32::MIN);
    for tri in triangles {
        for p in &tri.v {
            min = Point3f::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = Point3f::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        }
    }
    let center = Point3f::new(
        0.5 as Float * (min.x + max.x),
        0.5 as Float * (min.y + max.y),
        0.5 as Float * (min.z + max.z),
    );
    (center, (max - min).length() * 0.5 as Float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vcm::Spectrum;

    fn floor_scene() -> Scene {
        // two triangles spanning the unit square at y == 0
        let mats = vec![Material::lambert(Spectrum::new(0.5))];
        let tris = vec![
            Triangle::flat(
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
                Point3f::new(1.0, 0.0, 0.0),
                0,
            ),
            Triangle::flat(
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
                Point3f::new(1.0, 0.0, 1.0),
                0,
            ),
        ];
        Scene::new(tris, mats)
    }

    #[test]
    fn closest_hit_and_barycentric_position() {
        let scene = floor_scene();
        let rays = [Ray {
            o: Point3f::new(0.25, 1.0, 0.25),
            d: Vector3f::new(0.0, -1.0, 0.0),
            t_min: 0.0,
            t_max: std::f32::INFINITY,
        }];
        let mut hits = [Hit::default()];
        scene.intersect(&rays, &mut hits);
        assert!(hits[0].tri_id >= 0);
        let isect = scene.calculate_intersection(&hits[0], &rays[0]);
        assert!((isect.pos - Point3f::new(0.25, 0.0, 0.25)).length() < 1e-5);
        assert!((isect.distance - 1.0).abs() < 1e-5);
        assert!((isect.area - 0.5).abs() < 1e-5);
        assert!(nrm_dot_vec3(&isect.normal, &isect.out_dir) > 0.9);
    }

    #[test]
    fn occlusion_respects_t_max() {
        let scene = floor_scene();
        let blocked = [Ray {
            o: Point3f::new(0.25, 1.0, 0.25),
            d: Vector3f::new(0.0, -1.0, 0.0),
            t_min: 0.0,
            t_max: 2.0,
        }];
        let free = [Ray {
            o: Point3f::new(0.25, 1.0, 0.25),
            d: Vector3f::new(0.0, -1.0, 0.0),
            t_min: 0.0,
            t_max: 0.5,
        }];
        let mut hits = [Hit::default()];
        scene.occluded(&blocked, &mut hits);
        assert!(hits[0].tri_id >= 0);
        scene.occluded(&free, &mut hits);
        assert!(hits[0].tri_id < 0);
    }

    #[test]
    fn shading_normals_interpolate_across_the_face() {
        let mats = vec![Material::lambert(Spectrum::new(0.5))];
        let tilt = crate::core::geometry::nrm_normalize(&Normal3f::new(0.5, 1.0, 0.0));
        let tris = vec![Triangle::flat(
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(0.0, 0.0, 1.0),
            Point3f::new(1.0, 0.0, 0.0),
            0,
        )
        .with_normals(Normal3f::new(0.0, 1.0, 0.0), Normal3f::new(0.0, 1.0, 0.0), tilt)];
        let scene = Scene::new(tris, mats);
        let rays = [Ray {
            o: Point3f::new(0.5, 1.0, 0.25),
            d: Vector3f::new(0.0, -1.0, 0.0),
            t_min: 0.0,
            t_max: std::f32::INFINITY,
        }];
        let mut hits = [Hit::default()];
        scene.intersect(&rays, &mut hits);
        let isect = scene.calculate_intersection(&hits[0], &rays[0]);
        // halfway toward the tilted corner the shading normal leans in x
        // while the geometric normal stays put
        assert!(isect.normal.x > 0.05);
        assert!(isect.geom_normal.x.abs() < 1e-5);
        assert!(
            (isect.normal.x * isect.normal.x
                + isect.normal.y * isect.normal.y
                + isect.normal.z * isect.normal.z
                - 1.0)
                .abs()
                < 1e-4
        );
    }

    #[test]
    fn emissive_triangles_get_light_ids() {
        let mats = vec![
            Material::lambert(Spectrum::new(0.5)),
            Material::emissive(Spectrum::new(4.0)),
        ];
        let tris = vec![
            Triangle::flat(
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
                0,
            ),
            Triangle::flat(
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 1.0),
                1,
            ),
        ];
        let scene = Scene::new(tris, mats);
        assert_eq!(scene.light_count(), 1);
        assert_eq!(scene.light_id_of(0), -1);
        assert_eq!(scene.light_id_of(1), 0);
    }
}
