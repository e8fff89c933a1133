// vcm
use crate::core::geometry::{
    vec3_cross_vec3, vec3_dot_vec3, vec3_normalize, Point2f, Point3f, Ray, Vector3f,
};
use crate::core::vcm::Float;

/// Pinhole camera. Pixels have unit area on the image plane by convention,
/// so the plane sits `image_plane_dist` away in pixel units and the pdf of
/// sampling a point on it is one per pixel.
pub struct PerspectiveCamera {
    pos: Point3f,
    dir: Vector3f,
    right: Vector3f,
    up: Vector3f,
    width: i32,
    height: i32,
    image_plane_dist: Float,
}

impl PerspectiveCamera {
    pub fn new(
        pos: Point3f,
        dir: Vector3f,
        world_up: Vector3f,
        fov_degrees: Float,
        width: i32,
        height: i32,
    ) -> Self {
        let dir = vec3_normalize(&dir);
        let right = vec3_normalize(&vec3_cross_vec3(&dir, &world_up));
        let up = vec3_cross_vec3(&right, &dir);
        let image_plane_dist =
            (height as Float / 2.0 as Float) / (0.5 as Float * fov_degrees.to_radians()).tan();
        PerspectiveCamera {
            pos,
            dir,
            right,
            up,
            width,
            height,
            image_plane_dist,
        }
    }
    pub fn pos(&self) -> Point3f {
        self.pos
    }
    pub fn dir(&self) -> Vector3f {
        self.dir
    }
    pub fn width(&self) -> i32 {
        self.width
    }
    pub fn height(&self) -> i32 {
        self.height
    }
    pub fn image_plane_dist(&self) -> Float {
        self.image_plane_dist
    }
    /// Primary ray through the continuous raster position `(sx, sy)`.
    pub fn generate_ray(&self, sx: Float, sy: Float) -> Ray {
        let x = sx - self.width as Float / 2.0 as Float;
        let y = self.height as Float / 2.0 as Float - sy;
        let d = self.dir * self.image_plane_dist + self.right * x + self.up * y;
        Ray {
            o: self.pos,
            d: vec3_normalize(&d),
            t_min: 0.0 as Float,
            t_max: std::f32::INFINITY,
        }
    }
    /// Projects a world point onto the raster; points behind the camera
    /// land at negative depth and must be rejected by the caller through
    /// `raster_to_id`.
    pub fn world_to_raster(&self, p: &Point3f) -> Point2f {
        let v = *p - self.pos;
        let z = vec3_dot_vec3(&v, &self.dir);
        if z <= 0.0 as Float {
            return Point2f::new(-1.0, -1.0);
        }
        let scale = self.image_plane_dist / z;
        Point2f::new(
            vec3_dot_vec3(&v, &self.right) * scale + self.width as Float / 2.0 as Float,
            self.height as Float / 2.0 as Float - vec3_dot_vec3(&v, &self.up) * scale,
        )
    }
    /// Pixel id for a raster position, -1 when it lies off the image.
    pub fn raster_to_id(&self, raster: Point2f) -> i32 {
        let x = raster.x.floor();
        let y = raster.y.floor();
        if x < 0.0 as Float
            || y < 0.0 as Float
            || x >= self.width as Float
            || y >= self.height as Float
        {
            return -1;
        }
        y as i32 * self.width + x as i32
    }
    /// Solid-angle pdf of a camera ray direction; the image-plane area pdf
    /// is one per pixel, converted by the plane distance and the view
    /// angle.
    pub fn pdf(&self, d: &Vector3f) -> Float {
        let cos_theta = vec3_dot_vec3(&vec3_normalize(d), &self.dir);
        if cos_theta <= 0.0 as Float {
            return 0.0 as Float;
        }
        let r = self.image_plane_dist / cos_theta;
        r * r / cos_theta
    }
}
