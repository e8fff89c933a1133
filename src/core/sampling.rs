//! Draw random samples from a chosen probability distribution. All
//! hemisphere routines operate in a local frame with the normal along +z.

// std
use std::f32::consts::PI;
// vcm
use crate::core::geometry::{Point2f, Vector3f};
use crate::core::vcm::{Float, INV_2_PI, INV_4_PI, INV_PI, PI_OVER_2, PI_OVER_4};

/// Cosine-weighted hemisphere sampling using Malley's method.
pub fn cosine_sample_hemisphere(u: &Point2f) -> Vector3f {
    let d: Point2f = concentric_sample_disk(u);
    let z: Float = (0.0 as Float)
        .max(1.0 as Float - d.x * d.x - d.y * d.y)
        .sqrt();
    Vector3f::new(d.x, d.y, z)
}

/// Returns a weight of cos_theta / PI.
pub fn cosine_hemisphere_pdf(cos_theta: Float) -> Float {
    cos_theta * INV_PI
}

/// Uniformly sample rays in a hemisphere. Choose a direction.
pub fn uniform_sample_hemisphere(u: &Point2f) -> Vector3f {
    let z: Float = u.x;
    let r: Float = (0.0 as Float).max(1.0 as Float - z * z).sqrt();
    let phi: Float = 2.0 as Float * PI * u.y;
    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

/// Uniformly sample rays in a hemisphere. Probability density function (PDF).
pub fn uniform_hemisphere_pdf() -> Float {
    INV_2_PI
}

/// Sample a direction from the power-cosine (Phong) lobe around +z.
pub fn power_cosine_sample_hemisphere(exponent: Float, u: &Point2f) -> Vector3f {
    let cos_theta: Float = u.x.powf(1.0 as Float / (exponent + 1.0 as Float));
    let sin_theta: Float = (0.0 as Float)
        .max(1.0 as Float - cos_theta * cos_theta)
        .sqrt();
    let phi: Float = 2.0 as Float * PI * u.y;
    Vector3f::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Probability density of the power-cosine lobe for a direction with the
/// given cosine to the lobe axis.
pub fn power_cosine_hemisphere_pdf(exponent: Float, cos_theta: Float) -> Float {
    if cos_theta <= 0.0 as Float {
        0.0 as Float
    } else {
        (exponent + 1.0 as Float) * INV_2_PI * cos_theta.powf(exponent)
    }
}

/// Uniformly sample rays in a full sphere. Choose a direction.
pub fn uniform_sample_sphere(u: &Point2f) -> Vector3f {
    let z: Float = 1.0 as Float - 2.0 as Float * u.x;
    let r: Float = (0.0 as Float).max(1.0 as Float - z * z).sqrt();
    let phi: Float = 2.0 as Float * PI * u.y;
    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

/// Probability density function (PDF) of a sphere.
pub fn uniform_sphere_pdf() -> Float {
    INV_4_PI
}

/// Uniformly distribute samples over a unit disk.
pub fn concentric_sample_disk(u: &Point2f) -> Point2f {
    // map uniform random numbers to $[-1,1]^2$
    let u_offset: Point2f = Point2f::new(
        2.0 as Float * u.x - 1.0 as Float,
        2.0 as Float * u.y - 1.0 as Float,
    );
    // handle degeneracy at the origin
    if u_offset.x == 0.0 as Float && u_offset.y == 0.0 as Float {
        return Point2f::default();
    }
    // apply concentric mapping to point
    let theta: Float;
    let r: Float;
    if u_offset.x.abs() > u_offset.y.abs() {
        r = u_offset.x;
        theta = PI_OVER_4 * (u_offset.y / u_offset.x);
    } else {
        r = u_offset.y;
        theta = PI_OVER_2 - PI_OVER_4 * (u_offset.x / u_offset.y);
    }
    Point2f::new(r * theta.cos(), r * theta.sin())
}

/// Uniformly distributing samples over isosceles right triangles actually
/// works for any triangle.
pub fn uniform_sample_triangle(u: &Point2f) -> Point2f {
    let su0: Float = u.x.sqrt();
    Point2f::new(1.0 as Float - su0, u.y * su0)
}
