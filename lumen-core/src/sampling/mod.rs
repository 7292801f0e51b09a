use std::f32::consts;

use crate::{Point2f, Vector2f, Vector3f};

mod distribution1d;
mod distribution2d;

pub use self::distribution1d::Distribution1D;
pub use self::distribution2d::Distribution2D;

const FRAC_PI_4: f32 = consts::FRAC_PI_2 / 2.0;

pub fn uniform_sample_sphere(u: Point2f) -> Vector3f {
    let z = 1.0 - 2.0 * u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * consts::PI * u.y;

    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_sphere_pdf() -> f32 {
    1.0 / (4.0 * consts::PI)
}

/// Shirley's concentric warp from the unit square to the unit disk.
pub fn concentric_sample_disk(u: Point2f) -> Point2f {
    // Map uniform random numbers to `[-1, 1]^2`
    let u_offset = 2.0 * u - Vector2f::new(1.0, 1.0);

    // Handle degeneracy at the origin
    if u_offset.x == 0.0 && u_offset.y == 0.0 {
        return Point2f::new(0.0, 0.0);
    }

    // Apply concentric mapping to point
    let (r, theta) = if u_offset.x.abs() > u_offset.y.abs() {
        (u_offset.x, FRAC_PI_4 * (u_offset.y / u_offset.x))
    } else {
        (
            u_offset.y,
            consts::FRAC_PI_2 - FRAC_PI_4 * (u_offset.x / u_offset.y),
        )
    };
    r * Point2f::new(theta.cos(), theta.sin())
}

/// Concentric disk sample lifted to the hemisphere; `z` is non-negative.
pub fn cosine_sample_hemisphere(u: Point2f) -> Vector3f {
    let d = concentric_sample_disk(u);
    let z = (1.0 - d.x * d.x - d.y * d.y).max(0.0).sqrt();
    Vector3f::new(d.x, d.y, z)
}

#[inline]
pub fn cosine_hemisphere_pdf(cos_theta: f32) -> f32 {
    cos_theta * consts::FRAC_1_PI
}

pub fn uniform_cone_pdf(cos_theta_max: f32) -> f32 {
    1.0 / (2.0 * consts::PI * (1.0 - cos_theta_max))
}

pub fn uniform_sample_cone(u: Point2f, cos_theta_max: f32) -> Vector3f {
    let cos_theta = (1.0 - u.x) + u.x * cos_theta_max;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = u.y * 2.0 * consts::PI;
    Vector3f::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta)
}

pub fn uniform_sample_triangle(u: Point2f) -> Point2f {
    let su0 = u[0].sqrt();
    Point2f::new(1.0 - su0, u[1] * su0)
}

#[inline]
pub fn power_heuristic(nf: u32, f_pdf: f32, ng: u32, g_pdf: f32) -> f32 {
    let f = nf as f32 * f_pdf;
    let g = ng as f32 * g_pdf;
    (f * f) / (f * f + g * g)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    #[test]
    fn test_concentric_disk_stays_in_disk() {
        let mut rng = Rng::with_seed(1);
        for _ in 0..1000 {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let d = concentric_sample_disk(u);
            assert!(d.x * d.x + d.y * d.y <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_cosine_hemisphere_upper() {
        let mut rng = Rng::with_seed(2);
        for _ in 0..1000 {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let w = cosine_sample_hemisphere(u);
            assert!(w.z >= 0.0);
            assert!((w.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_uniform_sphere_unit_length() {
        let mut rng = Rng::with_seed(3);
        for _ in 0..1000 {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            assert!((uniform_sample_sphere(u).length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_power_heuristic() {
        // Equal pdfs split the weight evenly
        assert!((power_heuristic(1, 0.5, 1, 0.5) - 0.5).abs() < 1e-6);
        // A dominant pdf takes almost all the weight
        assert!(power_heuristic(1, 10.0, 1, 0.01) > 0.99);
        // And the two weights sum to one
        let w1 = power_heuristic(1, 0.7, 1, 0.2);
        let w2 = power_heuristic(1, 0.2, 1, 0.7);
        assert!((w1 + w2 - 1.0).abs() < 1e-6);
    }
}
