use crate::{clamp, gamma, Normal3f, Point3f, Vector3f};

mod normal;
mod point;
mod vector;

pub use self::normal::Normal3;
pub use self::point::{Point2, Point3};
pub use self::vector::{Vector2, Vector3};

// Spherical coordinates

pub fn spherical_theta(v: &Vector3f) -> f32 {
    clamp(v.z, -1.0, 1.0).acos()
}

pub fn spherical_phi(v: &Vector3f) -> f32 {
    let p = v.y.atan2(v.x);
    if p < 0.0 {
        p + 2.0 * std::f32::consts::PI
    } else {
        p
    }
}

pub fn spherical_direction(sin_theta: f32, cos_theta: f32, phi: f32) -> Vector3f {
    Vector3f::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

pub fn spherical_direction_in(
    sin_theta: f32,
    cos_theta: f32,
    phi: f32,
    x: &Vector3f,
    y: &Vector3f,
    z: &Vector3f,
) -> Vector3f {
    *x * (sin_theta * phi.cos()) + *y * (sin_theta * phi.sin()) + *z * cos_theta
}

// Shading-frame trigonometry. Directions are expressed in a frame where the
// normal is (0, 0, 1).

#[inline]
pub fn cos_theta(w: &Vector3f) -> f32 {
    w.z
}

#[inline]
pub fn cos2_theta(w: &Vector3f) -> f32 {
    w.z * w.z
}

#[inline]
pub fn abs_cos_theta(w: &Vector3f) -> f32 {
    w.z.abs()
}

#[inline]
pub fn sin2_theta(w: &Vector3f) -> f32 {
    (1.0 - cos2_theta(w)).max(0.0)
}

#[inline]
pub fn sin_theta(w: &Vector3f) -> f32 {
    sin2_theta(w).sqrt()
}

#[inline]
pub fn tan_theta(w: &Vector3f) -> f32 {
    sin_theta(w) / cos_theta(w)
}

#[inline]
pub fn tan2_theta(w: &Vector3f) -> f32 {
    sin2_theta(w) / cos2_theta(w)
}

#[inline]
pub fn cos_phi(w: &Vector3f) -> f32 {
    let s = sin_theta(w);
    if s == 0.0 {
        1.0
    } else {
        clamp(w.x / s, -1.0, 1.0)
    }
}

#[inline]
pub fn sin_phi(w: &Vector3f) -> f32 {
    let s = sin_theta(w);
    if s == 0.0 {
        0.0
    } else {
        clamp(w.y / s, -1.0, 1.0)
    }
}

#[inline]
pub fn cos2_phi(w: &Vector3f) -> f32 {
    cos_phi(w) * cos_phi(w)
}

#[inline]
pub fn sin2_phi(w: &Vector3f) -> f32 {
    sin_phi(w) * sin_phi(w)
}

#[inline]
pub fn same_hemisphere(w: &Vector3f, wp: &Vector3f) -> bool {
    w.z * wp.z > 0.0
}

/// Mirror direction of `wo` about the half vector `n`.
pub fn reflect(wo: &Vector3f, n: &Vector3f) -> Vector3f {
    -(*wo) + *n * 2.0 * wo.dot(n)
}

/// Refraction of `wi` about `n` with relative index `eta`. Returns `None` on
/// total internal reflection.
pub fn refract(wi: &Vector3f, n: &Normal3f, eta: f32) -> Option<Vector3f> {
    let cos_theta_i = n.dot(wi);
    let sin2_theta_i = (1.0 - cos_theta_i * cos_theta_i).max(0.0);
    let sin2_theta_t = eta * eta * sin2_theta_i;
    if sin2_theta_t >= 1.0 {
        None
    } else {
        let cos_theta_t = (1.0 - sin2_theta_t).sqrt();
        Some(*wi * -eta + Vector3f::from(*n) * (eta * cos_theta_i - cos_theta_t))
    }
}

pub fn face_forward(n: &Normal3f, v: &Vector3f) -> Normal3f {
    if n.dot(v) < 0.0 {
        -(*n)
    } else {
        *n
    }
}

pub fn face_forward_n(n: &Normal3f, n2: &Normal3f) -> Normal3f {
    if n.dotn(n2) < 0.0 {
        -(*n)
    } else {
        *n
    }
}

/// Offset a spawned ray origin along the normal so that the new ray does not
/// immediately re-intersect the surface it starts on.
pub fn offset_ray_origin(
    p: &Point3f,
    p_error: &Vector3f,
    n: &Normal3f,
    w: &Vector3f,
) -> Point3f {
    let d = n.abs().dot(p_error) + gamma(7);
    let mut offset = Vector3f::from(*n) * d;
    if w.dot(&Vector3f::from(*n)) < 0.0 {
        offset = -offset;
    }
    *p + offset
}

pub fn distance(p1: &Point3f, p2: &Point3f) -> f32 {
    (*p1 - *p2).length()
}

pub fn distance_squared(p1: &Point3f, p2: &Point3f) -> f32 {
    (*p1 - *p2).length_squared()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect() {
        let wo = Vector3f::new(1.0, 0.0, 1.0).normalize();
        let n = Vector3f::new(0.0, 0.0, 1.0);
        let wi = reflect(&wo, &n);
        assert!((wi.x + wo.x).abs() < 1e-6);
        assert!((wi.z - wo.z).abs() < 1e-6);
    }

    #[test]
    fn test_refract_tir() {
        // Grazing ray from the dense side gets totally reflected
        let wi = Vector3f::new(0.99, 0.0, 0.141).normalize();
        let n = Normal3f::new(0.0, 0.0, 1.0);
        assert!(refract(&wi, &n, 1.5).is_none());
    }

    #[test]
    fn test_spherical_roundtrip() {
        let v = Vector3f::new(0.3, -0.4, 0.86).normalize();
        let theta = spherical_theta(&v);
        let phi = spherical_phi(&v);
        let w = spherical_direction(theta.sin(), theta.cos(), phi);
        assert!((v - w).length() < 1e-5);
    }
}
