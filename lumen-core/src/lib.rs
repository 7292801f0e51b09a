#![recursion_limit = "128"]
// Lints
#![deny(unused_qualifications, unused_must_use)]
#![allow(non_snake_case)]
// Clippy config
#![allow(
    clippy::float_cmp,
    clippy::many_single_char_names,
    clippy::excessive_precision,
    clippy::too_many_arguments
)]

use std::f32;
use std::ops::{Add, Mul, Sub};

use num::One;

pub mod bounds;
pub mod bsdf;
pub mod bssrdf;
pub mod camera;
pub mod film;
pub mod filter;
pub mod geometry;
pub mod integrator;
pub mod interaction;
pub mod light;
pub mod material;
pub mod medium;
pub mod memory;
pub mod mipmap;
pub mod mis;
pub mod parallel;
pub mod phase;
pub mod photon_map;
pub mod primitive;
pub mod ray;
pub mod renderparams;
pub mod rng;
pub mod sampler;
pub mod sampling;
pub mod scene;
pub mod shapes;
pub mod spectrum;
pub mod texture;
pub mod transform;

use crate::geometry::{Normal3, Point2, Point3, Vector2, Vector3};

pub type Vector2f = Vector2<f32>;
pub type Vector3f = Vector3<f32>;
pub type Point2f = Point2<f32>;
pub type Point2i = Point2<i32>;
pub type Point3f = Point3<f32>;
pub type Point3i = Point3<i32>;
pub type Normal3f = Normal3<f32>;

pub use crate::transform::Transform;

pub const INV_PI: f32 = f32::consts::FRAC_1_PI;
pub const INV_2_PI: f32 = 0.159_154_943_091_895_33;
pub const MACHINE_EPSILON: f32 = f32::EPSILON * 0.5;

/// Smallest representable float strictly less than 1.
pub const ONE_MINUS_EPSILON: f32 = 0.999_999_94_f32;

pub fn gamma(n: u32) -> f32 {
    (n as f32 * MACHINE_EPSILON) / (1.0 - n as f32 * MACHINE_EPSILON)
}

/// Linear interpolation between 2 values.
///
/// Generic enough to interpolate between 2 Spectrums with an f32 parameter.
pub fn lerp<S, T>(t: S, a: T, b: T) -> T
where
    S: One,
    S: Sub<S, Output = S>,
    S: Copy,
    T: Add<T, Output = T>,
    T: Mul<S, Output = T>,
{
    let one: S = num::one();
    a * (one - t) + b * t
}

pub fn clamp<T>(val: T, low: T, high: T) -> T
where
    T: PartialOrd + Copy,
{
    if val < low {
        low
    } else if val > high {
        high
    } else {
        val
    }
}

/// Bisect `[0, size)` for the last index where `pred` holds, clamped so that
/// both `i` and `i + 1` are valid interpolation endpoints.
pub fn find_interval<P>(size: usize, pred: P) -> usize
where
    P: Fn(usize) -> bool,
{
    let mut first = 0;
    let mut len = size;
    while len > 0 {
        let half = len >> 1;
        let middle = first + half;
        if pred(middle) {
            first = middle + 1;
            len -= half + 1;
        } else {
            len = half;
        }
    }
    clamp(first as isize - 1, 0, size as isize - 2) as usize
}

/// Create an orthogonal coordinate system from a single (normalized) vector.
pub fn coordinate_system(v1: &Vector3f) -> (Vector3f, Vector3f) {
    let v2 = if v1.x.abs() > v1.y.abs() {
        Vector3f::new(-v1.z, 0.0, v1.x) / (v1.x * v1.x + v1.z * v1.z).sqrt()
    } else {
        Vector3f::new(0.0, v1.z, -v1.y) / (v1.y * v1.y + v1.z * v1.z).sqrt()
    };
    let v3 = v1.cross(&v2);

    (v2, v3)
}

/// Version of min() that works on `PartialOrd`, so it works for both u32 and f32.
pub fn min<T: PartialOrd + Copy>(a: T, b: T) -> T {
    if a.lt(&b) {
        a
    } else {
        b
    }
}

/// Version of max() that works on `PartialOrd`, so it works for both u32 and f32.
pub fn max<T: PartialOrd + Copy>(a: T, b: T) -> T {
    if a.gt(&b) {
        a
    } else {
        b
    }
}

#[inline]
pub fn is_power_of_2(v: i32) -> bool {
    (v != 0) && (v & (v - 1)) == 0
}

#[inline]
pub fn round_up_pow_2(v: i32) -> i32 {
    let mut v = v - 1;
    v |= v >> 1;
    v |= v >> 2;
    v |= v >> 4;
    v |= v >> 8;
    v |= v >> 16;
    v + 1
}

pub fn erf(x: f32) -> f32 {
    // Abramowitz & Stegun 7.1.26
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

pub fn erf_inv(x: f32) -> f32 {
    // Giles' polynomial approximation
    let x = clamp(x, -0.99999, 0.99999);
    let mut w = -((1.0 - x) * (1.0 + x)).ln();
    if w < 5.0 {
        w -= 2.5;
        let mut p = 2.81022636e-08;
        p = 3.43273939e-07 + p * w;
        p = -3.5233877e-06 + p * w;
        p = -4.39150654e-06 + p * w;
        p = 0.00021858087 + p * w;
        p = -0.00125372503 + p * w;
        p = -0.00417768164 + p * w;
        p = 0.246640727 + p * w;
        p = 1.50140941 + p * w;
        p * x
    } else {
        w = w.sqrt() - 3.0;
        let mut p = -0.000200214257;
        p = 0.000100950558 + p * w;
        p = 0.00134934322 + p * w;
        p = -0.00367342844 + p * w;
        p = 0.00573950773 + p * w;
        p = -0.0076224613 + p * w;
        p = 0.00943887047 + p * w;
        p = 1.00167406 + p * w;
        p = 2.83297682 + p * w;
        p * x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_interval() {
        let a = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9];

        // check clamping for out of range
        assert_eq!(0, find_interval(a.len(), |index| a[index] as isize <= -1));
        assert_eq!(a.len() - 2, find_interval(a.len(), |index| a[index] <= 100));

        for i in 0..a.len() - 1 {
            assert_eq!(i, find_interval(a.len(), |index| a[index] <= i));
            assert_eq!(
                i,
                find_interval(a.len(), |index| a[index] as f32 <= i as f32 + 0.5)
            );
        }
    }

    #[test]
    fn test_round_up_pow_2() {
        assert_eq!(round_up_pow_2(1023), 1024);
        assert_eq!(round_up_pow_2(1024), 1024);
        assert!(is_power_of_2(1024));
        assert!(!is_power_of_2(7));
    }

    #[test]
    fn test_erf_inv_roundtrip() {
        for i in 1..10 {
            let x = i as f32 / 10.0;
            assert!((erf(erf_inv(x)) - x).abs() < 1e-3);
        }
    }

    #[test]
    fn test_coordinate_system() {
        let n = Vector3f::new(0.0, 0.0, 1.0);
        let (u, v) = coordinate_system(&n);
        assert!(u.dot(&n).abs() < 1e-6);
        assert!(v.dot(&n).abs() < 1e-6);
        assert!(u.dot(&v).abs() < 1e-6);
    }
}
