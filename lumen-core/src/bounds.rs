use std::f32;
use std::fmt::{Display, Error, Formatter};

use num::Zero;

use crate::ray::Ray;
use crate::{gamma, lerp, Point2f, Point2i, Point3f, Vector2f, Vector3f};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds2<T> {
    pub p_min: T,
    pub p_max: T,
}

pub type Bounds2f = Bounds2<Point2f>;
pub type Bounds2i = Bounds2<Point2i>;

impl Bounds2f {
    pub fn from_points(p1: &Point2f, p2: &Point2f) -> Bounds2f {
        Bounds2 {
            p_min: Point2f::new(p1.x.min(p2.x), p1.y.min(p2.y)),
            p_max: Point2f::new(p1.x.max(p2.x), p1.y.max(p2.y)),
        }
    }

    pub fn intersect(b1: &Bounds2f, b2: &Bounds2f) -> Bounds2f {
        Bounds2 {
            p_min: Point2f::new(b1.p_min.x.max(b2.p_min.x), b1.p_min.y.max(b2.p_min.y)),
            p_max: Point2f::new(b1.p_max.x.min(b2.p_max.x), b1.p_max.y.min(b2.p_max.y)),
        }
    }
}

impl Bounds2i {
    pub fn from_points(p1: &Point2i, p2: &Point2i) -> Bounds2i {
        Bounds2 {
            p_min: Point2i::new(p1.x.min(p2.x), p1.y.min(p2.y)),
            p_max: Point2i::new(p1.x.max(p2.x), p1.y.max(p2.y)),
        }
    }

    pub fn area(&self) -> i32 {
        let d = self.p_max - self.p_min;
        d.x * d.y
    }

    pub fn diagonal(&self) -> Vector2f {
        Vector2f::new(
            (self.p_max.x - self.p_min.x) as f32,
            (self.p_max.y - self.p_min.y) as f32,
        )
    }

    pub fn inside_exclusive(&self, p: &Point2i) -> bool {
        p.x >= self.p_min.x && p.x < self.p_max.x && p.y >= self.p_min.y && p.y < self.p_max.y
    }
}

/// Row-major iterator over the integer points of a `Bounds2i`.
pub struct Bounds2iIterator {
    bounds: Bounds2i,
    current: Point2i,
}

impl Iterator for Bounds2iIterator {
    type Item = Point2i;

    fn next(&mut self) -> Option<Point2i> {
        if self.current.y >= self.bounds.p_max.y {
            return None;
        }
        let p = self.current;
        self.current.x += 1;
        if self.current.x >= self.bounds.p_max.x {
            self.current.x = self.bounds.p_min.x;
            self.current.y += 1;
        }
        Some(p)
    }
}

impl IntoIterator for &Bounds2i {
    type Item = Point2i;
    type IntoIter = Bounds2iIterator;

    fn into_iter(self) -> Bounds2iIterator {
        Bounds2iIterator {
            bounds: *self,
            current: self.p_min,
        }
    }
}

impl<T> Display for Bounds2<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "[{} -> {}]", self.p_min, self.p_max)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds3f {
    pub p_min: Point3f,
    pub p_max: Point3f,
}

impl Bounds3f {
    pub fn new() -> Bounds3f {
        Bounds3f {
            p_min: Point3f::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            p_max: Point3f::new(-f32::INFINITY, -f32::INFINITY, -f32::INFINITY),
        }
    }

    pub fn from_points(p1: &Point3f, p2: &Point3f) -> Bounds3f {
        Bounds3f {
            p_min: Point3f::new(p1.x.min(p2.x), p1.y.min(p2.y), p1.z.min(p2.z)),
            p_max: Point3f::new(p1.x.max(p2.x), p1.y.max(p2.y), p1.z.max(p2.z)),
        }
    }

    pub fn from_point(p: &Point3f) -> Bounds3f {
        Bounds3f {
            p_min: *p,
            p_max: *p,
        }
    }

    pub fn merge_point(&self, p: &Point3f) -> Bounds3f {
        Bounds3f {
            p_min: Point3f::new(
                self.p_min.x.min(p.x),
                self.p_min.y.min(p.y),
                self.p_min.z.min(p.z),
            ),
            p_max: Point3f::new(
                self.p_max.x.max(p.x),
                self.p_max.y.max(p.y),
                self.p_max.z.max(p.z),
            ),
        }
    }

    pub fn merge(&self, b: &Bounds3f) -> Bounds3f {
        self.merge_point(&b.p_min).merge_point(&b.p_max)
    }

    pub fn diagonal(&self) -> Vector3f {
        self.p_max - self.p_min
    }

    pub fn inside(&self, p: &Point3f) -> bool {
        p.x >= self.p_min.x
            && p.x <= self.p_max.x
            && p.y >= self.p_min.y
            && p.y <= self.p_max.y
            && p.z >= self.p_min.z
            && p.z <= self.p_max.z
    }

    pub fn lerp(&self, t: &Point3f) -> Point3f {
        Point3f::new(
            lerp(t.x, self.p_min.x, self.p_max.x),
            lerp(t.y, self.p_min.y, self.p_max.y),
            lerp(t.z, self.p_min.z, self.p_max.z),
        )
    }

    /// Centre and radius of the sphere enclosing the bounds.
    pub fn bounding_sphere(&self) -> (Point3f, f32) {
        let centre = self.p_min + self.diagonal() * 0.5;
        let radius = if self.inside(&centre) {
            (self.p_max - centre).length()
        } else {
            0.0
        };
        (centre, radius)
    }

    /// Slab test against the ray, clipped to `[0, ray.t_max]`.
    pub fn intersect_p(&self, ray: &Ray) -> Option<(f32, f32)> {
        let mut t0 = 0.0;
        let mut t1 = ray.t_max;
        for i in 0..3 {
            let inv_dir = 1.0 / ray.d[i];
            let mut t_near = (self.p_min[i] - ray.o[i]) * inv_dir;
            let mut t_far = (self.p_max[i] - ray.o[i]) * inv_dir;
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            // Pad t_far to keep the test conservative under rounding
            t_far *= 1.0 + 2.0 * gamma(3);
            t0 = if t_near > t0 { t_near } else { t0 };
            t1 = if t_far < t1 { t_far } else { t1 };
            if t0 > t1 {
                return None;
            }
        }
        Some((t0, t1))
    }
}

impl Default for Bounds3f {
    fn default() -> Bounds3f {
        Bounds3f::new()
    }
}

impl Display for Bounds3f {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "[{} -> {}]", self.p_min, self.p_max)
    }
}

impl Zero for Bounds3f {
    fn zero() -> Bounds3f {
        Bounds3f::new()
    }

    fn is_zero(&self) -> bool {
        self.p_min.x > self.p_max.x
    }
}

impl std::ops::Add for Bounds3f {
    type Output = Bounds3f;

    fn add(self, rhs: Bounds3f) -> Bounds3f {
        self.merge(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector3f;

    #[test]
    fn test_merge_inside() {
        let b = Bounds3f::new()
            .merge_point(&Point3f::new(0.0, 0.0, 0.0))
            .merge_point(&Point3f::new(1.0, 2.0, 3.0));
        assert!(b.inside(&Point3f::new(0.5, 1.0, 1.5)));
        assert!(!b.inside(&Point3f::new(-0.5, 1.0, 1.5)));
    }

    #[test]
    fn test_ray_intersect() {
        let b = Bounds3f::from_points(&Point3f::new(0.0, 0.0, 0.0), &Point3f::new(1.0, 1.0, 1.0));
        let r = Ray::new(Point3f::new(0.5, 0.5, -1.0), Vector3f::new(0.0, 0.0, 1.0));
        let (t0, t1) = b.intersect_p(&r).unwrap();
        assert!((t0 - 1.0).abs() < 1e-4);
        assert!((t1 - 2.0).abs() < 1e-3);

        let miss = Ray::new(Point3f::new(2.0, 2.0, -1.0), Vector3f::new(0.0, 0.0, 1.0));
        assert!(b.intersect_p(&miss).is_none());
    }

    #[test]
    fn test_bounds2i_iter() {
        let b = Bounds2i::from_points(&Point2i::new(0, 0), &Point2i::new(2, 2));
        let pts: Vec<_> = b.into_iter().collect();
        assert_eq!(pts.len(), 4);
        assert_eq!(pts[0], Point2i::new(0, 0));
        assert_eq!(pts[3], Point2i::new(1, 1));
    }
}
