use crate::bounds::Bounds3f;
use crate::interaction::{Interaction, SurfaceInteraction};
use crate::ray::Ray;
use crate::shapes::Shape;
use crate::{Normal3f, Point2f, Point3f, Vector3f};

/// A parallelogram given by a corner and two edge vectors. The normal is
/// `normalize(e1 x e2)`.
pub struct Quad {
    p0: Point3f,
    e1: Vector3f,
    e2: Vector3f,
    n: Normal3f,
    area: f32,
}

impl Quad {
    pub fn new(p0: Point3f, e1: Vector3f, e2: Vector3f) -> Quad {
        let cross = e1.cross(&e2);
        Quad {
            p0,
            e1,
            e2,
            n: Normal3f::from(cross.normalize()),
            area: cross.length(),
        }
    }
}

impl Shape for Quad {
    fn intersect<'a>(&'a self, ray: &Ray) -> Option<(f32, SurfaceInteraction<'a>)> {
        let nv = Vector3f::from(self.n);
        let denom = ray.d.dot(&nv);
        if denom.abs() < 1e-9 {
            return None;
        }
        let t = (self.p0 - ray.o).dot(&nv) / denom;
        if t <= 1e-4 || t > ray.t_max {
            return None;
        }
        let p = ray.at(t);
        let d = p - self.p0;
        // Project onto the (possibly non-orthogonal) edge basis
        let e11 = self.e1.dot(&self.e1);
        let e12 = self.e1.dot(&self.e2);
        let e22 = self.e2.dot(&self.e2);
        let det = e11 * e22 - e12 * e12;
        if det.abs() < 1e-12 {
            return None;
        }
        let d1 = d.dot(&self.e1);
        let d2 = d.dot(&self.e2);
        let u = (e22 * d1 - e12 * d2) / det;
        let v = (e11 * d2 - e12 * d1) / det;
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return None;
        }

        let p_error = p.abs() * crate::gamma(7);
        let mut isect = SurfaceInteraction::new(
            p,
            p_error,
            Point2f::new(u, v),
            -ray.d,
            self.e1,
            self.e2,
            Normal3f::new(0.0, 0.0, 0.0),
            Normal3f::new(0.0, 0.0, 0.0),
            Some(self),
        );
        isect.hit.n = self.n;
        isect.shading.n = self.n;
        Some((t, isect))
    }

    fn world_bound(&self) -> Bounds3f {
        Bounds3f::from_point(&self.p0)
            .merge_point(&(self.p0 + self.e1))
            .merge_point(&(self.p0 + self.e2))
            .merge_point(&(self.p0 + self.e1 + self.e2))
    }

    fn area(&self) -> f32 {
        self.area
    }

    fn sample(&self, u: &Point2f) -> Interaction {
        let p = self.p0 + self.e1 * u.x + self.e2 * u.y;
        let mut it = Interaction::from_point(&p);
        it.n = self.n;
        it.p_error = p.abs() * crate::gamma(7);
        it
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersect_inside_and_outside() {
        let q = Quad::new(
            Point3f::new(0.0, 0.0, 0.0),
            Vector3f::new(1.0, 0.0, 0.0),
            Vector3f::new(0.0, 1.0, 0.0),
        );
        let mut ray = Ray::new(Point3f::new(0.5, 0.5, -1.0), Vector3f::new(0.0, 0.0, 1.0));
        ray.t_max = 10.0;
        let (t, isect) = q.intersect(&ray).unwrap();
        assert!((t - 1.0).abs() < 1e-4);
        assert!((isect.uv.x - 0.5).abs() < 1e-4);

        let miss = Ray::new(Point3f::new(1.5, 0.5, -1.0), Vector3f::new(0.0, 0.0, 1.0));
        assert!(q.intersect(&miss).is_none());
    }

    #[test]
    fn test_area_and_sample() {
        let q = Quad::new(
            Point3f::new(0.0, 0.0, 0.0),
            Vector3f::new(2.0, 0.0, 0.0),
            Vector3f::new(0.0, 3.0, 0.0),
        );
        assert!((q.area() - 6.0).abs() < 1e-5);
        let it = q.sample(&Point2f::new(0.5, 0.5));
        assert_eq!(it.p, Point3f::new(1.0, 1.5, 0.0));
        assert!((q.pdf(&it) - 1.0 / 6.0).abs() < 1e-6);
    }
}
