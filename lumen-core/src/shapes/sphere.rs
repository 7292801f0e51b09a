use std::f32::consts::PI;

use crate::bounds::Bounds3f;
use crate::geometry::{distance_squared, spherical_direction_in, spherical_phi, spherical_theta};
use crate::interaction::{Interaction, SurfaceInteraction};
use crate::ray::Ray;
use crate::sampling::{uniform_cone_pdf, uniform_sample_cone, uniform_sample_sphere};
use crate::shapes::Shape;
use crate::{coordinate_system, gamma, Normal3f, Point2f, Point3f, Vector3f};

pub struct Sphere {
    center: Point3f,
    radius: f32,
}

impl Sphere {
    pub fn new(center: Point3f, radius: f32) -> Sphere {
        Sphere { center, radius }
    }
}

impl Shape for Sphere {
    fn intersect<'a>(&'a self, ray: &Ray) -> Option<(f32, SurfaceInteraction<'a>)> {
        let oc = self.center - ray.o;
        let b = oc.dot(&ray.d) / ray.d.length_squared();
        let c = (oc.length_squared() - self.radius * self.radius) / ray.d.length_squared();
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t1 = b - sqrt_disc;
        let t2 = b + sqrt_disc;

        let eps = 1e-4;
        let t_hit = if t1 > eps {
            t1
        } else if t2 > eps {
            t2
        } else {
            return None;
        };
        if t_hit > ray.t_max {
            return None;
        }

        let p = ray.at(t_hit);
        let p_obj = p - self.center;
        let n = Normal3f::from(p_obj.normalize());

        // Differential geometry in spherical coordinates
        let nv = Vector3f::from(n);
        let phi = spherical_phi(&nv);
        let theta = spherical_theta(&nv);
        let u = phi / (2.0 * PI);
        let v = theta / PI;
        let mut dpdu = Vector3f::new(-2.0 * PI * p_obj.y, 2.0 * PI * p_obj.x, 0.0);
        let dpdv = Vector3f::new(
            phi.cos() * p_obj.z,
            phi.sin() * p_obj.z,
            -self.radius * theta.sin(),
        ) * -PI;
        // Poles have a degenerate dpdu
        if dpdu.length_squared() < 1e-9 {
            let sz = if p_obj.z > 0.0 { 1.0 } else { -1.0 };
            dpdu = dpdv.cross(&Vector3f::new(sz, 0.0, 0.0));
            if dpdu.length_squared() < 1e-9 {
                dpdu = Vector3f::new(1.0, 0.0, 0.0);
            }
        }

        let p_error = p_obj.abs() * gamma(5);
        let mut isect = SurfaceInteraction::new(
            p,
            p_error,
            Point2f::new(u, v),
            -ray.d,
            dpdu,
            dpdv,
            Normal3f::new(0.0, 0.0, 0.0),
            Normal3f::new(0.0, 0.0, 0.0),
            Some(self),
        );
        // Geometric normal points out of the sphere
        isect.hit.n = n;
        isect.shading.n = n;
        Some((t_hit, isect))
    }

    fn world_bound(&self) -> Bounds3f {
        let r = Vector3f::new(self.radius, self.radius, self.radius);
        Bounds3f::from_points(&(self.center - r), &(self.center + r))
    }

    fn area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }

    fn sample(&self, u: &Point2f) -> Interaction {
        let d = uniform_sample_sphere(*u);
        let p = self.center + d * self.radius;
        let mut it = Interaction::from_point(&p);
        it.n = Normal3f::from(d);
        it.p_error = p.abs() * gamma(5);
        it
    }

    fn sample_from(&self, re: &Interaction, u: &Point2f) -> Interaction {
        let dc2 = distance_squared(&re.p, &self.center);
        if dc2 <= self.radius * self.radius {
            // Reference inside the sphere: fall back to uniform area sampling
            return self.sample(u);
        }

        // Sample the cone of directions subtended by the sphere
        let dc = dc2.sqrt();
        let wc = (self.center - re.p) / dc;
        let (wc_x, wc_y) = coordinate_system(&wc);

        let sin_theta_max2 = self.radius * self.radius / dc2;
        let cos_theta_max = (1.0 - sin_theta_max2).max(0.0).sqrt();
        let cone = uniform_sample_cone(*u, cos_theta_max);
        let cos_theta = cone.z;
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = cone.y.atan2(cone.x);

        let ds = dc * cos_theta
            - (self.radius * self.radius - dc2 * sin_theta * sin_theta).max(0.0).sqrt();
        let cos_alpha = (dc2 + self.radius * self.radius - ds * ds) / (2.0 * dc * self.radius);
        let sin_alpha = (1.0 - cos_alpha * cos_alpha).max(0.0).sqrt();

        let n_obj = spherical_direction_in(sin_alpha, cos_alpha, phi, &wc_x, &wc_y, &-wc);
        let p = self.center + n_obj * self.radius;
        let mut it = Interaction::from_point(&p);
        it.n = Normal3f::from(n_obj);
        it.p_error = p.abs() * gamma(5);
        it
    }

    fn pdf_from(&self, re: &Interaction, wi: &Vector3f) -> f32 {
        let dc2 = distance_squared(&re.p, &self.center);
        if dc2 <= self.radius * self.radius {
            // Area sampling fallback for references inside
            let ray = re.spawn_ray(wi);
            return match self.intersect(&ray) {
                Some((_, isect)) => {
                    let denom = isect.hit.n.dot(&-(*wi)).abs() * self.area();
                    if denom == 0.0 {
                        0.0
                    } else {
                        distance_squared(&re.p, &isect.hit.p) / denom
                    }
                }
                None => 0.0,
            };
        }
        let sin_theta_max2 = self.radius * self.radius / dc2;
        let cos_theta_max = (1.0 - sin_theta_max2).max(0.0).sqrt();
        uniform_cone_pdf(cos_theta_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    #[test]
    fn test_intersect_hits_and_misses() {
        let s = Sphere::new(Point3f::new(0.0, 0.0, 0.0), 1.0);
        let mut hit_ray = Ray::new(Point3f::new(0.0, 0.0, -5.0), Vector3f::new(0.0, 0.0, 1.0));
        hit_ray.t_max = 100.0;
        let (t, isect) = s.intersect(&hit_ray).unwrap();
        assert!((t - 4.0).abs() < 1e-3);
        assert!((isect.hit.p.z + 1.0).abs() < 1e-3);
        // Normal faces the ray origin
        assert!(isect.hit.n.z < 0.0);

        let miss_ray = Ray::new(Point3f::new(0.0, 2.0, -5.0), Vector3f::new(0.0, 0.0, 1.0));
        assert!(s.intersect(&miss_ray).is_none());
    }

    #[test]
    fn test_sample_on_surface() {
        let s = Sphere::new(Point3f::new(1.0, 2.0, 3.0), 0.5);
        let mut rng = Rng::with_seed(4);
        for _ in 0..200 {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let it = s.sample(&u);
            let d = (it.p - Point3f::new(1.0, 2.0, 3.0)).length();
            assert!((d - 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_cone_pdf_matches_solid_angle() {
        // From far away the subtended solid angle is ~ pi r^2 / d^2 and the
        // cone pdf its reciprocal.
        let s = Sphere::new(Point3f::new(0.0, 0.0, 0.0), 0.1);
        let re = Interaction::from_point(&Point3f::new(0.0, 0.0, 10.0));
        let wi = Vector3f::new(0.0, 0.0, -1.0);
        let pdf = s.pdf_from(&re, &wi);
        let omega = PI * 0.1 * 0.1 / 100.0;
        assert!((pdf * omega - 1.0).abs() < 0.01, "pdf = {}", pdf);
    }

    #[test]
    fn test_sample_from_inside_uses_full_sphere() {
        let s = Sphere::new(Point3f::new(0.0, 0.0, 0.0), 1.0);
        let re = Interaction::from_point(&Point3f::new(0.0, 0.0, 0.0));
        let mut rng = Rng::with_seed(8);
        let mut saw_upper = false;
        let mut saw_lower = false;
        for _ in 0..100 {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let it = s.sample_from(&re, &u);
            if it.p.z > 0.5 {
                saw_upper = true;
            }
            if it.p.z < -0.5 {
                saw_lower = true;
            }
        }
        assert!(saw_upper && saw_lower);
    }
}
