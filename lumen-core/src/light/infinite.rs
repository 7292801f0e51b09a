use std::f32::consts::{FRAC_1_PI, PI};

use num::Zero;
use parking_lot::RwLock;

use crate::geometry::{spherical_phi, spherical_theta};
use crate::interaction::Interaction;
use crate::light::{LeSample, Light, LightFlags, LiSample, VisibilityTester};
use crate::mipmap::MipMap;
use crate::ray::Ray;
use crate::sampling::{concentric_sample_disk, Distribution2D};
use crate::scene::Scene;
use crate::spectrum::Spectrum;
use crate::transform::Transform;
use crate::{coordinate_system, Normal3f, Point2f, Point2i, Point3f, Vector3f};

/// Environment map light: a mip-mapped radiance texture over the sphere of
/// directions, importance sampled through a sin-theta-weighted 2D
/// distribution in (u, v).
pub struct Envmap {
    id: u32,
    light_to_world: Transform,
    world_to_light: Transform,
    l_map: MipMap,
    world_center: RwLock<Point3f>,
    world_radius: RwLock<f32>,
    distribution: Distribution2D,
}

impl Envmap {
    pub fn new(l2w: Transform, resolution: Point2i, texels: Vec<Spectrum>) -> Envmap {
        let l_map = MipMap::new(&resolution, &texels);

        // Weight each row of the sampling image by the sin(theta) of the
        // sphere parametrization so poles are not over-sampled.
        let width = 2 * l_map.width();
        let height = 2 * l_map.height();
        let filter = 0.5 / width.min(height) as f32;
        let mut img = Vec::with_capacity(width * height);
        for v in 0..height {
            let vp = (v as f32 + 0.5) / height as f32;
            let sin_theta = (PI * (v as f32 + 0.5) / height as f32).sin();
            for u in 0..width {
                let up = (u as f32 + 0.5) / width as f32;
                img.push(l_map.lookup(&Point2f::new(up, vp), filter).gray() * sin_theta);
            }
        }
        let distribution = Distribution2D::new(&img, width, height);

        Envmap {
            id: super::next_light_id(),
            world_to_light: l2w.inverse(),
            light_to_world: l2w,
            l_map,
            world_center: RwLock::new(Point3f::zero()),
            world_radius: RwLock::new(1.0),
            distribution,
        }
    }

    /// Constant-radiance environment, useful for furnace setups.
    pub fn constant(l: Spectrum) -> Envmap {
        Envmap::new(Transform::new(), Point2i::new(1, 1), vec![l])
    }

    fn direction_for(&self, uv: &Point2f) -> Vector3f {
        let theta = uv[1] * PI;
        let phi = uv[0] * 2.0 * PI;
        self.light_to_world.transform_vector(&Vector3f::new(
            theta.sin() * phi.cos(),
            theta.sin() * phi.sin(),
            theta.cos(),
        ))
    }
}

impl Light for Envmap {
    fn id(&self) -> u32 {
        self.id
    }

    fn flags(&self) -> LightFlags {
        LightFlags::INFINITE
    }

    fn preprocess(&self, scene: &Scene) {
        let (center, radius) = scene.world_bound().bounding_sphere();
        *self.world_center.write() = center;
        *self.world_radius.write() = radius.max(1e-2);
    }

    fn sample_li(&self, re: &Interaction, u: &Point2f) -> LiSample {
        let (uv, map_pdf) = self.distribution.sample_continuous(u);
        if map_pdf == 0.0 {
            return LiSample {
                li: Spectrum::black(),
                wi: Vector3f::new(0.0, 0.0, 1.0),
                pdf: 0.0,
                vis: VisibilityTester::new(re.clone(), Interaction::from_point(&re.p)),
            };
        }
        let theta = uv[1] * PI;
        let sin_theta = theta.sin();
        let wi = self.direction_for(&uv);
        let pdf = if sin_theta == 0.0 {
            0.0
        } else {
            map_pdf / (2.0 * PI * PI * sin_theta)
        };

        let world_radius = *self.world_radius.read();
        let target = Interaction::from_point(&(re.p + wi * (2.0 * world_radius)));
        LiSample {
            li: self.l_map.lookup(&uv, 0.0),
            wi,
            pdf,
            vis: VisibilityTester::new(re.clone(), target),
        }
    }

    fn pdf_li(&self, _re: &Interaction, w: &Vector3f) -> f32 {
        let wi = self.world_to_light.transform_vector(w).normalize();
        let theta = spherical_theta(&wi);
        let phi = spherical_phi(&wi);
        let sin_theta = theta.sin();
        if sin_theta == 0.0 {
            return 0.0;
        }
        self.distribution
            .pdf(&Point2f::new(phi * FRAC_1_PI * 0.5, theta * FRAC_1_PI))
            / (2.0 * PI * PI * sin_theta)
    }

    fn sample_le(&self, u1: &Point2f, u2: &Point2f) -> LeSample {
        let (uv, map_pdf) = self.distribution.sample_continuous(u1);
        let theta = uv[1] * PI;
        let sin_theta = theta.sin();
        // Emitted direction points into the scene
        let d = -self.direction_for(&uv);
        let n_light = Normal3f::from(d);

        // Choose a point on a disk of the world's bounding sphere facing d
        let world_center = *self.world_center.read();
        let world_radius = *self.world_radius.read();
        let (v1, v2) = coordinate_system(&-d);
        let cd = concentric_sample_disk(*u2);
        let p_disk = world_center + (v1 * cd.x + v2 * cd.y) * world_radius;
        let ray = Ray::new(p_disk - d * world_radius, d);

        let pdf_dir = if sin_theta == 0.0 || map_pdf == 0.0 {
            0.0
        } else {
            map_pdf / (2.0 * PI * PI * sin_theta)
        };
        let pdf_pos = 1.0 / (PI * world_radius * world_radius);
        LeSample {
            le: self.l_map.lookup(&uv, 0.0),
            ray,
            n_light,
            pdf_pos,
            pdf_dir,
        }
    }

    fn pdf_le(&self, ray: &Ray, _n_light: &Normal3f) -> (f32, f32) {
        let d = -self.world_to_light.transform_vector(&ray.d).normalize();
        let theta = spherical_theta(&d);
        let phi = spherical_phi(&d);
        let uv = Point2f::new(phi * FRAC_1_PI * 0.5, theta * FRAC_1_PI);
        let map_pdf = self.distribution.pdf(&uv);
        let world_radius = *self.world_radius.read();
        let sin_theta = theta.sin();
        let pdf_dir = if sin_theta == 0.0 {
            0.0
        } else {
            map_pdf / (2.0 * PI * PI * sin_theta)
        };
        (1.0 / (PI * world_radius * world_radius), pdf_dir)
    }

    fn power(&self) -> Spectrum {
        let world_radius = *self.world_radius.read();
        self.l_map.lookup(&Point2f::new(0.5, 0.5), 0.5) * PI * world_radius * world_radius
    }

    fn le(&self, ray: &Ray) -> Spectrum {
        // Look up along the escaping ray's direction in light space
        let w = self.world_to_light.transform_vector(&ray.d).normalize();
        let st = Point2f::new(
            spherical_phi(&w) * FRAC_1_PI * 0.5,
            spherical_theta(&w) * FRAC_1_PI,
        );
        self.l_map.lookup(&st, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    #[test]
    fn test_constant_le_any_direction() {
        let env = Envmap::constant(Spectrum::grey(1.5));
        let mut rng = Rng::with_seed(12);
        for _ in 0..100 {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let d = crate::sampling::uniform_sample_sphere(u);
            let ray = Ray::new(Point3f::zero(), d);
            let le = env.le(&ray);
            assert!((le.r - 1.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_pdf_li_integrates_to_one() {
        // For a constant map the sampling density is sin-theta weighted but
        // still integrates to one over the sphere.
        let env = Envmap::constant(Spectrum::white());
        let re = Interaction::from_point(&Point3f::zero());
        let mut rng = Rng::with_seed(13);
        let n = 50_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let w = crate::sampling::uniform_sample_sphere(u);
            sum += env.pdf_li(&re, &w) / crate::sampling::uniform_sphere_pdf();
        }
        let estimate = sum / n as f32;
        assert!((estimate - 1.0).abs() < 0.05, "estimate = {}", estimate);
    }

    #[test]
    fn test_sample_li_matches_pdf_li() {
        let env = Envmap::constant(Spectrum::white());
        let re = Interaction::from_point(&Point3f::zero());
        let mut rng = Rng::with_seed(14);
        for _ in 0..200 {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let s = env.sample_li(&re, &u);
            if s.pdf > 0.0 {
                let pdf2 = env.pdf_li(&re, &s.wi);
                assert!(
                    (s.pdf - pdf2).abs() / s.pdf < 0.05,
                    "pdf = {} vs {}",
                    s.pdf,
                    pdf2
                );
            }
        }
    }
}
