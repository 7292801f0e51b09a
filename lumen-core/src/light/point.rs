use std::f32::consts::PI;

use crate::geometry::distance_squared;
use crate::interaction::Interaction;
use crate::light::{LeSample, Light, LightFlags, LiSample, VisibilityTester};
use crate::ray::Ray;
use crate::sampling::{uniform_sample_sphere, uniform_sphere_pdf};
use crate::spectrum::Spectrum;
use crate::{Normal3f, Point2f, Point3f, Vector3f};

/// Isotropic point light with intensity `i` (radiant intensity).
pub struct PointLight {
    id: u32,
    p: Point3f,
    i: Spectrum,
}

impl PointLight {
    pub fn new(p: Point3f, i: Spectrum) -> PointLight {
        PointLight {
            id: super::next_light_id(),
            p,
            i,
        }
    }
}

impl Light for PointLight {
    fn id(&self) -> u32 {
        self.id
    }

    fn flags(&self) -> LightFlags {
        LightFlags::DELTA_POSITION
    }

    fn sample_li(&self, re: &Interaction, _u: &Point2f) -> LiSample {
        let wi = (self.p - re.p).normalize();
        LiSample {
            li: self.i / distance_squared(&self.p, &re.p),
            wi,
            pdf: 1.0,
            vis: VisibilityTester::new(re.clone(), Interaction::from_point(&self.p)),
        }
    }

    fn pdf_li(&self, _re: &Interaction, _wi: &Vector3f) -> f32 {
        // A delta light is never hit by a sampled direction
        0.0
    }

    fn sample_le(&self, u1: &Point2f, _u2: &Point2f) -> LeSample {
        let d = uniform_sample_sphere(*u1);
        LeSample {
            le: self.i,
            ray: Ray::new(self.p, d),
            n_light: Normal3f::from(d),
            pdf_pos: 1.0,
            pdf_dir: uniform_sphere_pdf(),
        }
    }

    fn pdf_le(&self, _ray: &Ray, _n_light: &Normal3f) -> (f32, f32) {
        (0.0, uniform_sphere_pdf())
    }

    fn power(&self) -> Spectrum {
        self.i * 4.0 * PI
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_square_falloff() {
        let light = PointLight::new(Point3f::new(0.0, 0.0, 0.0), Spectrum::grey(4.0));
        let near = Interaction::from_point(&Point3f::new(1.0, 0.0, 0.0));
        let far = Interaction::from_point(&Point3f::new(2.0, 0.0, 0.0));
        let u = Point2f::new(0.5, 0.5);
        let s_near = light.sample_li(&near, &u);
        let s_far = light.sample_li(&far, &u);
        assert!((s_near.li.gray() / s_far.li.gray() - 4.0).abs() < 1e-4);
        assert_eq!(s_near.pdf, 1.0);
        assert!(light.is_delta());
    }
}
