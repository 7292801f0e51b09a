use std::f32::consts::PI;
use std::sync::Arc;

use crate::interaction::Interaction;
use crate::light::{LeSample, Light, LightFlags, LiSample, VisibilityTester};
use crate::ray::Ray;
use crate::sampling::{cosine_hemisphere_pdf, cosine_sample_hemisphere};
use crate::shapes::Shape;
use crate::spectrum::Spectrum;
use crate::{coordinate_system, Normal3f, Point2f, Vector3f};

/// One-sided diffuse emitter over a shape.
pub struct AreaLight {
    id: u32,
    l_emit: Spectrum,
    shape: Arc<dyn Shape>,
    area: f32,
}

impl AreaLight {
    pub fn new(l_emit: Spectrum, shape: Arc<dyn Shape>) -> AreaLight {
        let area = shape.area();
        AreaLight {
            id: super::next_light_id(),
            l_emit,
            shape,
            area,
        }
    }
}

impl Light for AreaLight {
    fn id(&self) -> u32 {
        self.id
    }

    fn flags(&self) -> LightFlags {
        LightFlags::AREA
    }

    fn sample_li(&self, re: &Interaction, u: &Point2f) -> LiSample {
        let p_shape = self.shape.sample_from(re, u);
        let to_light = p_shape.p - re.p;
        if to_light.length_squared() == 0.0 {
            return LiSample {
                li: Spectrum::black(),
                wi: Vector3f::new(0.0, 0.0, 1.0),
                pdf: 0.0,
                vis: VisibilityTester::new(re.clone(), p_shape),
            };
        }
        let wi = to_light.normalize();
        let pdf = self.shape.pdf_from(re, &wi);
        let li = self.l(&p_shape, &-wi);
        LiSample {
            li,
            wi,
            pdf,
            vis: VisibilityTester::new(re.clone(), p_shape),
        }
    }

    fn pdf_li(&self, re: &Interaction, wi: &Vector3f) -> f32 {
        self.shape.pdf_from(re, wi)
    }

    fn sample_le(&self, u1: &Point2f, u2: &Point2f) -> LeSample {
        let p_shape = self.shape.sample(u1);
        let pdf_pos = self.shape.pdf(&p_shape);
        let n_light = p_shape.n;

        // Cosine-weighted direction in the hemisphere of the shape normal
        let w_local = cosine_sample_hemisphere(*u2);
        let pdf_dir = cosine_hemisphere_pdf(w_local.z);
        let n = Vector3f::from(n_light);
        let (v1, v2) = coordinate_system(&n);
        let w = v1 * w_local.x + v2 * w_local.y + n * w_local.z;

        let ray = p_shape.spawn_ray(&w);
        LeSample {
            le: self.l(&p_shape, &w),
            ray,
            n_light,
            pdf_pos,
            pdf_dir,
        }
    }

    fn pdf_le(&self, ray: &Ray, n_light: &Normal3f) -> (f32, f32) {
        let it = Interaction::new(ray.o, Vector3f::default(), Vector3f::from(*n_light), *n_light);
        (self.shape.pdf(&it), cosine_hemisphere_pdf(n_light.dot(&ray.d)))
    }

    fn power(&self) -> Spectrum {
        self.l_emit * PI * self.area
    }

    fn l(&self, p_light: &Interaction, w: &Vector3f) -> Spectrum {
        // Emission only on the positive hemisphere of the shape normal
        if p_light.n.dot(w) > 0.0 {
            self.l_emit
        } else {
            Spectrum::black()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Quad;
    use crate::Point3f;

    #[test]
    fn test_one_sided_emission() {
        let quad = Arc::new(Quad::new(
            Point3f::new(0.0, 0.0, 0.0),
            Vector3f::new(1.0, 0.0, 0.0),
            Vector3f::new(0.0, 1.0, 0.0),
        ));
        let light = AreaLight::new(Spectrum::grey(2.0), quad.clone());
        let p = quad.sample(&Point2f::new(0.5, 0.5));
        assert_eq!(
            light.l(&p, &Vector3f::new(0.0, 0.0, 1.0)),
            Spectrum::grey(2.0)
        );
        assert!(light.l(&p, &Vector3f::new(0.0, 0.0, -1.0)).is_black());
    }

    #[test]
    fn test_power_scales_with_area() {
        let quad = Arc::new(Quad::new(
            Point3f::new(0.0, 0.0, 0.0),
            Vector3f::new(2.0, 0.0, 0.0),
            Vector3f::new(0.0, 2.0, 0.0),
        ));
        let light = AreaLight::new(Spectrum::grey(1.0), quad);
        assert!((light.power().gray() - 4.0 * PI).abs() < 1e-4);
    }

    #[test]
    fn test_sample_le_leaves_positive_hemisphere() {
        let quad = Arc::new(Quad::new(
            Point3f::new(0.0, 0.0, 0.0),
            Vector3f::new(1.0, 0.0, 0.0),
            Vector3f::new(0.0, 1.0, 0.0),
        ));
        let light = AreaLight::new(Spectrum::white(), quad);
        let mut rng = crate::rng::Rng::with_seed(5);
        for _ in 0..100 {
            let u1 = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let u2 = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let s = light.sample_le(&u1, &u2);
            assert!(s.pdf_pos > 0.0);
            assert!(s.pdf_dir > 0.0);
            assert!(s.ray.d.dotn(&s.n_light) > 0.0);
            assert!(!s.le.is_black());
        }
    }
}
