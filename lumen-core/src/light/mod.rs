use bitflags::bitflags;
use parking_lot::Mutex;

use crate::interaction::Interaction;
use crate::ray::Ray;
use crate::sampler::Sampler;
use crate::scene::Scene;
use crate::spectrum::Spectrum;
use crate::{Normal3f, Point2f, Vector3f};

mod diffuse;
mod infinite;
mod point;

pub use self::diffuse::AreaLight;
pub use self::infinite::Envmap;
pub use self::point::PointLight;

bitflags! {
    pub struct LightFlags: u32 {
        const DELTA_POSITION  = 0b_0000_0001;
        const DELTA_DIRECTION = 0b_0000_0010;
        const AREA            = 0b_0000_0100;
        const INFINITE        = 0b_0000_1000;
    }
}

#[inline]
pub fn is_delta_light(flags: LightFlags) -> bool {
    flags.contains(LightFlags::DELTA_POSITION) || flags.contains(LightFlags::DELTA_DIRECTION)
}

static LIGHT_COUNTER: Mutex<u32> = parking_lot::const_mutex(0);

pub fn next_light_id() -> u32 {
    let mut counter = LIGHT_COUNTER.lock();
    let id = *counter;
    *counter += 1;
    id
}

/// Deferred shadow query between two interactions.
pub struct VisibilityTester {
    pub p0: Interaction,
    pub p1: Interaction,
}

impl VisibilityTester {
    pub fn new(p0: Interaction, p1: Interaction) -> VisibilityTester {
        VisibilityTester { p0, p1 }
    }

    pub fn unoccluded(&self, scene: &Scene) -> bool {
        let r = self.p0.spawn_ray_to_interaction(&self.p1);
        !scene.intersect_p(&r)
    }

    /// Transmittance between the two points, stepping through medium
    /// boundaries; zero if an opaque surface blocks the segment.
    pub fn transmittance(&self, scene: &Scene, sampler: &mut dyn Sampler) -> Spectrum {
        let mut ray = self.p0.spawn_ray_to_interaction(&self.p1);
        let mut tr = Spectrum::white();
        loop {
            let hit = scene.intersect(&mut ray);
            if let Some(ref isect) = hit {
                if isect.primitive.map_or(false, |p| p.has_material()) {
                    return Spectrum::black();
                }
            }
            if let Some(medium) = &ray.medium {
                tr = tr * medium.tr(&ray, sampler);
            }
            match hit {
                Some(isect) => {
                    ray = isect.hit.spawn_ray_to(&self.p1.p);
                }
                None => break,
            }
        }
        tr
    }
}

/// Sample of incident radiance at a reference point.
pub struct LiSample {
    pub li: Spectrum,
    pub wi: Vector3f,
    pub pdf: f32,
    pub vis: VisibilityTester,
}

/// Sample of an emitted ray leaving the light.
pub struct LeSample {
    pub le: Spectrum,
    pub ray: Ray,
    pub n_light: Normal3f,
    pub pdf_pos: f32,
    pub pdf_dir: f32,
}

pub trait Light: Send + Sync {
    fn id(&self) -> u32;

    fn flags(&self) -> LightFlags;

    fn is_delta(&self) -> bool {
        is_delta_light(self.flags())
    }

    fn is_infinite(&self) -> bool {
        self.flags().contains(LightFlags::INFINITE)
    }

    /// Sample a direction towards the light from `re`.
    fn sample_li(&self, re: &Interaction, u: &Point2f) -> LiSample;

    /// Solid-angle pdf of `sample_li` producing `wi` from `re`.
    fn pdf_li(&self, re: &Interaction, wi: &Vector3f) -> f32;

    /// Sample a ray leaving the light, with area and direction pdfs.
    fn sample_le(&self, u1: &Point2f, u2: &Point2f) -> LeSample;

    fn pdf_le(&self, ray: &Ray, n_light: &Normal3f) -> (f32, f32);

    fn power(&self) -> Spectrum;

    /// Radiance added along a ray that escaped the scene.
    fn le(&self, _ray: &Ray) -> Spectrum {
        Spectrum::black()
    }

    /// Emitted radiance of an area light at a point, towards `w`.
    fn l(&self, _p_light: &Interaction, _w: &Vector3f) -> Spectrum {
        Spectrum::black()
    }

    fn preprocess(&self, _scene: &Scene) {}
}
