use std::sync::Arc;

use crate::bounds::Bounds3f;
use crate::interaction::SurfaceInteraction;
use crate::light::{Light, LightFlags};
use crate::primitive::Primitive;
use crate::ray::Ray;
use crate::sampler::Sampler;
use crate::spectrum::Spectrum;

pub struct Scene {
    pub lights: Vec<Arc<dyn Light>>,
    pub infinite_lights: Vec<Arc<dyn Light>>,
    aggregate: Arc<dyn Primitive>,
}

impl Scene {
    pub fn new(aggregate: Arc<dyn Primitive>, lights: Vec<Arc<dyn Light>>) -> Scene {
        let scene = Scene {
            lights: Vec::new(),
            infinite_lights: Vec::new(),
            aggregate,
        };

        for l in &lights {
            l.preprocess(&scene);
        }
        let infinite_lights = lights
            .iter()
            .filter(|l| l.flags().contains(LightFlags::INFINITE))
            .cloned()
            .collect();

        Scene {
            lights,
            infinite_lights,
            ..scene
        }
    }

    /// Closest intersection; `ray.t_max` is updated to the hit distance.
    pub fn intersect(&self, ray: &mut Ray) -> Option<SurfaceInteraction<'_>> {
        self.aggregate.intersect(ray)
    }

    /// Shadow query.
    pub fn intersect_p(&self, ray: &Ray) -> bool {
        self.aggregate.intersect_p(ray)
    }

    /// Intersection together with the transmittance accumulated while
    /// skipping over medium boundaries.
    pub fn intersect_tr(
        &self,
        ray: &mut Ray,
        sampler: &mut dyn Sampler,
    ) -> (Option<SurfaceInteraction<'_>>, Spectrum) {
        let mut tr = Spectrum::white();
        let mut r = ray.clone();
        loop {
            let hit = self.aggregate.intersect(&mut r);
            if let Some(medium) = &r.medium {
                tr = tr * medium.tr(&r, sampler);
            }
            match hit {
                None => {
                    *ray = r;
                    return (None, tr);
                }
                Some(isect) => {
                    if isect.primitive.map_or(false, |p| p.has_material()) {
                        *ray = r;
                        return (Some(isect), tr);
                    }
                    // Medium boundary only: keep marching
                    r = isect.hit.spawn_ray(&r.d);
                }
            }
        }
    }

    pub fn world_bound(&self) -> Bounds3f {
        self.aggregate.world_bound()
    }

    pub fn lights(&self) -> &[Arc<dyn Light>] {
        &self.lights
    }
}
