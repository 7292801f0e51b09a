use crate::integrator::SamplerIntegrator;
use crate::interaction::Intr;
use crate::material::TransportMode;
use crate::memory::MemoryArena;
use crate::mis::uniform_sample_one_light;
use crate::ray::Ray;
use crate::renderparams::RenderParams;
use crate::sampler::Sampler;
use crate::scene::Scene;
use crate::spectrum::Spectrum;

/// Direct illumination only; recurses into perfect specular reflection and
/// transmission so mirrors and glass still work.
pub struct DirectLightingIntegrator;

impl DirectLightingIntegrator {
    pub fn new() -> DirectLightingIntegrator {
        DirectLightingIntegrator
    }
}

impl Default for DirectLightingIntegrator {
    fn default() -> Self {
        DirectLightingIntegrator::new()
    }
}

impl SamplerIntegrator for DirectLightingIntegrator {
    fn li(
        &self,
        scene: &Scene,
        params: &RenderParams,
        ray: &Ray,
        sampler: &mut dyn Sampler,
        arena: &MemoryArena,
        depth: i32,
    ) -> Spectrum {
        let max_depth = params.get_int_or("maxDepth", 8);
        let mut l = Spectrum::black();

        let mut current = ray.clone();
        match scene.intersect(&mut current) {
            Some(mut isect) => {
                isect.compute_scattering_functions(&current, TransportMode::Radiance, false);
                if isect.bsdf.is_none() {
                    let r = isect.hit.spawn_ray(&current.d);
                    return self.li(scene, params, &r, sampler, arena, depth);
                }

                // Emitted light if the ray hit an area light source
                l += isect.le(&isect.hit.wo);
                if !scene.lights.is_empty() {
                    l += uniform_sample_one_light(&Intr::Surface(&isect), scene, sampler, false);
                }

                if depth + 1 < max_depth {
                    l += self.specular_reflect(scene, params, &isect, sampler, arena, depth);
                    l += self.specular_transmit(scene, params, &isect, sampler, arena, depth);
                }
            }
            None => {
                for light in &scene.lights {
                    l += light.le(&current);
                }
            }
        }

        l
    }
}
