use log::debug;

use crate::bsdf::BxDFType;
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

/// Unidirectional path tracer with next-event estimation, participating
/// media and subsurface scattering.
pub struct PathIntegrator {
    handle_media: bool,
}

impl PathIntegrator {
    pub fn new() -> PathIntegrator {
        PathIntegrator { handle_media: true }
    }

    /// Variant that ignores participating media (classic surface-only path
    /// tracing).
    pub fn surface_only() -> PathIntegrator {
        PathIntegrator {
            handle_media: false,
        }
    }
}

impl Default for PathIntegrator {
    fn default() -> Self {
        PathIntegrator::new()
    }
}

impl SamplerIntegrator for PathIntegrator {
    fn li(
        &self,
        scene: &Scene,
        params: &RenderParams,
        r: &Ray,
        sampler: &mut dyn Sampler,
        _arena: &MemoryArena,
        _depth: i32,
    ) -> Spectrum {
        let max_depth = params.get_int_or("maxDepth", 8);
        let mut l = Spectrum::black();
        let mut beta = Spectrum::white();
        let mut specular_bounce = false;
        let mut ray = r.clone();

        let mut bounces = 0;
        loop {
            let mut current = ray.clone();
            let found = scene.intersect(&mut current);
            debug!("path bounce {}, beta = {}", bounces, beta);

            // Sample the participating medium, if the ray is inside one
            let mut mi = None;
            if self.handle_media {
                if let Some(medium) = &current.medium {
                    let (weight, sampled) = medium.sample(&current, sampler);
                    beta *= weight;
                    mi = sampled;
                }
            }
            if beta.is_black() {
                break;
            }

            if let Some(mi) = mi {
                // Scatter inside the medium
                if bounces >= max_depth {
                    break;
                }
                l += beta * uniform_sample_one_light(&Intr::Medium(&mi), scene, sampler, true);

                let (_, wi) = mi.phase.sample_p(&mi.wo, &sampler.get_2d());
                ray = mi.spawn_ray(&wi);
                bounces += 1;
                continue;
            }

            // Emission is only added where no sampling strategy covers it
            if bounces == 0 || specular_bounce {
                match &found {
                    Some(isect) => {
                        l += beta * isect.le(&-current.d);
                    }
                    None => {
                        for light in &scene.lights {
                            l += beta * light.le(&current);
                        }
                    }
                }
            }

            let mut isect = match found {
                Some(isect) => isect,
                None => break,
            };
            if bounces >= max_depth {
                break;
            }

            isect.compute_scattering_functions(&current, TransportMode::Radiance, true);
            let bsdf = match isect.bsdf {
                Some(b) => b,
                None => {
                    // Interface between two media; pass through
                    ray = isect.hit.spawn_ray(&current.d);
                    continue;
                }
            };

            if bsdf.num_components(BxDFType::all() & !BxDFType::BSDF_SPECULAR) > 0 {
                let ld = beta
                    * uniform_sample_one_light(
                        &Intr::Surface(&isect),
                        scene,
                        sampler,
                        self.handle_media,
                    );
                l += ld;
            }

            // Sample the BSDF for the next direction
            let wo = -current.d;
            let (f, wi, pdf, sampled_type) = bsdf.sample_f(&wo, &sampler.get_2d(), BxDFType::all());
            if f.is_black() || pdf == 0.0 {
                break;
            }
            beta *= f * wi.abs_dotn(&isect.shading.n) / pdf;
            specular_bounce = sampled_type.contains(BxDFType::BSDF_SPECULAR);
            ray = isect.spawn_ray(&wi);

            // Hand transmission events over to the BSSRDF
            if isect.bssrdf.is_some() && sampled_type.contains(BxDFType::BSDF_TRANSMISSION) {
                let bssrdf = isect.bssrdf.clone().unwrap();
                let u1 = sampler.get_1d();
                let u2 = sampler.get_2d();
                let (s, pdf, pi) = bssrdf.sample_s(scene, u1, &u2);
                if s.is_black() || pdf == 0.0 {
                    break;
                }
                let pi = match pi {
                    Some(pi) => pi,
                    None => break,
                };
                beta *= s / pdf;

                // Direct lighting at the subsurface exit point
                l += beta * uniform_sample_one_light(&Intr::Surface(&pi), scene, sampler, false);

                // Continue the path through the adapter BSDF
                let exit_bsdf = pi.bsdf.as_ref().expect("exit point carries adapter BSDF");
                let (f, wi, pdf, sampled_type) =
                    exit_bsdf.sample_f(&pi.hit.wo, &sampler.get_2d(), BxDFType::all());
                if f.is_black() || pdf == 0.0 {
                    break;
                }
                beta *= f * wi.abs_dotn(&pi.shading.n) / pdf;
                specular_bounce = sampled_type.contains(BxDFType::BSDF_SPECULAR);
                ray = pi.spawn_ray(&wi);
            }

            // Russian roulette after a few bounces
            if bounces > 3 {
                let continue_probability = 0.95f32.min(beta.gray());
                if sampler.get_1d() > continue_probability {
                    break;
                }
                beta /= continue_probability;
            }
            bounces += 1;
        }

        l
    }
}
