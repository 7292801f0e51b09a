use crate::bsdf::BxDFType;
use crate::camera::Camera;
use crate::integrator::{base_seed, SamplerIntegrator};
use crate::interaction::Intr;
use crate::material::TransportMode;
use crate::memory::MemoryArena;
use crate::mis::uniform_sample_one_light;
use crate::photon_map::{PhotonMap, PhotonMapType};
use crate::ray::Ray;
use crate::renderparams::RenderParams;
use crate::sampler::Sampler;
use crate::scene::Scene;
use crate::spectrum::Spectrum;

/// Photon mapping with a cone-filtered density estimate at the first
/// diffuse reflection. The maps are rebuilt every iteration and the lookup
/// radii decay geometrically.
pub struct PhotonMapperIntegrator {
    global_map: PhotonMap,
    caustics_map: PhotonMap,
    volumetric_map: PhotonMap,
    radius_scale: f32,
    iteration: u64,
}

impl PhotonMapperIntegrator {
    pub fn new() -> PhotonMapperIntegrator {
        PhotonMapperIntegrator {
            global_map: PhotonMap::new(PhotonMapType::Global),
            caustics_map: PhotonMap::new(PhotonMapType::Caustics),
            volumetric_map: PhotonMap::new(PhotonMapType::Volumetric),
            radius_scale: 1.0,
            iteration: 0,
        }
    }
}

impl Default for PhotonMapperIntegrator {
    fn default() -> Self {
        PhotonMapperIntegrator::new()
    }
}

impl SamplerIntegrator for PhotonMapperIntegrator {
    fn initialize(
        &mut self,
        _camera: &dyn Camera,
        _scene: &Scene,
        _params: &RenderParams,
        _sampler: &mut dyn Sampler,
    ) {
        self.radius_scale = 1.0;
        self.iteration = 0;
    }

    fn loop_started(
        &mut self,
        _camera: &dyn Camera,
        scene: &Scene,
        params: &RenderParams,
        sampler: &mut dyn Sampler,
    ) {
        let global_photons = params.get_int_or("globalPhotons", 250_000) as usize;
        let caustics_photons = params.get_int_or("causticsPhotons", 0) as usize;
        let volumetric_photons = params.get_int_or("volumetricPhotons", 0) as usize;
        let seed = base_seed(params) + self.iteration * 65_537;
        self.global_map
            .construct(scene, params, sampler, global_photons, seed);
        if caustics_photons > 0 {
            self.caustics_map
                .construct(scene, params, sampler, caustics_photons, seed + 1);
        }
        if volumetric_photons > 0 {
            self.volumetric_map
                .construct(scene, params, sampler, volumetric_photons, seed + 2);
        }
        self.iteration += 1;
    }

    fn loop_finished(
        &mut self,
        _camera: &dyn Camera,
        _scene: &Scene,
        params: &RenderParams,
        _sampler: &mut dyn Sampler,
    ) {
        // Shrink the gather radius between iterations
        let alpha = params.get_float_or("alpha", 0.8);
        self.radius_scale *= alpha;
    }

    fn li(
        &self,
        scene: &Scene,
        params: &RenderParams,
        r: &Ray,
        sampler: &mut dyn Sampler,
        arena: &MemoryArena,
        _depth: i32,
    ) -> Spectrum {
        let max_depth = params.get_int_or("maxDepth", 8);
        let gather_photons = params.get_int_or("lookupSize", 32) as usize;
        let global_radius =
            params.get_float_or("globalLookupRadius", 8.0) * self.radius_scale;
        let caustics_radius =
            params.get_float_or("causticsLookupRadius", 1.0) * self.radius_scale;
        let volumetric_radius =
            params.get_float_or("volumetricLookupRadius", 1.0) * self.radius_scale;

        let mut l = Spectrum::black();
        let mut beta = Spectrum::white();
        let mut specular_bounce = false;
        let mut ray = r.clone();

        let mut bounces = 0;
        loop {
            let mut current = ray.clone();
            let found = scene.intersect(&mut current);

            let mut mi = None;
            if let Some(medium) = &current.medium {
                let (weight, sampled) = medium.sample(&current, sampler);
                beta *= weight;
                mi = sampled;
            }
            if beta.is_black() {
                break;
            }

            if let Some(mi) = mi {
                l += beta * uniform_sample_one_light(&Intr::Medium(&mi), scene, sampler, true);
                // In-scattered radiance from the volumetric map, if built
                if !self.volumetric_map.is_empty() {
                    l += beta
                        * self.volumetric_map.estimate_medium_l(
                            &mi,
                            gather_photons,
                            volumetric_radius,
                            arena,
                        );
                    break;
                }
                if bounces >= max_depth {
                    break;
                }
                let (_, wi) = mi.phase.sample_p(&mi.wo, &sampler.get_2d());
                ray = mi.spawn_ray(&wi);
                bounces += 1;
                continue;
            }

            if bounces == 0 || specular_bounce {
                match &found {
                    Some(isect) => l += beta * isect.le(&-current.d),
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
                    ray = isect.hit.spawn_ray(&current.d);
                    continue;
                }
            };

            let mut ld = Spectrum::black();
            if bsdf.num_components(BxDFType::all() & !BxDFType::BSDF_SPECULAR) > 0 {
                ld = beta
                    * uniform_sample_one_light(&Intr::Surface(&isect), scene, sampler, false);
            }

            let wo = -current.d;
            let (f, wi, pdf, sampled_type) = bsdf.sample_f(&wo, &sampler.get_2d(), BxDFType::all());
            if f.is_black() || pdf == 0.0 {
                break;
            }

            // Final gather: at the first diffuse reflection, replace the
            // remaining transport by the density estimates; the caustics map
            // covers the specular-prefixed paths the global map excludes
            if sampled_type.contains(BxDFType::BSDF_DIFFUSE)
                && sampled_type.contains(BxDFType::BSDF_REFLECTION)
            {
                l += beta
                    * self
                        .global_map
                        .estimate_l(&isect, gather_photons, global_radius, arena);
                if !self.caustics_map.is_empty() {
                    l += beta
                        * self.caustics_map.estimate_l(
                            &isect,
                            gather_photons,
                            caustics_radius,
                            arena,
                        );
                }
                break;
            } else {
                l += ld;
            }

            beta *= f * wi.abs_dotn(&isect.shading.n) / pdf;
            specular_bounce = sampled_type.contains(BxDFType::BSDF_SPECULAR);
            ray = isect.spawn_ray(&wi);

            // Subsurface hand-off on transmission
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
                l += beta * uniform_sample_one_light(&Intr::Surface(&pi), scene, sampler, false);
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

            // Russian roulette
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
