use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use log::{error, info};
use parking_lot::Mutex;

use crate::bsdf::BxDFType;
use crate::camera::Camera;
use crate::interaction::SurfaceInteraction;
use crate::memory::MemoryArena;
use crate::parallel::{num_system_threads, parallel_for, thread_id};
use crate::ray::Ray;
use crate::renderparams::RenderParams;
use crate::sampler::Sampler;
use crate::scene::Scene;
use crate::spectrum::Spectrum;
use crate::{Point2f, Point2i};

mod bdpt;
mod directlighting;
mod hierarchical;
mod mmlt;
mod path;
mod photonmapper;
mod pssmlt;
mod sppm;
mod vcmups;

pub use self::bdpt::BdptIntegrator;
pub use self::directlighting::DirectLightingIntegrator;
pub use self::hierarchical::HierarchicalIntegrator;
pub use self::mmlt::MmltIntegrator;
pub use self::path::PathIntegrator;
pub use self::photonmapper::PhotonMapperIntegrator;
pub use self::pssmlt::PssmltIntegrator;
pub use self::sppm::SppmIntegrator;
pub use self::vcmups::VcmUpsIntegrator;

/// Anything that can produce an image of a scene.
pub trait Integrator {
    fn render(
        &mut self,
        camera: &dyn Camera,
        scene: &Scene,
        params: &RenderParams,
    ) -> Result<()>;
}

/// Per-pixel-sample integrators driven by the shared parallel loop.
pub trait SamplerIntegrator: Send + Sync {
    fn initialize(
        &mut self,
        _camera: &dyn Camera,
        _scene: &Scene,
        _params: &RenderParams,
        _sampler: &mut dyn Sampler,
    ) {
    }

    /// Invoked before every iteration of the outer sample loop.
    fn loop_started(
        &mut self,
        _camera: &dyn Camera,
        _scene: &Scene,
        _params: &RenderParams,
        _sampler: &mut dyn Sampler,
    ) {
    }

    /// Invoked after every iteration of the outer sample loop.
    fn loop_finished(
        &mut self,
        _camera: &dyn Camera,
        _scene: &Scene,
        _params: &RenderParams,
        _sampler: &mut dyn Sampler,
    ) {
    }

    /// Incident radiance along `ray`.
    fn li(
        &self,
        scene: &Scene,
        params: &RenderParams,
        ray: &Ray,
        sampler: &mut dyn Sampler,
        arena: &MemoryArena,
        depth: i32,
    ) -> Spectrum;

    fn specular_reflect(
        &self,
        scene: &Scene,
        params: &RenderParams,
        isect: &SurfaceInteraction<'_>,
        sampler: &mut dyn Sampler,
        arena: &MemoryArena,
        depth: i32,
    ) -> Spectrum {
        let flags = BxDFType::BSDF_REFLECTION | BxDFType::BSDF_SPECULAR;
        let bsdf = match &isect.bsdf {
            Some(b) => b,
            None => return Spectrum::black(),
        };
        let wo = isect.hit.wo;
        let (f, wi, pdf, _ty) = bsdf.sample_f(&wo, &sampler.get_2d(), flags);
        let ns = &isect.shading.n;
        if pdf > 0.0 && !f.is_black() && wi.abs_dotn(ns) != 0.0 {
            let r = isect.spawn_ray(&wi);
            f * self.li(scene, params, &r, sampler, arena, depth + 1) * wi.abs_dotn(ns) / pdf
        } else {
            Spectrum::black()
        }
    }

    fn specular_transmit(
        &self,
        scene: &Scene,
        params: &RenderParams,
        isect: &SurfaceInteraction<'_>,
        sampler: &mut dyn Sampler,
        arena: &MemoryArena,
        depth: i32,
    ) -> Spectrum {
        let flags = BxDFType::BSDF_TRANSMISSION | BxDFType::BSDF_SPECULAR;
        let bsdf = match &isect.bsdf {
            Some(b) => b,
            None => return Spectrum::black(),
        };
        let wo = isect.hit.wo;
        let (f, wi, pdf, _ty) = bsdf.sample_f(&wo, &sampler.get_2d(), flags);
        let ns = &isect.shading.n;
        if pdf > 0.0 && !f.is_black() && wi.abs_dotn(ns) != 0.0 {
            let r = isect.spawn_ray(&wi);
            f * self.li(scene, params, &r, sampler, arena, depth + 1) * wi.abs_dotn(ns) / pdf
        } else {
            Spectrum::black()
        }
    }
}

pub(crate) fn base_seed(params: &RenderParams) -> u64 {
    match params.get_int("seed") {
        Ok(seed) => seed as u64,
        Err(_) => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    }
}

/// Replace non-finite or negative samples with black so they never reach
/// the film.
pub(crate) fn scrub_radiance(l: Spectrum, pixel: &Point2i) -> Spectrum {
    if l.has_nan() {
        error!("NaN radiance for pixel {}; set to black", pixel);
        Spectrum::black()
    } else if l.y() < -1e-5 {
        error!("Negative luminance for pixel {}; set to black", pixel);
        Spectrum::black()
    } else if l.y().is_infinite() {
        error!("Infinite luminance for pixel {}; set to black", pixel);
        Spectrum::black()
    } else {
        l
    }
}

/// Wraps a `SamplerIntegrator` with its sampler and the shared driver loop.
pub struct SamplerRenderer<I: SamplerIntegrator> {
    pub integrator: I,
    pub sampler: Box<dyn Sampler>,
}

impl<I: SamplerIntegrator> SamplerRenderer<I> {
    pub fn new(integrator: I, sampler: Box<dyn Sampler>) -> SamplerRenderer<I> {
        SamplerRenderer {
            integrator,
            sampler,
        }
    }
}

impl<I: SamplerIntegrator> Integrator for SamplerRenderer<I> {
    fn render(
        &mut self,
        camera: &dyn Camera,
        scene: &Scene,
        params: &RenderParams,
    ) -> Result<()> {
        let resolution = camera.film().resolution();
        let (width, height) = (resolution.x as usize, resolution.y as usize);
        let num_pixels = width * height;
        let num_samples = params.get_int_or("sampleCount", 16) as usize;
        let n_threads = num_system_threads();
        let seed = base_seed(params);

        let mut init_sampler = self.sampler.clone_seeded(seed);
        self.integrator
            .initialize(camera, scene, params, init_sampler.as_mut());

        let mut samplers: Vec<Mutex<Box<dyn Sampler>>> = Vec::new();
        let arenas: Vec<Mutex<MemoryArena>> =
            (0..n_threads).map(|_| Mutex::new(MemoryArena::new())).collect();

        info!(
            "Rendering {}x{} with {} threads, {} iterations",
            width, height, n_threads, num_samples
        );
        let pb = indicatif::ProgressBar::new((num_pixels * num_samples) as u64);
        pb.set_style(
            indicatif::ProgressStyle::default_bar()
                .progress_chars("=>-")
                .template("[{elapsed_precise}] [{wide_bar}] {percent}% {eta}"),
        );
        for i in 0..num_samples {
            self.integrator
                .loop_started(camera, scene, params, init_sampler.as_mut());

            // Re-clone the samplers every num_threads iterations
            if i % n_threads == 0 {
                samplers = (0..n_threads)
                    .map(|t| {
                        Mutex::new(self.sampler.clone_seeded(seed + i as u64 + t as u64))
                    })
                    .collect();
            }

            let integrator = &self.integrator;
            let samplers_ref = &samplers;
            let arenas_ref = &arenas;
            parallel_for(0, num_pixels, |pid| {
                let tid = thread_id();
                let mut sampler = samplers_ref[tid].lock();
                let sampler = sampler.as_mut();
                sampler.start_pixel();

                let x = (pid % width) as i32;
                let y = (pid / width) as i32;
                let rand_film = sampler.get_2d();
                let rand_lens = sampler.get_2d();
                let ray = camera.spawn_ray(&Point2i::new(x, y), &rand_film, &rand_lens);

                let mut arena = arenas_ref[tid].lock();
                let l = integrator.li(scene, params, &ray, sampler, &arena, 0);
                let pixel = Point2i::new(resolution.x - x - 1, y);
                let l = scrub_radiance(l, &pixel);
                camera.film().add_sample(
                    &Point2f::new(pixel.x as f32 + rand_film.x, pixel.y as f32 + rand_film.y),
                    l,
                );
                arena.reset();
                pb.inc(1);
            });

            camera.film().save(i as u32 + 1)?;

            self.integrator
                .loop_finished(camera, scene, params, init_sampler.as_mut());
        }
        pb.finish_and_clear();
        info!("Render finished");
        Ok(())
    }
}
