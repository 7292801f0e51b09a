use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use log::info;

use crate::camera::Camera;
use crate::integrator::{base_seed, Integrator, PathIntegrator, SamplerIntegrator};
use crate::memory::MemoryArena;
use crate::parallel::{num_system_threads, parallel_for, parallel_for_slice};
use crate::renderparams::RenderParams;
use crate::rng::Rng;
use crate::sampler::{PssSampler, Sampler};
use crate::sampling::Distribution1D;
use crate::scene::Scene;
use crate::spectrum::Spectrum;
use crate::{min, Point2f, Point2i};

/// A proposed path: its film position and radiance.
#[derive(Clone)]
pub(crate) struct PathSample {
    pub p: Point2f,
    pub l: Spectrum,
}

/// Primary-sample-space Metropolis light transport over a path-traced
/// target function.
pub struct PssmltIntegrator;

impl PssmltIntegrator {
    pub fn new() -> PssmltIntegrator {
        PssmltIntegrator
    }

    /// Trace one path from mutated primary-sample-space coordinates.
    pub(crate) fn generate_sample(
        camera: &dyn Camera,
        scene: &Scene,
        params: &RenderParams,
        sampler: &mut PssSampler,
        arena: &MemoryArena,
        path_tracer: &PathIntegrator,
    ) -> PathSample {
        sampler.start_next_sample();

        let resolution = camera.film().resolution();
        let (width, height) = (resolution.x, resolution.y);

        let fx = min(
            sampler.get_1d() * width as f32,
            width as f32 - 1e-4,
        );
        let fy = min(
            sampler.get_1d() * height as f32,
            height as f32 - 1e-4,
        );
        let x = min(fx as i32, width - 1);
        let y = min(fy as i32, height - 1);
        let rand_lens = sampler.get_2d();
        let rand_film = Point2f::new(fx - x as f32, fy - y as f32);
        let ray = camera.spawn_ray(&Point2i::new(x, y), &rand_film, &rand_lens);

        let l = path_tracer.li(scene, params, &ray, sampler, arena, 0);
        PathSample {
            p: Point2f::new(fx, fy),
            l,
        }
    }
}

impl Default for PssmltIntegrator {
    fn default() -> Self {
        PssmltIntegrator::new()
    }
}

impl Integrator for PssmltIntegrator {
    fn render(
        &mut self,
        camera: &dyn Camera,
        scene: &Scene,
        params: &RenderParams,
    ) -> Result<()> {
        let resolution = camera.film().resolution();
        let width = resolution.x as usize;
        let num_pixels = (resolution.x * resolution.y) as usize;
        let p_large = params.get_float_or("pLarge", 0.3);
        let sample_count = params.get_int_or("sampleCount", 64) as usize;
        let n_bootstrap = params.get_int_or("luminanceSamples", 500_000) as usize;
        let n_threads = num_system_threads();
        let n_mutate = (num_pixels + n_threads - 1) / n_threads;
        let global_seed = base_seed(params);
        let path_tracer = PathIntegrator::surface_only();

        // Bootstrap to estimate the normalization constant
        let mut sample_weights = vec![0.0f32; n_bootstrap];
        {
            let path_tracer = &path_tracer;
            parallel_for_slice(&mut sample_weights, |_tid, i, w| {
                let mut ps_sampler = PssSampler::new(global_seed + i as u64, p_large, 1);
                let arena = MemoryArena::new();
                let sample = Self::generate_sample(
                    camera,
                    scene,
                    params,
                    &mut ps_sampler,
                    &arena,
                    path_tracer,
                );
                *w = sample.l.gray();
            });
        }
        info!("Finished bootstrapping");

        let sum_i: f64 = sample_weights.iter().map(|w| *w as f64).sum();
        let b = (sum_i / n_bootstrap as f64) as f32;
        if b <= 0.0 {
            info!("Bootstrap found no light-carrying path; image stays black");
            return Ok(());
        }
        let bootstrap = Distribution1D::new(&sample_weights);

        // Mutation passes
        for i in 0..sample_count {
            let n_accept = AtomicU64::new(0);
            let n_total = AtomicU64::new(0);

            let path_tracer_ref = &path_tracer;
            let bootstrap_ref = &bootstrap;
            let n_accept_ref = &n_accept;
            let n_total_ref = &n_total;
            parallel_for(0, n_threads, |t| {
                let mut arena = MemoryArena::new();

                // Seed the chain from the bootstrap distribution so the
                // sampler replays the bootstrap path exactly
                let mut rng = Rng::with_seed(global_seed + (i * n_threads + t) as u64);
                let (index, _) = bootstrap_ref.sample_discrete(rng.uniform_f32());
                let mut ps_sampler = PssSampler::new(global_seed + index as u64, p_large, 1);

                let mut current = Self::generate_sample(
                    camera,
                    scene,
                    params,
                    &mut ps_sampler,
                    &arena,
                    path_tracer_ref,
                );
                arena.reset();

                for _m in 0..n_mutate {
                    let next = Self::generate_sample(
                        camera,
                        scene,
                        params,
                        &mut ps_sampler,
                        &arena,
                        path_tracer_ref,
                    );
                    let accept_ratio = if current.l.is_black() {
                        1.0
                    } else {
                        (next.l.gray() / current.l.gray()).min(1.0)
                    };

                    // Expected-value splatting of both states
                    if !current.l.is_black() {
                        let weight = (1.0 - accept_ratio)
                            / (current.l.gray() / b + ps_sampler.p_large());
                        let pixel =
                            Point2f::new(width as f32 - current.p.x, current.p.y);
                        camera.film().add_splat(&pixel, current.l * weight);
                    }
                    if !next.l.is_black() {
                        let weight = (accept_ratio + ps_sampler.large_step() as f32)
                            / (next.l.gray() / b + ps_sampler.p_large());
                        let pixel = Point2f::new(width as f32 - next.p.x, next.p.y);
                        camera.film().add_splat(&pixel, next.l * weight);
                    }

                    if rng.uniform_f32() < accept_ratio {
                        n_accept_ref.fetch_add(1, Ordering::Relaxed);
                        current = next;
                        ps_sampler.accept();
                    } else {
                        ps_sampler.reject();
                    }
                    n_total_ref.fetch_add(1, Ordering::Relaxed);
                    arena.reset();
                }
            });

            let accept = n_accept.load(Ordering::Relaxed);
            let total = n_total.load(Ordering::Relaxed).max(1);
            info!(
                "PSSMLT pass {}/{}: accept ratio {:.2} % ({} / {})",
                i + 1,
                sample_count,
                100.0 * accept as f64 / total as f64,
                accept,
                total
            );

            camera
                .film()
                .save_scaled(i as u32 + 1, 1.0 / (i as f32 + 1.0))?;
        }
        Ok(())
    }
}
