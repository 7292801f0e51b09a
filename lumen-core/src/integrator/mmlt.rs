use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use log::info;

use crate::camera::Camera;
use crate::integrator::bdpt::{
    connect_bdpt, generate_camera_subpath, generate_light_subpath, Vertex,
};
use crate::integrator::pssmlt::PathSample;
use crate::integrator::{base_seed, Integrator};
use crate::mis::calc_light_power_distrib;
use crate::parallel::{num_system_threads, parallel_for, parallel_for_slice};
use crate::renderparams::RenderParams;
use crate::rng::Rng;
use crate::sampler::{PssSampler, Sampler};
use crate::sampling::Distribution1D;
use crate::scene::Scene;
use crate::spectrum::Spectrum;
use crate::{min, Point2f, Point2i};

const NUM_SAMPLE_STREAMS: usize = 3;
const CAMERA_STREAM: usize = 0;
const LIGHT_STREAM: usize = 1;
const CONNECT_STREAM: usize = 2;

/// Multiplexed Metropolis light transport: PSSMLT whose target is a single
/// BDPT strategy chosen per chain, with separate camera/light/connection
/// sample streams.
pub struct MmltIntegrator;

impl MmltIntegrator {
    pub fn new() -> MmltIntegrator {
        MmltIntegrator
    }

    /// Evaluate one multiplexed path of the given depth.
    fn li(
        camera: &dyn Camera,
        scene: &Scene,
        sampler: &mut PssSampler,
        depth: usize,
        max_strategies_pixel: &mut Point2f,
        light_dist: &Distribution1D,
    ) -> Spectrum {
        sampler.start_stream(CAMERA_STREAM);

        // Pick the strategy split for this depth
        let (s, t, n_strategies);
        if depth == 0 {
            n_strategies = 1;
            s = 0;
            t = 2;
        } else {
            n_strategies = depth + 2;
            s = min(
                (sampler.get_1d() * n_strategies as f32) as usize,
                n_strategies - 1,
            );
            t = n_strategies - s;
        }

        // Sample the pixel location
        let resolution = camera.film().resolution();
        let (width, height) = (resolution.x, resolution.y);
        let fx = min(sampler.get_1d() * width as f32, width as f32 - 1e-4);
        let fy = min(sampler.get_1d() * height as f32, height as f32 - 1e-4);
        *max_strategies_pixel = Point2f::new(fx, fy);
        let x = min(fx as i32, width - 1);
        let y = min(fy as i32, height - 1);
        let rand_film = Point2f::new(fx - x as f32, fy - y as f32);

        // Camera subpath
        let mut camera_path: Vec<Vertex<'_>> = Vec::with_capacity(t);
        if generate_camera_subpath(
            scene,
            sampler,
            t,
            camera,
            &Point2i::new(x, y),
            &rand_film,
            &mut camera_path,
        ) != t
        {
            return Spectrum::black();
        }

        // Light subpath
        sampler.start_stream(LIGHT_STREAM);
        let mut light_path: Vec<Vertex<'_>> = Vec::with_capacity(s);
        if generate_light_subpath(scene, sampler, s, light_dist, &mut light_path) != s {
            return Spectrum::black();
        }

        // Connection
        sampler.start_stream(CONNECT_STREAM);
        connect_bdpt(
            scene,
            &mut light_path,
            &mut camera_path,
            s,
            t,
            light_dist,
            camera,
            sampler,
            max_strategies_pixel,
            None,
        ) * n_strategies as f32
    }

    fn generate_sample(
        camera: &dyn Camera,
        scene: &Scene,
        sampler: &mut PssSampler,
        depth: usize,
        light_dist: &Distribution1D,
    ) -> PathSample {
        sampler.start_next_sample();
        let mut pixel = Point2f::new(0.0, 0.0);
        let l = Self::li(camera, scene, sampler, depth, &mut pixel, light_dist);
        PathSample { p: pixel, l }
    }
}

impl Default for MmltIntegrator {
    fn default() -> Self {
        MmltIntegrator::new()
    }
}

impl Integrator for MmltIntegrator {
    fn render(
        &mut self,
        camera: &dyn Camera,
        scene: &Scene,
        params: &RenderParams,
    ) -> Result<()> {
        let resolution = camera.film().resolution();
        let width = resolution.x as usize;
        let num_pixels = (resolution.x * resolution.y) as usize;
        let max_depth = params.get_int_or("maxDepth", 8) as usize;
        let p_large = params.get_float_or("pLarge", 0.3);
        let sample_count = params.get_int_or("sampleCount", 64) as usize;
        let n_threads = num_system_threads();
        let n_mutate = (num_pixels + n_threads - 1) / n_threads;
        let global_seed = base_seed(params) % 10_007;

        let light_dist = match calc_light_power_distrib(scene) {
            Some(d) => d,
            None => {
                info!("No lights in scene; image stays black");
                return Ok(());
            }
        };

        // Bootstrap one chain candidate per (path, depth) pair
        let n_bootstrap =
            (params.get_int_or("luminanceSamples", 500_000) as usize + max_depth)
                / (max_depth + 1);
        let mut sample_weights = vec![0.0f32; n_bootstrap * (max_depth + 1)];
        {
            let light_dist = &light_dist;
            parallel_for_slice(&mut sample_weights, |_tid, rng_index, w| {
                let depth = rng_index % (max_depth + 1);
                let mut ps_sampler = PssSampler::new(
                    global_seed + rng_index as u64,
                    p_large,
                    NUM_SAMPLE_STREAMS,
                );
                let sample =
                    Self::generate_sample(camera, scene, &mut ps_sampler, depth, light_dist);
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

        for i in 0..sample_count {
            let n_accept = AtomicU64::new(0);
            let n_total = AtomicU64::new(0);

            let bootstrap_ref = &bootstrap;
            let light_dist_ref = &light_dist;
            let n_accept_ref = &n_accept;
            let n_total_ref = &n_total;
            parallel_for(0, n_threads, |t| {
                // Select a chain (and with it a path depth)
                let mut rng = Rng::with_seed(global_seed + (i * n_threads + t) as u64);
                let (rng_index, _) = bootstrap_ref.sample_discrete(rng.uniform_f32());
                let depth = rng_index % (max_depth + 1);
                let mut ps_sampler = PssSampler::new(
                    global_seed + rng_index as u64,
                    p_large,
                    NUM_SAMPLE_STREAMS,
                );

                let mut current = Self::generate_sample(
                    camera,
                    scene,
                    &mut ps_sampler,
                    depth,
                    light_dist_ref,
                );

                for _m in 0..n_mutate {
                    let next = Self::generate_sample(
                        camera,
                        scene,
                        &mut ps_sampler,
                        depth,
                        light_dist_ref,
                    );
                    let accept_ratio = if current.l.is_black() {
                        1.0
                    } else {
                        (next.l.gray() / current.l.gray()).min(1.0)
                    };

                    if !current.l.is_black() {
                        let weight = (1.0 - accept_ratio)
                            / (current.l.gray() / b + ps_sampler.p_large());
                        let pixel = Point2f::new(width as f32 - current.p.x, current.p.y);
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
                }
            });

            let accept = n_accept.load(Ordering::Relaxed);
            let total = n_total.load(Ordering::Relaxed).max(1);
            info!(
                "MMLT pass {}/{}: accept ratio {:.2} % ({} / {})",
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
