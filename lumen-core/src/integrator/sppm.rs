use std::f32::consts::PI;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Result;
use itertools::iproduct;
use log::info;
use num::Zero;
use parking_lot::Mutex;

use crate::bounds::Bounds3f;
use crate::bsdf::{Bsdf, BxDFType};
use crate::camera::Camera;
use crate::integrator::{base_seed, Integrator};
use crate::interaction::Intr;
use crate::material::TransportMode;
use crate::mis::{calc_light_power_distrib, uniform_sample_one_light};
use crate::parallel::{num_system_threads, parallel_for, parallel_for_slice, thread_id};
use crate::ray::Ray;
use crate::renderparams::RenderParams;
use crate::sampler::Sampler;
use crate::scene::Scene;
use crate::spectrum::Spectrum;
use crate::{Point2i, Point3f, Vector3f};

const SPPM_ALPHA: f32 = 0.7;

#[derive(Default)]
struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    fn store(&self, v: f32) {
        self.bits.store(v.to_bits(), Ordering::Relaxed);
    }

    fn add(&self, v: f32) {
        let mut old = self.bits.load(Ordering::Relaxed);
        loop {
            let new = (f32::from_bits(old) + v).to_bits();
            match self
                .bits
                .compare_exchange_weak(old, new, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => old = actual,
            }
        }
    }
}

#[derive(Default)]
struct VisiblePoint {
    p: Point3f,
    wo: Vector3f,
    bsdf: Option<Bsdf>,
    beta: Spectrum,
}

struct SppmPixel {
    ld: Spectrum,
    vp: VisiblePoint,
    tau: Spectrum,
    phi: [AtomicF32; 3],
    r2: f32,
    n: f32,
    m: AtomicU32,
}

impl Default for SppmPixel {
    fn default() -> SppmPixel {
        SppmPixel {
            ld: Spectrum::black(),
            vp: VisiblePoint::default(),
            tau: Spectrum::black(),
            phi: Default::default(),
            r2: 0.0,
            n: 0.0,
            m: AtomicU32::new(0),
        }
    }
}

/// Spatial hash over the visible points, cell size matched to the largest
/// current search radius.
struct HashGrid {
    cells: Vec<Vec<usize>>,
    bounds: Bounds3f,
    inv_cell: f32,
    size: usize,
}

impl HashGrid {
    fn hash(&self, ix: i64, iy: i64, iz: i64) -> usize {
        let h = (ix.wrapping_mul(73_856_093))
            ^ (iy.wrapping_mul(19_349_663))
            ^ (iz.wrapping_mul(83_492_791));
        (h.rem_euclid(self.size as i64)) as usize
    }

    fn cell_coords(&self, p: &Point3f) -> (i64, i64, i64) {
        let d = *p - self.bounds.p_min;
        (
            (d.x * self.inv_cell).floor() as i64,
            (d.y * self.inv_cell).floor() as i64,
            (d.z * self.inv_cell).floor() as i64,
        )
    }

    fn build(pixels: &[SppmPixel], cell_size: f32) -> HashGrid {
        let mut bounds = Bounds3f::new();
        for px in pixels {
            if !px.vp.beta.is_black() {
                bounds = bounds.merge_point(&px.vp.p);
            }
        }
        if bounds.is_zero() {
            bounds = Bounds3f::from_point(&Point3f::zero());
        }
        let mut grid = HashGrid {
            cells: Vec::new(),
            bounds,
            inv_cell: 1.0 / cell_size,
            size: pixels.len().max(1),
        };
        grid.cells = vec![Vec::new(); grid.size];

        for (i, px) in pixels.iter().enumerate() {
            if px.vp.beta.is_black() {
                continue;
            }
            let r = px.r2.sqrt();
            let rv = Vector3f::new(r, r, r);
            let (x0, y0, z0) = grid.cell_coords(&(px.vp.p - rv));
            let (x1, y1, z1) = grid.cell_coords(&(px.vp.p + rv));
            for (z, y, x) in iproduct!(z0..=z1, y0..=y1, x0..=x1) {
                let h = grid.hash(x, y, z);
                grid.cells[h].push(i);
            }
        }
        grid
    }

    fn lookup(&self, p: &Point3f) -> &[usize] {
        let (x, y, z) = self.cell_coords(p);
        &self.cells[self.hash(x, y, z)]
    }
}

/// Stochastic progressive photon mapping with per-pixel radius statistics.
pub struct SppmIntegrator {
    pub sampler: Box<dyn Sampler>,
}

impl SppmIntegrator {
    pub fn new(sampler: Box<dyn Sampler>) -> SppmIntegrator {
        SppmIntegrator { sampler }
    }

    /// Camera pass: record one visible point per pixel and accumulate the
    /// directly estimated radiance.
    fn path_trace(
        scene: &Scene,
        ray: &Ray,
        sampler: &mut dyn Sampler,
        max_depth: usize,
        pixel: &mut SppmPixel,
    ) {
        let mut ray = ray.clone();
        let mut beta = Spectrum::white();
        let mut specular_bounce = false;

        let mut bounces = 0;
        while bounces < max_depth {
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
                pixel.ld +=
                    beta * uniform_sample_one_light(&Intr::Medium(&mi), scene, sampler, true);
                let (_, wi) = mi.phase.sample_p(&mi.wo, &sampler.get_2d());
                ray = mi.spawn_ray(&wi);
                bounces += 1;
                continue;
            }

            let mut isect = match found {
                Some(isect) => isect,
                None => {
                    for light in &scene.lights {
                        pixel.ld += beta * light.le(&current);
                    }
                    break;
                }
            };

            isect.compute_scattering_functions(&current, TransportMode::Radiance, true);
            let bsdf = match isect.bsdf {
                Some(b) => b,
                None => {
                    ray = isect.hit.spawn_ray(&current.d);
                    continue;
                }
            };

            let wo = -current.d;
            if bounces == 0 || specular_bounce {
                pixel.ld += beta * isect.le(&wo);
            }
            pixel.ld +=
                beta * uniform_sample_one_light(&Intr::Surface(&isect), scene, sampler, false);

            let is_diffuse = bsdf.num_components(
                BxDFType::BSDF_DIFFUSE | BxDFType::BSDF_REFLECTION | BxDFType::BSDF_TRANSMISSION,
            ) > 0;
            let is_glossy = bsdf.num_components(
                BxDFType::BSDF_GLOSSY | BxDFType::BSDF_REFLECTION | BxDFType::BSDF_TRANSMISSION,
            ) > 0;
            if is_diffuse || (is_glossy && bounces == max_depth - 1) {
                pixel.vp = VisiblePoint {
                    p: isect.hit.p,
                    wo,
                    bsdf: Some(bsdf),
                    beta,
                };
                break;
            }

            if bounces < max_depth - 1 {
                let (f, wi, pdf, sampled_type) =
                    bsdf.sample_f(&wo, &sampler.get_2d(), BxDFType::all());
                if pdf == 0.0 || f.is_black() {
                    break;
                }
                beta *= f * wi.abs_dotn(&isect.shading.n) / pdf;
                specular_bounce = sampled_type.contains(BxDFType::BSDF_SPECULAR);
                if beta.y() < 0.25 {
                    let continue_prob = beta.y().min(1.0);
                    if sampler.get_1d() > continue_prob {
                        break;
                    }
                    beta /= continue_prob;
                }
                ray = isect.spawn_ray(&wi);
            }
            bounces += 1;
        }
    }

    /// Photon pass: splat onto the visible points within their radii.
    #[allow(clippy::too_many_arguments)]
    fn trace_photon(
        scene: &Scene,
        grid: &HashGrid,
        pixels: &[SppmPixel],
        ray: Ray,
        beta: Spectrum,
        sampler: &mut dyn Sampler,
        max_depth: usize,
    ) {
        let mut ray = ray;
        let mut beta = beta;

        let mut bounces = 0;
        while bounces < max_depth {
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
                let (_, wi) = mi.phase.sample_p(&mi.wo, &sampler.get_2d());
                ray = mi.spawn_ray(&wi);
                bounces += 1;
                continue;
            }

            let mut isect = match found {
                Some(isect) => isect,
                None => break,
            };

            if bounces > 0 {
                // Splat onto nearby visible points
                let wi = -current.d;
                for &pid in grid.lookup(&isect.hit.p) {
                    let px = &pixels[pid];
                    if (px.vp.p - isect.hit.p).length_squared() > px.r2 {
                        continue;
                    }
                    let bsdf = match &px.vp.bsdf {
                        Some(b) => b,
                        None => continue,
                    };
                    let phi = beta * bsdf.f(&px.vp.wo, &wi, BxDFType::all());
                    px.phi[0].add(phi.r);
                    px.phi[1].add(phi.g);
                    px.phi[2].add(phi.b);
                    px.m.fetch_add(1, Ordering::Relaxed);
                }
            }

            isect.compute_scattering_functions(&current, TransportMode::Importance, true);
            let bsdf = match isect.bsdf {
                Some(b) => b,
                None => {
                    ray = isect.hit.spawn_ray(&current.d);
                    continue;
                }
            };

            let wo = -current.d;
            let (f, wi, pdf, _sampled_type) =
                bsdf.sample_f(&wo, &sampler.get_2d(), BxDFType::all());
            if pdf == 0.0 || f.is_black() {
                break;
            }
            let beta_new = beta * f * wi.abs_dotn(&isect.shading.n) / pdf;

            let continue_prob = (beta_new.y() / beta.y()).min(1.0);
            if sampler.get_1d() > continue_prob {
                break;
            }
            beta = beta_new / continue_prob;
            ray = isect.spawn_ray(&wi);
            bounces += 1;
        }
    }
}

impl Integrator for SppmIntegrator {
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
        let max_depth = params.get_int_or("maxDepth", 8) as usize;
        let cast_photons = params.get_int_or("globalPhotons", 100_000) as usize;
        let alpha = params.get_float_or("alpha", SPPM_ALPHA);
        let n_threads = num_system_threads();
        let seed = base_seed(params);

        let light_distrib = match calc_light_power_distrib(scene) {
            Some(d) => d,
            None => {
                info!("No lights in scene; image stays black");
                return Ok(());
            }
        };

        let mut pixels: Vec<SppmPixel> = Vec::with_capacity(num_pixels);
        pixels.resize_with(num_pixels, SppmPixel::default);

        // Heuristic initial search radius from scene and image size
        let world = scene.world_bound();
        let diag = world.diagonal();
        let initial_radius = ((diag.x + diag.y + diag.z) / 3.0)
            / ((width + height) as f32 / 2.0)
            * 2.0;
        for px in &mut pixels {
            px.r2 = initial_radius * initial_radius;
        }

        for iteration in 0..num_samples {
            info!("SPPM iteration {}/{}", iteration + 1, num_samples);
            let iter_seed = seed + (iteration * n_threads) as u64;

            // 1st pass: trace camera rays and record visible points
            {
                let proto = &self.sampler;
                let scene_ref = &scene;
                parallel_for_slice(&mut pixels, |tid, pid, px| {
                    let mut sampler = proto.clone_seeded(iter_seed + tid as u64);
                    let sampler = sampler.as_mut();
                    // Skip ahead deterministically within the chunk
                    sampler.reseed(iter_seed.wrapping_add((pid as u64) << 16).wrapping_add(tid as u64));
                    sampler.start_pixel();

                    let x = (pid % width) as i32;
                    let y = (pid / width) as i32;
                    let rand_film = sampler.get_2d();
                    let rand_lens = sampler.get_2d();
                    let ray = camera.spawn_ray(&Point2i::new(x, y), &rand_film, &rand_lens);
                    px.vp = VisiblePoint::default();
                    Self::path_trace(scene_ref, &ray, sampler, max_depth, px);
                });
            }

            // Bin the visible points; cells track the widest current radius
            let max_radius = pixels
                .iter()
                .filter(|px| !px.vp.beta.is_black())
                .map(|px| px.r2.sqrt())
                .fold(initial_radius, f32::max);
            let grid = HashGrid::build(&pixels, 2.0 * max_radius);

            // 2nd pass: shoot photons from the lights
            {
                let samplers: Vec<Mutex<Box<dyn Sampler>>> = (0..n_threads)
                    .map(|t| Mutex::new(self.sampler.clone_seeded(iter_seed + 7919 + t as u64)))
                    .collect();
                let pixels_ref = &pixels;
                let grid_ref = &grid;
                parallel_for(0, cast_photons, |_i| {
                    let tid = thread_id();
                    let mut sampler = samplers[tid].lock();
                    let sampler = sampler.as_mut();
                    sampler.start_next_sample();

                    let (light_id, light_pdf) =
                        light_distrib.sample_discrete(sampler.get_1d());
                    let light = &scene.lights[light_id];
                    let u1 = sampler.get_2d();
                    let u2 = sampler.get_2d();
                    let le_sample = light.sample_le(&u1, &u2);
                    if le_sample.pdf_pos == 0.0
                        || le_sample.pdf_dir == 0.0
                        || le_sample.le.is_black()
                    {
                        return;
                    }
                    let beta = le_sample.le * le_sample.ray.d.abs_dotn(&le_sample.n_light)
                        / (light_pdf * le_sample.pdf_pos * le_sample.pdf_dir);
                    if beta.is_black() {
                        return;
                    }
                    Self::trace_photon(
                        scene,
                        grid_ref,
                        pixels_ref,
                        le_sample.ray,
                        beta,
                        sampler,
                        max_depth,
                    );
                });
            }

            // Update the per-pixel statistics
            for px in &mut pixels {
                let m = px.m.load(Ordering::Relaxed);
                if m > 0 {
                    let n_new = px.n + alpha * m as f32;
                    let r2_new = px.r2 * n_new / (px.n + m as f32);
                    let phi = Spectrum::rgb(px.phi[0].load(), px.phi[1].load(), px.phi[2].load());
                    px.tau = (px.tau + px.vp.beta * phi) * (r2_new / px.r2);
                    px.n = n_new;
                    px.r2 = r2_new;
                    px.m.store(0, Ordering::Relaxed);
                    for c in &px.phi {
                        c.store(0.0);
                    }
                }
                px.vp = VisiblePoint::default();
            }

            // Reconstruct and save the current image estimate
            let total_photons = ((iteration + 1) * cast_photons) as f32;
            let mut image = vec![Spectrum::black(); num_pixels];
            for y in 0..height {
                for x in 0..width {
                    let px = &pixels[y * width + x];
                    let mut l = px.ld / (iteration as f32 + 1.0);
                    if px.r2 > 0.0 {
                        l += px.tau / (total_photons * PI * px.r2 + 1e-8);
                    }
                    // Mirrored output, matching the sampler driver
                    image[y * width + (width - x - 1)] = l;
                }
            }
            camera.film().set_image(&image);
            camera.film().save(iteration as u32 + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_recurrence_matches_closed_form() {
        // r_{i+1}^2 = r_i^2 (n + alpha m)/(n + m), replayed 16 times
        let alpha = SPPM_ALPHA;
        let r0: f32 = 0.25;
        let mut r2 = r0 * r0;
        let mut n = 0.0f32;
        let mut product = 1.0f32;
        let photons_per_iter = [12u32, 5, 40, 0, 7, 19, 3, 22, 11, 8, 30, 2, 16, 9, 14, 6];
        for &m in &photons_per_iter {
            if m == 0 {
                continue;
            }
            let m = m as f32;
            let n_new = n + alpha * m;
            let r2_new = r2 * n_new / (n + m);
            product *= n_new / (n + m);
            n = n_new;
            r2 = r2_new;
        }
        let expected = r0 * product.sqrt();
        assert!((r2.sqrt() - expected).abs() < 1e-5);
        // Radius shrinks monotonically
        assert!(r2.sqrt() < r0);
    }

    #[test]
    fn test_hash_grid_lookup_finds_point() {
        let mut pixels: Vec<SppmPixel> = Vec::new();
        pixels.resize_with(4, SppmPixel::default);
        pixels[2].vp = VisiblePoint {
            p: Point3f::new(1.0, 2.0, 3.0),
            wo: Vector3f::new(0.0, 0.0, 1.0),
            bsdf: None,
            beta: Spectrum::white(),
        };
        pixels[2].r2 = 0.01;
        let grid = HashGrid::build(&pixels, 0.2);
        let found = grid.lookup(&Point3f::new(1.0, 2.0, 3.0));
        assert!(found.contains(&2));
    }
}
