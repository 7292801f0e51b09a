use std::f32::consts::PI;

use anyhow::Result;
use log::info;
use parking_lot::Mutex;

use crate::bsdf::BxDFType;
use crate::camera::Camera;
use crate::integrator::bdpt::{
    connect_bdpt_strategies, generate_camera_subpath, generate_light_subpath, Vertex, VertexType,
};
use crate::integrator::{base_seed, scrub_radiance, Integrator};
use crate::memory::MemoryArena;
use crate::mis::calc_light_power_distrib;
use crate::parallel::{num_system_threads, parallel_for_slice, thread_id};
use crate::photon_map::{Photon, PhotonMap, PhotonMapType};
use crate::renderparams::RenderParams;
use crate::sampler::Sampler;
use crate::sampling::{concentric_sample_disk, Distribution1D};
use crate::scene::Scene;
use crate::spectrum::Spectrum;
use crate::{Point2f, Point2i};

fn remap0(f: f32) -> f32 {
    if f != 0.0 {
        f
    } else {
        1.0
    }
}

/// Sum of relative strategy densities for a connection, with the
/// camera-merge and light-merge terms split out for the unified weight.
#[allow(clippy::too_many_arguments)]
fn calc_weight_sum<'a>(
    scene: &Scene,
    light_path: &mut [Vertex<'a>],
    camera_path: &mut [Vertex<'a>],
    sampled: Option<&Vertex<'a>>,
    s: usize,
    t: usize,
    light_dist: &Distribution1D,
    ri_light: &mut f32,
    ri_camera: &mut f32,
) -> f32 {
    if s + t == 2 {
        return 1.0;
    }

    let backup_light: Vec<(usize, Vertex<'a>)> = (s.saturating_sub(2)..s)
        .map(|i| (i, light_path[i].clone()))
        .collect();
    let backup_camera: Vec<(usize, Vertex<'a>)> = (t.saturating_sub(2)..t)
        .map(|i| (i, camera_path[i].clone()))
        .collect();

    if let Some(sampled) = sampled {
        if s == 1 {
            light_path[0] = sampled.clone();
        } else if t == 1 {
            camera_path[0] = sampled.clone();
        }
    }

    if t > 0 {
        camera_path[t - 1].delta = false;
    }
    if s > 0 {
        light_path[s - 1].delta = false;
    }

    if t > 0 {
        let value = if s > 0 {
            let prev = if s > 1 { Some(&light_path[s - 2]) } else { None };
            light_path[s - 1].pdf(scene, prev, &camera_path[t - 1])
        } else {
            camera_path[t - 1].pdf_light_origin(scene, &camera_path[t - 2], light_dist)
        };
        camera_path[t - 1].pdf_rev = value;
    }
    if t > 1 {
        let value = if s > 0 {
            camera_path[t - 1].pdf(scene, Some(&light_path[s - 1]), &camera_path[t - 2])
        } else {
            camera_path[t - 1].pdf_light(scene, &camera_path[t - 2])
        };
        camera_path[t - 2].pdf_rev = value;
    }
    if s > 0 {
        let prev = if t > 1 { Some(&camera_path[t - 2]) } else { None };
        let value = camera_path[t - 1].pdf(scene, prev, &light_path[s - 1]);
        light_path[s - 1].pdf_rev = value;
    }
    if s > 1 {
        let value = light_path[s - 1].pdf(scene, Some(&camera_path[t - 1]), &light_path[s - 2]);
        light_path[s - 2].pdf_rev = value;
    }

    let mut sum_ri = 0.0;
    let mut ri = 1.0;
    for i in (1..t).rev() {
        ri *= remap0(camera_path[i].pdf_rev) / remap0(camera_path[i].pdf_fwd);
        if camera_path[i].delta || camera_path[i - 1].delta {
            continue;
        }
        if i == 1 {
            *ri_camera = ri;
        } else {
            sum_ri += ri;
        }
    }

    ri = 1.0;
    for i in (0..s).rev() {
        ri *= remap0(light_path[i].pdf_rev) / remap0(light_path[i].pdf_fwd);
        let delta_light = if i > 0 {
            light_path[i - 1].delta
        } else {
            light_path[0].is_delta_light()
        };
        if light_path[i].delta || delta_light {
            continue;
        }
        if i == 0 {
            *ri_light = ri;
        } else {
            sum_ri += ri;
        }
    }

    for (i, v) in backup_light {
        light_path[i] = v;
    }
    for (i, v) in backup_camera {
        camera_path[i] = v;
    }

    1.0 + sum_ri
}

/// One `(s, t)` strategy combining the BDPT connection with the photon
/// density estimate at interior camera vertices, under the unified weight.
#[allow(clippy::too_many_arguments)]
fn connect_vcm<'a>(
    scene: &'a Scene,
    light_path: &mut [Vertex<'a>],
    camera_path: &mut [Vertex<'a>],
    s: usize,
    t: usize,
    n_light: usize,
    photon_maps: &[PhotonMap],
    lookup_size: usize,
    lookup_radius: f32,
    num_pixels: usize,
    light_dist: &Distribution1D,
    camera: &'a dyn Camera,
    sampler: &mut dyn Sampler,
    arena: &MemoryArena,
    p_raster: &mut Point2f,
) -> Spectrum {
    if t > 1 && s != 0 && camera_path[t - 1].vtype == VertexType::Light {
        return Spectrum::black();
    }

    // Monte Carlo (vertex connection) part, reusing the BDPT strategies
    let (l_mc, sampled) = connect_bdpt_strategies(
        scene,
        light_path,
        camera_path,
        s,
        t,
        light_dist,
        camera,
        sampler,
        p_raster,
    );

    // Density estimate (vertex merging) part
    let mut l_de = Spectrum::black();
    if s >= 1 {
        for c in (1..t).rev() {
            let vc_mid = &camera_path[c];
            let l_index = s + (t - c - 1);
            if l_index >= n_light || l_index >= photon_maps.len() {
                continue;
            }
            if !vc_mid.is_connectible() {
                continue;
            }
            if let Some(si) = vc_mid.si() {
                let diffuse = si.bsdf.as_ref().map_or(false, |b| {
                    b.has_type(BxDFType::BSDF_DIFFUSE | BxDFType::BSDF_REFLECTION)
                });
                if diffuse {
                    l_de += vc_mid.beta
                        * photon_maps[l_index].estimate_l(si, lookup_size, lookup_radius, arena);
                }
            }
        }
    }

    let mut ri_camera = 0.0;
    let mut ri_light = 0.0;
    let sum_w_de = if !l_mc.is_black() {
        calc_weight_sum(
            scene,
            light_path,
            camera_path,
            sampled.as_ref(),
            s,
            t,
            light_dist,
            &mut ri_light,
            &mut ri_camera,
        )
    } else {
        0.0
    };
    let sum_w_mc = sum_w_de + ri_camera + ri_light;

    if sum_w_mc == 0.0 {
        if s + t > 1 {
            return l_de / num_pixels as f32 / (s + t - 1) as f32;
        }
        return Spectrum::black();
    }

    // Cone kernel weight of the merge strategy
    let k = 1.1;
    let rand_disk = concentric_sample_disk(sampler.get_2d());
    let accum_w = (1.0 - 2.0 / (3.0 * k)) * (PI * lookup_radius * lookup_radius);
    let kernel_w =
        (1.0 - (rand_disk.x * rand_disk.x + rand_disk.y * rand_disk.y).sqrt() / k).max(0.0)
            / accum_w;

    let mut mis_w_mc = 0.0;
    let mut mis_w_de = 0.0;
    if (!l_mc.is_black() && !l_de.is_black()) || t == 1 {
        mis_w_mc = kernel_w / (sum_w_mc * kernel_w + sum_w_de * num_pixels as f32);
        mis_w_de = num_pixels as f32 / (sum_w_mc * kernel_w + sum_w_de * num_pixels as f32);
    } else if !l_mc.is_black() {
        mis_w_mc = 1.0 / sum_w_mc;
    } else if !l_de.is_black() {
        mis_w_de = 1.0 / sum_w_de;
    }

    l_mc * mis_w_mc + l_de * (mis_w_de / num_pixels as f32)
}

/// Vertex connection and merging / unified path sampling.
pub struct VcmUpsIntegrator {
    pub sampler: Box<dyn Sampler>,
    lookup_radius_scale: f32,
}

impl VcmUpsIntegrator {
    pub fn new(sampler: Box<dyn Sampler>) -> VcmUpsIntegrator {
        VcmUpsIntegrator {
            sampler,
            lookup_radius_scale: 1.0,
        }
    }
}

impl Integrator for VcmUpsIntegrator {
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
        let alpha = params.get_float_or("alpha", 0.8);
        let n_threads = num_system_threads();
        let seed = base_seed(params);

        let light_dist = match calc_light_power_distrib(scene) {
            Some(d) => d,
            None => {
                info!("No lights in scene; image stays black");
                return Ok(());
            }
        };

        // Initial lookup radius scale from the scene extent
        self.lookup_radius_scale = scene.world_bound().diagonal().length() * 0.5;

        for i in 0..num_samples {
            info!("VCM/UPS iteration {}/{}", i + 1, num_samples);
            let iter_seed = seed + (i * n_threads) as u64;

            // Pass A: one light subpath per pixel, kept for the iteration
            let mut light_paths: Vec<Vec<Vertex<'_>>> = vec![Vec::new(); num_pixels];
            {
                let proto = &self.sampler;
                let light_dist = &light_dist;
                parallel_for_slice(&mut light_paths, |tid, pid, path| {
                    let mut sampler = proto
                        .clone_seeded(iter_seed.wrapping_add((pid as u64) << 16).wrapping_add(tid as u64));
                    let sampler = sampler.as_mut();
                    sampler.start_pixel();
                    generate_light_subpath(scene, sampler, max_depth + 1, light_dist, path);
                });
            }

            // One photon map per light-subpath length, over the diffuse
            // surface vertices at that depth
            let mut photon_maps: Vec<PhotonMap> = Vec::with_capacity(max_depth + 1);
            for b in 0..=max_depth {
                let mut map = PhotonMap::new(PhotonMapType::Global);
                let mut photons = Vec::new();
                if b >= 1 {
                    for path in &light_paths {
                        if b < path.len() {
                            let v = &path[b];
                            if let Some(si) = v.si() {
                                let diffuse = si.bsdf.as_ref().map_or(false, |bs| {
                                    bs.has_type(
                                        BxDFType::BSDF_DIFFUSE | BxDFType::BSDF_REFLECTION,
                                    )
                                });
                                if diffuse {
                                    photons.push(Photon {
                                        p: v.p(),
                                        beta: v.beta,
                                        wi: si.hit.wo,
                                        n: si.hit.n,
                                    });
                                }
                            }
                        }
                    }
                }
                map.build(photons);
                photon_maps.push(map);
            }

            // Pass B: camera subpaths, connections and merges
            {
                let samplers: Vec<Mutex<Box<dyn Sampler>>> = (0..n_threads)
                    .map(|t| Mutex::new(self.sampler.clone_seeded(iter_seed + 31 + t as u64)))
                    .collect();
                let arenas: Vec<Mutex<MemoryArena>> =
                    (0..n_threads).map(|_| Mutex::new(MemoryArena::new())).collect();
                let light_paths_ref = &mut light_paths;
                // Connections mutate the pdf bookkeeping temporarily, so
                // every pixel owns its light path exclusively; pass B walks
                // pixels through the same partition as pass A.
                let photon_maps_ref = &photon_maps;
                let light_dist_ref = &light_dist;
                let lookup_size = params.get_int_or("lookupSize", 32) as usize;
                let lookup_radius =
                    params.get_float_or("lookupRadius", 0.125) * self.lookup_radius_scale;

                parallel_for_slice(light_paths_ref, |_chunk, pid, light_path| {
                    let tid = thread_id();
                    let mut sampler = samplers[tid.min(n_threads - 1)].lock();
                    let sampler = sampler.as_mut();
                    sampler.start_pixel();

                    let x = (pid % width) as i32;
                    let y = (pid / width) as i32;
                    let rand_film = sampler.get_2d();

                    let mut camera_path: Vec<Vertex<'_>> = Vec::with_capacity(max_depth + 2);
                    let n_camera = generate_camera_subpath(
                        scene,
                        sampler,
                        max_depth + 2,
                        camera,
                        &Point2i::new(x, y),
                        &rand_film,
                        &mut camera_path,
                    );
                    let n_light = light_path.len();

                    let mut arena = arenas[tid.min(n_threads - 1)].lock();
                    let mut l = Spectrum::black();
                    for t_strat in 1..=n_camera {
                        for s_strat in 0..=n_light {
                            let depth = (t_strat + s_strat) as i32 - 2;
                            if (s_strat == 1 && t_strat == 1)
                                || depth < 0
                                || depth > max_depth as i32
                            {
                                continue;
                            }
                            let mut p_film =
                                Point2f::new(x as f32 + rand_film.x, y as f32 + rand_film.y);
                            let l_path = connect_vcm(
                                scene,
                                light_path,
                                &mut camera_path,
                                s_strat,
                                t_strat,
                                n_light,
                                photon_maps_ref,
                                lookup_size,
                                lookup_radius,
                                num_pixels,
                                light_dist_ref,
                                camera,
                                sampler,
                                &arena,
                                &mut p_film,
                            );
                            if t_strat == 1 {
                                if !l_path.is_black() {
                                    let mirrored =
                                        Point2f::new(width as f32 - p_film.x, p_film.y);
                                    camera.film().add_splat(&mirrored, l_path);
                                }
                            } else {
                                l += l_path;
                            }
                        }
                    }
                    let pixel = Point2i::new(resolution.x - x - 1, y);
                    let l = scrub_radiance(l, &pixel);
                    camera.film().add_sample(
                        &Point2f::new(
                            pixel.x as f32 + rand_film.x,
                            pixel.y as f32 + rand_film.y,
                        ),
                        l,
                    );
                    arena.reset();
                });
            }

            camera
                .film()
                .save_scaled(i as u32 + 1, 1.0 / (i as f32 + 1.0))?;

            // Shrink the merge radius between iterations, floored at one
            self.lookup_radius_scale = (self.lookup_radius_scale * alpha).max(1.0);
        }
        Ok(())
    }
}
