use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::f32::consts::PI;

use log::info;
use num::Zero;
use parking_lot::Mutex;

use crate::bsdf::BxDFType;
use crate::interaction::{MediumInteraction, SurfaceInteraction};
use crate::material::TransportMode;
use crate::memory::MemoryArena;
use crate::mis::calc_light_power_distrib;
use crate::parallel::{num_system_threads, parallel_for, thread_id};
use crate::ray::Ray;
use crate::renderparams::RenderParams;
use crate::sampler::Sampler;
use crate::scene::Scene;
use crate::spectrum::Spectrum;
use crate::{min, Normal3f, Point3f, Vector3f};

/// A stored light particle. `n` is the zero vector for volumetric photons.
#[derive(Copy, Clone)]
pub struct Photon {
    pub p: Point3f,
    pub beta: Spectrum,
    pub wi: Vector3f,
    pub n: Normal3f,
}

// ---------------------------------------------------------------------------
// kd-tree
// ---------------------------------------------------------------------------

struct KdNode {
    photon: Photon,
    axis: usize,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

fn build_kd(mut photons: Vec<Photon>) -> Option<Box<KdNode>> {
    if photons.is_empty() {
        return None;
    }
    // Split on the axis with the largest extent
    let mut lo = photons[0].p;
    let mut hi = photons[0].p;
    for ph in &photons {
        for a in 0..3 {
            if ph.p[a] < lo[a] {
                lo[a] = ph.p[a];
            }
            if ph.p[a] > hi[a] {
                hi[a] = ph.p[a];
            }
        }
    }
    let extent = hi - lo;
    let axis = if extent.x > extent.y {
        if extent.x > extent.z {
            0
        } else {
            2
        }
    } else if extent.y > extent.z {
        1
    } else {
        2
    };

    photons.sort_by(|a, b| a.p[axis].partial_cmp(&b.p[axis]).unwrap_or(CmpOrdering::Equal));
    let mid = photons.len() / 2;
    let right_part = photons.split_off(mid + 1);
    let node_photon = photons.pop().expect("median photon");

    Some(Box::new(KdNode {
        photon: node_photon,
        axis,
        left: build_kd(photons),
        right: build_kd(right_part),
    }))
}

struct HeapEntry {
    dist2: f32,
    photon: Photon,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.dist2 == other.dist2
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        self.dist2.partial_cmp(&other.dist2)
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.partial_cmp(other).unwrap_or(CmpOrdering::Equal)
    }
}

fn knn_search(
    node: &Option<Box<KdNode>>,
    p: &Point3f,
    k: usize,
    max_radius2: f32,
    heap: &mut BinaryHeap<HeapEntry>,
) {
    let node = match node {
        Some(n) => n,
        None => return,
    };

    let bound2 = if heap.len() < k {
        max_radius2
    } else {
        min(max_radius2, heap.peek().map_or(max_radius2, |e| e.dist2))
    };

    let dist2 = (node.photon.p - *p).length_squared();
    if dist2 < bound2 {
        heap.push(HeapEntry {
            dist2,
            photon: node.photon.clone(),
        });
        if heap.len() > k {
            heap.pop();
        }
    }

    let plane_dist = p[node.axis] - node.photon.p[node.axis];
    let (near, far) = if plane_dist < 0.0 {
        (&node.left, &node.right)
    } else {
        (&node.right, &node.left)
    };
    knn_search(near, p, k, max_radius2, heap);
    let bound2 = if heap.len() < k {
        max_radius2
    } else {
        min(max_radius2, heap.peek().map_or(max_radius2, |e| e.dist2))
    };
    if plane_dist * plane_dist < bound2 {
        knn_search(far, p, k, max_radius2, heap);
    }
}

// ---------------------------------------------------------------------------
// Photon map
// ---------------------------------------------------------------------------

/// What a map stores, which controls where the photon walk deposits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PhotonMapType {
    /// Surface photons that already bounced off a diffuse or glossy surface.
    Global,
    /// Photons whose bounce history is purely specular, landing on a
    /// diffuse surface.
    Caustics,
    /// Photons deposited at medium scattering events.
    Volumetric,
}

/// KD-tree of photons acting as a radiance density estimator.
pub struct PhotonMap {
    kind: PhotonMapType,
    root: Option<Box<KdNode>>,
    len: usize,
}

impl PhotonMap {
    pub fn new(kind: PhotonMapType) -> PhotonMap {
        PhotonMap {
            kind,
            root: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Build the tree from an explicit photon list (VCM feeds vertices in
    /// directly).
    pub fn build(&mut self, photons: Vec<Photon>) {
        self.len = photons.len();
        self.root = build_kd(photons);
    }

    /// Shoot `cast_photons` photons from the scene lights in parallel and
    /// build the map from the deposits.
    pub fn construct(
        &mut self,
        scene: &Scene,
        params: &RenderParams,
        proto_sampler: &dyn Sampler,
        cast_photons: usize,
        seed: u64,
    ) {
        let light_distrib = match calc_light_power_distrib(scene) {
            Some(d) => d,
            None => {
                self.build(Vec::new());
                return;
            }
        };

        let n_threads = num_system_threads();
        let samplers: Vec<Mutex<Box<dyn Sampler>>> = (0..n_threads)
            .map(|t| Mutex::new(proto_sampler.clone_seeded(seed + t as u64)))
            .collect();
        let buckets: Vec<Mutex<Vec<Photon>>> =
            (0..n_threads).map(|_| Mutex::new(Vec::new())).collect();
        let max_depth = params.get_int_or("maxDepth", 8) as usize;

        parallel_for(0, cast_photons, |_i| {
            let tid = thread_id();
            let mut sampler = samplers[tid].lock();
            let sampler = sampler.as_mut();
            sampler.start_next_sample();

            // Pick a light by emitted power
            let (light_id, light_pdf) = light_distrib.sample_discrete(sampler.get_1d());
            let light = &scene.lights[light_id];

            let u1 = sampler.get_2d();
            let u2 = sampler.get_2d();
            let le_sample = light.sample_le(&u1, &u2);
            if le_sample.pdf_pos == 0.0 || le_sample.pdf_dir == 0.0 || le_sample.le.is_black() {
                return;
            }
            let beta = le_sample.le * le_sample.ray.d.abs_dotn(&le_sample.n_light)
                / (light_pdf * le_sample.pdf_pos * le_sample.pdf_dir * cast_photons as f32);
            if beta.is_black() {
                return;
            }

            let mut local = buckets[tid].lock();
            self.trace_photon(
                scene,
                le_sample.ray,
                beta,
                sampler,
                max_depth,
                &mut local,
            );
        });

        let mut all = Vec::new();
        for bucket in buckets {
            all.append(&mut bucket.into_inner());
        }
        info!("{} photons stored ({:?})", all.len(), self.kind);
        self.build(all);
    }

    fn trace_photon(
        &self,
        scene: &Scene,
        ray: Ray,
        beta: Spectrum,
        sampler: &mut dyn Sampler,
        max_depth: usize,
        out: &mut Vec<Photon>,
    ) {
        let mut ray = ray;
        let mut beta = beta;
        let mut specular_only = true;
        let mut bounced_diffuse = false;

        let mut bounces = 0;
        while bounces < max_depth {
            let mut r = ray.clone();
            let isect = scene.intersect(&mut r);

            // Sample participating media
            let mut mi = None;
            if let Some(medium) = &r.medium {
                let (weight, sampled) = medium.sample(&r, sampler);
                beta *= weight;
                mi = sampled;
            }
            if beta.is_black() {
                break;
            }

            if let Some(mi) = mi {
                if self.kind == PhotonMapType::Volumetric {
                    out.push(Photon {
                        p: mi.p,
                        beta,
                        wi: -r.d,
                        n: Normal3f::zero(),
                    });
                }
                let (_, wi) = mi.phase.sample_p(&mi.wo, &sampler.get_2d());
                ray = mi.spawn_ray(&wi);
                bounces += 1;
                continue;
            }

            let mut isect = match isect {
                Some(isect) => isect,
                None => break,
            };

            isect.compute_scattering_functions(&r, TransportMode::Importance, true);
            let bsdf = match isect.bsdf {
                Some(b) => b,
                None => {
                    // Medium boundary; march on without counting the bounce
                    ray = isect.hit.spawn_ray(&r.d);
                    continue;
                }
            };

            let non_specular =
                bsdf.num_components(BxDFType::all() & !BxDFType::BSDF_SPECULAR) > 0;
            if non_specular {
                let deposit = match self.kind {
                    PhotonMapType::Global => bounced_diffuse,
                    PhotonMapType::Caustics => bounces > 0 && specular_only,
                    PhotonMapType::Volumetric => false,
                };
                if deposit {
                    out.push(Photon {
                        p: isect.hit.p,
                        beta,
                        wi: -r.d,
                        n: isect.shading.n,
                    });
                }
            }

            let wo = -r.d;
            let (f, wi, pdf, sampled_type) =
                bsdf.sample_f(&wo, &sampler.get_2d(), BxDFType::all());
            if pdf == 0.0 || f.is_black() {
                break;
            }
            let beta_new = beta * f * wi.abs_dotn(&isect.shading.n) / pdf;

            // Roulette on the relative throughput change
            let continue_prob = min(1.0, beta_new.gray() / beta.gray());
            if sampler.get_1d() > continue_prob {
                break;
            }
            beta = beta_new / continue_prob;

            if sampled_type.contains(BxDFType::BSDF_SPECULAR) {
                // Specular chain unbroken
            } else {
                specular_only = false;
                bounced_diffuse = true;
            }
            ray = isect.spawn_ray(&wi);
            bounces += 1;
        }
    }

    /// k-NN gather into an arena-backed scratch slice.
    fn gather<'a>(
        &self,
        p: &Point3f,
        k: usize,
        radius: f32,
        arena: &'a MemoryArena,
    ) -> &'a mut [(Photon, f32)] {
        let mut heap = BinaryHeap::new();
        knn_search(&self.root, p, k, radius * radius, &mut heap);
        let found = arena.alloc_slice(
            heap.len(),
            (
                Photon {
                    p: Point3f::zero(),
                    beta: Spectrum::black(),
                    wi: Vector3f::zero(),
                    n: Normal3f::zero(),
                },
                0.0f32,
            ),
        );
        for (slot, e) in found.iter_mut().zip(heap.into_iter()) {
            *slot = (e.photon, e.dist2.sqrt());
        }
        found
    }

    /// Cone-filtered radiance estimate at a surface point.
    pub fn estimate_l(
        &self,
        isect: &SurfaceInteraction<'_>,
        gather_photons: usize,
        gather_radius: f32,
        arena: &MemoryArena,
    ) -> Spectrum {
        let bsdf = match &isect.bsdf {
            Some(b) => b,
            None => return Spectrum::black(),
        };
        let found = self.gather(&isect.hit.p, gather_photons, gather_radius, arena);

        // Keep photons lying close to the tangent plane of the query point
        let mut n_valid = 0;
        let mut maxdist = 0.0f32;
        for i in 0..found.len() {
            let (photon, dist) = found[i];
            if dist > 0.0 {
                let diff = isect.hit.p - photon.p;
                let dt = isect.shading.n.dot(&diff) / dist;
                if dt.abs() >= gather_radius * gather_radius * 0.01 {
                    continue;
                }
            }
            maxdist = maxdist.max(dist);
            found[n_valid] = (photon, dist);
            n_valid += 1;
        }
        if n_valid == 0 || maxdist <= 1e-6 {
            return Spectrum::black();
        }

        // Cone filter over the gathered disc
        let k = 1.1;
        let mut total_flux = Spectrum::black();
        for (photon, dist) in &found[..n_valid] {
            let w = 1.0 - dist / (k * maxdist);
            total_flux += photon.beta * bsdf.f(&isect.hit.wo, &photon.wi, BxDFType::all()) * w;
        }
        total_flux /= 1.0 - 2.0 / (3.0 * k);

        total_flux / (PI * maxdist * maxdist)
    }

    /// Cone-filtered in-scattered radiance estimate at a medium point.
    pub fn estimate_medium_l(
        &self,
        mi: &MediumInteraction,
        gather_photons: usize,
        gather_radius: f32,
        arena: &MemoryArena,
    ) -> Spectrum {
        let found = self.gather(&mi.p, gather_photons, gather_radius, arena);

        // Only volumetric photons (stored with a zero normal) participate
        let mut n_valid = 0;
        let mut maxdist = 0.0f32;
        for i in 0..found.len() {
            let (photon, dist) = found[i];
            if photon.n.length() < 1e-6 {
                maxdist = maxdist.max(dist);
                found[n_valid] = (photon, dist);
                n_valid += 1;
            }
        }
        if n_valid == 0 || maxdist <= 1e-6 {
            return Spectrum::black();
        }

        let k = 1.1;
        let mut total_flux = Spectrum::black();
        for (photon, dist) in &found[..n_valid] {
            let w = 1.0 - dist / (k * maxdist);
            total_flux += photon.beta * (mi.phase.p(&mi.wo, &photon.wi) * w / (4.0 * PI));
        }
        total_flux /= 1.0 - 3.0 / (4.0 * k);

        total_flux / ((4.0 / 3.0) * PI * maxdist * maxdist * maxdist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    fn random_photons(n: usize, seed: u64) -> Vec<Photon> {
        let mut rng = Rng::with_seed(seed);
        (0..n)
            .map(|_| Photon {
                p: Point3f::new(rng.uniform_f32(), rng.uniform_f32(), rng.uniform_f32()),
                beta: Spectrum::white(),
                wi: Vector3f::new(0.0, 0.0, 1.0),
                n: Normal3f::new(0.0, 0.0, 1.0),
            })
            .collect()
    }

    #[test]
    fn test_knn_matches_brute_force() {
        let photons = random_photons(500, 21);
        let mut map = PhotonMap::new(PhotonMapType::Global);
        map.build(photons.clone());

        let arena = MemoryArena::new();
        let query = Point3f::new(0.5, 0.5, 0.5);
        let k = 16;
        let found = map.gather(&query, k, 10.0, &arena);
        assert_eq!(found.len(), k);

        let mut dists: Vec<f32> = photons
            .iter()
            .map(|ph| (ph.p - query).length())
            .collect();
        dists.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mut found_dists: Vec<f32> = found.iter().map(|(_, d)| *d).collect();
        found_dists.sort_by(|a, b| a.partial_cmp(b).unwrap());

        for (a, b) in dists.iter().take(k).zip(found_dists.iter()) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_knn_respects_radius() {
        let photons = random_photons(200, 22);
        let mut map = PhotonMap::new(PhotonMapType::Global);
        map.build(photons);
        let arena = MemoryArena::new();
        let query = Point3f::new(0.5, 0.5, 0.5);
        let found = map.gather(&query, 100, 0.1, &arena);
        for (_, d) in found.iter() {
            assert!(*d < 0.1);
        }
    }

    #[test]
    fn test_empty_map() {
        let mut map = PhotonMap::new(PhotonMapType::Caustics);
        map.build(Vec::new());
        assert!(map.is_empty());
        let arena = MemoryArena::new();
        let found = map.gather(&Point3f::zero(), 8, 1.0, &arena);
        assert!(found.is_empty());
    }
}
