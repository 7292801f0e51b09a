use std::f32::consts::PI;

use anyhow::Result;
use log::info;
use num::Zero;
use parking_lot::Mutex;

use crate::bsdf::BxDFType;
use crate::camera::Camera;
use crate::integrator::{base_seed, scrub_radiance, Integrator};
use crate::interaction::{Interaction, MediumInteraction, SurfaceInteraction};
use crate::light::{Light, VisibilityTester};
use crate::material::TransportMode;
use crate::mis::calc_light_power_distrib;
use crate::parallel::{num_system_threads, parallel_for, thread_id};
use crate::ray::Ray;
use crate::renderparams::RenderParams;
use crate::sampler::Sampler;
use crate::sampling::Distribution1D;
use crate::scene::Scene;
use crate::spectrum::Spectrum;
use crate::{Normal3f, Point2f, Point2i, Point3f, Vector3f};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VertexType {
    Camera,
    Light,
    Surface,
    Medium,
}

/// Endpoint of a subpath: a camera, a light, or an escaped ray standing in
/// for the environment.
#[derive(Clone)]
pub struct EndpointInteraction<'a> {
    pub it: Interaction,
    pub camera: Option<&'a dyn Camera>,
    pub light: Option<&'a dyn Light>,
}

impl<'a> EndpointInteraction<'a> {
    pub fn from_camera_ray(camera: &'a dyn Camera, ray: &Ray) -> EndpointInteraction<'a> {
        EndpointInteraction {
            it: Interaction::from_point(&ray.o),
            camera: Some(camera),
            light: None,
        }
    }

    pub fn from_camera_interaction(
        camera: &'a dyn Camera,
        it: Interaction,
    ) -> EndpointInteraction<'a> {
        EndpointInteraction {
            it,
            camera: Some(camera),
            light: None,
        }
    }

    pub fn from_light(light: &'a dyn Light, ray: &Ray, n: Normal3f) -> EndpointInteraction<'a> {
        let mut it = Interaction::from_point(&ray.o);
        it.n = n;
        EndpointInteraction {
            it,
            camera: None,
            light: Some(light),
        }
    }

    pub fn from_light_interaction(
        light: &'a dyn Light,
        it: Interaction,
    ) -> EndpointInteraction<'a> {
        EndpointInteraction {
            it,
            camera: None,
            light: Some(light),
        }
    }

    /// Endpoint for a ray that escaped into the environment.
    pub fn from_escaped_ray(ray: &Ray) -> EndpointInteraction<'a> {
        let mut it = Interaction::from_point(&ray.at(1.0));
        it.n = Normal3f::from(-ray.d);
        EndpointInteraction {
            it,
            camera: None,
            light: None,
        }
    }
}

#[derive(Clone)]
pub enum VertexIntr<'a> {
    Endpoint(EndpointInteraction<'a>),
    Surface(SurfaceInteraction<'a>),
    Medium(MediumInteraction),
}

/// A sampled path vertex annotated with forward and reverse area-measure
/// pdfs and its throughput.
#[derive(Clone)]
pub struct Vertex<'a> {
    pub vtype: VertexType,
    pub beta: Spectrum,
    pub intr: VertexIntr<'a>,
    pub pdf_fwd: f32,
    pub pdf_rev: f32,
    pub delta: bool,
}

impl<'a> Vertex<'a> {
    pub fn create_camera_from_ray(
        camera: &'a dyn Camera,
        ray: &Ray,
        beta: Spectrum,
    ) -> Vertex<'a> {
        Vertex {
            vtype: VertexType::Camera,
            beta,
            intr: VertexIntr::Endpoint(EndpointInteraction::from_camera_ray(camera, ray)),
            pdf_fwd: 0.0,
            pdf_rev: 0.0,
            delta: false,
        }
    }

    pub fn create_camera_from_interaction(
        camera: &'a dyn Camera,
        it: Interaction,
        beta: Spectrum,
    ) -> Vertex<'a> {
        Vertex {
            vtype: VertexType::Camera,
            beta,
            intr: VertexIntr::Endpoint(EndpointInteraction::from_camera_interaction(camera, it)),
            pdf_fwd: 0.0,
            pdf_rev: 0.0,
            delta: false,
        }
    }

    pub fn create_light(
        ei: EndpointInteraction<'a>,
        beta: Spectrum,
        pdf_fwd: f32,
    ) -> Vertex<'a> {
        Vertex {
            vtype: VertexType::Light,
            beta,
            intr: VertexIntr::Endpoint(ei),
            pdf_fwd,
            pdf_rev: 0.0,
            delta: false,
        }
    }

    pub fn create_surface(
        isect: SurfaceInteraction<'a>,
        beta: Spectrum,
        pdf: f32,
        prev: &Vertex<'a>,
    ) -> Vertex<'a> {
        let mut v = Vertex {
            vtype: VertexType::Surface,
            beta,
            intr: VertexIntr::Surface(isect),
            pdf_fwd: 0.0,
            pdf_rev: 0.0,
            delta: false,
        };
        v.pdf_fwd = prev.convert_density(pdf, &v);
        v
    }

    pub fn create_medium(
        mi: MediumInteraction,
        beta: Spectrum,
        pdf: f32,
        prev: &Vertex<'a>,
    ) -> Vertex<'a> {
        let mut v = Vertex {
            vtype: VertexType::Medium,
            beta,
            intr: VertexIntr::Medium(mi),
            pdf_fwd: 0.0,
            pdf_rev: 0.0,
            delta: false,
        };
        v.pdf_fwd = prev.convert_density(pdf, &v);
        v
    }

    pub fn p(&self) -> Point3f {
        match &self.intr {
            VertexIntr::Endpoint(ei) => ei.it.p,
            VertexIntr::Surface(si) => si.hit.p,
            VertexIntr::Medium(mi) => mi.p,
        }
    }

    pub fn n(&self) -> Normal3f {
        match &self.intr {
            VertexIntr::Endpoint(ei) => ei.it.n,
            VertexIntr::Surface(si) => si.hit.n,
            VertexIntr::Medium(_) => Normal3f::zero(),
        }
    }

    pub fn ns(&self) -> Normal3f {
        match &self.intr {
            VertexIntr::Surface(si) => si.shading.n,
            _ => self.n(),
        }
    }

    pub fn interaction(&self) -> Interaction {
        match &self.intr {
            VertexIntr::Endpoint(ei) => ei.it.clone(),
            VertexIntr::Surface(si) => si.hit.clone(),
            VertexIntr::Medium(mi) => mi.as_interaction(),
        }
    }

    pub fn si(&self) -> Option<&SurfaceInteraction<'a>> {
        match &self.intr {
            VertexIntr::Surface(si) => Some(si),
            _ => None,
        }
    }

    fn ei(&self) -> Option<&EndpointInteraction<'a>> {
        match &self.intr {
            VertexIntr::Endpoint(ei) => Some(ei),
            _ => None,
        }
    }

    pub fn is_on_surface(&self) -> bool {
        self.n() != Normal3f::zero()
    }

    pub fn is_light(&self) -> bool {
        self.vtype == VertexType::Light
            || (self.vtype == VertexType::Surface
                && self
                    .si()
                    .and_then(|si| si.primitive)
                    .map_or(false, |p| p.area_light().is_some()))
    }

    pub fn is_delta_light(&self) -> bool {
        self.vtype == VertexType::Light
            && self
                .ei()
                .and_then(|ei| ei.light)
                .map_or(false, |l| l.is_delta())
    }

    /// Environment endpoint: a light vertex with no backing light, or one
    /// backed by an infinite light.
    pub fn is_ibl(&self) -> bool {
        self.vtype == VertexType::Light
            && self
                .ei()
                .map_or(false, |ei| ei.light.map_or(true, |l| l.is_infinite()))
    }

    pub fn is_connectible(&self) -> bool {
        match self.vtype {
            VertexType::Medium | VertexType::Light | VertexType::Camera => true,
            VertexType::Surface => self.si().map_or(false, |si| {
                si.bsdf.as_ref().map_or(false, |b| {
                    b.num_components(
                        BxDFType::BSDF_DIFFUSE
                            | BxDFType::BSDF_GLOSSY
                            | BxDFType::BSDF_REFLECTION
                            | BxDFType::BSDF_TRANSMISSION,
                    ) > 0
                })
            }),
        }
    }

    /// Emitted radiance towards `v` if this vertex lies on a light.
    pub fn le(&self, scene: &Scene, v: &Vertex<'_>) -> Spectrum {
        if !self.is_light() && !self.is_ibl() {
            return Spectrum::black();
        }
        let w = v.p() - self.p();
        if w.length_squared() == 0.0 {
            return Spectrum::black();
        }
        let w = w.normalize();
        if self.is_ibl() {
            let ray = Ray::new(self.p(), -w);
            let mut ret = Spectrum::black();
            for light in &scene.lights {
                ret += light.le(&ray);
            }
            ret
        } else {
            match self.si().and_then(|si| si.primitive) {
                Some(prim) => match prim.area_light() {
                    Some(light) => light.l(&self.interaction(), &w),
                    None => Spectrum::black(),
                },
                None => self
                    .ei()
                    .and_then(|ei| ei.light)
                    .map(|l| l.l(&self.interaction(), &w))
                    .unwrap_or_else(Spectrum::black),
            }
        }
    }

    /// Scattering value towards `next`.
    pub fn f(&self, next: &Vertex<'_>) -> Spectrum {
        let wi = next.p() - self.p();
        if wi.length_squared() == 0.0 {
            return Spectrum::black();
        }
        let wi = wi.normalize();
        match &self.intr {
            VertexIntr::Surface(si) => match &si.bsdf {
                Some(bsdf) => bsdf.f(&si.hit.wo, &wi, BxDFType::all()),
                None => Spectrum::black(),
            },
            VertexIntr::Medium(mi) => Spectrum::grey(mi.phase.p(&mi.wo, &wi)),
            VertexIntr::Endpoint(_) => Spectrum::black(),
        }
    }

    /// Convert a solid-angle pdf at this vertex to an area pdf at `next`.
    pub fn convert_density(&self, pdf: f32, next: &Vertex<'_>) -> f32 {
        if next.is_ibl() {
            return pdf;
        }
        let w = next.p() - self.p();
        let dist2 = w.length_squared();
        if dist2 == 0.0 {
            return 0.0;
        }
        let inv_dist2 = 1.0 / dist2;
        let mut pdf = pdf * inv_dist2;
        if next.is_on_surface() {
            pdf *= next.n().dot(&(w * inv_dist2.sqrt())).abs();
        }
        pdf
    }

    /// Area pdf of reaching `next` from this vertex, coming from `prev`.
    pub fn pdf(
        &self,
        scene: &Scene,
        prev: Option<&Vertex<'_>>,
        next: &Vertex<'_>,
    ) -> f32 {
        if self.vtype == VertexType::Light {
            return self.pdf_light(scene, next);
        }

        let wn = next.p() - self.p();
        if wn.length_squared() == 0.0 {
            return 0.0;
        }
        let wn = wn.normalize();
        let wp = match prev {
            Some(prev) => {
                let wp = prev.p() - self.p();
                if wp.length_squared() == 0.0 {
                    return 0.0;
                }
                wp.normalize()
            }
            None => {
                debug_assert!(self.vtype == VertexType::Camera);
                Vector3f::zero()
            }
        };

        let pdf = match &self.intr {
            VertexIntr::Endpoint(ei) => match ei.camera {
                Some(camera) => {
                    let ray = self.interaction().spawn_ray(&wn);
                    camera.pdf_we(&ray).1
                }
                None => 0.0,
            },
            VertexIntr::Surface(si) => si
                .bsdf
                .as_ref()
                .map_or(0.0, |b| b.pdf(&wp, &wn, BxDFType::all())),
            VertexIntr::Medium(mi) => mi.phase.p(&wp, &wn),
        };

        self.convert_density(pdf, next)
    }

    /// Area pdf of this light vertex emitting towards `v`.
    pub fn pdf_light(&self, scene: &Scene, v: &Vertex<'_>) -> f32 {
        let w = v.p() - self.p();
        let inv_dist2 = 1.0 / w.length_squared();
        let w = w * inv_dist2.sqrt();

        let mut pdf = if self.is_ibl() {
            let (_, world_radius) = scene.world_bound().bounding_sphere();
            1.0 / (PI * world_radius * world_radius)
        } else {
            let light_arc;
            let light: &dyn Light = match self.vtype {
                VertexType::Light => match self.ei().and_then(|ei| ei.light) {
                    Some(l) => l,
                    None => return 0.0,
                },
                _ => {
                    light_arc = match self
                        .si()
                        .and_then(|si| si.primitive)
                        .and_then(|p| p.area_light())
                    {
                        Some(l) => l,
                        None => return 0.0,
                    };
                    light_arc.as_ref()
                }
            };
            let ray = Ray::new(self.p(), w);
            let (_pdf_pos, pdf_dir) = light.pdf_le(&ray, &self.n());
            pdf_dir * inv_dist2
        };
        if v.is_on_surface() {
            pdf *= v.n().dot(&w).abs();
        }
        pdf
    }

    /// Probability of this light vertex being chosen as a subpath origin.
    pub fn pdf_light_origin(
        &self,
        scene: &Scene,
        v: &Vertex<'_>,
        light_dist: &Distribution1D,
    ) -> f32 {
        let w = v.p() - self.p();
        if w.length_squared() == 0.0 {
            return 0.0;
        }
        let w = w.normalize();
        if self.is_ibl() {
            return density_ibl(scene, light_dist, &w);
        }
        let light_arc;
        let light: &dyn Light = match self.vtype {
            VertexType::Light => match self.ei().and_then(|ei| ei.light) {
                Some(l) => l,
                None => return 0.0,
            },
            _ => {
                light_arc = match self
                    .si()
                    .and_then(|si| si.primitive)
                    .and_then(|p| p.area_light())
                {
                    Some(l) => l,
                    None => return 0.0,
                };
                light_arc.as_ref()
            }
        };
        let index = scene.lights.iter().position(|l| l.id() == light.id());
        let pdf_choice = match index {
            Some(i) => light_dist.pdf_discrete(i),
            // A light appearing on a path but missing from the scene is a
            // scene inconsistency
            None => panic!("light on path is not part of the scene"),
        };
        let ray = Ray::new(self.p(), w);
        let (pdf_pos, _pdf_dir) = light.pdf_le(&ray, &self.n());
        pdf_pos * pdf_choice
    }
}

/// Density of sampling direction `w` from the scene's infinite lights.
pub fn density_ibl(scene: &Scene, light_dist: &Distribution1D, w: &Vector3f) -> f32 {
    let mut pdf = 0.0;
    let re = Interaction::default();
    for (i, light) in scene.lights.iter().enumerate() {
        if light.is_infinite() {
            pdf += light.pdf_li(&re, &-(*w)) * light_dist.pdf_discrete(i);
        }
    }
    pdf
}

/// Geometry term between two vertices, including transmittance.
pub fn g(scene: &Scene, sampler: &mut dyn Sampler, v0: &Vertex<'_>, v1: &Vertex<'_>) -> Spectrum {
    let d = v0.p() - v1.p();
    let mut geom = 1.0 / d.length_squared();
    let d = d * geom.sqrt();
    if v0.is_on_surface() {
        geom *= v0.ns().dot(&d).abs();
    }
    if v1.is_on_surface() {
        geom *= v1.ns().dot(&d).abs();
    }
    let vis = VisibilityTester::new(v0.interaction(), v1.interaction());
    vis.transmittance(scene, sampler) * geom
}

/// Extend a subpath by random walk, appending up to `max_depth` vertices.
pub fn random_walk<'a>(
    scene: &'a Scene,
    ray: Ray,
    sampler: &mut dyn Sampler,
    beta: Spectrum,
    pdf: f32,
    max_depth: usize,
    mode: TransportMode,
    path: &mut Vec<Vertex<'a>>,
) -> usize {
    if max_depth == 0 {
        return 0;
    }
    let mut ray = ray;
    let mut beta = beta;
    let mut bounces = 0usize;
    let mut pdf_fwd = pdf;
    let mut pdf_rev;

    loop {
        let mut current = ray.clone();
        let isect = scene.intersect(&mut current);

        // Sample the medium the ray travels in, if any
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
            let prev_idx = path.len() - 1;
            let vertex = Vertex::create_medium(mi.clone(), beta, pdf_fwd, &path[prev_idx]);
            path.push(vertex);
            bounces += 1;
            if bounces >= max_depth {
                break;
            }

            let (p, wi) = mi.phase.sample_p(&mi.wo, &sampler.get_2d());
            pdf_fwd = p;
            pdf_rev = p;
            ray = mi.spawn_ray(&wi);

            let conv = path[prev_idx + 1].convert_density(pdf_rev, &path[prev_idx]);
            path[prev_idx].pdf_rev = conv;
        } else {
            let mut isect = match isect {
                Some(isect) => isect,
                None => {
                    // Camera subpaths keep escaped rays as environment
                    // endpoints so s = 0 strategies can pick them up
                    if mode == TransportMode::Radiance {
                        let v = Vertex::create_light(
                            EndpointInteraction::from_escaped_ray(&current),
                            beta,
                            pdf_fwd,
                        );
                        path.push(v);
                        bounces += 1;
                    }
                    break;
                }
            };

            isect.compute_scattering_functions(&current, mode, true);
            if isect.bsdf.is_none() {
                // Medium boundary; walk through without a vertex
                ray = isect.hit.spawn_ray(&current.d);
                continue;
            }

            let prev_idx = path.len() - 1;
            let vertex = Vertex::create_surface(isect.clone(), beta, pdf_fwd, &path[prev_idx]);
            path.push(vertex);
            bounces += 1;
            if bounces >= max_depth {
                break;
            }

            let bsdf = isect.bsdf.as_ref().unwrap();
            let wo = isect.hit.wo;
            let (f, wi, fwd, sampled_type) =
                bsdf.sample_f(&wo, &sampler.get_2d(), BxDFType::all());
            if f.is_black() || fwd == 0.0 {
                break;
            }
            pdf_fwd = fwd;
            beta *= f * wi.abs_dotn(&isect.shading.n) / pdf_fwd;
            pdf_rev = bsdf.pdf(&wi, &wo, BxDFType::all());
            if sampled_type.contains(BxDFType::BSDF_SPECULAR) {
                path[prev_idx + 1].delta = true;
                pdf_fwd = 0.0;
                pdf_rev = 0.0;
            }
            ray = isect.spawn_ray(&wi);

            let conv = path[prev_idx + 1].convert_density(pdf_rev, &path[prev_idx]);
            path[prev_idx].pdf_rev = conv;
        }
    }
    bounces
}

/// Build the camera subpath. Returns the number of vertices appended.
pub fn generate_camera_subpath<'a>(
    scene: &'a Scene,
    sampler: &mut dyn Sampler,
    max_depth: usize,
    camera: &'a dyn Camera,
    pixel: &Point2i,
    rand_film: &Point2f,
    path: &mut Vec<Vertex<'a>>,
) -> usize {
    if max_depth == 0 {
        return 0;
    }
    let rand_lens = sampler.get_2d();
    let ray = camera.spawn_ray(pixel, rand_film, &rand_lens);
    let beta = Spectrum::white();

    path.push(Vertex::create_camera_from_ray(camera, &ray, beta));
    let (_pdf_pos, pdf_dir) = camera.pdf_we(&ray);
    random_walk(
        scene,
        ray,
        sampler,
        beta,
        pdf_dir,
        max_depth - 1,
        TransportMode::Radiance,
        path,
    ) + 1
}

/// Build the light subpath. Returns the number of vertices appended.
pub fn generate_light_subpath<'a>(
    scene: &'a Scene,
    sampler: &mut dyn Sampler,
    max_depth: usize,
    light_dist: &Distribution1D,
    path: &mut Vec<Vertex<'a>>,
) -> usize {
    if max_depth == 0 || scene.lights.is_empty() {
        return 0;
    }

    // Choose a light by power and sample an emitted ray
    let (light_id, light_pdf) = light_dist.sample_discrete(sampler.get_1d());
    let light = &scene.lights[light_id];

    let u1 = sampler.get_2d();
    let u2 = sampler.get_2d();
    let le_sample = light.sample_le(&u1, &u2);
    if le_sample.pdf_pos == 0.0 || le_sample.pdf_dir == 0.0 || le_sample.le.is_black() {
        return 0;
    }

    let ray = le_sample.ray.clone();
    path.push(Vertex::create_light(
        EndpointInteraction::from_light(light.as_ref(), &ray, le_sample.n_light),
        le_sample.le,
        le_sample.pdf_pos * light_pdf,
    ));
    let beta = le_sample.le * ray.d.abs_dotn(&le_sample.n_light)
        / (light_pdf * le_sample.pdf_pos * le_sample.pdf_dir);

    let start = path.len() - 1;
    let bounces = random_walk(
        scene,
        ray.clone(),
        sampler,
        beta,
        le_sample.pdf_dir,
        max_depth - 1,
        TransportMode::Importance,
        path,
    );

    // Correct the densities of environment-light subpaths
    if path[start].is_ibl() {
        if bounces > 0 {
            path[start + 1].pdf_fwd = le_sample.pdf_pos;
            if path[start + 1].is_on_surface() {
                let cos = ray.d.dotn(&path[start + 1].n()).abs();
                path[start + 1].pdf_fwd *= cos;
            }
        }
        path[start].pdf_fwd = density_ibl(scene, light_dist, &ray.d);
    }

    bounces + 1
}

fn remap0(f: f32) -> f32 {
    if f != 0.0 {
        f
    } else {
        1.0
    }
}

/// Balance-style MIS weight over every strategy producing a path of the same
/// length. Vertices are temporarily rewritten (reverse pdfs, delta flags,
/// and the `sampled` stand-in) and restored before returning.
#[allow(clippy::too_many_arguments)]
pub fn calc_mis_weight<'a>(
    scene: &Scene,
    light_path: &mut [Vertex<'a>],
    camera_path: &mut [Vertex<'a>],
    sampled: Option<&Vertex<'a>>,
    s: usize,
    t: usize,
    light_dist: &Distribution1D,
) -> f32 {
    if s + t == 2 {
        return 1.0;
    }

    // Back up everything the scoped reassignments touch
    let backup_light: Vec<(usize, Vertex<'a>)> = (s.saturating_sub(2)..s)
        .map(|i| (i, light_path[i].clone()))
        .collect();
    let backup_camera: Vec<(usize, Vertex<'a>)> = (t.saturating_sub(2)..t)
        .map(|i| (i, camera_path[i].clone()))
        .collect();

    // Swap in the vertex sampled by the connection strategy
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

    // Reverse pdfs at the junction, seen from the other subpath
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

    // Walk both subpaths accumulating the ratio of strategy densities
    let mut sum_ri = 0.0;
    let mut ri = 1.0;
    for i in (1..t).rev() {
        ri *= remap0(camera_path[i].pdf_rev) / remap0(camera_path[i].pdf_fwd);
        if camera_path[i].delta || camera_path[i - 1].delta {
            continue;
        }
        sum_ri += ri;
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
        sum_ri += ri;
    }

    // Restore the original vertices
    for (i, v) in backup_light {
        light_path[i] = v;
    }
    for (i, v) in backup_camera {
        camera_path[i] = v;
    }

    1.0 / (1.0 + sum_ri)
}

/// Join light-subpath prefix `s` with camera-subpath prefix `t`.
///
/// For `t == 1` the contribution lands at `p_raster` rather than the pixel
/// that spawned the camera subpath.
#[allow(clippy::too_many_arguments)]
pub fn connect_bdpt<'a>(
    scene: &'a Scene,
    light_path: &mut [Vertex<'a>],
    camera_path: &mut [Vertex<'a>],
    s: usize,
    t: usize,
    light_dist: &Distribution1D,
    camera: &'a dyn Camera,
    sampler: &mut dyn Sampler,
    p_raster: &mut Point2f,
    mis_weight_out: Option<&mut f32>,
) -> Spectrum {
    // Camera subpaths that stumbled onto a light are handled by s = 0 only
    if t > 1 && s != 0 && camera_path[t - 1].vtype == VertexType::Light {
        return Spectrum::black();
    }

    let (mut l, sampled) = connect_bdpt_strategies(
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

    let mis_weight = if l.is_black() {
        0.0
    } else {
        calc_mis_weight(
            scene,
            light_path,
            camera_path,
            sampled.as_ref(),
            s,
            t,
            light_dist,
        )
    };
    debug_assert!(!mis_weight.is_nan(), "invalid MIS weight");

    l *= mis_weight;
    if let Some(out) = mis_weight_out {
        *out = mis_weight;
    }
    l
}

/// Unweighted contribution of one `(s, t)` strategy plus the vertex it
/// sampled, shared between plain BDPT and VCM.
#[allow(clippy::too_many_arguments)]
pub fn connect_bdpt_strategies<'a>(
    scene: &'a Scene,
    light_path: &[Vertex<'a>],
    camera_path: &[Vertex<'a>],
    s: usize,
    t: usize,
    light_dist: &Distribution1D,
    camera: &'a dyn Camera,
    sampler: &mut dyn Sampler,
    p_raster: &mut Point2f,
) -> (Spectrum, Option<Vertex<'a>>) {
    let mut sampled: Option<Vertex<'a>> = None;
    let mut l = Spectrum::black();

    if s == 0 {
        // The camera subpath already carries the full path
        let vc = &camera_path[t - 1];
        if vc.is_light() || vc.is_ibl() {
            l = vc.le(scene, &camera_path[t - 2]) * vc.beta;
        }
    } else if t == 1 {
        // Connect the light subpath directly to the camera
        let vl = &light_path[s - 1];
        if vl.is_connectible() {
            if let Some(wi_sample) = camera.sample_wi(&vl.interaction(), &sampler.get_2d()) {
                if wi_sample.pdf > 0.0 && !wi_sample.we.is_black() {
                    *p_raster = wi_sample.p_raster;
                    let new_vertex = Vertex::create_camera_from_interaction(
                        camera,
                        wi_sample.vis.p1.clone(),
                        wi_sample.we / wi_sample.pdf,
                    );
                    l = vl.beta * vl.f(&new_vertex) * new_vertex.beta;
                    if vl.is_on_surface() {
                        l *= wi_sample.wi.dotn(&vl.ns()).abs();
                    }
                    if !l.is_black() {
                        l *= wi_sample.vis.transmittance(scene, sampler);
                    }
                    sampled = Some(new_vertex);
                }
            }
        }
    } else if s == 1 {
        // Direct-illumination connection to a freshly sampled light point
        let vc = &camera_path[t - 1];
        if vc.is_connectible() {
            let (light_id, light_pdf) = light_dist.sample_discrete(sampler.get_1d());
            let light = &scene.lights[light_id];
            let li_sample = light.sample_li(&vc.interaction(), &sampler.get_2d());
            if li_sample.pdf > 0.0 && !li_sample.li.is_black() {
                let ei = EndpointInteraction::from_light_interaction(
                    light.as_ref(),
                    li_sample.vis.p1.clone(),
                );
                let mut new_vertex = Vertex::create_light(
                    ei,
                    li_sample.li / (li_sample.pdf * light_pdf),
                    0.0,
                );
                new_vertex.pdf_fwd = new_vertex.pdf_light_origin(scene, vc, light_dist);
                l = vc.beta * vc.f(&new_vertex) * new_vertex.beta;
                if vc.is_on_surface() {
                    l *= li_sample.wi.dotn(&vc.ns()).abs();
                }
                if !l.is_black() {
                    l *= li_sample.vis.transmittance(scene, sampler);
                }
                sampled = Some(new_vertex);
            }
        }
    } else {
        // Ordinary join between the two subpath ends
        let vc = &camera_path[t - 1];
        let vl = &light_path[s - 1];
        if vc.is_connectible() && vl.is_connectible() {
            l = vc.beta * vc.f(vl) * vl.f(vc) * vl.beta;
            if !l.is_black() {
                l *= g(scene, sampler, vl, vc);
            }
        }
    }

    (l, sampled)
}

/// Bidirectional path tracer over all `(s, t)` strategies.
pub struct BdptIntegrator {
    pub sampler: Box<dyn Sampler>,
}

impl BdptIntegrator {
    pub fn new(sampler: Box<dyn Sampler>) -> BdptIntegrator {
        BdptIntegrator { sampler }
    }
}

impl Integrator for BdptIntegrator {
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
        let n_threads = num_system_threads();
        let seed = base_seed(params);

        let light_dist = match calc_light_power_distrib(scene) {
            Some(d) => d,
            None => {
                info!("No lights in scene; image stays black");
                return Ok(());
            }
        };

        info!("BDPT: {} iterations, maxDepth {}", num_samples, max_depth);
        let mut samplers: Vec<Mutex<Box<dyn Sampler>>> = Vec::new();
        for i in 0..num_samples {
            if i % n_threads == 0 {
                samplers = (0..n_threads)
                    .map(|t| Mutex::new(self.sampler.clone_seeded(seed + i as u64 + t as u64)))
                    .collect();
            }

            let samplers_ref = &samplers;
            let light_dist_ref = &light_dist;
            parallel_for(0, num_pixels, |pid| {
                let tid = thread_id();
                let mut sampler = samplers_ref[tid].lock();
                let sampler = sampler.as_mut();
                sampler.start_pixel();

                let x = (pid % width) as i32;
                let y = (pid / width) as i32;
                let rand_film = sampler.get_2d();

                let mut camera_path: Vec<Vertex<'_>> = Vec::with_capacity(max_depth + 2);
                let mut light_path: Vec<Vertex<'_>> = Vec::with_capacity(max_depth + 1);
                let n_camera = generate_camera_subpath(
                    scene,
                    sampler,
                    max_depth + 2,
                    camera,
                    &Point2i::new(x, y),
                    &rand_film,
                    &mut camera_path,
                );
                let n_light = generate_light_subpath(
                    scene,
                    sampler,
                    max_depth + 1,
                    light_dist_ref,
                    &mut light_path,
                );

                let mut l = Spectrum::black();
                for t in 1..=n_camera {
                    for s in 0..=n_light {
                        let depth = (t + s) as i32 - 2;
                        if (s == 1 && t == 1) || depth < 0 || depth > max_depth as i32 {
                            continue;
                        }
                        let mut p_film =
                            Point2f::new(x as f32 + rand_film.x, y as f32 + rand_film.y);
                        let l_path = connect_bdpt(
                            scene,
                            &mut light_path,
                            &mut camera_path,
                            s,
                            t,
                            light_dist_ref,
                            camera,
                            sampler,
                            &mut p_film,
                            None,
                        );
                        if t == 1 {
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
                    &Point2f::new(pixel.x as f32 + rand_film.x, pixel.y as f32 + rand_film.y),
                    l,
                );
            });

            camera.film().save_scaled(i as u32 + 1, 1.0 / (i as f32 + 1.0))?;
        }
        Ok(())
    }
}
