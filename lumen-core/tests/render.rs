//! End-to-end renders of small scenes, checked against analytic values.

use std::sync::Arc;

use lumen_core::camera::{Camera, PerspectiveCamera};
use lumen_core::film::Film;
use lumen_core::filter::BoxFilter;
use lumen_core::integrator::{
    BdptIntegrator, DirectLightingIntegrator, Integrator, PathIntegrator, SamplerRenderer,
};
use lumen_core::light::{AreaLight, Envmap, Light};
use lumen_core::material::{Material, MatteMaterial};
use lumen_core::primitive::{Aggregate, GeometricPrimitive, Primitive};
use lumen_core::renderparams::RenderParams;
use lumen_core::sampler::{RandomSampler, Sampler};
use lumen_core::scene::Scene;
use lumen_core::shapes::{Quad, Shape, Sphere};
use lumen_core::spectrum::Spectrum;
use lumen_core::transform::Transform;
use lumen_core::geometry::{Point2, Point3, Vector3};

type Point2i = Point2<i32>;
type Point3f = Point3<f32>;
type Vector3f = Vector3<f32>;

fn memory_film(size: i32) -> Film {
    Film::new(Point2i::new(size, size), Box::new(BoxFilter::new(0.5, 0.5)), "")
}

fn params(spp: i32, max_depth: i32) -> RenderParams {
    let mut p = RenderParams::new();
    p.set_int("sampleCount", spp);
    p.set_int("maxDepth", max_depth);
    p.set_int("seed", 12_345);
    p
}

/// Grey sphere under a constant unit environment: every sphere pixel
/// converges to the albedo.
fn furnace_scene(size: i32) -> (PerspectiveCamera, Scene) {
    let mut primitives: Vec<Arc<dyn Primitive>> = Vec::new();
    primitives.push(Arc::new(GeometricPrimitive::new(
        Arc::new(Sphere::new(Point3f::new(0.0, 0.0, 0.0), 1.0)),
        Arc::new(MatteMaterial::constant(Spectrum::grey(0.5))),
    )));
    let env: Arc<dyn Light> = Arc::new(Envmap::constant(Spectrum::white()));
    let scene = Scene::new(Arc::new(Aggregate::new(primitives)), vec![env]);

    let c2w = Transform::look_at(
        &Point3f::new(0.0, 0.0, -4.0),
        &Point3f::new(0.0, 0.0, 0.0),
        &Vector3f::new(0.0, 1.0, 0.0),
    );
    let camera = PerspectiveCamera::new(c2w, 30.0, 0.0, 1e6, memory_film(size));
    (camera, scene)
}

/// Small closed box: grey walls and a quad light at the ceiling.
fn tiny_box_scene(size: i32) -> (PerspectiveCamera, Scene) {
    let mut primitives: Vec<Arc<dyn Primitive>> = Vec::new();
    let mut lights: Vec<Arc<dyn Light>> = Vec::new();
    let white: Arc<dyn Material> = Arc::new(MatteMaterial::constant(Spectrum::grey(0.7)));

    let walls: Vec<Arc<dyn Shape>> = vec![
        // floor
        Arc::new(Quad::new(
            Point3f::new(-1.0, -1.0, -1.0),
            Vector3f::new(2.0, 0.0, 0.0),
            Vector3f::new(0.0, 0.0, 2.0),
        )),
        // ceiling
        Arc::new(Quad::new(
            Point3f::new(-1.0, 1.0, -1.0),
            Vector3f::new(0.0, 0.0, 2.0),
            Vector3f::new(2.0, 0.0, 0.0),
        )),
        // back
        Arc::new(Quad::new(
            Point3f::new(-1.0, -1.0, 1.0),
            Vector3f::new(2.0, 0.0, 0.0),
            Vector3f::new(0.0, 2.0, 0.0),
        )),
        // left
        Arc::new(Quad::new(
            Point3f::new(-1.0, -1.0, -1.0),
            Vector3f::new(0.0, 0.0, 2.0),
            Vector3f::new(0.0, 2.0, 0.0),
        )),
        // right
        Arc::new(Quad::new(
            Point3f::new(1.0, -1.0, -1.0),
            Vector3f::new(0.0, 2.0, 0.0),
            Vector3f::new(0.0, 0.0, 2.0),
        )),
    ];
    for shape in walls {
        primitives.push(Arc::new(GeometricPrimitive::new(shape, Arc::clone(&white))));
    }

    let light_shape: Arc<dyn Shape> = Arc::new(Quad::new(
        Point3f::new(-0.3, 0.98, -0.3),
        Vector3f::new(0.6, 0.0, 0.0),
        Vector3f::new(0.0, 0.0, 0.6),
    ));
    let area_light: Arc<dyn Light> = Arc::new(AreaLight::new(
        Spectrum::grey(10.0),
        Arc::clone(&light_shape),
    ));
    primitives.push(Arc::new(
        GeometricPrimitive::new(
            light_shape,
            Arc::new(MatteMaterial::constant(Spectrum::black())) as Arc<dyn Material>,
        )
        .with_light(Arc::clone(&area_light)),
    ));
    lights.push(area_light);

    let scene = Scene::new(Arc::new(Aggregate::new(primitives)), lights);
    let c2w = Transform::look_at(
        &Point3f::new(0.0, 0.0, -0.95),
        &Point3f::new(0.0, 0.0, 0.0),
        &Vector3f::new(0.0, 1.0, 0.0),
    );
    let camera = PerspectiveCamera::new(c2w, 60.0, 0.0, 1e6, memory_film(size));
    (camera, scene)
}

fn mean_of_center(image: &[Spectrum], size: usize, margin: usize) -> f32 {
    let mut sum = 0.0;
    let mut count = 0;
    for y in margin..size - margin {
        for x in margin..size - margin {
            sum += image[y * size + x].gray();
            count += 1;
        }
    }
    sum / count as f32
}

#[test]
fn furnace_test_converges_to_albedo() {
    let size = 24;
    let (camera, scene) = furnace_scene(size);
    let sampler: Box<dyn Sampler> = Box::new(RandomSampler::new(1, 0));
    let mut renderer = SamplerRenderer::new(PathIntegrator::surface_only(), sampler);
    renderer
        .render(&camera, &scene, &params(48, 8))
        .expect("render");

    // The centre of the image sees only the sphere
    let image = camera.film().snapshot(1.0);
    let mean = mean_of_center(&image, size as usize, size as usize / 3);
    assert!(
        (mean - 0.5).abs() < 0.02,
        "furnace mean = {}, expected 0.5",
        mean
    );
}

#[test]
fn direct_lighting_matches_path_on_single_bounce() {
    // With maxDepth = 1 a path tracer only does direct lighting, so the two
    // integrators estimate the same quantity.
    let size = 12;
    let (camera_a, scene) = tiny_box_scene(size);
    let sampler: Box<dyn Sampler> = Box::new(RandomSampler::new(1, 0));
    let mut path = SamplerRenderer::new(PathIntegrator::surface_only(), sampler.clone_seeded(1));
    path.render(&camera_a, &scene, &params(64, 1)).expect("render");
    let path_mean = mean_of_center(&camera_a.film().snapshot(1.0), size as usize, 1);

    let (camera_b, scene) = tiny_box_scene(size);
    let mut direct = SamplerRenderer::new(DirectLightingIntegrator::new(), sampler.clone_seeded(2));
    direct
        .render(&camera_b, &scene, &params(64, 1))
        .expect("render");
    let direct_mean = mean_of_center(&camera_b.film().snapshot(1.0), size as usize, 1);

    let rel = (path_mean - direct_mean).abs() / direct_mean.max(1e-6);
    assert!(
        rel < 0.05,
        "path {} vs direct {} differ by {}",
        path_mean,
        direct_mean,
        rel
    );
}

#[test]
fn bdpt_agrees_with_path_tracer() {
    let size = 12;
    let spp = 96;
    let (camera_a, scene) = tiny_box_scene(size);
    let sampler: Box<dyn Sampler> = Box::new(RandomSampler::new(1, 0));
    let mut path = SamplerRenderer::new(PathIntegrator::surface_only(), sampler.clone_seeded(1));
    path.render(&camera_a, &scene, &params(spp, 4)).expect("render");
    let path_mean = mean_of_center(&camera_a.film().snapshot(1.0), size as usize, 1);

    let (camera_b, scene) = tiny_box_scene(size);
    let mut bdpt = BdptIntegrator::new(sampler.clone_seeded(2));
    bdpt.render(&camera_b, &scene, &params(spp, 4)).expect("render");
    let bdpt_mean = mean_of_center(
        &camera_b.film().snapshot(1.0 / spp as f32),
        size as usize,
        1,
    );

    let rel = (path_mean - bdpt_mean).abs() / path_mean.max(1e-6);
    assert!(
        rel < 0.1,
        "path {} vs bdpt {} differ by {}",
        path_mean,
        bdpt_mean,
        rel
    );
}
