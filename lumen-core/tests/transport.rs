//! Direct-lighting estimator and transmittance checks against analytic
//! values.

use std::sync::Arc;

use lumen_core::geometry::{Point2, Point3, Vector3};
use lumen_core::interaction::{Interaction, Intr, SurfaceInteraction};
use lumen_core::light::{AreaLight, Light, VisibilityTester};
use lumen_core::material::MatteMaterial;
use lumen_core::medium::{HomogeneousMedium, MediumInterface};
use lumen_core::mis::{estimate_direct, uniform_sample_one_light};
use lumen_core::primitive::{Aggregate, GeometricPrimitive, Primitive};
use lumen_core::sampler::{RandomSampler, Sampler};
use lumen_core::scene::Scene;
use lumen_core::shapes::{Shape, Sphere};
use lumen_core::spectrum::Spectrum;
use lumen_core::bsdf::{Bsdf, BxDf};

type Point2f = Point2<f32>;
type Point3f = Point3<f32>;
type Vector3f = Vector3<f32>;
type Normal3f = lumen_core::geometry::Normal3<f32>;

/// Scene with a single small spherical light above the origin.
fn sphere_light_scene(radius: f32, height: f32, emit: f32) -> (Scene, Arc<dyn Light>) {
    let light_shape: Arc<dyn Shape> =
        Arc::new(Sphere::new(Point3f::new(0.0, height, 0.0), radius));
    let light: Arc<dyn Light> =
        Arc::new(AreaLight::new(Spectrum::grey(emit), Arc::clone(&light_shape)));
    let primitives: Vec<Arc<dyn Primitive>> = vec![Arc::new(
        GeometricPrimitive::new(
            light_shape,
            Arc::new(MatteMaterial::constant(Spectrum::black())),
        )
        .with_light(Arc::clone(&light)),
    )];
    (
        Scene::new(Arc::new(Aggregate::new(primitives)), vec![Arc::clone(&light)]),
        light,
    )
}

/// A shading point at the origin with an upward Lambertian lobe.
fn shading_point(albedo: f32) -> SurfaceInteraction<'static> {
    let mut si = SurfaceInteraction::new(
        Point3f::new(0.0, 0.0, 0.0),
        Vector3f::new(1e-5, 1e-5, 1e-5),
        Point2f::new(0.0, 0.0),
        Vector3f::new(0.0, 1.0, 0.0),
        Vector3f::new(1.0, 0.0, 0.0),
        Vector3f::new(0.0, 0.0, 1.0),
        Normal3f::new(0.0, 0.0, 0.0),
        Normal3f::new(0.0, 0.0, 0.0),
        None,
    );
    si.hit.n = Normal3f::new(0.0, 1.0, 0.0);
    si.shading.n = si.hit.n;
    let mut bsdf = Bsdf::new(&si, 1.0);
    bsdf.add(BxDf::LambertianReflection {
        r: Spectrum::grey(albedo),
    });
    si.bsdf = Some(bsdf);
    si
}

#[test]
fn estimate_direct_matches_analytic_sphere_light() {
    // Small sphere source straight above a Lambertian point:
    // Lo = rho * L * (r/d)^2
    let (radius, height, emit, albedo) = (0.1f32, 2.0f32, 10.0f32, 0.6f32);
    let (scene, light) = sphere_light_scene(radius, height, emit);
    let si = shading_point(albedo);

    let mut sampler = RandomSampler::new(1, 7);
    let n = 40_000;
    let mut sum = Spectrum::black();
    for _ in 0..n {
        let rand_shade = sampler.get_2d();
        let rand_light = sampler.get_2d();
        sum += estimate_direct(
            &Intr::Surface(&si),
            &rand_shade,
            light.as_ref(),
            &rand_light,
            &scene,
            &mut sampler,
            false,
            false,
        );
    }
    let mean = sum.gray() / n as f32;
    let expected = albedo * emit * (radius / height) * (radius / height);
    let rel = (mean - expected).abs() / expected;
    assert!(
        rel < 0.03,
        "estimate {} vs analytic {} (rel {})",
        mean,
        expected,
        rel
    );
}

#[test]
fn uniform_sample_one_light_matches_estimate_direct_single_light() {
    // With a single light in the scene the two must agree in expectation.
    let (scene, light) = sphere_light_scene(0.2, 3.0, 5.0);
    let si = shading_point(0.5);

    let n = 20_000;
    let mut sampler = RandomSampler::new(1, 3);
    let mut sum_one = Spectrum::black();
    for _ in 0..n {
        sum_one += uniform_sample_one_light(&Intr::Surface(&si), &scene, &mut sampler, false);
    }
    let mut sampler = RandomSampler::new(1, 4);
    let mut sum_direct = Spectrum::black();
    for _ in 0..n {
        let rand_shade = sampler.get_2d();
        let rand_light = sampler.get_2d();
        sum_direct += estimate_direct(
            &Intr::Surface(&si),
            &rand_shade,
            light.as_ref(),
            &rand_light,
            &scene,
            &mut sampler,
            false,
            false,
        );
    }
    let a = sum_one.gray() / n as f32;
    let b = sum_direct.gray() / n as f32;
    let rel = (a - b).abs() / b.max(1e-8);
    assert!(rel < 0.05, "{} vs {} (rel {})", a, b, rel);
}

#[test]
fn transmittance_through_homogeneous_sphere() {
    // A medium-filled unit sphere between two points attenuates by
    // exp(-sigma_t * chord).
    let sigma_t = 1.0f32;
    let medium = Arc::new(HomogeneousMedium::new(
        Spectrum::grey(0.1 * sigma_t),
        Spectrum::grey(0.9 * sigma_t),
        1.0,
        0.0,
    ));
    let boundary: Arc<dyn Shape> = Arc::new(Sphere::new(Point3f::new(0.0, 0.0, 0.0), 1.0));
    let primitives: Vec<Arc<dyn Primitive>> = vec![Arc::new(GeometricPrimitive {
        shape: boundary,
        material: None,
        light: None,
        medium_interface: MediumInterface::interior(medium),
    })];
    let scene = Scene::new(Arc::new(Aggregate::new(primitives)), Vec::new());

    let p0 = Interaction::from_point(&Point3f::new(0.0, 0.0, -3.0));
    let p1 = Interaction::from_point(&Point3f::new(0.0, 0.0, 3.0));
    let vis = VisibilityTester::new(p0, p1);
    let mut sampler = RandomSampler::new(1, 9);
    let tr = vis.transmittance(&scene, &mut sampler);

    // Chord through the unit sphere has length 2
    let expected = (-2.0f32 * sigma_t).exp();
    assert!(
        (tr.gray() - expected).abs() / expected < 0.01,
        "tr = {} expected {}",
        tr,
        expected
    );
}
