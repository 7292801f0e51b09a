//! Built-in test scenes; scene file parsing is out of scope, so the classic
//! setups are assembled in code.

use std::sync::Arc;

use lumen_core::camera::{Camera, PerspectiveCamera};
use lumen_core::film::Film;
use lumen_core::filter::GaussianFilter;
use lumen_core::geometry::{Point2, Point3, Vector3};
use lumen_core::light::{AreaLight, Envmap, Light, PointLight};
use lumen_core::material::{GlassMaterial, Material, MatteMaterial, MirrorMaterial};
use lumen_core::medium::{HomogeneousMedium, MediumInterface};
use lumen_core::primitive::{Aggregate, GeometricPrimitive, Primitive};
use lumen_core::scene::Scene;
use lumen_core::shapes::{Quad, Shape, Sphere};
use lumen_core::spectrum::Spectrum;
use lumen_core::transform::Transform;

type Point2i = Point2<i32>;
type Point3f = Point3<f32>;
type Vector3f = Vector3<f32>;

fn film(size: i32, output: &str) -> Film {
    Film::new(
        Point2i::new(size, size),
        Box::new(GaussianFilter::new(2.0, 2.0, 2.0)),
        output,
    )
}

fn cornell_walls(
    primitives: &mut Vec<Arc<dyn Primitive>>,
    lights: &mut Vec<Arc<dyn Light>>,
) {
    let white: Arc<dyn Material> = Arc::new(MatteMaterial::constant(Spectrum::grey(0.73)));
    let red: Arc<dyn Material> = Arc::new(MatteMaterial::constant(Spectrum::rgb(0.65, 0.05, 0.05)));
    let green: Arc<dyn Material> =
        Arc::new(MatteMaterial::constant(Spectrum::rgb(0.12, 0.45, 0.15)));

    // Floor, ceiling, back wall, left (red) and right (green) wall
    let walls: Vec<(Arc<dyn Shape>, Arc<dyn Material>)> = vec![
        (
            Arc::new(Quad::new(
                Point3f::new(0.0, 0.0, 0.0),
                Vector3f::new(0.0, 0.0, 559.2),
                Vector3f::new(556.0, 0.0, 0.0),
            )),
            Arc::clone(&white),
        ),
        (
            Arc::new(Quad::new(
                Point3f::new(0.0, 548.8, 0.0),
                Vector3f::new(556.0, 0.0, 0.0),
                Vector3f::new(0.0, 0.0, 559.2),
            )),
            Arc::clone(&white),
        ),
        (
            Arc::new(Quad::new(
                Point3f::new(0.0, 0.0, 559.2),
                Vector3f::new(0.0, 548.8, 0.0),
                Vector3f::new(556.0, 0.0, 0.0),
            )),
            Arc::clone(&white),
        ),
        (
            Arc::new(Quad::new(
                Point3f::new(556.0, 0.0, 0.0),
                Vector3f::new(0.0, 0.0, 559.2),
                Vector3f::new(0.0, 548.8, 0.0),
            )),
            Arc::clone(&red),
        ),
        (
            Arc::new(Quad::new(
                Point3f::new(0.0, 0.0, 0.0),
                Vector3f::new(0.0, 548.8, 0.0),
                Vector3f::new(0.0, 0.0, 559.2),
            )),
            Arc::clone(&green),
        ),
    ];
    for (shape, material) in walls {
        primitives.push(Arc::new(GeometricPrimitive::new(shape, material)));
    }

    // Ceiling light, slightly below the ceiling, facing down
    let light_shape: Arc<dyn Shape> = Arc::new(Quad::new(
        Point3f::new(213.0, 548.0, 227.0),
        Vector3f::new(130.0, 0.0, 0.0),
        Vector3f::new(0.0, 0.0, 105.0),
    ));
    let area_light: Arc<dyn Light> = Arc::new(AreaLight::new(
        Spectrum::rgb(17.0, 12.0, 4.0),
        Arc::clone(&light_shape),
    ));
    let light_material: Arc<dyn Material> = Arc::new(MatteMaterial::constant(Spectrum::black()));
    primitives.push(Arc::new(
        GeometricPrimitive::new(light_shape, light_material).with_light(Arc::clone(&area_light)),
    ));
    lights.push(area_light);
}

fn cornell_camera(size: i32, output: &str) -> Arc<dyn Camera> {
    let c2w = Transform::look_at(
        &Point3f::new(278.0, 273.0, -800.0),
        &Point3f::new(278.0, 273.0, 0.0),
        &Vector3f::new(0.0, 1.0, 0.0),
    );
    Arc::new(PerspectiveCamera::new(
        c2w,
        39.3,
        0.0,
        1e6,
        film(size, output),
    ))
}

/// The classic Cornell box with two matte spheres.
pub fn cornell_box(size: i32, output: &str) -> (Arc<dyn Camera>, Scene) {
    let mut primitives: Vec<Arc<dyn Primitive>> = Vec::new();
    let mut lights: Vec<Arc<dyn Light>> = Vec::new();
    cornell_walls(&mut primitives, &mut lights);

    let grey: Arc<dyn Material> = Arc::new(MatteMaterial::constant(Spectrum::grey(0.6)));
    primitives.push(Arc::new(GeometricPrimitive::new(
        Arc::new(Sphere::new(Point3f::new(185.0, 90.0, 170.0), 90.0)),
        Arc::clone(&grey),
    )));
    primitives.push(Arc::new(GeometricPrimitive::new(
        Arc::new(Sphere::new(Point3f::new(370.0, 120.0, 350.0), 120.0)),
        grey,
    )));

    let scene = Scene::new(Arc::new(Aggregate::new(primitives)), lights);
    (cornell_camera(size, output), scene)
}

/// Cornell box with a mirror and a glass sphere; caustics country.
pub fn cornell_box_glass(size: i32, output: &str) -> (Arc<dyn Camera>, Scene) {
    let mut primitives: Vec<Arc<dyn Primitive>> = Vec::new();
    let mut lights: Vec<Arc<dyn Light>> = Vec::new();
    cornell_walls(&mut primitives, &mut lights);

    primitives.push(Arc::new(GeometricPrimitive::new(
        Arc::new(Sphere::new(Point3f::new(185.0, 90.0, 170.0), 90.0)),
        Arc::new(MirrorMaterial::constant(Spectrum::grey(0.95))),
    )));
    primitives.push(Arc::new(GeometricPrimitive::new(
        Arc::new(Sphere::new(Point3f::new(370.0, 120.0, 350.0), 120.0)),
        Arc::new(GlassMaterial::constant(1.5)),
    )));

    let scene = Scene::new(Arc::new(Aggregate::new(primitives)), lights);
    (cornell_camera(size, output), scene)
}

/// A grey sphere lit by a unit-radiance environment; the image should
/// converge to the albedo.
pub fn furnace(size: i32, output: &str) -> (Arc<dyn Camera>, Scene) {
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
    let camera = Arc::new(PerspectiveCamera::new(
        c2w,
        45.0,
        0.0,
        1e6,
        film(size, output),
    ));
    (camera, scene)
}

/// A homogeneous scattering slab in front of a point light.
pub fn medium_slab(size: i32, output: &str) -> (Arc<dyn Camera>, Scene) {
    let mut primitives: Vec<Arc<dyn Primitive>> = Vec::new();

    let medium = Arc::new(HomogeneousMedium::new(
        Spectrum::grey(0.1),
        Spectrum::grey(0.9),
        1.0,
        0.0,
    ));

    // The slab is a sphere-bounded medium without a surface material
    let boundary: Arc<dyn Shape> = Arc::new(Sphere::new(Point3f::new(0.0, 0.0, 0.0), 1.0));
    primitives.push(Arc::new(GeometricPrimitive {
        shape: boundary,
        material: None,
        light: None,
        medium_interface: MediumInterface::interior(medium),
    }));

    // Ground plane to catch the scattered light
    primitives.push(Arc::new(GeometricPrimitive::new(
        Arc::new(Quad::new(
            Point3f::new(-10.0, -1.5, -10.0),
            Vector3f::new(20.0, 0.0, 0.0),
            Vector3f::new(0.0, 0.0, 20.0),
        )),
        Arc::new(MatteMaterial::constant(Spectrum::grey(0.5))),
    )));

    let light: Arc<dyn Light> = Arc::new(PointLight::new(
        Point3f::new(0.0, 0.0, 5.0),
        Spectrum::grey(40.0),
    ));
    let scene = Scene::new(Arc::new(Aggregate::new(primitives)), vec![light]);

    let c2w = Transform::look_at(
        &Point3f::new(0.0, 0.0, -5.0),
        &Point3f::new(0.0, 0.0, 0.0),
        &Vector3f::new(0.0, 1.0, 0.0),
    );
    let camera = Arc::new(PerspectiveCamera::new(
        c2w,
        45.0,
        0.0,
        1e6,
        film(size, output),
    ));
    (camera, scene)
}
