use std::f32::consts::PI;

use crate::bounds::Bounds2f;
use crate::film::Film;
use crate::interaction::Interaction;
use crate::light::VisibilityTester;
use crate::ray::Ray;
use crate::sampling::concentric_sample_disk;
use crate::spectrum::Spectrum;
use crate::transform::Transform;
use crate::{Normal3f, Point2f, Point2i, Point3f, Vector3f};

/// Sample of importance arriving at the camera from a reference point.
pub struct WiSample {
    pub we: Spectrum,
    pub wi: Vector3f,
    pub pdf: f32,
    pub p_raster: Point2f,
    pub vis: VisibilityTester,
}

pub trait Camera: Send + Sync {
    /// Generate a primary ray through `pixel` jittered by `rand_film`;
    /// `rand_lens` picks a point on the lens.
    fn spawn_ray(&self, pixel: &Point2i, rand_film: &Point2f, rand_lens: &Point2f) -> Ray;

    /// Importance emitted by the camera along `ray`; also reports the raster
    /// position the ray corresponds to.
    fn we(&self, ray: &Ray) -> (Spectrum, Option<Point2f>);

    /// Spatial and directional pdfs of sampling `ray` from the camera.
    fn pdf_we(&self, ray: &Ray) -> (f32, f32);

    /// Sample a direction from `re` towards the camera.
    fn sample_wi(&self, re: &Interaction, u: &Point2f) -> Option<WiSample>;

    fn film(&self) -> &Film;
}

/// Thin-lens perspective camera.
pub struct PerspectiveCamera {
    camera_to_world: Transform,
    raster_to_camera: Transform,
    lens_radius: f32,
    focal_distance: f32,
    area: f32,
    film: Film,
}

impl PerspectiveCamera {
    pub fn new(
        camera_to_world: Transform,
        fov_degrees: f32,
        lens_radius: f32,
        focal_distance: f32,
        film: Film,
    ) -> PerspectiveCamera {
        let res = film.resolution();
        let aspect = res.x as f32 / res.y as f32;
        let screen = if aspect > 1.0 {
            Bounds2f::from_points(
                &Point2f::new(-aspect, -1.0),
                &Point2f::new(aspect, 1.0),
            )
        } else {
            Bounds2f::from_points(
                &Point2f::new(-1.0, -1.0 / aspect),
                &Point2f::new(1.0, 1.0 / aspect),
            )
        };

        let camera_to_screen = Transform::perspective(fov_degrees.to_radians(), 1e-2, 1000.0);
        let screen_to_raster = &(&Transform::scale(res.x as f32, res.y as f32, 1.0)
            * &Transform::scale(
                1.0 / (screen.p_max.x - screen.p_min.x),
                1.0 / (screen.p_min.y - screen.p_max.y),
                1.0,
            ))
            * &Transform::translate(&Vector3f::new(-screen.p_min.x, -screen.p_max.y, 0.0));
        let raster_to_camera = &camera_to_screen.inverse() * &screen_to_raster.inverse();

        // Image-plane area at z = 1, for the importance normalization
        let p_min = raster_to_camera.transform_point(&Point3f::new(0.0, 0.0, 0.0));
        let p_max =
            raster_to_camera.transform_point(&Point3f::new(res.x as f32, res.y as f32, 0.0));
        let p_min = Point3f::new(p_min.x / p_min.z, p_min.y / p_min.z, 1.0);
        let p_max = Point3f::new(p_max.x / p_max.z, p_max.y / p_max.z, 1.0);
        let area = ((p_max.x - p_min.x) * (p_max.y - p_min.y)).abs();

        PerspectiveCamera {
            camera_to_world,
            raster_to_camera,
            lens_radius,
            focal_distance,
            area,
            film,
        }
    }

    fn lens_area(&self) -> f32 {
        if self.lens_radius > 0.0 {
            PI * self.lens_radius * self.lens_radius
        } else {
            1.0
        }
    }

    fn camera_dir(&self) -> Vector3f {
        self.camera_to_world
            .transform_vector(&Vector3f::new(0.0, 0.0, 1.0))
    }

    /// Raster position of the focus point of `ray`, if it lies on the film.
    fn raster_point(&self, ray: &Ray, cos_theta: f32) -> Option<Point2f> {
        if cos_theta <= 0.0 {
            return None;
        }
        let t = if self.lens_radius > 0.0 {
            self.focal_distance
        } else {
            1.0
        } / cos_theta;
        let p_focus = ray.at(t);
        let p_camera = self
            .camera_to_world
            .inverse()
            .transform_point(&p_focus);
        let p_raster = self
            .raster_to_camera
            .inverse()
            .transform_point(&p_camera);

        let res = self.film.resolution();
        if p_raster.x < 0.0
            || p_raster.x >= res.x as f32
            || p_raster.y < 0.0
            || p_raster.y >= res.y as f32
        {
            return None;
        }
        Some(Point2f::new(p_raster.x, p_raster.y))
    }
}

impl Camera for PerspectiveCamera {
    fn spawn_ray(&self, pixel: &Point2i, rand_film: &Point2f, rand_lens: &Point2f) -> Ray {
        let p_film = Point3f::new(
            pixel.x as f32 + rand_film.x,
            pixel.y as f32 + rand_film.y,
            0.0,
        );
        let p_camera = self.raster_to_camera.transform_point(&p_film);

        let mut org = Point3f::new(0.0, 0.0, 0.0);
        let mut dir = Vector3f::from(p_camera).normalize();
        if self.lens_radius > 0.0 {
            let p_lens = concentric_sample_disk(*rand_lens) * self.lens_radius;
            let ft = self.focal_distance / dir.z;
            let p_focus = org + dir * ft;
            org = Point3f::new(p_lens.x, p_lens.y, 0.0);
            dir = (p_focus - org).normalize();
        }

        Ray::new(
            self.camera_to_world.transform_point(&org),
            self.camera_to_world.transform_vector(&dir).normalize(),
        )
    }

    fn we(&self, ray: &Ray) -> (Spectrum, Option<Point2f>) {
        let cos_theta = ray.d.dot(&self.camera_dir());
        match self.raster_point(ray, cos_theta) {
            Some(p_raster) => {
                let cos2 = cos_theta * cos_theta;
                let w = 1.0 / (self.area * self.lens_area() * cos2 * cos2);
                (Spectrum::grey(w), Some(p_raster))
            }
            None => (Spectrum::black(), None),
        }
    }

    fn pdf_we(&self, ray: &Ray) -> (f32, f32) {
        let cos_theta = ray.d.dot(&self.camera_dir());
        match self.raster_point(ray, cos_theta) {
            Some(_) => (
                1.0 / self.lens_area(),
                1.0 / (self.area * cos_theta * cos_theta * cos_theta),
            ),
            None => (0.0, 0.0),
        }
    }

    fn sample_wi(&self, re: &Interaction, u: &Point2f) -> Option<WiSample> {
        let p_lens = concentric_sample_disk(*u) * self.lens_radius;
        let p_lens_world = self
            .camera_to_world
            .transform_point(&Point3f::new(p_lens.x, p_lens.y, 0.0));
        let n_lens = Normal3f::from(self.camera_dir());
        let lens_intr = Interaction::new(p_lens_world, Vector3f::default(), Vector3f::default(), n_lens);

        let to_lens = lens_intr.p - re.p;
        let dist = to_lens.length();
        if dist == 0.0 {
            return None;
        }
        let wi = to_lens / dist;

        let pdf = (dist * dist) / (n_lens.dot(&wi).abs() * self.lens_area());
        let (we, p_raster) = self.we(&lens_intr.spawn_ray(&-wi));
        let p_raster = p_raster?;
        Some(WiSample {
            we,
            wi,
            pdf,
            p_raster,
            vis: VisibilityTester::new(re.clone(), lens_intr),
        })
    }

    fn film(&self) -> &Film {
        &self.film
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::BoxFilter;

    fn test_camera() -> PerspectiveCamera {
        let c2w = Transform::look_at(
            &Point3f::new(0.0, 0.0, -5.0),
            &Point3f::new(0.0, 0.0, 0.0),
            &Vector3f::new(0.0, 1.0, 0.0),
        );
        let film = Film::new(Point2i::new(64, 64), Box::new(BoxFilter::new(0.5, 0.5)), "out.png");
        PerspectiveCamera::new(c2w, 45.0, 0.0, 1e6, film)
    }

    #[test]
    fn test_center_ray_points_forward() {
        let cam = test_camera();
        let ray = cam.spawn_ray(
            &Point2i::new(32, 32),
            &Point2f::new(0.5, 0.5),
            &Point2f::new(0.5, 0.5),
        );
        assert!((ray.o - Point3f::new(0.0, 0.0, -5.0)).length() < 1e-4);
        assert!((ray.d.z - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_we_roundtrip_raster() {
        let cam = test_camera();
        let pixel = Point2i::new(10, 50);
        let ray = cam.spawn_ray(&pixel, &Point2f::new(0.5, 0.5), &Point2f::new(0.5, 0.5));
        let (we, p_raster) = cam.we(&ray);
        assert!(!we.is_black());
        let p = p_raster.unwrap();
        assert!((p.x - 10.5).abs() < 0.5, "p = {}", p);
        assert!((p.y - 50.5).abs() < 0.5, "p = {}", p);
        let (pdf_pos, pdf_dir) = cam.pdf_we(&ray);
        assert!(pdf_pos > 0.0 && pdf_dir > 0.0);
    }

    #[test]
    fn test_backward_ray_has_no_importance() {
        let cam = test_camera();
        let ray = Ray::new(Point3f::new(0.0, 0.0, -5.0), Vector3f::new(0.0, 0.0, -1.0));
        let (we, _) = cam.we(&ray);
        assert!(we.is_black());
        assert_eq!(cam.pdf_we(&ray), (0.0, 0.0));
    }
}
