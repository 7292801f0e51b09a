use std::sync::Arc;

use num::zero;

use crate::bsdf::Bsdf;
use crate::bssrdf::TabulatedBssrdf;
use crate::geometry::offset_ray_origin;
use crate::material::TransportMode;
use crate::medium::{Medium, MediumInterface};
use crate::phase::HenyeyGreenstein;
use crate::primitive::Primitive;
use crate::ray::Ray;
use crate::shapes::Shape;
use crate::spectrum::Spectrum;
use crate::{Normal3f, Point2f, Point3f, Vector3f};

/// Common state of a scattering event: a position with error bounds, the
/// outgoing direction, a normal, and the media on either side.
#[derive(Clone, Default)]
pub struct Interaction {
    pub p: Point3f,
    /// Error bound for the intersection point
    pub p_error: Vector3f,
    /// Outgoing direction of the light at the point (usually `-ray.d`)
    pub wo: Vector3f,
    pub n: Normal3f,
    pub medium_interface: MediumInterface,
}

impl Interaction {
    pub fn new(p: Point3f, p_error: Vector3f, wo: Vector3f, n: Normal3f) -> Interaction {
        Interaction {
            p,
            p_error,
            wo,
            n,
            medium_interface: MediumInterface::default(),
        }
    }

    pub fn from_point(p: &Point3f) -> Interaction {
        Interaction {
            p: *p,
            ..Interaction::default()
        }
    }

    /// The medium on the side of the surface that `w` points into.
    pub fn get_medium(&self, w: &Vector3f) -> Option<Arc<dyn Medium>> {
        if w.dotn(&self.n) > 0.0 {
            self.medium_interface.outside.clone()
        } else {
            self.medium_interface.inside.clone()
        }
    }

    pub fn is_on_surface(&self) -> bool {
        self.n != zero()
    }

    pub fn spawn_ray(&self, dir: &Vector3f) -> Ray {
        let o = offset_ray_origin(&self.p, &self.p_error, &self.n, dir);
        Ray::new(o, *dir).with_medium(self.get_medium(dir))
    }

    pub fn spawn_ray_to(&self, p: &Point3f) -> Ray {
        let d = *p - self.p;
        let o = offset_ray_origin(&self.p, &self.p_error, &self.n, &d);
        Ray::segment(o, d, 1.0 - 1e-4).with_medium(self.get_medium(&d))
    }

    pub fn spawn_ray_to_interaction(&self, it: &Interaction) -> Ray {
        let origin = offset_ray_origin(&self.p, &self.p_error, &self.n, &(it.p - self.p));
        let target = offset_ray_origin(&it.p, &it.p_error, &it.n, &(origin - it.p));
        let d = target - origin;
        Ray::segment(origin, d, 1.0 - 1e-4).with_medium(self.get_medium(&d))
    }
}

/// Normal and partial derivatives used for shading. Can differ from the
/// geometric ones due to bump mapping or interpolated normals.
#[derive(Copy, Clone, Default)]
pub struct Shading {
    pub n: Normal3f,
    pub dpdu: Vector3f,
    pub dpdv: Vector3f,
    pub dndu: Normal3f,
    pub dndv: Normal3f,
}

#[derive(Clone)]
pub struct SurfaceInteraction<'a> {
    pub hit: Interaction,
    /// Texture coordinates
    pub uv: Point2f,
    /// Partial derivatives at the intersection point
    pub dpdu: Vector3f,
    pub dpdv: Vector3f,
    /// Partial derivatives of the normal
    pub dndu: Normal3f,
    pub dndv: Normal3f,
    /// Hit shape
    pub shape: Option<&'a dyn Shape>,
    /// Hit primitive
    pub primitive: Option<&'a dyn Primitive>,
    pub shading: Shading,
    /// Scattering functions attached by the material
    pub bsdf: Option<Bsdf>,
    pub bssrdf: Option<TabulatedBssrdf>,
}

impl<'a> SurfaceInteraction<'a> {
    pub fn new(
        p: Point3f,
        p_error: Vector3f,
        uv: Point2f,
        wo: Vector3f,
        dpdu: Vector3f,
        dpdv: Vector3f,
        dndu: Normal3f,
        dndv: Normal3f,
        shape: Option<&'a dyn Shape>,
    ) -> SurfaceInteraction<'a> {
        let n = Normal3f::from(dpdu.cross(&dpdv).normalize());
        SurfaceInteraction {
            hit: Interaction::new(p, p_error, wo.normalize(), n),
            uv,
            dpdu,
            dpdv,
            dndu,
            dndv,
            shape,
            primitive: None,
            // Initialize shading geometry from true geometry
            shading: Shading {
                n,
                dpdu,
                dpdv,
                dndu,
                dndv,
            },
            bsdf: None,
            bssrdf: None,
        }
    }

    pub fn p(&self) -> Point3f {
        self.hit.p
    }

    pub fn wo(&self) -> Vector3f {
        self.hit.wo
    }

    pub fn ns(&self) -> Normal3f {
        self.shading.n
    }

    /// Emitted radiance if the hit primitive carries an area light.
    pub fn le(&self, w: &Vector3f) -> Spectrum {
        self.primitive
            .and_then(|p| p.area_light())
            .map(|light| light.l(&self.hit, w))
            .unwrap_or_else(Spectrum::black)
    }

    /// Let the material attach BSDF/BSSRDF for this intersection.
    pub fn compute_scattering_functions(
        &mut self,
        _ray: &Ray,
        mode: TransportMode,
        allow_multiple_lobes: bool,
    ) {
        if let Some(primitive) = self.primitive {
            primitive.compute_scattering_functions(self, mode, allow_multiple_lobes);
        }
    }

    pub fn spawn_ray(&self, dir: &Vector3f) -> Ray {
        self.hit.spawn_ray(dir)
    }

    pub fn spawn_ray_to(&self, p: &Point3f) -> Ray {
        self.hit.spawn_ray_to(p)
    }
}

/// A scattering event inside a participating medium.
#[derive(Clone)]
pub struct MediumInteraction {
    pub p: Point3f,
    pub wo: Vector3f,
    pub medium: Option<Arc<dyn Medium>>,
    pub phase: HenyeyGreenstein,
}

impl MediumInteraction {
    pub fn new(
        p: Point3f,
        wo: Vector3f,
        medium: Option<Arc<dyn Medium>>,
        phase: HenyeyGreenstein,
    ) -> MediumInteraction {
        MediumInteraction {
            p,
            wo,
            medium,
            phase,
        }
    }

    pub fn as_interaction(&self) -> Interaction {
        Interaction {
            p: self.p,
            p_error: zero(),
            wo: self.wo,
            n: zero(),
            medium_interface: MediumInterface::new(self.medium.clone(), self.medium.clone()),
        }
    }

    pub fn spawn_ray(&self, dir: &Vector3f) -> Ray {
        Ray::new(self.p, *dir).with_medium(self.medium.clone())
    }
}

/// Either kind of scattering point; what `estimate_direct` shades at.
pub enum Intr<'s, 'a> {
    Surface(&'s SurfaceInteraction<'a>),
    Medium(&'s MediumInteraction),
}

impl<'s, 'a> Intr<'s, 'a> {
    pub fn as_interaction(&self) -> Interaction {
        match self {
            Intr::Surface(si) => si.hit.clone(),
            Intr::Medium(mi) => mi.as_interaction(),
        }
    }

    pub fn p(&self) -> Point3f {
        match self {
            Intr::Surface(si) => si.hit.p,
            Intr::Medium(mi) => mi.p,
        }
    }

    pub fn spawn_ray(&self, dir: &Vector3f) -> Ray {
        match self {
            Intr::Surface(si) => si.spawn_ray(dir),
            Intr::Medium(mi) => mi.spawn_ray(dir),
        }
    }
}
