use std::sync::Arc;

use crate::bounds::Bounds3f;
use crate::interaction::SurfaceInteraction;
use crate::light::Light;
use crate::material::{Material, TransportMode};
use crate::medium::MediumInterface;
use crate::ray::Ray;
use crate::shapes::Shape;

/// A renderable object: geometry plus appearance.
pub trait Primitive: Send + Sync {
    fn intersect<'a>(&'a self, ray: &mut Ray) -> Option<SurfaceInteraction<'a>>;

    fn intersect_p(&self, ray: &Ray) -> bool;

    fn world_bound(&self) -> Bounds3f;

    fn area_light(&self) -> Option<Arc<dyn Light>> {
        None
    }

    /// Identity of the attached material; used to recognize subsurface
    /// probe hits on the same object.
    fn material_id(&self) -> usize {
        0
    }

    /// Whether a hit on this primitive blocks light. Boundaries that only
    /// delimit participating media have no material.
    fn has_material(&self) -> bool {
        false
    }

    fn compute_scattering_functions(
        &self,
        _si: &mut SurfaceInteraction<'_>,
        _mode: TransportMode,
        _allow_multiple_lobes: bool,
    ) {
    }
}

/// A shape paired with a material, an optional emitter and the media on its
/// two sides.
pub struct GeometricPrimitive {
    pub shape: Arc<dyn Shape>,
    pub material: Option<Arc<dyn Material>>,
    pub light: Option<Arc<dyn Light>>,
    pub medium_interface: MediumInterface,
}

impl GeometricPrimitive {
    pub fn new(shape: Arc<dyn Shape>, material: Arc<dyn Material>) -> GeometricPrimitive {
        GeometricPrimitive {
            shape,
            material: Some(material),
            light: None,
            medium_interface: MediumInterface::default(),
        }
    }

    pub fn with_light(mut self, light: Arc<dyn Light>) -> GeometricPrimitive {
        self.light = Some(light);
        self
    }

    pub fn with_medium_interface(mut self, mi: MediumInterface) -> GeometricPrimitive {
        self.medium_interface = mi;
        self
    }
}

impl Primitive for GeometricPrimitive {
    fn intersect<'a>(&'a self, ray: &mut Ray) -> Option<SurfaceInteraction<'a>> {
        let (t_hit, mut isect) = self.shape.intersect(ray)?;
        ray.t_max = t_hit;
        isect.primitive = Some(self);
        // Boundaries of participating media override the ray's medium
        isect.hit.medium_interface = if self.medium_interface.is_medium_transition() {
            self.medium_interface.clone()
        } else {
            MediumInterface::new(ray.medium.clone(), ray.medium.clone())
        };
        Some(isect)
    }

    fn intersect_p(&self, ray: &Ray) -> bool {
        self.shape.intersect_p(ray)
    }

    fn world_bound(&self) -> Bounds3f {
        self.shape.world_bound()
    }

    fn area_light(&self) -> Option<Arc<dyn Light>> {
        self.light.clone()
    }

    fn material_id(&self) -> usize {
        self.material
            .as_ref()
            .map(|m| Arc::as_ptr(m) as *const () as usize)
            .unwrap_or(0)
    }

    fn has_material(&self) -> bool {
        self.material.is_some()
    }

    fn compute_scattering_functions(
        &self,
        si: &mut SurfaceInteraction<'_>,
        mode: TransportMode,
        allow_multiple_lobes: bool,
    ) {
        if let Some(material) = &self.material {
            material.compute_scattering_functions(si, self.material_id(), mode, allow_multiple_lobes);
        }
    }
}

/// Brute-force aggregate over a list of primitives. The scene consumes only
/// `intersect`, so smarter acceleration can replace this without touching
/// the integrators.
pub struct Aggregate {
    primitives: Vec<Arc<dyn Primitive>>,
}

impl Aggregate {
    pub fn new(primitives: Vec<Arc<dyn Primitive>>) -> Aggregate {
        Aggregate { primitives }
    }
}

impl Primitive for Aggregate {
    fn intersect<'a>(&'a self, ray: &mut Ray) -> Option<SurfaceInteraction<'a>> {
        let mut result = None;
        for prim in &self.primitives {
            if let Some(isect) = prim.intersect(ray) {
                result = Some(isect);
            }
        }
        result
    }

    fn intersect_p(&self, ray: &Ray) -> bool {
        self.primitives.iter().any(|p| p.intersect_p(ray))
    }

    fn world_bound(&self) -> Bounds3f {
        self.primitives
            .iter()
            .fold(Bounds3f::new(), |b, p| b.merge(&p.world_bound()))
    }
}
