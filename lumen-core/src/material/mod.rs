use crate::interaction::SurfaceInteraction;

mod glass;
mod matte;
mod metal;
mod mirror;
mod plastic;
mod subsurface;

pub use self::glass::GlassMaterial;
pub use self::matte::MatteMaterial;
pub use self::metal::MetalMaterial;
pub use self::mirror::MirrorMaterial;
pub use self::plastic::PlasticMaterial;
pub use self::subsurface::SubsurfaceMaterial;

/// Whether a path carries radiance (from the camera) or importance (from a
/// light); transmission scales differently in the two cases.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportMode {
    Radiance,
    Importance,
}

pub trait Material: Send + Sync {
    /// Attach the BSDF (and possibly BSSRDF) for this intersection.
    /// `material_id` is the identity of this material instance as reported
    /// by the owning primitive.
    fn compute_scattering_functions(
        &self,
        si: &mut SurfaceInteraction<'_>,
        material_id: usize,
        mode: TransportMode,
        allow_multiple_lobes: bool,
    );
}
