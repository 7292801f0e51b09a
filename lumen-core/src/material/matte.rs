use std::sync::Arc;

use crate::bsdf::{Bsdf, BxDf};
use crate::interaction::SurfaceInteraction;
use crate::material::{Material, TransportMode};
use crate::spectrum::Spectrum;
use crate::texture::{ConstantTexture, Texture};

/// Purely diffuse material.
pub struct MatteMaterial {
    kd: Arc<dyn Texture<Spectrum>>,
}

impl MatteMaterial {
    pub fn new(kd: Arc<dyn Texture<Spectrum>>) -> MatteMaterial {
        MatteMaterial { kd }
    }

    pub fn constant(kd: Spectrum) -> MatteMaterial {
        MatteMaterial {
            kd: Arc::new(ConstantTexture::new(kd)),
        }
    }
}

impl Material for MatteMaterial {
    fn compute_scattering_functions(
        &self,
        si: &mut SurfaceInteraction<'_>,
        _material_id: usize,
        _mode: TransportMode,
        _allow_multiple_lobes: bool,
    ) {
        let r = self.kd.evaluate(si).clamp_positive();
        let mut bsdf = Bsdf::new(si, 1.0);
        if !r.is_black() {
            bsdf.add(BxDf::LambertianReflection { r });
        }
        si.bsdf = Some(bsdf);
    }
}
