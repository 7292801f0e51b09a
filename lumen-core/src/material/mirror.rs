use std::sync::Arc;

use crate::bsdf::{Bsdf, BxDf, Fresnel};
use crate::interaction::SurfaceInteraction;
use crate::material::{Material, TransportMode};
use crate::spectrum::Spectrum;
use crate::texture::{ConstantTexture, Texture};

/// Perfect specular reflector.
pub struct MirrorMaterial {
    kr: Arc<dyn Texture<Spectrum>>,
}

impl MirrorMaterial {
    pub fn new(kr: Arc<dyn Texture<Spectrum>>) -> MirrorMaterial {
        MirrorMaterial { kr }
    }

    pub fn constant(kr: Spectrum) -> MirrorMaterial {
        MirrorMaterial {
            kr: Arc::new(ConstantTexture::new(kr)),
        }
    }
}

impl Material for MirrorMaterial {
    fn compute_scattering_functions(
        &self,
        si: &mut SurfaceInteraction<'_>,
        _material_id: usize,
        _mode: TransportMode,
        _allow_multiple_lobes: bool,
    ) {
        let r = self.kr.evaluate(si).clamp_positive();
        let mut bsdf = Bsdf::new(si, 1.0);
        if !r.is_black() {
            bsdf.add(BxDf::SpecularReflection {
                r,
                fresnel: Fresnel::NoOp,
            });
        }
        si.bsdf = Some(bsdf);
    }
}
