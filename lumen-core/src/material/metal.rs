use std::sync::Arc;

use crate::bsdf::{roughness_to_alpha, Bsdf, BxDf, Fresnel, MicrofacetDistribution};
use crate::interaction::SurfaceInteraction;
use crate::material::{Material, TransportMode};
use crate::spectrum::Spectrum;
use crate::texture::{ConstantTexture, Texture};

/// Rough conductor.
pub struct MetalMaterial {
    eta: Arc<dyn Texture<Spectrum>>,
    k: Arc<dyn Texture<Spectrum>>,
    roughness: Arc<dyn Texture<f32>>,
    remap_roughness: bool,
}

impl MetalMaterial {
    pub fn new(
        eta: Arc<dyn Texture<Spectrum>>,
        k: Arc<dyn Texture<Spectrum>>,
        roughness: Arc<dyn Texture<f32>>,
        remap_roughness: bool,
    ) -> MetalMaterial {
        MetalMaterial {
            eta,
            k,
            roughness,
            remap_roughness,
        }
    }

    /// Copper-ish defaults.
    pub fn constant(roughness: f32) -> MetalMaterial {
        MetalMaterial {
            eta: Arc::new(ConstantTexture::new(Spectrum::rgb(0.2, 0.92, 1.1))),
            k: Arc::new(ConstantTexture::new(Spectrum::rgb(3.9, 2.45, 2.14))),
            roughness: Arc::new(ConstantTexture::new(roughness)),
            remap_roughness: true,
        }
    }
}

impl Material for MetalMaterial {
    fn compute_scattering_functions(
        &self,
        si: &mut SurfaceInteraction<'_>,
        _material_id: usize,
        _mode: TransportMode,
        _allow_multiple_lobes: bool,
    ) {
        let mut rough = self.roughness.evaluate(si);
        if self.remap_roughness {
            rough = roughness_to_alpha(rough);
        }
        let fresnel = Fresnel::conductor(
            Spectrum::white(),
            self.eta.evaluate(si),
            self.k.evaluate(si),
        );
        let mut bsdf = Bsdf::new(si, 1.0);
        bsdf.add(BxDf::MicrofacetReflection {
            r: Spectrum::white(),
            distribution: MicrofacetDistribution::trowbridge_reitz(rough, rough),
            fresnel,
        });
        si.bsdf = Some(bsdf);
    }
}
