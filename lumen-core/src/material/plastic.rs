use std::sync::Arc;

use crate::bsdf::{roughness_to_alpha, Bsdf, BxDf, Fresnel, MicrofacetDistribution};
use crate::interaction::SurfaceInteraction;
use crate::material::{Material, TransportMode};
use crate::spectrum::Spectrum;
use crate::texture::{ConstantTexture, Texture};

/// Diffuse substrate with a glossy dielectric coat.
pub struct PlasticMaterial {
    kd: Arc<dyn Texture<Spectrum>>,
    ks: Arc<dyn Texture<Spectrum>>,
    roughness: Arc<dyn Texture<f32>>,
    remap_roughness: bool,
}

impl PlasticMaterial {
    pub fn new(
        kd: Arc<dyn Texture<Spectrum>>,
        ks: Arc<dyn Texture<Spectrum>>,
        roughness: Arc<dyn Texture<f32>>,
        remap_roughness: bool,
    ) -> PlasticMaterial {
        PlasticMaterial {
            kd,
            ks,
            roughness,
            remap_roughness,
        }
    }

    pub fn constant(kd: Spectrum, ks: Spectrum, roughness: f32) -> PlasticMaterial {
        PlasticMaterial {
            kd: Arc::new(ConstantTexture::new(kd)),
            ks: Arc::new(ConstantTexture::new(ks)),
            roughness: Arc::new(ConstantTexture::new(roughness)),
            remap_roughness: true,
        }
    }
}

impl Material for PlasticMaterial {
    fn compute_scattering_functions(
        &self,
        si: &mut SurfaceInteraction<'_>,
        _material_id: usize,
        _mode: TransportMode,
        _allow_multiple_lobes: bool,
    ) {
        let kd = self.kd.evaluate(si).clamp_positive();
        let ks = self.ks.evaluate(si).clamp_positive();

        let mut bsdf = Bsdf::new(si, 1.0);
        if !kd.is_black() {
            bsdf.add(BxDf::LambertianReflection { r: kd });
        }
        if !ks.is_black() {
            let mut rough = self.roughness.evaluate(si);
            if self.remap_roughness {
                rough = roughness_to_alpha(rough);
            }
            bsdf.add(BxDf::MicrofacetReflection {
                r: ks,
                distribution: MicrofacetDistribution::trowbridge_reitz(rough, rough),
                fresnel: Fresnel::dielectric(1.5, 1.0),
            });
        }
        si.bsdf = Some(bsdf);
    }
}
