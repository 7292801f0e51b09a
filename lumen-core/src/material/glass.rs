use std::sync::Arc;

use crate::bsdf::{
    roughness_to_alpha, Bsdf, BxDf, Fresnel, MicrofacetDistribution,
};
use crate::interaction::SurfaceInteraction;
use crate::material::{Material, TransportMode};
use crate::spectrum::Spectrum;
use crate::texture::{ConstantTexture, Texture};

/// Smooth or rough dielectric.
pub struct GlassMaterial {
    kr: Arc<dyn Texture<Spectrum>>,
    kt: Arc<dyn Texture<Spectrum>>,
    index: Arc<dyn Texture<f32>>,
    roughness: Arc<dyn Texture<f32>>,
    remap_roughness: bool,
}

impl GlassMaterial {
    pub fn new(
        kr: Arc<dyn Texture<Spectrum>>,
        kt: Arc<dyn Texture<Spectrum>>,
        index: Arc<dyn Texture<f32>>,
        roughness: Arc<dyn Texture<f32>>,
        remap_roughness: bool,
    ) -> GlassMaterial {
        GlassMaterial {
            kr,
            kt,
            index,
            roughness,
            remap_roughness,
        }
    }

    pub fn constant(eta: f32) -> GlassMaterial {
        GlassMaterial {
            kr: Arc::new(ConstantTexture::new(Spectrum::white())),
            kt: Arc::new(ConstantTexture::new(Spectrum::white())),
            index: Arc::new(ConstantTexture::new(eta)),
            roughness: Arc::new(ConstantTexture::new(0.0)),
            remap_roughness: true,
        }
    }
}

impl Material for GlassMaterial {
    fn compute_scattering_functions(
        &self,
        si: &mut SurfaceInteraction<'_>,
        _material_id: usize,
        mode: TransportMode,
        allow_multiple_lobes: bool,
    ) {
        let eta = self.index.evaluate(si);
        let r = self.kr.evaluate(si).clamp_positive();
        let t = self.kt.evaluate(si).clamp_positive();
        let mut rough = self.roughness.evaluate(si);

        let mut bsdf = Bsdf::new(si, eta);
        if !r.is_black() || !t.is_black() {
            let is_specular = rough == 0.0;
            if is_specular && allow_multiple_lobes {
                bsdf.add(BxDf::FresnelSpecular {
                    r,
                    t,
                    eta_a: 1.0,
                    eta_b: eta,
                    mode,
                });
            } else {
                if self.remap_roughness {
                    rough = roughness_to_alpha(rough);
                }
                let distribution = MicrofacetDistribution::trowbridge_reitz(rough, rough);
                if !r.is_black() {
                    if is_specular {
                        bsdf.add(BxDf::SpecularReflection {
                            r,
                            fresnel: Fresnel::dielectric(1.0, eta),
                        });
                    } else {
                        bsdf.add(BxDf::MicrofacetReflection {
                            r,
                            distribution,
                            fresnel: Fresnel::dielectric(1.0, eta),
                        });
                    }
                }
                if !t.is_black() {
                    if is_specular {
                        bsdf.add(BxDf::SpecularTransmission {
                            t,
                            eta_a: 1.0,
                            eta_b: eta,
                            mode,
                        });
                    } else {
                        bsdf.add(BxDf::MicrofacetTransmission {
                            t,
                            distribution,
                            eta_a: 1.0,
                            eta_b: eta,
                            mode,
                        });
                    }
                }
            }
        }
        si.bsdf = Some(bsdf);
    }
}
