use std::sync::Arc;

use crate::bsdf::{Bsdf, BxDf};
use crate::bssrdf::{
    compute_beam_diffusion_bssrdf, subsurface_from_diffuse, BssrdfTable, TabulatedBssrdf,
};
use crate::interaction::SurfaceInteraction;
use crate::material::{Material, TransportMode};
use crate::spectrum::Spectrum;

/// Translucent material with a tabulated separable BSSRDF.
///
/// The profile table is precomputed once per material from the asymmetry and
/// index of refraction; scattering coefficients can be given directly or
/// recovered from a measured diffuse color and mean free path.
pub struct SubsurfaceMaterial {
    sigma_a: Spectrum,
    sigma_s: Spectrum,
    eta: f32,
    table: Arc<BssrdfTable>,
}

impl SubsurfaceMaterial {
    pub fn new(sigma_a: Spectrum, sigma_s: Spectrum, g: f32, eta: f32) -> SubsurfaceMaterial {
        let mut table = BssrdfTable::new(100, 64);
        compute_beam_diffusion_bssrdf(g, eta, &mut table);
        SubsurfaceMaterial {
            sigma_a,
            sigma_s,
            eta,
            table: Arc::new(table),
        }
    }

    /// Build from an observed diffuse reflectance and mean free path.
    pub fn from_diffuse(
        reflectance: Spectrum,
        mfp: Spectrum,
        g: f32,
        eta: f32,
    ) -> SubsurfaceMaterial {
        let mut table = BssrdfTable::new(100, 64);
        compute_beam_diffusion_bssrdf(g, eta, &mut table);
        let (sigma_a, sigma_s) = subsurface_from_diffuse(&table, &reflectance, &mfp);
        SubsurfaceMaterial {
            sigma_a,
            sigma_s,
            eta,
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> Arc<BssrdfTable> {
        Arc::clone(&self.table)
    }
}

impl Material for SubsurfaceMaterial {
    fn compute_scattering_functions(
        &self,
        si: &mut SurfaceInteraction<'_>,
        material_id: usize,
        mode: TransportMode,
        _allow_multiple_lobes: bool,
    ) {
        // The surface itself is a smooth dielectric; transmission events
        // hand over to the BSSRDF.
        let mut bsdf = Bsdf::new(si, self.eta);
        bsdf.add(BxDf::FresnelSpecular {
            r: Spectrum::white(),
            t: Spectrum::white(),
            eta_a: 1.0,
            eta_b: self.eta,
            mode,
        });
        si.bsdf = Some(bsdf);
        si.bssrdf = Some(TabulatedBssrdf::new(
            si,
            material_id,
            self.eta,
            &self.sigma_a,
            &self.sigma_s,
            Arc::clone(&self.table),
        ));
    }
}
