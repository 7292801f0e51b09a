mod bxdf;
mod fresnel;
mod microfacet;

pub use self::bxdf::BxDf;
pub use self::fresnel::{fr_conductor, fr_dielectric, Fresnel};
pub use self::microfacet::{roughness_to_alpha, MicrofacetDistribution};

use bitflags::bitflags;

use crate::interaction::SurfaceInteraction;
use crate::spectrum::Spectrum;
use crate::{min, Normal3f, Point2f, Vector3f, ONE_MINUS_EPSILON};

bitflags! {
    pub struct BxDFType: u32 {
        const BSDF_REFLECTION   = 0b_0000_0001;
        const BSDF_TRANSMISSION = 0b_0000_0010;
        const BSDF_DIFFUSE      = 0b_0000_0100;
        const BSDF_GLOSSY       = 0b_0000_1000;
        const BSDF_SPECULAR     = 0b_0001_0000;
    }
}

pub const MAX_BXDFS: usize = 8;

/// Bundle of up to 8 BxDFs in a common shading frame.
///
/// A plain value: interactions and path vertices own their bundle, so it can
/// be stored past the intersection that created it.
#[derive(Copy, Clone)]
pub struct Bsdf {
    /// Relative index of refraction of the interface.
    pub eta: f32,
    /// Shading normal (potentially affected by bump mapping)
    ns: Normal3f,
    /// Geometric normal
    ng: Normal3f,
    ss: Vector3f,
    ts: Vector3f,
    bxdfs: [BxDf; MAX_BXDFS],
    n_bxdfs: usize,
}

impl Bsdf {
    pub fn new(isect: &SurfaceInteraction<'_>, eta: f32) -> Bsdf {
        let ns = isect.shading.n;
        let ss = isect.shading.dpdu.normalize();
        Bsdf {
            eta,
            ns,
            ng: isect.hit.n,
            ss,
            ts: Vector3f::from(ns).cross(&ss),
            bxdfs: [BxDf::default(); MAX_BXDFS],
            n_bxdfs: 0,
        }
    }

    /// Bundle with an explicit frame; used at BSSRDF exit points where there
    /// is no full differential geometry.
    pub fn from_frame(ns: Normal3f, ss: Vector3f, eta: f32) -> Bsdf {
        let ss = ss.normalize();
        Bsdf {
            eta,
            ns,
            ng: ns,
            ss,
            ts: Vector3f::from(ns).cross(&ss),
            bxdfs: [BxDf::default(); MAX_BXDFS],
            n_bxdfs: 0,
        }
    }

    pub fn add(&mut self, bxdf: BxDf) {
        assert!(
            self.n_bxdfs < MAX_BXDFS,
            "Number of BxDFs is over the bundle limit"
        );
        self.bxdfs[self.n_bxdfs] = bxdf;
        self.n_bxdfs += 1;
    }

    fn components(&self) -> &[BxDf] {
        &self.bxdfs[..self.n_bxdfs]
    }

    pub fn num_components(&self, flags: BxDFType) -> usize {
        self.components().iter().filter(|b| b.matches(flags)).count()
    }

    pub fn has_type(&self, flags: BxDFType) -> bool {
        self.components()
            .iter()
            .any(|b| !(b.get_type() & flags).is_empty())
    }

    pub fn world_to_local(&self, v: &Vector3f) -> Vector3f {
        Vector3f::new(v.dot(&self.ss), v.dot(&self.ts), v.dotn(&self.ns))
    }

    pub fn local_to_world(&self, v: &Vector3f) -> Vector3f {
        Vector3f::new(
            self.ss.x * v.x + self.ts.x * v.y + self.ns.x * v.z,
            self.ss.y * v.x + self.ts.y * v.y + self.ns.y * v.z,
            self.ss.z * v.x + self.ts.z * v.y + self.ns.z * v.z,
        )
    }

    /// Evaluate the BSDF for world-space directions, filtering components by
    /// reflection/transmission against the geometric normal.
    pub fn f(&self, wo_w: &Vector3f, wi_w: &Vector3f, flags: BxDFType) -> Spectrum {
        let wi = self.world_to_local(wi_w);
        let wo = self.world_to_local(wo_w);
        if wo.z == 0.0 {
            return Spectrum::black();
        }
        let reflect = wi_w.dotn(&self.ng) * wo_w.dotn(&self.ng) > 0.0;
        self.components()
            .iter()
            .filter(|b| {
                b.matches(flags)
                    && ((reflect && b.get_type().contains(BxDFType::BSDF_REFLECTION))
                        || (!reflect && b.get_type().contains(BxDFType::BSDF_TRANSMISSION)))
            })
            .fold(Spectrum::black(), |c, b| c + b.f(&wo, &wi))
    }

    pub fn pdf(&self, wo_w: &Vector3f, wi_w: &Vector3f, flags: BxDFType) -> f32 {
        if self.n_bxdfs == 0 {
            return 0.0;
        }
        let wo = self.world_to_local(wo_w);
        if wo.z == 0.0 {
            return 0.0;
        }
        let wi = self.world_to_local(wi_w);

        let mut matched = 0;
        let mut pdf = 0.0;
        for bxdf in self.components() {
            if bxdf.matches(flags) {
                matched += 1;
                pdf += bxdf.pdf(&wo, &wi);
            }
        }
        if matched == 0 {
            0.0
        } else {
            pdf / matched as f32
        }
    }

    /// Sample a direction from one of the matching components, then average
    /// pdf and value over the other non-specular matching components.
    pub fn sample_f(
        &self,
        wo_w: &Vector3f,
        u: &Point2f,
        flags: BxDFType,
    ) -> (Spectrum, Vector3f, f32, BxDFType) {
        let matching = self.num_components(flags);
        if matching == 0 {
            return (
                Spectrum::black(),
                Vector3f::new(0.0, 0.0, 0.0),
                0.0,
                BxDFType::empty(),
            );
        }

        // Choose which BxDF to sample
        let comp = min((u[0] * matching as f32) as usize, matching - 1);
        let chosen = self
            .components()
            .iter()
            .filter(|b| b.matches(flags))
            .nth(comp)
            .expect("matching BxDF with this index");

        // Remap the sample u to [0,1)^2
        let u_remapped = Point2f::new(
            (u[0] * matching as f32 - comp as f32).min(ONE_MINUS_EPSILON),
            u[1],
        );

        let wo = self.world_to_local(wo_w);
        if wo.z == 0.0 {
            return (
                Spectrum::black(),
                Vector3f::new(0.0, 0.0, 0.0),
                0.0,
                chosen.get_type(),
            );
        }
        let (mut f, wi, mut pdf, sampled_type) = chosen.sample_f(&wo, &u_remapped);
        if pdf == 0.0 {
            return (
                Spectrum::black(),
                Vector3f::new(0.0, 0.0, 0.0),
                0.0,
                BxDFType::empty(),
            );
        }
        let wi_w = self.local_to_world(&wi);

        // Overall pdf averaged over all matching components
        let is_specular = chosen.get_type().contains(BxDFType::BSDF_SPECULAR);
        if !is_specular && matching > 1 {
            for (i, b) in self
                .components()
                .iter()
                .filter(|b| b.matches(flags))
                .enumerate()
            {
                if i != comp {
                    pdf += b.pdf(&wo, &wi);
                }
            }
        }
        if matching > 1 {
            pdf /= matching as f32;
        }

        // BSDF value at the sampled direction summed over all components
        if !is_specular && matching > 1 {
            let reflect = wi_w.dotn(&self.ng) * wo_w.dotn(&self.ng) > 0.0;
            f = self
                .components()
                .iter()
                .filter(|b| {
                    b.matches(flags)
                        && ((reflect && b.get_type().contains(BxDFType::BSDF_REFLECTION))
                            || (!reflect
                                && b.get_type().contains(BxDFType::BSDF_TRANSMISSION)))
                })
                .fold(Spectrum::black(), |acc, b| acc + b.f(&wo, &wi));
        }

        (f, wi_w, pdf, sampled_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let flags = BxDFType::BSDF_SPECULAR | BxDFType::BSDF_REFLECTION;
        let bxdf_type =
            BxDFType::BSDF_SPECULAR | BxDFType::BSDF_REFLECTION | BxDFType::BSDF_TRANSMISSION;
        assert!((bxdf_type & flags) == flags);
    }

    #[test]
    fn test_bundle_counting() {
        let mut bsdf = Bsdf::from_frame(
            Normal3f::new(0.0, 0.0, 1.0),
            Vector3f::new(1.0, 0.0, 0.0),
            1.0,
        );
        bsdf.add(BxDf::LambertianReflection {
            r: Spectrum::grey(0.5),
        });
        bsdf.add(BxDf::SpecularReflection {
            r: Spectrum::white(),
            fresnel: Fresnel::NoOp,
        });
        assert_eq!(bsdf.num_components(BxDFType::all()), 2);
        assert_eq!(
            bsdf.num_components(BxDFType::all() & !BxDFType::BSDF_SPECULAR),
            1
        );
        assert!(bsdf.has_type(BxDFType::BSDF_DIFFUSE));
        assert!(!bsdf.has_type(BxDFType::BSDF_TRANSMISSION));
    }

    #[test]
    fn test_sample_f_diffuse_frame() {
        let n = Normal3f::new(0.0, 1.0, 0.0);
        let mut bsdf = Bsdf::from_frame(n, Vector3f::new(1.0, 0.0, 0.0), 1.0);
        bsdf.add(BxDf::LambertianReflection {
            r: Spectrum::grey(0.8),
        });
        let wo = Vector3f::new(0.0, 1.0, 0.0);
        let (f, wi, pdf, _) = bsdf.sample_f(&wo, &Point2f::new(0.3, 0.7), BxDFType::all());
        assert!(pdf > 0.0);
        assert!(!f.is_black());
        // Sampled direction is in the upper hemisphere around the frame normal
        assert!(wi.dotn(&n) > 0.0);
        // pdf() agrees with the sampled pdf for a single diffuse lobe
        assert!((bsdf.pdf(&wo, &wi, BxDFType::all()) - pdf).abs() < 1e-5);
    }
}
