use crate::bsdf::fresnel::{fr_dielectric, Fresnel};
use crate::bsdf::microfacet::MicrofacetDistribution;
use crate::bsdf::BxDFType;
use crate::bssrdf::fresnel_moment1;
use crate::geometry::{abs_cos_theta, cos_theta, reflect, refract, same_hemisphere};
use crate::material::TransportMode;
use crate::sampling::cosine_sample_hemisphere;
use crate::spectrum::Spectrum;
use crate::{Normal3f, Point2f, Vector3f, INV_PI};

/// A single reflection or transmission component.
///
/// All directions are expressed in the shading frame where the normal is
/// `(0, 0, 1)`. Components are tagged variants rather than trait objects so
/// the set is closed, `BxDFType` matching is exhaustive, and a bundle stays a
/// plain value.
#[derive(Copy, Clone, Debug)]
pub enum BxDf {
    LambertianReflection {
        r: Spectrum,
    },
    LambertianTransmission {
        t: Spectrum,
    },
    SpecularReflection {
        r: Spectrum,
        fresnel: Fresnel,
    },
    SpecularTransmission {
        t: Spectrum,
        eta_a: f32,
        eta_b: f32,
        mode: TransportMode,
    },
    FresnelSpecular {
        r: Spectrum,
        t: Spectrum,
        eta_a: f32,
        eta_b: f32,
        mode: TransportMode,
    },
    MicrofacetReflection {
        r: Spectrum,
        distribution: MicrofacetDistribution,
        fresnel: Fresnel,
    },
    MicrofacetTransmission {
        t: Spectrum,
        distribution: MicrofacetDistribution,
        eta_a: f32,
        eta_b: f32,
        mode: TransportMode,
    },
    /// Lambertian exit lobe attached at a BSSRDF sample point; weights the
    /// outgoing directional factor `Sw`.
    BssrdfAdapter {
        eta: f32,
    },
}

impl Default for BxDf {
    fn default() -> BxDf {
        BxDf::LambertianReflection {
            r: Spectrum::black(),
        }
    }
}

impl BxDf {
    pub fn get_type(&self) -> BxDFType {
        match self {
            BxDf::LambertianReflection { .. } => {
                BxDFType::BSDF_DIFFUSE | BxDFType::BSDF_REFLECTION
            }
            BxDf::LambertianTransmission { .. } => {
                BxDFType::BSDF_DIFFUSE | BxDFType::BSDF_TRANSMISSION
            }
            BxDf::SpecularReflection { .. } => {
                BxDFType::BSDF_SPECULAR | BxDFType::BSDF_REFLECTION
            }
            BxDf::SpecularTransmission { .. } => {
                BxDFType::BSDF_SPECULAR | BxDFType::BSDF_TRANSMISSION
            }
            BxDf::FresnelSpecular { .. } => {
                BxDFType::BSDF_SPECULAR | BxDFType::BSDF_REFLECTION | BxDFType::BSDF_TRANSMISSION
            }
            BxDf::MicrofacetReflection { .. } => {
                BxDFType::BSDF_GLOSSY | BxDFType::BSDF_REFLECTION
            }
            BxDf::MicrofacetTransmission { .. } => {
                BxDFType::BSDF_GLOSSY | BxDFType::BSDF_TRANSMISSION
            }
            BxDf::BssrdfAdapter { .. } => BxDFType::BSDF_DIFFUSE | BxDFType::BSDF_REFLECTION,
        }
    }

    pub fn matches(&self, flags: BxDFType) -> bool {
        let t = self.get_type();
        t & flags == t
    }

    pub fn f(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        match self {
            BxDf::LambertianReflection { r } => *r * INV_PI,
            BxDf::LambertianTransmission { t } => *t * INV_PI,
            // The probability of hitting the exact mirror direction with a
            // continuous wi is zero; use sample_f instead.
            BxDf::SpecularReflection { .. }
            | BxDf::SpecularTransmission { .. }
            | BxDf::FresnelSpecular { .. } => Spectrum::black(),
            BxDf::MicrofacetReflection {
                r,
                distribution,
                fresnel,
            } => {
                let cos_theta_o = abs_cos_theta(wo);
                let cos_theta_i = abs_cos_theta(wi);
                let mut wh = *wi + *wo;
                if cos_theta_o == 0.0 || cos_theta_i == 0.0 {
                    return Spectrum::black();
                }
                if wh.x == 0.0 && wh.y == 0.0 && wh.z == 0.0 {
                    return Spectrum::black();
                }
                wh = wh.normalize();
                let f = fresnel.evaluate(wi.dot(&wh));
                *r * distribution.d(&wh) * distribution.g(wo, wi) * f
                    / (4.0 * cos_theta_i * cos_theta_o)
            }
            BxDf::MicrofacetTransmission {
                t,
                distribution,
                eta_a,
                eta_b,
                mode,
            } => {
                if same_hemisphere(wo, wi) {
                    return Spectrum::black();
                }
                let cos_theta_o = cos_theta(wo);
                let cos_theta_i = cos_theta(wi);
                if cos_theta_o == 0.0 || cos_theta_i == 0.0 {
                    return Spectrum::black();
                }
                // Generalized half vector for refraction
                let eta = if cos_theta_o > 0.0 {
                    eta_b / eta_a
                } else {
                    eta_a / eta_b
                };
                let mut wh = (*wo + *wi * eta).normalize();
                if wh.z < 0.0 {
                    wh = -wh;
                }
                if wo.dot(&wh) * wi.dot(&wh) > 0.0 {
                    return Spectrum::black();
                }
                let f = fr_dielectric(wo.dot(&wh), *eta_a, *eta_b);
                let sqrt_denom = wo.dot(&wh) + eta * wi.dot(&wh);
                let factor = if *mode == TransportMode::Radiance {
                    1.0 / eta
                } else {
                    1.0
                };
                *t * (1.0 - f)
                    * ((distribution.d(&wh)
                        * distribution.g(wo, wi)
                        * eta
                        * eta
                        * wi.abs_dot(&wh)
                        * wo.abs_dot(&wh)
                        * factor
                        * factor)
                        / (cos_theta_i * cos_theta_o * sqrt_denom * sqrt_denom))
                        .abs()
            }
            BxDf::BssrdfAdapter { eta } => {
                // Directional factor Sw of the separable BSSRDF
                let c = 1.0 - 2.0 * fresnel_moment1(1.0 / eta);
                let ft = fr_dielectric(cos_theta(wi), 1.0, *eta);
                Spectrum::grey((1.0 - ft) / (c * std::f32::consts::PI))
            }
        }
    }

    /// Sample an incoming direction; returns `(f, wi, pdf, sampled_type)`.
    pub fn sample_f(&self, wo: &Vector3f, u: &Point2f) -> (Spectrum, Vector3f, f32, BxDFType) {
        match self {
            BxDf::LambertianReflection { .. } | BxDf::BssrdfAdapter { .. } => {
                let mut wi = cosine_sample_hemisphere(*u);
                if wo.z < 0.0 {
                    wi.z = -wi.z;
                }
                let pdf = self.pdf(wo, &wi);
                (self.f(wo, &wi), wi, pdf, self.get_type())
            }
            BxDf::LambertianTransmission { .. } => {
                let mut wi = cosine_sample_hemisphere(*u);
                if wo.z > 0.0 {
                    wi.z = -wi.z;
                }
                let pdf = self.pdf(wo, &wi);
                (self.f(wo, &wi), wi, pdf, self.get_type())
            }
            BxDf::SpecularReflection { r, fresnel } => {
                // Only one feasible direction; unit probability mass.
                let wi = Vector3f::new(-wo.x, -wo.y, wo.z);
                let f = fresnel.evaluate(cos_theta(&wi)) * *r / abs_cos_theta(&wi);
                (f, wi, 1.0, self.get_type())
            }
            BxDf::SpecularTransmission {
                t,
                eta_a,
                eta_b,
                mode,
            } => {
                let entering = cos_theta(wo) > 0.0;
                let (eta_i, eta_t) = if entering {
                    (*eta_a, *eta_b)
                } else {
                    (*eta_b, *eta_a)
                };
                let n = if wo.z > 0.0 {
                    Normal3f::new(0.0, 0.0, 1.0)
                } else {
                    Normal3f::new(0.0, 0.0, -1.0)
                };
                match refract(wo, &n, eta_i / eta_t) {
                    Some(wi) => {
                        let mut ft =
                            *t * (1.0 - fr_dielectric(cos_theta(&wi), *eta_a, *eta_b));
                        // Radiance scales by eta^2 across an interface
                        if *mode == TransportMode::Radiance {
                            ft *= (eta_i * eta_i) / (eta_t * eta_t);
                        }
                        (ft / abs_cos_theta(&wi), wi, 1.0, self.get_type())
                    }
                    None => (Spectrum::black(), Vector3f::new(0.0, 0.0, 0.0), 0.0, self.get_type()),
                }
            }
            BxDf::FresnelSpecular {
                r,
                t,
                eta_a,
                eta_b,
                mode,
            } => {
                let fr = fr_dielectric(cos_theta(wo), *eta_a, *eta_b);
                if u[0] < fr {
                    let wi = Vector3f::new(-wo.x, -wo.y, wo.z);
                    let sampled = BxDFType::BSDF_SPECULAR | BxDFType::BSDF_REFLECTION;
                    (*r * fr / abs_cos_theta(&wi), wi, fr, sampled)
                } else {
                    let entering = cos_theta(wo) > 0.0;
                    let (eta_i, eta_t) = if entering {
                        (*eta_a, *eta_b)
                    } else {
                        (*eta_b, *eta_a)
                    };
                    let n = if wo.z > 0.0 {
                        Normal3f::new(0.0, 0.0, 1.0)
                    } else {
                        Normal3f::new(0.0, 0.0, -1.0)
                    };
                    match refract(wo, &n, eta_i / eta_t) {
                        Some(wi) => {
                            let mut ft = *t * (1.0 - fr);
                            if *mode == TransportMode::Radiance {
                                ft *= (eta_i * eta_i) / (eta_t * eta_t);
                            }
                            let sampled =
                                BxDFType::BSDF_SPECULAR | BxDFType::BSDF_TRANSMISSION;
                            (ft / abs_cos_theta(&wi), wi, 1.0 - fr, sampled)
                        }
                        None => (
                            Spectrum::black(),
                            Vector3f::new(0.0, 0.0, 0.0),
                            0.0,
                            self.get_type(),
                        ),
                    }
                }
            }
            BxDf::MicrofacetReflection { distribution, .. } => {
                if wo.z == 0.0 {
                    return (Spectrum::black(), Vector3f::new(0.0, 0.0, 0.0), 0.0, self.get_type());
                }
                let wh = distribution.sample_wh(wo, u);
                if wo.dot(&wh) < 0.0 {
                    return (Spectrum::black(), Vector3f::new(0.0, 0.0, 0.0), 0.0, self.get_type());
                }
                let wi = reflect(wo, &wh);
                if !same_hemisphere(wo, &wi) {
                    return (Spectrum::black(), wi, 0.0, self.get_type());
                }
                // Half-vector pdf converted by the reflection jacobian
                let pdf = distribution.pdf(wo, &wh) / (4.0 * wo.dot(&wh));
                (self.f(wo, &wi), wi, pdf, self.get_type())
            }
            BxDf::MicrofacetTransmission {
                distribution,
                eta_a,
                eta_b,
                ..
            } => {
                if wo.z == 0.0 {
                    return (Spectrum::black(), Vector3f::new(0.0, 0.0, 0.0), 0.0, self.get_type());
                }
                let wh = distribution.sample_wh(wo, u);
                if wo.dot(&wh) < 0.0 {
                    return (Spectrum::black(), Vector3f::new(0.0, 0.0, 0.0), 0.0, self.get_type());
                }
                let eta = if cos_theta(wo) > 0.0 {
                    eta_a / eta_b
                } else {
                    eta_b / eta_a
                };
                match refract(wo, &Normal3f::from(wh), eta) {
                    Some(wi) => {
                        let pdf = self.pdf(wo, &wi);
                        (self.f(wo, &wi), wi, pdf, self.get_type())
                    }
                    None => (Spectrum::black(), Vector3f::new(0.0, 0.0, 0.0), 0.0, self.get_type()),
                }
            }
        }
    }

    pub fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> f32 {
        match self {
            BxDf::LambertianReflection { .. } | BxDf::BssrdfAdapter { .. } => {
                if same_hemisphere(wo, wi) {
                    abs_cos_theta(wi) * INV_PI
                } else {
                    0.0
                }
            }
            BxDf::LambertianTransmission { .. } => {
                if same_hemisphere(wo, wi) {
                    0.0
                } else {
                    abs_cos_theta(wi) * INV_PI
                }
            }
            BxDf::SpecularReflection { .. }
            | BxDf::SpecularTransmission { .. }
            | BxDf::FresnelSpecular { .. } => 0.0,
            BxDf::MicrofacetReflection { distribution, .. } => {
                if !same_hemisphere(wo, wi) {
                    return 0.0;
                }
                let wh = (*wo + *wi).normalize();
                distribution.pdf(wo, &wh) / (4.0 * wo.dot(&wh))
            }
            BxDf::MicrofacetTransmission {
                distribution,
                eta_a,
                eta_b,
                ..
            } => {
                if same_hemisphere(wo, wi) {
                    return 0.0;
                }
                let eta = if cos_theta(wo) > 0.0 {
                    eta_b / eta_a
                } else {
                    eta_a / eta_b
                };
                let wh = (*wo + *wi * eta).normalize();
                if wo.dot(&wh) * wi.dot(&wh) > 0.0 {
                    return 0.0;
                }
                // |dwh/dwi| for the refractive mapping
                let sqrt_denom = wo.dot(&wh) + eta * wi.dot(&wh);
                let dwh_dwi = ((eta * eta * wi.dot(&wh)) / (sqrt_denom * sqrt_denom)).abs();
                distribution.pdf(wo, &wh) * dwh_dwi
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    fn random_dir(rng: &mut Rng, upper: bool) -> Vector3f {
        let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
        let mut w = cosine_sample_hemisphere(u);
        if !upper {
            w.z = -w.z;
        }
        w
    }

    #[test]
    fn test_f_nonnegative() {
        let mut rng = Rng::with_seed(17);
        let bxdfs = [
            BxDf::LambertianReflection {
                r: Spectrum::grey(0.7),
            },
            BxDf::LambertianTransmission {
                t: Spectrum::grey(0.4),
            },
            BxDf::MicrofacetReflection {
                r: Spectrum::grey(0.9),
                distribution: MicrofacetDistribution::trowbridge_reitz(0.2, 0.2),
                fresnel: Fresnel::dielectric(1.0, 1.5),
            },
            BxDf::MicrofacetTransmission {
                t: Spectrum::grey(0.9),
                distribution: MicrofacetDistribution::trowbridge_reitz(0.2, 0.2),
                eta_a: 1.0,
                eta_b: 1.5,
                mode: TransportMode::Radiance,
            },
        ];
        for bxdf in &bxdfs {
            for _ in 0..200 {
                let wo = random_dir(&mut rng, true);
                let flip = rng.uniform_f32() < 0.5;
                let wi = random_dir(&mut rng, flip);
                let f = bxdf.f(&wo, &wi);
                assert!(f.r >= 0.0 && f.g >= 0.0 && f.b >= 0.0, "{:?}", bxdf);
            }
        }
    }

    #[test]
    fn test_reciprocity() {
        let mut rng = Rng::with_seed(23);
        let bxdfs = [
            BxDf::LambertianReflection {
                r: Spectrum::grey(0.7),
            },
            BxDf::MicrofacetReflection {
                r: Spectrum::grey(0.9),
                distribution: MicrofacetDistribution::beckmann(0.3, 0.3),
                fresnel: Fresnel::NoOp,
            },
        ];
        for bxdf in &bxdfs {
            for _ in 0..200 {
                let wo = random_dir(&mut rng, true);
                let wi = random_dir(&mut rng, true);
                let f1 = bxdf.f(&wo, &wi);
                let f2 = bxdf.f(&wi, &wo);
                assert!((f1.r - f2.r).abs() < 1e-5);
                assert!((f1.g - f2.g).abs() < 1e-5);
                assert!((f1.b - f2.b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_specular_reflection_mirror_direction() {
        let bxdf = BxDf::SpecularReflection {
            r: Spectrum::white(),
            fresnel: Fresnel::NoOp,
        };
        let wo = Vector3f::new(0.5, -0.1, 0.6).normalize();
        let (f, wi, pdf, ty) = bxdf.sample_f(&wo, &Point2f::new(0.5, 0.5));
        assert_eq!(pdf, 1.0);
        assert!(ty.contains(BxDFType::BSDF_SPECULAR));
        assert!((wi.x + wo.x).abs() < 1e-6);
        assert!((wi.y + wo.y).abs() < 1e-6);
        assert!((wi.z - wo.z).abs() < 1e-6);
        assert!(!f.is_black());
        // f() is zero for any continuous direction
        assert!(bxdf.f(&wo, &wi).is_black());
        assert_eq!(bxdf.pdf(&wo, &wi), 0.0);
    }

    #[test]
    fn test_lambertian_pdf_integrates_to_one() {
        // MC estimate of ∫ pdf dω over the sphere using uniform sampling
        let bxdf = BxDf::LambertianReflection {
            r: Spectrum::grey(0.5),
        };
        let wo = Vector3f::new(0.0, 0.0, 1.0);
        let mut rng = Rng::with_seed(31);
        let n = 50_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let w = crate::sampling::uniform_sample_sphere(u);
            sum += bxdf.pdf(&wo, &w) / crate::sampling::uniform_sphere_pdf();
        }
        let estimate = sum / n as f32;
        assert!((estimate - 1.0).abs() < 0.02, "estimate = {}", estimate);
    }

    #[test]
    fn test_hemispherical_reflectance_matches_albedo() {
        // rho_hd for a Lambertian surface equals its reflectance
        let r = 0.63;
        let bxdf = BxDf::LambertianReflection {
            r: Spectrum::grey(r),
        };
        let wo = Vector3f::new(0.2, 0.1, 0.95).normalize();
        let mut rng = Rng::with_seed(37);
        let n = 20_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let (f, wi, pdf, _) = bxdf.sample_f(&wo, &u);
            if pdf > 0.0 {
                sum += f.r * abs_cos_theta(&wi) / pdf;
            }
        }
        let estimate = sum / n as f32;
        assert!((estimate - r).abs() < 0.01, "estimate = {}", estimate);
    }

    #[test]
    fn test_fresnel_specular_energy_split() {
        let bxdf = BxDf::FresnelSpecular {
            r: Spectrum::white(),
            t: Spectrum::white(),
            eta_a: 1.0,
            eta_b: 1.5,
            mode: TransportMode::Radiance,
        };
        let wo = Vector3f::new(0.0, 0.0, 1.0);
        // Low u picks reflection, high u picks transmission
        let (_, wi_r, _, ty_r) = bxdf.sample_f(&wo, &Point2f::new(0.0, 0.0));
        assert!(ty_r.contains(BxDFType::BSDF_REFLECTION));
        assert!(wi_r.z > 0.0);
        let (_, wi_t, _, ty_t) = bxdf.sample_f(&wo, &Point2f::new(0.99, 0.0));
        assert!(ty_t.contains(BxDFType::BSDF_TRANSMISSION));
        assert!(wi_t.z < 0.0);
    }
}
