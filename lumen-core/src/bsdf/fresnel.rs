use crate::clamp;
use crate::spectrum::Spectrum;

/// Fresnel reflectance for dielectrics. Handles rays leaving the surface by
/// swapping the indices; returns 1.0 on total internal reflection.
pub fn fr_dielectric(cos_theta_i: f32, eta_i: f32, eta_t: f32) -> f32 {
    let mut cos_theta_i = clamp(cos_theta_i, -1.0, 1.0);
    let (mut eta_i, mut eta_t) = (eta_i, eta_t);
    if cos_theta_i <= 0.0 {
        std::mem::swap(&mut eta_i, &mut eta_t);
        cos_theta_i = cos_theta_i.abs();
    }

    let sin_theta_i = (1.0 - cos_theta_i * cos_theta_i).max(0.0).sqrt();
    let sin_theta_t = eta_i / eta_t * sin_theta_i;
    if sin_theta_t >= 1.0 {
        // Total internal reflection
        return 1.0;
    }
    let cos_theta_t = (1.0 - sin_theta_t * sin_theta_t).max(0.0).sqrt();
    let r_parl = ((eta_t * cos_theta_i) - (eta_i * cos_theta_t))
        / ((eta_t * cos_theta_i) + (eta_i * cos_theta_t));
    let r_perp = ((eta_i * cos_theta_i) - (eta_t * cos_theta_t))
        / ((eta_i * cos_theta_i) + (eta_t * cos_theta_t));
    0.5 * (r_parl * r_parl + r_perp * r_perp)
}

/// Full complex Fresnel reflectance for conductors.
pub fn fr_conductor(
    cos_theta_i: f32,
    eta_i: &Spectrum,
    eta_t: &Spectrum,
    k: &Spectrum,
) -> Spectrum {
    let cos_theta_i = clamp(cos_theta_i, -1.0, 1.0);
    let eta = *eta_t / *eta_i;
    let eta_k = *k / *eta_i;

    let cos2_theta_i = cos_theta_i * cos_theta_i;
    let sin2_theta_i = 1.0 - cos2_theta_i;
    let eta2 = eta * eta;
    let eta_k2 = eta_k * eta_k;

    let t0 = eta2 - eta_k2 - Spectrum::grey(sin2_theta_i);
    let a2plusb2 = (t0 * t0 + 4.0 * eta2 * eta_k2).sqrt();
    let t1 = a2plusb2 + Spectrum::grey(cos2_theta_i);
    let a = ((a2plusb2 + t0) * 0.5).clamp_positive().sqrt();
    let t2 = a * (2.0 * cos_theta_i);
    let r_s = (t1 - t2) / (t1 + t2);

    let t3 = a2plusb2 * cos2_theta_i + Spectrum::grey(sin2_theta_i * sin2_theta_i);
    let t4 = t2 * sin2_theta_i;
    let r_p = r_s * (t3 - t4) / (t3 + t4);

    0.5 * (r_p + r_s)
}

/// Fresnel term of a BxDF, enumerated so components stay plain values.
#[derive(Copy, Clone, Debug)]
pub enum Fresnel {
    Dielectric { eta_i: f32, eta_t: f32 },
    Conductor {
        eta_i: Spectrum,
        eta_t: Spectrum,
        k: Spectrum,
    },
    /// Reflects everything; used by ideal mirrors.
    NoOp,
}

impl Fresnel {
    pub fn dielectric(eta_i: f32, eta_t: f32) -> Fresnel {
        Fresnel::Dielectric { eta_i, eta_t }
    }

    pub fn conductor(eta_i: Spectrum, eta_t: Spectrum, k: Spectrum) -> Fresnel {
        Fresnel::Conductor { eta_i, eta_t, k }
    }

    pub fn evaluate(&self, cos_theta_i: f32) -> Spectrum {
        match *self {
            Fresnel::Dielectric { eta_i, eta_t } => {
                Spectrum::grey(fr_dielectric(cos_theta_i, eta_i, eta_t))
            }
            Fresnel::Conductor {
                ref eta_i,
                ref eta_t,
                ref k,
            } => fr_conductor(cos_theta_i.abs(), eta_i, eta_t, k),
            Fresnel::NoOp => Spectrum::white(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_incidence() {
        // ((n-1)/(n+1))^2 at normal incidence
        let f = fr_dielectric(1.0, 1.0, 1.5);
        let expected = ((1.5f32 - 1.0) / (1.5 + 1.0)).powi(2);
        assert!((f - expected).abs() < 1e-5);
    }

    #[test]
    fn test_total_internal_reflection() {
        // Shallow angle from the dense side
        let f = fr_dielectric(-0.1, 1.0, 1.5);
        assert_eq!(f, 1.0);
    }

    #[test]
    fn test_fresnel_in_unit_range() {
        for i in 0..100 {
            let c = i as f32 / 99.0;
            let f = fr_dielectric(c, 1.0, 1.33);
            assert!((0.0..=1.0).contains(&f));
        }
    }

    #[test]
    fn test_conductor_nonnegative() {
        let eta = Spectrum::rgb(0.2, 0.92, 1.1);
        let k = Spectrum::rgb(3.9, 2.45, 2.14);
        for i in 1..10 {
            let c = i as f32 / 10.0;
            let f = fr_conductor(c, &Spectrum::white(), &eta, &k);
            assert!(f.r >= 0.0 && f.g >= 0.0 && f.b >= 0.0);
        }
    }
}
