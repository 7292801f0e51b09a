use std::f32::consts::PI;

use crate::{coordinate_system, Point2f, Vector3f};

/// Henyey-Greenstein phase function value for the angle between two
/// directions.
pub fn hg_phase(cos_theta: f32, g: f32) -> f32 {
    let g2 = g * g;
    let denom = 1.0 + g2 - 2.0 * g * cos_theta;
    (1.0 / (4.0 * PI)) * (1.0 - g2) / (denom * denom.max(1e-7).sqrt())
}

/// Henyey-Greenstein phase function with asymmetry parameter `g`.
#[derive(Copy, Clone, Debug, Default)]
pub struct HenyeyGreenstein {
    g: f32,
}

impl HenyeyGreenstein {
    pub fn new(g: f32) -> HenyeyGreenstein {
        HenyeyGreenstein { g }
    }

    pub fn p(&self, wo: &Vector3f, wi: &Vector3f) -> f32 {
        hg_phase(wo.dot(wi), self.g)
    }

    /// Importance-sample an incoming direction; returns `(p, wi)`. The pdf
    /// equals the phase function value.
    pub fn sample_p(&self, wo: &Vector3f, u: &Point2f) -> (f32, Vector3f) {
        let cos_theta = if self.g.abs() < 1e-3 {
            1.0 - 2.0 * u[0]
        } else {
            let tmp = (1.0 - self.g * self.g) / (1.0 - self.g + 2.0 * self.g * u[0]);
            (1.0 + self.g * self.g - tmp * tmp) / (2.0 * self.g)
        };

        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = 2.0 * PI * u[1];
        let (v1, v2) = coordinate_system(wo);
        let wi = v1 * (phi.cos() * sin_theta) + v2 * (phi.sin() * sin_theta) - *wo * cos_theta;
        (hg_phase(-cos_theta, self.g), wi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;
    use crate::sampling::{uniform_sample_sphere, uniform_sphere_pdf};

    #[test]
    fn test_phase_normalizes_to_one() {
        // ∫ p dω == 1 for any g, by uniform MC over the sphere
        for &g in &[0.0, 0.3, -0.6] {
            let hg = HenyeyGreenstein::new(g);
            let wo = Vector3f::new(0.0, 0.0, 1.0);
            let mut rng = Rng::with_seed(g.to_bits() as u64 + 1);
            let n = 50_000;
            let mut sum = 0.0;
            for _ in 0..n {
                let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
                let wi = uniform_sample_sphere(u);
                sum += hg.p(&wo, &wi) / uniform_sphere_pdf();
            }
            let estimate = sum / n as f32;
            assert!((estimate - 1.0).abs() < 0.03, "g={} estimate={}", g, estimate);
        }
    }

    #[test]
    fn test_sample_p_value_matches_p() {
        let hg = HenyeyGreenstein::new(0.4);
        let wo = Vector3f::new(0.3, -0.5, 0.81).normalize();
        let mut rng = Rng::with_seed(99);
        for _ in 0..500 {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let (p, wi) = hg.sample_p(&wo, &u);
            assert!((wi.length() - 1.0).abs() < 1e-3);
            assert!((hg.p(&wo, &wi) - p).abs() < 1e-4);
        }
    }

    #[test]
    fn test_isotropic_is_uniform() {
        let hg = HenyeyGreenstein::new(0.0);
        let wo = Vector3f::new(0.0, 0.0, 1.0);
        let wi = Vector3f::new(1.0, 0.0, 0.0);
        assert!((hg.p(&wo, &wi) - 1.0 / (4.0 * PI)).abs() < 1e-6);
    }
}
