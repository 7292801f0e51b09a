use std::f32::consts::PI;

use crate::geometry::{
    abs_cos_theta, cos2_phi, cos2_theta, cos_phi, cos_theta, same_hemisphere, sin2_phi, sin_phi,
    tan2_theta, tan_theta,
};
use crate::{erf, erf_inv, Point2f, Vector3f};

const SQRT_PI_INV: f32 = 0.564_189_58;

/// Map a perceptual roughness in `[0, 1]` to a distribution alpha.
/// Monotone; the input is floored at 1e-3.
pub fn roughness_to_alpha(roughness: f32) -> f32 {
    let roughness = roughness.max(1e-3);
    let x = roughness.ln();
    1.62142 + x * (0.819955 + x * (0.1734 + x * (0.0171201 + 0.000640711 * x)))
}

/// Microfacet normal distribution, Beckmann or GGX, with optional
/// visible-normal sampling.
#[derive(Copy, Clone, Debug)]
pub enum MicrofacetDistribution {
    Beckmann {
        alpha_x: f32,
        alpha_y: f32,
        sample_visible_area: bool,
    },
    TrowbridgeReitz {
        alpha_x: f32,
        alpha_y: f32,
        sample_visible_area: bool,
    },
}

impl MicrofacetDistribution {
    pub fn beckmann(alpha_x: f32, alpha_y: f32) -> MicrofacetDistribution {
        MicrofacetDistribution::Beckmann {
            alpha_x,
            alpha_y,
            sample_visible_area: true,
        }
    }

    pub fn trowbridge_reitz(alpha_x: f32, alpha_y: f32) -> MicrofacetDistribution {
        MicrofacetDistribution::TrowbridgeReitz {
            alpha_x,
            alpha_y,
            sample_visible_area: true,
        }
    }

    fn alphas(&self) -> (f32, f32) {
        match *self {
            MicrofacetDistribution::Beckmann {
                alpha_x, alpha_y, ..
            }
            | MicrofacetDistribution::TrowbridgeReitz {
                alpha_x, alpha_y, ..
            } => (alpha_x, alpha_y),
        }
    }

    fn sample_visible_area(&self) -> bool {
        match *self {
            MicrofacetDistribution::Beckmann {
                sample_visible_area,
                ..
            }
            | MicrofacetDistribution::TrowbridgeReitz {
                sample_visible_area,
                ..
            } => sample_visible_area,
        }
    }

    /// Differential area of microfacets oriented along `wh`.
    pub fn d(&self, wh: &Vector3f) -> f32 {
        let (alpha_x, alpha_y) = self.alphas();
        let tan2 = tan2_theta(wh);
        if tan2.is_infinite() {
            return 0.0;
        }
        let cos4 = cos2_theta(wh) * cos2_theta(wh);
        match self {
            MicrofacetDistribution::Beckmann { .. } => {
                let e = cos2_phi(wh) / (alpha_x * alpha_x) + sin2_phi(wh) / (alpha_y * alpha_y);
                (-tan2 * e).exp() / (PI * alpha_x * alpha_y * cos4)
            }
            MicrofacetDistribution::TrowbridgeReitz { .. } => {
                let e = (cos2_phi(wh) / (alpha_x * alpha_x)
                    + sin2_phi(wh) / (alpha_y * alpha_y))
                    * tan2;
                1.0 / (PI * alpha_x * alpha_y * cos4 * (1.0 + e) * (1.0 + e))
            }
        }
    }

    pub fn lambda(&self, w: &Vector3f) -> f32 {
        let (alpha_x, alpha_y) = self.alphas();
        let abs_tan_theta = tan_theta(w).abs();
        if abs_tan_theta.is_infinite() {
            return 0.0;
        }
        let alpha =
            (cos2_phi(w) * alpha_x * alpha_x + sin2_phi(w) * alpha_y * alpha_y).sqrt();
        match self {
            MicrofacetDistribution::Beckmann { .. } => {
                let a = 1.0 / (alpha * abs_tan_theta);
                if a >= 1.6 {
                    return 0.0;
                }
                // Rational approximation, valid on [0, 1.6]
                (1.0 - 1.259 * a + 0.396 * a * a) / (3.535 * a + 2.181 * a * a)
            }
            MicrofacetDistribution::TrowbridgeReitz { .. } => {
                let alpha2_tan2 = (alpha * abs_tan_theta) * (alpha * abs_tan_theta);
                (-1.0 + (1.0 + alpha2_tan2).sqrt()) / 2.0
            }
        }
    }

    pub fn g1(&self, w: &Vector3f) -> f32 {
        1.0 / (1.0 + self.lambda(w))
    }

    pub fn g(&self, wo: &Vector3f, wi: &Vector3f) -> f32 {
        1.0 / (1.0 + self.lambda(wo) + self.lambda(wi))
    }

    pub fn pdf(&self, wo: &Vector3f, wh: &Vector3f) -> f32 {
        if self.sample_visible_area() {
            self.d(wh) * self.g1(wo) * wo.abs_dot(wh) / abs_cos_theta(wo)
        } else {
            self.d(wh) * abs_cos_theta(wh)
        }
    }

    /// Sample a half vector from the distribution for the given outgoing
    /// direction.
    pub fn sample_wh(&self, wo: &Vector3f, u: &Point2f) -> Vector3f {
        let (alpha_x, alpha_y) = self.alphas();
        if !self.sample_visible_area() {
            let (tan2, phi) = match self {
                MicrofacetDistribution::Beckmann { .. } => {
                    if alpha_x == alpha_y {
                        let log_sample = (1.0 - u[0]).ln();
                        (-alpha_x * alpha_x * log_sample, 2.0 * PI * u[1])
                    } else {
                        let log_sample = (1.0 - u[0]).ln();
                        let mut phi =
                            (alpha_y / alpha_x * (2.0 * PI * u[1] + 0.5 * PI).tan()).atan();
                        if u[1] > 0.5 {
                            phi += PI;
                        }
                        let (sin_phi, cos_phi) = phi.sin_cos();
                        let e = cos_phi * cos_phi / (alpha_x * alpha_x)
                            + sin_phi * sin_phi / (alpha_y * alpha_y);
                        (-log_sample / e, phi)
                    }
                }
                MicrofacetDistribution::TrowbridgeReitz { .. } => {
                    if alpha_x == alpha_y {
                        (alpha_x * alpha_x * u[0] / (1.0 - u[0]), 2.0 * PI * u[1])
                    } else {
                        let mut phi =
                            (alpha_y / alpha_x * (2.0 * PI * u[1] + 0.5 * PI).tan()).atan();
                        if u[1] > 0.5 {
                            phi += PI;
                        }
                        let (sin_phi, cos_phi) = phi.sin_cos();
                        let alpha2 = 1.0
                            / (cos_phi * cos_phi / (alpha_x * alpha_x)
                                + sin_phi * sin_phi / (alpha_y * alpha_y));
                        (alpha2 * u[0] / (1.0 - u[0]), phi)
                    }
                }
            };
            let cos_t = 1.0 / (1.0 + tan2).sqrt();
            let sin_t = (1.0 - cos_t * cos_t).max(0.0).sqrt();
            let mut wh = Vector3f::new(phi.cos() * sin_t, phi.sin() * sin_t, cos_t);
            if !same_hemisphere(wo, &wh) {
                wh = -wh;
            }
            wh
        } else {
            let flip = wo.z < 0.0;
            let wo = if flip { -(*wo) } else { *wo };
            let wh = match self {
                MicrofacetDistribution::Beckmann { .. } => {
                    beckmann_sample(&wo, alpha_x, alpha_y, u[0], u[1])
                }
                MicrofacetDistribution::TrowbridgeReitz { .. } => {
                    trowbridge_reitz_sample(&wo, alpha_x, alpha_y, u[0], u[1])
                }
            };
            if flip {
                -wh
            } else {
                wh
            }
        }
    }
}

// Visible-normal sampling for Beckmann (Heitz/Jakob 2014): bisection on the
// inverse of the slope-space CDF.
fn beckmann_sample11(cos_theta_i: f32, u1: f32, u2: f32) -> (f32, f32) {
    // Normal incidence is the isotropic special case
    if cos_theta_i > 0.9999 {
        let r = (-(1.0 - u1).ln()).sqrt();
        let phi = 2.0 * PI * u2;
        return (r * phi.cos(), r * phi.sin());
    }

    let sin_theta_i = (1.0 - cos_theta_i * cos_theta_i).max(0.0).sqrt();
    let tan_theta_i = sin_theta_i / cos_theta_i;
    let cot_theta_i = 1.0 / tan_theta_i;

    let mut a = -1.0;
    let mut c = erf(cot_theta_i);
    let sample_x = u1.max(1e-6);

    let theta_i = cos_theta_i.acos();
    let fit = 1.0 + theta_i * (-0.876 + theta_i * (0.4265 - 0.0594 * theta_i));
    let mut b = c - (1.0 + c) * (1.0 - sample_x).powf(fit);

    let normalization =
        1.0 / (1.0 + c + SQRT_PI_INV * tan_theta_i * (-cot_theta_i * cot_theta_i).exp());

    for _ in 0..16 {
        if !(a..=c).contains(&b) {
            b = 0.5 * (a + c);
        }

        let xm = erf_inv(b);
        let value =
            normalization * (1.0 + b + SQRT_PI_INV * tan_theta_i * (-xm * xm).exp()) - sample_x;
        if value.abs() < 1e-6 {
            break;
        }
        let derivative = normalization * (1.0 - xm * tan_theta_i);

        if value > 0.0 {
            c = b;
        } else {
            a = b;
        }
        b -= value / derivative;
    }

    let slope_x = erf_inv(b);
    let slope_y = erf_inv(2.0 * u2.max(1e-6) - 1.0);
    (slope_x, slope_y)
}

fn beckmann_sample(wi: &Vector3f, alpha_x: f32, alpha_y: f32, u1: f32, u2: f32) -> Vector3f {
    // 1. Stretch wi
    let wi_stretched = Vector3f::new(alpha_x * wi.x, alpha_y * wi.y, wi.z).normalize();

    // 2. Sample the isotropic slope distribution
    let (mut slope_x, mut slope_y) = beckmann_sample11(cos_theta(&wi_stretched), u1, u2);

    // 3. Rotate
    let tmp = cos_phi(&wi_stretched) * slope_x - sin_phi(&wi_stretched) * slope_y;
    slope_y = sin_phi(&wi_stretched) * slope_x + cos_phi(&wi_stretched) * slope_y;
    slope_x = tmp;

    // 4. Unstretch
    slope_x *= alpha_x;
    slope_y *= alpha_y;

    // 5. Compute normal
    Vector3f::new(-slope_x, -slope_y, 1.0).normalize()
}

// Visible-normal sampling for GGX in slope space (Heitz/Dupuy).
fn trowbridge_reitz_sample11(cos_theta: f32, u1: f32, u2: f32) -> (f32, f32) {
    if cos_theta > 0.9999 {
        let r = (u1 / (1.0 - u1)).sqrt();
        let phi = 2.0 * PI * u2;
        return (r * phi.cos(), r * phi.sin());
    }

    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let tan_theta = sin_theta / cos_theta;
    let a = 1.0 / tan_theta;
    let g1 = 2.0 / (1.0 + (1.0 + 1.0 / (a * a)).sqrt());

    let aa = 2.0 * u1 / g1 - 1.0;
    let mut tmp = 1.0 / (aa * aa - 1.0);
    if tmp > 1e10 {
        tmp = 1e10;
    }
    let b = tan_theta;
    let d = (b * b * tmp * tmp - (aa * aa - b * b) * tmp).max(0.0).sqrt();
    let slope_x1 = b * tmp - d;
    let slope_x2 = b * tmp + d;
    let slope_x = if aa < 0.0 || slope_x2 > 1.0 / tan_theta {
        slope_x1
    } else {
        slope_x2
    };
    debug_assert!(slope_x.is_finite());

    let (s, u) = if u2 > 0.5 {
        (1.0, 2.0 * (u2 - 0.5))
    } else {
        (-1.0, 2.0 * (0.5 - u2))
    };
    let z = (u * (u * (u * 0.27385 - 0.73369) + 0.46341))
        / (u * (u * (u * 0.093073 + 0.309420) - 1.0) + 0.597999);
    let slope_y = s * z * (1.0 + slope_x * slope_x).sqrt();
    debug_assert!(slope_y.is_finite());

    (slope_x, slope_y)
}

fn trowbridge_reitz_sample(
    wi: &Vector3f,
    alpha_x: f32,
    alpha_y: f32,
    u1: f32,
    u2: f32,
) -> Vector3f {
    let wi_stretched = Vector3f::new(alpha_x * wi.x, alpha_y * wi.y, wi.z).normalize();

    let (mut slope_x, mut slope_y) = trowbridge_reitz_sample11(cos_theta(&wi_stretched), u1, u2);

    let tmp = cos_phi(&wi_stretched) * slope_x - sin_phi(&wi_stretched) * slope_y;
    slope_y = sin_phi(&wi_stretched) * slope_x + cos_phi(&wi_stretched) * slope_y;
    slope_x = tmp;

    slope_x *= alpha_x;
    slope_y *= alpha_y;

    Vector3f::new(-slope_x, -slope_y, 1.0).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    #[test]
    fn test_roughness_to_alpha_monotone() {
        let mut prev = roughness_to_alpha(0.0);
        for i in 1..=100 {
            let a = roughness_to_alpha(i as f32 / 100.0);
            assert!(a >= prev);
            prev = a;
        }
    }

    #[test]
    fn test_d_nonnegative() {
        let distribs = [
            MicrofacetDistribution::beckmann(0.2, 0.2),
            MicrofacetDistribution::trowbridge_reitz(0.3, 0.1),
        ];
        let mut rng = Rng::with_seed(10);
        for d in &distribs {
            for _ in 0..500 {
                let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
                let wh = crate::sampling::cosine_sample_hemisphere(u);
                assert!(d.d(&wh) >= 0.0);
            }
        }
    }

    #[test]
    fn test_sample_wh_same_hemisphere() {
        let distribs = [
            MicrofacetDistribution::beckmann(0.25, 0.25),
            MicrofacetDistribution::trowbridge_reitz(0.25, 0.25),
        ];
        let wo = Vector3f::new(0.3, -0.2, 0.8).normalize();
        let mut rng = Rng::with_seed(20);
        for d in &distribs {
            for _ in 0..500 {
                let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
                let wh = d.sample_wh(&wo, &u);
                assert!(wh.z > 0.0, "wh = {:?}", wh);
                assert!(d.pdf(&wo, &wh) > 0.0);
            }
        }
    }

    #[test]
    fn test_g1_bounded() {
        let d = MicrofacetDistribution::trowbridge_reitz(0.4, 0.4);
        let mut rng = Rng::with_seed(30);
        for _ in 0..500 {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let w = crate::sampling::cosine_sample_hemisphere(u);
            let g1 = d.g1(&w);
            assert!((0.0..=1.0).contains(&g1));
        }
    }
}
