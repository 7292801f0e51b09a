use std::f32::consts::PI;
use std::sync::Arc;

use crate::bsdf::{fr_dielectric, Bsdf, BxDf};
use crate::geometry::{cos_theta, distance};
use crate::interaction::{Interaction, SurfaceInteraction};
use crate::scene::Scene;
use crate::spectrum::{Spectrum, SPECTRUM_CHANNELS};
use crate::{clamp, find_interval, min, Normal3f, Point2f, Point3f, Vector3f};

// -----------------------------------------------------------------------------
// Fresnel moments
// -----------------------------------------------------------------------------

pub fn fresnel_moment1(eta: f32) -> f32 {
    let eta2 = eta * eta;
    let eta3 = eta2 * eta;
    let eta4 = eta3 * eta;
    let eta5 = eta4 * eta;
    if eta < 1.0 {
        0.45966 - 1.73965 * eta + 3.37668 * eta2 - 3.904945 * eta3 + 2.49277 * eta4
            - 0.68441 * eta5
    } else {
        -4.61686 + 11.1136 * eta - 10.4646 * eta2 + 5.11455 * eta3 - 1.27198 * eta4
            + 0.12746 * eta5
    }
}

pub fn fresnel_moment2(eta: f32) -> f32 {
    let eta2 = eta * eta;
    let eta3 = eta2 * eta;
    let eta4 = eta3 * eta;
    let eta5 = eta4 * eta;
    if eta < 1.0 {
        0.27614 - 0.87350 * eta + 1.12077 * eta2 - 0.65095 * eta3 - 0.07883 * eta4
            + 0.04860 * eta5
    } else {
        -547.033 + 45.3087 / eta3 - 218.725 / eta2 + 458.843 / eta + 404.557 * eta
            - 189.519 * eta2
            + 54.9327 * eta3
            - 9.00603 * eta4
            + 0.63942 * eta5
    }
}

// -----------------------------------------------------------------------------
// Catmull-Rom interpolation
// -----------------------------------------------------------------------------

/// Weights of the four control points bracketing `x`. Returns the offset of
/// the first control point, or `None` when `x` is outside the node range.
pub fn catmull_rom_weights(nodes: &[f32], x: f32) -> Option<(isize, [f32; 4])> {
    let size = nodes.len();
    if !(x >= nodes[0] && x <= nodes[size - 1]) {
        return None;
    }
    let idx = find_interval(size, |i| nodes[i] <= x);
    let offset = idx as isize - 1;
    let x0 = nodes[idx];
    let x1 = nodes[idx + 1];
    let t = (x - x0) / (x1 - x0);
    let t2 = t * t;
    let t3 = t2 * t;

    let mut weights = [0.0f32; 4];
    weights[1] = 2.0 * t3 - 3.0 * t2 + 1.0;
    weights[2] = -2.0 * t3 + 3.0 * t2;

    if idx > 0 {
        let w0 = (t3 - 2.0 * t2 + t) * (x1 - x0) / (x1 - nodes[idx - 1]);
        weights[0] = -w0;
        weights[2] += w0;
    } else {
        let w0 = t3 - 2.0 * t2 + t;
        weights[0] = 0.0;
        weights[1] -= w0;
        weights[2] += w0;
    }
    if idx + 2 < size {
        let w3 = (t3 - t2) * (x1 - x0) / (nodes[idx + 2] - x0);
        weights[3] = w3;
        weights[1] -= w3;
    } else {
        let w3 = t3 - t2;
        weights[1] -= w3;
        weights[2] += w3;
        weights[3] = 0.0;
    }

    Some((offset, weights))
}

/// Definite integral of the interpolating spline; fills the running CDF.
pub fn integrate_catmull_rom(x: &[f32], values: &[f32], cdf: &mut [f32]) -> f32 {
    let n = x.len();
    let mut sum = 0.0;
    cdf[0] = 0.0;
    for i in 0..n - 1 {
        let x0 = x[i];
        let x1 = x[i + 1];
        let f0 = values[i];
        let f1 = values[i + 1];
        let width = x1 - x0;

        let d0 = if i > 0 {
            width * (f1 - values[i - 1]) / (x1 - x[i - 1])
        } else {
            f1 - f0
        };
        let d1 = if i + 2 < n {
            width * (values[i + 2] - f0) / (x[i + 2] - x0)
        } else {
            f1 - f0
        };

        sum += ((d0 - d1) * (1.0 / 12.0) + (f0 + f1) * 0.5) * width;
        cdf[i + 1] = sum;
    }
    sum
}

/// Invert the spline through `(x, values)` at level `u` by Newton-bisection.
pub fn invert_catmull_rom(x: &[f32], values: &[f32], u: f32) -> f32 {
    let n = x.len();
    if u <= values[0] {
        return x[0];
    } else if u >= values[n - 1] {
        return x[n - 1];
    }
    let i = find_interval(n, |i| values[i] <= u);
    let x0 = x[i];
    let x1 = x[i + 1];
    let f0 = values[i];
    let f1 = values[i + 1];
    let width = x1 - x0;

    let d0 = if i > 0 {
        width * (f1 - values[i - 1]) / (x1 - x[i - 1])
    } else {
        f1 - f0
    };
    let d1 = if i + 2 < n {
        width * (values[i + 2] - f0) / (x[i + 2] - x0)
    } else {
        f1 - f0
    };

    let mut a = 0.0f32;
    let mut b = 1.0f32;
    let mut t = 0.5f32;
    loop {
        if !(t > a && t < b) {
            t = 0.5 * (a + b);
        }
        let t2 = t * t;
        let t3 = t2 * t;
        let fhat = (2.0 * t3 - 3.0 * t2 + 1.0) * f0
            + (-2.0 * t3 + 3.0 * t2) * f1
            + (t3 - 2.0 * t2 + t) * d0
            + (t3 - t2) * d1;
        let dfhat = (6.0 * t2 - 6.0 * t) * f0 + (-6.0 * t2 + 6.0 * t) * f1
            + (3.0 * t2 - 4.0 * t + 1.0) * d0
            + (3.0 * t2 - 2.0 * t) * d1;
        if (fhat - u).abs() < 1e-6 || b - a < 1e-6 {
            break;
        }
        if fhat - u < 0.0 {
            a = t;
        } else {
            b = t;
        }
        t -= (fhat - u) / dfhat;
    }
    x0 + t * width
}

/// Sample the second dimension of a 2D tabulated function whose first
/// dimension is interpolated at `alpha`. Returns `(sample, fval, pdf)`.
pub fn sample_catmull_rom_2d(
    nodes1: &[f32],
    nodes2: &[f32],
    values: &[f32],
    cdf: &[f32],
    alpha: f32,
    u: f32,
) -> Option<(f32, f32, f32)> {
    let size2 = nodes2.len();
    let (offset, weights) = catmull_rom_weights(nodes1, alpha)?;

    // Interpolate a table column at the alpha weights
    let interpolate = |array: &[f32], idx: usize| {
        let mut value = 0.0;
        for (i, w) in weights.iter().enumerate() {
            if *w != 0.0 {
                value += array[(offset + i as isize) as usize * size2 + idx] * w;
            }
        }
        value
    };

    // Map u to a spline interval, normalizing by the interpolated maximum
    let maximum = interpolate(cdf, size2 - 1);
    let mut u = u * maximum;
    let idx = find_interval(size2, |i| interpolate(cdf, i) <= u);

    let f0 = interpolate(values, idx);
    let f1 = interpolate(values, idx + 1);
    let x0 = nodes2[idx];
    let x1 = nodes2[idx + 1];
    let width = x1 - x0;

    // Re-scale u for the local spline segment
    u = (u - interpolate(cdf, idx)) / width;

    let d0 = if idx > 0 {
        width * (f1 - interpolate(values, idx - 1)) / (x1 - nodes2[idx - 1])
    } else {
        f1 - f0
    };
    let d1 = if idx + 2 < size2 {
        width * (interpolate(values, idx + 2) - f0) / (nodes2[idx + 2] - x0)
    } else {
        f1 - f0
    };

    // Invert the definite integral over the segment
    let mut t = if f0 != f1 {
        (f0 - (f0 * f0 + 2.0 * u * (f1 - f0)).max(0.0).sqrt()) / (f0 - f1)
    } else {
        u / f0
    };
    let mut a = 0.0f32;
    let mut b = 1.0f32;
    let fhat;
    loop {
        if !(t >= a && t <= b) {
            t = 0.5 * (a + b);
        }
        let big_f = t
            * (f0
                + t * (0.5 * d0
                    + t * ((1.0 / 3.0) * (-2.0 * d0 - d1) + f1 - f0
                        + t * (0.25 * (d0 + d1) + 0.5 * (f0 - f1)))));
        let small_f = f0
            + t * (d0
                + t * (-2.0 * d0 - d1 + 3.0 * (f1 - f0) + t * (d0 + d1 + 2.0 * (f0 - f1))));
        if (big_f - u).abs() < 1e-6 || b - a < 1e-6 {
            fhat = small_f;
            break;
        }
        if big_f - u < 0.0 {
            a = t;
        } else {
            b = t;
        }
        t -= (big_f - u) / small_f;
    }

    let fval = fhat;
    let pdf = if maximum > 0.0 { fhat / maximum } else { 0.0 };
    Some((x0 + width * t, fval, pdf))
}

// -----------------------------------------------------------------------------
// Beam diffusion profile
// -----------------------------------------------------------------------------

const BEAM_DIFFUSION_SAMPLES: usize = 100;

fn beam_diffusion_multiple_scatter(sigma_s: f32, sigma_a: f32, g: f32, eta: f32, r: f32) -> f32 {
    let sigmap_s = sigma_s * (1.0 - g);
    let sigmap_t = sigma_a + sigmap_s;
    let albedop = sigmap_s / sigmap_t;

    // Non-classical diffusion coefficient (Habel et al.)
    let d_g = (2.0 * sigma_a + sigmap_s) / (3.0 * sigmap_t * sigmap_t);
    let sigma_tr = (sigma_a / d_g).sqrt();

    let fm1 = fresnel_moment1(eta);
    let fm2 = fresnel_moment2(eta);
    let ze = -2.0 * d_g * (1.0 + 3.0 * fm2) / (1.0 - 2.0 * fm1);

    let c_phi = 0.25 * (1.0 - 2.0 * fm1);
    let c_e = 0.5 * (1.0 - 3.0 * fm2);

    let mut ed = 0.0;
    for i in 0..BEAM_DIFFUSION_SAMPLES {
        // Real point source depth sampled along the beam
        let zr = -(1.0 - (i as f32 + 0.5) / BEAM_DIFFUSION_SAMPLES as f32).ln() / sigmap_t;

        let zv = -zr + 2.0 * ze;
        let dr = (r * r + zr * zr).sqrt();
        let dv = (r * r + zv * zv).sqrt();

        let phi_d =
            (1.0 / (4.0 * PI * d_g)) * ((-sigma_tr * dr).exp() / dr - (-sigma_tr * dv).exp() / dv);

        let edn = (1.0 / (4.0 * PI))
            * (zr * (1.0 + sigma_tr * dr) * (-sigma_tr * dr).exp() / (dr * dr * dr)
                - zv * (1.0 + sigma_tr * dv) * (-sigma_tr * dv).exp() / (dv * dv * dv));

        let e = phi_d * c_phi + edn * c_e;
        let kappa = 1.0 - (-2.0 * sigmap_t * (dr + zr)).exp();
        ed += kappa * albedop * albedop * e;
    }
    ed / BEAM_DIFFUSION_SAMPLES as f32
}

fn beam_diffusion_single_scatter(sigma_s: f32, sigma_a: f32, g: f32, eta: f32, r: f32) -> f32 {
    let sigma_t = sigma_a + sigma_s;
    let albedo = sigma_s / sigma_t;
    let t_crit = r * (eta * eta - 1.0).max(0.0).sqrt();

    let mut ess = 0.0;
    for i in 0..BEAM_DIFFUSION_SAMPLES {
        let ti = t_crit
            - (1.0 - (i as f32 + 0.5) / BEAM_DIFFUSION_SAMPLES as f32).ln() / sigma_t;
        let d = (r * r + ti * ti).sqrt();
        let cos_theta_o = ti / d;

        ess += albedo * (-sigma_t * (d + t_crit)).exp() / (d * d)
            * crate::phase::hg_phase(cos_theta_o, g)
            * (1.0 - fr_dielectric(-cos_theta_o, 1.0, eta))
            * cos_theta_o.abs();
    }
    ess / BEAM_DIFFUSION_SAMPLES as f32
}

/// Tabulated `(albedo, optical radius) -> profile` with per-albedo CDFs and
/// effective albedos.
pub struct BssrdfTable {
    pub rho_samples: Vec<f32>,
    pub radius_samples: Vec<f32>,
    pub profile: Vec<f32>,
    pub rho_eff: Vec<f32>,
    pub profile_cdf: Vec<f32>,
}

impl BssrdfTable {
    pub fn new(n_rho_samples: usize, n_radius_samples: usize) -> BssrdfTable {
        BssrdfTable {
            rho_samples: vec![0.0; n_rho_samples],
            radius_samples: vec![0.0; n_radius_samples],
            profile: vec![0.0; n_rho_samples * n_radius_samples],
            rho_eff: vec![0.0; n_rho_samples],
            profile_cdf: vec![0.0; n_rho_samples * n_radius_samples],
        }
    }

    pub fn eval_profile(&self, rho_index: usize, radius_index: usize) -> f32 {
        self.profile[rho_index * self.radius_samples.len() + radius_index]
    }
}

/// Precompute the beam-diffusion profile table for the given asymmetry and
/// relative index of refraction.
pub fn compute_beam_diffusion_bssrdf(g: f32, eta: f32, t: &mut BssrdfTable) {
    let n_rho = t.rho_samples.len();
    let n_radius = t.radius_samples.len();

    t.radius_samples[0] = 0.0;
    t.radius_samples[1] = 2.5e-3;
    for i in 2..n_radius {
        t.radius_samples[i] = t.radius_samples[i - 1] * 1.2;
    }

    for i in 0..n_rho {
        t.rho_samples[i] =
            (1.0 - (-8.0 * i as f32 / (n_rho - 1) as f32).exp()) / (1.0 - (-8.0f32).exp());
    }

    for i in 0..n_rho {
        let rho = t.rho_samples[i];
        for j in 0..n_radius {
            let r = t.radius_samples[j];
            t.profile[i * n_radius + j] = 2.0
                * PI
                * r
                * (beam_diffusion_single_scatter(rho, 1.0 - rho, g, eta, r)
                    + beam_diffusion_multiple_scatter(rho, 1.0 - rho, g, eta, r));
        }
        let row_start = i * n_radius;
        let row: Vec<f32> = t.profile[row_start..row_start + n_radius].to_vec();
        let mut cdf_row = vec![0.0; n_radius];
        t.rho_eff[i] = integrate_catmull_rom(&t.radius_samples, &row, &mut cdf_row);
        t.profile_cdf[row_start..row_start + n_radius].copy_from_slice(&cdf_row);
    }
}

/// Invert the effective-albedo mapping: recover `(sigma_a, sigma_s)` from a
/// measured diffuse reflectance and mean free path.
pub fn subsurface_from_diffuse(
    t: &BssrdfTable,
    rho_eff: &Spectrum,
    mfp: &Spectrum,
) -> (Spectrum, Spectrum) {
    let mut sigma_a = Spectrum::black();
    let mut sigma_s = Spectrum::black();
    for c in 0..SPECTRUM_CHANNELS {
        let rho = invert_catmull_rom(&t.rho_samples, &t.rho_eff, rho_eff[c]);
        sigma_s[c] = rho / mfp[c];
        sigma_a[c] = (1.0 - rho) / mfp[c];
    }
    (sigma_a, sigma_s)
}

// -----------------------------------------------------------------------------
// Tabulated separable BSSRDF
// -----------------------------------------------------------------------------

/// Separable BSSRDF with a tabulated radial profile.
///
/// Owns copies of the exit-point geometry it needs so it can be stored on an
/// interaction without borrowing it.
#[derive(Clone)]
pub struct TabulatedBssrdf {
    po_p: Point3f,
    po_wo: Vector3f,
    ns: Normal3f,
    ss: Vector3f,
    ts: Vector3f,
    eta: f32,
    sigma_t: Spectrum,
    rho: Spectrum,
    table: Arc<BssrdfTable>,
    material_id: usize,
}

impl TabulatedBssrdf {
    pub fn new(
        po: &SurfaceInteraction<'_>,
        material_id: usize,
        eta: f32,
        sigma_a: &Spectrum,
        sigma_s: &Spectrum,
        table: Arc<BssrdfTable>,
    ) -> TabulatedBssrdf {
        let sigma_t = *sigma_a + *sigma_s;
        let mut rho = Spectrum::black();
        for c in 0..SPECTRUM_CHANNELS {
            rho[c] = if sigma_t[c] != 0.0 {
                sigma_s[c] / sigma_t[c]
            } else {
                0.0
            };
        }
        let ns = po.shading.n;
        let ss = po.shading.dpdu.normalize();
        TabulatedBssrdf {
            po_p: po.hit.p,
            po_wo: po.hit.wo,
            ns,
            ss,
            ts: Vector3f::from(ns).cross(&ss),
            eta,
            sigma_t,
            rho,
            table,
            material_id,
        }
    }

    pub fn eta(&self) -> f32 {
        self.eta
    }

    /// Full BSSRDF: Fresnel transmission at entry x spatial x directional.
    pub fn s(&self, pi: &SurfaceInteraction<'_>, wi: &Vector3f) -> Spectrum {
        let ft = fr_dielectric(self.po_wo.dotn(&self.ns), 1.0, self.eta);
        self.sp(pi) * self.sw(wi) * (1.0 - ft)
    }

    /// Directional factor at the exit point.
    pub fn sw(&self, wi: &Vector3f) -> Spectrum {
        let c = 1.0 - 2.0 * fresnel_moment1(1.0 / self.eta);
        let local = Vector3f::new(wi.dot(&self.ss), wi.dot(&self.ts), wi.dotn(&self.ns));
        let ft = fr_dielectric(cos_theta(&local), 1.0, self.eta);
        Spectrum::grey((1.0 - ft) / (c * PI))
    }

    pub fn sp(&self, pi: &SurfaceInteraction<'_>) -> Spectrum {
        self.sr(distance(&self.po_p, &pi.hit.p))
    }

    /// Radial profile at distance `r`, per channel.
    pub fn sr(&self, r: f32) -> Spectrum {
        let n_radius = self.table.radius_samples.len();
        let mut ret = Spectrum::black();
        for ch in 0..SPECTRUM_CHANNELS {
            // Convert into unitless optical radius
            let r_optical = r * self.sigma_t[ch];

            let rho_w = catmull_rom_weights(&self.table.rho_samples, self.rho[ch]);
            let rad_w = catmull_rom_weights(&self.table.radius_samples, r_optical);
            let ((rho_offset, rho_weights), (rad_offset, rad_weights)) = match (rho_w, rad_w) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };

            let mut sr = 0.0;
            for (i, wi) in rho_weights.iter().enumerate() {
                for (j, wj) in rad_weights.iter().enumerate() {
                    let weight = wi * wj;
                    if weight != 0.0 {
                        sr += self.table.eval_profile(
                            (rho_offset + i as isize) as usize,
                            (rad_offset + j as isize) as usize,
                        ) * weight;
                    }
                }
            }

            // Cancel the 2 pi r from the tabulated profile
            if r_optical != 0.0 {
                sr /= 2.0 * PI * r_optical;
            }
            ret[ch] = sr;
        }
        ret *= self.sigma_t * self.sigma_t;
        ret.clamp_positive()
    }

    /// Sample a radius for the given channel; negative means failure.
    pub fn sample_sr(&self, ch: usize, u: f32) -> f32 {
        if self.sigma_t[ch] == 0.0 {
            return -1.0;
        }
        match sample_catmull_rom_2d(
            &self.table.rho_samples,
            &self.table.radius_samples,
            &self.table.profile,
            &self.table.profile_cdf,
            self.rho[ch],
            u,
        ) {
            Some((r, _, _)) => r / self.sigma_t[ch],
            None => -1.0,
        }
    }

    pub fn pdf_sr(&self, ch: usize, r: f32) -> f32 {
        let r_optical = r * self.sigma_t[ch];

        let rho_w = catmull_rom_weights(&self.table.rho_samples, self.rho[ch]);
        let rad_w = catmull_rom_weights(&self.table.radius_samples, r_optical);
        let ((rho_offset, rho_weights), (rad_offset, rad_weights)) = match (rho_w, rad_w) {
            (Some(a), Some(b)) => (a, b),
            _ => return 0.0,
        };

        let mut sr = 0.0;
        let mut rho_eff = 0.0;
        for (i, wi) in rho_weights.iter().enumerate() {
            if *wi == 0.0 {
                continue;
            }
            rho_eff += self.table.rho_eff[(rho_offset + i as isize) as usize] * wi;
            for (j, wj) in rad_weights.iter().enumerate() {
                if *wj == 0.0 {
                    continue;
                }
                sr += self.table.eval_profile(
                    (rho_offset + i as isize) as usize,
                    (rad_offset + j as isize) as usize,
                ) * wi
                    * wj;
            }
        }
        if r_optical != 0.0 {
            sr /= 2.0 * PI * r_optical;
        }
        (sr * self.sigma_t[ch] * self.sigma_t[ch] / rho_eff).max(0.0)
    }

    /// Sample an exit point on the surface. On success the returned
    /// interaction carries the Lambertian exit adapter as its BSDF.
    pub fn sample_s<'a>(
        &self,
        scene: &'a Scene,
        u1: f32,
        u2: &Point2f,
    ) -> (Spectrum, f32, Option<SurfaceInteraction<'a>>) {
        let (sp, pdf, pi) = self.sample_sp(scene, u1, u2);
        if sp.is_black() || pdf == 0.0 {
            return (sp, pdf, None);
        }
        let mut pi = match pi {
            Some(pi) => pi,
            None => return (Spectrum::black(), 0.0, None),
        };

        // Attach the exit lobe so direct lighting and BSDF sampling at the
        // exit point see a Lambertian weighted by Sw.
        let mut bsdf = Bsdf::from_frame(pi.shading.n, pi.shading.dpdu, 1.0);
        bsdf.add(BxDf::BssrdfAdapter { eta: self.eta });
        pi.bsdf = Some(bsdf);
        pi.hit.wo = Vector3f::from(pi.shading.n);

        (sp, pdf, Some(pi))
    }

    fn sample_sp<'a>(
        &self,
        scene: &'a Scene,
        u1: f32,
        u2: &Point2f,
    ) -> (Spectrum, f32, Option<SurfaceInteraction<'a>>) {
        // Choose the projection frame: the normal axis carries half of the
        // probability mass, the two tangents a quarter each.
        let mut u1 = u1;
        let (vx, vy, vz);
        if u1 < 0.5 {
            vx = self.ss;
            vy = self.ts;
            vz = Vector3f::from(self.ns);
            u1 *= 2.0;
        } else if u1 < 0.75 {
            vx = self.ts;
            vy = Vector3f::from(self.ns);
            vz = self.ss;
            u1 = (u1 - 0.5) * 4.0;
        } else {
            vx = Vector3f::from(self.ns);
            vy = self.ss;
            vz = self.ts;
            u1 = (u1 - 0.75) * 4.0;
        }

        // Choose the spectral channel uniformly
        let ch = min(
            (u1 * SPECTRUM_CHANNELS as f32) as usize,
            SPECTRUM_CHANNELS - 1,
        );
        u1 = u1 * SPECTRUM_CHANNELS as f32 - ch as f32;

        // Sample a radius around po in the chosen plane
        let r = self.sample_sr(ch, u2[0]);
        if r < 0.0 {
            return (Spectrum::black(), 0.0, None);
        }
        let phi = 2.0 * PI * u2[1];

        let r_max = self.sample_sr(ch, 0.9999);
        if r_max < 0.0 || r >= r_max {
            return (Spectrum::black(), 0.0, None);
        }
        let l = 2.0 * (r_max * r_max - r * r).max(0.0).sqrt();

        // Probe segment through the surface
        let p_from = self.po_p + (vx * phi.cos() + vy * phi.sin()) * r - vz * (l * 0.5);
        let p_target = p_from + vz * l;

        // Enumerate candidate intersections with the same material
        let mut candidates: Vec<SurfaceInteraction<'a>> = Vec::new();
        let mut base = Interaction::from_point(&p_from);
        loop {
            let mut ray = base.spawn_ray_to(&p_target);
            if ray.d == Vector3f::new(0.0, 0.0, 0.0) {
                break;
            }
            match scene.intersect(&mut ray) {
                Some(isect) => {
                    base = isect.hit.clone();
                    if let Some(prim) = isect.primitive {
                        if prim.material_id() == self.material_id {
                            candidates.push(isect);
                        }
                    }
                    if candidates.len() >= 64 {
                        break;
                    }
                }
                None => break,
            }
        }

        if candidates.is_empty() {
            return (Spectrum::black(), 0.0, None);
        }

        // Select one candidate uniformly
        let n_found = candidates.len();
        let select = clamp((u1 * n_found as f32) as usize, 0, n_found - 1);
        let pi = candidates.swap_remove(select);

        let pdf = self.pdf_sp(&pi) / n_found as f32;
        (self.sp(&pi), pdf, Some(pi))
    }

    /// Marginal pdf of having sampled the exit point `pi`, averaged over the
    /// three projection axes and all channels.
    pub fn pdf_sp(&self, pi: &SurfaceInteraction<'_>) -> f32 {
        let d = self.po_p - pi.hit.p;
        let d_local = Vector3f::new(d.dot(&self.ss), d.dot(&self.ts), d.dotn(&self.ns));
        let n = pi.hit.n;
        let n_local = Normal3f::new(
            self.ss.dotn(&n),
            self.ts.dotn(&n),
            Vector3f::from(self.ns).dotn(&n),
        );

        let r_proj = [
            (d_local.y * d_local.y + d_local.z * d_local.z).sqrt(),
            (d_local.z * d_local.z + d_local.x * d_local.x).sqrt(),
            (d_local.x * d_local.x + d_local.y * d_local.y).sqrt(),
        ];
        let axis_prob = [0.25, 0.25, 0.5];
        let ch_prob = 1.0 / SPECTRUM_CHANNELS as f32;

        let mut pdf = 0.0;
        for (axis, r) in r_proj.iter().enumerate() {
            for ch in 0..SPECTRUM_CHANNELS {
                pdf += self.pdf_sr(ch, *r) * n_local[axis].abs() * ch_prob * axis_prob[axis];
            }
        }
        pdf
    }
}

// -----------------------------------------------------------------------------
// Classic dipole diffuse reflectance (used by the hierarchical integrator)
// -----------------------------------------------------------------------------

/// Dipole diffusion reflectance `Rd(r)` for a semi-infinite slab.
pub struct DiffusionReflectance {
    sigma_tr: Spectrum,
    alphap: Spectrum,
    zpos: Spectrum,
    zneg: Spectrum,
    fdr: f32,
}

impl DiffusionReflectance {
    pub fn new(sigma_a: &Spectrum, sigma_s: &Spectrum, eta: f32) -> DiffusionReflectance {
        let fdr = -1.440 / (eta * eta) + 0.710 / eta + 0.668 + 0.0636 * eta;
        let a = (1.0 + fdr) / (1.0 - fdr);
        let sigmap_t = *sigma_a + *sigma_s;
        let mut sigma_tr = Spectrum::black();
        let mut alphap = Spectrum::black();
        let mut zpos = Spectrum::black();
        let mut zneg = Spectrum::black();
        for c in 0..SPECTRUM_CHANNELS {
            sigma_tr[c] = (3.0 * sigma_a[c] * sigmap_t[c]).sqrt();
            alphap[c] = sigma_s[c] / sigmap_t[c];
            zpos[c] = 1.0 / sigmap_t[c];
            zneg[c] = zpos[c] * (1.0 + (4.0 / 3.0) * a);
        }
        DiffusionReflectance {
            sigma_tr,
            alphap,
            zpos,
            zneg,
            fdr,
        }
    }

    pub fn fdr(&self) -> f32 {
        self.fdr
    }

    pub fn eval(&self, p: &Point3f, po: &Point3f) -> Spectrum {
        let r2 = (*p - *po).length_squared();
        let mut rd = Spectrum::black();
        for c in 0..SPECTRUM_CHANNELS {
            let dpos = (r2 + self.zpos[c] * self.zpos[c]).sqrt();
            let dneg = (r2 + self.zneg[c] * self.zneg[c]).sqrt();
            rd[c] = self.alphap[c] / (4.0 * PI)
                * (self.zpos[c] * (self.sigma_tr[c] * dpos + 1.0)
                    * (-self.sigma_tr[c] * dpos).exp()
                    / (dpos * dpos * dpos)
                    + self.zneg[c]
                        * (self.sigma_tr[c] * dneg + 1.0)
                        * (-self.sigma_tr[c] * dneg).exp()
                        / (dneg * dneg * dneg));
        }
        rd.clamp_positive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catmull_rom_weights_partition_of_unity() {
        let nodes = [0.0, 1.0, 2.0, 3.0, 4.0];
        for i in 0..40 {
            let x = i as f32 * 0.1;
            let (_, w) = catmull_rom_weights(&nodes, x).unwrap();
            let sum: f32 = w.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "x={} sum={}", x, sum);
        }
        assert!(catmull_rom_weights(&nodes, -0.1).is_none());
        assert!(catmull_rom_weights(&nodes, 4.1).is_none());
    }

    #[test]
    fn test_integrate_catmull_rom_linear() {
        // Integral of f(x) = x over [0, 1] is 0.5
        let x: Vec<f32> = (0..=10).map(|i| i as f32 / 10.0).collect();
        let values = x.clone();
        let mut cdf = vec![0.0; x.len()];
        let total = integrate_catmull_rom(&x, &values, &mut cdf);
        assert!((total - 0.5).abs() < 1e-4, "total = {}", total);
        // CDF is monotone
        for w in cdf.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn test_invert_catmull_rom_roundtrip() {
        let x: Vec<f32> = (0..=20).map(|i| i as f32 / 20.0).collect();
        let values: Vec<f32> = x.iter().map(|v| v * v).collect();
        for i in 1..20 {
            let u = (i as f32 / 20.0) * (i as f32 / 20.0);
            let inv = invert_catmull_rom(&x, &values, u);
            assert!((inv * inv - u).abs() < 1e-3);
        }
    }

    #[test]
    fn test_fresnel_moments_plausible() {
        // Moments grow with eta above 1 and stay in (0, 1) nearby
        let m1 = fresnel_moment1(1.33);
        let m2 = fresnel_moment2(1.33);
        assert!(m1 > 0.0 && m1 < 1.0, "m1 = {}", m1);
        assert!(m2 > 0.0 && m2 < 1.0, "m2 = {}", m2);
    }

    #[test]
    fn test_beam_diffusion_table() {
        let mut table = BssrdfTable::new(16, 16);
        compute_beam_diffusion_bssrdf(0.0, 1.33, &mut table);
        // Radii grow geometrically, albedos monotonically
        for w in table.radius_samples.windows(2) {
            assert!(w[1] > w[0]);
        }
        for w in table.rho_samples.windows(2) {
            assert!(w[1] > w[0]);
        }
        // Profiles are non-negative and effective albedo is below one
        assert!(table.profile.iter().all(|&p| p >= 0.0));
        for &e in &table.rho_eff {
            assert!(e >= 0.0 && e <= 1.05, "rho_eff = {}", e);
        }
    }

    #[test]
    fn test_dipole_rd_decays() {
        let rd = DiffusionReflectance::new(&Spectrum::grey(0.1), &Spectrum::grey(1.0), 1.3);
        let po = Point3f::new(0.0, 0.0, 0.0);
        let near = rd.eval(&Point3f::new(0.1, 0.0, 0.0), &po);
        let far = rd.eval(&Point3f::new(1.0, 0.0, 0.0), &po);
        assert!(near.gray() > far.gray());
    }
}
