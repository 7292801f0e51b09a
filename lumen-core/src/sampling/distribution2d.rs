use crate::sampling::Distribution1D;
use crate::{clamp, Point2f};

/// Piecewise-constant 2D distribution: one conditional distribution per row
/// plus a marginal over the rows.
#[derive(Debug, Clone)]
pub struct Distribution2D {
    p_conditional: Vec<Distribution1D>,
    p_marginal: Distribution1D,
}

impl Distribution2D {
    pub fn new(func: &[f32], nu: usize, nv: usize) -> Distribution2D {
        assert_eq!(func.len(), nu * nv);
        let p_conditional: Vec<Distribution1D> = (0..nv)
            .map(|v| Distribution1D::new(&func[v * nu..(v + 1) * nu]))
            .collect();
        let marginal_func: Vec<f32> = p_conditional.iter().map(|d| d.integral()).collect();
        let p_marginal = Distribution1D::new(&marginal_func);

        Distribution2D {
            p_conditional,
            p_marginal,
        }
    }

    /// Sample `(u, v)` in the unit square; returns the point and its pdf.
    pub fn sample_continuous(&self, u: &Point2f) -> (Point2f, f32) {
        let (d1, pdf1, v) = self.p_marginal.sample_continuous(u[1]);
        let (d0, pdf0, _) = self.p_conditional[v].sample_continuous(u[0]);
        (Point2f::new(d0, d1), pdf0 * pdf1)
    }

    pub fn pdf(&self, p: &Point2f) -> f32 {
        let nu = self.p_conditional[0].count();
        let nv = self.p_marginal.count();
        let iu = clamp((p[0] * nu as f32) as usize, 0, nu - 1);
        let iv = clamp((p[1] * nv as f32) as usize, 0, nv - 1);
        if self.p_marginal.integral() == 0.0 {
            return 0.0;
        }
        self.p_conditional[iv].func(iu) / self.p_marginal.integral()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    #[test]
    fn test_sample_in_unit_square() {
        let func: Vec<f32> = (0..16).map(|i| (i % 4) as f32 + 1.0).collect();
        let dist = Distribution2D::new(&func, 4, 4);
        let mut rng = Rng::with_seed(11);
        for _ in 0..500 {
            let u = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            let (p, pdf) = dist.sample_continuous(&u);
            assert!(p.x >= 0.0 && p.x < 1.0);
            assert!(p.y >= 0.0 && p.y < 1.0);
            assert!(pdf > 0.0);
        }
    }

    #[test]
    fn test_pdf_integrates_to_one() {
        // MC estimate of ∫ pdf du dv over the unit square equals 1
        let func: Vec<f32> = (0..64).map(|i| (i as f32).sin().abs() + 0.1).collect();
        let dist = Distribution2D::new(&func, 8, 8);
        let mut rng = Rng::with_seed(5);
        let n = 20_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let p = Point2f::new(rng.uniform_f32(), rng.uniform_f32());
            sum += dist.pdf(&p);
        }
        let estimate = sum / n as f32;
        assert!((estimate - 1.0).abs() < 0.05, "estimate = {}", estimate);
    }
}
