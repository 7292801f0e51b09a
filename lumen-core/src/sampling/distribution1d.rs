use crate::{find_interval, min};

/// Piecewise-constant 1D distribution over `[0, 1)`.
#[derive(Debug, Clone, Default)]
pub struct Distribution1D {
    func: Vec<f32>,
    cdf: Vec<f32>,
    func_int: f32,
}

impl Distribution1D {
    pub fn new(f: &[f32]) -> Distribution1D {
        let n = f.len();
        assert!(n > 0, "Distribution1D needs a non-empty function");
        let func = Vec::from(f);
        let mut cdf = vec![0.0; n + 1];
        // Integral of the step function at each xi
        for i in 1..=n {
            cdf[i] = cdf[i - 1] + func[i - 1] / n as f32;
        }
        // Transform the step-function integral into a CDF
        let func_int = cdf[n];
        if func_int == 0.0 {
            for (i, c) in cdf.iter_mut().enumerate() {
                *c = i as f32 / n as f32;
            }
        } else {
            for c in cdf.iter_mut() {
                *c /= func_int;
            }
        }

        Distribution1D {
            func,
            cdf,
            func_int,
        }
    }

    pub fn count(&self) -> usize {
        self.func.len()
    }

    pub fn integral(&self) -> f32 {
        self.func_int
    }

    pub fn func(&self, i: usize) -> f32 {
        self.func[i]
    }

    /// Sample a continuous value in `[0, 1)`; returns `(x, pdf, offset)`.
    pub fn sample_continuous(&self, u: f32) -> (f32, f32, usize) {
        // Find surrounding CDF segments and offset
        let offset = find_interval(self.cdf.len(), |i| self.cdf[i] <= u);
        // Compute offset along CDF segment
        let mut du = u - self.cdf[offset];
        if self.cdf[offset + 1] - self.cdf[offset] > 0.0 {
            du /= self.cdf[offset + 1] - self.cdf[offset];
        }
        let pdf = if self.func_int > 0.0 {
            self.func[offset] / self.func_int
        } else {
            0.0
        };
        let x = (offset as f32 + du) / self.count() as f32;

        (x, pdf, offset)
    }

    /// Sample a bucket index; returns `(index, pdf)`.
    pub fn sample_discrete(&self, u: f32) -> (usize, f32) {
        let offset = find_interval(self.cdf.len(), |i| self.cdf[i] <= u);
        (offset, self.pdf_discrete(offset))
    }

    pub fn pdf_discrete(&self, i: usize) -> f32 {
        if self.func_int > 0.0 {
            self.func[i] / (self.func_int * self.count() as f32)
        } else {
            1.0 / self.count() as f32
        }
    }

    /// Pdf of the continuous distribution at `x` in `[0, 1)`.
    pub fn pdf_continuous(&self, x: f32) -> f32 {
        let i = min((x * self.count() as f32) as usize, self.count() - 1);
        if self.func_int > 0.0 {
            self.func[i] / self.func_int
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_is_mean() {
        let d = Distribution1D::new(&[1.0, 3.0, 2.0, 2.0]);
        // sum(func)/n == integral, exactly
        assert_eq!(d.integral(), (1.0 + 3.0 + 2.0 + 2.0) / 4.0);
    }

    #[test]
    fn test_sample_lands_in_expected_bin() {
        let d = Distribution1D::new(&[0.0, 1.0, 0.0, 0.0]);
        let (x0, pdf0, off0) = d.sample_continuous(0.0);
        assert_eq!(off0, 1);
        assert!(x0 >= 0.25 && x0 < 0.5);
        assert!(pdf0 > 0.0);

        let (x, _, off) = d.sample_continuous(0.5);
        assert_eq!(off, 1);
        assert!(x >= 0.25 && x < 0.5);

        let (_, _, off_hi) = d.sample_continuous(1.0 - 1e-6);
        assert_eq!(off_hi, 1);
    }

    #[test]
    fn test_discrete_pdfs_sum_to_one() {
        let d = Distribution1D::new(&[1.0, 2.0, 3.0, 4.0]);
        let total: f32 = (0..d.count()).map(|i| d.pdf_discrete(i)).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_function_falls_back_to_uniform() {
        let d = Distribution1D::new(&[0.0, 0.0, 0.0]);
        assert_eq!(d.integral(), 0.0);
        let (i, pdf) = d.sample_discrete(0.4);
        assert!(i < 3);
        assert!((pdf - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_discrete_sampling_proportions() {
        let d = Distribution1D::new(&[1.0, 0.0, 3.0]);
        let (i, pdf) = d.sample_discrete(0.1);
        assert_eq!(i, 0);
        assert!((pdf - 0.25).abs() < 1e-6);
        let (i, pdf) = d.sample_discrete(0.9);
        assert_eq!(i, 2);
        assert!((pdf - 0.75).abs() < 1e-6);
    }
}
