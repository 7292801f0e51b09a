use std::fmt::{Display, Error, Formatter};
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub};

use num::{One, Zero};

use crate::clamp;

/// Number of radiometric channels carried by a `Spectrum`.
pub const SPECTRUM_CHANNELS: usize = 3;

/// A fixed three-channel (RGB) radiometric value.
#[derive(Debug, Copy, PartialEq, Clone, Default)]
pub struct Spectrum {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Spectrum {
    pub fn rgb(r: f32, g: f32, b: f32) -> Spectrum {
        Spectrum { r, g, b }
    }

    pub fn grey(v: f32) -> Spectrum {
        Spectrum { r: v, g: v, b: v }
    }

    pub fn white() -> Spectrum {
        Spectrum::grey(1.0)
    }

    pub fn black() -> Spectrum {
        Spectrum::grey(0.0)
    }

    /// True iff every channel is <= 0.
    pub fn is_black(&self) -> bool {
        self.r <= 0.0 && self.g <= 0.0 && self.b <= 0.0
    }

    pub fn has_nan(&self) -> bool {
        self.r.is_nan() || self.g.is_nan() || self.b.is_nan()
    }

    pub fn is_infinite(&self) -> bool {
        self.r.is_infinite() || self.g.is_infinite() || self.b.is_infinite()
    }

    /// Channel mean.
    pub fn gray(&self) -> f32 {
        (self.r + self.g + self.b) / 3.0
    }

    /// Photometric luminance.
    pub fn y(&self) -> f32 {
        0.212671 * self.r + 0.715160 * self.g + 0.072169 * self.b
    }

    pub fn max_component_value(&self) -> f32 {
        self.r.max(self.g).max(self.b)
    }

    pub fn sqrt(&self) -> Spectrum {
        Spectrum::rgb(self.r.sqrt(), self.g.sqrt(), self.b.sqrt())
    }

    pub fn exp(&self) -> Spectrum {
        Spectrum::rgb(self.r.exp(), self.g.exp(), self.b.exp())
    }

    pub fn clamp(&self, low: f32, high: f32) -> Spectrum {
        Spectrum::rgb(
            clamp(self.r, low, high),
            clamp(self.g, low, high),
            clamp(self.b, low, high),
        )
    }

    /// Clamp negatives away; keeps estimates non-negative after filtering.
    pub fn clamp_positive(&self) -> Spectrum {
        Spectrum::rgb(self.r.max(0.0), self.g.max(0.0), self.b.max(0.0))
    }

    pub fn to_srgb(&self) -> [u8; 3] {
        fn convert(v: f32) -> u8 {
            let v = clamp(v, 0.0, 1.0);
            let s = if v <= 0.0031308 {
                12.92 * v
            } else {
                1.055 * v.powf(1.0 / 2.4) - 0.055
            };
            (s * 255.0 + 0.5) as u8
        }
        [convert(self.r), convert(self.g), convert(self.b)]
    }
}

impl Add<Spectrum> for Spectrum {
    type Output = Spectrum;

    fn add(self, rhs: Spectrum) -> Spectrum {
        Spectrum::rgb(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b)
    }
}

impl AddAssign<Spectrum> for Spectrum {
    fn add_assign(&mut self, rhs: Spectrum) {
        self.r += rhs.r;
        self.g += rhs.g;
        self.b += rhs.b;
    }
}

impl Sub<Spectrum> for Spectrum {
    type Output = Spectrum;

    fn sub(self, rhs: Spectrum) -> Spectrum {
        Spectrum::rgb(self.r - rhs.r, self.g - rhs.g, self.b - rhs.b)
    }
}

impl Mul<Spectrum> for Spectrum {
    type Output = Spectrum;

    fn mul(self, rhs: Spectrum) -> Spectrum {
        Spectrum::rgb(self.r * rhs.r, self.g * rhs.g, self.b * rhs.b)
    }
}

impl MulAssign<Spectrum> for Spectrum {
    fn mul_assign(&mut self, rhs: Spectrum) {
        self.r *= rhs.r;
        self.g *= rhs.g;
        self.b *= rhs.b;
    }
}

impl Div<Spectrum> for Spectrum {
    type Output = Spectrum;

    fn div(self, rhs: Spectrum) -> Spectrum {
        Spectrum::rgb(self.r / rhs.r, self.g / rhs.g, self.b / rhs.b)
    }
}

impl Add<f32> for Spectrum {
    type Output = Spectrum;

    fn add(self, rhs: f32) -> Spectrum {
        Spectrum::rgb(self.r + rhs, self.g + rhs, self.b + rhs)
    }
}

impl Mul<f32> for Spectrum {
    type Output = Spectrum;

    fn mul(self, rhs: f32) -> Spectrum {
        Spectrum::rgb(self.r * rhs, self.g * rhs, self.b * rhs)
    }
}

impl Mul<Spectrum> for f32 {
    type Output = Spectrum;

    fn mul(self, rhs: Spectrum) -> Spectrum {
        rhs * self
    }
}

impl MulAssign<f32> for Spectrum {
    fn mul_assign(&mut self, rhs: f32) {
        self.r *= rhs;
        self.g *= rhs;
        self.b *= rhs;
    }
}

impl Div<f32> for Spectrum {
    type Output = Spectrum;

    fn div(self, rhs: f32) -> Spectrum {
        Spectrum::rgb(self.r / rhs, self.g / rhs, self.b / rhs)
    }
}

impl DivAssign<f32> for Spectrum {
    fn div_assign(&mut self, rhs: f32) {
        self.r /= rhs;
        self.g /= rhs;
        self.b /= rhs;
    }
}

impl Neg for Spectrum {
    type Output = Spectrum;

    fn neg(self) -> Spectrum {
        Spectrum::rgb(-self.r, -self.g, -self.b)
    }
}

impl Index<usize> for Spectrum {
    type Output = f32;

    fn index(&self, i: usize) -> &f32 {
        match i {
            0 => &self.r,
            1 => &self.g,
            2 => &self.b,
            _ => panic!("Invalid index into spectrum"),
        }
    }
}

impl IndexMut<usize> for Spectrum {
    fn index_mut(&mut self, i: usize) -> &mut f32 {
        match i {
            0 => &mut self.r,
            1 => &mut self.g,
            2 => &mut self.b,
            _ => panic!("Invalid index into spectrum"),
        }
    }
}

impl Zero for Spectrum {
    fn zero() -> Spectrum {
        Spectrum::black()
    }

    fn is_zero(&self) -> bool {
        self.is_black()
    }
}

impl One for Spectrum {
    fn one() -> Spectrum {
        Spectrum::white()
    }
}

impl Display for Spectrum {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "[{}, {}, {}]", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_black() {
        assert!(Spectrum::black().is_black());
        assert!(Spectrum::rgb(0.0, -1.0, 0.0).is_black());
        assert!(!Spectrum::rgb(0.0, 0.1, 0.0).is_black());
    }

    #[test]
    fn test_gray_is_mean() {
        let s = Spectrum::rgb(0.3, 0.6, 0.9);
        assert!((s.gray() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_exp_clamp() {
        let s = Spectrum::rgb(-1.0, 0.0, 1.0);
        let e = s.exp();
        assert!((e.r - (-1.0f32).exp()).abs() < 1e-6);
        let c = s.clamp_positive();
        assert_eq!(c.r, 0.0);
        assert_eq!(c.b, 1.0);
    }
}
