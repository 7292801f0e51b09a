use crate::spectrum::Spectrum;
use crate::{Point2f, Point2i};

/// Image pyramid with bilinear lookup. Level 0 is the full-resolution image;
/// each level above halves both dimensions by box filtering.
pub struct MipMap {
    levels: Vec<Level>,
}

struct Level {
    width: usize,
    height: usize,
    texels: Vec<Spectrum>,
}

impl Level {
    fn texel(&self, x: i32, y: i32) -> Spectrum {
        // Repeat wrap
        let x = x.rem_euclid(self.width as i32) as usize;
        let y = y.rem_euclid(self.height as i32) as usize;
        self.texels[y * self.width + x]
    }

    fn bilinear(&self, st: &Point2f) -> Spectrum {
        let s = st.x * self.width as f32 - 0.5;
        let t = st.y * self.height as f32 - 0.5;
        let s0 = s.floor();
        let t0 = t.floor();
        let ds = s - s0;
        let dt = t - t0;
        let (x0, y0) = (s0 as i32, t0 as i32);
        self.texel(x0, y0) * (1.0 - ds) * (1.0 - dt)
            + self.texel(x0, y0 + 1) * (1.0 - ds) * dt
            + self.texel(x0 + 1, y0) * ds * (1.0 - dt)
            + self.texel(x0 + 1, y0 + 1) * ds * dt
    }
}

impl MipMap {
    pub fn new(resolution: &Point2i, texels: &[Spectrum]) -> MipMap {
        let width = resolution.x as usize;
        let height = resolution.y as usize;
        assert_eq!(texels.len(), width * height);

        let mut levels = vec![Level {
            width,
            height,
            texels: texels.to_vec(),
        }];
        while levels.last().unwrap().width > 1 || levels.last().unwrap().height > 1 {
            let prev = levels.last().unwrap();
            let w = (prev.width / 2).max(1);
            let h = (prev.height / 2).max(1);
            let mut data = Vec::with_capacity(w * h);
            for y in 0..h {
                for x in 0..w {
                    let sum = prev.texel(2 * x as i32, 2 * y as i32)
                        + prev.texel(2 * x as i32 + 1, 2 * y as i32)
                        + prev.texel(2 * x as i32, 2 * y as i32 + 1)
                        + prev.texel(2 * x as i32 + 1, 2 * y as i32 + 1);
                    data.push(sum / 4.0);
                }
            }
            levels.push(Level {
                width: w,
                height: h,
                texels: data,
            });
        }
        MipMap { levels }
    }

    pub fn width(&self) -> usize {
        self.levels[0].width
    }

    pub fn height(&self) -> usize {
        self.levels[0].height
    }

    /// Bilinear lookup at texture coordinates `st`, selecting the level
    /// whose texel footprint matches `width` in texture space.
    pub fn lookup(&self, st: &Point2f, width: f32) -> Spectrum {
        let n_levels = self.levels.len();
        let level = if width <= 0.0 {
            0.0
        } else {
            n_levels as f32 - 1.0 + width.max(1e-8).log2()
        };
        if level <= 0.0 {
            self.levels[0].bilinear(st)
        } else if level >= n_levels as f32 - 1.0 {
            let l = &self.levels[n_levels - 1];
            l.bilinear(st)
        } else {
            let l0 = level.floor() as usize;
            let d = level - l0 as f32;
            self.levels[l0].bilinear(st) * (1.0 - d) + self.levels[l0 + 1].bilinear(st) * d
        }
    }

    /// Mean radiance of the whole image.
    pub fn mean(&self) -> Spectrum {
        let top = self.levels.last().unwrap();
        let mut sum = Spectrum::black();
        for t in &top.texels {
            sum += *t;
        }
        sum / top.texels.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_image_lookup() {
        let texels = vec![Spectrum::grey(0.5); 16];
        let m = MipMap::new(&Point2i::new(4, 4), &texels);
        let v = m.lookup(&Point2f::new(0.3, 0.8), 0.0);
        assert!((v.r - 0.5).abs() < 1e-5);
        assert!((m.mean().r - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_pyramid_depth() {
        let texels = vec![Spectrum::white(); 8 * 4];
        let m = MipMap::new(&Point2i::new(8, 4), &texels);
        assert_eq!(m.width(), 8);
        assert_eq!(m.height(), 4);
        // 8x4 -> 4x2 -> 2x1 -> 1x1
        assert_eq!(m.levels.len(), 4);
    }
}
