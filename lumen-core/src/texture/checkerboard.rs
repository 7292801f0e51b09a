use std::sync::Arc;

use crate::interaction::SurfaceInteraction;
use crate::texture::Texture;

/// 2D checkerboard over the surface uv parametrization.
pub struct CheckerboardTexture<T> {
    tex1: Arc<dyn Texture<T>>,
    tex2: Arc<dyn Texture<T>>,
    u_scale: f32,
    v_scale: f32,
}

impl<T> CheckerboardTexture<T> {
    pub fn new(
        tex1: Arc<dyn Texture<T>>,
        tex2: Arc<dyn Texture<T>>,
        u_scale: f32,
        v_scale: f32,
    ) -> CheckerboardTexture<T> {
        CheckerboardTexture {
            tex1,
            tex2,
            u_scale,
            v_scale,
        }
    }
}

impl<T> Texture<T> for CheckerboardTexture<T>
where
    T: Copy + Send + Sync,
{
    fn evaluate(&self, si: &SurfaceInteraction<'_>) -> T {
        let u = (si.uv.x * self.u_scale).floor() as i32;
        let v = (si.uv.y * self.v_scale).floor() as i32;
        if (u + v) % 2 == 0 {
            self.tex1.evaluate(si)
        } else {
            self.tex2.evaluate(si)
        }
    }
}
