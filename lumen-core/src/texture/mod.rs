use crate::interaction::SurfaceInteraction;

mod checkerboard;
mod constant;

pub use self::checkerboard::CheckerboardTexture;
pub use self::constant::ConstantTexture;

pub trait Texture<T>: Send + Sync {
    fn evaluate(&self, si: &SurfaceInteraction<'_>) -> T;
}

pub type TextureFloat = dyn Texture<f32>;
pub type TextureSpectrum = dyn Texture<crate::spectrum::Spectrum>;
