use crate::interaction::SurfaceInteraction;
use crate::texture::Texture;

pub struct ConstantTexture<T> {
    value: T,
}

impl<T> ConstantTexture<T> {
    pub fn new(value: T) -> ConstantTexture<T> {
        ConstantTexture { value }
    }
}

impl<T> Texture<T> for ConstantTexture<T>
where
    T: Copy + Send + Sync,
{
    fn evaluate(&self, _si: &SurfaceInteraction<'_>) -> T {
        self.value
    }
}
