use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::bounds::{Bounds2f, Bounds3f};
use crate::spectrum::Spectrum;
use crate::transform::Transform;
use crate::{Normal3f, Point2f, Point3f, Vector2f, Vector3f};

/// A typed parameter value.
#[derive(Clone, Debug)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
    Point2(Point2f),
    Vector2(Vector2f),
    Bounds2(Bounds2f),
    Point3(Point3f),
    Vector3(Vector3f),
    Normal3(Normal3f),
    Bounds3(Bounds3f),
    Spectrum(Spectrum),
    Transform(Transform),
}

/// Key/value store handed to the integrators. Lookups of missing required
/// keys are setup errors; unknown keys are simply ignored.
#[derive(Clone, Default)]
pub struct RenderParams {
    values: HashMap<String, ParamValue>,
}

macro_rules! accessors {
    ($get:ident, $get_or:ident, $set:ident, $variant:ident, $ty:ty) => {
        pub fn $set(&mut self, key: &str, value: $ty) -> &mut Self {
            self.values.insert(key.to_owned(), ParamValue::$variant(value));
            self
        }

        pub fn $get(&self, key: &str) -> Result<$ty> {
            match self.values.get(key) {
                Some(ParamValue::$variant(v)) => Ok(v.clone()),
                Some(other) => Err(anyhow!(
                    "parameter '{}' has unexpected type {:?}",
                    key,
                    other
                )),
                None => Err(anyhow!("required parameter '{}' is missing", key)),
            }
        }

        pub fn $get_or(&self, key: &str, default: $ty) -> $ty {
            self.$get(key).unwrap_or(default)
        }
    };
}

impl RenderParams {
    pub fn new() -> RenderParams {
        RenderParams::default()
    }

    accessors!(get_bool, get_bool_or, set_bool, Bool, bool);
    accessors!(get_int, get_int_or, set_int, Int, i32);
    accessors!(get_float, get_float_or, set_float, Float, f32);
    accessors!(get_string, get_string_or, set_string, Str, String);
    accessors!(get_point2, get_point2_or, set_point2, Point2, Point2f);
    accessors!(get_vector2, get_vector2_or, set_vector2, Vector2, Vector2f);
    accessors!(get_bounds2, get_bounds2_or, set_bounds2, Bounds2, Bounds2f);
    accessors!(get_point3, get_point3_or, set_point3, Point3, Point3f);
    accessors!(get_vector3, get_vector3_or, set_vector3, Vector3, Vector3f);
    accessors!(get_normal3, get_normal3_or, set_normal3, Normal3, Normal3f);
    accessors!(get_bounds3, get_bounds3_or, set_bounds3, Bounds3, Bounds3f);
    accessors!(get_spectrum, get_spectrum_or, set_spectrum, Spectrum, Spectrum);
    accessors!(get_transform, get_transform_or, set_transform, Transform, Transform);

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_roundtrip() {
        let mut p = RenderParams::new();
        p.set_int("sampleCount", 64).set_float("alpha", 0.7);
        assert_eq!(p.get_int("sampleCount").unwrap(), 64);
        assert!((p.get_float("alpha").unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_missing_required_is_error() {
        let p = RenderParams::new();
        assert!(p.get_int("maxDepth").is_err());
        assert_eq!(p.get_int_or("maxDepth", 8), 8);
    }

    #[test]
    fn test_wrong_type_is_error() {
        let mut p = RenderParams::new();
        p.set_float("maxDepth", 8.0);
        assert!(p.get_int("maxDepth").is_err());
    }
}
