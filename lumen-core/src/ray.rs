use std::f32::INFINITY;
use std::fmt;
use std::sync::Arc;

use crate::medium::Medium;
use crate::{Point3f, Vector3f};

/// A ray with a parametric clip distance and the participating medium it is
/// currently travelling through, if any.
#[derive(Clone)]
pub struct Ray {
    pub o: Point3f,
    pub d: Vector3f,
    pub t_max: f32,
    pub medium: Option<Arc<dyn Medium>>,
}

impl Ray {
    pub fn new(o: Point3f, d: Vector3f) -> Ray {
        debug_assert!(!o.has_nan() && !d.has_nan());
        Ray {
            o,
            d,
            t_max: INFINITY,
            medium: None,
        }
    }

    pub fn segment(o: Point3f, d: Vector3f, t_max: f32) -> Ray {
        debug_assert!(!o.has_nan() && !d.has_nan());
        Ray {
            o,
            d,
            t_max,
            medium: None,
        }
    }

    pub fn with_medium(mut self, medium: Option<Arc<dyn Medium>>) -> Ray {
        self.medium = medium;
        self
    }

    /// Point reached after travelling parameter `t` along the ray.
    pub fn at(&self, t: f32) -> Point3f {
        self.o + self.d * t
    }
}

impl fmt::Display for Ray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[o={}, d={}, t_max={}]", self.o, self.d, self.t_max)
    }
}

impl fmt::Debug for Ray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "Ray {{ o: {:?}, d: {:?}, t_max: {} }}", self.o, self.d, self.t_max)
    }
}
