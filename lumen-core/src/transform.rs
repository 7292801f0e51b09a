use std::ops::Mul;

use log::error;

use crate::bounds::Bounds3f;
use crate::ray::Ray;
use crate::{Normal3f, Point3f, Vector3f};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Matrix4x4 {
    pub m: [[f32; 4]; 4],
}

impl Matrix4x4 {
    pub fn new() -> Matrix4x4 {
        Matrix4x4 {
            m: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_elements(
        t00: f32, t01: f32, t02: f32, t03: f32,
        t10: f32, t11: f32, t12: f32, t13: f32,
        t20: f32, t21: f32, t22: f32, t23: f32,
        t30: f32, t31: f32, t32: f32, t33: f32,
    ) -> Matrix4x4 {
        Matrix4x4 {
            m: [
                [t00, t01, t02, t03],
                [t10, t11, t12, t13],
                [t20, t21, t22, t23],
                [t30, t31, t32, t33],
            ],
        }
    }

    pub fn transpose(&self) -> Matrix4x4 {
        Matrix4x4::from_elements(
            self.m[0][0], self.m[1][0], self.m[2][0], self.m[3][0],
            self.m[0][1], self.m[1][1], self.m[2][1], self.m[3][1],
            self.m[0][2], self.m[1][2], self.m[2][2], self.m[3][2],
            self.m[0][3], self.m[1][3], self.m[2][3], self.m[3][3],
        )
    }

    /// Gauss-Jordan elimination with full pivoting.
    pub fn inverse(&self) -> Matrix4x4 {
        let mut indxc = [0usize; 4];
        let mut indxr = [0usize; 4];
        let mut ipiv = [0usize; 4];
        let mut minv = self.m;

        for i in 0..4 {
            let mut irow = 0;
            let mut icol = 0;
            let mut big = 0.0;

            // Choose pivot
            for j in 0..4 {
                if ipiv[j] != 1 {
                    for (k, piv) in ipiv.iter().enumerate() {
                        if *piv == 0 {
                            if f32::abs(minv[j][k]) >= big {
                                big = f32::abs(minv[j][k]);
                                irow = j;
                                icol = k;
                            }
                        } else if *piv > 1 {
                            error!("Singular matrix in Matrix4x4::inverse()");
                        }
                    }
                }
            }
            ipiv[icol] += 1;
            if irow != icol {
                for k in 0..4 {
                    let tmp = minv[irow][k];
                    minv[irow][k] = minv[icol][k];
                    minv[icol][k] = tmp;
                }
            }
            indxr[i] = irow;
            indxc[i] = icol;
            if minv[icol][icol] == 0.0 {
                error!("Singular matrix in Matrix4x4::inverse()");
            }

            let pivinv = 1.0 / minv[icol][icol];
            minv[icol][icol] = 1.0;
            for j in 0..4 {
                minv[icol][j] *= pivinv;
            }

            for j in 0..4 {
                if j != icol {
                    let save = minv[j][icol];
                    minv[j][icol] = 0.0;
                    for k in 0..4 {
                        minv[j][k] -= minv[icol][k] * save;
                    }
                }
            }
        }

        for j in (0..4).rev() {
            if indxr[j] != indxc[j] {
                for k in 0..4 {
                    let tmp = minv[k][indxr[j]];
                    minv[k][indxr[j]] = minv[k][indxc[j]];
                    minv[k][indxc[j]] = tmp;
                }
            }
        }

        Matrix4x4 { m: minv }
    }
}

impl Default for Matrix4x4 {
    fn default() -> Self {
        Matrix4x4::new()
    }
}

impl<'a, 'b> Mul<&'b Matrix4x4> for &'a Matrix4x4 {
    type Output = Matrix4x4;

    fn mul(self, m2: &'b Matrix4x4) -> Matrix4x4 {
        let mut r = Matrix4x4::new();
        for i in 0..4 {
            for j in 0..4 {
                r.m[i][j] = self.m[i][0] * m2.m[0][j]
                    + self.m[i][1] * m2.m[1][j]
                    + self.m[i][2] * m2.m[2][j]
                    + self.m[i][3] * m2.m[3][j];
            }
        }
        r
    }
}

/// An invertible affine or projective transform, stored with its inverse.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub m: Matrix4x4,
    pub m_inv: Matrix4x4,
}

impl Transform {
    pub fn new() -> Transform {
        Transform {
            m: Matrix4x4::new(),
            m_inv: Matrix4x4::new(),
        }
    }

    pub fn from_matrix(m: Matrix4x4) -> Transform {
        Transform {
            m_inv: m.inverse(),
            m,
        }
    }

    pub fn inverse(&self) -> Transform {
        Transform {
            m: self.m_inv,
            m_inv: self.m,
        }
    }

    pub fn translate(delta: &Vector3f) -> Transform {
        Transform {
            m: Matrix4x4::from_elements(
                1.0, 0.0, 0.0, delta.x,
                0.0, 1.0, 0.0, delta.y,
                0.0, 0.0, 1.0, delta.z,
                0.0, 0.0, 0.0, 1.0,
            ),
            m_inv: Matrix4x4::from_elements(
                1.0, 0.0, 0.0, -delta.x,
                0.0, 1.0, 0.0, -delta.y,
                0.0, 0.0, 1.0, -delta.z,
                0.0, 0.0, 0.0, 1.0,
            ),
        }
    }

    pub fn scale(x: f32, y: f32, z: f32) -> Transform {
        Transform {
            m: Matrix4x4::from_elements(
                x, 0.0, 0.0, 0.0,
                0.0, y, 0.0, 0.0,
                0.0, 0.0, z, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ),
            m_inv: Matrix4x4::from_elements(
                1.0 / x, 0.0, 0.0, 0.0,
                0.0, 1.0 / y, 0.0, 0.0,
                0.0, 0.0, 1.0 / z, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ),
        }
    }

    pub fn rotate_x(theta_deg: f32) -> Transform {
        let t = theta_deg.to_radians();
        let (s, c) = t.sin_cos();
        let m = Matrix4x4::from_elements(
            1.0, 0.0, 0.0, 0.0,
            0.0, c, -s, 0.0,
            0.0, s, c, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        Transform {
            m,
            m_inv: m.transpose(),
        }
    }

    pub fn rotate_y(theta_deg: f32) -> Transform {
        let t = theta_deg.to_radians();
        let (s, c) = t.sin_cos();
        let m = Matrix4x4::from_elements(
            c, 0.0, s, 0.0,
            0.0, 1.0, 0.0, 0.0,
            -s, 0.0, c, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        Transform {
            m,
            m_inv: m.transpose(),
        }
    }

    /// Camera-to-world transform looking from `eye` towards `look`.
    pub fn look_at(eye: &Point3f, look: &Point3f, up: &Vector3f) -> Transform {
        let dir = (*look - *eye).normalize();
        let right = up.normalize().cross(&dir).normalize();
        let new_up = dir.cross(&right);
        let camera_to_world = Matrix4x4::from_elements(
            right.x, new_up.x, dir.x, eye.x,
            right.y, new_up.y, dir.y, eye.y,
            right.z, new_up.z, dir.z, eye.z,
            0.0, 0.0, 0.0, 1.0,
        );
        Transform {
            m: camera_to_world,
            m_inv: camera_to_world.inverse(),
        }
    }

    /// Perspective projection with the given vertical field of view (radians).
    pub fn perspective(fov: f32, near: f32, far: f32) -> Transform {
        let persp = Matrix4x4::from_elements(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, far / (far - near), -far * near / (far - near),
            0.0, 0.0, 1.0, 0.0,
        );
        let inv_tan_ang = 1.0 / (fov / 2.0).tan();
        &Transform::scale(inv_tan_ang, inv_tan_ang, 1.0) * &Transform::from_matrix(persp)
    }

    pub fn transform_point(&self, p: &Point3f) -> Point3f {
        let m = &self.m.m;
        let x = m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z + m[0][3];
        let y = m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z + m[1][3];
        let z = m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z + m[2][3];
        let w = m[3][0] * p.x + m[3][1] * p.y + m[3][2] * p.z + m[3][3];
        if w == 1.0 {
            Point3f::new(x, y, z)
        } else {
            Point3f::new(x, y, z) / w
        }
    }

    pub fn transform_vector(&self, v: &Vector3f) -> Vector3f {
        let m = &self.m.m;
        Vector3f::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }

    /// Normals transform by the inverse transpose.
    pub fn transform_normal(&self, n: &Normal3f) -> Normal3f {
        let m = &self.m_inv.m;
        Normal3f::new(
            m[0][0] * n.x + m[1][0] * n.y + m[2][0] * n.z,
            m[0][1] * n.x + m[1][1] * n.y + m[2][1] * n.z,
            m[0][2] * n.x + m[1][2] * n.y + m[2][2] * n.z,
        )
    }

    pub fn transform_ray(&self, r: &Ray) -> Ray {
        Ray {
            o: self.transform_point(&r.o),
            d: self.transform_vector(&r.d),
            t_max: r.t_max,
            medium: r.medium.clone(),
        }
    }

    pub fn transform_bounds(&self, b: &Bounds3f) -> Bounds3f {
        let mut out = Bounds3f::from_point(&self.transform_point(&b.p_min));
        for i in 1..8 {
            let corner = Point3f::new(
                if i & 1 != 0 { b.p_max.x } else { b.p_min.x },
                if i & 2 != 0 { b.p_max.y } else { b.p_min.y },
                if i & 4 != 0 { b.p_max.z } else { b.p_min.z },
            );
            out = out.merge_point(&self.transform_point(&corner));
        }
        out
    }

    pub fn swaps_handedness(&self) -> bool {
        let m = &self.m.m;
        let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        det < 0.0
    }
}

impl Default for Transform {
    fn default() -> Transform {
        Transform::new()
    }
}

impl<'a, 'b> Mul<&'b Transform> for &'a Transform {
    type Output = Transform;

    fn mul(self, rhs: &'b Transform) -> Transform {
        Transform {
            m: &self.m * &rhs.m,
            m_inv: &rhs.m_inv * &self.m_inv,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_translate_point() {
        let t = Transform::translate(&Vector3f::new(1.0, 2.0, 3.0));
        let p = t.transform_point(&Point3f::new(0.0, 0.0, 0.0));
        assert_eq!(p, Point3f::new(1.0, 2.0, 3.0));
        let v = t.transform_vector(&Vector3f::new(1.0, 0.0, 0.0));
        assert_eq!(v, Vector3f::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = &Transform::translate(&Vector3f::new(1.0, -2.0, 0.5)) * &Transform::rotate_y(37.0);
        let p = Point3f::new(0.3, 0.7, -1.2);
        let q = t.inverse().transform_point(&t.transform_point(&p));
        assert_relative_eq!(q.x, p.x, epsilon = 1e-4);
        assert_relative_eq!(q.y, p.y, epsilon = 1e-4);
        assert_relative_eq!(q.z, p.z, epsilon = 1e-4);
    }

    #[test]
    fn test_look_at_maps_origin_to_eye() {
        let eye = Point3f::new(1.0, 2.0, 3.0);
        let t = Transform::look_at(
            &eye,
            &Point3f::new(0.0, 0.0, 0.0),
            &Vector3f::new(0.0, 1.0, 0.0),
        );
        let p = t.transform_point(&Point3f::new(0.0, 0.0, 0.0));
        assert!((p - eye).length() < 1e-5);
    }
}
