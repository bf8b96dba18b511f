//! Numeric types used for geometric attributes.
//!
//! Positions are plain vectors (`Vec3`), there is no separate point type:
//! the approximators add, scale and average positions all the time.

use std::ops::{Add, AddAssign, Mul, Sub};

use cgmath::{InnerSpace, Matrix, Matrix3, SquareMatrix, Vector3};
use num_traits::Zero;
use serde::{Deserialize, Serialize};


/// Scalar type of all geometric attributes.
pub type Real = f64;

pub type Vec3 = Vector3<Real>;

/// 3x3 matrix, used for local frames. The three *rows* are the tangent, the
/// bitangent and the normal.
pub type Mat33 = Matrix3<Real>;


/// 3x6 coefficient matrix: one row per color channel, six coefficients of a
/// bivariate quadratic polynomial per row.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Mat36(pub [[Real; 6]; 3]);

impl Mat36 {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn frobenius_norm(&self) -> Real {
        self.0.iter().flat_map(|row| row.iter()).map(|v| v * v).sum::<Real>().sqrt()
    }

    /// Linear interpolation `(1 - t) * self + t * other`.
    pub fn lerp(&self, other: &Self, t: Real) -> Self {
        let mut out = *self;
        for (r, row) in out.0.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = (1.0 - t) * *v + t * other.0[r][c];
            }
        }
        out
    }
}

impl Add for Mat36 {
    type Output = Self;
    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for Mat36 {
    fn add_assign(&mut self, rhs: Self) {
        for (row, rrow) in self.0.iter_mut().zip(&rhs.0) {
            for (v, r) in row.iter_mut().zip(rrow) {
                *v += r;
            }
        }
    }
}

impl Sub for Mat36 {
    type Output = Self;
    fn sub(mut self, rhs: Self) -> Self {
        for (row, rrow) in self.0.iter_mut().zip(&rhs.0) {
            for (v, r) in row.iter_mut().zip(&rrow[..]) {
                *v -= r;
            }
        }
        self
    }
}

impl Mul<Real> for Mat36 {
    type Output = Self;
    fn mul(mut self, rhs: Real) -> Self {
        self.0.iter_mut().flat_map(|row| row.iter_mut()).for_each(|v| *v *= rhs);
        self
    }
}


/// Returns `v / |v|`, or the zero vector if `v` is (almost) zero.
pub fn normalize_or_zero(v: Vec3) -> Vec3 {
    let len = v.magnitude();
    if len > Real::EPSILON {
        v / len
    } else {
        Vec3::zero()
    }
}

/// Any unit vector orthogonal to `n` (which has to be normalized).
pub fn any_orthogonal(n: Vec3) -> Vec3 {
    let helper = if n.x.abs() < 0.9 { Vec3::unit_x() } else { Vec3::unit_y() };
    normalize_or_zero(helper - n * helper.dot(n))
}

/// Builds an orthonormal frame whose rows are `(t, b, n)`: `n` is the given
/// normal, `t` is `tangent_hint` projected into the tangent plane.
pub fn frame_from_normal(n: Vec3, tangent_hint: Vec3) -> Mat33 {
    let n = normalize_or_zero(n);
    let mut t = normalize_or_zero(tangent_hint - n * tangent_hint.dot(n));
    if t.is_zero() {
        t = any_orthogonal(n);
    }
    let b = n.cross(t);

    // cgmath matrices are built from columns, the frame is stored in rows.
    Mat33::from_cols(t, b, n).transpose()
}

/// Re-orthonormalizes a frame given by its rows `(t, b, n)`, keeping the
/// direction of the normal row.
pub fn orthonormalize_frame(m: &Mat33) -> Mat33 {
    let rows = m.transpose();
    frame_from_normal(rows.z, rows.x)
}

/// Inverse of a matrix, falling back to the identity for singular input.
pub fn invert_or_identity(m: &Mat33) -> Mat33 {
    m.invert().unwrap_or_else(Mat33::identity)
}

pub fn frobenius_norm33(m: &Mat33) -> Real {
    let mut sum = 0.0;
    for c in 0..3 {
        sum += m[c].magnitude2();
    }
    sum.sqrt()
}


#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use super::*;

    #[test]
    fn frame_is_orthonormal() {
        let f = frame_from_normal(Vec3::new(0.0, 0.0, 2.0), Vec3::new(1.0, 1.0, 0.3));
        let prod = f * f.transpose();
        for r in 0..3 {
            for c in 0..3 {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(prod[c][r], expected, epsilon = 1e-12);
            }
        }

        // Normal is the third row.
        let rows = f.transpose();
        assert_abs_diff_eq!(rows.z.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn mat36_ops() {
        let mut a = Mat36::zero();
        a.0[1][4] = 2.0;
        let b = a * 0.5 + a;
        assert_abs_diff_eq!(b.0[1][4], 3.0);
        assert_abs_diff_eq!((b - a).frobenius_norm(), 1.0);
        assert_abs_diff_eq!(a.lerp(&b, 0.5).0[1][4], 2.5);
    }
}
