use std::{
    io::{self, Read, Write},
    ops::{Add, AddAssign},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use cgmath::{InnerSpace, Matrix3, SquareMatrix};
use serde::{Deserialize, Serialize};

use crate::{
    algo::geometry::{face_centroid, face_normal},
    container::{AttribValue, AttributeHandle},
    core::Phi2,
    math::{Real, Vec3},
    orbit::Orbit,
};


/// Determinants below this are treated as singular by
/// [`Quadric::optimal_point`].
const SINGULAR_EPSILON: Real = 1e-10;


/// A quadric error metric: a symmetric 4x4 matrix `Q` such that
/// `[x y z 1] Q [x y z 1]^T` is the sum of squared distances of a point to a
/// set of planes.
///
/// Only the upper triangle is stored:
///
/// ```text
/// | 0 1 2 3 |
/// | 1 4 5 6 |
/// | 2 5 7 8 |
/// | 3 6 8 9 |
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Quadric {
    coeffs: [Real; 10],
}

impl Quadric {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Quadric of the plane `ax + by + cz + d = 0`. `(a, b, c)` has to be
    /// normalized.
    pub fn from_plane(a: Real, b: Real, c: Real, d: Real) -> Self {
        Self {
            coeffs: [
                a * a, a * b, a * c, a * d,
                b * b, b * c, b * d,
                c * c, c * d,
                d * d,
            ],
        }
    }

    /// Quadric of the plane through the three points. Degenerated triangles
    /// give the zero quadric.
    pub fn from_triangle(p: Vec3, q: Vec3, r: Vec3) -> Self {
        let n = (q - p).cross(r - p);
        let len = n.magnitude();
        if len <= Real::EPSILON {
            return Self::zero();
        }
        let n = n / len;
        Self::from_plane(n.x, n.y, n.z, -n.dot(p))
    }

    pub fn coeffs(&self) -> &[Real; 10] {
        &self.coeffs
    }

    /// The error of `p`: `v^T Q v` with `v = (p, 1)`.
    pub fn evaluate(&self, p: Vec3) -> Real {
        let q = &self.coeffs;
        let (x, y, z) = (p.x, p.y, p.z);
        q[0] * x * x + 2.0 * q[1] * x * y + 2.0 * q[2] * x * z + 2.0 * q[3] * x
            + q[4] * y * y + 2.0 * q[5] * y * z + 2.0 * q[6] * y
            + q[7] * z * z + 2.0 * q[8] * z
            + q[9]
    }

    /// The point minimizing the error, or `None` if the upper 3x3 block is
    /// singular (all planes parallel to one line, for example).
    pub fn optimal_point(&self) -> Option<Vec3> {
        let q = &self.coeffs;

        // Symmetric, so rows and columns are interchangeable.
        let a = Matrix3::new(
            q[0], q[1], q[2],
            q[1], q[4], q[5],
            q[2], q[5], q[7],
        );
        if a.determinant().abs() < SINGULAR_EPSILON {
            return None;
        }
        let inv = a.invert()?;
        Some(inv * -Vec3::new(q[3], q[6], q[8]))
    }
}

impl Add for Quadric {
    type Output = Self;
    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, rhs: Self) {
        for (a, b) in self.coeffs.iter_mut().zip(&rhs.coeffs) {
            *a += b;
        }
    }
}

impl AttribValue for Quadric {
    const TYPE_NAME: &'static str = "Quadric";

    fn default_value() -> Self {
        Self::zero()
    }

    fn write_bin(&self, w: &mut dyn Write) -> io::Result<()> {
        for c in &self.coeffs {
            w.write_f64::<LittleEndian>(*c)?;
        }
        Ok(())
    }

    fn read_bin(r: &mut dyn Read) -> io::Result<Self> {
        let mut out = Self::zero();
        for c in &mut out.coeffs {
            *c = r.read_f64::<LittleEndian>()?;
        }
        Ok(out)
    }
}

/// Sets the quadric of every vertex to the sum of the plane quadrics of its
/// incident faces.
pub fn compute_vertex_quadrics<M: Phi2>(
    map: &mut M,
    position: AttributeHandle<Vec3>,
    quadric: AttributeHandle<Quadric>,
) {
    for d in map.orbits(Orbit::Vertex) {
        map.set_attr(quadric, d, Quadric::zero());
    }
    for f in map.orbits(Orbit::Face) {
        let n = face_normal(map, position, f);
        let c = face_centroid(map, position, f);
        let q = Quadric::from_plane(n.x, n.y, n.z, -n.dot(c));
        for x in map.face_darts(f) {
            *map.attr_mut(quadric, x) += q;
        }
    }
}
