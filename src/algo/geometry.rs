//! Geometric quantities of the cells of a surface map.
//!
//! All functions take the map and the (vertex) position attribute. Vertices
//! are given by any dart leaving them.

use cgmath::InnerSpace;
use smallvec::SmallVec;

use crate::{
    container::AttributeHandle,
    core::Phi2,
    handle::Dart,
    math::{frame_from_normal, normalize_or_zero, Mat33, Real, Vec3},
};


/// Position of the vertex `d` starts at.
#[inline]
pub fn position<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Vec3 {
    *map.attr(pos, d)
}

/// Vector from the origin to the end of `d`.
pub fn edge_vector<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Vec3 {
    position(map, pos, map.phi1(d)) - position(map, pos, d)
}

pub fn edge_length<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Real {
    edge_vector(map, pos, d).magnitude()
}

/// Unit normal of the face of `d` (Newell's method, so non planar polygons
/// work as well). Zero for degenerated faces.
pub fn face_normal<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Vec3 {
    normalize_or_zero(face_area_vector(map, pos, d))
}

/// Normal of the face of `d` scaled by twice its area.
fn face_area_vector<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Vec3 {
    let mut n = Vec3::new(0.0, 0.0, 0.0);
    for &x in &map.face_darts(d) {
        let a = position(map, pos, x);
        let b = position(map, pos, map.phi1(x));
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n
}

pub fn face_area<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Real {
    face_area_vector(map, pos, d).magnitude() / 2.0
}

pub fn face_centroid<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Vec3 {
    let darts = map.face_darts(d);
    let sum = darts.iter().fold(Vec3::new(0.0, 0.0, 0.0), |acc, &x| acc + position(map, pos, x));
    sum / darts.len() as Real
}

/// One dart starting at each neighbour of the vertex of `d`, in the order
/// of [`Phi2::vertex_darts`]. On a boundary vertex the neighbour across the
/// last boundary edge is included as well.
pub fn vertex_neighbours<M: Phi2>(map: &M, d: Dart) -> SmallVec<[Dart; 16]> {
    let darts = map.vertex_darts(d);
    let mut out: SmallVec<[Dart; 16]> = darts.iter().map(|&x| map.phi1(x)).collect();
    if let Some(&last) = darts.last() {
        let back = map.phi_1(last);
        if map.is_boundary_edge(back) {
            out.push(back);
        }
    }
    out
}

/// Centroid of the neighbours of the vertex of `d`. Isolated darts (no
/// neighbours other than the vertex itself) yield the vertex position.
pub fn one_ring_centroid<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Vec3 {
    let ns = vertex_neighbours(map, d);
    if ns.is_empty() {
        return position(map, pos, d);
    }
    let sum = ns.iter().fold(Vec3::new(0.0, 0.0, 0.0), |acc, &n| acc + position(map, pos, n));
    sum / ns.len() as Real
}

/// Area weighted vertex normal: the sum of the corner cross products of all
/// faces around the vertex of `d`.
pub fn vertex_normal<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Vec3 {
    let p = position(map, pos, d);
    let n = map.vertex_darts(d).iter().fold(Vec3::new(0.0, 0.0, 0.0), |acc, &x| {
        let next = position(map, pos, map.phi1(x)) - p;
        let prev = position(map, pos, map.phi_1(x)) - p;
        acc + next.cross(prev)
    });
    normalize_or_zero(n)
}

/// Orthonormal frame at the vertex of `d`. Its rows are a tangent (the
/// direction of `d` projected into the tangent plane), the bitangent and
/// the vertex normal.
pub fn vertex_local_frame<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Mat33 {
    frame_from_normal(vertex_normal(map, pos, d), edge_vector(map, pos, d))
}

/// Cotangent of the angle at `o` between the directions to `a` and `b`.
fn cot(o: Vec3, a: Vec3, b: Vec3) -> Real {
    let (u, v) = (a - o, b - o);
    let sin = u.cross(v).magnitude();
    if sin <= Real::EPSILON {
        0.0
    } else {
        u.dot(v) / sin
    }
}

/// Absolute discrete mean curvature at the vertex of `d` (cotangent
/// Laplacian over the barycentric vertex area). Boundary vertices have
/// curvature zero.
pub fn mean_curvature<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Real {
    if map.is_boundary_vertex(d) {
        return 0.0;
    }

    let p = position(map, pos, d);
    let mut laplacian = Vec3::new(0.0, 0.0, 0.0);
    let mut area = 0.0;
    for &x in &map.vertex_darts(d) {
        let q = position(map, pos, map.phi1(x));
        let alpha = position(map, pos, map.phi_1(x));
        let beta = position(map, pos, map.phi_1(map.phi2(x)));
        laplacian += (cot(alpha, p, q) + cot(beta, p, q)) * (p - q);
        area += (q - p).cross(alpha - p).magnitude() / 6.0;
    }

    if area <= Real::EPSILON {
        0.0
    } else {
        laplacian.magnitude() / (4.0 * area)
    }
}
