//! Predictors guess the positions of the two vertices of a collapsed edge
//! from the coarse mesh. The difference to the real positions is the detail
//! stored by reversible approximators.

use cgmath::InnerSpace;
use smallvec::SmallVec;

use crate::{
    container::AttributeHandle,
    core::Phi2,
    handle::Dart,
    math::{normalize_or_zero, Real, Vec3},
};
use super::PredictorType;


/// Positions of the ring around a collapsed edge, split in the part around
/// each end point.
///
/// Let the collapsed edge run from `v0` to `v1` and let `v2` and `v3` be the
/// opposite vertices of the triangles on its left and right. Then `side0`
/// lists the neighbours of `v0` from `v2` to `v3` and `side1` the neighbours
/// of `v1` from `v3` to `v2`, both following the vertex dart order. The
/// lists are the same before and after the collapse, so predictions can be
/// made on either mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitNeighbourhood {
    pub side0: SmallVec<[Vec3; 8]>,
    pub side1: SmallVec<[Vec3; 8]>,
}

impl SplitNeighbourhood {
    /// Reads the neighbourhood of the edge of `d` before it is collapsed.
    /// Both end points must be interior vertices.
    pub fn before_collapse<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d: Dart) -> Self {
        let side = |start: Dart| {
            map.vertex_darts(start)
                .iter()
                .skip(1)
                .map(|&x| *map.attr(pos, map.phi1(x)))
                .collect()
        };
        Self {
            side0: side(d),
            side1: side(map.phi2(d)),
        }
    }

    /// Reads the neighbourhood around the merged vertex, given the darts
    /// `d2 = phi2(phi_1(d))` and `dd2 = phi2(phi_1(phi2(d)))` of the
    /// collapsed edge `d`.
    pub fn after_collapse<M: Phi2>(map: &M, pos: AttributeHandle<Vec3>, d2: Dart, dd2: Dart) -> Self {
        let darts = map.vertex_darts(d2);
        let split = darts.iter().position(|&x| x == dd2).unwrap_or(darts.len());
        let end_of = |x: Dart| *map.attr(pos, map.phi1(x));

        let mut side0: SmallVec<[Vec3; 8]> = darts[..split].iter().map(|&x| end_of(x)).collect();
        side0.push(end_of(dd2));
        let mut side1: SmallVec<[Vec3; 8]> = darts[split..].iter().map(|&x| end_of(x)).collect();
        side1.push(end_of(d2));
        Self { side0, side1 }
    }

    fn mean(points: &[Vec3]) -> Vec3 {
        if points.is_empty() {
            return Vec3::new(0.0, 0.0, 0.0);
        }
        points.iter().fold(Vec3::new(0.0, 0.0, 0.0), |acc, p| acc + p) / points.len() as Real
    }

    pub fn centroid0(&self) -> Vec3 {
        Self::mean(&self.side0)
    }

    pub fn centroid1(&self) -> Vec3 {
        Self::mean(&self.side1)
    }

    /// Centroid of the whole ring.
    pub fn centroid(&self) -> Vec3 {
        let ring: SmallVec<[Vec3; 16]> = self.ring().cloned().collect();
        Self::mean(&ring)
    }

    /// All ring positions, each once.
    fn ring(&self) -> impl Iterator<Item = &Vec3> + '_ {
        let n0 = self.side0.len().saturating_sub(1);
        let n1 = self.side1.len().saturating_sub(1);
        self.side0[..n0].iter().chain(&self.side1[..n1])
    }

    /// Normal of the fan spanned by `center` and the ring.
    pub fn normal(&self, center: Vec3) -> Vec3 {
        let ring: SmallVec<[Vec3; 16]> = self.ring().map(|p| p - center).collect();
        let mut n = Vec3::new(0.0, 0.0, 0.0);
        for i in 0..ring.len() {
            n += ring[i].cross(ring[(i + 1) % ring.len()]);
        }
        normalize_or_zero(n)
    }

    /// Mean distance of the ring to `center`.
    fn mean_radius(&self, center: Vec3) -> Real {
        let (sum, count) = self.ring().fold((0.0, 0), |(s, c), p| (s + (p - center).magnitude(), c + 1));
        if count == 0 { 0.0 } else { sum / count as Real }
    }
}


/// Predicts the two split vertices from the merged vertex `a`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Predictor {
    kind: PredictorType,
}

impl Predictor {
    pub fn new(kind: PredictorType) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> PredictorType {
        self.kind
    }

    /// Returns the predicted positions of the origin and the end of the
    /// collapsed edge.
    pub fn predict(&self, a: Vec3, ring: &SplitNeighbourhood) -> (Vec3, Vec3) {
        match self.kind {
            PredictorType::HalfCollapse => (a, a),

            // Each vertex is pulled a quarter of the way towards its side.
            PredictorType::CornerCutting => (
                a * 0.75 + ring.centroid0() * 0.25,
                a * 0.75 + ring.centroid1() * 0.25,
            ),

            PredictorType::TangentPredict1 => {
                let n = ring.normal(a);
                let dir = ring.centroid0() - ring.centroid1();
                let t = (dir - n * n.dot(dir)) * 0.25;
                (a + t, a - t)
            }

            // Perpendicular to the line through the two opposite vertices.
            PredictorType::TangentPredict2 => {
                let (v2, v3) = match (ring.side0.first(), ring.side0.last()) {
                    (Some(&v2), Some(&v3)) => (v2, v3),
                    _ => return (a, a),
                };
                let n = ring.normal(a);
                let mut w = normalize_or_zero(n.cross(v3 - v2));
                if w.dot(ring.centroid0() - ring.centroid1()) < 0.0 {
                    w = -w;
                }
                let t = w * (ring.mean_radius(a) * 0.25);
                (a + t, a - t)
            }
        }
    }
}
