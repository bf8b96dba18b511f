//! Everything related to [`Map3`].

use std::fmt;

use fxhash::FxHashSet;

use crate::{
    handle::Dart,
    orbit::Orbit,
};
use super::{
    CombinatorialMap, EdgeCollapse, GenericMap, Phi1, Phi2, Phi3,
    PHI1, PHI2, PHI3, PHI_1,
};

#[cfg(test)]
mod tests;


/// Vertices of the faces of a tetrahedron built by
/// [`Map3::new_tetrahedron`]. The faces are consistently oriented: every
/// edge is used once in each direction.
pub(crate) const TETRAHEDRON_FACES: [[usize; 3]; 4] = [
    [0, 1, 2],
    [0, 3, 1],
    [1, 3, 2],
    [2, 3, 0],
];


/// A map of dimension 3, representing a volumetric mesh.
///
/// Every volume is a closed 2-map (`phi1` and `phi2`), `phi3` pairs the
/// darts of two faces of adjacent volumes. `phi3(d)` runs along the same
/// edge as `d`, in the opposite direction. Faces on the outer boundary are
/// fixed points of `phi3`.
///
/// Orbits are computed as closures over relation compositions:
///
/// | Orbit  | Generated by                     |
/// | ------ | -------------------------------- |
/// | vertex | `phi2 ∘ phi_1`, `phi1 ∘ phi3`    |
/// | edge   | `phi2`, `phi3`                   |
/// | face   | `phi1`, `phi3`                   |
/// | volume | `phi1`, `phi2`                   |
///
/// Like for [`Map2`][super::Map2], the operators defined on this type keep
/// all embeddings in sync.
#[derive(Clone)]
pub struct Map3 {
    base: GenericMap,
}

impl Map3 {
    pub fn new() -> Self {
        let mut base = GenericMap::new();
        let ids = (
            base.add_relation("phi1"),
            base.add_relation("phi_1"),
            base.add_relation("phi2"),
            base.add_relation("phi3"),
        );
        debug_assert_eq!(ids, (PHI1, PHI_1, PHI2, PHI3));
        Self { base }
    }

    /// Visits the closure of `d` under the given relation compositions.
    fn closure(
        &self,
        d: Dart,
        steps: &[fn(&Self, Dart) -> Dart],
        f: &mut dyn FnMut(Dart) -> bool,
    ) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack = vec![d];
        visited.insert(d);
        while let Some(x) = stack.pop() {
            if f(x) {
                return true;
            }
            for step in steps {
                let y = step(self, x);
                if visited.insert(y) {
                    stack.push(y);
                }
            }
        }
        false
    }

    /// Creates a tetrahedron without any embedding and returns its darts
    /// together with the local index (0 to 3) of the vertex each one starts
    /// at.
    pub(crate) fn build_tetrahedron(&mut self) -> [(Dart, usize); 12] {
        let mut out = [(Dart::NIL, 0); 12];
        for (fi, face) in TETRAHEDRON_FACES.iter().enumerate() {
            let first = self.new_face(3);
            let mut it = first;
            for (k, &v) in face.iter().enumerate() {
                out[3 * fi + k] = (it, v);
                it = self.phi1(it);
            }
        }

        // Sew the faces along their shared edges: the dart `a -> b` is the
        // partner of `b -> a`.
        for i in 0..12 {
            let (d, a) = out[i];
            if self.phi2(d) != d {
                continue;
            }
            let b = out.iter().find(|&&(x, _)| x == self.phi1(d)).map(|&(_, v)| v);
            let partner = out.iter().find(|&&(x, v)| {
                Some(v) == b && out.iter().any(|&(y, w)| y == self.phi1(x) && w == a)
            });
            if let Some(&(e, _)) = partner {
                self.phi2sew(d, e);
            }
        }
        out
    }

    /// Creates a new tetrahedron, giving all its cells new rows in all
    /// embedded orbits. Returns a dart of it.
    pub fn new_tetrahedron(&mut self) -> Dart {
        let darts = self.build_tetrahedron();
        let darts: Vec<_> = darts.iter().map(|&(d, _)| d).collect();
        self.embed_new_darts(&darts);
        darts[0]
    }

    /// Darts of the volume of `d`.
    pub fn volume_darts(&self, d: Dart) -> Vec<Dart> {
        let mut out = Vec::new();
        self.foreach_dart_of_volume(d, &mut |x| {
            out.push(x);
            false
        });
        out
    }

    /// Sews the boundary faces of `d` and `e`, which must have the same
    /// degree, pairing `phi1^k(d)` with `phi_1^k(e)`. Vertices, edges and
    /// the face that become one are merged, keeping the rows of `d`'s
    /// cells.
    pub fn sew_volumes(&mut self, d: Dart, e: Dart) {
        assert!(
            self.is_boundary_face(d) && self.is_boundary_face(e),
            "sew_volumes: {:?} and {:?} have to be on boundary faces",
            d,
            e,
        );

        let mut seeds = self.face_darts(d).to_vec();
        seeds.extend(self.face_darts(e));
        let vertices = self.cell_groups(Orbit::Vertex, &seeds);
        let edges = self.cell_groups(Orbit::Edge, &seeds);
        let faces = self.cell_groups(Orbit::Face, &seeds);

        self.phi3sew_faces(d, e);
        self.reclaim_cells(Orbit::Vertex, vertices);
        self.reclaim_cells(Orbit::Edge, edges);
        self.reclaim_cells(Orbit::Face, faces);
    }

    /// Separates the volumes along the face of `d`. Cells that are split
    /// get new rows holding a copy of the old values.
    pub fn unsew_volumes(&mut self, d: Dart) {
        if self.is_boundary_face(d) {
            return;
        }

        let mut seeds = self.face_darts(d).to_vec();
        seeds.extend(self.face_darts(self.phi3(d)));
        let vertices = self.cell_groups(Orbit::Vertex, &seeds);
        let edges = self.cell_groups(Orbit::Edge, &seeds);
        let faces = self.cell_groups(Orbit::Face, &seeds);

        self.phi3unsew_face(d);
        self.reclaim_cells(Orbit::Vertex, vertices);
        self.reclaim_cells(Orbit::Edge, edges);
        self.reclaim_cells(Orbit::Face, faces);
    }

    /// Deletes the volume of `d`, unsewing it from its neighbours first.
    pub fn delete_volume(&mut self, d: Dart) {
        let darts = self.volume_darts(d);
        let mut seeds = darts.clone();
        seeds.extend(darts.iter().map(|&x| self.phi3(x)));
        let groups = self.all_cell_groups(&seeds);

        for &x in &darts {
            if !self.is_boundary_face(x) {
                self.phi3unsew(x);
            }
        }
        for x in darts {
            self.delete_dart(x);
        }
        self.reclaim_all_cells(groups);
    }

    /// The darts of the edge of `d` that run in the same direction as `d`,
    /// one per incident volume, starting with `d`.
    pub fn edge_fan(&self, d: Dart) -> Vec<Dart> {
        let mut out = vec![d];
        let mut visited = FxHashSet::default();
        visited.insert(d);
        let mut i = 0;
        while i < out.len() {
            let x = out[i];
            i += 1;

            let y = self.phi2(x);
            let z = self.phi3(x);
            let next = [
                if self.phi3(y) != y { Some(self.phi3(y)) } else { None },
                if z != x { Some(self.phi2(z)) } else { None },
            ];
            for n in next.iter().flatten() {
                if visited.insert(*n) {
                    out.push(*n);
                }
            }
        }
        out
    }
}

impl CombinatorialMap for Map3 {
    const MAP_TYPE: &'static str = "Map3";
    const DIMENSION: u32 = 3;

    fn base(&self) -> &GenericMap {
        &self.base
    }

    fn base_mut(&mut self) -> &mut GenericMap {
        &mut self.base
    }

    fn foreach_dart_of_vertex(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        // On a boundary face, `phi1 ∘ phi3` would leave the vertex.
        let across = |m: &Self, x: Dart| {
            let y = m.phi3(x);
            if y == x { x } else { m.phi1(y) }
        };
        self.closure(d, &[|m, x| m.phi2(m.phi_1(x)), across], f)
    }

    fn foreach_dart_of_edge(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        self.closure(d, &[|m, x| m.phi2(x), |m, x| m.phi3(x)], f)
    }

    fn foreach_dart_of_face(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        self.closure(d, &[|m, x| m.phi1(x), |m, x| m.phi3(x)], f)
    }

    fn foreach_dart_of_volume(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        self.closure(d, &[|m, x| m.phi1(x), |m, x| m.phi2(x)], f)
    }

    fn foreach_dart_of_cc(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        self.closure(d, &[|m, x| m.phi1(x), |m, x| m.phi2(x), |m, x| m.phi3(x)], f)
    }
}

impl Phi1 for Map3 {}
impl Phi2 for Map3 {}
impl Phi3 for Map3 {}

impl EdgeCollapse for Map3 {
    /// Collapses the edge of `d` in a tetrahedral complex. Every
    /// tetrahedron incident to the edge is removed and its two faces not
    /// containing the edge are replaced by sewing their outer neighbours
    /// to each other. The vertex of `d` keeps its row.
    fn collapse_edge(&mut self, d: Dart) {
        let fan = self.edge_fan(d);

        let mut seeds = vec![d];
        let mut doomed = Vec::new();
        let mut pairs = Vec::new();
        for &t in &fan {
            let x0 = self.phi2(self.phi_1(t));
            let y0 = self.phi2(self.phi1(t));
            pairs.push((self.phi3(x0), x0, self.phi3(y0), y0));

            for x in self.volume_darts(t) {
                seeds.push(x);
                seeds.push(self.phi3(x));
                doomed.push(x);
            }
        }
        let groups = self.all_cell_groups(&seeds);

        for &x in &doomed {
            if !self.is_boundary_face(x) {
                self.phi3unsew(x);
            }
        }
        for &x in &doomed {
            self.delete_dart(x);
        }

        for (u, x0, v, y0) in pairs {
            let outer = u != x0 && v != y0;
            if outer
                && self.base.is_dart_valid(u)
                && self.base.is_dart_valid(v)
                && self.is_boundary_face(u)
                && self.is_boundary_face(v)
                && !self.same_face(u, v)
            {
                self.phi3sew_faces(u, v);
            }
        }

        self.reclaim_all_cells(groups);
    }
}

impl Default for Map3 {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Map3 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Map3").field("darts", &self.base).finish()
    }
}
