//! Everything related to [`Map2`].

use std::fmt;

use fxhash::FxHashSet;

use crate::{
    handle::Dart,
    orbit::Orbit,
};
use super::{
    CombinatorialMap, EdgeCollapse, GenericMap, OrbitDarts, Phi1, Phi2, SurfaceMap,
    PHI1, PHI2, PHI_1,
};

#[cfg(test)]
mod tests;


/// A map of dimension 2, representing an orientable polygonal surface
/// (possibly with boundary).
///
/// The darts of a face form a `phi1` cycle, `phi2` pairs the two darts of
/// an interior edge. Boundary darts are fixed points of `phi2`. A dart
/// belongs to the vertex it starts at.
///
/// All operators defined here keep the embeddings of all embedded orbits in
/// sync: after the operation, every orbit carries exactly one, allocated
/// row on all of its darts. The operators of the traits [`Phi1`] and
/// [`Phi2`] only change the topology.
#[derive(Clone)]
pub struct Map2 {
    base: GenericMap,
}

impl Map2 {
    pub fn new() -> Self {
        let mut base = GenericMap::new();
        let phi1 = base.add_relation("phi1");
        let phi_1 = base.add_relation("phi_1");
        let phi2 = base.add_relation("phi2");
        debug_assert_eq!((phi1, phi_1, phi2), (PHI1, PHI_1, PHI2));
        Self { base }
    }

    /// Pairs the boundary darts `d` and `e` and merges the vertices and
    /// edges that become one. The rows of `d`'s cells are kept.
    pub fn sew_faces(&mut self, d: Dart, e: Dart) {
        let seeds = [d, e, self.phi1(d), self.phi1(e)];
        let vertices = self.cell_groups(Orbit::Vertex, &seeds);
        let edges = self.cell_groups(Orbit::Edge, &seeds);

        self.phi2sew(d, e);
        self.reclaim_cells(Orbit::Vertex, vertices);
        self.reclaim_cells(Orbit::Edge, edges);
    }

    /// Inverse of [`Map2::sew_faces`]: separates the two faces along the
    /// edge of `d`. Vertices and edges that are split get new rows holding
    /// a copy of the old values.
    pub fn unsew_faces(&mut self, d: Dart) {
        let e = self.phi2(d);
        if e == d {
            return;
        }
        let seeds = [d, e];
        let vertices = self.cell_groups(Orbit::Vertex, &[d, e, self.phi1(d), self.phi1(e)]);
        let edges = self.cell_groups(Orbit::Edge, &seeds);

        self.phi2unsew(d);
        self.reclaim_cells(Orbit::Vertex, vertices);
        self.reclaim_cells(Orbit::Edge, edges);
    }

    /// Deletes the face of `d`, unsewing it from its neighbours first.
    pub fn delete_face(&mut self, d: Dart) {
        let darts = self.face_darts(d);
        let mut seeds: Vec<Dart> = darts.to_vec();
        seeds.extend(darts.iter().map(|&x| self.phi2(x)));
        let groups = self.all_cell_groups(&seeds);

        for &x in &darts {
            if !self.is_boundary_edge(x) {
                self.phi2unsew(x);
            }
        }
        self.delete_cycle(d);
        self.reclaim_all_cells(groups);
    }

    /// Inserts a new vertex in the middle of the edge of `d` and returns the
    /// new dart following `d`. The new vertex and the new edge get new rows.
    pub fn cut_edge(&mut self, d: Dart) -> Dart {
        let e = self.phi2(d);
        let boundary = e == d;
        if !boundary {
            self.phi2unsew(d);
        }

        let nd = self.insert_after(d);
        let ne = if boundary { None } else { Some(self.insert_after(e)) };
        if let Some(ne) = ne {
            self.phi2sew(d, ne);
            self.phi2sew(e, nd);
        }

        if self.base.is_orbit_embedded(Orbit::Vertex) {
            self.embed_new_orbit(Orbit::Vertex, nd);
        }
        if self.base.is_orbit_embedded(Orbit::Edge) {
            if let Some(ne) = ne {
                self.inherit_embedding(Orbit::Edge, ne, d);
            }
            self.embed_new_orbit(Orbit::Edge, nd);
        }
        for orbit in [Orbit::Face, Orbit::Volume].iter().copied() {
            self.inherit_embedding(orbit, nd, d);
            if let Some(ne) = ne {
                self.inherit_embedding(orbit, ne, e);
            }
        }
        nd
    }

    /// Rotates the interior edge of `d` inside the quadrilateral formed by
    /// its two incident faces: afterwards, it connects the vertices that
    /// followed the edge in both faces. Returns `false` (and does nothing)
    /// for boundary edges.
    pub fn flip_edge(&mut self, d: Dart) -> bool {
        let e = self.phi2(d);
        if e == d {
            return false;
        }

        let face_d = self.embedding(d, Orbit::Face);
        let face_e = self.embedding(e, Orbit::Face);

        let (d_next, e_next) = (self.phi1(d), self.phi1(e));
        let (d_prev, e_prev) = (self.phi_1(d), self.phi_1(e));
        self.phi1sew(d, e_prev);
        self.phi1sew(e, d_prev);
        self.phi1sew(d, d_next);
        self.phi1sew(e, e_next);

        if self.base.is_orbit_embedded(Orbit::Vertex) {
            let vd = self.embedding(self.phi1(e), Orbit::Vertex);
            let ve = self.embedding(self.phi1(d), Orbit::Vertex);
            self.base.set_dart_embedding(d, Orbit::Vertex, vd);
            self.base.set_dart_embedding(e, Orbit::Vertex, ve);
        }
        if self.base.is_orbit_embedded(Orbit::Face) {
            self.embed_orbit(Orbit::Face, d, face_d);
            self.embed_orbit(Orbit::Face, e, face_e);
        }
        true
    }

    /// Splits the face of `d` and `e` by a new edge from the vertex of `d`
    /// to the vertex of `e`. The part containing `d` keeps the face row.
    /// Returns the new dart starting at the vertex of `d`.
    pub fn split_face(&mut self, d: Dart, e: Dart) -> Dart {
        assert!(
            d != e && self.same_face(d, e),
            "split_face needs two distinct darts of one face, got {:?} and {:?}",
            d,
            e,
        );

        let faces = self.cell_groups(Orbit::Face, &[d]);
        let (pd, pe) = (self.phi_1(d), self.phi_1(e));
        let dd = self.insert_after(pd);
        let ee = self.insert_after(pe);
        self.phi1sew(dd, ee);
        self.phi2sew(dd, ee);

        self.inherit_embedding(Orbit::Vertex, dd, d);
        self.inherit_embedding(Orbit::Vertex, ee, e);
        if self.base.is_orbit_embedded(Orbit::Edge) {
            self.embed_new_orbit(Orbit::Edge, dd);
        }
        self.inherit_embedding(Orbit::Volume, dd, d);
        self.inherit_embedding(Orbit::Volume, ee, d);
        self.reclaim_cells(Orbit::Face, faces);
        dd
    }

    /// Removes the interior edge of `d`, merging its two incident faces into
    /// one. The face row of `d` is kept. Returns `false` (and does nothing)
    /// for boundary edges or if both sides of the edge are the same face.
    pub fn merge_faces(&mut self, d: Dart) -> bool {
        let e = self.phi2(d);
        if e == d || self.same_face(d, e) {
            return false;
        }

        let (pd, pe) = (self.phi_1(d), self.phi_1(e));
        let groups = self.all_cell_groups(&[d, e, pd, pe, self.phi1(d), self.phi1(e)]);

        self.phi2unsew(d);
        self.phi1sew(pd, pe);
        self.remove_from_face(d);
        self.remove_from_face(e);
        self.delete_dart(d);
        self.delete_dart(e);
        self.reclaim_all_cells(groups);
        true
    }

    /// The boundary darts of the hole next to the boundary dart `d`,
    /// starting with `d`, in `phi1` order of the hole's border.
    pub fn boundary_loop(&self, d: Dart) -> OrbitDarts {
        assert!(self.is_boundary_edge(d), "{:?} is not a boundary dart", d);

        let mut out = OrbitDarts::new();
        let mut it = d;
        loop {
            out.push(it);
            let mut x = self.phi1(it);
            while !self.is_boundary_edge(x) {
                x = self.phi1(self.phi2(x));
            }
            it = x;
            if it == d {
                return out;
            }
        }
    }

    /// Fills the hole next to the boundary dart `d` with a new face and
    /// returns a dart of it. The new face gets a new face row, its vertices
    /// and edges are the ones of the hole.
    pub fn close_hole(&mut self, d: Dart) -> Dart {
        let border = self.boundary_loop(d);
        let k = border.len();

        let first = self.new_face(k);
        let mut n = first;
        for i in 0..k {
            let b = border[i];
            self.phi2sew(b, n);
            self.inherit_embedding(Orbit::Vertex, n, border[(i + 1) % k]);
            self.inherit_embedding(Orbit::Edge, n, b);
            self.inherit_embedding(Orbit::Volume, n, b);
            n = self.phi_1(n);
        }
        if self.base.is_orbit_embedded(Orbit::Face) {
            self.embed_new_orbit(Orbit::Face, first);
        }
        first
    }

    /// Closes every hole of the map. Returns the number of new faces.
    pub fn close_all_holes(&mut self) -> usize {
        let mut count = 0;
        loop {
            let hole = self.base.darts().find(|&d| self.is_boundary_edge(d));
            match hole {
                Some(d) => self.close_hole(d),
                None => break,
            };
            count += 1;
        }
        count
    }

    /// Removes a face with two darts (see
    /// [`Phi2::collapse_degenerated_face`]) or one dart, and updates the
    /// rows. Faces of higher degree are left alone.
    fn remove_degenerated_face(&mut self, f: Dart) {
        match self.face_degree(f) {
            1 => {
                if !self.is_boundary_edge(f) {
                    self.phi2unsew(f);
                }
                self.delete_dart(f);
            }
            2 => self.collapse_degenerated_face(f),
            _ => {}
        }
    }
}

impl CombinatorialMap for Map2 {
    const MAP_TYPE: &'static str = "Map2";
    const DIMENSION: u32 = 2;

    fn base(&self) -> &GenericMap {
        &self.base
    }

    fn base_mut(&mut self) -> &mut GenericMap {
        &mut self.base
    }

    fn foreach_dart_of_vertex(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        self.vertex_darts(d).into_iter().any(|x| f(x))
    }

    fn foreach_dart_of_edge(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        let e = self.phi2(d);
        f(d) || (e != d && f(e))
    }

    fn foreach_dart_of_face(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        let mut it = d;
        loop {
            if f(it) {
                return true;
            }
            it = self.phi1(it);
            if it == d {
                return false;
            }
        }
    }

    fn foreach_dart_of_volume(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        self.foreach_dart_of_cc(d, f)
    }

    fn foreach_dart_of_cc(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack = vec![d];
        visited.insert(d);
        while let Some(x) = stack.pop() {
            if f(x) {
                return true;
            }
            for &y in &[self.phi1(x), self.phi2(x)] {
                if visited.insert(y) {
                    stack.push(y);
                }
            }
        }
        false
    }
}

impl Phi1 for Map2 {}
impl Phi2 for Map2 {}

impl EdgeCollapse for Map2 {
    /// Collapses the edge of `d` onto the vertex of `d`. Faces that become
    /// degenerate (two darts) are removed and their two outer edges are
    /// sewn together.
    fn collapse_edge(&mut self, d: Dart) {
        let e = self.phi2(d);

        let mut seeds = vec![d, self.phi1(d)];
        for &x in self.face_darts(d).iter().chain(&self.face_darts(e)) {
            seeds.push(x);
            seeds.push(self.phi2(x));
        }
        let groups = self.all_cell_groups(&seeds);

        if e != d {
            let e1 = self.phi1(e);
            self.phi2unsew(d);
            self.remove_from_face(e);
            self.delete_dart(e);
            if e1 != e {
                self.remove_degenerated_face(e1);
            }
        }

        let d1 = self.phi1(d);
        self.remove_from_face(d);
        self.delete_dart(d);
        if d1 != d && self.base.is_dart_valid(d1) {
            self.remove_degenerated_face(d1);
        }

        self.reclaim_all_cells(groups);
    }
}

impl SurfaceMap for Map2 {}

impl Default for Map2 {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Map2 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Map2").field("darts", &self.base).finish()
    }
}
