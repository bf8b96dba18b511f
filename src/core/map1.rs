use std::fmt;

use crate::{
    handle::Dart,
    orbit::Orbit,
};
use super::{CombinatorialMap, EdgeCollapse, GenericMap, Phi1, PHI1, PHI_1};


/// A map of dimension 1: a set of cycles (polygons).
///
/// Vertices and edges are single darts, a face is a `phi1` cycle. There is
/// only one face per connected component, so volumes and connected
/// components are faces as well.
#[derive(Clone)]
pub struct Map1 {
    base: GenericMap,
}

impl Map1 {
    pub fn new() -> Self {
        let mut base = GenericMap::new();
        let phi1 = base.add_relation("phi1");
        let phi_1 = base.add_relation("phi_1");
        debug_assert_eq!((phi1, phi_1), (PHI1, PHI_1));
        Self { base }
    }

    /// Inserts a new dart (a new vertex and edge) after `d` and returns it.
    /// Embedded vertices and edges get a new row; face and volume rows are
    /// shared with `d`.
    pub fn cut_edge(&mut self, d: Dart) -> Dart {
        let e = self.insert_after(d);
        for orbit in [Orbit::Vertex, Orbit::Edge].iter().copied() {
            if self.base.is_orbit_embedded(orbit) {
                self.embed_new_cell(orbit, e);
            }
        }
        self.inherit_embedding(Orbit::Face, e, d);
        self.inherit_embedding(Orbit::Volume, e, d);
        e
    }

    /// Inverse of [`Map1::cut_edge`]: removes the successor of `d`.
    pub fn uncut_edge(&mut self, d: Dart) {
        let e = self.phi1(d);
        self.collapse_edge(e);
    }

    /// Splits the cycle of `d` and `e` in two, between `phi_1(d)` and `d`
    /// and between `phi_1(e)` and `e`. The cycle containing `d` keeps the
    /// face row, the one containing `e` gets a copy.
    pub fn split_face(&mut self, d: Dart, e: Dart) {
        assert!(d != e && self.same_face(d, e), "split_face needs two distinct darts of one face");

        let groups = self.cell_groups(Orbit::Face, &[d]);
        let (pd, pe) = (self.phi_1(d), self.phi_1(e));
        self.phi1sew(pd, pe);
        self.reclaim_cells(Orbit::Face, groups);
    }

    /// Deletes the cycle of `d` and frees its rows.
    pub fn delete_face(&mut self, d: Dart) {
        let darts = self.face_darts(d);
        let groups = self.all_cell_groups(&darts);
        self.delete_cycle(d);
        self.reclaim_all_cells(groups);
    }

    /// Merges the cycles of `d` and `e` (which must be different) into one.
    /// The face row of `d` is kept.
    pub fn merge_faces(&mut self, d: Dart, e: Dart) {
        assert!(!self.same_face(d, e), "merge_faces needs darts of two different faces");

        let groups = self.cell_groups(Orbit::Face, &[d, e]);
        let (pd, pe) = (self.phi_1(d), self.phi_1(e));
        self.phi1sew(pd, pe);
        self.reclaim_cells(Orbit::Face, groups);
    }
}

impl CombinatorialMap for Map1 {
    const MAP_TYPE: &'static str = "Map1";
    const DIMENSION: u32 = 1;

    fn base(&self) -> &GenericMap {
        &self.base
    }

    fn base_mut(&mut self) -> &mut GenericMap {
        &mut self.base
    }

    fn foreach_dart_of_vertex(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        f(d)
    }

    fn foreach_dart_of_edge(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        f(d)
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
        self.foreach_dart_of_face(d, f)
    }

    fn foreach_dart_of_cc(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        self.foreach_dart_of_face(d, f)
    }
}

impl Phi1 for Map1 {}

impl EdgeCollapse for Map1 {
    /// Removes `d` from its cycle and deletes it. Rows that were only used
    /// by `d` are freed.
    fn collapse_edge(&mut self, d: Dart) {
        let groups = self.all_cell_groups(&[d]);
        self.remove_from_face(d);
        self.delete_dart(d);
        self.reclaim_all_cells(groups);
    }
}

impl Default for Map1 {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Map1 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Map1").field("darts", &self.base).finish()
    }
}
