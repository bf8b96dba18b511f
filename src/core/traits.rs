use fxhash::FxHashSet;
use smallvec::SmallVec;

use crate::{
    container::{AttribValue, AttributeHandle},
    handle::{hsize, Dart},
    marker::DartMarkerStore,
    orbit::{Orbit, EMBNULL},
};
use super::GenericMap;


/// Index of the `phi1` relation table.
pub const PHI1: usize = 0;
/// Index of the `phi_1` relation table (inverse of `phi1`).
pub const PHI_1: usize = 1;
/// Index of the `phi2` relation table (maps of dimension ≥ 2).
pub const PHI2: usize = 2;
/// Index of the `phi3` relation table (maps of dimension 3).
pub const PHI3: usize = 3;

/// The darts of one orbit. Most orbits are small.
pub type OrbitDarts = SmallVec<[Dart; 16]>;

/// The darts of one cell before a structural change, together with the row
/// of the cell.
pub(crate) type CellGroup = (hsize, OrbitDarts);


/// A combinatorial map of some dimension.
///
/// Implementors provide storage (a [`GenericMap`]) and the definition of the
/// orbits. Everything else (orbit iteration, embeddings, attributes) is
/// provided by this trait.
///
/// All `foreach_*` visitors receive the darts one by one and return `true`
/// to stop the traversal early. The traversal functions return `true` if
/// they were stopped.
pub trait CombinatorialMap {
    /// Name identifying the kind of map in saved files.
    const MAP_TYPE: &'static str;
    const DIMENSION: u32;

    fn base(&self) -> &GenericMap;
    fn base_mut(&mut self) -> &mut GenericMap;

    fn foreach_dart_of_vertex(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool;
    fn foreach_dart_of_edge(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool;
    fn foreach_dart_of_face(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool;
    fn foreach_dart_of_volume(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool;
    fn foreach_dart_of_cc(&self, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool;

    // ===========================================================================================
    // ===== Darts
    // ===========================================================================================

    fn new_dart(&mut self) -> Dart {
        self.base_mut().new_dart()
    }

    fn delete_dart(&mut self, d: Dart) {
        self.base_mut().delete_dart(d)
    }

    fn nb_darts(&self) -> hsize {
        self.base().nb_darts()
    }

    // ===========================================================================================
    // ===== Orbit traversal
    // ===========================================================================================

    fn foreach_dart_of_orbit(&self, orbit: Orbit, d: Dart, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        match orbit {
            Orbit::Dart => f(d),
            Orbit::Vertex => self.foreach_dart_of_vertex(d, f),
            Orbit::Edge => self.foreach_dart_of_edge(d, f),
            Orbit::Face => self.foreach_dart_of_face(d, f),
            Orbit::Volume => self.foreach_dart_of_volume(d, f),
        }
    }

    /// Collects the darts of the orbit of `d`.
    fn orbit_darts(&self, orbit: Orbit, d: Dart) -> OrbitDarts {
        let mut out = OrbitDarts::new();
        self.foreach_dart_of_orbit(orbit, d, &mut |x| {
            out.push(x);
            false
        });
        out
    }

    /// Returns `true` if `e` is in the orbit of `d`.
    fn same_orbit(&self, orbit: Orbit, d: Dart, e: Dart) -> bool {
        self.foreach_dart_of_orbit(orbit, d, &mut |x| x == e)
    }

    /// Calls `f` with one dart of every orbit.
    fn foreach_orbit(&self, orbit: Orbit, f: &mut dyn FnMut(Dart) -> bool) -> bool {
        self.foreach_orbit_where(orbit, &|_| true, f)
    }

    /// Calls `f` with one dart of every orbit that has a dart accepted by
    /// `select`. Only selected darts are passed to `f`.
    fn foreach_orbit_where(
        &self,
        orbit: Orbit,
        select: &dyn Fn(Dart) -> bool,
        f: &mut dyn FnMut(Dart) -> bool,
    ) -> bool {
        let visited = DartMarkerStore::for_traversal(self.base());
        for d in self.base().darts() {
            if visited.is_marked(d) || !select(d) {
                continue;
            }
            self.foreach_dart_of_orbit(orbit, d, &mut |x| {
                visited.mark(x);
                false
            });
            if f(d) {
                return true;
            }
        }
        false
    }

    /// One dart per orbit, in dart order.
    fn orbits(&self, orbit: Orbit) -> Vec<Dart> {
        self.orbits_where(orbit, &|_| true)
    }

    fn orbits_where(&self, orbit: Orbit, select: &dyn Fn(Dart) -> bool) -> Vec<Dart> {
        let mut out = Vec::new();
        self.foreach_orbit_where(orbit, select, &mut |d| {
            out.push(d);
            false
        });
        out
    }

    /// Counts the orbits by traversal (unlike [`GenericMap::nb_cells`],
    /// which counts rows).
    fn nb_orbits(&self, orbit: Orbit) -> usize {
        self.nb_orbits_where(orbit, &|_| true)
    }

    fn nb_orbits_where(&self, orbit: Orbit, select: &dyn Fn(Dart) -> bool) -> usize {
        let mut count = 0;
        self.foreach_orbit_where(orbit, select, &mut |_| {
            count += 1;
            false
        });
        count
    }

    // ===========================================================================================
    // ===== Embedding
    // ===========================================================================================

    /// The row of the `orbit` cell of `d`, without writing anything. If `d`
    /// itself is not embedded, the first embedded dart of the orbit wins.
    /// Returns `EMBNULL` if no dart of the orbit is embedded.
    fn embedding(&self, d: Dart, orbit: Orbit) -> hsize {
        let base = self.base();
        let own = base.dart_embedding(d, orbit);
        if own != EMBNULL || !base.is_orbit_embedded(orbit) {
            return own;
        }

        let mut found = EMBNULL;
        self.foreach_dart_of_orbit(orbit, d, &mut |x| {
            found = base.dart_embedding(x, orbit);
            found != EMBNULL
        });
        found
    }

    /// Like [`CombinatorialMap::embedding`], but writes a row found on
    /// another dart back onto `d`, so that the next call does not traverse.
    fn get_embedding(&mut self, d: Dart, orbit: Orbit) -> hsize {
        let own = self.base().dart_embedding(d, orbit);
        if own != EMBNULL || !self.base().is_orbit_embedded(orbit) {
            return own;
        }

        let found = self.embedding(d, orbit);
        if found != EMBNULL {
            self.base_mut().set_dart_embedding(d, orbit, found);
        }
        found
    }

    /// Writes `row` onto every dart of the orbit of `d`.
    fn embed_orbit(&mut self, orbit: Orbit, d: Dart, row: hsize) {
        for x in self.orbit_darts(orbit, d) {
            self.base_mut().set_dart_embedding(x, orbit, row);
        }
    }

    /// Allocates a row and writes it onto `d` only. The caller has to
    /// propagate it with [`CombinatorialMap::embed_orbit`] if the orbit
    /// has more darts.
    fn embed_new_cell(&mut self, orbit: Orbit, d: Dart) -> hsize {
        let row = self.base_mut().new_cell(orbit);
        self.base_mut().set_dart_embedding(d, orbit, row);
        row
    }

    /// Allocates a row and writes it onto the whole orbit of `d`.
    fn embed_new_orbit(&mut self, orbit: Orbit, d: Dart) -> hsize {
        let row = self.base_mut().new_cell(orbit);
        self.embed_orbit(orbit, d, row);
        row
    }

    /// Embeds `orbit` (if not done yet) and gives every orbit a row.
    ///
    /// With `realloc == false`, orbits that already have an embedded dart
    /// keep that row (propagated to all their darts). With `realloc == true`
    /// all rows are dropped and every orbit gets a fresh one.
    fn init_orbit_embedding(&mut self, orbit: Orbit, realloc: bool) {
        if orbit == Orbit::Dart {
            return;
        }
        self.base_mut().add_embedding(orbit);
        if realloc {
            self.base_mut().container_mut(orbit).clear(false);
            let darts: Vec<_> = self.base().darts().collect();
            for d in darts {
                self.base_mut().set_dart_embedding(d, orbit, EMBNULL);
            }
        }

        for d in self.orbits(orbit) {
            let row = match self.embedding(d, orbit) {
                EMBNULL => self.base_mut().new_cell(orbit),
                row => row,
            };
            self.embed_orbit(orbit, d, row);
        }
    }

    /// Gives every embedded orbit of the given (new, unembedded) darts a
    /// fresh row.
    fn embed_new_darts(&mut self, darts: &[Dart]) {
        for orbit in Orbit::CELLS.iter().copied() {
            if !self.base().is_orbit_embedded(orbit) {
                continue;
            }
            for &d in darts {
                if self.base().dart_embedding(d, orbit) == EMBNULL {
                    self.embed_new_orbit(orbit, d);
                }
            }
        }
    }

    /// Copies all attribute values of the `orbit` cell of `src` to the cell
    /// of `dst`.
    fn copy_cell(&mut self, orbit: Orbit, dst: Dart, src: Dart) {
        let dst_row = self.get_embedding(dst, orbit);
        let src_row = self.get_embedding(src, orbit);
        if dst_row == EMBNULL || src_row == EMBNULL {
            panic!("copy_cell: {:?} or {:?} has no {} embedding", dst, src, orbit);
        }
        self.base_mut().container_mut(orbit).copy_line(dst_row, src_row);
    }

    /// Resets all attribute values of the `orbit` cell of `d`.
    fn init_cell(&mut self, orbit: Orbit, d: Dart) {
        let row = self.get_embedding(d, orbit);
        if row == EMBNULL {
            panic!("init_cell: {:?} has no {} embedding", d, orbit);
        }
        self.base_mut().container_mut(orbit).init_line(row);
    }

    /// Checks that every dart of every orbit of an embedded orbit kind
    /// carries the same, allocated row.
    fn embeddings_consistent(&self) -> bool {
        for orbit in Orbit::CELLS.iter().copied() {
            if !self.base().is_orbit_embedded(orbit) {
                continue;
            }
            let stopped = self.foreach_orbit(orbit, &mut |d| {
                let row = self.base().dart_embedding(d, orbit);
                if row == EMBNULL || !self.base().container(orbit).is_line_used(row) {
                    return true;
                }
                self.foreach_dart_of_orbit(orbit, d, &mut |x| {
                    self.base().dart_embedding(x, orbit) != row
                })
            });
            if stopped {
                return false;
            }
        }
        true
    }

    // ===========================================================================================
    // ===== Attributes
    // ===========================================================================================

    /// Adds a typed attribute on `orbit`, embedding the orbit first if
    /// necessary. Adding an existing attribute (same name and type) returns
    /// its handle.
    fn add_attribute<T: AttribValue>(&mut self, orbit: Orbit, name: &str) -> AttributeHandle<T> {
        if !self.base().is_orbit_embedded(orbit) {
            self.init_orbit_embedding(orbit, false);
        }
        let id = self.base_mut().container_mut(orbit).add_attribute::<T>(name);
        AttributeHandle::new(orbit, id)
    }

    /// The value of the attribute for the cell of `d`.
    fn attr<T: AttribValue>(&self, h: AttributeHandle<T>, d: Dart) -> &T {
        let row = self.embedding(d, h.orbit());
        if row == EMBNULL {
            panic!("{:?} has no {} embedding", d, h.orbit());
        }
        &self.base().column(h)[row]
    }

    fn attr_mut<T: AttribValue>(&mut self, h: AttributeHandle<T>, d: Dart) -> &mut T {
        let row = self.get_embedding(d, h.orbit());
        if row == EMBNULL {
            panic!("{:?} has no {} embedding", d, h.orbit());
        }
        &mut self.base_mut().column_mut(h)[row]
    }

    fn set_attr<T: AttribValue>(&mut self, h: AttributeHandle<T>, d: Dart, value: T) {
        *self.attr_mut(h, d) = value;
    }

    // ===========================================================================================
    // ===== Cell bookkeeping for structural operators
    // ===========================================================================================

    /// Records the cells of `orbit` touched by the seeds: for every seed
    /// whose row was not seen yet, the row and all darts of its orbit. Must
    /// be called before changing the topology.
    #[doc(hidden)]
    fn cell_groups(&self, orbit: Orbit, seeds: &[Dart]) -> Vec<CellGroup> {
        let base = self.base();
        let mut out: Vec<CellGroup> = Vec::new();
        if orbit == Orbit::Dart || !base.is_orbit_embedded(orbit) {
            return out;
        }
        for &s in seeds {
            if !base.is_dart_valid(s) {
                continue;
            }
            let row = base.dart_embedding(s, orbit);
            if row == EMBNULL || out.iter().any(|(r, _)| *r == row) {
                continue;
            }
            out.push((row, self.orbit_darts(orbit, s)));
        }
        out
    }

    /// Brings the rows recorded by [`CombinatorialMap::cell_groups`] in sync
    /// with the new topology.
    ///
    /// The first surviving orbit of every group keeps the group's row and
    /// the row is written onto all its darts. Groups are processed in order,
    /// so if two recorded cells were merged into one orbit, the row of the
    /// earlier group wins and the other row is freed. If a cell was split
    /// into several orbits, the additional orbits get fresh rows holding a
    /// copy of the values. A row whose darts were all deleted is freed.
    #[doc(hidden)]
    fn reclaim_cells(&mut self, orbit: Orbit, groups: Vec<CellGroup>) {
        let mut claimed = FxHashSet::default();
        for (row, darts) in groups {
            let mut row_taken = false;
            for x in darts {
                if claimed.contains(&x) || !self.base().is_dart_valid(x) {
                    continue;
                }
                let target = if row_taken {
                    let fresh = self.base_mut().new_cell(orbit);
                    self.base_mut().container_mut(orbit).copy_line(fresh, row);
                    fresh
                } else {
                    row_taken = true;
                    row
                };
                for y in self.orbit_darts(orbit, x) {
                    claimed.insert(y);
                    self.base_mut().set_dart_embedding(y, orbit, target);
                }
            }

            if !row_taken && self.base().container(orbit).is_line_used(row) {
                self.base_mut().container_mut(orbit).remove_line(row);
            }
        }
    }

    /// `cell_groups` for all embedded cell orbits.
    #[doc(hidden)]
    fn all_cell_groups(&self, seeds: &[Dart]) -> [Vec<CellGroup>; 4] {
        [
            self.cell_groups(Orbit::Vertex, seeds),
            self.cell_groups(Orbit::Edge, seeds),
            self.cell_groups(Orbit::Face, seeds),
            self.cell_groups(Orbit::Volume, seeds),
        ]
    }

    /// `reclaim_cells` for the groups returned by `all_cell_groups`.
    #[doc(hidden)]
    fn reclaim_all_cells(&mut self, groups: [Vec<CellGroup>; 4]) {
        let [vertices, edges, faces, volumes] = groups;
        self.reclaim_cells(Orbit::Vertex, vertices);
        self.reclaim_cells(Orbit::Edge, edges);
        self.reclaim_cells(Orbit::Face, faces);
        self.reclaim_cells(Orbit::Volume, volumes);
    }

    /// Makes the new dart `dst` part of the `orbit` cell of `src` (if that
    /// orbit is embedded). Only `dst` is written.
    #[doc(hidden)]
    fn inherit_embedding(&mut self, orbit: Orbit, dst: Dart, src: Dart) {
        if orbit != Orbit::Dart && self.base().is_orbit_embedded(orbit) {
            let row = self.embedding(src, orbit);
            self.base_mut().set_dart_embedding(dst, orbit, row);
        }
    }
}


/// Maps with the `phi1` relation: every dart belongs to one cycle (face).
pub trait Phi1: CombinatorialMap {
    #[inline]
    fn phi1(&self, d: Dart) -> Dart {
        self.base().relation(PHI1, d)
    }

    #[inline]
    fn phi_1(&self, d: Dart) -> Dart {
        self.base().relation(PHI_1, d)
    }

    /// Exchanges the successors of `d` and `e`. If both are in the same
    /// cycle, it is split in two. Otherwise, the two cycles are merged.
    fn phi1sew(&mut self, d: Dart, e: Dart) {
        let f = self.phi1(d);
        let g = self.phi1(e);
        let base = self.base_mut();
        base.set_relation(PHI1, d, g);
        base.set_relation(PHI1, e, f);
        base.set_relation(PHI_1, g, d);
        base.set_relation(PHI_1, f, e);
    }

    /// Takes the successor of `d` out of its cycle, leaving it as a fixed
    /// point of `phi1`.
    fn phi1unsew(&mut self, d: Dart) {
        let e = self.phi1(d);
        let f = self.phi1(e);
        let base = self.base_mut();
        base.set_relation(PHI1, d, f);
        base.set_relation(PHI1, e, e);
        base.set_relation(PHI_1, f, d);
        base.set_relation(PHI_1, e, e);
    }

    /// Applies a sequence of relations, read left to right: `1` is `phi1`,
    /// `-1` is `phi_1`, `2` is `phi2` and `3` is `phi3`. For example
    /// `phi(d, &[2, 1])` is `phi1(phi2(d))`.
    fn phi(&self, d: Dart, path: &[i8]) -> Dart {
        path.iter().fold(d, |x, &step| {
            let rel = match step {
                1 => PHI1,
                -1 => PHI_1,
                2 => PHI2,
                3 => PHI3,
                other => panic!("invalid relation {} in phi path", other),
            };
            if rel >= self.base().nb_relations() {
                panic!("relation phi{} is not available in a {}", step, Self::MAP_TYPE);
            }
            self.base().relation(rel, x)
        })
    }

    fn face_darts(&self, d: Dart) -> OrbitDarts {
        let mut out = OrbitDarts::new();
        let mut it = d;
        loop {
            out.push(it);
            it = self.phi1(it);
            if it == d {
                break;
            }
        }
        out
    }

    /// Number of darts in the `phi1` cycle of `d`.
    fn face_degree(&self, d: Dart) -> usize {
        let mut count = 1;
        let mut it = self.phi1(d);
        while it != d {
            count += 1;
            it = self.phi1(it);
        }
        count
    }

    /// Creates a new cycle of `n` darts. Only the topology is created: the
    /// new darts carry no embedding.
    fn new_face(&mut self, n: usize) -> Dart {
        assert!(n > 0, "cannot create a face without darts");
        let d = self.new_dart();
        for _ in 1..n {
            self.insert_after(d);
        }
        d
    }

    /// Inserts a new dart after `d` in its cycle and returns it.
    fn insert_after(&mut self, d: Dart) -> Dart {
        let e = self.new_dart();
        self.phi1sew(d, e);
        e
    }

    /// Unlinks `d` from its cycle. `d` stays allocated as a fixed point.
    fn remove_from_face(&mut self, d: Dart) {
        let p = self.phi_1(d);
        if p != d {
            self.phi1unsew(p);
        }
    }

    /// Deletes all darts of the cycle of `d`. Neither other relations nor
    /// embeddings are updated.
    fn delete_cycle(&mut self, d: Dart) {
        for x in self.face_darts(d) {
            self.delete_dart(x);
        }
    }

    fn same_face(&self, d: Dart, e: Dart) -> bool {
        self.face_darts(d).contains(&e)
    }
}


/// Maps with the involution `phi2`, pairing the darts of an edge.
pub trait Phi2: Phi1 {
    #[inline]
    fn phi2(&self, d: Dart) -> Dart {
        self.base().relation(PHI2, d)
    }

    /// Pairs `d` and `e`. Both have to be unpaired.
    fn phi2sew(&mut self, d: Dart, e: Dart) {
        if self.phi2(d) != d || self.phi2(e) != e {
            panic!(
                "phi2sew({:?}, {:?}): both darts must be free, but phi2 maps them to {:?} and {:?}",
                d,
                e,
                self.phi2(d),
                self.phi2(e),
            );
        }
        let base = self.base_mut();
        base.set_relation(PHI2, d, e);
        base.set_relation(PHI2, e, d);
    }

    /// Unpairs `d` from its partner. Both become fixed points of `phi2`.
    fn phi2unsew(&mut self, d: Dart) {
        let e = self.phi2(d);
        let base = self.base_mut();
        base.set_relation(PHI2, d, d);
        base.set_relation(PHI2, e, e);
    }

    /// Next dart around the vertex of `d` (`phi1 ∘ phi2`).
    #[inline]
    fn alpha1(&self, d: Dart) -> Dart {
        self.phi1(self.phi2(d))
    }

    /// Previous dart around the vertex of `d` (`phi2 ∘ phi_1`).
    #[inline]
    fn alpha_1(&self, d: Dart) -> Dart {
        self.phi2(self.phi_1(d))
    }

    #[inline]
    fn is_boundary_edge(&self, d: Dart) -> bool {
        self.phi2(d) == d
    }

    /// The darts leaving the vertex of `d`.
    ///
    /// On a closed vertex, this is the cycle of `alpha_1` starting at `d`.
    /// On a boundary vertex, the darts are listed from one boundary edge to
    /// the other.
    fn vertex_darts(&self, d: Dart) -> OrbitDarts {
        let mut out = OrbitDarts::new();
        out.push(d);

        // Forward: `alpha_1` until we are back at `d` or hit the boundary.
        let mut it = d;
        loop {
            let prev = self.phi_1(it);
            if self.is_boundary_edge(prev) {
                break;
            }
            it = self.phi2(prev);
            if it == d {
                return out;
            }
            out.push(it);
        }

        // Boundary hit: walk backwards with `alpha1` from `d`.
        let mut back = OrbitDarts::new();
        let mut it = d;
        while !self.is_boundary_edge(it) {
            it = self.phi1(self.phi2(it));
            back.push(it);
        }
        back.reverse();
        back.extend(out);
        back
    }

    /// Number of edges incident to the vertex of `d`.
    fn vertex_degree(&self, d: Dart) -> usize {
        let darts = self.vertex_darts(d);
        if self.is_boundary_vertex(d) { darts.len() + 1 } else { darts.len() }
    }

    fn is_boundary_vertex(&self, d: Dart) -> bool {
        self.vertex_darts(d)
            .iter()
            .any(|&x| self.is_boundary_edge(x) || self.is_boundary_edge(self.phi_1(x)))
    }

    fn same_vertex(&self, d: Dart, e: Dart) -> bool {
        self.vertex_darts(d).contains(&e)
    }

    /// A value identifying the vertex of `d`: its row if vertices are
    /// embedded, the smallest dart otherwise.
    fn vertex_key(&self, d: Dart) -> hsize {
        let row = self.base().dart_embedding(d, Orbit::Vertex);
        if row != EMBNULL {
            return row;
        }
        self.vertex_darts(d).iter().map(|x| x.idx()).min().unwrap_or(EMBNULL)
    }

    /// Whether collapsing the edge of `d` keeps the surface a closed
    /// manifold with vertices of reasonable valence.
    ///
    /// Both end points must be interior, the summed valence must be in
    /// `8..=14`, the opposite vertices of incident triangles must keep a
    /// valence of at least 3, and the end points must not share neighbours
    /// other than those opposite vertices (link condition).
    fn edge_can_collapse(&self, d: Dart) -> bool {
        let e = self.phi2(d);
        if e == d || self.is_boundary_vertex(d) || self.is_boundary_vertex(e) {
            return false;
        }

        let val = self.vertex_degree(d) + self.vertex_degree(e);
        if val < 8 || val > 14 {
            return false;
        }

        let mut opposite: SmallVec<[hsize; 2]> = SmallVec::new();
        for &x in &[d, e] {
            if self.face_degree(x) == 3 {
                let o = self.phi_1(x);
                if self.vertex_degree(o) < 4 {
                    return false;
                }
                opposite.push(self.vertex_key(o));
            }
        }

        let v1 = self.vertex_key(d);
        let v2 = self.vertex_key(e);
        let neighbours = |x: Dart, skip: hsize| -> SmallVec<[hsize; 16]> {
            self.vertex_darts(x)
                .iter()
                .map(|&y| self.vertex_key(self.phi1(y)))
                .filter(|&k| k != skip)
                .collect()
        };
        let n1 = neighbours(d, v2);
        let n2 = neighbours(e, v1);
        n1.iter().filter(|k| n2.contains(k)).all(|k| opposite.contains(k))
    }

    /// Removes a face with two darts, sewing the two outer neighbours
    /// together. Embeddings are not updated.
    fn collapse_degenerated_face(&mut self, d: Dart) {
        let d1 = self.phi1(d);
        debug_assert_eq!(self.phi1(d1), d, "collapse_degenerated_face on a face of degree > 2");

        let a = self.phi2(d);
        let b = self.phi2(d1);
        if a != d {
            self.phi2unsew(d);
        }
        if b != d1 {
            self.phi2unsew(d1);
        }
        if a != d && b != d1 {
            self.phi2sew(a, b);
        }
        self.delete_dart(d);
        self.delete_dart(d1);
    }

    /// Detaches the two triangles incident to the edge of `d` from the
    /// surface, sewing their outer neighbours together. The triangles stay
    /// allocated (sewn to each other along `d`) so that
    /// [`Phi2::insert_triangle_pair`] can put them back. Embeddings are not
    /// touched.
    fn extract_triangle_pair(&mut self, d: Dart) {
        let e = self.phi2(d);
        for &x in &[d, e] {
            let d1 = self.phi2(self.phi1(x));
            let d2 = self.phi2(self.phi_1(x));
            self.phi2unsew(d1);
            self.phi2unsew(d2);
            self.phi2sew(d1, d2);
        }
    }

    /// Inverse of [`Phi2::extract_triangle_pair`]: puts the triangle pair of
    /// `d` back. `v1` and `v2` are the darts that were `phi2(phi_1(d))` and
    /// `phi2(phi_1(phi2(d)))` before extraction.
    fn insert_triangle_pair(&mut self, d: Dart, v1: Dart, v2: Dart) {
        let e = self.phi2(d);
        for &(x, v) in &[(d, v1), (e, v2)] {
            let vv = self.phi2(v);
            self.phi2unsew(v);
            let (p, n) = (self.phi_1(x), self.phi1(x));
            self.phi2sew(p, v);
            self.phi2sew(n, vv);
        }
    }
}


/// Maps with the involution `phi3`, pairing faces of adjacent volumes.
pub trait Phi3: Phi2 {
    #[inline]
    fn phi3(&self, d: Dart) -> Dart {
        self.base().relation(PHI3, d)
    }

    /// Pairs `d` and `e`. Both have to be unpaired.
    fn phi3sew(&mut self, d: Dart, e: Dart) {
        if self.phi3(d) != d || self.phi3(e) != e {
            panic!(
                "phi3sew({:?}, {:?}): both darts must be free, but phi3 maps them to {:?} and {:?}",
                d,
                e,
                self.phi3(d),
                self.phi3(e),
            );
        }
        let base = self.base_mut();
        base.set_relation(PHI3, d, e);
        base.set_relation(PHI3, e, d);
    }

    fn phi3unsew(&mut self, d: Dart) {
        let e = self.phi3(d);
        let base = self.base_mut();
        base.set_relation(PHI3, d, d);
        base.set_relation(PHI3, e, e);
    }

    #[inline]
    fn is_boundary_face(&self, d: Dart) -> bool {
        self.phi3(d) == d
    }

    /// Topology of [`Map3::sew_volumes`][super::Map3::sew_volumes]: pairs
    /// `phi1^k(d)` with `phi_1^k(e)` for all darts of the two faces.
    fn phi3sew_faces(&mut self, d: Dart, e: Dart) {
        let n = self.face_degree(d);
        assert_eq!(
            n,
            self.face_degree(e),
            "cannot sew faces of different degree ({:?} and {:?})",
            d,
            e,
        );
        let (mut x, mut y) = (d, e);
        for _ in 0..n {
            self.phi3sew(x, y);
            x = self.phi1(x);
            y = self.phi_1(y);
        }
    }

    /// Unpairs all darts of the face of `d`.
    fn phi3unsew_face(&mut self, d: Dart) {
        for x in self.face_darts(d) {
            if self.phi3(x) != x {
                self.phi3unsew(x);
            }
        }
    }
}


/// Maps supporting edge collapse.
pub trait EdgeCollapse {
    /// Collapses the edge of `d`, merging its two end points into one
    /// vertex (the one `d` starts at keeps its row). Cells that degenerate
    /// are removed and the rows of all embedded orbits are kept in sync.
    fn collapse_edge(&mut self, d: Dart);
}


/// Surface maps the decimation algorithms work on.
pub trait SurfaceMap: Phi2 + EdgeCollapse {}
