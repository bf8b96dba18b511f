//! Marking darts and cells during traversals.
//!
//! Every container row carries a mark word of [`NB_MARKERS`] bits. A
//! [`Marker`] is one leased bit of the container of one orbit. The bits are
//! leased from a [`MarkerPool`], which is the only way the marker types get
//! at the mark words of a map.
//!
//! There are two ways to use markers:
//!
//! - The scoped types [`DartMarker`], [`DartMarkerStore`], [`CellMarker`] and
//!   [`CellMarkerStore`] borrow the map, lease a bit on creation and clear
//!   everything they marked and release the bit when dropped.
//! - A plain [`Marker`] obtained from [`GenericMap::new_marker`] is just a
//!   `Copy` id. It does not borrow the map, so the map can be mutated while
//!   it is leased. It has to be released manually with
//!   [`GenericMap::release_marker`].
//!
//! Marks are stored in `Cell`s, so marking only needs a shared reference to
//! the map.

use std::cell::{Cell, RefCell};

use failure::Fail;
use stable_vec::StableVec;

use crate::{
    core::GenericMap,
    handle::{hsize, Dart, HSizeExt},
    orbit::{Orbit, EMBNULL},
};



/// A word of mark bits.
pub type Mark = u32;

/// Number of markers that can be leased at the same time per orbit.
pub const NB_MARKERS: usize = 32;


/// Errors when leasing a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Fail)]
pub enum MarkerError {
    #[fail(display = "all {} markers of orbit {} are in use", _1, _0)]
    PoolExhausted(Orbit, usize),

    #[fail(display = "cannot mark cells of orbit {}: the orbit is not embedded", _0)]
    OrbitNotEmbedded(Orbit),
}


/// The set of leased mark bits of one container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarkerSet(Mark);

impl MarkerSet {
    pub fn new() -> Self {
        Self(0)
    }

    /// Leases the lowest free bit.
    pub fn acquire(&mut self) -> Option<Mark> {
        if self.0 == Mark::max_value() {
            return None;
        }
        let bit = 1 << (!self.0).trailing_zeros();
        self.0 |= bit;
        Some(bit)
    }

    /// Returns a bit to the set. Returns `false` if it was not leased.
    pub fn release(&mut self, bit: Mark) -> bool {
        let was_leased = self.is_leased(bit);
        self.0 &= !bit;
        was_leased
    }

    pub fn is_leased(&self, bit: Mark) -> bool {
        self.0 & bit == bit
    }

    pub fn nb_leased(&self) -> usize {
        self.0.count_ones() as usize
    }
}


/// A leased mark bit for the container of `orbit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Marker {
    orbit: Orbit,
    bit: Mark,
}

impl Marker {
    pub fn orbit(&self) -> Orbit {
        self.orbit
    }

    pub fn bit(&self) -> Mark {
        self.bit
    }
}


/// Access to the mark words and the leased bits of one container.
///
/// Rows are given directly (for the dart orbit, the row of a dart is its
/// index). Marking a row that is not allocated panics.
#[derive(Clone, Copy)]
pub struct MarkerPool<'a> {
    orbit: Orbit,
    lines: &'a StableVec<Cell<Mark>>,
    set: &'a Cell<MarkerSet>,
}

impl<'a> MarkerPool<'a> {
    pub(crate) fn new(
        orbit: Orbit,
        lines: &'a StableVec<Cell<Mark>>,
        set: &'a Cell<MarkerSet>,
    ) -> Self {
        Self { orbit, lines, set }
    }

    pub fn orbit(&self) -> Orbit {
        self.orbit
    }

    pub fn acquire(&self) -> Result<Marker, MarkerError> {
        let mut set = self.set.get();
        let bit = set.acquire().ok_or(MarkerError::PoolExhausted(self.orbit, NB_MARKERS))?;
        self.set.set(set);
        Ok(Marker { orbit: self.orbit, bit })
    }

    /// Clears the bit on all rows and returns it to the pool. Releasing a
    /// marker that is not leased panics.
    pub fn release(&self, m: Marker) {
        self.check(m);
        self.unmark_all(m);
        let mut set = self.set.get();
        set.release(m.bit);
        self.set.set(set);
    }

    /// Returns the bit to the pool *without* clearing it. Only for callers
    /// that already cleared every row they marked.
    pub(crate) fn release_cleared(&self, m: Marker) {
        self.check(m);
        let mut set = self.set.get();
        set.release(m.bit);
        self.set.set(set);
    }

    pub fn nb_leased(&self) -> usize {
        self.set.get().nb_leased()
    }

    fn check(&self, m: Marker) {
        if m.orbit != self.orbit {
            panic!("marker of orbit {} used with the pool of orbit {}", m.orbit, self.orbit);
        }
        if !self.set.get().is_leased(m.bit) {
            panic!("marker {:#x} of orbit {} is not leased", m.bit, m.orbit);
        }
    }

    fn word(&self, row: hsize) -> &'a Cell<Mark> {
        match self.lines.get(row.idx()) {
            Some(w) => w,
            None => panic!("cannot mark row {} of the {} container: not allocated", row, self.orbit),
        }
    }

    #[inline]
    pub fn mark(&self, m: Marker, row: hsize) {
        let w = self.word(row);
        w.set(w.get() | m.bit);
    }

    #[inline]
    pub fn unmark(&self, m: Marker, row: hsize) {
        let w = self.word(row);
        w.set(w.get() & !m.bit);
    }

    #[inline]
    pub fn is_marked(&self, m: Marker, row: hsize) -> bool {
        self.word(row).get() & m.bit != 0
    }

    pub fn mark_all(&self, m: Marker) {
        for idx in self.lines.indices() {
            let w = &self.lines[idx];
            w.set(w.get() | m.bit);
        }
    }

    pub fn unmark_all(&self, m: Marker) {
        for idx in self.lines.indices() {
            let w = &self.lines[idx];
            w.set(w.get() & !m.bit);
        }
    }

    /// Returns `true` if no row carries the bit.
    pub fn is_all_unmarked(&self, m: Marker) -> bool {
        self.lines.indices().all(|idx| self.lines[idx].get() & m.bit == 0)
    }
}


// ===============================================================================================
// ===== Scoped markers
// ===============================================================================================

/// Marks darts. Unmarks all darts of the map and releases its bit when
/// dropped.
pub struct DartMarker<'a> {
    map: &'a GenericMap,
    marker: Marker,
}

impl<'a> DartMarker<'a> {
    pub fn new(map: &'a GenericMap) -> Result<Self, MarkerError> {
        let marker = map.marker_pool(Orbit::Dart).acquire()?;
        Ok(Self { map, marker })
    }

    pub fn marker(&self) -> Marker {
        self.marker
    }

    pub fn mark(&self, d: Dart) {
        self.map.marker_pool(Orbit::Dart).mark(self.marker, d.idx());
    }

    pub fn unmark(&self, d: Dart) {
        self.map.marker_pool(Orbit::Dart).unmark(self.marker, d.idx());
    }

    pub fn is_marked(&self, d: Dart) -> bool {
        self.map.marker_pool(Orbit::Dart).is_marked(self.marker, d.idx())
    }

    pub fn mark_darts(&self, darts: impl IntoIterator<Item = Dart>) {
        for d in darts {
            self.mark(d);
        }
    }

    pub fn mark_all(&self) {
        self.map.marker_pool(Orbit::Dart).mark_all(self.marker);
    }

    pub fn unmark_all(&self) {
        self.map.marker_pool(Orbit::Dart).unmark_all(self.marker);
    }
}

impl Drop for DartMarker<'_> {
    fn drop(&mut self) {
        // `release` clears the bit everywhere.
        self.map.marker_pool(Orbit::Dart).release(self.marker);
    }
}


/// Marks darts and remembers them, so that dropping only has to clear the
/// darts that were actually marked. Better than [`DartMarker`] when only a
/// small part of the map is touched.
pub struct DartMarkerStore<'a> {
    map: &'a GenericMap,
    marker: Marker,
    marked: RefCell<Vec<Dart>>,
}

impl<'a> DartMarkerStore<'a> {
    pub fn new(map: &'a GenericMap) -> Result<Self, MarkerError> {
        let marker = map.marker_pool(Orbit::Dart).acquire()?;
        Ok(Self {
            map,
            marker,
            marked: RefCell::new(Vec::new()),
        })
    }

    /// Creates a marker for one of the map's own traversals.
    ///
    /// Traversals need a marker for their whole duration. All of them are
    /// scoped, so running out of markers means more than `NB_MARKERS`
    /// traversals are nested or markers were leaked: this panics.
    pub(crate) fn for_traversal(map: &'a GenericMap) -> Self {
        match Self::new(map) {
            Ok(m) => m,
            Err(e) => panic!("orbit traversal needs a dart marker: {}", e),
        }
    }

    pub fn mark(&self, d: Dart) {
        let pool = self.map.marker_pool(Orbit::Dart);
        if !pool.is_marked(self.marker, d.idx()) {
            pool.mark(self.marker, d.idx());
            self.marked.borrow_mut().push(d);
        }
    }

    pub fn is_marked(&self, d: Dart) -> bool {
        self.map.marker_pool(Orbit::Dart).is_marked(self.marker, d.idx())
    }

    /// The darts marked so far, in marking order.
    pub fn marked_darts(&self) -> Vec<Dart> {
        self.marked.borrow().clone()
    }
}

impl Drop for DartMarkerStore<'_> {
    fn drop(&mut self) {
        let pool = self.map.marker_pool(Orbit::Dart);
        for &d in self.marked.borrow().iter() {
            // Darts may have been deleted in the meantime.
            if self.map.is_dart_valid(d) {
                pool.unmark(self.marker, d.idx());
            }
        }
        pool.release_cleared(self.marker);
    }
}


/// Marks cells of an embedded orbit, through the embedding of a dart.
/// Unmarks all cells and releases its bit when dropped.
pub struct CellMarker<'a> {
    map: &'a GenericMap,
    marker: Marker,
}

impl<'a> CellMarker<'a> {
    pub fn new(map: &'a GenericMap, orbit: Orbit) -> Result<Self, MarkerError> {
        if orbit != Orbit::Dart && !map.is_orbit_embedded(orbit) {
            return Err(MarkerError::OrbitNotEmbedded(orbit));
        }
        let marker = map.marker_pool(orbit).acquire()?;
        Ok(Self { map, marker })
    }

    pub fn orbit(&self) -> Orbit {
        self.marker.orbit
    }

    fn row(&self, d: Dart) -> hsize {
        let row = self.map.dart_embedding(d, self.marker.orbit);
        if row == EMBNULL {
            panic!("{:?} has no {} embedding, its cell cannot be marked", d, self.marker.orbit);
        }
        row
    }

    pub fn mark(&self, d: Dart) {
        self.map.marker_pool(self.marker.orbit).mark(self.marker, self.row(d));
    }

    pub fn unmark(&self, d: Dart) {
        self.map.marker_pool(self.marker.orbit).unmark(self.marker, self.row(d));
    }

    pub fn is_marked(&self, d: Dart) -> bool {
        self.map.marker_pool(self.marker.orbit).is_marked(self.marker, self.row(d))
    }

    pub fn mark_row(&self, row: hsize) {
        self.map.marker_pool(self.marker.orbit).mark(self.marker, row);
    }

    pub fn is_row_marked(&self, row: hsize) -> bool {
        self.map.marker_pool(self.marker.orbit).is_marked(self.marker, row)
    }

    pub fn unmark_all(&self) {
        self.map.marker_pool(self.marker.orbit).unmark_all(self.marker);
    }
}

impl Drop for CellMarker<'_> {
    fn drop(&mut self) {
        self.map.marker_pool(self.marker.orbit).release(self.marker);
    }
}


/// Like [`CellMarker`], but remembers the marked rows, so dropping it only
/// touches those.
pub struct CellMarkerStore<'a> {
    map: &'a GenericMap,
    marker: Marker,
    marked: RefCell<Vec<hsize>>,
}

impl<'a> CellMarkerStore<'a> {
    pub fn new(map: &'a GenericMap, orbit: Orbit) -> Result<Self, MarkerError> {
        if orbit != Orbit::Dart && !map.is_orbit_embedded(orbit) {
            return Err(MarkerError::OrbitNotEmbedded(orbit));
        }
        let marker = map.marker_pool(orbit).acquire()?;
        Ok(Self {
            map,
            marker,
            marked: RefCell::new(Vec::new()),
        })
    }

    fn row(&self, d: Dart) -> hsize {
        let row = self.map.dart_embedding(d, self.marker.orbit);
        if row == EMBNULL {
            panic!("{:?} has no {} embedding, its cell cannot be marked", d, self.marker.orbit);
        }
        row
    }

    pub fn mark(&self, d: Dart) {
        let row = self.row(d);
        let pool = self.map.marker_pool(self.marker.orbit);
        if !pool.is_marked(self.marker, row) {
            pool.mark(self.marker, row);
            self.marked.borrow_mut().push(row);
        }
    }

    pub fn is_marked(&self, d: Dart) -> bool {
        self.map.marker_pool(self.marker.orbit).is_marked(self.marker, self.row(d))
    }

    pub fn marked_rows(&self) -> Vec<hsize> {
        self.marked.borrow().clone()
    }
}

impl Drop for CellMarkerStore<'_> {
    fn drop(&mut self) {
        let orbit = self.marker.orbit;
        let pool = self.map.marker_pool(orbit);
        for &row in self.marked.borrow().iter() {
            if self.map.container(orbit).is_line_used(row) {
                pool.unmark(self.marker, row);
            }
        }
        pool.release_cleared(self.marker);
    }
}
