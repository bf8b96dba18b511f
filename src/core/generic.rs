use std::fmt;

use crate::{
    container::{AttribContainer, AttribValue, AttributeHandle, Column},
    handle::{hsize, Dart, HSizeExt},
    marker::{Marker, MarkerError, MarkerPool},
    orbit::{Orbit, EMBNULL, NB_ORBITS},
};


/// One relation table: `table[d]` is the image of dart `d`.
#[derive(Clone)]
pub(crate) struct Relation {
    pub(crate) name: String,
    pub(crate) table: Vec<Dart>,
}


/// Dimension independent storage of a combinatorial map.
///
/// This owns
/// - one attribute container per orbit (the dart container allocates the
///   darts themselves),
/// - one embedding table per embedded cell orbit, mapping darts to rows of
///   the orbit's container,
/// - the relation tables registered by the concrete map.
///
/// `GenericMap` does not know how orbits are defined, so everything that
/// needs orbit traversal lives in [`CombinatorialMap`][super::CombinatorialMap].
#[derive(Clone)]
pub struct GenericMap {
    attribs: [AttribContainer; NB_ORBITS],
    embeddings: [Option<Vec<hsize>>; NB_ORBITS],
    relations: Vec<Relation>,
}

impl GenericMap {
    pub fn new() -> Self {
        Self {
            attribs: Default::default(),
            embeddings: Default::default(),
            relations: Vec::new(),
        }
    }

    // ===========================================================================================
    // ===== Relations
    // ===========================================================================================

    /// Registers a new relation and returns its index. Existing darts get a
    /// self loop.
    pub(crate) fn add_relation(&mut self, name: &str) -> usize {
        let len = self.dart_table_len();
        let table = (0..len).map(Dart::from_usize).collect();
        self.relations.push(Relation {
            name: name.to_owned(),
            table,
        });
        self.relations.len() - 1
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.relations.iter().map(|r| r.name.as_str())
    }

    pub fn nb_relations(&self) -> usize {
        self.relations.len()
    }

    #[inline(always)]
    pub fn relation(&self, rel: usize, d: Dart) -> Dart {
        self.relations[rel].table[d.to_usize()]
    }

    #[inline(always)]
    pub(crate) fn set_relation(&mut self, rel: usize, d: Dart, image: Dart) {
        self.relations[rel].table[d.to_usize()] = image;
    }

    pub(crate) fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub(crate) fn relations_mut(&mut self) -> &mut [Relation] {
        &mut self.relations
    }

    // ===========================================================================================
    // ===== Darts
    // ===========================================================================================

    fn dart_table_len(&self) -> usize {
        self.attribs[Orbit::Dart.index()].end().idx()
    }

    /// Makes sure all per-dart tables can be indexed with `d`.
    fn grow_dart_tables(&mut self, d: Dart) {
        let len = d.to_usize() + 1;
        for rel in &mut self.relations {
            if rel.table.len() < len {
                let start = rel.table.len();
                rel.table.extend((start..len).map(Dart::from_usize));
            }
        }
        for table in self.embeddings.iter_mut().flatten() {
            if table.len() < len {
                table.resize(len, EMBNULL);
            }
        }
    }

    /// Allocates a dart. All relations map it onto itself and it carries no
    /// embedding.
    pub fn new_dart(&mut self) -> Dart {
        let d = Dart::new(self.attribs[Orbit::Dart.index()].insert_line());
        self.grow_dart_tables(d);
        for rel in &mut self.relations {
            rel.table[d.to_usize()] = d;
        }
        for table in self.embeddings.iter_mut().flatten() {
            table[d.to_usize()] = EMBNULL;
        }
        d
    }

    /// Frees the dart. Relations pointing to `d` are not touched: the caller
    /// has to unsew the dart first. Cell rows are not freed either.
    pub fn delete_dart(&mut self, d: Dart) {
        self.check_dart(d);
        for table in self.embeddings.iter_mut().flatten() {
            table[d.to_usize()] = EMBNULL;
        }
        self.attribs[Orbit::Dart.index()].remove_line(d.idx());
    }

    pub fn is_dart_valid(&self, d: Dart) -> bool {
        !d.is_nil() && self.attribs[Orbit::Dart.index()].is_line_used(d.idx())
    }

    #[inline]
    pub(crate) fn check_dart(&self, d: Dart) {
        if !self.is_dart_valid(d) {
            panic!("{:?} was passed to a map, but this dart does not exist in this map", d);
        }
    }

    pub fn nb_darts(&self) -> hsize {
        self.attribs[Orbit::Dart.index()].nb_lines()
    }

    /// First dart, or [`GenericMap::end`] if there are no darts.
    pub fn begin(&self) -> Dart {
        let c = &self.attribs[Orbit::Dart.index()];
        let b = c.begin();
        if b == c.end() { Dart::NIL } else { Dart::new(b) }
    }

    /// The dart after `d` in index order, or [`GenericMap::end`].
    pub fn next(&self, d: Dart) -> Dart {
        let c = &self.attribs[Orbit::Dart.index()];
        let n = c.next(d.idx());
        if n == c.end() { Dart::NIL } else { Dart::new(n) }
    }

    /// Past-the-end dart, which is [`Dart::NIL`].
    pub fn end(&self) -> Dart {
        Dart::NIL
    }

    /// Iterates over all darts in index order.
    pub fn darts(&self) -> impl Iterator<Item = Dart> + '_ {
        self.attribs[Orbit::Dart.index()].lines().map(Dart::new)
    }

    // ===========================================================================================
    // ===== Containers and embeddings
    // ===========================================================================================

    pub fn container(&self, orbit: Orbit) -> &AttribContainer {
        &self.attribs[orbit.index()]
    }

    pub fn container_mut(&mut self, orbit: Orbit) -> &mut AttribContainer {
        &mut self.attribs[orbit.index()]
    }

    /// The dart orbit is always "embedded": its rows are the darts.
    pub fn is_orbit_embedded(&self, orbit: Orbit) -> bool {
        orbit == Orbit::Dart || self.embeddings[orbit.index()].is_some()
    }

    /// Creates the embedding table of `orbit` (all entries `EMBNULL`).
    /// Returns `false` if the orbit was already embedded.
    pub fn add_embedding(&mut self, orbit: Orbit) -> bool {
        if self.is_orbit_embedded(orbit) {
            return false;
        }
        let len = self.dart_table_len();
        self.embeddings[orbit.index()] = Some(vec![EMBNULL; len]);
        true
    }

    /// Removes the embedding table and all rows of `orbit`.
    pub fn remove_embedding(&mut self, orbit: Orbit) {
        if orbit == Orbit::Dart {
            return;
        }
        self.embeddings[orbit.index()] = None;
        self.attribs[orbit.index()].clear(true);
    }

    /// The embedding stored on `d` itself. No traversal is done: this might
    /// be `EMBNULL` even though other darts of the orbit are embedded.
    #[inline]
    pub fn dart_embedding(&self, d: Dart, orbit: Orbit) -> hsize {
        if orbit == Orbit::Dart {
            return d.idx();
        }
        match &self.embeddings[orbit.index()] {
            Some(table) => table[d.to_usize()],
            None => EMBNULL,
        }
    }

    /// Writes the embedding of `d` only.
    #[inline]
    pub fn set_dart_embedding(&mut self, d: Dart, orbit: Orbit, row: hsize) {
        match &mut self.embeddings[orbit.index()] {
            Some(table) => table[d.to_usize()] = row,
            None if orbit == Orbit::Dart => {
                panic!("the dart orbit has no embedding table, darts are their own rows")
            }
            None => panic!("cannot embed {:?}: orbit {} is not embedded", d, orbit),
        }
    }

    /// Allocates a new row in the container of `orbit`.
    pub fn new_cell(&mut self, orbit: Orbit) -> hsize {
        self.attribs[orbit.index()].insert_line()
    }

    /// Number of allocated rows of `orbit`.
    pub fn nb_cells(&self, orbit: Orbit) -> hsize {
        self.attribs[orbit.index()].nb_lines()
    }

    // ===========================================================================================
    // ===== Attributes
    // ===========================================================================================

    /// Looks up an existing attribute. Returns `None` if there is no column
    /// with that name or if it stores another type.
    pub fn attribute<T: AttribValue>(&self, orbit: Orbit, name: &str) -> Option<AttributeHandle<T>> {
        let c = &self.attribs[orbit.index()];
        let id = c.attribute_id(name)?;
        if c.column_type_name(id) == T::TYPE_NAME {
            Some(AttributeHandle::new(orbit, id))
        } else {
            None
        }
    }

    pub fn remove_attribute<T>(&mut self, h: AttributeHandle<T>) {
        self.attribs[h.orbit().index()].remove_attribute_by_id(h.id());
    }

    /// The whole column, indexed by row.
    pub fn column<T: AttribValue>(&self, h: AttributeHandle<T>) -> &Column<T> {
        self.attribs[h.orbit().index()].column(h.id())
    }

    pub fn column_mut<T: AttribValue>(&mut self, h: AttributeHandle<T>) -> &mut Column<T> {
        self.attribs[h.orbit().index()].column_mut(h.id())
    }

    // ===========================================================================================
    // ===== Markers
    // ===========================================================================================

    /// The mark bits of the container of `orbit`.
    pub fn marker_pool(&self, orbit: Orbit) -> MarkerPool<'_> {
        self.attribs[orbit.index()].marker_pool(orbit)
    }

    /// Leases a long lived marker. Fails if the pool of `orbit` is exhausted
    /// or if `orbit` is a cell orbit that is not embedded.
    pub fn new_marker(&self, orbit: Orbit) -> Result<Marker, MarkerError> {
        if !self.is_orbit_embedded(orbit) {
            return Err(MarkerError::OrbitNotEmbedded(orbit));
        }
        self.marker_pool(orbit).acquire()
    }

    /// Clears and releases a marker obtained by [`GenericMap::new_marker`].
    pub fn release_marker(&self, m: Marker) {
        self.marker_pool(m.orbit()).release(m);
    }

    fn marker_row(&self, m: Marker, d: Dart) -> hsize {
        let row = self.dart_embedding(d, m.orbit());
        if row == EMBNULL {
            panic!("{:?} has no {} embedding, its cell cannot be marked", d, m.orbit());
        }
        row
    }

    /// Marks the dart (dart markers) or the cell of the dart (cell markers).
    pub fn mark(&self, m: Marker, d: Dart) {
        self.marker_pool(m.orbit()).mark(m, self.marker_row(m, d));
    }

    pub fn unmark(&self, m: Marker, d: Dart) {
        self.marker_pool(m.orbit()).unmark(m, self.marker_row(m, d));
    }

    pub fn is_marked(&self, m: Marker, d: Dart) -> bool {
        self.marker_pool(m.orbit()).is_marked(m, self.marker_row(m, d))
    }

    pub fn unmark_all(&self, m: Marker) {
        self.marker_pool(m.orbit()).unmark_all(m);
    }

    // ===========================================================================================
    // ===== Misc
    // ===========================================================================================

    /// Removes all darts and cells. Relations stay registered.
    pub fn clear(&mut self, remove_attributes: bool) {
        for c in &mut self.attribs {
            c.clear(remove_attributes);
        }
        for rel in &mut self.relations {
            rel.table.clear();
        }
        for table in self.embeddings.iter_mut().flatten() {
            table.clear();
        }
        if remove_attributes {
            self.embeddings = Default::default();
        }
    }

    /// Raw embedding table of `orbit`, used by persistence.
    pub(crate) fn embedding_table(&self, orbit: Orbit) -> Option<&[hsize]> {
        self.embeddings[orbit.index()].as_deref()
    }

    /// Replaces all darts, relations and embeddings. Used by the loaders,
    /// which guarantee consistent table lengths.
    pub(crate) fn set_dart_tables(
        &mut self,
        nb_darts: usize,
        relations: Vec<Vec<Dart>>,
        embeddings: Vec<Option<Vec<hsize>>>,
    ) {
        let darts = &mut self.attribs[Orbit::Dart.index()];
        for row in 0..nb_darts {
            darts.insert_line_at(hsize::new(row));
        }
        darts.rebuild_free_list();

        for (rel, table) in self.relations.iter_mut().zip(relations) {
            rel.table = table;
        }
        for (slot, table) in self.embeddings.iter_mut().zip(embeddings) {
            *slot = table;
        }
    }
}

impl Default for GenericMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GenericMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        struct DartRow<'a>(&'a GenericMap, Dart);
        impl fmt::Debug for DartRow<'_> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                let mut s = f.debug_struct(&format!("{:?}", self.1));
                for rel in &self.0.relations {
                    s.field(&rel.name, &rel.table[self.1.to_usize()]);
                }
                for orbit in Orbit::CELLS.iter().copied() {
                    if self.0.is_orbit_embedded(orbit) {
                        s.field(orbit.name(), &self.0.dart_embedding(self.1, orbit));
                    }
                }
                s.finish()
            }
        }

        f.debug_list()
            .entries(self.darts().map(|d| DartRow(self, d)))
            .finish()
    }
}
