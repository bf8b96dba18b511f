//! Columnar attribute storage.
//!
//! An [`AttribContainer`] is a table: rows are cells (or darts), columns are
//! named attributes of one type each. Rows are allocated and freed
//! independently of the columns. Freed rows go to a free list and are reused
//! by the next allocation, so row indices stay small and stable: a row index
//! is valid until that very row is removed.
//!
//! Every container also carries one mark word per row. Those are the bits
//! used by [markers][crate::marker]; the container hands them out through a
//! [`MarkerPool`].

use std::{
    any::type_name,
    cell::Cell,
    fmt,
    marker::PhantomData,
};

use stable_vec::StableVec;

use crate::{
    handle::{hsize, HSizeExt},
    marker::{Mark, MarkerPool, MarkerSet},
    orbit::Orbit,
};

mod column;
mod registry;


pub use self::{
    column::{AttribValue, Column},
    registry::AttribRegistry,
};
pub(crate) use self::column::ErasedColumn;


/// Identifies a column inside one container. Ids of removed columns are not
/// reused.
pub type ColumnId = usize;


struct NamedColumn {
    name: String,
    data: Box<dyn ErasedColumn>,
}

impl Clone for NamedColumn {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            data: self.data.box_clone(),
        }
    }
}


/// A set of named, typed columns sharing one row index space.
#[derive(Clone)]
pub struct AttribContainer {
    /// One mark word per allocated row. This doubles as the record of which
    /// rows are allocated.
    lines: StableVec<Cell<Mark>>,
    marker_set: Cell<MarkerSet>,
    free: Vec<hsize>,
    columns: Vec<Option<NamedColumn>>,
}

impl AttribContainer {
    pub fn new() -> Self {
        Self {
            lines: StableVec::new(),
            marker_set: Cell::new(MarkerSet::new()),
            free: Vec::new(),
            columns: Vec::new(),
        }
    }

    // ===========================================================================================
    // ===== Columns
    // ===========================================================================================

    /// Adds a column named `name` holding values of type `T`. All allocated
    /// rows get `T::default_value()`.
    ///
    /// If a column with that name and type already exists, its id is
    /// returned. A column with that name but another type is a logic error
    /// and panics.
    pub fn add_attribute<T: AttribValue>(&mut self, name: &str) -> ColumnId {
        if let Some(id) = self.attribute_id(name) {
            let existing = self.column_type_name(id);
            if existing != T::TYPE_NAME {
                panic!(
                    "attribute '{}' already exists with type '{}', cannot add it as '{}'",
                    name,
                    existing,
                    T::TYPE_NAME,
                );
            }
            return id;
        }

        let mut column = Column::<T>::new();
        for row in self.lines.indices() {
            column.put(hsize::new(row), T::default_value());
        }
        self.push_column(name, Box::new(column))
    }

    /// Adds an (empty) type erased column, used by the loaders.
    pub(crate) fn add_erased(&mut self, name: &str, data: Box<dyn ErasedColumn>) -> ColumnId {
        self.push_column(name, data)
    }

    fn push_column(&mut self, name: &str, data: Box<dyn ErasedColumn>) -> ColumnId {
        self.columns.push(Some(NamedColumn {
            name: name.to_owned(),
            data,
        }));
        self.columns.len() - 1
    }

    /// Removes the column with the given name. Returns `false` if there is no
    /// such column.
    pub fn remove_attribute(&mut self, name: &str) -> bool {
        match self.attribute_id(name) {
            Some(id) => {
                self.columns[id] = None;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_attribute_by_id(&mut self, id: ColumnId) {
        if let Some(slot) = self.columns.get_mut(id) {
            *slot = None;
        }
    }

    pub fn attribute_id(&self, name: &str) -> Option<ColumnId> {
        self.columns.iter().position(|c| c.as_ref().map_or(false, |c| c.name == name))
    }

    /// Ids and names of all existing columns.
    pub fn attributes(&self) -> impl Iterator<Item = (ColumnId, &str)> + '_ {
        self.columns.iter()
            .enumerate()
            .filter_map(|(id, c)| c.as_ref().map(|c| (id, c.name.as_str())))
    }

    pub fn nb_attributes(&self) -> usize {
        self.columns.iter().filter(|c| c.is_some()).count()
    }

    pub fn has_column(&self, id: ColumnId) -> bool {
        matches!(self.columns.get(id), Some(Some(_)))
    }

    pub fn column_type_name(&self, id: ColumnId) -> &'static str {
        self.erased(id).type_name()
    }

    pub(crate) fn erased(&self, id: ColumnId) -> &dyn ErasedColumn {
        match self.columns.get(id) {
            Some(Some(c)) => &*c.data,
            _ => panic!("column {} does not exist in this container", id),
        }
    }

    pub(crate) fn erased_mut(&mut self, id: ColumnId) -> &mut dyn ErasedColumn {
        match self.columns.get_mut(id) {
            Some(Some(c)) => &mut *c.data,
            _ => panic!("column {} does not exist in this container", id),
        }
    }

    /// Returns the typed column with the given id.
    ///
    /// Panics if there is no such column or if it stores another type.
    pub fn column<T: AttribValue>(&self, id: ColumnId) -> &Column<T> {
        match self.erased(id).as_any().downcast_ref::<Column<T>>() {
            Some(c) => c,
            None => panic!(
                "column {} does not store values of type {}",
                id,
                type_name::<T>(),
            ),
        }
    }

    /// Mutable version of [`AttribContainer::column`].
    pub fn column_mut<T: AttribValue>(&mut self, id: ColumnId) -> &mut Column<T> {
        match self.erased_mut(id).as_any_mut().downcast_mut::<Column<T>>() {
            Some(c) => c,
            None => panic!(
                "column {} does not store values of type {}",
                id,
                type_name::<T>(),
            ),
        }
    }

    // ===========================================================================================
    // ===== Rows
    // ===========================================================================================

    /// Allocates a row, reusing a freed one if possible. All columns hold
    /// their default value in the new row.
    pub fn insert_line(&mut self) -> hsize {
        let row = match self.free.pop() {
            Some(row) => {
                self.lines.insert(row.idx(), Cell::new(0));
                row
            }
            None => hsize::new(self.lines.push(Cell::new(0))),
        };

        for c in self.columns.iter_mut().flatten() {
            c.data.reset(row);
        }
        row
    }

    /// Allocates exactly the row `row`, used when rebuilding a container
    /// from a file. The free list has to be rebuilt afterwards with
    /// [`AttribContainer::rebuild_free_list`].
    pub(crate) fn insert_line_at(&mut self, row: hsize) {
        self.lines.reserve_for(row.idx());
        self.lines.insert(row.idx(), Cell::new(0));
        for c in self.columns.iter_mut().flatten() {
            c.data.reset(row);
        }
    }

    pub(crate) fn rebuild_free_list(&mut self) {
        let end = self.lines.next_push_index();
        self.free = (0..end)
            .rev()
            .filter(|&i| !self.lines.has_element_at(i))
            .map(hsize::new)
            .collect();
    }

    /// Frees `row`. The row index will be handed out again by a later
    /// `insert_line`.
    pub fn remove_line(&mut self, row: hsize) {
        if !self.is_line_used(row) {
            panic!("cannot remove row {}: it is not allocated", row);
        }

        self.lines.remove(row.idx());
        for c in self.columns.iter_mut().flatten() {
            c.data.remove(row);
        }
        self.free.push(row);
    }

    pub fn is_line_used(&self, row: hsize) -> bool {
        self.lines.has_element_at(row.idx())
    }

    /// Number of allocated rows.
    pub fn nb_lines(&self) -> hsize {
        hsize::new(self.lines.num_elements())
    }

    /// Copies the values of all columns from row `src` to row `dst`.
    pub fn copy_line(&mut self, dst: hsize, src: hsize) {
        self.check_line(dst);
        self.check_line(src);
        for c in self.columns.iter_mut().flatten() {
            c.data.copy_row(dst, src);
        }
    }

    /// Resets all columns of `row` to their default value.
    pub fn init_line(&mut self, row: hsize) {
        self.check_line(row);
        for c in self.columns.iter_mut().flatten() {
            c.data.reset(row);
        }
    }

    fn check_line(&self, row: hsize) {
        if !self.is_line_used(row) {
            panic!("row {} is not allocated", row);
        }
    }

    /// Removes all rows. If `remove_attributes` is `true`, all columns are
    /// removed as well.
    pub fn clear(&mut self, remove_attributes: bool) {
        self.lines.clear();
        self.free.clear();
        if remove_attributes {
            self.columns.clear();
        } else {
            for c in self.columns.iter_mut().flatten() {
                c.data.clear();
            }
        }
    }

    /// The first allocated row, or `end()` if there is none.
    pub fn begin(&self) -> hsize {
        self.lines.first_filled_slot_from(0).map(hsize::new).unwrap_or_else(|| self.end())
    }

    /// One past the highest row index ever allocated.
    pub fn end(&self) -> hsize {
        hsize::new(self.lines.next_push_index())
    }

    /// The next allocated row after `row`, or `end()`.
    pub fn next(&self, row: hsize) -> hsize {
        let start = row.idx() + 1;
        if start >= self.lines.next_push_index() {
            return self.end();
        }
        self.lines.first_filled_slot_from(start).map(hsize::new).unwrap_or_else(|| self.end())
    }

    /// Iterates over all allocated rows in index order.
    pub fn lines(&self) -> Lines<'_> {
        Lines {
            container: self,
            next: self.begin(),
        }
    }

    pub(crate) fn marker_pool(&self, orbit: Orbit) -> MarkerPool<'_> {
        MarkerPool::new(orbit, &self.lines, &self.marker_set)
    }
}

impl Default for AttribContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AttribContainer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AttribContainer")
            .field("nb_lines", &self.nb_lines())
            .field("end", &self.end())
            .field("attributes", &self.attributes().map(|(_, name)| name).collect::<Vec<_>>())
            .finish()
    }
}


/// Iterator over the allocated rows of a container.
pub struct Lines<'a> {
    container: &'a AttribContainer,
    next: hsize,
}

impl Iterator for Lines<'_> {
    type Item = hsize;
    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.container.end() {
            return None;
        }
        let out = self.next;
        self.next = self.container.next(out);
        Some(out)
    }
}


/// Typed, non-owning reference to a column in one of the containers of a
/// map. It is only an index: it stays valid until the attribute is removed.
pub struct AttributeHandle<T> {
    orbit: Orbit,
    id: ColumnId,
    _dummy: PhantomData<fn() -> T>,
}

impl<T> AttributeHandle<T> {
    pub(crate) fn new(orbit: Orbit, id: ColumnId) -> Self {
        Self {
            orbit,
            id,
            _dummy: PhantomData,
        }
    }

    pub fn orbit(&self) -> Orbit {
        self.orbit
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }
}

impl<T> Clone for AttributeHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttributeHandle<T> {}

impl<T> PartialEq for AttributeHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.orbit == other.orbit && self.id == other.id
    }
}

impl<T> fmt::Debug for AttributeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Attr<{}>({:?}, {})", type_name::<T>(), self.orbit, self.id)
    }
}
