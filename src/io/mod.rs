//! Saving and loading maps.
//!
//! Two formats are supported: a compact little endian binary stream
//! ([`save_bin`]/[`load_bin`]) and a JSON document
//! ([`save_json`]/[`load_json`]). Both store the same things:
//!
//! - the map type and the names of its relation tables,
//! - the darts, renumbered to `0..n` in index order, with their relation
//!   images and embeddings,
//! - the rows and columns of every attribute container. Columns are saved
//!   with their name and [type name][crate::AttribValue::TYPE_NAME].
//!
//! Cell rows keep their indices, freed rows stay free after loading. Marks
//! are not saved. The formats are not meant to be stable across versions of
//! this crate.
//!
//! Loading recreates the columns through an
//! [`AttribRegistry`][crate::AttribRegistry], which has to know every
//! attribute type stored in the file.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter},
    path::Path,
};

use failure::Fail;
use log::debug;

use crate::{
    container::{AttribRegistry, ColumnId},
    core::{CombinatorialMap, GenericMap},
    handle::{hsize, Dart, HSizeExt},
    orbit::{Orbit, EMBNULL, NB_ORBITS},
};

mod bin;
mod json;

#[cfg(test)]
mod tests;

pub use self::{
    bin::{load_bin, save_bin},
    json::{load_json, save_json},
};


/// Everything that can go wrong when saving or loading a map.
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "IO error: {}", _0)]
    Io(#[cause] io::Error),

    #[fail(display = "JSON error: {}", _0)]
    Json(#[cause] serde_json::Error),

    #[fail(display = "attribute type '{}' is not registered", _0)]
    UnknownAttributeType(String),

    #[fail(display = "file contains a {}, but a {} was requested", found, expected)]
    MapTypeMismatch {
        expected: String,
        found: String,
    },

    #[fail(display = "relations {:?} in file do not match the relations {:?} of the map", found, expected)]
    RelationMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[fail(display = "corrupt map data: {}", _0)]
    Corrupt(String),
}

impl From<io::Error> for Error {
    fn from(src: io::Error) -> Self {
        Error::Io(src)
    }
}

impl From<serde_json::Error> for Error {
    fn from(src: serde_json::Error) -> Self {
        Error::Json(src)
    }
}

fn corrupt(msg: impl Into<String>) -> Error {
    Error::Corrupt(msg.into())
}

/// Saves `map` in the binary format to the file at `path` (overwriting it).
pub fn save_bin_file<M: CombinatorialMap>(map: &M, path: impl AsRef<Path>) -> Result<(), Error> {
    save_bin(map, BufWriter::new(File::create(path)?))
}

pub fn load_bin_file<M: CombinatorialMap + Default>(
    path: impl AsRef<Path>,
    registry: &AttribRegistry,
) -> Result<M, Error> {
    load_bin(BufReader::new(File::open(path)?), registry)
}

/// Saves `map` as JSON document to the file at `path` (overwriting it).
pub fn save_json_file<M: CombinatorialMap>(map: &M, path: impl AsRef<Path>) -> Result<(), Error> {
    save_json(map, BufWriter::new(File::create(path)?))
}

pub fn load_json_file<M: CombinatorialMap + Default>(
    path: impl AsRef<Path>,
    registry: &AttribRegistry,
) -> Result<M, Error> {
    load_json(BufReader::new(File::open(path)?), registry)
}


// ===============================================================================================
// ===== Shared by both formats
// ===============================================================================================

/// The renumbering of darts to `0..n` used in saved files.
pub(crate) struct DartOrder {
    darts: Vec<Dart>,
    /// Indexed by old dart index.
    new_index: Vec<hsize>,
}

impl DartOrder {
    pub(crate) fn new(base: &GenericMap) -> Self {
        let darts: Vec<Dart> = base.darts().collect();
        let mut new_index = vec![EMBNULL; base.container(Orbit::Dart).end().idx()];
        for (i, d) in darts.iter().enumerate() {
            new_index[d.to_usize()] = hsize::new(i);
        }
        Self { darts, new_index }
    }

    pub(crate) fn len(&self) -> usize {
        self.darts.len()
    }

    pub(crate) fn darts(&self) -> &[Dart] {
        &self.darts
    }

    pub(crate) fn remap(&self, d: Dart) -> hsize {
        self.new_index[d.to_usize()]
    }

    /// The saved dart of `d`. Deleted darts become `NIL`.
    pub(crate) fn remap_dart(&self, d: Dart) -> Dart {
        if d.is_nil() {
            return Dart::NIL;
        }
        match self.new_index.get(d.to_usize()) {
            Some(&i) if i != EMBNULL => Dart::new(i),
            _ => Dart::NIL,
        }
    }

    /// The rows of the container of `orbit` as `(row in map, row in file)`.
    /// Dart rows are renumbered, cell rows are kept.
    pub(crate) fn rows(&self, base: &GenericMap, orbit: Orbit) -> Vec<(hsize, hsize)> {
        if orbit == Orbit::Dart {
            self.darts.iter().enumerate().map(|(i, d)| (d.idx(), hsize::new(i))).collect()
        } else {
            base.container(orbit).lines().map(|row| (row, row)).collect()
        }
    }
}

/// The topology of a map in file numbering.
pub(crate) struct Tables {
    pub(crate) map_type: String,
    pub(crate) relation_names: Vec<String>,
    pub(crate) nb_darts: usize,
    pub(crate) relations: Vec<Vec<hsize>>,
    /// One entry per orbit (the dart orbit is always `None`).
    pub(crate) embeddings: Vec<Option<Vec<hsize>>>,
}

impl Tables {
    pub(crate) fn from_map<M: CombinatorialMap>(map: &M, order: &DartOrder) -> Self {
        let base = map.base();
        let relations = (0..base.nb_relations())
            .map(|rel| order.darts().iter().map(|&d| order.remap(base.relation(rel, d))).collect())
            .collect();
        let embeddings = Orbit::ALL.iter()
            .map(|&orbit| {
                if orbit == Orbit::Dart {
                    return None;
                }
                base.embedding_table(orbit)?;
                Some(order.darts().iter().map(|&d| base.dart_embedding(d, orbit)).collect())
            })
            .collect();

        Self {
            map_type: M::MAP_TYPE.to_owned(),
            relation_names: base.relation_names().map(str::to_owned).collect(),
            nb_darts: order.len(),
            relations,
            embeddings,
        }
    }

    /// Checks the tables against `M` and creates a map holding the darts.
    /// Containers are filled afterwards.
    pub(crate) fn into_map<M: CombinatorialMap + Default>(self) -> Result<M, Error> {
        if self.map_type != M::MAP_TYPE {
            return Err(Error::MapTypeMismatch {
                expected: M::MAP_TYPE.to_owned(),
                found: self.map_type,
            });
        }

        let mut map = M::default();
        let expected: Vec<String> = map.base().relation_names().map(str::to_owned).collect();
        if expected != self.relation_names {
            return Err(Error::RelationMismatch {
                expected,
                found: self.relation_names,
            });
        }

        let n = self.nb_darts;
        for (name, table) in self.relation_names.iter().zip(&self.relations) {
            if table.len() != n {
                return Err(corrupt(format!("relation {} has {} entries for {} darts", name, table.len(), n)));
            }
            if let Some(bad) = table.iter().find(|&&img| img.idx() >= n) {
                return Err(corrupt(format!("relation {} maps to dart {}, but there are only {}", name, bad, n)));
            }
        }
        if self.embeddings.len() != NB_ORBITS || self.embeddings[Orbit::Dart.index()].is_some() {
            return Err(corrupt("invalid set of embedding tables"));
        }
        for (orbit, table) in Orbit::ALL.iter().zip(&self.embeddings) {
            if let Some(table) = table {
                if table.len() != n {
                    return Err(corrupt(format!("{} embedding has {} entries for {} darts", orbit, table.len(), n)));
                }
            }
        }

        let relations = self.relations.into_iter()
            .map(|table| table.into_iter().map(Dart::new).collect())
            .collect();
        map.base_mut().set_dart_tables(n, relations, self.embeddings);
        Ok(map)
    }
}

/// Allocates the saved rows of a cell container. The dart container already
/// holds its rows, they are only checked.
pub(crate) fn restore_rows(base: &mut GenericMap, orbit: Orbit, rows: &[hsize]) -> Result<(), Error> {
    if orbit == Orbit::Dart {
        let in_order = rows.len() == base.nb_darts().idx()
            && rows.iter().enumerate().all(|(i, &row)| row.idx() == i);
        return if in_order { Ok(()) } else { Err(corrupt("dart rows are not numbered 0..n")) };
    }

    let container = base.container_mut(orbit);
    for &row in rows {
        if row == EMBNULL || container.is_line_used(row) {
            return Err(corrupt(format!("invalid or duplicate {} row {}", orbit, row)));
        }
        container.insert_line_at(row);
    }
    container.rebuild_free_list();
    Ok(())
}

/// Creates an empty column of the saved type.
pub(crate) fn restore_column(
    base: &mut GenericMap,
    registry: &AttribRegistry,
    orbit: Orbit,
    name: &str,
    type_name: &str,
) -> Result<ColumnId, Error> {
    let data = registry.create(type_name)
        .ok_or_else(|| Error::UnknownAttributeType(type_name.to_owned()))?;
    let container = base.container_mut(orbit);
    if container.attribute_id(name).is_some() {
        return Err(corrupt(format!("duplicate {} attribute '{}'", orbit, name)));
    }
    Ok(container.add_erased(name, data))
}

/// Every embedded dart has to point to an allocated row.
pub(crate) fn check_embeddings(base: &GenericMap) -> Result<(), Error> {
    for &orbit in &Orbit::CELLS {
        if !base.is_orbit_embedded(orbit) {
            continue;
        }
        let container = base.container(orbit);
        for d in base.darts() {
            let row = base.dart_embedding(d, orbit);
            if row != EMBNULL && !container.is_line_used(row) {
                return Err(corrupt(format!("{:?} is embedded in free {} row {}", d, orbit, row)));
            }
        }
    }
    debug!(
        "loaded map with {} darts, {} vertex rows, {} edge rows, {} face rows, {} volume rows",
        base.nb_darts(),
        base.nb_cells(Orbit::Vertex),
        base.nb_cells(Orbit::Edge),
        base.nb_cells(Orbit::Face),
        base.nb_cells(Orbit::Volume),
    );
    Ok(())
}
