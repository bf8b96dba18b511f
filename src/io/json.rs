//! JSON format: one document holding the tables and all attribute values.

use std::io::{Read, Write};

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    container::AttribRegistry,
    core::CombinatorialMap,
    handle::hsize,
    orbit::{Orbit, EMBNULL, NB_ORBITS},
};
use super::{check_embeddings, corrupt, restore_column, restore_rows, DartOrder, Error, Tables};


const FORMAT: &str = "dartmap";
const VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Document {
    format: String,
    version: u32,
    map_type: String,
    nb_darts: usize,
    relations: Vec<RelationDoc>,
    embeddings: Vec<EmbeddingDoc>,
    containers: Vec<ContainerDoc>,
}

#[derive(Serialize, Deserialize)]
struct RelationDoc {
    name: String,
    table: Vec<hsize>,
}

/// Darts without embedding are `null`.
#[derive(Serialize, Deserialize)]
struct EmbeddingDoc {
    orbit: Orbit,
    table: Vec<Option<hsize>>,
}

#[derive(Serialize, Deserialize)]
struct ContainerDoc {
    orbit: Orbit,
    rows: Vec<hsize>,
    columns: Vec<ColumnDoc>,
}

#[derive(Serialize, Deserialize)]
struct ColumnDoc {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    /// One value per entry of `rows`.
    values: Vec<Value>,
}


/// Writes `map` as JSON document.
pub fn save_json<M: CombinatorialMap>(map: &M, mut w: impl Write) -> Result<(), Error> {
    let base = map.base();
    let order = DartOrder::new(base);
    let tables = Tables::from_map(map, &order);

    let embeddings = Orbit::CELLS.iter()
        .filter_map(|&orbit| {
            let table = tables.embeddings[orbit.index()].as_ref()?;
            let table = table.iter().map(|&row| if row == EMBNULL { None } else { Some(row) }).collect();
            Some(EmbeddingDoc { orbit, table })
        })
        .collect();

    let mut containers = Vec::with_capacity(NB_ORBITS);
    let mut nb_rows = 0;
    for &orbit in &Orbit::ALL {
        let container = base.container(orbit);
        let rows = order.rows(base, orbit);
        nb_rows += rows.len();

        let mut columns = Vec::new();
        for (id, name) in container.attributes() {
            let column = container.erased(id);
            let values = rows.iter()
                .map(|&(row, _)| column.row_to_json(row, &|d| order.remap_dart(d)))
                .collect::<Result<Vec<_>, _>>()?;
            columns.push(ColumnDoc {
                name: name.to_owned(),
                type_name: container.column_type_name(id).to_owned(),
                values,
            });
        }
        containers.push(ContainerDoc {
            orbit,
            rows: rows.iter().map(|&(_, saved)| saved).collect(),
            columns,
        });
    }

    let doc = Document {
        format: FORMAT.to_owned(),
        version: VERSION,
        map_type: tables.map_type,
        nb_darts: tables.nb_darts,
        relations: tables.relation_names.into_iter()
            .zip(tables.relations)
            .map(|(name, table)| RelationDoc { name, table })
            .collect(),
        embeddings,
        containers,
    };

    serde_json::to_writer(&mut w, &doc)?;
    w.flush()?;
    info!("saved {} ({} darts, {} rows) as JSON", M::MAP_TYPE, doc.nb_darts, nb_rows);
    Ok(())
}

/// Reads a map written by [`save_json`]. The map type in the document has to
/// be `M`, and `registry` has to know all attribute types.
pub fn load_json<M: CombinatorialMap + Default>(r: impl Read, registry: &AttribRegistry) -> Result<M, Error> {
    let doc: Document = serde_json::from_reader(r)?;
    if doc.format != FORMAT {
        return Err(corrupt(format!("unknown format '{}'", doc.format)));
    }
    if doc.version != VERSION {
        return Err(corrupt(format!("unsupported version {}", doc.version)));
    }

    let mut embeddings = vec![None; NB_ORBITS];
    for e in doc.embeddings {
        if e.orbit == Orbit::Dart || embeddings[e.orbit.index()].is_some() {
            return Err(corrupt(format!("invalid embedding table for {}", e.orbit)));
        }
        embeddings[e.orbit.index()] = Some(e.table.into_iter().map(|row| row.unwrap_or(EMBNULL)).collect());
    }

    let (relation_names, relations) = doc.relations.into_iter().map(|r| (r.name, r.table)).unzip();
    let tables = Tables {
        map_type: doc.map_type,
        relation_names,
        nb_darts: doc.nb_darts,
        relations,
        embeddings,
    };
    let mut map: M = tables.into_map()?;

    let mut nb_rows = 0;
    for c in doc.containers {
        restore_rows(map.base_mut(), c.orbit, &c.rows)?;
        nb_rows += c.rows.len();

        for col in c.columns {
            if col.values.len() != c.rows.len() {
                return Err(corrupt(format!(
                    "{} attribute '{}' has {} values for {} rows",
                    c.orbit,
                    col.name,
                    col.values.len(),
                    c.rows.len(),
                )));
            }
            let id = restore_column(map.base_mut(), registry, c.orbit, &col.name, &col.type_name)?;
            let column = map.base_mut().container_mut(c.orbit).erased_mut(id);
            for (&row, value) in c.rows.iter().zip(col.values) {
                column.row_from_json(row, value)?;
            }
        }
    }

    check_embeddings(map.base())?;
    info!("loaded {} ({} darts, {} rows) from JSON", M::MAP_TYPE, doc.nb_darts, nb_rows);
    Ok(map)
}
