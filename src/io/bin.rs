//! Binary format: a little endian stream.
//!
//! ```text
//! magic "DARTMAP\0", version: u32
//! map type: str, relations: u32 + str*
//! darts: u64, relation tables: idx*, embeddings: (u8 flag [+ idx*]) per cell orbit
//! containers: per orbit, rows: u64 + idx*, columns: u32 + (name: str, type: str, value*)*
//! ```
//!
//! Strings are a `u32` byte length followed by UTF-8. Indices are `u64`,
//! with `u64::MAX` for "no row" regardless of the width of `hsize`.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::info;

use crate::{
    container::AttribRegistry,
    core::CombinatorialMap,
    handle::hsize,
    orbit::{Orbit, EMBNULL, NB_ORBITS},
};
use super::{check_embeddings, corrupt, restore_column, restore_rows, DartOrder, Error, Tables};


const MAGIC: &[u8; 8] = b"DARTMAP\0";
const VERSION: u32 = 1;

fn write_str(w: &mut dyn Write, s: &str) -> Result<(), Error> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_str(r: &mut dyn Read) -> Result<String, Error> {
    let len = r.read_u32::<LittleEndian>()? as u64;
    let mut buf = Vec::new();
    (&mut *r).take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(corrupt("unexpected end of string"));
    }
    String::from_utf8(buf).map_err(|_| corrupt("string is not valid UTF-8"))
}

fn write_idx(w: &mut dyn Write, idx: hsize) -> Result<(), Error> {
    let raw = if idx == EMBNULL { u64::max_value() } else { idx as u64 };
    w.write_u64::<LittleEndian>(raw)?;
    Ok(())
}

fn read_idx(r: &mut dyn Read) -> Result<hsize, Error> {
    match r.read_u64::<LittleEndian>()? {
        raw if raw == u64::max_value() => Ok(EMBNULL),
        raw if raw < EMBNULL as u64 => Ok(raw as hsize),
        raw => Err(corrupt(format!("index {} is too large", raw))),
    }
}

fn read_len(r: &mut dyn Read) -> Result<usize, Error> {
    let raw = r.read_u64::<LittleEndian>()?;
    if raw >= EMBNULL as u64 {
        return Err(corrupt(format!("length {} is too large", raw)));
    }
    Ok(raw as usize)
}

fn read_indices(r: &mut dyn Read, n: usize) -> Result<Vec<hsize>, Error> {
    // `n` comes from the file, so don't trust it for the allocation.
    let mut out = Vec::with_capacity(n.min(1 << 16));
    for _ in 0..n {
        out.push(read_idx(r)?);
    }
    Ok(out)
}


/// Writes `map` in the binary format.
pub fn save_bin<M: CombinatorialMap>(map: &M, mut w: impl Write) -> Result<(), Error> {
    let w: &mut dyn Write = &mut w;
    let base = map.base();
    let order = DartOrder::new(base);
    let tables = Tables::from_map(map, &order);

    w.write_all(MAGIC)?;
    w.write_u32::<LittleEndian>(VERSION)?;
    write_str(w, &tables.map_type)?;
    w.write_u32::<LittleEndian>(tables.relation_names.len() as u32)?;
    for name in &tables.relation_names {
        write_str(w, name)?;
    }

    w.write_u64::<LittleEndian>(tables.nb_darts as u64)?;
    for table in &tables.relations {
        for &img in table {
            write_idx(w, img)?;
        }
    }
    for &orbit in &Orbit::CELLS {
        match &tables.embeddings[orbit.index()] {
            Some(table) => {
                w.write_u8(1)?;
                for &row in table {
                    write_idx(w, row)?;
                }
            }
            None => w.write_u8(0)?,
        }
    }

    let mut nb_rows = 0;
    for &orbit in &Orbit::ALL {
        let container = base.container(orbit);
        let rows = order.rows(base, orbit);
        nb_rows += rows.len();

        w.write_u64::<LittleEndian>(rows.len() as u64)?;
        for &(_, saved) in &rows {
            write_idx(w, saved)?;
        }

        let columns: Vec<_> = container.attributes().collect();
        w.write_u32::<LittleEndian>(columns.len() as u32)?;
        for (id, name) in columns {
            write_str(w, name)?;
            write_str(w, container.column_type_name(id))?;
            let column = container.erased(id);
            for &(row, _) in &rows {
                column.write_row(row, &|d| order.remap_dart(d), w)?;
            }
        }
    }

    w.flush()?;
    info!("saved {} ({} darts, {} rows) in binary format", M::MAP_TYPE, tables.nb_darts, nb_rows);
    Ok(())
}

/// Reads a map written by [`save_bin`]. The map type in the stream has to be
/// `M`, and `registry` has to know all attribute types.
pub fn load_bin<M: CombinatorialMap + Default>(mut r: impl Read, registry: &AttribRegistry) -> Result<M, Error> {
    let r: &mut dyn Read = &mut r;

    let mut magic = [0; 8];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(corrupt("not a binary map file"));
    }
    let version = r.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(corrupt(format!("unsupported version {}", version)));
    }

    let map_type = read_str(r)?;
    let nb_relations = r.read_u32::<LittleEndian>()?;
    let relation_names = (0..nb_relations).map(|_| read_str(r)).collect::<Result<Vec<_>, _>>()?;
    let nb_darts = read_len(r)?;
    let relations = (0..nb_relations)
        .map(|_| read_indices(r, nb_darts))
        .collect::<Result<Vec<_>, _>>()?;

    let mut embeddings = vec![None; NB_ORBITS];
    for &orbit in &Orbit::CELLS {
        match r.read_u8()? {
            0 => {}
            1 => embeddings[orbit.index()] = Some(read_indices(r, nb_darts)?),
            flag => return Err(corrupt(format!("invalid embedding flag {}", flag))),
        }
    }

    let tables = Tables { map_type, relation_names, nb_darts, relations, embeddings };
    let mut map: M = tables.into_map()?;

    let mut nb_rows = 0;
    for &orbit in &Orbit::ALL {
        let n = read_len(r)?;
        let rows = read_indices(r, n)?;
        restore_rows(map.base_mut(), orbit, &rows)?;
        nb_rows += rows.len();

        let nb_columns = r.read_u32::<LittleEndian>()?;
        for _ in 0..nb_columns {
            let name = read_str(r)?;
            let type_name = read_str(r)?;
            let id = restore_column(map.base_mut(), registry, orbit, &name, &type_name)?;
            let column = map.base_mut().container_mut(orbit).erased_mut(id);
            for &row in &rows {
                column.read_row(row, r)?;
            }
        }
    }

    check_embeddings(map.base())?;
    info!("loaded {} ({} darts, {} rows) from binary format", M::MAP_TYPE, nb_darts, nb_rows);
    Ok(map)
}
