use std::io::Cursor;

use crate::{
    algo::decimation::{decimate, DecimationConfig, Quadric},
    container::AttribRegistry,
    core::{CombinatorialMap, Map1, Map2, Map3, Phi1},
    handle::{hsize, Dart},
    math::Vec3,
    orbit::Orbit,
    test_utils::{assert_valid_map, sphere, two_tetrahedra},
};
use super::*;


fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A surface with freed darts and rows, and attributes on every orbit.
fn map2() -> Map2 {
    let (mut map, pos) = sphere(1);
    decimate(&mut map, pos, 15, &DecimationConfig::default()).unwrap();

    let len = map.add_attribute::<f64>(Orbit::Edge, "length");
    for d in map.orbits(Orbit::Edge) {
        let l = (*map.attr(pos, d) - *map.attr(pos, map.phi1(d))).x;
        map.set_attr(len, d, l);
    }
    let id = map.add_attribute::<u32>(Orbit::Face, "id");
    for (i, d) in map.orbits(Orbit::Face).into_iter().enumerate() {
        map.set_attr(id, d, i as u32 * 3);
    }
    let flag = map.add_attribute::<bool>(Orbit::Dart, "flag");
    let darts: Vec<_> = map.base().darts().collect();
    for d in darts {
        map.set_attr(flag, d, d.idx() % 3 == 0);
    }
    map
}

/// Two polygons with a hole in the dart numbering.
fn map1() -> Map1 {
    let mut map = Map1::new();
    let a = map.new_face(5);
    let b = map.new_face(2);
    let c = map.new_face(3);
    map.delete_face(b);

    let idx = map.add_attribute::<i32>(Orbit::Vertex, "index");
    for (i, d) in map.orbits(Orbit::Vertex).into_iter().enumerate() {
        map.set_attr(idx, d, -(i as i32));
    }
    let next = map.add_attribute::<Dart>(Orbit::Dart, "next");
    for &d in &[a, c] {
        let n = map.phi1(d);
        map.set_attr(next, d, n);
    }
    map
}

fn map3() -> Map3 {
    let (mut map, _) = two_tetrahedra();
    let q = map.add_attribute::<Quadric>(Orbit::Volume, "quadric");
    for d in map.orbits(Orbit::Volume) {
        map.set_attr(q, d, Quadric::from_plane(0.0, 0.0, 1.0, d.idx() as f64));
    }
    map
}

/// Both maps have the same darts (in index order), relations, embeddings
/// and attribute values. Darts are compared by their position in the dart
/// order, including darts stored in attributes.
fn assert_same<M: CombinatorialMap>(a: &M, b: &M) {
    let (a, b) = (a.base(), b.base());
    assert_eq!(a.nb_darts(), b.nb_darts());
    assert!(a.relation_names().eq(b.relation_names()));

    let da: Vec<_> = a.darts().collect();
    let db: Vec<_> = b.darts().collect();
    let pos = |darts: &[Dart], d: Dart| darts.iter().position(|&x| x == d).unwrap();
    let rank = |darts: &[Dart], d: Dart| match darts.iter().position(|&x| x == d) {
        Some(i) => Dart::from_usize(i),
        None => Dart::NIL,
    };
    for (&x, &y) in da.iter().zip(&db) {
        for rel in 0..a.nb_relations() {
            assert_eq!(pos(&da, a.relation(rel, x)), pos(&db, b.relation(rel, y)));
        }
        for &orbit in &Orbit::CELLS {
            assert_eq!(a.dart_embedding(x, orbit), b.dart_embedding(y, orbit));
        }
    }

    for &orbit in &Orbit::ALL {
        let (ca, cb) = (a.container(orbit), b.container(orbit));
        assert_eq!(a.is_orbit_embedded(orbit), b.is_orbit_embedded(orbit));
        assert_eq!(ca.nb_lines(), cb.nb_lines());
        let names_a: Vec<_> = ca.attributes().map(|(_, n)| n.to_owned()).collect();
        let names_b: Vec<_> = cb.attributes().map(|(_, n)| n.to_owned()).collect();
        assert_eq!(names_a, names_b);

        let rows: Vec<(hsize, hsize)> = if orbit == Orbit::Dart {
            da.iter().zip(&db).map(|(x, y)| (x.idx(), y.idx())).collect()
        } else {
            assert!(ca.lines().eq(cb.lines()));
            ca.lines().map(|r| (r, r)).collect()
        };
        for name in &names_a {
            let (ia, ib) = (ca.attribute_id(name).unwrap(), cb.attribute_id(name).unwrap());
            assert_eq!(ca.column_type_name(ia), cb.column_type_name(ib));
            for &(ra, rb) in &rows {
                assert_eq!(
                    ca.erased(ia).row_to_json(ra, &|d| rank(&da, d)).unwrap(),
                    cb.erased(ib).row_to_json(rb, &|d| rank(&db, d)).unwrap(),
                    "{} attribute '{}', row {}",
                    orbit,
                    name,
                    ra,
                );
            }
        }
    }
}

fn bin_round_trip<M: CombinatorialMap + Default>(map: &M) -> M {
    let mut buf = Vec::new();
    save_bin(map, &mut buf).unwrap();
    load_bin(Cursor::new(buf), &AttribRegistry::with_builtin_types()).unwrap()
}

fn json_round_trip<M: CombinatorialMap + Default>(map: &M) -> M {
    let mut buf = Vec::new();
    save_json(map, &mut buf).unwrap();
    load_json(Cursor::new(buf), &AttribRegistry::with_builtin_types()).unwrap()
}

macro_rules! gen_round_trip_tests {
    ($($name:ident => $fixture:expr;)*) => {
        $(
            paste::item! {
                #[test]
                fn [<bin_round_trip_ $name>]() {
                    init_logger();
                    let map = $fixture;
                    let loaded = bin_round_trip(&map);
                    assert_valid_map(&loaded);
                    assert_same(&map, &loaded);
                }

                #[test]
                fn [<json_round_trip_ $name>]() {
                    init_logger();
                    let map = $fixture;
                    let loaded = json_round_trip(&map);
                    assert_valid_map(&loaded);
                    assert_same(&map, &loaded);
                }
            }
        )*
    };
}

gen_round_trip_tests! {
    map1 => map1();
    map2 => map2();
    map3 => map3();
    empty => Map2::new();
}

#[test]
fn darts_are_renumbered() {
    let map = map1();
    assert!(map.base().darts().any(|d| d.idx() >= map.nb_darts()));

    for loaded in vec![bin_round_trip(&map), json_round_trip(&map)] {
        let darts: Vec<_> = loaded.base().darts().map(|d| d.idx()).collect();
        assert_eq!(darts, (0..map.nb_darts()).collect::<Vec<_>>());

        // Darts stored as attribute values follow the renumbering.
        let next = loaded.base().attribute::<Dart>(Orbit::Dart, "next").unwrap();
        let linked: Vec<_> = loaded.base().darts().filter(|&d| !loaded.attr(next, d).is_nil()).collect();
        assert_eq!(linked.len(), 2);
        for d in linked {
            assert_eq!(*loaded.attr(next, d), loaded.phi1(d));
            assert!(loaded.base().is_dart_valid(*loaded.attr(next, d)));
        }
    }
}

#[test]
fn dart_attributes_of_deleted_darts_become_nil() {
    let mut map = map1();
    let next = map.base().attribute::<Dart>(Orbit::Dart, "next").unwrap();
    let gone = map.new_face(4);
    let target = map.phi1(gone);
    let first = map.base().begin();
    map.set_attr(next, first, target);
    map.delete_face(gone);

    let loaded = bin_round_trip(&map);
    let next = loaded.base().attribute::<Dart>(Orbit::Dart, "next").unwrap();
    assert!(loaded.attr(next, loaded.base().begin()).is_nil());
}

#[test]
fn loaded_map_is_usable() {
    let map = map2();
    let mut loaded = bin_round_trip(&map);
    let pos = loaded.base().attribute::<Vec3>(Orbit::Vertex, "position").unwrap();

    // Freed rows are handed out again after loading.
    let original = map.base().container(Orbit::Vertex);
    let free: Vec<hsize> = (0..original.end()).filter(|&r| !original.is_line_used(r)).collect();
    assert!(!free.is_empty());
    let row = loaded.base_mut().new_cell(Orbit::Vertex);
    assert!(free.contains(&row) || row == original.end());
    loaded.base_mut().container_mut(Orbit::Vertex).remove_line(row);

    let before = loaded.nb_orbits(Orbit::Vertex);
    let report = decimate(&mut loaded, pos, before - 2, &DecimationConfig::default()).unwrap();
    assert_eq!(loaded.nb_orbits(Orbit::Vertex), report.vertices);
    assert_valid_map(&loaded);
}

#[test]
fn files() -> Result<(), failure::Error> {
    init_logger();
    let dir = std::env::temp_dir();
    let map = map3();

    let bin = dir.join(format!("dartmap-test-{}.bin", std::process::id()));
    save_bin_file(&map, &bin)?;
    let loaded: Map3 = load_bin_file(&bin, &AttribRegistry::default())?;
    assert_same(&map, &loaded);
    std::fs::remove_file(&bin)?;

    let json = dir.join(format!("dartmap-test-{}.json", std::process::id()));
    save_json_file(&map, &json)?;
    let loaded: Map3 = load_json_file(&json, &AttribRegistry::default())?;
    assert_same(&map, &loaded);
    std::fs::remove_file(&json)?;

    match load_bin_file::<Map3>(dir.join("dartmap-does-not-exist.bin"), &AttribRegistry::default()) {
        Err(Error::Io(_)) => {}
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
    Ok(())
}

#[test]
fn map_type_mismatch() {
    let mut buf = Vec::new();
    save_bin(&map2(), &mut buf).unwrap();
    match load_bin::<Map3>(Cursor::new(buf), &AttribRegistry::default()) {
        Err(Error::MapTypeMismatch { expected, found }) => {
            assert_eq!(expected, "Map3");
            assert_eq!(found, "Map2");
        }
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }

    let mut buf = Vec::new();
    save_json(&map1(), &mut buf).unwrap();
    let res = load_json::<Map2>(Cursor::new(buf), &AttribRegistry::default());
    assert!(matches!(res, Err(Error::MapTypeMismatch { .. })));
}

#[test]
fn unknown_attribute_type() {
    let mut buf = Vec::new();
    save_bin(&map2(), &mut buf).unwrap();

    let mut registry = AttribRegistry::new();
    registry.register::<Vec3>();
    registry.register::<f64>();
    match load_bin::<Map2>(Cursor::new(buf), &registry) {
        Err(Error::UnknownAttributeType(name)) => assert!(!registry.contains(&name)),
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}

#[test]
fn corrupt_input() {
    let mut buf = Vec::new();
    save_bin(&map1(), &mut buf).unwrap();

    // Wrong magic.
    let mut bad = buf.clone();
    bad[0] = b'X';
    let res = load_bin::<Map1>(Cursor::new(bad), &AttribRegistry::default());
    assert!(matches!(res, Err(Error::Corrupt(_))));

    // Truncated.
    let res = load_bin::<Map1>(Cursor::new(&buf[..buf.len() - 3]), &AttribRegistry::default());
    assert!(matches!(res, Err(Error::Io(_))));

    // Relation image out of range.
    let mut json = Vec::new();
    save_json(&map1(), &mut json).unwrap();
    let mut doc: serde_json::Value = serde_json::from_slice(&json).unwrap();
    doc["relations"][0]["table"][0] = serde_json::json!(1000);
    let res = load_json::<Map1>(Cursor::new(serde_json::to_vec(&doc).unwrap()), &AttribRegistry::default());
    assert!(matches!(res, Err(Error::Corrupt(_))));

    // Not JSON at all.
    let res = load_json::<Map1>(Cursor::new(b"{ nope".to_vec()), &AttribRegistry::default());
    assert!(matches!(res, Err(Error::Json(_))));
}
