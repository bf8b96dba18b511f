use cgmath::vec3;

use crate::{
    core::{BuildError, CombinatorialMap, EdgeCollapse, Map3, Phi1, Phi3},
    handle::Dart,
    orbit::Orbit,
    test_utils::{assert_valid_map, two_tetrahedra},
};


fn counts(m: &Map3) -> [usize; 4] {
    [
        m.nb_orbits(Orbit::Vertex),
        m.nb_orbits(Orbit::Edge),
        m.nb_orbits(Orbit::Face),
        m.nb_orbits(Orbit::Volume),
    ]
}

fn embed_all(m: &mut Map3) {
    for &orbit in &Orbit::CELLS {
        m.base_mut().add_embedding(orbit);
    }
}

fn boundary_faces(m: &Map3) -> usize {
    m.nb_orbits_where(Orbit::Face, &|d| m.is_boundary_face(d))
}


#[test]
fn single_tetrahedron() {
    let mut m = Map3::new();
    let d = m.new_tetrahedron();

    assert_valid_map(&m);
    assert_eq!(m.nb_darts(), 12);
    assert_eq!(counts(&m), [4, 6, 4, 1]);
    assert_eq!(boundary_faces(&m), 4);
    assert_eq!(m.orbit_darts(Orbit::Vertex, d).len(), 3);
    assert_eq!(m.orbit_darts(Orbit::Edge, d).len(), 2);
    assert_eq!(m.volume_darts(d).len(), 12);
}

#[test]
fn new_tetrahedron_embeds_cells() {
    let mut m = Map3::new();
    embed_all(&mut m);
    m.new_tetrahedron();

    assert_valid_map(&m);
    assert_eq!(m.base().nb_cells(Orbit::Vertex), 4);
    assert_eq!(m.base().nb_cells(Orbit::Edge), 6);
    assert_eq!(m.base().nb_cells(Orbit::Face), 4);
    assert_eq!(m.base().nb_cells(Orbit::Volume), 1);
}

#[test]
fn imported_pair_of_tetrahedra() {
    let (m, _) = two_tetrahedra();
    assert_valid_map(&m);
    assert_eq!(m.nb_darts(), 24);
    assert_eq!(counts(&m), [5, 9, 7, 2]);
    assert_eq!(boundary_faces(&m), 6);
    assert_eq!(m.base().nb_cells(Orbit::Vertex), 5);
}

#[test]
fn edge_fan_of_shared_edge() {
    let (m, pos) = two_tetrahedra();
    let d = m.base()
        .darts()
        .find(|&d| *m.attr(pos, d) == vec3(0.0, 0.0, 0.0) && *m.attr(pos, m.phi1(d)) == vec3(1.0, 0.0, 0.0))
        .unwrap();
    let fan = m.edge_fan(d);
    assert_eq!(fan.len(), 2);
    assert_eq!(m.orbit_darts(Orbit::Edge, d).len(), 4);
}

#[test]
fn sew_and_unsew_volumes() {
    let mut m = Map3::new();
    embed_all(&mut m);
    let a = m.new_tetrahedron();
    let b = m.new_tetrahedron();
    assert_eq!(counts(&m), [8, 12, 8, 2]);

    m.sew_volumes(a, b);
    assert_valid_map(&m);
    assert_eq!(counts(&m), [5, 9, 7, 2]);
    assert_eq!(m.base().nb_cells(Orbit::Vertex), 5);
    assert_eq!(m.base().nb_cells(Orbit::Edge), 9);
    assert_eq!(m.base().nb_cells(Orbit::Face), 7);
    assert_eq!(m.phi3(a), b);

    m.unsew_volumes(a);
    assert_valid_map(&m);
    assert_eq!(counts(&m), [8, 12, 8, 2]);
    assert_eq!(m.base().nb_cells(Orbit::Vertex), 8);
    assert_eq!(m.base().nb_cells(Orbit::Face), 8);
    assert!(m.is_boundary_face(a));
}

#[test]
#[should_panic(expected = "both darts must be free")]
fn phi3sew_twice_panics() {
    let mut m = Map3::new();
    let a = m.new_dart();
    let b = m.new_dart();
    let c = m.new_dart();
    m.phi3sew(a, b);
    m.phi3sew(c, b);
}

#[test]
fn delete_volume() {
    let (mut m, _) = two_tetrahedra();
    embed_all(&mut m);
    m.init_orbit_embedding(Orbit::Edge, false);
    m.init_orbit_embedding(Orbit::Face, false);
    m.init_orbit_embedding(Orbit::Volume, false);
    let d = m.base().begin();

    m.delete_volume(d);
    assert_valid_map(&m);
    assert_eq!(m.nb_darts(), 12);
    assert_eq!(counts(&m), [4, 6, 4, 1]);
    assert_eq!(m.base().nb_cells(Orbit::Vertex), 4);
    assert_eq!(m.base().nb_cells(Orbit::Edge), 6);
    assert_eq!(m.base().nb_cells(Orbit::Face), 4);
    assert_eq!(m.base().nb_cells(Orbit::Volume), 1);
    assert_eq!(boundary_faces(&m), 4);
}

#[test]
fn collapse_edge_between_two_tetrahedra() {
    // The edge 0-1 belongs to the middle tetrahedron only. Collapsing it
    // removes that tetrahedron and glues the two outer ones together.
    let positions = vec![
        vec3(0.0, 0.0, 0.0),
        vec3(1.0, 0.0, 0.0),
        vec3(0.5, 1.0, 0.0),
        vec3(0.5, 0.5, 1.0),
        vec3(-1.0, 0.5, 0.5),
        vec3(2.0, 0.5, 0.5),
    ];
    let tets = [[0, 1, 2, 3], [0, 2, 3, 4], [1, 2, 3, 5]];
    let (mut m, pos) = Map3::from_tetrahedra(&positions, &tets).unwrap();
    m.init_orbit_embedding(Orbit::Edge, false);
    m.init_orbit_embedding(Orbit::Face, false);
    m.init_orbit_embedding(Orbit::Volume, false);
    assert_valid_map(&m);
    assert_eq!(counts(&m), [6, 12, 10, 3]);

    let d: Dart = m.base()
        .darts()
        .find(|&d| *m.attr(pos, d) == positions[0] && *m.attr(pos, m.phi1(d)) == positions[1])
        .unwrap();
    assert_eq!(m.edge_fan(d).len(), 1);

    m.collapse_edge(d);
    assert_valid_map(&m);
    assert_eq!(m.nb_darts(), 24);
    assert_eq!(counts(&m), [5, 9, 7, 2]);
    assert_eq!(m.base().nb_cells(Orbit::Vertex), 5);
    assert_eq!(m.base().nb_cells(Orbit::Edge), 9);
    assert_eq!(m.base().nb_cells(Orbit::Face), 7);
    assert_eq!(m.base().nb_cells(Orbit::Volume), 2);
    assert_eq!(boundary_faces(&m), 6);

    let merged = m.base().darts().filter(|&x| *m.attr(pos, x) == positions[0]).count();
    assert_eq!(merged, 6);
    assert!(m.base().darts().all(|x| *m.attr(pos, x) != positions[1]));
}

#[test]
fn non_manifold_face_is_rejected() {
    let positions = vec![
        vec3(0.0, 0.0, 0.0),
        vec3(1.0, 0.0, 0.0),
        vec3(0.0, 1.0, 0.0),
        vec3(0.0, 0.0, 1.0),
        vec3(0.0, 0.0, -1.0),
        vec3(1.0, 1.0, 1.0),
    ];
    let tets = [[0, 1, 2, 3], [0, 2, 1, 4], [0, 1, 2, 5]];
    let err = Map3::from_tetrahedra(&positions, &tets).unwrap_err();
    assert_eq!(err, BuildError::NonManifoldFace(0, 1, 2));
}
