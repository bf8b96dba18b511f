use cgmath::vec3;

use crate::{
    container::AttributeHandle,
    core::{BuildError, CombinatorialMap, EdgeCollapse, Map2, Phi1, Phi2},
    handle::Dart,
    math::Vec3,
    orbit::{Orbit, EMBNULL},
    test_utils::{assert_valid_map, euler_characteristic, octahedron, open_strip, tetrahedron},
};


/// The dart going from the vertex at `a` to the vertex at `b`.
fn dart_between(m: &Map2, pos: AttributeHandle<Vec3>, a: Vec3, b: Vec3) -> Dart {
    m.base()
        .darts()
        .find(|&d| *m.attr(pos, d) == a && *m.attr(pos, m.phi1(d)) == b)
        .unwrap_or_else(|| panic!("no dart from {:?} to {:?}", a, b))
}

fn counts(m: &Map2) -> (usize, usize, usize) {
    (m.nb_orbits(Orbit::Vertex), m.nb_orbits(Orbit::Edge), m.nb_orbits(Orbit::Face))
}

fn embed_all(m: &mut Map2) {
    m.init_orbit_embedding(Orbit::Edge, false);
    m.init_orbit_embedding(Orbit::Face, false);
}


#[test]
fn empty() {
    let m = Map2::new();
    assert_eq!(m.nb_darts(), 0);
    assert_eq!(m.nb_orbits(Orbit::Vertex), 0);
    assert_eq!(m.base().begin(), m.base().end());
    assert_valid_map(&m);
}

#[test]
fn new_dart_is_fixed_point() {
    let mut m = Map2::new();
    let d = m.new_dart();
    assert_eq!(m.phi1(d), d);
    assert_eq!(m.phi_1(d), d);
    assert_eq!(m.phi2(d), d);
    assert!(m.is_boundary_edge(d));
}

#[test]
#[should_panic(expected = "both darts must be free")]
fn phi2sew_on_sewn_dart_panics() {
    let mut m = Map2::new();
    let a = m.new_dart();
    let b = m.new_dart();
    let c = m.new_dart();
    m.phi2sew(a, b);
    m.phi2sew(a, c);
}

#[test]
fn phi2unsew_restores_fixed_points() {
    let mut m = Map2::new();
    let a = m.new_dart();
    let b = m.new_dart();
    m.phi2sew(a, b);
    assert_eq!(m.phi2(a), b);
    m.phi2unsew(b);
    assert_eq!(m.phi2(a), a);
    assert_eq!(m.phi2(b), b);
}

#[test]
fn octahedron_orbits() {
    let (m, _) = octahedron();
    assert_valid_map(&m);
    assert_eq!(m.nb_darts(), 24);
    assert_eq!(counts(&m), (6, 12, 8));
    assert_eq!(euler_characteristic(&m), 2);

    for d in m.base().darts() {
        assert_eq!(m.vertex_degree(d), 4);
        assert_eq!(m.face_degree(d), 3);
        assert!(!m.is_boundary_vertex(d));
        assert_eq!(m.orbit_darts(Orbit::Edge, d).len(), 2);
        assert_eq!(m.orbit_darts(Orbit::Volume, d).len(), 24);
    }
}

#[test]
fn vertex_orbit_follows_alpha_1() {
    let (m, _) = octahedron();
    let d = m.base().begin();
    let darts = m.vertex_darts(d);
    assert_eq!(darts[0], d);
    assert_eq!(darts[1], m.alpha_1(d));
    assert_eq!(m.alpha1(darts[1]), d);
    assert!(darts.iter().all(|&x| m.same_vertex(d, x)));
}

#[test]
fn open_strip_boundary() {
    let (m, pos) = open_strip(3);
    assert_valid_map(&m);
    assert_eq!(counts(&m), (8, 13, 6));

    let corner = dart_between(&m, pos, vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0));
    assert!(m.is_boundary_vertex(corner));
    assert!(m.is_boundary_edge(corner));
    assert_eq!(m.vertex_degree(corner), 3);
    assert_eq!(m.vertex_darts(corner).len(), 2);

    let boundary = m.base().darts().filter(|&d| m.is_boundary_edge(d)).count();
    assert_eq!(boundary, 8);
    assert_eq!(m.boundary_loop(m.base().darts().find(|&d| m.is_boundary_edge(d)).unwrap()).len(), 8);
}

#[test]
fn close_hole_of_strip() {
    let (mut m, _) = open_strip(3);
    embed_all(&mut m);
    let d = m.base().darts().find(|&d| m.is_boundary_edge(d)).unwrap();

    let f = m.close_hole(d);
    assert_valid_map(&m);
    assert_eq!(m.face_degree(f), 8);
    assert_eq!(counts(&m), (8, 13, 7));
    assert!(m.base().darts().all(|d| !m.is_boundary_edge(d)));
    assert_eq!(euler_characteristic(&m), 2);
    assert_eq!(m.base().nb_cells(Orbit::Face), 7);
    assert_eq!(m.base().nb_cells(Orbit::Edge), 13);
}

#[test]
fn tetrahedron_edges_cannot_collapse() {
    let (m, _) = tetrahedron();
    assert_valid_map(&m);
    assert!(m.base().darts().all(|d| !m.edge_can_collapse(d)));
}

#[test]
fn collapse_edge_of_octahedron() {
    let (mut m, pos) = octahedron();
    embed_all(&mut m);
    let d = dart_between(&m, pos, vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0));
    assert!(m.edge_can_collapse(d));

    let survivor = m.alpha_1(m.alpha_1(d));
    let row = m.embedding(d, Orbit::Vertex);
    m.collapse_edge(d);

    assert_valid_map(&m);
    assert_eq!(m.nb_darts(), 18);
    assert_eq!(counts(&m), (5, 9, 6));
    assert_eq!(m.base().nb_cells(Orbit::Vertex), 5);
    assert_eq!(m.base().nb_cells(Orbit::Edge), 9);
    assert_eq!(m.base().nb_cells(Orbit::Face), 6);
    assert_eq!(m.embedding(survivor, Orbit::Vertex), row);
    assert_eq!(*m.attr(pos, survivor), vec3(1.0, 0.0, 0.0));
    assert_eq!(m.vertex_degree(survivor), 4);
}

#[test]
fn cut_edge_inserts_vertex() {
    let (mut m, pos) = octahedron();
    embed_all(&mut m);
    let d = dart_between(&m, pos, vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0));
    let e = m.phi2(d);

    let nd = m.cut_edge(d);
    assert_valid_map(&m);
    assert_eq!(m.phi1(d), nd);
    assert_eq!(m.phi2(nd), e);
    assert_eq!(m.face_degree(d), 4);
    assert_eq!(m.face_degree(e), 4);
    assert_eq!(m.vertex_degree(nd), 2);
    assert_eq!(counts(&m), (7, 13, 8));
    assert_eq!(m.base().nb_cells(Orbit::Vertex), 7);
    assert_eq!(m.base().nb_cells(Orbit::Edge), 13);
}

#[test]
fn cut_boundary_edge() {
    let (mut m, _) = open_strip(1);
    embed_all(&mut m);
    let d = m.base().darts().find(|&d| m.is_boundary_edge(d)).unwrap();

    let nd = m.cut_edge(d);
    assert_valid_map(&m);
    assert!(m.is_boundary_edge(d));
    assert!(m.is_boundary_edge(nd));
    assert_eq!(counts(&m), (5, 6, 2));
}

#[test]
fn flip_edge_of_octahedron() {
    let (mut m, pos) = octahedron();
    embed_all(&mut m);
    let d = dart_between(&m, pos, vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0));
    let e = m.phi2(d);

    assert!(m.flip_edge(d));
    assert_valid_map(&m);
    assert_eq!(counts(&m), (6, 12, 8));

    // The edge now connects the two former opposite vertices.
    let ends = [*m.attr(pos, d), *m.attr(pos, e)];
    assert!(ends.contains(&vec3(0.0, 0.0, 1.0)));
    assert!(ends.contains(&vec3(0.0, 0.0, -1.0)));
    assert_eq!(m.vertex_degree(d), 5);
    assert_eq!(m.vertex_degree(m.phi1(d)), 5);
    assert_eq!(m.vertex_degree(m.phi_1(d)), 3);
}

#[test]
fn flip_boundary_edge_is_refused() {
    let (mut m, _) = open_strip(1);
    let d = m.base().darts().find(|&d| m.is_boundary_edge(d)).unwrap();
    assert!(!m.flip_edge(d));
}

#[test]
fn split_and_merge_quad() {
    let positions = vec![
        vec3(0.0, 0.0, 0.0),
        vec3(1.0, 0.0, 0.0),
        vec3(1.0, 1.0, 0.0),
        vec3(0.0, 1.0, 0.0),
    ];
    let (mut m, pos) = Map2::from_polygons(&positions, &[[0, 1, 2, 3]]).unwrap();
    embed_all(&mut m);
    let d = dart_between(&m, pos, positions[0], positions[1]);
    let face_row = m.embedding(d, Orbit::Face);

    let e = m.phi1(m.phi1(d));
    let dd = m.split_face(d, e);
    assert_valid_map(&m);
    assert_eq!(counts(&m), (4, 5, 2));
    assert_eq!(m.face_degree(d), 3);
    assert_eq!(m.face_degree(e), 3);
    assert_eq!(m.embedding(d, Orbit::Face), face_row);
    assert_eq!(*m.attr(pos, dd), positions[0]);
    assert_eq!(*m.attr(pos, m.phi2(dd)), positions[2]);

    assert!(m.merge_faces(dd));
    assert_valid_map(&m);
    assert_eq!(counts(&m), (4, 4, 1));
    assert_eq!(m.face_degree(d), 4);
    assert_eq!(m.base().nb_cells(Orbit::Face), 1);
}

#[test]
fn delete_face_and_close_hole() {
    let (mut m, _) = octahedron();
    embed_all(&mut m);
    let d = m.base().begin();

    m.delete_face(d);
    assert_valid_map(&m);
    assert_eq!(counts(&m), (6, 12, 7));
    assert_eq!(m.base().nb_cells(Orbit::Face), 7);
    let b = m.base().darts().find(|&d| m.is_boundary_edge(d)).unwrap();
    assert_eq!(m.boundary_loop(b).len(), 3);

    assert_eq!(m.close_all_holes(), 1);
    assert_valid_map(&m);
    assert_eq!(counts(&m), (6, 12, 8));
}

#[test]
fn sew_and_unsew_faces() {
    let positions = vec![
        vec3(0.0, 0.0, 0.0),
        vec3(1.0, 0.0, 0.0),
        vec3(0.0, 1.0, 0.0),
        vec3(1.0, 0.0, 0.0),
        vec3(0.0, 0.0, 0.0),
        vec3(1.0, -1.0, 0.0),
    ];
    let (mut m, pos) = Map2::from_polygons(&positions, &[[0, 1, 2], [3, 4, 5]]).unwrap();
    embed_all(&mut m);
    assert_eq!(counts(&m), (6, 6, 2));

    let d = m.base().darts().find(|&d| *m.attr(pos, d) == positions[0] && m.face_degree(d) == 3
        && *m.attr(pos, m.phi1(d)) == positions[1] && *m.attr(pos, m.phi_1(d)) == positions[2]).unwrap();
    let e = m.base().darts().find(|&e| *m.attr(pos, e) == positions[3]
        && *m.attr(pos, m.phi1(e)) == positions[4]).unwrap();

    m.sew_faces(d, e);
    assert_valid_map(&m);
    assert_eq!(counts(&m), (4, 5, 2));
    assert_eq!(m.base().nb_cells(Orbit::Vertex), 4);
    assert_eq!(m.base().nb_cells(Orbit::Edge), 5);

    m.unsew_faces(d);
    assert_valid_map(&m);
    assert_eq!(counts(&m), (6, 6, 2));
    assert_eq!(m.base().nb_cells(Orbit::Vertex), 6);
    assert_eq!(*m.attr(pos, e), positions[3]);
}

#[test]
fn triangle_pair_round_trip() {
    let (mut m, pos) = octahedron();
    let d = dart_between(&m, pos, vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0));
    let e = m.phi2(d);
    let before: Vec<_> = m.base().darts().map(|x| m.phi2(x)).collect();

    let v1 = m.phi2(m.phi_1(d));
    let v2 = m.phi2(m.phi_1(e));
    let d1 = m.phi2(m.phi1(d));
    m.extract_triangle_pair(d);
    assert_eq!(m.phi2(v1), d1);
    assert!(m.is_boundary_edge(m.phi1(d)));
    assert!(!m.same_vertex(v1, d));

    m.insert_triangle_pair(d, v1, v2);
    let after: Vec<_> = m.base().darts().map(|x| m.phi2(x)).collect();
    assert_eq!(before, after);
    assert_valid_map(&m);
}

#[test]
fn get_embedding_memoizes() {
    let (mut m, _) = octahedron();
    let d = m.base().begin();
    let row = m.embedding(d, Orbit::Vertex);
    m.base_mut().set_dart_embedding(d, Orbit::Vertex, EMBNULL);

    assert_eq!(m.embedding(d, Orbit::Vertex), row);
    assert_eq!(m.base().dart_embedding(d, Orbit::Vertex), EMBNULL);
    assert_eq!(m.get_embedding(d, Orbit::Vertex), row);
    assert_eq!(m.base().dart_embedding(d, Orbit::Vertex), row);
    assert_eq!(m.get_embedding(d, Orbit::Vertex), row);
}

#[test]
fn init_orbit_embedding_realloc() {
    let (mut m, _) = octahedron();
    m.init_orbit_embedding(Orbit::Edge, false);
    assert_eq!(m.base().nb_cells(Orbit::Edge), 12);
    m.init_orbit_embedding(Orbit::Edge, true);
    assert_eq!(m.base().nb_cells(Orbit::Edge), 12);
    assert!(m.embeddings_consistent());
}

#[test]
fn attributes_on_faces() {
    let (mut m, _) = octahedron();
    let area = m.add_attribute::<f64>(Orbit::Face, "area");
    assert!(m.base().is_orbit_embedded(Orbit::Face));
    assert_eq!(m.base().nb_cells(Orbit::Face), 8);

    let d = m.base().begin();
    m.set_attr(area, d, 2.5);
    assert_eq!(*m.attr(area, m.phi1(d)), 2.5);
    assert_eq!(m.base().attribute::<f64>(Orbit::Face, "area"), Some(area));
    assert_eq!(m.base().attribute::<u32>(Orbit::Face, "area"), None);
}

#[test]
fn build_errors() {
    let positions = vec![vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0)];

    let err = Map2::from_polygons(&positions, &[[0, 1, 7]]).unwrap_err();
    assert_eq!(err, BuildError::InvalidIndex(0, 7, 3));

    let err = Map2::from_polygons(&positions, &[[0, 1, 1]]).unwrap_err();
    assert_eq!(err, BuildError::DegenerateElement(0));

    let err = Map2::from_polygons(&positions, &[[0, 1, 2], [0, 1, 2]]).unwrap_err();
    assert_eq!(err, BuildError::NonManifoldEdge(0, 1));
}

#[test]
fn phi_path() {
    let (m, _) = octahedron();
    let d = m.base().begin();
    assert_eq!(m.phi(d, &[2, 1]), m.alpha1(d));
    assert_eq!(m.phi(d, &[-1, 2]), m.alpha_1(d));
    assert_eq!(m.phi(d, &[1, 1, 1]), d);
}
