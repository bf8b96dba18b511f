//! Meshes and checks shared by the unit tests.

use cgmath::{vec3, InnerSpace};
use fxhash::FxHashMap;

use crate::{
    container::AttributeHandle,
    core::{CombinatorialMap, Map2, Map3, PHI1, PHI2, PHI3, PHI_1},
    math::Vec3,
};


pub(crate) fn tetrahedron_data() -> (Vec<Vec3>, Vec<[usize; 3]>) {
    let positions = vec![
        vec3(0.0, 0.0, 0.0),
        vec3(1.0, 0.0, 0.0),
        vec3(0.0, 1.0, 0.0),
        vec3(0.0, 0.0, 1.0),
    ];
    let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]];
    (positions, faces)
}

pub(crate) fn octahedron_data() -> (Vec<Vec3>, Vec<[usize; 3]>) {
    let positions = vec![
        vec3(1.0, 0.0, 0.0),
        vec3(-1.0, 0.0, 0.0),
        vec3(0.0, 1.0, 0.0),
        vec3(0.0, -1.0, 0.0),
        vec3(0.0, 0.0, 1.0),
        vec3(0.0, 0.0, -1.0),
    ];
    let faces = vec![
        [0, 2, 4], [2, 1, 4], [1, 3, 4], [3, 0, 4],
        [2, 0, 5], [1, 2, 5], [3, 1, 5], [0, 3, 5],
    ];
    (positions, faces)
}

/// Octahedron subdivided `levels` times (every triangle split in four) with
/// all vertices projected onto the unit sphere. Level `n` has
/// `4^n * 8` faces.
pub(crate) fn sphere_data(levels: u32) -> (Vec<Vec3>, Vec<[usize; 3]>) {
    let (mut positions, mut faces) = octahedron_data();
    for _ in 0..levels {
        let mut midpoints: FxHashMap<(usize, usize), usize> = FxHashMap::default();
        let mut midpoint = |a: usize, b: usize, positions: &mut Vec<Vec3>| {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                positions.push(((positions[a] + positions[b]) / 2.0).normalize());
                positions.len() - 1
            })
        };

        let mut next = Vec::with_capacity(faces.len() * 4);
        for &[a, b, c] in &faces {
            let ab = midpoint(a, b, &mut positions);
            let bc = midpoint(b, c, &mut positions);
            let ca = midpoint(c, a, &mut positions);
            next.push([a, ab, ca]);
            next.push([ab, b, bc]);
            next.push([ca, bc, c]);
            next.push([ab, bc, ca]);
        }
        faces = next;
    }
    (positions, faces)
}

pub(crate) fn tetrahedron() -> (Map2, AttributeHandle<Vec3>) {
    let (positions, faces) = tetrahedron_data();
    Map2::from_polygons(&positions, &faces).unwrap()
}

pub(crate) fn octahedron() -> (Map2, AttributeHandle<Vec3>) {
    let (positions, faces) = octahedron_data();
    Map2::from_polygons(&positions, &faces).unwrap()
}

pub(crate) fn sphere(levels: u32) -> (Map2, AttributeHandle<Vec3>) {
    let (positions, faces) = sphere_data(levels);
    Map2::from_polygons(&positions, &faces).unwrap()
}

/// A strip of `2 * n` triangles in the plane `z = 0`. Every vertex is on the
/// boundary.
///
/// ```text
///  n+1 -- n+2 -- ... -- 2n+1
///   |  /   |  /       /  |
///   0 ---- 1 --- ... ---- n
/// ```
pub(crate) fn open_strip(n: usize) -> (Map2, AttributeHandle<Vec3>) {
    let mut positions = Vec::new();
    for row in 0..2 {
        for col in 0..=n {
            positions.push(vec3(col as f64, row as f64, 0.0));
        }
    }
    let top = n + 1;
    let mut faces = Vec::new();
    for i in 0..n {
        faces.push([i, i + 1, top + i + 1]);
        faces.push([i, top + i + 1, top + i]);
    }
    Map2::from_polygons(&positions, &faces).unwrap()
}

/// Two tetrahedra sharing the face `(0, 1, 2)`.
pub(crate) fn two_tetrahedra() -> (Map3, AttributeHandle<Vec3>) {
    let positions = vec![
        vec3(0.0, 0.0, 0.0),
        vec3(1.0, 0.0, 0.0),
        vec3(0.0, 1.0, 0.0),
        vec3(0.0, 0.0, 1.0),
        vec3(0.0, 0.0, -1.0),
    ];
    Map3::from_tetrahedra(&positions, &[[0, 1, 2, 3], [0, 2, 1, 4]]).unwrap()
}

/// Checks the relations of a map (`phi_1` inverts `phi1`, `phi2` and `phi3`
/// are involutions, all images are live darts) and the consistency of all
/// embeddings.
pub(crate) fn assert_valid_map<M: CombinatorialMap>(m: &M) {
    let base = m.base();
    let nb_relations = base.nb_relations();
    for d in base.darts() {
        for rel in 0..nb_relations {
            let img = base.relation(rel, d);
            assert!(base.is_dart_valid(img), "{:?} maps {:?} to a deleted dart {:?}", rel, d, img);
        }

        assert_eq!(base.relation(PHI_1, base.relation(PHI1, d)), d, "phi_1(phi1({:?}))", d);
        if nb_relations > PHI2 {
            assert_eq!(base.relation(PHI2, base.relation(PHI2, d)), d, "phi2(phi2({:?}))", d);
        }
        if nb_relations > PHI3 {
            assert_eq!(base.relation(PHI3, base.relation(PHI3, d)), d, "phi3(phi3({:?}))", d);
        }
    }
    assert!(m.embeddings_consistent(), "embeddings are not consistent: {:#?}", base);
}

/// Euler characteristic `V - E + F`.
pub(crate) fn euler_characteristic(m: &Map2) -> i64 {
    use crate::orbit::Orbit;
    m.nb_orbits(Orbit::Vertex) as i64 - m.nb_orbits(Orbit::Edge) as i64
        + m.nb_orbits(Orbit::Face) as i64
}
