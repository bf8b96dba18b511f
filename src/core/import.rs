//! Building maps from index based mesh descriptions (vertex positions and
//! faces or tetrahedra referring to them by index).

use cgmath::InnerSpace;
use failure::Fail;
use fxhash::FxHashMap;

use crate::{
    container::AttributeHandle,
    handle::{hsize, Dart},
    math::Vec3,
    orbit::Orbit,
};
use super::{CombinatorialMap, Map2, Map3, Phi1, Phi2, Phi3};


/// Name of the vertex attribute the importers store positions in.
pub const POSITION: &str = "position";


/// Errors when building a map from index data.
#[derive(Debug, Clone, PartialEq, Eq, Fail)]
pub enum BuildError {
    #[fail(display = "element {} refers to vertex {}, but there are only {} vertices", _0, _1, _2)]
    InvalidIndex(usize, usize, usize),

    #[fail(display = "element {} is degenerate (too few or repeated vertices)", _0)]
    DegenerateElement(usize),

    #[fail(display = "the edge {} -> {} is used twice in the same direction", _0, _1)]
    NonManifoldEdge(usize, usize),

    #[fail(display = "the face ({}, {}, {}) is shared by more than two tetrahedra", _0, _1, _2)]
    NonManifoldFace(usize, usize, usize),

    #[fail(display = "vertex {} is not manifold (its incident elements are not connected)", _0)]
    NonManifoldVertex(usize),
}


/// Allocates vertex rows lazily, so unreferenced positions get no row.
struct VertexRows<'a> {
    positions: &'a [Vec3],
    rows: Vec<Option<hsize>>,
}

impl<'a> VertexRows<'a> {
    fn new(positions: &'a [Vec3]) -> Self {
        Self {
            positions,
            rows: vec![None; positions.len()],
        }
    }

    fn check(&self, element: usize, index: usize) -> Result<(), BuildError> {
        if index >= self.positions.len() {
            return Err(BuildError::InvalidIndex(element, index, self.positions.len()));
        }
        Ok(())
    }

    fn row<M: CombinatorialMap>(&mut self, map: &mut M, pos: AttributeHandle<Vec3>, index: usize) -> hsize {
        if let Some(row) = self.rows[index] {
            return row;
        }
        let row = map.base_mut().new_cell(Orbit::Vertex);
        map.base_mut().column_mut(pos)[row] = self.positions[index];
        self.rows[index] = Some(row);
        row
    }

    /// Fails if a vertex row ended up on more than one vertex orbit.
    fn check_manifold<M: CombinatorialMap>(&self, map: &M) -> Result<(), BuildError> {
        let mut seen = FxHashMap::default();
        let mut bad = None;
        map.foreach_orbit(Orbit::Vertex, &mut |d| {
            let row = map.base().dart_embedding(d, Orbit::Vertex);
            if seen.insert(row, d).is_some() {
                bad = Some(row);
                return true;
            }
            false
        });

        match bad {
            Some(row) => {
                let index = self.rows.iter().position(|&r| r == Some(row)).unwrap_or(0);
                Err(BuildError::NonManifoldVertex(index))
            }
            None => Ok(()),
        }
    }
}


impl Map2 {
    /// Builds a surface from polygons given as lists of vertex indices.
    ///
    /// Faces must be consistently oriented. Edges used by only one face end
    /// up on the boundary. The positions are stored in the vertex attribute
    /// `"position"`, whose handle is returned with the map. Only vertices
    /// are embedded; positions not used by any face are ignored.
    pub fn from_polygons<F: AsRef<[usize]>>(
        positions: &[Vec3],
        faces: &[F],
    ) -> Result<(Self, AttributeHandle<Vec3>), BuildError> {
        let mut map = Map2::new();
        let pos = map.add_attribute::<Vec3>(Orbit::Vertex, POSITION);
        let mut rows = VertexRows::new(positions);
        let mut half_edges: FxHashMap<(usize, usize), Dart> = FxHashMap::default();

        for (fi, face) in faces.iter().enumerate() {
            let face = face.as_ref();
            for &v in face {
                rows.check(fi, v)?;
            }
            let n = face.len();
            let repeated = (0..n).any(|i| face[i + 1..].contains(&face[i]));
            if n < 3 || repeated {
                return Err(BuildError::DegenerateElement(fi));
            }

            let first = map.new_face(n);
            let mut d = first;
            for i in 0..n {
                let (from, to) = (face[i], face[(i + 1) % n]);
                let row = rows.row(&mut map, pos, from);
                map.base_mut().set_dart_embedding(d, Orbit::Vertex, row);
                if half_edges.insert((from, to), d).is_some() {
                    return Err(BuildError::NonManifoldEdge(from, to));
                }
                d = map.phi1(d);
            }
        }

        for (&(from, to), &d) in &half_edges {
            if let Some(&e) = half_edges.get(&(to, from)) {
                if map.phi2(d) == d && map.phi2(e) == e {
                    map.phi2sew(d, e);
                }
            }
        }

        rows.check_manifold(&map)?;
        log::debug!(
            "built Map2 from {} polygons: {} darts, {} vertices",
            faces.len(),
            map.nb_darts(),
            map.base().nb_cells(Orbit::Vertex),
        );
        Ok((map, pos))
    }
}

impl Map3 {
    /// Builds a volumetric map from tetrahedra given by four vertex indices.
    ///
    /// Tetrahedra with a negative signed volume are reoriented. Faces used
    /// by only one tetrahedron end up on the boundary. Like
    /// [`Map2::from_polygons`], only vertices are embedded and positions
    /// are stored in `"position"`.
    pub fn from_tetrahedra(
        positions: &[Vec3],
        tetrahedra: &[[usize; 4]],
    ) -> Result<(Self, AttributeHandle<Vec3>), BuildError> {
        let mut map = Map3::new();
        let pos = map.add_attribute::<Vec3>(Orbit::Vertex, POSITION);
        let mut rows = VertexRows::new(positions);
        let mut origin: FxHashMap<Dart, usize> = FxHashMap::default();
        let mut open_faces: FxHashMap<[usize; 3], Option<Dart>> = FxHashMap::default();

        for (ti, tet) in tetrahedra.iter().enumerate() {
            let mut tet = *tet;
            for &v in &tet {
                rows.check(ti, v)?;
            }
            let repeated = (0..4).any(|i| tet[i + 1..].contains(&tet[i]));
            if repeated {
                return Err(BuildError::DegenerateElement(ti));
            }
            let p: Vec<Vec3> = tet.iter().map(|&v| positions[v]).collect();
            if (p[1] - p[0]).cross(p[2] - p[0]).dot(p[3] - p[0]) < 0.0 {
                tet.swap(0, 1);
            }

            let darts = map.build_tetrahedron();
            for &(d, local) in &darts {
                let row = rows.row(&mut map, pos, tet[local]);
                map.base_mut().set_dart_embedding(d, Orbit::Vertex, row);
                origin.insert(d, tet[local]);
            }

            for face in darts.chunks(3) {
                let d = face[0].0;
                let mut key = [tet[face[0].1], tet[face[1].1], tet[face[2].1]];
                key.sort_unstable();

                match open_faces.get_mut(&key) {
                    None => {
                        open_faces.insert(key, Some(d));
                    }
                    Some(slot) => {
                        let other = slot.take()
                            .ok_or(BuildError::NonManifoldFace(key[0], key[1], key[2]))?;

                        // Pair `d: a -> b` with the dart of the other face
                        // starting at `b`.
                        let target = origin[&map.phi1(d)];
                        let mut e = other;
                        while origin[&e] != target {
                            e = map.phi1(e);
                        }
                        map.phi3sew_faces(d, e);
                    }
                }
            }
        }

        rows.check_manifold(&map)?;
        log::debug!(
            "built Map3 from {} tetrahedra: {} darts, {} vertices",
            tetrahedra.len(),
            map.nb_darts(),
            map.base().nb_cells(Orbit::Vertex),
        );
        Ok((map, pos))
    }
}
