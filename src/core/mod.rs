//! Combinatorial maps: the topology kernel.
//!
//! A combinatorial map represents the topology of a subdivided object with
//! *darts* and relations between them:
//!
//! - `phi1` (with its inverse `phi_1`) is a permutation. Its cycles are the
//!   faces.
//! - `phi2` is an involution pairing the two darts of an edge (one per
//!   incident face). Unpaired darts are fixed points: they lie on the
//!   boundary.
//! - `phi3` is an involution pairing the faces of adjacent volumes.
//!
//! Cells (vertices, edges, faces, volumes) are not stored explicitly: they
//! are *orbits*, sets of darts reachable from one another through a fixed
//! set of relations. Which relations define which orbit depends on the
//! dimension of the map, so the orbits are defined by the concrete map types:
//!
//! | Type     | Relations              | Typical use                  |
//! | -------- | ---------------------- | ---------------------------- |
//! | [`Map1`] | `phi1`                 | polygons                     |
//! | [`Map2`] | `phi1`, `phi2`         | polygonal surfaces           |
//! | [`Map3`] | `phi1`, `phi2`, `phi3` | volumetric (tetrahedral) meshes |
//!
//! Attributes are attached to cells through *embeddings*: an embedded orbit
//! has a table mapping each dart to a row of that orbit's
//! [`AttribContainer`][crate::container::AttribContainer]. All darts of one
//! orbit carry the same row, and all operators of the maps keep it that way.
//!
//! The storage shared by all dimensions is [`GenericMap`]. The orbit
//! machinery is provided by the trait [`CombinatorialMap`]; the relation
//! accessors and dimension specific operators by [`Phi1`], [`Phi2`] and
//! [`Phi3`].

mod generic;
mod import;
mod map1;
mod map2;
mod map3;
mod traits;

pub use self::{
    generic::GenericMap,
    import::BuildError,
    map1::Map1,
    map2::Map2,
    map3::Map3,
    traits::{
        CombinatorialMap, EdgeCollapse, OrbitDarts, Phi1, Phi2, Phi3, SurfaceMap,
        PHI1, PHI2, PHI3, PHI_1,
    },
};
pub(crate) use self::{
    generic::Relation,
    traits::CellGroup,
};
