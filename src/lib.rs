//! Combinatorial maps with attribute embeddings, edge collapse based mesh
//! decimation and progressive meshes.
//!
//! The crate is organized bottom up:
//!
//! - [`container`]: columnar attribute storage with row free lists.
//! - [`marker`]: mark bits for traversals.
//! - [`core`]: the topology kernel. [`GenericMap`] stores darts, relations
//!   and embeddings; [`Map1`], [`Map2`] and [`Map3`] define the orbits and
//!   the structural operators.
//! - [`algo`]: geometry helpers, [decimation][algo::decimation] and
//!   [progressive meshes][algo::pmesh].
//! - [`io`] (feature `io`): saving and loading maps.
//!
//! # Example
//!
//! ```
//! use dartmap::{
//!     algo::decimation::{decimate, DecimationConfig},
//!     prelude::*,
//! };
//! use cgmath::vec3;
//!
//! let positions = vec![
//!     vec3(1.0, 0.0, 0.0), vec3(-1.0, 0.0, 0.0),
//!     vec3(0.0, 1.0, 0.0), vec3(0.0, -1.0, 0.0),
//!     vec3(0.0, 0.0, 1.0), vec3(0.0, 0.0, -1.0),
//! ];
//! let faces = [
//!     [0, 2, 4], [2, 1, 4], [1, 3, 4], [3, 0, 4],
//!     [2, 0, 5], [1, 2, 5], [3, 1, 5], [0, 3, 5],
//! ];
//! let (mut map, pos) = Map2::from_polygons(&positions, &faces)?;
//! assert_eq!(map.nb_orbits(Orbit::Vertex), 6);
//!
//! let report = decimate(&mut map, pos, 5, &DecimationConfig::default())?;
//! assert_eq!(report.vertices, 5);
//! # Ok::<(), failure::Error>(())
//! ```

pub mod algo;
pub mod container;
pub mod core;
pub mod handle;
#[cfg(feature = "io")]
pub mod io;
pub mod marker;
pub mod math;
pub mod orbit;
pub mod prelude;

#[cfg(test)]
mod test_utils;

pub use self::{
    container::{AttribContainer, AttribRegistry, AttribValue, AttributeHandle},
    core::{GenericMap, Map1, Map2, Map3},
    handle::{hsize, Dart},
    orbit::{Orbit, EMBNULL},
};
