//! Algorithms working on surface maps with a position attribute.
//!
//! - [`geometry`]: normals, local frames and curvature of cells.
//! - [`decimation`]: edge collapse based simplification, driven by pluggable
//!   selectors, approximators and predictors.
//! - [`pmesh`]: progressive meshes built on top of the decimation engine.

pub mod decimation;
pub mod geometry;
pub mod pmesh;
