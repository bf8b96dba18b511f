//! Reexports of all important traits and types of this library for
//! convenience.
//!
//! As with every prelude, the main usage is to glob import everything from
//! this module:
//!
//! ```
//! use dartmap::prelude::*;
//! ```
//!
//! Now you have the map traits in scope.

pub use crate::{
    Dart, Orbit, AttributeHandle,
    core::{
        CombinatorialMap, EdgeCollapse, Phi1, Phi2, Phi3, SurfaceMap,
        Map1, Map2, Map3,
    },
};
