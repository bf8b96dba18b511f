use std::fmt;

use serde::{Deserialize, Serialize};

use crate::handle::hsize;


/// Number of different orbits, including the dart orbit.
pub const NB_ORBITS: usize = 5;

/// Sentinel for "this dart carries no embedding for the orbit".
pub const EMBNULL: hsize = hsize::max_value();


/// A kind of cell, i.e. a class of darts reachable from one another by a
/// fixed set of relations.
///
/// The dart orbit is special: every dart is its own orbit, so attributes on
/// it are indexed by the dart itself and there is no embedding table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Orbit {
    Vertex = 0,
    Edge = 1,
    Face = 2,
    Volume = 3,
    Dart = 4,
}

impl Orbit {
    /// All orbits, ordered by their index.
    pub const ALL: [Orbit; NB_ORBITS] = [
        Orbit::Vertex,
        Orbit::Edge,
        Orbit::Face,
        Orbit::Volume,
        Orbit::Dart,
    ];

    /// The orbits that are embedded through an embedding table.
    pub const CELLS: [Orbit; 4] = [Orbit::Vertex, Orbit::Edge, Orbit::Face, Orbit::Volume];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Orbit::Vertex => "Vertex",
            Orbit::Edge => "Edge",
            Orbit::Face => "Face",
            Orbit::Volume => "Volume",
            Orbit::Dart => "Dart",
        }
    }
}

impl fmt::Debug for Orbit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Orbit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
