//! Darts and the index type used for all handles.
//!
//! A dart is nothing more than an index into the dart container of a map. It
//! carries no data on its own: everything we know about a dart is stored in
//! the relation tables (`phi1`, `phi2`, ...) and the embedding tables of the
//! map it belongs to.

use std::fmt;

use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;


/// The integer type used to store all handles (darts and container rows).
///
/// By default this is `u32`. With the feature `large-handle` it is `u64`,
/// which is only useful for maps with more than four billion darts.
#[cfg(not(feature = "large-handle"))]
#[allow(non_camel_case_types)]
pub type hsize = u32;

#[cfg(feature = "large-handle")]
#[allow(non_camel_case_types)]
pub type hsize = u64;


/// Helper methods to convert between `hsize` and `usize`.
pub trait HSizeExt {
    fn new(raw: usize) -> Self;
    fn idx(self) -> usize;
}

impl HSizeExt for hsize {
    #[inline(always)]
    fn new(raw: usize) -> Self {
        debug_assert!(raw <= hsize::max_value() as usize, "index overflow: {}", raw);
        raw as hsize
    }

    #[inline(always)]
    fn idx(self) -> usize {
        self as usize
    }
}


/// A dart: the atomic element of the topology.
///
/// Darts are plain indices. The value `hsize::max_value()` is reserved as
/// [`Dart::NIL`] to denote "no dart".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dart(hsize);

assert_eq_size!(Dart, hsize);

impl Dart {
    /// The "no dart" sentinel.
    pub const NIL: Dart = Dart(hsize::max_value());

    #[inline(always)]
    pub fn new(idx: hsize) -> Self {
        Dart(idx)
    }

    #[inline(always)]
    pub fn from_usize(raw: usize) -> Self {
        Dart(hsize::new(raw))
    }

    /// The raw index of this dart.
    #[inline(always)]
    pub fn idx(self) -> hsize {
        self.0
    }

    #[inline(always)]
    pub fn to_usize(self) -> usize {
        self.0.idx()
    }

    #[inline(always)]
    pub fn is_nil(self) -> bool {
        self == Self::NIL
    }
}

impl Default for Dart {
    fn default() -> Self {
        Self::NIL
    }
}

impl fmt::Debug for Dart {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_nil() {
            write!(f, "D-")
        } else {
            write!(f, "D{}", self.0)
        }
    }
}

impl optional::Noned for Dart {
    fn is_none(&self) -> bool {
        self.is_nil()
    }
    fn get_none() -> Self {
        Self::NIL
    }
}

impl optional::OptEq for Dart {
    fn opt_eq(&self, other: &Self) -> bool {
        self == other
    }
}


#[cfg(test)]
mod tests {
    use optional::Optioned;
    use super::*;

    #[test]
    fn nil_is_max() {
        assert_eq!(Dart::NIL.idx(), hsize::max_value());
        assert!(Dart::default().is_nil());
        assert!(!Dart::new(0).is_nil());
    }

    #[test]
    fn optioned_dart() {
        let none: Optioned<Dart> = Optioned::none();
        assert!(none.is_none());

        let some = Optioned::some(Dart::new(3));
        assert_eq!(some.unpack(), Dart::new(3));
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", Dart::new(27)), "D27");
        assert_eq!(format!("{:?}", Dart::NIL), "D-");
    }
}
