use fxhash::FxHashMap;

use crate::{
    algo::decimation::Quadric,
    handle::Dart,
    math::{Mat33, Mat36, Vec3},
};
use super::{AttribValue, Column, ErasedColumn};


/// Maps attribute type names to column constructors.
///
/// Saved maps only record the type *name* of every column. To load a map,
/// the loader has to know how to create an empty column for that name, which
/// is what this registry is for. It is an ordinary value: create one (usually
/// with [`AttribRegistry::with_builtin_types`]), register additional types
/// and pass it to the load functions.
pub struct AttribRegistry {
    factories: FxHashMap<&'static str, fn() -> Box<dyn ErasedColumn>>,
}

fn make_column<T: AttribValue>() -> Box<dyn ErasedColumn> {
    Box::new(Column::<T>::new())
}

impl AttribRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// Creates a registry knowing all attribute types of this crate.
    pub fn with_builtin_types() -> Self {
        let mut out = Self::new();
        out.register::<f32>();
        out.register::<f64>();
        out.register::<i32>();
        out.register::<u32>();
        out.register::<u64>();
        out.register::<bool>();
        out.register::<Dart>();
        out.register::<Vec3>();
        out.register::<Mat33>();
        out.register::<Mat36>();
        out.register::<Quadric>();
        out
    }

    /// Registers `T`. Registering a type twice is allowed.
    pub fn register<T: AttribValue>(&mut self) {
        self.factories.insert(T::TYPE_NAME, make_column::<T>);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub(crate) fn create(&self, type_name: &str) -> Option<Box<dyn ErasedColumn>> {
        self.factories.get(type_name).map(|f| f())
    }
}

impl Default for AttribRegistry {
    fn default() -> Self {
        Self::with_builtin_types()
    }
}
