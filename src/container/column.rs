use std::{
    any::Any,
    fmt,
    io::{self, Read, Write},
    ops::{Index, IndexMut},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use cgmath::Zero;
use serde::{de::DeserializeOwned, Serialize};
use stable_vec::StableVec;

use crate::{
    handle::{hsize, Dart, HSizeExt},
    math::{Mat33, Mat36, Vec3},
};


/// Types that can be stored in an attribute column.
///
/// Besides the usual value semantics, every attribute type has a stable name
/// (used to recreate columns when loading a map), a value that fills new
/// rows and a little endian binary encoding.
pub trait AttribValue: Clone + fmt::Debug + Serialize + DeserializeOwned + 'static {
    const TYPE_NAME: &'static str;

    fn default_value() -> Self;

    fn write_bin(&self, w: &mut dyn Write) -> io::Result<()>;
    fn read_bin(r: &mut dyn Read) -> io::Result<Self>;

    /// Replaces every dart held by the value with `f(dart)`. Used when
    /// darts are renumbered, e.g. on saving.
    fn remap_darts(&mut self, _f: &dyn Fn(Dart) -> Dart) {}
}

macro_rules! impl_attrib_value_num {
    ($ty:ident, $name:expr, $write:ident, $read:ident) => {
        impl AttribValue for $ty {
            const TYPE_NAME: &'static str = $name;

            fn default_value() -> Self {
                0 as $ty
            }
            fn write_bin(&self, w: &mut dyn Write) -> io::Result<()> {
                w.$write::<LittleEndian>(*self)
            }
            fn read_bin(r: &mut dyn Read) -> io::Result<Self> {
                r.$read::<LittleEndian>()
            }
        }
    };
}

impl_attrib_value_num!(f32, "float", write_f32, read_f32);
impl_attrib_value_num!(f64, "double", write_f64, read_f64);
impl_attrib_value_num!(i32, "int", write_i32, read_i32);
impl_attrib_value_num!(u32, "unsigned int", write_u32, read_u32);
impl_attrib_value_num!(u64, "unsigned long", write_u64, read_u64);

impl AttribValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn default_value() -> Self {
        false
    }

    fn write_bin(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_u8(*self as u8)
    }
    fn read_bin(r: &mut dyn Read) -> io::Result<Self> {
        Ok(r.read_u8()? != 0)
    }
}

impl AttribValue for Dart {
    const TYPE_NAME: &'static str = "Dart";

    fn default_value() -> Self {
        Dart::NIL
    }

    fn write_bin(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.idx() as u64)
    }
    fn read_bin(r: &mut dyn Read) -> io::Result<Self> {
        let raw = r.read_u64::<LittleEndian>()?;
        if raw == u64::max_value() || raw == hsize::max_value() as u64 {
            Ok(Dart::NIL)
        } else {
            Ok(Dart::from_usize(raw as usize))
        }
    }

    fn remap_darts(&mut self, f: &dyn Fn(Dart) -> Dart) {
        if !self.is_nil() {
            *self = f(*self);
        }
    }
}

impl AttribValue for Vec3 {
    const TYPE_NAME: &'static str = "Geom::Vec3d";

    fn default_value() -> Self {
        Vec3::zero()
    }

    fn write_bin(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_f64::<LittleEndian>(self.x)?;
        w.write_f64::<LittleEndian>(self.y)?;
        w.write_f64::<LittleEndian>(self.z)
    }
    fn read_bin(r: &mut dyn Read) -> io::Result<Self> {
        Ok(Vec3::new(
            r.read_f64::<LittleEndian>()?,
            r.read_f64::<LittleEndian>()?,
            r.read_f64::<LittleEndian>()?,
        ))
    }
}

impl AttribValue for Mat33 {
    const TYPE_NAME: &'static str = "Geom::Matrix33d";

    fn default_value() -> Self {
        Mat33::zero()
    }

    fn write_bin(&self, w: &mut dyn Write) -> io::Result<()> {
        for c in 0..3 {
            self[c].write_bin(w)?;
        }
        Ok(())
    }
    fn read_bin(r: &mut dyn Read) -> io::Result<Self> {
        Ok(Mat33::from_cols(Vec3::read_bin(r)?, Vec3::read_bin(r)?, Vec3::read_bin(r)?))
    }
}

impl AttribValue for Mat36 {
    const TYPE_NAME: &'static str = "Geom::Matrix36d";

    fn default_value() -> Self {
        Mat36::zero()
    }

    fn write_bin(&self, w: &mut dyn Write) -> io::Result<()> {
        for v in self.0.iter().flat_map(|row| row.iter()) {
            w.write_f64::<LittleEndian>(*v)?;
        }
        Ok(())
    }
    fn read_bin(r: &mut dyn Read) -> io::Result<Self> {
        let mut out = Mat36::zero();
        for v in out.0.iter_mut().flat_map(|row| row.iter_mut()) {
            *v = r.read_f64::<LittleEndian>()?;
        }
        Ok(out)
    }
}


/// A typed attribute column. Only rows allocated in the owning container
/// hold a value.
#[derive(Clone)]
pub struct Column<T> {
    values: StableVec<T>,
}

impl<T> Column<T> {
    pub(crate) fn new() -> Self {
        Self { values: StableVec::new() }
    }

    pub fn get(&self, row: hsize) -> Option<&T> {
        self.values.get(row.idx())
    }

    pub fn get_mut(&mut self, row: hsize) -> Option<&mut T> {
        self.values.get_mut(row.idx())
    }

    /// Iterates over `(row, value)` of all allocated rows in row order.
    pub fn iter(&self) -> impl Iterator<Item = (hsize, &T)> + '_ {
        self.values.indices().map(move |i| (hsize::new(i), &self.values[i]))
    }

    /// Number of allocated rows.
    pub fn len(&self) -> hsize {
        hsize::new(self.values.num_elements())
    }

    pub fn is_empty(&self) -> bool {
        self.values.num_elements() == 0
    }

    pub(crate) fn put(&mut self, row: hsize, value: T) {
        self.values.reserve_for(row.idx());
        self.values.insert(row.idx(), value);
    }
}

impl<T> Index<hsize> for Column<T> {
    type Output = T;
    fn index(&self, row: hsize) -> &Self::Output {
        match self.values.get(row.idx()) {
            Some(v) => v,
            None => panic!("row {} is not allocated in this attribute column", row),
        }
    }
}

impl<T> IndexMut<hsize> for Column<T> {
    fn index_mut(&mut self, row: hsize) -> &mut Self::Output {
        match self.values.get_mut(row.idx()) {
            Some(v) => v,
            None => panic!("row {} is not allocated in this attribute column", row),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}


/// Type erased interface of `Column<T>`, used by the container to manage
/// rows without knowing the value types.
pub(crate) trait ErasedColumn: Any {
    fn type_name(&self) -> &'static str;

    /// Puts a default value into `row`, overwriting an existing one.
    fn reset(&mut self, row: hsize);
    fn remove(&mut self, row: hsize);
    fn copy_row(&mut self, dst: hsize, src: hsize);
    fn clear(&mut self);

    /// Writes the value of `row` with its darts passed through `remap`.
    fn write_row(&self, row: hsize, remap: &dyn Fn(Dart) -> Dart, w: &mut dyn Write) -> io::Result<()>;
    fn read_row(&mut self, row: hsize, r: &mut dyn Read) -> io::Result<()>;
    fn row_to_json(&self, row: hsize, remap: &dyn Fn(Dart) -> Dart) -> serde_json::Result<serde_json::Value>;
    fn row_from_json(&mut self, row: hsize, value: serde_json::Value) -> serde_json::Result<()>;

    fn box_clone(&self) -> Box<dyn ErasedColumn>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: AttribValue> ErasedColumn for Column<T> {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn reset(&mut self, row: hsize) {
        self.put(row, T::default_value());
    }

    fn remove(&mut self, row: hsize) {
        if row.idx() < self.values.capacity() {
            self.values.remove(row.idx());
        }
    }

    fn copy_row(&mut self, dst: hsize, src: hsize) {
        let v = self[src].clone();
        self.put(dst, v);
    }

    fn clear(&mut self) {
        self.values.clear();
    }

    fn write_row(&self, row: hsize, remap: &dyn Fn(Dart) -> Dart, w: &mut dyn Write) -> io::Result<()> {
        let mut v = self[row].clone();
        v.remap_darts(remap);
        v.write_bin(w)
    }

    fn read_row(&mut self, row: hsize, r: &mut dyn Read) -> io::Result<()> {
        let v = T::read_bin(r)?;
        self.put(row, v);
        Ok(())
    }

    fn row_to_json(&self, row: hsize, remap: &dyn Fn(Dart) -> Dart) -> serde_json::Result<serde_json::Value> {
        let mut v = self[row].clone();
        v.remap_darts(remap);
        serde_json::to_value(&v)
    }

    fn row_from_json(&mut self, row: hsize, value: serde_json::Value) -> serde_json::Result<()> {
        let v: T = serde_json::from_value(value)?;
        self.put(row, v);
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn ErasedColumn> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
