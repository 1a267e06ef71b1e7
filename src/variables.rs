//! Variable and array store (C4)
//!
//! Scalars and arrays live in disjoint, insertion-ordered stores. Arrays
//! auto-dimension to a single dimension of size 11 (subscripts `0..=10`)
//! on first subscripted use; an explicit `DIM` of an already-present array
//! is `ERR_DD`.

use std::collections::HashMap;

use crate::error::{BasicError, Result};
use crate::strings::StringRef;
use crate::value::{VarKind, VarName, Value};

pub const AUTO_DIM_SIZE: usize = 11;
pub const MAX_ARRAY_SIZE: i64 = 32767;
/// Matches the historical `BASIC_ARRAY_DIMS` buffer-size cap on the number
/// of subscripts a single array may carry.
pub const MAX_DIMS: usize = 11;

/// A multi-dimensional array: row-major storage, one element type.
#[derive(Debug, Clone)]
pub struct Array {
    pub dim_sizes: Vec<usize>, // each is subscript_max + 1
    pub element_kind: VarKind,
    pub elements: Vec<Value>,
}

impl Array {
    fn new(dim_sizes: Vec<usize>, element_kind: VarKind, fill: Value) -> Self {
        let total: usize = dim_sizes.iter().product();
        Array { dim_sizes, element_kind, elements: vec![fill; total] }
    }

    /// Row-major linear index: `idx = Σ indices[i] * Π(size[j], j>i)`.
    pub fn linear_index(&self, indices: &[usize]) -> Result<usize> {
        if indices.len() != self.dim_sizes.len() {
            return Err(BasicError::BadSubscript);
        }
        let mut idx = 0usize;
        for (i, &subscript) in indices.iter().enumerate() {
            if subscript >= self.dim_sizes[i] {
                return Err(BasicError::BadSubscript);
            }
            let trailing_product: usize = self.dim_sizes[i + 1..].iter().product();
            idx += subscript * trailing_product;
        }
        Ok(idx)
    }

    pub fn get(&self, indices: &[usize]) -> Result<Value> {
        let idx = self.linear_index(indices)?;
        Ok(self.elements[idx])
    }

    pub fn set(&mut self, indices: &[usize], value: Value) -> Result<()> {
        let idx = self.linear_index(indices)?;
        self.elements[idx] = value;
        Ok(())
    }
}

/// Insertion-ordered scalar/array stores, keyed by [`VarName`] identity.
#[derive(Debug, Default)]
pub struct VariableStore {
    order: Vec<VarName>,
    scalars: HashMap<VarName, Value>,
    arrays: HashMap<VarName, Array>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn default_value(kind: VarKind) -> Value {
        if kind.is_string() {
            Value::Str(StringRef::empty())
        } else {
            Value::Number(0.0)
        }
    }

    /// Fetch a scalar's current value, `Number(0.0)`/empty string if unset
    /// (matching the dialect's implicit-zero-initialization).
    pub fn get_scalar(&self, name: VarName) -> Option<Value> {
        self.scalars.get(&name).copied()
    }

    pub fn set_scalar(&mut self, name: VarName, value: Value) {
        if self.scalars.insert(name, value).is_none() {
            self.order.push(name);
        }
    }

    pub fn has_array(&self, name: VarName) -> bool {
        self.arrays.contains_key(&name)
    }

    /// Explicit `DIM`. Errors `ERR_DD` if the array already exists, `ERR_FC`
    /// if any dimension is out of `0..=32767`.
    pub fn dim_array(&mut self, name: VarName, dim_sizes: Vec<i64>) -> Result<()> {
        if self.arrays.contains_key(&name) {
            return Err(BasicError::RedimensionedArray);
        }
        if dim_sizes.is_empty() || dim_sizes.len() > MAX_DIMS {
            return Err(BasicError::IllegalQuantity);
        }
        let mut sizes = Vec::with_capacity(dim_sizes.len());
        for &d in &dim_sizes {
            if !(0..=MAX_ARRAY_SIZE).contains(&d) {
                return Err(BasicError::IllegalQuantity);
            }
            sizes.push(d as usize + 1);
        }
        let fill = Self::default_value(name.kind());
        self.arrays.insert(name, Array::new(sizes, name.kind(), fill));
        if !self.order.contains(&name) {
            self.order.push(name);
        }
        Ok(())
    }

    /// Auto-dimension a one-dimensional array of size 11 if `name` has not
    /// already been dimensioned (explicitly or via a previous auto-dim).
    fn auto_dim(&mut self, name: VarName, num_indices: usize) {
        if self.arrays.contains_key(&name) {
            return;
        }
        let sizes = vec![AUTO_DIM_SIZE; num_indices.max(1)];
        let fill = Self::default_value(name.kind());
        self.arrays.insert(name, Array::new(sizes, name.kind(), fill));
        if !self.order.contains(&name) {
            self.order.push(name);
        }
    }

    pub fn get_array_element(&mut self, name: VarName, indices: &[usize]) -> Result<Value> {
        self.auto_dim(name, indices.len());
        self.arrays.get(&name).expect("just auto-dimmed").get(indices)
    }

    pub fn set_array_element(&mut self, name: VarName, indices: &[usize], value: Value) -> Result<()> {
        self.auto_dim(name, indices.len());
        self.arrays.get_mut(&name).expect("just auto-dimmed").set(indices, value)
    }

    pub fn array(&self, name: VarName) -> Option<&Array> {
        self.arrays.get(&name)
    }

    /// `CLEAR`/`NEW`: drop every scalar, array, and the insertion order.
    pub fn clear(&mut self) {
        self.order.clear();
        self.scalars.clear();
        self.arrays.clear();
    }

    pub fn names_in_order(&self) -> impl Iterator<Item = &VarName> {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_set_and_get() {
        let mut store = VariableStore::new();
        let a = VarName::parse("A");
        store.set_scalar(a, Value::Number(42.0));
        assert_eq!(store.get_scalar(a), Some(Value::Number(42.0)));
    }

    #[test]
    fn auto_dim_creates_size_eleven() {
        let mut store = VariableStore::new();
        let arr = VarName::parse("A");
        store.set_array_element(arr, &[5], Value::Number(1.0)).unwrap();
        assert_eq!(store.array(arr).unwrap().dim_sizes, vec![11]);
    }

    #[test]
    fn dim_after_autodim_or_dim_is_redim_error() {
        let mut store = VariableStore::new();
        let arr = VarName::parse("A");
        store.dim_array(arr, vec![10]).unwrap();
        assert_eq!(store.dim_array(arr, vec![5]), Err(BasicError::RedimensionedArray));
    }

    #[test]
    fn subscript_out_of_range_is_bad_subscript() {
        let mut store = VariableStore::new();
        let arr = VarName::parse("A");
        store.dim_array(arr, vec![3]).unwrap();
        assert_eq!(store.get_array_element(arr, &[4]), Err(BasicError::BadSubscript));
    }

    #[test]
    fn two_dim_row_major_layout() {
        let mut store = VariableStore::new();
        let arr = VarName::parse("A");
        store.dim_array(arr, vec![3, 3]).unwrap();
        for i in 0..=3usize {
            for j in 0..=3usize {
                store
                    .set_array_element(arr, &[i, j], Value::Number((i * 10 + j) as f64))
                    .unwrap();
            }
        }
        let s2 = store.get_array_element(arr, &[2, 3]).unwrap();
        let s3 = store.get_array_element(arr, &[3, 2]).unwrap();
        match (s2, s3) {
            (Value::Number(a), Value::Number(b)) => assert_eq!(a + b, 55.0),
            _ => panic!("expected numbers"),
        }
    }

    #[test]
    fn clear_wipes_everything() {
        let mut store = VariableStore::new();
        let a = VarName::parse("A");
        store.set_scalar(a, Value::Number(1.0));
        store.clear();
        assert_eq!(store.get_scalar(a), None);
    }
}
