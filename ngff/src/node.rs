//! Value model of an array hierarchy: group and array declarations, plus
//! the pieces they are made of. Declarations carry everything the metadata
//! layer knows about a node; array payload is never part of the model.

use anyhow::{bail, Result};
use indexmap::IndexMap;
use ndarray::{ArrayBase, Data, Dimension};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::{smallvec, SmallVec};
use std::fmt::{Display, Formatter};
use std::ops::Index;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(SmallVec<[usize; 3]>);

impl Shape {
    pub fn ndim(&self) -> usize {
        self.0.len()
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools;
        write!(
            f,
            "{}",
            self.0.as_slice().iter().map(|x| x.to_string()).join(" x ")
        )
    }
}

impl AsRef<[usize]> for Shape {
    fn as_ref(&self) -> &[usize] {
        &self.0
    }
}

impl Index<usize> for Shape {
    type Output = usize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<Vec<usize>> for Shape {
    fn from(shape: Vec<usize>) -> Self {
        Self(SmallVec::from_vec(shape))
    }
}

impl From<&[usize]> for Shape {
    fn from(shape: &[usize]) -> Self {
        Self(SmallVec::from_slice(shape))
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(shape: [usize; N]) -> Self {
        Self(SmallVec::from_slice(&shape))
    }
}

impl From<usize> for Shape {
    fn from(shape: usize) -> Self {
        Self(smallvec![shape])
    }
}

impl FromIterator<usize> for Shape {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self(SmallVec::from_iter(iter))
    }
}

/// Element types an array declaration can carry, named like NumPy dtypes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bool,
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Int8 => write!(f, "int8"),
            DataType::Int16 => write!(f, "int16"),
            DataType::Int32 => write!(f, "int32"),
            DataType::Int64 => write!(f, "int64"),
            DataType::UInt8 => write!(f, "uint8"),
            DataType::UInt16 => write!(f, "uint16"),
            DataType::UInt32 => write!(f, "uint32"),
            DataType::UInt64 => write!(f, "uint64"),
            DataType::Float32 => write!(f, "float32"),
            DataType::Float64 => write!(f, "float64"),
            DataType::Bool => write!(f, "bool"),
        }
    }
}

/// Rust scalars that can serve as array elements in a declaration.
pub trait Element: Send + Sync + Copy + 'static {
    const DTYPE: DataType;
}

impl Element for i8 {
    const DTYPE: DataType = DataType::Int8;
}

impl Element for i16 {
    const DTYPE: DataType = DataType::Int16;
}

impl Element for i32 {
    const DTYPE: DataType = DataType::Int32;
}

impl Element for i64 {
    const DTYPE: DataType = DataType::Int64;
}

impl Element for u8 {
    const DTYPE: DataType = DataType::UInt8;
}

impl Element for u16 {
    const DTYPE: DataType = DataType::UInt16;
}

impl Element for u32 {
    const DTYPE: DataType = DataType::UInt32;
}

impl Element for u64 {
    const DTYPE: DataType = DataType::UInt64;
}

impl Element for f32 {
    const DTYPE: DataType = DataType::Float32;
}

impl Element for f64 {
    const DTYPE: DataType = DataType::Float64;
}

impl Element for bool {
    const DTYPE: DataType = DataType::Bool;
}

/// Sources an array declaration can be templated on: anything with a shape
/// and an element type.
pub trait ArrayLike {
    fn shape(&self) -> Shape;
    fn dtype(&self) -> DataType;
}

impl<T, S, D> ArrayLike for ArrayBase<S, D>
where
    T: Element,
    S: Data<Elem = T>,
    D: Dimension,
{
    fn shape(&self) -> Shape {
        ArrayBase::shape(self).into()
    }

    fn dtype(&self) -> DataType {
        T::DTYPE
    }
}

impl ArrayLike for ArraySpec {
    fn shape(&self) -> Shape {
        self.shape.clone()
    }

    fn dtype(&self) -> DataType {
        self.dtype
    }
}

/// Default chunk layout for an array of the given shape. One-dimensional
/// arrays are chunked along their only axis, capped at 10000 elements;
/// otherwise every dimension is capped at 100.
pub fn auto_chunks(shape: &Shape) -> Shape {
    if shape.ndim() == 1 {
        shape[0].min(10000).into()
    } else {
        shape.as_ref().iter().map(|&x| x.min(100)).collect()
    }
}

/// Chunk layout selection for newly declared arrays.
#[derive(Debug, Clone)]
pub enum Chunks {
    /// Derive a layout from each array's shape.
    Auto,
    /// One layout shared by every array.
    Uniform(Shape),
    /// One layout per array, in order.
    PerArray(Vec<Shape>),
}

impl Default for Chunks {
    fn default() -> Self {
        Chunks::Auto
    }
}

impl Chunks {
    /// The explicit layout for the array at `idx`, or `None` for a derived
    /// one. `PerArray` indexing assumes the caller has checked the count.
    pub(crate) fn pick(&self, idx: usize) -> Option<Shape> {
        match self {
            Chunks::Auto => None,
            Chunks::Uniform(c) => Some(c.clone()),
            Chunks::PerArray(cs) => Some(cs[idx].clone()),
        }
    }
}

/// Declaration of one array node: shape, element type, chunk layout, and
/// attached attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArraySpec {
    pub shape: Shape,
    pub dtype: DataType,
    pub chunks: Shape,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl ArraySpec {
    pub fn new(dtype: DataType, shape: impl Into<Shape>, chunks: impl Into<Shape>) -> Self {
        ArraySpec {
            shape: shape.into(),
            dtype,
            chunks: chunks.into(),
            attributes: Map::new(),
        }
    }

    /// Declaration templated on an existing array. The chunk layout falls
    /// back to [`auto_chunks`] when `chunks` is `None`.
    pub fn from_array<A: ArrayLike>(array: &A, chunks: Option<Shape>) -> Self {
        let shape = array.shape();
        let chunks = chunks.unwrap_or_else(|| auto_chunks(&shape));
        ArraySpec {
            dtype: array.dtype(),
            shape,
            chunks,
            attributes: Map::new(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }
}

/// Declaration of one group node: an attribute document plus named members.
///
/// Member order is preserved, so writing a spec out and reading it back
/// yields the same document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub members: IndexMap<String, Node>,
}

impl GroupSpec {
    pub fn new(attributes: Map<String, Value>, members: IndexMap<String, Node>) -> Self {
        GroupSpec {
            attributes,
            members,
        }
    }
}

/// A member of a group: either an array declaration or a nested group. The
/// two are told apart on the wire by their required fields, arrays first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Array(ArraySpec),
    Group(GroupSpec),
}

impl Node {
    pub fn as_array(&self) -> Result<&ArraySpec> {
        match self {
            Node::Array(x) => Ok(x),
            _ => bail!("Expecting an array node"),
        }
    }

    pub fn as_group(&self) -> Result<&GroupSpec> {
        match self {
            Node::Group(x) => Ok(x),
            _ => bail!("Expecting a group node"),
        }
    }
}
