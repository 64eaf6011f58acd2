//! Trait boundary to persisted hierarchies. A store only ever exchanges
//! declarations and attribute documents with this crate; bulk payload stays
//! on the other side of the boundary.

use crate::node::{ArraySpec, DataType, GroupSpec, Node, Shape};

use anyhow::{bail, Result};
use core::fmt::{Debug, Formatter};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub trait Store: 'static {
    /// The name of the store format.
    const NAME: &'static str;

    /// Groups work like directories and can contain groups or arrays.
    type Group: GroupOp<Self> + NodeOp<Self> + Send + Sync;

    /// Arrays are leaf nodes carrying an array declaration.
    type Array: ArrayOp<Self> + NodeOp<Self> + Send + Sync;

    /// Create a new hierarchy at the given path, returning its root group.
    fn create<P: AsRef<Path>>(path: P) -> Result<Self::Group>;

    /// Open an existing hierarchy, which must exist.
    fn open<P: AsRef<Path>>(path: P) -> Result<Self::Group>;
}

pub trait GroupOp<S: Store + ?Sized> {
    /// List all members of this group.
    fn list(&self) -> Result<Vec<String>>;

    /// Create a nested group.
    fn new_group(&self, name: &str) -> Result<S::Group>;

    /// Open an existing nested group.
    fn open_group(&self, name: &str) -> Result<S::Group>;

    /// Declare a new array member. The declaration is persisted, attributes
    /// included; no payload is written.
    fn new_array(&self, name: &str, spec: &ArraySpec) -> Result<S::Array>;

    /// Open an existing array member.
    fn open_array(&self, name: &str) -> Result<S::Array>;

    /// Delete a member.
    fn delete(&self, name: &str) -> Result<()>;

    /// Check if a member exists.
    fn exists(&self, name: &str) -> Result<bool>;
}

/// Operations common to group and array nodes.
pub trait NodeOp<S: Store + ?Sized> {
    /// The node's path relative to the hierarchy root.
    fn path(&self) -> PathBuf;

    /// Read the node's whole attribute document.
    fn attrs(&self) -> Result<Map<String, Value>>;

    /// Replace the node's whole attribute document.
    fn put_attrs(&mut self, attrs: Map<String, Value>) -> Result<()>;
}

pub trait ArrayOp<S: Store + ?Sized> {
    /// The declared element type.
    fn dtype(&self) -> Result<DataType>;

    /// The declared shape.
    fn shape(&self) -> Shape;

    /// The full declaration, attributes included.
    fn spec(&self) -> Result<ArraySpec>;
}

pub enum StoreNode<S: Store> {
    Group(S::Group),
    Array(S::Array),
}

impl<S: Store> Debug for StoreNode<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            StoreNode::Group(g) => write!(f, "Group({:?})", g.path()),
            StoreNode::Array(a) => write!(f, "Array({:?})", a.path()),
        }
    }
}

impl<S: Store> StoreNode<S> {
    /// Open a member without knowing its kind, trying arrays first.
    pub fn open<G: GroupOp<S>>(group: &G, name: &str) -> Result<Self> {
        if group.exists(name)? {
            match group.open_array(name) {
                Ok(arr) => Ok(StoreNode::Array(arr)),
                Err(e1) => group.open_group(name).map(StoreNode::Group).map_err(|e2| {
                    e2.context(e1).context(format!(
                        "Error opening group or array named '{}' in group",
                        name
                    ))
                }),
            }
        } else {
            bail!("No group or array named '{}' in group", name);
        }
    }

    pub fn as_group(&self) -> Result<&S::Group> {
        match self {
            Self::Group(x) => Ok(x),
            _ => bail!("Expecting Group"),
        }
    }

    pub fn as_array(&self) -> Result<&S::Array> {
        match self {
            Self::Array(x) => Ok(x),
            _ => bail!("Expecting Array"),
        }
    }
}

pub fn iter_nodes<S: Store>(
    group: &S::Group,
) -> impl Iterator<Item = (String, StoreNode<S>)> + '_ {
    group.list().unwrap().into_iter().map(|x| {
        let node = StoreNode::open(group, &x).unwrap();
        (x, node)
    })
}

impl GroupSpec {
    /// Read the declaration tree rooted at `group`.
    pub fn from_store<S: Store>(group: &S::Group) -> Result<Self> {
        let mut members = indexmap::IndexMap::new();
        for name in group.list()? {
            let node = match StoreNode::<S>::open(group, &name)? {
                StoreNode::Array(arr) => Node::Array(arr.spec()?),
                StoreNode::Group(sub) => Node::Group(GroupSpec::from_store::<S>(&sub)?),
            };
            members.insert(name, node);
        }
        Ok(GroupSpec {
            attributes: group.attrs()?,
            members,
        })
    }

    /// Persist this declaration tree as a new subgroup of `parent`.
    pub fn to_store<S: Store>(&self, parent: &S::Group, name: &str) -> Result<S::Group> {
        let mut group = parent.new_group(name)?;
        self.write_into::<S>(&mut group)?;
        Ok(group)
    }

    /// Persist this declaration tree into an existing group.
    pub fn write_into<S: Store>(&self, group: &mut S::Group) -> Result<()> {
        if !self.attributes.is_empty() {
            group.put_attrs(self.attributes.clone())?;
        }
        for (name, node) in &self.members {
            match node {
                Node::Array(spec) => {
                    group.new_array(name, spec)?;
                }
                Node::Group(sub) => {
                    sub.to_store::<S>(group, name)?;
                }
            }
        }
        Ok(())
    }
}
