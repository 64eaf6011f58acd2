pub mod error;
pub mod node;
pub mod store;
pub mod v04;
mod util;

pub use error::MetadataError;
pub use node::{auto_chunks, ArrayLike, ArraySpec, Chunks, DataType, Element, GroupSpec, Node, Shape};
pub use store::{iter_nodes, ArrayOp, GroupOp, NodeOp, Store, StoreNode};
