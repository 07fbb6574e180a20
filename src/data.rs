//! The containers underneath the triangulation kernel: the append-only point
//! store, the quadtree spatial index, the triangle slab with its live list,
//! and the directed-edge hash table.

pub mod edge_map;
pub mod point_store;
pub mod quadtree;
pub mod triangle;

pub use edge_map::EdgeMap;
pub use point_store::{PointStore, SUPER_POINTS};
pub use quadtree::{Quadtree, Rect};
pub use triangle::{Status, Triangle, TriangleList};

/// Shared "no index" sentinel for the u32 handle spaces.
pub(crate) const NIL: u32 = u32::MAX;
