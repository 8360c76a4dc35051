//! Identities and element kinds.
//!
//! - [`ids`]: GlobalId / LocalId / FaceId handles and mesh-source indices.
//! - [`element`]: the closed set of element kinds with their CGNS face-node
//!   tables.

pub mod element;
pub mod ids;

pub use element::{ElementKind, sort_nodes_on_face};
pub use ids::{CellIndex, FaceId, GlobalId, LocalId, NodeIndex};
