//! Mesh input and checkpoint output.
//!
//! [`mesh`] is the read side: range access to a globally consistent mesh.
//! [`frame`] is the write side: per-rank checkpoint frames behind a codec
//! trait.

pub mod frame;
pub mod mesh;

pub use frame::{BincodeFrameCodec, Frame, FrameCodec, FrameField, FrameNode, FrameSection};
pub use mesh::{BaseInfo, InMemoryMesh, MeshSource, SectionData, SectionInfo, ZoneData};
