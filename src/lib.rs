#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-part
//!
//! mesh-part turns a serial unstructured mesh plus a precomputed partition
//! into one graph of cells and faces per rank, and keeps each rank's ghost
//! cells current with a fixed, reusable non-blocking halo exchange.
//!
//! ## Pieces
//! - [`partitioning`]: the per-rank partition description stream and an
//!   emitter that derives it from a cell-to-rank assignment.
//! - [`io::mesh`]: range reads from a globally consistent mesh source.
//! - [`part`]: the [`Part`](part::Part) facade and its builder.
//! - [`algs`]: communicators (in-process threads, MPI behind
//!   `mpi-support`) and the halo schedule/channel.
//! - [`io::frame`]: per-rank checkpoint frames.
//!
//! ## Identities
//! A cell's [`GlobalId`](topology::GlobalId) never changes with the number of
//! ranks; its [`LocalId`](topology::LocalId) is a dense rank-local index.
//! Halo payloads carry no ids: both sides of every neighbour pair walk the
//! same cells in ascending GlobalId order.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! mesh-part = "0.3"
//! # features = ["mpi-support"]
//! ```

pub mod algs;
pub mod data;
pub mod geometry;
pub mod io;
pub mod mesh_error;
pub mod mesh_generation;
pub mod part;
pub mod partitioning;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{CommTag, Communicator, LocalComm, NoComm};
    pub use crate::algs::halo::{HaloChannel, HaloSchedule};
    pub use crate::data::Scalar;
    pub use crate::geometry::{Global, Prototype};
    pub use crate::io::frame::{BincodeFrameCodec, FrameCodec};
    pub use crate::io::mesh::{InMemoryMesh, MeshSource};
    pub use crate::mesh_error::MeshPartError;
    pub use crate::part::{Cell, Face, Part, PartBuilder, PartConfig};
    pub use crate::partitioning::PartitionDescription;
    pub use crate::topology::{ElementKind, FaceId, GlobalId, LocalId};
}
