//! MeshPartError: unified error type for mesh-part public APIs
//!
//! Every failure in this crate is fatal for the simulation that hits it: a
//! partition with an inconsistent graph, a lost message or a misordered
//! exchange would silently corrupt fluxes on some ranks. The variants are
//! typed so drivers can report precisely before aborting.

use crate::topology::element::ElementKind;
use crate::topology::ids::GlobalId;
use thiserror::Error;

/// Unified error type for mesh-part operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshPartError {
    // ----- setup inconsistency ---------------------------------------------
    /// A partition-description line could not be parsed.
    #[error("partition description line {line}: {message}")]
    PartitionParse { line: usize, message: String },
    /// A node GlobalId or `(zone, node)` index is neither owned nor received.
    #[error("unknown node {0}")]
    UnknownNode(String),
    /// A cell GlobalId is neither local nor a registered ghost.
    #[error("unknown cell {0}")]
    UnknownCell(GlobalId),
    /// No prototype was installed for this element node count.
    #[error("no {role} prototype installed for {npe} nodes per element")]
    MissingPrototype { role: &'static str, npe: usize },
    /// Holder and sharer share a node count that matches none of the holder's faces.
    #[error("cells {holder} and {sharer} share {found} nodes, which is not a face of {kind:?}")]
    SharedNodeCount {
        holder: GlobalId,
        sharer: GlobalId,
        kind: ElementKind,
        found: usize,
    },
    /// The shared nodes have the right count but form no face of the holder.
    #[error("nodes {nodes:?} do not form a face of {kind:?}")]
    NoMatchingFace { kind: ElementKind, nodes: Vec<u64> },
    /// A boundary face has no local cell containing all of its nodes.
    #[error("boundary face {face} of section `{section}` has no local holder")]
    NoBoundaryHolder { section: String, face: usize },
    /// A boundary face normal points into its holder.
    #[error("boundary face {face} of section `{section}` has an inward normal")]
    InwardBoundaryNormal { section: String, face: usize },
    /// The node count recorded in the description disagrees with the mesh.
    #[error("cell {cell}: description says {expected} nodes, mesh has {found}")]
    NpeMismatch {
        cell: GlobalId,
        expected: usize,
        found: usize,
    },
    /// Two neighbouring ranks disagree on the pack/unpack order.
    #[error("halo order with rank {neighbor} disagrees at position {position}")]
    HaloOrderMismatch { neighbor: usize, position: usize },
    /// A rank's cells do not form one contiguous range per section.
    #[error("rank {rank} owns a non-contiguous range in zone {zone} section {section}")]
    NonContiguousOwnership {
        rank: usize,
        zone: usize,
        section: usize,
    },
    /// The mesh source itself is malformed.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    // ----- transport ---------------------------------------------------------
    /// A send or receive with `neighbor` failed or delivered the wrong size.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: CommFailure,
    },

    // ----- protocol misuse ---------------------------------------------------
    /// `share` called on a channel whose previous exchange is still in flight.
    #[error("halo channel is already in flight; call update before sharing again")]
    ExchangeInFlight,
    /// `update` called on a channel with nothing in flight.
    #[error("halo channel is idle; call share before update")]
    ExchangeIdle,
    /// Every tag above the channel base is taken.
    #[error("no message tags left for another halo channel")]
    ChannelTagsExhausted,
    /// A caller-provided buffer has the wrong length.
    #[error("payload length mismatch: expected {expected}, found {found}")]
    PayloadLength { expected: usize, found: usize },

    // ----- I/O ---------------------------------------------------------------
    /// Reading the mesh source failed.
    #[error("mesh I/O error: {0}")]
    MeshIo(String),
    /// Reading or writing a checkpoint frame failed.
    #[error("frame codec error: {0}")]
    FrameCodec(String),
    /// No boundary section with this name exists on this rank.
    #[error("unknown boundary section `{0}`")]
    UnknownBoundary(String),
}

/// Detail attached to [`MeshPartError::CommError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CommFailure(pub String);

impl From<String> for CommFailure {
    fn from(s: String) -> Self {
        CommFailure(s)
    }
}

impl From<&str> for CommFailure {
    fn from(s: &str) -> Self {
        CommFailure(s.to_owned())
    }
}

impl From<std::io::Error> for MeshPartError {
    fn from(e: std::io::Error) -> Self {
        MeshPartError::MeshIo(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comm_error_displays_neighbor_and_detail() {
        let e = MeshPartError::CommError {
            neighbor: 3,
            source: "expected 16 bytes, got 8".into(),
        };
        let s = e.to_string();
        assert!(s.contains("rank 3"));
        assert!(s.contains("expected 16 bytes"));
    }

    #[test]
    fn io_error_converts_to_mesh_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(MeshPartError::from(io), MeshPartError::MeshIo(_)));
    }
}
