//! Strong handles for partitioned mesh entities.
//!
//! - [`GlobalId`]: rank-independent identity assigned by the partitioner
//!   ("metis id"). Two ranks agree on a shared cell by its `GlobalId`.
//! - [`LocalId`]: rank-local contiguous cell index. Local cells occupy
//!   `[0, n_local)`, ghost cells `[n_local, n_local + n_ghost)`.
//! - [`FaceId`]: rank-local face index: local faces first, then ghost faces,
//!   then boundary faces.
//! - [`NodeIndex`] / [`CellIndex`]: positions in the mesh source's 1-based
//!   per-zone numbering.

use std::fmt;

/// Partition-independent identity of a node or cell.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct GlobalId(u64);

impl GlobalId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        GlobalId(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobalId").field(&self.0).finish()
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GlobalId {
    fn from(raw: u64) -> Self {
        GlobalId(raw)
    }
}

/// Rank-local cell index; see the module docs for the range layout.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct LocalId(usize);

impl LocalId {
    #[inline]
    pub const fn new(raw: usize) -> Self {
        LocalId(raw)
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalId").field(&self.0).finish()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rank-local face index.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct FaceId(usize);

impl FaceId {
    #[inline]
    pub const fn new(raw: usize) -> Self {
        FaceId(raw)
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// `(zone, node)` position of a node in the mesh source, both 1-based.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex {
    pub zone: usize,
    pub node: u64,
}

impl NodeIndex {
    #[inline]
    pub const fn new(zone: usize, node: u64) -> Self {
        Self { zone, node }
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(zone {}, node {})", self.zone, self.node)
    }
}

/// Position of a cell in the mesh source plus its node count.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct CellIndex {
    pub zone: usize,
    pub section: usize,
    /// 1-based element index inside the zone's element numbering.
    pub element: u64,
    pub npe: usize,
}
