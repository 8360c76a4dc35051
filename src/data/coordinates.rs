//! Node coordinate storage for one rank.
//!
//! Owned nodes are read from the mesh source in contiguous 1-based ranges and
//! stored as shifted blocks: node `n` of a block starting at `head` lives at
//! offset `n - head`. Nodes owned elsewhere arrive over the network during
//! setup and are kept in a map keyed by their `(zone, node)` index.

use crate::geometry::vector::Global;
use crate::mesh_error::MeshPartError;
use crate::topology::ids::{GlobalId, NodeIndex};
use hashbrown::HashMap;

#[derive(Clone, Debug)]
struct NodeBlock {
    zone: usize,
    head: u64,
    coords: Vec<Global>,
    gids: Vec<GlobalId>,
}

impl NodeBlock {
    #[inline]
    fn tail(&self) -> u64 {
        self.head + self.coords.len() as u64
    }

    #[inline]
    fn offset(&self, index: NodeIndex) -> Option<usize> {
        (index.zone == self.zone && self.head <= index.node && index.node < self.tail())
            .then(|| (index.node - self.head) as usize)
    }
}

/// Positions of every node this rank knows, owned or received.
#[derive(Clone, Debug, Default)]
pub struct CoordinateStore {
    blocks: Vec<NodeBlock>,
    owned_by_gid: HashMap<GlobalId, NodeIndex>,
    ghosts: HashMap<NodeIndex, Global>,
}

impl CoordinateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store owned nodes `[head, head + coords.len())` of `zone`.
    pub fn insert_owned(
        &mut self,
        zone: usize,
        head: u64,
        coords: Vec<Global>,
        gids: Vec<GlobalId>,
    ) -> Result<(), MeshPartError> {
        if coords.len() != gids.len() {
            return Err(MeshPartError::InvalidMesh(format!(
                "zone {zone}: {} coordinates but {} node ids",
                coords.len(),
                gids.len()
            )));
        }
        for (k, &gid) in gids.iter().enumerate() {
            self.owned_by_gid
                .insert(gid, NodeIndex::new(zone, head + k as u64));
        }
        self.blocks.push(NodeBlock {
            zone,
            head,
            coords,
            gids,
        });
        Ok(())
    }

    /// Store a node received from the rank that owns it.
    pub fn insert_ghost(&mut self, index: NodeIndex, xyz: Global) {
        self.ghosts.insert(index, xyz);
    }

    fn owned(&self, index: NodeIndex) -> Option<Global> {
        self.blocks
            .iter()
            .find_map(|b| b.offset(index).map(|k| b.coords[k]))
    }

    /// Position of any locally known node.
    pub fn get(&self, index: NodeIndex) -> Result<Global, MeshPartError> {
        self.owned(index)
            .or_else(|| self.ghosts.get(&index).copied())
            .ok_or_else(|| MeshPartError::UnknownNode(index.to_string()))
    }

    /// Positions of `nodes` of `zone`, in order.
    pub fn gather(&self, zone: usize, nodes: &[u64]) -> Result<Vec<Global>, MeshPartError> {
        nodes
            .iter()
            .map(|&n| self.get(NodeIndex::new(zone, n)))
            .collect()
    }

    pub fn contains(&self, index: NodeIndex) -> bool {
        self.owned(index).is_some() || self.ghosts.contains_key(&index)
    }

    /// Index of an owned node by its GlobalId.
    pub fn owned_index(&self, gid: GlobalId) -> Result<NodeIndex, MeshPartError> {
        self.owned_by_gid
            .get(&gid)
            .copied()
            .ok_or_else(|| MeshPartError::UnknownNode(format!("global {gid}")))
    }

    /// Position of an owned node by its GlobalId.
    pub fn owned_by_global(&self, gid: GlobalId) -> Result<Global, MeshPartError> {
        self.get(self.owned_index(gid)?)
    }

    pub fn count_owned(&self) -> usize {
        self.blocks.iter().map(|b| b.coords.len()).sum()
    }

    pub fn count_ghosts(&self) -> usize {
        self.ghosts.len()
    }

    /// Owned nodes as `(index, gid, position)`, block by block.
    pub fn owned_nodes(&self) -> impl Iterator<Item = (NodeIndex, GlobalId, Global)> + '_ {
        self.blocks.iter().flat_map(|b| {
            b.coords
                .iter()
                .zip(&b.gids)
                .enumerate()
                .map(move |(k, (xyz, gid))| (NodeIndex::new(b.zone, b.head + k as u64), *gid, *xyz))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CoordinateStore {
        let mut s = CoordinateStore::new();
        s.insert_owned(
            1,
            5,
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            vec![GlobalId::new(40), GlobalId::new(41)],
        )
        .unwrap();
        s.insert_ghost(NodeIndex::new(1, 9), [9.0, 9.0, 9.0]);
        s
    }

    #[test]
    fn shifted_and_ghost_lookups() {
        let s = store();
        assert_eq!(s.get(NodeIndex::new(1, 6)).unwrap(), [1.0, 0.0, 0.0]);
        assert_eq!(s.get(NodeIndex::new(1, 9)).unwrap(), [9.0, 9.0, 9.0]);
        assert_eq!(s.owned_index(GlobalId::new(41)).unwrap(), NodeIndex::new(1, 6));
        assert_eq!(s.count_owned(), 2);
        assert_eq!(s.count_ghosts(), 1);
    }

    #[test]
    fn unknown_node_is_an_error() {
        let s = store();
        assert!(matches!(
            s.get(NodeIndex::new(1, 4)),
            Err(MeshPartError::UnknownNode(_))
        ));
        assert!(matches!(
            s.get(NodeIndex::new(2, 5)),
            Err(MeshPartError::UnknownNode(_))
        ));
        assert!(s.owned_index(GlobalId::new(7)).is_err());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut s = CoordinateStore::new();
        assert!(s.insert_owned(1, 1, vec![[0.0; 3]], vec![]).is_err());
    }
}
