//! Element connectivity, one block per owned `(zone, section)` range.

use crate::mesh_error::MeshPartError;
use crate::topology::element::ElementKind;
use crate::topology::ids::{CellIndex, GlobalId};
use hashbrown::HashMap;

/// Node lists of the elements `[head, tail)` of one section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementBlock {
    pub zone: usize,
    pub section: usize,
    pub kind: ElementKind,
    pub head: u64,
    nodes: Vec<u64>,
    gids: Vec<GlobalId>,
}

impl ElementBlock {
    /// `nodes` holds `kind.npe()` 1-based node indices per element. `gids`
    /// is empty for boundary-face blocks.
    pub fn new(
        zone: usize,
        section: usize,
        kind: ElementKind,
        head: u64,
        nodes: Vec<u64>,
        gids: Vec<GlobalId>,
    ) -> Result<Self, MeshPartError> {
        let npe = kind.npe();
        if nodes.len() % npe != 0 {
            return Err(MeshPartError::InvalidMesh(format!(
                "zone {zone} section {section}: {} node indices for {npe}-node elements",
                nodes.len()
            )));
        }
        if !gids.is_empty() && gids.len() * npe != nodes.len() {
            return Err(MeshPartError::InvalidMesh(format!(
                "zone {zone} section {section}: {} cell ids for {} elements",
                gids.len(),
                nodes.len() / npe
            )));
        }
        Ok(Self {
            zone,
            section,
            kind,
            head,
            nodes,
            gids,
        })
    }

    #[inline]
    pub fn npe(&self) -> usize {
        self.kind.npe()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len() / self.npe()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn tail(&self) -> u64 {
        self.head + self.len() as u64
    }

    /// Node indices of the `i`-th element of the block.
    #[inline]
    pub fn nodes_of(&self, i: usize) -> &[u64] {
        let npe = self.npe();
        &self.nodes[i * npe..(i + 1) * npe]
    }

    #[inline]
    pub fn gid_of(&self, i: usize) -> Option<GlobalId> {
        self.gids.get(i).copied()
    }

    pub fn index_of(&self, i: usize) -> CellIndex {
        CellIndex {
            zone: self.zone,
            section: self.section,
            element: self.head + i as u64,
            npe: self.npe(),
        }
    }
}

/// All owned cell blocks of a rank, with a GlobalId lookup.
#[derive(Clone, Debug, Default)]
pub struct Connectivity {
    blocks: Vec<ElementBlock>,
    by_gid: HashMap<GlobalId, (usize, usize)>,
}

impl Connectivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: ElementBlock) {
        let b = self.blocks.len();
        for i in 0..block.len() {
            if let Some(gid) = block.gid_of(i) {
                self.by_gid.insert(gid, (b, i));
            }
        }
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[ElementBlock] {
        &self.blocks
    }

    pub fn count_cells(&self) -> usize {
        self.blocks.iter().map(ElementBlock::len).sum()
    }

    /// Block position and in-block offset of an owned cell.
    pub fn locate(&self, gid: GlobalId) -> Result<(usize, usize), MeshPartError> {
        self.by_gid
            .get(&gid)
            .copied()
            .ok_or(MeshPartError::UnknownCell(gid))
    }

    /// Zone and node indices of an owned cell.
    pub fn nodes_of(&self, gid: GlobalId) -> Result<(usize, &[u64]), MeshPartError> {
        let (b, i) = self.locate(gid)?;
        let block = &self.blocks[b];
        Ok((block.zone, block.nodes_of(i)))
    }
}
