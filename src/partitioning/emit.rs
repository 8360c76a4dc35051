//! Produce every rank's [`PartitionDescription`] from a cell-to-rank
//! assignment over an [`InMemoryMesh`].
//!
//! The assignment comes from any graph partitioner; this module only does
//! the deterministic bookkeeping. Each rank's cells must form one contiguous
//! element range per section (renumber the mesh first if they do not). A
//! node belongs to the lowest rank among the cells using it, and a boundary
//! face belongs to the rank owning the cell that holds it.

use crate::io::mesh::InMemoryMesh;
use crate::mesh_error::MeshPartError;
use crate::partitioning::description::{
    ElementRange, GhostPair, LocalPair, NodeRange, NodeRecv, NodeSend, PartitionDescription,
};
use crate::topology::ids::{GlobalId, NodeIndex};
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::path::Path;

struct CellRec<'m> {
    gid: GlobalId,
    zone: usize,
    nodes: &'m [u64],
    rank: usize,
}

/// Zone plus sorted node list: identifies a face regardless of orientation.
type FaceKey = (usize, Vec<u64>);

fn face_key(zone: usize, nodes: impl Iterator<Item = u64>) -> FaceKey {
    (zone, nodes.sorted_unstable().collect())
}

/// Split a run of `(element, rank)` into one range per rank.
fn contiguous_ranges(
    zone: usize,
    section: usize,
    owners: impl Iterator<Item = (u64, usize)>,
    out: &mut [PartitionDescription],
    pick: fn(&mut PartitionDescription) -> &mut Vec<ElementRange>,
) -> Result<(), MeshPartError> {
    let mut seen = HashSet::new();
    for (rank, run) in &owners.chunk_by(|&(_, r)| r) {
        let run: Vec<u64> = run.map(|(e, _)| e).collect();
        if !seen.insert(rank) {
            return Err(MeshPartError::NonContiguousOwnership {
                rank,
                zone,
                section,
            });
        }
        let (Some(&head), Some(&last)) = (run.first(), run.last()) else {
            continue;
        };
        pick(&mut out[rank]).push(ElementRange {
            zone,
            section,
            head,
            tail: last + 1,
        });
    }
    Ok(())
}

/// Build the description of every rank.
///
/// `assignment[g]` is the rank owning the cell whose GlobalId is `g`.
pub fn describe(
    mesh: &InMemoryMesh,
    assignment: &[usize],
    n_ranks: usize,
) -> Result<Vec<PartitionDescription>, MeshPartError> {
    mesh.validate()?;
    let mut out = vec![PartitionDescription::default(); n_ranks];
    let rank_of = |gid: GlobalId| -> Result<usize, MeshPartError> {
        let r = *assignment
            .get(gid.get() as usize)
            .ok_or(MeshPartError::UnknownCell(gid))?;
        if r >= n_ranks {
            return Err(MeshPartError::InvalidMesh(format!(
                "cell {gid} assigned to rank {r} of {n_ranks}"
            )));
        }
        Ok(r)
    };

    // cells, owned cell ranges, and the face map
    let mut cells: Vec<CellRec> = Vec::new();
    let mut faces: HashMap<FaceKey, Vec<usize>> = HashMap::new();
    for (z, zone) in mesh.zones.iter().enumerate() {
        let zone_no = z + 1;
        for (s, sect) in zone.sections.iter().enumerate() {
            if !mesh.is_cell_kind(sect.kind) {
                continue;
            }
            let first_cell = cells.len();
            for (i, &gid) in sect.cell_ids.iter().enumerate() {
                let nodes = sect.nodes_of(sect.first + i as u64);
                let c = cells.len();
                for local in sect.kind.local_faces() {
                    let key = face_key(zone_no, local.iter().map(|&k| nodes[k]));
                    faces.entry(key).or_default().push(c);
                }
                cells.push(CellRec {
                    gid,
                    zone: zone_no,
                    nodes,
                    rank: rank_of(gid)?,
                });
            }
            let owners = cells[first_cell..]
                .iter()
                .enumerate()
                .map(|(i, c)| (sect.first + i as u64, c.rank));
            contiguous_ranges(zone_no, s + 1, owners, &mut out, |d| &mut d.cell_ranges)?;
        }
    }

    // adjacency; every rank records its own cell as the holder
    let mut ghosts: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n_ranks];
    let mut pairs: Vec<(usize, usize)> = faces
        .values()
        .filter(|owners| owners.len() == 2)
        .map(|o| (o[0], o[1]))
        .collect();
    pairs.sort_unstable_by_key(|&(a, b)| {
        let (ga, gb) = (cells[a].gid, cells[b].gid);
        (ga.min(gb), ga.max(gb))
    });
    for (a, b) in pairs {
        let (ca, cb) = (&cells[a], &cells[b]);
        if ca.rank == cb.rank {
            let (holder, sharer) = if ca.gid < cb.gid { (ca, cb) } else { (cb, ca) };
            out[ca.rank].local_pairs.push(LocalPair {
                holder: holder.gid,
                sharer: sharer.gid,
            });
        } else {
            for (mine, theirs, theirs_idx) in [(ca, cb, b), (cb, ca, a)] {
                out[mine.rank].ghost_pairs.push(GhostPair {
                    rank: theirs.rank,
                    holder: mine.gid,
                    sharer: theirs.gid,
                    holder_npe: mine.nodes.len(),
                    sharer_npe: theirs.nodes.len(),
                });
                ghosts[mine.rank].insert(theirs_idx);
            }
        }
    }

    // node ownership and node exchange lists
    for (z, zone) in mesh.zones.iter().enumerate() {
        let zone_no = z + 1;
        let n_nodes = zone.coordinates.len();
        let mut owner = vec![usize::MAX; n_nodes];
        for c in cells.iter().filter(|c| c.zone == zone_no) {
            for &n in c.nodes {
                let o = &mut owner[(n - 1) as usize];
                *o = (*o).min(c.rank);
            }
        }
        // nodes used by no cell stay with rank 0
        for o in owner.iter_mut().filter(|o| **o == usize::MAX) {
            *o = 0;
        }
        for (rank, run) in &owner.iter().enumerate().chunk_by(|&(_, &r)| r) {
            let run: Vec<usize> = run.map(|(n, _)| n).collect();
            if let (Some(&head), Some(&last)) = (run.first(), run.last()) {
                out[rank].node_ranges.push(NodeRange {
                    zone: zone_no,
                    head: head as u64 + 1,
                    tail: last as u64 + 2,
                });
            }
        }

        for rank in 0..n_ranks {
            let needed: BTreeSet<u64> = cells
                .iter()
                .enumerate()
                .filter(|(i, c)| c.zone == zone_no && (c.rank == rank || ghosts[rank].contains(i)))
                .flat_map(|(_, c)| c.nodes.iter().copied())
                .filter(|&n| owner[(n - 1) as usize] != rank)
                .collect();
            for n in needed {
                let from = owner[(n - 1) as usize];
                let gid = zone.node_ids[(n - 1) as usize];
                out[rank].nodes_to_recv.push(NodeRecv {
                    rank: from,
                    node: gid,
                    index: NodeIndex::new(zone_no, n),
                });
                out[from].nodes_to_send.push(NodeSend { rank, node: gid });
            }
        }
    }
    for d in &mut out {
        d.nodes_to_send.sort_unstable_by_key(|s| (s.rank, s.node));
        d.nodes_to_send.dedup();
        d.nodes_to_recv.sort_unstable_by_key(|r| (r.rank, r.node));
        d.ghost_pairs
            .sort_unstable_by_key(|p| (p.rank, p.holder, p.sharer));
    }

    // boundary faces follow their holders
    for (z, zone) in mesh.zones.iter().enumerate() {
        let zone_no = z + 1;
        for (s, sect) in zone.sections.iter().enumerate() {
            if mesh.is_cell_kind(sect.kind) {
                continue;
            }
            let owners = (0..sect.count())
                .map(|i| {
                    let element = sect.first + i;
                    let key = face_key(zone_no, sect.nodes_of(element).iter().copied());
                    faces
                        .get(&key)
                        .and_then(|o| o.first())
                        .map(|&c| (element, cells[c].rank))
                        .ok_or_else(|| MeshPartError::NoBoundaryHolder {
                            section: sect.name.clone(),
                            face: element as usize,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            contiguous_ranges(zone_no, s + 1, owners.into_iter(), &mut out, |d| {
                &mut d.boundary_ranges
            })?;
        }
    }

    for (rank, d) in out.iter().enumerate() {
        log::debug!(
            "rank {rank}: {} cell ranges, {} local pairs, {} ghost pairs, {} nodes in",
            d.cell_ranges.len(),
            d.local_pairs.len(),
            d.ghost_pairs.len(),
            d.nodes_to_recv.len()
        );
    }
    Ok(out)
}

/// Write every rank's description under `{directory}/partition/`.
pub fn write_all(
    directory: impl AsRef<Path>,
    descriptions: &[PartitionDescription],
) -> Result<(), MeshPartError> {
    for (rank, d) in descriptions.iter().enumerate() {
        d.write_for_rank(directory.as_ref(), rank)?;
    }
    Ok(())
}
