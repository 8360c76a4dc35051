//! Construction of a [`Part`] from a mesh source and one rank's
//! [`PartitionDescription`].
//!
//! The build runs in fixed phases, each of which either completes on every
//! rank or aborts the whole build:
//!
//! 1. read owned nodes and owned cell connectivity, check them, and encode
//!    everything the setup exchanges will send;
//! 2. exchange node coordinates with neighbours, then build one [`Cell`]
//!    per owned element;
//! 3. send every neighbour the connectivity of the cells it keeps as
//!    ghosts, and build the ghosts from what arrives;
//! 4. derive the halo schedule and optionally verify it with a handshake;
//! 5. build local faces, ghost faces, then boundary faces.
//!
//! Setup exchanges post every send and receive before waiting on any, and
//! drain every handle before reporting the first failure.
//!
//! A failure after the node exchange does not end the build at once: the
//! failing rank still sends its ghost records and handshake, led by a
//! [`SetupStatus::Failed`] word, and each neighbour returns
//! [`MeshPartError::CommError`] instead of waiting for data that never comes.

use super::{Part, PartConfig};
use crate::algs::communicator::{CommTag, Communicator, SetupTags, Wait};
use crate::algs::halo::{HaloChannel, HaloSchedule};
use crate::algs::wire::{
    SetupStatus, WireNode, WireWord, cast_slice, cell_record_words, decode_vec, expect_exact_len,
};
use crate::data::{
    BoundarySection, Connectivity, CoordinateStore, ElementBlock, Scalar, Section,
};
use crate::geometry::Prototype;
use crate::geometry::coordinate::Role;
use crate::io::mesh::MeshSource;
use crate::mesh_error::MeshPartError;
use crate::part::cell::Cell;
use crate::part::face::Face;
use crate::part::ghost::GhostRegistry;
use crate::partitioning::description::PartitionDescription;
use crate::topology::element::{ElementKind, sort_nodes_on_face};
use crate::topology::ids::{FaceId, GlobalId, LocalId, NodeIndex};
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Zone and node indices of a ghost cell, as sent by its owner.
#[derive(Clone, Debug)]
struct GhostRecord {
    zone: usize,
    nodes: Vec<u64>,
}

/// Owned cell connectivity, read before any cell is instantiated.
struct LocalCells<T> {
    connectivity: Connectivity,
    sections: Vec<Section<T>>,
    by_gid: HashMap<GlobalId, LocalId>,
}

/// Builds a [`Part`]; prototypes must be installed for every element node
/// count the partition touches.
pub struct PartBuilder<C: Communicator, T: Scalar = f64> {
    config: PartConfig,
    comm: C,
    cell_prototypes: HashMap<usize, Prototype>,
    face_prototypes: HashMap<usize, Prototype>,
    _scalar: PhantomData<T>,
}

impl<C: Communicator, T: Scalar> PartBuilder<C, T> {
    pub fn new(config: PartConfig, comm: C) -> Self {
        Self {
            config,
            comm,
            cell_prototypes: HashMap::new(),
            face_prototypes: HashMap::new(),
            _scalar: PhantomData,
        }
    }

    /// Install `prototype` for its node count, replacing any earlier one of
    /// the same role and node count.
    pub fn install_prototype(mut self, prototype: Prototype) -> Self {
        let slot = match prototype.role() {
            Role::Cell => &mut self.cell_prototypes,
            Role::Face => &mut self.face_prototypes,
        };
        slot.insert(prototype.npe(), prototype);
        self
    }

    /// Install the canonical cell and face kinds of a 2D or 3D mesh.
    pub fn install_defaults(self, cell_dim: usize) -> Self {
        use ElementKind::*;
        let (cells, faces): (&[ElementKind], &[ElementKind]) = match cell_dim {
            2 => (&[Triangle3, Quadrangle4], &[Line2]),
            _ => (
                &[Tetrahedron4, Pyramid5, Wedge6, Hexahedron8],
                &[Triangle3, Quadrangle4],
            ),
        };
        let with_cells = cells
            .iter()
            .fold(self, |b, &k| b.install_prototype(Prototype::cell(k)));
        faces
            .iter()
            .fold(with_cells, |b, &k| b.install_prototype(Prototype::face(k)))
    }

    fn prototype(&self, role: Role, npe: usize) -> Result<Prototype, MeshPartError> {
        let map = match role {
            Role::Cell => &self.cell_prototypes,
            Role::Face => &self.face_prototypes,
        };
        map.get(&npe).copied().ok_or(MeshPartError::MissingPrototype {
            role: role.as_str(),
            npe,
        })
    }

    /// Build this rank's part. Every rank of the communicator must call
    /// `build` with its own description.
    pub fn build<M: MeshSource>(
        self,
        mesh: &M,
        description: &PartitionDescription,
    ) -> Result<Part<C, T>, MeshPartError> {
        let (rank, size) = (self.comm.rank(), self.comm.size());
        let tags = SetupTags::from_base(self.config.base_tag);
        let base = mesh.base()?;
        description.check_ranks(rank, size)?;

        let mut coordinates = self.read_nodes(mesh, description)?;
        let LocalCells {
            connectivity,
            sections,
            by_gid,
        } = self.read_cells(mesh, description)?;

        // checks needing nothing from neighbours run before the first post
        for pair in &description.ghost_pairs {
            self.prototype(Role::Cell, pair.sharer_npe)?;
        }
        let node_out = encode_nodes(description, &coordinates)?;
        let cell_out = encode_ghost_requests(description, &connectivity)?;

        // from here on a failure is carried through the remaining phases
        let cells = self
            .exchange_nodes(tags.nodes, description, &node_out, &mut coordinates)
            .and_then(|()| self.build_cells(&connectivity, &coordinates));
        let status = SetupStatus::of(cells.is_ok());
        let records = self.exchange_ghost_cells(tags.cells, description, &cell_out, status);
        let built = cells.and_then(|cells| {
            let records = records?;
            let ghosts = self.build_ghosts(&records, &coordinates, cells.len())?;
            let schedule = halo_schedule(description, &by_gid, &ghosts)?;
            Ok((cells, records, ghosts, schedule))
        });

        if self.config.verify_halo_order {
            match &built {
                Ok((cells, _, ghosts, schedule)) => {
                    let n_local = cells.len();
                    schedule.verify_order(&self.comm, tags.handshake, SetupStatus::Ready, |id| {
                        if id.get() < n_local {
                            cells[id.get()].global_id()
                        } else {
                            ghosts
                                .get(id)
                                .map(Cell::global_id)
                                .unwrap_or(GlobalId::new(u64::MAX))
                        }
                    })?;
                }
                Err(e) => {
                    log::warn!("rank {rank}: setup failed, notifying neighbours: {e}");
                    let unmatched = |_: LocalId| GlobalId::new(u64::MAX);
                    if let Err(peer) = placeholder_schedule(description).verify_order(
                        &self.comm,
                        tags.handshake,
                        SetupStatus::Failed,
                        unmatched,
                    ) {
                        log::debug!("rank {rank}: handshake after failure: {peer}");
                    }
                }
            }
        }
        let (mut cells, records, ghosts, schedule) = built?;
        log::debug!(
            "rank {rank}: {} owned nodes, {} received",
            coordinates.count_owned(),
            coordinates.count_ghosts()
        );
        log::debug!("rank {rank}: {} local cells in {} sections", cells.len(), sections.len());
        log::debug!("rank {rank}: {} ghost cells", ghosts.len());

        let local_id = |gid: GlobalId| {
            by_gid
                .get(&gid)
                .copied()
                .ok_or(MeshPartError::UnknownCell(gid))
        };
        let mut faces: Vec<Face> = Vec::new();

        for pair in &description.local_pairs {
            let (h, s) = (local_id(pair.holder)?, local_id(pair.sharer)?);
            let (hz, hn) = connectivity.nodes_of(pair.holder)?;
            let (sz, sn) = connectivity.nodes_of(pair.sharer)?;
            let kind = cells[h.get()].coordinate().kind();
            let shared = shared_nodes(hz, hn, sz, sn);
            let sharer_kind = cells[s.get()].coordinate().kind();
            check_shared_count(pair.holder, pair.sharer, [kind, sharer_kind], shared.len())?;
            let id = FaceId::new(faces.len());
            let face = self.face_on(
                &coordinates,
                hz,
                kind,
                hn,
                shared,
                id,
                &cells[h.get()],
                Some(&cells[s.get()]),
            )?;
            faces.push(face);
            cells[h.get()].connect(s, id);
            cells[s.get()].connect(h, id);
        }
        let n_local_faces = faces.len();

        for pair in &description.ghost_pairs {
            let h = local_id(pair.holder)?;
            let g = ghosts
                .local_id(pair.sharer)
                .ok_or(MeshPartError::UnknownCell(pair.sharer))?;
            let record = records
                .get(&pair.sharer)
                .ok_or(MeshPartError::UnknownCell(pair.sharer))?;
            let ghost = ghosts.get(g).ok_or(MeshPartError::UnknownCell(pair.sharer))?;
            let (hz, hn) = connectivity.nodes_of(pair.holder)?;
            let kind = cells[h.get()].coordinate().kind();
            let shared = shared_nodes(hz, hn, record.zone, &record.nodes);
            let sharer_kind = ghost.coordinate().kind();
            check_shared_count(pair.holder, pair.sharer, [kind, sharer_kind], shared.len())?;
            let id = FaceId::new(faces.len());
            let face = self.face_on(
                &coordinates,
                hz,
                kind,
                hn,
                shared,
                id,
                &cells[h.get()],
                Some(ghost),
            )?;
            faces.push(face);
            let holder = &mut cells[h.get()];
            holder.connect(g, id);
            holder.mark_inter();
        }
        let n_ghost_faces = faces.len() - n_local_faces;

        let (boundary_sections, boundaries) = self.build_boundaries(
            mesh,
            description,
            &coordinates,
            &connectivity,
            &sections,
            &mut cells,
            &mut faces,
        )?;
        log::debug!(
            "rank {rank}: faces {n_local_faces} local, {n_ghost_faces} ghost, {} boundary",
            faces.len() - n_local_faces - n_ghost_faces
        );

        let coefficients = HaloChannel::new(&schedule, self.config.fields_per_cell, tags.channels);

        log::info!(
            "rank {rank}/{size}: {} cells, {} ghosts, {} faces, {} neighbours",
            cells.len(),
            ghosts.len(),
            faces.len(),
            schedule.neighbors().len()
        );

        Ok(Part {
            comm: self.comm,
            config: self.config,
            tags,
            base,
            coordinates,
            connectivity,
            sections,
            cells,
            local_by_gid: by_gid,
            ghosts,
            faces,
            n_local_faces,
            n_ghost_faces,
            boundary_sections,
            boundaries,
            schedule,
            coefficients,
            next_channel: 1,
        })
    }

    fn read_nodes<M: MeshSource>(
        &self,
        mesh: &M,
        description: &PartitionDescription,
    ) -> Result<CoordinateStore, MeshPartError> {
        let mut coordinates = CoordinateStore::new();
        for r in &description.node_ranges {
            let xyz = mesh.read_coordinates(r.zone, r.head, r.tail)?;
            let gids = mesh.read_node_ids(r.zone, r.head, r.tail)?;
            coordinates.insert_owned(r.zone, r.head, xyz, gids)?;
        }
        Ok(coordinates)
    }

    fn exchange_nodes(
        &self,
        tag: CommTag,
        description: &PartitionDescription,
        outgoing: &BTreeMap<usize, Vec<u8>>,
        coordinates: &mut CoordinateStore,
    ) -> Result<(), MeshPartError> {
        let record = std::mem::size_of::<WireNode>();
        let expected = description.recv_nodes();
        let incoming = expected.iter().map(|(&r, v)| (r, v.len() * record)).collect();

        let received = setup_exchange(&self.comm, tag, outgoing, incoming)?;
        for (rank, bytes) in received {
            let nodes = decode_vec::<WireNode>(&bytes).map_err(|e| MeshPartError::CommError {
                neighbor: rank,
                source: e.into(),
            })?;
            let wanted = expected.get(&rank).map(Vec::as_slice).unwrap_or(&[]);
            for (&(gid, index), node) in wanted.iter().zip(&nodes) {
                if node.gid() != gid.get() {
                    return Err(MeshPartError::UnknownNode(format!(
                        "rank {rank} sent node {} where {gid} was expected",
                        node.gid()
                    )));
                }
                coordinates.insert_ghost(index, node.xyz());
            }
        }
        Ok(())
    }

    /// Read owned connectivity and assign LocalIds section by section.
    fn read_cells<M: MeshSource>(
        &self,
        mesh: &M,
        description: &PartitionDescription,
    ) -> Result<LocalCells<T>, MeshPartError> {
        let width = self.config.fields_per_cell;
        let mut ranges = description.cell_ranges.clone();
        ranges.sort_unstable_by_key(|r| (r.zone, r.section, r.head));

        let mut out = LocalCells {
            connectivity: Connectivity::new(),
            sections: Vec::with_capacity(ranges.len()),
            by_gid: HashMap::new(),
        };
        let mut next = 0;
        for r in ranges {
            let info = mesh.section_info(r.zone, r.section)?;
            let prototype = self.prototype(Role::Cell, info.kind.npe())?;
            if prototype.kind() != info.kind {
                return Err(MeshPartError::InvalidMesh(format!(
                    "section `{}` holds {:?} but the {}-node cell prototype is {:?}",
                    info.name,
                    info.kind,
                    prototype.npe(),
                    prototype.kind()
                )));
            }
            let nodes = mesh.read_connectivity(r.zone, r.section, r.head, r.tail)?;
            let gids = mesh.read_cell_ids(r.zone, r.section, r.head, r.tail)?;
            let block = ElementBlock::new(r.zone, r.section, info.kind, r.head, nodes, gids)?;
            if block.tail() != r.tail {
                return Err(MeshPartError::InvalidMesh(format!(
                    "section `{}`: read {} elements for range [{}, {})",
                    info.name,
                    block.len(),
                    r.head,
                    r.tail
                )));
            }

            let first = LocalId::new(next);
            for i in 0..block.len() {
                let gid = block.gid_of(i).ok_or_else(|| {
                    MeshPartError::InvalidMesh(format!("section `{}` has no cell ids", info.name))
                })?;
                if out.by_gid.insert(gid, LocalId::new(next)).is_some() {
                    return Err(MeshPartError::InvalidMesh(format!("cell {gid} is owned twice")));
                }
                next += 1;
            }
            out.sections.push(Section::new(
                r.zone, r.section, info.name, info.kind, r.head, r.tail, first, width,
            ));
            out.connectivity.push(block);
        }
        Ok(out)
    }

    /// One cell per owned element, in LocalId order.
    fn build_cells(
        &self,
        connectivity: &Connectivity,
        coordinates: &CoordinateStore,
    ) -> Result<Vec<Cell<T>>, MeshPartError> {
        let mut cells = Vec::with_capacity(connectivity.count_cells());
        for block in connectivity.blocks() {
            let prototype = self.prototype(Role::Cell, block.npe())?;
            for i in 0..block.len() {
                let gid = block.gid_of(i).ok_or_else(|| {
                    MeshPartError::InvalidMesh(format!(
                        "block {:?} has no cell ids",
                        block.index_of(i)
                    ))
                })?;
                let (coordinate, integrator) =
                    prototype.instantiate(coordinates.gather(block.zone, block.nodes_of(i))?)?;
                let id = LocalId::new(cells.len());
                cells.push(Cell::new(coordinate, integrator, gid, id, self.config.fields_per_cell));
            }
        }
        Ok(cells)
    }

    /// Send `status` then `[gid, zone, nodes…]` for every cell a neighbour
    /// keeps as a ghost; receive the same for ours, in ascending GlobalId
    /// order. A neighbour reporting failure is a [`MeshPartError::CommError`].
    fn exchange_ghost_cells(
        &self,
        tag: CommTag,
        description: &PartitionDescription,
        outgoing: &BTreeMap<usize, Vec<u8>>,
        status: SetupStatus,
    ) -> Result<BTreeMap<GlobalId, GhostRecord>, MeshPartError> {
        let expected = description.recv_cells();
        let word = std::mem::size_of::<WireWord>();
        let incoming = expected
            .iter()
            .map(|(&r, cells)| {
                let body: usize = cells.values().map(|&npe| cell_record_words(npe) * word).sum();
                (r, word + body)
            })
            .collect();
        let framed: BTreeMap<usize, Vec<u8>> = outgoing
            .iter()
            .map(|(&r, body)| {
                let mut message = cast_slice(&[status.word()]).to_vec();
                message.extend_from_slice(body);
                (r, message)
            })
            .collect();

        let received = setup_exchange(&self.comm, tag, &framed, incoming)?;
        let mut records = BTreeMap::new();
        for (rank, bytes) in received {
            let comm_err = |e: String| MeshPartError::CommError {
                neighbor: rank,
                source: e.into(),
            };
            let message = decode_vec::<WireWord>(&bytes).map_err(comm_err)?;
            let words = match SetupStatus::split(&message).map_err(comm_err)? {
                (SetupStatus::Ready, body) => body,
                (SetupStatus::Failed, _) => {
                    return Err(comm_err(format!("rank {rank} failed during setup")));
                }
            };
            let Some(wanted) = expected.get(&rank) else {
                continue;
            };
            let mut at = 0;
            for (position, (&gid, &npe)) in wanted.iter().enumerate() {
                let rec = &words[at..at + cell_record_words(npe)];
                at += rec.len();
                if rec[0].get() != gid.get() {
                    return Err(MeshPartError::HaloOrderMismatch {
                        neighbor: rank,
                        position,
                    });
                }
                records.insert(
                    gid,
                    GhostRecord {
                        zone: rec[1].get() as usize,
                        nodes: rec[2..].iter().map(WireWord::get).collect(),
                    },
                );
            }
        }
        Ok(records)
    }

    fn build_ghosts(
        &self,
        records: &BTreeMap<GlobalId, GhostRecord>,
        coordinates: &CoordinateStore,
        n_local: usize,
    ) -> Result<GhostRegistry<T>, MeshPartError> {
        let mut cells = BTreeMap::new();
        for (&gid, record) in records {
            let prototype = self.prototype(Role::Cell, record.nodes.len())?;
            let (coordinate, integrator) =
                prototype.instantiate(coordinates.gather(record.zone, &record.nodes)?)?;
            // the registry assigns the real id
            let placeholder = LocalId::new(n_local);
            let width = self.config.fields_per_cell;
            let cell = Cell::new(coordinate, integrator, gid, placeholder, width);
            cells.insert(gid, cell);
        }
        Ok(GhostRegistry::from_cells(n_local, cells))
    }

    /// Order `face_nodes` by the holder's convention and build the face.
    #[allow(clippy::too_many_arguments)]
    fn face_on(
        &self,
        coordinates: &CoordinateStore,
        zone: usize,
        kind: ElementKind,
        cell_nodes: &[u64],
        mut face_nodes: Vec<u64>,
        id: FaceId,
        holder: &Cell<T>,
        sharer: Option<&Cell<T>>,
    ) -> Result<Face, MeshPartError> {
        sort_nodes_on_face(kind, cell_nodes, &mut face_nodes)?;
        let prototype = self.prototype(Role::Face, face_nodes.len())?;
        let (coordinate, integrator) =
            prototype.instantiate(coordinates.gather(zone, &face_nodes)?)?;
        Ok(Face::new(coordinate, integrator, id, holder, sharer))
    }

    #[allow(clippy::too_many_arguments, clippy::type_complexity)]
    fn build_boundaries<M: MeshSource>(
        &self,
        mesh: &M,
        description: &PartitionDescription,
        coordinates: &CoordinateStore,
        connectivity: &Connectivity,
        sections: &[Section<T>],
        cells: &mut [Cell<T>],
        faces: &mut Vec<Face>,
    ) -> Result<(Vec<BoundarySection>, BTreeMap<String, Vec<FaceId>>), MeshPartError> {
        let cell_dim = mesh.base()?.cell_dim;
        let mut boundaries: BTreeMap<String, Vec<FaceId>> = BTreeMap::new();
        for zone in 1..=mesh.count_zones()? {
            for section in 1..=mesh.count_sections(zone)? {
                let info = mesh.section_info(zone, section)?;
                if info.kind.dimension() < cell_dim {
                    boundaries.entry(info.name).or_default();
                }
            }
        }

        let mut cells_at: HashMap<NodeIndex, Vec<LocalId>> = HashMap::new();
        for (block, section) in connectivity.blocks().iter().zip(sections) {
            for i in 0..block.len() {
                let id = section.local_id(block.head + i as u64);
                for &n in block.nodes_of(i) {
                    cells_at.entry(NodeIndex::new(block.zone, n)).or_default().push(id);
                }
            }
        }

        let mut ranges = description.boundary_ranges.clone();
        ranges.sort_unstable_by_key(|r| (r.zone, r.section, r.head));
        let mut out = Vec::with_capacity(ranges.len());
        for r in ranges {
            let info = mesh.section_info(r.zone, r.section)?;
            let npe = info.kind.npe();
            let nodes = mesh.read_connectivity(r.zone, r.section, r.head, r.tail)?;
            let mut ids = Vec::with_capacity(nodes.len() / npe);
            for (k, face_nodes) in nodes.chunks_exact(npe).enumerate() {
                let element = r.head + k as u64;
                let mut hits: HashMap<LocalId, usize> = HashMap::new();
                for &n in face_nodes {
                    for &c in cells_at.get(&NodeIndex::new(r.zone, n)).into_iter().flatten() {
                        *hits.entry(c).or_default() += 1;
                    }
                }
                let holder = hits
                    .into_iter()
                    .filter(|&(_, count)| count == npe)
                    .map(|(c, _)| c)
                    .min()
                    .ok_or_else(|| MeshPartError::NoBoundaryHolder {
                        section: info.name.clone(),
                        face: element as usize,
                    })?;
                let h = &cells[holder.get()];
                let (zone, cell_nodes) = connectivity.nodes_of(h.global_id())?;
                let id = FaceId::new(faces.len());
                let face = self.face_on(
                    coordinates,
                    zone,
                    h.coordinate().kind(),
                    cell_nodes,
                    face_nodes.to_vec(),
                    id,
                    h,
                    None,
                )?;
                if face.outward_measure(h) <= 0.0 {
                    return Err(MeshPartError::InwardBoundaryNormal {
                        section: info.name.clone(),
                        face: element as usize,
                    });
                }
                faces.push(face);
                cells[holder.get()].add_boundary_face(id);
                ids.push(id);
            }
            boundaries
                .entry(info.name.clone())
                .or_default()
                .extend(&ids);
            out.push(BoundarySection {
                zone: r.zone,
                section: r.section,
                name: info.name,
                kind: info.kind,
                head: r.head,
                tail: r.tail,
                faces: ids,
            });
        }
        Ok((out, boundaries))
    }
}

/// `WireNode` records for every node a neighbour asked for.
fn encode_nodes(
    description: &PartitionDescription,
    coordinates: &CoordinateStore,
) -> Result<BTreeMap<usize, Vec<u8>>, MeshPartError> {
    let mut out = BTreeMap::new();
    for (rank, gids) in description.send_nodes() {
        let nodes = gids
            .iter()
            .map(|&g| -> Result<WireNode, MeshPartError> {
                Ok(WireNode::new(g.get(), coordinates.owned_by_global(g)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        out.insert(rank, cast_slice(&nodes).to_vec());
    }
    Ok(out)
}

/// `[gid, zone, nodes…]` for every owned cell a neighbour keeps as a ghost.
fn encode_ghost_requests(
    description: &PartitionDescription,
    connectivity: &Connectivity,
) -> Result<BTreeMap<usize, Vec<u8>>, MeshPartError> {
    let mut out = BTreeMap::new();
    for (rank, wanted) in description.send_cells() {
        let mut words = Vec::new();
        for (gid, npe) in wanted {
            let (zone, nodes) = connectivity.nodes_of(gid)?;
            if nodes.len() != npe {
                return Err(MeshPartError::NpeMismatch {
                    cell: gid,
                    expected: npe,
                    found: nodes.len(),
                });
            }
            words.push(WireWord::of(gid.get()));
            words.push(WireWord::of(zone as u64));
            words.extend(nodes.iter().map(|&n| WireWord::of(n)));
        }
        out.insert(rank, cast_slice(&words).to_vec());
    }
    Ok(out)
}

/// Both kinds of an adjacent pair must have a face with `found` nodes.
fn check_shared_count(
    holder: GlobalId,
    sharer: GlobalId,
    kinds: [ElementKind; 2],
    found: usize,
) -> Result<(), MeshPartError> {
    match kinds.into_iter().find(|k| !k.has_face_with(found)) {
        Some(kind) => Err(MeshPartError::SharedNodeCount {
            holder,
            sharer,
            kind,
            found,
        }),
        None => Ok(()),
    }
}

/// Nodes of `holder` also used by `sharer`, in the holder's order.
fn shared_nodes(
    holder_zone: usize,
    holder: &[u64],
    sharer_zone: usize,
    sharer: &[u64],
) -> Vec<u64> {
    if holder_zone != sharer_zone {
        return Vec::new();
    }
    holder
        .iter()
        .copied()
        .filter(|n| sharer.contains(n))
        .collect()
}

/// Send lists from our ghost-adjacency holders, receive lists from the
/// ghost registry, both in ascending GlobalId order.
fn halo_schedule<T: Scalar>(
    description: &PartitionDescription,
    local: &HashMap<GlobalId, LocalId>,
    ghosts: &GhostRegistry<T>,
) -> Result<HaloSchedule, MeshPartError> {
    let mut send = BTreeMap::new();
    for (rank, cells) in description.send_cells() {
        let ids = cells
            .keys()
            .map(|gid| local.get(gid).copied().ok_or(MeshPartError::UnknownCell(*gid)))
            .collect::<Result<Vec<_>, _>>()?;
        send.insert(rank, ids);
    }
    let mut recv = BTreeMap::new();
    for (rank, cells) in description.recv_cells() {
        let ids = cells
            .keys()
            .map(|&gid| ghosts.local_id(gid).ok_or(MeshPartError::UnknownCell(gid)))
            .collect::<Result<Vec<_>, _>>()?;
        recv.insert(rank, ids);
    }
    Ok(HaloSchedule::new(send, recv))
}

/// A schedule with the right list lengths but no cells, for a rank that
/// can no longer build its own but must still answer the handshake.
fn placeholder_schedule(description: &PartitionDescription) -> HaloSchedule {
    let lists = |m: BTreeMap<usize, BTreeMap<GlobalId, usize>>| -> BTreeMap<_, _> {
        m.into_iter()
            .map(|(rank, cells)| (rank, vec![LocalId::new(0); cells.len()]))
            .collect()
    };
    HaloSchedule::new(lists(description.send_cells()), lists(description.recv_cells()))
}

/// Post every send and receive of one setup phase, then drain them all.
///
/// `incoming` maps each sender to the exact byte count expected from it.
fn setup_exchange<C: Communicator>(
    comm: &C,
    tag: CommTag,
    outgoing: &BTreeMap<usize, Vec<u8>>,
    incoming: BTreeMap<usize, usize>,
) -> Result<BTreeMap<usize, Vec<u8>>, MeshPartError> {
    let sends: Vec<_> = outgoing
        .iter()
        .map(|(&rank, bytes)| comm.isend(rank, tag.as_u16(), bytes))
        .collect();
    let recvs: Vec<_> = incoming
        .into_iter()
        .map(|(rank, len)| {
            let mut buf = vec![0u8; len];
            (rank, len, comm.irecv(rank, tag.as_u16(), &mut buf))
        })
        .collect();

    let mut received = BTreeMap::new();
    let mut first_err = None;
    for (rank, len, h) in recvs {
        let data = h.wait();
        if first_err.is_some() {
            continue;
        }
        let checked = data
            .ok_or_else(|| "no setup message received".to_string())
            .and_then(|d| expect_exact_len(d.len(), len).map(|()| d));
        match checked {
            Ok(d) => {
                received.insert(rank, d);
            }
            Err(e) => {
                first_err = Some(MeshPartError::CommError {
                    neighbor: rank,
                    source: e.into(),
                });
            }
        }
    }
    for h in sends {
        h.wait();
    }
    match first_err {
        Some(e) => {
            log::warn!("setup tag {}: drained after error: {e}", tag.as_u16());
            Err(e)
        }
        None => Ok(received),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};
    use crate::io::mesh::{InMemoryMesh, SectionData, ZoneData};
    use crate::mesh_generation::{box_hexahedra, box_quadrangles};
    use crate::partitioning::description::LocalPair;
    use crate::partitioning::emit::describe;

    #[test]
    fn single_rank_quadrangles() {
        let mesh = box_quadrangles(3, 2, [3.0, 2.0]);
        let d = describe(&mesh, &[0; 6], 1).unwrap().remove(0);
        let part: Part<NoComm> = PartBuilder::new(PartConfig::default(), NoComm)
            .install_defaults(2)
            .build(&mesh, &d)
            .unwrap();
        assert_eq!(part.count_local_cells(), 6);
        assert_eq!(part.count_ghost_cells(), 0);
        assert_eq!(part.local_faces().len(), 7);
        assert_eq!(part.boundary_faces().len(), 10);
        assert!(part.local_cells().all(Cell::is_inner));
    }

    #[test]
    fn missing_prototype_is_reported() {
        let mesh = box_hexahedra(2, 1, 1, [2.0, 1.0, 1.0]);
        let d = describe(&mesh, &[0; 2], 1).unwrap().remove(0);
        let err = PartBuilder::<NoComm, f64>::new(PartConfig::default(), NoComm)
            .install_prototype(Prototype::cell(ElementKind::Hexahedron8))
            .build(&mesh, &d)
            .unwrap_err();
        assert_eq!(
            err,
            MeshPartError::MissingPrototype {
                role: "face",
                npe: 4
            }
        );
    }

    #[test]
    fn wrong_kind_for_node_count_is_rejected() {
        let mesh = box_quadrangles(2, 1, [2.0, 1.0]);
        let d = describe(&mesh, &[0; 2], 1).unwrap().remove(0);
        let err = PartBuilder::<NoComm, f64>::new(PartConfig::default(), NoComm)
            .install_defaults(2)
            .install_prototype(Prototype::cell(ElementKind::Tetrahedron4))
            .build(&mesh, &d)
            .unwrap_err();
        assert!(matches!(err, MeshPartError::InvalidMesh(_)));
    }

    #[test]
    fn bogus_adjacency_is_a_shared_node_error() {
        let mesh = box_quadrangles(3, 1, [3.0, 1.0]);
        let mut d = describe(&mesh, &[0; 3], 1).unwrap().remove(0);
        // cells 0 and 2 share no edge
        d.local_pairs[0].sharer = GlobalId::new(2);
        let err = PartBuilder::<NoComm, f64>::new(PartConfig::default(), NoComm)
            .install_defaults(2)
            .build(&mesh, &d)
            .unwrap_err();
        assert!(matches!(err, MeshPartError::SharedNodeCount { found: 0, .. }));
    }

    /// A unit hexahedron with a wedge standing on three of its top corners.
    fn wedge_on_hexahedron() -> InMemoryMesh {
        let mut coordinates = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ];
        coordinates.extend([[0.0, 0.0, 2.0], [1.0, 0.0, 2.0], [1.0, 1.0, 2.0]]);
        InMemoryMesh {
            name: "wedge-on-hex".into(),
            cell_dim: 3,
            phys_dim: 3,
            zones: vec![ZoneData {
                name: "zone".into(),
                node_ids: (0..11).map(GlobalId::new).collect(),
                coordinates,
                sections: vec![
                    SectionData {
                        name: "wedge".into(),
                        kind: ElementKind::Wedge6,
                        first: 1,
                        connectivity: vec![5, 6, 7, 9, 10, 11],
                        cell_ids: vec![GlobalId::new(0)],
                    },
                    SectionData {
                        name: "hex".into(),
                        kind: ElementKind::Hexahedron8,
                        first: 2,
                        connectivity: (1..=8).collect(),
                        cell_ids: vec![GlobalId::new(1)],
                    },
                ],
            }],
        }
    }

    #[test]
    fn sharer_kind_must_have_the_shared_face() {
        let mesh = wedge_on_hexahedron();
        let mut d = describe(&mesh, &[0, 0], 1).unwrap().remove(0);
        assert!(d.local_pairs.is_empty());
        // the wedge has a three-node face, the hexahedron does not
        d.local_pairs.push(LocalPair {
            holder: GlobalId::new(0),
            sharer: GlobalId::new(1),
        });
        let err = PartBuilder::<NoComm, f64>::new(PartConfig::default(), NoComm)
            .install_defaults(3)
            .build(&mesh, &d)
            .unwrap_err();
        assert_eq!(
            err,
            MeshPartError::SharedNodeCount {
                holder: GlobalId::new(0),
                sharer: GlobalId::new(1),
                kind: ElementKind::Hexahedron8,
                found: 3,
            }
        );
    }

    #[test]
    fn setup_exchange_reports_wrong_sizes_after_draining() {
        let comms = LocalComm::universe(2);
        let tag = CommTag::new(9);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                std::thread::spawn(move || {
                    let peer = 1 - c.rank();
                    let out = BTreeMap::from([(peer, vec![1u8; 8])]);
                    // rank 1 expects more than rank 0 sends
                    let want = if c.rank() == 1 { 16 } else { 8 };
                    setup_exchange(&c, tag, &out, BTreeMap::from([(peer, want)]))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results[0].as_ref().unwrap()[&1], vec![1u8; 8]);
        assert!(matches!(
            results[1],
            Err(MeshPartError::CommError { neighbor: 0, .. })
        ));
    }
}
