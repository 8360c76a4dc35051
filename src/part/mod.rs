//! The partitioned mesh of one rank: local cells, ghost cells, faces, and
//! the halo exchange that keeps ghosts current.
//!
//! A [`Part`] is created once by [`PartBuilder::build`] and is immutable in
//! shape afterwards; only coefficient blocks change. Local cells occupy
//! LocalIds `[0, n_local)` section by section, ghosts follow in ascending
//! GlobalId order. Faces are numbered local first, then ghost, then
//! boundary.
//!
//! ```no_run
//! # use mesh_part::prelude::*;
//! # fn step(
//! #     mesh: &InMemoryMesh,
//! #     d: &PartitionDescription,
//! #     comm: LocalComm,
//! # ) -> Result<(), MeshPartError> {
//! let mut part: Part<LocalComm> = PartBuilder::new(PartConfig::default(), comm)
//!     .install_defaults(3)
//!     .build(mesh, d)?;
//! part.share_coefficients()?;
//! // work on inner cells while the halo is in flight
//! part.update_coefficients()?;
//! # Ok(()) }
//! ```

pub mod builder;
pub mod cell;
pub mod face;
pub mod ghost;

pub use builder::PartBuilder;
pub use cell::Cell;
pub use face::Face;
pub use ghost::GhostRegistry;

use crate::algs::communicator::{CommTag, Communicator, SetupTags};
use crate::algs::halo::{HaloChannel, HaloSchedule};
use crate::data::{BoundarySection, Connectivity, CoordinateStore, Scalar, Section};
use crate::geometry::vector::Global;
use crate::io::frame::{BincodeFrameCodec, Frame, FrameCodec, FrameField, FrameNode, FrameSection};
use crate::io::mesh::BaseInfo;
use crate::mesh_error::MeshPartError;
use crate::topology::ids::{FaceId, GlobalId, LocalId};
use hashbrown::HashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Settings threaded through construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartConfig {
    /// Root of `partition/` descriptions and checkpoint frames.
    pub directory: PathBuf,
    /// Width of every cell's coefficient block.
    pub fields_per_cell: usize,
    /// Field names used in frames; missing names default to `field{i}`.
    pub field_names: Vec<String>,
    /// Exchange GlobalIds with every neighbour after setup and fail on any
    /// disagreement in halo order.
    pub verify_halo_order: bool,
    /// First of the consecutive tags used by setup and halo channels.
    pub base_tag: CommTag,
}

impl Default for PartConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            fields_per_cell: 1,
            field_names: Vec::new(),
            verify_halo_order: true,
            base_tag: CommTag::new(100),
        }
    }
}

impl PartConfig {
    pub fn field_name(&self, i_field: usize) -> String {
        self.field_names
            .get(i_field)
            .cloned()
            .unwrap_or_else(|| format!("field{i_field}"))
    }
}

/// One rank's share of the mesh.
pub struct Part<C: Communicator, T: Scalar = f64> {
    comm: C,
    config: PartConfig,
    tags: SetupTags,
    base: BaseInfo,
    coordinates: CoordinateStore,
    connectivity: Connectivity,
    sections: Vec<Section<T>>,
    cells: Vec<Cell<T>>,
    local_by_gid: HashMap<GlobalId, LocalId>,
    ghosts: GhostRegistry<T>,
    faces: Vec<Face>,
    n_local_faces: usize,
    n_ghost_faces: usize,
    boundary_sections: Vec<BoundarySection>,
    boundaries: BTreeMap<String, Vec<FaceId>>,
    schedule: HaloSchedule,
    coefficients: HaloChannel<C, T>,
    next_channel: u16,
}

impl<C: Communicator, T: Scalar> std::fmt::Debug for Part<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Part")
            .field("rank", &self.rank())
            .field("cells", &self.cells.len())
            .field("ghosts", &self.ghosts.len())
            .field("faces", &self.faces.len())
            .finish()
    }
}

impl<C: Communicator, T: Scalar> Part<C, T> {
    #[inline]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.comm.size()
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn config(&self) -> &PartConfig {
        &self.config
    }

    pub fn base(&self) -> &BaseInfo {
        &self.base
    }

    pub fn coordinates(&self) -> &CoordinateStore {
        &self.coordinates
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn sections(&self) -> &[Section<T>] {
        &self.sections
    }

    pub fn schedule(&self) -> &HaloSchedule {
        &self.schedule
    }

    // ----- cells -------------------------------------------------------------

    #[inline]
    pub fn count_local_cells(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn count_ghost_cells(&self) -> usize {
        self.ghosts.len()
    }

    pub fn local_cells(&self) -> std::slice::Iter<'_, Cell<T>> {
        self.cells.iter()
    }

    pub fn local_cells_mut(&mut self) -> std::slice::IterMut<'_, Cell<T>> {
        self.cells.iter_mut()
    }

    /// Local cells with no ghost neighbour; safe to update while a halo
    /// exchange is in flight.
    pub fn inner_cells(&self) -> impl Iterator<Item = &Cell<T>> {
        self.cells.iter().filter(|c| c.is_inner())
    }

    pub fn inter_cells(&self) -> impl Iterator<Item = &Cell<T>> {
        self.cells.iter().filter(|c| c.is_inter())
    }

    pub fn ghost_cells(&self) -> std::slice::Iter<'_, Cell<T>> {
        self.ghosts.iter()
    }

    /// GlobalIds of every ghost, ascending.
    pub fn ghost_keys(&self) -> impl Iterator<Item = GlobalId> + '_ {
        self.ghosts.keys()
    }

    /// Local or ghost cell by LocalId.
    pub fn cell(&self, id: LocalId) -> Option<&Cell<T>> {
        self.cells.get(id.get()).or_else(|| self.ghosts.get(id))
    }

    pub fn cell_mut(&mut self, id: LocalId) -> Option<&mut Cell<T>> {
        if id.get() < self.cells.len() {
            self.cells.get_mut(id.get())
        } else {
            self.ghosts.get_mut(id)
        }
    }

    pub fn local_by_global(&self, gid: GlobalId) -> Option<&Cell<T>> {
        self.local_by_gid.get(&gid).map(|id| &self.cells[id.get()])
    }

    pub fn ghost_by_global(&self, gid: GlobalId) -> Option<&Cell<T>> {
        self.ghosts.by_global(gid)
    }

    // ----- faces -------------------------------------------------------------

    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id.get())
    }

    /// Faces between two local cells.
    pub fn local_faces(&self) -> &[Face] {
        &self.faces[..self.n_local_faces]
    }

    /// Faces between a local holder and a ghost sharer.
    pub fn ghost_faces(&self) -> &[Face] {
        &self.faces[self.n_local_faces..self.n_local_faces + self.n_ghost_faces]
    }

    pub fn boundary_faces(&self) -> &[Face] {
        &self.faces[self.n_local_faces + self.n_ghost_faces..]
    }

    /// Boundary faces of a named section. Names of sections present in the
    /// mesh but without faces on this rank yield nothing.
    pub fn boundary_faces_of(
        &self,
        name: &str,
    ) -> Result<impl Iterator<Item = &Face>, MeshPartError> {
        let ids = self
            .boundaries
            .get(name)
            .ok_or_else(|| MeshPartError::UnknownBoundary(name.to_owned()))?;
        Ok(ids.iter().map(|id| &self.faces[id.get()]))
    }

    pub fn boundary_names(&self) -> impl Iterator<Item = &str> {
        self.boundaries.keys().map(String::as_str)
    }

    pub fn boundary_sections(&self) -> &[BoundarySection] {
        &self.boundary_sections
    }

    // ----- halo exchange -----------------------------------------------------

    /// Post the coefficient blocks of every sent cell. Pair with
    /// [`update_coefficients`](Self::update_coefficients).
    pub fn share_coefficients(&mut self) -> Result<(), MeshPartError> {
        let cells = &self.cells;
        self.coefficients
            .share(&self.comm, &self.schedule, |id, slot| {
                slot.copy_from_slice(cells[id.get()].coefficients())
            })
    }

    /// Wait for the coefficient exchange and refresh every ghost.
    pub fn update_coefficients(&mut self) -> Result<(), MeshPartError> {
        let ghosts = &mut self.ghosts;
        self.coefficients.update(&self.schedule, |id, slot| {
            if let Some(g) = ghosts.get_mut(id) {
                g.coefficients_mut().copy_from_slice(slot);
            }
        })
    }

    /// A new channel carrying `width` scalars per cell, on its own tag.
    ///
    /// Channel tags count up from the coefficient channel and never wrap
    /// back into the setup tags.
    pub fn open_channel(&mut self, width: usize) -> Result<HaloChannel<C, T>, MeshPartError> {
        let tag = self
            .tags
            .channels
            .checked_offset(self.next_channel)
            .ok_or(MeshPartError::ChannelTagsExhausted)?;
        self.next_channel = self
            .next_channel
            .checked_add(1)
            .ok_or(MeshPartError::ChannelTagsExhausted)?;
        Ok(HaloChannel::new(&self.schedule, width, tag))
    }

    /// Start `channel`, filling each sent cell's slot with `pack`.
    pub fn share_with<F>(
        &self,
        channel: &mut HaloChannel<C, T>,
        mut pack: F,
    ) -> Result<(), MeshPartError>
    where
        F: FnMut(&Cell<T>, &mut [T]),
    {
        let cells = &self.cells;
        channel.share(&self.comm, &self.schedule, |id, slot| pack(&cells[id.get()], slot))
    }

    /// Finish `channel`, handing each ghost its received slot.
    pub fn update_with<F>(
        &mut self,
        channel: &mut HaloChannel<C, T>,
        mut unpack: F,
    ) -> Result<(), MeshPartError>
    where
        F: FnMut(&mut Cell<T>, &[T]),
    {
        let ghosts = &mut self.ghosts;
        channel.update(&self.schedule, |id, slot| {
            if let Some(g) = ghosts.get_mut(id) {
                unpack(g, slot);
            }
        })
    }

    // ----- field operations --------------------------------------------------

    /// Scalars per cell in gathered buffers.
    #[inline]
    pub fn cell_data_len(&self) -> usize {
        self.config.fields_per_cell
    }

    /// Offset of a local cell's block in gathered buffers.
    #[inline]
    pub fn cell_data_offset(&self, id: LocalId) -> usize {
        id.get() * self.cell_data_len()
    }

    /// Every local coefficient block, concatenated in LocalId order.
    pub fn gather_coefficients(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.cells.len() * self.cell_data_len());
        for c in &self.cells {
            out.extend_from_slice(c.coefficients());
        }
        out
    }

    /// Inverse of [`gather_coefficients`](Self::gather_coefficients).
    pub fn scatter_coefficients(&mut self, values: &[T]) -> Result<(), MeshPartError> {
        let w = self.cell_data_len();
        let expected = self.cells.len() * w;
        if values.len() != expected {
            return Err(MeshPartError::PayloadLength {
                expected,
                found: values.len(),
            });
        }
        if w == 0 {
            return Ok(());
        }
        for (cell, block) in self.cells.iter_mut().zip(values.chunks_exact(w)) {
            cell.coefficients_mut().copy_from_slice(block);
        }
        Ok(())
    }

    /// Copy coefficients into the per-section field arrays.
    pub fn gather_fields(&mut self) {
        let cells = &self.cells;
        for section in &mut self.sections {
            let ids: Vec<LocalId> = section.local_ids().collect();
            for i_field in 0..section.count_fields() {
                let field = section.field_mut(i_field);
                for (k, id) in ids.iter().enumerate() {
                    field[k] = cells[id.get()].coefficients()[i_field];
                }
            }
        }
    }

    /// Copy the per-section field arrays back into coefficients.
    pub fn scatter_fields(&mut self) {
        for section in &self.sections {
            for (k, id) in section.local_ids().enumerate() {
                let block = self.cells[id.get()].coefficients_mut();
                for (i_field, field) in section.fields().iter().enumerate() {
                    block[i_field] = field[k];
                }
            }
        }
    }

    /// `∫ f` over every local cell.
    pub fn measure_integral<F: Fn(Global) -> f64>(&self, f: F) -> f64 {
        self.cells.iter().map(|c| c.integrator().integrate(&f)).sum()
    }

    /// Total measure of the local cells.
    pub fn volume(&self) -> f64 {
        self.cells.iter().map(Cell::volume).sum()
    }

    // ----- frames ------------------------------------------------------------

    /// Write a checkpoint through `codec`.
    pub fn write_frame_with<K: FrameCodec<T>>(
        &mut self,
        codec: &K,
        frame_name: &str,
    ) -> Result<(), MeshPartError> {
        self.gather_fields();
        let nodes = self
            .coordinates
            .owned_nodes()
            .map(|(index, gid, xyz)| FrameNode {
                zone: index.zone,
                node: index.node,
                gid,
                xyz,
            })
            .collect();
        let sections = self
            .sections
            .iter()
            .zip(self.connectivity.blocks())
            .map(|(s, block)| FrameSection {
                zone: s.zone,
                section: s.section,
                name: s.name.clone(),
                kind: s.kind,
                head: s.head,
                tail: s.tail,
                connectivity: (0..block.len())
                    .flat_map(|i| block.nodes_of(i).iter().copied())
                    .collect(),
                fields: s
                    .fields()
                    .iter()
                    .enumerate()
                    .map(|(i, values)| FrameField {
                        name: self.config.field_name(i),
                        values: values.clone(),
                    })
                    .collect(),
            })
            .collect();
        codec.write(
            frame_name,
            &Frame {
                rank: self.rank(),
                nodes,
                sections,
            },
        )
    }

    /// Read a checkpoint written by the same partition through `codec`.
    pub fn read_frame_with<K: FrameCodec<T>>(
        &mut self,
        codec: &K,
        frame_name: &str,
    ) -> Result<(), MeshPartError> {
        let frame = codec.read(frame_name, self.rank())?;
        if frame.sections.len() != self.sections.len() {
            return Err(MeshPartError::FrameCodec(format!(
                "frame `{frame_name}` has {} sections, rank {} has {}",
                frame.sections.len(),
                self.rank(),
                self.sections.len()
            )));
        }
        for (mine, theirs) in self.sections.iter_mut().zip(&frame.sections) {
            if (mine.zone, mine.section, mine.head, mine.tail)
                != (theirs.zone, theirs.section, theirs.head, theirs.tail)
            {
                return Err(MeshPartError::FrameCodec(format!(
                    "frame `{frame_name}` section `{}` [{}, {}) does not match [{}, {})",
                    theirs.name, theirs.head, theirs.tail, mine.head, mine.tail
                )));
            }
            for i_field in 0..mine.count_fields() {
                let name = self.config.field_name(i_field);
                let field = theirs
                    .fields
                    .iter()
                    .find(|f| f.name == name)
                    .ok_or_else(|| {
                        MeshPartError::FrameCodec(format!(
                            "frame `{frame_name}` lacks field `{name}`"
                        ))
                    })?;
                let dst = mine.field_mut(i_field);
                if field.values.len() != dst.len() {
                    return Err(MeshPartError::PayloadLength {
                        expected: dst.len(),
                        found: field.values.len(),
                    });
                }
                dst.copy_from_slice(&field.values);
            }
        }
        self.scatter_fields();
        Ok(())
    }
}

impl<C: Communicator, T: Scalar + Serialize + DeserializeOwned> Part<C, T> {
    /// Write a checkpoint with the default codec under `config.directory`.
    pub fn write_frame(&mut self, frame_name: &str) -> Result<(), MeshPartError> {
        let codec = BincodeFrameCodec::new(&self.config.directory);
        self.write_frame_with(&codec, frame_name)
    }

    pub fn read_frame(&mut self, frame_name: &str) -> Result<(), MeshPartError> {
        let codec = BincodeFrameCodec::new(&self.config.directory);
        self.read_frame_with(&codec, frame_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::mesh_generation::{BOUNDARY_X_MIN, box_hexahedra, box_quadrangles};
    use crate::partitioning::emit::describe;

    fn serial_box(fields: usize) -> Part<NoComm> {
        let mesh = box_hexahedra(3, 2, 2, [3.0, 2.0, 2.0]);
        let d = describe(&mesh, &[0; 12], 1).unwrap().remove(0);
        let config = PartConfig {
            fields_per_cell: fields,
            ..PartConfig::default()
        };
        PartBuilder::new(config, NoComm)
            .install_defaults(3)
            .build(&mesh, &d)
            .unwrap()
    }

    #[test]
    fn channel_tags_stop_at_the_top_of_the_tag_space() {
        let mut part = serial_box(1);
        part.next_channel = u16::MAX - part.tags.channels.as_u16();
        let last = part.open_channel(1).unwrap();
        assert_eq!(last.tag(), CommTag::new(u16::MAX));
        assert_eq!(
            part.open_channel(1).err(),
            Some(MeshPartError::ChannelTagsExhausted)
        );
    }

    #[test]
    fn serial_part_has_faces_everywhere() {
        let part = serial_box(1);
        assert_eq!(part.count_local_cells(), 12);
        assert!(part.ghost_faces().is_empty());
        // 2*2*2 + 3*1*2 + 3*2*1 interior faces
        assert_eq!(part.local_faces().len(), 8 + 6 + 6);
        assert_eq!(part.boundary_faces().len(), 2 * (4 + 6 + 6));
        assert_eq!(part.boundary_faces_of(BOUNDARY_X_MIN).unwrap().count(), 4);
        assert!((part.volume() - 12.0).abs() < 1e-9);
        assert!((part.measure_integral(|x| x[0]) - 18.0).abs() < 1e-9);
        for f in part.boundary_faces() {
            let holder = part.cell(f.holder()).unwrap();
            assert!(f.outward_measure(holder) > 0.0);
        }
    }

    #[test]
    fn unknown_boundary_is_an_error() {
        let part = serial_box(1);
        assert!(matches!(
            part.boundary_faces_of("inlet").map(|it| it.count()),
            Err(MeshPartError::UnknownBoundary(_))
        ));
        let names: Vec<&str> = part.boundary_names().collect();
        assert_eq!(names, ["xmax", "xmin", "ymax", "ymin", "zmax", "zmin"]);
    }

    #[test]
    fn adjacency_is_symmetric() {
        let part = serial_box(1);
        for c in part.local_cells() {
            for (&n, &f) in c.adjacent_cells().iter().zip(c.adjacent_faces()) {
                let other = part.cell(n).unwrap();
                assert!(other.adjacent_cells().contains(&c.id()));
                let face = part.face(f).unwrap();
                assert!(face.holder() == c.id() || face.sharer() == Some(c.id()));
            }
        }
    }

    #[test]
    fn gather_scatter_and_fields() {
        let mut part = serial_box(2);
        let values: Vec<f64> = (0..24).map(f64::from).collect();
        part.scatter_coefficients(&values).unwrap();
        assert_eq!(part.gather_coefficients(), values);
        assert_eq!(part.cell_data_offset(LocalId::new(5)), 10);
        part.gather_fields();
        assert_eq!(part.sections()[0].field(1)[3], 7.0);
        part.scatter_coefficients(&[0.0; 24]).unwrap();
        part.scatter_fields();
        assert_eq!(part.gather_coefficients(), values);
        assert_eq!(
            part.scatter_coefficients(&[1.0; 3]),
            Err(MeshPartError::PayloadLength {
                expected: 24,
                found: 3
            })
        );
    }

    #[test]
    fn frames_round_trip() {
        let dir =
            std::env::temp_dir().join(format!("mesh-part-part-frames-{}", std::process::id()));
        let mesh = box_quadrangles(2, 2, [1.0, 1.0]);
        let d = describe(&mesh, &[0; 4], 1).unwrap().remove(0);
        let config = PartConfig {
            directory: dir.clone(),
            fields_per_cell: 2,
            field_names: vec!["rho".into()],
            ..PartConfig::default()
        };
        let mut part: Part<NoComm> = PartBuilder::new(config, NoComm)
            .install_defaults(2)
            .build(&mesh, &d)
            .unwrap();
        let values: Vec<f64> = (0..8).map(|i| 0.1 * f64::from(i)).collect();
        part.scatter_coefficients(&values).unwrap();
        part.write_frame("t0").unwrap();
        part.scatter_coefficients(&[0.0; 8]).unwrap();
        part.read_frame("t0").unwrap();
        assert_eq!(part.gather_coefficients(), values);
        assert!(part.read_frame("missing").is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn config_defaults_fill_missing_keys() {
        let c: PartConfig = serde_json::from_str(r#"{"fields_per_cell": 4}"#).unwrap();
        assert_eq!(c.fields_per_cell, 4);
        assert!(c.verify_halo_order);
        assert_eq!(c.base_tag, CommTag::new(100));
        assert_eq!(c.field_name(2), "field2");
    }
}
