//! Globally consistent mesh description, read by ranges.
//!
//! A rank never loads a whole mesh through this trait: it asks only for the
//! node ranges and element ranges its partition description names. Node and
//! element numbers are 1-based within a zone, element numbers run across the
//! zone's sections, and ranges are half-open `[head, tail)`.

use crate::geometry::vector::Global;
use crate::mesh_error::MeshPartError;
use crate::topology::element::ElementKind;
use crate::topology::ids::GlobalId;
use serde::{Deserialize, Serialize};

/// Mesh-wide dimensions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseInfo {
    pub name: String,
    pub cell_dim: usize,
    pub phys_dim: usize,
}

/// A section header: one element kind over the elements `first..=last`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub name: String,
    pub kind: ElementKind,
    pub first: u64,
    pub last: u64,
}

impl SectionInfo {
    #[inline]
    pub fn has(&self, element: u64) -> bool {
        self.first <= element && element <= self.last
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.last + 1 - self.first
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }
}

/// Range-read access to a mesh stored outside this rank.
pub trait MeshSource {
    fn base(&self) -> Result<BaseInfo, MeshPartError>;
    fn count_zones(&self) -> Result<usize, MeshPartError>;
    fn zone_name(&self, zone: usize) -> Result<String, MeshPartError>;
    fn count_nodes(&self, zone: usize) -> Result<u64, MeshPartError>;
    fn count_sections(&self, zone: usize) -> Result<usize, MeshPartError>;
    fn section_info(&self, zone: usize, section: usize) -> Result<SectionInfo, MeshPartError>;

    /// Coordinates of nodes `[head, tail)`.
    fn read_coordinates(&self, zone: usize, head: u64, tail: u64)
    -> Result<Vec<Global>, MeshPartError>;
    /// GlobalIds of nodes `[head, tail)`.
    fn read_node_ids(&self, zone: usize, head: u64, tail: u64)
    -> Result<Vec<GlobalId>, MeshPartError>;
    /// Flattened node lists (`npe` entries each) of elements `[head, tail)`.
    fn read_connectivity(
        &self,
        zone: usize,
        section: usize,
        head: u64,
        tail: u64,
    ) -> Result<Vec<u64>, MeshPartError>;
    /// GlobalIds of cells `[head, tail)` of a cell section.
    fn read_cell_ids(
        &self,
        zone: usize,
        section: usize,
        head: u64,
        tail: u64,
    ) -> Result<Vec<GlobalId>, MeshPartError>;
}

/// One section of an [`InMemoryMesh`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionData {
    pub name: String,
    pub kind: ElementKind,
    /// Number of this section's first element.
    pub first: u64,
    pub connectivity: Vec<u64>,
    /// Empty for boundary-face sections.
    pub cell_ids: Vec<GlobalId>,
}

impl SectionData {
    pub fn count(&self) -> u64 {
        (self.connectivity.len() / self.kind.npe()) as u64
    }

    pub fn info(&self) -> SectionInfo {
        SectionInfo {
            name: self.name.clone(),
            kind: self.kind,
            first: self.first,
            last: self.first + self.count() - 1,
        }
    }

    /// Node list of element `element`.
    pub fn nodes_of(&self, element: u64) -> &[u64] {
        let npe = self.kind.npe();
        let i = (element - self.first) as usize;
        &self.connectivity[i * npe..(i + 1) * npe]
    }
}

/// One zone of an [`InMemoryMesh`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneData {
    pub name: String,
    pub coordinates: Vec<Global>,
    pub node_ids: Vec<GlobalId>,
    pub sections: Vec<SectionData>,
}

/// A whole mesh held in memory; used by emitters, tests and small runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InMemoryMesh {
    pub name: String,
    pub cell_dim: usize,
    pub phys_dim: usize,
    pub zones: Vec<ZoneData>,
}

impl InMemoryMesh {
    /// Zone `zone` (1-based).
    pub fn zone(&self, zone: usize) -> Result<&ZoneData, MeshPartError> {
        zone.checked_sub(1)
            .and_then(|z| self.zones.get(z))
            .ok_or_else(|| MeshPartError::MeshIo(format!("no zone {zone}")))
    }

    /// Section `section` (1-based) of zone `zone`.
    pub fn section(&self, zone: usize, section: usize) -> Result<&SectionData, MeshPartError> {
        self.zone(zone)?
            .sections
            .get(section.wrapping_sub(1))
            .ok_or_else(|| MeshPartError::MeshIo(format!("no section {section} in zone {zone}")))
    }

    /// Whether sections of `kind` hold cells (as opposed to boundary faces).
    pub fn is_cell_kind(&self, kind: ElementKind) -> bool {
        kind.dimension() == self.cell_dim
    }

    pub fn count_cells(&self) -> usize {
        self.zones
            .iter()
            .flat_map(|z| &z.sections)
            .filter(|s| self.is_cell_kind(s.kind))
            .map(|s| s.count() as usize)
            .sum()
    }

    /// Check array lengths and element numbering.
    pub fn validate(&self) -> Result<(), MeshPartError> {
        for (z, zone) in self.zones.iter().enumerate() {
            if zone.node_ids.len() != zone.coordinates.len() {
                return Err(MeshPartError::InvalidMesh(format!(
                    "zone {}: {} node ids for {} nodes",
                    z + 1,
                    zone.node_ids.len(),
                    zone.coordinates.len()
                )));
            }
            let n_nodes = zone.coordinates.len() as u64;
            let mut next = 1;
            for (s, sect) in zone.sections.iter().enumerate() {
                let ctx = || format!("zone {} section {}", z + 1, s + 1);
                if sect.first != next {
                    return Err(MeshPartError::InvalidMesh(format!(
                        "{}: starts at element {}, expected {next}",
                        ctx(),
                        sect.first
                    )));
                }
                if sect.connectivity.len() % sect.kind.npe() != 0 {
                    return Err(MeshPartError::InvalidMesh(format!(
                        "{}: ragged connectivity",
                        ctx()
                    )));
                }
                if let Some(bad) = sect.connectivity.iter().find(|&&n| n == 0 || n > n_nodes) {
                    return Err(MeshPartError::InvalidMesh(format!(
                        "{}: node {bad} out of range",
                        ctx()
                    )));
                }
                let is_cell = self.is_cell_kind(sect.kind);
                if is_cell && sect.cell_ids.len() as u64 != sect.count() {
                    return Err(MeshPartError::InvalidMesh(format!(
                        "{}: {} cell ids for {} cells",
                        ctx(),
                        sect.cell_ids.len(),
                        sect.count()
                    )));
                }
                next += sect.count();
            }
        }
        Ok(())
    }
}

fn check_range(
    what: &str,
    head: u64,
    tail: u64,
    first: u64,
    end: u64,
) -> Result<(), MeshPartError> {
    if head < first || tail > end || head > tail {
        return Err(MeshPartError::MeshIo(format!(
            "{what} range [{head}, {tail}) outside [{first}, {end})"
        )));
    }
    Ok(())
}

impl MeshSource for InMemoryMesh {
    fn base(&self) -> Result<BaseInfo, MeshPartError> {
        Ok(BaseInfo {
            name: self.name.clone(),
            cell_dim: self.cell_dim,
            phys_dim: self.phys_dim,
        })
    }

    fn count_zones(&self) -> Result<usize, MeshPartError> {
        Ok(self.zones.len())
    }

    fn zone_name(&self, zone: usize) -> Result<String, MeshPartError> {
        Ok(self.zone(zone)?.name.clone())
    }

    fn count_nodes(&self, zone: usize) -> Result<u64, MeshPartError> {
        Ok(self.zone(zone)?.coordinates.len() as u64)
    }

    fn count_sections(&self, zone: usize) -> Result<usize, MeshPartError> {
        Ok(self.zone(zone)?.sections.len())
    }

    fn section_info(&self, zone: usize, section: usize) -> Result<SectionInfo, MeshPartError> {
        Ok(self.section(zone, section)?.info())
    }

    fn read_coordinates(
        &self,
        zone: usize,
        head: u64,
        tail: u64,
    ) -> Result<Vec<Global>, MeshPartError> {
        let z = self.zone(zone)?;
        check_range("node", head, tail, 1, z.coordinates.len() as u64 + 1)?;
        Ok(z.coordinates[(head - 1) as usize..(tail - 1) as usize].to_vec())
    }

    fn read_node_ids(
        &self,
        zone: usize,
        head: u64,
        tail: u64,
    ) -> Result<Vec<GlobalId>, MeshPartError> {
        let z = self.zone(zone)?;
        check_range("node", head, tail, 1, z.node_ids.len() as u64 + 1)?;
        Ok(z.node_ids[(head - 1) as usize..(tail - 1) as usize].to_vec())
    }

    fn read_connectivity(
        &self,
        zone: usize,
        section: usize,
        head: u64,
        tail: u64,
    ) -> Result<Vec<u64>, MeshPartError> {
        let s = self.section(zone, section)?;
        check_range("element", head, tail, s.first, s.first + s.count())?;
        let npe = s.kind.npe();
        let lo = (head - s.first) as usize * npe;
        let hi = (tail - s.first) as usize * npe;
        Ok(s.connectivity[lo..hi].to_vec())
    }

    fn read_cell_ids(
        &self,
        zone: usize,
        section: usize,
        head: u64,
        tail: u64,
    ) -> Result<Vec<GlobalId>, MeshPartError> {
        let s = self.section(zone, section)?;
        if s.cell_ids.is_empty() {
            return Err(MeshPartError::MeshIo(format!(
                "section `{}` carries no cell ids",
                s.name
            )));
        }
        check_range("cell", head, tail, s.first, s.first + s.count())?;
        let lo = (head - s.first) as usize;
        let hi = (tail - s.first) as usize;
        Ok(s.cell_ids[lo..hi].to_vec())
    }
}
