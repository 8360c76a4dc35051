//! Structured mesh generators with named boundary sections.
//!
//! Cells are numbered x-major (`ix` slowest), so splitting along x gives
//! every rank one contiguous element range per section. Boundary faces are
//! numbered the same way within each side.

use crate::geometry::vector::Global;
use crate::io::mesh::{InMemoryMesh, SectionData, ZoneData};
use crate::topology::element::ElementKind;
use crate::topology::ids::GlobalId;

/// Boundary section name for the minimum-x side.
pub const BOUNDARY_X_MIN: &str = "xmin";
/// Boundary section name for the maximum-x side.
pub const BOUNDARY_X_MAX: &str = "xmax";
/// Boundary section name for the minimum-y side.
pub const BOUNDARY_Y_MIN: &str = "ymin";
/// Boundary section name for the maximum-y side.
pub const BOUNDARY_Y_MAX: &str = "ymax";
/// Boundary section name for the minimum-z side.
pub const BOUNDARY_Z_MIN: &str = "zmin";
/// Boundary section name for the maximum-z side.
pub const BOUNDARY_Z_MAX: &str = "zmax";

/// Appends sections to a zone, numbering elements consecutively.
struct SectionSink {
    sections: Vec<SectionData>,
    next: u64,
}

impl SectionSink {
    fn new() -> Self {
        Self {
            sections: Vec::new(),
            next: 1,
        }
    }

    fn push(
        &mut self,
        name: &str,
        kind: ElementKind,
        connectivity: Vec<u64>,
        cell_ids: Vec<GlobalId>,
    ) {
        let data = SectionData {
            name: name.to_owned(),
            kind,
            first: self.next,
            connectivity,
            cell_ids,
        };
        self.next += data.count();
        self.sections.push(data);
    }
}

/// `nx * ny * nz` hexahedra filling `[0, lx] x [0, ly] x [0, lz]`.
///
/// Cell GlobalId `ix * ny * nz + iy * nz + iz`; node GlobalIds follow the
/// same x-major pattern over the `(nx + 1) * (ny + 1) * (nz + 1)` nodes.
pub fn box_hexahedra(nx: usize, ny: usize, nz: usize, lengths: Global) -> InMemoryMesh {
    let node = |i: usize, j: usize, k: usize| ((i * (ny + 1) + j) * (nz + 1) + k + 1) as u64;
    let mut coordinates = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for i in 0..=nx {
        for j in 0..=ny {
            for k in 0..=nz {
                coordinates.push([
                    lengths[0] * i as f64 / nx as f64,
                    lengths[1] * j as f64 / ny as f64,
                    lengths[2] * k as f64 / nz as f64,
                ]);
            }
        }
    }

    let mut hexa = Vec::with_capacity(8 * nx * ny * nz);
    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                hexa.extend([
                    node(i, j, k),
                    node(i + 1, j, k),
                    node(i + 1, j + 1, k),
                    node(i, j + 1, k),
                    node(i, j, k + 1),
                    node(i + 1, j, k + 1),
                    node(i + 1, j + 1, k + 1),
                    node(i, j + 1, k + 1),
                ]);
            }
        }
    }

    let mut sink = SectionSink::new();
    let n_cells = (nx * ny * nz) as u64;
    sink.push(
        "fluid",
        ElementKind::Hexahedron8,
        hexa,
        (0..n_cells).map(GlobalId::new).collect(),
    );

    let quad = ElementKind::Quadrangle4;
    let (mut xmin, mut xmax) = (Vec::new(), Vec::new());
    for j in 0..ny {
        for k in 0..nz {
            xmin.extend([
                node(0, j, k),
                node(0, j, k + 1),
                node(0, j + 1, k + 1),
                node(0, j + 1, k),
            ]);
            xmax.extend([
                node(nx, j, k),
                node(nx, j + 1, k),
                node(nx, j + 1, k + 1),
                node(nx, j, k + 1),
            ]);
        }
    }
    let (mut ymin, mut ymax, mut zmin, mut zmax) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for i in 0..nx {
        for k in 0..nz {
            ymin.extend([
                node(i, 0, k),
                node(i + 1, 0, k),
                node(i + 1, 0, k + 1),
                node(i, 0, k + 1),
            ]);
            ymax.extend([
                node(i, ny, k),
                node(i, ny, k + 1),
                node(i + 1, ny, k + 1),
                node(i + 1, ny, k),
            ]);
        }
        for j in 0..ny {
            zmin.extend([
                node(i, j, 0),
                node(i, j + 1, 0),
                node(i + 1, j + 1, 0),
                node(i + 1, j, 0),
            ]);
            zmax.extend([
                node(i, j, nz),
                node(i + 1, j, nz),
                node(i + 1, j + 1, nz),
                node(i, j + 1, nz),
            ]);
        }
    }
    for (name, faces) in [
        (BOUNDARY_X_MIN, xmin),
        (BOUNDARY_X_MAX, xmax),
        (BOUNDARY_Y_MIN, ymin),
        (BOUNDARY_Y_MAX, ymax),
        (BOUNDARY_Z_MIN, zmin),
        (BOUNDARY_Z_MAX, zmax),
    ] {
        sink.push(name, quad, faces, Vec::new());
    }

    let n_nodes = coordinates.len() as u64;
    InMemoryMesh {
        name: "box".into(),
        cell_dim: 3,
        phys_dim: 3,
        zones: vec![ZoneData {
            name: "zone".into(),
            coordinates,
            node_ids: (0..n_nodes).map(GlobalId::new).collect(),
            sections: sink.sections,
        }],
    }
}

/// `nx * ny` quadrangles filling `[0, lx] x [0, ly]`, counter-clockwise.
pub fn box_quadrangles(nx: usize, ny: usize, lengths: [f64; 2]) -> InMemoryMesh {
    let node = |i: usize, j: usize| (i * (ny + 1) + j + 1) as u64;
    let mut coordinates = Vec::with_capacity((nx + 1) * (ny + 1));
    for i in 0..=nx {
        for j in 0..=ny {
            coordinates.push([
                lengths[0] * i as f64 / nx as f64,
                lengths[1] * j as f64 / ny as f64,
                0.0,
            ]);
        }
    }
    let mut quads = Vec::with_capacity(4 * nx * ny);
    for i in 0..nx {
        for j in 0..ny {
            quads.extend([node(i, j), node(i + 1, j), node(i + 1, j + 1), node(i, j + 1)]);
        }
    }

    let mut sink = SectionSink::new();
    sink.push(
        "fluid",
        ElementKind::Quadrangle4,
        quads,
        (0..(nx * ny) as u64).map(GlobalId::new).collect(),
    );
    let line = ElementKind::Line2;
    let (mut xmin, mut xmax) = (Vec::new(), Vec::new());
    for j in 0..ny {
        xmin.extend([node(0, j + 1), node(0, j)]);
        xmax.extend([node(nx, j), node(nx, j + 1)]);
    }
    let (mut ymin, mut ymax) = (Vec::new(), Vec::new());
    for i in 0..nx {
        ymin.extend([node(i, 0), node(i + 1, 0)]);
        ymax.extend([node(i + 1, ny), node(i, ny)]);
    }
    for (name, edges) in [
        (BOUNDARY_X_MIN, xmin),
        (BOUNDARY_X_MAX, xmax),
        (BOUNDARY_Y_MIN, ymin),
        (BOUNDARY_Y_MAX, ymax),
    ] {
        sink.push(name, line, edges, Vec::new());
    }

    let n_nodes = coordinates.len() as u64;
    InMemoryMesh {
        name: "rectangle".into(),
        cell_dim: 2,
        phys_dim: 2,
        zones: vec![ZoneData {
            name: "zone".into(),
            coordinates,
            node_ids: (0..n_nodes).map(GlobalId::new).collect(),
            sections: sink.sections,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::mesh::MeshSource;

    #[test]
    fn hexahedra_counts_and_numbering() {
        let mesh = box_hexahedra(3, 2, 2, [3.0, 2.0, 2.0]);
        mesh.validate().unwrap();
        assert_eq!(mesh.count_cells(), 12);
        assert_eq!(mesh.count_nodes(1).unwrap(), 4 * 3 * 3);
        assert_eq!(mesh.count_sections(1).unwrap(), 7);
        let xmax = mesh.section_info(1, 3).unwrap();
        assert_eq!(xmax.name, BOUNDARY_X_MAX);
        assert_eq!(xmax.len(), 4);
        assert_eq!(xmax.first, 13 + 4);
    }

    #[test]
    fn quadrangles_have_four_sides() {
        let mesh = box_quadrangles(4, 3, [1.0, 1.0]);
        mesh.validate().unwrap();
        let names: Vec<_> = mesh.zones[0].sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["fluid", "xmin", "xmax", "ymin", "ymax"]);
        assert_eq!(mesh.zones[0].sections[3].count(), 4);
    }
}
