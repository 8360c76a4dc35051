//! Element kinds and their local face-node conventions.
//!
//! The set of supported element shapes is closed, so it is an enum rather
//! than a trait object. Local face tables follow the CGNS node ordering: for
//! a well-oriented element every face listed here has its right-hand normal
//! pointing out of the element.

use crate::mesh_error::MeshPartError;
use serde::{Deserialize, Serialize};

/// Supported element shapes. Cells are 2D or 3D; faces are 1D or 2D.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ElementKind {
    /// 2-node segment (face of a 2D cell).
    Line2,
    /// 3-node triangle (2D cell or face of a 3D cell).
    Triangle3,
    /// 4-node quadrilateral (2D cell or face of a 3D cell).
    Quadrangle4,
    /// 4-node tetrahedron.
    Tetrahedron4,
    /// 5-node pyramid.
    Pyramid5,
    /// 6-node wedge/prism.
    Wedge6,
    /// 8-node hexahedron.
    Hexahedron8,
}

const TRIANGLE_EDGES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 0]];
const QUADRANGLE_EDGES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
const TETRAHEDRON_FACES: &[&[usize]] = &[&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[2, 0, 3]];
const PYRAMID_FACES: &[&[usize]] = &[
    &[0, 3, 2, 1],
    &[0, 1, 4],
    &[1, 2, 4],
    &[2, 3, 4],
    &[3, 0, 4],
];
const WEDGE_FACES: &[&[usize]] = &[
    &[0, 1, 4, 3],
    &[1, 2, 5, 4],
    &[2, 0, 3, 5],
    &[0, 2, 1],
    &[3, 4, 5],
];
const HEXAHEDRON_FACES: &[&[usize]] = &[
    &[0, 3, 2, 1],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[0, 4, 7, 3],
    &[4, 5, 6, 7],
];

impl ElementKind {
    /// Number of nodes per element.
    pub const fn npe(self) -> usize {
        match self {
            ElementKind::Line2 => 2,
            ElementKind::Triangle3 => 3,
            ElementKind::Quadrangle4 | ElementKind::Tetrahedron4 => 4,
            ElementKind::Pyramid5 => 5,
            ElementKind::Wedge6 => 6,
            ElementKind::Hexahedron8 => 8,
        }
    }

    /// Topological dimension.
    pub const fn dimension(self) -> usize {
        match self {
            ElementKind::Line2 => 1,
            ElementKind::Triangle3 | ElementKind::Quadrangle4 => 2,
            ElementKind::Tetrahedron4
            | ElementKind::Pyramid5
            | ElementKind::Wedge6
            | ElementKind::Hexahedron8 => 3,
        }
    }

    /// Local faces (edges for 2D kinds) as lists of local node positions.
    ///
    /// Empty for [`ElementKind::Line2`], which is never a cell.
    pub fn local_faces(self) -> &'static [&'static [usize]] {
        match self {
            ElementKind::Line2 => &[],
            ElementKind::Triangle3 => TRIANGLE_EDGES,
            ElementKind::Quadrangle4 => QUADRANGLE_EDGES,
            ElementKind::Tetrahedron4 => TETRAHEDRON_FACES,
            ElementKind::Pyramid5 => PYRAMID_FACES,
            ElementKind::Wedge6 => WEDGE_FACES,
            ElementKind::Hexahedron8 => HEXAHEDRON_FACES,
        }
    }

    /// Whether some local face of this kind has `n` nodes.
    pub fn has_face_with(self, n: usize) -> bool {
        self.local_faces().iter().any(|f| f.len() == n)
    }

    /// Canonical cell kind for a node count and mesh dimension.
    pub fn cell_for(npe: usize, cell_dim: usize) -> Option<Self> {
        match (cell_dim, npe) {
            (2, 3) => Some(ElementKind::Triangle3),
            (2, 4) => Some(ElementKind::Quadrangle4),
            (3, 4) => Some(ElementKind::Tetrahedron4),
            (3, 5) => Some(ElementKind::Pyramid5),
            (3, 6) => Some(ElementKind::Wedge6),
            (3, 8) => Some(ElementKind::Hexahedron8),
            _ => None,
        }
    }

    /// Canonical face kind for a node count.
    pub fn face_for(npe: usize) -> Option<Self> {
        match npe {
            2 => Some(ElementKind::Line2),
            3 => Some(ElementKind::Triangle3),
            4 => Some(ElementKind::Quadrangle4),
            _ => None,
        }
    }
}

/// Reorder `face_nodes` to follow the local face convention of the element
/// whose connectivity is `cell_nodes`.
///
/// On success `face_nodes` lists the same nodes in the order that makes the
/// face normal point out of the element. Returns the local face position.
pub fn sort_nodes_on_face(
    kind: ElementKind,
    cell_nodes: &[u64],
    face_nodes: &mut [u64],
) -> Result<usize, MeshPartError> {
    for (i_face, local) in kind.local_faces().iter().enumerate() {
        if local.len() != face_nodes.len() {
            continue;
        }
        let matches = local
            .iter()
            .all(|&k| face_nodes.contains(&cell_nodes[k]));
        if matches {
            for (dst, &k) in face_nodes.iter_mut().zip(local.iter()) {
                *dst = cell_nodes[k];
            }
            return Ok(i_face);
        }
    }
    Err(MeshPartError::NoMatchingFace {
        kind,
        nodes: face_nodes.to_vec(),
    })
}
