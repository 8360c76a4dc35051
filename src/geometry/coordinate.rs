//! Element shape descriptors and the prototypes they are cloned from.

use crate::geometry::integrator::Integrator;
use crate::geometry::vector::{Global, average};
use crate::mesh_error::MeshPartError;
use crate::topology::element::ElementKind;

/// Whether a prototype builds cells or faces.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Role {
    Cell,
    Face,
}

impl Role {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Role::Cell => "cell",
            Role::Face => "face",
        }
    }
}

/// An element kind installed for one node count, from which every
/// [`Coordinate`] / [`Integrator`] pair of that node count is instantiated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Prototype {
    kind: ElementKind,
    role: Role,
}

impl Prototype {
    /// Prototype for cells of `kind`.
    pub const fn cell(kind: ElementKind) -> Self {
        Self {
            kind,
            role: Role::Cell,
        }
    }

    /// Prototype for faces of `kind`.
    pub const fn face(kind: ElementKind) -> Self {
        Self {
            kind,
            role: Role::Face,
        }
    }

    #[inline]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn npe(&self) -> usize {
        self.kind.npe()
    }

    /// Place the prototype at `nodes` and build its integration rule.
    pub fn instantiate(
        &self,
        nodes: Vec<Global>,
    ) -> Result<(Coordinate, Integrator), MeshPartError> {
        if nodes.len() != self.npe() {
            return Err(MeshPartError::InvalidMesh(format!(
                "{:?} expects {} nodes, got {}",
                self.kind,
                self.npe(),
                nodes.len()
            )));
        }
        let coordinate = Coordinate::new(self.kind, nodes);
        let integrator = match self.role {
            Role::Cell => Integrator::for_cell(&coordinate)?,
            Role::Face => Integrator::for_face(&coordinate)?,
        };
        Ok((coordinate, integrator))
    }
}

/// An element kind placed at concrete node positions.
#[derive(Clone, Debug, PartialEq)]
pub struct Coordinate {
    kind: ElementKind,
    nodes: Vec<Global>,
    center: Global,
}

impl Coordinate {
    pub fn new(kind: ElementKind, nodes: Vec<Global>) -> Self {
        let center = average(&nodes);
        Self {
            kind,
            nodes,
            center,
        }
    }

    #[inline]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    #[inline]
    pub fn count_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of corner nodes (all nodes, for the linear kinds supported).
    #[inline]
    pub fn count_corners(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn global(&self, i: usize) -> Global {
        self.nodes[i]
    }

    #[inline]
    pub fn nodes(&self) -> &[Global] {
        &self.nodes
    }

    /// Average of the node positions.
    #[inline]
    pub fn center(&self) -> Global {
        self.center
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_node_count_is_rejected() {
        let proto = Prototype::cell(ElementKind::Hexahedron8);
        let err = proto.instantiate(vec![[0.0; 3]; 4]).unwrap_err();
        assert!(matches!(err, MeshPartError::InvalidMesh(_)));
    }

    #[test]
    fn coordinate_center_is_node_average() {
        let c = Coordinate::new(
            ElementKind::Line2,
            vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
        );
        assert_eq!(c.center(), [1.0, 0.0, 0.0]);
        assert_eq!(c.count_nodes(), 2);
    }
}
