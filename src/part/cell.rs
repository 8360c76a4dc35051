//! Cells: an element shape, its integration rule and a coefficient block.

use crate::data::Scalar;
use crate::geometry::vector::Global;
use crate::geometry::{Coordinate, Integrator};
use crate::topology::ids::{FaceId, GlobalId, LocalId};

/// A local cell or a ghost mirror of a remote one.
///
/// Adjacency is stored as ids into the part's cell and face arenas. Ghost
/// cells keep their geometry and coefficients only; their adjacency lists
/// stay empty.
#[derive(Clone, Debug)]
pub struct Cell<T> {
    coordinate: Coordinate,
    integrator: Integrator,
    gid: GlobalId,
    id: LocalId,
    coefficients: Vec<T>,
    adj_cells: Vec<LocalId>,
    adj_faces: Vec<FaceId>,
    boundary_faces: Vec<FaceId>,
    inner: bool,
    length: f64,
}

impl<T: Scalar> Cell<T> {
    pub fn new(
        coordinate: Coordinate,
        integrator: Integrator,
        gid: GlobalId,
        id: LocalId,
        n_coefficients: usize,
    ) -> Self {
        let measure = integrator.measure();
        let length = match coordinate.kind().dimension() {
            3 => measure.cbrt() / 2.0,
            _ => measure.sqrt() / 2.0,
        };
        Self {
            coordinate,
            integrator,
            gid,
            id,
            coefficients: vec![T::default(); n_coefficients],
            adj_cells: Vec::new(),
            adj_faces: Vec::new(),
            boundary_faces: Vec::new(),
            inner: true,
            length,
        }
    }

    #[inline]
    pub fn global_id(&self) -> GlobalId {
        self.gid
    }

    #[inline]
    pub fn id(&self) -> LocalId {
        self.id
    }

    #[inline]
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    #[inline]
    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    #[inline]
    pub fn center(&self) -> Global {
        self.integrator.center()
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.integrator.volume()
    }

    /// Half the edge of the cube (or square) with the same measure.
    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn coefficients(&self) -> &[T] {
        &self.coefficients
    }

    #[inline]
    pub fn coefficients_mut(&mut self) -> &mut [T] {
        &mut self.coefficients
    }

    /// Neighbouring cells, local or ghost.
    #[inline]
    pub fn adjacent_cells(&self) -> &[LocalId] {
        &self.adj_cells
    }

    /// Interior faces (local and ghost) bounding this cell.
    #[inline]
    pub fn adjacent_faces(&self) -> &[FaceId] {
        &self.adj_faces
    }

    #[inline]
    pub fn boundary_faces(&self) -> &[FaceId] {
        &self.boundary_faces
    }

    /// No neighbour is a ghost.
    #[inline]
    pub fn is_inner(&self) -> bool {
        self.inner
    }

    #[inline]
    pub fn is_inter(&self) -> bool {
        !self.inner
    }

    pub(crate) fn set_id(&mut self, id: LocalId) {
        self.id = id;
    }

    pub(crate) fn connect(&mut self, neighbor: LocalId, face: FaceId) {
        self.adj_cells.push(neighbor);
        self.adj_faces.push(face);
    }

    pub(crate) fn add_boundary_face(&mut self, face: FaceId) {
        self.boundary_faces.push(face);
    }

    pub(crate) fn mark_inter(&mut self) {
        self.inner = false;
    }
}
