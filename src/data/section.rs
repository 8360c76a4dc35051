//! Sections: contiguous runs of cells or boundary faces of one element kind.
//!
//! A cell [`Section`] is the unit of field I/O. It covers the elements
//! `[head, tail)` of one mesh section and the matching contiguous LocalId run
//! starting at `first`, and keeps one array per field, `fields[i_field][i_cell]`.

use crate::data::Scalar;
use crate::topology::element::ElementKind;
use crate::topology::ids::{FaceId, LocalId};
use std::ops::Range;

/// Cells `[head, tail)` of mesh section `(zone, section)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Section<T> {
    pub zone: usize,
    pub section: usize,
    pub name: String,
    pub kind: ElementKind,
    pub head: u64,
    pub tail: u64,
    first: LocalId,
    fields: Vec<Vec<T>>,
}

impl<T: Scalar> Section<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        zone: usize,
        section: usize,
        name: String,
        kind: ElementKind,
        head: u64,
        tail: u64,
        first: LocalId,
        n_fields: usize,
    ) -> Self {
        let n = (tail - head) as usize;
        Self {
            zone,
            section,
            name,
            kind,
            head,
            tail,
            first,
            fields: vec![vec![T::default(); n]; n_fields],
        }
    }

    #[inline]
    pub fn count_cells(&self) -> usize {
        (self.tail - self.head) as usize
    }

    /// LocalIds covered by this section.
    #[inline]
    pub fn local_range(&self) -> Range<usize> {
        self.first.get()..self.first.get() + self.count_cells()
    }

    #[inline]
    pub fn contains(&self, id: LocalId) -> bool {
        self.local_range().contains(&id.get())
    }

    /// LocalId of mesh element `element`.
    #[inline]
    pub fn local_id(&self, element: u64) -> LocalId {
        LocalId::new(self.first.get() + (element - self.head) as usize)
    }

    pub fn local_ids(&self) -> impl Iterator<Item = LocalId> {
        self.local_range().map(LocalId::new)
    }

    #[inline]
    pub fn count_fields(&self) -> usize {
        self.fields.len()
    }

    /// Field `i_field`, ordered by LocalId.
    pub fn field(&self, i_field: usize) -> &[T] {
        &self.fields[i_field]
    }

    pub fn field_mut(&mut self, i_field: usize) -> &mut [T] {
        &mut self.fields[i_field]
    }

    pub fn fields(&self) -> &[Vec<T>] {
        &self.fields
    }
}

/// Boundary faces `[head, tail)` of a named mesh section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundarySection {
    pub zone: usize,
    pub section: usize,
    pub name: String,
    pub kind: ElementKind,
    pub head: u64,
    pub tail: u64,
    pub faces: Vec<FaceId>,
}

impl BoundarySection {
    pub fn count_faces(&self) -> usize {
        self.faces.len()
    }
}
