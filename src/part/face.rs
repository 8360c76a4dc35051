//! Faces between a local holder and a sharer (local, ghost or none).

use crate::data::Scalar;
use crate::geometry::vector::{Global, dot, scale, sub};
use crate::geometry::{Coordinate, Integrator};
use crate::part::cell::Cell;
use crate::topology::ids::{FaceId, LocalId};

/// A face; its normal points from the holder toward the sharer, or out of
/// the domain when there is no sharer.
#[derive(Clone, Debug)]
pub struct Face {
    coordinate: Coordinate,
    integrator: Integrator,
    id: FaceId,
    holder: LocalId,
    sharer: Option<LocalId>,
    holder_to_sharer: Global,
    holder_height: f64,
    sharer_height: f64,
}

impl Face {
    /// Build a face between `holder` and `sharer`; a missing sharer makes
    /// it a boundary face, mirrored through the face center.
    pub fn new<T: Scalar>(
        coordinate: Coordinate,
        integrator: Integrator,
        id: FaceId,
        holder: &Cell<T>,
        sharer: Option<&Cell<T>>,
    ) -> Self {
        let area = integrator.area();
        let holder_height = holder.volume() / area;
        let (holder_to_sharer, sharer_height) = match sharer {
            Some(s) => (sub(s.center(), holder.center()), s.volume() / area),
            None => (
                scale(sub(integrator.center(), holder.center()), 2.0),
                holder_height,
            ),
        };
        Self {
            coordinate,
            integrator,
            id,
            holder: holder.id(),
            sharer: sharer.map(Cell::id),
            holder_to_sharer,
            holder_height,
            sharer_height,
        }
    }

    #[inline]
    pub fn id(&self) -> FaceId {
        self.id
    }

    #[inline]
    pub fn holder(&self) -> LocalId {
        self.holder
    }

    #[inline]
    pub fn sharer(&self) -> Option<LocalId> {
        self.sharer
    }

    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.sharer.is_none()
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
    pub fn area(&self) -> f64 {
        self.integrator.area()
    }

    /// Unit normal.
    #[inline]
    pub fn normal(&self) -> Global {
        self.integrator.normal()
    }

    /// Sharer center minus holder center; twice the holder-to-face vector
    /// on boundaries.
    #[inline]
    pub fn holder_to_sharer(&self) -> Global {
        self.holder_to_sharer
    }

    /// Holder volume over face area.
    #[inline]
    pub fn holder_height(&self) -> f64 {
        self.holder_height
    }

    #[inline]
    pub fn sharer_height(&self) -> f64 {
        self.sharer_height
    }

    /// `(center - holder_center) · normal`; positive for a well-oriented face.
    pub(crate) fn outward_measure<T: Scalar>(&self, holder: &Cell<T>) -> f64 {
        dot(sub(self.center(), holder.center()), self.normal())
    }
}
