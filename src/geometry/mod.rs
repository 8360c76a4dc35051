//! Element geometry: shape descriptors and integration rules.
//!
//! A [`Coordinate`] is an element kind instantiated at concrete node
//! positions; an [`Integrator`] is the quadrature rule built from it. Both
//! are created from a [`Prototype`] installed on the part builder.

pub mod coordinate;
pub mod integrator;
pub mod vector;

pub use coordinate::{Coordinate, Prototype};
pub use integrator::Integrator;
pub use vector::Global;
