//! Data module: node coordinates, element connectivity and field sections.

pub mod connectivity;
pub mod coordinates;
pub mod section;

pub use connectivity::{Connectivity, ElementBlock};
pub use coordinates::CoordinateStore;
pub use section::{BoundarySection, Section};

/// Scalar type carried in coefficient blocks and halo payloads.
///
/// Must be plain old data so buffers go on the wire without copying through
/// an intermediate encoding.
pub trait Scalar:
    bytemuck::Pod + num_traits::Float + Default + std::fmt::Debug + Send + Sync + 'static
{
}

impl<T> Scalar for T where
    T: bytemuck::Pod + num_traits::Float + Default + std::fmt::Debug + Send + Sync + 'static
{
}
