//! Per-rank partition descriptions: the text stream every rank reads at
//! construction, and the emitter that derives all ranks' streams from a
//! cell-to-rank assignment.

pub mod description;
pub mod emit;

pub use description::PartitionDescription;
pub use emit::{describe, write_all};
