//! Communication layer: the communicator façade, setup wire records, and
//! the halo schedule with its exchange channel.

pub mod communicator;
pub mod halo;
pub mod wire;

pub use communicator::{CommTag, Communicator, LocalComm, NoComm, SetupTags, Wait};
pub use halo::{HaloChannel, HaloSchedule};
