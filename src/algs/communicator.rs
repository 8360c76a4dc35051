//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: the halo channel calls
//! `.wait()` before it trusts that a buffer is ready.
//!
//! Messages between the same `(source, destination, tag)` triple are
//! delivered in the order they were sent, which is what the fixed halo
//! schedule relies on.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// Typed message tag. Distinct phases and channels use distinct tags.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CommTag(pub u16);

impl CommTag {
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn base(self) -> u16 {
        self.0
    }

    /// Deterministic derived tag; wraps on overflow.
    #[inline]
    pub const fn offset(self, by: u16) -> Self {
        Self(self.0.wrapping_add(by))
    }

    /// Derived tag, or `None` past `u16::MAX`.
    #[inline]
    pub const fn checked_offset(self, by: u16) -> Option<Self> {
        match self.0.checked_add(by) {
            Some(t) => Some(Self(t)),
            None => None,
        }
    }
}

/// Tags for the one-time setup exchanges of a part.
#[derive(Copy, Clone, Debug)]
pub struct SetupTags {
    /// Node coordinates.
    pub nodes: CommTag,
    /// Ghost cell connectivity.
    pub cells: CommTag,
    /// Halo order handshake.
    pub handshake: CommTag,
    /// First tag handed to halo channels.
    pub channels: CommTag,
}

impl SetupTags {
    /// Construct tags from a base, assigning deterministic offsets per phase.
    #[inline]
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            nodes: base,
            cells: base.offset(1),
            handshake: base.offset(2),
            channels: base.offset(3),
        }
    }
}

/// Non-blocking communication interface (minimal by design).
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Post a send of `buf` to `peer`; the bytes are copied before returning.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of `buf.len()` bytes from `peer`. The data is returned by `wait`.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Block until every rank reaches the barrier.
    fn barrier(&self) {}
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Single-rank communicator for purely serial runs. Receives yield nothing.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) -> Self::SendHandle {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {}

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }
}

// --- LocalComm: ranks as threads of one process ---------------------------

type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Mailbox {
    slots: DashMap<Key, VecDeque<Bytes>>,
    bell: Mutex<u64>,
    ring: Condvar,
    arrived: Mutex<usize>,
    generation: Mutex<u64>,
    released: Condvar,
}

impl Mailbox {
    fn post(&self, key: Key, data: Bytes) {
        self.slots.entry(key).or_default().push_back(data);
        let mut bell = self.bell.lock();
        *bell = bell.wrapping_add(1);
        self.ring.notify_all();
    }

    fn take(&self, key: &Key) -> Option<Bytes> {
        self.slots.get_mut(key).and_then(|mut q| q.pop_front())
    }

    fn take_blocking(&self, key: &Key) -> Bytes {
        let mut bell = self.bell.lock();
        loop {
            if let Some(data) = self.take(key) {
                return data;
            }
            self.ring.wait(&mut bell);
        }
    }
}

/// Communicator for ranks running as threads of one process.
///
/// Ranks created by the same [`LocalComm::universe`] call share one mailbox;
/// separate universes never see each other's messages.
#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl LocalComm {
    /// One communicator per rank, all attached to a fresh mailbox.
    pub fn universe(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

/// Receive handle of [`LocalComm`].
pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        Some(self.mailbox.take_blocking(&self.key).to_vec())
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        self.mailbox
            .post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        let mb = &self.mailbox;
        let mut generation = mb.generation.lock();
        let mine = *generation;
        let mut arrived = mb.arrived.lock();
        *arrived += 1;
        if *arrived == self.size {
            *arrived = 0;
            *generation = generation.wrapping_add(1);
            mb.released.notify_all();
            return;
        }
        drop(arrived);
        while *generation == mine {
            mb.released.wait(&mut generation);
        }
    }
}

// --- MPI backend (feature = "mpi-support") --------------------------------
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::mesh_error::MeshPartError;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;
    use std::sync::Arc;

    /// MPI communicator over `MPI_COMM_WORLD`.
    #[derive(Clone)]
    pub struct MpiComm {
        _universe: Arc<Universe>,
        pub world: SimpleCommunicator,
        pub rank: usize,
        pub size: usize,
    }

    impl MpiComm {
        /// Initialize MPI. Fails if MPI was already initialized.
        pub fn new() -> Result<Self, MeshPartError> {
            let universe = mpi::initialize().ok_or_else(|| MeshPartError::CommError {
                neighbor: 0,
                source: "MPI initialization failed".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                _universe: Arc::new(universe),
                world,
                rank,
                size,
            })
        }
    }

    /// Handle owning the message buffer until the request completes.
    pub struct MpiHandle {
        request: Option<Request<'static, [u8], StaticScope>>,
        buf: Box<[u8]>,
        receiving: bool,
    }

    impl Wait for MpiHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(req) = self.request.take() {
                req.wait();
            }
            self.receiving
                .then(|| std::mem::take(&mut self.buf).into_vec())
        }
    }

    impl Drop for MpiHandle {
        fn drop(&mut self) {
            if let Some(req) = self.request.take() {
                req.wait();
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let owned: Box<[u8]> = buf.into();
            // SAFETY: the heap block behind `owned` moves with the handle and is
            // neither read nor freed before the request completes.
            let view: &'static [u8] =
                unsafe { std::slice::from_raw_parts(owned.as_ptr(), owned.len()) };
            let request = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, view, tag as i32);
            MpiHandle {
                request: Some(request),
                buf: owned,
                receiving: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let mut owned: Box<[u8]> = vec![0u8; buf.len()].into_boxed_slice();
            // SAFETY: as in `isend`; the buffer is only read back after `wait`.
            let view: &'static mut [u8] =
                unsafe { std::slice::from_raw_parts_mut(owned.as_mut_ptr(), owned.len()) };
            let request = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, view, tag as i32);
            MpiHandle {
                request: Some(request),
                buf: owned,
                receiving: true,
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiHandle};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_round_trip_two_ranks() {
        let comms = LocalComm::universe(2);
        let mut recv_buf = [0u8; 4];
        let recv = comms[1].irecv(0, 7, &mut recv_buf);
        comms[0].isend(1, 7, &[1, 2, 3, 4]).wait();
        let data = recv.wait().expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(recv_buf, [1, 2, 3, 4]);
    }

    #[test]
    fn local_fifo_per_tag() {
        let comms = LocalComm::universe(2);
        for i in 0..5u8 {
            comms[0].isend(1, 3, &[i]);
        }
        comms[0].isend(1, 4, &[99]);
        let mut b = [0u8; 1];
        assert_eq!(comms[1].irecv(0, 4, &mut b).wait(), Some(vec![99]));
        let got: Vec<u8> = (0..5)
            .map(|_| comms[1].irecv(0, 3, &mut b).wait().unwrap()[0])
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn universes_are_isolated() {
        let a = LocalComm::universe(2);
        let b = LocalComm::universe(2);
        a[0].isend(1, 1, &[1]);
        b[0].isend(1, 1, &[2]);
        let mut buf = [0u8; 1];
        assert_eq!(b[1].irecv(0, 1, &mut buf).wait(), Some(vec![2]));
        assert_eq!(a[1].irecv(0, 1, &mut buf).wait(), Some(vec![1]));
    }

    #[test]
    fn receive_blocks_until_send_from_other_thread() {
        let mut comms = LocalComm::universe(2);
        let c1 = comms.pop().unwrap();
        let c0 = comms.pop().unwrap();
        let t = std::thread::spawn(move || {
            let mut buf = [0u8; 2];
            c1.irecv(0, 9, &mut buf).wait().unwrap()
        });
        std::thread::sleep(std::time::Duration::from_millis(10));
        c0.isend(1, 9, &[4, 2]);
        assert_eq!(t.join().unwrap(), vec![4, 2]);
    }

    #[test]
    fn barrier_releases_all_ranks() {
        let comms = LocalComm::universe(3);
        std::thread::scope(|s| {
            for c in &comms {
                s.spawn(move || {
                    c.barrier();
                    c.barrier();
                });
            }
        });
    }

    #[test]
    fn tags_offset_deterministically() {
        let t = SetupTags::from_base(CommTag::new(0x100));
        assert_eq!(t.cells.as_u16(), 0x101);
        assert_eq!(t.channels.as_u16(), 0x103);
        assert_eq!(CommTag::new(u16::MAX).offset(1).as_u16(), 0);
        assert_eq!(CommTag::new(u16::MAX).checked_offset(1), None);
        assert_eq!(CommTag::new(7).checked_offset(2), Some(CommTag::new(9)));
    }
}
