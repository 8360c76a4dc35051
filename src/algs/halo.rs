//! Halo schedule and the reusable two-phase exchange built on it.
//!
//! A [`HaloSchedule`] is derived once per part: for every neighbour rank, the
//! ordered list of local cells whose payload is sent there and the ordered
//! list of ghost cells filled from there. Both lists are in ascending
//! GlobalId order, so rank A's send list for B and B's receive list for A
//! name the same cells in the same order. Payloads therefore carry no ids.
//!
//! A [`HaloChannel`] owns pre-sized buffers for one fixed payload width and
//! runs the exchange in two steps:
//!
//! 1. [`HaloChannel::share`] packs and posts non-blocking sends and receives;
//! 2. [`HaloChannel::update`] waits, checks sizes and unpacks into ghosts.
//!
//! Work placed between the two overlaps with communication.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{
    SetupStatus, WireWord, cast_slice, cast_slice_mut, decode_vec, expect_exact_len,
};
use crate::data::Scalar;
use crate::mesh_error::MeshPartError;
use crate::topology::ids::{GlobalId, LocalId};
use std::collections::BTreeMap;

/// Per-neighbour pack and unpack order, fixed at setup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HaloSchedule {
    send: BTreeMap<usize, Vec<LocalId>>,
    recv: BTreeMap<usize, Vec<LocalId>>,
}

impl HaloSchedule {
    /// Build from per-rank lists. Empty lists are dropped, so a rank is a
    /// neighbour only if something actually travels.
    pub fn new(
        send: BTreeMap<usize, Vec<LocalId>>,
        recv: BTreeMap<usize, Vec<LocalId>>,
    ) -> Self {
        let keep = |m: BTreeMap<usize, Vec<LocalId>>| {
            m.into_iter().filter(|(_, v)| !v.is_empty()).collect()
        };
        Self {
            send: keep(send),
            recv: keep(recv),
        }
    }

    /// Every rank this part sends to or receives from, ascending.
    pub fn neighbors(&self) -> Vec<usize> {
        let mut n: Vec<usize> = self.send.keys().chain(self.recv.keys()).copied().collect();
        n.sort_unstable();
        n.dedup();
        n
    }

    pub fn send_list(&self, rank: usize) -> &[LocalId] {
        self.send.get(&rank).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn recv_list(&self, rank: usize) -> &[LocalId] {
        self.recv.get(&rank).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sends(&self) -> impl Iterator<Item = (usize, &[LocalId])> {
        self.send.iter().map(|(r, v)| (*r, v.as_slice()))
    }

    pub fn recvs(&self) -> impl Iterator<Item = (usize, &[LocalId])> {
        self.recv.iter().map(|(r, v)| (*r, v.as_slice()))
    }

    pub fn count_sent_cells(&self) -> usize {
        self.send.values().map(Vec::len).sum()
    }

    pub fn count_received_cells(&self) -> usize {
        self.recv.values().map(Vec::len).sum()
    }

    /// Exchange send-list GlobalIds with every neighbour and compare them
    /// against the local receive lists.
    ///
    /// Each message leads with `status`. A neighbour that reports
    /// [`SetupStatus::Failed`] yields [`MeshPartError::CommError`]; otherwise
    /// [`MeshPartError::HaloOrderMismatch`] names the first position where
    /// the two sides disagree. Lists are only compared when `status` is
    /// ready. Every posted message is drained before returning, whatever the
    /// outcome.
    pub fn verify_order<C, F>(
        &self,
        comm: &C,
        tag: CommTag,
        status: SetupStatus,
        gid_of: F,
    ) -> Result<(), MeshPartError>
    where
        C: Communicator,
        F: Fn(LocalId) -> GlobalId,
    {
        let mut sends = Vec::with_capacity(self.send.len());
        for (&rank, list) in &self.send {
            let words: Vec<WireWord> = std::iter::once(status.word())
                .chain(list.iter().map(|&l| WireWord::of(gid_of(l).get())))
                .collect();
            sends.push(comm.isend(rank, tag.as_u16(), cast_slice(&words)));
        }
        let mut recvs = Vec::with_capacity(self.recv.len());
        for (&rank, list) in &self.recv {
            let mut buf = vec![WireWord::of(0); list.len() + 1];
            recvs.push((rank, comm.irecv(rank, tag.as_u16(), cast_slice_mut(&mut buf))));
        }

        let mut first_err = None;
        for (rank, h) in recvs {
            let data = h.wait();
            if first_err.is_some() {
                continue;
            }
            let comm_err = |e: String| MeshPartError::CommError {
                neighbor: rank,
                source: e.into(),
            };
            let Some(data) = data else {
                first_err = Some(comm_err("no handshake message received".into()));
                continue;
            };
            let words = match decode_vec::<WireWord>(&data) {
                Ok(w) => w,
                Err(e) => {
                    first_err = Some(comm_err(e));
                    continue;
                }
            };
            let theirs = match SetupStatus::split(&words) {
                Ok((SetupStatus::Ready, body)) => body,
                Ok((SetupStatus::Failed, _)) => {
                    first_err = Some(comm_err(format!("rank {rank} failed during setup")));
                    continue;
                }
                Err(e) => {
                    first_err = Some(comm_err(e));
                    continue;
                }
            };
            if status == SetupStatus::Failed {
                continue;
            }
            let mine = self.recv_list(rank);
            let position = mine
                .iter()
                .zip(theirs)
                .position(|(&l, w)| gid_of(l).get() != w.get())
                .or_else(|| (mine.len() != theirs.len()).then(|| mine.len().min(theirs.len())));
            if let Some(position) = position {
                first_err = Some(MeshPartError::HaloOrderMismatch {
                    neighbor: rank,
                    position,
                });
            }
        }
        for h in sends {
            h.wait();
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

enum ExchangeState<C: Communicator> {
    Idle,
    InFlight {
        sends: Vec<C::SendHandle>,
        recvs: Vec<(usize, C::RecvHandle)>,
    },
}

/// One fixed-width halo exchange over a [`HaloSchedule`].
///
/// Buffers are allocated once in [`HaloChannel::new`]; each `share`/`update`
/// cycle reuses them.
pub struct HaloChannel<C: Communicator, T: Scalar> {
    width: usize,
    tag: CommTag,
    send_bufs: BTreeMap<usize, Vec<T>>,
    recv_bufs: BTreeMap<usize, Vec<T>>,
    state: ExchangeState<C>,
}

impl<C: Communicator, T: Scalar> std::fmt::Debug for HaloChannel<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaloChannel")
            .field("width", &self.width)
            .field("tag", &self.tag)
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

impl<C: Communicator, T: Scalar> HaloChannel<C, T> {
    /// Size the buffers for `width` scalars per cell.
    pub fn new(schedule: &HaloSchedule, width: usize, tag: CommTag) -> Self {
        let sized = |(rank, list): (usize, &[LocalId])| {
            (rank, vec![T::default(); list.len() * width])
        };
        Self {
            width,
            tag,
            send_bufs: schedule.sends().map(sized).collect(),
            recv_bufs: schedule.recvs().map(sized).collect(),
            state: ExchangeState::Idle,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn tag(&self) -> CommTag {
        self.tag
    }

    #[inline]
    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, ExchangeState::InFlight { .. })
    }

    /// Pack every send-list cell with `pack` and post all sends and receives.
    ///
    /// `pack` receives each cell's LocalId and its `width`-long slot in the
    /// send buffer. Never blocks.
    pub fn share<F>(
        &mut self,
        comm: &C,
        schedule: &HaloSchedule,
        mut pack: F,
    ) -> Result<(), MeshPartError>
    where
        F: FnMut(LocalId, &mut [T]),
    {
        if self.is_in_flight() {
            return Err(MeshPartError::ExchangeInFlight);
        }
        let w = self.width;
        let mut sends = Vec::with_capacity(self.send_bufs.len());
        for (&rank, buf) in self.send_bufs.iter_mut() {
            for (slot, &lid) in buf.chunks_exact_mut(w.max(1)).zip(schedule.send_list(rank)) {
                pack(lid, slot);
            }
            sends.push(comm.isend(rank, self.tag.as_u16(), cast_slice(buf.as_slice())));
        }
        let mut recvs = Vec::with_capacity(self.recv_bufs.len());
        for (&rank, buf) in self.recv_bufs.iter_mut() {
            recvs.push((rank, comm.irecv(rank, self.tag.as_u16(), cast_slice_mut(buf))));
        }
        log::trace!(
            "halo tag {}: shared with {} ranks, expecting {}",
            self.tag.as_u16(),
            sends.len(),
            recvs.len()
        );
        self.state = ExchangeState::InFlight { sends, recvs };
        Ok(())
    }

    /// Wait for the exchange started by [`share`](Self::share) and hand each
    /// ghost's received slot to `unpack`.
    ///
    /// On a transport failure every outstanding handle is still drained, the
    /// channel returns to idle and nothing is unpacked.
    pub fn update<F>(&mut self, schedule: &HaloSchedule, mut unpack: F) -> Result<(), MeshPartError>
    where
        F: FnMut(LocalId, &[T]),
    {
        let (sends, recvs) = match std::mem::replace(&mut self.state, ExchangeState::Idle) {
            ExchangeState::Idle => return Err(MeshPartError::ExchangeIdle),
            ExchangeState::InFlight { sends, recvs } => (sends, recvs),
        };

        let mut first_err = None;
        for (rank, h) in recvs {
            let data = h.wait();
            if first_err.is_some() {
                continue;
            }
            let Some(buf) = self.recv_bufs.get_mut(&rank) else {
                continue;
            };
            let bytes = cast_slice_mut(buf);
            match data {
                None => {
                    first_err = Some(MeshPartError::CommError {
                        neighbor: rank,
                        source: "no halo message received".into(),
                    });
                }
                Some(data) => match expect_exact_len(data.len(), bytes.len()) {
                    Ok(()) => bytes.copy_from_slice(&data),
                    Err(e) => {
                        first_err = Some(MeshPartError::CommError {
                            neighbor: rank,
                            source: e.into(),
                        });
                    }
                },
            }
        }
        for h in sends {
            h.wait();
        }
        if let Some(e) = first_err {
            log::warn!("halo tag {}: exchange drained after error: {e}", self.tag.as_u16());
            return Err(e);
        }

        let w = self.width;
        for (&rank, buf) in &self.recv_bufs {
            for (slot, &lid) in buf.chunks_exact(w.max(1)).zip(schedule.recv_list(rank)) {
                unpack(lid, slot);
            }
        }
        log::trace!("halo tag {}: updated", self.tag.as_u16());
        Ok(())
    }
}
