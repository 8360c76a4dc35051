//! Fixed, little-endian wire types for the setup exchanges.
//!
//! Halo payloads themselves are raw `Pod` scalars in schedule order; only the
//! one-time setup messages (node coordinates, ghost connectivity, order
//! handshake) use the records below.

use bytemuck::{Pod, Zeroable};
use static_assertions::{assert_eq_align, assert_eq_size};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Copy `bytes` into a fresh `Vec<T>`; `bytes.len()` must be a multiple of `size_of::<T>()`.
pub fn decode_vec<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, String> {
    let size = std::mem::size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(format!(
            "{} bytes is not a whole number of {size}-byte records",
            bytes.len()
        ));
    }
    let mut out = vec![T::zeroed(); bytes.len() / size];
    cast_slice_mut(&mut out).copy_from_slice(bytes);
    Ok(out)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// One 64-bit word: a GlobalId, a zone number or a node index.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, PartialEq, Eq)]
pub struct WireWord {
    pub v_le: u64,
}

impl WireWord {
    #[inline]
    pub fn of(v: u64) -> Self {
        Self { v_le: v.to_le() }
    }

    #[inline]
    pub fn get(&self) -> u64 {
        u64::from_le(self.v_le)
    }
}

/// A node coordinate tagged with its GlobalId.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireNode {
    pub gid_le: u64,
    pub xyz_le: [u64; 3], // f64 bit patterns
}

impl WireNode {
    pub fn new(gid: u64, xyz: [f64; 3]) -> Self {
        Self {
            gid_le: gid.to_le(),
            xyz_le: xyz.map(|x| x.to_bits().to_le()),
        }
    }

    pub fn gid(&self) -> u64 {
        u64::from_le(self.gid_le)
    }

    pub fn xyz(&self) -> [f64; 3] {
        self.xyz_le.map(|x| f64::from_bits(u64::from_le(x)))
    }
}

/// Leading word of every ghost-record and handshake message.
///
/// A rank that has already failed still sends each message of those phases,
/// marked [`SetupStatus::Failed`], so no neighbour waits on it forever.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SetupStatus {
    Ready,
    Failed,
}

impl SetupStatus {
    pub fn of(ok: bool) -> Self {
        if ok { Self::Ready } else { Self::Failed }
    }

    pub fn word(self) -> WireWord {
        WireWord::of(match self {
            Self::Ready => 1,
            Self::Failed => 0,
        })
    }

    /// Split a decoded message into its status and body.
    pub fn split(words: &[WireWord]) -> Result<(Self, &[WireWord]), String> {
        let (head, body) = words
            .split_first()
            .ok_or_else(|| "setup message has no status word".to_string())?;
        match head.get() {
            1 => Ok((Self::Ready, body)),
            0 => Ok((Self::Failed, body)),
            v => Err(format!("unknown setup status {v}")),
        }
    }
}

/// Words per ghost-cell record: GlobalId, zone, then `npe` node indices.
#[inline]
pub const fn cell_record_words(npe: usize) -> usize {
    2 + npe
}

// ===== Compile-time sanity checks =========================================

assert_eq_size!(WireWord, u64);
assert_eq_size!(WireNode, [u64; 4]);
assert_eq_align!(WireNode, u64);
