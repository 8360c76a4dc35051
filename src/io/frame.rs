//! Checkpoint frames: one rank's nodes, connectivity and named field arrays.
//!
//! The part fills a [`Frame`] from its sections (fields ordered by LocalId
//! within each section) and hands it to a [`FrameCodec`]. The default
//! [`BincodeFrameCodec`] writes one file per rank per frame at
//! `{directory}/{frame}/{rank}.bin`; values round-trip bit for bit.

use crate::geometry::vector::Global;
use crate::mesh_error::MeshPartError;
use crate::topology::element::ElementKind;
use crate::topology::ids::GlobalId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// An owned node as stored in a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameNode {
    pub zone: usize,
    pub node: u64,
    pub gid: GlobalId,
    pub xyz: Global,
}

/// One named scalar array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameField<T> {
    pub name: String,
    pub values: Vec<T>,
}

/// One owned cell section of a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameSection<T> {
    pub zone: usize,
    pub section: usize,
    pub name: String,
    pub kind: ElementKind,
    pub head: u64,
    pub tail: u64,
    pub connectivity: Vec<u64>,
    pub fields: Vec<FrameField<T>>,
}

/// Everything one rank writes for one checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame<T> {
    pub rank: usize,
    pub nodes: Vec<FrameNode>,
    pub sections: Vec<FrameSection<T>>,
}

/// Persists frames. Implementations decide the storage layout.
pub trait FrameCodec<T> {
    fn write(&self, frame_name: &str, frame: &Frame<T>) -> Result<(), MeshPartError>;
    fn read(&self, frame_name: &str, rank: usize) -> Result<Frame<T>, MeshPartError>;
}

/// `bincode` files under a root directory.
#[derive(Clone, Debug)]
pub struct BincodeFrameCodec {
    directory: PathBuf,
}

impl BincodeFrameCodec {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn path(&self, frame_name: &str, rank: usize) -> PathBuf {
        self.directory.join(frame_name).join(format!("{rank}.bin"))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

fn codec_err(path: &Path, e: impl std::fmt::Display) -> MeshPartError {
    MeshPartError::FrameCodec(format!("{}: {e}", path.display()))
}

/// Buffered bincode encoding, flushed before returning.
fn encode_frame<W: Write, T: Serialize>(sink: W, frame: &Frame<T>) -> Result<(), String> {
    let mut w = BufWriter::new(sink);
    bincode::serialize_into(&mut w, frame).map_err(|e| e.to_string())?;
    w.flush().map_err(|e| e.to_string())
}

impl<T: Serialize + DeserializeOwned> FrameCodec<T> for BincodeFrameCodec {
    fn write(&self, frame_name: &str, frame: &Frame<T>) -> Result<(), MeshPartError> {
        let path = self.path(frame_name, frame.rank);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| codec_err(parent, e))?;
        }
        let file = std::fs::File::create(&path).map_err(|e| codec_err(&path, e))?;
        encode_frame(file, frame).map_err(|e| codec_err(&path, e))?;
        log::debug!("wrote frame `{frame_name}` of rank {} to {}", frame.rank, path.display());
        Ok(())
    }

    fn read(&self, frame_name: &str, rank: usize) -> Result<Frame<T>, MeshPartError> {
        let path = self.path(frame_name, rank);
        let file = std::fs::File::open(&path).map_err(|e| codec_err(&path, e))?;
        let frame: Frame<T> =
            bincode::deserialize_from(BufReader::new(file)).map_err(|e| codec_err(&path, e))?;
        if frame.rank != rank {
            return Err(codec_err(&path, format!("holds rank {}", frame.rank)));
        }
        Ok(frame)
    }
}
