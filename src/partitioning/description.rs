//! Per-rank partition description: the line-oriented stream an external
//! partitioner emits for every rank.
//!
//! The stream opens with a `#` header line and then carries seven record
//! groups in fixed order. Each group ends at the next line starting with `#`;
//! the last group may also end at end of input.
//!
//! | group | record |
//! |---|---|
//! | owned node ranges | `zone head tail` |
//! | nodes to send | `rank node_gid` |
//! | nodes to receive | `rank node_gid zone node` |
//! | owned cell ranges | `zone section head tail` |
//! | local adjacency | `holder_gid sharer_gid` |
//! | ghost adjacency | `rank holder_gid sharer_gid holder_npe sharer_npe` |
//! | boundary face ranges | `zone section head tail` |
//!
//! Ranges are 1-based and half-open. Within each neighbour rank, the node
//! send and receive lists are in ascending GlobalId order.

use crate::mesh_error::MeshPartError;
use crate::topology::ids::{GlobalId, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const GROUP_HEADERS: [&str; 7] = [
    "# zone head tail (owned nodes)",
    "# rank node_gid (nodes to send)",
    "# rank node_gid zone node (nodes to receive)",
    "# zone section head tail (owned cells)",
    "# holder_gid sharer_gid (local adjacency)",
    "# rank holder_gid sharer_gid holder_npe sharer_npe (ghost adjacency)",
    "# zone section head tail (boundary faces)",
];

/// Owned nodes `[head, tail)` of a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRange {
    pub zone: usize,
    pub head: u64,
    pub tail: u64,
}

/// An owned node whose coordinates `rank` needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSend {
    pub rank: usize,
    pub node: GlobalId,
}

/// A node owned by `rank`, with its position in the mesh source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecv {
    pub rank: usize,
    pub node: GlobalId,
    pub index: NodeIndex,
}

/// Elements `[head, tail)` of section `(zone, section)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRange {
    pub zone: usize,
    pub section: usize,
    pub head: u64,
    pub tail: u64,
}

/// Two local cells sharing a face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPair {
    pub holder: GlobalId,
    pub sharer: GlobalId,
}

/// A local holder sharing a face with a cell owned by `rank`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostPair {
    pub rank: usize,
    pub holder: GlobalId,
    pub sharer: GlobalId,
    pub holder_npe: usize,
    pub sharer_npe: usize,
}

/// Everything one rank needs to know about its partition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescription {
    pub node_ranges: Vec<NodeRange>,
    pub nodes_to_send: Vec<NodeSend>,
    pub nodes_to_recv: Vec<NodeRecv>,
    pub cell_ranges: Vec<ElementRange>,
    pub local_pairs: Vec<LocalPair>,
    pub ghost_pairs: Vec<GhostPair>,
    pub boundary_ranges: Vec<ElementRange>,
}

fn parse_err(line: usize, message: impl Into<String>) -> MeshPartError {
    MeshPartError::PartitionParse {
        line,
        message: message.into(),
    }
}

fn fields<const N: usize>(text: &str, line: usize) -> Result<[u64; N], MeshPartError> {
    let mut out = [0u64; N];
    let mut words = text.split_whitespace();
    for (i, slot) in out.iter_mut().enumerate() {
        let word = words
            .next()
            .ok_or_else(|| parse_err(line, format!("expected {N} fields, found {i}")))?;
        *slot = word
            .parse()
            .map_err(|_| parse_err(line, format!("`{word}` is not a non-negative integer")))?;
    }
    if words.next().is_some() {
        return Err(parse_err(
            line,
            format!("expected {N} fields, found {}", text.split_whitespace().count()),
        ));
    }
    Ok(out)
}

fn range(head: u64, tail: u64, line: usize) -> Result<(u64, u64), MeshPartError> {
    if head == 0 || head > tail {
        return Err(parse_err(line, format!("bad range [{head}, {tail})")));
    }
    Ok((head, tail))
}

/// Per-rank ascending-GlobalId check used for the node lists.
#[derive(Default)]
struct Ascending(BTreeMap<usize, GlobalId>);

impl Ascending {
    fn check(&mut self, rank: usize, gid: GlobalId, line: usize) -> Result<(), MeshPartError> {
        if let Some(prev) = self.0.insert(rank, gid) {
            if prev >= gid {
                return Err(parse_err(
                    line,
                    format!("node {gid} for rank {rank} is not after {prev}"),
                ));
            }
        }
        Ok(())
    }
}

impl PartitionDescription {
    /// Parse a description stream.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, MeshPartError> {
        let mut d = Self::default();
        let mut group: Option<usize> = None;
        let mut sends = Ascending::default();
        let mut recvs = Ascending::default();
        for (i, text) in reader.lines().enumerate() {
            let line = i + 1;
            let text = text.map_err(|e| parse_err(line, e.to_string()))?;
            let text = text.trim();
            if text.starts_with('#') {
                group = Some(group.map_or(0, |g| g + 1));
                if group == Some(GROUP_HEADERS.len()) {
                    break;
                }
                continue;
            }
            if text.is_empty() {
                continue;
            }
            let Some(g) = group else {
                return Err(parse_err(line, "missing `#` header line"));
            };
            match g {
                0 => {
                    let [zone, head, tail] = fields(text, line)?;
                    let (head, tail) = range(head, tail, line)?;
                    d.node_ranges.push(NodeRange {
                        zone: zone as usize,
                        head,
                        tail,
                    });
                }
                1 => {
                    let [rank, gid] = fields(text, line)?;
                    let node = GlobalId::new(gid);
                    sends.check(rank as usize, node, line)?;
                    d.nodes_to_send.push(NodeSend {
                        rank: rank as usize,
                        node,
                    });
                }
                2 => {
                    let [rank, gid, zone, node] = fields(text, line)?;
                    let gid = GlobalId::new(gid);
                    recvs.check(rank as usize, gid, line)?;
                    d.nodes_to_recv.push(NodeRecv {
                        rank: rank as usize,
                        node: gid,
                        index: NodeIndex::new(zone as usize, node),
                    });
                }
                3 | 6 => {
                    let [zone, section, head, tail] = fields(text, line)?;
                    let (head, tail) = range(head, tail, line)?;
                    let r = ElementRange {
                        zone: zone as usize,
                        section: section as usize,
                        head,
                        tail,
                    };
                    if g == 3 {
                        d.cell_ranges.push(r);
                    } else {
                        d.boundary_ranges.push(r);
                    }
                }
                4 => {
                    let [holder, sharer] = fields(text, line)?;
                    d.local_pairs.push(LocalPair {
                        holder: GlobalId::new(holder),
                        sharer: GlobalId::new(sharer),
                    });
                }
                5 => {
                    let [rank, holder, sharer, holder_npe, sharer_npe] = fields(text, line)?;
                    d.ghost_pairs.push(GhostPair {
                        rank: rank as usize,
                        holder: GlobalId::new(holder),
                        sharer: GlobalId::new(sharer),
                        holder_npe: holder_npe as usize,
                        sharer_npe: sharer_npe as usize,
                    });
                }
                _ => unreachable!("group index is capped above"),
            }
        }
        match group {
            None => Err(parse_err(0, "empty description")),
            Some(g) if g + 1 < GROUP_HEADERS.len() => Err(parse_err(
                0,
                format!("truncated: {} of {} groups present", g + 1, GROUP_HEADERS.len()),
            )),
            Some(_) => Ok(d),
        }
    }

    /// Write the description in the stream format [`parse`](Self::parse) reads.
    pub fn write<W: Write>(&self, mut w: W) -> Result<(), MeshPartError> {
        writeln!(w, "{}", GROUP_HEADERS[0])?;
        for r in &self.node_ranges {
            writeln!(w, "{} {} {}", r.zone, r.head, r.tail)?;
        }
        writeln!(w, "{}", GROUP_HEADERS[1])?;
        for s in &self.nodes_to_send {
            writeln!(w, "{} {}", s.rank, s.node)?;
        }
        writeln!(w, "{}", GROUP_HEADERS[2])?;
        for r in &self.nodes_to_recv {
            writeln!(w, "{} {} {} {}", r.rank, r.node, r.index.zone, r.index.node)?;
        }
        writeln!(w, "{}", GROUP_HEADERS[3])?;
        for r in &self.cell_ranges {
            writeln!(w, "{} {} {} {}", r.zone, r.section, r.head, r.tail)?;
        }
        writeln!(w, "{}", GROUP_HEADERS[4])?;
        for p in &self.local_pairs {
            writeln!(w, "{} {}", p.holder, p.sharer)?;
        }
        writeln!(w, "{}", GROUP_HEADERS[5])?;
        for p in &self.ghost_pairs {
            writeln!(
                w,
                "{} {} {} {} {}",
                p.rank, p.holder, p.sharer, p.holder_npe, p.sharer_npe
            )?;
        }
        writeln!(w, "{}", GROUP_HEADERS[6])?;
        for r in &self.boundary_ranges {
            writeln!(w, "{} {} {} {}", r.zone, r.section, r.head, r.tail)?;
        }
        w.flush()?;
        Ok(())
    }

    /// `{directory}/partition/{rank}.txt`
    pub fn path_for_rank(directory: impl AsRef<Path>, rank: usize) -> PathBuf {
        directory
            .as_ref()
            .join("partition")
            .join(format!("{rank}.txt"))
    }

    pub fn read_for_rank(directory: impl AsRef<Path>, rank: usize) -> Result<Self, MeshPartError> {
        let path = Self::path_for_rank(directory, rank);
        let file = std::fs::File::open(&path)
            .map_err(|e| MeshPartError::MeshIo(format!("{}: {e}", path.display())))?;
        Self::parse(BufReader::new(file))
    }

    pub fn write_for_rank(
        &self,
        directory: impl AsRef<Path>,
        rank: usize,
    ) -> Result<(), MeshPartError> {
        let path = Self::path_for_rank(directory, rank);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(&path)
            .map_err(|e| MeshPartError::MeshIo(format!("{}: {e}", path.display())))?;
        self.write(std::io::BufWriter::new(file))
    }

    /// Reject neighbour ranks outside `[0, size)` or equal to `rank`.
    pub fn check_ranks(&self, rank: usize, size: usize) -> Result<(), MeshPartError> {
        let bad = self
            .nodes_to_send
            .iter()
            .map(|s| s.rank)
            .chain(self.nodes_to_recv.iter().map(|r| r.rank))
            .chain(self.ghost_pairs.iter().map(|p| p.rank))
            .find(|&r| r >= size || r == rank);
        match bad {
            Some(r) => Err(parse_err(
                0,
                format!("rank {rank} of {size} names neighbour rank {r}"),
            )),
            None => Ok(()),
        }
    }

    /// Node GlobalIds to send, per neighbour, ascending.
    pub fn send_nodes(&self) -> BTreeMap<usize, Vec<GlobalId>> {
        let mut m: BTreeMap<usize, Vec<GlobalId>> = BTreeMap::new();
        for s in &self.nodes_to_send {
            m.entry(s.rank).or_default().push(s.node);
        }
        m
    }

    /// Nodes to receive, per neighbour, ascending.
    pub fn recv_nodes(&self) -> BTreeMap<usize, Vec<(GlobalId, NodeIndex)>> {
        let mut m: BTreeMap<usize, Vec<(GlobalId, NodeIndex)>> = BTreeMap::new();
        for r in &self.nodes_to_recv {
            m.entry(r.rank).or_default().push((r.node, r.index));
        }
        m
    }

    /// Local cells each neighbour keeps as ghosts, with their node counts.
    pub fn send_cells(&self) -> BTreeMap<usize, BTreeMap<GlobalId, usize>> {
        let mut m: BTreeMap<usize, BTreeMap<GlobalId, usize>> = BTreeMap::new();
        for p in &self.ghost_pairs {
            m.entry(p.rank).or_default().insert(p.holder, p.holder_npe);
        }
        m
    }

    /// Ghost cells to receive from each neighbour, with their node counts.
    pub fn recv_cells(&self) -> BTreeMap<usize, BTreeMap<GlobalId, usize>> {
        let mut m: BTreeMap<usize, BTreeMap<GlobalId, usize>> = BTreeMap::new();
        for p in &self.ghost_pairs {
            m.entry(p.rank).or_default().insert(p.sharer, p.sharer_npe);
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# owned nodes
1 1 13
# send
1 4
1 9
# recv
1 20 1 21
1 22 1 23
# cells
1 1 1 3
# local adjacency
0 1
# ghost adjacency
1 1 2 4 4
# boundary
1 2 5 7
";

    #[test]
    fn parses_all_groups() {
        let d = PartitionDescription::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(d.node_ranges, vec![NodeRange { zone: 1, head: 1, tail: 13 }]);
        assert_eq!(d.nodes_to_send.len(), 2);
        assert_eq!(d.nodes_to_recv[1].index, NodeIndex::new(1, 23));
        assert_eq!(d.cell_ranges[0].tail, 3);
        assert_eq!(d.local_pairs[0].sharer, GlobalId::new(1));
        assert_eq!(d.ghost_pairs[0].sharer_npe, 4);
        assert_eq!(d.boundary_ranges[0].section, 2);
        assert_eq!(d.send_nodes()[&1], vec![GlobalId::new(4), GlobalId::new(9)]);
        assert_eq!(d.recv_cells()[&1].get(&GlobalId::new(2)), Some(&4));
    }

    #[test]
    fn written_form_parses_back() {
        let d = PartitionDescription::parse(SAMPLE.as_bytes()).unwrap();
        let mut out = Vec::new();
        d.write(&mut out).unwrap();
        assert_eq!(PartitionDescription::parse(out.as_slice()).unwrap(), d);
    }

    #[test]
    fn missing_header_is_reported_on_line_one() {
        let err = PartitionDescription::parse("1 1 13\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MeshPartError::PartitionParse { line: 1, .. }));
    }

    #[test]
    fn wrong_field_count_and_garbage() {
        let err = PartitionDescription::parse("#\n1 1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MeshPartError::PartitionParse { line: 2, .. }));
        let err = PartitionDescription::parse("#\n1 x 3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MeshPartError::PartitionParse { line: 2, .. }));
        let err = PartitionDescription::parse("#\n1 1 3 4\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MeshPartError::PartitionParse { line: 2, .. }));
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let err = PartitionDescription::parse("#\n1 1 3\n#\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MeshPartError::PartitionParse { .. }));
    }

    #[test]
    fn unsorted_send_list_is_rejected() {
        let text = "#\n#\n1 9\n1 4\n#\n#\n#\n#\n#\n";
        let err = PartitionDescription::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, MeshPartError::PartitionParse { line: 4, .. }));
    }

    #[test]
    fn neighbour_ranks_are_checked() {
        let d = PartitionDescription::parse(SAMPLE.as_bytes()).unwrap();
        assert!(d.check_ranks(0, 2).is_ok());
        assert!(d.check_ranks(1, 2).is_err());
        assert!(d.check_ranks(0, 1).is_err());
    }
}
