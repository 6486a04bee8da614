//! Distributed runtime abstraction
//!
//! Collective operations are synchronous calls that every participant must
//! issue in the same order. Rank 0 is the root of every collective.
//!
//! ```text
//!            ┌────────┐
//!     ┌──────│ rank 0 │──────┐        broadcast / scatter: root → members
//!     │      └────────┘      │        agree / barrier / reduce: members → root → members
//!     ▼           ▼          ▼
//! ┌────────┐ ┌────────┐ ┌────────┐
//! │ rank 1 │ │ rank 2 │ │ rank 3 │
//! └────────┘ └────────┘ └────────┘
//! ```
//!
//! [`StarComm`] implements the collectives once on top of a point-to-point
//! [`Link`]. Two transports exist: crossbeam channels between threads
//! ([`local`]) and framed pipes between processes ([`process`]).
//!
//! Integer arrays travel as a [`Packet::Len`] header followed by
//! [`Packet::Ints`] chunks of at most [`CHUNK_ELEMENTS`] values, so no
//! single packet grows with the problem size.

pub mod frame;
pub mod local;
pub mod process;

use crate::error::{CommonError, Result};
use crate::partition::Partition;
use serde::{Deserialize, Serialize};

pub const ROOT: usize = 0;

/// Largest number of integers carried by one packet
pub const CHUNK_ELEMENTS: usize = 1 << 22;

/// Everything that travels between ranks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    /// Number of integers in the array that follows
    Len(u64),
    Ints(Vec<i32>),
    Flag(bool),
    Seconds(f64),
    Count(u64),
    Barrier,
}

impl Packet {
    fn kind(&self) -> &'static str {
        match self {
            Packet::Len(_) => "len",
            Packet::Ints(_) => "ints",
            Packet::Flag(_) => "flag",
            Packet::Seconds(_) => "seconds",
            Packet::Count(_) => "count",
            Packet::Barrier => "barrier",
        }
    }
}

/// Ordered, reliable point-to-point connection between two ranks
pub trait Link: Send {
    fn send(&mut self, packet: Packet) -> Result<()>;
    fn recv(&mut self) -> Result<Packet>;
}

pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn is_root(&self) -> bool {
        self.rank() == ROOT
    }

    /// Logical AND of every rank's `ok`, delivered to every rank.
    /// This is how a local failure becomes a run-wide abort.
    fn agree(&mut self, ok: bool) -> Result<bool>;

    /// Replace `buf` on every rank with the root's contents
    fn broadcast(&mut self, buf: &mut Vec<i32>) -> Result<()>;

    /// Root sends `send[partitions[r]]` to rank `r`; every rank gets its slice.
    /// `send` is only read on the root.
    fn scatter(&mut self, send: Option<&[i32]>, partitions: &[Partition]) -> Result<Vec<i32>>;

    fn barrier(&mut self) -> Result<()>;

    /// Maximum over all ranks and the rank that holds it, known only to the root
    fn reduce_max(&mut self, value: f64) -> Result<Option<(f64, usize)>>;

    /// Sum over all ranks, known only to the root
    fn reduce_sum(&mut self, value: u64) -> Result<Option<u64>>;

    /// Last collective of a run
    fn finalize(&mut self) -> Result<()> {
        self.barrier()
    }
}

/// Collectives over a star of links centred on rank 0
pub struct StarComm<L: Link> {
    rank: usize,
    size: usize,
    // root: one link per member, in rank order; member: one link to root
    links: Vec<L>,
}

impl<L: Link> StarComm<L> {
    pub fn root(members: Vec<L>) -> Self {
        Self {
            rank: ROOT,
            size: members.len() + 1,
            links: members,
        }
    }

    pub fn member(rank: usize, size: usize, to_root: L) -> Self {
        debug_assert!(rank != ROOT && rank < size);
        Self {
            rank,
            size,
            links: vec![to_root],
        }
    }

    fn to_root(&mut self) -> &mut L {
        &mut self.links[0]
    }

    fn gather<T>(&mut self, extract: fn(Packet) -> Result<T>) -> Result<Vec<T>> {
        self.links
            .iter_mut()
            .map(|link| link.recv().and_then(extract))
            .collect()
    }

    fn send_all(&mut self, packet: &Packet) -> Result<()> {
        for link in &mut self.links {
            link.send(packet.clone())?;
        }
        Ok(())
    }
}

/// Stream `values` over `link` in chunks of at most `chunk` integers
fn send_ints<L: Link>(link: &mut L, values: &[i32], chunk: usize) -> Result<()> {
    link.send(Packet::Len(values.len() as u64))?;
    for part in values.chunks(chunk.max(1)) {
        link.send(Packet::Ints(part.to_vec()))?;
    }
    Ok(())
}

/// Receive a chunked array into `buf`, reusing its capacity
fn recv_ints<L: Link>(link: &mut L, buf: &mut Vec<i32>) -> Result<()> {
    let len = match link.recv()? {
        Packet::Len(len) => usize::try_from(len)
            .map_err(|_| CommonError::Protocol(format!("array of {} elements announced", len)))?,
        other => return Err(unexpected("len", &other)),
    };

    buf.clear();
    buf.try_reserve_exact(len)
        .map_err(|_| CommonError::Allocation { elements: len })?;

    while buf.len() < len {
        let part = link.recv().and_then(as_ints)?;
        if part.is_empty() || buf.len() + part.len() > len {
            return Err(CommonError::Protocol(format!(
                "chunk of {} elements does not fit the announced {} ({} received)",
                part.len(),
                len,
                buf.len()
            )));
        }
        buf.extend_from_slice(&part);
    }
    Ok(())
}

fn unexpected(expected: &str, got: &Packet) -> CommonError {
    CommonError::Protocol(format!("expected {} packet, got {}", expected, got.kind()))
}

fn as_ints(packet: Packet) -> Result<Vec<i32>> {
    match packet {
        Packet::Ints(values) => Ok(values),
        other => Err(unexpected("ints", &other)),
    }
}

fn as_flag(packet: Packet) -> Result<bool> {
    match packet {
        Packet::Flag(flag) => Ok(flag),
        other => Err(unexpected("flag", &other)),
    }
}

fn as_seconds(packet: Packet) -> Result<f64> {
    match packet {
        Packet::Seconds(seconds) => Ok(seconds),
        other => Err(unexpected("seconds", &other)),
    }
}

fn as_count(packet: Packet) -> Result<u64> {
    match packet {
        Packet::Count(count) => Ok(count),
        other => Err(unexpected("count", &other)),
    }
}

fn as_barrier(packet: Packet) -> Result<()> {
    match packet {
        Packet::Barrier => Ok(()),
        other => Err(unexpected("barrier", &other)),
    }
}

impl<L: Link> Communicator for StarComm<L> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn agree(&mut self, ok: bool) -> Result<bool> {
        if self.is_root() {
            let all = self.gather(as_flag)?.into_iter().all(|flag| flag) && ok;
            self.send_all(&Packet::Flag(all))?;
            Ok(all)
        } else {
            self.to_root().send(Packet::Flag(ok))?;
            self.to_root().recv().and_then(as_flag)
        }
    }

    fn broadcast(&mut self, buf: &mut Vec<i32>) -> Result<()> {
        if self.is_root() {
            for link in &mut self.links {
                send_ints(link, buf, CHUNK_ELEMENTS)?;
            }
            Ok(())
        } else {
            recv_ints(self.to_root(), buf)
        }
    }

    fn scatter(&mut self, send: Option<&[i32]>, partitions: &[Partition]) -> Result<Vec<i32>> {
        if partitions.len() != self.size {
            return Err(CommonError::Protocol(format!(
                "scatter plan has {} partitions for {} ranks",
                partitions.len(),
                self.size
            )));
        }

        if self.is_root() {
            let send = send.ok_or_else(|| {
                CommonError::Protocol("root reached scatter without array 1".to_string())
            })?;
            let covered = partitions.last().map_or(0, |part| part.end);
            if covered != send.len() {
                return Err(CommonError::Protocol(format!(
                    "scatter plan covers {} elements, root holds {}",
                    covered,
                    send.len()
                )));
            }
            for (link, part) in self.links.iter_mut().zip(&partitions[1..]) {
                send_ints(link, &send[part.range()], CHUNK_ELEMENTS)?;
            }
            Ok(send[partitions[ROOT].range()].to_vec())
        } else {
            let expected = partitions[self.rank].len();
            let mut local = Vec::new();
            recv_ints(self.to_root(), &mut local)?;
            if local.len() != expected {
                return Err(CommonError::Protocol(format!(
                    "rank {} received {} elements, expected {}",
                    self.rank,
                    local.len(),
                    expected
                )));
            }
            Ok(local)
        }
    }

    fn barrier(&mut self) -> Result<()> {
        if self.is_root() {
            self.gather(as_barrier)?;
            self.send_all(&Packet::Barrier)
        } else {
            self.to_root().send(Packet::Barrier)?;
            self.to_root().recv().and_then(as_barrier)
        }
    }

    fn reduce_max(&mut self, value: f64) -> Result<Option<(f64, usize)>> {
        if self.is_root() {
            // member links are in rank order, so position + 1 is the rank
            let max = self
                .gather(as_seconds)?
                .into_iter()
                .enumerate()
                .fold((value, ROOT), |best, (i, seconds)| {
                    if seconds > best.0 { (seconds, i + 1) } else { best }
                });
            Ok(Some(max))
        } else {
            self.to_root().send(Packet::Seconds(value))?;
            Ok(None)
        }
    }

    fn reduce_sum(&mut self, value: u64) -> Result<Option<u64>> {
        if self.is_root() {
            let sum = self.gather(as_count)?.into_iter().sum::<u64>() + value;
            Ok(Some(sum))
        } else {
            self.to_root().send(Packet::Count(value))?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::local::ChannelLink;

    #[test]
    fn test_arrays_travel_in_bounded_chunks() {
        let (mut sender, mut receiver) = ChannelLink::pair();
        let values: Vec<i32> = (1..=10).collect();
        send_ints(&mut sender, &values, 3).unwrap();

        // header plus ceil(10 / 3) chunks
        let mut buf = Vec::with_capacity(10);
        recv_ints(&mut receiver, &mut buf).unwrap();
        assert_eq!(buf, values);
        assert!(buf.capacity() >= 10);
    }

    #[test]
    fn test_empty_array_has_no_chunks() {
        let (mut sender, mut receiver) = ChannelLink::pair();
        send_ints(&mut sender, &[], 3).unwrap();
        sender.send(Packet::Barrier).unwrap();

        let mut buf = vec![7];
        recv_ints(&mut receiver, &mut buf).unwrap();
        assert!(buf.is_empty());
        assert_eq!(receiver.recv().unwrap(), Packet::Barrier);
    }

    #[test]
    fn test_overlong_chunk_is_a_protocol_error() {
        let (mut sender, mut receiver) = ChannelLink::pair();
        sender.send(Packet::Len(2)).unwrap();
        sender.send(Packet::Ints(vec![1, 2, 3])).unwrap();

        let mut buf = Vec::new();
        let err = recv_ints(&mut receiver, &mut buf).unwrap_err();
        assert!(matches!(err, CommonError::Protocol(_)));
    }

    #[test]
    fn test_missing_header_is_a_protocol_error() {
        let (mut sender, mut receiver) = ChannelLink::pair();
        sender.send(Packet::Ints(vec![1])).unwrap();

        let err = recv_ints(&mut receiver, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, CommonError::Protocol(_)));
    }
}
