//! In-process cluster: every rank is a thread, links are crossbeam channels
//!
//! Runs exactly the same collective protocol as the multi-process cluster,
//! which makes the distributed models testable without spawning processes.

use super::{Link, Packet, StarComm};
use crate::error::{CommonError, Result};
use crossbeam::channel::{Receiver, Sender, unbounded};

pub struct ChannelLink {
    tx: Sender<Packet>,
    rx: Receiver<Packet>,
}

impl ChannelLink {
    /// Two connected ends
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = unbounded();
        let (b_tx, a_rx) = unbounded();
        (
            ChannelLink { tx: a_tx, rx: a_rx },
            ChannelLink { tx: b_tx, rx: b_rx },
        )
    }
}

impl Link for ChannelLink {
    fn send(&mut self, packet: Packet) -> Result<()> {
        self.tx
            .send(packet)
            .map_err(|_| CommonError::Protocol("peer rank hung up".to_string()))
    }

    fn recv(&mut self) -> Result<Packet> {
        self.rx
            .recv()
            .map_err(|_| CommonError::Protocol("peer rank disconnected".to_string()))
    }
}

pub struct LocalCluster;

impl LocalCluster {
    /// Wire up `size` ranks and run `rank_main` on each, one thread per rank.
    ///
    /// Returns the per-rank results in rank order. When ranks fail, the most
    /// specific error wins: a rank's own failure is preferred over the
    /// abort/disconnect errors its peers observe as a consequence.
    pub fn run<T, F>(size: usize, rank_main: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(StarComm<ChannelLink>) -> Result<T> + Sync,
    {
        if size == 0 {
            return Err(crate::error::ConfigError::ZeroWorkers {
                what: "process count",
            }
            .into());
        }

        let mut root_links = Vec::with_capacity(size - 1);
        let mut comms = Vec::with_capacity(size);
        for rank in 1..size {
            let (root_end, member_end) = ChannelLink::pair();
            root_links.push(root_end);
            comms.push(StarComm::member(rank, size, member_end));
        }
        comms.insert(0, StarComm::root(root_links));

        let outcomes = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    let rank_main = &rank_main;
                    s.spawn(move |_| rank_main(comm))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(Err(CommonError::WorkerPanicked)))
                .collect::<Vec<_>>()
        })
        .map_err(|_| CommonError::WorkerPanicked)?;

        let mut results = Vec::with_capacity(size);
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(value) => results.push(value),
                Err(e) => failures.push(e),
            }
        }

        if failures.is_empty() {
            return Ok(results);
        }
        let primary = failures
            .iter()
            .position(|e| {
                !matches!(
                    e,
                    CommonError::Aborted { .. } | CommonError::Protocol(_) | CommonError::Frame(_)
                )
            })
            .unwrap_or(0);
        Err(failures.swap_remove(primary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::Communicator;
    use crate::partition::{SplitPolicy, plan};

    #[test]
    fn test_broadcast_reaches_every_rank() {
        let copies = LocalCluster::run(4, |mut comm| {
            let mut buf = if comm.is_root() { vec![9, 4, 3] } else { Vec::new() };
            comm.broadcast(&mut buf)?;
            Ok(buf)
        })
        .unwrap();
        assert!(copies.iter().all(|c| c == &vec![9, 4, 3]));
    }

    #[test]
    fn test_scatter_follows_plan() {
        let slices = LocalCluster::run(3, |mut comm| {
            let parts = plan(6, comm.size(), SplitPolicy::Strict)?;
            let data = [1, 2, 3, 4, 5, 6];
            let send = comm.is_root().then_some(&data[..]);
            comm.scatter(send, &parts)
        })
        .unwrap();
        assert_eq!(slices, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
    }

    #[test]
    fn test_reduce_max_only_at_root() {
        let maxima = LocalCluster::run(3, |mut comm| {
            let mine = [0.4, 0.9, 0.2][comm.rank()];
            comm.reduce_max(mine)
        })
        .unwrap();
        assert_eq!(maxima, vec![Some((0.9, 1)), None, None]);
    }

    #[test]
    fn test_agree_spreads_a_single_failure() {
        let verdicts = LocalCluster::run(3, |mut comm| {
            let ok = comm.rank() != 2;
            comm.agree(ok)
        })
        .unwrap();
        assert_eq!(verdicts, vec![false, false, false]);
    }

    #[test]
    fn test_dead_rank_surfaces_as_error_not_hang() {
        let result = LocalCluster::run(2, |mut comm| {
            if comm.rank() == 1 {
                return Err(CommonError::Allocation { elements: 42 });
            }
            comm.barrier()
        });
        assert!(matches!(result, Err(CommonError::Allocation { elements: 42 })));
    }

    #[test]
    fn test_single_rank_collectives_are_local() {
        let out = LocalCluster::run(1, |mut comm| {
            comm.barrier()?;
            comm.reduce_sum(5)
        })
        .unwrap();
        assert_eq!(out, vec![Some(5)]);
    }
}
