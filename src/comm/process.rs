//! Multi-process cluster
//!
//! Rank 0 launches `size - 1` copies of the current executable, each
//! told its rank on the command line, and talks to them over their
//! stdin/stdout with length-prefixed frames. Child stderr is inherited.

use super::frame::{FrameError, FrameReader, FrameWriter};
use super::{Link, Packet, StarComm};
use crate::error::{CommonError, Result};
use std::io::{Read, Stdin, Stdout, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// Hidden subcommand a child rank is started with
pub const RANK_SUBCOMMAND: &str = "rank";

pub struct StreamLink<R: Read, W: Write> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl<R: Read, W: Write> StreamLink<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }
}

impl<R, W> Link for StreamLink<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    fn send(&mut self, packet: Packet) -> Result<()> {
        self.writer.write(&packet)?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Packet> {
        match self.reader.read() {
            Ok(packet) => Ok(packet),
            Err(FrameError::EndOfStream) => Err(CommonError::Protocol(
                "peer process closed its end of the pipe".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

pub type ChildLink = StreamLink<ChildStdout, ChildStdin>;
pub type ParentLink = StreamLink<Stdin, Stdout>;

/// Handle on the launched child ranks, held by rank 0
pub struct ProcessCluster {
    children: Vec<(usize, Child)>,
}

impl ProcessCluster {
    /// Launch ranks `1..size` from the running executable. `rank_args` are
    /// appended after the rank/size arguments so every child sees the same
    /// job description.
    pub fn launch(size: usize, rank_args: &[String]) -> Result<(Self, StarComm<ChildLink>)> {
        let exe = std::env::current_exe().map_err(CommonError::CurrentExe)?;
        Self::launch_from(&exe, size, rank_args)
    }

    /// Launch ranks `1..size` from `exe`, which must understand the hidden
    /// rank subcommand
    pub fn launch_from(
        exe: &Path,
        size: usize,
        rank_args: &[String],
    ) -> Result<(Self, StarComm<ChildLink>)> {
        let mut cluster = ProcessCluster {
            children: Vec::with_capacity(size.saturating_sub(1)),
        };
        let mut links = Vec::with_capacity(size.saturating_sub(1));

        for rank in 1..size {
            let mut child = Command::new(exe)
                .arg(RANK_SUBCOMMAND)
                .arg("--rank")
                .arg(rank.to_string())
                .arg("--size")
                .arg(size.to_string())
                .args(rank_args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|source| CommonError::Launch { rank, source })?;
            tracing::debug!("Launched rank {} of {} as pid {}", rank, size, child.id());

            let stdin = child.stdin.take();
            let stdout = child.stdout.take();
            cluster.children.push((rank, child));

            match (stdout, stdin) {
                (Some(stdout), Some(stdin)) => links.push(StreamLink::new(stdout, stdin)),
                _ => {
                    return Err(CommonError::Protocol(format!(
                        "rank {} started without piped stdio",
                        rank
                    )));
                }
            }
        }

        Ok((cluster, StarComm::root(links)))
    }

    /// Process ids of the launched ranks, in rank order
    pub fn pids(&self) -> Vec<u32> {
        self.children.iter().map(|(_, child)| child.id()).collect()
    }

    /// Wait for every child to exit after the final collective
    pub fn finalize(mut self) -> Result<()> {
        let mut failed = Vec::new();
        for (rank, mut child) in std::mem::take(&mut self.children) {
            match child.wait() {
                Ok(status) if status.success() => {
                    tracing::trace!("Rank {} exited cleanly", rank);
                }
                Ok(status) => failed.push(format!("rank {} exited with {}", rank, status)),
                Err(e) => failed.push(format!("rank {} could not be reaped: {}", rank, e)),
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(CommonError::Protocol(failed.join("; ")))
        }
    }
}

impl Drop for ProcessCluster {
    // Root failed before finalize: take every child down with it.
    fn drop(&mut self) {
        for (rank, child) in &mut self.children {
            if let Ok(None) = child.try_wait() {
                tracing::debug!("Terminating rank {}", rank);
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

/// Connect a child rank to rank 0 through its own stdin/stdout
pub fn connect_to_root(rank: usize, size: usize) -> StarComm<ParentLink> {
    StarComm::member(rank, size, StreamLink::new(std::io::stdin(), std::io::stdout()))
}
