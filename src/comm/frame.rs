//! Length-prefixed frame encoding
//!
//! Gives message boundaries over byte streams (child stdin/stdout).
//!
//! ```text
//! +----------------+--------------------+
//! | length (4 LE)  | bincode payload    |
//! +----------------+--------------------+
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{BufReader, BufWriter, Read, Write};
use thiserror::Error;

/// Largest accepted payload (1 GiB); arrays are chunked well below this
pub const MAX_FRAME_SIZE: usize = 1 << 30;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("End of stream")]
    EndOfStream,
}

pub fn write_frame<W, T>(writer: &mut BufWriter<W>, message: &T) -> Result<(), FrameError>
where
    W: Write,
    T: Serialize,
{
    let bytes = bincode::serde::encode_to_vec(message, bincode::config::standard())
        .map_err(|e| FrameError::Serialization(e.to_string()))?;

    let len = bytes.len();
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(len as u32).to_le_bytes())?;
    writer.write_all(&bytes)?;
    writer.flush()?;

    Ok(())
}

pub fn read_frame<R, T>(reader: &mut BufReader<R>) -> Result<T, FrameError>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::EndOfStream);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    if len == 0 {
        return Err(FrameError::InvalidFrame("zero-length frame".to_string()));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    let (value, consumed) = bincode::serde::decode_from_slice(&buf, bincode::config::standard())
        .map_err(|e| FrameError::Deserialization(e.to_string()))?;
    if consumed != len {
        return Err(FrameError::InvalidFrame(format!(
            "{} trailing bytes after payload",
            len - consumed
        )));
    }

    Ok(value)
}

pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(64 * 1024, writer),
        }
    }

    pub fn write<T: Serialize>(&mut self, message: &T) -> Result<(), FrameError> {
        write_frame(&mut self.writer, message)
    }
}

pub struct FrameReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(64 * 1024, reader),
        }
    }

    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T, FrameError> {
        read_frame(&mut self.reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::Packet;
    use std::io::Cursor;

    #[test]
    fn test_packets_survive_a_stream() {
        let packets = vec![
            Packet::Ints(vec![3, -7, i32::MAX]),
            Packet::Flag(true),
            Packet::Barrier,
            Packet::Seconds(0.25),
        ];

        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            for packet in &packets {
                writer.write(packet).unwrap();
            }
        }

        let mut reader = FrameReader::new(Cursor::new(buffer));
        for expected in &packets {
            let decoded: Packet = reader.read().unwrap();
            assert_eq!(expected, &decoded);
        }
        let tail: Result<Packet, _> = reader.read();
        assert!(matches!(tail, Err(FrameError::EndOfStream)));
    }

    #[test]
    fn test_oversized_length_prefix_rejected() {
        let bytes = (u32::MAX).to_le_bytes().to_vec();
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let result: Result<Packet, _> = reader.read();
        assert!(matches!(result, Err(FrameError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_zero_length_frame_rejected() {
        let mut reader = FrameReader::new(Cursor::new(0u32.to_le_bytes().to_vec()));
        let result: Result<Packet, _> = reader.read();
        assert!(matches!(result, Err(FrameError::InvalidFrame(_))));
    }
}
