//! LAMO frame codec
//!
//! ```text
//! offset      size     field
//! 0           4        magic "LMGO"
//! 4           1        version (1)
//! 5           4        metaLen (u32 BE)
//! 9           metaLen  metadata JSON
//! 9+metaLen   4        dataLen (u32 BE)
//! 13+metaLen  dataLen  payload
//! ```
//!
//! Each declared length is checked against its cap before a single byte of
//! the region it describes is read, and regions are read through `take` so
//! a length that lies about the file size cannot force a large allocation.

use crate::config::Limits;
use crate::error::{FormatError, LamoError, Result, SizeLimitExceeded};
use std::io::{ErrorKind, Read};
use tracing::warn;

pub const MAGIC: [u8; 4] = *b"LMGO";
pub const VERSION: u8 = 1;

/// Bytes before the metadata region (magic + version + metaLen)
pub const PREAMBLE_SIZE: usize = 9;

/// A decoded (or to-be-encoded) frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Format version
    pub version: u8,

    /// Raw metadata JSON bytes
    pub metadata: Vec<u8>,

    /// Raw payload bytes (compressed, possibly encrypted)
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a current-version frame
    pub fn new(metadata: Vec<u8>, payload: Vec<u8>) -> Self {
        Frame {
            version: VERSION,
            metadata,
            payload,
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self.version, &self.metadata, &self.payload)
    }

    /// Decode a frame from an in-memory buffer
    pub fn from_bytes(bytes: &[u8], limits: &Limits) -> Result<Self> {
        let mut reader = bytes;
        Self::read_from(&mut reader, limits)
    }

    /// Decode a frame from a reader
    pub fn read_from<R: Read>(reader: &mut R, limits: &Limits) -> Result<Self> {
        let magic: [u8; 4] = read_array(reader)?;
        if magic != MAGIC {
            warn!("Rejected frame: bad magic {:02x?}", magic);
            return Err(FormatError::BadMagic.into());
        }

        let [version] = read_array::<1, _>(reader)?;
        if version != VERSION {
            warn!("Rejected frame: unsupported version {}", version);
            return Err(FormatError::UnsupportedVersion(version).into());
        }

        let meta_len = u64::from(u32::from_be_bytes(read_array(reader)?));
        if meta_len > limits.meta_cap {
            warn!("Rejected frame: metadata length {} over cap", meta_len);
            return Err(SizeLimitExceeded::Metadata(meta_len).into());
        }
        let metadata = read_region(reader, meta_len)?;

        let data_len = u64::from(u32::from_be_bytes(read_array(reader)?));
        if data_len > limits.payload_cap {
            warn!("Rejected frame: payload length {} over cap", data_len);
            return Err(SizeLimitExceeded::Payload(data_len).into());
        }
        let payload = read_region(reader, data_len)?;

        Ok(Frame {
            version,
            metadata,
            payload,
        })
    }
}

/// Emit `MAGIC ‖ version ‖ u32be(len(meta)) ‖ meta ‖ u32be(len(payload)) ‖ payload`
pub fn encode(version: u8, metadata: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let meta_len = u32::try_from(metadata.len())
        .map_err(|_| SizeLimitExceeded::Metadata(metadata.len() as u64))?;
    let data_len = u32::try_from(payload.len())
        .map_err(|_| SizeLimitExceeded::Payload(payload.len() as u64))?;

    let mut bytes = Vec::with_capacity(PREAMBLE_SIZE + 4 + metadata.len() + payload.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.push(version);
    bytes.extend_from_slice(&meta_len.to_be_bytes());
    bytes.extend_from_slice(metadata);
    bytes.extend_from_slice(&data_len.to_be_bytes());
    bytes.extend_from_slice(payload);
    Ok(bytes)
}

/// Decode `(metadata, payload)` from an in-memory buffer
pub fn decode(bytes: &[u8], limits: &Limits) -> Result<(Vec<u8>, Vec<u8>)> {
    let frame = Frame::from_bytes(bytes, limits)?;
    Ok((frame.metadata, frame.payload))
}

fn read_array<const N: usize, R: Read>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(map_read_error)?;
    Ok(buf)
}

/// Read exactly `len` bytes, growing the buffer only as data arrives
fn read_region<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader
        .take(len)
        .read_to_end(&mut buf)
        .map_err(map_read_error)?;
    if (buf.len() as u64) < len {
        return Err(FormatError::Truncated.into());
    }
    Ok(buf)
}

fn map_read_error(e: std::io::Error) -> LamoError {
    if e.kind() == ErrorKind::UnexpectedEof {
        FormatError::Truncated.into()
    } else {
        LamoError::Stream(e)
    }
}
