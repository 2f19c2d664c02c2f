//! zlib payload compression with a bounded, streaming inflater
//!
//! **Design**:
//! - Compression is a plain zlib stream (RFC 1950) at level 0-9
//! - Decompression never trusts the input about its expanded size: output
//!   is produced in fixed `CHUNK_SIZE` steps and a running counter is checked
//!   after every step, so a hostile stream is abandoned as soon as it crosses
//!   the cap instead of after it has been fully materialized
//! - Nothing past the cap is ever appended to the output buffer

use crate::error::{FormatError, LamoError, Result, SizeLimitExceeded};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;
use tracing::{debug, warn};

/// Output step for the inflater
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Highest zlib level
pub const MAX_LEVEL: u32 = 9;

/// Compress `data` into a zlib stream at `level` (0 = store, 9 = best)
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    if level > MAX_LEVEL {
        return Err(LamoError::InvalidCompressionLevel(level));
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    debug!(
        "Compressed {} -> {} bytes at level {}",
        data.len(),
        compressed.len(),
        level
    );
    Ok(compressed)
}

/// Decompress a zlib stream, failing once the output would exceed `cap`
pub fn decompress(data: &[u8], cap: u64) -> Result<Vec<u8>> {
    BoundedInflater::new(cap).inflate(data)
}

/// Streaming zlib inflater with an output ceiling
///
/// `bytes_out` is the number of bytes the stream has produced so far,
/// including the step that tripped the cap.
#[derive(Debug)]
pub struct BoundedInflater {
    cap: u64,
    chunk_size: usize,
    bytes_out: u64,
}

impl BoundedInflater {
    pub fn new(cap: u64) -> Self {
        BoundedInflater {
            cap,
            chunk_size: CHUNK_SIZE,
            bytes_out: 0,
        }
    }

    /// Override the output step (minimum 1 byte)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn cap(&self) -> u64 {
        self.cap
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Inflate a complete zlib stream
    ///
    /// Bytes after the end of the stream are ignored. A stream that ends
    /// before its terminator is reported as truncated.
    pub fn inflate(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut stream = Decompress::new(true);
        let mut chunk = vec![0u8; self.chunk_size];
        let mut output = Vec::new();
        let mut input = data;
        self.bytes_out = 0;

        loop {
            let in_before = stream.total_in();
            let out_before = stream.total_out();

            let status = stream
                .decompress(input, &mut chunk, FlushDecompress::None)
                .map_err(|e| {
                    debug!("Inflate failed after {} bytes: {}", self.bytes_out, e);
                    LamoError::from(FormatError::CorruptPayload)
                })?;

            let consumed = (stream.total_in() - in_before) as usize;
            let produced = (stream.total_out() - out_before) as usize;
            input = &input[consumed..];
            self.bytes_out += produced as u64;

            if self.bytes_out > self.cap {
                warn!(
                    "Decompression aborted at {} bytes (cap {})",
                    self.bytes_out, self.cap
                );
                return Err(SizeLimitExceeded::CompressionBomb(self.cap).into());
            }
            output.extend_from_slice(&chunk[..produced]);

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    if consumed == 0 && produced == 0 {
                        debug!("zlib stream ended early at {} bytes", self.bytes_out);
                        return Err(FormatError::Truncated.into());
                    }
                }
            }
        }

        debug!("Decompressed {} -> {} bytes", data.len(), output.len());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_levels() {
        let data = b"Hello, LAMO! ".repeat(500);
        for level in 0..=MAX_LEVEL {
            let compressed = compress(&data, level).unwrap();
            let decompressed = decompress(&compressed, data.len() as u64).unwrap();
            assert_eq!(decompressed, data, "level {}", level);
        }
    }

    #[test]
    fn test_level_nine_shrinks_repetitive_data() {
        let data = vec![0x42u8; 100_000];
        let compressed = compress(&data, 9).unwrap();
        assert!(compressed.len() < 1_000);
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(
            compress(b"x", 10),
            Err(LamoError::InvalidCompressionLevel(10))
        ));
    }

    #[test]
    fn test_output_exactly_at_cap_is_accepted() {
        let data = vec![1u8; 4096];
        let compressed = compress(&data, 6).unwrap();
        assert_eq!(decompress(&compressed, 4096).unwrap().len(), 4096);
    }

    #[test]
    fn test_one_byte_over_cap_is_a_bomb() {
        let data = vec![1u8; 4097];
        let compressed = compress(&data, 6).unwrap();
        assert!(matches!(
            decompress(&compressed, 4096),
            Err(LamoError::SizeLimit(SizeLimitExceeded::CompressionBomb(4096)))
        ));
    }

    #[test]
    fn test_bomb_stops_streaming_early() {
        // 64 MiB of zeros compresses to ~64 KiB
        let bomb = compress(&vec![0u8; 64 * 1024 * 1024], 9).unwrap();
        let cap = 1024 * 1024;

        let mut inflater = BoundedInflater::new(cap);
        let result = inflater.inflate(&bomb);

        assert!(matches!(
            result,
            Err(LamoError::SizeLimit(SizeLimitExceeded::CompressionBomb(_)))
        ));
        assert!(inflater.bytes_out() > cap);
        assert!(inflater.bytes_out() <= cap + CHUNK_SIZE as u64);
    }

    #[test]
    fn test_small_chunks_still_roundtrip() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let compressed = compress(&data, 9).unwrap();
        let mut inflater = BoundedInflater::new(data.len() as u64).with_chunk_size(7);
        assert_eq!(inflater.inflate(&compressed).unwrap(), data);
        assert_eq!(inflater.bytes_out(), data.len() as u64);
    }

    #[test]
    fn test_truncated_stream() {
        let data: Vec<u8> = (0..5_000u32).map(|i| (i * 7) as u8).collect();
        let compressed = compress(&data, 9).unwrap();
        let cut = &compressed[..compressed.len() / 2];
        assert!(matches!(
            decompress(cut, 1 << 20),
            Err(LamoError::Format(FormatError::Truncated))
        ));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(matches!(
            decompress(b"this is not zlib at all", 1 << 20),
            Err(LamoError::Format(FormatError::CorruptPayload))
        ));
    }

    #[test]
    fn test_empty_input_is_truncated() {
        assert!(matches!(
            decompress(b"", 1 << 20),
            Err(LamoError::Format(FormatError::Truncated))
        ));
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let compressed = compress(b"", 9).unwrap();
        assert!(decompress(&compressed, 1).unwrap().is_empty());
    }
}
