//! Disk I/O for LAMO files
//!
//! Writes are all-or-nothing: the complete frame is built in memory, written
//! to a temporary file in the destination directory, synced, then renamed
//! over the target. A failed write leaves either the old file or nothing.

use crate::config::Limits;
use crate::error::{LamoError, Result};
use crate::frame::Frame;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Handle on a LAMO file path
#[derive(Debug, Clone)]
pub struct LamoFile {
    path: PathBuf,
}

impl LamoFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        LamoFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream-decode the frame, checking caps before each region is read
    pub fn read_frame(&self, limits: &Limits) -> Result<Frame> {
        let file = File::open(&self.path).map_err(LamoError::io(&self.path))?;
        let mut reader = BufReader::new(file);
        Frame::read_from(&mut reader, limits).map_err(|e| e.at_path(&self.path))
    }

    /// Encode and atomically replace the file
    pub fn write_frame(&self, frame: &Frame) -> Result<()> {
        let bytes = frame.to_bytes()?;
        write_atomic(&self.path, &bytes)
    }
}

/// Write `bytes` to `path` via temp file + rename
pub fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(LamoError::io(path))?;
    tmp.write_all(bytes).map_err(LamoError::io(path))?;
    tmp.as_file().sync_all().map_err(LamoError::io(path))?;
    tmp.persist(path).map_err(|e| LamoError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    debug!("Wrote {} bytes to {:?}", bytes.len(), path);
    Ok(())
}
