//! Error taxonomy for LAMO encode/decode
//!
//! Every failure on untrusted input is a typed value, never a panic. The
//! `Display` text of these types carries only typed detail (lengths, version
//! numbers); raw messages from the inflater or the cipher are logged at the
//! failure site and never end up in an error value.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Malformed or unsupported input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Invalid magic number in header")]
    BadMagic,

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    #[error("File is truncated")]
    Truncated,

    #[error("Metadata block is not a valid JSON object")]
    BadMetadata,

    #[error("Embedded image could not be decoded")]
    InvalidInnerImage,

    #[error("Compressed payload is corrupt")]
    CorruptPayload,
}

/// Oversized or hostile input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeLimitExceeded {
    /// Declared metadata length above the metadata cap
    #[error("Metadata length {0} exceeds limit")]
    Metadata(u64),

    /// Declared payload length above the payload cap
    #[error("Payload length {0} exceeds limit")]
    Payload(u64),

    /// Decompressed output crossed the cap while streaming
    #[error("Decompressed size exceeded limit of {0} bytes (compression bomb)")]
    CompressionBomb(u64),
}

/// Password-protected payload failures
///
/// Wrong password and corrupted ciphertext share one variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("A password is required to open this file")]
    PasswordRequired,

    #[error("Decryption failed: wrong password or corrupted file")]
    AuthenticationFailed,
}

#[derive(Error, Debug)]
pub enum LamoError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    SizeLimit(#[from] SizeLimitExceeded),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("Invalid compression level: {0} (must be 0-9)")]
    InvalidCompressionLevel(u32),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Encryption failed")]
    Encryption,

    #[error("Operation timed out")]
    TimedOut,
}

impl LamoError {
    /// Attach a path to an anonymous stream error
    pub fn at_path<P: AsRef<Path>>(self, path: P) -> Self {
        match self {
            LamoError::Stream(source) => LamoError::Io {
                path: path.as_ref().to_path_buf(),
                source,
            },
            other => other,
        }
    }

    /// Build a closure that wraps an `io::Error` with `path`
    pub(crate) fn io<P: AsRef<Path>>(path: P) -> impl FnOnce(std::io::Error) -> LamoError {
        let path = path.as_ref().to_path_buf();
        move |source| LamoError::Io { path, source }
    }

    /// Fixed, sanitized phrase suitable for showing to an end user
    pub fn user_message(&self) -> &'static str {
        match self {
            LamoError::Format(FormatError::BadMagic)
            | LamoError::Format(FormatError::UnsupportedVersion(_)) => {
                "This file is not a supported LAMO file."
            }
            LamoError::Format(_) => "The file may be corrupted or malicious.",
            LamoError::SizeLimit(_) => "The file exceeds the allowed size limits.",
            LamoError::Decryption(DecryptionError::PasswordRequired) => {
                "A password is required to open this file."
            }
            LamoError::Decryption(DecryptionError::AuthenticationFailed) => {
                "Wrong password or corrupted file."
            }
            LamoError::Io { .. } | LamoError::Stream(_) => {
                "Could not access the file. Check permissions and disk space."
            }
            LamoError::InvalidCompressionLevel(_) => "Compression level must be between 0 and 9.",
            LamoError::Config(_) => "The configuration is invalid.",
            LamoError::Encryption => "The file could not be encrypted.",
            LamoError::TimedOut => "The operation took too long and was abandoned.",
        }
    }
}

pub type Result<T> = std::result::Result<T, LamoError>;
