//! Whole-file LAMO encode/decode over opaque inner bytes
//!
//! Write: compress -> [encrypt, mark `encrypted`/`salt`] -> fill metadata
//! defaults -> size checks -> frame -> atomic write.
//!
//! Read: frame (caps checked on declared lengths) -> metadata ->
//! [password, decrypt] -> bounded decompress.
//!
//! Every stage either hands its output to the next or ends the call with a
//! typed error. Nothing is retried.

use crate::compression;
use crate::config::Limits;
use crate::encryption::{self, Salt};
use crate::error::{DecryptionError, FormatError, Result, SizeLimitExceeded};
use crate::frame::Frame;
use crate::inner::EncodedImage;
use crate::io::LamoFile;
use crate::metadata::{Metadata, MetadataDefaults, KEY_ENCRYPTED, KEY_SALT};
use crate::password::{PasswordContext, PasswordProvider};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Summary of a file's frame and metadata, without touching the payload
#[derive(Debug, Clone, PartialEq)]
pub struct LamoInfo {
    pub version: u8,
    pub metadata: Metadata,
    /// On-disk payload size (compressed, possibly encrypted)
    pub payload_len: usize,
    pub encrypted: bool,
}

/// Byte-level codec bound to a set of limits
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    limits: Limits,
}

impl Codec {
    pub fn new(limits: Limits) -> Self {
        Codec { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Build a complete frame for `inner`
    ///
    /// Returns the frame and the final metadata that was written into it.
    pub fn encode(
        &self,
        inner: &EncodedImage,
        metadata: Metadata,
        password: Option<&str>,
        level: u32,
    ) -> Result<(Frame, Metadata)> {
        let mut metadata = metadata;

        if password.is_some_and(str::is_empty) {
            return Err(DecryptionError::PasswordRequired.into());
        }

        // Readers inflate at most payload_cap bytes
        if inner.data.len() as u64 > self.limits.payload_cap {
            warn!("Refusing to write {} byte inner buffer", inner.data.len());
            return Err(SizeLimitExceeded::Payload(inner.data.len() as u64).into());
        }

        let mut payload = compression::compress(&inner.data, level)?;

        if let Some(password) = password {
            let salt = Salt::generate();
            payload = encryption::encrypt(&payload, password, &salt)?;
            metadata.set_default(KEY_ENCRYPTED, true);
            metadata.set_default(KEY_SALT, salt.to_base64());
            check_encryption_fields(&metadata, Some(&salt))?;
        } else {
            check_encryption_fields(&metadata, None)?;
        }

        metadata.fill_defaults(&MetadataDefaults {
            width: inner.width,
            height: inner.height,
            mode: inner.mode.clone(),
            inner_format: inner.format.clone(),
            zlib_level: level,
        });

        let meta_bytes = metadata.to_bytes()?;
        if meta_bytes.len() as u64 > self.limits.meta_cap {
            warn!("Refusing to write {} bytes of metadata", meta_bytes.len());
            return Err(SizeLimitExceeded::Metadata(meta_bytes.len() as u64).into());
        }
        if payload.len() as u64 > self.limits.payload_cap {
            warn!("Refusing to write {} byte payload", payload.len());
            return Err(SizeLimitExceeded::Payload(payload.len() as u64).into());
        }

        debug!(
            "Encoded frame: {} bytes metadata, {} bytes payload",
            meta_bytes.len(),
            payload.len()
        );
        Ok((Frame::new(meta_bytes, payload), metadata))
    }

    /// Encode and atomically write to `path`
    pub fn write_bytes<P: AsRef<Path>>(
        &self,
        path: P,
        inner: &EncodedImage,
        metadata: Metadata,
        password: Option<&str>,
        level: u32,
    ) -> Result<Metadata> {
        let path = path.as_ref();
        let (frame, metadata) = self.encode(inner, metadata, password, level)?;
        LamoFile::new(path).write_frame(&frame)?;
        info!(
            "Wrote {:?} ({}x{}, encrypted: {})",
            path,
            inner.width,
            inner.height,
            password.is_some()
        );
        Ok(metadata)
    }

    /// Decode an already-parsed frame into inner bytes and metadata
    pub fn decode<W: PasswordProvider + ?Sized>(
        &self,
        frame: Frame,
        path: Option<&Path>,
        provider: &W,
    ) -> Result<(Vec<u8>, Metadata)> {
        let metadata = Metadata::from_bytes(&frame.metadata)?;
        debug!("Metadata parsed: {} keys", metadata.len());

        let mut payload = frame.payload;
        if metadata.is_encrypted()? {
            let Some(text) = metadata.salt() else {
                warn!("Encrypted file has no salt");
                return Err(FormatError::BadMetadata.into());
            };
            let salt = Salt::from_base64(text)?;

            let context = PasswordContext {
                path,
                metadata: &metadata,
            };
            let password = provider
                .request_password(&context)
                .filter(|p| !p.is_empty())
                .map(Zeroizing::new)
                .ok_or(DecryptionError::PasswordRequired)?;

            payload = encryption::decrypt(&payload, &password, &salt)?;
            debug!("Payload decrypted: {} bytes", payload.len());
        }

        let inner = compression::decompress(&payload, self.limits.payload_cap)?;
        Ok((inner, metadata))
    }

    /// Read `path` and return the inner bytes plus metadata
    pub fn read_bytes<P, W>(&self, path: P, provider: &W) -> Result<(Vec<u8>, Metadata)>
    where
        P: AsRef<Path>,
        W: PasswordProvider + ?Sized,
    {
        let path = path.as_ref();
        let frame = LamoFile::new(path).read_frame(&self.limits)?;
        let (inner, metadata) = self.decode(frame, Some(path), provider)?;
        info!("Read {:?} ({} byte inner buffer)", path, inner.len());
        Ok((inner, metadata))
    }

    /// Decode frame and metadata only; no password, no decompression
    pub fn inspect<P: AsRef<Path>>(&self, path: P) -> Result<LamoInfo> {
        let frame = LamoFile::new(path.as_ref()).read_frame(&self.limits)?;
        let metadata = Metadata::from_bytes(&frame.metadata)?;
        let encrypted = metadata.is_encrypted()?;
        Ok(LamoInfo {
            version: frame.version,
            payload_len: frame.payload.len(),
            metadata,
            encrypted,
        })
    }
}

/// Reject caller metadata that would mislabel the payload
///
/// `encrypted`/`salt` are only defaulted, so a stale caller value (for
/// example metadata copied from another encrypted file) must be caught here
/// or the written file could never be decrypted.
fn check_encryption_fields(metadata: &Metadata, salt: Option<&Salt>) -> Result<()> {
    let declared = metadata.is_encrypted()?;
    match salt {
        Some(salt) => {
            let salt_matches = metadata.get(KEY_SALT) == Some(&Value::from(salt.to_base64()));
            if !declared || !salt_matches {
                warn!("Caller metadata overrides encryption fields; refusing to write");
                return Err(FormatError::BadMetadata.into());
            }
        }
        None if declared => {
            warn!("Metadata declares encryption but no password was given");
            return Err(FormatError::BadMetadata.into());
        }
        None => {}
    }
    Ok(())
}
