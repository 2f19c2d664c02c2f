//! LAMO container internals
//!
//! ## Modules
//!
//! - [`frame`] - Binary frame: magic, version, length-prefixed regions
//! - [`metadata`] - Ordered JSON metadata block
//! - [`compression`] - zlib payload with a bounded inflater
//! - [`encryption`] - PBKDF2 key derivation and Fernet-compatible tokens
//! - [`inner`] - Lossless inner image codec (PNG)
//! - [`password`] - Injected password providers
//! - [`io`] - File access and atomic writes
//! - [`codec`] - Write/read pipelines over inner bytes
//! - [`config`] - Resource limits and TOML configuration
//! - [`error`] - Error taxonomy
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ MAGIC "LMGO"                    4 bytes  │
//! │ VERSION 0x01                    1 byte   │
//! │ metaLen (u32 BE)                4 bytes  │
//! │ metadata (UTF-8 JSON object)    metaLen  │
//! │ dataLen (u32 BE)                4 bytes  │
//! │ payload                         dataLen  │
//! │  - zlib(inner PNG), or                   │
//! │  - Fernet token of zlib(inner PNG)       │
//! └──────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod compression;
pub mod config;
pub mod encryption;
pub mod error;
pub mod frame;
pub mod inner;
pub mod io;
pub mod metadata;
pub mod password;

#[cfg(feature = "async")]
pub mod async_io;

pub use codec::{Codec, LamoInfo};
pub use config::{LamoConfig, Limits};
pub use error::{DecryptionError, FormatError, LamoError, Result, SizeLimitExceeded};
pub use frame::Frame;
pub use inner::{EncodedImage, ImageCodec, PngCodec};
pub use io::LamoFile;
pub use metadata::Metadata;
pub use password::{NoPassword, PasswordContext, PasswordProvider, StaticPassword};

/// LAMO format magic number
pub const MAGIC: &[u8; 4] = &frame::MAGIC;
