//! # LAMO - Hardened Image Archive Container
//!
//! `lamo-rs` reads and writes LAMO files: a single image stored losslessly
//! (as PNG) inside a small binary frame with a JSON metadata block, a zlib
//! payload and optional password encryption.
//!
//! - **Bounded decoding**: metadata, payload and decompressed sizes are
//!   capped before allocation; inner images are checked against a pixel
//!   ceiling before decode
//! - **Password encryption**: PBKDF2-HMAC-SHA256 + Fernet-compatible tokens
//! - **Atomic writes**: a failed write never leaves a partial file behind
//! - **Caller metadata wins**: derived keys are only filled when missing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lamo_rs::{Lamo, Metadata, NoPassword, Result};
//!
//! # fn main() -> Result<()> {
//! let lamo = Lamo::new();
//!
//! // Convert any supported image to photo.lamo in the current directory
//! let out = lamo.convert_file("photo.jpg", None, None)?;
//!
//! // Read it back
//! let (image, metadata) = lamo.read(&out, &NoPassword)?;
//! println!("{}x{} from {:?}", image.width(), image.height(), metadata.get("source"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Encryption and limits
//!
//! ```rust,no_run
//! use lamo_rs::{Lamo, Limits, Metadata, StaticPassword, Result};
//!
//! # fn main() -> Result<()> {
//! let lamo = Lamo::builder()
//!     .limits(Limits { max_pixels: 50_000_000, ..Limits::default() })
//!     .zlib_level(6)
//!     .build()?;
//!
//! let image = image::DynamicImage::new_rgb8(64, 64);
//! lamo.write("secret.lamo", &image, Metadata::new(), Some("hunter2"))?;
//!
//! let (_image, _metadata) = lamo.read("secret.lamo", &StaticPassword::new("hunter2"))?;
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core resolve
#[allow(unused_imports)]
pub(crate) use self::core::{
    codec, compression, config, encryption, error, frame, inner, io, metadata, password,
};

pub use crate::core::{
    codec::{Codec, LamoInfo},
    config::{LamoConfig, Limits},
    encryption::{DerivedKey, Salt},
    error::{DecryptionError, FormatError, LamoError, Result, SizeLimitExceeded},
    frame::{Frame, MAGIC, VERSION},
    inner::{EncodedImage, ImageCodec, PngCodec},
    metadata::Metadata,
    password::{NoPassword, PasswordContext, PasswordProvider, StaticPassword},
};

#[cfg(feature = "async")]
pub use crate::core::async_io::{read_async, write_async};

use crate::core::inner::{format_name, open_source_image};
use crate::core::io::write_atomic;
use crate::core::metadata::{KEY_ORIG_FORMAT, KEY_SOURCE};
use image::DynamicImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fallback output name when an input has no usable stem
const FALLBACK_OUTPUT: &str = "image.lamo";

/// Image-level LAMO reader/writer
///
/// Holds configuration and the image collaborator. Cheap to clone and safe
/// to share between threads; no state is kept between calls.
#[derive(Clone)]
pub struct Lamo {
    config: LamoConfig,
    image_codec: Arc<dyn ImageCodec>,
}

impl Lamo {
    /// Default limits, zlib level 9, PNG inner images
    pub fn new() -> Self {
        Lamo {
            config: LamoConfig::default(),
            image_codec: Arc::new(PngCodec),
        }
    }

    pub fn builder() -> LamoBuilder {
        LamoBuilder::new()
    }

    pub fn config(&self) -> &LamoConfig {
        &self.config
    }

    pub fn limits(&self) -> &Limits {
        &self.config.limits
    }

    /// Byte-level codec sharing this instance's limits
    pub fn codec(&self) -> Codec {
        Codec::new(self.config.limits)
    }

    /// Write `image` to `path` at the configured zlib level
    ///
    /// Returns the metadata as written (caller keys plus filled defaults).
    pub fn write<P: AsRef<Path>>(
        &self,
        path: P,
        image: &DynamicImage,
        metadata: Metadata,
        password: Option<&str>,
    ) -> Result<Metadata> {
        self.write_with_level(path, image, metadata, password, self.config.zlib_level)
    }

    /// Write `image` to `path` at an explicit zlib level
    pub fn write_with_level<P: AsRef<Path>>(
        &self,
        path: P,
        image: &DynamicImage,
        metadata: Metadata,
        password: Option<&str>,
        level: u32,
    ) -> Result<Metadata> {
        let encoded = self.image_codec.encode_lossless(image)?;
        debug!(
            "Inner image encoded: {} bytes ({})",
            encoded.data.len(),
            encoded.mode
        );
        self.codec()
            .write_bytes(path, &encoded, metadata, password, level)
    }

    /// Read `path` and decode its inner image
    pub fn read<P, W>(&self, path: P, provider: &W) -> Result<(DynamicImage, Metadata)>
    where
        P: AsRef<Path>,
        W: PasswordProvider + ?Sized,
    {
        let path = path.as_ref();
        let (inner, metadata) = self.codec().read_bytes(path, provider)?;
        let image = self
            .image_codec
            .decode(&inner, self.config.limits.max_pixels)?;

        let declared = (metadata.width(), metadata.height());
        let actual = (u64::from(image.width()), u64::from(image.height()));
        if let (Some(width), Some(height)) = declared {
            if (width, height) != actual {
                warn!(
                    "{:?} declares {}x{} but holds {}x{}",
                    path, width, height, actual.0, actual.1
                );
            }
        }

        Ok((image, metadata))
    }

    /// Frame and metadata summary; needs no password
    pub fn inspect<P: AsRef<Path>>(&self, path: P) -> Result<LamoInfo> {
        self.codec().inspect(path)
    }

    /// Convert an image file (PNG, JPEG, WebP, BMP, GIF) to LAMO
    ///
    /// Records `source` (base name only) and `orig_format`. Without
    /// `output` the file lands in the current directory as
    /// `<input stem>.lamo`. Returns the path written.
    pub fn convert_file<P: AsRef<Path>>(
        &self,
        input: P,
        output: Option<&Path>,
        password: Option<&str>,
    ) -> Result<PathBuf> {
        let input = input.as_ref();
        let (image, format) = open_source_image(input, &self.config.limits)?;

        let mut metadata = Metadata::new();
        if let Some(name) = input.file_name() {
            metadata.insert(KEY_SOURCE, name.to_string_lossy().into_owned());
        }
        metadata.insert(
            KEY_ORIG_FORMAT,
            format.map_or("UNKNOWN", format_name).to_string(),
        );

        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(input));
        self.write(&output, &image, metadata, password)?;
        info!("Converted {:?} -> {:?}", input, output);
        Ok(output)
    }

    /// Reconstruct the stored image and write it as PNG
    pub fn export_png<P, Q, W>(&self, lamo_path: P, png_path: Q, provider: &W) -> Result<Metadata>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        W: PasswordProvider + ?Sized,
    {
        let (image, metadata) = self.read(lamo_path, provider)?;
        let png = PngCodec.encode_lossless(&image)?;
        write_atomic(png_path.as_ref(), &png.data)?;
        info!("Exported {:?}", png_path.as_ref());
        Ok(metadata)
    }
}

impl Default for Lamo {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lamo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lamo")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Lamo`] with custom limits, level or image collaborator
///
/// # Examples
///
/// ```rust,no_run
/// use lamo_rs::{Lamo, LamoConfig};
///
/// # fn main() -> lamo_rs::Result<()> {
/// let lamo = Lamo::builder()
///     .config(LamoConfig::load("lamo.toml")?)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct LamoBuilder {
    config: LamoConfig,
    image_codec: Option<Arc<dyn ImageCodec>>,
}

impl LamoBuilder {
    pub fn new() -> Self {
        LamoBuilder {
            config: LamoConfig::default(),
            image_codec: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: LamoConfig) -> Self {
        self.config = config;
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.config.limits = limits;
        self
    }

    /// zlib level used by [`Lamo::write`] (0-9)
    pub fn zlib_level(mut self, level: u32) -> Self {
        self.config.zlib_level = level;
        self
    }

    /// Use a different image collaborator
    pub fn image_codec<C: ImageCodec + 'static>(mut self, codec: C) -> Self {
        self.image_codec = Some(Arc::new(codec));
        self
    }

    /// Validate the configuration and build
    pub fn build(self) -> Result<Lamo> {
        self.config.check()?;
        Ok(Lamo {
            config: self.config,
            image_codec: self.image_codec.unwrap_or_else(|| Arc::new(PngCodec)),
        })
    }
}

impl Default for LamoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `image` with default limits
pub fn write_lamo<P: AsRef<Path>>(
    path: P,
    image: &DynamicImage,
    metadata: Metadata,
    password: Option<&str>,
    level: u32,
) -> Result<Metadata> {
    Lamo::new().write_with_level(path, image, metadata, password, level)
}

/// Read `path` with default limits
pub fn read_lamo<P, W>(path: P, provider: &W) -> Result<(DynamicImage, Metadata)>
where
    P: AsRef<Path>,
    W: PasswordProvider + ?Sized,
{
    Lamo::new().read(path, provider)
}

/// `<stem>.lamo`, relative to the current directory
///
/// Only the final path component of `input` is used.
pub fn default_output_path(input: &Path) -> PathBuf {
    match input.file_stem() {
        Some(stem) if !stem.is_empty() => {
            let mut name = stem.to_os_string();
            name.push(".lamo");
            PathBuf::from(name)
        }
        _ => PathBuf::from(FALLBACK_OUTPUT),
    }
}
