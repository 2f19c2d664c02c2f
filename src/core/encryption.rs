//! Password-based authenticated encryption for LAMO payloads
//!
//! Tokens use the Fernet layout, so files interoperate with other Fernet
//! implementations given the same password and salt:
//!
//! ```text
//! base64url( 0x80 ‖ timestamp: u64 BE ‖ iv: 16 ‖ AES-128-CBC(PKCS7) ‖ HMAC-SHA256: 32 )
//! ```
//!
//! **Design**:
//! - Key: PBKDF2-HMAC-SHA256(password, salt, 480 000 rounds) -> 32 bytes,
//!   first half signs, second half encrypts
//! - Per-file 16-byte random salt, stored in metadata as url-safe base64
//! - The HMAC is verified (constant time) before any decryption happens
//! - Every decrypt failure surfaces as `AuthenticationFailed`; the real cause
//!   is only logged

use crate::error::{DecryptionError, FormatError, LamoError, Result};
use aes::Aes128;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// PBKDF2 rounds
pub const PBKDF2_ITERATIONS: u32 = 480_000;

/// Salt length generated for new files
pub const SALT_SIZE: usize = 16;

/// Derived key length (signing half + encryption half)
pub const KEY_SIZE: usize = 32;

/// Fernet token version byte
pub const TOKEN_VERSION: u8 = 0x80;

const HALF_KEY: usize = KEY_SIZE / 2;
const IV_SIZE: usize = 16;
const BLOCK_SIZE: usize = 16;
const TAG_SIZE: usize = 32;
const TIMESTAMP_SIZE: usize = 8;
const HEADER_SIZE: usize = 1 + TIMESTAMP_SIZE + IV_SIZE;

/// Smallest well-formed decoded token (one cipher block)
pub const MIN_TOKEN_SIZE: usize = HEADER_SIZE + BLOCK_SIZE + TAG_SIZE;

/// Why a token was rejected (internal; never surfaced)
#[derive(Error, Debug)]
enum TokenError {
    #[error("token is not valid url-safe base64")]
    Encoding,
    #[error("token too short: {0} bytes")]
    TooShort(usize),
    #[error("unknown token version {0:#04x}")]
    Version(u8),
    #[error("HMAC verification failed")]
    Signature,
    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    Length(usize),
    #[error("invalid PKCS7 padding")]
    Padding,
    #[error("HMAC key rejected")]
    Key,
}

/// Key-derivation salt
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Fresh random salt from the OS generator
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Salt(bytes)
    }

    /// Wrap existing salt bytes (must be non-empty)
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        if bytes.is_empty() {
            None
        } else {
            Some(Salt(bytes))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Url-safe base64 with padding, as stored in metadata
    pub fn to_base64(&self) -> String {
        URL_SAFE.encode(&self.0)
    }

    /// Parse the metadata form; malformed or empty is `BadMetadata`
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = URL_SAFE.decode(text).map_err(|e| {
            debug!("Salt is not url-safe base64: {}", e);
            LamoError::from(FormatError::BadMetadata)
        })?;
        Salt::from_bytes(bytes).ok_or_else(|| FormatError::BadMetadata.into())
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", self.to_base64())
    }
}

/// Key derived from a password, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    signing: [u8; HALF_KEY],
    encryption: [u8; HALF_KEY],
}

impl DerivedKey {
    /// PBKDF2-HMAC-SHA256 at the format's fixed round count
    pub fn derive(password: &str, salt: &Salt) -> Self {
        Self::derive_with_iterations(password, salt, PBKDF2_ITERATIONS)
    }

    pub(crate) fn derive_with_iterations(password: &str, salt: &Salt, rounds: u32) -> Self {
        let mut raw = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), rounds, &mut raw);
        let key = Self::from_raw(&raw);
        raw.zeroize();
        key
    }

    fn from_raw(raw: &[u8; KEY_SIZE]) -> Self {
        let mut signing = [0u8; HALF_KEY];
        let mut encryption = [0u8; HALF_KEY];
        signing.copy_from_slice(&raw[..HALF_KEY]);
        encryption.copy_from_slice(&raw[HALF_KEY..]);
        DerivedKey {
            signing,
            encryption,
        }
    }

    /// Url-safe base64 form (the Fernet key string)
    pub fn to_base64(&self) -> String {
        let mut raw = [0u8; KEY_SIZE];
        raw[..HALF_KEY].copy_from_slice(&self.signing);
        raw[HALF_KEY..].copy_from_slice(&self.encryption);
        let text = URL_SAFE.encode(raw);
        raw.zeroize();
        text
    }

    /// Parse a Fernet key string
    pub fn from_base64(text: &str) -> Option<Self> {
        let mut bytes = URL_SAFE.decode(text).ok()?;
        let key = <&[u8; KEY_SIZE]>::try_from(bytes.as_slice())
            .ok()
            .map(Self::from_raw);
        bytes.zeroize();
        key
    }

    fn mac(&self) -> std::result::Result<HmacSha256, TokenError> {
        <HmacSha256 as Mac>::new_from_slice(&self.signing).map_err(|_| TokenError::Key)
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Derive the key for `(password, salt)`
pub fn derive_key(password: &str, salt: &Salt) -> DerivedKey {
    DerivedKey::derive(password, salt)
}

/// Encrypt `data` into an ASCII Fernet token
pub fn encrypt(data: &[u8], password: &str, salt: &Salt) -> Result<Vec<u8>> {
    let key = DerivedKey::derive(password, salt);
    encrypt_with_key(data, &key)
}

/// Encrypt with an already derived key
pub fn encrypt_with_key(data: &[u8], key: &DerivedKey) -> Result<Vec<u8>> {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    let timestamp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
    seal(data, key, &iv, timestamp).map_err(|e| {
        debug!("Token sealing failed: {}", e);
        LamoError::Encryption
    })
}

/// Verify and decrypt a token produced by [`encrypt`]
pub fn decrypt(token: &[u8], password: &str, salt: &Salt) -> Result<Vec<u8>> {
    let key = DerivedKey::derive(password, salt);
    decrypt_with_key(token, &key)
}

/// Verify and decrypt with an already derived key
pub fn decrypt_with_key(token: &[u8], key: &DerivedKey) -> Result<Vec<u8>> {
    open(token, key).map_err(|e| {
        debug!("Token rejected: {}", e);
        LamoError::from(DecryptionError::AuthenticationFailed)
    })
}

fn seal(
    data: &[u8],
    key: &DerivedKey,
    iv: &[u8; IV_SIZE],
    timestamp: u64,
) -> std::result::Result<Vec<u8>, TokenError> {
    let ciphertext = Aes128CbcEnc::new((&key.encryption).into(), iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(data);

    let mut raw = Vec::with_capacity(HEADER_SIZE + ciphertext.len() + TAG_SIZE);
    raw.push(TOKEN_VERSION);
    raw.extend_from_slice(&timestamp.to_be_bytes());
    raw.extend_from_slice(iv);
    raw.extend_from_slice(&ciphertext);

    let mut mac = key.mac()?;
    mac.update(&raw);
    raw.extend_from_slice(&mac.finalize().into_bytes());

    Ok(URL_SAFE.encode(raw).into_bytes())
}

fn open(token: &[u8], key: &DerivedKey) -> std::result::Result<Vec<u8>, TokenError> {
    let raw = URL_SAFE.decode(token).map_err(|_| TokenError::Encoding)?;
    if raw.len() < MIN_TOKEN_SIZE {
        return Err(TokenError::TooShort(raw.len()));
    }
    if raw[0] != TOKEN_VERSION {
        return Err(TokenError::Version(raw[0]));
    }

    let (signed, tag) = raw.split_at(raw.len() - TAG_SIZE);
    let mut mac = key.mac()?;
    mac.update(signed);
    mac.verify_slice(tag).map_err(|_| TokenError::Signature)?;

    let (iv, ciphertext) = signed[1 + TIMESTAMP_SIZE..].split_at(IV_SIZE);
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(TokenError::Length(ciphertext.len()));
    }

    let mut iv_block = [0u8; IV_SIZE];
    iv_block.copy_from_slice(iv);
    Aes128CbcDec::new((&key.encryption).into(), (&iv_block).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| TokenError::Padding)
}
