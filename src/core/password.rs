//! Password provider seam
//!
//! The codec never prompts. When a file declares `encrypted: true` it asks
//! the injected provider once; `None` (or an empty answer) aborts the read
//! with `PasswordRequired`.

use crate::metadata::Metadata;
use std::path::Path;

/// What the provider is told about the file being opened
#[derive(Debug, Clone, Copy)]
pub struct PasswordContext<'a> {
    /// File being read, when reading from disk
    pub path: Option<&'a Path>,

    /// Already-decoded metadata of that file
    pub metadata: &'a Metadata,
}

/// Supplies passwords for encrypted files
pub trait PasswordProvider: Send + Sync {
    fn request_password(&self, context: &PasswordContext<'_>) -> Option<String>;
}

impl<F> PasswordProvider for F
where
    F: Fn(&PasswordContext<'_>) -> Option<String> + Send + Sync,
{
    fn request_password(&self, context: &PasswordContext<'_>) -> Option<String> {
        self(context)
    }
}

/// Provider that never has a password
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPassword;

impl PasswordProvider for NoPassword {
    fn request_password(&self, _context: &PasswordContext<'_>) -> Option<String> {
        None
    }
}

/// Provider that always answers with the same password
#[derive(Clone)]
pub struct StaticPassword(String);

impl StaticPassword {
    pub fn new<S: Into<String>>(password: S) -> Self {
        StaticPassword(password.into())
    }
}

impl std::fmt::Debug for StaticPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticPassword(<redacted>)")
    }
}

impl PasswordProvider for StaticPassword {
    fn request_password(&self, _context: &PasswordContext<'_>) -> Option<String> {
        Some(self.0.clone())
    }
}
