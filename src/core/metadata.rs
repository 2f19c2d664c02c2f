//! Metadata block: an ordered JSON object
//!
//! Keys written by the encoder:
//! - `width`, `height`: descriptive image dimensions (never used for sizing)
//! - `mode`: pixel layout tag (`RGB`, `RGBA`, `L`, ...)
//! - `inner_format`: format of the embedded buffer, always `PNG`
//! - `zlib_level`: compression level used for the payload
//! - `encrypted` / `salt`: present when the payload is password-protected
//!
//! Callers may add anything else (`source`, `orig_format`, ...). Caller
//! values always win: the codec only fills keys that are missing.

use crate::error::{FormatError, LamoError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

pub const KEY_WIDTH: &str = "width";
pub const KEY_HEIGHT: &str = "height";
pub const KEY_MODE: &str = "mode";
pub const KEY_INNER_FORMAT: &str = "inner_format";
pub const KEY_ZLIB_LEVEL: &str = "zlib_level";
pub const KEY_ENCRYPTED: &str = "encrypted";
pub const KEY_SALT: &str = "salt";
pub const KEY_SOURCE: &str = "source";
pub const KEY_ORIG_FORMAT: &str = "orig_format";

/// Ordered string-keyed JSON mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Metadata(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or overwrite a key, returning the previous value
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Insert only if `key` is absent; returns true when inserted
    pub fn set_default<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> bool {
        let key = key.into();
        if self.0.contains_key(&key) {
            return false;
        }
        self.0.insert(key, value.into());
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn width(&self) -> Option<u64> {
        self.get(KEY_WIDTH).and_then(Value::as_u64)
    }

    pub fn height(&self) -> Option<u64> {
        self.get(KEY_HEIGHT).and_then(Value::as_u64)
    }

    pub fn mode(&self) -> Option<&str> {
        self.get(KEY_MODE).and_then(Value::as_str)
    }

    pub fn inner_format(&self) -> Option<&str> {
        self.get(KEY_INNER_FORMAT).and_then(Value::as_str)
    }

    pub fn zlib_level(&self) -> Option<u64> {
        self.get(KEY_ZLIB_LEVEL).and_then(Value::as_u64)
    }

    /// Whether the payload is declared encrypted
    ///
    /// Absent or `null` means plain; any value other than a boolean is
    /// rejected rather than guessed at.
    pub fn is_encrypted(&self) -> Result<bool> {
        match self.get(KEY_ENCRYPTED) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(other) => {
                debug!("Non-boolean '{}' value: {}", KEY_ENCRYPTED, other);
                Err(FormatError::BadMetadata.into())
            }
        }
    }

    /// The `salt` field as a string, if present
    pub fn salt(&self) -> Option<&str> {
        self.get(KEY_SALT).and_then(Value::as_str)
    }

    /// Copy with `encrypted` and `salt` dropped, for re-saving read metadata
    pub fn without_encryption_fields(&self) -> Self {
        let mut copy = self.clone();
        copy.remove(KEY_ENCRYPTED);
        copy.remove(KEY_SALT);
        copy
    }

    /// Fill derived keys that the caller did not set
    pub fn fill_defaults(&mut self, defaults: &MetadataDefaults) {
        self.set_default(KEY_WIDTH, defaults.width);
        self.set_default(KEY_HEIGHT, defaults.height);
        self.set_default(KEY_MODE, defaults.mode.clone());
        self.set_default(KEY_INNER_FORMAT, defaults.inner_format.clone());
        self.set_default(KEY_ZLIB_LEVEL, defaults.zlib_level);
    }

    /// Serialize as compact UTF-8 JSON, preserving key order
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0).map_err(|e| {
            debug!("Metadata serialization failed: {}", e);
            LamoError::from(FormatError::BadMetadata)
        })
    }

    /// Parse UTF-8 JSON; anything other than an object is rejected
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| {
            debug!("Metadata parse failed: {}", e);
            LamoError::from(FormatError::BadMetadata)
        })?;
        match value {
            Value::Object(map) => Ok(Metadata(map)),
            other => {
                debug!("Metadata is not an object: {}", json_kind(&other));
                Err(FormatError::BadMetadata.into())
            }
        }
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(map: Map<String, Value>) -> Self {
        Metadata(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Metadata(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl TryFrom<Value> for Metadata {
    type Error = LamoError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Metadata(map)),
            _ => Err(FormatError::BadMetadata.into()),
        }
    }
}

/// Codec-derived values for [`Metadata::fill_defaults`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDefaults {
    pub width: u32,
    pub height: u32,
    pub mode: String,
    pub inner_format: String,
    pub zlib_level: u32,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> MetadataDefaults {
        MetadataDefaults {
            width: 640,
            height: 480,
            mode: "RGB".to_string(),
            inner_format: "PNG".to_string(),
            zlib_level: 9,
        }
    }

    #[test]
    fn test_without_encryption_fields() {
        let meta: Metadata = [
            ("source", json!("a.png")),
            ("encrypted", json!(true)),
            ("salt", json!("c2FsdA==")),
        ]
        .into_iter()
        .collect();
        let stripped = meta.without_encryption_fields();
        assert_eq!(stripped.len(), 1);
        assert_eq!(stripped.get("source"), Some(&json!("a.png")));
        assert_eq!(meta.len(), 3);
    }

    #[test]
    fn test_fill_defaults_does_not_overwrite() {
        let mut meta: Metadata = [("width", json!(999)), ("source", json!("cat.jpg"))]
            .into_iter()
            .collect();
        meta.fill_defaults(&defaults());

        assert_eq!(meta.width(), Some(999));
        assert_eq!(meta.height(), Some(480));
        assert_eq!(meta.mode(), Some("RGB"));
        assert_eq!(meta.inner_format(), Some("PNG"));
        assert_eq!(meta.zlib_level(), Some(9));
        assert_eq!(meta.get("source"), Some(&json!("cat.jpg")));
    }

    #[test]
    fn test_key_order_is_stable() {
        let mut meta = Metadata::new();
        meta.insert("zeta", 1);
        meta.insert("alpha", 2);
        meta.fill_defaults(&defaults());
        let text = String::from_utf8(meta.to_bytes().unwrap()).unwrap();
        assert!(text.starts_with("{\"zeta\":1,\"alpha\":2,\"width\":640"));
    }

    #[test]
    fn test_non_ascii_written_as_utf8() {
        let mut meta = Metadata::new();
        meta.insert("note", "café, naïve, çã");
        let bytes = meta.to_bytes().unwrap();
        assert!(std::str::from_utf8(&bytes).unwrap().contains("çã"));
        assert_eq!(Metadata::from_bytes(&bytes).unwrap(), meta);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            Metadata::from_bytes(b"{\"width\": "),
            Err(LamoError::Format(FormatError::BadMetadata))
        ));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        assert!(matches!(
            Metadata::from_bytes(b"{\"k\": \"\xff\xfe\"}"),
            Err(LamoError::Format(FormatError::BadMetadata))
        ));
    }

    #[test]
    fn test_rejects_non_object() {
        for text in [&b"[1,2]"[..], &b"42"[..], &b"\"s\""[..], &b"null"[..]] {
            assert!(matches!(
                Metadata::from_bytes(text),
                Err(LamoError::Format(FormatError::BadMetadata))
            ));
        }
    }

    #[test]
    fn test_encrypted_flag_parsing() {
        let mut meta = Metadata::new();
        assert!(!meta.is_encrypted().unwrap());

        meta.insert(KEY_ENCRYPTED, Value::Null);
        assert!(!meta.is_encrypted().unwrap());

        meta.insert(KEY_ENCRYPTED, true);
        assert!(meta.is_encrypted().unwrap());

        meta.insert(KEY_ENCRYPTED, "yes");
        assert!(matches!(
            meta.is_encrypted(),
            Err(LamoError::Format(FormatError::BadMetadata))
        ));
    }

    #[test]
    fn test_set_default_reports_insertion() {
        let mut meta = Metadata::new();
        assert!(meta.set_default("k", 1));
        assert!(!meta.set_default("k", 2));
        assert_eq!(meta.get("k"), Some(&json!(1)));
    }

    #[test]
    fn test_try_from_value() {
        assert!(Metadata::try_from(json!({"a": 1})).is_ok());
        assert!(Metadata::try_from(json!([1])).is_err());
    }
}
