//! Key/value settings with boolean-flag helpers.
//!
//! Settings are an open map: keys are never validated, unknown keys are kept
//! and read back verbatim. The connection layer reads a handful of well-known
//! keys (see the `keys` constants) when it builds connection options.

// Rust guideline compliant 2026-02

use std::collections::HashMap;

/// Well-known setting names read by the connection layer.
pub mod keys {
    /// Use the sandbox gateway instead of production.
    pub const SANDBOX: &str = "sandbox";
    /// Default codec name for messages without an override.
    pub const CODEC: &str = "codec";
    /// Passphrase for the private key or the `pfx` bundle.
    pub const PASSPHRASE: &str = "passphrase";
    /// PKCS#12 credential bundle (key + certificate).
    pub const PFX: &str = "pfx";
    /// PEM private key.
    pub const KEY: &str = "key";
    /// PEM client certificate.
    pub const CERT: &str = "cert";
    /// PEM trust anchors for the gateway.
    pub const CA: &str = "ca";
    /// Path to a `pfx` bundle, read when `pfx` is unset.
    pub const PFX_FILE: &str = "pfx file";
    /// Path to a PEM private key, read when `key` is unset.
    pub const KEY_FILE: &str = "key file";
    /// Path to a PEM certificate, read when `cert` is unset.
    pub const CERT_FILE: &str = "cert file";
    /// Path to PEM trust anchors, read when `ca` is unset.
    pub const CA_FILE: &str = "ca file";
}

/// A stored setting value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    /// Boolean flag.
    Bool(bool),
    /// UTF-8 string.
    Text(String),
    /// Raw bytes (certificates, bundles).
    Blob(Vec<u8>),
}

impl SettingValue {
    /// Truthiness used by [`Settings::enabled`].
    ///
    /// Strings and blobs are truthy when non-empty.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => !s.is_empty(),
            Self::Blob(b) => !b.is_empty(),
        }
    }

    /// Borrow the value as a string, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Byte view of string and blob values.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(s) => Some(s.as_bytes()),
            Self::Blob(b) => Some(b),
            Self::Bool(_) => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for SettingValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

impl From<&[u8]> for SettingValue {
    fn from(b: &[u8]) -> Self {
        Self::Blob(b.to_vec())
    }
}

/// In-memory settings map.
#[derive(Debug, Default, Clone)]
pub struct Settings {
    values: HashMap<String, SettingValue>,
}

impl Settings {
    /// Create an empty settings map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a single value, overwriting any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Merge many values at once. Later pairs win on key collision.
    pub fn set_many<K, V, I>(&mut self, pairs: I) -> &mut Self
    where
        K: Into<String>,
        V: Into<SettingValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in pairs {
            self.values.insert(key.into(), value.into());
        }
        self
    }

    /// Look up a value. `None` if it was never set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    /// Shorthand for `set(key, true)`.
    pub fn enable(&mut self, key: impl Into<String>) -> &mut Self {
        self.set(key, true)
    }

    /// Shorthand for `set(key, false)`.
    pub fn disable(&mut self, key: impl Into<String>) -> &mut Self {
        self.set(key, false)
    }

    /// Whether the stored value is truthy. Absent keys are not enabled.
    #[must_use]
    pub fn enabled(&self, key: &str) -> bool {
        self.get(key).is_some_and(SettingValue::is_truthy)
    }

    /// Negation of [`Self::enabled`].
    #[must_use]
    pub fn disabled(&self, key: &str) -> bool {
        !self.enabled(key)
    }

    /// String value of `key`, if set to a string.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(SettingValue::as_str)
    }
}
