//! Push message value.
//!
//! A [`Message`] is built by the caller, handed to
//! [`Provider::send`](crate::Provider::send) and consumed by exactly one
//! encode. The provider never inspects it beyond the codec override; codecs
//! read the device token, payload and delivery metadata.

// Rust guideline compliant 2026-02

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER_PERMISSIVE;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A single push notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    codec: Option<String>,
    device: Option<Vec<u8>>,
    aps: Map<String, Value>,
    custom: Map<String, Value>,
    expires: Option<DateTime<Utc>>,
    identifier: u32,
}

impl Message {
    /// Create an empty message using the provider's default codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the codec used to encode this message.
    pub fn codec(mut self, name: impl Into<String>) -> Self {
        self.codec = Some(name.into());
        self
    }

    /// Codec override, if any.
    #[must_use]
    pub fn codec_name(&self) -> Option<&str> {
        self.codec.as_deref()
    }

    /// Target device token from its hex form (spaces and `<>` are ignored).
    pub fn device(mut self, token: &str) -> Result<Self> {
        let cleaned: String = token
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '<' && *c != '>')
            .collect();
        let bytes = HEXLOWER_PERMISSIVE
            .decode(cleaned.as_bytes())
            .map_err(|e| Error::Encode(format!("invalid device token: {e}")))?;
        self.device = Some(bytes);
        Ok(self)
    }

    /// Target device token from raw bytes.
    pub fn device_bytes(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.device = Some(token.into());
        self
    }

    /// Raw device token, if set.
    #[must_use]
    pub fn device_token(&self) -> Option<&[u8]> {
        self.device.as_deref()
    }

    /// Alert text.
    pub fn alert(mut self, text: impl Into<String>) -> Self {
        self.aps.insert("alert".into(), Value::String(text.into()));
        self
    }

    /// Badge number.
    pub fn badge(mut self, count: u32) -> Self {
        self.aps.insert("badge".into(), Value::from(count));
        self
    }

    /// Sound file name.
    pub fn sound(mut self, name: impl Into<String>) -> Self {
        self.aps.insert("sound".into(), Value::String(name.into()));
        self
    }

    /// Custom top-level payload key. `aps` is reserved and ignored.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key == "aps" {
            log::warn!("[Message] Ignoring custom key 'aps' (reserved)");
        } else {
            self.custom.insert(key, value.into());
        }
        self
    }

    /// Expiry instant; the gateway drops the message after it passes.
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    /// Expiry as seconds since the epoch, `0` meaning "do not store".
    #[must_use]
    pub fn expiry_timestamp(&self) -> u32 {
        self.expires
            .map(|at| u32::try_from(at.timestamp().max(0)).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }

    /// Caller-chosen identifier echoed back in gateway error responses.
    pub fn identifier(mut self, id: u32) -> Self {
        self.identifier = id;
        self
    }

    /// Identifier set with [`Self::identifier`].
    #[must_use]
    pub fn id(&self) -> u32 {
        self.identifier
    }

    /// JSON payload: `{"aps": {...}, ...custom}`.
    #[must_use]
    pub fn payload(&self) -> Value {
        let mut root = self.custom.clone();
        root.insert("aps".into(), Value::Object(self.aps.clone()));
        Value::Object(root)
    }
}
