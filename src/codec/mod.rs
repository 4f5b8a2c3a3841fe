//! Codec dispatch: codec name → encoder.
//!
//! The provider never knows how a frame is laid out. It resolves the codec
//! name (message override or the `codec` setting) through a
//! [`CodecRegistry`] and writes whatever bytes the encoder returns.
//!
//! Built-in codecs, both big-endian binary gateway frames:
//!
//! ```text
//! simple   (0x00): [u8 cmd][u16 token len][token][u16 payload len][payload]
//! enhanced (0x01): [u8 cmd][u32 id][u32 expiry][u16 token len][token][u16 payload len][payload]
//! ```

// Rust guideline compliant 2026-02

pub mod enhanced;
pub mod simple;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::message::Message;

/// Largest JSON payload the gateway accepts, in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 256;

/// Size of a gateway error response frame.
pub const ERROR_RESPONSE_SIZE: usize = 6;

/// Command byte of a gateway error response.
const ERROR_RESPONSE_COMMAND: u8 = 8;

/// Name of the codec used when nothing else is configured.
pub const DEFAULT_CODEC: &str = simple::NAME;

/// Encodes a [`Message`] into one binary frame.
pub trait Codec: Send + Sync {
    /// Produce the wire frame for `message`.
    fn encode(&self, message: &Message) -> Result<Bytes>;
}

impl<F> Codec for F
where
    F: Fn(&Message) -> Result<Bytes> + Send + Sync,
{
    fn encode(&self, message: &Message) -> Result<Bytes> {
        self(message)
    }
}

/// Name → codec table.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CodecRegistry").field("codecs", &names).finish()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(simple::NAME, simple::SimpleCodec);
        registry.register(enhanced::NAME, enhanced::EnhancedCodec);
        registry
    }
}

impl CodecRegistry {
    /// Registry with the built-in codecs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with no codecs at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Register (or replace) a codec under `name`.
    pub fn register(&mut self, name: impl Into<String>, codec: impl Codec + 'static) -> &mut Self {
        let name = name.into();
        log::debug!("[Codec] Registered '{}'", name);
        self.codecs.insert(name, Arc::new(codec));
        self
    }

    /// Look up a codec by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Codec>> {
        self.codecs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownCodec(name.to_string()))
    }

    /// Resolve `name` and encode `message` with it.
    pub fn encode(&self, name: &str, message: &Message) -> Result<Bytes> {
        self.resolve(name)?.encode(message)
    }
}

/// Device token and serialized payload, validated for both codecs.
fn token_and_payload(message: &Message) -> Result<(&[u8], Vec<u8>)> {
    let token = message
        .device_token()
        .ok_or_else(|| Error::Encode("message has no device token".into()))?;
    if token.is_empty() || token.len() > usize::from(u16::MAX) {
        return Err(Error::Encode(format!(
            "device token length {} out of range",
            token.len()
        )));
    }

    let payload = serde_json::to_vec(&message.payload())
        .map_err(|e| Error::Encode(format!("payload serialization failed: {e}")))?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(Error::Encode(format!(
            "payload is {} bytes, limit is {MAX_PAYLOAD_SIZE}",
            payload.len()
        )));
    }

    Ok((token, payload))
}

/// Decode a gateway error response `[u8 cmd=8][u8 status][u32 id]`.
///
/// Returns `None` if the frame is not an error response.
#[must_use]
pub fn decode_error_response(frame: &[u8; ERROR_RESPONSE_SIZE]) -> Option<Error> {
    if frame[0] != ERROR_RESPONSE_COMMAND {
        return None;
    }
    let identifier = u32::from_be_bytes([frame[2], frame[3], frame[4], frame[5]]);
    Some(Error::GatewayRejected {
        status: frame[1],
        identifier,
    })
}
