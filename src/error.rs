//! Error type shared by the provider, codecs and transports.

// Rust guideline compliant 2026-02

/// Errors that can occur while configuring, connecting or sending.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `connect` was called on a provider that is already connecting or connected.
    #[error("provider is already connecting or connected")]
    AlreadyConnected,

    /// The codec dispatcher has no encoder registered under this name.
    #[error("unknown codec: {0}")]
    UnknownCodec(String),

    /// A message could not be encoded into a frame.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Credential material (key, certificate, bundle) could not be decoded.
    #[error("invalid credentials: {0}")]
    Credentials(String),

    /// Connection options could not be derived from the settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O failure on the underlying socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or session failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The gateway answered a frame with an error response.
    #[error("gateway rejected notification {identifier} with status {status}")]
    GatewayRejected {
        /// Gateway status code (8 = invalid token, 10 = shutdown, ...).
        status: u8,
        /// Identifier of the rejected notification (enhanced codec only).
        identifier: u32,
    },

    /// The transport is gone; frames can no longer be written.
    #[error("transport closed")]
    Closed,
}

impl Error {
    /// Whether this error originated in the secure transport.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::GatewayRejected { .. } | Self::Closed
        )
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
