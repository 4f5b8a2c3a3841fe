//! Secure transport collaborator.
//!
//! The provider only sees three things: a [`Connector`] that opens a session
//! from [`ConnectOptions`], a [`FrameWriter`] for outgoing frames, and a
//! stream of [`TransportEvent`]s. Each session emits exactly one of
//! [`TransportEvent::SecureReady`] / [`TransportEvent::Error`] for the
//! handshake, followed by any number of errors and closes.
//!
//! # Architecture
//!
//! ```text
//!   Provider ──write(frame)──► FrameWriter ──mpsc──► session task ──► TLS socket
//!      ▲                                                  │
//!      └──────────── TransportEvent (mpsc) ◄──────────────┘
//! ```

// Rust guideline compliant 2026-02

pub mod credentials;
pub mod mock;
pub mod tls;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Production gateway host.
pub const PRODUCTION_HOST: &str = "gateway.push.apple.com";

/// Sandbox gateway host.
pub const SANDBOX_HOST: &str = "gateway.sandbox.push.apple.com";

/// Gateway port (same for production and sandbox).
pub const GATEWAY_PORT: u16 = 2195;

/// Client credentials for the TLS handshake.
///
/// A `pfx` bundle is used exclusively; otherwise the individual PEM parts
/// that are present are used.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// PKCS#12 bundle holding key and certificate chain.
    Pfx(Vec<u8>),
    /// Individual PEM parts.
    Pem {
        /// Private key.
        key: Option<Vec<u8>>,
        /// Client certificate (chain).
        cert: Option<Vec<u8>>,
        /// Trust anchors for the gateway certificate.
        ca: Option<Vec<u8>>,
    },
}

impl Default for Credentials {
    fn default() -> Self {
        Self::Pem {
            key: None,
            cert: None,
            ca: None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, only sizes.
        let len = |part: &Option<Vec<u8>>| part.as_ref().map(Vec::len);
        match self {
            Self::Pfx(bundle) => f.debug_tuple("Pfx").field(&bundle.len()).finish(),
            Self::Pem { key, cert, ca } => f
                .debug_struct("Pem")
                .field("key", &len(key))
                .field("cert", &len(cert))
                .field("ca", &len(ca))
                .finish(),
        }
    }
}

/// Parameters for opening a gateway session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Gateway host name.
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// Passphrase for the key or bundle.
    pub passphrase: Option<String>,
    /// Client credentials.
    pub credentials: Credentials,
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("credentials", &self.credentials)
            .finish()
    }
}

/// Asynchronous notification from a transport session.
#[derive(Debug)]
pub enum TransportEvent {
    /// TLS handshake completed; frames can be written.
    SecureReady,
    /// Handshake or session failure.
    Error(Error),
    /// The peer closed the connection.
    Close,
}

/// Write half of a session. Writes are fire-and-forget.
pub trait FrameWriter: Send + std::fmt::Debug {
    /// Hand a frame to the transport.
    ///
    /// Only fails when the session is gone; socket errors arrive later as
    /// [`TransportEvent::Error`].
    fn write(&mut self, frame: Bytes) -> Result<()>;
}

/// An opened (possibly still handshaking) session.
#[derive(Debug)]
pub struct TransportSession {
    /// Outgoing frame sink.
    pub writer: Box<dyn FrameWriter>,
    /// Handshake and lifecycle notifications.
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens secure sessions to the gateway.
pub trait Connector: Send + Sync {
    /// Start opening a session on `runtime`. The handshake completes
    /// asynchronously and is reported on [`TransportSession::events`].
    fn open(&self, options: ConnectOptions, runtime: &Handle) -> TransportSession;
}

/// [`FrameWriter`] that forwards frames to a session task over a channel.
#[derive(Debug)]
pub struct ChannelWriter {
    frame_tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelWriter {
    /// Wrap the sending half of a frame channel.
    #[must_use]
    pub fn new(frame_tx: mpsc::UnboundedSender<Bytes>) -> Self {
        Self { frame_tx }
    }
}

impl FrameWriter for ChannelWriter {
    fn write(&mut self, frame: Bytes) -> Result<()> {
        self.frame_tx.send(frame).map_err(|_unsent| Error::Closed)
    }
}
