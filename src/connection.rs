//! Connection manager: option derivation and the connection state machine.
//!
//! ```text
//!   Unopened ──connect()──► Connecting ──secure-ready──► Connected
//!                               │                            │
//!                               └── error/close: event only, no transition
//! ```
//!
//! There is no way back out of `Connected` and nothing reconnects. Any
//! message still queued when a handshake fails stays queued.

// Rust guideline compliant 2026-02

use std::path::Path;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::codec::{CodecRegistry, DEFAULT_CODEC};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::queue::{encode_and_write, SendQueue};
use crate::settings::{keys, Settings, SettingValue};
use crate::transport::{
    ConnectOptions, Connector, Credentials, FrameWriter, TransportEvent, GATEWAY_PORT,
    PRODUCTION_HOST, SANDBOX_HOST,
};

/// Lifecycle state of the single gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// `connect` has not been called.
    #[default]
    Unopened,
    /// Transport opened, waiting for secure-ready.
    Connecting,
    /// Handshake done, queue flushed, writes go straight to the transport.
    Connected,
}

/// Derive transport options from settings.
///
/// `pfx` wins over `key`/`cert`/`ca`. Each credential can also be given as a
/// path through its `<name> file` setting, which is read here.
pub fn build_options(settings: &Settings) -> Result<ConnectOptions> {
    let host = if settings.enabled(keys::SANDBOX) {
        SANDBOX_HOST
    } else {
        PRODUCTION_HOST
    };

    let passphrase = settings.get(keys::PASSPHRASE).and_then(|value| match value {
        SettingValue::Text(s) => Some(s.clone()),
        SettingValue::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        SettingValue::Bool(_) => None,
    });

    let credentials = match credential(settings, keys::PFX, keys::PFX_FILE)? {
        Some(bundle) => Credentials::Pfx(bundle),
        None => Credentials::Pem {
            key: credential(settings, keys::KEY, keys::KEY_FILE)?,
            cert: credential(settings, keys::CERT, keys::CERT_FILE)?,
            ca: credential(settings, keys::CA, keys::CA_FILE)?,
        },
    };

    Ok(ConnectOptions {
        host: host.to_string(),
        port: GATEWAY_PORT,
        passphrase,
        credentials,
    })
}

/// Inline value of `key`, else the contents of the file named by `file_key`.
fn credential(settings: &Settings, key: &str, file_key: &str) -> Result<Option<Vec<u8>>> {
    if let Some(bytes) = settings
        .get(key)
        .filter(|value| value.is_truthy())
        .and_then(SettingValue::as_bytes)
    {
        return Ok(Some(bytes.to_vec()));
    }

    match settings.text(file_key).filter(|path| !path.is_empty()) {
        Some(path) => std::fs::read(Path::new(path))
            .map(Some)
            .map_err(|e| Error::Config(format!("cannot read '{file_key}' {path}: {e}"))),
        None => Ok(None),
    }
}

/// Codec used for messages without an override.
///
/// Absent means [`DEFAULT_CODEC`]; a stored value that is not a string names
/// no codec at all.
fn default_codec(settings: &Settings) -> Result<&str> {
    match settings.get(keys::CODEC) {
        None => Ok(DEFAULT_CODEC),
        Some(SettingValue::Text(name)) => Ok(name),
        Some(other) => Err(Error::UnknownCodec(format!("{other:?}"))),
    }
}

/// Owns the connection state, the writer and the send queue.
#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    writer: Option<Box<dyn FrameWriter>>,
    queue: SendQueue,
    codecs: CodecRegistry,
}

impl ConnectionManager {
    /// Unopened manager dispatching through `codecs`.
    #[must_use]
    pub fn new(codecs: CodecRegistry) -> Self {
        Self {
            state: ConnectionState::Unopened,
            writer: None,
            queue: SendQueue::new(),
            codecs,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of messages waiting for the connection.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Codec table used for dispatch.
    pub fn codecs_mut(&mut self) -> &mut CodecRegistry {
        &mut self.codecs
    }

    /// Open the transport and move to `Connecting`.
    ///
    /// Fails with [`Error::AlreadyConnected`] unless `Unopened`, and with a
    /// config error if the options cannot be derived; the state is unchanged
    /// in both cases.
    pub fn open(
        &mut self,
        settings: &Settings,
        connector: &dyn Connector,
        runtime: &Handle,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
        if self.state != ConnectionState::Unopened {
            return Err(Error::AlreadyConnected);
        }

        let options = build_options(settings)?;
        log::info!(
            "[Gateway] Opening {}:{} ({} queued)",
            options.host,
            options.port,
            self.queue.len()
        );

        let session = connector.open(options, runtime);
        self.writer = Some(session.writer);
        self.state = ConnectionState::Connecting;
        Ok(session.events)
    }

    /// Handle secure-ready: flip to `Connected` and flush the queue.
    ///
    /// Runs under the provider lock, so the flip and the flush are one step
    /// as far as concurrent `send` calls are concerned. Returns the failures
    /// of individual queued messages; the flush continues past them.
    pub fn on_secure_ready(&mut self, settings: &Settings) -> Vec<Error> {
        if self.state != ConnectionState::Connecting {
            log::warn!("[Gateway] Ignoring secure-ready in state {:?}", self.state);
            return Vec::new();
        }
        self.state = ConnectionState::Connected;

        let pending = self.queue.take();
        let total = pending.len();
        let mut failures = Vec::new();
        for message in pending {
            if let Err(e) = self.dispatch(settings, &message) {
                log::warn!("[Gateway] Queued message {} failed: {}", message.id(), e);
                failures.push(e);
            }
        }

        log::info!(
            "[Gateway] Connected, flushed {} queued message(s) ({} failed)",
            total,
            failures.len()
        );
        failures
    }

    /// Queue `message` until connected, or write it now.
    pub fn send(&mut self, settings: &Settings, message: Message) -> Result<()> {
        if self.state == ConnectionState::Connected {
            self.dispatch(settings, &message)
        } else {
            log::debug!("[Gateway] Not connected, queueing message {}", message.id());
            self.queue.push(message);
            Ok(())
        }
    }

    fn dispatch(&mut self, settings: &Settings, message: &Message) -> Result<()> {
        let writer = self.writer.as_deref_mut().ok_or(Error::Closed)?;
        let codec = match message.codec_name() {
            Some(name) => name,
            None => default_codec(settings)?,
        };
        encode_and_write(&self.codecs, codec, writer, message)
    }
}
