//! Push gateway client.
//!
//! Keeps one TLS connection to the push gateway and writes encoded
//! notifications over it. Messages sent before the connection is ready are
//! queued and flushed, in order, the moment the handshake completes.
//!
//! # Architecture
//!
//! ```text
//!   Provider (facade)
//!     ├── Settings            key/value options (sandbox, codec, credentials)
//!     ├── ConnectionManager   Unopened → Connecting → Connected, owns the writer
//!     │     └── SendQueue     FIFO of messages sent before Connected
//!     ├── CodecRegistry       codec name → encoder ("simple", "enhanced")
//!     └── Listeners           connect / error / close observers
//!
//!   Connector (transport)
//!     ├── TlsConnector        rustls session task, openssl-decoded credentials
//!     └── MockConnector       in-memory recorder for tests
//! ```
//!
//! # Modules
//!
//! - [`provider`] - Public facade
//! - [`connection`] - Option derivation and the connection state machine
//! - [`queue`] - Send queue and the encode-and-write path
//! - [`codec`] - Codec dispatch and the built-in frame formats
//! - [`transport`] - Secure transport collaborator
//! - [`config`] - Configuration file and environment overrides

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod message;
pub mod provider;
pub mod queue;
pub mod settings;
pub mod transport;

pub use transport::mock;

// Re-export commonly used types
pub use codec::{Codec, CodecRegistry};
pub use config::GatewayConfig;
pub use connection::ConnectionState;
pub use error::{Error, Result};
pub use events::{EventKind, ListenerId, ProviderEvent};
pub use message::Message;
pub use provider::{Provider, WeakProvider};
pub use settings::{SettingValue, Settings};
