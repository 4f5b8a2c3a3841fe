//! Provider facade.
//!
//! The [`Provider`] ties settings, the connection manager and the listener
//! list together and is the only type most callers touch:
//!
//! ```ignore
//! let provider = Provider::new();
//! provider.enable("sandbox").set("pfx file", "/etc/push/dev.p12");
//!
//! provider.on(EventKind::Error, |event| log::error!("{event:?}"));
//! provider.send(provider.create(None).device(token)?.alert("hello"))?; // queued
//! provider.connect(|result| log::info!("ready: {result:?}"));          // flushes on ready
//! ```
//!
//! # Concurrency
//!
//! All state sits behind one mutex. The transport's events are consumed by
//! one spawned task per connection, which takes the same mutex to flip the
//! state and flush the queue. Listener callbacks and the `connect` callback
//! run after the mutex is released. Codecs run while it is held.

// Rust guideline compliant 2026-02

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::codec::{Codec, CodecRegistry, DEFAULT_CODEC};
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::{Error, Result};
use crate::events::{EventKind, ListenerId, Listeners, ProviderEvent};
use crate::message::Message;
use crate::settings::{keys, SettingValue, Settings};
use crate::transport::tls::TlsConnector;
use crate::transport::{Connector, TransportEvent};

#[derive(Debug)]
struct Inner {
    settings: Settings,
    manager: ConnectionManager,
}

/// Client for one persistent gateway connection.
///
/// Clones share the same connection.
#[derive(Clone)]
pub struct Provider {
    inner: Arc<Mutex<Inner>>,
    listeners: Arc<Listeners>,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("state", &self.state())
            .field("queued", &self.queued())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider {
    /// Provider using the TLS transport and the built-in codecs.
    #[must_use]
    pub fn new() -> Self {
        Self::with_connector(TlsConnector)
    }

    /// Provider using a custom transport (e.g. [`crate::mock::MockConnector`]).
    pub fn with_connector(connector: impl Connector + 'static) -> Self {
        let mut settings = Settings::new();
        settings.disable(keys::SANDBOX).set(keys::CODEC, DEFAULT_CODEC);

        Self {
            inner: Arc::new(Mutex::new(Inner {
                settings,
                manager: ConnectionManager::new(CodecRegistry::new()),
            })),
            listeners: Arc::new(Listeners::default()),
            connector: Arc::new(connector),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Store a setting.
    pub fn set(&self, key: impl Into<String>, value: impl Into<SettingValue>) -> &Self {
        self.lock().settings.set(key, value);
        self
    }

    /// Merge many settings, overwriting on collision.
    pub fn set_many<K, V, I>(&self, pairs: I) -> &Self
    where
        K: Into<String>,
        V: Into<SettingValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.lock().settings.set_many(pairs);
        self
    }

    /// Read a setting.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.lock().settings.get(key).cloned()
    }

    /// `set(key, true)`.
    pub fn enable(&self, key: impl Into<String>) -> &Self {
        self.lock().settings.enable(key);
        self
    }

    /// `set(key, false)`.
    pub fn disable(&self, key: impl Into<String>) -> &Self {
        self.lock().settings.disable(key);
        self
    }

    /// Whether `key` holds a truthy value.
    #[must_use]
    pub fn enabled(&self, key: &str) -> bool {
        self.lock().settings.enabled(key)
    }

    /// Whether `key` is absent or falsy.
    #[must_use]
    pub fn disabled(&self, key: &str) -> bool {
        self.lock().settings.disabled(key)
    }

    /// Register an additional codec under `name`.
    ///
    /// Codecs are called with the provider lock held, so a codec must not
    /// call back into this provider (`get`, `send`, ...); doing so deadlocks.
    /// Capture whatever it needs when it is registered instead.
    pub fn register_codec(&self, name: impl Into<String>, codec: impl Codec + 'static) -> &Self {
        self.lock().manager.codecs_mut().register(name, codec);
        self
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// New message, optionally pinned to a codec, returned for chaining.
    ///
    /// Nothing is queued or sent; pass the finished message to [`Self::send`].
    #[must_use]
    pub fn create(&self, codec: Option<&str>) -> Message {
        match codec {
            Some(name) => Message::new().codec(name),
            None => Message::new(),
        }
    }

    /// Queue `message` until connected, or encode and write it now.
    ///
    /// Sending before `connect` is not an error. Once connected, encode
    /// failures (e.g. [`crate::Error::UnknownCodec`]) and a dead transport are
    /// returned here; socket errors arrive later as `error` events.
    pub fn send(&self, message: Message) -> Result<()> {
        let mut inner = self.lock();
        let Inner { settings, manager } = &mut *inner;
        manager.send(settings, message)
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.lock().manager.state()
    }

    /// Number of messages waiting for the connection.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.lock().manager.queued()
    }

    /// Open the gateway connection.
    ///
    /// `on_ready` runs once the queue has been flushed, right before the
    /// `connect` event. If the provider is already connecting or connected,
    /// or the options cannot be derived, it runs immediately with the error
    /// and nothing is opened. A failed handshake is reported only as an
    /// `error` event.
    ///
    /// Outside a tokio runtime the callback gets a config error and the
    /// provider stays `Unopened`, so `connect` can be retried from one.
    pub fn connect<F>(&self, on_ready: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::warn!("[Gateway] connect refused: {}", e);
                on_ready(Err(Error::Config(format!("connect needs a tokio runtime: {e}"))));
                return;
            }
        };

        let opened = {
            let mut inner = self.lock();
            let Inner { settings, manager } = &mut *inner;
            manager.open(settings, self.connector.as_ref(), &runtime)
        };

        match opened {
            Ok(events) => {
                runtime.spawn(drive_connection(
                    Arc::downgrade(&self.inner),
                    Arc::clone(&self.listeners),
                    events,
                    on_ready,
                ));
            }
            Err(e) => {
                log::warn!("[Gateway] connect refused: {}", e);
                on_ready(Err(e));
            }
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribe to a lifecycle event.
    ///
    /// Listeners live as long as the provider. One that needs the provider
    /// should capture [`Self::downgrade`]: a captured `Provider` clone keeps
    /// the provider, and with it the connection, alive until [`Self::off`].
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ProviderEvent) + Send + Sync + 'static,
    {
        self.listeners.register(kind, listener)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn off(&self, id: &str) -> bool {
        self.listeners.unregister(id)
    }

    /// Handle that does not keep the provider alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakProvider {
        WeakProvider {
            inner: Arc::downgrade(&self.inner),
            listeners: Arc::downgrade(&self.listeners),
            connector: Arc::clone(&self.connector),
        }
    }
}

/// Non-owning [`Provider`] handle, for listeners that call back into it.
#[derive(Clone)]
pub struct WeakProvider {
    inner: Weak<Mutex<Inner>>,
    listeners: Weak<Listeners>,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for WeakProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakProvider")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

impl WeakProvider {
    /// The provider, unless every owning handle has been dropped.
    #[must_use]
    pub fn upgrade(&self) -> Option<Provider> {
        Some(Provider {
            inner: self.inner.upgrade()?,
            listeners: self.listeners.upgrade()?,
            connector: Arc::clone(&self.connector),
        })
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Consume transport events for one connection.
///
/// Holds only a weak reference so dropping every [`Provider`] clone drops
/// the writer, which ends the session and with it this task.
async fn drive_connection<F>(
    inner: Weak<Mutex<Inner>>,
    listeners: Arc<Listeners>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    on_ready: F,
) where
    F: FnOnce(Result<()>) + Send + 'static,
{
    let mut on_ready = Some(on_ready);

    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::SecureReady => {
                let Some(strong) = inner.upgrade() else {
                    break;
                };
                let failures = {
                    let mut guard = lock_inner(&strong);
                    let Inner { settings, manager } = &mut *guard;
                    manager.on_secure_ready(settings)
                };
                drop(strong);

                for error in failures {
                    listeners.emit(&ProviderEvent::Error(error));
                }
                if let Some(callback) = on_ready.take() {
                    callback(Ok(()));
                    listeners.emit(&ProviderEvent::Connect);
                }
            }
            TransportEvent::Error(error) => {
                log::warn!("[Gateway] Transport error: {}", error);
                listeners.emit(&ProviderEvent::Error(error));
            }
            TransportEvent::Close => {
                log::info!("[Gateway] Connection closed");
                listeners.emit(&ProviderEvent::Close);
            }
        }
    }

    log::debug!("[Gateway] Transport event stream ended");
}
