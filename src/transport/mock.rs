//! In-memory transport for tests and dry runs.
//!
//! [`MockConnector`] records every [`ConnectOptions`] it is asked to open and
//! every frame written to it. The handshake never completes on its own: the
//! test decides when to call [`MockConnector::secure_ready`],
//! [`MockConnector::fail`] or [`MockConnector::close`].

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::{ConnectOptions, Connector, FrameWriter, TransportEvent, TransportSession};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct MockState {
    opened: Vec<ConnectOptions>,
    frames: Vec<Bytes>,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    reject_writes: bool,
}

/// Recording connector. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// New connector with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Options of every `open` call, oldest first.
    #[must_use]
    pub fn opened(&self) -> Vec<ConnectOptions> {
        self.lock().opened.clone()
    }

    /// Frames written so far, in write order.
    #[must_use]
    pub fn frames(&self) -> Vec<Bytes> {
        self.lock().frames.clone()
    }

    /// Make subsequent writes fail with [`Error::Closed`].
    pub fn reject_writes(&self) {
        self.lock().reject_writes = true;
    }

    fn emit(&self, event: TransportEvent) {
        match &self.lock().events {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => log::warn!("[Mock] Event {:?} emitted before any session was opened", event),
        }
    }

    /// Complete the handshake of the most recent session.
    pub fn secure_ready(&self) {
        self.emit(TransportEvent::SecureReady);
    }

    /// Report a transport error on the most recent session.
    pub fn fail(&self, error: Error) {
        self.emit(TransportEvent::Error(error));
    }

    /// Report that the peer closed the most recent session.
    pub fn close(&self) {
        self.emit(TransportEvent::Close);
    }
}

impl Connector for MockConnector {
    fn open(&self, options: ConnectOptions, _runtime: &Handle) -> TransportSession {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        {
            let mut state = self.lock();
            state.opened.push(options);
            state.events = Some(event_tx);
        }

        TransportSession {
            writer: Box::new(MockWriter {
                connector: self.clone(),
            }),
            events: event_rx,
        }
    }
}

#[derive(Debug)]
struct MockWriter {
    connector: MockConnector,
}

impl FrameWriter for MockWriter {
    fn write(&mut self, frame: Bytes) -> Result<()> {
        let mut state = self.connector.lock();
        if state.reject_writes {
            return Err(Error::Closed);
        }
        state.frames.push(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Credentials, GATEWAY_PORT, PRODUCTION_HOST};

    fn options() -> ConnectOptions {
        ConnectOptions {
            host: PRODUCTION_HOST.into(),
            port: GATEWAY_PORT,
            passphrase: None,
            credentials: Credentials::default(),
        }
    }

    #[tokio::test]
    async fn test_records_options_frames_and_events() {
        let mock = MockConnector::new();
        let mut session = mock.open(options(), &Handle::current());

        session.writer.write(Bytes::from_static(b"a")).unwrap();
        mock.secure_ready();
        mock.close();

        assert_eq!(mock.opened(), vec![options()]);
        assert_eq!(mock.frames(), vec![Bytes::from_static(b"a")]);
        assert!(matches!(session.events.recv().await, Some(TransportEvent::SecureReady)));
        assert!(matches!(session.events.recv().await, Some(TransportEvent::Close)));
    }

    #[tokio::test]
    async fn test_reject_writes() {
        let mock = MockConnector::new();
        let mut session = mock.open(options(), &Handle::current());
        mock.reject_writes();
        assert!(matches!(
            session.writer.write(Bytes::from_static(b"a")),
            Err(Error::Closed)
        ));
        assert!(mock.frames().is_empty());
    }
}
