//! TLS transport to the gateway.
//!
//! [`TlsConnector::open`] returns immediately and spawns one session task
//! per connection on the runtime it is given. The task performs TCP connect + TLS handshake, reports
//! [`TransportEvent::SecureReady`] or [`TransportEvent::Error`], then pumps
//! frames from the writer channel onto the socket.
//!
//! The gateway never answers successful frames. When it rejects one it
//! sends a 6-byte error response and closes the socket; both are surfaced as
//! events.

// Rust guideline compliant 2026-02

use std::sync::Arc;

use bytes::Bytes;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;

use super::{
    credentials, ChannelWriter, ConnectOptions, Connector, TransportEvent, TransportSession,
};
use crate::codec::{decode_error_response, ERROR_RESPONSE_SIZE};
use crate::error::{Error, Result};

/// Opens real TLS sessions with client certificate authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsConnector;

impl Connector for TlsConnector {
    fn open(&self, options: ConnectOptions, runtime: &Handle) -> TransportSession {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        runtime.spawn(run_session(options, frame_rx, event_tx));

        TransportSession {
            writer: Box::new(ChannelWriter::new(frame_tx)),
            events: event_rx,
        }
    }
}

/// TCP connect and TLS handshake.
async fn establish(options: &ConnectOptions) -> Result<TlsStream<TcpStream>> {
    let config = credentials::client_config(options)?;
    let connector = tokio_rustls::TlsConnector::from(Arc::new(config));

    let server_name = ServerName::try_from(options.host.clone())
        .map_err(|e| Error::Tls(format!("invalid server name {}: {e}", options.host)))?;

    log::info!("[Tls] Connecting to {}:{}", options.host, options.port);
    let tcp = TcpStream::connect((options.host.as_str(), options.port)).await?;
    tcp.set_nodelay(true)?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::Tls(format!("handshake with {} failed: {e}", options.host)))
}

/// Session task: handshake, then frame pump until the socket or the writer goes away.
async fn run_session(
    options: ConnectOptions,
    mut frame_rx: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let stream = match establish(&options).await {
        Ok(stream) => stream,
        Err(e) => {
            log::warn!("[Tls] Connection to {} failed: {}", options.host, e);
            let _ = events.send(TransportEvent::Error(e));
            return;
        }
    };

    log::info!("[Tls] Secure session established with {}", options.host);
    let _ = events.send(TransportEvent::SecureReady);

    let (mut reader, mut writer) = tokio::io::split(stream);
    // Bytes read so far; error responses may arrive split across reads.
    let mut pending: Vec<u8> = Vec::with_capacity(ERROR_RESPONSE_SIZE);
    let mut buf = [0_u8; 64];

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                let Some(frame) = frame else {
                    log::debug!("[Tls] Writer dropped, closing session");
                    let _ = writer.shutdown().await;
                    break;
                };
                if let Err(e) = writer.write_all(&frame).await {
                    log::warn!("[Tls] Write failed: {}", e);
                    let _ = events.send(TransportEvent::Error(e.into()));
                    break;
                }
            }
            read = reader.read(&mut buf) => {
                match read {
                    Ok(0) => {
                        log::info!("[Tls] Gateway closed the connection");
                        let _ = events.send(TransportEvent::Close);
                        break;
                    }
                    Ok(n) => {
                        pending.extend_from_slice(&buf[..n]);
                        for error in drain_error_responses(&mut pending) {
                            log::warn!("[Tls] {}", error);
                            let _ = events.send(TransportEvent::Error(error));
                        }
                    }
                    Err(e) => {
                        log::warn!("[Tls] Read failed: {}", e);
                        let _ = events.send(TransportEvent::Error(e.into()));
                        break;
                    }
                }
            }
        }
    }
}

/// Pop every complete 6-byte response off the front of `pending`.
fn drain_error_responses(pending: &mut Vec<u8>) -> Vec<Error> {
    let mut errors = Vec::new();
    while pending.len() >= ERROR_RESPONSE_SIZE {
        let mut frame = [0_u8; ERROR_RESPONSE_SIZE];
        frame.copy_from_slice(&pending[..ERROR_RESPONSE_SIZE]);
        pending.drain(..ERROR_RESPONSE_SIZE);

        match decode_error_response(&frame) {
            Some(error) => errors.push(error),
            None => log::debug!("[Tls] Ignoring unexpected gateway frame {:02x?}", frame),
        }
    }
    errors
}
