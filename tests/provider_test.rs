// Provider lifecycle tests against the in-memory transport.
// Run with: cargo test --test provider_test

use std::sync::{Arc, Mutex};
use std::time::Duration;

use apns_gateway::codec::simple::SimpleCodec;
use apns_gateway::mock::MockConnector;
use apns_gateway::settings::keys;
use apns_gateway::transport::{Credentials, PRODUCTION_HOST, SANDBOX_HOST};
use apns_gateway::{
    Codec, ConnectionState, Error, EventKind, Message, Provider, ProviderEvent, Result,
};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

const WAIT: Duration = Duration::from_secs(2);

/// Codec that encodes only the message identifier, so frames are easy to compare.
fn id_frame(tag: &'static str) -> impl Fn(&Message) -> Result<Bytes> + Send + Sync {
    move |m: &Message| Ok(Bytes::from(format!("{tag}:{}", m.id())))
}

/// Provider on a mock transport with `tag` as the default codec.
fn tagged_provider() -> (Provider, MockConnector) {
    let mock = MockConnector::new();
    let provider = Provider::with_connector(mock.clone());
    provider
        .register_codec("tag", id_frame("tag"))
        .register_codec("other", id_frame("other"))
        .set(keys::CODEC, "tag");
    (provider, mock)
}

/// Forward every lifecycle event as a short label.
fn record_events(provider: &Provider) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    for kind in [EventKind::Connect, EventKind::Error, EventKind::Close] {
        let tx = tx.clone();
        provider.on(kind, move |event| {
            let label = match event {
                ProviderEvent::Connect => "connect".to_string(),
                ProviderEvent::Error(e) => format!("error:{e}"),
                ProviderEvent::Close => "close".to_string(),
            };
            let _ = tx.send(label);
        });
    }
    rx
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Connect and return a receiver resolved when `on_ready` runs.
fn connect(provider: &Provider) -> oneshot::Receiver<std::result::Result<(), String>> {
    let (tx, rx) = oneshot::channel();
    provider.connect(move |result| {
        let _ = tx.send(result.map_err(|e| e.to_string()));
    });
    rx
}

async fn connected(provider: &Provider, mock: &MockConnector) {
    let ready = connect(provider);
    mock.secure_ready();
    tokio::time::timeout(WAIT, ready)
        .await
        .expect("timed out waiting for on_ready")
        .expect("on_ready dropped")
        .expect("connect failed");
}

#[tokio::test]
async fn test_queued_messages_flush_in_order_before_ready_and_connect_event() {
    let (provider, mock) = tagged_provider();
    provider.set_many([(keys::SANDBOX, true)]);

    // Observation order: what the callback and the listener saw, in the order they ran.
    let seen = Arc::new(Mutex::new(Vec::new()));
    let listener_seen = Arc::clone(&seen);
    let listener_mock = mock.clone();
    provider.on(EventKind::Connect, move |_| {
        let frames = listener_mock.frames().len();
        listener_seen.lock().unwrap().push(format!("event:{frames}"));
    });

    provider.send(Message::new().identifier(1)).unwrap();
    provider.send(Message::new().identifier(2)).unwrap();
    assert_eq!(provider.queued(), 2);
    assert!(mock.frames().is_empty());

    let (tx, rx) = oneshot::channel();
    let callback_seen = Arc::clone(&seen);
    let callback_mock = mock.clone();
    provider.connect(move |result| {
        assert!(result.is_ok());
        let frames = callback_mock.frames().len();
        callback_seen.lock().unwrap().push(format!("callback:{frames}"));
        let _ = tx.send(());
    });

    assert_eq!(provider.state(), ConnectionState::Connecting);
    assert_eq!(mock.opened()[0].host, SANDBOX_HOST);

    mock.secure_ready();
    tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
    // The connect event is emitted right after the callback on the same task.
    tokio::task::yield_now().await;

    assert_eq!(mock.frames(), vec![Bytes::from("tag:1"), Bytes::from("tag:2")]);
    assert_eq!(provider.queued(), 0);
    assert_eq!(provider.state(), ConnectionState::Connected);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["callback:2".to_string(), "event:2".to_string()]
    );
}

#[tokio::test]
async fn test_flush_uses_real_codec_frames() {
    let mock = MockConnector::new();
    let provider = Provider::with_connector(mock.clone());

    let first = Message::new().device("0a0b").unwrap().alert("one");
    let second = Message::new().device("0c0d").unwrap().alert("two");
    let expected = vec![
        SimpleCodec.encode(&first).unwrap(),
        SimpleCodec.encode(&second).unwrap(),
    ];

    provider.send(first).unwrap();
    provider.send(second).unwrap();
    connected(&provider, &mock).await;

    assert_eq!(mock.frames(), expected);
}

#[tokio::test]
async fn test_connect_twice_is_already_connected() {
    let (provider, mock) = tagged_provider();

    let first = connect(&provider);

    let second: Arc<Mutex<Option<Result<()>>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&second);
    provider.connect(move |result| {
        *slot.lock().unwrap() = Some(result);
    });

    // Delivered synchronously, before connect() returned.
    assert!(matches!(
        *second.lock().unwrap(),
        Some(Err(Error::AlreadyConnected))
    ));
    assert_eq!(mock.opened().len(), 1);

    // Still refused once the first connection is up.
    mock.secure_ready();
    tokio::time::timeout(WAIT, first).await.unwrap().unwrap().unwrap();

    let third: Arc<Mutex<Option<Result<()>>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&third);
    provider.connect(move |result| {
        *slot.lock().unwrap() = Some(result);
    });
    assert!(matches!(*third.lock().unwrap(), Some(Err(Error::AlreadyConnected))));
    assert_eq!(mock.opened().len(), 1);
}

#[tokio::test]
async fn test_codec_override_and_default_read_at_encode_time() {
    let (provider, mock) = tagged_provider();

    provider.send(Message::new().identifier(1)).unwrap();
    provider.send(provider.create(Some("tag")).identifier(2)).unwrap();

    // Default changes after queueing; the queued message without an override follows it.
    provider.set(keys::CODEC, "other");
    connected(&provider, &mock).await;

    provider.send(Message::new().identifier(3)).unwrap();
    provider.send(Message::new().identifier(4).codec("tag")).unwrap();

    assert_eq!(
        mock.frames(),
        vec![
            Bytes::from("other:1"),
            Bytes::from("tag:2"),
            Bytes::from("other:3"),
            Bytes::from("tag:4"),
        ]
    );
}

#[tokio::test]
async fn test_production_host_by_default() {
    let (provider, mock) = tagged_provider();
    let _ready = connect(&provider);
    assert_eq!(mock.opened()[0].host, PRODUCTION_HOST);
}

#[tokio::test]
async fn test_pfx_takes_precedence_over_pem_parts() {
    let (provider, mock) = tagged_provider();
    provider
        .set(keys::PFX, b"bundle".to_vec())
        .set(keys::KEY, "key")
        .set(keys::CERT, "cert")
        .set(keys::CA, "ca");

    let _ready = connect(&provider);
    assert_eq!(
        mock.opened()[0].credentials,
        Credentials::Pfx(b"bundle".to_vec())
    );
}

#[tokio::test]
async fn test_send_after_connect_writes_directly() {
    let (provider, mock) = tagged_provider();
    connected(&provider, &mock).await;

    provider.send(Message::new().identifier(7)).unwrap();

    assert_eq!(provider.queued(), 0);
    assert_eq!(mock.frames(), vec![Bytes::from("tag:7")]);
}

#[tokio::test]
async fn test_unknown_codec_in_queue_does_not_stop_flush() {
    let (provider, mock) = tagged_provider();
    let mut events = record_events(&provider);

    provider.send(Message::new().identifier(1)).unwrap();
    provider.send(Message::new().identifier(2).codec("missing")).unwrap();
    provider.send(Message::new().identifier(3)).unwrap();
    connected(&provider, &mock).await;

    assert_eq!(next_event(&mut events).await, "error:unknown codec: missing");
    assert_eq!(next_event(&mut events).await, "connect");
    assert_eq!(mock.frames(), vec![Bytes::from("tag:1"), Bytes::from("tag:3")]);
    assert_eq!(provider.queued(), 0);
}

#[tokio::test]
async fn test_unknown_codec_on_direct_send_is_returned() {
    let (provider, mock) = tagged_provider();
    connected(&provider, &mock).await;

    let result = provider.send(Message::new().codec("missing"));
    assert!(matches!(result, Err(Error::UnknownCodec(name)) if name == "missing"));

    provider.send(Message::new().identifier(5)).unwrap();
    assert_eq!(mock.frames(), vec![Bytes::from("tag:5")]);
}

#[tokio::test]
async fn test_disabled_codec_setting_is_unknown_codec() {
    let (provider, mock) = tagged_provider();
    connected(&provider, &mock).await;

    provider.disable(keys::CODEC);
    assert!(matches!(
        provider.send(Message::new().identifier(1)),
        Err(Error::UnknownCodec(_))
    ));
    assert!(mock.frames().is_empty());

    provider.send(Message::new().identifier(2).codec("tag")).unwrap();
    assert_eq!(mock.frames(), vec![Bytes::from("tag:2")]);
}

#[tokio::test]
async fn test_handshake_error_is_an_event_only() {
    let (provider, mock) = tagged_provider();
    let mut events = record_events(&provider);
    provider.send(Message::new().identifier(1)).unwrap();

    let mut ready = connect(&provider);
    mock.fail(Error::Tls("handshake refused".into()));

    assert_eq!(next_event(&mut events).await, "error:TLS error: handshake refused");
    assert!(ready.try_recv().is_err());
    assert_eq!(provider.state(), ConnectionState::Connecting);
    // Stranded, not dropped.
    assert_eq!(provider.queued(), 1);
    assert!(mock.frames().is_empty());
}

#[tokio::test]
async fn test_errors_and_close_after_connect_keep_state() {
    let (provider, mock) = tagged_provider();
    let mut events = record_events(&provider);
    connected(&provider, &mock).await;
    assert_eq!(next_event(&mut events).await, "connect");

    mock.fail(Error::GatewayRejected { status: 8, identifier: 3 });
    mock.close();

    assert_eq!(
        next_event(&mut events).await,
        "error:gateway rejected notification 3 with status 8"
    );
    assert_eq!(next_event(&mut events).await, "close");
    assert_eq!(provider.state(), ConnectionState::Connected);
    assert_eq!(mock.opened().len(), 1);
}

#[tokio::test]
async fn test_dead_transport_surfaces_on_send() {
    let (provider, mock) = tagged_provider();
    connected(&provider, &mock).await;
    mock.reject_writes();

    assert!(matches!(
        provider.send(Message::new()),
        Err(Error::Closed)
    ));
}

#[tokio::test]
async fn test_unreadable_credential_file_refuses_connect() {
    let (provider, mock) = tagged_provider();
    provider.set(keys::CERT_FILE, "/definitely/not/here.pem");

    let result: Arc<Mutex<Option<Result<()>>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&result);
    provider.connect(move |r| {
        *slot.lock().unwrap() = Some(r);
    });

    assert!(matches!(*result.lock().unwrap(), Some(Err(Error::Config(_)))));
    assert_eq!(provider.state(), ConnectionState::Unopened);
    assert!(mock.opened().is_empty());
}

#[tokio::test]
async fn test_off_stops_delivery() {
    let (provider, mock) = tagged_provider();
    let hits = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&hits);
    let id = provider.on(EventKind::Connect, move |_| {
        *counter.lock().unwrap() += 1;
    });

    assert!(provider.off(&id));
    connected(&provider, &mock).await;
    tokio::task::yield_now().await;

    assert_eq!(*hits.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_listener_can_send_from_connect_event() {
    let (provider, mock) = tagged_provider();
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));

    let handle = provider.downgrade();
    provider.on(EventKind::Connect, move |_| {
        let sent = handle
            .upgrade()
            .map(|provider| provider.send(Message::new().identifier(9)));
        let sent = matches!(sent, Some(Ok(())));
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(sent);
        }
    });

    provider.send(Message::new().identifier(8)).unwrap();
    let _ready = connect(&provider);
    mock.secure_ready();

    assert!(tokio::time::timeout(WAIT, rx).await.unwrap().unwrap());
    assert_eq!(mock.frames(), vec![Bytes::from("tag:8"), Bytes::from("tag:9")]);
}
