//! Integration tests for the connection manager lifecycle.
//!
//! Drives [`ConnectionManager`] directly against the mock transport and
//! checks state transitions, notifications and stream release.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use busbridge::app::events::LinkEvent;
use busbridge::app::ports::EventSink;
use busbridge::config::{ConfigError, LinkConfig};
use busbridge::error::{Error, TransportError, UsageError};
use busbridge::link::{ConnectionManager, ConnectionState, ResponseHandler};
use busbridge::protocol::Response;

use crate::mock_link::{MockGateway, MockTransport, RecordingSink, gateway_device, wait_until};

type Seen = Arc<Mutex<Vec<Response>>>;

fn fast_config() -> LinkConfig {
    LinkConfig {
        connect_timeout_ms: 1_000,
        send_timeout_ms: 200,
        read_poll_ms: 5,
        ..LinkConfig::default()
    }
}

fn setup() -> (ConnectionManager<MockTransport>, MockGateway, Arc<RecordingSink>) {
    let (transport, gateway) = MockTransport::new();
    let sink = RecordingSink::new();
    let dyn_sink: Arc<dyn EventSink> = sink.clone();
    (ConnectionManager::new(transport, fast_config(), dyn_sink), gateway, sink)
}

fn collector() -> (ResponseHandler, Seen) {
    let seen: Seen = Arc::default();
    let out = Arc::clone(&seen);
    (Box::new(move |r| out.lock().unwrap().push(r)), seen)
}

fn ignore() -> ResponseHandler {
    Box::new(|_| {})
}

// ── connect ───────────────────────────────────────────────────

#[test]
fn connect_opens_session_and_notifies() {
    let (link, gateway, sink) = setup();
    link.connect(&gateway_device(), ignore()).unwrap();

    assert_eq!(link.state(), ConnectionState::Open);
    assert_eq!(link.connected_device(), Some(gateway_device()));
    assert_eq!(gateway.opens(), 1);
    assert_eq!(sink.events(), vec![LinkEvent::Connected(gateway_device())]);
}

#[test]
fn connect_while_open_is_rejected() {
    let (link, gateway, _sink) = setup();
    link.connect(&gateway_device(), ignore()).unwrap();

    let err = link.connect(&gateway_device(), ignore()).unwrap_err();
    assert_eq!(err, Error::Usage(UsageError::AlreadyConnected));
    assert_eq!(link.state(), ConnectionState::Open);
    assert_eq!(gateway.opens(), 1, "no second stream opened");
}

#[test]
fn connect_while_connecting_is_rejected() {
    let (link, gateway, _sink) = setup();
    gateway.set_open_delay(Duration::from_millis(300));

    thread::scope(|s| {
        let first = s.spawn(|| link.connect(&gateway_device(), ignore()));
        assert!(wait_until(Duration::from_secs(1), || link.state()
            == ConnectionState::Connecting));

        assert_eq!(
            link.connect(&gateway_device(), ignore()),
            Err(Error::Usage(UsageError::AlreadyConnecting))
        );
        assert!(first.join().unwrap().is_ok());
    });
    assert_eq!(link.state(), ConnectionState::Open);
    assert_eq!(gateway.opens(), 1);
}

#[test]
fn failed_open_notifies_and_returns_to_idle() {
    let (link, gateway, sink) = setup();
    gateway.set_fail_open(Some(TransportError::NotFound));

    let err = link.connect(&gateway_device(), ignore()).unwrap_err();
    assert_eq!(err, Error::TransportOpen(TransportError::NotFound));
    assert!(err.is_session_fatal());
    assert_eq!(link.state(), ConnectionState::Idle);
    assert!(matches!(
        sink.events().as_slice(),
        [LinkEvent::ConnectionError(msg)] if msg.contains("ESP32-RS485-GW")
    ));

    // The failure is not sticky.
    gateway.set_fail_open(None);
    link.connect(&gateway_device(), ignore()).unwrap();
    assert!(link.is_open());
}

#[test]
fn invalid_config_is_rejected_before_opening() {
    let (transport, gateway) = MockTransport::new();
    let sink = RecordingSink::new();
    let config = LinkConfig {
        read_chunk_size: 0,
        ..fast_config()
    };
    let link = ConnectionManager::new(transport, config, sink.clone());

    let err = link.connect(&gateway_device(), ignore()).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::ValidationFailed(_))));
    assert_eq!(link.state(), ConnectionState::Idle);
    assert_eq!(gateway.opens(), 0);
    assert!(sink.events().is_empty());
}

#[test]
fn open_slower_than_timeout_fails_and_late_stream_is_closed() {
    let (transport, gateway) = MockTransport::new();
    let sink = RecordingSink::new();
    let config = LinkConfig {
        connect_timeout_ms: 50,
        ..fast_config()
    };
    let link = ConnectionManager::new(transport, config, sink.clone());
    gateway.set_open_delay(Duration::from_millis(200));

    let err = link.connect(&gateway_device(), ignore()).unwrap_err();
    assert_eq!(err, Error::TransportOpen(TransportError::Timeout));
    assert_eq!(link.state(), ConnectionState::Idle);
    assert!(wait_until(Duration::from_secs(1), || gateway.closes() == 1));
}

#[test]
fn disconnect_cancels_pending_connect() {
    let (link, gateway, _sink) = setup();
    gateway.set_open_delay(Duration::from_millis(200));

    thread::scope(|s| {
        let pending = s.spawn(|| link.connect(&gateway_device(), ignore()));
        assert!(wait_until(Duration::from_secs(1), || link.state()
            == ConnectionState::Connecting));
        assert!(link.disconnect());
        assert_eq!(
            pending.join().unwrap(),
            Err(Error::TransportOpen(TransportError::Disconnected))
        );
    });
    assert_eq!(link.state(), ConnectionState::Idle);
    assert_eq!(gateway.closes(), 1, "stream opened after cancel is released");
}

// ── send ──────────────────────────────────────────────────────

#[test]
fn send_rejected_unless_open() {
    let (link, gateway, _sink) = setup();
    assert_eq!(link.send(b"{}\n"), Err(Error::Usage(UsageError::NotConnected)));
    assert_eq!(link.state(), ConnectionState::Idle);

    link.connect(&gateway_device(), ignore()).unwrap();
    link.disconnect();
    assert_eq!(link.send(b"{}\n"), Err(Error::Usage(UsageError::NotConnected)));
    assert_eq!(gateway.written(), "");
}

#[test]
fn send_writes_exact_bytes() {
    let (link, gateway, _sink) = setup();
    link.connect(&gateway_device(), ignore()).unwrap();

    link.send(b"{\"bus\":1,\"baud\":9600}\n").unwrap();
    link.send(b"{\"cmd\":\"wifi_status\"}\n").unwrap();
    assert_eq!(
        gateway.written(),
        "{\"bus\":1,\"baud\":9600}\n{\"cmd\":\"wifi_status\"}\n"
    );
}

#[test]
fn slow_write_times_out_without_closing() {
    let (link, gateway, _sink) = setup();
    link.connect(&gateway_device(), ignore()).unwrap();
    gateway.set_write_delay(Duration::from_millis(500));

    let err = link.send(b"{}\n").unwrap_err();
    assert_eq!(err, Error::TransportWrite(TransportError::Timeout));
    assert!(!err.is_session_fatal());
    assert_eq!(link.state(), ConnectionState::Open);
}

#[test]
fn timed_out_send_never_reaches_the_wire() {
    let (link, gateway, _sink) = setup();
    link.connect(&gateway_device(), ignore()).unwrap();

    // The read thread holds the stream past the send deadline.
    gateway.stall_next_read(Duration::from_millis(400));
    thread::sleep(Duration::from_millis(30));

    let err = link.send(b"{\"cmd\":\"tcp_stop\"}\n").unwrap_err();
    assert_eq!(err, Error::TransportWrite(TransportError::Timeout));

    thread::sleep(Duration::from_millis(400));
    assert_eq!(gateway.written(), "");
    assert_eq!(link.state(), ConnectionState::Open);

    link.send(b"{\"cmd\":\"wifi_status\"}\n").unwrap();
    assert_eq!(gateway.written(), "{\"cmd\":\"wifi_status\"}\n");
}

#[test]
fn send_queued_behind_slow_write_is_discarded() {
    let (link, gateway, _sink) = setup();
    link.connect(&gateway_device(), ignore()).unwrap();
    gateway.set_write_delay(Duration::from_millis(500));

    // First frame is already on its way out when the caller gives up.
    assert_eq!(
        link.send(b"{\"bus\":1,\"tx_hex\":\"01\"}\n"),
        Err(Error::TransportWrite(TransportError::Timeout))
    );
    // Second frame is still queued at its deadline.
    assert_eq!(
        link.send(b"{\"bus\":1,\"tx_hex\":\"02\"}\n"),
        Err(Error::TransportWrite(TransportError::Timeout))
    );

    gateway.set_write_delay(Duration::ZERO);
    assert!(wait_until(Duration::from_secs(2), || !gateway.written().is_empty()));
    link.send(b"{\"bus\":1,\"tx_hex\":\"03\"}\n").unwrap();
    assert_eq!(
        gateway.written(),
        "{\"bus\":1,\"tx_hex\":\"01\"}\n{\"bus\":1,\"tx_hex\":\"03\"}\n"
    );
}

// ── read loop ─────────────────────────────────────────────────

#[test]
fn responses_reach_handler_in_order() {
    let (link, gateway, _sink) = setup();
    let (handler, seen) = collector();
    link.connect(&gateway_device(), handler).unwrap();

    gateway.push(b"{\"bus\":1,\"rx_hex\":\"01\"}\n{\"bus\":2,\"rx_");
    gateway.push(b"hex\":\"02\"}\n");

    assert!(wait_until(Duration::from_secs(2), || seen.lock().unwrap().len() == 2));
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].bus, Some(1));
    assert_eq!(seen[1].bus, Some(2));
    assert_eq!(seen[1].rx_hex.as_deref(), Some("02"));
}

#[test]
fn malformed_frame_is_skipped() {
    let (link, gateway, _sink) = setup();
    let (handler, seen) = collector();
    link.connect(&gateway_device(), handler).unwrap();

    gateway.push(b"{\"ok\":true,\"bus\":1}\n}{garbage\n{\"ok\":true,\"bus\":2}\n");

    assert!(wait_until(Duration::from_secs(2), || seen.lock().unwrap().len() == 2));
    assert_eq!(link.state(), ConnectionState::Open);
}

#[test]
fn read_error_reports_connection_lost() {
    let (link, gateway, sink) = setup();
    link.connect(&gateway_device(), ignore()).unwrap();

    gateway.fail_read(TransportError::Closed);

    assert!(sink.wait_for(1, |e| *e == LinkEvent::ConnectionLost));
    assert_eq!(link.state(), ConnectionState::Idle);
    assert_eq!(link.connected_device(), None);
    assert_eq!(gateway.closes(), 1);
    assert_eq!(link.send(b"{}\n"), Err(Error::Usage(UsageError::NotConnected)));
    assert_eq!(sink.count(|e| *e == LinkEvent::Disconnected), 0);
}

#[test]
fn panicking_handler_reports_connection_lost() {
    let (link, gateway, sink) = setup();
    fn explode(_: Response) {
        panic!("handler failure");
    }
    link.connect(&gateway_device(), Box::new(explode)).unwrap();

    gateway.push(b"{\"ok\":true}\n");

    assert!(sink.wait_for(1, |e| *e == LinkEvent::ConnectionLost));
    assert_eq!(link.state(), ConnectionState::Idle);
    assert_eq!(gateway.closes(), 1);
    assert_eq!(link.send(b"{}\n"), Err(Error::Usage(UsageError::NotConnected)));

    // The next session reads normally.
    let (handler, seen) = collector();
    link.connect(&gateway_device(), handler).unwrap();
    gateway.push(b"{\"ok\":true}\n");
    assert!(wait_until(Duration::from_secs(2), || seen.lock().unwrap().len() == 1));
}

#[test]
fn reconnect_after_loss_uses_fresh_session() {
    let (link, gateway, sink) = setup();
    link.connect(&gateway_device(), ignore()).unwrap();
    gateway.fail_read(TransportError::Io(std::io::ErrorKind::Other));
    assert!(sink.wait_for(1, |e| *e == LinkEvent::ConnectionLost));

    let (handler, seen) = collector();
    link.connect(&gateway_device(), handler).unwrap();
    gateway.push(b"{\"event\":\"tcp_client_connected\"}\n");
    assert!(wait_until(Duration::from_secs(2), || seen.lock().unwrap().len() == 1));
    assert_eq!(gateway.opens(), 2);
}

// ── disconnect ────────────────────────────────────────────────

#[test]
fn disconnect_is_idempotent() {
    let (link, gateway, sink) = setup();
    assert!(!link.disconnect(), "nothing to close yet");

    link.connect(&gateway_device(), ignore()).unwrap();
    assert!(link.disconnect());
    assert!(!link.disconnect());

    assert_eq!(link.state(), ConnectionState::Idle);
    assert_eq!(gateway.closes(), 1);
    assert_eq!(sink.count(|e| *e == LinkEvent::Disconnected), 1);
    assert_eq!(sink.count(|e| *e == LinkEvent::ConnectionLost), 0);
}

#[test]
fn no_responses_after_disconnect() {
    let (link, gateway, _sink) = setup();
    let (handler, seen) = collector();
    link.connect(&gateway_device(), handler).unwrap();
    link.disconnect();

    // The old session's sender still exists; nobody is reading it.
    gateway.push(b"{\"ok\":true}\n");
    thread::sleep(Duration::from_millis(50));
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn dropping_manager_releases_stream() {
    let (link, gateway, sink) = setup();
    link.connect(&gateway_device(), ignore()).unwrap();
    drop(link);
    assert_eq!(gateway.closes(), 1);
    assert_eq!(sink.count(|e| *e == LinkEvent::Disconnected), 1);
}

#[test]
fn scan_forwards_to_provider() {
    let (link, _gateway, _sink) = setup();
    assert_eq!(link.scan().unwrap(), vec![gateway_device()]);
}
