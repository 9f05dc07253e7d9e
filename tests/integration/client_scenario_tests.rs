//! End-to-end scenarios through [`GatewayClient`]: command in, frame out,
//! gateway response in, notification and history out.

use std::sync::Arc;
use std::time::Duration;

use busbridge::GatewayClient;
use busbridge::app::events::LinkEvent;
use busbridge::app::ports::EventSink;
use busbridge::config::LinkConfig;
use busbridge::error::{Error, UsageError};
use busbridge::protocol::{Command, WifiResult, WifiStatus};

use crate::mock_link::{MockGateway, MockTransport, RecordingSink, gateway_device, wait_until};

fn connected_client() -> (GatewayClient<MockTransport>, MockGateway, Arc<RecordingSink>) {
    let (transport, gateway) = MockTransport::new();
    let sink = RecordingSink::new();
    let dyn_sink: Arc<dyn EventSink> = sink.clone();
    let config = LinkConfig {
        read_poll_ms: 5,
        ..LinkConfig::default()
    };
    let client = GatewayClient::new(transport, config, dyn_sink);
    client.connect(&gateway_device()).unwrap();
    (client, gateway, sink)
}

#[test]
fn set_baud_rate_round_trip() {
    let (client, gateway, sink) = connected_client();

    client.set_baud_rate(1, 9600).unwrap();
    assert_eq!(gateway.written(), "{\"bus\":1,\"baud\":9600}\n");

    gateway.push(b"{\"ok\":true,\"bus\":1,\"baud\":9600}\n");
    assert!(sink.wait_for(1, |e| matches!(e, LinkEvent::Ack { .. })));

    assert_eq!(
        sink.messages(),
        vec![LinkEvent::Ack {
            cmd: None,
            bus: Some(1)
        }]
    );
    assert!(client.history().is_empty());
}

#[test]
fn gateway_error_is_one_notification_and_no_history() {
    let (client, gateway, sink) = connected_client();

    gateway.push(b"{\"ok\":false,\"err\":\"X\",\"bus\":1,\"rx_hex\":\"01\"}\n");
    assert!(sink.wait_for(1, |e| matches!(e, LinkEvent::GenericError(_))));

    assert_eq!(sink.messages(), vec![LinkEvent::GenericError("X".into())]);
    assert!(client.history().is_empty());
}

#[test]
fn telemetry_is_newest_first() {
    let (client, gateway, sink) = connected_client();

    gateway.push(b"{\"bus\":1,\"rx_hex\":\"0A\"}\n");
    assert!(sink.wait_for(1, |e| matches!(e, LinkEvent::Telemetry(_))));
    gateway.push(b"{\"bus\":2,\"rx_hex\":\"01 02\"}\n");
    assert!(sink.wait_for(2, |e| matches!(e, LinkEvent::Telemetry(_))));

    let history = client.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].bus, 2);
    assert_eq!(history[0].data, "01 02");
    assert_eq!(history[0].bytes().unwrap(), vec![0x01, 0x02]);
    assert_eq!(history[1].bus, 1);

    client.clear_history();
    assert!(client.history().is_empty());
}

#[test]
fn two_frames_in_one_chunk_dispatch_in_order() {
    let (_client, gateway, sink) = connected_client();

    gateway.push(
        b"{\"cmd\":\"wifi_status\",\"connected\":true,\"ip\":\"10.0.0.7\",\"rssi\":-61,\"tcp\":true}\n\
          {\"event\":\"tcp_client_connected\"}\n",
    );
    assert!(wait_until(Duration::from_secs(2), || sink.messages().len() == 2));

    assert_eq!(
        sink.messages(),
        vec![
            LinkEvent::WifiStatus(WifiStatus {
                connected: Some(true),
                ip: Some("10.0.0.7".into()),
                rssi: Some(-61),
                tcp_running: Some(true),
            }),
            LinkEvent::GatewayEvent("tcp_client_connected".into()),
        ]
    );
}

#[test]
fn wifi_connect_uses_default_port_and_reports_result() {
    let (client, gateway, sink) = connected_client();

    client.wifi_connect("lab", "hunter2", None).unwrap();
    assert_eq!(
        gateway.written(),
        "{\"cmd\":\"wifi_connect\",\"ssid\":\"lab\",\"pwd\":\"hunter2\",\"port\":3333}\n"
    );

    gateway.push(b"{\"cmd\":\"wifi_connect\",\"ok\":true,\"ip\":\"10.0.0.7\",\"port\":3333}\n");
    assert!(sink.wait_for(1, |e| matches!(e, LinkEvent::WifiResult(_))));
    assert_eq!(
        sink.messages(),
        vec![LinkEvent::WifiResult(WifiResult {
            ok: true,
            ip: Some("10.0.0.7".into()),
            port: Some(3333),
            err: None,
        })]
    );
}

#[test]
fn garbage_between_frames_does_not_disturb_dispatch() {
    let (client, gateway, sink) = connected_client();

    gateway.push(b"{\"bus\":1,\"rx_hex\":\"01\"}\nnot json at all\n[1,2]\n{\"bus\":1,\"rx_hex\":\"02\"}\n");
    assert!(sink.wait_for(2, |e| matches!(e, LinkEvent::Telemetry(_))));

    assert_eq!(client.history().len(), 2);
    assert_eq!(sink.count(|e| matches!(e, LinkEvent::GenericError(_))), 0);
}

#[test]
fn unrecognised_frames_are_silent() {
    let (client, gateway, sink) = connected_client();

    gateway.push(b"{\"bus\":1}\n{}\n{\"ok\":true}\n");
    assert!(sink.wait_for(1, |e| matches!(e, LinkEvent::Ack { .. })));
    assert_eq!(sink.messages().len(), 1);
    assert!(client.history().is_empty());
}

#[test]
fn commands_after_link_loss_are_refused() {
    let (client, gateway, sink) = connected_client();
    gateway.fail_read(busbridge::error::TransportError::Closed);
    assert!(sink.wait_for(1, |e| *e == LinkEvent::ConnectionLost));

    assert_eq!(
        client.send_command(&Command::WifiStatus),
        Err(Error::Usage(UsageError::NotConnected))
    );
    assert_eq!(
        sink.events().last(),
        Some(&LinkEvent::GenericError("no device connected".into()))
    );
}

#[test]
fn invalid_commands_never_reach_the_wire() {
    let (client, gateway, _sink) = connected_client();

    assert!(client.send_bus_data(1, "0").is_err());
    assert!(client.send_bus_data(1, "").is_err());
    assert!(client.set_baud_rate(2, 0).is_err());
    assert!(client.wifi_connect("", "pwd", None).is_err());
    assert_eq!(gateway.written(), "");

    client.send_bus_data(2, "01:03:00").unwrap();
    client.send_bus_bytes(1, &[0x0A, 0xFF]).unwrap();
    client.tcp_stop().unwrap();
    assert_eq!(
        gateway.written(),
        "{\"bus\":2,\"tx_hex\":\"01:03:00\"}\n\
         {\"bus\":1,\"tx_hex\":\"0A FF\"}\n\
         {\"cmd\":\"tcp_stop\"}\n"
    );
}
