//! BusBridge console — line-oriented front end for one gateway.
//!
//! ```text
//!   stdin ──▶ parse_line ──▶ GatewayClient ──▶ TcpTransport / SerialTransport
//!                               │
//!                               ▼
//!                 FanoutSink (LogEventSink + EventQueue) ──▶ printer thread ──▶ stdout
//! ```
//!
//! Usage: `busbridge <host[:port]>` or `busbridge --serial <path>`.
//! Set `BUSBRIDGE_CONFIG` to a JSON file to override [`LinkConfig`] fields.
#![deny(unused_must_use)]

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use log::{debug, info};

use busbridge::adapters::event_queue::EventQueue;
use busbridge::adapters::fanout::FanoutSink;
use busbridge::adapters::log_sink::LogEventSink;
#[cfg(feature = "serial")]
use busbridge::adapters::serial_transport::SerialTransport;
use busbridge::adapters::tcp_transport::TcpTransport;
use busbridge::app::events::LinkEvent;
use busbridge::app::ports::EventSink;
use busbridge::config::LinkConfig;
use busbridge::link::{Device, TransportProvider};
use busbridge::protocol::command::Command;
use busbridge::GatewayClient;

const CONFIG_ENV: &str = "BUSBRIDGE_CONFIG";
const HELP: &str = "\
commands:
  tx <bus> <hex>            send bytes on a bus (e.g. tx 1 01 03 00 00 00 02)
  baud <bus> <rate>         change a bus baud rate
  wifi <ssid> <pwd> [port]  join Wi-Fi and start the TCP bridge
  status                    query Wi-Fi / TCP status
  wifi-off                  leave Wi-Fi
  tcp-stop                  stop the TCP bridge
  history                   print received telemetry, newest first
  clear                     clear the history
  quit";

/// Printer poll interval.
const DRAIN_INTERVAL: Duration = Duration::from_millis(50);

/// BusBridge console - talk to one ESP32 RS-485 gateway
#[derive(Parser, Debug)]
#[command(name = "busbridge", version, long_about = None)]
#[command(group(ArgGroup::new("target").required(true).args(["address", "serial"])))]
struct Args {
    /// Gateway TCP bridge, host[:port]
    address: Option<String>,

    /// Serial / RFCOMM device path (e.g. /dev/rfcomm0)
    #[arg(long, value_name = "PATH")]
    serial: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Send(Command),
    History,
    Clear,
    Help,
    Quit,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();

    let args = Args::parse();
    let config = load_config()?;
    info!("BusBridge v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(path) = args.serial {
        return run_serial(path, config);
    }
    let device = Device::new(args.address.unwrap_or_default());
    let transport = TcpTransport::new(&config).with_endpoint(device.clone());
    run(transport, config, &device)
}

#[cfg(feature = "serial")]
fn run_serial(path: String, config: LinkConfig) -> Result<()> {
    let transport = SerialTransport::new(&config);
    run(transport, config, &Device::new(path))
}

#[cfg(not(feature = "serial"))]
fn run_serial(_path: String, _config: LinkConfig) -> Result<()> {
    anyhow::bail!("serial support not compiled in (enable the `serial` feature)")
}

fn load_config() -> Result<LinkConfig> {
    let Ok(path) = std::env::var(CONFIG_ENV) else {
        return Ok(LinkConfig::default());
    };
    let text =
        std::fs::read_to_string(&path).with_context(|| format!("reading config {path}"))?;
    let config = LinkConfig::from_json(&text)
        .map_err(busbridge::Error::Config)
        .with_context(|| format!("loading config {path}"))?;
    info!("config loaded from {}", path);
    Ok(config)
}

fn run<P: TransportProvider>(transport: P, config: LinkConfig, device: &Device) -> Result<()> {
    let queue = Arc::new(EventQueue::new());
    let sink: Arc<dyn EventSink> = Arc::new(
        FanoutSink::new()
            .with(Arc::new(LogEventSink::new()))
            .with(queue.clone()),
    );
    let default_port = config.default_tcp_port;
    let client = GatewayClient::new(transport, config, sink);

    let stop = Arc::new(AtomicBool::new(false));
    let printer = {
        let queue = Arc::clone(&queue);
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("printer".into())
            .spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    queue.drain().iter().for_each(print_event);
                    thread::sleep(DRAIN_INTERVAL);
                }
            })
            .context("spawning printer thread")?
    };

    let connected = client
        .connect(device)
        .with_context(|| format!("connecting to {}", device.label()));
    if connected.is_ok() {
        println!("connected to {}; type `help` for commands", device.label());
        console(&client, default_port)?;
        client.disconnect();
    }

    stop.store(true, Ordering::Release);
    let _ = printer.join();
    queue.drain().iter().for_each(print_event);
    connected
}

fn console<P: TransportProvider>(client: &GatewayClient<P>, default_port: u16) -> Result<()> {
    let stdin = io::stdin();
    prompt()?;
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        match parse_line(&line, default_port) {
            Ok(None) => {}
            Ok(Some(Action::Quit)) => break,
            Ok(Some(Action::Help)) => println!("{HELP}"),
            Ok(Some(Action::History)) => print_history(client),
            Ok(Some(Action::Clear)) => {
                client.clear_history();
                println!("history cleared");
            }
            Ok(Some(Action::Send(command))) => {
                // Failures are reported through the event queue.
                if let Err(e) = client.send_command(&command) {
                    debug!("{} failed: {}", command.name(), e);
                }
            }
            Err(msg) => println!("{msg}"),
        }
        if !client.is_connected() {
            println!("link closed");
            break;
        }
        prompt()?;
    }
    Ok(())
}

fn prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush().context("flushing stdout")
}

fn parse_line(line: &str, default_port: u16) -> core::result::Result<Option<Action>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let parse_bus = |s: Option<&&str>| -> core::result::Result<u8, String> {
        s.ok_or("missing bus")?
            .parse()
            .map_err(|_| "bus must be a number".to_string())
    };

    let action = match verb {
        "tx" => Action::Send(Command::SendBusData {
            bus: parse_bus(rest.first())?,
            tx_hex: rest.get(1..).map(|hex| hex.join(" ")).unwrap_or_default(),
        }),
        "baud" => Action::Send(Command::SetBaudRate {
            bus: parse_bus(rest.first())?,
            baud: rest
                .get(1)
                .ok_or("missing baud rate")?
                .parse()
                .map_err(|_| "baud rate must be a number".to_string())?,
        }),
        "wifi" => {
            let [ssid, password, port @ ..] = rest.as_slice() else {
                return Err("usage: wifi <ssid> <pwd> [port]".into());
            };
            let port = match port.first() {
                Some(p) => p.parse().map_err(|_| "port must be a number".to_string())?,
                None => default_port,
            };
            Action::Send(Command::WifiConnect {
                ssid: ssid.to_string(),
                password: password.to_string(),
                port,
            })
        }
        "status" => Action::Send(Command::WifiStatus),
        "wifi-off" => Action::Send(Command::WifiDisconnect),
        "tcp-stop" => Action::Send(Command::TcpStop),
        "history" => Action::History,
        "clear" => Action::Clear,
        "help" | "?" => Action::Help,
        "quit" | "exit" => Action::Quit,
        other => return Err(format!("unknown command `{other}` (try `help`)")),
    };
    Ok(Some(action))
}

fn print_history<P: TransportProvider>(client: &GatewayClient<P>) {
    let entries = client.history();
    if entries.is_empty() {
        println!("(no telemetry)");
    }
    for entry in entries {
        println!("#{}  bus {}  {}", entry.id, entry.bus, entry.data);
    }
}

fn print_event(event: &LinkEvent) {
    match event {
        LinkEvent::Connected(_) | LinkEvent::Ack { .. } => {}
        LinkEvent::Disconnected => println!("disconnected"),
        LinkEvent::ConnectionError(msg) => println!("connection error: {msg}"),
        LinkEvent::ConnectionLost => println!("connection lost"),
        LinkEvent::WifiResult(r) if r.ok => println!(
            "wifi connected: ip {} port {}",
            r.ip.as_deref().unwrap_or("?"),
            r.port.map_or_else(|| "?".to_string(), |p| p.to_string())
        ),
        LinkEvent::WifiResult(r) => {
            println!("wifi failed: {}", r.err.as_deref().unwrap_or("unknown error"));
        }
        LinkEvent::WifiStatus(s) => println!(
            "wifi: connected={} ip={} rssi={} tcp={}",
            s.connected.map_or("?".to_string(), |v| v.to_string()),
            s.ip.as_deref().unwrap_or("?"),
            s.rssi.map_or("?".to_string(), |v| v.to_string()),
            s.tcp_running.map_or("?".to_string(), |v| v.to_string()),
        ),
        LinkEvent::Telemetry(entry) => println!("rx bus {}: {}", entry.bus, entry.data),
        LinkEvent::GatewayEvent(name) => println!("gateway: {name}"),
        LinkEvent::GenericError(msg) => println!("error: {msg}"),
    }
}
