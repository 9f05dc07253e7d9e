//! Serial transport adapter (`serial` feature).
//!
//! Covers Bluetooth classic RFCOMM bound to a tty (`/dev/rfcomm0`), and
//! USB-serial bridges.  `scan` lists the OS serial ports; the device id is
//! the port path.  The port read timeout is the link poll interval.

use std::io::{Read, Write};
use std::time::Duration;

use log::info;
use serialport::{SerialPort, SerialPortType};

use crate::config::LinkConfig;
use crate::error::TransportError;
use crate::link::transport::{ByteStream, Device, TransportProvider};

pub struct SerialTransport {
    baud_rate: u32,
    read_poll: Duration,
}

impl SerialTransport {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            baud_rate: config.baud_rate,
            read_poll: config.read_poll(),
        }
    }
}

impl TransportProvider for SerialTransport {
    fn scan(&self) -> Result<Vec<Device>, TransportError> {
        let ports = serialport::available_ports().map_err(serial_error)?;
        Ok(ports
            .into_iter()
            .map(|port| {
                let display_name = match port.port_type {
                    SerialPortType::UsbPort(usb) => usb.product,
                    SerialPortType::BluetoothPort => Some("Bluetooth serial".to_string()),
                    _ => None,
                };
                Device {
                    id: port.port_name,
                    display_name,
                }
            })
            .collect())
    }

    fn open(&self, device: &Device) -> Result<Box<dyn ByteStream>, TransportError> {
        let port = serialport::new(&device.id, self.baud_rate)
            .timeout(self.read_poll)
            .open()
            .map_err(serial_error)?;
        info!("serial: opened {} at {} baud", device.id, self.baud_rate);
        Ok(Box::new(SerialStream {
            port: Some(port),
            path: device.id.clone(),
        }))
    }
}

struct SerialStream {
    port: Option<Box<dyn SerialPort>>,
    path: String,
}

impl SerialStream {
    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl ByteStream for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(self.port()?.write(data)?)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(self.port()?.flush()?)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("serial: closed {}", self.path);
        }
    }
}

fn serial_error(e: serialport::Error) -> TransportError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => TransportError::NotFound,
        serialport::ErrorKind::Io(kind) => TransportError::from(std::io::Error::from(kind)),
        _ => TransportError::Io(std::io::ErrorKind::Other),
    }
}
