//! Serial port configuration and connection management
//!
//! Handles opening, probing, and closing the single active connection. The
//! fixed console settings (115200 8N1, short read timeout) live in an
//! explicit [`PortConfig`] value instead of process-wide globals.

use std::io::{self, Read, Write};
use std::time::Duration;

use colored::Colorize;
use log::debug;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::Error;

/// Default baud rate for the console
pub const DEFAULT_BAUD: u32 = 115200;

/// Configuration for the serial connection and the loops driving it
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, COM3)
    pub port_path: String,
    /// Baud rate (default: 115200)
    pub baud_rate: u32,
    /// Data bits (default: 8)
    pub data_bits: DataBits,
    /// Parity (default: None)
    pub parity: Parity,
    /// Stop bits (default: 1)
    pub stop_bits: StopBits,
    /// Flow control (default: None)
    pub flow_control: FlowControl,
    /// Read timeout; keeps device reads from stalling the poll loop
    pub read_timeout: Duration,
    /// Pause between relay poll iterations
    pub poll_interval: Duration,
    /// Pause between discovery retries
    pub discovery_interval: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            read_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            discovery_interval: Duration::from_millis(200),
        }
    }
}

impl PortConfig {
    /// Create a new configuration with default console settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the port path
    pub fn with_port_path(mut self, port_path: &str) -> Self {
        self.port_path = port_path.to_string();
        self
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

/// Byte-level view of the open device, as the relay loop sees it.
///
/// [`SerialConnection`] implements this over the real port; tests drive the
/// relay with a scripted double instead.
pub trait DevicePort {
    /// Number of bytes readable right now without blocking
    fn bytes_to_read(&mut self) -> io::Result<u32>;
    /// Read into the buffer, returning the byte count
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Write the whole buffer
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;
}

/// The single active serial connection
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    config: PortConfig,
}

impl SerialConnection {
    /// Open the configured port, announcing the connection on success
    pub fn open(config: PortConfig) -> Result<Self, Error> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| Error::ConnectionOpen {
                port: config.port_path.clone(),
                source,
            })?;

        println!(
            "\nListening on serial port {} at {} baud...\n",
            config.port_path.white().bold(),
            config.baud_rate
        );

        Ok(Self { port, config })
    }

    /// Get the port configuration
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Release the port, announcing the close
    pub fn close(self) {
        let path = self.config.port_path.clone();
        drop(self.port);
        println!("\nClosed serial port {}\n", path.white().bold());
    }
}

impl DevicePort for SerialConnection {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port
            .bytes_to_read()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)
    }
}

/// Probe a candidate: open it at the configured rate and drop the handle
/// immediately. Failures (missing, busy, permission) are expected and only
/// logged.
pub fn probe(path: &str, config: &PortConfig) -> bool {
    match serialport::new(path, config.baud_rate)
        .timeout(config.read_timeout)
        .open()
    {
        Ok(port) => {
            drop(port);
            true
        }
        Err(e) => {
            debug!("probe failed for {}: {}", path, e);
            false
        }
    }
}
