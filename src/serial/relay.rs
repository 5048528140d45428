//! The steady-state relay between device and keyboard
//!
//! A fixed-rate poll combining two readiness conditions in one loop body:
//! device bytes are drained and streamed out exactly as received, then at
//! most one queued user line is transmitted. An empty line ends the session.
//! Device reads are bounded by the port's short timeout and user input
//! arrives through the queue, so neither side can stall the other.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::thread;

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use log::debug;

use crate::input;
use crate::serial::port::{DevicePort, PortConfig};

enum Step {
    Continue,
    Quit,
}

/// Bidirectional relay session over an open device.
///
/// Device output goes to the sink `W` (stdout in the binary, a buffer in
/// tests) and, when configured, to a transcript file alongside every line
/// sent.
pub struct RelaySession<W: Write> {
    config: PortConfig,
    out: W,
    transcript: Option<BufWriter<File>>,
    bytes_received: usize,
    lines_sent: usize,
}

impl<W: Write> RelaySession<W> {
    pub fn new(config: PortConfig, out: W) -> Self {
        Self {
            config,
            out,
            transcript: None,
            bytes_received: 0,
            lines_sent: 0,
        }
    }

    /// Mirror the session to a transcript file
    pub fn with_transcript(mut self, path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create transcript file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(
            writer,
            "--- session opened {} ---",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        self.transcript = Some(writer);
        Ok(self)
    }

    /// Run until the user submits an empty line.
    ///
    /// Lines queued before entry are leftovers from the discovery and
    /// selection phases; they are dropped so they are neither transmitted
    /// nor taken for the quit sentinel.
    pub fn run<D: DevicePort>(&mut self, device: &mut D, queue: &Receiver<String>) -> Result<()> {
        let dropped = input::drain_pending(queue);
        if dropped > 0 {
            debug!("dropped {} stale input line(s)", dropped);
        }

        loop {
            match self.poll_once(device, queue)? {
                Step::Quit => break,
                Step::Continue => thread::sleep(self.config.poll_interval),
            }
        }

        self.finish()
    }

    /// One poll iteration: drain the device, then pop at most one line.
    fn poll_once<D: DevicePort>(&mut self, device: &mut D, queue: &Receiver<String>) -> Result<Step> {
        self.drain_device(device)?;

        if let Some(line) = input::try_pop(queue) {
            if line.is_empty() {
                return Ok(Step::Quit);
            }
            self.send_line(device, &line)?;
        }

        Ok(Step::Continue)
    }

    /// Read and print everything the device has ready right now
    fn drain_device<D: DevicePort>(&mut self, device: &mut D) -> Result<()> {
        loop {
            let available = device
                .bytes_to_read()
                .context("failed to query serial port")? as usize;
            if available == 0 {
                return Ok(());
            }

            let mut buf = vec![0u8; available];
            let n = match device.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => return Ok(()),
                Err(e) => return Err(e).context("failed to read from serial port"),
            };
            buf.truncate(n);
            self.bytes_received += n;

            // A chunk that does not decode is dropped whole, same as line
            // noise on the wire.
            if let Some(text) = decode_ascii(&buf) {
                self.out.write_all(text.as_bytes())?;
                self.out.flush()?;
                if let Some(ref mut transcript) = self.transcript {
                    transcript.write_all(text.as_bytes())?;
                }
            }
        }
    }

    /// Transmit one user line with the trailing newline appended
    fn send_line<D: DevicePort>(&mut self, device: &mut D, line: &str) -> Result<()> {
        let mut data = line.as_bytes().to_vec();
        data.push(b'\n');
        device
            .write_all(&data)
            .context("failed to write to serial port")?;
        self.lines_sent += 1;

        if let Some(ref mut transcript) = self.transcript {
            writeln!(transcript, "{}", line)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(ref mut transcript) = self.transcript {
            writeln!(
                transcript,
                "--- session closed {} ---",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            )?;
            transcript.flush()?;
        }

        println!(
            "\n{}",
            format!(
                "{} bytes received, {} lines sent",
                self.bytes_received, self.lines_sent
            )
            .dimmed()
        );
        Ok(())
    }
}

/// Decode a device chunk as ASCII; None if any byte falls outside.
fn decode_ascii(chunk: &[u8]) -> Option<&str> {
    if chunk.is_ascii() {
        // ASCII is a strict subset of UTF-8.
        std::str::from_utf8(chunk).ok()
    } else {
        None
    }
}
