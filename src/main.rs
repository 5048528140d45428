//! Interactive serial console
//!
//! A minimal terminal for talking to a device over a serial connection:
//! discovers available ports, lets the user pick one, then relays bytes
//! between keyboard and device until the user submits an empty line.
//!
//! # Usage
//!
//! ```bash
//! # Discover ports and pick interactively
//! serial-console
//!
//! # Pin the port, override the baud rate
//! serial-console --port /dev/ttyUSB0 --baud 9600
//!
//! # Mirror the session to a transcript file
//! serial-console --log session.txt
//! ```

mod error;
mod input;
mod serial;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use serial::discover::{self, Discovery, Selection};
use serial::{PortConfig, RelaySession, SerialConnection, DEFAULT_BAUD};

/// Interactive serial console
///
/// Minimal terminal for talking to a device over a serial connection
#[derive(Parser)]
#[command(name = "serial-console")]
#[command(author = "Prasanna Gautam")]
#[command(version)]
#[command(about = "Interactive console for serial devices")]
struct Cli {
    /// Serial port path (skips discovery, e.g. /dev/ttyUSB0)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Mirror the session to a transcript file
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    print_banner();

    let config = PortConfig::default().with_baud_rate(cli.baud);
    let queue = input::spawn_input_thread();

    let mut connection = loop {
        let ports = match &cli.port {
            Some(port) => vec![port.clone()],
            None => match discover::discover(|| discover::list_ports(&config), &queue, &config)? {
                Discovery::Found(ports) => ports,
                Discovery::Cancelled => process::exit(0),
            },
        };

        let port = match discover::select_port(&ports, &queue) {
            Selection::Chosen(port) => port,
            Selection::Invalid => {
                println!("{}", "Invalid input.".red());
                process::exit(0);
            }
        };

        match SerialConnection::open(config.clone().with_port_path(&port)) {
            Ok(connection) => break connection,
            // With a pinned port there is nothing to rediscover.
            Err(e) if cli.port.is_some() => return Err(e.into()),
            Err(e) => {
                eprintln!("{} {:#}", "[ERROR]".red().bold(), anyhow::Error::from(e));
                println!("{}", "Searching again...".yellow());
            }
        }
    };

    let mut session = RelaySession::new(config, std::io::stdout());
    if let Some(ref path) = cli.log {
        session = session.with_transcript(path)?;
    }

    session.run(&mut connection, &queue)?;
    connection.close();

    Ok(())
}

fn print_banner() {
    println!("{}", "=".repeat(60).dimmed());
    println!(
        "{}",
        format!("Serial Console v{}", env!("CARGO_PKG_VERSION"))
            .cyan()
            .bold()
    );
    println!("Type a line to send it; press Enter on an empty line to quit.");
    println!("{}", "=".repeat(60).dimmed());
}
