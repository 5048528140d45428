//! Port discovery: enumeration, the searching retry loop, and the menu
//!
//! Enumeration produces a stable, sorted list of candidate paths that
//! actually open. The retry loop wraps it with the in-place "Searching"
//! animation and the keystroke cancellation path; the enumerator itself is
//! injected as a closure so the loop can be exercised against stubs.

use std::io::{self, Write};
use std::sync::mpsc::Receiver;
use std::thread;

use colored::Colorize;

use crate::error::Error;
use crate::input;
use crate::serial::port::{self, PortConfig};

/// Outcome of the discovery retry loop
#[derive(Debug)]
pub enum Discovery {
    /// At least one openable port; never empty
    Found(Vec<String>),
    /// The user gave up while nothing was attached; caller exits cleanly
    Cancelled,
}

/// Outcome of the port menu
#[derive(Debug, PartialEq)]
pub enum Selection {
    Chosen(String),
    /// Non-numeric or out-of-range answer; caller exits cleanly
    Invalid,
}

/// List candidate ports that can actually be opened, sorted for a stable
/// menu order within one call.
pub fn list_ports(config: &PortConfig) -> Result<Vec<String>, Error> {
    let mut ports: Vec<String> = candidate_ports()?
        .into_iter()
        .filter(|path| port::probe(path, config))
        .collect();
    ports.sort();
    Ok(ports)
}

// Sequential COM names; probing filters down to the ones that exist.
#[cfg(windows)]
fn candidate_ports() -> Result<Vec<String>, Error> {
    Ok((1..=256).map(|i| format!("COM{}", i)).collect())
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn candidate_ports() -> Result<Vec<String>, Error> {
    use walkdir::WalkDir;

    let mut candidates = Vec::new();
    for entry in WalkDir::new("/dev")
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_tty_candidate(&name) {
            candidates.push(format!("/dev/{}", name));
        }
    }
    Ok(candidates)
}

#[cfg(not(any(windows, target_os = "linux", target_os = "macos")))]
fn candidate_ports() -> Result<Vec<String>, Error> {
    Err(Error::UnsupportedPlatform(std::env::consts::OS))
}

/// Matches tty[A-Za-z]* on Linux and tty.* on macOS. Both patterns skip the
/// bare name "tty", the process's own controlling terminal, and the Linux
/// one also skips tty0..tty63 virtual consoles.
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn is_tty_candidate(name: &str) -> bool {
    let rest = match name.strip_prefix("tty") {
        Some(rest) => rest,
        None => return false,
    };

    #[cfg(target_os = "macos")]
    {
        rest.starts_with('.')
    }
    #[cfg(target_os = "linux")]
    {
        rest.chars().next().map_or(false, |c| c.is_ascii_alphabetic())
    }
}

/// Poll the enumerator until it yields at least one port.
///
/// An empty pass checks the queue without blocking: any pending line means
/// the user wants out, so the notice is printed and one further
/// acknowledgment line is awaited before reporting [`Discovery::Cancelled`].
/// Otherwise the searching line is redrawn in place and the loop sleeps for
/// the configured interval before retrying.
pub fn discover<F>(
    mut enumerate: F,
    queue: &Receiver<String>,
    config: &PortConfig,
) -> Result<Discovery, Error>
where
    F: FnMut() -> Result<Vec<String>, Error>,
{
    let mut dots = 0usize;

    loop {
        let ports = enumerate()?;
        if !ports.is_empty() {
            clear_searching_line();
            return Ok(Discovery::Found(ports));
        }

        if input::try_pop(queue).is_some() {
            clear_searching_line();
            println!("{}", "No serial devices found.".yellow());
            println!("Press Enter to exit.");
            let _ = queue.recv();
            return Ok(Discovery::Cancelled);
        }

        render_searching(dots);
        dots = (dots + 1) % 4;
        thread::sleep(config.discovery_interval);
    }
}

/// Redraw the searching line in place; the counter cycles 0..=3 dots.
fn render_searching(dots: usize) {
    print!("\rSearching for serial devices{:<3}", ".".repeat(dots));
    let _ = io::stdout().flush();
}

fn clear_searching_line() {
    print!("\r{:<34}\r", "");
    let _ = io::stdout().flush();
}

/// Pick a port: a sole candidate is taken without prompting; otherwise a
/// 1-based menu is printed and the answer line is read from the queue (the
/// collector owns stdin).
pub fn select_port(ports: &[String], queue: &Receiver<String>) -> Selection {
    if ports.len() == 1 {
        return Selection::Chosen(ports[0].clone());
    }

    println!();
    println!("{}", "Choose a serial port:".cyan().bold());
    for (i, port) in ports.iter().enumerate() {
        println!("  {} - {}", (i + 1).to_string().white().bold(), port);
    }
    println!();

    let line = match queue.recv() {
        Ok(line) => line,
        Err(_) => return Selection::Invalid,
    };

    match parse_choice(&line, ports.len()) {
        Some(index) => Selection::Chosen(ports[index].clone()),
        None => Selection::Invalid,
    }
}

/// Map a 1-based menu answer onto an index; None for anything that is not
/// an integer in [1, len].
fn parse_choice(line: &str, len: usize) -> Option<usize> {
    let choice: usize = line.trim().parse().ok()?;
    if (1..=len).contains(&choice) {
        Some(choice - 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn test_config() -> PortConfig {
        // Tight interval so retry tests finish quickly
        let mut config = PortConfig::default();
        config.discovery_interval = Duration::from_millis(1);
        config
    }

    fn ports(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_discover_returns_first_non_empty() {
        let (_tx, rx) = mpsc::channel();
        let mut calls = 0;
        let result = discover(
            || {
                calls += 1;
                Ok(ports(&["/dev/ttyUSB0"]))
            },
            &rx,
            &test_config(),
        )
        .unwrap();

        assert_eq!(calls, 1);
        match result {
            Discovery::Found(found) => assert_eq!(found, ports(&["/dev/ttyUSB0"])),
            Discovery::Cancelled => panic!("expected ports"),
        }
    }

    #[test]
    fn test_discover_retries_until_found() {
        let (_tx, rx) = mpsc::channel();
        let mut calls = 0;
        let result = discover(
            || {
                calls += 1;
                if calls <= 3 {
                    Ok(Vec::new())
                } else {
                    Ok(ports(&["COM3"]))
                }
            },
            &rx,
            &test_config(),
        )
        .unwrap();

        assert_eq!(calls, 4);
        assert!(matches!(result, Discovery::Found(_)));
    }

    #[test]
    fn test_discover_does_not_consume_idle_queue() {
        let (tx, rx) = mpsc::channel();
        let mut calls = 0;
        let result = discover(
            || {
                calls += 1;
                Ok(ports(&["COM1"]))
            },
            &rx,
            &test_config(),
        )
        .unwrap();

        assert!(matches!(result, Discovery::Found(_)));
        // Nothing was queued, nothing consumed; a line sent now is intact.
        tx.send("later".to_string()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "later");
    }

    #[test]
    fn test_discover_cancelled_after_acknowledgment() {
        let (tx, rx) = mpsc::channel();
        tx.send("anything".to_string()).unwrap();
        tx.send("ack".to_string()).unwrap();

        let mut calls = 0;
        let result = discover(
            || {
                calls += 1;
                Ok(Vec::new())
            },
            &rx,
            &test_config(),
        )
        .unwrap();

        assert_eq!(calls, 1);
        assert!(matches!(result, Discovery::Cancelled));
        // Both the cancellation line and the acknowledgment were consumed.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_discover_propagates_enumeration_error() {
        let (_tx, rx) = mpsc::channel();
        let result = discover(
            || Err(Error::UnsupportedPlatform("plan9")),
            &rx,
            &test_config(),
        );
        assert!(matches!(result, Err(Error::UnsupportedPlatform(_))));
    }

    #[test]
    fn test_select_sole_candidate_skips_menu() {
        let (tx, rx) = mpsc::channel();
        tx.send("2".to_string()).unwrap();

        let selection = select_port(&ports(&["/dev/ttyUSB0"]), &rx);
        assert_eq!(selection, Selection::Chosen("/dev/ttyUSB0".to_string()));
        // The queued line was not consumed.
        assert_eq!(rx.try_recv().unwrap(), "2");
    }

    #[test]
    fn test_select_valid_choice() {
        let (tx, rx) = mpsc::channel();
        tx.send("2".to_string()).unwrap();

        let selection = select_port(&ports(&["COM1", "COM3", "COM7"]), &rx);
        assert_eq!(selection, Selection::Chosen("COM3".to_string()));
    }

    #[test]
    fn test_select_invalid_choices() {
        for bad in ["0", "4", "-1", "abc", ""] {
            let (tx, rx) = mpsc::channel();
            tx.send(bad.to_string()).unwrap();
            let selection = select_port(&ports(&["COM1", "COM2", "COM3"]), &rx);
            assert_eq!(selection, Selection::Invalid, "input {:?}", bad);
        }
    }

    #[test]
    fn test_parse_choice_bounds() {
        assert_eq!(parse_choice("1", 3), Some(0));
        assert_eq!(parse_choice("3", 3), Some(2));
        assert_eq!(parse_choice(" 2 ", 3), Some(1));
        assert_eq!(parse_choice("0", 3), None);
        assert_eq!(parse_choice("4", 3), None);
        assert_eq!(parse_choice("two", 3), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_tty_candidate_filter() {
        assert!(is_tty_candidate("ttyUSB0"));
        assert!(is_tty_candidate("ttyACM1"));
        assert!(is_tty_candidate("ttyS0"));
        // The controlling terminal and virtual consoles are not candidates.
        assert!(!is_tty_candidate("tty"));
        assert!(!is_tty_candidate("tty0"));
        assert!(!is_tty_candidate("random"));
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_tty_candidate_filter() {
        assert!(is_tty_candidate("tty.usbserial-1410"));
        assert!(!is_tty_candidate("tty"));
        assert!(!is_tty_candidate("ttys000"));
    }
}
