//! User input collection
//!
//! Keyboard input is read on a dedicated thread so the main flow can poll
//! the serial device without ever blocking on stdin. Complete lines travel
//! through an mpsc channel; the receiving end is the pending-input queue
//! consumed first by the discovery loop, then by the relay loop.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use log::debug;

/// Spawn the stdin collector and return the pending-input queue.
///
/// The thread blocks on line reads for the whole process lifetime and is
/// never joined; it exits quietly on stdin EOF or when the receiver is
/// dropped.
pub fn spawn_input_thread() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!("stdin read failed: {}", e);
                    break;
                }
            };
            if tx.send(line).is_err() {
                break;
            }
        }
        debug!("input collector finished");
    });

    rx
}

/// Non-blocking check for a pending line. A disconnected queue (stdin hit
/// EOF) reads as nothing pending.
pub fn try_pop(queue: &Receiver<String>) -> Option<String> {
    match queue.try_recv() {
        Ok(line) => Some(line),
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
    }
}

/// Discard every line currently queued, returning how many were dropped.
pub fn drain_pending(queue: &Receiver<String>) -> usize {
    let mut dropped = 0;
    while try_pop(queue).is_some() {
        dropped += 1;
    }
    dropped
}
