//! Serial side of the console
//!
//! This module provides:
//! - Port enumeration and the discovery retry loop
//! - Opening and closing the single active connection
//! - The bidirectional relay loop between device and keyboard

pub mod discover;
pub mod port;
pub mod relay;

pub use port::{PortConfig, SerialConnection, DEFAULT_BAUD};
pub use relay::RelaySession;
