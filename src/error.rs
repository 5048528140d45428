//! Error types for the console
//!
//! Only failures that abort the program live here. Expected noise (probe
//! failures during enumeration, undecodable device bytes) is absorbed where
//! it occurs and never surfaces as an error value.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The host platform has no known serial device naming convention.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(&'static str),

    /// The selected port could not be opened (gone or permissions changed
    /// since enumeration).
    #[error("failed to open serial port {port}")]
    ConnectionOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },
}
