//! Host runtime error types.

use dih_core::ConfigError;
use thiserror::Error;

/// Errors that stop the device host.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Hub address could not be reached.
    ///
    /// Fatal at startup. The session only retries registration over an
    /// established stream, never the connection itself.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Session configuration rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Stream I/O failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
