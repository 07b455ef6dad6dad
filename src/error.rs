//! Error types for the Jib battery service.
//!
//! Most runtime failures in this service degrade to an "unknown" or
//! "disconnected" display state instead of surfacing. The variants below are
//! what remains: startup failures and the internal errors that the prober
//! and event sources recover from locally.

use thiserror::Error;

/// Main error type for the Jib battery service.
#[derive(Error, Debug)]
pub enum JibError {
   #[error("Bluetooth error: {0}")]
   Bluetooth(#[from] bluer::Error),

   #[error("D-Bus error: {0}")]
   DBus(#[from] zbus::Error),

   #[error("I/O error: {0}")]
   Io(#[from] std::io::Error),

   #[error("Could not determine config directory")]
   ConfigDirNotFound,

   #[error("Invalid configuration: {0}")]
   InvalidConfig(String),

   #[error("TOML parsing error: {0}")]
   TomlParse(#[from] toml::de::Error),

   #[error("TOML serialization error: {0}")]
   TomlSerialize(#[from] toml::ser::Error),

   #[error("Adapter not found")]
   AdapterNotFound,
}

/// Convenience type alias for Results with `JibError`.
pub type Result<T> = std::result::Result<T, JibError>;
