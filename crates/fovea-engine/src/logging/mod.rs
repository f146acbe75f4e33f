//! Logging utilities.
//!
//! The engine logs through the `log` facade only. `init_logging` is a convenience
//! for binaries that want the default `env_logger` backend.

mod init;

pub use init::{init_logging, LoggingConfig};
