//! Configuration module for the extension.
//!
//! Owner identity, command prefix and paginator behaviour all come from the
//! environment of the hosting process.

mod settings;

pub use settings::{ConfigError, ToastSettings};

/// Default attachment ceiling when the host reports none (8 MiB).
pub const DEFAULT_FILESIZE_LIMIT: u64 = 8 * 1024 * 1024;
