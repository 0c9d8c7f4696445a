//! Utility functions and helpers
//!
//! This module provides the clock abstraction and logging setup used
//! throughout the codebase.

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

/// Initialize `env_logger` with the given filter (e.g. `"info"`, `"dcabs_core=debug"`)
///
/// `RUST_LOG` takes precedence when set. Returns `false` if a logger was
/// already installed.
pub fn init_logging(level: &str) -> bool {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, level),
    )
    .format_timestamp_millis()
    .try_init()
    .is_ok()
}

/// Convert a byte array to a hex string
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging("debug");
        assert!(!init_logging("debug"));
    }

    #[test]
    fn test_bytes_to_hex() {
        assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
    }
}
