//! Error types for checksum operations

use thiserror::Error;

/// Errors that can occur while handling checksum values
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// Checksum string is not valid hex
    #[error("Invalid checksum format: {0}")]
    InvalidFormat(String),

    /// Checksum has the wrong number of bytes
    #[error("Invalid checksum size: expected {expected}, got {actual}")]
    InvalidSize {
        /// Expected size in bytes
        expected: usize,
        /// Actual size in bytes
        actual: usize,
    },
}
