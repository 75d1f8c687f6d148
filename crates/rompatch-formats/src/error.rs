//! Error types for patch parsing, creation and application
//!
//! Errors fall into three groups:
//!
//! - **Format errors**: bad header or footer magic, truncated or corrupt
//!   records, values outside the limits of the format.
//! - **Checksum errors**: a computed hash differs from the value stored in
//!   the patch. A mismatch on the patch itself is reported before any output
//!   is written; base and output mismatches are reported after the output
//!   has been fully written.
//! - **I/O errors** from the caller's streams, passed through unchanged.

use std::fmt;
use thiserror::Error;

/// Stream a checksum was computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumTarget {
    /// The serialized patch, minus its own trailing checksum
    Patch,
    /// The stream the patch was applied to
    Base,
    /// The stream the patch produced
    Output,
}

impl fmt::Display for ChecksumTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patch => write!(f, "patch"),
            Self::Base => write!(f, "base"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Patch-specific error types
#[derive(Error, Debug)]
pub enum PatchError {
    /// Header magic does not match the format
    #[error("Invalid {format} header: expected {expected:02x?}, got {actual:02x?}")]
    InvalidHeader {
        /// Format name
        format: &'static str,
        /// Expected magic bytes
        expected: Vec<u8>,
        /// Bytes found in the patch
        actual: Vec<u8>,
    },

    /// Footer magic does not match the format
    #[error("Invalid {format} footer: expected {expected:02x?}, got {actual:02x?}")]
    InvalidFooter {
        /// Format name
        format: &'static str,
        /// Expected magic bytes
        expected: Vec<u8>,
        /// Bytes found in the patch
        actual: Vec<u8>,
    },

    /// Patch data ended in the middle of a structure
    #[error("Truncated patch data: {context}")]
    Truncated {
        /// What was being read
        context: String,
    },

    /// Patch data is malformed
    #[error("Corrupt patch data: {reason}")]
    CorruptPatch {
        /// Description of the corruption
        reason: String,
    },

    /// Variable-length integer overflows 64 bits
    #[error("Invalid variable-length integer: {reason}")]
    InvalidVle {
        /// Description of the problem
        reason: String,
    },

    /// A position or length does not fit the format's fields
    #[error("{field} {value:#x} exceeds the format limit of {limit:#x}")]
    OffsetTooLarge {
        /// Field that overflowed
        field: &'static str,
        /// Offending value
        value: u64,
        /// Largest value the format can hold
        limit: u64,
    },

    /// Computed hash does not match any accepted value
    #[error("{target} checksum mismatch: computed {actual}, expected {}", .expected.join(" or "))]
    ChecksumMismatch {
        /// Stream that failed verification
        target: ChecksumTarget,
        /// Computed value
        actual: String,
        /// Every accepted value
        expected: Vec<String>,
    },

    /// Patch was never created or loaded
    #[error("Patch has not been created or loaded")]
    NotInitialized,

    /// Binary format parsing error from binrw
    #[error("Binary format error: {0}")]
    BinaryFormat(binrw::Error),

    /// I/O error from an underlying stream
    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

/// Result type for patch operations
pub type PatchResult<T> = Result<T, PatchError>;

impl PatchError {
    /// Create a corrupt patch error with a reason
    pub fn corrupt_patch<S: Into<String>>(reason: S) -> Self {
        Self::CorruptPatch {
            reason: reason.into(),
        }
    }

    /// Create a truncation error describing what was being read
    pub fn truncated<S: Into<String>>(context: S) -> Self {
        Self::Truncated {
            context: context.into(),
        }
    }

    /// Create an invalid variable-length integer error
    pub fn invalid_vle<S: Into<String>>(reason: S) -> Self {
        Self::InvalidVle {
            reason: reason.into(),
        }
    }

    /// Create a limit error for a value that does not fit its field
    pub fn offset_too_large(field: &'static str, value: u64, limit: u64) -> Self {
        Self::OffsetTooLarge {
            field,
            value,
            limit,
        }
    }

    /// Create a checksum mismatch error
    pub fn checksum_mismatch<T: fmt::Display>(
        target: ChecksumTarget,
        actual: &T,
        expected: &[&T],
    ) -> Self {
        Self::ChecksumMismatch {
            target,
            actual: actual.to_string(),
            expected: expected.iter().map(ToString::to_string).collect(),
        }
    }

    /// Check if this error means the patch bytes are malformed
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidHeader { .. }
                | Self::InvalidFooter { .. }
                | Self::Truncated { .. }
                | Self::CorruptPatch { .. }
                | Self::InvalidVle { .. }
                | Self::OffsetTooLarge { .. }
                | Self::BinaryFormat(_)
        )
    }

    /// Check if this error is a checksum verification failure
    pub fn is_checksum_error(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }
}

/// Context for end-of-input errors raised below the codec layer
const UNEXPECTED_END: &str = "unexpected end of patch data";

impl From<binrw::Error> for PatchError {
    fn from(error: binrw::Error) -> Self {
        // binrw renders backtraces over several lines; keep the context flat
        if error.is_eof() {
            return Self::truncated(UNEXPECTED_END);
        }
        match error {
            binrw::Error::Io(io) => Self::from(io),
            other => Self::BinaryFormat(other),
        }
    }
}

impl From<std::io::Error> for PatchError {
    fn from(error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::UnexpectedEof {
            return Self::truncated(error.to_string());
        }
        Self::Io(error)
    }
}
