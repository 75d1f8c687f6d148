//! Tuning knobs shared by every patch format

use rompatch_checksum::DEFAULT_HASH_BUFFER_SIZE;
use serde::{Deserialize, Serialize};

/// Default differencing chunk and apply window size (40 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 40 * 1024;

/// Smallest accepted buffer size
pub const MIN_BUFFER_SIZE: usize = 16;

/// Buffer sizes used while creating, applying and hashing patches.
///
/// Values below [`MIN_BUFFER_SIZE`] are raised to it, including values that
/// come from deserialization.
///
/// ```
/// use rompatch_formats::PatchConfig;
///
/// let config: PatchConfig = serde_json::from_str(r#"{ "buffer_size": 4096 }"#).unwrap();
/// assert_eq!(config.buffer_size(), 4096);
/// assert_eq!(config.hash_buffer_size(), 80 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    buffer_size: usize,
    hash_buffer_size: usize,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            hash_buffer_size: DEFAULT_HASH_BUFFER_SIZE,
        }
    }
}

impl PatchConfig {
    /// Create a configuration with default sizes
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the differencing chunk and apply window size
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(MIN_BUFFER_SIZE);
        self
    }

    /// Set the pending buffer threshold of hash streams
    #[must_use]
    pub fn with_hash_buffer_size(mut self, hash_buffer_size: usize) -> Self {
        self.hash_buffer_size = hash_buffer_size.max(MIN_BUFFER_SIZE);
        self
    }

    /// Differencing chunk and apply window size
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.max(MIN_BUFFER_SIZE)
    }

    /// Pending buffer threshold of hash streams
    pub fn hash_buffer_size(&self) -> usize {
        self.hash_buffer_size.max(MIN_BUFFER_SIZE)
    }
}
