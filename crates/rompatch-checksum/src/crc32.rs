//! CRC32 checksums (CRC-32/ISO-HDLC)
//!
//! This is the checksum used by UPS patches: reflected polynomial
//! `0xEDB88320`, initial value `0xFFFFFFFF`, final XOR `0xFFFFFFFF`.
//! On disk a UPS patch stores each CRC as a little-endian `u32`, i.e. the
//! byte-reversed form of the big-endian digest.

use binrw::{BinRead, BinWrite};
use crc::{CRC_32_ISO_HDLC, Crc, Digest};
use std::fmt;

use crate::algorithm::HashAlgorithm;
use crate::error::ChecksumError;

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// A finalized CRC32 value
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Crc32(u32);

impl Crc32 {
    /// Create from a raw checksum value
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Compute the CRC32 of a byte slice
    pub fn from_data(data: &[u8]) -> Self {
        Self(CRC32.checksum(data))
    }

    /// Get the raw checksum value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Little-endian bytes, the layout used in UPS footers
    pub fn to_le_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Parse from an 8-character hex string (most significant byte first)
    pub fn from_hex(hex: &str) -> Result<Self, ChecksumError> {
        let bytes = hex::decode(hex.trim())
            .map_err(|e| ChecksumError::InvalidFormat(format!("invalid hex: {e}")))?;
        let bytes: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ChecksumError::InvalidSize {
                expected: 4,
                actual: bytes.len(),
            })?;
        Ok(Self(u32::from_be_bytes(bytes)))
    }

    /// Convert to a hex string (most significant byte first)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl fmt::Display for Crc32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<u32> for Crc32 {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Incremental CRC32 hasher
#[derive(Clone)]
pub struct Crc32Hasher {
    digest: Digest<'static, u32>,
}

impl Crc32Hasher {
    /// Create a hasher in its initial state
    pub fn new() -> Self {
        Self {
            digest: CRC32.digest(),
        }
    }
}

impl Default for Crc32Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Crc32Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crc32Hasher").finish_non_exhaustive()
    }
}

impl HashAlgorithm for Crc32Hasher {
    type Output = Crc32;

    fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    fn finalize_reset(&mut self) -> Crc32 {
        let digest = std::mem::replace(&mut self.digest, CRC32.digest());
        Crc32(digest.finalize())
    }

    fn reset(&mut self) {
        self.digest = CRC32.digest();
    }
}
