//! IPS (International Patching System) format
//!
//! IPS is the oldest and simplest ROM patch format: a list of records that
//! overwrite output bytes, either with literal data or with one repeated
//! byte.
//!
//! # Format Structure
//!
//! ```text
//! IPS File:
//! ├── Header: "PATCH" (5 bytes)
//! ├── Records (repeated until "EOF")
//! │   ├── Position (3 bytes, big-endian)
//! │   ├── Size (2 bytes, big-endian)
//! │   └── size > 0: literal bytes
//! │       size = 0: run length (2 bytes, big-endian) + fill byte
//! └── Footer: "EOF" (3 bytes)
//!     └── Output size (3 bytes, big-endian, optional)
//! ```
//!
//! # Key Characteristics
//!
//! - **24-bit positions**: records can only start in the first 16 MiB
//! - **Reserved position**: `0x454F46` spells "EOF", so no record may start
//!   there; patch creation moves record boundaries around it
//! - **RLE threshold**: only runs of 5 or more identical bytes are stored
//!   as RLE records
//! - **Output size**: written only when base and modified lengths differ;
//!   otherwise the output is as long as the base
//!
//! # Usage Examples
//!
//! ```rust
//! use rompatch_formats::ips::IpsPatch;
//! use std::io::Cursor;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let base = b"Hello, World!".to_vec();
//! let modified = b"Hello, Rusty!".to_vec();
//!
//! let mut patch = IpsPatch::new();
//! patch.create(&mut Cursor::new(&base), &mut Cursor::new(&modified))?;
//!
//! let reloaded = IpsPatch::load(patch.as_bytes())?;
//! assert_eq!(reloaded.apply_memory(&base)?, modified);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod codec;
mod record;

pub use codec::IpsCodec;
pub use record::{OutputSize, RecordHeader, RleRun};

use binrw::BinWrite;
use std::io::{Cursor, Seek, SeekFrom};

use crate::engine::Patch;
use crate::error::{PatchError, PatchResult};

/// IPS header magic
pub const IPS_HEADER: &[u8] = b"PATCH";

/// IPS footer magic
pub const IPS_FOOTER: &[u8] = b"EOF";

/// Record position that reads as the footer magic
pub const EOF_POSITION: u64 = 0x45_4F46;

/// Largest record position (24 bits)
pub const MAX_POSITION: u64 = 0xFF_FFFF;

/// Largest output size that fits after the footer (24 bits)
pub const MAX_OUTPUT_SIZE: u64 = 0xFF_FFFF;

/// Size of the optional output size field after the footer
pub const OUTPUT_SIZE_LEN: u64 = 3;

/// Largest record size (16 bits)
pub const MAX_RECORD_SIZE: u64 = 0xFFFF;

/// Shortest run of one byte stored as an RLE record
pub const RLE_MIN_RUN: u64 = 5;

/// An IPS patch
pub type IpsPatch = Patch<IpsCodec>;

impl Patch<IpsCodec> {
    /// Output length stored in the footer, if any
    pub fn output_size(&self) -> Option<u64> {
        self.codec().output_size()
    }

    /// Replace the output length stored in the footer.
    ///
    /// `None` removes it, so the output keeps the length of the base.
    pub fn set_output_size(&mut self, output_size: Option<u64>) -> PatchResult<()> {
        self.ensure_initialized()?;
        if let Some(size) = output_size
            && size > MAX_OUTPUT_SIZE
        {
            return Err(PatchError::offset_too_large(
                "output size",
                size,
                MAX_OUTPUT_SIZE,
            ));
        }

        let (codec, data) = self.codec_and_data_mut();
        let footer_end = usize::try_from(codec.footer_end())
            .map_err(|_| PatchError::corrupt_patch("footer offset exceeds addressable memory"))?;
        data.truncate(footer_end);

        if let Some(size) = output_size {
            let mut cursor = Cursor::new(data);
            cursor.seek(SeekFrom::End(0))?;
            OutputSize(size as u32).write(&mut cursor)?;
        }
        codec.set_output_size(output_size);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::block::RleBlock;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn create(base: &[u8], modified: &[u8]) -> IpsPatch {
        let mut patch = IpsPatch::new();
        patch
            .create(&mut Cursor::new(base), &mut Cursor::new(modified))
            .expect("in-memory create");
        patch
    }

    #[test]
    fn test_known_patch_bytes() {
        let patch = create(b"AAAAAA", b"AAAABBB");

        assert_eq!(
            patch.blocks(),
            &[RleBlock {
                offset: 10,
                position: 4,
                size: 3,
                rle: false
            }]
        );
        assert_eq!(patch.output_size(), Some(7));
        assert_eq!(
            patch.as_bytes(),
            b"PATCH\x00\x00\x04\x00\x03BBBEOF\x00\x00\x07"
        );
        assert_eq!(patch.apply_memory(b"AAAAAA").unwrap(), b"AAAABBB");
    }

    #[test]
    fn test_equal_lengths_have_no_output_size() {
        let patch = create(b"0123456789", b"0123X56789");
        assert_eq!(patch.output_size(), None);
        assert!(patch.as_bytes().ends_with(b"EOF"));
    }

    #[test]
    fn test_identical_inputs() {
        let patch = create(b"same bytes", b"same bytes");
        assert!(patch.is_empty());
        assert_eq!(patch.as_bytes(), b"PATCHEOF");
        assert_eq!(patch.apply_memory(b"same bytes").unwrap(), b"same bytes");
    }

    #[test]
    fn test_rle_record_bytes() {
        let base = vec![0u8; 16];
        let mut modified = base.clone();
        modified[2..10].fill(0xEE);

        let patch = create(&base, &modified);
        assert_eq!(
            patch.as_bytes(),
            b"PATCH\x00\x00\x02\x00\x00\x00\x08\xEEEOF"
        );
        assert_eq!(patch.blocks()[0], RleBlock::run(2, 8).with_offset(12));
        assert_eq!(patch.apply_memory(&base).unwrap(), modified);
    }

    #[test]
    fn test_truncation() {
        let patch = create(b"0123456789", b"0123");
        assert_eq!(patch.output_size(), Some(4));
        assert!(patch.is_empty());
        assert_eq!(patch.apply_memory(b"0123456789").unwrap(), b"0123");
    }

    #[test]
    fn test_set_output_size_rewrites_footer() {
        let mut patch = create(b"AAAAAA", b"AAAABBB");

        patch.set_output_size(Some(5)).unwrap();
        assert!(patch.as_bytes().ends_with(b"EOF\x00\x00\x05"));
        assert_eq!(patch.apply_memory(b"AAAAAA").unwrap(), b"AAAAB");

        patch.set_output_size(None).unwrap();
        assert!(patch.as_bytes().ends_with(b"BBBEOF"));
        assert_eq!(patch.apply_memory(b"AAAAAA").unwrap(), b"AAAABB");

        let reloaded = IpsPatch::load(patch.as_bytes()).unwrap();
        assert_eq!(reloaded.output_size(), None);

        assert!(matches!(
            patch.set_output_size(Some(MAX_OUTPUT_SIZE + 1)),
            Err(PatchError::OffsetTooLarge { .. })
        ));
        assert!(matches!(
            IpsPatch::new().set_output_size(None),
            Err(PatchError::NotInitialized)
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            IpsPatch::load(b"PATCX".to_vec()),
            Err(PatchError::InvalidHeader { .. })
        ));
        assert!(matches!(
            IpsPatch::load(b"PATCH\x00\x00\x01\x00\x02A".to_vec()),
            Err(PatchError::Truncated { .. })
        ));
        assert!(matches!(
            IpsPatch::load(b"PATCH\x00\x00\x01\x00\x00\x00\x00\x41EOF".to_vec()),
            Err(PatchError::CorruptPatch { .. })
        ));
        assert!(matches!(
            IpsPatch::load(b"PATCH".to_vec()),
            Err(PatchError::InvalidFooter { .. })
        ));
    }

    #[test]
    fn test_parse_sorts_blocks() {
        let data = b"PATCH\x00\x00\x08\x00\x01B\x00\x00\x02\x00\x01AEOF".to_vec();
        let patch = IpsPatch::load(data).unwrap();
        let positions: Vec<u64> = patch.blocks().iter().map(|b| b.position).collect();
        assert_eq!(positions, vec![2, 8]);
        assert_eq!(patch.apply_memory(b"..........").unwrap(), b"..A.....B.");
    }

    #[test]
    fn test_trailing_output_size_parsed() {
        let patch = IpsPatch::load(b"PATCHEOF\x00\x00\x03".to_vec()).unwrap();
        assert_eq!(patch.output_size(), Some(3));
        assert_eq!(patch.codec().footer_end(), 8);
        assert_eq!(patch.apply_memory(b"abcdef").unwrap(), b"abc");
    }

    #[test]
    fn test_unexpected_bytes_after_footer() {
        for data in [
            b"PATCHEOF\x00".to_vec(),
            b"PATCHEOF\x00\x03".to_vec(),
            b"PATCHEOF\x00\x00\x03\xFF".to_vec(),
        ] {
            assert!(
                matches!(IpsPatch::load(data.clone()), Err(PatchError::CorruptPatch { .. })),
                "trailing bytes accepted: {data:?}"
            );
        }
    }
}
