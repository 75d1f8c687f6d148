//! UPS (Universal Patching System) format
//!
//! UPS stores XOR differences between the base and modified streams, so the
//! same patch converts in both directions. Positions are relative and
//! encoded as variable-length integers, which removes the size limits of
//! IPS.
//!
//! # Format Structure
//!
//! ```text
//! UPS File:
//! ├── Header: "UPS1" (4 bytes)
//! ├── Base length (VLE)
//! ├── Modified length (VLE)
//! ├── Blocks (repeated until 12 bytes remain)
//! │   ├── Skip since the end of the previous block (VLE)
//! │   └── XOR bytes, terminated by 0x00
//! └── Checksums (CRC32, little-endian)
//!     ├── Base (4 bytes)
//!     ├── Modified (4 bytes)
//!     └── Patch, over every byte before it (4 bytes)
//! ```
//!
//! The terminator of a block XORs the output byte after the block with
//! zero, so block sizes include it.
//!
//! UPS patches go through [`HashPatch`](crate::HashPatch): the checksums are
//! part of the format, and a plain [`Patch`](crate::Patch) cannot write
//! them.
//!
//! # Usage Examples
//!
//! ```rust
//! use rompatch_formats::ups::UpsPatch;
//! use std::io::Cursor;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let base = b"ABCDEFGH".to_vec();
//! let modified = b"ABCdeFGHIJ".to_vec();
//!
//! let mut patch = UpsPatch::new();
//! patch.create(&mut Cursor::new(&base), &mut Cursor::new(&modified))?;
//!
//! let reloaded = UpsPatch::load(patch.as_bytes())?;
//! assert_eq!(reloaded.apply_memory(&base)?, modified);
//!
//! // The same patch converts the modified stream back
//! assert_eq!(reloaded.apply_memory(&modified)?, base);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod codec;

pub use codec::UpsCodec;

use crate::checksum::HashPatch;

/// UPS header magic
pub const UPS_HEADER: &[u8] = b"UPS1";

/// UPS has no footer magic; the checksums follow the last block
pub const UPS_FOOTER: &[u8] = b"";

/// Size of the three trailing CRC32 values
pub const CHECKSUM_FOOTER_LEN: u64 = 12;

/// A UPS patch
pub type UpsPatch = HashPatch<UpsCodec>;

impl HashPatch<UpsCodec> {
    /// Base length stored in the header
    pub fn base_len(&self) -> u64 {
        self.codec().base_len()
    }

    /// Modified length stored in the header
    pub fn modified_len(&self) -> u64 {
        self.codec().modified_len()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::block::PatchBlock;
    use crate::engine::Patch;
    use crate::error::{ChecksumTarget, PatchError};
    use pretty_assertions::assert_eq;
    use rompatch_checksum::Crc32;
    use std::io::Cursor;

    fn create(base: &[u8], modified: &[u8]) -> UpsPatch {
        let mut patch = UpsPatch::new();
        patch
            .create(&mut Cursor::new(base), &mut Cursor::new(modified))
            .expect("in-memory create");
        patch
    }

    #[test]
    fn test_known_patch_bytes() {
        let patch = create(b"AAAA", b"AABA");

        let mut expected = b"UPS1\x84\x84\x82\x03\x00".to_vec();
        let base_crc = Crc32::from_data(b"AAAA");
        let modified_crc = Crc32::from_data(b"AABA");
        expected.extend_from_slice(&base_crc.to_le_bytes());
        expected.extend_from_slice(&modified_crc.to_le_bytes());
        let patch_crc = Crc32::from_data(&expected);
        expected.extend_from_slice(&patch_crc.to_le_bytes());

        assert_eq!(patch.as_bytes(), expected.as_slice());
        assert_eq!(patch.blocks(), &[PatchBlock::new(2, 2).with_offset(7)]);
        assert_eq!(patch.patch_checksum(), Some(&patch_crc));

        let checksums = patch.expected_checksums().unwrap();
        assert_eq!(checksums.base, base_crc);
        assert_eq!(checksums.modified, modified_crc);
        assert_eq!(checksums.patch, patch_crc);
    }

    #[test]
    fn test_load_and_apply_both_directions() {
        let base = b"The quick brown fox".to_vec();
        let modified = b"The quick red fox jumps".to_vec();
        let patch = UpsPatch::load(create(&base, &modified).as_bytes()).unwrap();

        assert_eq!(patch.base_len(), base.len() as u64);
        assert_eq!(patch.modified_len(), modified.len() as u64);
        patch.verify_patch().unwrap();
        assert_eq!(patch.apply_memory(&base).unwrap(), modified);
        assert_eq!(patch.apply_memory(&modified).unwrap(), base);
    }

    #[test]
    fn test_equal_lengths_apply_in_reverse() {
        let base = b"ABCDEFGH".to_vec();
        let modified = b"ABxDEyGH".to_vec();
        let patch = create(&base, &modified);

        assert_eq!(patch.apply_memory(&base).unwrap(), modified);
        assert_eq!(patch.apply_memory(&modified).unwrap(), base);
    }

    #[test]
    fn test_corrupt_patch_checksum_fails_before_output() {
        let mut data = create(b"AAAA", b"AABA").as_bytes().to_vec();
        let last = data.len() - 1;
        data[last] ^= 0xFF;

        let patch = UpsPatch::load(data).unwrap();
        let mut output = Vec::new();
        let err = patch
            .apply(&mut Cursor::new(b"AAAA".to_vec()), &mut output)
            .unwrap_err();

        assert!(matches!(
            err,
            PatchError::ChecksumMismatch {
                target: ChecksumTarget::Patch,
                ..
            }
        ));
        assert!(output.is_empty());
    }

    #[test]
    fn test_wrong_output_checksum_is_reported() {
        let base = b"ABCDEFGH".to_vec();
        let modified = b"ABxDEyGHIJ".to_vec();
        let mut data = create(&base, &modified).as_bytes().to_vec();

        // Damage the stored modified checksum and re-seal the patch
        let n = data.len();
        data[n - 8] ^= 0x01;
        let patch_crc = Crc32::from_data(&data[..n - 4]);
        data[n - 4..].copy_from_slice(&patch_crc.to_le_bytes());

        let patch = UpsPatch::load(data).unwrap();
        patch.verify_patch().unwrap();

        let mut output = Vec::new();
        let err = patch
            .apply(&mut Cursor::new(base), &mut output)
            .unwrap_err();
        assert!(matches!(
            err,
            PatchError::ChecksumMismatch {
                target: ChecksumTarget::Output,
                ..
            }
        ));
        assert_eq!(output, modified);
    }

    #[test]
    fn test_plain_engine_requires_checksum_footer() {
        // Header and one block, but no checksums
        let err = Patch::<UpsCodec>::load(b"UPS1\x90\x90\x84\x3d\x00".to_vec()).unwrap_err();
        assert!(matches!(err, PatchError::Truncated { .. }));

        let err = Patch::<UpsCodec>::load(b"UPS1\x84\x84\x00\x00\x00\x00\x00".to_vec())
            .unwrap_err();
        match err {
            PatchError::Truncated { context } => {
                assert_eq!(context, "UPS checksum footer needs 12 bytes, found 5");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_engine_reads_complete_patch() {
        let base = b"ABCDEFGH".to_vec();
        let modified = b"ABCdeFGHIJ".to_vec();
        let hashed = create(&base, &modified);

        let plain = Patch::<UpsCodec>::load(hashed.as_bytes()).unwrap();
        assert_eq!(plain.blocks(), hashed.blocks());
        assert_eq!(plain.apply_memory(&base).unwrap(), modified);
    }

    #[test]
    fn test_wrong_base_is_reported() {
        let patch = create(b"AAAA", b"AABA");
        let err = patch.apply_memory(b"ZZZZ").unwrap_err();
        match err {
            PatchError::ChecksumMismatch {
                target, expected, ..
            } => {
                assert_eq!(target, ChecksumTarget::Base);
                assert_eq!(expected.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let patch = create(b"AAAA", b"AABAA");
        let err = patch.apply_memory(b"ZZZZ").unwrap_err();
        match err {
            PatchError::ChecksumMismatch {
                target, expected, ..
            } => {
                assert_eq!(target, ChecksumTarget::Base);
                assert_eq!(expected.len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_growth_and_shrink() {
        let base = b"short".to_vec();
        let modified = b"short and then much longer".to_vec();
        let patch = create(&base, &modified);
        assert_eq!(patch.apply_memory(&base).unwrap(), modified);

        let patch = create(&modified, &base);
        assert_eq!(patch.apply_memory(&modified).unwrap(), base);
    }

    #[test]
    fn test_identical_inputs() {
        let patch = create(b"unchanged", b"unchanged");
        assert!(patch.is_empty());
        assert_eq!(patch.apply_memory(b"unchanged").unwrap(), b"unchanged");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            UpsPatch::load(b"UPS2\x80\x80".to_vec()),
            Err(PatchError::InvalidHeader { .. })
        ));
        assert!(matches!(
            UpsPatch::load(b"UPS1\x80\x80\x00\x00".to_vec()),
            Err(PatchError::Truncated { .. })
        ));
        assert!(matches!(
            UpsPatch::new().apply_memory(b"data"),
            Err(PatchError::NotInitialized)
        ));
    }
}
