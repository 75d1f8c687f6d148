//! UPS block codec and checksum policy

use binrw::BinReaderExt;
use std::io::{Read, Seek, Write};

use rompatch_checksum::{Crc32, Crc32Hasher, HashStream};
use tracing::{debug, warn};

use super::{CHECKSUM_FOOTER_LEN, UPS_FOOTER, UPS_HEADER};
use crate::block::{BlockInfo, PatchBlock};
use crate::checksum::{ChecksumPolicy, Checksums};
use crate::codec::{BlockCodec, Orientation, payload_slice};
use crate::config::PatchConfig;
use crate::diff::{DiffExtent, Differ};
use crate::error::{PatchError, PatchResult};
use crate::vle;

/// UPS format rules and the stream lengths stored in a UPS header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsCodec {
    base_len: u64,
    modified_len: u64,
}

impl UpsCodec {
    /// Length of the base stream the patch was made from
    pub fn base_len(&self) -> u64 {
        self.base_len
    }

    /// Length of the modified stream the patch was made from
    pub fn modified_len(&self) -> u64 {
        self.modified_len
    }
}

impl BlockCodec for UpsCodec {
    type Block = PatchBlock;

    const NAME: &'static str = "UPS";
    const HEADER: &'static [u8] = UPS_HEADER;
    const FOOTER: &'static [u8] = UPS_FOOTER;

    fn read_header<R: Read + Seek>(&mut self, reader: &mut R) -> PatchResult<()> {
        self.base_len = vle::decode(reader)?;
        self.modified_len = vle::decode(reader)?;
        debug!(
            "UPS header: base {} bytes, modified {} bytes",
            self.base_len, self.modified_len
        );
        Ok(())
    }

    fn end_of_content<R: Read + Seek>(&self, reader: &mut R, patch_len: u64) -> PatchResult<bool> {
        let position = reader.stream_position()?;
        Ok(position.saturating_add(CHECKSUM_FOOTER_LEN) >= patch_len)
    }

    fn read_footer<R: Read + Seek>(&mut self, reader: &mut R, patch_len: u64) -> PatchResult<()> {
        let remaining = patch_len.saturating_sub(reader.stream_position()?);
        if remaining < CHECKSUM_FOOTER_LEN {
            return Err(PatchError::truncated(format!(
                "UPS checksum footer needs {CHECKSUM_FOOTER_LEN} bytes, found {remaining}"
            )));
        }
        Ok(())
    }

    fn read_block<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        previous: Option<&PatchBlock>,
    ) -> PatchResult<PatchBlock> {
        let skip = vle::decode(reader)?;
        let cursor = previous.map_or(0, |p| p.position.saturating_add(p.size));
        let position = cursor.checked_add(skip).ok_or_else(|| {
            PatchError::corrupt_patch(format!("UPS block skip {skip} overflows the output position"))
        })?;

        let offset = reader.stream_position()?;
        let mut size = 0u64;
        let mut byte = [0u8; 1];
        loop {
            if reader.read(&mut byte)? == 0 {
                return Err(PatchError::truncated(format!(
                    "UPS block at position {position:#x} has no terminator"
                )));
            }
            size += 1;
            if byte[0] == 0 {
                break;
            }
        }

        Ok(PatchBlock::new(position, size).with_offset(offset))
    }

    fn find_blocks<B: Read, M: Read>(
        &self,
        base: B,
        modified: M,
        base_len: u64,
        modified_len: u64,
        config: &PatchConfig,
    ) -> PatchResult<Vec<BlockInfo<PatchBlock>>> {
        Differ::new(config)
            .with_extent(DiffExtent::Longest)
            .diff(base, modified, base_len, modified_len)
    }

    fn write_header<W: Write + Seek>(
        &mut self,
        writer: &mut W,
        base_len: u64,
        modified_len: u64,
    ) -> PatchResult<()> {
        vle::encode_into(base_len, writer)?;
        vle::encode_into(modified_len, writer)?;
        self.base_len = base_len;
        self.modified_len = modified_len;
        Ok(())
    }

    fn write_block<W: Write + Seek>(
        &self,
        writer: &mut W,
        info: &BlockInfo<PatchBlock>,
        previous: Option<&PatchBlock>,
    ) -> PatchResult<PatchBlock> {
        let position = info.block.position;
        let cursor = previous.map_or(0, |p| p.position.saturating_add(p.size));
        let skip = position.checked_sub(cursor).ok_or_else(|| {
            PatchError::corrupt_patch(format!(
                "UPS block at {position:#x} overlaps the previous block ending at {cursor:#x}"
            ))
        })?;

        let xor: Vec<u8> = info
            .base
            .iter()
            .zip(&info.modified)
            .map(|(base, modified)| base ^ modified)
            .collect();

        vle::encode_into(skip, writer)?;
        let offset = writer.stream_position()?;
        writer.write_all(&xor)?;
        writer.write_all(&[0])?;

        Ok(PatchBlock::new(position, xor.len() as u64 + 1).with_offset(offset))
    }

    fn orientation(&self, base_len: u64) -> Orientation {
        if base_len != self.base_len && base_len == self.modified_len {
            warn!(
                "Base is {} bytes, matching the modified length; applying UPS patch in reverse",
                base_len
            );
            Orientation::Reverse
        } else {
            Orientation::Forward
        }
    }

    fn output_len(&self, _base_len: u64, orientation: Orientation) -> u64 {
        match orientation {
            Orientation::Forward => self.modified_len,
            Orientation::Reverse => self.base_len,
        }
    }

    fn apply_block(&self, payload: &[u8], block: &PatchBlock, target: &mut [u8]) -> PatchResult<()> {
        let xor = payload_slice(payload, block.size, "UPS block")?;
        for (byte, mask) in target.iter_mut().zip(xor) {
            *byte ^= mask;
        }
        Ok(())
    }
}

impl ChecksumPolicy for UpsCodec {
    type Algorithm = Crc32Hasher;

    fn read_checksums<R: Read + Seek>(
        &mut self,
        reader: &mut HashStream<R, Crc32Hasher>,
    ) -> PatchResult<Checksums<Crc32>> {
        let base: Crc32 = reader.read_le()?;
        let modified: Crc32 = reader.read_le()?;
        reader.flush_final_block();
        let patch: Crc32 = reader.read_le()?;
        Ok(Checksums {
            patch,
            base,
            modified,
        })
    }

    fn write_checksums<W: Write>(
        &self,
        writer: &mut HashStream<W, Crc32Hasher>,
        base: &Crc32,
        modified: &Crc32,
    ) -> PatchResult<Crc32> {
        writer.write_all(&base.to_le_bytes())?;
        writer.write_all(&modified.to_le_bytes())?;
        let patch = writer.flush_final_block();
        writer.write_all(&patch.to_le_bytes())?;
        writer.flush()?;
        Ok(patch)
    }

    fn reconcile(&self, base_len: u64, actual_base: &Crc32, expected: &mut Checksums<Crc32>) -> bool {
        if self.base_len != self.modified_len || base_len != self.base_len {
            return false;
        }
        if *actual_base != expected.base {
            debug!("UPS base checksum differs from the stored base; trying the reverse direction");
            expected.swap_content();
        }
        true
    }
}
