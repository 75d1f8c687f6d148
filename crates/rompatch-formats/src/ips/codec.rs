//! IPS block codec

use binrw::{BinRead, BinWrite};
use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::debug;

use super::record::{OutputSize, RecordHeader, RleRun};
use super::{
    EOF_POSITION, IPS_FOOTER, IPS_HEADER, MAX_OUTPUT_SIZE, MAX_POSITION, MAX_RECORD_SIZE,
    OUTPUT_SIZE_LEN, RLE_MIN_RUN,
};
use crate::block::{Block, BlockInfo, PatchBlock, RleBlock};
use crate::codec::{BlockCodec, Orientation, PlainCodec, payload_slice};
use crate::config::PatchConfig;
use crate::diff::{DiffExtent, Differ};
use crate::error::{PatchError, PatchResult};

/// IPS format rules and the metadata parsed from an IPS footer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpsCodec {
    output_size: Option<u64>,
    footer_end: u64,
}

impl IpsCodec {
    /// Output length stored after the footer magic, if any
    pub fn output_size(&self) -> Option<u64> {
        self.output_size
    }

    /// Offset just past the footer magic
    pub fn footer_end(&self) -> u64 {
        self.footer_end
    }

    pub(crate) fn set_output_size(&mut self, output_size: Option<u64>) {
        self.output_size = output_size;
    }
}

impl BlockCodec for IpsCodec {
    type Block = RleBlock;

    const NAME: &'static str = "IPS";
    const HEADER: &'static [u8] = IPS_HEADER;
    const FOOTER: &'static [u8] = IPS_FOOTER;

    fn end_of_content<R: Read + Seek>(&self, reader: &mut R, patch_len: u64) -> PatchResult<bool> {
        let start = reader.stream_position()?;
        if patch_len.saturating_sub(start) < IPS_FOOTER.len() as u64 {
            return Ok(true);
        }

        let mut peek = [0u8; 3];
        reader.read_exact(&mut peek)?;
        reader.seek(SeekFrom::Start(start))?;
        Ok(peek == IPS_FOOTER)
    }

    fn read_block<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        _previous: Option<&RleBlock>,
    ) -> PatchResult<RleBlock> {
        let header = RecordHeader::read(reader)?;
        let position = u64::from(header.position);

        if header.is_rle() {
            let run = RleRun::read(reader)?;
            if run.length == 0 {
                return Err(PatchError::corrupt_patch(format!(
                    "zero-length RLE record at position {position:#x}"
                )));
            }
            let offset = reader.stream_position()? - 1;
            return Ok(RleBlock::run(position, u64::from(run.length)).with_offset(offset));
        }

        let offset = reader.stream_position()?;
        let size = u64::from(header.size);
        let skipped = io::copy(&mut reader.take(size), &mut io::sink())?;
        if skipped < size {
            return Err(PatchError::truncated(format!(
                "IPS literal record at position {position:#x}: expected {size} bytes, found {skipped}"
            )));
        }
        Ok(RleBlock::literal(position, size).with_offset(offset))
    }

    fn read_footer<R: Read + Seek>(&mut self, reader: &mut R, patch_len: u64) -> PatchResult<()> {
        self.footer_end = reader.stream_position()?;
        // The footer is followed by nothing or by exactly one output size
        self.output_size = match patch_len.saturating_sub(self.footer_end) {
            0 => None,
            OUTPUT_SIZE_LEN => Some(u64::from(OutputSize::read(reader)?.0)),
            trailing => {
                return Err(PatchError::corrupt_patch(format!(
                    "IPS footer followed by {trailing} bytes, expected 0 or {OUTPUT_SIZE_LEN}"
                )));
            }
        };
        Ok(())
    }

    fn find_blocks<B: Read, M: Read>(
        &self,
        base: B,
        modified: M,
        base_len: u64,
        modified_len: u64,
        config: &PatchConfig,
    ) -> PatchResult<Vec<BlockInfo<RleBlock>>> {
        let runs = Differ::new(config)
            .with_extent(DiffExtent::Modified)
            .with_reserved_position(EOF_POSITION)
            .diff(base, modified, base_len, modified_len)?;

        let segments: Vec<_> = runs.into_iter().flat_map(split_run).collect();
        let segments = avoid_eof_position(segments);

        debug!(
            "IPS differencing produced {} records ({} RLE)",
            segments.len(),
            segments.iter().filter(|s| s.block.rle).count()
        );
        Ok(segments)
    }

    fn write_header<W: Write + Seek>(
        &mut self,
        _writer: &mut W,
        base_len: u64,
        modified_len: u64,
    ) -> PatchResult<()> {
        if base_len != modified_len && modified_len > MAX_OUTPUT_SIZE {
            return Err(PatchError::offset_too_large(
                "output size",
                modified_len,
                MAX_OUTPUT_SIZE,
            ));
        }
        self.output_size = None;
        Ok(())
    }

    fn write_block<W: Write + Seek>(
        &self,
        writer: &mut W,
        info: &BlockInfo<RleBlock>,
        _previous: Option<&RleBlock>,
    ) -> PatchResult<RleBlock> {
        let block = info.block;
        if block.position > MAX_POSITION {
            return Err(PatchError::offset_too_large(
                "record position",
                block.position,
                MAX_POSITION,
            ));
        }
        if block.position == EOF_POSITION {
            return Err(PatchError::corrupt_patch(format!(
                "record position {EOF_POSITION:#x} collides with the footer magic"
            )));
        }
        if block.size == 0 || block.size > MAX_RECORD_SIZE {
            return Err(PatchError::offset_too_large(
                "record size",
                block.size,
                MAX_RECORD_SIZE,
            ));
        }

        let position = block.position as u32;
        let size = block.size as u16;

        if block.rle {
            let value = *info
                .modified
                .first()
                .ok_or_else(|| PatchError::corrupt_patch("RLE block without data"))?;
            RecordHeader { position, size: 0 }.write(writer)?;
            RleRun {
                length: size,
                value,
            }
            .write(writer)?;
            let offset = writer.stream_position()? - 1;
            return Ok(block.with_offset(offset));
        }

        let literal = payload_slice(&info.modified, block.size, "IPS literal")?;
        RecordHeader { position, size }.write(writer)?;
        let offset = writer.stream_position()?;
        writer.write_all(literal)?;
        Ok(block.with_offset(offset))
    }

    fn write_footer<W: Write + Seek>(
        &mut self,
        writer: &mut W,
        base_len: u64,
        modified_len: u64,
    ) -> PatchResult<()> {
        self.footer_end = writer.stream_position()?;
        if base_len != modified_len {
            OutputSize(modified_len as u32).write(writer)?;
            self.output_size = Some(modified_len);
        }
        Ok(())
    }

    fn output_len(&self, base_len: u64, _orientation: Orientation) -> u64 {
        self.output_size.unwrap_or(base_len)
    }

    fn apply_block(&self, payload: &[u8], block: &RleBlock, target: &mut [u8]) -> PatchResult<()> {
        if block.rle {
            let value = *payload
                .first()
                .ok_or_else(|| PatchError::truncated("IPS RLE fill byte"))?;
            target.fill(value);
        } else {
            target.copy_from_slice(payload_slice(payload, block.size, "IPS literal")?);
        }
        Ok(())
    }
}

impl PlainCodec for IpsCodec {}

/// Split one differing run into RLE and literal segments of at most
/// [`MAX_RECORD_SIZE`] bytes.
///
/// Runs of one repeated byte of at least [`RLE_MIN_RUN`] bytes become RLE
/// segments.
fn split_run(info: BlockInfo<PatchBlock>) -> Vec<BlockInfo<RleBlock>> {
    let data = &info.modified;
    let mut segments = Vec::new();
    let mut push = |start: usize, end: usize, rle: bool| {
        let mut chunk_start = start;
        while chunk_start < end {
            let chunk_end = end.min(chunk_start + MAX_RECORD_SIZE as usize);
            let position = info.block.position + chunk_start as u64;
            let size = (chunk_end - chunk_start) as u64;
            let block = if rle {
                RleBlock::run(position, size)
            } else {
                RleBlock::literal(position, size)
            };
            segments.push(BlockInfo::new(
                block,
                info.base[chunk_start..chunk_end].to_vec(),
                data[chunk_start..chunk_end].to_vec(),
            ));
            chunk_start = chunk_end;
        }
    };

    let mut literal_start = 0;
    let mut i = 0;
    while i < data.len() {
        let mut j = i + 1;
        while j < data.len() && data[j] == data[i] {
            j += 1;
        }
        if j - i >= RLE_MIN_RUN as usize {
            if literal_start < i {
                push(literal_start, i, false);
            }
            push(i, j, true);
            literal_start = j;
        }
        i = j;
    }
    if literal_start < data.len() {
        push(literal_start, data.len(), false);
    }

    segments
}

/// Move segment boundaries off [`EOF_POSITION`].
///
/// When one segment ends and the next starts exactly at `EOF_POSITION`, the
/// last byte of the first and the first byte of the second become a 2-byte
/// literal at `EOF_POSITION - 1`.
fn avoid_eof_position(segments: Vec<BlockInfo<RleBlock>>) -> Vec<BlockInfo<RleBlock>> {
    let mut out: Vec<BlockInfo<RleBlock>> = Vec::with_capacity(segments.len() + 1);

    for mut segment in segments {
        let adjacent = out
            .last()
            .is_some_and(|previous| previous.block.end() == EOF_POSITION);
        if segment.block.position != EOF_POSITION || !adjacent || segment.modified.is_empty() {
            out.push(segment);
            continue;
        }

        let Some((base_tail, modified_tail, emptied)) = out.last_mut().and_then(take_last_byte)
        else {
            out.push(segment);
            continue;
        };
        if emptied {
            out.pop();
        }

        let base_head = segment.base.remove(0);
        let modified_head = segment.modified.remove(0);
        segment.block.position += 1;
        segment.block.size -= 1;
        if segment.block.size < RLE_MIN_RUN {
            segment.block.rle = false;
        }

        out.push(BlockInfo::new(
            RleBlock::literal(EOF_POSITION - 1, 2),
            vec![base_tail, base_head],
            vec![modified_tail, modified_head],
        ));
        if segment.block.size > 0 {
            out.push(segment);
        }
    }

    out
}

/// Remove the last byte of a segment, returning it and whether the segment
/// is now empty
fn take_last_byte(segment: &mut BlockInfo<RleBlock>) -> Option<(u8, u8, bool)> {
    let base = segment.base.pop()?;
    let modified = segment.modified.pop()?;
    segment.block.size -= 1;
    if segment.block.size < RLE_MIN_RUN {
        segment.block.rle = false;
    }
    Some((base, modified, segment.block.size == 0))
}
