//! Windowed patch application
//!
//! Blocks are replayed in batches. A batch spans from its first block's
//! position to the furthest block end in it. A block joins the current batch
//! when it overlaps the batch or when the batch would still span no more
//! than the window size; otherwise the batch is flushed first.
//!
//! Flushing a batch reads its span from base into a scratch window (zero
//! past the end of base), lets the codec rewrite each block's sub-range, and
//! writes the window out. Base bytes between batches are streamed straight
//! through, so memory use is bounded by one batch span.

use std::io::{self, Read, Write};

use tracing::trace;

use crate::block::Block;
use crate::codec::BlockCodec;
use crate::config::PatchConfig;
use crate::error::{PatchError, PatchResult};
use crate::io::{SizedWriter, copy_or_zero, read_fill};

/// Replays parsed blocks over a base stream
#[derive(Debug)]
pub struct WindowedApply<'a, C: BlockCodec> {
    codec: &'a C,
    patch: &'a [u8],
    window_size: u64,
}

impl<'a, C: BlockCodec> WindowedApply<'a, C> {
    /// Create an applier over a serialized patch
    pub fn new(codec: &'a C, patch: &'a [u8], config: &PatchConfig) -> Self {
        Self {
            codec,
            patch,
            window_size: config.buffer_size() as u64,
        }
    }

    /// Write exactly `output_len` bytes of patched output.
    ///
    /// `blocks` must be sorted by position. Blocks starting at or past
    /// `output_len` are ignored.
    pub fn run<R: Read, W: Write>(
        &self,
        blocks: &[C::Block],
        mut base: R,
        output: W,
        output_len: u64,
    ) -> PatchResult<u64> {
        let mut output = SizedWriter::new(output, output_len);
        let mut scratch = Vec::new();
        let mut cursor = 0u64;

        let mut batch: Vec<&C::Block> = Vec::new();
        let mut span_start = 0u64;
        let mut span_end = 0u64;

        for block in blocks.iter().take_while(|b| b.position() < output_len) {
            if block.size() == 0 {
                continue;
            }

            if !batch.is_empty() {
                let overlaps = block.position() < span_end;
                let fits = block.end() - span_start <= self.window_size;
                if !overlaps && !fits {
                    cursor = self.flush(
                        &batch,
                        (span_start, span_end),
                        cursor,
                        &mut base,
                        &mut output,
                        &mut scratch,
                    )?;
                    batch.clear();
                }
            }

            if batch.is_empty() {
                span_start = block.position();
                span_end = block.end();
            } else {
                span_end = span_end.max(block.end());
            }
            batch.push(block);
        }

        if !batch.is_empty() {
            cursor = self.flush(
                &batch,
                (span_start, span_end),
                cursor,
                &mut base,
                &mut output,
                &mut scratch,
            )?;
        }

        let tail = output_len.saturating_sub(cursor);
        io::copy(&mut base.by_ref().take(tail), &mut output)?;
        if output.padding() > 0 {
            trace!(
                "Base ended after {} output bytes; padding {} zero bytes",
                output.written(),
                output.padding()
            );
        }
        output.finish()?;

        Ok(output_len)
    }

    fn flush<R: Read, W: Write>(
        &self,
        batch: &[&C::Block],
        (start, end): (u64, u64),
        cursor: u64,
        base: &mut R,
        output: &mut W,
        scratch: &mut Vec<u8>,
    ) -> PatchResult<u64> {
        copy_or_zero(base, output, start.saturating_sub(cursor))?;

        let span = usize::try_from(end - start)
            .map_err(|_| PatchError::corrupt_patch("block span exceeds addressable memory"))?;
        scratch.clear();
        scratch.resize(span, 0);
        read_fill(base, scratch)?;

        for block in batch {
            let offset = usize::try_from(block.offset())
                .map_err(|_| PatchError::corrupt_patch("block offset exceeds addressable memory"))?;
            let payload = self.patch.get(offset..).ok_or_else(|| {
                PatchError::truncated(format!("block payload at offset {offset:#x}"))
            })?;

            let relative = (block.position() - start) as usize;
            let size = block.size() as usize;
            self.codec
                .apply_block(payload, block, &mut scratch[relative..relative + size])?;
        }

        output.write_all(scratch)?;
        trace!(
            "Flushed {} window {:#x}..{:#x} with {} blocks",
            C::NAME,
            start,
            end,
            batch.len()
        );

        Ok(end)
    }
}
