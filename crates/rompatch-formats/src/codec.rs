//! The seam between the generic engine and a concrete patch format
//!
//! A format is a [`BlockCodec`]: it knows its header and footer layout, how
//! one block is encoded, how differing runs are turned into blocks, and how a
//! block payload changes the output. The engine in [`crate::engine`] drives
//! everything else.

use std::fmt;
use std::io::{Read, Seek, Write};

use crate::block::{Block, BlockInfo, PatchBlock};
use crate::config::PatchConfig;
use crate::diff::Differ;
use crate::error::{PatchError, PatchResult};

/// Direction a patch is applied in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Base to modified, as the patch was created
    #[default]
    Forward,
    /// Modified back to base
    Reverse,
}

/// Format-specific encoding rules for the generic patch engine
pub trait BlockCodec: Default + fmt::Debug {
    /// Block type stored in the parsed block list
    type Block: Block + From<PatchBlock>;

    /// Human-readable format name
    const NAME: &'static str;

    /// Magic bytes at the start of every patch
    const HEADER: &'static [u8];

    /// Magic bytes after the last block (may be empty)
    const FOOTER: &'static [u8];

    /// Read header fields that follow the magic
    fn read_header<R: Read + Seek>(&mut self, _reader: &mut R) -> PatchResult<()> {
        Ok(())
    }

    /// Whether the reader is positioned after the last block.
    ///
    /// Implementations that peek must leave the reader where they found it.
    fn end_of_content<R: Read + Seek>(&self, reader: &mut R, patch_len: u64) -> PatchResult<bool>;

    /// Read one block. `previous` is the block parsed just before, if any.
    fn read_block<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        previous: Option<&Self::Block>,
    ) -> PatchResult<Self::Block>;

    /// Read footer fields that follow the footer magic
    fn read_footer<R: Read + Seek>(&mut self, _reader: &mut R, _patch_len: u64) -> PatchResult<()> {
        Ok(())
    }

    /// Turn two streams into the blocks to serialize.
    ///
    /// The default diffs the common-length prefix and emits one literal
    /// block per differing run.
    fn find_blocks<B: Read, M: Read>(
        &self,
        base: B,
        modified: M,
        base_len: u64,
        modified_len: u64,
        config: &PatchConfig,
    ) -> PatchResult<Vec<BlockInfo<Self::Block>>> {
        Ok(Differ::new(config)
            .diff(base, modified, base_len, modified_len)?
            .into_iter()
            .map(|info| info.map(Self::Block::from))
            .collect())
    }

    /// Write header fields that follow the magic
    fn write_header<W: Write + Seek>(
        &mut self,
        _writer: &mut W,
        _base_len: u64,
        _modified_len: u64,
    ) -> PatchResult<()> {
        Ok(())
    }

    /// Serialize one block and return it as laid out in the patch.
    ///
    /// `previous` is the block written just before, if any.
    fn write_block<W: Write + Seek>(
        &self,
        writer: &mut W,
        info: &BlockInfo<Self::Block>,
        previous: Option<&Self::Block>,
    ) -> PatchResult<Self::Block>;

    /// Write footer fields that follow the footer magic
    fn write_footer<W: Write + Seek>(
        &mut self,
        _writer: &mut W,
        _base_len: u64,
        _modified_len: u64,
    ) -> PatchResult<()> {
        Ok(())
    }

    /// Direction to apply the patch in, given the length of the input
    fn orientation(&self, _base_len: u64) -> Orientation {
        Orientation::Forward
    }

    /// Exact length of the output
    fn output_len(&self, base_len: u64, orientation: Orientation) -> u64;

    /// Apply one block to `target`, the output bytes it covers.
    ///
    /// `target` arrives holding the base bytes (zero past the end of base).
    /// `payload` starts at the block's offset in the patch.
    fn apply_block(&self, payload: &[u8], block: &Self::Block, target: &mut [u8]) -> PatchResult<()>;
}

/// A codec whose patches are complete once the footer is written.
///
/// Only these codecs can be created through the plain [`Patch`](crate::Patch)
/// engine. Formats that end in a checksum footer are created through
/// [`HashPatch`](crate::HashPatch) instead:
///
/// ```compile_fail
/// use rompatch_formats::{Patch, UpsCodec};
/// use std::io::Cursor;
///
/// let mut patch = Patch::<UpsCodec>::new();
/// patch
///     .create(&mut Cursor::new(b"base"), &mut Cursor::new(b"next"))
///     .unwrap();
/// ```
pub trait PlainCodec: BlockCodec {}

/// Which end of the patch a magic sequence marks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MagicKind {
    Header,
    Footer,
}

/// Read `magic.len()` bytes and compare them with `magic`
pub(crate) fn expect_magic<R: Read>(
    reader: &mut R,
    magic: &'static [u8],
    format: &'static str,
    kind: MagicKind,
) -> PatchResult<()> {
    if magic.is_empty() {
        return Ok(());
    }

    let mut actual = Vec::with_capacity(magic.len());
    reader.take(magic.len() as u64).read_to_end(&mut actual)?;
    if actual == magic {
        return Ok(());
    }

    let expected = magic.to_vec();
    Err(match kind {
        MagicKind::Header => PatchError::InvalidHeader {
            format,
            expected,
            actual,
        },
        MagicKind::Footer => PatchError::InvalidFooter {
            format,
            expected,
            actual,
        },
    })
}

/// Borrow `len` payload bytes, failing if the patch ends first
pub(crate) fn payload_slice<'a>(payload: &'a [u8], len: u64, what: &str) -> PatchResult<&'a [u8]> {
    usize::try_from(len)
        .ok()
        .and_then(|len| payload.get(..len))
        .ok_or_else(|| PatchError::truncated(format!("{what} payload of {len} bytes")))
}
