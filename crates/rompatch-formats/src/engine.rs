//! Generic patch engine
//!
//! [`Patch`] owns a serialized patch and the block list parsed from it. It
//! knows nothing about a particular format: header, blocks and footer are
//! delegated to a [`BlockCodec`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::apply::WindowedApply;
use crate::block::Block;
use crate::codec::{BlockCodec, MagicKind, PlainCodec, expect_magic};
use crate::config::PatchConfig;
use crate::error::{PatchError, PatchResult};
use crate::io::stream_len;

/// A patch in a format described by `C`
#[derive(Debug, Clone)]
pub struct Patch<C: BlockCodec> {
    data: Vec<u8>,
    blocks: Vec<C::Block>,
    codec: C,
    config: PatchConfig,
    initialized: bool,
}

impl<C: BlockCodec> Default for Patch<C> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            blocks: Vec::new(),
            codec: C::default(),
            config: PatchConfig::default(),
            initialized: false,
        }
    }
}

impl<C: BlockCodec> Patch<C> {
    /// Create an empty patch, ready for [`create`](Self::create)
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: PatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse a serialized patch
    pub fn load(data: impl Into<Vec<u8>>) -> PatchResult<Self> {
        Self::load_with_config(data, PatchConfig::default())
    }

    /// Parse a serialized patch with a custom configuration
    pub fn load_with_config(data: impl Into<Vec<u8>>, config: PatchConfig) -> PatchResult<Self> {
        let data = data.into();
        let mut codec = C::default();
        let blocks = parse_blocks(&mut codec, &mut Cursor::new(data.as_slice()), data.len() as u64)?;
        Ok(Self::from_parts(data, blocks, codec, config))
    }

    /// Read a whole patch from a reader and parse it
    pub fn from_reader<R: Read>(mut reader: R) -> PatchResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::load(data)
    }

    /// Read a patch file and parse it
    pub fn open<P: AsRef<Path>>(path: P) -> PatchResult<Self> {
        Self::load(std::fs::read(path)?)
    }

    pub(crate) fn from_parts(
        data: Vec<u8>,
        blocks: Vec<C::Block>,
        codec: C,
        config: PatchConfig,
    ) -> Self {
        Self {
            data,
            blocks,
            codec,
            config,
            initialized: true,
        }
    }
}

impl<C: PlainCodec> Patch<C> {
    /// Build this patch from two streams, replacing any previous contents
    pub fn create<B: Read + Seek, M: Read + Seek>(
        &mut self,
        base: &mut B,
        modified: &mut M,
    ) -> PatchResult<()> {
        let base_len = stream_len(base)?;
        let modified_len = stream_len(modified)?;

        let mut codec = C::default();
        let mut writer = Cursor::new(Vec::new());
        let blocks = write_patch(
            &mut codec,
            &mut *base,
            &mut *modified,
            (base_len, modified_len),
            &mut writer,
            &self.config,
        )?;

        self.data = writer.into_inner();
        self.blocks = blocks;
        self.codec = codec;
        self.initialized = true;
        Ok(())
    }

    /// Build this patch from two files
    pub fn create_from_paths<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        base_path: P,
        modified_path: Q,
    ) -> PatchResult<()> {
        let mut base = BufReader::new(File::open(base_path)?);
        let mut modified = BufReader::new(File::open(modified_path)?);
        self.create(&mut base, &mut modified)
    }

    /// Build this patch from two streams and write it to a file
    pub fn create_to_path<P: AsRef<Path>, B: Read + Seek, M: Read + Seek>(
        &mut self,
        path: P,
        base: &mut B,
        modified: &mut M,
    ) -> PatchResult<()> {
        self.create(base, modified)?;
        self.save_to_path(path)
    }
}

impl<C: BlockCodec> Patch<C> {

    /// Apply the patch to `base`, writing the result to `output`.
    ///
    /// Returns the number of bytes written.
    pub fn apply<B: Read + Seek, W: Write>(&self, base: &mut B, output: &mut W) -> PatchResult<u64> {
        self.ensure_initialized()?;

        let base_len = stream_len(base)?;
        let orientation = self.codec.orientation(base_len);
        let output_len = self.codec.output_len(base_len, orientation);
        self.apply_sized(&mut *base, &mut *output, output_len)
    }

    /// Apply the patch to an in-memory base
    pub fn apply_memory(&self, base: &[u8]) -> PatchResult<Vec<u8>> {
        let mut output = Vec::new();
        self.apply(&mut Cursor::new(base), &mut output)?;
        Ok(output)
    }

    pub(crate) fn apply_sized<B: Read, W: Write>(
        &self,
        base: B,
        output: W,
        output_len: u64,
    ) -> PatchResult<u64> {
        let written = WindowedApply::new(&self.codec, &self.data, &self.config).run(
            &self.blocks,
            base,
            output,
            output_len,
        )?;
        debug!(
            "Applied {} patch: {} blocks, {} output bytes",
            C::NAME,
            self.blocks.len(),
            written
        );
        Ok(written)
    }

    /// Write the serialized patch
    pub fn save<W: Write>(&self, writer: &mut W) -> PatchResult<()> {
        self.ensure_initialized()?;
        writer.write_all(&self.data)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the serialized patch to a file
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> PatchResult<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        info!("Saved {} patch ({} bytes) to {}", C::NAME, self.data.len(), path.display());
        Ok(())
    }

    /// Serialized patch bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Blocks sorted by output position
    pub fn blocks(&self) -> &[C::Block] {
        &self.blocks
    }

    /// Format metadata parsed from the header and footer
    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub(crate) fn codec_and_data_mut(&mut self) -> (&mut C, &mut Vec<u8>) {
        (&mut self.codec, &mut self.data)
    }

    /// Active configuration
    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Whether the patch has been created or loaded
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn ensure_initialized(&self) -> PatchResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(PatchError::NotInitialized)
        }
    }
}

/// Parse header, blocks and footer. Blocks come back sorted by position.
pub(crate) fn parse_blocks<C: BlockCodec, R: Read + Seek>(
    codec: &mut C,
    reader: &mut R,
    patch_len: u64,
) -> PatchResult<Vec<C::Block>> {
    expect_magic(reader, C::HEADER, C::NAME, MagicKind::Header)?;
    codec.read_header(reader)?;

    let mut blocks: Vec<C::Block> = Vec::new();
    while !codec.end_of_content(reader, patch_len)? {
        let block = codec.read_block(reader, blocks.last())?;
        blocks.push(block);
    }

    expect_magic(reader, C::FOOTER, C::NAME, MagicKind::Footer)?;
    codec.read_footer(reader, patch_len)?;

    blocks.sort_by_key(Block::position);

    debug!(
        "Parsed {} patch: {} blocks, {} bytes",
        C::NAME,
        blocks.len(),
        patch_len
    );

    Ok(blocks)
}

/// Diff two streams and serialize header, blocks and footer.
///
/// Returns the blocks as laid out in the written patch.
pub(crate) fn write_patch<C: BlockCodec, B: Read, M: Read, W: Write + Seek>(
    codec: &mut C,
    base: B,
    modified: M,
    (base_len, modified_len): (u64, u64),
    writer: &mut W,
    config: &PatchConfig,
) -> PatchResult<Vec<C::Block>> {
    writer.write_all(C::HEADER)?;
    codec.write_header(writer, base_len, modified_len)?;

    let infos = codec.find_blocks(base, modified, base_len, modified_len, config)?;
    let mut blocks: Vec<C::Block> = Vec::with_capacity(infos.len());
    for info in &infos {
        let block = codec.write_block(writer, info, blocks.last())?;
        blocks.push(block);
    }

    writer.write_all(C::FOOTER)?;
    codec.write_footer(writer, base_len, modified_len)?;

    debug!(
        "Created {} patch: {} blocks from {} base bytes and {} modified bytes",
        C::NAME,
        blocks.len(),
        base_len,
        modified_len
    );

    Ok(blocks)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ips::IpsCodec;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_patch_is_not_initialized() {
        let patch: Patch<IpsCodec> = Patch::new();
        assert!(!patch.is_initialized());
        assert!(matches!(
            patch.apply_memory(b"base"),
            Err(PatchError::NotInitialized)
        ));
        assert!(matches!(
            patch.save(&mut Vec::new()),
            Err(PatchError::NotInitialized)
        ));
    }

    #[test]
    fn test_create_rewinds_inputs() {
        let mut base = Cursor::new(b"abcdef".to_vec());
        base.set_position(3);
        let mut modified = Cursor::new(b"abcxef".to_vec());
        modified.set_position(6);

        let mut patch = Patch::<IpsCodec>::new();
        patch.create(&mut base, &mut modified).unwrap();
        assert_eq!(patch.blocks().len(), 1);
        assert_eq!(patch.blocks()[0].position(), 3);

        let mut base = Cursor::new(b"abcdef".to_vec());
        base.set_position(5);
        let mut output = Vec::new();
        assert_eq!(patch.apply(&mut base, &mut output).unwrap(), 6);
        assert_eq!(output, b"abcxef");
    }

    #[test]
    fn test_from_reader_matches_load() {
        let data = b"PATCH\x00\x00\x01\x00\x01ZEOF".to_vec();
        let loaded = Patch::<IpsCodec>::load(data.clone()).unwrap();
        let read = Patch::<IpsCodec>::from_reader(data.as_slice()).unwrap();
        assert_eq!(read.blocks(), loaded.blocks());
        assert_eq!(read.as_bytes(), data.as_slice());
        assert!(read.is_initialized());
        assert!(!read.is_empty());

        let mut saved = Vec::new();
        read.save(&mut saved).unwrap();
        assert_eq!(saved, data);
    }
}
