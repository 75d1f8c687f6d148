//! Checksum-verifying patch engine
//!
//! [`HashPatch`] wraps the generic [`Patch`] for formats that store
//! checksums of the patch, the base and the modified stream. Every stream
//! involved in an operation is read or written through a [`HashStream`] for
//! the duration of that operation.
//!
//! On apply, the patch checksum is verified before any output is written.
//! Base and output checksums can only be verified afterwards, so a base or
//! output mismatch means the output exists but must not be trusted.

use std::io::{self, Cursor, Read, Seek, Write};
use std::path::Path;

use rompatch_checksum::{HashAlgorithm, HashStream};
use tracing::{debug, warn};

use crate::codec::{BlockCodec, Orientation};
use crate::config::PatchConfig;
use crate::engine::{Patch, parse_blocks, write_patch};
use crate::error::{ChecksumTarget, PatchError, PatchResult};
use crate::io::stream_len;

/// Finalized hash value of a checksum policy
pub type ChecksumOf<C> = <<C as ChecksumPolicy>::Algorithm as HashAlgorithm>::Output;

/// Checksums stored in a patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksums<T> {
    /// Checksum of the patch bytes before it
    pub patch: T,
    /// Checksum of the base stream
    pub base: T,
    /// Checksum of the modified stream
    pub modified: T,
}

impl<T> Checksums<T> {
    /// Exchange the base and modified checksums
    pub fn swap_content(&mut self) {
        std::mem::swap(&mut self.base, &mut self.modified);
    }
}

/// Where a format stores its checksums and how it checks them
pub trait ChecksumPolicy: BlockCodec {
    /// Hash algorithm for all three streams.
    ///
    /// Reverse application swaps the base and modified expectations, so
    /// they share one type.
    type Algorithm: HashAlgorithm + Default;

    /// Read the stored checksums after the generic footer.
    ///
    /// Must call [`HashStream::flush_final_block`] once every byte covered
    /// by the patch checksum has been read.
    fn read_checksums<R: Read + Seek>(
        &mut self,
        reader: &mut HashStream<R, Self::Algorithm>,
    ) -> PatchResult<Checksums<ChecksumOf<Self>>>;

    /// Write the checksums after the generic footer and return the patch
    /// checksum.
    fn write_checksums<W: Write>(
        &self,
        writer: &mut HashStream<W, Self::Algorithm>,
        base: &ChecksumOf<Self>,
        modified: &ChecksumOf<Self>,
    ) -> PatchResult<ChecksumOf<Self>>;

    /// Adjust expected checksums once the base checksum is known.
    ///
    /// Returns `true` when the patch applies equally in both directions to
    /// a base of this length, in which case either stored content checksum
    /// is an acceptable base.
    fn reconcile(
        &self,
        _base_len: u64,
        _actual_base: &ChecksumOf<Self>,
        _expected: &mut Checksums<ChecksumOf<Self>>,
    ) -> bool {
        false
    }
}

/// A patch whose format carries checksums
#[derive(Debug, Clone)]
pub struct HashPatch<C: ChecksumPolicy> {
    inner: Patch<C>,
    expected: Option<Checksums<ChecksumOf<C>>>,
    computed_patch: Option<ChecksumOf<C>>,
}

impl<C: ChecksumPolicy> Default for HashPatch<C> {
    fn default() -> Self {
        Self {
            inner: Patch::default(),
            expected: None,
            computed_patch: None,
        }
    }
}

impl<C: ChecksumPolicy> HashPatch<C> {
    /// Create an empty patch, ready for [`create`](Self::create)
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: PatchConfig) -> Self {
        self.inner = self.inner.with_config(config);
        self
    }

    /// Parse a serialized patch
    pub fn load(data: impl Into<Vec<u8>>) -> PatchResult<Self> {
        Self::load_with_config(data, PatchConfig::default())
    }

    /// Parse a serialized patch with a custom configuration
    pub fn load_with_config(data: impl Into<Vec<u8>>, config: PatchConfig) -> PatchResult<Self> {
        let data = data.into();
        let patch_len = data.len() as u64;
        let mut codec = C::default();

        let (blocks, expected, computed) = {
            let mut reader = HashStream::new(Cursor::new(data.as_slice()), C::Algorithm::default())
                .with_threshold(config.hash_buffer_size());
            let blocks = parse_blocks(&mut codec, &mut reader, patch_len)?;
            let expected = codec.read_checksums(&mut reader)?;
            let computed = match reader.hash() {
                Some(hash) => hash.clone(),
                None => reader.flush_final_block(),
            };
            (blocks, expected, computed)
        };

        debug!(
            "{} patch checksums: patch {}, base {}, modified {}",
            C::NAME,
            expected.patch,
            expected.base,
            expected.modified
        );

        Ok(Self {
            inner: Patch::from_parts(data, blocks, codec, config),
            expected: Some(expected),
            computed_patch: Some(computed),
        })
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

    /// Build this patch from two streams, replacing any previous contents
    pub fn create<B: Read + Seek, M: Read + Seek>(
        &mut self,
        base: &mut B,
        modified: &mut M,
    ) -> PatchResult<()> {
        let config = *self.inner.config();
        let threshold = config.hash_buffer_size();
        let base_len = stream_len(base)?;
        let modified_len = stream_len(modified)?;

        let mut codec = C::default();
        let mut base_stream =
            HashStream::new(&mut *base, C::Algorithm::default()).with_threshold(threshold);
        let mut modified_stream =
            HashStream::new(&mut *modified, C::Algorithm::default()).with_threshold(threshold);
        let mut writer = HashStream::new(Cursor::new(Vec::new()), C::Algorithm::default())
            .with_threshold(threshold);

        let blocks = write_patch(
            &mut codec,
            &mut base_stream,
            &mut modified_stream,
            (base_len, modified_len),
            &mut writer,
            &config,
        )?;

        io::copy(&mut base_stream, &mut io::sink())?;
        io::copy(&mut modified_stream, &mut io::sink())?;
        let base_hash = base_stream.flush_final_block();
        let modified_hash = modified_stream.flush_final_block();

        let patch_hash = codec.write_checksums(&mut writer, &base_hash, &modified_hash)?;
        let data = writer.into_inner().into_inner();

        debug!(
            "Created {} patch with checksums: patch {}, base {}, modified {}",
            C::NAME,
            patch_hash,
            base_hash,
            modified_hash
        );

        self.inner = Patch::from_parts(data, blocks, codec, config);
        self.computed_patch = Some(patch_hash.clone());
        self.expected = Some(Checksums {
            patch: patch_hash,
            base: base_hash,
            modified: modified_hash,
        });
        Ok(())
    }

    /// Build this patch from two files
    pub fn create_from_paths<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        base_path: P,
        modified_path: Q,
    ) -> PatchResult<()> {
        let mut base = io::BufReader::new(std::fs::File::open(base_path)?);
        let mut modified = io::BufReader::new(std::fs::File::open(modified_path)?);
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

    /// Compare the computed patch checksum with the stored one
    pub fn verify_patch(&self) -> PatchResult<()> {
        let (Some(expected), Some(computed)) = (&self.expected, &self.computed_patch) else {
            return Err(PatchError::NotInitialized);
        };
        if *computed != expected.patch {
            warn!(
                "{} patch checksum mismatch: computed {}, stored {}",
                C::NAME,
                computed,
                expected.patch
            );
            return Err(PatchError::checksum_mismatch(
                ChecksumTarget::Patch,
                computed,
                &[&expected.patch],
            ));
        }
        Ok(())
    }

    /// Apply the patch to `base`, writing the result to `output`.
    ///
    /// The patch checksum is checked first; base and output checksums are
    /// checked after the output has been written. Returns the number of
    /// bytes written.
    pub fn apply<B: Read + Seek, W: Write>(&self, base: &mut B, output: &mut W) -> PatchResult<u64> {
        self.verify_patch()?;
        let mut expected = self
            .expected
            .clone()
            .ok_or(PatchError::NotInitialized)?;

        let codec = self.inner.codec();
        let base_len = stream_len(base)?;
        let orientation = codec.orientation(base_len);
        if orientation == Orientation::Reverse {
            expected.swap_content();
        }
        let output_len = codec.output_len(base_len, orientation);

        let threshold = self.inner.config().hash_buffer_size();
        let mut base_stream =
            HashStream::new(&mut *base, C::Algorithm::default()).with_threshold(threshold);
        let mut output_stream =
            HashStream::new(&mut *output, C::Algorithm::default()).with_threshold(threshold);

        let written = self
            .inner
            .apply_sized(&mut base_stream, &mut output_stream, output_len)?;

        io::copy(&mut base_stream, &mut io::sink())?;
        let actual_base = base_stream.flush_final_block();
        let actual_output = output_stream.flush_final_block();

        let either_direction = codec.reconcile(base_len, &actual_base, &mut expected);
        if actual_base != expected.base {
            warn!(
                "{} base checksum mismatch: computed {}, stored {}",
                C::NAME,
                actual_base,
                expected.base
            );
            let accepted = if either_direction {
                vec![&expected.base, &expected.modified]
            } else {
                vec![&expected.base]
            };
            return Err(PatchError::checksum_mismatch(
                ChecksumTarget::Base,
                &actual_base,
                &accepted,
            ));
        }
        if actual_output != expected.modified {
            warn!(
                "{} output checksum mismatch: computed {}, stored {}",
                C::NAME,
                actual_output,
                expected.modified
            );
            return Err(PatchError::checksum_mismatch(
                ChecksumTarget::Output,
                &actual_output,
                &[&expected.modified],
            ));
        }

        Ok(written)
    }

    /// Apply the patch to an in-memory base
    pub fn apply_memory(&self, base: &[u8]) -> PatchResult<Vec<u8>> {
        let mut output = Vec::new();
        self.apply(&mut Cursor::new(base), &mut output)?;
        Ok(output)
    }

    /// Write the serialized patch
    pub fn save<W: Write>(&self, writer: &mut W) -> PatchResult<()> {
        self.inner.save(writer)
    }

    /// Write the serialized patch to a file
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> PatchResult<()> {
        self.inner.save_to_path(path)
    }

    /// Checksums stored in the patch
    pub fn expected_checksums(&self) -> Option<&Checksums<ChecksumOf<C>>> {
        self.expected.as_ref()
    }

    /// Checksum computed over the patch bytes
    pub fn patch_checksum(&self) -> Option<&ChecksumOf<C>> {
        self.computed_patch.as_ref()
    }

    /// Serialized patch bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Blocks sorted by output position
    pub fn blocks(&self) -> &[C::Block] {
        self.inner.blocks()
    }

    /// Format metadata parsed from the header and footer
    pub fn codec(&self) -> &C {
        self.inner.codec()
    }

    /// Active configuration
    pub fn config(&self) -> &PatchConfig {
        self.inner.config()
    }

    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Whether the patch has been created or loaded
    pub fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    /// The underlying generic patch
    pub fn as_patch(&self) -> &Patch<C> {
        &self.inner
    }
}
