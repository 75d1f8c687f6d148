//! Substitution-only differencing
//!
//! [`Differ`] walks base and modified side by side in fixed-size chunks and
//! compares bytes at identical offsets. A run starts at the first mismatch
//! and closes at the next matching byte; each closed run becomes one
//! [`BlockInfo`]. There is no model of insertions or deletions, so an
//! inserted byte turns the rest of the stream into one long run.
//!
//! How far the pass goes is chosen with [`DiffExtent`]. Past the end of a
//! shorter stream, bytes read as zero.

use std::io::Read;

use tracing::debug;

use crate::block::{BlockInfo, PatchBlock};
use crate::config::PatchConfig;
use crate::error::PatchResult;
use crate::io::ZeroExtend;

/// How much of the two streams a differencing pass covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffExtent {
    /// Only the common-length prefix
    #[default]
    CommonPrefix,
    /// The modified length, reading base past its end as zeros
    Modified,
    /// The longer of the two lengths, reading both past their end as zeros
    Longest,
}

impl DiffExtent {
    /// Number of bytes the pass covers
    pub fn covered_len(self, base_len: u64, modified_len: u64) -> u64 {
        match self {
            Self::CommonPrefix => base_len.min(modified_len),
            Self::Modified => modified_len,
            Self::Longest => base_len.max(modified_len),
        }
    }
}

/// Byte-by-byte differencing engine
#[derive(Debug, Clone)]
pub struct Differ {
    buffer_size: usize,
    extent: DiffExtent,
    reserved: Option<u64>,
}

impl Differ {
    /// Create a differ using the configured chunk size
    pub fn new(config: &PatchConfig) -> Self {
        Self {
            buffer_size: config.buffer_size(),
            extent: DiffExtent::default(),
            reserved: None,
        }
    }

    /// Choose how much of the streams to cover
    #[must_use]
    pub fn with_extent(mut self, extent: DiffExtent) -> Self {
        self.extent = extent;
        self
    }

    /// Never start a run at `position`.
    ///
    /// A run that would begin there begins one byte earlier instead, taking
    /// in the matching byte pair before it.
    #[must_use]
    pub fn with_reserved_position(mut self, position: u64) -> Self {
        self.reserved = Some(position);
        self
    }

    /// Find every differing run between `base` and `modified`.
    ///
    /// Both readers must be positioned at the start of their streams.
    pub fn diff<B: Read, M: Read>(
        &self,
        base: B,
        modified: M,
        base_len: u64,
        modified_len: u64,
    ) -> PatchResult<Vec<BlockInfo>> {
        let total = self.extent.covered_len(base_len, modified_len);
        let mut base = ZeroExtend::new(base, total);
        let mut modified = ZeroExtend::new(modified, total);

        let mut base_chunk = vec![0u8; self.buffer_size];
        let mut modified_chunk = vec![0u8; self.buffer_size];

        let mut blocks = Vec::new();
        let mut run: Option<Run> = None;
        let mut previous: Option<(u8, u8)> = None;
        let mut offset = 0u64;

        while offset < total {
            let len = usize::try_from(total - offset).map_or(self.buffer_size, |r| r.min(self.buffer_size));
            base.read_exact(&mut base_chunk[..len])?;
            modified.read_exact(&mut modified_chunk[..len])?;

            for (i, (&b, &m)) in base_chunk[..len]
                .iter()
                .zip(&modified_chunk[..len])
                .enumerate()
            {
                let position = offset + i as u64;

                match run.as_mut() {
                    Some(open) if b == m => {
                        blocks.push(open.close());
                        run = None;
                    }
                    Some(open) => open.push(b, m),
                    None if b != m => {
                        let mut open = Run::new(position);
                        if self.reserved == Some(position)
                            && let Some((pb, pm)) = previous
                        {
                            open = Run::new(position - 1);
                            open.push(pb, pm);
                        }
                        open.push(b, m);
                        run = Some(open);
                    }
                    None => {}
                }

                previous = Some((b, m));
            }

            offset += len as u64;
        }

        if let Some(mut open) = run.take() {
            blocks.push(open.close());
        }

        debug!(
            "Differencing covered {} bytes ({:?}) and found {} runs",
            total,
            self.extent,
            blocks.len()
        );

        Ok(blocks)
    }
}

struct Run {
    position: u64,
    base: Vec<u8>,
    modified: Vec<u8>,
}

impl Run {
    fn new(position: u64) -> Self {
        Self {
            position,
            base: Vec::new(),
            modified: Vec::new(),
        }
    }

    fn push(&mut self, base: u8, modified: u8) {
        self.base.push(base);
        self.modified.push(modified);
    }

    fn close(&mut self) -> BlockInfo {
        let base = std::mem::take(&mut self.base);
        let modified = std::mem::take(&mut self.modified);
        BlockInfo::new(
            PatchBlock::new(self.position, modified.len() as u64),
            base,
            modified,
        )
    }
}
