//! Block model shared by every patch format
//!
//! A block describes one region where base and modified differ: where its
//! payload lives inside the serialized patch (`offset`), where it lands in
//! the output (`position`), and how many bytes it covers (`size`).

use std::fmt;

/// Common accessors for patch blocks
pub trait Block: Clone + fmt::Debug + PartialEq {
    /// Payload offset inside the serialized patch
    fn offset(&self) -> u64;

    /// Output position the block applies to
    fn position(&self) -> u64;

    /// Number of output bytes the block covers
    fn size(&self) -> u64;

    /// Output position one past the last byte covered
    fn end(&self) -> u64 {
        self.position().saturating_add(self.size())
    }
}

/// A literal patch block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchBlock {
    /// Payload offset inside the serialized patch (0 before serialization)
    pub offset: u64,
    /// Output position
    pub position: u64,
    /// Payload length
    pub size: u64,
}

impl PatchBlock {
    /// Create a block that has not been serialized yet
    pub const fn new(position: u64, size: u64) -> Self {
        Self {
            offset: 0,
            position,
            size,
        }
    }

    /// Set the payload offset
    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

impl Block for PatchBlock {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// A block that is either literal or a run of one repeated byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RleBlock {
    /// Payload offset inside the serialized patch
    pub offset: u64,
    /// Output position
    pub position: u64,
    /// Bytes covered in the output
    pub size: u64,
    /// `size` copies of the single payload byte when set
    pub rle: bool,
}

impl RleBlock {
    /// Create a literal block
    pub const fn literal(position: u64, size: u64) -> Self {
        Self {
            offset: 0,
            position,
            size,
            rle: false,
        }
    }

    /// Create a run-length block
    pub const fn run(position: u64, size: u64) -> Self {
        Self {
            offset: 0,
            position,
            size,
            rle: true,
        }
    }

    /// Set the payload offset
    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

impl Block for RleBlock {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl From<PatchBlock> for RleBlock {
    fn from(block: PatchBlock) -> Self {
        Self {
            offset: block.offset,
            position: block.position,
            size: block.size,
            rle: false,
        }
    }
}

/// A block paired with the base and modified bytes of its region.
///
/// Only lives between differencing and block serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo<B = PatchBlock> {
    /// Block descriptor
    pub block: B,
    /// Base bytes of the region
    pub base: Vec<u8>,
    /// Modified bytes of the region
    pub modified: Vec<u8>,
}

impl<B: Block> BlockInfo<B> {
    /// Pair a block with its region bytes
    pub fn new(block: B, base: Vec<u8>, modified: Vec<u8>) -> Self {
        Self {
            block,
            base,
            modified,
        }
    }

    /// Convert the block type, keeping the region bytes
    pub fn map<T, F: FnOnce(B) -> T>(self, f: F) -> BlockInfo<T> {
        BlockInfo {
            block: f(self.block),
            base: self.base,
            modified: self.modified,
        }
    }
}
