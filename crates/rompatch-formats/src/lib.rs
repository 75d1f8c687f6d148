//! ROM patch formats and the engine that creates and applies them
//!
#![allow(clippy::cast_possible_truncation)] // Format fields are narrower than u64
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::doc_markdown)] // IPS, UPS and CRC32 don't need backticks
#![allow(clippy::missing_errors_doc)] // Every fallible operation returns PatchError
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate provides symmetric (create and apply) implementations of the
//! IPS and UPS patch formats on top of a format-independent engine.
//!
//! # Supported Formats
//!
//! - **IPS**: literal and RLE records at 24-bit positions, optional output
//!   size after the footer
//! - **UPS**: XOR blocks at VLE-encoded relative positions, CRC32 checksums
//!   of the base, modified and patch streams
//!
//! # Architecture
//!
//! - [`BlockCodec`]: the per-format rules for headers, blocks and footers
//! - [`Patch`]: parses and creates patches with any codec, then applies them
//!   by streaming the base through a bounded window
//! - [`HashPatch`]: adds patch, base and output checksum verification for
//!   codecs that implement [`ChecksumPolicy`]
//! - [`Differ`]: finds the differing runs between two streams
//!
//! # Examples
//!
//! ```
//! use rompatch_formats::{IpsPatch, UpsPatch};
//! use std::io::Cursor;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let base = b"Super Game v1.0".to_vec();
//! let modified = b"Super Game v1.1 (translated)".to_vec();
//!
//! let mut ips = IpsPatch::new();
//! ips.create(&mut Cursor::new(&base), &mut Cursor::new(&modified))?;
//! assert_eq!(ips.apply_memory(&base)?, modified);
//!
//! let mut ups = UpsPatch::new();
//! ups.create(&mut Cursor::new(&base), &mut Cursor::new(&modified))?;
//! assert_eq!(ups.apply_memory(&base)?, modified);
//! assert_eq!(ups.apply_memory(&modified)?, base);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]

mod apply;
pub mod block;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod io;
/// IPS patch format
pub mod ips;
/// UPS patch format
pub mod ups;
pub mod vle;

pub use block::{Block, BlockInfo, PatchBlock, RleBlock};
pub use checksum::{ChecksumOf, ChecksumPolicy, Checksums, HashPatch};
pub use codec::{BlockCodec, Orientation, PlainCodec};
pub use config::PatchConfig;
pub use diff::{DiffExtent, Differ};
pub use engine::Patch;
pub use error::{ChecksumTarget, PatchError, PatchResult};
pub use ips::{IpsCodec, IpsPatch};
pub use ups::{UpsCodec, UpsPatch};

pub use rompatch_checksum;
