//! Checksums for ROM patch formats
//!
//! This crate provides the hashing primitives used by the patch engine in
//! `rompatch-formats` to verify patch, source and target integrity.
//!
//! # Components
//!
//! - **CRC32**: [`Crc32`] values and the incremental [`Crc32Hasher`]
//!   (CRC-32/ISO-HDLC, the checksum stored in UPS footers)
//! - **Hash algorithms**: the [`HashAlgorithm`] trait so stream wrappers are
//!   not tied to a single checksum
//! - **Hash streams**: [`HashStream`], a reader/writer decorator that hashes
//!   every byte it advances over, with seek-aware bookkeeping
//!
//! # Examples
//!
//! ## One-shot CRC32
//!
//! ```
//! use rompatch_checksum::Crc32;
//!
//! let crc = Crc32::from_data(b"123456789");
//! assert_eq!(crc.value(), 0xCBF4_3926);
//! assert_eq!(crc.to_string(), "cbf43926");
//! ```
//!
//! ## Hashing while reading
//!
//! ```
//! use rompatch_checksum::{Crc32, Crc32Hasher, HashStream};
//! use std::io::{Cursor, Read};
//!
//! let mut stream = HashStream::new(Cursor::new(b"123456789".to_vec()), Crc32Hasher::new());
//! let mut data = Vec::new();
//! stream.read_to_end(&mut data).unwrap();
//!
//! assert_eq!(stream.flush_final_block(), Crc32::new(0xCBF4_3926));
//! ```

#![warn(missing_docs)]

pub mod algorithm;
pub mod crc32;
pub mod error;
pub mod hash_stream;

pub use algorithm::HashAlgorithm;
pub use crc32::{Crc32, Crc32Hasher};
pub use error::ChecksumError;
pub use hash_stream::{DEFAULT_HASH_BUFFER_SIZE, HashStream};
