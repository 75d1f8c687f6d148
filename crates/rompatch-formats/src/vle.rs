//! Variable-length integers as used by UPS
//!
//! Values are split into little-endian 7-bit groups. The *last* byte of a
//! value has its high bit set. Every group after the first is stored minus
//! one, so each encoding is unique and no value has a redundant longer form.
//!
//! ```text
//! 0x00      -> 80
//! 0x7f      -> ff
//! 0x80      -> 00 80
//! 0x81      -> 01 80
//! 0x407f    -> 7f ff
//! 0x4080    -> 00 00 80
//! ```

use std::io::{Read, Write};

use crate::error::{PatchError, PatchResult};

/// Longest encoding of a `u64`
pub const MAX_ENCODED_LEN: usize = 10;

/// Encode a value into a new buffer
pub fn encode(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_ENCODED_LEN);
    let mut value = value;
    loop {
        let group = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(group | 0x80);
            return out;
        }
        out.push(group);
        value -= 1;
    }
}

/// Encode a value into a writer, returning the number of bytes written
pub fn encode_into<W: Write>(value: u64, writer: &mut W) -> PatchResult<usize> {
    let bytes = encode(value);
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Decode a value from a reader
pub fn decode<R: Read>(reader: &mut R) -> PatchResult<u64> {
    let mut decoder = Decoder::default();
    let mut byte = [0u8; 1];
    loop {
        reader
            .read_exact(&mut byte)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => {
                    PatchError::truncated("variable-length integer")
                }
                _ => PatchError::Io(e),
            })?;
        if let Some(value) = decoder.push(byte[0])? {
            return Ok(value);
        }
    }
}

/// Decode a value from the start of a slice, returning it with the number
/// of bytes consumed
pub fn decode_slice(data: &[u8]) -> PatchResult<(u64, usize)> {
    let mut decoder = Decoder::default();
    for (index, &byte) in data.iter().enumerate() {
        if let Some(value) = decoder.push(byte)? {
            return Ok((value, index + 1));
        }
    }
    Err(PatchError::truncated("variable-length integer"))
}

struct Decoder {
    value: u64,
    shift: u64,
}

impl Default for Decoder {
    fn default() -> Self {
        Self { value: 0, shift: 1 }
    }
}

impl Decoder {
    fn push(&mut self, byte: u8) -> PatchResult<Option<u64>> {
        let overflow = || PatchError::invalid_vle("value does not fit in 64 bits");

        self.value = u64::from(byte & 0x7f)
            .checked_mul(self.shift)
            .and_then(|group| self.value.checked_add(group))
            .ok_or_else(overflow)?;
        if byte & 0x80 != 0 {
            return Ok(Some(self.value));
        }

        self.shift = self.shift.checked_mul(0x80).ok_or_else(overflow)?;
        self.value = self.value.checked_add(self.shift).ok_or_else(overflow)?;
        Ok(None)
    }
}
