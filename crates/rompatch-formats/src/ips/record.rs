//! IPS record layouts
//!
//! ```text
//! Literal record:  [position: u24 BE][size: u16 BE, non-zero][size bytes]
//! RLE record:      [position: u24 BE][0x0000][length: u16 BE][fill: u8]
//! Footer:          "EOF" [output size: u24 BE, optional]
//! ```

use binrw::{BinRead, BinReaderExt, BinResult, BinWrite, BinWriterExt, Endian};
use std::io::{Read, Seek, Write};

use super::MAX_POSITION;

/// Position and size fields that start every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct RecordHeader {
    /// Output position
    #[br(parse_with = parse_u24)]
    #[bw(write_with = write_u24)]
    pub position: u32,
    /// Literal length, or 0 for an RLE record
    pub size: u16,
}

impl RecordHeader {
    /// Whether an RLE run follows instead of literal bytes
    pub const fn is_rle(&self) -> bool {
        self.size == 0
    }
}

/// Run description that follows an RLE record header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct RleRun {
    /// Number of repetitions
    pub length: u16,
    /// Repeated byte
    pub value: u8,
}

/// Truncation length that may follow the footer magic
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct OutputSize(
    #[br(parse_with = parse_u24)]
    #[bw(write_with = write_u24)]
    pub u32,
);

/// Read a 3-byte big-endian integer
fn parse_u24<R: Read + Seek>(reader: &mut R, _endian: Endian, _args: ()) -> BinResult<u32> {
    let bytes: [u8; 3] = reader.read_be()?;
    Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
}

/// Write a 3-byte big-endian integer
fn write_u24<W: Write + Seek>(
    value: &u32,
    writer: &mut W,
    _endian: Endian,
    _args: (),
) -> BinResult<()> {
    if u64::from(*value) > MAX_POSITION {
        return Err(binrw::Error::AssertFail {
            pos: writer.stream_position()?,
            message: format!("{value:#x} does not fit in 24 bits"),
        });
    }
    let [_, high, mid, low] = value.to_be_bytes();
    writer.write_be(&[high, mid, low])?;
    Ok(())
}
