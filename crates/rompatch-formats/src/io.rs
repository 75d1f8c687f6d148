//! Stream adapters used by the patch engine

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Measure a seekable stream and rewind it to the start
pub fn stream_len<S: Seek + ?Sized>(stream: &mut S) -> io::Result<u64> {
    let len = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(0))?;
    Ok(len)
}

/// Read until `buf` is full or the reader is exhausted, zero-filling the rest.
///
/// Returns the number of bytes that came from the reader.
pub fn read_fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    buf[filled..].fill(0);
    Ok(filled)
}

/// Copy exactly `len` bytes, writing zeros for whatever the reader cannot supply
pub fn copy_or_zero<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    len: u64,
) -> io::Result<()> {
    let copied = io::copy(&mut reader.take(len), writer)?;
    if copied < len {
        io::copy(&mut io::repeat(0).take(len - copied), writer)?;
    }
    Ok(())
}

/// A finite reader that yields the inner stream's bytes, then zeros, up to
/// a fixed total length.
///
/// Bytes of the inner stream past the total are never read.
#[derive(Debug)]
pub struct ZeroExtend<R> {
    inner: R,
    remaining: u64,
    exhausted: bool,
}

impl<R: Read> ZeroExtend<R> {
    /// Wrap `inner` so that exactly `total` bytes can be read
    pub fn new(inner: R, total: u64) -> Self {
        Self {
            inner,
            remaining: total,
            exhausted: false,
        }
    }
}

impl<R: Read> Read for ZeroExtend<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = usize::try_from(self.remaining).map_or(buf.len(), |r| r.min(buf.len()));
        if want == 0 {
            return Ok(0);
        }
        let buf = &mut buf[..want];

        let mut n = 0;
        if !self.exhausted {
            n = self.inner.read(buf)?;
            if n == 0 {
                self.exhausted = true;
            }
        }
        if n == 0 {
            buf.fill(0);
            n = want;
        }

        self.remaining -= n as u64;
        Ok(n)
    }
}

/// A writer that produces exactly `limit` bytes.
///
/// Bytes written past the limit are accepted and dropped; [`finish`](Self::finish)
/// pads with zeros up to the limit.
#[derive(Debug)]
pub struct SizedWriter<W> {
    inner: W,
    limit: u64,
    written: u64,
}

impl<W: Write> SizedWriter<W> {
    /// Wrap `inner` with an exact output length
    pub fn new(inner: W, limit: u64) -> Self {
        Self {
            inner,
            limit,
            written: 0,
        }
    }

    /// Bytes forwarded to the inner writer so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Zero bytes [`finish`](Self::finish) will append
    pub fn padding(&self) -> u64 {
        self.limit - self.written
    }

    /// Zero-pad to the limit, flush, and return the inner writer
    pub fn finish(mut self) -> io::Result<W> {
        let missing = self.padding();
        if missing > 0 {
            io::copy(&mut io::repeat(0).take(missing), &mut self.inner)?;
            self.written = self.limit;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for SizedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.limit - self.written;
        let take = usize::try_from(room).map_or(buf.len(), |r| r.min(buf.len()));
        if take > 0 {
            self.inner.write_all(&buf[..take])?;
            self.written += take as u64;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_stream_len_rewinds() {
        let mut cursor = Cursor::new(vec![1u8; 42]);
        cursor.set_position(10);
        assert_eq!(stream_len(&mut cursor).unwrap(), 42);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_read_fill_zeroes_tail() {
        let mut buf = [0xffu8; 6];
        let n = read_fill(&mut Cursor::new(vec![1u8, 2, 3]), &mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(buf, [1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn test_copy_or_zero() {
        let mut out = Vec::new();
        copy_or_zero(&mut Cursor::new(vec![9u8, 9]), &mut out, 5).unwrap();
        assert_eq!(out, vec![9, 9, 0, 0, 0]);

        let mut out = Vec::new();
        let mut source = Cursor::new(vec![1u8, 2, 3, 4]);
        copy_or_zero(&mut source, &mut out, 2).unwrap();
        assert_eq!(out, vec![1, 2]);
        assert_eq!(source.position(), 2);
    }

    #[test]
    fn test_zero_extend_pads_and_stops() {
        let mut reader = ZeroExtend::new(Cursor::new(vec![5u8, 6, 7]), 6);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![5, 6, 7, 0, 0, 0]);
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn test_zero_extend_truncates_longer_input() {
        let mut source = Cursor::new(vec![1u8; 10]);
        let mut out = Vec::new();
        ZeroExtend::new(&mut source, 4).read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![1, 1, 1, 1]);
        assert_eq!(source.position(), 4);
    }

    #[test]
    fn test_sized_writer_truncates() {
        let mut writer = SizedWriter::new(Vec::new(), 3);
        writer.write_all(b"abcdef").unwrap();
        assert_eq!(writer.written(), 3);
        assert_eq!(writer.padding(), 0);
        assert_eq!(writer.finish().unwrap(), b"abc");
    }

    #[test]
    fn test_sized_writer_pads() {
        let mut writer = SizedWriter::new(Vec::new(), 5);
        writer.write_all(b"ab").unwrap();
        assert_eq!(writer.padding(), 3);
        assert_eq!(writer.finish().unwrap(), vec![b'a', b'b', 0, 0, 0]);
    }
}
