//! Hash-verifying stream wrapper
//!
//! [`HashStream`] decorates a reader or writer and feeds every byte it
//! advances over into a [`HashAlgorithm`]. Bytes are collected in a pending
//! buffer and only pushed into the algorithm once the buffer grows past a
//! threshold.
//!
//! Seeking is position-aware:
//!
//! - A forward seek is performed as a read-through, so skipped bytes are
//!   still hashed.
//! - A backward seek records a catch-up debt equal to the number of hashed
//!   bytes moved over. The next bytes read or written pay that debt off and
//!   are not hashed a second time. Positions jumped over past the end of the
//!   stream were never hashed and add no debt.
//!
//! [`HashStream::flush_final_block`] finalizes the running hash and starts a
//! new one, so a single wrapper can hash two disjoint regions of a stream in
//! sequence.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::algorithm::HashAlgorithm;

/// Default pending buffer threshold (80 KiB)
pub const DEFAULT_HASH_BUFFER_SIZE: usize = 80 * 1024;

const READ_THROUGH_CHUNK: usize = 8 * 1024;

/// Stream decorator that hashes the bytes read from or written to it
#[derive(Debug)]
pub struct HashStream<S, H: HashAlgorithm> {
    inner: S,
    hasher: H,
    pending: Vec<u8>,
    threshold: usize,
    catch_up: u64,
    unhashed: Option<(u64, u64)>,
    fresh: bool,
    flushed: bool,
    hash: Option<H::Output>,
}

impl<S, H: HashAlgorithm> HashStream<S, H> {
    /// Wrap a stream with the default pending buffer threshold
    pub fn new(inner: S, hasher: H) -> Self {
        Self {
            inner,
            hasher,
            pending: Vec::new(),
            threshold: DEFAULT_HASH_BUFFER_SIZE,
            catch_up: 0,
            unhashed: None,
            fresh: true,
            flushed: false,
            hash: None,
        }
    }

    /// Set the pending buffer threshold (at least 1 byte)
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    /// Reset the hash state, the pending buffer and the seek bookkeeping
    pub fn initialize(&mut self) {
        self.hasher.reset();
        self.pending.clear();
        self.catch_up = 0;
        self.unhashed = None;
        self.fresh = true;
    }

    /// Hash any pending bytes, finalize, and start a new hash.
    ///
    /// The returned value is also kept and available through [`hash`](Self::hash).
    pub fn flush_final_block(&mut self) -> H::Output {
        self.push_pending();
        let hash = self.hasher.finalize_reset();
        self.hash = Some(hash.clone());
        self.flushed = true;
        hash
    }

    /// The hash produced by the last [`flush_final_block`](Self::flush_final_block)
    pub fn hash(&self) -> Option<&H::Output> {
        self.hash.as_ref()
    }

    /// Whether [`flush_final_block`](Self::flush_final_block) has run at least once
    pub fn has_flushed_final_block(&self) -> bool {
        self.flushed
    }

    /// Number of upcoming bytes that will pass through without being hashed
    pub fn catch_up(&self) -> u64 {
        self.catch_up
    }

    /// Pending buffer threshold
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Borrow the wrapped stream
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the wrapped stream.
    ///
    /// Bytes moved through this reference bypass the hash.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap the stream, discarding the running hash
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn absorb(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.fresh = false;

        let skip = usize::try_from(self.catch_up).map_or(data.len(), |c| c.min(data.len()));
        self.catch_up -= skip as u64;

        let data = &data[skip..];
        if data.is_empty() {
            return;
        }

        self.pending.extend_from_slice(data);
        if self.pending.len() > self.threshold {
            self.push_pending();
        }
    }

    /// Number of never-hashed positions inside `start..end`
    fn unhashed_between(&self, start: u64, end: u64) -> u64 {
        self.unhashed.map_or(0, |(gap_start, gap_end)| {
            gap_end.min(end).saturating_sub(gap_start.max(start))
        })
    }

    fn push_pending(&mut self) {
        if !self.pending.is_empty() {
            self.hasher.update(&self.pending);
            self.pending.clear();
        }
    }
}

impl<S: Read, H: HashAlgorithm> Read for HashStream<S, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.absorb(&buf[..n]);
        Ok(n)
    }
}

impl<S: Write, H: HashAlgorithm> Write for HashStream<S, H> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.absorb(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<S: Read + Seek, H: HashAlgorithm> Seek for HashStream<S, H> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let current = self.inner.stream_position()?;
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => current.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let end = self.inner.seek(SeekFrom::End(0))?;
                self.inner.seek(SeekFrom::Start(current))?;
                end.checked_add_signed(delta)
            }
        }
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;

        if target > current {
            let mut remaining = target - current;
            let mut chunk = vec![0u8; READ_THROUGH_CHUNK];
            while remaining > 0 {
                let want = usize::try_from(remaining).map_or(chunk.len(), |r| r.min(chunk.len()));
                let n = self.read(&mut chunk[..want])?;
                if n == 0 {
                    break;
                }
                remaining -= n as u64;
            }
            if remaining > 0 {
                let gap_start = target - remaining;
                self.unhashed = Some(match self.unhashed {
                    Some((start, _)) => (start.min(gap_start), target),
                    None => (gap_start, target),
                });
                return self.inner.seek(SeekFrom::Start(target));
            }
        } else if target < current {
            if !self.fresh {
                self.catch_up += current - target - self.unhashed_between(target, current);
            }
            self.unhashed = self
                .unhashed
                .map(|(start, end)| (start, end.min(target)))
                .filter(|(start, end)| start < end);
            return self.inner.seek(SeekFrom::Start(target));
        }

        Ok(target)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::crc32::{Crc32, Crc32Hasher};
    use proptest::prelude::*;
    use std::io::Cursor;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn reader(data: &[u8]) -> HashStream<Cursor<Vec<u8>>, Crc32Hasher> {
        HashStream::new(Cursor::new(data.to_vec()), Crc32Hasher::new())
    }

    #[test]
    fn test_read_hashes_everything() {
        let data = sample(1000);
        let mut stream = reader(&data);

        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();

        assert_eq!(out, data);
        assert!(!stream.has_flushed_final_block());
        assert_eq!(stream.flush_final_block(), Crc32::from_data(&data));
        assert!(stream.has_flushed_final_block());
        assert_eq!(stream.hash(), Some(&Crc32::from_data(&data)));
    }

    #[test]
    fn test_threshold_does_not_change_hash() {
        let data = sample(5000);

        for threshold in [1, 7, 100, 4999, 5000, DEFAULT_HASH_BUFFER_SIZE] {
            let mut stream = reader(&data).with_threshold(threshold);
            let mut buf = [0u8; 333];
            while stream.read(&mut buf).unwrap() > 0 {}
            assert_eq!(stream.flush_final_block(), Crc32::from_data(&data));
        }
    }

    #[test]
    fn test_threshold_clamped() {
        let stream = reader(b"").with_threshold(0);
        assert_eq!(stream.threshold(), 1);
    }

    #[test]
    fn test_forward_seek_reads_through() {
        let data = sample(20_000);
        let mut stream = reader(&data);

        let mut head = [0u8; 10];
        stream.read_exact(&mut head).unwrap();
        assert_eq!(stream.seek(SeekFrom::Start(15_000)).unwrap(), 15_000);

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();

        assert_eq!(rest, &data[15_000..]);
        assert_eq!(stream.flush_final_block(), Crc32::from_data(&data));
    }

    #[test]
    fn test_seek_past_end() {
        let data = sample(100);
        let mut stream = reader(&data);

        assert_eq!(stream.seek(SeekFrom::Start(150)).unwrap(), 150);
        assert_eq!(stream.get_ref().position(), 150);
        assert_eq!(stream.flush_final_block(), Crc32::from_data(&data));
    }

    #[test]
    fn test_backward_seek_over_past_end_gap() {
        let data = sample(4);
        let mut stream = reader(&data);

        let mut head = [0u8; 2];
        stream.read_exact(&mut head).unwrap();
        assert_eq!(stream.seek(SeekFrom::Start(10)).unwrap(), 10);
        assert_eq!(stream.seek(SeekFrom::Start(2)).unwrap(), 2);
        assert_eq!(stream.catch_up(), 2);

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, &data[2..]);
        assert_eq!(stream.catch_up(), 0);

        stream.write_all(b"zz").unwrap();
        assert_eq!(stream.flush_final_block(), Crc32::from_data(&[&data[..], &b"zz"[..]].concat()));
    }

    #[test]
    fn test_backward_seek_is_not_rehashed() {
        let data = sample(300);
        let mut stream = reader(&data);

        let mut buf = [0u8; 100];
        stream.read_exact(&mut buf).unwrap();
        stream.seek(SeekFrom::Current(-40)).unwrap();
        assert_eq!(stream.catch_up(), 40);

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();

        assert_eq!(rest, &data[60..]);
        assert_eq!(stream.catch_up(), 0);
        assert_eq!(stream.flush_final_block(), Crc32::from_data(&data));
    }

    #[test]
    fn test_backward_seek_when_fresh_rehashes() {
        let data = sample(64);
        let mut stream = reader(&data);

        stream.get_mut().set_position(32);
        stream.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(stream.catch_up(), 0);

        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(stream.flush_final_block(), Crc32::from_data(&data));
    }

    #[test]
    fn test_zero_distance_seek() {
        let data = sample(64);
        let mut stream = reader(&data);

        let mut buf = [0u8; 16];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(stream.seek(SeekFrom::Current(0)).unwrap(), 16);
        assert_eq!(stream.seek(SeekFrom::Start(16)).unwrap(), 16);
        assert_eq!(stream.catch_up(), 0);
    }

    #[test]
    fn test_seek_from_end() {
        let data = sample(64);
        let mut stream = reader(&data);

        assert_eq!(stream.seek(SeekFrom::End(-4)).unwrap(), 60);
        assert_eq!(stream.flush_final_block(), Crc32::from_data(&data[..60]));

        assert!(stream.seek(SeekFrom::End(-100)).is_err());
    }

    #[test]
    fn test_two_regions_in_sequence() {
        let data = b"headerbody-bytes";
        let mut stream = reader(data);

        let mut header = [0u8; 6];
        stream.read_exact(&mut header).unwrap();
        let first = stream.flush_final_block();

        let mut body = Vec::new();
        stream.read_to_end(&mut body).unwrap();
        let second = stream.flush_final_block();

        assert_eq!(first, Crc32::from_data(b"header"));
        assert_eq!(second, Crc32::from_data(b"body-bytes"));
        assert_eq!(stream.hash(), Some(&second));
    }

    #[test]
    fn test_initialize_discards_state() {
        let data = sample(200);
        let mut stream = reader(&data);

        let mut buf = [0u8; 50];
        stream.read_exact(&mut buf).unwrap();
        stream.seek(SeekFrom::Start(10)).unwrap();
        assert_eq!(stream.catch_up(), 40);

        stream.initialize();
        assert_eq!(stream.catch_up(), 0);

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(stream.flush_final_block(), Crc32::from_data(&data[10..]));
    }

    #[test]
    fn test_write_hashes_written_bytes() {
        let mut stream = HashStream::new(Vec::new(), Crc32Hasher::new()).with_threshold(4);

        stream.write_all(b"1234").unwrap();
        stream.write_all(b"56789").unwrap();
        stream.flush().unwrap();

        assert_eq!(stream.flush_final_block().value(), 0xCBF4_3926);
        assert_eq!(stream.into_inner(), b"123456789");
    }

    proptest! {
        #[test]
        fn prop_chunked_reads_match_one_shot(
            data in proptest::collection::vec(any::<u8>(), 0..4096),
            chunk in 1usize..512,
            threshold in 1usize..2048,
        ) {
            let mut stream = reader(&data).with_threshold(threshold);
            let mut buf = vec![0u8; chunk];
            while stream.read(&mut buf).unwrap() > 0 {}
            prop_assert_eq!(stream.flush_final_block(), Crc32::from_data(&data));
        }
    }
}
