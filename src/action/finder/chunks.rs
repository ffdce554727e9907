//! Splits byte sources into overlapping chunks and scans them for patterns.
//!
//! Consecutive chunks share `overlap_bytes` bytes: every chunk but the first
//! starts with the trailing bytes of its predecessor. A pattern no longer than
//! the overlap plus one byte can therefore never fall between two chunks, and
//! `Chunk::scan` makes sure that a match is reported by exactly one of them.

use crate::action::finder::error::Error;
use std::io::{Read, Seek, SeekFrom};

/// Upper bound of the buffer reserved up front for a chunk, the rest grows
/// with the data actually read.
const MAX_RESERVED_BYTES: u64 = 64 * 1024;

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunksConfig {
    bytes_per_chunk: u64,
    overlap_bytes: u64,
}

impl ChunksConfig {

    /// Creates a configuration, failing unless
    /// `0 <= overlap_bytes < bytes_per_chunk`.
    pub fn new(bytes_per_chunk: u64, overlap_bytes: u64) -> Result<ChunksConfig, Error> {
        if bytes_per_chunk == 0 || overlap_bytes >= bytes_per_chunk {
            return Err(Error::InvalidChunkConfig {
                chunk_size: bytes_per_chunk,
                overlap_size: overlap_bytes,
            });
        }

        Ok(ChunksConfig {
            bytes_per_chunk,
            overlap_bytes,
        })
    }

    pub fn bytes_per_chunk(&self) -> u64 {
        self.bytes_per_chunk
    }

    pub fn overlap_bytes(&self) -> u64 {
        self.overlap_bytes
    }
}

/// A piece of the byte source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of `data[0]` in the source.
    pub offset: u64,
    /// Chunk contents, including the overlap.
    pub data: Vec<u8>,
    /// Number of leading bytes repeated from the previous chunk.
    pub overlap: usize,
}

impl Chunk {

    /// Bytes of the chunk that were not a part of the previous chunk.
    pub fn new_data(&self) -> &[u8] {
        &self.data[self.overlap..]
    }

    /// Returns an iterator over all matches of `matcher` in the chunk.
    ///
    /// Matches that end within the overlap are skipped, they belong to the
    /// previous chunk. A match starting in the overlap but ending past it is
    /// reported here, since the previous chunk could not see it whole.
    pub fn scan<'a, M>(&'a self, matcher: &'a M) -> Scan<'a, M>
    where
        M: Matcher + ?Sized,
    {
        Scan {
            chunk: self,
            matcher,
            position: 0,
        }
    }
}

/// Range of bytes within a chunk, `data[begin..end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

/// A pattern that can be searched for in a byte slice.
pub trait Matcher {

    /// Finds the leftmost match starting at or after `start`.
    fn find_at(&self, data: &[u8], start: usize) -> Option<Span>;
}

/// Builds a byte regex matching exactly the `literal` bytes.
///
/// Every byte is escaped, so the literal does not need to be valid UTF-8.
pub fn literal(literal: &[u8]) -> Result<regex::bytes::Regex, regex::Error> {
    let mut pattern = String::from("(?-u)");
    for byte in literal {
        pattern.push_str(&format!("\\x{:02X}", byte));
    }

    regex::bytes::Regex::new(&pattern)
}

impl Matcher for regex::bytes::Regex {

    fn find_at(&self, data: &[u8], start: usize) -> Option<Span> {
        if start > data.len() {
            return None;
        }

        regex::bytes::Regex::find_at(self, data, start).map(|found| Span {
            begin: found.start(),
            end: found.end(),
        })
    }
}

/// Iterator over matches in a chunk, see `Chunk::scan`.
pub struct Scan<'a, M: ?Sized> {
    chunk: &'a Chunk,
    matcher: &'a M,
    position: usize,
}

impl<'a, M> Iterator for Scan<'a, M>
where
    M: Matcher + ?Sized,
{
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        loop {
            let span = self.matcher.find_at(&self.chunk.data, self.position)?;

            // Empty matches would never move the search forward.
            self.position = if span.end > span.begin {
                span.end
            } else {
                span.end + 1
            };

            // Nothing precedes the first chunk, so its overlap owns no matches.
            if self.chunk.overlap > 0 && span.end <= self.chunk.overlap {
                continue;
            }

            return Some(span);
        }
    }
}

/// Returns an iterator over chunks of at most `amount` bytes of `reader`,
/// starting at `offset`.
///
/// Pass `u64::MAX` as `amount` to read until the end of the source. Seeking
/// to `offset` is the only I/O performed eagerly, everything else is read
/// on demand, one chunk at a time.
pub fn chunks<R>(
    mut reader: R,
    config: ChunksConfig,
    offset: u64,
    amount: u64,
) -> std::io::Result<Chunks<R>>
where
    R: Read + Seek,
{
    reader.seek(SeekFrom::Start(offset))?;

    Ok(Chunks {
        reader,
        config,
        offset,
        remaining: amount,
        overlap: vec![],
        done: false,
    })
}

/// Iterator over chunks of a byte source, see `chunks`.
pub struct Chunks<R> {
    reader: R,
    config: ChunksConfig,
    /// Position of the first byte not yet read.
    offset: u64,
    /// Number of bytes that can still be read.
    remaining: u64,
    /// Tail of the previous chunk.
    overlap: Vec<u8>,
    done: bool,
}

impl<R: Read> Iterator for Chunks<R> {

    type Item = std::io::Result<Chunk>;

    fn next(&mut self) -> Option<std::io::Result<Chunk>> {
        if self.done || self.remaining == 0 {
            return None;
        }

        let overlap = self.overlap.len();
        let to_read = std::cmp::min(
            self.remaining,
            self.config.bytes_per_chunk - overlap as u64,
        );

        let mut data = std::mem::take(&mut self.overlap);
        data.reserve(std::cmp::min(to_read, MAX_RESERVED_BYTES) as usize);

        let read = match (&mut self.reader).take(to_read).read_to_end(&mut data) {
            Ok(read) => read,
            Err(error) => {
                self.done = true;
                return Some(Err(error));
            }
        };

        if read == 0 {
            self.done = true;
            return None;
        }

        let chunk_offset = self.offset - overlap as u64;
        self.offset += read as u64;
        self.remaining -= read as u64;

        let keep = std::cmp::min(self.config.overlap_bytes as usize, data.len());
        self.overlap = data[data.len() - keep..].to_vec();

        Some(Ok(Chunk {
            offset: chunk_offset,
            data,
            overlap,
        }))
    }
}
