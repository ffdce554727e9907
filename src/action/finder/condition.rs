//! Conditions deciding which of the resolved paths are processed.
//!
//! Metadata conditions look only at the stat data of a candidate. Content
//! conditions scan the file through the chunk engine and produce the spans
//! they matched, an empty result means the condition is not met.

use crate::action::finder::chunks::{self, chunks, Chunk, Chunks, ChunksConfig, Span};
use crate::action::finder::error::Error;
use crate::fs::{ext_flags, Entry};
use log::{debug, warn};
use std::collections::VecDeque;
use std::io::{Read, Seek};
use std::time::SystemTime;

/// Default number of bytes scanned at once by content conditions (10 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Default number of bytes shared by consecutive chunks (1 MiB).
pub const DEFAULT_OVERLAP_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataCondition {
    MinModificationTime(SystemTime),
    MaxModificationTime(SystemTime),
    MinAccessTime(SystemTime),
    MaxAccessTime(SystemTime),
    MinInodeChangeTime(SystemTime),
    MaxInodeChangeTime(SystemTime),
    MinSize(u64),
    MaxSize(u64),
    /// Allowed file extensions, compared case-insensitively and with or
    /// without the leading dot (`txt` and `.TXT` are the same).
    Extensions(Vec<String>),
    /// Linux inode flags (see `chattr`) that must all be set.
    ExtFlagsLinuxBitsSet(u32),
    /// Linux inode flags that must all be unset.
    ExtFlagsLinuxBitsUnset(u32),
}

impl MetadataCondition {

    /// Checks if the condition is met by the entry.
    ///
    /// If the data required for the check cannot be obtained on this platform
    /// the condition is assumed to be met.
    pub fn check(&self, entry: &Entry) -> bool {
        use MetadataCondition::*;

        match self {
            MinModificationTime(expected) => {
                check_time(entry, "modification", entry.metadata.modified().ok(),
                           |actual| actual >= *expected)
            }
            MaxModificationTime(expected) => {
                check_time(entry, "modification", entry.metadata.modified().ok(),
                           |actual| actual <= *expected)
            }
            MinAccessTime(expected) => {
                check_time(entry, "access", entry.metadata.accessed().ok(),
                           |actual| actual >= *expected)
            }
            MaxAccessTime(expected) => {
                check_time(entry, "access", entry.metadata.accessed().ok(),
                           |actual| actual <= *expected)
            }
            MinInodeChangeTime(expected) => {
                check_time(entry, "inode change", inode_change_time(&entry.metadata),
                           |actual| actual >= *expected)
            }
            MaxInodeChangeTime(expected) => {
                check_time(entry, "inode change", inode_change_time(&entry.metadata),
                           |actual| actual <= *expected)
            }
            MinSize(expected) => entry.metadata.len() >= *expected,
            MaxSize(expected) => entry.metadata.len() <= *expected,
            Extensions(allowed) => has_extension(entry, allowed),
            ExtFlagsLinuxBitsSet(expected) => {
                check_ext_flags(entry, |flags| flags & *expected == *expected)
            }
            ExtFlagsLinuxBitsUnset(expected) => {
                check_ext_flags(entry, |flags| flags & *expected == 0)
            }
        }
    }
}

fn check_time<F>(entry: &Entry, kind: &str, time: Option<SystemTime>, pred: F) -> bool
where
    F: FnOnce(SystemTime) -> bool,
{
    match time {
        Some(actual) => pred(actual),
        None => {
            warn!("failed to obtain {} time for file: {}", kind, entry.path.display());
            true
        }
    }
}

fn check_ext_flags<F>(entry: &Entry, pred: F) -> bool
where
    F: FnOnce(u32) -> bool,
{
    // Only files and directories are opened, opening a FIFO blocks.
    let file_type = entry.metadata.file_type();
    if !file_type.is_file() && !file_type.is_dir() {
        debug!("no extended flags for special file: {}", entry.path.display());
        return true;
    }

    match ext_flags(&entry.path) {
        Ok(flags) => pred(flags),
        Err(error) => {
            warn!("failed to obtain extended flags for file '{}': {}",
                  entry.path.display(), error);
            true
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_family = "unix")] {
        fn inode_change_time(metadata: &std::fs::Metadata) -> Option<SystemTime> {
            use std::os::unix::fs::MetadataExt as _;
            use std::time::{Duration, UNIX_EPOCH};

            let secs = metadata.ctime();
            let nanos = metadata.ctime_nsec() as u32;
            if secs >= 0 {
                UNIX_EPOCH.checked_add(Duration::new(secs as u64, nanos))
            } else {
                UNIX_EPOCH
                    .checked_sub(Duration::from_secs((-secs) as u64))
                    .and_then(|time| time.checked_add(Duration::from_nanos(nanos.into())))
            }
        }
    } else {
        fn inode_change_time(_metadata: &std::fs::Metadata) -> Option<SystemTime> {
            None
        }
    }
}

fn has_extension(entry: &Entry, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }

    let extension = match entry.path.extension().and_then(|ext| ext.to_str()) {
        Some(extension) => extension.to_lowercase(),
        None => return false,
    };

    allowed
        .iter()
        .any(|ext| ext.trim_start_matches('.').to_lowercase() == extension)
}

/// How many hits a content condition reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    AllHits,
    FirstHit,
}

/// Options shared by literal and regex content conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentsMatchOptions {
    pub mode: MatchMode,
    /// Offset at which the scan starts.
    pub start_offset: u64,
    /// Number of bytes scanned, `u64::MAX` for the whole file.
    pub length: u64,
    /// Context reported before each hit, clamped to the chunk.
    pub bytes_before: u64,
    /// Context reported after each hit, clamped to the chunk.
    pub bytes_after: u64,
    pub chunk_size: u64,
    pub overlap_size: u64,
}

impl Default for ContentsMatchOptions {

    fn default() -> ContentsMatchOptions {
        ContentsMatchOptions {
            mode: MatchMode::AllHits,
            start_offset: 0,
            length: u64::MAX,
            bytes_before: 0,
            bytes_after: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap_size: DEFAULT_OVERLAP_SIZE,
        }
    }
}

/// Bytes found by a content condition, together with their position in the
/// scanned file (`data` is `file[begin..end]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub begin: u64,
    pub end: u64,
    pub data: Vec<u8>,
}

/// Condition met by files whose contents match a literal or a regex.
#[derive(Debug, Clone)]
pub struct ContentCondition {
    pattern: regex::bytes::Regex,
    options: ContentsMatchOptions,
    config: ChunksConfig,
}

impl ContentCondition {

    /// Creates a condition looking for the exact `literal` bytes.
    pub fn literal(
        literal: Vec<u8>,
        options: ContentsMatchOptions,
    ) -> Result<ContentCondition, Error> {
        if literal.is_empty() {
            return Err(Error::EmptyLiteral);
        }

        let pattern = chunks::literal(&literal).map_err(Error::InvalidRegex)?;
        ContentCondition::new(pattern, options)
    }

    /// Creates a condition looking for matches of the `regex` pattern.
    pub fn regex(
        regex: &str,
        options: ContentsMatchOptions,
    ) -> Result<ContentCondition, Error> {
        let regex = regex::bytes::Regex::new(regex).map_err(Error::InvalidRegex)?;
        ContentCondition::new(regex, options)
    }

    fn new(pattern: regex::bytes::Regex, options: ContentsMatchOptions) -> Result<ContentCondition, Error> {
        let config = ChunksConfig::new(options.chunk_size, options.overlap_size)?;
        Ok(ContentCondition {
            pattern,
            options,
            config,
        })
    }

    /// Returns a lazy iterator over the spans matched in `reader`.
    pub fn search<R>(&self, reader: R) -> std::io::Result<Search<R>>
    where
        R: Read + Seek,
    {
        let chunks = chunks(reader, self.config, self.options.start_offset, self.options.length)?;
        Ok(Search {
            condition: self,
            chunks,
            pending: VecDeque::new(),
            done: false,
        })
    }

    fn span(&self, chunk: &Chunk, span: Span) -> MatchSpan {
        let begin = span.begin.saturating_sub(self.options.bytes_before as usize);
        let end = std::cmp::min(
            span.end.saturating_add(self.options.bytes_after as usize),
            chunk.data.len(),
        );

        MatchSpan {
            begin: chunk.offset + begin as u64,
            end: chunk.offset + end as u64,
            data: chunk.data[begin..end].to_vec(),
        }
    }
}

/// Iterator over matches of a content condition, see `ContentCondition::search`.
pub struct Search<'a, R> {
    condition: &'a ContentCondition,
    chunks: Chunks<R>,
    /// Matches of the current chunk not yet returned.
    pending: VecDeque<MatchSpan>,
    done: bool,
}

impl<'a, R: Read> Search<'a, R> {

    /// Returns the next span, calling `heartbeat` after every chunk read from
    /// the source and before it is scanned.
    ///
    /// A heartbeat error is returned as is and ends the search.
    pub fn next_with<E, H>(&mut self, heartbeat: &mut H) -> Option<Result<MatchSpan, E>>
    where
        E: From<std::io::Error>,
        H: FnMut() -> Result<(), E>,
    {
        loop {
            if self.done {
                return None;
            }

            if let Some(span) = self.pending.pop_front() {
                if self.condition.options.mode == MatchMode::FirstHit {
                    self.done = true;
                }
                return Some(Ok(span));
            }

            let chunk = match self.chunks.next()? {
                Ok(chunk) => chunk,
                Err(error) => {
                    self.done = true;
                    return Some(Err(error.into()));
                }
            };

            if let Err(error) = heartbeat() {
                self.done = true;
                return Some(Err(error));
            }

            let condition = self.condition;
            self.pending.extend(
                chunk
                    .scan(&condition.pattern)
                    .map(|span| condition.span(&chunk, span)),
            );
        }
    }
}

impl<'a, R: Read> Iterator for Search<'a, R> {

    type Item = std::io::Result<MatchSpan>;

    fn next(&mut self) -> Option<std::io::Result<MatchSpan>> {
        self.next_with(&mut || Ok::<(), std::io::Error>(()))
    }
}

/// Runs `search` for every condition, all of them must produce a match.
///
/// Returns `None` as soon as some condition matches nothing, the remaining
/// conditions are not searched then. With no conditions the result is an
/// empty list of matches.
pub fn check_contents<T, E, F>(
    conditions: &[T],
    mut search: F,
) -> Result<Option<Vec<MatchSpan>>, E>
where
    F: FnMut(&T) -> Result<Vec<MatchSpan>, E>,
{
    let mut matches = vec![];
    for condition in conditions {
        let found = search(condition)?;
        if found.is_empty() {
            return Ok(None);
        }
        matches.extend(found);
    }

    Ok(Some(matches))
}
