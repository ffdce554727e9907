use crate::action::finder::condition::MatchSpan;
use crate::action::finder::download::DownloadEntry;
use crate::action::finder::hash::{hex, FileHash};
use crate::action::finder::stat::StatEntry;

/// Result of processing a single path.
///
/// `Hash` and `Download` actions return also StatEntry.
#[derive(Debug)]
pub enum Response {
    Stat(StatEntry, Vec<MatchSpan>),
    Hash(FileHash, StatEntry, Vec<MatchSpan>),
    Download(DownloadEntry, StatEntry, Vec<MatchSpan>),
}

/// Flattened form of `Response` as reported to the session.
#[derive(Debug)]
pub struct FileFinderResult {
    pub stat_entry: StatEntry,
    pub hash_entry: Option<FileHash>,
    pub transferred_file: Option<DownloadEntry>,
    pub matches: Vec<MatchSpan>,
}

impl From<Response> for FileFinderResult {

    fn from(response: Response) -> FileFinderResult {
        match response {
            Response::Stat(stat, matches) => FileFinderResult {
                stat_entry: stat,
                hash_entry: None,
                transferred_file: None,
                matches,
            },
            Response::Hash(hash, stat, matches) => FileFinderResult {
                stat_entry: stat,
                hash_entry: Some(hash),
                transferred_file: None,
                matches,
            },
            Response::Download(download, stat, matches) => FileFinderResult {
                stat_entry: stat,
                hash_entry: None,
                transferred_file: Some(download),
                matches,
            },
        }
    }
}

impl crate::session::Response for FileFinderResult {
}

impl std::fmt::Display for FileFinderResult {

    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        let stat = &self.stat_entry;
        write!(fmt, "{}", stat.path.display())?;

        if let Some(ref target) = stat.symlink {
            write!(fmt, " -> {}", target.display())?;
        }

        write!(fmt, "\tsize={}", stat.metadata.len())?;

        if let Ok(mtime) = stat.metadata.modified() {
            let mtime = chrono::DateTime::<chrono::Utc>::from(mtime);
            write!(fmt, "\tmtime={}", mtime.to_rfc3339())?;
        }

        if let Some(ref hash) = self.hash_entry {
            write!(fmt, "\tsha256={} ({} bytes)", hex(&hash.sha256), hash.num_bytes)?;
        }

        if let Some(ref download) = self.transferred_file {
            write!(fmt, "\tchunks={} ({} bytes)", download.chunks.len(), download.len())?;
        }

        if !self.matches.is_empty() {
            write!(fmt, "\tmatches={}", self.matches.len())?;
        }

        if !stat.ext_attrs.is_empty() {
            write!(fmt, "\txattrs={}", stat.ext_attrs.len())?;
        }

        Ok(())
    }
}
