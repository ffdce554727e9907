// Copyright 2020 Google LLC
//
// Use of this source code is governed by an MIT-style license that can be found
// in the LICENSE file or at https://opensource.org/licenses/MIT.

//! Defines the handler for the file finder action.
//!
//! Every path expression of the request is expanded into alternatives, each
//! alternative is resolved lazily into filesystem entries. An entry is
//! reported only if it passes the regularity check, all metadata conditions
//! and all content conditions (in that order). The requested action decides
//! what is reported about it.

use crate::action::finder::chunks::ChunksConfig;
use crate::action::finder::condition::{check_contents, ContentCondition, MatchSpan};
use crate::action::finder::download::{self, Decision, TransferError};
use crate::action::finder::groups::expand_groups;
use crate::action::finder::hash::{self, hash_amount};
use crate::action::finder::request::{Action, Request};
use crate::action::finder::resolve::resolve_path;
use crate::action::finder::response::{FileFinderResult, Response};
use crate::action::finder::stat::{stat, StatEntry};
use crate::fs::{Entry, StatCache};
use crate::session::{self, Session};
use log::{debug, error, info, warn};
use std::fs::{File, Metadata};
use std::io::{ErrorKind, Read, Seek};
use std::path::Path;

/// Reason for not reporting a resolved entry.
#[derive(Debug)]
pub enum Skip {
    /// The entry is not a regular file, a directory or a symlink.
    NonRegular,
    /// Some metadata condition is not met.
    MetadataMismatch,
    /// Some content condition found no match.
    ContentMismatch,
    /// Content conditions never match directories.
    DirectoryWithContentConditions,
    /// The entry disappeared before it was processed.
    Vanished(std::io::Error),
    /// The entry could not be read.
    Unreadable(std::io::Error),
}

impl std::fmt::Display for Skip {

    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Skip::*;

        match *self {
            NonRegular => write!(fmt, "not a regular file"),
            MetadataMismatch => write!(fmt, "metadata conditions not met"),
            ContentMismatch => write!(fmt, "content conditions not met"),
            DirectoryWithContentConditions => {
                write!(fmt, "directory cannot meet content conditions")
            }
            Vanished(ref error) => write!(fmt, "vanished: {}", error),
            Unreadable(ref error) => write!(fmt, "unreadable: {}", error),
        }
    }
}

pub fn handle<S: Session>(session: &mut S, request: Request) -> session::Result<()> {
    info!(
        "file finder request: paths: {:?}, action: {:?}",
        request.paths, request.action
    );

    request.validate()?;

    let mut cache = StatCache::new();
    let mut reported = 0;

    for expression in &request.paths {
        for path in expand_groups(expression) {
            let mut resolved = match resolve_path(Path::new(&path), &request.expansion) {
                Ok(resolved) => resolved,
                Err(err) => {
                    error!("failed to resolve '{}': {}", path, err);
                    return Err(err.into());
                }
            };

            loop {
                let entry = match resolved.next_with(&mut || session.heartbeat()) {
                    Some(entry) => entry?,
                    None => break,
                };

                match process(session, &request, &mut cache, &entry)? {
                    Ok(response) => {
                        session.reply(FileFinderResult::from(response))?;
                        reported += 1;
                    }
                    Err(skip) => {
                        debug!("skipping '{}': {}", entry.path.display(), skip);
                    }
                }
            }
        }
    }

    info!("file finder finished, {} results reported", reported);
    Ok(())
}

/// Runs the whole per-entry pipeline.
///
/// The outer error is fatal for the request, the inner one only skips the
/// entry. Stat results cached while evaluating the entry are dropped once it
/// is done, so the cache never outlives a single candidate.
fn process<S: Session>(
    session: &mut S,
    request: &Request,
    cache: &mut StatCache,
    entry: &Entry,
) -> session::Result<Result<Response, Skip>> {
    let result = evaluate(session, request, cache, entry);
    cache.clear();
    result
}

fn evaluate<S: Session>(
    session: &mut S,
    request: &Request,
    cache: &mut StatCache,
    entry: &Entry,
) -> session::Result<Result<Response, Skip>> {
    if !request.process_non_regular_files && !is_regular(&entry.metadata) {
        return Ok(Err(Skip::NonRegular));
    }

    if let Err(skip) = check_metadata(request, cache, entry) {
        return Ok(Err(skip));
    }

    let matches = match check_content(session, request, cache, entry)? {
        Ok(matches) => matches,
        Err(skip) => return Ok(Err(skip)),
    };

    perform(session, &request.action, cache, entry, matches)
}

fn is_regular(metadata: &Metadata) -> bool {
    let file_type = metadata.file_type();
    file_type.is_file() || file_type.is_dir() || file_type.is_symlink()
}

fn check_metadata(request: &Request, cache: &mut StatCache, entry: &Entry) -> Result<(), Skip> {
    if request.metadata_conditions.is_empty() {
        return Ok(());
    }

    let followed;
    let entry = if request.expansion.follow_links && entry.metadata.file_type().is_symlink() {
        match cache.stat(&entry.path, true) {
            Ok(metadata) => {
                followed = Entry {
                    path: entry.path.clone(),
                    metadata,
                };
                &followed
            }
            Err(err) => {
                debug!("failed to follow '{}': {}", entry.path.display(), err);
                entry
            }
        }
    } else {
        entry
    };

    if request.metadata_conditions.iter().all(|condition| condition.check(entry)) {
        Ok(())
    } else {
        Err(Skip::MetadataMismatch)
    }
}

fn check_content<S: Session>(
    session: &mut S,
    request: &Request,
    cache: &mut StatCache,
    entry: &Entry,
) -> session::Result<Result<Vec<MatchSpan>, Skip>> {
    if request.content_conditions.is_empty() {
        return Ok(Ok(vec![]));
    }

    match cache.stat(&entry.path, true) {
        Ok(ref metadata) if metadata.is_dir() => {
            return Ok(Err(Skip::DirectoryWithContentConditions));
        }
        Ok(_) => (),
        Err(err) => return Ok(Err(io_skip(&entry.path, err))),
    }

    let result = check_contents(&request.content_conditions, |condition| {
        search(session, &entry.path, condition)
    });

    match result {
        Ok(Some(matches)) => Ok(Ok(matches)),
        Ok(None) => Ok(Err(Skip::ContentMismatch)),
        Err(TransferError::Read(err)) => Ok(Err(io_skip(&entry.path, err))),
        Err(TransferError::Session(err)) => Err(err),
    }
}

/// Collects all spans of `condition` in the file, with a heartbeat per
/// scanned chunk.
fn search<S: Session>(
    session: &mut S,
    path: &Path,
    condition: &ContentCondition,
) -> Result<Vec<MatchSpan>, TransferError> {
    let file = File::open(path)?;
    let mut search = condition.search(file)?;

    let mut heartbeat = || session.heartbeat().map_err(TransferError::Session);

    let mut matches = vec![];
    while let Some(span) = search.next_with(&mut heartbeat) {
        matches.push(span?);
    }

    Ok(matches)
}

fn io_skip(path: &Path, error: std::io::Error) -> Skip {
    if error.kind() == ErrorKind::NotFound {
        Skip::Vanished(error)
    } else {
        warn!("failed to read '{}': {}", path.display(), error);
        Skip::Unreadable(error)
    }
}

/// Executes the requested action on an entry that met all the conditions.
fn perform<S: Session>(
    session: &mut S,
    action: &Action,
    cache: &mut StatCache,
    entry: &Entry,
    matches: Vec<MatchSpan>,
) -> session::Result<Result<Response, Skip>> {
    match *action {
        Action::Stat(ref options) => {
            let stat = match stat(entry, options.resolve_links, options.collect_ext_attrs, cache) {
                Ok(stat) => stat,
                Err(err) => return Ok(Err(io_skip(&entry.path, err))),
            };
            Ok(Ok(Response::Stat(stat, matches)))
        }
        Action::Hash(ref options) => {
            let stat = match stat(entry, true, options.collect_ext_attrs, cache) {
                Ok(stat) => stat,
                Err(err) => return Ok(Err(io_skip(&entry.path, err))),
            };

            let amount = if stat.metadata.is_file() {
                hash_amount(stat.metadata.len(), options)
            } else {
                None
            };

            match amount {
                Some(amount) => {
                    let file = File::open(&stat.path);
                    Ok(hash_file(stat, file, amount, matches))
                }
                None => Ok(Ok(Response::Stat(stat, matches))),
            }
        }
        Action::Download(ref options) => {
            let stat = match stat(entry, true, options.collect_ext_attrs, cache) {
                Ok(stat) => stat,
                Err(err) => return Ok(Err(io_skip(&entry.path, err))),
            };

            let decision = if stat.metadata.is_file() {
                download::decide(stat.metadata.len(), options)
            } else {
                Decision::Skip
            };

            match decision {
                Decision::Skip => Ok(Ok(Response::Stat(stat, matches))),
                Decision::Hash(amount) => {
                    let file = File::open(&stat.path);
                    Ok(hash_file(stat, file, amount, matches))
                }
                Decision::Download(amount) => {
                    let config = ChunksConfig::new(options.chunk_size, 0)?;
                    let file = File::open(&stat.path);
                    download_file(session, stat, file, config, amount, matches)
                }
            }
        }
    }
}

/// Hashes the opened `file`, `stat` describes it.
fn hash_file<R: Read>(
    stat: StatEntry,
    file: std::io::Result<R>,
    amount: u64,
    matches: Vec<MatchSpan>,
) -> Result<Response, Skip> {
    match file.and_then(|file| hash::hash(file, amount)) {
        Ok(hash) => Ok(Response::Hash(hash, stat, matches)),
        Err(err) => degrade(stat, matches, err),
    }
}

fn download_file<S, R>(
    session: &mut S,
    stat: StatEntry,
    file: std::io::Result<R>,
    config: ChunksConfig,
    amount: u64,
    matches: Vec<MatchSpan>,
) -> session::Result<Result<Response, Skip>>
where
    S: Session,
    R: Read + Seek,
{
    let file = match file {
        Ok(file) => file,
        Err(err) => return Ok(degrade(stat, matches, err)),
    };

    match download::download(session, file, config, amount) {
        Ok(download) => Ok(Ok(Response::Download(download, stat, matches))),
        Err(TransferError::Read(err)) => Ok(degrade(stat, matches, err)),
        Err(TransferError::Session(err)) => Err(err),
    }
}

/// Falls back to reporting only the stat entry if the contents could not be
/// read, unless the file is gone.
fn degrade(stat: StatEntry, matches: Vec<MatchSpan>, error: std::io::Error) -> Result<Response, Skip> {
    if error.kind() == ErrorKind::NotFound {
        return Err(Skip::Vanished(error));
    }

    warn!("failed to read '{}': {}", stat.path.display(), error);
    Ok(Response::Stat(stat, matches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::finder::condition::{ContentsMatchOptions, MetadataCondition};
    use crate::action::finder::request::*;
    use crate::session::test::Fake;

    fn path_str(path: &Path) -> String {
        path.to_str().unwrap().to_owned()
    }

    fn results(session: &Fake) -> Vec<&FileFinderResult> {
        session.replies::<FileFinderResult>().collect()
    }

    fn hash_request(path: &Path, max_size: u64, policy: HashOversizedFilePolicy) -> Request {
        let mut request = Request::new(vec![path_str(path)]);
        request.action = Action::Hash(HashActionOptions {
            max_size,
            oversized_file_policy: policy,
            ..Default::default()
        });
        request
    }

    fn download_request(
        path: &Path,
        max_size: u64,
        policy: DownloadOversizedFilePolicy,
    ) -> Request {
        let mut request = Request::new(vec![path_str(path)]);
        request.action = Action::Download(DownloadActionOptions {
            max_size,
            oversized_file_policy: policy,
            chunk_size: 512,
            ..Default::default()
        });
        request
    }

    fn big_file(tempdir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = tempdir.path().join("big");
        std::fs::write(&path, vec![0xABu8; 2000]).unwrap();
        path
    }

    #[test]
    fn test_stat_glob() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::write(tempdir.path().join("a.txt"), "").unwrap();
        std::fs::write(tempdir.path().join("b.log"), "").unwrap();
        std::fs::write(tempdir.path().join("c.txt"), "").unwrap();

        let request = Request::new(vec![path_str(&tempdir.path().join("*.txt"))]);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        let results = results(&session);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].stat_entry.path, tempdir.path().join("a.txt"));
        assert_eq!(results[1].stat_entry.path, tempdir.path().join("c.txt"));
        assert!(results[0].hash_entry.is_none());
        assert!(results[0].transferred_file.is_none());
        assert!(results[0].matches.is_empty());
    }

    #[test]
    fn test_stat_groups() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::write(tempdir.path().join("a"), "").unwrap();
        std::fs::write(tempdir.path().join("b"), "").unwrap();
        std::fs::write(tempdir.path().join("c"), "").unwrap();

        let path = format!("{}/{{a,c}}", path_str(tempdir.path()));
        let request = Request::new(vec![path]);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());
        assert_eq!(session.reply_count(), 2);
    }

    #[test]
    fn test_no_paths() {
        let mut session = Fake::new();
        assert!(handle(&mut session, Request::new(vec![])).is_err());
        assert_eq!(session.reply_count(), 0);
    }

    #[test]
    fn test_relative_path() {
        let mut session = Fake::new();
        let result = handle(&mut session, Request::new(vec!["foo/*".to_owned()]));

        assert!(matches!(result, Err(session::Error::Action(_))));
    }

    #[test]
    fn test_cancellation() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::write(tempdir.path().join("a"), "").unwrap();

        let request = Request::new(vec![path_str(&tempdir.path().join("*"))]);

        let mut session = Fake::cancelling_after(1);
        let result = handle(&mut session, request);

        assert!(matches!(result, Err(session::Error::Cancelled)));
        assert_eq!(session.reply_count(), 0);
    }

    #[test]
    fn test_heartbeats_are_sent() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tempdir.path().join("a").join("b")).unwrap();

        let request = Request::new(vec![path_str(&tempdir.path().join("**"))]);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());
        assert_eq!(session.reply_count(), 2);
        assert!(session.heartbeat_count() >= 3);
    }

    #[test]
    fn test_metadata_conditions() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::write(tempdir.path().join("small"), "1").unwrap();
        std::fs::write(tempdir.path().join("large"), "1234567890").unwrap();

        let mut request = Request::new(vec![path_str(&tempdir.path().join("*"))]);
        request.metadata_conditions = vec![MetadataCondition::MinSize(5)];

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        let results = results(&session);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].stat_entry.path, tempdir.path().join("large"));
    }

    #[test]
    fn test_content_conditions() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::write(tempdir.path().join("a"), "abcXYZdefXYZghi").unwrap();
        std::fs::write(tempdir.path().join("b"), "abcdefghi").unwrap();

        let options = ContentsMatchOptions {
            chunk_size: 8,
            overlap_size: 3,
            ..Default::default()
        };
        let mut request = Request::new(vec![path_str(&tempdir.path().join("*"))]);
        request.content_conditions = vec![
            ContentCondition::literal(b"XYZ".to_vec(), options).unwrap(),
        ];

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        let results = results(&session);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].stat_entry.path, tempdir.path().join("a"));

        let begins = results[0].matches.iter().map(|span| span.begin).collect::<Vec<_>>();
        assert_eq!(begins, vec![3, 9]);
    }

    #[test]
    fn test_content_conditions_are_conjunctive() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::write(tempdir.path().join("a"), "foo bar").unwrap();
        std::fs::write(tempdir.path().join("b"), "foo baz").unwrap();

        let mut request = Request::new(vec![path_str(&tempdir.path().join("*"))]);
        request.content_conditions = vec![
            ContentCondition::literal(b"foo".to_vec(), Default::default()).unwrap(),
            ContentCondition::regex("ba[r]", Default::default()).unwrap(),
        ];

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        let results = results(&session);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].stat_entry.path, tempdir.path().join("a"));
        assert_eq!(results[0].matches.len(), 2);
    }

    #[test]
    fn test_content_conditions_short_circuit() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::write(tempdir.path().join("a"), "foo").unwrap();

        let mut request = Request::new(vec![path_str(&tempdir.path().join("a"))]);
        request.content_conditions = vec![
            ContentCondition::literal(b"bar".to_vec(), Default::default()).unwrap(),
            ContentCondition::literal(b"foo".to_vec(), Default::default()).unwrap(),
        ];

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());
        assert_eq!(session.reply_count(), 0);
        // One for resolving the path and one for the first condition only.
        assert_eq!(session.heartbeat_count(), 2);
    }

    #[test]
    fn test_directory_with_content_conditions() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::create_dir(tempdir.path().join("dir")).unwrap();

        let mut request = Request::new(vec![path_str(&tempdir.path().join("dir"))]);
        request.content_conditions = vec![
            ContentCondition::regex(".*", Default::default()).unwrap(),
        ];

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());
        assert_eq!(session.reply_count(), 0);
    }

    #[test]
    #[cfg(target_family = "unix")]
    fn test_non_regular_files() {
        let tempdir = tempfile::tempdir().unwrap();
        let socket = tempdir.path().join("socket");
        let _listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();

        let mut request = Request::new(vec![path_str(&socket)]);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());
        assert_eq!(session.reply_count(), 0);

        request = Request::new(vec![path_str(&socket)]);
        request.process_non_regular_files = true;

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());
        assert_eq!(session.reply_count(), 1);
    }

    #[test]
    fn test_hash_full() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let request = hash_request(&path, 2000, HashOversizedFilePolicy::Skip);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        let results = results(&session);
        assert_eq!(results.len(), 1);
        let hash = results[0].hash_entry.as_ref().unwrap();
        assert_eq!(hash.num_bytes, 2000);
    }

    #[test]
    fn test_hash_oversized_skip() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let request = hash_request(&path, 1000, HashOversizedFilePolicy::Skip);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        let results = results(&session);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].stat_entry.metadata.len(), 2000);
        assert!(results[0].hash_entry.is_none());
    }

    #[test]
    fn test_hash_oversized_truncated() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let request = hash_request(&path, 1000, HashOversizedFilePolicy::HashTruncated);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        let results = results(&session);
        let hash = results[0].hash_entry.as_ref().unwrap();
        assert_eq!(hash.num_bytes, 1000);

        let expected = hash::hash(&[0xABu8; 1000][..], u64::MAX).unwrap();
        assert_eq!(*hash, expected);
    }

    #[test]
    fn test_hash_directory() {
        let tempdir = tempfile::tempdir().unwrap();

        let request = hash_request(tempdir.path(), 1000, HashOversizedFilePolicy::HashTruncated);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        let results = results(&session);
        assert_eq!(results.len(), 1);
        assert!(results[0].stat_entry.metadata.is_dir());
        assert!(results[0].hash_entry.is_none());
    }

    #[test]
    fn test_download_full() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let request = download_request(&path, 2000, DownloadOversizedFilePolicy::Skip);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        assert_eq!(session.blobs().len(), 4);

        let results = results(&session);
        let download = results[0].transferred_file.as_ref().unwrap();
        assert_eq!(download.chunk_size, 512);
        assert_eq!(download.len(), 2000);
        assert_eq!(download.chunks[3].offset, 1536);
        assert_eq!(download.chunks[3].length, 464);
        assert!(results[0].hash_entry.is_none());
    }

    #[test]
    fn test_download_oversized_skip() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let request = download_request(&path, 1000, DownloadOversizedFilePolicy::Skip);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        assert!(session.blobs().is_empty());
        let results = results(&session);
        assert_eq!(results.len(), 1);
        assert!(results[0].transferred_file.is_none());
        assert!(results[0].hash_entry.is_none());
    }

    #[test]
    fn test_download_oversized_truncated() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let request = download_request(&path, 1000, DownloadOversizedFilePolicy::DownloadTruncated);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        assert_eq!(session.blobs().len(), 2);
        let results = results(&session);
        let download = results[0].transferred_file.as_ref().unwrap();
        assert_eq!(download.len(), 1000);
    }

    #[test]
    fn test_download_oversized_hash_truncated() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let request = download_request(&path, 1000, DownloadOversizedFilePolicy::HashTruncated);

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        assert!(session.blobs().is_empty());
        let results = results(&session);
        assert!(results[0].transferred_file.is_none());
        assert_eq!(results[0].hash_entry.as_ref().unwrap().num_bytes, 1000);
    }

    #[test]
    fn test_download_cancelled() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let request = download_request(&path, 2000, DownloadOversizedFilePolicy::Skip);

        // Resolving the path takes the first heartbeat, chunks take the rest.
        let mut session = Fake::cancelling_after(3);
        let result = handle(&mut session, request);

        assert!(matches!(result, Err(session::Error::Cancelled)));
        assert_eq!(session.blobs().len(), 1);
        assert_eq!(session.reply_count(), 0);
    }

    #[test]
    fn test_content_search_cancelled() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("dots");
        std::fs::write(&path, vec![b'.'; 64]).unwrap();

        let options = ContentsMatchOptions {
            chunk_size: 8,
            overlap_size: 3,
            ..Default::default()
        };
        let mut request = Request::new(vec![path_str(&path)]);
        request.content_conditions = vec![
            ContentCondition::literal(b"XYZ".to_vec(), options).unwrap(),
        ];

        // Resolving the path takes the first heartbeat, scanned chunks the rest.
        let mut session = Fake::cancelling_after(4);
        let result = handle(&mut session, request);

        assert!(matches!(result, Err(session::Error::Cancelled)));
        assert_eq!(session.heartbeat_count(), 4);
        assert_eq!(session.reply_count(), 0);
    }

    #[test]
    fn test_stat_cache_scoped_to_entry() {
        let tempdir = tempfile::tempdir().unwrap();
        for name in &["a", "b", "c"] {
            std::fs::write(tempdir.path().join(name), "foo").unwrap();
        }

        let path = tempdir.path().join("*");
        let mut request = hash_request(&path, 1024, HashOversizedFilePolicy::Skip);
        request.metadata_conditions = vec![MetadataCondition::MinSize(1)];
        request.content_conditions = vec![
            ContentCondition::literal(b"foo".to_vec(), Default::default()).unwrap(),
        ];

        let mut session = Fake::new();
        let mut cache = StatCache::new();

        let mut processed = 0;
        for entry in resolve_path(&path, &request.expansion).unwrap() {
            let result = process(&mut session, &request, &mut cache, &entry).unwrap();
            assert!(matches!(result, Ok(Response::Hash(..))));
            assert!(cache.is_empty());
            processed += 1;
        }

        assert_eq!(processed, 3);
    }

    struct Failing(ErrorKind);

    impl std::io::Read for Failing {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(self.0))
        }
    }

    impl std::io::Seek for Failing {
        fn seek(&mut self, _: std::io::SeekFrom) -> std::io::Result<u64> {
            Ok(0)
        }
    }

    fn stat_entry(path: &Path) -> StatEntry {
        let entry = Entry {
            path: path.to_path_buf(),
            metadata: std::fs::symlink_metadata(path).unwrap(),
        };
        stat(&entry, false, false, &mut StatCache::new()).unwrap()
    }

    #[test]
    fn test_hash_read_error_reports_stat() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let file = Ok(Failing(ErrorKind::PermissionDenied));
        let result = hash_file(stat_entry(&path), file, u64::MAX, vec![]);

        match result {
            Ok(Response::Stat(stat, _)) => assert_eq!(stat.path, path),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_hash_vanished_file_skipped() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let file: std::io::Result<Failing> = Err(ErrorKind::NotFound.into());
        let result = hash_file(stat_entry(&path), file, u64::MAX, vec![]);
        assert!(matches!(result, Err(Skip::Vanished(_))));

        let file = Ok(Failing(ErrorKind::NotFound));
        let result = hash_file(stat_entry(&path), file, u64::MAX, vec![]);
        assert!(matches!(result, Err(Skip::Vanished(_))));
    }

    #[test]
    fn test_download_read_error_reports_stat() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let mut session = Fake::new();
        let config = ChunksConfig::new(512, 0).unwrap();
        let file = Ok(Failing(ErrorKind::Other));
        let result = download_file(&mut session, stat_entry(&path), file, config, u64::MAX, vec![]);

        match result {
            Ok(Ok(Response::Stat(stat, _))) => assert_eq!(stat.metadata.len(), 2000),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(session.blobs().is_empty());
    }

    #[test]
    fn test_download_vanished_file_skipped() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = big_file(&tempdir);

        let mut session = Fake::new();
        let config = ChunksConfig::new(512, 0).unwrap();
        let file: std::io::Result<Failing> = Err(ErrorKind::NotFound.into());
        let result = download_file(&mut session, stat_entry(&path), file, config, u64::MAX, vec![]);

        assert!(matches!(result, Ok(Err(Skip::Vanished(_)))));
        assert!(session.blobs().is_empty());
    }

    #[test]
    fn test_hash_file_removed_after_resolving() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::write(tempdir.path().join("a"), "a").unwrap();
        std::fs::write(tempdir.path().join("b"), "b").unwrap();

        let path = tempdir.path().join("*");
        let request = hash_request(&path, 1024, HashOversizedFilePolicy::Skip);

        let mut session = Fake::new();
        let mut cache = StatCache::new();

        let mut resolved = resolve_path(&path, &request.expansion).unwrap();
        let first = resolved.next().unwrap();
        let second = resolved.next().unwrap();
        std::fs::remove_file(&first.path).unwrap();

        let result = process(&mut session, &request, &mut cache, &first).unwrap();
        assert!(matches!(result, Err(Skip::Vanished(_))));

        let result = process(&mut session, &request, &mut cache, &second).unwrap();
        assert!(matches!(result, Ok(Response::Hash(..))));
    }

    #[test]
    #[cfg(target_family = "unix")]
    fn test_stat_resolve_links() {
        let tempdir = tempfile::tempdir().unwrap();
        let target = tempdir.path().join("target");
        std::fs::write(&target, "foobar").unwrap();
        let symlink = tempdir.path().join("symlink");
        std::os::unix::fs::symlink(&target, &symlink).unwrap();

        let mut request = Request::new(vec![path_str(&symlink)]);
        request.action = Action::Stat(StatActionOptions {
            resolve_links: true,
            ..Default::default()
        });

        let mut session = Fake::new();
        assert!(handle(&mut session, request).is_ok());

        let results = results(&session);
        assert_eq!(results[0].stat_entry.metadata.len(), 6);
        assert_eq!(results[0].stat_entry.symlink, Some(target));
    }
}
