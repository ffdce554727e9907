//! Arguments of the file finder action.

use crate::action::finder::chunks::ChunksConfig;
use crate::action::finder::condition::{ContentCondition, MetadataCondition};
use crate::action::finder::error::Error;
use std::str::FromStr;

/// Default maximum depth of `**` components without an explicit depth.
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Default size above which files are not hashed or downloaded (500 MiB).
pub const DEFAULT_MAX_SIZE: u64 = 500 * 1024 * 1024;

/// Default size of a downloaded chunk (512 KiB).
pub const DEFAULT_DOWNLOAD_CHUNK_SIZE: u64 = 512 * 1024;

#[derive(Debug)]
pub struct Request {
    /// Path expressions to resolve, e.g. `/home/*/.ssh/{id_rsa,id_ed25519}`.
    pub paths: Vec<String>,
    pub path_type: PathType,
    /// Action performed on every path that meets the conditions.
    pub action: Action,
    /// Conditions checked against the stat data, all must be met.
    pub metadata_conditions: Vec<MetadataCondition>,
    /// Conditions checked against the file contents, all must be met.
    pub content_conditions: Vec<ContentCondition>,
    /// If false, objects other than regular files, directories and symlinks
    /// (e.g. sockets or device files) are skipped.
    pub process_non_regular_files: bool,
    pub expansion: ExpansionOptions,
}

impl Request {

    /// Creates a request stat-ing the given paths without any conditions.
    pub fn new(paths: Vec<String>) -> Request {
        Request {
            paths,
            path_type: PathType::Os,
            action: Action::Stat(StatActionOptions::default()),
            metadata_conditions: vec![],
            content_conditions: vec![],
            process_non_regular_files: false,
            expansion: ExpansionOptions::default(),
        }
    }

    /// Checks the parts of the request that cannot be checked when they are
    /// constructed.
    pub fn validate(&self) -> Result<(), Error> {
        if self.path_type != PathType::Os {
            return Err(Error::UnsupportedPathType(self.path_type));
        }

        if self.paths.is_empty() {
            return Err(Error::NoPaths);
        }

        if let Action::Download(ref options) = self.action {
            ChunksConfig::new(options.chunk_size, 0)?;
        }

        Ok(())
    }
}

/// Kind of the paths in the request.
///
/// Only filesystem paths of the operating system are supported, the others
/// are recognized so that they can be rejected with a meaningful error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    Os,
    Registry,
    Tsk,
    Ntfs,
}

/// Options controlling how path expressions are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionOptions {
    /// Descend into symlinked directories in recursive components.
    pub follow_links: bool,
    /// Do not descend into directories on other devices in recursive
    /// components.
    pub xdev: bool,
    /// Depth of `**` components without an explicit depth.
    pub max_depth: u32,
    /// Match plain path components and globs case-sensitively.
    pub case_sensitive: bool,
}

impl Default for ExpansionOptions {

    fn default() -> ExpansionOptions {
        ExpansionOptions {
            follow_links: false,
            xdev: false,
            max_depth: DEFAULT_MAX_DEPTH,
            case_sensitive: cfg!(not(target_os = "windows")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Stat(StatActionOptions),
    Hash(HashActionOptions),
    Download(DownloadActionOptions),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatActionOptions {
    /// Stat the target of the symlink instead of the symlink itself.
    pub resolve_links: bool,
    pub collect_ext_attrs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashActionOptions {
    pub max_size: u64,
    pub oversized_file_policy: HashOversizedFilePolicy,
    pub collect_ext_attrs: bool,
}

impl Default for HashActionOptions {

    fn default() -> HashActionOptions {
        HashActionOptions {
            max_size: DEFAULT_MAX_SIZE,
            oversized_file_policy: HashOversizedFilePolicy::Skip,
            collect_ext_attrs: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadActionOptions {
    pub max_size: u64,
    pub oversized_file_policy: DownloadOversizedFilePolicy,
    pub chunk_size: u64,
    pub collect_ext_attrs: bool,
}

impl Default for DownloadActionOptions {

    fn default() -> DownloadActionOptions {
        DownloadActionOptions {
            max_size: DEFAULT_MAX_SIZE,
            oversized_file_policy: DownloadOversizedFilePolicy::Skip,
            chunk_size: DEFAULT_DOWNLOAD_CHUNK_SIZE,
            collect_ext_attrs: false,
        }
    }
}

/// What to do with files bigger than `max_size` in the hash action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashOversizedFilePolicy {
    Skip,
    HashTruncated,
}

/// What to do with files bigger than `max_size` in the download action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOversizedFilePolicy {
    Skip,
    DownloadTruncated,
    HashTruncated,
}

impl FromStr for HashOversizedFilePolicy {

    type Err = Error;

    fn from_str(name: &str) -> Result<HashOversizedFilePolicy, Error> {
        match name.to_ascii_lowercase().as_str() {
            "skip" => Ok(HashOversizedFilePolicy::Skip),
            "hash_truncated" => Ok(HashOversizedFilePolicy::HashTruncated),
            _ => Err(Error::UnknownOversizedFilePolicy(name.to_owned())),
        }
    }
}

impl FromStr for DownloadOversizedFilePolicy {

    type Err = Error;

    fn from_str(name: &str) -> Result<DownloadOversizedFilePolicy, Error> {
        use DownloadOversizedFilePolicy::*;

        match name.to_ascii_lowercase().as_str() {
            "skip" => Ok(Skip),
            "download_truncated" => Ok(DownloadTruncated),
            "hash_truncated" => Ok(HashTruncated),
            _ => Err(Error::UnknownOversizedFilePolicy(name.to_owned())),
        }
    }
}
