// Copyright 2020 Google LLC
//
// Use of this source code is governed by an MIT-style license that can be found
// in the LICENSE file or at https://opensource.org/licenses/MIT.

use std::path::PathBuf;
use std::time::SystemTime;

use rrg_finder::action::finder::condition::{
    ContentCondition, ContentsMatchOptions, MatchMode, MetadataCondition,
    DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP_SIZE,
};
use rrg_finder::action::finder::error::Error;
use rrg_finder::action::finder::request::*;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "rrg-finder", about = "Finds files matching path expressions.")]
pub struct Opts {
    #[structopt(name = "PATH", required = true,
                help = "Absolute path expressions (globs, `**` and `{a,b}` groups)")]
    pub paths: Vec<String>,

    #[structopt(long = "verbosity", name = "LEVEL", default_value = "info",
                help = "Verbosity of logs")]
    pub verbosity: log::LevelFilter,

    #[structopt(long = "log-to-file", name = "FILE",
                help = "Path to the file where logs are written to")]
    pub log_to_file: Option<PathBuf>,

    #[structopt(long = "action", name = "ACTION", default_value = "stat",
                parse(try_from_str = parse_action_kind),
                help = "Action to perform: stat, hash or download")]
    pub action: ActionKind,

    #[structopt(long = "resolve-links",
                help = "Report the stat of symlink targets")]
    pub resolve_links: bool,

    #[structopt(long = "collect-ext-attrs",
                help = "Report extended attributes")]
    pub collect_ext_attrs: bool,

    #[structopt(long = "max-size", name = "BYTES", default_value = "524288000",
                help = "Size above which files are not hashed or downloaded")]
    pub max_size: u64,

    #[structopt(long = "oversized-file-policy", name = "POLICY",
                help = "What to do with oversized files: skip, hash_truncated \
                        or download_truncated")]
    pub oversized_file_policy: Option<String>,

    #[structopt(long = "chunk-size", name = "CHUNK_BYTES", default_value = "524288",
                help = "Size of downloaded chunks")]
    pub chunk_size: u64,

    #[structopt(long = "download-dir", name = "DIR",
                help = "Directory where downloaded chunks are stored")]
    pub download_dir: Option<PathBuf>,

    #[structopt(long = "follow-links",
                help = "Descend into symlinked directories")]
    pub follow_links: bool,

    #[structopt(long = "xdev",
                help = "Do not descend into directories on other devices")]
    pub xdev: bool,

    #[structopt(long = "max-depth", name = "DEPTH", default_value = "3",
                help = "Depth of `**` components without explicit depth")]
    pub max_depth: u32,

    #[structopt(long = "case-insensitive",
                help = "Match path components case-insensitively")]
    pub case_insensitive: bool,

    #[structopt(long = "process-non-regular-files",
                help = "Report sockets, devices and other special files")]
    pub process_non_regular_files: bool,

    #[structopt(long = "min-mtime", name = "MIN_MTIME",
                parse(try_from_str = humantime::parse_rfc3339_weak),
                help = "Minimum modification time (RFC 3339)")]
    pub min_mtime: Option<SystemTime>,

    #[structopt(long = "max-mtime", name = "MAX_MTIME",
                parse(try_from_str = humantime::parse_rfc3339_weak),
                help = "Maximum modification time (RFC 3339)")]
    pub max_mtime: Option<SystemTime>,

    #[structopt(long = "min-atime", name = "MIN_ATIME",
                parse(try_from_str = humantime::parse_rfc3339_weak),
                help = "Minimum access time (RFC 3339)")]
    pub min_atime: Option<SystemTime>,

    #[structopt(long = "max-atime", name = "MAX_ATIME",
                parse(try_from_str = humantime::parse_rfc3339_weak),
                help = "Maximum access time (RFC 3339)")]
    pub max_atime: Option<SystemTime>,

    #[structopt(long = "min-ctime", name = "MIN_CTIME",
                parse(try_from_str = humantime::parse_rfc3339_weak),
                help = "Minimum inode change time (RFC 3339)")]
    pub min_ctime: Option<SystemTime>,

    #[structopt(long = "max-ctime", name = "MAX_CTIME",
                parse(try_from_str = humantime::parse_rfc3339_weak),
                help = "Maximum inode change time (RFC 3339)")]
    pub max_ctime: Option<SystemTime>,

    #[structopt(long = "min-file-size", name = "MIN_BYTES",
                help = "Minimum file size")]
    pub min_file_size: Option<u64>,

    #[structopt(long = "max-file-size", name = "MAX_BYTES",
                help = "Maximum file size")]
    pub max_file_size: Option<u64>,

    #[structopt(long = "ext", name = "EXTENSION", number_of_values = 1,
                help = "Allowed file extension (can be repeated)")]
    pub extensions: Vec<String>,

    #[structopt(long = "ext-flags-set", name = "SET_FLAGS",
                help = "Linux inode flags that must be set (decimal bitmask)")]
    pub ext_flags_set: Option<u32>,

    #[structopt(long = "ext-flags-unset", name = "UNSET_FLAGS",
                help = "Linux inode flags that must be unset (decimal bitmask)")]
    pub ext_flags_unset: Option<u32>,

    #[structopt(long = "literal", name = "LITERAL", number_of_values = 1,
                help = "Literal the contents must contain (can be repeated)")]
    pub literals: Vec<String>,

    #[structopt(long = "regex", name = "REGEX", number_of_values = 1,
                help = "Regex the contents must match (can be repeated)")]
    pub regexes: Vec<String>,

    #[structopt(long = "first-hit",
                help = "Report only the first match of every content condition")]
    pub first_hit: bool,

    #[structopt(long = "start-offset", name = "OFFSET", default_value = "0",
                help = "Offset at which content scanning starts")]
    pub start_offset: u64,

    #[structopt(long = "length", name = "LENGTH",
                help = "Number of bytes scanned by content conditions")]
    pub length: Option<u64>,

    #[structopt(long = "bytes-before", name = "BEFORE", default_value = "0",
                help = "Context reported before every match")]
    pub bytes_before: u64,

    #[structopt(long = "bytes-after", name = "AFTER", default_value = "0",
                help = "Context reported after every match")]
    pub bytes_after: u64,

    #[structopt(long = "scan-chunk-size", name = "SCAN_BYTES",
                help = "Size of chunks scanned by content conditions")]
    pub scan_chunk_size: Option<u64>,

    #[structopt(long = "scan-overlap-size", name = "OVERLAP_BYTES",
                help = "Size of the overlap between scanned chunks")]
    pub scan_overlap_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Stat,
    Hash,
    Download,
}

fn parse_action_kind(name: &str) -> Result<ActionKind, String> {
    match name.to_ascii_lowercase().as_str() {
        "stat" => Ok(ActionKind::Stat),
        "hash" => Ok(ActionKind::Hash),
        "download" => Ok(ActionKind::Download),
        _ => Err(format!("unknown action: {}", name)),
    }
}

impl Opts {

    /// Builds the file finder request described by the options.
    pub fn request(&self) -> Result<Request, Error> {
        let mut request = Request::new(self.paths.clone());
        request.action = self.action()?;
        request.metadata_conditions = self.metadata_conditions();
        request.content_conditions = self.content_conditions()?;
        request.process_non_regular_files = self.process_non_regular_files;
        request.expansion = ExpansionOptions {
            follow_links: self.follow_links,
            xdev: self.xdev,
            max_depth: self.max_depth,
            case_sensitive: !self.case_insensitive,
        };

        Ok(request)
    }

    fn action(&self) -> Result<Action, Error> {
        let action = match self.action {
            ActionKind::Stat => Action::Stat(StatActionOptions {
                resolve_links: self.resolve_links,
                collect_ext_attrs: self.collect_ext_attrs,
            }),
            ActionKind::Hash => Action::Hash(HashActionOptions {
                max_size: self.max_size,
                oversized_file_policy: match self.oversized_file_policy {
                    Some(ref policy) => policy.parse()?,
                    None => HashOversizedFilePolicy::Skip,
                },
                collect_ext_attrs: self.collect_ext_attrs,
            }),
            ActionKind::Download => Action::Download(DownloadActionOptions {
                max_size: self.max_size,
                oversized_file_policy: match self.oversized_file_policy {
                    Some(ref policy) => policy.parse()?,
                    None => DownloadOversizedFilePolicy::Skip,
                },
                chunk_size: self.chunk_size,
                collect_ext_attrs: self.collect_ext_attrs,
            }),
        };

        Ok(action)
    }

    fn metadata_conditions(&self) -> Vec<MetadataCondition> {
        use MetadataCondition::*;

        let mut conditions = vec![];
        conditions.extend(self.min_mtime.map(MinModificationTime));
        conditions.extend(self.max_mtime.map(MaxModificationTime));
        conditions.extend(self.min_atime.map(MinAccessTime));
        conditions.extend(self.max_atime.map(MaxAccessTime));
        conditions.extend(self.min_ctime.map(MinInodeChangeTime));
        conditions.extend(self.max_ctime.map(MaxInodeChangeTime));
        conditions.extend(self.min_file_size.map(MinSize));
        conditions.extend(self.max_file_size.map(MaxSize));
        if !self.extensions.is_empty() {
            conditions.push(Extensions(self.extensions.clone()));
        }
        conditions.extend(self.ext_flags_set.map(ExtFlagsLinuxBitsSet));
        conditions.extend(self.ext_flags_unset.map(ExtFlagsLinuxBitsUnset));

        conditions
    }

    fn content_conditions(&self) -> Result<Vec<ContentCondition>, Error> {
        let options = ContentsMatchOptions {
            mode: if self.first_hit {
                MatchMode::FirstHit
            } else {
                MatchMode::AllHits
            },
            start_offset: self.start_offset,
            length: self.length.unwrap_or(u64::MAX),
            bytes_before: self.bytes_before,
            bytes_after: self.bytes_after,
            chunk_size: self.scan_chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            overlap_size: self.scan_overlap_size.unwrap_or(DEFAULT_OVERLAP_SIZE),
        };

        let mut conditions = vec![];
        for literal in &self.literals {
            conditions.push(ContentCondition::literal(literal.as_bytes().to_vec(), options)?);
        }
        for regex in &self.regexes {
            conditions.push(ContentCondition::regex(regex, options)?);
        }

        Ok(conditions)
    }
}

/// Parses command-line arguments.
pub fn from_args() -> Opts {
    Opts::from_args()
}
