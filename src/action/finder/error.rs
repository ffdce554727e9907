use crate::action::finder::request::PathType;
use crate::session;
use std::path::PathBuf;

/// An error type for failures that can occur during the file finder action.
///
/// All of these are fatal for the whole request: either the request itself
/// is malformed or the root of a requested path cannot be accessed.
#[derive(Debug)]
pub enum Error {
    /// Recursive component (`**`) is followed by something else than digits.
    InvalidRecursiveComponentInPath(PathBuf),
    /// More than one recursive component is used in the path.
    MultipleRecursiveComponentsInPath(PathBuf),
    /// Glob component cannot be translated into a regular expression.
    InvalidGlob { glob: String, error: regex::Error },
    /// Paths must be absolute.
    RelativePath(PathBuf),
    /// The root of the requested path cannot be stat-ed.
    RootInaccessible { path: PathBuf, error: std::io::Error },
    /// Chunk and overlap sizes do not satisfy `0 <= overlap < chunk`.
    InvalidChunkConfig { chunk_size: u64, overlap_size: u64 },
    /// Content match regex is not valid.
    InvalidRegex(regex::Error),
    /// Content match literal is empty.
    EmptyLiteral,
    /// Oversized file policy name is not recognized.
    UnknownOversizedFilePolicy(String),
    /// Only `PathType::Os` paths are supported.
    UnsupportedPathType(PathType),
    /// At least one path must be provided.
    NoPaths,
}

impl std::error::Error for Error {

    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match *self {
            InvalidGlob { ref error, .. } => Some(error),
            RootInaccessible { ref error, .. } => Some(error),
            InvalidRegex(ref error) => Some(error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {

    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Error::*;

        match *self {
            InvalidRecursiveComponentInPath(ref path) => write!(
                fmt,
                "path contains an invalid recursive component: {}",
                path.display()
            ),
            MultipleRecursiveComponentsInPath(ref path) => write!(
                fmt,
                "path contains more than 1 recursive component: {}",
                path.display()
            ),
            InvalidGlob { ref glob, ref error } => {
                write!(fmt, "invalid glob '{}': {}", glob, error)
            }
            RelativePath(ref path) => {
                write!(fmt, "path is not absolute: {}", path.display())
            }
            RootInaccessible { ref path, ref error } => write!(
                fmt,
                "cannot access the root of '{}': {}",
                path.display(),
                error
            ),
            InvalidChunkConfig { chunk_size, overlap_size } => write!(
                fmt,
                "invalid chunk configuration (chunk size: {}, overlap: {})",
                chunk_size, overlap_size
            ),
            InvalidRegex(ref error) => {
                write!(fmt, "invalid content regex: {}", error)
            }
            EmptyLiteral => write!(fmt, "content literal cannot be empty"),
            UnknownOversizedFilePolicy(ref name) => {
                write!(fmt, "unknown oversized file policy: {}", name)
            }
            UnsupportedPathType(ref path_type) => {
                write!(fmt, "unsupported path type: {:?}", path_type)
            }
            NoPaths => write!(fmt, "at least 1 path must be provided"),
        }
    }
}

impl From<Error> for session::Error {

    fn from(error: Error) -> session::Error {
        session::Error::action(error)
    }
}
