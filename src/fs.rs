// Copyright 2020 Google LLC
//
// Use of this source code is governed by an MIT-style license that can be found
// in the LICENSE file or at https://opensource.org/licenses/MIT.

//! Filesystem utilities shared by the actions.

use log::warn;
use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// A filesystem object together with its (non-following) metadata.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: PathBuf,
    pub metadata: Metadata,
}

/// Returns an iterator over the children of the given directory.
///
/// Entries are stat-ed without following symlinks and come sorted by name,
/// which makes the listing order independent of the underlying filesystem.
/// Children that vanish between the listing and the stat call are skipped.
pub fn list_dir<P: AsRef<Path>>(path: P) -> std::io::Result<ListDir> {
    let mut paths = std::fs::read_dir(path)?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(error) => {
                warn!("directory iteration error: {}", error);
                None
            }
        })
        .collect::<Vec<_>>();
    paths.sort();

    Ok(ListDir {
        iter: paths.into_iter(),
    })
}

/// Iterator over directory children, see `list_dir`.
pub struct ListDir {
    iter: std::vec::IntoIter<PathBuf>,
}

impl std::iter::Iterator for ListDir {

    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        for path in &mut self.iter {
            let metadata = match std::fs::symlink_metadata(&path) {
                Ok(metadata) => metadata,
                Err(error) => {
                    warn!("failed to stat '{}': {}", path.display(), error);
                    continue
                },
            };

            return Some(Entry {
                path: path,
                metadata: metadata,
            });
        }

        None
    }
}

/// Stats the given path, following the final symlink if requested.
pub fn stat<P: AsRef<Path>>(path: P, follow_symlink: bool) -> std::io::Result<Metadata> {
    if follow_symlink {
        std::fs::metadata(path)
    } else {
        std::fs::symlink_metadata(path)
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_family = "unix")] {
        /// Returns the identifier of the device the object lives on.
        pub fn device(metadata: &Metadata) -> Option<u64> {
            use std::os::unix::fs::MetadataExt as _;
            Some(metadata.dev())
        }
    } else {
        /// Device identifiers are not exposed on this platform.
        pub fn device(_metadata: &Metadata) -> Option<u64> {
            None
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        /// Returns the inode flags of the file, as reported by `lsattr`.
        pub fn ext_flags<P: AsRef<Path>>(path: P) -> std::io::Result<u32> {
            use std::os::unix::io::AsRawFd as _;

            let file = std::fs::File::open(path)?;

            let mut flags = 0;
            // SAFETY: the descriptor is open for the whole call and `flags`
            // outlives it.
            let code = unsafe {
                ioctls::fs_ioc_getflags(file.as_raw_fd(), &mut flags)
            };
            if code < 0 {
                return Err(std::io::Error::last_os_error());
            }

            Ok(flags as u32)
        }
    } else {
        /// Inode flags are a Linux-only concept.
        pub fn ext_flags<P: AsRef<Path>>(_path: P) -> std::io::Result<u32> {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "extended flags are not supported on this platform",
            ))
        }
    }
}

/// Cache of stat results scoped to a single action invocation.
///
/// The cache is keyed by the path and by whether the final symlink was
/// followed. Each invocation owns its own instance.
#[derive(Debug, Default)]
pub struct StatCache {
    entries: HashMap<(PathBuf, bool), Metadata>,
}

impl StatCache {

    pub fn new() -> StatCache {
        StatCache::default()
    }

    /// Returns cached metadata for the path or stats it and remembers it.
    ///
    /// Failures are not cached.
    pub fn stat(&mut self, path: &Path, follow_symlink: bool) -> std::io::Result<Metadata> {
        let key = (path.to_path_buf(), follow_symlink);
        if let Some(metadata) = self.entries.get(&key) {
            return Ok(metadata.clone());
        }

        let metadata = stat(path, follow_symlink)?;
        self.entries.insert(key, metadata.clone());
        Ok(metadata)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets all cached results.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
