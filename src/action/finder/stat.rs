use crate::fs::{Entry, StatCache};
use log::{debug, warn};
use std::ffi::OsString;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// Stat data of a processed path.
#[derive(Debug, Clone)]
pub struct StatEntry {
    pub path: PathBuf,
    pub metadata: Metadata,
    /// Target of the symlink, if the path is one.
    pub symlink: Option<PathBuf>,
    pub ext_attrs: Vec<ExtAttr>,
}

/// Extended attribute of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtAttr {
    pub name: OsString,
    pub value: Vec<u8>,
}

/// Collects the stat entry of the given path.
///
/// With `follow_symlink` the metadata of a symlink target is reported instead
/// of the symlink itself. Dangling symlinks fall back to the symlink metadata.
/// Failing to read the symlink target or the extended attributes is not an
/// error, that part of the entry is left empty.
pub fn stat(
    entry: &Entry,
    follow_symlink: bool,
    collect_ext_attrs: bool,
    cache: &mut StatCache,
) -> std::io::Result<StatEntry> {
    let is_symlink = entry.metadata.file_type().is_symlink();

    let metadata = if follow_symlink && is_symlink {
        match cache.stat(&entry.path, true) {
            Ok(metadata) => metadata,
            Err(ref err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("dangling symlink '{}'", entry.path.display());
                cache.stat(&entry.path, false)?
            }
            Err(err) => return Err(err),
        }
    } else {
        cache.stat(&entry.path, false)?
    };

    let symlink = if is_symlink {
        match std::fs::read_link(&entry.path) {
            Ok(target) => Some(target),
            Err(err) => {
                warn!("failed to read symlink '{}': {}", entry.path.display(), err);
                None
            }
        }
    } else {
        None
    };

    let ext_attrs = if collect_ext_attrs {
        ext_attrs(&entry.path)
    } else {
        vec![]
    };

    Ok(StatEntry {
        path: entry.path.clone(),
        metadata,
        symlink,
        ext_attrs,
    })
}

cfg_if::cfg_if! {
    if #[cfg(target_family = "unix")] {
        fn ext_attrs(path: &Path) -> Vec<ExtAttr> {
            let names = match xattr::list(path) {
                Ok(names) => names,
                Err(err) => {
                    warn!("failed to list extended attributes of '{}': {}",
                          path.display(), err);
                    return vec![];
                }
            };

            let mut attrs = vec![];
            for name in names {
                match xattr::get(path, &name) {
                    Ok(Some(value)) => attrs.push(ExtAttr { name, value }),
                    Ok(None) => (),
                    Err(err) => {
                        warn!("failed to read extended attribute {:?} of '{}': {}",
                              name, path.display(), err);
                    }
                }
            }

            attrs
        }
    } else {
        fn ext_attrs(_path: &Path) -> Vec<ExtAttr> {
            vec![]
        }
    }
}
