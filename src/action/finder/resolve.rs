use crate::action::finder::error::Error;
use crate::action::finder::path::{normalize, root};
use crate::action::finder::request::ExpansionOptions;
use crate::action::finder::task::{build_task, PathComponent, Task, TaskBuilder};
use crate::fs::{device, list_dir, Entry, ListDir};
use log::{debug, warn};
use regex::Regex;
use std::collections::VecDeque;
use std::path::Path;

/// Resolves the path expression into the entries it matches.
///
/// Only the path syntax and the root of the path are checked here, so the
/// errors returned are fatal for the whole expression. Problems found while
/// resolving (unreadable directories, entries vanishing) only prune the
/// affected branch.
pub fn resolve_path(path: &Path, options: &ExpansionOptions) -> Result<ResolvePath, Error> {
    if !path.is_absolute() {
        return Err(Error::RelativePath(path.to_path_buf()));
    }

    if let Err(error) = std::fs::metadata(root(path)) {
        return Err(Error::RootInaccessible {
            path: path.to_path_buf(),
            error,
        });
    }

    let task = build_task(path, options)?;
    Ok(ResolvePath {
        outputs: VecDeque::new(),
        tasks: vec![task],
        options: *options,
    })
}

/// Implements `Iterator` for resolving all entries in a path, which can
/// contain globs (e.g. '123*') or recursive scans (e.g. '**').
///
/// Entries are produced lazily: a single directory is listed per step.
pub struct ResolvePath {
    /// Results buffered to be returned.
    outputs: VecDeque<Entry>,
    /// Remaining tasks to be executed, the next one on top.
    tasks: Vec<Task>,
    options: ExpansionOptions,
}

impl ResolvePath {

    /// Returns the next entry, calling `heartbeat` before every executed task
    /// (so at least once per visited directory).
    ///
    /// A heartbeat error is returned as is and ends the iteration.
    pub fn next_with<E, H>(&mut self, heartbeat: &mut H) -> Option<Result<Entry, E>>
    where
        H: FnMut() -> Result<(), E>,
    {
        loop {
            if let Some(entry) = self.outputs.pop_front() {
                return Some(Ok(entry));
            }

            let task = self.tasks.pop()?;
            if let Err(error) = heartbeat() {
                self.tasks.clear();
                return Some(Err(error));
            }

            let task_results = resolve_task(task, &self.options);
            self.tasks.extend(task_results.new_tasks.into_iter().rev());
            self.outputs
                .extend(task_results.outputs.into_iter().map(normalize_path));
        }
    }
}

impl std::iter::Iterator for ResolvePath {

    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let mut heartbeat = || Ok::<(), std::convert::Infallible>(());
        match self.next_with(&mut heartbeat)? {
            Ok(entry) => Some(entry),
            Err(never) => match never {},
        }
    }
}

fn normalize_path(e: Entry) -> Entry {
    Entry {
        metadata: e.metadata,
        path: normalize(&e.path),
    }
}

#[derive(Debug, Default)]
struct TaskResults {
    new_tasks: Vec<Task>,
    outputs: Vec<Entry>,
}

/// Routes resolving task to one of the subfunctions.
fn resolve_task(task: Task, options: &ExpansionOptions) -> TaskResults {
    match &task.current_component {
        PathComponent::Constant(path) => resolve_constant_task(path),
        PathComponent::Glob(regex) => resolve_glob_task(
            regex,
            &task.path_prefix,
            &task.remaining_components,
        ),
        PathComponent::RecursiveScan { max_depth, device } => {
            resolve_recursive_scan_task(
                *max_depth,
                *device,
                &task.path_prefix,
                &task.remaining_components,
                options,
            )
        }
    }
}

/// Returns iterator over all entries in a given directory.
///
/// Paths that are not directories have no entries. Directories that cannot be
/// listed are logged and treated as empty.
fn list_path(path: &Path) -> impl Iterator<Item = Entry> {
    let entries: Option<ListDir> = if !path.is_dir() {
        None
    } else {
        match list_dir(path) {
            Ok(entries) => Some(entries),
            Err(err) => {
                warn!("listing directory '{}' failed: {}", path.display(), err);
                None
            }
        }
    };

    entries.into_iter().flatten()
}

/// Returns true if last component `path` matches `regex`.
/// E.g. '/home/abc/111' matches '[1]*' regex.
fn last_component_matches(path: &Path, regex: &Regex) -> bool {
    let last_component = match path.file_name() {
        Some(v) => v,
        None => {
            warn!(
                "failed to fetch last component from path: {}",
                path.display()
            );
            return false;
        }
    };

    let last_component = match last_component.to_str() {
        Some(v) => v,
        None => {
            debug!(
                "last component of the path is not valid unicode: {}",
                path.display()
            );
            return false;
        }
    };

    regex.is_match(last_component)
}

/// Resolves glob expression (e.g. '123*') in path.
fn resolve_glob_task(
    glob: &Regex,
    path_prefix: &Path,
    remaining_components: &[PathComponent],
) -> TaskResults {
    let mut results = TaskResults::default();
    for e in list_path(path_prefix) {
        if !last_component_matches(&e.path, glob) {
            continue;
        }

        if remaining_components.is_empty() {
            results.outputs.push(e);
        } else {
            let new_task = TaskBuilder::new()
                .add_constant(&e.path)
                .add_components(remaining_components)
                .build();
            results.new_tasks.push(new_task);
        }
    }

    results
}

/// Checks if Entry is a directory using `metadata` if `follow_links` is set
/// or `symlink_metadata` otherwise.
fn is_dir(e: &Entry, follow_links: bool) -> bool {
    if e.metadata.is_dir() {
        return true;
    }

    if follow_links && e.metadata.file_type().is_symlink() {
        match std::fs::metadata(&e.path) {
            Ok(metadata) => {
                return metadata.is_dir();
            }
            Err(err) => {
                debug!("failed to stat '{}': {}", e.path.display(), err);
                return false;
            }
        }
    }

    false
}

/// Checks whether the entry lives on `expected` device. Always true if no
/// device restriction is given.
fn is_on_device(e: &Entry, expected: Option<u64>, follow_links: bool) -> bool {
    let expected = match expected {
        Some(expected) => expected,
        None => return true,
    };

    let actual = if follow_links && e.metadata.file_type().is_symlink() {
        std::fs::metadata(&e.path).ok().and_then(|metadata| device(&metadata))
    } else {
        device(&e.metadata)
    };

    actual == Some(expected)
}

/// Resolves recursive expression (e.g. '**') in path.
///
/// If other components follow, they are resolved in the prefix itself and in
/// every directory up to `max_depth` levels below it. If the expression ends
/// with the recursive component, all entries up to `max_depth` levels below
/// the prefix are returned (the prefix itself is not).
fn resolve_recursive_scan_task(
    max_depth: u32,
    device: Option<u64>,
    path_prefix: &Path,
    remaining_components: &[PathComponent],
    options: &ExpansionOptions,
) -> TaskResults {
    let mut results = TaskResults::default();

    if !remaining_components.is_empty() {
        let current_dir_scan = TaskBuilder::new()
            .add_constant(path_prefix)
            .add_components(remaining_components)
            .build();
        results.new_tasks.push(current_dir_scan);
    }

    if max_depth == 0 {
        return results;
    }

    let device = if options.xdev {
        device.or_else(|| prefix_device(path_prefix))
    } else {
        None
    };

    for e in list_path(path_prefix) {
        if remaining_components.is_empty() {
            results.outputs.push(e.clone());
        }

        if !is_dir(&e, options.follow_links) {
            continue;
        }

        if !is_on_device(&e, device, options.follow_links) {
            debug!("not crossing device boundary at '{}'", e.path.display());
            continue;
        }

        if !remaining_components.is_empty() || max_depth > 1 {
            let recursive_scan = TaskBuilder::new()
                .add_constant(&e.path)
                .add_recursive_scan(max_depth - 1, device)
                .add_components(remaining_components)
                .build();
            results.new_tasks.push(recursive_scan);
        }
    }

    results
}

fn prefix_device(path: &Path) -> Option<u64> {
    match std::fs::metadata(path) {
        Ok(metadata) => device(&metadata),
        Err(err) => {
            debug!("failed to stat '{}': {}", path.display(), err);
            None
        }
    }
}

/// Resolves constant expression (just a plain name) in path.
fn resolve_constant_task(path: &Path) -> TaskResults {
    let mut ret = TaskResults::default();

    let metadata = match std::fs::symlink_metadata(path) {
        Ok(v) => v,
        Err(ref err) if err.kind() == std::io::ErrorKind::NotFound => {
            return ret;
        }
        Err(err) => {
            warn!("failed to stat '{}': {}", path.display(), err);
            return ret;
        }
    };

    ret.outputs.push(Entry {
        path: path.to_owned(),
        metadata,
    });

    ret
}
