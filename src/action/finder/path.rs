use std::path::{Component, Path, PathBuf};

/// Inlines `.` and `..` components in paths.
/// Returns unchanged input for non-absolute paths.
///
/// `..` never climbs above the root: `/a/../../b` becomes `/b`.
pub fn normalize(path: &Path) -> PathBuf {
    if !path.is_absolute() {
        return path.to_path_buf();
    }

    let mut components = vec![];
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

/// Returns the root of an absolute path, e.g. `/` or `C:\`.
///
/// For relative paths the result is empty.
pub fn root(path: &Path) -> PathBuf {
    path.components()
        .take_while(|component| match component {
            Component::Prefix(_) | Component::RootDir => true,
            _ => false,
        })
        .collect()
}
