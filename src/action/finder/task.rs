use crate::action::finder::error::Error;
use crate::action::finder::glob::{glob_to_regex, literal_to_regex};
use crate::action::finder::request::ExpansionOptions;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

/// Part of the path. Paths are split to list of `PathComponent` to make
/// the processing simpler.
#[derive(Debug, Clone)]
pub enum PathComponent {
    /// e.g. `/home/user/`
    Constant(PathBuf),
    /// e.g. `sp*[wek]??`
    Glob(Regex),
    /// glob recursive component - `**` in path
    RecursiveScan {
        max_depth: u32,
        /// Device on which the scan started, filled in once the first
        /// directory of the scan is visited (only when crossing devices is
        /// forbidden).
        device: Option<u64>,
    },
}

/// Internal path representation used for resolving paths.
/// E.g. `/home/**1/*/test` path would be stored as:
/// path_prefix: `/home`,
/// current_component: `**1`,
/// remaining_components: [`*`, `test`].
#[derive(Debug)]
pub struct Task {
    /// Path prefix in which scope the task must be executed.
    /// Given example task: `/a/b/**4/c/d*` this part would be `/a/b`.
    /// Given example task: `/a/b/c` this part would be empty.
    pub path_prefix: PathBuf,

    /// Current `PathComponent` to be executed.
    /// Given example task: `/a/b/**4/c/d*` this part would be `**4`.
    /// Given example task: `/a/b/c` this part would be `/a/b/c`.
    pub current_component: PathComponent,

    /// Remaining path components to be executed in following tasks.
    /// Given example task: `/a/b/**4/c/d*` this part would be `c/d*`.
    /// Given example task: `/a/b/c` this part would be empty.
    pub remaining_components: Vec<PathComponent>,
}

pub struct TaskBuilder {
    components: Vec<PathComponent>,
}

impl TaskBuilder {

    pub fn new() -> TaskBuilder {
        TaskBuilder { components: vec![] }
    }

    pub fn add_constant(mut self, path: &Path) -> TaskBuilder {
        self.components
            .push(PathComponent::Constant(path.to_path_buf()));
        self
    }

    pub fn add_recursive_scan(mut self, max_depth: u32, device: Option<u64>) -> TaskBuilder {
        self.components
            .push(PathComponent::RecursiveScan { max_depth, device });
        self
    }

    pub fn add_components(mut self, components: &[PathComponent]) -> TaskBuilder {
        self.components.extend_from_slice(components);
        self
    }

    pub fn build(self) -> Task {
        build_task_from_components(self.components)
    }
}

fn build_task_from_components(components: Vec<PathComponent>) -> Task {
    let mut folded_components = fold_constant_components(components).into_iter();

    // Scan components until an non-const component or the end of path.
    let mut path_prefix = PathBuf::default();
    while let Some(component) = folded_components.next() {
        match component {
            PathComponent::Constant(path) => {
                path_prefix = path;
            }
            current_component => {
                return Task {
                    path_prefix,
                    current_component,
                    remaining_components: folded_components.collect(),
                };
            }
        }
    }

    Task {
        path_prefix: PathBuf::default(),
        current_component: PathComponent::Constant(path_prefix),
        remaining_components: vec![],
    }
}

/// Parses the path expression into the first task to execute.
pub fn build_task(path: &Path, options: &ExpansionOptions) -> Result<Task, Error> {
    let components = path
        .components()
        .map(|component| get_path_component(&component, options))
        .collect::<Result<Vec<PathComponent>, Error>>()?;

    let recursive_count = components
        .iter()
        .filter(|component| matches!(component, PathComponent::RecursiveScan { .. }))
        .count();
    if recursive_count > 1 {
        return Err(Error::MultipleRecursiveComponentsInPath(
            path.to_path_buf(),
        ));
    }

    Ok(build_task_from_components(components))
}

fn get_path_component(
    component: &Component,
    options: &ExpansionOptions,
) -> Result<PathComponent, Error> {
    let s = match component {
        Component::Normal(path) => match path.to_str() {
            Some(s) => s,
            None => {
                return Ok(PathComponent::Constant(PathBuf::from(component.as_os_str())))
            }
        },
        _ => return Ok(PathComponent::Constant(PathBuf::from(component.as_os_str()))),
    };

    if let Some(scan) = get_recursive_scan_component(s, options.max_depth)? {
        return Ok(scan);
    }

    if is_glob(s) {
        return Ok(PathComponent::Glob(glob_to_regex(s, options.case_sensitive)?));
    }

    if !options.case_sensitive {
        return Ok(PathComponent::Glob(literal_to_regex(s, false)?));
    }

    Ok(PathComponent::Constant(PathBuf::from(s)))
}

fn get_recursive_scan_component(
    s: &str,
    default_depth: u32,
) -> Result<Option<PathComponent>, Error> {
    lazy_static! {
        static ref RECURSIVE_SCAN_MATCHER: Regex =
            Regex::new(r"\*\*(?P<max_depth>\d*)(?P<remaining>.*)").unwrap();
    }

    let captures = match RECURSIVE_SCAN_MATCHER.captures(s) {
        Some(captures) => captures,
        None => return Ok(None),
    };

    // `**` has to make up the whole component, `a**` or `**b` are invalid.
    let prefix_len = captures.get(0).map_or(0, |found| found.start());
    if prefix_len > 0 || !captures["remaining"].is_empty() {
        return Err(Error::InvalidRecursiveComponentInPath(PathBuf::from(s)));
    }

    let max_depth = match &captures["max_depth"] {
        "" => default_depth,
        val => match val.parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                return Err(Error::InvalidRecursiveComponentInPath(
                    PathBuf::from(s),
                ));
            }
        },
    };

    Ok(Some(PathComponent::RecursiveScan {
        max_depth,
        device: None,
    }))
}

fn is_glob(s: &str) -> bool {
    lazy_static! {
        static ref GLOB_MATCHER: Regex = Regex::new(r"\*|\?|\[.+\]").unwrap();
    }

    GLOB_MATCHER.is_match(s)
}

/// Joins all consecutive constant components into one.
pub fn fold_constant_components(components: Vec<PathComponent>) -> Vec<PathComponent> {
    let mut ret: Vec<PathComponent> = vec![];
    for c in components {
        if let PathComponent::Constant(ref path) = c {
            if let Some(PathComponent::Constant(prev)) = ret.last_mut() {
                prev.push(path);
                continue;
            }
        }
        ret.push(c);
    }

    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(path: &Path) -> Result<Task, Error> {
        let options = ExpansionOptions {
            case_sensitive: true,
            ..Default::default()
        };
        build_task(path, &options)
    }

    #[test]
    fn test_basic_parse_path() {
        let task = build(
            &PathBuf::new()
                .join(Component::RootDir)
                .join("home")
                .join("user")
                .join("**5")
                .join("??[!qwe]"),
        )
        .unwrap();

        assert_eq!(task.path_prefix, PathBuf::from("/home/user"));
        assert!(matches!(
            &task.current_component,
            PathComponent::RecursiveScan { max_depth: 5, device: None }
        ));
        assert_eq!(task.remaining_components.len(), 1);
        assert!(
            matches!(&task.remaining_components[0], PathComponent::Glob(regex) if regex.as_str() == "^..[^qwe]$")
        );
    }

    #[test]
    fn test_default_recursive_scan_default_depth() {
        let task = build(&PathBuf::new().join(Component::RootDir).join("**"))
            .unwrap();
        assert_eq!(task.path_prefix, PathBuf::from("/"));
        assert!(matches!(
            &task.current_component,
            PathComponent::RecursiveScan { max_depth: 3, .. }
        ));
        assert_eq!(task.remaining_components.len(), 0);
    }

    #[test]
    fn test_recursive_scan_custom_default_depth() {
        let options = ExpansionOptions {
            max_depth: 7,
            ..Default::default()
        };
        let task = build_task(Path::new("/foo/**"), &options).unwrap();
        assert!(matches!(
            &task.current_component,
            PathComponent::RecursiveScan { max_depth: 7, .. }
        ));
    }

    #[test]
    fn test_recursive_scan_with_additional_letters() {
        let task = build(&PathBuf::new().join(Component::RootDir).join("**5asd"));
        assert!(
            matches!(task.unwrap_err(),
            Error::InvalidRecursiveComponentInPath(path)
            if path == PathBuf::from("**5asd"))
        );
    }

    #[test]
    fn test_recursive_scan_with_leading_letters() {
        let task = build(Path::new("/foo/a**"));
        assert!(matches!(
            task.unwrap_err(),
            Error::InvalidRecursiveComponentInPath(_)
        ));
    }

    #[test]
    fn test_path_with_multiple_recursive_scans() {
        let path = PathBuf::new().join(Component::RootDir).join("**/asd/**");
        let task = build(&path);
        assert!(
            matches!(task.unwrap_err(),
             Error::MultipleRecursiveComponentsInPath(err_path)
             if err_path == path)
        );
    }

    #[test]
    fn test_constant_path() {
        let task = build(Path::new("/foo/bar/baz")).unwrap();
        assert_eq!(task.path_prefix, PathBuf::default());
        assert!(matches!(
            &task.current_component,
            PathComponent::Constant(path) if path == Path::new("/foo/bar/baz")
        ));
        assert!(task.remaining_components.is_empty());
    }

    #[test]
    fn test_case_insensitive_constant_becomes_glob() {
        let options = ExpansionOptions {
            case_sensitive: false,
            ..Default::default()
        };
        let task = build_task(Path::new("/Foo/bar"), &options).unwrap();

        assert_eq!(task.path_prefix, PathBuf::from("/"));
        assert!(matches!(
            &task.current_component,
            PathComponent::Glob(regex) if regex.is_match("foo")
        ));
        assert_eq!(task.remaining_components.len(), 1);
    }

    #[test]
    fn test_task_builder_folds_constants() {
        let task = TaskBuilder::new()
            .add_constant(Path::new("/foo"))
            .add_constant(Path::new("bar"))
            .add_recursive_scan(2, Some(42))
            .add_constant(Path::new("baz"))
            .build();

        assert_eq!(task.path_prefix, PathBuf::from("/foo/bar"));
        assert!(matches!(
            &task.current_component,
            PathComponent::RecursiveScan { max_depth: 2, device: Some(42) }
        ));
        assert_eq!(task.remaining_components.len(), 1);
    }
}
