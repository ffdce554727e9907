use lazy_static::lazy_static;
use regex::Regex;

/// Expands alternatives in the path.
///
/// A group is a comma-separated list of alternatives in curly braces, e.g.
/// `/home/{alice,bob}/{.bashrc,.zshrc}` expands to 4 paths. Groups cannot be
/// nested and need at least one comma, so `{foo}` is kept as is.
pub fn expand_groups(path: &str) -> Vec<String> {
    lazy_static! {
        static ref GROUP_MATCHER: Regex = Regex::new(r"\{([^}]+,[^}]+)\}").unwrap();
    }

    let mut parts: Vec<Vec<&str>> = vec![];
    let mut offset = 0;
    for captures in GROUP_MATCHER.captures_iter(path) {
        let (group, alternatives) = match (captures.get(0), captures.get(1)) {
            (Some(group), Some(alternatives)) => (group, alternatives),
            _ => continue,
        };

        parts.push(vec![&path[offset..group.start()]]);
        parts.push(alternatives.as_str().split(',').collect());
        offset = group.end();
    }
    parts.push(vec![&path[offset..]]);

    let mut expanded = vec![String::new()];
    for alternatives in parts {
        expanded = expanded
            .iter()
            .flat_map(|prefix| {
                alternatives
                    .iter()
                    .map(move |alternative| format!("{}{}", prefix, alternative))
            })
            .collect();
    }

    expanded
}
