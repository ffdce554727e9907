//! Translation of shell-style globs into regular expressions.
//!
//! Supported syntax:
//! - `*` matches any sequence of characters,
//! - `?` matches any single character,
//! - `[abc]`, `[a-z]` match a single character from the set,
//! - `[!abc]` matches a single character not in the set.
//!
//! Brackets without a closing pair are matched literally.

use crate::action::finder::error::Error;
use regex::{Regex, RegexBuilder};

/// Converts a glob expression into an anchored regular expression.
pub fn glob_to_regex(glob: &str, case_sensitive: bool) -> Result<Regex, Error> {
    let chars = glob.chars().collect::<Vec<_>>();

    let mut pattern = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;

        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    pattern.push_str(&translate_class(&chars[i..end]));
                    i = end + 1;
                }
                None => pattern.push_str(r"\["),
            },
            c => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');

    build(&pattern, case_sensitive).map_err(|error| Error::InvalidGlob {
        glob: glob.to_owned(),
        error,
    })
}

/// Converts a plain name into an anchored regular expression matching only
/// that name.
pub fn literal_to_regex(literal: &str, case_sensitive: bool) -> Result<Regex, Error> {
    let pattern = format!("^{}$", regex::escape(literal));
    build(&pattern, case_sensitive).map_err(|error| Error::InvalidGlob {
        glob: literal.to_owned(),
        error,
    })
}

fn build(pattern: &str, case_sensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
}

/// Returns the index of `]` closing the class that starts at `start` (just
/// after the opening `[`). A `]` right after the opening bracket (or after
/// the negation mark) is a member of the class, not its end.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start;
    if j < chars.len() && chars[j] == '!' {
        j += 1;
    }
    if j < chars.len() && chars[j] == ']' {
        j += 1;
    }

    chars[j..]
        .iter()
        .position(|&c| c == ']')
        .map(|pos| j + pos)
}

fn translate_class(members: &[char]) -> String {
    let (negated, members) = match members.first() {
        Some('!') => (true, &members[1..]),
        _ => (false, members),
    };

    let mut class = String::from("[");
    if negated {
        class.push('^');
    }
    for (idx, &c) in members.iter().enumerate() {
        if c == '-' && idx > 0 && idx + 1 < members.len() {
            class.push('-');
        } else {
            class.push_str(&regex::escape(&c.to_string()));
        }
    }
    class.push(']');

    class
}
