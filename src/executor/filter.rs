//! Method selection filtering
//!
//! Applies include/exclude glob patterns (`*`, `?`, `[...]`) to discovered
//! method names. Patterns are compiled to anchored regular expressions.

use regex::Regex;
use tracing::warn;

use crate::suite::MethodSelector;

/// Filter method names through a selector.
///
/// With a non-empty include list a method must match at least one include
/// pattern; exclusion is applied afterwards and removes any method matching
/// any exclude pattern. An empty include list selects all methods.
pub fn filter_methods<'a>(
    all_methods: impl IntoIterator<Item = &'a str>,
    selector: &MethodSelector,
) -> Vec<String> {
    let include: Vec<Regex> = compile_patterns(&selector.include);
    let exclude: Vec<Regex> = compile_patterns(&selector.exclude);

    all_methods
        .into_iter()
        .filter(|name| selector.include.is_empty() || matches_any(name, &include))
        .filter(|name| !matches_any(name, &exclude))
        .map(str::to_string)
        .collect()
}

fn matches_any(name: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|pattern| pattern.is_match(name))
}

fn compile_patterns(globs: &[String]) -> Vec<Regex> {
    globs.iter().filter_map(|glob| compile_glob(glob)).collect()
}

/// Translate one glob into an anchored regex. Unparseable patterns are
/// logged and treated as matching nothing.
fn compile_glob(glob: &str) -> Option<Regex> {
    let mut regex = String::with_capacity(glob.len() + 8);
    regex.push('^');

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '[' => {
                regex.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    regex.push('^');
                }
            }
            ']' => regex.push(']'),
            c if r"\.+()|^${}".contains(c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
    }

    regex.push('$');

    match Regex::new(&regex) {
        Ok(compiled) => Some(compiled),
        Err(err) => {
            warn!("Ignoring unparseable method pattern '{glob}': {err}");
            None
        }
    }
}
