//! Slash-separated path helpers.
//!
//! Adapter paths are plain strings with `/` separators regardless of host
//! platform. These helpers are lexical only and never touch a backend.

use std::path::MAIN_SEPARATOR;

/// Shortest lexically equivalent form of `path`.
///
/// Collapses repeated separators, drops `.` elements and resolves `..`
/// against the preceding element. A leading `/` is preserved and `..` at the
/// root is dropped. An empty result becomes `"."`.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join path elements with `/` and clean the result.
///
/// Empty elements are ignored; if every element is empty the result is the
/// empty string.
pub fn join<S: AsRef<str>>(elems: &[S]) -> String {
    let non_empty: Vec<&str> = elems
        .iter()
        .map(AsRef::as_ref)
        .filter(|e| !e.is_empty())
        .collect();

    if non_empty.is_empty() {
        return String::new();
    }
    clean(&non_empty.join("/"))
}

/// All but the last element of `path`, cleaned.
///
/// `dir("a/b") == "a"`, `dir("file") == "."`, `dir("a/") == "a"`.
pub fn dir(path: &str) -> String {
    let head = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "",
    };
    clean(head)
}

/// Last element of `path`, ignoring trailing separators.
pub fn base(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { ".".into() } else { "/".into() };
    }
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Replace the host separator with `/`.
pub fn to_slash(path: &str) -> String {
    if MAIN_SEPARATOR == '/' {
        path.to_string()
    } else {
        path.replace(MAIN_SEPARATOR, "/")
    }
}

/// Display name for a handle: `name` in slash form with a literal `root`
/// prefix removed.
///
/// Only the exact prefix is stripped; a separator left behind is kept, so a
/// root of `/tmp/x` turns `/tmp/x/f` into `/f`.
pub fn strip_root(name: &str, root: &str) -> String {
    let name = to_slash(name);
    match name.strip_prefix(root) {
        Some(rest) => rest.to_string(),
        None => name,
    }
}
