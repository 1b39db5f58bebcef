//! Stringly typed remote paths.
//!
//! A path that denotes a directory is *directory-indicated*: it ends with [`SEPARATOR`].
//! File paths never carry a trailing separator. Remote paths always use `/`,
//! whatever the local or remote operating system.

/// Remote path separator.
pub const SEPARATOR: char = '/';

/// Appends the separator if absent. Idempotent.
///
/// ```
/// use russh_remote_fs::path::ensure_directory_indicated;
///
/// assert_eq!(ensure_directory_indicated("/home/user"), "/home/user/");
/// assert_eq!(ensure_directory_indicated("/home/user/"), "/home/user/");
/// ```
pub fn ensure_directory_indicated(path: &str) -> String {
    if is_directory_indicated(path) {
        path.to_owned()
    } else {
        format!("{path}{SEPARATOR}")
    }
}

pub fn is_directory_indicated(path: &str) -> bool {
    path.ends_with(SEPARATOR)
}

/// Strips trailing separators. The root `/` is left intact.
pub fn ensure_file_indicated(path: &str) -> String {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() && !path.is_empty() {
        SEPARATOR.to_string()
    } else {
        trimmed.to_owned()
    }
}

/// Joins a name onto a base path with exactly one separator between them.
pub fn join(base: &str, name: &str) -> String {
    let name = name.trim_start_matches(SEPARATOR);
    if base.is_empty() {
        name.to_owned()
    } else if is_directory_indicated(base) {
        format!("{base}{name}")
    } else {
        format!("{base}{SEPARATOR}{name}")
    }
}

/// Returns the final component of the path, ignoring a trailing separator.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

/// Returns the directory-indicated parent, or `None` for the root and bare names.
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches(SEPARATOR);
    trimmed
        .rfind(SEPARATOR)
        .map(|index| &trimmed[..=index])
}

/// Hidden entries are the ones whose name starts with a dot.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Wraps the path in double quotes for use as a shell argument.
///
/// The characters a shell still interprets inside double quotes (`"`, `$`, `` ` `` and `\`)
/// are escaped with a backslash.
pub fn quote(path: &str) -> String {
    let mut quoted = String::with_capacity(path.len() + 2);
    quoted.push('"');
    for c in path.chars() {
        if matches!(c, '"' | '$' | '`' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
