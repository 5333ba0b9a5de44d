use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Object store key separator
pub const OBJECT_SEPARATOR: char = '/';

/// Which storage backend a path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Object,
}

impl BackendKind {
    /// Canonical separator for paths of this kind
    pub fn separator(self) -> char {
        match self {
            BackendKind::Local => MAIN_SEPARATOR,
            BackendKind::Object => OBJECT_SEPARATOR,
        }
    }
}

/// Canonicalize a raw path for the given backend. Pure, no I/O.
pub fn normalize_path(raw: &str, kind: BackendKind) -> String {
    match kind {
        BackendKind::Object => normalize_object_key(raw),
        BackendKind::Local => normalize_local_path(Path::new(raw))
            .to_string_lossy()
            .into_owned(),
    }
}

/// Forward slashes only, at most one leading slash stripped.
/// A trailing slash is kept since keys double as listing prefixes.
///
/// Only the platform separator is translated. A backslash is an ordinary
/// key character on unix.
pub fn normalize_object_key(raw: &str) -> String {
    let key = raw.replace(MAIN_SEPARATOR, "/");
    match key.strip_prefix(OBJECT_SEPARATOR) {
        Some(stripped) => stripped.to_string(),
        None => key,
    }
}

/// Lexically clean a local path, component by component.
///
/// Works on `OsStr` segments, so names that are not valid UTF-8 survive.
pub fn normalize_local_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    let mut normal_segments = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => cleaned.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if normal_segments > 0 {
                    cleaned.pop();
                    normal_segments -= 1;
                } else if !cleaned.has_root() {
                    cleaned.push("..");
                }
            }
            Component::Normal(segment) => {
                cleaned.push(segment);
                normal_segments += 1;
            }
        }
    }

    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

/// Join an object key prefix with the remainder of another key.
///
/// When `boundary` is set the two parts are joined with exactly one `/`,
/// otherwise they are concatenated as-is.
pub(crate) fn join_object_key(prefix: &str, remainder: &str, boundary: bool) -> String {
    if remainder.is_empty() {
        return prefix.to_string();
    }

    if !boundary || prefix.is_empty() {
        return format!("{}{}", prefix, remainder);
    }

    format!(
        "{}{}{}",
        prefix.trim_end_matches(OBJECT_SEPARATOR),
        OBJECT_SEPARATOR,
        remainder.trim_start_matches(OBJECT_SEPARATOR)
    )
}
