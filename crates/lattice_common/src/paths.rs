//! Path normalization helpers shared by the VFS and the metadata pipeline.
//!
//! All paths handled by the compiler core are normalized to forward-slash
//! form so that cache keys, module-map keys, and emitted metadata are
//! identical across platforms.

use std::path::{Component, Path, PathBuf};

/// Normalizes a path to forward-slash form with `.` and `..` components
/// resolved lexically.
///
/// Does not touch the filesystem: `..` at the root is dropped, symlinks
/// are not resolved. An empty input yields `"."`.
pub fn normalize_path(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut prefix = String::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => {
                prefix = p.as_os_str().to_string_lossy().replace('\\', "/");
            }
            Component::RootDir => prefix.push('/'),
            Component::CurDir => {}
            Component::ParentDir => match parts.last().map(String::as_str) {
                // Consecutive `..` accumulate; only real segments pop.
                Some("..") => parts.push("..".to_string()),
                Some(_) => {
                    parts.pop();
                }
                None => {
                    if prefix.is_empty() {
                        parts.push("..".to_string());
                    }
                }
            },
            Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
        }
    }

    let joined = parts.join("/");
    if prefix.is_empty() && joined.is_empty() {
        ".".to_string()
    } else {
        format!("{prefix}{joined}")
    }
}

/// Joins `base` and `rel` and normalizes the result.
pub fn join_normalized(base: &Path, rel: &Path) -> String {
    normalize_path(&base.join(rel))
}

/// Computes `to` relative to the directory `from`, normalized.
///
/// Both paths must be absolute. Falls back to the normalized `to` when the
/// two paths share no common root (e.g. different drive prefixes).
pub fn relative_path(from: &Path, to: &Path) -> String {
    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if common == 0 {
        return normalize_path(to);
    }

    let mut rel = PathBuf::new();
    for _ in common..from_parts.len() {
        rel.push("..");
    }
    for part in &to_parts[common..] {
        rel.push(part);
    }
    if rel.as_os_str().is_empty() {
        ".".to_string()
    } else {
        normalize_path(&rel)
    }
}
