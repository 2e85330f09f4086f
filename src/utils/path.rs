//! Path normalization utilities.
//!
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `id_to_path` - root-relative module id back to a file system path
//! - `resolve_relative` - relative import specifier against an importer id

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Map a `/`-rooted module id under `root`.
pub fn id_to_path(root: &Path, id: &str) -> PathBuf {
    root.join(id.trim_start_matches('/'))
}

/// Resolve `./` and `../` specifiers against the directory of `importer`.
///
/// Bare specifiers (packages) are left to the caller: `None`.
pub fn resolve_relative(importer: &str, specifier: &str) -> Option<String> {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return None;
    }
    let dir = Path::new(importer).parent().unwrap_or(Path::new("/"));
    let mut parts: Vec<String> = Vec::new();
    for component in dir.join(specifier).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop();
            }
            _ => {}
        }
    }
    Some(format!("/{}", parts.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_to_path() {
        assert_eq!(
            id_to_path(Path::new("/project"), "/src/app.tsx"),
            PathBuf::from("/project/src/app.tsx")
        );
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_relative("/src/app.tsx", "./theme").as_deref(),
            Some("/src/theme")
        );
        assert_eq!(
            resolve_relative("/src/pages/home.tsx", "../theme.ts").as_deref(),
            Some("/src/theme.ts")
        );
        assert_eq!(resolve_relative("/src/app.tsx", "react"), None);
    }

    #[test]
    fn test_normalize_relative_is_absolute() {
        assert!(normalize_path(Path::new("no/such/file")).is_absolute());
    }
}
