//! Shared path manipulation utilities.
//!
//! Everything here except [`resolve_absolute_path`] is purely lexical: no
//! filesystem access, no symlink resolution.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a user-supplied path to an absolute, normalized path.
///
/// If `fs::canonicalize` succeeds (path exists), it is used to resolve symlinks
/// and normalize components.
///
/// If it fails (e.g. path does not exist), the path is made absolute relative
/// to CWD and `..`/`.` components are resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

/// Lexically normalize an absolute path: drop `.`, resolve `..`.
///
/// Returns `None` for relative paths. A `..` at the root stays at the root
/// (`/../etc` is `/etc`), matching how the kernel resolves it.
pub fn normalize_lexical(path: &Path) -> Option<PathBuf> {
    if !path.is_absolute() {
        return None;
    }
    Some(normalize_syntactic(path))
}

/// Component-wise test: `path` is `root` or lies beneath it.
///
/// Both arguments must already be normalized. `/a/bc` is not within `/a/b`.
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Component-wise test: `path` lies beneath `root` and is not `root` itself.
pub fn is_strictly_within(path: &Path, root: &Path) -> bool {
    path != root && path.starts_with(root)
}

/// Join a home-relative directory onto the home directory and normalize.
pub fn home_relative(home: &Path, relative: &Path) -> PathBuf {
    normalize_syntactic(&home.join(relative))
}

/// Whether a configured relative entry is usable under a home directory:
/// non-empty, relative, and free of `..` components.
pub fn is_clean_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && !path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_existing_path_canonically() {
        let cwd = env::current_dir().unwrap();
        let resolved = resolve_absolute_path(Path::new("."));
        assert_eq!(resolved, std::fs::canonicalize(&cwd).unwrap());
    }

    #[test]
    fn normalizes_nonexistent_path_syntactically() {
        let input = Path::new("/nonexistent/foo/../bar");
        assert!(std::fs::canonicalize(input).is_err());
        assert_eq!(resolve_absolute_path(input), Path::new("/nonexistent/bar"));
    }

    #[test]
    fn lexical_normalization_rejects_relative() {
        assert!(normalize_lexical(Path::new("Library/Caches")).is_none());
        assert!(normalize_lexical(Path::new("./x")).is_none());
        assert!(normalize_lexical(Path::new("")).is_none());
    }

    #[test]
    fn lexical_normalization_resolves_dots() {
        assert_eq!(
            normalize_lexical(Path::new("/Users/a/Library/Caches/../../Documents/./x")).unwrap(),
            Path::new("/Users/a/Documents/x")
        );
        assert_eq!(
            normalize_lexical(Path::new("/../etc")).unwrap(),
            Path::new("/etc")
        );
        assert_eq!(
            normalize_lexical(Path::new("/Applications/Foo.app/")).unwrap(),
            Path::new("/Applications/Foo.app")
        );
    }

    #[test]
    fn within_is_component_wise() {
        let root = Path::new("/usr/bin");
        assert!(is_within(Path::new("/usr/bin"), root));
        assert!(is_within(Path::new("/usr/bin/env"), root));
        assert!(!is_within(Path::new("/usr/binary"), root));
        assert!(!is_within(Path::new("/usr"), root));
    }

    #[test]
    fn strictly_within_excludes_root() {
        let root = Path::new("/Users/a/Library/Caches");
        assert!(!is_strictly_within(root, root));
        assert!(is_strictly_within(
            Path::new("/Users/a/Library/Caches/com.x"),
            root
        ));
    }

    #[test]
    fn clean_relative_entries() {
        assert!(is_clean_relative(Path::new("Library/Caches")));
        assert!(is_clean_relative(Path::new("Documents")));
        assert!(!is_clean_relative(Path::new("")));
        assert!(!is_clean_relative(Path::new("/Library")));
        assert!(!is_clean_relative(Path::new("Library/../..")));
    }

    #[test]
    fn home_relative_joins_and_normalizes() {
        assert_eq!(
            home_relative(Path::new("/Users/a"), Path::new("./Library/Logs")),
            Path::new("/Users/a/Library/Logs")
        );
    }
}
