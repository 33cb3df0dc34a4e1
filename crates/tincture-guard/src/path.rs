//! Path containment checks.
//!
//! Paths are compared after symlink resolution so that `..` segments and
//! links cannot escape an allowed root. Components that do not exist yet are
//! resolved lexically on top of the deepest existing ancestor, which lets
//! callers vet a destination before the file is written.

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Resolve an absolute path to the form used for containment checks.
///
/// Returns `None` for relative paths, for paths whose existing part cannot be
/// canonicalized (including dangling symlinks), and for paths with prefix or
/// root components after the resolved ancestor.
#[must_use]
pub fn resolve_path(path: &Path) -> Option<PathBuf> {
    if !path.is_absolute() {
        return None;
    }

    for ancestor in path.ancestors() {
        match ancestor.canonicalize() {
            Ok(canonical) => {
                let rest = path.strip_prefix(ancestor).ok()?;
                return normalize_onto(canonical, rest);
            }
            // A dangling link can be re-pointed after the check.
            Err(_) if fs::symlink_metadata(ancestor).is_ok() => return None,
            Err(_) => continue,
        }
    }
    None
}

fn normalize_onto(mut base: PathBuf, rest: &Path) -> Option<PathBuf> {
    for component in rest.components() {
        match component {
            Component::Normal(part) => base.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                base.pop();
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(base)
}

/// `true` only if `path` resolves to a strict descendant of one of
/// `allowed_roots`. An empty root list allows nothing.
#[must_use]
pub fn validate_file_path<P: AsRef<Path>>(path: impl AsRef<Path>, allowed_roots: &[P]) -> bool {
    let Some(candidate) = resolve_path(path.as_ref()) else {
        return false;
    };
    allowed_roots
        .iter()
        .filter_map(|root| resolve_path(root.as_ref()))
        .any(|root| candidate != root && candidate.starts_with(&root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_out_of_root_is_rejected() {
        assert!(!validate_file_path(
            "/data/app/../../etc/passwd",
            &["/data/app"]
        ));
    }

    #[test]
    fn descendant_of_missing_root_is_accepted_lexically() {
        assert!(validate_file_path("/data/app/themes/x.pkg", &["/data/app"]));
    }

    #[test]
    fn root_itself_and_siblings_are_rejected() {
        assert!(!validate_file_path("/data/app", &["/data/app"]));
        assert!(!validate_file_path("/data/application/x.pkg", &["/data/app"]));
    }

    #[test]
    fn relative_paths_are_rejected() {
        assert!(!validate_file_path("themes/x.pkg", &["/data/app"]));
        assert!(!validate_file_path("/data/app/x.pkg", &["data/app"]));
    }

    #[test]
    fn empty_root_list_allows_nothing() {
        let roots: [&str; 0] = [];
        assert!(!validate_file_path("/data/app/x.pkg", &roots));
    }

    #[test]
    fn existing_tree_is_canonicalized() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("root");
        fs::create_dir_all(root.join("themes")).expect("create themes");
        fs::write(root.join("themes/a.pkg"), b"x").expect("write file");

        assert!(validate_file_path(root.join("themes/a.pkg"), &[&root]));
        assert!(validate_file_path(root.join("themes/new.pkg"), &[&root]));
        assert!(validate_file_path(
            root.join("themes/../themes/a.pkg"),
            &[&root]
        ));
        assert!(!validate_file_path(root.join("themes/../../x"), &[&root]));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_root_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("root");
        let outside = temp.path().join("outside");
        fs::create_dir_all(&root).expect("create root");
        fs::create_dir_all(&outside).expect("create outside");
        std::os::unix::fs::symlink(&outside, root.join("link")).expect("symlink");

        assert!(!validate_file_path(root.join("link/x.pkg"), &[&root]));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("root");
        fs::create_dir_all(&root).expect("create root");
        std::os::unix::fs::symlink(temp.path().join("missing"), root.join("dangling"))
            .expect("symlink");

        assert!(!validate_file_path(root.join("dangling"), &[&root]));
        assert!(!validate_file_path(root.join("dangling/x.pkg"), &[&root]));
    }
}
