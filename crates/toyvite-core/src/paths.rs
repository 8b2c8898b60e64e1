use crate::error::Error;
use std::path::{Component, Path, PathBuf};

/// Find the project root by walking up from `cwd` looking for `package.json` or `.git`.
///
/// Returns the first directory containing either marker, or `None` if neither is found.
#[must_use]
pub fn project_root(cwd: &Path) -> Option<PathBuf> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join("package.json").exists() || current.join(".git").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Map a root-relative URL path (`/components/App.vue`) onto `base`.
///
/// The path must already be free of its query string. Percent-escapes are
/// decoded, and any `..` segment is rejected so a request can never leave
/// `base`.
pub fn resolve_url_path(base: &Path, url_path: &str) -> Result<PathBuf, Error> {
    let decoded = urlencoding::decode(url_path).map_err(|_| Error::NotFound {
        path: PathBuf::from(url_path),
    })?;
    let relative = Path::new(decoded.trim_start_matches('/'));

    let mut resolved = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::Forbidden {
                    path: url_path.to_string(),
                });
            }
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_root_finds_package_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let nested = dir.path().join("src").join("components");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(project_root(&nested), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_resolve_url_path() {
        let resolved = resolve_url_path(Path::new("/project/src"), "/components/App.vue").unwrap();
        assert_eq!(resolved, PathBuf::from("/project/src/components/App.vue"));
    }

    #[test]
    fn test_resolve_url_path_decodes_escapes() {
        let resolved = resolve_url_path(Path::new("/project/src"), "/my%20file.js").unwrap();
        assert_eq!(resolved, PathBuf::from("/project/src/my file.js"));
    }

    #[test]
    fn test_resolve_url_path_keeps_plus() {
        let resolved = resolve_url_path(Path::new("/project/src"), "/a+b.js").unwrap();
        assert_eq!(resolved, PathBuf::from("/project/src/a+b.js"));
    }

    #[test]
    fn test_resolve_url_path_rejects_parent() {
        let err = resolve_url_path(Path::new("/project/src"), "/../package.json").unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));

        let err = resolve_url_path(Path::new("/project/src"), "/a/%2E%2E/%2E%2E/secret").unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));
    }
}
