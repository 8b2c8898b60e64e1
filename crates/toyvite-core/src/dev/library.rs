//! Third-party package resolution.
//!
//! `/node_modules/<package>` is served from the file named by the `module`
//! field of `<modules_dir>/<package>/package.json`, with its own bare imports
//! rewritten. Nothing is cached; every request reads the manifest again.

use crate::config::DevServerConfig;
use crate::dev::load::{read_text, run_blocking};
use crate::dev::rewrite::{ImportRewriter, LIBRARY_ROOT};
use crate::error::Error;
use crate::paths::resolve_url_path;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The subset of `package.json` the resolver reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    /// Path of the published ES module bundle, relative to the package.
    #[serde(default)]
    pub module: Option<String>,
}

/// A package name mapped to its ES module bundle on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLibraryEntry {
    pub package: String,
    pub entry: PathBuf,
}

/// Resolves `/node_modules/...` requests.
#[derive(Debug, Clone)]
pub struct LibraryResolver {
    modules_dir: PathBuf,
    read_timeout: Duration,
    compile_timeout: Duration,
}

impl LibraryResolver {
    #[must_use]
    pub fn new(config: &DevServerConfig) -> Self {
        Self {
            modules_dir: config.modules_dir.clone(),
            read_timeout: config.read_timeout,
            compile_timeout: config.compile_timeout,
        }
    }

    /// Find the bundle file for the package named by `request_path`.
    pub async fn resolve_entry(&self, request_path: &str) -> Result<ResolvedLibraryEntry, Error> {
        let package = package_name(request_path)?;
        let package_dir = resolve_url_path(&self.modules_dir, package)?;
        let manifest_path = package_dir.join("package.json");

        let raw = read_text(&manifest_path, self.read_timeout).await?;
        let manifest: PackageManifest = serde_json::from_str(&raw)
            .map_err(|e| Error::resolution(package, format!("invalid package.json: {e}")))?;

        let module = manifest
            .module
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| Error::resolution(package, "package.json has no \"module\" field"))?;

        Ok(ResolvedLibraryEntry {
            package: package.to_string(),
            entry: package_dir.join(module.trim_start_matches("./")),
        })
    }

    /// Resolve, read and rewrite the package's ES module bundle.
    pub async fn resolve_library(&self, request_path: &str) -> Result<String, Error> {
        let resolved = self.resolve_entry(request_path).await?;
        let code = read_text(&resolved.entry, self.read_timeout).await?;

        let name = resolved.entry.display().to_string();
        run_blocking(format!("rewriting {name}"), self.compile_timeout, move || {
            ImportRewriter::new().rewrite(&name, &code)
        })
        .await
    }
}

/// Package name from a library request path, e.g. `@vue/shared` from
/// `/node_modules/@vue/shared`.
pub fn package_name(request_path: &str) -> Result<&str, Error> {
    let name = request_path
        .strip_prefix(LIBRARY_ROOT)
        .unwrap_or(request_path)
        .trim_matches('/');
    if name.is_empty() {
        return Err(Error::NotFound {
            path: PathBuf::from(request_path),
        });
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn resolver(root: &Path) -> LibraryResolver {
        LibraryResolver::new(&DevServerConfig::new(root.to_path_buf(), "src/index.html"))
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("/node_modules/vue").unwrap(), "vue");
        assert_eq!(package_name("/node_modules/@vue/shared").unwrap(), "@vue/shared");
        assert_eq!(package_name("/node_modules/vue/").unwrap(), "vue");
        assert!(package_name("/node_modules/").is_err());
    }

    #[tokio::test]
    async fn test_resolve_uses_module_field() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("node_modules/pkg");
        write(
            &pkg.join("package.json"),
            r#"{ "name": "pkg", "main": "dist/index.cjs.js", "module": "dist/index.esm.js" }"#,
        );
        write(&pkg.join("dist/index.cjs.js"), "module.exports = 'cjs';");
        write(&pkg.join("dist/index.esm.js"), "export default 'esm';");

        let resolver = resolver(dir.path());
        let entry = resolver.resolve_entry("/node_modules/pkg").await.unwrap();
        assert_eq!(entry.entry, pkg.join("dist/index.esm.js"));

        let code = resolver.resolve_library("/node_modules/pkg").await.unwrap();
        assert!(code.contains("'esm'"));
        assert!(!code.contains("cjs"));
    }

    #[tokio::test]
    async fn test_resolve_rewrites_nested_bare_imports() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("node_modules/vue");
        write(&pkg.join("package.json"), r#"{ "module": "./dist/vue.esm.js" }"#);
        write(
            &pkg.join("dist/vue.esm.js"),
            "export * from '@vue/runtime-dom';\nimport { h } from './h.js';\n",
        );

        let code = resolver(dir.path())
            .resolve_library("/node_modules/vue")
            .await
            .unwrap();
        assert!(code.contains("'/node_modules/@vue/runtime-dom'"));
        assert!(code.contains("'./h.js'"));
    }

    #[tokio::test]
    async fn test_scoped_package() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("node_modules/@vue/shared");
        write(&pkg.join("package.json"), r#"{ "module": "dist/shared.esm.js" }"#);
        write(&pkg.join("dist/shared.esm.js"), "export const isArray = Array.isArray;");

        let entry = resolver(dir.path())
            .resolve_entry("/node_modules/@vue/shared")
            .await
            .unwrap();
        assert_eq!(
            entry,
            ResolvedLibraryEntry {
                package: "@vue/shared".to_string(),
                entry: pkg.join("dist/shared.esm.js"),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_module_field_is_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("node_modules/cjs-only/package.json"),
            r#"{ "main": "index.js" }"#,
        );

        let err = resolver(dir.path())
            .resolve_library("/node_modules/cjs-only")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolver(dir.path())
            .resolve_library("/node_modules/ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_bundle_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("node_modules/broken/package.json"),
            r#"{ "module": "dist/missing.js" }"#,
        );

        let err = resolver(dir.path())
            .resolve_library("/node_modules/broken")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_manifest_is_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("node_modules/bad/package.json"), "{ nope");

        let err = resolver(dir.path())
            .resolve_entry("/node_modules/bad")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
    }
}
