//! Dev server configuration.
//!
//! `toyvite.config.json` is optional. Whatever it contains is merged with CLI
//! flags once at startup into a [`DevServerConfig`], which is then shared
//! read-only by every request.
//!
//! ```json
//! {
//!   "entry": "src/index.html",
//!   "server": { "port": 3033, "host": "localhost" },
//!   "timeouts": { "readMs": 250, "compileMs": 500 }
//! }
//! ```

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name looked up in the project root.
pub const CONFIG_FILE: &str = "toyvite.config.json";

/// Entry document used when neither the CLI nor the config file names one.
pub const DEFAULT_ENTRY: &str = "src/index.html";

pub const DEFAULT_PORT: u16 = 3033;

pub const DEFAULT_HOST: &str = "localhost";

pub const DEFAULT_READ_TIMEOUT_MS: u64 = 250;

pub const DEFAULT_COMPILE_TIMEOUT_MS: u64 = 500;

/// Contents of `toyvite.config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Entry HTML document, relative to the project root.
    pub entry: Option<PathBuf>,
    pub server: ServerOptions,
    pub timeouts: TimeoutOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ServerOptions {
    pub port: Option<u16>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TimeoutOptions {
    /// Budget for a single file or manifest read.
    pub read_ms: Option<u64>,
    /// Budget for parsing, rewriting or compiling one module.
    pub compile_ms: Option<u64>,
}

/// Find the config file in the given root directory.
#[must_use]
pub fn find_config_file(root: &Path) -> Option<PathBuf> {
    let path = root.join(CONFIG_FILE);
    path.is_file().then_some(path)
}

/// Load the config file.
///
/// If `config_path` is `Some`, that file must exist. Otherwise the root is
/// searched and `Ok(None)` means there is no config file.
pub fn load_config(
    root: &Path,
    config_path: Option<&Path>,
) -> Result<Option<(PathBuf, ConfigFile)>, Error> {
    let path = match config_path {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => root.join(p),
        None => match find_config_file(root) {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    let source = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
        path: path.clone(),
        source,
    })?;
    let config = serde_json::from_str(&source).map_err(|source| Error::ConfigParse {
        path: path.clone(),
        source,
    })?;

    Ok(Some((path, config)))
}

/// Resolved, immutable server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevServerConfig {
    /// Project root.
    pub root: PathBuf,
    /// Absolute path of the entry HTML document.
    pub entry: PathBuf,
    /// Directory of the entry document; scripts and components resolve here.
    pub source_dir: PathBuf,
    /// `<root>/node_modules`.
    pub modules_dir: PathBuf,
    pub read_timeout: Duration,
    pub compile_timeout: Duration,
}

impl DevServerConfig {
    /// Create a config for `root` with `entry` resolved against it.
    #[must_use]
    pub fn new(root: PathBuf, entry: impl AsRef<Path>) -> Self {
        let entry = if entry.as_ref().is_absolute() {
            entry.as_ref().to_path_buf()
        } else {
            root.join(entry)
        };
        let source_dir = entry
            .parent()
            .map_or_else(|| root.clone(), Path::to_path_buf);

        Self {
            modules_dir: root.join("node_modules"),
            root,
            entry,
            source_dir,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            compile_timeout: Duration::from_millis(DEFAULT_COMPILE_TIMEOUT_MS),
        }
    }

    /// Build from a loaded config file, falling back to defaults.
    #[must_use]
    pub fn from_file(root: PathBuf, file: &ConfigFile) -> Self {
        let entry = file
            .entry
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENTRY));
        let mut config = Self::new(root, entry);
        if let Some(ms) = file.timeouts.read_ms {
            config = config.with_read_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = file.timeouts.compile_ms {
            config = config.with_compile_timeout(Duration::from_millis(ms));
        }
        config
    }

    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }
}
