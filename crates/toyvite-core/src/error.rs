use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Core error type for toyvite operations.
///
/// Every variant is terminal for the request that produced it: nothing is
/// retried and no substitute body is served.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Failed to resolve package '{package}': {message}")]
    Resolution { package: String, message: String },

    #[error("No handler for request path {path}")]
    ClassificationGap { path: String },

    #[error("Timed out after {}ms while {what}", budget.as_millis())]
    Timeout { what: String, budget: Duration },

    #[error("Request path escapes the serving directory: {path}")]
    Forbidden { path: String },

    #[error("Failed to read config at {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    #[must_use]
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn resolution(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            package: package.into(),
            message: message.into(),
        }
    }

    /// Map an IO failure on `path` to `NotFound` or `Io`.
    #[must_use]
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// HTTP status a transport should answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } | Self::ClassificationGap { .. } => 404,
            Self::Forbidden { .. } => 403,
            Self::Timeout { .. } => 503,
            Self::Parse { .. }
            | Self::Resolution { .. }
            | Self::ConfigRead { .. }
            | Self::ConfigParse { .. }
            | Self::Io { .. } => 500,
        }
    }
}
