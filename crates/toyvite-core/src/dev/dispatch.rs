//! Request dispatch.
//!
//! ```text
//! GET <url>
//!   → classify (query stripped)
//!   → Entry      read the entry document
//!   → Script     read + rewrite imports
//!   → Library    manifest → `module` file → rewrite imports
//!   → Component  read + split (script module or render module)
//!   → Unhandled  static file from the source directory, or 404
//! ```
//!
//! The dispatcher holds no mutable state. Every request re-reads its inputs,
//! so edits on disk show up on the next request.

use crate::config::DevServerConfig;
use crate::dev::classify::{classify, file_extname, query_type, strip_query, ArtifactKind};
use crate::dev::component::split_component;
use crate::dev::library::LibraryResolver;
use crate::dev::load::{read_bytes, read_text, run_blocking};
use crate::dev::rewrite::{ImportRewriter, LIBRARY_ROOT};
use crate::dev::template::js_string;
use crate::error::Error;
use crate::paths::resolve_url_path;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;

pub const JAVASCRIPT: &str = "application/javascript; charset=utf-8";
pub const HTML: &str = "text/html; charset=utf-8";
pub const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Cache directive attached to a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Long-lived; the content does not change while the server runs.
    Immutable,
    /// Always revalidate.
    NoCache,
}

impl CachePolicy {
    #[must_use]
    pub fn header_value(self) -> &'static str {
        match self {
            Self::Immutable => "max-age=31536000, immutable",
            Self::NoCache => "no-cache",
        }
    }

    #[must_use]
    pub fn for_kind(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Entry | ArtifactKind::Library => Self::Immutable,
            ArtifactKind::Script | ArtifactKind::Component | ArtifactKind::Unhandled => {
                Self::NoCache
            }
        }
    }
}

/// A successfully produced response body.
#[derive(Debug, Clone)]
pub struct ServedModule {
    pub kind: ArtifactKind,
    pub content_type: &'static str,
    pub cache: CachePolicy,
    pub body: Bytes,
}

impl ServedModule {
    fn new(kind: ArtifactKind, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        Self {
            kind,
            content_type,
            cache: CachePolicy::for_kind(kind),
            body: body.into(),
        }
    }

    /// Body as text, for modules and documents.
    #[must_use]
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Transport-neutral response: status, headers and body.
#[derive(Debug, Clone)]
pub struct DevResponse {
    pub status: u16,
    pub kind: ArtifactKind,
    pub content_type: &'static str,
    pub cache_control: &'static str,
    pub body: Bytes,
}

impl DevResponse {
    fn ok(module: ServedModule) -> Self {
        Self {
            status: 200,
            kind: module.kind,
            content_type: module.content_type,
            cache_control: module.cache.header_value(),
            body: module.body,
        }
    }

    /// Failed response. Module requests get a `console.error` body so the
    /// cause shows up in the browser console.
    #[must_use]
    pub fn error(kind: ArtifactKind, err: &Error) -> Self {
        let message = format!("[toyvite] {err}");
        let (content_type, body) = match kind {
            ArtifactKind::Script | ArtifactKind::Library | ArtifactKind::Component => {
                let literal = js_string(&message).unwrap_or_else(|_| "\"[toyvite] error\"".to_string());
                (JAVASCRIPT, format!("console.error({literal});\n"))
            }
            ArtifactKind::Entry | ArtifactKind::Unhandled => (PLAIN_TEXT, message),
        };
        Self {
            status: err.status_code(),
            kind,
            content_type,
            cache_control: CachePolicy::NoCache.header_value(),
            body: Bytes::from(body),
        }
    }
}

/// Serves dev requests for one project.
#[derive(Debug, Clone)]
pub struct DevServer {
    config: Arc<DevServerConfig>,
    libraries: LibraryResolver,
}

impl DevServer {
    #[must_use]
    pub fn new(config: DevServerConfig) -> Self {
        Self {
            libraries: LibraryResolver::new(&config),
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DevServerConfig {
        &self.config
    }

    /// Handle a request and always produce a response.
    pub async fn respond(&self, raw_url: &str) -> DevResponse {
        let kind = classify(raw_url);
        match self.handle(raw_url).await {
            Ok(module) => DevResponse::ok(module),
            Err(err) => DevResponse::error(kind, &err),
        }
    }

    /// Handle a request path (query string allowed).
    pub async fn handle(&self, raw_url: &str) -> Result<ServedModule, Error> {
        let path = strip_query(raw_url);
        let kind = classify(raw_url);

        match kind {
            ArtifactKind::Entry => self.serve_entry().await,
            ArtifactKind::Script => self.serve_script(path).await,
            ArtifactKind::Library => {
                let code = self.libraries.resolve_library(path).await?;
                Ok(ServedModule::new(kind, JAVASCRIPT, code))
            }
            ArtifactKind::Component => {
                let query = query_type(raw_url);
                self.serve_component(path, query).await
            }
            ArtifactKind::Unhandled => self.serve_static(path).await,
        }
    }

    async fn serve_entry(&self) -> Result<ServedModule, Error> {
        let html = read_text(&self.config.entry, self.config.read_timeout).await?;
        Ok(ServedModule::new(ArtifactKind::Entry, HTML, html))
    }

    async fn serve_script(&self, path: &str) -> Result<ServedModule, Error> {
        // Chunks imported from inside a package bundle live under modules_dir.
        let file = match path.strip_prefix(LIBRARY_ROOT) {
            Some(rest) => resolve_url_path(&self.config.modules_dir, rest)?,
            None => resolve_url_path(&self.config.source_dir, path)?,
        };
        let code = read_text(&file, self.config.read_timeout).await?;

        let name = path.to_string();
        let rewritten = run_blocking(
            format!("rewriting {path}"),
            self.config.compile_timeout,
            move || ImportRewriter::new().rewrite(&name, &code),
        )
        .await?;
        Ok(ServedModule::new(ArtifactKind::Script, JAVASCRIPT, rewritten))
    }

    async fn serve_component(
        &self,
        path: &str,
        query: Option<String>,
    ) -> Result<ServedModule, Error> {
        let file = resolve_url_path(&self.config.source_dir, path)?;
        let source = read_text(&file, self.config.read_timeout).await?;

        let request_path = path.to_string();
        let code = run_blocking(
            format!("compiling {path}"),
            self.config.compile_timeout,
            move || split_component(&request_path, &source, query.as_deref()),
        )
        .await?;
        Ok(ServedModule::new(ArtifactKind::Component, JAVASCRIPT, code))
    }

    async fn serve_static(&self, path: &str) -> Result<ServedModule, Error> {
        let gap = || Error::ClassificationGap {
            path: path.to_string(),
        };

        let file: PathBuf = resolve_url_path(&self.config.source_dir, path)?;
        let is_file = tokio::fs::metadata(&file)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(gap());
        }

        let bytes = read_bytes(&file, self.config.read_timeout)
            .await
            .map_err(|e| match e {
                Error::NotFound { .. } => gap(),
                other => other,
            })?;
        Ok(ServedModule::new(
            ArtifactKind::Unhandled,
            static_content_type(path),
            bytes,
        ))
    }
}

/// Content type of a static file by extension.
#[must_use]
pub fn static_content_type(path: &str) -> &'static str {
    match file_extname(path).map(str::to_ascii_lowercase).as_deref() {
        Some(".html" | ".htm") => HTML,
        Some(".css") => "text/css; charset=utf-8",
        Some(".json") => "application/json",
        Some(".svg") => "image/svg+xml",
        Some(".png") => "image/png",
        Some(".jpg" | ".jpeg") => "image/jpeg",
        Some(".gif") => "image/gif",
        Some(".ico") => "image/x-icon",
        Some(".woff") => "font/woff",
        Some(".woff2") => "font/woff2",
        Some(".ttf") => "font/ttf",
        Some(".wasm") => "application/wasm",
        Some(".txt") => PLAIN_TEXT,
        _ => "application/octet-stream",
    }
}
