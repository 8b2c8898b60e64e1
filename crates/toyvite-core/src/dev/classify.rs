//! Request path classification.
//!
//! Decides which transform serves a request. Rules are applied in order:
//!
//! | Rule                                  | Kind        |
//! |---------------------------------------|-------------|
//! | path is `/`                           | `Entry`     |
//! | extension is `.js`                    | `Script`    |
//! | path starts with `/node_modules/`     | `Library`   |
//! | extension is `.vue`                   | `Component` |
//! | anything else                         | `Unhandled` |
//!
//! Extensions are always read after the query string has been removed, so
//! `/App.vue?type=template` is a component request.

use std::fmt;

/// File extension of single-file components.
pub const COMPONENT_EXTENSION: &str = ".vue";

/// Query value selecting the compiled render module of a component.
pub const TEMPLATE_QUERY: &str = "template";

/// What a request path asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The entry HTML document.
    Entry,
    /// A project JavaScript module.
    Script,
    /// A third-party package's ES module bundle.
    Library,
    /// A single-file component (script or render module).
    Component,
    /// None of the above; served as a static file if one exists.
    Unhandled,
}

impl ArtifactKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Script => "script",
            Self::Library => "library",
            Self::Component => "component",
            Self::Unhandled => "unhandled",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a request path (query string allowed).
#[must_use]
pub fn classify(request_path: &str) -> ArtifactKind {
    let path = strip_query(request_path);
    let ext = file_extname(path);

    if path == "/" {
        ArtifactKind::Entry
    } else if ext == Some(".js") {
        ArtifactKind::Script
    } else if path.starts_with("/node_modules/") {
        ArtifactKind::Library
    } else if ext == Some(COMPONENT_EXTENSION) {
        ArtifactKind::Component
    } else {
        ArtifactKind::Unhandled
    }
}

/// The path without any `?query` or `#fragment` suffix.
#[must_use]
pub fn strip_query(request_path: &str) -> &str {
    request_path
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or(request_path)
}

/// The raw query string, if any.
#[must_use]
pub fn query_string(request_path: &str) -> Option<&str> {
    let (_, query) = request_path.split_once('?')?;
    Some(query.split('#').next().unwrap_or(query))
}

/// Value of the `type` query parameter, if present.
#[must_use]
pub fn query_type(request_path: &str) -> Option<String> {
    let query = query_string(request_path)?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "type")
        .map(|(_, value)| value.into_owned())
}

/// Extension of the last path segment including the dot, e.g. `.js`.
///
/// Expects a path without a query string. Dotfiles (`/.env`) have no
/// extension.
#[must_use]
pub fn file_extname(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx..]),
    }
}
