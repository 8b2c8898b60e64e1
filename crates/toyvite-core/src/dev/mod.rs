//! Unbundled development serving.
//!
//! Serves individual ES modules on demand instead of a single bundle. Each
//! request is classified, its inputs are read from disk, and the result is
//! transformed just in time:
//!
//! ```text
//! GET /main.js              → rewrite bare imports        (rewrite)
//! GET /node_modules/vue     → package.json `module` file  (library)
//! GET /App.vue              → script module               (component)
//! GET /App.vue?type=template → render module              (component, template)
//! ```

pub mod classify;
pub mod component;
pub mod dispatch;
pub mod library;
pub mod load;
pub mod rewrite;
pub mod sfc;
pub mod template;

pub use classify::{classify, ArtifactKind};
pub use component::{split_component, ComponentPart};
pub use dispatch::{CachePolicy, DevResponse, DevServer, ServedModule};
pub use library::{LibraryResolver, ResolvedLibraryEntry};
pub use rewrite::{is_bare_specifier, is_legal_specifier, ImportRewriter, LIBRARY_ROOT};
pub use sfc::{parse_component, ComponentDescriptor, SfcBlock};
pub use template::compile_template;
