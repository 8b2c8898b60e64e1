use std::fmt::Write;

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version line printed by `toyvite version`, with the git hash when the
/// build provides one.
#[must_use]
pub fn version_string() -> String {
    let mut s = format!("toyvite {VERSION}");

    if let Some(hash) = option_env!("TOYVITE_BUILD_GIT_HASH") {
        let _ = write!(s, " ({hash})");
    }

    s
}
