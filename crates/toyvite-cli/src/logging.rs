//! Logging initialization for the CLI.
//!
//! Logging is owned by the CLI crate. The core library does not log; request
//! outcomes are reported by the dev command from the responses it returns.

use tracing::Level;
use tracing_subscriber::{
    filter::{Directive, ParseError},
    fmt,
    prelude::*,
    EnvFilter,
};

/// Initialize the tracing subscriber.
///
/// * `verbosity` - 0 = INFO, 1 = DEBUG, 2+ = TRACE
/// * `json` - If true, output JSON lines to stderr
///
/// JSON output format:
/// ```json
/// {"timestamp":"...","level":"INFO","fields":{"message":"request","path":"/App.vue","status":200},"span":{"cmd":"dev"}}
/// ```
///
/// Calling it a second time is a no-op.
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG wins for other targets; the verbosity flag sets our own.
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Ok(directive) = level_directive(level) {
        filter = filter.add_directive(directive);
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    let _ = if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
}

fn level_directive(level: Level) -> Result<Directive, ParseError> {
    format!("toyvite={level}").parse()
}
