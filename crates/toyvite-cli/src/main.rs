#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use toyvite_core::config::{DEFAULT_HOST, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(name = "toyvite")]
#[command(author, version, about = "An unbundled dev server for single-file component apps", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Start the dev server
    Dev {
        /// Entry HTML document, relative to the project root (default: src/index.html)
        entry: Option<PathBuf>,

        /// Port to listen on
        #[arg(long, short = 'p', default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        /// Path to config file (overrides auto-discovery)
        #[arg(long, short = 'c', value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Dev {
            entry,
            port,
            host,
            config,
        }) => {
            let action = commands::dev::DevAction {
                entry,
                cwd,
                port,
                host,
                config,
            };

            let span = tracing::info_span!("dev", cmd = "dev", cwd = %action.cwd.display());
            let _guard = span.enter();

            let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
            rt.block_on(commands::dev::run(action))
        }
    }
}
