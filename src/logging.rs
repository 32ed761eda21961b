//! Tracing subscriber setup for the `pengalih-rs` binary.
//!
//! Filter priority, highest first:
//!
//! 1. `PENGALIH_LOG` (full directives, e.g. `pengalih_rs=debug,tower_http=info`)
//! 2. `RUST_LOG`
//! 3. `-v` / `-q` flags, falling back to the command's default level

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub const LOG_ENV: &str = "PENGALIH_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    /// `normal` is what the running command wants when no flag is given:
    /// `WARN` for one-shot commands, `INFO` while serving.
    pub const fn level(self, normal: Level) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => normal,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Installs the global subscriber. Logs go to stderr so stdout stays
/// parseable for `--json` and for piping resolved links.
pub fn init(verbosity: Verbosity, normal: Level) {
    let filter = build_env_filter(verbosity, normal);
    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(true)
        .without_time()
        .compact();
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

fn build_env_filter(verbosity: Verbosity, normal: Level) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(verbosity.level(normal).as_str().to_ascii_lowercase())
}
