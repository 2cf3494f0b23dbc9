//! Tracing setup shared by both binaries.
//!
//! Logs go to stderr so stdout stays clean for command output. Colours are
//! only used when stderr is a terminal; callers such as `SudoHelper` capture
//! it into error messages.

use std::io::IsTerminal;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "IMAGE_FACTORY_LOG";

/// Initialize the global subscriber. `default_level` applies when
/// `IMAGE_FACTORY_LOG` is unset or invalid.
pub fn init(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .compact()
        .try_init()
        .map_err(|err| anyhow!("Failed to install log subscriber: {err}"))
}
