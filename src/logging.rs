//! Tracing subscriber setup for the CLI.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install a global subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence; otherwise the level is `info`, or `debug`
/// with `verbose`. `json` switches to one JSON object per line.
pub fn init_tracing(verbose: bool, json: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.with_ansi(console::colors_enabled_stderr()).try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    tracing::debug!(verbose, json, "Logging initialized");
    Ok(())
}
