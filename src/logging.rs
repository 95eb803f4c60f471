//! Subscriber setup shared by every binary.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

/// Environment variable holding an `EnvFilter` directive such as
/// `info,ethiopodcasts_tools=debug`.
pub const LOG_ENV_VAR: &str = "LOG";

/// Installs a compact stderr formatter. Calling it twice returns an error
/// instead of panicking so tests and binaries can share it.
pub fn init() -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env()?;
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!("installing log subscriber: {err}"))?;
    Ok(())
}
