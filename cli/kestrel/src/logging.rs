//! Log output for the CLI.
//!
//! Library crates only emit `tracing` events; the binary installs a single
//! `fmt` layer on stderr so stdout stays clean for unit JSON.

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

/// Level for a `-v` count, falling back to the configured level, then `warn`.
pub fn level(verbosity: u8, configured: Option<&str>) -> Result<LevelFilter> {
    match verbosity {
        0 => match configured {
            Some(name) => name
                .parse()
                .with_context(|| format!("invalid [logging] level `{name}`")),
            None => Ok(LevelFilter::WARN),
        },
        1 => Ok(LevelFilter::DEBUG),
        _ => Ok(LevelFilter::TRACE),
    }
}

pub fn init(verbosity: u8, configured: Option<&str>) -> Result<()> {
    let filter = level(verbosity, configured)?;
    let layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(verbosity > 1)
        .with_writer(std::io::stderr)
        .compact()
        .with_filter(filter);

    Registry::default().with(layer).try_init().context("installing log subscriber")
}
