//! Logging setup using the `tracing` ecosystem.
//!
//! Logs always go to stderr so that reports printed to stdout stay
//! machine-readable when piped.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "assetscope=info";
const VERBOSE_FILTER: &str = "assetscope=debug";
const QUIET_FILTER: &str = "assetscope=error";

/// Pick the filter directive for the given flags.
///
/// The level is determined in this order:
/// 1. `--verbose`: debug for assetscope
/// 2. `--quiet`: errors only
/// 3. `RUST_LOG`, when set
/// 4. info for assetscope
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Initialize the global tracing subscriber. Call once, before any logging.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(fmt_layer)
        .init();
}
