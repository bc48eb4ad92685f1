use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub const LOG_ENV: &str = "DOCVARS_LOG";

/// Install the stderr subscriber.
///
/// `DOCVARS_LOG` takes precedence; otherwise `--verbose` means debug and the
/// configured level applies.
pub fn init(level: &str, verbose: bool) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        parse_level(level).unwrap_or(LevelFilter::WARN)
    };

    let filter = EnvFilter::builder()
        .with_env_var(LOG_ENV)
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    // A second init (tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(layer).try_init();
}

fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_lowercase().as_str() {
        "off" => Some(LevelFilter::OFF),
        "error" => Some(LevelFilter::ERROR),
        "warn" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        _ => None,
    }
}
